//! Show timeline information.

use std::path::PathBuf;

pub fn run(timeline: PathBuf) -> anyhow::Result<()> {
    let file = super::load_timeline(&timeline)?;

    println!("Timeline: {}", timeline.display());
    for (kind, entries) in file.timelines() {
        println!();
        println!("{kind}:");
        for entry in entries {
            let d = &entry.descriptor;
            println!(
                "  {} [{}] {:.2}s → {:.2}s ({:.2}s), transition: {}{}",
                entry.name,
                d.kind,
                d.start,
                d.end,
                d.duration_secs(),
                d.transition,
                if d.resample { ", resample" } else { "" }
            );
        }
    }

    let snapshot = file.render_snapshot();
    println!();
    println!(
        "Requested visual length: {:.2}s",
        snapshot.requested_visual_secs()
    );

    Ok(())
}
