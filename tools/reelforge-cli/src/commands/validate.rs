//! Validate a timeline file.

use std::path::PathBuf;

pub fn run(timeline: PathBuf, media_dir: PathBuf) -> anyhow::Result<()> {
    println!("Validating timeline: {}", timeline.display());

    let file = super::load_timeline(&timeline)?;
    for (kind, entries) in file.timelines() {
        println!("  {kind}: {} entr(ies)", entries.len());
    }

    let mut errors = file.validate();
    errors.extend(file.validate_sources(&media_dir));
    if errors.is_empty() {
        println!("  Sources: All present");
        println!("\nTimeline is valid.");
    } else {
        println!("\nValidation issues:");
        for error in &errors {
            println!("  - {error}");
        }
        println!(
            "\n{} issue(s) found. Affected entries will be skipped when rendering.",
            errors.len()
        );
    }

    Ok(())
}
