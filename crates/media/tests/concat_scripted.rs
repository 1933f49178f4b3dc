//! Concatenator behavior against a scripted runner (no ffmpeg required).

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use reelforge_common::error::ReelError;
use reelforge_media::runner::{Tool, ToolOutput};
use reelforge_media::testing::{touch_output, ScriptedRunner};
use reelforge_media::SegmentConcatenator;
use reelforge_project_model::Segment;

fn segments(dir: &Path) -> Vec<Segment> {
    vec![
        Segment::new(dir.join("a.mp4"), 0.0, 5.0),
        Segment::new(dir.join("b.mp4"), 1.0, 4.0),
        Segment::new(dir.join("c.mp4"), 2.5, 3.0),
    ]
}

#[test]
fn concatenate_reports_summed_video_duration() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::default();
    let concat = SegmentConcatenator::new(Arc::new(runner.clone())).with_workers(2);
    let out = dir.path().join("preview_fast.mp4");

    let (ok, duration) = concat.concatenate(&segments(dir.path()), &[], &out);

    assert!(ok);
    assert!((duration - 8.5).abs() < 1e-9);
    assert!(out.exists());
    // 3 trims + 1 concat, no mux without audio.
    assert_eq!(runner.calls().len(), 4);
    assert_eq!(runner.count_with_arg("concat"), 1);
    assert_eq!(runner.count_with_arg("1:a:0"), 0);
}

#[test]
fn concatenate_with_audio_muxes_once() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::default();
    let concat = SegmentConcatenator::new(Arc::new(runner.clone()));
    let out = dir.path().join("out.mp4");
    let audio = vec![Segment::new(dir.path().join("song.mp3"), 10.0, 18.5)];

    let duration = concat
        .try_concatenate(&segments(dir.path()), &audio, &out)
        .unwrap();

    assert!((duration - 8.5).abs() < 1e-9);
    assert_eq!(runner.count_with_arg("concat"), 2);
    assert_eq!(runner.count_with_arg("1:a:0"), 1);
    assert!(out.exists());
}

#[test]
fn concat_list_preserves_input_order() {
    let dir = tempfile::tempdir().unwrap();
    let lists = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen = lists.clone();
    let runner = ScriptedRunner::new(move |inv| {
        if inv.args.iter().any(|a| a == "concat") {
            let list_idx = inv.args.iter().position(|a| a == "-i").unwrap() + 1;
            let body = std::fs::read_to_string(&inv.args[list_idx]).unwrap();
            seen.lock().unwrap().push(body);
        }
        Ok(touch_output(inv))
    });
    let concat = SegmentConcatenator::new(Arc::new(runner)).with_workers(3);
    let out = dir.path().join("out.mkv");
    concat
        .try_concatenate(&segments(dir.path()), &[], &out)
        .unwrap();

    let lists = lists.lock().unwrap();
    let lines: Vec<&str> = lists[0].lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("video_0000.mkv"));
    assert!(lines[1].contains("video_0001.mkv"));
    assert!(lines[2].contains("video_0002.mkv"));
}

#[test]
fn empty_video_list_runs_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::default();
    let concat = SegmentConcatenator::new(Arc::new(runner.clone()));
    let out = dir.path().join("out.mp4");

    assert_eq!(concat.concatenate(&[], &[], &out), (false, 0.0));
    assert!(matches!(
        concat.try_concatenate(&[], &[], &out),
        Err(ReelError::EmptySegments)
    ));
    assert!(runner.calls().is_empty());
    assert!(!out.exists());
}

#[test]
fn failed_trim_aborts_without_output_and_cleans_scratch() {
    let dir = tempfile::tempdir().unwrap();
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let runner = ScriptedRunner::new(move |inv| {
        counter.fetch_add(1, Ordering::SeqCst);
        let is_b = inv.args.iter().any(|a| a.ends_with("b.mp4"));
        if inv.tool == Tool::Ffmpeg && is_b {
            Ok(ToolOutput::failed("exit status: 1", "Invalid data found"))
        } else {
            Ok(touch_output(inv))
        }
    });
    let concat = SegmentConcatenator::new(Arc::new(runner.clone())).with_workers(1);
    let out = dir.path().join("out.mp4");

    let err = concat
        .try_concatenate(&segments(dir.path()), &[], &out)
        .unwrap_err();
    assert!(err.to_string().contains("Invalid data found"));
    assert!(!out.exists());
    // Single worker stops after the failing second trim.
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(runner.count_with_arg("concat"), 0);

    let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert!(leftovers.is_empty(), "scratch directory should be removed");
}

#[test]
fn inverted_segment_is_rejected_before_any_subprocess() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::default();
    let concat = SegmentConcatenator::new(Arc::new(runner.clone()));
    let out = dir.path().join("out.mp4");

    let inverted = vec![Segment::new(dir.path().join("a.mp4"), 5.0, 2.0)];
    assert_eq!(concat.concatenate(&inverted, &[], &out), (false, 0.0));
    assert!(matches!(
        concat.try_concatenate(&inverted, &[], &out),
        Err(ReelError::InvalidDescriptor { .. })
    ));

    let bad_audio = vec![Segment::new(dir.path().join("song.mp3"), 4.0, 4.0)];
    assert!(concat
        .try_concatenate(&segments(dir.path()), &bad_audio, &out)
        .is_err());

    assert!(runner.calls().is_empty());
    assert!(!out.exists());
    let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert!(leftovers.is_empty());
}
