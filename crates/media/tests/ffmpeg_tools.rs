//! End-to-end checks against real ffmpeg/ffprobe. Each test returns early
//! when the tools are not installed.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use image::RgbImage;
use reelforge_common::config::ToolPaths;
use reelforge_media::codec::{RenderQuality, VideoCodec};
use reelforge_media::probe::{probe_frame_rate, probe_media};
use reelforge_media::{
    DecodeRequest, EncodeSettings, FfmpegEncoder, FrameRateNormalizer, ProcessRunner,
    SegmentConcatenator, VideoDecoder,
};
use reelforge_project_model::Segment;

fn ffmpeg_tools_available() -> bool {
    ["ffmpeg", "ffprobe"].iter().all(|tool| {
        Command::new(tool)
            .arg("-version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    })
}

fn synth_clip(path: &Path, secs: u32, rate: u32) -> anyhow::Result<()> {
    let status = Command::new("ffmpeg")
        .args(["-v", "error", "-y", "-f", "lavfi", "-i"])
        .arg(format!("testsrc=size=64x48:rate={rate}"))
        .args(["-f", "lavfi", "-i", "sine=frequency=440:sample_rate=48000", "-t"])
        .arg(secs.to_string())
        .args(["-pix_fmt", "yuv420p", "-c:v", "libx264", "-g", "1", "-c:a", "aac"])
        .arg(path)
        .status()?;
    anyhow::ensure!(status.success(), "ffmpeg failed creating {}", path.display());
    Ok(())
}

fn runner() -> Arc<ProcessRunner> {
    Arc::new(ProcessRunner::new(ToolPaths::default()))
}

#[test]
fn concat_real_clips_with_audio() -> anyhow::Result<()> {
    if !ffmpeg_tools_available() {
        eprintln!("skipping: ffmpeg/ffprobe not on PATH");
        return Ok(());
    }
    let dir = tempfile::tempdir()?;
    let a = dir.path().join("a.mp4");
    let b = dir.path().join("b.mp4");
    synth_clip(&a, 3, 30)?;
    synth_clip(&b, 3, 30)?;

    let runner = runner();
    let out = dir.path().join("joined.mp4");
    let video = vec![Segment::new(&a, 0.0, 2.0), Segment::new(&b, 1.0, 3.0)];
    let audio = vec![Segment::new(&a, 0.0, 3.0)];
    let (ok, duration) = SegmentConcatenator::new(runner.clone()).concatenate(&video, &audio, &out);

    assert!(ok);
    assert!((duration - 4.0).abs() < 1e-9);
    let info = probe_media(runner.as_ref(), &out)?;
    assert!(info.has_audio);
    assert!((info.duration_secs - 4.0).abs() < 0.5, "got {}", info.duration_secs);
    Ok(())
}

#[test]
fn constant_rate_clip_is_not_variable_and_normalizes_once() -> anyhow::Result<()> {
    if !ffmpeg_tools_available() {
        eprintln!("skipping: ffmpeg/ffprobe not on PATH");
        return Ok(());
    }
    let dir = tempfile::tempdir()?;
    let src = dir.path().join("src.mp4");
    synth_clip(&src, 1, 25)?;

    let runner = runner();
    let check = probe_frame_rate(runner.as_ref(), &src, Duration::from_secs(10));
    assert!(!check.variable);
    assert_eq!(check.average_fps, Some(25));

    let mut normalizer = FrameRateNormalizer::new(runner.clone(), dir.path().join("temp"));
    let cfr = normalizer.normalize(&src, 30)?;
    assert!(cfr.exists());
    assert_eq!(normalizer.normalize(&src, 30)?, cfr);

    let check = probe_frame_rate(runner.as_ref(), &cfr, Duration::from_secs(10));
    assert_eq!(check.average_fps, Some(30));

    normalizer.cleanup_temp_files();
    assert!(!cfr.exists());
    Ok(())
}

#[test]
fn decode_then_encode_roundtrips_frame_count() -> anyhow::Result<()> {
    if !ffmpeg_tools_available() {
        eprintln!("skipping: ffmpeg/ffprobe not on PATH");
        return Ok(());
    }
    let dir = tempfile::tempdir()?;
    let src = dir.path().join("src.mp4");
    synth_clip(&src, 2, 30)?;

    let mut decoder = VideoDecoder::open(
        Path::new("ffmpeg"),
        DecodeRequest {
            path: src.clone(),
            start_secs: 0.5,
            duration_secs: 1.0,
            fps: 30,
            width: 64,
            height: 48,
        },
    )?;
    let frames: Vec<RgbImage> = decoder.by_ref().collect::<Result<_, _>>()?;
    assert!((29..=31).contains(&frames.len()), "got {} frames", frames.len());

    let out = dir.path().join("encoded.mp4");
    let mut encoder = FfmpegEncoder::start(
        Path::new("ffmpeg"),
        EncodeSettings {
            width: 64,
            height: 48,
            fps: 30,
            codec: VideoCodec::Libx264,
            quality: RenderQuality::Preview,
            output: out.clone(),
        },
    )?;
    for frame in &frames {
        encoder.encode_frame(frame)?;
    }
    encoder.finish()?;

    let info = probe_media(runner().as_ref(), &out)?;
    assert_eq!((info.width, info.height), (64, 48));
    assert!((info.duration_secs - 1.0).abs() < 0.15);
    Ok(())
}
