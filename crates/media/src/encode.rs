//! Raw-frame encoder: rgb24 frames written to an `ffmpeg` child's stdin.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use image::RgbImage;
use reelforge_common::error::{ReelError, ReelResult};

use crate::codec::{RenderQuality, VideoCodec};

#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: VideoCodec,
    pub quality: RenderQuality,
    pub output: PathBuf,
}

impl EncodeSettings {
    pub fn validate(&self) -> ReelResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ReelError::encode("encode width/height must be non-zero"));
        }
        if self.fps == 0 {
            return Err(ReelError::encode("encode fps must be non-zero"));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            // yuv420p output needs even dimensions.
            return Err(ReelError::encode(
                "encode width/height must be even (required for yuv420p output)",
            ));
        }
        Ok(())
    }

    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-y".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "rgb24".into(),
            "-s".into(),
            format!("{}x{}", self.width, self.height),
            "-r".into(),
            self.fps.to_string(),
            "-i".into(),
            "pipe:0".into(),
            "-an".into(),
        ];
        args.extend(self.codec.encode_args(self.quality));
        args.extend(["-movflags".to_string(), "+faststart".to_string()]);
        args.push(self.output.display().to_string());
        args
    }
}

pub struct FfmpegEncoder {
    settings: EncodeSettings,
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_task: Option<std::thread::JoinHandle<String>>,
    frames_written: u64,
}

impl FfmpegEncoder {
    pub fn start(ffmpeg: &Path, settings: EncodeSettings) -> ReelResult<Self> {
        settings.validate()?;
        if let Some(parent) = settings.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let args = settings.args();
        tracing::debug!(args = ?args, "Starting encoder");
        let mut child = Command::new(ffmpeg)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ReelError::encode(format!(
                    "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ReelError::encode("failed to open ffmpeg stdin"))?;
        let stderr_task = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut text = String::new();
                stderr.read_to_string(&mut text).ok();
                text
            })
        });

        Ok(Self {
            settings,
            child,
            stdin: Some(stdin),
            stderr_task,
            frames_written: 0,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn encode_frame(&mut self, frame: &RgbImage) -> ReelResult<()> {
        if frame.width() != self.settings.width || frame.height() != self.settings.height {
            return Err(ReelError::encode(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width(),
                frame.height(),
                self.settings.width,
                self.settings.height
            )));
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(ReelError::encode("ffmpeg encoder is already finalized"));
        };
        stdin
            .write_all(frame.as_raw())
            .map_err(|e| ReelError::encode(format!("failed to write frame to ffmpeg stdin: {e}")))?;
        self.frames_written += 1;
        Ok(())
    }

    /// Close stdin and wait for ffmpeg to finish writing the file.
    pub fn finish(mut self) -> ReelResult<PathBuf> {
        drop(self.stdin.take());
        let status = self
            .child
            .wait()
            .map_err(|e| ReelError::encode(format!("failed to wait for ffmpeg to finish: {e}")))?;
        let stderr = self
            .stderr_task
            .take()
            .and_then(|t| t.join().ok())
            .unwrap_or_default();
        if !status.success() {
            return Err(ReelError::subprocess(
                "ffmpeg",
                status.to_string(),
                stderr.trim().to_string(),
            ));
        }
        tracing::debug!(
            output = %self.settings.output.display(),
            frames = self.frames_written,
            "Encoder finished"
        );
        Ok(self.settings.output.clone())
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        if self.stdin.take().is_some() {
            // Abandoned mid-stream.
            self.child.kill().ok();
        }
        self.child.wait().ok();
    }
}
