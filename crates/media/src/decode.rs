//! Streaming raw-frame decoder: an `ffmpeg` child writing rgb24 frames to a
//! pipe, read one frame at a time.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use image::RgbImage;
use reelforge_common::error::{ReelError, ReelResult};
use reelforge_common::timing::ffmpeg_timestamp;

/// What to decode: a time range of one file resampled to `fps`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeRequest {
    pub path: PathBuf,
    pub start_secs: f64,
    pub duration_secs: f64,
    pub fps: u32,
    /// Frame size the source decodes to (after rotation metadata).
    pub width: u32,
    pub height: u32,
}

impl DecodeRequest {
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    pub fn args(&self) -> Vec<String> {
        vec![
            "-hide_banner".into(),
            "-v".into(),
            "error".into(),
            "-ss".into(),
            ffmpeg_timestamp(self.start_secs),
            "-i".into(),
            self.path.display().to_string(),
            "-t".into(),
            ffmpeg_timestamp(self.duration_secs),
            "-an".into(),
            "-vf".into(),
            format!("fps={}", self.fps),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "rgb24".into(),
            "pipe:1".into(),
        ]
    }
}

/// Owns one decoding subprocess. The child is killed and reaped on
/// [`VideoDecoder::close`] or drop.
pub struct VideoDecoder {
    request: DecodeRequest,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    stderr_task: Option<std::thread::JoinHandle<String>>,
    frames_read: u64,
}

impl VideoDecoder {
    pub fn open(ffmpeg: &Path, request: DecodeRequest) -> ReelResult<Self> {
        if request.width == 0 || request.height == 0 {
            return Err(ReelError::decode(format!(
                "{}: zero frame size",
                request.path.display()
            )));
        }

        let args = request.args();
        tracing::debug!(args = ?args, "Starting decoder");
        let mut child = Command::new(ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ReelError::decode(format!("failed to spawn ffmpeg decoder: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ReelError::decode("failed to capture ffmpeg stdout"))?;
        let stderr_task = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut text = String::new();
                stderr.read_to_string(&mut text).ok();
                text
            })
        });

        Ok(Self {
            request,
            child: Some(child),
            stdout: Some(stdout),
            stderr_task,
            frames_read: 0,
        })
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Read the next frame, or `None` once the stream is exhausted.
    pub fn next_frame(&mut self) -> ReelResult<Option<RgbImage>> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let mut buf = vec![0u8; self.request.frame_len()];
        let mut filled = 0;
        while filled < buf.len() {
            let n = stdout.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            self.finish_stream()?;
            return Ok(None);
        }
        if filled < buf.len() {
            self.finish_stream()?;
            tracing::warn!(
                path = %self.request.path.display(),
                bytes = filled,
                "Decoder ended mid-frame; dropping partial frame"
            );
            return Ok(None);
        }

        self.frames_read += 1;
        RgbImage::from_raw(self.request.width, self.request.height, buf)
            .map(Some)
            .ok_or_else(|| ReelError::decode("decoded frame buffer has the wrong size"))
    }

    /// Reap the child after end of stream and surface a failed exit.
    fn finish_stream(&mut self) -> ReelResult<()> {
        self.stdout = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait()?;
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
        if self.frames_read == 0 {
            return Err(ReelError::decode(format!(
                "ffmpeg returned no video frames for '{}'",
                self.request.path.display()
            )));
        }
        Ok(())
    }

    /// Stop decoding and release the subprocess.
    pub fn close(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            child.kill().ok();
            child.wait().ok();
        }
        self.stderr_task = None;
    }
}

impl Iterator for VideoDecoder {
    type Item = ReelResult<RgbImage>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}

impl Drop for VideoDecoder {
    fn drop(&mut self) {
        self.close();
    }
}
