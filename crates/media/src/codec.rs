//! Encoder selection: NVENC when both the encoder and a GPU are present,
//! libx264 otherwise.

use std::fmt;

use crate::runner::{Invocation, Tool, ToolRunner};

/// Hardware encoder names that indicate NVENC support in `ffmpeg -encoders`.
const NVENC_ENCODERS: [&str; 2] = ["h264_nvenc", "hevc_nvenc"];

/// The only encoder choice the pipeline makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoCodec {
    H264Nvenc,
    Libx264,
}

/// Speed/quality trade-off of an encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderQuality {
    Preview,
    Final,
}

impl VideoCodec {
    /// ffmpeg encoder name.
    pub fn ffmpeg_name(self) -> &'static str {
        match self {
            Self::H264Nvenc => "h264_nvenc",
            Self::Libx264 => "libx264",
        }
    }

    pub fn preset(self, quality: RenderQuality) -> &'static str {
        match (self, quality) {
            (Self::Libx264, RenderQuality::Preview) => "ultrafast",
            (Self::Libx264, RenderQuality::Final) => "medium",
            (Self::H264Nvenc, RenderQuality::Preview) => "p1",
            (Self::H264Nvenc, RenderQuality::Final) => "p5",
        }
    }

    /// Output-side video encoding arguments.
    pub fn encode_args(self, quality: RenderQuality) -> Vec<String> {
        vec![
            "-c:v".into(),
            self.ffmpeg_name().into(),
            "-preset".into(),
            self.preset(quality).into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
        ]
    }

    pub fn is_hardware(self) -> bool {
        matches!(self, Self::H264Nvenc)
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ffmpeg_name())
    }
}

/// Probe for hardware encoding support.
///
/// Both `ffmpeg -encoders` must list an NVENC encoder and `nvidia-smi` must
/// run successfully. Any probe failure means "not available".
pub fn preferred_codec(runner: &dyn ToolRunner) -> VideoCodec {
    let encoder_listed = match runner.run(&Invocation::ffmpeg(["-hide_banner", "-encoders"])) {
        Ok(output) if output.success => NVENC_ENCODERS
            .iter()
            .any(|name| output.stdout.contains(name)),
        Ok(output) => {
            tracing::warn!(status = %output.status, "ffmpeg -encoders failed");
            false
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not query ffmpeg encoders");
            false
        }
    };

    let gpu_present = match runner.run(&Invocation::new(
        Tool::Program("nvidia-smi".to_string()),
        Vec::<String>::new(),
    )) {
        Ok(output) => output.success,
        Err(e) => {
            tracing::info!(error = %e, "nvidia-smi not available");
            false
        }
    };

    let codec = if encoder_listed && gpu_present {
        VideoCodec::H264Nvenc
    } else {
        VideoCodec::Libx264
    };
    tracing::info!(
        codec = codec.ffmpeg_name(),
        encoder_listed,
        gpu_present,
        "Selected video codec"
    );
    codec
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ToolOutput;
    use crate::testing::ScriptedRunner;
    use reelforge_common::error::ReelError;

    fn runner(encoders: &'static str, gpu: bool) -> ScriptedRunner {
        ScriptedRunner::new(move |inv| match &inv.tool {
            Tool::Ffmpeg => Ok(ToolOutput::ok(encoders)),
            Tool::Program(_) if gpu => Ok(ToolOutput::ok("GPU 0")),
            Tool::Program(name) => Err(ReelError::ToolMissing { tool: name.clone() }),
            Tool::Ffprobe => unreachable!(),
        })
    }

    #[test]
    fn test_nvenc_requires_encoder_and_gpu() {
        let listing = " V....D h264_nvenc NVIDIA NVENC H.264 encoder";
        assert_eq!(preferred_codec(&runner(listing, true)), VideoCodec::H264Nvenc);
        assert_eq!(preferred_codec(&runner(listing, false)), VideoCodec::Libx264);
        assert_eq!(
            preferred_codec(&runner(" V....D libx264", true)),
            VideoCodec::Libx264
        );
    }

    #[test]
    fn test_hevc_listing_counts_as_nvenc() {
        let listing = " V....D hevc_nvenc NVIDIA NVENC hevc encoder";
        assert_eq!(preferred_codec(&runner(listing, true)), VideoCodec::H264Nvenc);
    }

    #[test]
    fn test_ffmpeg_failure_falls_back_to_software() {
        let failing = ScriptedRunner::new(|inv| match inv.tool {
            Tool::Ffmpeg => Ok(ToolOutput::failed("exit status: 1", "boom")),
            _ => Ok(ToolOutput::ok("")),
        });
        assert_eq!(preferred_codec(&failing), VideoCodec::Libx264);
    }

    #[test]
    fn test_presets_per_quality() {
        assert_eq!(VideoCodec::Libx264.preset(RenderQuality::Preview), "ultrafast");
        assert_eq!(VideoCodec::Libx264.preset(RenderQuality::Final), "medium");
        assert_eq!(VideoCodec::H264Nvenc.preset(RenderQuality::Final), "p5");
        let args = VideoCodec::H264Nvenc.encode_args(RenderQuality::Preview);
        assert_eq!(args[..4], ["-c:v", "h264_nvenc", "-preset", "p1"]);
    }
}
