//! ReelForge Media
//!
//! Everything that talks to the external `ffmpeg`/`ffprobe` binaries:
//! - **runner:** blocking subprocess calls behind the [`ToolRunner`] trait
//! - **codec:** hardware/software encoder selection
//! - **probe:** frame-rate variability and stream info
//! - **framerate:** VFR to CFR normalization with a per-render cache
//! - **concat:** parallel stream-copy trims joined by the concat demuxer
//! - **decode / encode:** raw rgb24 frame pipes
//! - **mux:** attaching external or mixed clip audio

pub mod codec;
pub mod concat;
pub mod decode;
pub mod encode;
pub mod framerate;
pub mod mux;
pub mod pool;
pub mod probe;
pub mod runner;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use codec::{preferred_codec, RenderQuality, VideoCodec};
pub use concat::SegmentConcatenator;
pub use decode::{DecodeRequest, VideoDecoder};
pub use encode::{EncodeSettings, FfmpegEncoder};
pub use framerate::FrameRateNormalizer;
pub use mux::{AudioMuxer, AudioPlan, AudioSpan};
pub use probe::{probe_media, FrameRateCheck, MediaInfo};
pub use runner::{command_exists, Invocation, ProcessRunner, Tool, ToolOutput, ToolRunner};
