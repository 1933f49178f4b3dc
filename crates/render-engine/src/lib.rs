//! ReelForge Render Engine
//!
//! Turns a timeline snapshot into a vertical reel.
//!
//! # Pipeline Architecture
//!
//! ```text
//! timeline ──► EntryLoader ──► PreparedClip[] ──┬── preview ──► NN_preview.mp4 ──► concat ──► preview_fast.mp4
//!   (VFR → CFR, probe, clamp,                    │
//!    photo framing)                              └── final_render
//!                                                       │
//!                                              resize/center each clip
//!                                                       │
//!                                              fold through TransitionEngine
//!                                                       │
//!                                              encode frames ──► mux audio ──► output.mp4
//! ```

pub mod clip;
pub mod loader;
pub mod orchestrator;
pub mod pipeline;
pub mod transition;

pub use clip::{Clip, FrameStream, PreparedClip};
pub use loader::{AudioTrack, EntryLoader, LoadedTimeline};
pub use orchestrator::{
    ProgressCallback, RenderOrchestrator, RenderProgress, RenderStage, PREVIEW_FILE,
};
pub use pipeline::{create_reel, render_reel, ReelJob, RenderMode};
pub use transition::{TransitionEngine, TransitionLayout};
