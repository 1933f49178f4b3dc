//! Scripted [`ToolRunner`] for exercising subprocess-facing code without
//! ffmpeg installed.

use std::sync::{Arc, Mutex};

use reelforge_common::error::ReelResult;

use crate::runner::{Invocation, Tool, ToolOutput, ToolRunner};

type Responder = dyn Fn(&Invocation) -> ReelResult<ToolOutput> + Send + Sync;

/// Records every invocation and answers with a caller-supplied responder.
///
/// The default responder mimics a successful ffmpeg: it creates an empty
/// file at the invocation's output path and exits 0.
#[derive(Clone)]
pub struct ScriptedRunner {
    calls: Arc<Mutex<Vec<Invocation>>>,
    responder: Arc<Responder>,
}

impl Default for ScriptedRunner {
    fn default() -> Self {
        Self::new(|inv| Ok(touch_output(inv)))
    }
}

impl ScriptedRunner {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&Invocation) -> ReelResult<ToolOutput> + Send + Sync + 'static,
    {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            responder: Arc::new(responder),
        }
    }

    /// Snapshot of every invocation so far, in call order.
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of invocations whose arguments contain `needle`.
    pub fn count_with_arg(&self, needle: &str) -> usize {
        self.calls()
            .iter()
            .filter(|inv| inv.args.iter().any(|a| a == needle))
            .count()
    }

    pub fn count_for(&self, tool: &Tool) -> usize {
        self.calls().iter().filter(|inv| &inv.tool == tool).count()
    }
}

impl ToolRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation) -> ReelResult<ToolOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(invocation.clone());
        }
        (self.responder)(invocation)
    }
}

/// Create an empty file at the invocation's output path (ffmpeg calls only)
/// and report success.
pub fn touch_output(invocation: &Invocation) -> ToolOutput {
    if invocation.tool == Tool::Ffmpeg {
        if let Some(out) = invocation.output_path() {
            if out != "-" && !out.starts_with("pipe:") {
                std::fs::write(out, b"").ok();
            }
        }
    }
    ToolOutput::ok("")
}
