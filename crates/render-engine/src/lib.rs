//! Smear Render Engine
//!
//! Turns a resolved settings snapshot and an input video into a finished
//! output file by orchestrating two external processes connected by a pipe:
//! a frame-generation producer and an encoding consumer. Provides the
//! render queue, progress monitoring, pause/resume/cancel, preview renders,
//! and the temp-directory lifecycle.

pub mod command;
pub mod context;
pub mod pause;
pub mod pipeline;
pub mod preview;
pub mod probe;
pub mod progress;
pub mod queue;
pub mod render;

pub use context::{EngineContext, ShutdownToken};
pub use pipeline::{RenderOutcome, RenderPipeline, RenderStatus};
pub use preview::PreviewRender;
pub use probe::VideoInfo;
pub use queue::RenderQueue;
pub use render::Render;
