//! The indexing orchestrator: owns a job from lock acquisition to terminal
//! evaluation.

mod handler;

pub use handler::{IndexHandler, SelectorLimits};
