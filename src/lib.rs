// lib.rs - Script-to-video scene production pipeline
pub mod assets;
pub mod config;
pub mod continuity;
pub mod error;
pub mod fetch;
pub mod gemini_client;
pub mod orchestrator;
pub mod parser;
pub mod progress;
pub mod scene;
pub mod services;
pub mod synthesis;

// Re-export the types a caller needs to drive a run and observe it
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use orchestrator::{ProductionOrchestrator, RunInfo, RunStatus};
pub use progress::{EventRole, ProgressEvent, Severity};
pub use scene::{ContinuationHandle, ImagePayload, Scene, SceneStatus};
