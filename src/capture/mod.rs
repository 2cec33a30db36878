pub mod engine;
pub mod interact;
pub mod orchestrator;
pub mod types;

pub use engine::{ChromiumEngine, MockEngine, RenderContext, RenderEngine};
pub use interact::{run_steps, validate_script, validate_steps, InteractionStep};
pub use orchestrator::Orchestrator;
pub use types::{
    CaptureArtifact, CaptureError, CaptureOptions, CaptureRequest, CaptureResult, CaptureSource,
    DeviceProfile, EngineType, RenderProfile, ViewportSpec,
};
