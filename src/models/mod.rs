//! Model management module.
//!
//! Artifact store, the live inference handle, and the lifecycle manager
//! that keeps at most one handle loaded.

mod error;
mod handle;
mod lifecycle;
mod name;
mod store;

pub use error::ModelError;
pub use handle::InferenceHandle;
pub use lifecycle::{
    Completion, LifecycleManager, LifecycleState, LoadReport, ManagerConfig, ManagerStatus,
};
pub use name::{ModelName, MAX_NAME_LEN};
pub use store::{is_model_file, ArtifactStore, RECOGNIZED_EXTENSIONS};
