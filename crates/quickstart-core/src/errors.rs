use thiserror::Error;

use crate::lifecycle::LifecycleState;

#[derive(Debug, Error)]
pub enum QuickstartError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("engine creation failed: {0}")]
    EngineCreation(String),
    #[error("engine error: {0}")]
    Engine(String),
    #[error("lifecycle error: {0}")]
    Lifecycle(String),
    #[error("engine not active (state: {0:?})")]
    NotActive(LifecycleState),
}
