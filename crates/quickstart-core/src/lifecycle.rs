use crate::engine::{EngineConfig, EngineFactory, RtcEngine};
use crate::errors::QuickstartError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Active,
    Destroyed,
}

enum EngineSlot {
    Uninitialized,
    Active(Box<dyn RtcEngine>),
    Destroyed,
}

/// Sole owner of the engine handle.
///
/// The engine is created at most once and can only be reached while
/// `Active`. Teardown always stops the preview and leaves the channel
/// before destroying it.
pub struct EngineLifecycle {
    slot: EngineSlot,
}

impl EngineLifecycle {
    pub fn new() -> Self {
        Self {
            slot: EngineSlot::Uninitialized,
        }
    }

    pub fn state(&self) -> LifecycleState {
        match self.slot {
            EngineSlot::Uninitialized => LifecycleState::Uninitialized,
            EngineSlot::Active(_) => LifecycleState::Active,
            EngineSlot::Destroyed => LifecycleState::Destroyed,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.slot, EngineSlot::Active(_))
    }

    /// Create the engine and enable video.
    pub fn initialize(
        &mut self,
        factory: &dyn EngineFactory,
        config: EngineConfig,
    ) -> Result<(), QuickstartError> {
        match self.slot {
            EngineSlot::Uninitialized => {}
            EngineSlot::Active(_) => {
                return Err(QuickstartError::Lifecycle("engine already created".into()));
            }
            EngineSlot::Destroyed => {
                return Err(QuickstartError::Lifecycle("engine already destroyed".into()));
            }
        }

        let mut engine = factory.create(config).map_err(|e| {
            tracing::error!("engine creation failed: {e}");
            match e {
                QuickstartError::EngineCreation(msg) => QuickstartError::EngineCreation(msg),
                other => QuickstartError::EngineCreation(other.to_string()),
            }
        })?;

        if let Err(e) = engine.enable_video() {
            engine.destroy();
            return Err(QuickstartError::EngineCreation(format!("enable video: {e}")));
        }

        self.slot = EngineSlot::Active(engine);
        tracing::info!("engine created, video enabled");
        Ok(())
    }

    pub fn engine(&mut self) -> Result<&mut dyn RtcEngine, QuickstartError> {
        let state = self.state();
        match &mut self.slot {
            EngineSlot::Active(engine) => Ok(engine.as_mut()),
            _ => Err(QuickstartError::NotActive(state)),
        }
    }

    /// Stop preview, leave the channel, destroy. Safe to call in any state.
    pub fn teardown(&mut self) {
        match std::mem::replace(&mut self.slot, EngineSlot::Destroyed) {
            EngineSlot::Active(mut engine) => {
                if let Err(e) = engine.stop_preview() {
                    tracing::warn!("stop preview during teardown: {e}");
                }
                if let Err(e) = engine.leave_channel() {
                    tracing::warn!("leave channel during teardown: {e}");
                }
                engine.destroy();
                tracing::info!("engine destroyed");
            }
            EngineSlot::Uninitialized => {
                tracing::debug!("teardown before engine creation");
            }
            EngineSlot::Destroyed => {}
        }
    }
}

impl Default for EngineLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
