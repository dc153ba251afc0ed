//! Loading a captioner off the calling thread.

use crate::error::{CaptionError, Result};
use std::thread::{self, JoinHandle};
use tracing::debug;

/// A model load in progress on a background thread.
pub struct PendingLoad<T> {
    handle: JoinHandle<Result<T>>,
}

impl<T> PendingLoad<T> {
    /// True once the loader thread has finished (successfully or not).
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until loading completes and return the loaded model.
    pub fn wait(self) -> Result<T> {
        self.handle
            .join()
            .map_err(|_| CaptionError::ModelUnavailable("model loader thread panicked".into()))?
    }
}

/// Run `load` on a dedicated thread.
///
/// The model only becomes reachable through [`PendingLoad::wait`], so no
/// caption request can observe a partially loaded model.
pub fn spawn_load<T, F>(load: F) -> Result<PendingLoad<T>>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let handle = thread::Builder::new()
        .name("caption-model-load".into())
        .spawn(move || {
            debug!("loading caption model in background");
            load()
        })?;
    Ok(PendingLoad { handle })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_loaded_value() {
        let pending = spawn_load(|| Ok(42u32)).unwrap();
        assert_eq!(pending.wait().unwrap(), 42);
    }

    #[test]
    fn load_error_surfaces_on_wait() {
        let pending = spawn_load::<u32, _>(|| {
            Err(CaptionError::Configuration("config.json missing".into()))
        })
        .unwrap();
        assert!(matches!(pending.wait(), Err(CaptionError::Configuration(_))));
    }

    #[test]
    fn panic_becomes_model_unavailable() {
        let pending = spawn_load::<u32, _>(|| panic!("corrupt weights")).unwrap();
        assert!(matches!(pending.wait(), Err(CaptionError::ModelUnavailable(_))));
    }
}
