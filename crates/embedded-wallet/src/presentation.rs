//! Hook for the host's presentation of the wallet surface.
//!
//! Calls that need the user (sign-in, signature prompts) must make the
//! embedded surface visible and focusable first, and put it back afterwards.
//! The bridge only knows "interaction required: yes/no". The host decides
//! what that means visually.

/// Restores the wallet surface when dropped. Runs its callback exactly once.
#[must_use = "the surface is restored as soon as the guard is dropped"]
pub struct Restore {
    callback: Option<Box<dyn FnOnce() + Send>>,
}

impl Restore {
    pub fn new(callback: impl FnOnce() + Send + 'static) -> Self {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    /// A guard with nothing to restore.
    pub fn noop() -> Self {
        Self { callback: None }
    }
}

impl Drop for Restore {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            callback();
        }
    }
}

impl std::fmt::Debug for Restore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Restore")
            .field("pending", &self.callback.is_some())
            .finish()
    }
}

/// Host-side controller for the wallet surface.
pub trait Presentation: Send + Sync {
    /// Prepare the surface for a call. The returned guard undoes it.
    fn prepare(&self, requires_interaction: bool) -> Restore;
}

/// Presentation for headless hosts: nothing to show or hide.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPresentation;

impl Presentation for NoPresentation {
    fn prepare(&self, _requires_interaction: bool) -> Restore {
        Restore::noop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_restore_runs_once_on_drop() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let guard = Restore::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(count.load(Ordering::SeqCst), 0);
        drop(guard);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_noop_restore() {
        drop(NoPresentation.prepare(true));
    }
}
