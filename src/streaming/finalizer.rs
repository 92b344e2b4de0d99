//! Exactly-once terminal hooks for a generation stream.
//!
//! A request has two mutually exclusive endings: `on_finish` after a normal
//! completion and `on_error` after any failure. The finalizer holds both and
//! releases exactly one. When it is dropped while still armed (the task was
//! aborted or the runtime cancelled the request), `on_error` runs with
//! `GatewayError::Cancelled` on the current runtime.

use std::future::Future;
use std::sync::Mutex;

use futures::future::BoxFuture;

use crate::error::GatewayError;
use crate::orchestrator::GenerationSummary;

type FinishHook = Box<dyn FnOnce(GenerationSummary) -> BoxFuture<'static, ()> + Send>;
type ErrorHook = Box<dyn FnOnce(GatewayError) -> BoxFuture<'static, ()> + Send>;

#[derive(Default)]
struct Hooks {
    on_finish: Option<FinishHook>,
    on_error: Option<ErrorHook>,
}

/// One-shot guard around the terminal callbacks.
pub struct StreamFinalizer {
    hooks: Mutex<Option<Hooks>>,
}

impl Default for StreamFinalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StreamFinalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamFinalizer")
            .field("armed", &self.is_armed())
            .finish()
    }
}

impl StreamFinalizer {
    /// Create an armed finalizer with no callbacks.
    pub fn new() -> Self {
        Self {
            hooks: Mutex::new(Some(Hooks::default())),
        }
    }

    /// Register the normal-completion callback.
    pub fn on_finish<F, Fut>(mut self, f: F) -> Self
    where
        F: FnOnce(GenerationSummary) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if let Some(hooks) = self.hooks_mut() {
            hooks.on_finish = Some(Box::new(move |summary| Box::pin(f(summary))));
        }
        self
    }

    /// Register the failure callback. It must not fail: log and return.
    pub fn on_error<F, Fut>(mut self, f: F) -> Self
    where
        F: FnOnce(GatewayError) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if let Some(hooks) = self.hooks_mut() {
            hooks.on_error = Some(Box::new(move |error| Box::pin(f(error))));
        }
        self
    }

    /// Whether no terminal callback has been released yet.
    pub fn is_armed(&self) -> bool {
        match self.hooks.lock() {
            Ok(guard) => guard.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        }
    }

    /// Release `on_finish`. Returns `false` if a terminal callback already ran.
    pub async fn finish(&self, summary: GenerationSummary) -> bool {
        let Some(hooks) = self.disarm() else {
            return false;
        };
        if let Some(on_finish) = hooks.on_finish {
            on_finish(summary).await;
        }
        true
    }

    /// Release `on_error`. Returns `false` if a terminal callback already ran.
    pub async fn fail(&self, error: GatewayError) -> bool {
        let Some(hooks) = self.disarm() else {
            return false;
        };
        if let Some(on_error) = hooks.on_error {
            on_error(error).await;
        }
        true
    }

    fn disarm(&self) -> Option<Hooks> {
        match self.hooks.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    fn hooks_mut(&mut self) -> Option<&mut Hooks> {
        match self.hooks.get_mut() {
            Ok(hooks) => hooks.as_mut(),
            Err(poisoned) => poisoned.into_inner().as_mut(),
        }
    }
}

impl Drop for StreamFinalizer {
    fn drop(&mut self) {
        let hooks = match self.hooks.get_mut() {
            Ok(hooks) => hooks.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(Hooks {
            on_error: Some(on_error),
            ..
        }) = hooks
        else {
            return;
        };

        let error = GatewayError::Cancelled("generation dropped before completion".to_string());
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(on_error(error));
            }
            Err(_) => {
                tracing::warn!("finalizer dropped outside a runtime; cleanup hook skipped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting() -> (StreamFinalizer, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let finished = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));
        let f1 = finished.clone();
        let f2 = failed.clone();
        let finalizer = StreamFinalizer::new()
            .on_finish(move |_| async move {
                f1.fetch_add(1, Ordering::SeqCst);
            })
            .on_error(move |_| async move {
                f2.fetch_add(1, Ordering::SeqCst);
            });
        (finalizer, finished, failed)
    }

    #[tokio::test]
    async fn only_the_first_terminal_call_fires() {
        let (finalizer, finished, failed) = counting();
        assert!(finalizer.is_armed());
        assert!(finalizer.finish(GenerationSummary::default()).await);
        assert!(!finalizer.fail(GatewayError::StreamError("late".into())).await);
        assert!(!finalizer.finish(GenerationSummary::default()).await);
        assert!(!finalizer.is_armed());
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert_eq!(failed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dropping_an_armed_finalizer_runs_on_error() {
        let (finalizer, finished, failed) = counting();
        drop(finalizer);
        for _ in 0..50 {
            if failed.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(failed.load(Ordering::SeqCst), 1);
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dropping_a_fired_finalizer_is_silent() {
        let (finalizer, _finished, failed) = counting();
        finalizer.fail(GatewayError::StreamError("x".into())).await;
        drop(finalizer);
        tokio::task::yield_now().await;
        assert_eq!(failed.load(Ordering::SeqCst), 1);
    }
}
