//! Startup / shutdown hooks for long-lived services.
//!
//! Services register hooks during construction; the owning binary calls
//! [`Lifecycle::startup`] once everything is wired and [`Lifecycle::shutdown`]
//! before exiting. Each hook runs at most once.

use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::error::CoreError;

type Hook = Box<dyn FnOnce() -> Result<(), String> + Send>;

#[derive(Default)]
struct Hooks {
    startup: Vec<(String, Hook)>,
    before_shutdown: Vec<(String, Hook)>,
    shut_down: bool,
}

/// Registry of named startup and before-shutdown hooks.
#[derive(Default)]
pub struct Lifecycle {
    hooks: Mutex<Hooks>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Hooks> {
        self.hooks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_startup_hook<F>(&self, name: impl Into<String>, hook: F)
    where
        F: FnOnce() -> Result<(), String> + Send + 'static,
    {
        self.lock().startup.push((name.into(), Box::new(hook)));
    }

    pub fn add_before_shutdown_hook<F>(&self, name: impl Into<String>, hook: F)
    where
        F: FnOnce() -> Result<(), String> + Send + 'static,
    {
        self.lock().before_shutdown.push((name.into(), Box::new(hook)));
    }

    /// Run all startup hooks in registration order, stopping at the first failure.
    pub fn startup(&self) -> Result<(), CoreError> {
        let hooks = std::mem::take(&mut self.lock().startup);
        for (name, hook) in hooks {
            debug!(hook = %name, "running startup hook");
            hook().map_err(|message| CoreError::Hook { name, message })?;
        }
        Ok(())
    }

    /// Run all before-shutdown hooks in registration order.
    ///
    /// Every hook runs even if an earlier one fails; the first failure is
    /// returned. Calling this twice is a no-op the second time.
    pub fn shutdown(&self) -> Result<(), CoreError> {
        let hooks = {
            let mut guard = self.lock();
            if guard.shut_down {
                return Ok(());
            }
            guard.shut_down = true;
            std::mem::take(&mut guard.before_shutdown)
        };

        let mut first_error = None;
        for (name, hook) in hooks {
            debug!(hook = %name, "running shutdown hook");
            if let Err(message) = hook() {
                warn!(hook = %name, error = %message, "shutdown hook failed");
                if first_error.is_none() {
                    first_error = Some(CoreError::Hook { name, message });
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.lock().shut_down
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn startup_hooks_run_in_order() {
        let lifecycle = Lifecycle::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            lifecycle.add_startup_hook(format!("hook-{i}"), move || {
                order.lock().unwrap().push(i);
                Ok(())
            });
        }
        lifecycle.startup().unwrap();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn shutdown_runs_every_hook_and_reports_first_failure() {
        let lifecycle = Lifecycle::new();
        let ran = Arc::new(AtomicUsize::new(0));

        let r = ran.clone();
        lifecycle.add_before_shutdown_hook("failing", move || {
            r.fetch_add(1, Ordering::SeqCst);
            Err("boom".to_string())
        });
        let r = ran.clone();
        lifecycle.add_before_shutdown_hook("ok", move || {
            r.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let err = lifecycle.shutdown().unwrap_err();
        assert_eq!(ran.load(Ordering::SeqCst), 2);
        match err {
            CoreError::Hook { name, message } => {
                assert_eq!(name, "failing");
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn shutdown_is_idempotent() {
        let lifecycle = Lifecycle::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        lifecycle.add_before_shutdown_hook("once", move || {
            r.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        lifecycle.shutdown().unwrap();
        lifecycle.shutdown().unwrap();
        assert!(lifecycle.is_shut_down());
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
