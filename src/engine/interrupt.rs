// src/engine/interrupt.rs

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;
use tracing::warn;

/// Intercepts Ctrl-C for the length of a build.
///
/// The interrupt is logged and remembered, but a running step is left to
/// finish. The session checks [`interrupted`](Self::interrupted) after each
/// step and before starting the next task, so an interrupt that lands between
/// steps stops the build as well.
///
/// Once installed, the handler stays registered for the rest of the process:
/// dropping the guard stops listening but does not restore the default
/// action. The build returns [`TycheError::Interrupted`] instead, and the
/// caller exits.
///
/// [`TycheError::Interrupted`]: crate::errors::TycheError::Interrupted
pub struct InterruptGuard {
    interrupted: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl InterruptGuard {
    /// Start listening. The handler is registered before this returns.
    pub fn install(target: &str) -> io::Result<Self> {
        let mut listener = Listener::register()?;
        let interrupted = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&interrupted);
        let target = target.to_string();

        let handle = tokio::spawn(async move {
            while listener.recv().await {
                warn!(task = %target, "interrupt received, waiting for the current step to end");
                flag.store(true, Ordering::SeqCst);
            }
        });

        Ok(Self {
            interrupted,
            handle,
        })
    }

    pub fn interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(unix)]
struct Listener(tokio::signal::unix::Signal);

#[cfg(unix)]
impl Listener {
    fn register() -> io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};
        Ok(Self(signal(SignalKind::interrupt())?))
    }

    async fn recv(&mut self) -> bool {
        self.0.recv().await.is_some()
    }
}

#[cfg(not(unix))]
struct Listener;

#[cfg(not(unix))]
impl Listener {
    fn register() -> io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> bool {
        match tokio::signal::ctrl_c().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "failed to listen for Ctrl+C");
                false
            }
        }
    }
}
