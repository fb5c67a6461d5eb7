use super::error::BuildError;
use std::future::Future;
use tokio::sync::watch;

/// Cancellation signal for a build request
///
/// Wraps the receiving half of a `watch` channel; sending `true` on the paired
/// sender cancels. A dropped sender never cancels.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    rx: Option<watch::Receiver<bool>>,
}

impl Cancellation {
    /// A signal that never fires
    pub fn none() -> Self {
        Self { rx: None }
    }

    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx: Some(rx) }
    }

    /// Create a sender and its linked cancellation
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self::new(rx))
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Return `Err(Cancelled)` if the signal has fired
    pub fn check(&self) -> Result<(), BuildError> {
        if self.is_cancelled() {
            Err(BuildError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Race `future` against the signal
    pub async fn run<F>(&self, future: F) -> Result<F::Output, BuildError>
    where
        F: Future,
    {
        self.check()?;

        let Some(rx) = &self.rx else {
            return Ok(future.await);
        };

        let mut rx = rx.clone();
        tokio::select! {
            output = future => Ok(output),
            _ = wait_for_cancel(&mut rx) => {
                tracing::warn!("Build request cancelled while waiting on catalog");
                Err(BuildError::Cancelled)
            }
        }
    }
}

async fn wait_for_cancel(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender dropped without cancelling
            std::future::pending::<()>().await;
        }
    }
}
