//! # Cooperative Cancellation
//!
//! A clonable token over a tokio watch channel. Workers check it at
//! stage boundaries and between section extractions; in-flight external
//! calls finish under their own timeouts. Cancellation never tears a
//! transaction — callers observe the flag and return cleanly.

use tokio::sync::watch;

/// Clonable cancellation token.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

/// The cancelling side. Dropping the handle does NOT cancel.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelToken {
    /// Create a token and its cancelling handle.
    pub fn new() -> (CancelHandle, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelToken { rx })
    }

    /// A token that can never be cancelled; for tests and one-shot runs.
    pub fn never() -> CancelToken {
        let (_tx, rx) = watch::channel(false);
        CancelToken { rx }
    }

    /// Whether cancellation has been signalled.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve when cancellation is signalled.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            // A closed channel without a true value means the handle
            // dropped without cancelling: wait forever.
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl CancelHandle {
    /// Signal every token.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_uncancelled() {
        let (_handle, token) = CancelToken::new();
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_reaches_all_clones() {
        let (handle, token) = CancelToken::new();
        let clone = token.clone();
        handle.cancel();
        assert!(token.is_cancelled());
        assert!(clone.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_future_resolves() {
        let (handle, token) = CancelToken::new();
        let waiter = tokio::spawn(async move { token.cancelled().await });
        handle.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("cancelled() must resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn never_token_stays_uncancelled() {
        let token = CancelToken::never();
        assert!(!token.is_cancelled());
    }
}
