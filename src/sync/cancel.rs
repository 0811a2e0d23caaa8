use std::future;

use tokio::sync::watch;

/// Controller side of the cancellation flag of a single loop iteration.
///
/// The flag moves from unset to requested at most once. A new signal is created for every
/// iteration, so a request made during one iteration can never be observed by the next.
#[derive(Debug)]
pub(crate) struct CancelSignal {
    tx: watch::Sender<bool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Returns a token observing this signal.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }

    /// Marks the signal as requested.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn request(&self) -> bool {
        self.tx.send_if_modified(|requested| {
            if *requested {
                false
            } else {
                *requested = true;
                true
            }
        })
    }
}

/// Job side of a cancellation signal.
///
/// Jobs should check [`is_requested`](Self::is_requested) between units of work, or race their
/// I/O against [`requested`](Self::requested), and return promptly once cancellation was
/// requested. A job that does not is terminated by the controller after the configured grace
/// period.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Returns `true` if cancellation of the current iteration was requested.
    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested.
    ///
    /// If the iteration ends without a request, the returned future never resolves.
    pub async fn requested(&self) {
        let mut rx = self.rx.clone();
        let closed = rx.wait_for(|requested| *requested).await.is_err();
        if closed {
            future::pending::<()>().await;
        }
    }
}
