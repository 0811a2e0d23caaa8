use std::{
    any::Any,
    fmt,
    future::Future,
    ops::{Deref, DerefMut},
    pin::Pin,
    task::{Context, Poll},
};

use tokio::task::{JoinError, JoinHandle};

/// A wrapper around `tokio::task::JoinHandle` that aborts the task when the wrapper is dropped.
///
/// Both the sync loop of a market and every isolated job run are held through this handle, so
/// dropping a controller tears down its loop, and tearing down a loop tears down the job it was
/// awaiting.
///
/// # Important Notes
///
/// - Aborting does **not** run the task to completion. The task is cancelled at its next `.await`
///   point, and everything it owns is dropped there.
/// - Implements `Deref`/`DerefMut` for access to `JoinHandle` methods such as `abort` and
///   `is_finished`.
/// - Implements `Future`, so `&mut handle` can be awaited more than once until it resolves.
///
/// # Examples
///
/// ```ignore
/// use crate::util::AbortOnDropHandle;
///
/// async fn example() {
///     let handle = AbortOnDropHandle::from(tokio::spawn(async {
///         // Long-running download...
///     }));
///
///     if !handle.is_finished() {
///         handle.abort();
///     }
/// } // Aborted here at the latest
/// ```
#[derive(Debug)]
pub(crate) struct AbortOnDropHandle<T>(JoinHandle<T>);

impl<T> From<JoinHandle<T>> for AbortOnDropHandle<T> {
    fn from(handle: JoinHandle<T>) -> Self {
        Self(handle)
    }
}

impl<T> Deref for AbortOnDropHandle<T> {
    type Target = JoinHandle<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for AbortOnDropHandle<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<T> Future for AbortOnDropHandle<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

impl<T> Drop for AbortOnDropHandle<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Message extracted from a panic that crossed an isolation boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicPayload(String);

impl PanicPayload {
    /// Returns the panic message.
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<Box<dyn Any + Send>> for PanicPayload {
    fn from(value: Box<dyn Any + Send>) -> Self {
        let panic_msg = if let Some(s) = value.downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = value.downcast_ref::<&str>() {
            s.to_string()
        } else {
            "unknown panic payload".to_string()
        };

        Self(panic_msg)
    }
}

impl fmt::Display for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time;

    use super::*;

    #[test]
    fn panic_payload_from_str_and_string() {
        let payload: PanicPayload = (Box::new("boom") as Box<dyn Any + Send>).into();
        assert_eq!(payload.message(), "boom");

        let payload: PanicPayload = (Box::new("bang".to_string()) as Box<dyn Any + Send>).into();
        assert_eq!(payload.to_string(), "bang");

        let payload: PanicPayload = (Box::new(42_u8) as Box<dyn Any + Send>).into();
        assert_eq!(payload.message(), "unknown panic payload");
    }

    #[tokio::test]
    async fn dropping_handle_aborts_task() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let handle = AbortOnDropHandle::from(tokio::spawn(async move {
            // `tx` is dropped when the task is aborted
            let _tx = tx;
            time::sleep(Duration::from_secs(60)).await;
        }));

        drop(handle);

        let res = time::timeout(Duration::from_secs(5), rx).await;
        assert!(matches!(res, Ok(Err(_))));
    }

    #[tokio::test]
    async fn handle_can_be_awaited_by_reference() {
        let mut handle = AbortOnDropHandle::from(tokio::spawn(async { 7 }));

        let value = (&mut handle).await.expect("task not aborted");
        assert_eq!(value, 7);
        assert!(handle.is_finished());
    }
}
