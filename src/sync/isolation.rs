use std::{panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;

use crate::{market::MarketState, util::AbortOnDropHandle};

use super::{
    cancel::CancelToken,
    config::SyncSettings,
    core::{LineSink, MarketJob},
    process::error::{IsolationFault, JobResult, SyncJobError},
};

/// Fault-contained execution boundary for a single job run.
///
/// The job runs in its own tokio task behind a panic barrier. The boundary is created right
/// before a run and dropped right after it, never reused. Dropping it aborts the task.
pub(crate) struct IsolatedContext {
    handle: AbortOnDropHandle<JobResult<MarketState>>,
}

impl IsolatedContext {
    pub fn spawn(
        job: Arc<dyn MarketJob>,
        input: MarketState,
        settings: Arc<SyncSettings>,
        sink: Arc<dyn LineSink>,
        cancel: CancelToken,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let run = job.run(input, settings, sink, cancel);

            match AssertUnwindSafe(run).catch_unwind().await {
                Ok(run_res) => run_res.map_err(SyncJobError::from_job_error),
                Err(payload) => Err(IsolationFault::Panicked(payload.into()).into()),
            }
        })
        .into();

        Self { handle }
    }

    /// Forcibly tears down the boundary. No-op if the job already completed.
    pub fn terminate(&self) {
        self.handle.abort();
    }

    /// Waits for the job outcome.
    ///
    /// Resolves with [`IsolationFault::Terminated`] if the boundary was torn down first.
    pub async fn join(&mut self) -> JobResult<MarketState> {
        match (&mut self.handle).await {
            Ok(job_res) => job_res,
            Err(e) if e.is_panic() => Err(IsolationFault::Panicked(e.into_panic().into()).into()),
            Err(_) => Err(IsolationFault::Terminated.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::time;

    use crate::{error::Result, sync::cancel::CancelSignal};

    use super::*;

    enum Behavior {
        Echo,
        Panic,
        Fail,
        Crash,
        Sleep,
    }

    struct FakeJob(Behavior);

    #[async_trait]
    impl MarketJob for FakeJob {
        async fn run(
            &self,
            input: MarketState,
            _settings: Arc<SyncSettings>,
            sink: Arc<dyn LineSink>,
            _cancel: CancelToken,
        ) -> Result<MarketState> {
            sink.write_line("running");
            match self.0 {
                Behavior::Echo => Ok(input),
                Behavior::Panic => panic!("provider exploded"),
                Behavior::Fail => Err("provider returned 503".into()),
                Behavior::Crash => Err(IsolationFault::Crashed("exit code 3".into()).into()),
                Behavior::Sleep => {
                    time::sleep(Duration::from_secs(60)).await;
                    Ok(input)
                }
            }
        }
    }

    fn spawn(behavior: Behavior) -> IsolatedContext {
        let signal = CancelSignal::new();
        IsolatedContext::spawn(
            Arc::new(FakeJob(behavior)),
            MarketState::new("m", "p"),
            Arc::new(SyncSettings::default()),
            crate::sync::LineBuffer::new(10),
            signal.token(),
        )
    }

    #[tokio::test]
    async fn returns_job_output() {
        let mut context = spawn(Behavior::Echo);
        let state = context.join().await.expect("job succeeds");
        assert_eq!(state.name(), "m");
        assert!(context.handle.is_finished());
    }

    #[tokio::test]
    async fn panic_is_contained_as_isolation_fault() {
        let mut context = spawn(Behavior::Panic);
        let err = context.join().await.expect_err("job panics");

        match err {
            SyncJobError::Isolation(IsolationFault::Panicked(payload)) => {
                assert_eq!(payload.message(), "provider exploded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn plain_error_is_job_failure() {
        let mut context = spawn(Behavior::Fail);
        let err = context.join().await.expect_err("job fails");

        assert!(!err.is_isolation_fault());
        assert!(matches!(err, SyncJobError::JobFailed(msg) if msg == "provider returned 503"));
    }

    #[tokio::test]
    async fn reported_crash_is_isolation_fault() {
        let mut context = spawn(Behavior::Crash);
        let err = context.join().await.expect_err("job crashes");

        assert!(matches!(
            err,
            SyncJobError::Isolation(IsolationFault::Crashed(msg)) if msg == "exit code 3"
        ));
    }

    #[tokio::test]
    async fn terminate_tears_down_live_job() {
        let mut context = spawn(Behavior::Sleep);
        assert!(!context.handle.is_finished());

        context.terminate();

        let err = time::timeout(Duration::from_secs(5), context.join())
            .await
            .expect("join resolves after terminate")
            .expect_err("job terminated");
        assert!(matches!(
            err,
            SyncJobError::Isolation(IsolationFault::Terminated)
        ));
    }

    #[tokio::test]
    async fn terminate_after_completion_keeps_outcome() {
        let mut context = spawn(Behavior::Echo);

        while !context.handle.is_finished() {
            time::sleep(Duration::from_millis(1)).await;
        }
        context.terminate();

        assert!(context.join().await.is_ok());
    }
}
