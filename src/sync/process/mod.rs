use std::sync::Arc;

use log::{error, info, warn};
use tokio::time;

use crate::{market::MarketState, util::AbortOnDropHandle};

use super::{
    config::{MarketSyncProcessConfig, SyncSettings},
    core::{LineSink, MarketJob},
    isolation::IsolatedContext,
    state::{Iteration, MarketReader, MarketStateManager, MarketSyncStatus, Reconciliation},
};

pub(crate) mod error;

use error::JobResult;

pub(super) struct MarketSyncProcess {
    config: MarketSyncProcessConfig,
    job: Arc<dyn MarketJob>,
    settings: Arc<SyncSettings>,
    sink: Arc<dyn LineSink>,
    state_manager: Arc<MarketStateManager>,
}

impl MarketSyncProcess {
    pub fn spawn(
        config: MarketSyncProcessConfig,
        job: Arc<dyn MarketJob>,
        settings: Arc<SyncSettings>,
        sink: Arc<dyn LineSink>,
        state_manager: Arc<MarketStateManager>,
    ) -> AbortOnDropHandle<()> {
        tokio::spawn(async move {
            let process = Self {
                config,
                job,
                settings,
                sink,
                state_manager,
            };

            process.run_loop().await
        })
        .into()
    }

    async fn run_loop(self) {
        self.state_manager.refresh_projection();

        let mut exit_status = MarketSyncStatus::Stopped;
        let mut number = 0;

        loop {
            number += 1;

            let Some(iteration) = self.state_manager.begin_iteration(number, &exit_status) else {
                let state = self.state_manager.state_snapshot();
                info!("Market {} sync loop ended: {exit_status}", state.name());
                return;
            };

            exit_status = self.run_iteration(iteration).await;
        }
    }

    /// Runs one job to completion and reconciles its outcome.
    ///
    /// Returns the status the loop should end with if the market is found inactive before the
    /// next iteration.
    async fn run_iteration(&self, iteration: Iteration) -> MarketSyncStatus {
        let Iteration {
            number,
            input,
            cancel,
        } = iteration;

        let name = input.name().to_string();

        info!(
            "{} download {} {} ({name}, iteration {number})",
            input.provider(),
            input.resolution(),
            input.from_date().format("%Y-%m-%d"),
        );

        let mut context = IsolatedContext::spawn(
            self.job.clone(),
            input,
            self.settings.clone(),
            self.sink.clone(),
            cancel.clone(),
        );

        let completed = tokio::select! {
            job_res = context.join() => Some(job_res),
            _ = cancel.requested() => None,
        };

        let job_res = match completed {
            Some(job_res) => job_res,
            None => self.await_cancelled(&name, &mut context).await,
        };

        drop(context);

        if cancel.is_requested() {
            warn!("Market {name} canceled by user");
            return MarketSyncStatus::Canceled;
        }

        let new_state = match job_res.and_then(|new_state| self.validate(new_state)) {
            Ok(new_state) => new_state,
            Err(e) => {
                error!("Market {name} sync failed, deactivating: {e}");
                self.state_manager.deactivate();
                return MarketSyncStatus::Failed(Arc::new(e));
            }
        };

        let summary = new_state.summary();

        match self.state_manager.reconcile(new_state, &cancel) {
            Reconciliation::Applied { generation } => {
                info!("Market {name} reconciled (generation {generation}): {summary}");
                MarketSyncStatus::Stopped
            }
            Reconciliation::Discarded => {
                warn!("Market {name} canceled by user, job output discarded");
                MarketSyncStatus::Canceled
            }
        }
    }

    /// Gives a cancelled job the grace period to exit, then tears its context down.
    async fn await_cancelled(
        &self,
        name: &str,
        context: &mut IsolatedContext,
    ) -> JobResult<MarketState> {
        let grace_period = self.config.cancel_grace_period();

        if !grace_period.is_zero() {
            if let Ok(job_res) = time::timeout(grace_period, context.join()).await {
                return job_res;
            }

            warn!(
                "Market {name} job did not exit within {}ms of cancellation, terminating",
                grace_period.as_millis()
            );
        }

        context.terminate();
        context.join().await
    }

    fn validate(&self, new_state: MarketState) -> JobResult<MarketState> {
        new_state.validate()?;
        self.state_manager
            .state_snapshot()
            .check_identity(&new_state)?;

        Ok(new_state)
    }
}
