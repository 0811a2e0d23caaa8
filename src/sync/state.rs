use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use tokio::sync::broadcast;

use crate::market::{MarketState, error::Result as MarketResult};

use super::{
    cancel::{CancelSignal, CancelToken},
    error::{MarketSyncError, Result},
    process::error::SyncJobError,
    projection::MarketProjection,
};

/// Status of a market's sync loop.
#[derive(Debug, Clone)]
pub enum MarketSyncStatus {
    /// The loop was never started.
    NotInitiated,
    /// The loop was spawned and has not started its first iteration yet.
    Starting,
    /// The loop is running the given iteration (1-based, per loop run).
    Running { iteration: u64 },
    /// The loop ended because the market became inactive between iterations, or because the
    /// job returned an inactive market.
    Stopped,
    /// The loop ended because the in-flight iteration was cancelled. Its output, if any, was
    /// discarded.
    Canceled,
    /// The loop ended because the last iteration failed. The market was deactivated.
    Failed(Arc<SyncJobError>),
}

impl MarketSyncStatus {
    /// Returns `true` if no loop is running.
    pub fn is_stopped(&self) -> bool {
        matches!(
            self,
            Self::NotInitiated | Self::Stopped | Self::Canceled | Self::Failed(_)
        )
    }
}

impl fmt::Display for MarketSyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitiated => write!(f, "Not initiated"),
            Self::Starting => write!(f, "Starting"),
            Self::Running { iteration } => write!(f, "Running (iteration {iteration})"),
            Self::Stopped => write!(f, "Stopped"),
            Self::Canceled => write!(f, "Canceled"),
            Self::Failed(error) => write!(f, "Failed: {error}"),
        }
    }
}

/// Change notifications emitted for a market.
#[derive(Debug, Clone)]
pub enum MarketUpdate {
    /// The sync loop status changed.
    Status(MarketSyncStatus),
    /// The market was activated or deactivated.
    Active(bool),
    /// A job result replaced the market state.
    Reconciled {
        generation: u64,
        state: Arc<MarketState>,
    },
    /// The market state was edited while the loop was idle.
    Edited(Arc<MarketState>),
}

impl From<MarketSyncStatus> for MarketUpdate {
    fn from(value: MarketSyncStatus) -> Self {
        Self::Status(value)
    }
}

pub(crate) type MarketTransmitter = broadcast::Sender<MarketUpdate>;

/// Receiver for subscribing to [`MarketUpdate`]s.
pub type MarketReceiver = broadcast::Receiver<MarketUpdate>;

/// Trait for observing a market without being able to control its sync loop.
pub trait MarketReader: Send + Sync + 'static {
    /// Creates a new [`MarketReceiver`] for subscribing to market updates.
    fn update_receiver(&self) -> MarketReceiver;

    /// Returns the current market state.
    fn state_snapshot(&self) -> Arc<MarketState>;

    /// Returns the projection of the current market state.
    fn projection_snapshot(&self) -> Arc<MarketProjection>;

    /// Returns the current [`MarketSyncStatus`].
    fn status_snapshot(&self) -> MarketSyncStatus;

    /// Returns the number of job results reconciled so far.
    fn generation(&self) -> u64;
}

pub(crate) struct Iteration {
    pub number: u64,
    pub input: MarketState,
    pub cancel: CancelToken,
}

pub(crate) enum Reconciliation {
    Applied { generation: u64 },
    Discarded,
}

struct MarketCell {
    state: Arc<MarketState>,
    projection: Arc<MarketProjection>,
    generation: u64,
    status: MarketSyncStatus,
    running: bool,
    cancel: Option<CancelSignal>,
}

/// Single owner of a market's shared state.
///
/// Every transition (activation, cancellation, reconciliation, loop exit, idle edit) happens under
/// one lock, so a stop request and a reconciliation can never interleave. Updates are sent while
/// holding the lock, which keeps their order consistent with the order of the transitions.
pub(crate) struct MarketStateManager {
    cell: Mutex<MarketCell>,
    update_tx: MarketTransmitter,
}

impl MarketStateManager {
    pub fn new(state: MarketState, update_tx: MarketTransmitter) -> Arc<Self> {
        let projection = Arc::new(MarketProjection::from_state(&state));
        let cell = Mutex::new(MarketCell {
            state: Arc::new(state),
            projection,
            generation: 0,
            status: MarketSyncStatus::NotInitiated,
            running: false,
            cancel: None,
        });

        Arc::new(Self { cell, update_tx })
    }

    fn lock_cell(&self) -> MutexGuard<'_, MarketCell> {
        self.cell
            .lock()
            .expect("`MarketStateManager` mutex can't be poisoned")
    }

    fn send(&self, update: MarketUpdate) {
        // Ignore no-receivers errors
        let _ = self.update_tx.send(update);
    }

    fn set_status(&self, cell: &mut MarketCell, status: MarketSyncStatus) {
        cell.status = status.clone();
        self.send(status.into());
    }

    fn set_active(&self, cell: &mut MarketCell, active: bool) {
        if cell.state.active() != active {
            Arc::make_mut(&mut cell.state).set_active(active);
            self.send(MarketUpdate::Active(active));
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_cell().running
    }

    /// Activates the market. Returns `true` if the caller must spawn a new loop.
    pub fn activate(&self) -> bool {
        let mut cell = self.lock_cell();
        self.set_active(&mut cell, true);

        if cell.running {
            return false;
        }

        cell.running = true;
        self.set_status(&mut cell, MarketSyncStatus::Starting);
        true
    }

    /// Requests cancellation of the in-flight iteration, if any, and deactivates the market.
    ///
    /// Returns `true` if an in-flight iteration was asked to cancel by this call.
    pub fn deactivate(&self) -> bool {
        let mut cell = self.lock_cell();

        let canceled = cell
            .cancel
            .as_ref()
            .is_some_and(|cancel| cancel.request());

        self.set_active(&mut cell, false);
        canceled
    }

    /// Starts iteration `number` if the market is still active.
    ///
    /// Otherwise marks the loop as ended with `exit_status` and returns `None`.
    pub fn begin_iteration(
        &self,
        number: u64,
        exit_status: &MarketSyncStatus,
    ) -> Option<Iteration> {
        let mut cell = self.lock_cell();

        if !cell.state.active() {
            cell.running = false;
            cell.cancel = None;
            self.set_status(&mut cell, exit_status.clone());
            return None;
        }

        let cancel = CancelSignal::new();
        let token = cancel.token();
        cell.cancel = Some(cancel);

        self.set_status(&mut cell, MarketSyncStatus::Running { iteration: number });

        Some(Iteration {
            number,
            input: (*cell.state).clone(),
            cancel: token,
        })
    }

    /// Replaces the market state with a job result, unless cancellation of the iteration was
    /// requested.
    pub fn reconcile(&self, new_state: MarketState, cancel: &CancelToken) -> Reconciliation {
        let projection = Arc::new(MarketProjection::from_state(&new_state));
        let new_state = Arc::new(new_state);

        let mut cell = self.lock_cell();

        if cancel.is_requested() {
            return Reconciliation::Discarded;
        }

        // The iteration is over, nothing is left to cancel
        cell.cancel = None;

        let was_active = cell.state.active();

        cell.state = new_state.clone();
        cell.projection = projection;
        cell.generation += 1;

        let generation = cell.generation;
        let now_active = new_state.active();

        self.send(MarketUpdate::Reconciled {
            generation,
            state: new_state,
        });

        if was_active != now_active {
            self.send(MarketUpdate::Active(now_active));
        }

        Reconciliation::Applied { generation }
    }

    /// Rebuilds the projection from the current state.
    pub fn refresh_projection(&self) {
        let mut cell = self.lock_cell();
        cell.projection = Arc::new(MarketProjection::from_state(&cell.state));
    }

    /// Applies `edit` to a copy of the state and publishes it, if the loop is not running.
    pub fn edit<T>(&self, edit: impl FnOnce(&mut MarketState) -> MarketResult<T>) -> Result<T> {
        let mut cell = self.lock_cell();

        if cell.running {
            return Err(MarketSyncError::MarketRunning);
        }

        let mut next = (*cell.state).clone();
        let output = edit(&mut next)?;

        let next = Arc::new(next);
        cell.projection = Arc::new(MarketProjection::from_state(&next));
        cell.state = next.clone();

        self.send(MarketUpdate::Edited(next));
        Ok(output)
    }

    /// Marks the loop as ended after its task was aborted.
    pub fn force_stop(&self) {
        let mut cell = self.lock_cell();

        if let Some(cancel) = cell.cancel.take() {
            cancel.request();
        }
        self.set_active(&mut cell, false);

        if cell.running {
            cell.running = false;
            self.set_status(&mut cell, MarketSyncStatus::Canceled);
        }
    }
}

impl MarketReader for MarketStateManager {
    fn update_receiver(&self) -> MarketReceiver {
        self.update_tx.subscribe()
    }

    fn state_snapshot(&self) -> Arc<MarketState> {
        self.lock_cell().state.clone()
    }

    fn projection_snapshot(&self) -> Arc<MarketProjection> {
        self.lock_cell().projection.clone()
    }

    fn status_snapshot(&self) -> MarketSyncStatus {
        self.lock_cell().status.clone()
    }

    fn generation(&self) -> u64 {
        self.lock_cell().generation
    }
}
