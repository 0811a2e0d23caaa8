use std::result;

use thiserror::Error;
use tokio::task::JoinError;

use crate::market::error::MarketStateError;

#[derive(Error, Debug)]
pub enum MarketSyncError {
    #[error("Market state can't be edited while its sync loop is running")]
    MarketRunning,

    #[error("Market {0} is active")]
    MarketActive(String),

    #[error("Market {0} not found")]
    MarketNotFound(String),

    #[error("Market {0} is already registered")]
    DuplicateMarket(String),

    #[error("[State] {0}")]
    State(#[from] MarketStateError),

    #[error("Sync process task join error: {0}")]
    ProcessTaskJoin(JoinError),

    #[error("Sync process shutdown timeout error")]
    ShutdownTimeout,
}

pub(crate) type Result<T> = result::Result<T, MarketSyncError>;
