#![doc = include_str!("../README.md")]

/// Exports [`MarketState`], [`Symbol`], [`Folder`], and other types describing a market.
///
/// [`MarketState`]: crate::market::MarketState
/// [`Symbol`]: crate::market::Symbol
/// [`Folder`]: crate::market::Folder
pub mod market;
/// Exports [`MarketSyncController`], the [`MarketJob`] trait, and other types related to market
/// synchronization.
///
/// [`MarketSyncController`]: crate::sync::MarketSyncController
/// [`MarketJob`]: crate::sync::MarketJob
pub mod sync;
mod util;

/// Error types returned by `marketsync`.
pub mod error {
    pub use super::market::error::MarketStateError;
    pub use super::sync::{
        error::MarketSyncError,
        process::error::{IsolationFault, SyncJobError},
    };
    pub use super::util::PanicPayload;

    /// Convenience general-purpose Result type alias, also returned by [`MarketJob`] runs.
    ///
    /// [`MarketJob`]: crate::sync::MarketJob
    pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
}
