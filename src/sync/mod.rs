mod cancel;
mod config;
mod core;
mod engine;
pub(crate) mod error;
mod isolation;
pub(crate) mod process;
mod projection;
mod registry;
mod state;


pub use cancel::CancelToken;
pub use config::{MarketSyncConfig, SyncSettings};
pub use core::{LineBuffer, LineSink, LogLineSink, MarketJob};
pub use engine::MarketSyncController;
pub use projection::{FolderView, MarketProjection, SymbolView};
pub use registry::MarketRegistry;
pub use state::{MarketReader, MarketReceiver, MarketSyncStatus, MarketUpdate};
