use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use log::info;

use crate::{error::Result, market::MarketState};

use super::{cancel::CancelToken, config::SyncSettings};

/// Destination for the text lines a job emits while running.
pub trait LineSink: Send + Sync + 'static {
    fn write_line(&self, line: &str);
}

/// Trait for implementing a market data acquisition job.
///
/// Each call to [`run`](Self::run) is one loop iteration. The job receives a snapshot of the
/// market, and returns the complete new market state. The returned state replaces the previous
/// one as a whole, so it must contain every symbol the market should keep.
///
/// Runs are isolated: a panic, or an error that downcasts to
/// [`IsolationFault`](crate::error::IsolationFault), is reported as an isolation fault. Any other
/// error is reported as a job failure. Both deactivate the market.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use marketsync::{
///     error::Result,
///     market::{MarketState, SecurityType, Symbol},
///     sync::{CancelToken, LineSink, MarketJob, SyncSettings},
/// };
///
/// struct StaticListJob;
///
/// #[async_trait::async_trait]
/// impl MarketJob for StaticListJob {
///     async fn run(
///         &self,
///         mut input: MarketState,
///         _settings: Arc<SyncSettings>,
///         sink: Arc<dyn LineSink>,
///         cancel: CancelToken,
///     ) -> Result<MarketState> {
///         for name in ["aapl", "msft"] {
///             if cancel.is_requested() {
///                 break;
///             }
///             input.upsert_symbol(Symbol::new(name, "usa", SecurityType::Equity));
///             sink.write_line(&format!("listed {name}"));
///         }
///
///         // One-shot download, ends the sync loop
///         input.set_active(false);
///         Ok(input)
///     }
/// }
/// ```
#[async_trait]
pub trait MarketJob: Send + Sync + 'static {
    async fn run(
        &self,
        input: MarketState,
        settings: Arc<SyncSettings>,
        sink: Arc<dyn LineSink>,
        cancel: CancelToken,
    ) -> Result<MarketState>;
}

/// [`LineSink`] forwarding job lines to the `log` facade, prefixed with the market name.
#[derive(Debug, Clone)]
pub struct LogLineSink {
    market: String,
}

impl LogLineSink {
    pub fn new(market: impl Into<String>) -> Self {
        Self {
            market: market.into(),
        }
    }
}

impl LineSink for LogLineSink {
    fn write_line(&self, line: &str) {
        info!(target: "marketsync::job", "[{}] {}", self.market, line);
    }
}

/// [`LineSink`] retaining the most recent lines in memory.
#[derive(Debug)]
pub struct LineBuffer {
    max_len: usize,
    lines: Mutex<VecDeque<String>>,
}

impl LineBuffer {
    /// Creates a buffer keeping at most `max_len` lines. Older lines are discarded first.
    pub fn new(max_len: usize) -> Arc<Self> {
        Arc::new(Self {
            max_len,
            lines: Mutex::new(VecDeque::new()),
        })
    }

    fn lock_lines(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.lines
            .lock()
            .expect("`LineBuffer` mutex can't be poisoned")
    }

    /// Returns the buffered lines, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.lock_lines().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock_lines().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_lines().is_empty()
    }

    pub fn clear(&self) {
        self.lock_lines().clear();
    }
}

impl LineSink for LineBuffer {
    fn write_line(&self, line: &str) {
        if self.max_len == 0 {
            return;
        }

        let mut lines = self.lock_lines();
        while lines.len() >= self.max_len {
            lines.pop_front();
        }
        lines.push_back(line.to_string());
    }
}
