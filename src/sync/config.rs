use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

/// Configuration for a [`MarketSyncController`](crate::sync::MarketSyncController).
#[derive(Clone, Debug)]
pub struct MarketSyncConfig {
    cancel_grace_period: Duration,
    shutdown_timeout: Duration,
    update_channel_capacity: usize,
}

impl Default for MarketSyncConfig {
    fn default() -> Self {
        Self {
            cancel_grace_period: Duration::from_secs(3),
            shutdown_timeout: Duration::from_secs(6),
            update_channel_capacity: 1_000,
        }
    }
}

impl MarketSyncConfig {
    /// Returns how long a job may take to exit cooperatively after cancellation was requested,
    /// before its isolated context is terminated.
    pub fn cancel_grace_period(&self) -> Duration {
        self.cancel_grace_period
    }

    /// Returns the timeout for graceful shutdown of the sync loop.
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Returns the capacity of the update broadcast channel.
    pub fn update_channel_capacity(&self) -> usize {
        self.update_channel_capacity
    }

    /// Sets how long a cancelled job may take to exit cooperatively before it is terminated.
    /// With `0`, the isolated context is torn down as soon as cancellation is requested.
    ///
    /// Default: `3000` milliseconds
    pub fn with_cancel_grace_period(mut self, millis: u64) -> Self {
        self.cancel_grace_period = Duration::from_millis(millis);
        self
    }

    /// Sets the timeout for graceful shutdown of the sync loop.
    ///
    /// Default: `6` seconds
    pub fn with_shutdown_timeout(mut self, secs: u64) -> Self {
        self.shutdown_timeout = Duration::from_secs(secs);
        self
    }

    /// Sets the capacity of the update broadcast channel. Values below `1` are raised to `1`.
    ///
    /// Default: `1000`
    pub fn with_update_channel_capacity(mut self, capacity: usize) -> Self {
        self.update_channel_capacity = capacity.max(1);
        self
    }
}

#[derive(Debug)]
pub(crate) struct MarketSyncControllerConfig {
    shutdown_timeout: Duration,
}

impl MarketSyncControllerConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }
}

impl From<&MarketSyncConfig> for MarketSyncControllerConfig {
    fn from(value: &MarketSyncConfig) -> Self {
        Self {
            shutdown_timeout: value.shutdown_timeout,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct MarketSyncProcessConfig {
    cancel_grace_period: Duration,
}

impl MarketSyncProcessConfig {
    pub fn cancel_grace_period(&self) -> Duration {
        self.cancel_grace_period
    }
}

impl From<&MarketSyncConfig> for MarketSyncProcessConfig {
    fn from(value: &MarketSyncConfig) -> Self {
        Self {
            cancel_grace_period: value.cancel_grace_period,
        }
    }
}

/// Settings shared by every job run, read-only from the job's point of view.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    data_folder: PathBuf,
    properties: BTreeMap<String, String>,
}

impl SyncSettings {
    pub fn new(data_folder: impl Into<PathBuf>) -> Self {
        Self {
            data_folder: data_folder.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns the folder where jobs store acquired data.
    pub fn data_folder(&self) -> &Path {
        &self.data_folder
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
}
