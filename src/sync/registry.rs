use std::sync::{Arc, Mutex, MutexGuard};

use futures::future;
use log::{info, warn};

use super::{
    engine::MarketSyncController,
    error::{MarketSyncError, Result},
};

/// Collection of independent market controllers, keyed by market name.
///
/// Controllers keep running their own loops; a failure in one market never affects the others.
#[derive(Default)]
pub struct MarketRegistry {
    controllers: Mutex<Vec<Arc<MarketSyncController>>>,
}

impl MarketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_controllers(&self) -> MutexGuard<'_, Vec<Arc<MarketSyncController>>> {
        self.controllers
            .lock()
            .expect("`MarketRegistry` mutex can't be poisoned")
    }

    /// Adds `controller` to the registry. Market names must be unique.
    pub fn register(&self, controller: Arc<MarketSyncController>) -> Result<()> {
        let mut controllers = self.lock_controllers();

        if controllers.iter().any(|c| c.name() == controller.name()) {
            let name = controller.name().to_string();
            return Err(MarketSyncError::DuplicateMarket(name));
        }

        controllers.push(controller);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<MarketSyncController>> {
        self.lock_controllers()
            .iter()
            .find(|c| c.name() == name)
            .cloned()
    }

    /// Returns the registered market names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.lock_controllers()
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock_controllers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_controllers().is_empty()
    }

    /// Removes and returns the controller of market `name`.
    ///
    /// Active markets, and markets whose loop is still winding down, can't be removed.
    pub fn remove(&self, name: &str) -> Result<Arc<MarketSyncController>> {
        let mut controllers = self.lock_controllers();

        let idx = controllers
            .iter()
            .position(|c| c.name() == name)
            .ok_or_else(|| MarketSyncError::MarketNotFound(name.to_string()))?;

        let controller = &controllers[idx];
        if controller.active() || controller.is_running() {
            return Err(MarketSyncError::MarketActive(name.to_string()));
        }

        Ok(controllers.remove(idx))
    }

    /// Stops every registered market.
    pub fn stop_all(&self) {
        for controller in self.lock_controllers().iter() {
            controller.stop();
        }
    }

    /// Shuts every registered market down concurrently.
    ///
    /// Returns the first error encountered, after all markets were shut down.
    pub async fn shutdown(&self) -> Result<()> {
        let controllers = self.lock_controllers().clone();

        info!("Shutting down {} markets", controllers.len());

        let shutdowns = controllers.iter().map(|controller| controller.shutdown());
        let results = future::join_all(shutdowns).await;

        let mut first_err = None;
        for (controller, res) in controllers.iter().zip(results) {
            if let Err(e) = res {
                warn!("Market {} shutdown failed: {e}", controller.name());
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
