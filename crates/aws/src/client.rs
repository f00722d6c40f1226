//! Per-region SDK client cache

use aws_config::SdkConfig;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Lazily builds and keeps one client per requested region.
///
/// `None` stands for the region of the shared SDK configuration.
pub struct RegionalClients<C> {
    sdk_config: SdkConfig,
    clients: Mutex<HashMap<Option<String>, C>>,
}

impl<C: Clone> RegionalClients<C> {
    pub fn new(sdk_config: SdkConfig) -> Self {
        Self {
            sdk_config,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Client for `region`, built with `build` on first use
    pub fn get(&self, region: Option<&str>, build: impl FnOnce(&SdkConfig, Option<&str>) -> C) -> C {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        clients
            .entry(region.map(str::to_owned))
            .or_insert_with(|| build(&self.sdk_config, region))
            .clone()
    }

    /// Number of regions a client has been built for
    pub fn region_count(&self) -> usize {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Region of the shared SDK configuration
    pub fn default_region(&self) -> Option<&str> {
        self.sdk_config.region().map(|region| region.as_ref())
    }
}
