//! Provider registry.
//!
//! Holds named provider instances, tracks which ones passed their last
//! connectivity check and reports per-provider health.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use futures::future::join_all;
use log::{debug, info, warn};

use super::guarded;
use crate::config::ProviderSettings;
use crate::errors::MarketDataError;
use crate::models::HealthStatus;
use crate::provider::{build_provider, MarketDataProvider};

/// Registry of provider instances, keyed by name.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn MarketDataProvider>>,
    active: Mutex<BTreeSet<String>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_active(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.active.lock().unwrap_or_else(|poisoned| {
            warn!("Registry active-set mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Register `provider` under `name`.
    ///
    /// Rejects duplicate names and providers whose configuration cannot run
    /// (e.g. zero requests per minute).
    pub fn register(
        &mut self,
        name: impl Into<String>,
        provider: Arc<dyn MarketDataProvider>,
    ) -> Result<(), MarketDataError> {
        let name = name.into();
        provider.config().validate()?;
        if self.providers.contains_key(&name) {
            return Err(MarketDataError::InvalidConfig {
                provider: name,
                message: "a provider is already registered under this name".to_string(),
            });
        }

        debug!("Registered provider '{}'", name);
        self.providers.insert(name, provider);
        Ok(())
    }

    /// Register `provider` and check its connection right away.
    ///
    /// Returns whether the provider is active.
    pub async fn add_provider(
        &mut self,
        name: impl Into<String>,
        provider: Arc<dyn MarketDataProvider>,
    ) -> Result<bool, MarketDataError> {
        let name = name.into();
        self.register(name.clone(), Arc::clone(&provider))?;

        let connected = check(&name, provider.as_ref()).await;
        if connected {
            info!("Provider '{}' connected successfully", name);
            self.lock_active().insert(name);
        } else {
            warn!("Provider '{}' connection failed", name);
        }
        Ok(connected)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn MarketDataProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Names whose last connectivity check succeeded.
    pub fn active_providers(&self) -> Vec<String> {
        self.lock_active().iter().cloned().collect()
    }

    /// Check every provider's connection.
    ///
    /// Providers are checked concurrently. A provider whose check fails or
    /// panics is reported as `false` and never affects the others.
    pub async fn test_all_connections(&self) -> BTreeMap<String, bool> {
        let checks = self
            .providers
            .iter()
            .map(|(name, provider)| async move { (name.clone(), check(name, provider.as_ref()).await) });
        let results: BTreeMap<String, bool> = join_all(checks).await.into_iter().collect();

        let mut active = self.lock_active();
        for (name, ok) in &results {
            if *ok {
                active.insert(name.clone());
            } else {
                active.remove(name);
            }
        }
        results
    }

    /// Health of every provider, recomputed now.
    pub async fn health_status(&self) -> BTreeMap<String, HealthStatus> {
        let reachable = self.test_all_connections().await;
        let last_checked = Utc::now();

        self.providers
            .iter()
            .map(|(name, provider)| {
                let status = HealthStatus {
                    provider: name.clone(),
                    reachable: reachable.get(name).copied().unwrap_or(false),
                    last_checked,
                    request_count: provider.request_count(),
                    requests_per_minute: provider.config().requests_per_minute,
                };
                (name.clone(), status)
            })
            .collect()
    }
}

async fn check(name: &str, provider: &dyn MarketDataProvider) -> bool {
    match guarded(name, provider.validate_connection()).await {
        Ok(ok) => ok,
        Err(e) => {
            warn!("Connection check for '{}' failed: {}", name, e);
            false
        }
    }
}

/// Build and register every enabled provider in `settings`.
///
/// Providers that cannot be built (missing credential, bad limits) are
/// logged and skipped. Connections are then checked to fill the active set.
pub async fn setup_registry<'a>(
    settings: impl IntoIterator<Item = &'a ProviderSettings>,
) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();

    for entry in settings.into_iter().filter(|s| s.enabled) {
        let registered = build_provider(entry)
            .and_then(|provider| registry.register(entry.name.clone(), provider));
        if let Err(e) = registered {
            warn!("Failed to set up provider '{}': {}", entry.name, e);
        }
    }

    let connections = registry.test_all_connections().await;
    info!(
        "Registered {} provider(s), {} active",
        registry.len(),
        connections.values().filter(|ok| **ok).count()
    );
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Interval, TimeRange, TimeSeries};
    use crate::provider::{ProviderConfig, ProviderKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behavior {
        Up,
        Down,
        Panics,
    }

    struct MockProvider {
        config: ProviderConfig,
        behavior: Behavior,
        call_count: AtomicUsize,
    }

    impl MockProvider {
        fn new(name: &str, rpm: u32, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                config: ProviderConfig::new(name, "http://mock.invalid", rpm),
                behavior,
                call_count: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl MarketDataProvider for MockProvider {
        fn config(&self) -> &ProviderConfig {
            &self.config
        }

        fn request_count(&self) -> u64 {
            self.call_count.load(Ordering::SeqCst) as u64
        }

        fn fallback_symbols(&self) -> BTreeSet<String> {
            BTreeSet::new()
        }

        async fn fetch_market_data(
            &self,
            symbol: &str,
            interval: &Interval,
            _range: TimeRange,
        ) -> Result<TimeSeries, MarketDataError> {
            Ok(TimeSeries::empty(
                self.name(),
                symbol,
                interval.clone(),
                crate::models::SeriesKind::Ohlcv,
            ))
        }

        async fn list_available_symbols(&self) -> BTreeSet<String> {
            self.fallback_symbols()
        }

        async fn validate_connection(&self) -> bool {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Up => true,
                Behavior::Down => false,
                Behavior::Panics => panic!("validate exploded"),
            }
        }
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = ProviderRegistry::new();
        registry
            .register("binance", MockProvider::new("binance", 600, Behavior::Up))
            .unwrap();

        assert!(registry.get("binance").is_some());
        assert!(registry.get("kraken").is_none());
        assert_eq!(registry.names(), vec!["binance".to_string()]);
        assert!(registry.active_providers().is_empty());
    }

    #[test]
    fn test_zero_rate_rejected_at_registration() {
        let mut registry = ProviderRegistry::new();
        let err = registry
            .register("broken", MockProvider::new("broken", 0, Behavior::Up))
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = ProviderRegistry::new();
        registry
            .register("dune", MockProvider::new("dune", 30, Behavior::Up))
            .unwrap();
        assert!(registry
            .register("dune", MockProvider::new("dune", 30, Behavior::Up))
            .is_err());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_all_connections_isolates_panics() {
        let mut registry = ProviderRegistry::new();
        registry.register("a", MockProvider::new("a", 60, Behavior::Up)).unwrap();
        registry.register("b", MockProvider::new("b", 60, Behavior::Panics)).unwrap();
        registry.register("c", MockProvider::new("c", 60, Behavior::Down)).unwrap();

        let results = registry.test_all_connections().await;

        assert_eq!(results.get("a"), Some(&true));
        assert_eq!(results.get("b"), Some(&false));
        assert_eq!(results.get("c"), Some(&false));
        assert_eq!(registry.active_providers(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_active_set_follows_latest_check() {
        let mut registry = ProviderRegistry::new();
        let added = registry
            .add_provider("a", MockProvider::new("a", 60, Behavior::Up))
            .await
            .unwrap();
        assert!(added);
        let added = registry
            .add_provider("b", MockProvider::new("b", 60, Behavior::Down))
            .await
            .unwrap();
        assert!(!added);
        assert_eq!(registry.active_providers(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_health_status() {
        let mut registry = ProviderRegistry::new();
        registry.register("up", MockProvider::new("up", 100, Behavior::Up)).unwrap();
        registry.register("down", MockProvider::new("down", 30, Behavior::Down)).unwrap();

        let health = registry.health_status().await;

        let up = &health["up"];
        assert!(up.reachable);
        assert_eq!(up.requests_per_minute, 100);
        assert_eq!(up.request_count, 1);
        assert!(!health["down"].reachable);
    }

    #[tokio::test]
    async fn test_setup_registry_skips_unbuildable() {
        let mut dune = ProviderSettings::new("dune", ProviderKind::Dune);
        dune.credential_env = Some("MARKETFEED_TEST_UNSET_REGISTRY_KEY".to_string());
        let mut disabled = ProviderSettings::new("binance", ProviderKind::Binance);
        disabled.enabled = false;
        let mut hyperliquid = ProviderSettings::new("hyperliquid", ProviderKind::Hyperliquid);
        // Nothing listens here; the connection check fails fast.
        hyperliquid.base_url = Some("http://127.0.0.1:9".to_string());
        hyperliquid.request_timeout_secs = Some(2);

        let registry = setup_registry([&dune, &disabled, &hyperliquid]).await;

        assert_eq!(registry.names(), vec!["hyperliquid".to_string()]);
        assert!(registry.active_providers().is_empty());
    }
}
