//! Wasmtime engine wrapper for Tether.
//!
//! [`TetherEngine`] configures the underlying Wasmtime engine and owns the
//! epoch counter used for wall-clock interruption of guest code.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use parking_lot::RwLock;
use tracing::{debug, info, warn};
use wasmtime::{Config, Engine};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};

/// The core Tether engine that wraps Wasmtime.
///
/// # Example
///
/// ```
/// use tether_core::{EngineConfig, TetherEngine};
///
/// let engine = TetherEngine::new(EngineConfig::default()).unwrap();
/// assert!(engine.fuel_enabled());
/// ```
pub struct TetherEngine {
    /// The underlying Wasmtime engine.
    inner: Engine,
    /// Configuration used to create this engine.
    config: EngineConfig,
    /// Current epoch value.
    epoch: RwLock<u64>,
}

impl TetherEngine {
    /// Create a new engine with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the Wasmtime engine cannot be created with
    /// the given configuration.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        if config.epoch_interval.is_zero() {
            return Err(EngineError::InvalidConfig(
                "epoch interval must be non-zero".to_string(),
            ));
        }

        let mut wasmtime_config = Config::new();
        wasmtime_config.consume_fuel(config.fuel_enabled);
        wasmtime_config.epoch_interruption(config.epoch_enabled);
        wasmtime_config.max_wasm_stack(config.max_wasm_stack);
        wasmtime_config.debug_info(config.debug_info);
        wasmtime_config.wasm_bulk_memory(true);
        wasmtime_config.wasm_multi_value(true);

        let inner = Engine::new(&wasmtime_config)?;

        info!(
            fuel = config.fuel_enabled,
            epochs = config.epoch_enabled,
            epoch_interval_ms = config.epoch_interval.as_millis(),
            "Created Tether engine"
        );

        Ok(Self {
            inner,
            config,
            epoch: RwLock::new(0),
        })
    }

    /// Create a new engine with default configuration.
    pub fn default_engine() -> EngineResult<Self> {
        Self::new(EngineConfig::default())
    }

    /// Get a reference to the underlying Wasmtime engine.
    pub fn inner(&self) -> &Engine {
        &self.inner
    }

    /// Get the configuration used to create this engine.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Advance the epoch by one tick. No-op when epochs are disabled.
    pub fn increment_epoch(&self) {
        if self.config.epoch_enabled {
            let mut epoch = self.epoch.write();
            *epoch += 1;
            self.inner.increment_epoch();
        }
    }

    /// Get the current epoch value.
    pub fn current_epoch(&self) -> u64 {
        *self.epoch.read()
    }

    /// Check if fuel-based limiting is enabled.
    pub fn fuel_enabled(&self) -> bool {
        self.config.fuel_enabled
    }

    /// Check if epoch-based interruption is enabled.
    pub fn epoch_enabled(&self) -> bool {
        self.config.epoch_enabled
    }

    /// Start a background thread that advances the epoch every
    /// `epoch_interval`. The thread stops when the returned guard drops.
    ///
    /// # Errors
    ///
    /// Fails when epochs are disabled or the thread cannot be spawned.
    pub fn start_epoch_ticker(self: &Arc<Self>) -> EngineResult<EpochTicker> {
        if !self.config.epoch_enabled {
            return Err(EngineError::InvalidConfig(
                "epoch interruption is disabled".to_string(),
            ));
        }

        let engine = Arc::clone(self);
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let interval = self.config.epoch_interval;

        let handle = thread::Builder::new()
            .name("tether-epoch-ticker".to_string())
            .spawn(move || {
                while !thread_stop.load(Ordering::Acquire) {
                    thread::sleep(interval);
                    engine.increment_epoch();
                }
                debug!("Epoch ticker stopped");
            })
            .map_err(|e| EngineError::InvalidConfig(format!("cannot spawn epoch ticker: {}", e)))?;

        info!(interval_ms = interval.as_millis(), "Started epoch ticker");

        Ok(EpochTicker {
            stop,
            handle: Some(handle),
        })
    }
}

impl std::fmt::Debug for TetherEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TetherEngine")
            .field("config", &self.config)
            .field("epoch", &*self.epoch.read())
            .finish()
    }
}

/// Guard for the background epoch thread started by
/// [`TetherEngine::start_epoch_ticker`].
#[derive(Debug)]
pub struct EpochTicker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl EpochTicker {
    /// Stop the ticker and wait for its thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Epoch ticker thread panicked");
            }
        }
    }
}

impl Drop for EpochTicker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A shared reference to a Tether engine.
pub type SharedEngine = Arc<TetherEngine>;

/// Extension trait for creating shared engines.
pub trait IntoShared {
    /// Convert into a shared engine reference.
    fn into_shared(self) -> SharedEngine;
}

impl IntoShared for TetherEngine {
    fn into_shared(self) -> SharedEngine {
        Arc::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_engine_creation() {
        let engine = TetherEngine::new(EngineConfig::default()).unwrap();
        assert!(engine.fuel_enabled());
        assert!(engine.epoch_enabled());
    }

    #[test]
    fn test_engine_epoch_increment() {
        let engine = TetherEngine::new(EngineConfig::default()).unwrap();
        assert_eq!(engine.current_epoch(), 0);

        engine.increment_epoch();
        engine.increment_epoch();
        assert_eq!(engine.current_epoch(), 2);
    }

    #[test]
    fn test_engine_without_epochs() {
        let config = EngineConfig::default().with_epochs(false);
        let engine = TetherEngine::new(config).unwrap().into_shared();

        engine.increment_epoch();
        assert_eq!(engine.current_epoch(), 0);
        assert!(engine.start_epoch_ticker().is_err());
    }

    #[test]
    fn test_zero_epoch_interval_rejected() {
        let config = EngineConfig::default().with_epoch_interval(Duration::ZERO);
        assert!(matches!(
            TetherEngine::new(config),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_epoch_ticker_advances_and_stops() {
        let config = EngineConfig::default().with_epoch_interval(Duration::from_millis(1));
        let engine = TetherEngine::new(config).unwrap().into_shared();

        let ticker = engine.start_epoch_ticker().unwrap();
        let started = Instant::now();
        while engine.current_epoch() < 3 && started.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(1));
        }
        ticker.stop();

        let stopped_at = engine.current_epoch();
        assert!(stopped_at >= 3);

        thread::sleep(Duration::from_millis(20));
        assert_eq!(engine.current_epoch(), stopped_at);
    }
}
