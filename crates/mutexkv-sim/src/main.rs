// # mutexkv-sim - handler contention simulator
//
// Runs a batch of simulated resource handlers that mutate shared cloud
// objects through one MutexKv registry, the way provider handlers do
// during an apply.
//
// This binary is a THIN integration layer: all locking logic lives in
// mutexkv-core. Configuration is via environment variables only.
//
// ## Configuration
//
// - `MUTEXKV_SIM_HANDLERS`: Number of concurrent handlers (default 8)
// - `MUTEXKV_SIM_KEYS`: Comma-separated object ids handlers contend on
//   (default `router-123,lan-1`)
// - `MUTEXKV_SIM_HOLD_MS`: Time each handler holds its object (default 50)
// - `MUTEXKV_SIM_RESOLVE`: Odd handlers address objects by name (default true)
// - `MUTEXKV_CONFIG`: Optional path to a JSON registry config
// - `MUTEXKV_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export MUTEXKV_SIM_HANDLERS=12
// export MUTEXKV_SIM_KEYS=router-123,lan-1,lan-2
// export MUTEXKV_SIM_HOLD_MS=100
// mutexkv-sim
// ```

use anyhow::Result;
use mutexkv_core::{Coordinator, MemoryResolver, MutexKv, MutexKvConfig};
use std::collections::HashMap;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
#[derive(Debug, Clone, Copy)]
enum SimExitCode {
    /// Every handler finished
    Clean = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// A handler failed or panicked
    RuntimeError = 2,
}

impl From<SimExitCode> for ExitCode {
    fn from(code: SimExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Simulator configuration
struct Config {
    handlers: usize,
    keys: Vec<String>,
    hold_ms: u64,
    resolve_by_name: bool,
    registry_config_path: Option<String>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            handlers: parse_var("MUTEXKV_SIM_HANDLERS", 8)?,
            keys: env::var("MUTEXKV_SIM_KEYS")
                .unwrap_or_else(|_| "router-123,lan-1".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            hold_ms: parse_var("MUTEXKV_SIM_HOLD_MS", 50)?,
            resolve_by_name: parse_var("MUTEXKV_SIM_RESOLVE", true)?,
            registry_config_path: env::var("MUTEXKV_CONFIG").ok(),
            log_level: env::var("MUTEXKV_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if !(1..=1000).contains(&self.handlers) {
            anyhow::bail!(
                "MUTEXKV_SIM_HANDLERS must be between 1 and 1000. Got: {}",
                self.handlers
            );
        }

        if self.keys.is_empty() {
            anyhow::bail!(
                "MUTEXKV_SIM_KEYS must contain at least one key. \
                Set it via: export MUTEXKV_SIM_KEYS=router-123,lan-1"
            );
        }

        if !(1..=60_000).contains(&self.hold_ms) {
            anyhow::bail!(
                "MUTEXKV_SIM_HOLD_MS must be between 1 and 60000. Got: {}",
                self.hold_ms
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "MUTEXKV_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Load the registry config, falling back to defaults
    fn registry_config(&self) -> Result<MutexKvConfig> {
        match &self.registry_config_path {
            Some(path) => Ok(MutexKvConfig::from_file(path)?),
            None => Ok(MutexKvConfig::default()),
        }
    }

    /// Object id the handler with index `i` mutates
    fn key_for(&self, i: usize) -> &str {
        &self.keys[i % self.keys.len()]
    }

    /// Lower bound on wall time if same-key handlers are serialized
    fn expected_floor(&self) -> Duration {
        let mut per_key: HashMap<&str, u64> = HashMap::new();
        for i in 0..self.handlers {
            *per_key.entry(self.key_for(i)).or_default() += 1;
        }
        let busiest = per_key.values().copied().max().unwrap_or(0);
        Duration::from_millis(busiest * self.hold_ms)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: '{}'", name, raw)),
        Err(_) => Ok(default),
    }
}

/// Human name under which the simulated cloud lists an object
fn display_name(key: &str) -> String {
    format!("{key}-name")
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return SimExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return SimExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SimExitCode::ConfigError.into();
    }

    let registry_config = match config.registry_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load registry config: {}", e);
            return SimExitCode::ConfigError.into();
        }
    };

    let registry = match MutexKv::with_config(registry_config) {
        Ok(kv) => Arc::new(kv),
        Err(e) => {
            error!("Invalid registry config: {}", e);
            return SimExitCode::ConfigError.into();
        }
    };

    info!(
        handlers = config.handlers,
        keys = config.keys.len(),
        hold_ms = config.hold_ms,
        "Starting mutexkv-sim"
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SimExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_sim(config, registry).await {
            Ok(()) => SimExitCode::Clean,
            Err(e) => {
                error!("Simulation error: {}", e);
                SimExitCode::RuntimeError
            }
        }
    });

    result.into()
}

/// Run every simulated handler to completion
async fn run_sim(config: Config, registry: Arc<MutexKv>) -> Result<()> {
    let config = Arc::new(config);
    let coordinator = Coordinator::new(Arc::clone(&registry));
    let resolver = Arc::new(MemoryResolver::from_pairs(
        config.keys.iter().map(|key| (display_name(key), key.clone())),
    ));

    let started = Instant::now();
    let mut handlers = tokio::task::JoinSet::new();

    for i in 0..config.handlers {
        let config = Arc::clone(&config);
        let coordinator = coordinator.clone();
        let resolver = Arc::clone(&resolver);

        handlers.spawn(async move {
            let key = config.key_for(i).to_string();
            let hold = Duration::from_millis(config.hold_ms);

            if config.resolve_by_name && i % 2 == 1 {
                let name = display_name(&key);
                coordinator
                    .run_exclusive_resolved(&name, resolver.as_ref(), |key| {
                        mutate(i, key, hold)
                    })
                    .await
            } else {
                coordinator
                    .run_exclusive(&key, || mutate(i, key.clone(), hold))
                    .await
            }
        });
    }

    let mut failures = 0usize;
    while let Some(joined) = handlers.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("Handler failed: {}", e);
                failures += 1;
            }
            Err(e) => {
                error!("Handler panicked: {}", e);
                failures += 1;
            }
        }
    }

    let elapsed = started.elapsed();
    info!(
        elapsed_ms = elapsed.as_millis() as u64,
        serialized_floor_ms = config.expected_floor().as_millis() as u64,
        entries = registry.len(),
        "All handlers finished"
    );

    if failures > 0 {
        anyhow::bail!("{} handler(s) failed", failures);
    }

    Ok(())
}

/// A simulated mutation followed by a wait for the object to settle
async fn mutate(handler: usize, key: String, hold: Duration) -> Result<()> {
    info!(handler, key = %key, "mutating");
    tokio::time::sleep(hold).await;
    info!(handler, key = %key, "object available again");
    Ok(())
}
