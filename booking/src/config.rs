//! Configuration management for the pencilbook service.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::conflict::MAX_BUFFER_MINUTES;
use crate::types::EventStatus;
use pencilbook_runtime::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Longest default hold lifetime accepted from the environment, in hours
pub const MAX_HOLD_DURATION_HOURS: i64 = 24 * 365;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Pencil-hold rules
    pub holds: HoldConfig,
    /// Conflict detection
    pub conflicts: ConflictConfig,
    /// Expiry sweep
    pub sweep: SweepConfig,
    /// Storage adapter retries
    pub storage: StorageConfig,
    /// Process settings
    pub server: ServerConfig,
}

/// Pencil-hold configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldConfig {
    /// Lifetime of a hold created without an explicit expiry, in hours
    pub default_duration_hours: i64,
    /// Event statuses that accept new holds
    pub eligible_statuses: Vec<EventStatus>,
    /// Run category/city conflict detection when creating a hold
    pub check_category_conflicts: bool,
    /// Commits attempted per command before giving up on version conflicts
    pub max_commit_attempts: usize,
}

impl Default for HoldConfig {
    fn default() -> Self {
        Self {
            default_duration_hours: 48,
            eligible_statuses: vec![EventStatus::Draft, EventStatus::PencilHold],
            check_category_conflicts: true,
            max_commit_attempts: 3,
        }
    }
}

/// Conflict detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictConfig {
    /// Setup/teardown padding around each event, in minutes
    pub buffer_minutes: i64,
    /// Offset from UTC of the calendar the days are counted in, in minutes
    pub utc_offset_minutes: i32,
    /// Trim and lowercase cities before comparing them
    pub normalize_city: bool,
    /// Venue names offered as alternatives on conflict
    pub alternative_venues: Vec<String>,
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            buffer_minutes: 60,
            utc_offset_minutes: 0,
            normalize_city: false,
            alternative_venues: default_venues(),
        }
    }
}

/// Expiry sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Seconds between sweep passes
    pub interval_secs: u64,
}

impl SweepConfig {
    /// Interval as a `Duration`
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self { interval_secs: 300 }
    }
}

/// Storage retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Retries after the first attempt
    pub retry_max: usize,
    /// First backoff delay in milliseconds
    pub retry_initial_ms: u64,
}

impl StorageConfig {
    /// Backoff policy for transient store failures
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(self.retry_max)
            .initial_delay(Duration::from_millis(self.retry_initial_ms))
            .jitter(true)
            .build()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            retry_max: 3,
            retry_initial_ms: 100,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,
    /// Metrics server host (for Prometheus scraping)
    pub metrics_host: String,
    /// Metrics server port
    pub metrics_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "pencilbook=info".to_string(),
            metrics_host: "0.0.0.0".to_string(),
            metrics_port: 9090,
            shutdown_timeout: 30,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable variables fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let holds = HoldConfig::default();
        let conflicts = ConflictConfig::default();
        let sweep = SweepConfig::default();
        let storage = StorageConfig::default();
        let server = ServerConfig::default();

        Self {
            holds: HoldConfig {
                default_duration_hours: lookup("HOLD_DEFAULT_DURATION_HOURS")
                    .and_then(|s| s.parse().ok())
                    .filter(|hours| (1..=MAX_HOLD_DURATION_HOURS).contains(hours))
                    .unwrap_or(holds.default_duration_hours),
                eligible_statuses: lookup("HOLD_ELIGIBLE_STATUSES")
                    .map(|s| {
                        s.split(',')
                            .filter_map(|status| status.parse().ok())
                            .collect::<Vec<EventStatus>>()
                    })
                    .filter(|statuses| !statuses.is_empty())
                    .unwrap_or(holds.eligible_statuses),
                check_category_conflicts: lookup("HOLD_CHECK_CATEGORY_CONFLICTS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(holds.check_category_conflicts),
                max_commit_attempts: lookup("HOLD_MAX_COMMIT_ATTEMPTS")
                    .and_then(|s| s.parse().ok())
                    .filter(|attempts| *attempts > 0)
                    .unwrap_or(holds.max_commit_attempts),
            },
            conflicts: ConflictConfig {
                buffer_minutes: lookup("CONFLICT_BUFFER_MINUTES")
                    .and_then(|s| s.parse().ok())
                    .filter(|minutes| (0..=MAX_BUFFER_MINUTES).contains(minutes))
                    .unwrap_or(conflicts.buffer_minutes),
                utc_offset_minutes: lookup("CONFLICT_UTC_OFFSET_MINUTES")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(conflicts.utc_offset_minutes),
                normalize_city: lookup("CONFLICT_NORMALIZE_CITY")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(conflicts.normalize_city),
                alternative_venues: lookup("CONFLICT_ALTERNATIVE_VENUES")
                    .map(|s| {
                        s.split(',')
                            .map(str::trim)
                            .filter(|venue| !venue.is_empty())
                            .map(String::from)
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or(conflicts.alternative_venues),
            },
            sweep: SweepConfig {
                interval_secs: lookup("SWEEP_INTERVAL_SECS")
                    .and_then(|s| s.parse().ok())
                    .filter(|secs| *secs > 0)
                    .unwrap_or(sweep.interval_secs),
            },
            storage: StorageConfig {
                retry_max: lookup("STORAGE_RETRY_MAX")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(storage.retry_max),
                retry_initial_ms: lookup("STORAGE_RETRY_INITIAL_MS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(storage.retry_initial_ms),
            },
            server: ServerConfig {
                log_level: lookup("RUST_LOG").unwrap_or(server.log_level),
                metrics_host: lookup("METRICS_HOST").unwrap_or(server.metrics_host),
                metrics_port: lookup("METRICS_PORT")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(server.metrics_port),
                shutdown_timeout: lookup("SHUTDOWN_TIMEOUT")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(server.shutdown_timeout),
            },
        }
    }
}

fn default_venues() -> Vec<String> {
    ["Community Hall", "Central Library Auditorium", "Riverside Pavilion"]
        .into_iter()
        .map(String::from)
        .collect()
}
