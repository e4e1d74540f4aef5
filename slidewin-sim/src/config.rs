//! Simulator configuration and CLI argument parsing
//!
//! Settings come from command-line arguments or `SLIDEWIN_`-prefixed
//! environment variables.
//!
//! # Configuration Priority
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables
//! 3. Default values (lowest priority)
//!
//! # Example Usage
//!
//! ```bash
//! # Using CLI arguments
//! slidewin-sim --limit 5 --window-ms 10000 --users alice,bob,charlie
//!
//! # Using environment variables
//! export SLIDEWIN_LIMIT=20
//! export SLIDEWIN_STORE=locked
//! slidewin-sim
//!
//! # Mixed (CLI overrides env)
//! export SLIDEWIN_LIMIT=20
//! slidewin-sim --limit 3  # Uses a limit of 3
//! ```

use anyhow::{Result, anyhow};
use clap::Parser;
use serde::Serialize;
use slidewin::WindowConfig;
use std::time::Duration;

/// Main configuration structure for the simulator
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Quota enforced by the limiter
    pub window: WindowSettings,
    /// Rate limiter store configuration
    pub store: StoreConfig,
    /// Simulated traffic
    pub workload: WorkloadConfig,
    /// Print the final report as JSON instead of text
    pub json: bool,
    /// Logging level (error, warn, info, debug, trace)
    pub log_level: String,
}

/// Quota parameters, validated by [`WindowSettings::to_window_config`]
#[derive(Debug, Clone, Copy, Serialize)]
pub struct WindowSettings {
    /// Maximum admissions per window
    pub limit: i64,
    /// Sliding window length
    pub window: Duration,
    /// Interval between compaction sweeps
    pub cleanup_period: Duration,
}

impl WindowSettings {
    /// Validate into a library configuration
    pub fn to_window_config(&self) -> Result<WindowConfig> {
        WindowConfig::new(self.limit, self.window, self.cleanup_period)
            .map_err(|e| anyhow!("Invalid window configuration: {e}"))
    }
}

/// Rate limiter store configuration
#[derive(Debug, Clone, Serialize)]
pub struct StoreConfig {
    /// Type of store to use
    pub store_type: StoreType,
    /// Expected number of distinct keys
    pub capacity: usize,
    /// Shard count for the sharded store (defaults to 4 per CPU)
    pub shards: Option<usize>,
}

/// Available store types for the limiter
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreType {
    /// One lock over the whole key space
    Locked,
    /// Independently locked shards
    Sharded,
}

impl std::str::FromStr for StoreType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "locked" => Ok(StoreType::Locked),
            "sharded" => Ok(StoreType::Sharded),
            _ => Err(anyhow!(
                "Invalid store type: {}. Valid options are: locked, sharded",
                s
            )),
        }
    }
}

/// Simulated traffic shape
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadConfig {
    /// One concurrent client per user
    pub users: Vec<String>,
    /// Requests each user sends
    pub requests_per_user: usize,
    /// Upper bound of the random pause between a user's requests
    pub max_jitter: Duration,
    /// Delay before a single extra request for the first user, if any
    pub late_probe: Option<Duration>,
    /// Seed for reproducible jitter
    pub seed: Option<u64>,
}

/// Command-line arguments for the simulator
///
/// All arguments can also be set via environment variables with the
/// SLIDEWIN_ prefix. CLI arguments take precedence over environment variables.
#[derive(Parser, Debug)]
#[command(
    name = "slidewin-sim",
    about = "Bursty multi-user workload against a sliding-window limiter",
    long_about = "Drives a slidewin limiter with concurrent simulated users, logs every decision and prints a summary.\n\nEnvironment variables with SLIDEWIN_ prefix are supported. CLI arguments take precedence over environment variables."
)]
pub struct Args {
    // Quota
    #[arg(
        long,
        value_name = "N",
        help = "Maximum admissions per window (0 denies everything)",
        default_value_t = 5,
        allow_negative_numbers = true,
        env = "SLIDEWIN_LIMIT"
    )]
    pub limit: i64,
    #[arg(
        long,
        value_name = "MS",
        help = "Sliding window length in milliseconds",
        default_value_t = 10_000,
        env = "SLIDEWIN_WINDOW_MS"
    )]
    pub window_ms: u64,
    #[arg(
        long,
        value_name = "MS",
        help = "Compaction period in milliseconds",
        default_value_t = 5_000,
        env = "SLIDEWIN_CLEANUP_MS"
    )]
    pub cleanup_ms: u64,

    // Store Configuration
    #[arg(
        long,
        value_name = "TYPE",
        help = "Store type: locked, sharded",
        default_value = "sharded",
        env = "SLIDEWIN_STORE"
    )]
    pub store: StoreType,
    #[arg(
        long,
        value_name = "SIZE",
        help = "Expected number of distinct keys",
        default_value_t = 1_000,
        env = "SLIDEWIN_STORE_CAPACITY"
    )]
    pub store_capacity: usize,
    #[arg(
        long,
        value_name = "N",
        help = "Shard count for the sharded store",
        env = "SLIDEWIN_STORE_SHARDS"
    )]
    pub store_shards: Option<usize>,

    // Workload
    #[arg(
        long,
        value_name = "LIST",
        help = "Comma-separated user ids",
        value_delimiter = ',',
        default_value = "alice,bob,charlie",
        env = "SLIDEWIN_USERS"
    )]
    pub users: Vec<String>,
    #[arg(
        long,
        value_name = "N",
        help = "Requests sent by each user",
        default_value_t = 12,
        env = "SLIDEWIN_REQUESTS"
    )]
    pub requests: usize,
    #[arg(
        long,
        value_name = "MS",
        help = "Maximum random pause between a user's requests in milliseconds",
        default_value_t = 2_000,
        env = "SLIDEWIN_MAX_JITTER_MS"
    )]
    pub max_jitter_ms: u64,
    #[arg(
        long,
        value_name = "MS",
        help = "Delay before one extra request for the first user (0 disables)",
        default_value_t = 12_000,
        env = "SLIDEWIN_LATE_PROBE_MS"
    )]
    pub late_probe_ms: u64,
    #[arg(
        long,
        value_name = "SEED",
        help = "Seed for reproducible jitter",
        env = "SLIDEWIN_SEED"
    )]
    pub seed: Option<u64>,

    // General options
    #[arg(long, help = "Print the report as JSON", env = "SLIDEWIN_JSON")]
    pub json: bool,
    #[arg(
        long,
        value_name = "LEVEL",
        help = "Log level: error, warn, info, debug, trace",
        default_value = "info",
        env = "SLIDEWIN_LOG_LEVEL"
    )]
    pub log_level: String,

    // Utility options
    #[arg(
        long,
        help = "List all environment variables and exit",
        action = clap::ArgAction::SetTrue
    )]
    pub list_env_vars: bool,
}

impl Config {
    /// Build configuration from environment variables and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if the quota is invalid or the workload is empty.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();

        if args.list_env_vars {
            Self::print_env_vars();
            std::process::exit(0);
        }

        Self::from_args(args)
    }

    /// Build and validate configuration from already-parsed arguments
    pub fn from_args(args: Args) -> Result<Self> {
        let late_probe = (args.late_probe_ms > 0).then(|| Duration::from_millis(args.late_probe_ms));

        let config = Config {
            window: WindowSettings {
                limit: args.limit,
                window: Duration::from_millis(args.window_ms),
                cleanup_period: Duration::from_millis(args.cleanup_ms),
            },
            store: StoreConfig {
                store_type: args.store,
                capacity: args.store_capacity,
                shards: args.store_shards,
            },
            workload: WorkloadConfig {
                users: args
                    .users
                    .into_iter()
                    .map(|user| user.trim().to_string())
                    .filter(|user| !user.is_empty())
                    .collect(),
                requests_per_user: args.requests,
                max_jitter: Duration::from_millis(args.max_jitter_ms),
                late_probe,
                seed: args.seed,
            },
            json: args.json,
            log_level: args.log_level,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the quota is rejected by the library, no users
    /// are configured, or users would send no requests.
    fn validate(&self) -> Result<()> {
        self.window.to_window_config()?;

        if self.workload.users.is_empty() {
            return Err(anyhow!(
                "At least one user must be specified.\n\n\
                Example:\n  \
                slidewin-sim --users alice,bob\n\n\
                For more information, try '--help'"
            ));
        }

        if self.workload.requests_per_user == 0 {
            return Err(anyhow!("--requests must be at least 1"));
        }

        if self.store.shards == Some(0) {
            return Err(anyhow!("--store-shards must be at least 1"));
        }

        Ok(())
    }

    /// Print all available environment variables and their descriptions
    fn print_env_vars() {
        println!("Slidewin Simulator Environment Variables");
        println!("========================================");
        println!();
        println!("All environment variables use the SLIDEWIN_ prefix.");
        println!("CLI arguments take precedence over environment variables.");
        println!();

        println!("Quota Configuration:");
        println!("  SLIDEWIN_LIMIT=<n>              Admissions per window [default: 5]");
        println!("  SLIDEWIN_WINDOW_MS=<ms>         Window length [default: 10000]");
        println!("  SLIDEWIN_CLEANUP_MS=<ms>        Compaction period [default: 5000]");
        println!();

        println!("Store Configuration:");
        println!("  SLIDEWIN_STORE=<type>           Store type: locked, sharded [default: sharded]");
        println!("  SLIDEWIN_STORE_CAPACITY=<size>  Expected distinct keys [default: 1000]");
        println!("  SLIDEWIN_STORE_SHARDS=<n>       Shard count [default: 4 per CPU]");
        println!();

        println!("Workload Configuration:");
        println!("  SLIDEWIN_USERS=<a,b,c>          User ids [default: alice,bob,charlie]");
        println!("  SLIDEWIN_REQUESTS=<n>           Requests per user [default: 12]");
        println!("  SLIDEWIN_MAX_JITTER_MS=<ms>     Max pause between requests [default: 2000]");
        println!("  SLIDEWIN_LATE_PROBE_MS=<ms>     Late extra request, 0 disables [default: 12000]");
        println!("  SLIDEWIN_SEED=<seed>            Jitter seed [default: random]");
        println!();

        println!("General Configuration:");
        println!("  SLIDEWIN_JSON=true|false        Print the report as JSON");
        println!(
            "  SLIDEWIN_LOG_LEVEL=<level>      Log level: error, warn, info, debug, trace [default: info]"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn parse(args: &[&str]) -> Result<Config> {
        let args = Args::try_parse_from(std::iter::once("slidewin-sim").chain(args.iter().copied()))?;
        Config::from_args(args)
    }

    #[test]
    fn test_store_type_from_str() {
        assert_eq!(StoreType::from_str("locked").unwrap(), StoreType::Locked);
        assert_eq!(StoreType::from_str("SHARDED").unwrap(), StoreType::Sharded);
        assert!(StoreType::from_str("invalid").is_err());
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.window.limit, 5);
        assert_eq!(config.window.window, Duration::from_secs(10));
        assert_eq!(config.window.cleanup_period, Duration::from_secs(5));
        assert_eq!(config.store.store_type, StoreType::Sharded);
        assert_eq!(config.workload.users, vec!["alice", "bob", "charlie"]);
        assert_eq!(config.workload.requests_per_user, 12);
        assert_eq!(config.workload.late_probe, Some(Duration::from_secs(12)));
    }

    #[test]
    fn test_users_are_split_and_trimmed() {
        let config = parse(&["--users", "dave, erin,,frank"]).unwrap();
        assert_eq!(config.workload.users, vec!["dave", "erin", "frank"]);
    }

    #[test]
    fn test_invalid_quota_is_rejected() {
        assert!(parse(&["--limit", "-1"]).is_err());
        assert!(parse(&["--window-ms", "0"]).is_err());
        assert!(parse(&["--cleanup-ms", "0"]).is_err());
    }

    #[test]
    fn test_zero_limit_is_accepted() {
        let config = parse(&["--limit", "0"]).unwrap();
        assert_eq!(config.window.to_window_config().unwrap().limit(), 0);
    }

    #[test]
    fn test_empty_workload_is_rejected() {
        assert!(parse(&["--users", ","]).is_err());
        assert!(parse(&["--requests", "0"]).is_err());
        assert!(parse(&["--store-shards", "0"]).is_err());
    }

    #[test]
    fn test_late_probe_can_be_disabled() {
        let config = parse(&["--late-probe-ms", "0", "--store", "locked"]).unwrap();
        assert_eq!(config.workload.late_probe, None);
        assert_eq!(config.store.store_type, StoreType::Locked);
    }
}
