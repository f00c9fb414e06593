use chrono::NaiveTime;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config/pharos.toml";
pub const DEFAULT_THREADS: usize = 1;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 30;
pub const DEFAULT_EXPLORER: &str = "https://testnet.pharosscan.xyz";
pub const WINDOW_TIME_FORMAT: &str = "%H:%M";

/// Top-level config (pharos.toml + PHAROS_* env overrides).
///
/// Nested keys are overridden with a double underscore, e.g.
/// `PHAROS_ROUTE__REPEAT=false` or `PHAROS_THREADS=8`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PharosConfig {
    #[serde(default = "default_threads")]
    pub threads: usize,
    #[serde(default)]
    pub delay_before_start: DelayRange,
    #[serde(default)]
    pub delay_between_tasks: DelayRange,
    #[serde(default = "default_cycle_gap")]
    pub delay_between_cycles: DelayRange,
    #[serde(default)]
    pub send_stats_to_telegram: bool,
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub pharos_rpc_endpoints: Vec<String>,
    #[serde(default = "default_explorer")]
    pub pharos_evm_explorer: String,
    /// Hard ceiling for one handler call. `None` lets a call run unbounded.
    #[serde(default)]
    pub job_timeout_secs: Option<u64>,
    #[serde(default)]
    pub accounts: AccountsConfig,
    #[serde(default)]
    pub route: RouteConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

impl Default for PharosConfig {
    fn default() -> Self {
        Self {
            threads: DEFAULT_THREADS,
            delay_before_start: DelayRange::default(),
            delay_between_tasks: DelayRange::default(),
            delay_between_cycles: default_cycle_gap(),
            send_stats_to_telegram: false,
            telegram: None,
            pharos_rpc_endpoints: Vec::new(),
            pharos_evm_explorer: default_explorer(),
            job_timeout_secs: None,
            accounts: AccountsConfig::default(),
            route: RouteConfig::default(),
            retry: RetryConfig::default(),
            shutdown: ShutdownConfig::default(),
            database: DatabaseConfig::default(),
            jobs: Vec::new(),
        }
    }
}

/// Inclusive `[min, max]` range in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min: u64,
    pub max: u64,
}

impl DelayRange {
    pub fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    pub fn fixed(secs: u64) -> Self {
        Self { min: secs, max: secs }
    }

    /// Reject ranges whose lower bound exceeds the upper bound.
    pub fn validate(&self, name: &str) -> Result<()> {
        if self.min > self.max {
            return Err(ConfigError::DelayRange {
                name: name.to_string(),
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountsConfig {
    #[serde(default = "default_accounts_path")]
    pub path: String,
    #[serde(default = "default_rejected_path")]
    pub rejected_path: String,
    /// Shuffle the account order once before scheduling.
    #[serde(default)]
    pub shuffle: bool,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            path: default_accounts_path(),
            rejected_path: default_rejected_path(),
            shuffle: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Catalog jobs that make up the route. Empty means the whole catalog.
    #[serde(default)]
    pub tasks: Vec<String>,
    /// Re-enter the route forever. When false every account runs one cycle.
    #[serde(default = "bool_true")]
    pub repeat: bool,
    #[serde(default)]
    pub ignore_prerequisites: bool,
    /// UTC `HH:MM`. Equal start and end keep the window always open.
    #[serde(default = "default_window_bound")]
    pub window_start: String,
    #[serde(default = "default_window_bound")]
    pub window_end: String,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            repeat: true,
            ignore_prerequisites: false,
            window_start: default_window_bound(),
            window_end: default_window_bound(),
        }
    }
}

impl RouteConfig {
    /// Parse the configured window bounds.
    pub fn window_bounds(&self) -> Result<(NaiveTime, NaiveTime)> {
        Ok((
            parse_window_time(&self.window_start)?,
            parse_window_time(&self.window_end)?,
        ))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts for a retriable failure, including the first one.
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    #[serde(default = "default_grace_period")]
    pub grace_period_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: DEFAULT_GRACE_PERIOD_SECS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file for emitted summaries. Persistence is off when unset.
    #[serde(default)]
    pub path: Option<String>,
}

/// One catalog entry. The capability-specific fields sit next to `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(flatten)]
    pub kind: JobKindConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKindConfig {
    /// A single HTTP request routed through the account's proxy.
    Http {
        #[serde(default = "default_http_method")]
        method: String,
        url: String,
        #[serde(default)]
        body: Option<String>,
        /// Expected status; any 2xx is accepted when unset.
        #[serde(default)]
        expect_status: Option<u16>,
        /// `"twitter"` or `"discord"`: send that account token as a bearer token.
        #[serde(default)]
        auth_token: Option<String>,
    },
    /// A JSON-RPC call against `pharos_rpc_endpoints`, in order.
    Rpc {
        method: String,
        #[serde(default)]
        params: Vec<serde_json::Value>,
    },
    /// Succeeds immediately.
    Noop,
}

impl JobKindConfig {
    pub fn name(&self) -> &'static str {
        match self {
            JobKindConfig::Http { .. } => "http",
            JobKindConfig::Rpc { .. } => "rpc",
            JobKindConfig::Noop => "noop",
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_threads() -> usize {
    DEFAULT_THREADS
}
fn default_cycle_gap() -> DelayRange {
    // 24h .. 30h between laps of the route.
    DelayRange::new(24 * 3600, 30 * 3600)
}
fn default_explorer() -> String {
    DEFAULT_EXPLORER.to_string()
}
fn default_accounts_path() -> String {
    "config/accounts.csv".to_string()
}
fn default_rejected_path() -> String {
    "config/rejected_accounts.csv".to_string()
}
fn default_window_bound() -> String {
    "00:00".to_string()
}
fn default_retry_attempts() -> u32 {
    DEFAULT_RETRY_ATTEMPTS
}
fn default_grace_period() -> u64 {
    DEFAULT_GRACE_PERIOD_SECS
}
fn default_http_method() -> String {
    "GET".to_string()
}

fn parse_window_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), WINDOW_TIME_FORMAT).map_err(|_| {
        ConfigError::WindowTime {
            value: value.to_string(),
        }
    })
}

impl PharosConfig {
    /// Load config from a TOML file with PHAROS_* env var overrides.
    ///
    /// Resolution order for the path:
    ///   1. Explicit path argument
    ///   2. `PHAROS_CONFIG` env var
    ///   3. `config/pharos.toml`
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .or_else(|| std::env::var("PHAROS_CONFIG").ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        debug!(path = %path, "loading configuration");

        let config: PharosConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("PHAROS_").split("__"))
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Parse config from an in-memory TOML document (no env overrides).
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: PharosConfig = Figment::new()
            .merge(Toml::string(toml))
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Startup checks. Everything here is fatal.
    pub fn validate(&self) -> Result<()> {
        if self.threads < 1 {
            return Err(ConfigError::Threads(self.threads));
        }
        self.delay_before_start.validate("delay_before_start")?;
        self.delay_between_tasks.validate("delay_between_tasks")?;
        self.delay_between_cycles.validate("delay_between_cycles")?;
        self.route.window_bounds()?;

        if self.retry.max_attempts < 1 {
            return Err(ConfigError::RetryAttempts);
        }

        if self.send_stats_to_telegram {
            match &self.telegram {
                None => return Err(ConfigError::Telegram("[telegram] section".into())),
                Some(tg) if tg.bot_token.trim().is_empty() => {
                    return Err(ConfigError::Telegram("telegram.bot_token".into()))
                }
                Some(_) => {}
            }
        }

        let has_rpc_job = self
            .jobs
            .iter()
            .any(|j| matches!(j.kind, JobKindConfig::Rpc { .. }));
        if has_rpc_job && self.pharos_rpc_endpoints.is_empty() {
            return Err(ConfigError::InvalidJob {
                job: "rpc".into(),
                reason: "pharos_rpc_endpoints is empty".into(),
            });
        }

        Ok(())
    }
}
