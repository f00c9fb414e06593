use thiserror::Error;

/// Fatal configuration problems. Raised only at startup, before any account
/// is scheduled.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("threads must be at least 1 (got {0})")]
    Threads(usize),

    #[error("Invalid delay range `{name}`: min {min}s is greater than max {max}s")]
    DelayRange { name: String, min: u64, max: u64 },

    #[error("Invalid route window time `{value}`: expected HH:MM")]
    WindowTime { value: String },

    #[error("retry.max_attempts must be at least 1")]
    RetryAttempts,

    #[error("Telegram reporting is enabled but {0} is missing")]
    Telegram(String),

    #[error("Duplicate job `{0}` in catalog")]
    DuplicateJob(String),

    #[error("Job `{job}` requires unknown job `{prerequisite}`")]
    UnknownPrerequisite { job: String, prerequisite: String },

    #[error("Dependency cycle detected: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    #[error("Job `{job}`: {reason}")]
    InvalidJob { job: String, reason: String },
}

impl ConfigError {
    /// Short, stable error code for log correlation.
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Load(_) => "CONFIG_LOAD",
            ConfigError::Threads(_) => "CONFIG_THREADS",
            ConfigError::DelayRange { .. } => "CONFIG_DELAY_RANGE",
            ConfigError::WindowTime { .. } => "CONFIG_WINDOW",
            ConfigError::RetryAttempts => "CONFIG_RETRY",
            ConfigError::Telegram(_) => "CONFIG_TELEGRAM",
            ConfigError::DuplicateJob(_) => "CONFIG_DUPLICATE_JOB",
            ConfigError::UnknownPrerequisite { .. } => "CONFIG_UNKNOWN_PREREQUISITE",
            ConfigError::DependencyCycle(_) => "CONFIG_DEPENDENCY_CYCLE",
            ConfigError::InvalidJob { .. } => "CONFIG_INVALID_JOB",
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
