//! Execution configuration

use crate::{FdscopeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default wall-clock budget of a sandboxed run
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default `RLIMIT_NOFILE` applied to a sandboxed child
pub const DEFAULT_FD_LIMIT: u64 = 256;

/// Budget for compiling a C source
pub const DEFAULT_COMPILE_TIMEOUT: Duration = Duration::from_secs(60);

/// Bytes kept per output stream; the remainder is drained and dropped
pub const DEFAULT_OUTPUT_CAP: usize = 1024 * 1024;

/// Source language of an uploaded program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    C,
}

impl Language {
    /// Language implied by a file name extension, case-insensitive
    #[must_use]
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "py" => Some(Self::Python),
            "c" => Some(Self::C),
            _ => None,
        }
    }

    /// File name the source is materialized under in the run workspace
    #[must_use]
    pub const fn source_file_name(self) -> &'static str {
        match self {
            Self::Python => "main.py",
            Self::C => "main.c",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Python => "python",
            Self::C => "c",
        })
    }
}

/// Constraints and toolchain for one sandboxed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Wall-clock timeout of the running program
    pub timeout: Duration,

    /// FD ceiling (soft and hard) applied before the program starts
    pub fd_limit: u64,

    pub language: Language,

    /// Python interpreter, resolved through `PATH` when relative
    pub python_path: PathBuf,

    /// C compiler, resolved through `PATH` when relative
    pub cc_path: PathBuf,

    /// Wall-clock timeout of the compile step
    pub compile_timeout: Duration,

    /// Bytes of stdout/stderr retained per stream
    pub output_cap: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            fd_limit: DEFAULT_FD_LIMIT,
            language: Language::Python,
            python_path: PathBuf::from("python3"),
            cc_path: PathBuf::from("gcc"),
            compile_timeout: DEFAULT_COMPILE_TIMEOUT,
            output_cap: DEFAULT_OUTPUT_CAP,
        }
    }
}

impl ExecutionConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> ExecutionConfigBuilder {
        ExecutionConfigBuilder::default()
    }

    /// Reject values a run cannot honor. Nothing is clamped.
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(FdscopeError::InvalidConfig("timeout must be positive".into()));
        }
        if self.fd_limit == 0 {
            return Err(FdscopeError::InvalidConfig("fd_limit must be positive".into()));
        }
        if self.compile_timeout.is_zero() {
            return Err(FdscopeError::InvalidConfig(
                "compile_timeout must be positive".into(),
            ));
        }
        if self.python_path.as_os_str().is_empty() || self.cc_path.as_os_str().is_empty() {
            return Err(FdscopeError::InvalidConfig("toolchain paths must not be empty".into()));
        }
        Ok(())
    }
}

/// Convert a user-supplied timeout in seconds, rejecting non-finite and non-positive values
pub fn timeout_from_secs(secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(FdscopeError::InvalidConfig(format!(
            "timeout_seconds must be a positive number, got {secs}"
        )));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| FdscopeError::InvalidConfig(format!("timeout_seconds out of range: {e}")))
}

/// Builder for ExecutionConfig
#[derive(Debug, Default)]
pub struct ExecutionConfigBuilder {
    config: ExecutionConfig,
}

impl ExecutionConfigBuilder {
    #[must_use]
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.config.timeout = duration;
        self
    }

    #[must_use]
    pub fn fd_limit(mut self, limit: u64) -> Self {
        self.config.fd_limit = limit;
        self
    }

    #[must_use]
    pub fn language(mut self, language: Language) -> Self {
        self.config.language = language;
        self
    }

    #[must_use]
    pub fn python_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.python_path = path.into();
        self
    }

    #[must_use]
    pub fn cc_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cc_path = path.into();
        self
    }

    /// Build and validate
    pub fn build(self) -> Result<ExecutionConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Get default socket path from FDSCOPE_SOCKET env var or system default
///
/// Returns:
/// - `$FDSCOPE_SOCKET` if set (for development)
/// - `/run/fdscope/fdscope.sock` otherwise (production)
#[must_use]
pub fn default_socket_path() -> PathBuf {
    std::env::var("FDSCOPE_SOCKET")
        .map_or_else(|_| PathBuf::from("/run/fdscope/fdscope.sock"), PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ExecutionConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.fd_limit, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_values_are_rejected_not_clamped() {
        assert!(matches!(
            ExecutionConfig::builder().fd_limit(0).build(),
            Err(FdscopeError::InvalidConfig(_))
        ));
        assert!(matches!(
            ExecutionConfig::builder().timeout(Duration::ZERO).build(),
            Err(FdscopeError::InvalidConfig(_))
        ));
        assert!(ExecutionConfig::builder().python_path("").build().is_err());
    }

    #[test]
    fn timeout_seconds_conversion() {
        assert_eq!(timeout_from_secs(1.5).unwrap(), Duration::from_millis(1500));
        assert!(timeout_from_secs(0.0).is_err());
        assert!(timeout_from_secs(-3.0).is_err());
        assert!(timeout_from_secs(f64::NAN).is_err());
        assert!(timeout_from_secs(f64::INFINITY).is_err());
    }

    #[test]
    fn language_from_extension() {
        assert_eq!(Language::from_filename("leak.py"), Some(Language::Python));
        assert_eq!(Language::from_filename("MAIN.C"), Some(Language::C));
        assert_eq!(Language::from_filename("main.cpp"), None);
        assert_eq!(Language::from_filename("Makefile"), None);
    }
}
