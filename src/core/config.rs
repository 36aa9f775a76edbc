/*!
 * Kernel Configuration
 *
 * Tunables read at boot. Defaults match the classic teaching kernel; each can be
 * overridden from the environment or a JSON file.
 *
 * Environment variables:
 * - KERNEL_USER_PAGES: frames in the user page pool
 * - KERNEL_MAX_FILES: size of each process's descriptor id space
 * - KERNEL_MAX_ARGS: tokens kept from a command line
 * - KERNEL_TIMER_FREQ: timer interrupts per second
 * - KERNEL_TICKER: "0"/"false" disables the background ticker thread
 */

use super::limits::*;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug, Diagnostic)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    #[diagnostic(code(config::invalid_value), help("{hint}"))]
    InvalidValue {
        key: &'static str,
        value: String,
        hint: &'static str,
    },

    #[error("Failed to read configuration file: {0}")]
    #[diagnostic(code(config::io))]
    Io(#[from] std::io::Error),

    #[error("Malformed configuration: {0}")]
    #[diagnostic(
        code(config::parse),
        help("The file must be a JSON object with the KernelConfig field names.")
    )]
    Parse(#[from] serde_json::Error),
}

/// Kernel boot configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Frames available for page directories, segments and stacks
    pub user_pool_pages: usize,
    /// Descriptor ids available per process, including the two reserved ones
    pub max_open_files: u32,
    /// Arguments kept from a command line; extra tokens are dropped
    pub max_args: usize,
    /// Timer interrupt frequency in Hz
    pub timer_freq: u32,
    /// Whether a background thread drives the timer
    pub start_ticker: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            user_pool_pages: DEFAULT_USER_POOL_PAGES,
            max_open_files: DEFAULT_MAX_OPEN_FILES,
            max_args: DEFAULT_MAX_ARGS,
            timer_freq: DEFAULT_TIMER_FREQ,
            start_ticker: true,
        }
    }
}

impl KernelConfig {
    /// Defaults overridden by any `KERNEL_*` environment variables present
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(pages) = env_parse("KERNEL_USER_PAGES")? {
            config.user_pool_pages = pages;
        }
        if let Some(files) = env_parse("KERNEL_MAX_FILES")? {
            config.max_open_files = files;
        }
        if let Some(args) = env_parse("KERNEL_MAX_ARGS")? {
            config.max_args = args;
        }
        if let Some(freq) = env_parse("KERNEL_TIMER_FREQ")? {
            config.timer_freq = freq;
        }
        if let Ok(ticker) = std::env::var("KERNEL_TICKER") {
            config.start_ticker = !matches!(ticker.as_str(), "0" | "false");
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON object; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Configuration for deterministic tests: no ticker thread
    pub fn without_ticker(mut self) -> Self {
        self.start_ticker = false;
        self
    }

    pub fn with_user_pool_pages(mut self, pages: usize) -> Self {
        self.user_pool_pages = pages;
        self
    }

    pub fn with_max_open_files(mut self, files: u32) -> Self {
        self.max_open_files = files;
        self
    }

    pub fn with_max_args(mut self, args: usize) -> Self {
        self.max_args = args;
        self
    }

    /// Check every field against what the kernel can honor
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.user_pool_pages == 0 {
            return Err(ConfigError::InvalidValue {
                key: "user_pool_pages",
                value: self.user_pool_pages.to_string(),
                hint: "The pool needs at least one frame.",
            });
        }
        if self.max_open_files <= FIRST_FILE_FD as u32 {
            return Err(ConfigError::InvalidValue {
                key: "max_open_files",
                value: self.max_open_files.to_string(),
                hint: "Ids 0 and 1 are reserved; allow at least 3.",
            });
        }
        if self.max_args == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_args",
                value: self.max_args.to_string(),
                hint: "At least the program name must be kept.",
            });
        }
        if !(MIN_TIMER_FREQ..=MAX_TIMER_FREQ).contains(&self.timer_freq) {
            return Err(ConfigError::InvalidValue {
                key: "timer_freq",
                value: self.timer_freq.to_string(),
                hint: "Use a frequency between 19 and 1000 Hz.",
            });
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key,
                value: raw,
                hint: "Expected an unsigned integer.",
            }),
        Err(_) => Ok(None),
    }
}
