//! # VM Configuration
//!
//! Execution limits for one transaction's call tree. Loadable from TOML with
//! environment overrides on top.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "FRAME_VM_";

/// Virtual machine configuration.
///
/// ```toml
/// max_call_depth = 1024
/// max_stack_size = 1024
/// max_memory_size = 16777216
/// max_execution_steps = 10000000
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Maximum call depth, root frame included.
    pub max_call_depth: usize,
    /// Maximum operand stack items per stack instance.
    pub max_stack_size: usize,
    /// Maximum memory size in bytes per memory instance.
    pub max_memory_size: usize,
    /// Maximum deployed code size in bytes (EIP-170).
    pub max_code_size: usize,
    /// Maximum init code size in bytes (EIP-3860).
    pub max_init_code_size: usize,
    /// Hard cap on interpreter steps for the whole call tree.
    pub max_execution_steps: u64,
    /// Refund cap divisor: refunds are capped at `gas_used / quotient` (EIP-3529).
    pub max_refund_quotient: u64,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 1024,
            max_stack_size: 1024,
            max_memory_size: 16 * 1024 * 1024, // 16 MB
            max_code_size: 24_576,             // 24 KB
            max_init_code_size: 49_152,        // 48 KB
            max_execution_steps: 10_000_000,
            max_refund_quotient: 5,
        }
    }
}

impl VmConfig {
    /// Create a config for testing (smaller values).
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            max_call_depth: 16,
            max_stack_size: 64,
            max_memory_size: 64 * 1024,
            max_code_size: 4096,
            max_init_code_size: 8192,
            max_execution_steps: 100_000,
            max_refund_quotient: 5,
        }
    }

    /// Parse configuration from a TOML string. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns `Parse` on malformed TOML and `Invalid` if validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Apply `FRAME_VM_*` environment overrides on top of this config.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` if a variable is set but not a valid number.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MAX_CALL_DEPTH") {
            self.max_call_depth = parse_field("max_call_depth", &v)?;
        }
        if let Some(v) = lookup("MAX_STACK_SIZE") {
            self.max_stack_size = parse_field("max_stack_size", &v)?;
        }
        if let Some(v) = lookup("MAX_MEMORY_SIZE") {
            self.max_memory_size = parse_field("max_memory_size", &v)?;
        }
        if let Some(v) = lookup("MAX_EXECUTION_STEPS") {
            self.max_execution_steps = parse_field("max_execution_steps", &v)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate that every limit is usable.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` naming the first zero-valued limit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&'static str, bool); 7] = [
            ("max_call_depth", self.max_call_depth > 0),
            ("max_stack_size", self.max_stack_size > 0),
            ("max_memory_size", self.max_memory_size > 0),
            ("max_code_size", self.max_code_size > 0),
            ("max_init_code_size", self.max_init_code_size > 0),
            ("max_execution_steps", self.max_execution_steps > 0),
            ("max_refund_quotient", self.max_refund_quotient > 0),
        ];
        for (field, ok) in checks {
            if !ok {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn parse_field<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        field,
        reason: format!("`{raw}` is not a valid number"),
    })
}
