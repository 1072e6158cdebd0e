//! # Kanal Configuration System
//!
//! Hierarchical configuration for the simulated transport and its harness.
//!
//! ## Features
//! - **Unified Configuration**: one document for transport, harness and telemetry
//! - **Validation**: runtime validation of every section before use
//! - **Environment Awareness**: per-environment overrides and `KANAL_*` variables

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod error;
mod simulation;
mod telemetry;
mod transport;
mod validation;

pub use error::ConfigError;
pub use simulation::SimulationConfig;
pub use telemetry::TelemetryConfig;
pub use transport::TransportConfig;

const BASE_FILE: &str = "config/kanal.yaml";
const ENV_PREFIX: &str = "KANAL_";

/// Top-level configuration container.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone, PartialEq, Eq)]
pub struct KanalConfig {
    /// Wire sizing and delay model.
    #[serde(default)]
    #[validate(nested)]
    pub transport: TransportConfig,

    /// Broadcast-round harness parameters.
    #[serde(default)]
    #[validate(nested)]
    pub simulation: SimulationConfig,

    /// Logging and metrics.
    #[serde(default)]
    #[validate(nested)]
    pub telemetry: TelemetryConfig,
}

impl KanalConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default values
    /// 2. `config/kanal.yaml`, if present
    /// 3. `config/<KANAL_ENV>.yaml`, if present
    /// 4. `KANAL_*` environment variables, nested with `__`
    ///    (`KANAL_TRANSPORT__PROCESS_COUNT=8`)
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(KanalConfig::default()));

        if Path::new(BASE_FILE).exists() {
            figment = figment.merge(Yaml::file(BASE_FILE));
        }

        if let Ok(env) = std::env::var("KANAL_ENV") {
            let env_file = format!("config/{}.yaml", env);
            if Path::new(&env_file).exists() {
                figment = figment.merge(Yaml::file(env_file));
            }
        }

        Self::extract(figment)
    }

    /// Load configuration from a specific file, still honouring `KANAL_*`
    /// overrides.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let figment =
            Figment::from(Serialized::defaults(KanalConfig::default())).merge(Yaml::file(path));
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn full_config_validation() {
        let config = KanalConfig::default();
        config.validate().expect("Default config should validate");
        assert_eq!(config.transport.wire_capacity(), 16);
    }

    #[test]
    fn defaults_without_files() {
        Jail::expect_with(|_jail| {
            let config = KanalConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config, KanalConfig::default());
            Ok(())
        });
    }

    #[test]
    fn base_file_then_environment_override() {
        Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file(
                "config/kanal.yaml",
                "transport:\n  process_count: 5\n  mean_delay_ms: 25\n  seed: 11\nsimulation:\n  rounds: 3\n",
            )?;
            jail.set_env("KANAL_TRANSPORT__PROCESS_COUNT", "8");

            let config = KanalConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.transport.process_count, 8);
            assert_eq!(config.transport.mean_delay_ms, 25);
            assert_eq!(config.transport.variance_ms, 2);
            assert_eq!(config.transport.seed, Some(11));
            assert_eq!(config.simulation.rounds, 3);
            assert_eq!(config.telemetry.log_filter, "info");
            Ok(())
        });
    }

    #[test]
    fn environment_file_overrides_base_file() {
        Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file("config/kanal.yaml", "transport:\n  variance_ms: 4\n")?;
            jail.create_file("config/stress.yaml", "transport:\n  variance_ms: 40\n")?;
            jail.set_env("KANAL_ENV", "stress");

            let config = KanalConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.transport.variance_ms, 40);
            Ok(())
        });
    }

    #[test]
    fn zero_processes_fail_validation() {
        Jail::expect_with(|jail| {
            jail.create_file("kanal.yaml", "transport:\n  process_count: 0\n")?;

            let err = KanalConfig::load_from_path("kanal.yaml").unwrap_err();
            assert!(matches!(err, ConfigError::Validation(_)));
            assert!(err.to_string().contains("transport.process_count"));
            Ok(())
        });
    }

    #[test]
    fn bad_log_filter_fails_validation() {
        Jail::expect_with(|jail| {
            jail.create_file("kanal.yaml", "telemetry:\n  log_filter: \"not a filter\"\n")?;

            let err = KanalConfig::load_from_path("kanal.yaml").unwrap_err();
            assert!(err.to_string().contains("telemetry.log_filter"));
            Ok(())
        });
    }

    #[test]
    fn missing_file_is_reported() {
        let err = KanalConfig::load_from_path("does/not/exist.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }
}
