use crate::models::EngineConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use std::collections::HashMap;
use std::fs;

/// File name of the engine configuration inside the config directory
pub const ENGINE_CONFIG_FILE: &str = "gunsmith.yaml";

/// Prefix of environment overrides, e.g. `GUNSMITH__CACHE__TTL_SECS=600`
pub const ENV_PREFIX: &str = "GUNSMITH";

/// Configuration manager for loading and saving the engine configuration.
///
/// Settings are layered: built-in defaults, then `gunsmith.yaml` in the config
/// directory, then `GUNSMITH__`-prefixed environment variables with `__` between
/// nested keys.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    engine_config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// The directory is created if it doesn't exist.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            engine_config_path: config_dir.join(ENGINE_CONFIG_FILE),
            config_dir,
        })
    }

    /// Load the engine configuration from the file and the process environment.
    ///
    /// # Returns
    /// The loaded EngineConfig, or defaults for everything the layers leave unset
    pub fn load_engine_config(&self) -> Result<EngineConfig> {
        self.load_engine_config_with_env(None)
    }

    /// Load the engine configuration, reading overrides from `env` instead of the
    /// process environment when given.
    pub fn load_engine_config_with_env(
        &self,
        env: Option<HashMap<String, String>>,
    ) -> Result<EngineConfig> {
        if !self.engine_config_path.exists() {
            tracing::warn!(
                "Engine config file not found at {}, using defaults",
                self.engine_config_path
            );
        }

        let builder = Config::builder()
            .add_source(
                File::from(self.engine_config_path.as_std_path())
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            );

        let config = builder
            .build()
            .with_context(|| format!("Failed to read engine config: {}", self.engine_config_path))?
            .try_deserialize::<EngineConfig>()
            .with_context(|| {
                format!("Failed to parse engine config: {}", self.engine_config_path)
            })?;

        tracing::info!("Loaded engine config from {}", self.config_dir);
        Ok(config)
    }

    /// Save the engine configuration file.
    pub fn save_engine_config(&self, config: &EngineConfig) -> Result<()> {
        let yaml_string = serde_yaml_ng::to_string(config)
            .context("Failed to serialize engine config to YAML")?;

        fs::write(&self.engine_config_path, yaml_string).with_context(|| {
            format!("Failed to write engine config: {}", self.engine_config_path)
        })?;

        tracing::info!("Saved engine config to {}", self.engine_config_path);
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn engine_config_path(&self) -> &Utf8Path {
        &self.engine_config_path
    }
}
