use crate::models::MeterConfig;
use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use ::config::{Config, Environment, File, FileFormat};
use std::fs;

/// Name of the configuration file inside the config directory
pub const CONFIG_FILE_NAME: &str = "meterlink.yaml";

/// Prefix of environment variables that override the file
/// (e.g. `METERLINK_INSTRUMENT__HOST=10.0.0.5`)
pub const ENV_PREFIX: &str = "METERLINK";

/// Configuration manager for loading and saving `meterlink.yaml`.
///
/// Loading layers environment variables over the YAML file over the built-in
/// defaults. A missing file is not an error.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    config_path: Utf8PathBuf,
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
            config_path: config_dir.join(CONFIG_FILE_NAME),
            config_dir,
        })
    }

    /// Load the configuration from the file and the process environment.
    ///
    /// # Returns
    /// The validated MeterConfig; defaults for anything not set
    pub fn load_config(&self) -> Result<MeterConfig> {
        self.load_with_environment(Self::environment())
    }

    /// Save the configuration file.
    pub fn save_config(&self, config: &MeterConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize config to YAML")?;

        fs::write(&self.config_path, yaml_string)
            .with_context(|| format!("Failed to write config: {}", self.config_path))?;

        tracing::info!("Saved config to {}", self.config_path);
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Get the configuration file path.
    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn load_with_environment(&self, environment: Environment) -> Result<MeterConfig> {
        if self.config_path.exists() {
            tracing::info!("Loading config from {}", self.config_path);
        } else {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                self.config_path
            );
        }

        let config: MeterConfig = Config::builder()
            .add_source(File::new(self.config_path.as_str(), FileFormat::Yaml).required(false))
            .add_source(environment)
            .build()
            .with_context(|| format!("Failed to read config: {}", self.config_path))?
            .try_deserialize()
            .with_context(|| format!("Failed to parse config: {}", self.config_path))?;

        validate(&config)?;
        Ok(config)
    }
}

/// Reject settings the link or the poller cannot work with
pub fn validate(config: &MeterConfig) -> Result<()> {
    if config.instrument.host.trim().is_empty() {
        bail!("instrument.host must not be empty");
    }
    if config.instrument.port == 0 {
        bail!("instrument.port must be non-zero");
    }
    if config.link.max_attempts == 0 {
        bail!("link.max_attempts must be at least 1");
    }
    config
        .polling
        .selection()
        .context("polling.mode is not a known measurement")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MeasurementMode;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let manager = ConfigManager::new(&config_path).unwrap();
        (manager, temp_dir)
    }

    fn env_from(vars: &[(&str, &str)]) -> Environment {
        let map = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ConfigManager::environment().source(Some(map))
    }

    #[test]
    fn test_create_config_manager() {
        let (manager, _temp_dir) = create_test_config_manager();
        assert!(manager.config_dir().exists());
        assert_eq!(manager.config_path().file_name(), Some("meterlink.yaml"));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let (manager, _temp_dir) = create_test_config_manager();
        let config = manager.load_with_environment(env_from(&[])).unwrap();
        assert_eq!(config, MeterConfig::default());
    }

    #[test]
    fn test_load_save_config() {
        let (manager, _temp_dir) = create_test_config_manager();

        let mut config = MeterConfig::default();
        config.instrument.host = "10.1.2.3".to_string();
        config.polling.mode = MeasurementMode::Freq.name().to_string();
        config.link.max_attempts = 5;
        manager.save_config(&config).unwrap();

        let loaded = manager.load_with_environment(env_from(&[])).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_environment_overrides_file() {
        let (manager, _temp_dir) = create_test_config_manager();
        manager.save_config(&MeterConfig::default()).unwrap();

        let loaded = manager
            .load_with_environment(env_from(&[
                ("METERLINK_INSTRUMENT__PORT", "5025"),
                ("METERLINK_POLLING__MODE", "acv"),
                ("METERLINK_LOGGING__DEBUG", "true"),
            ]))
            .unwrap();

        assert_eq!(loaded.instrument.port, 5025);
        assert_eq!(loaded.instrument.host, "192.168.0.188");
        assert_eq!(loaded.polling.selection().unwrap().command, "meas:volt:ac?");
        assert!(loaded.logging.debug);
    }

    #[test]
    fn test_invalid_mode_rejected() {
        let (manager, _temp_dir) = create_test_config_manager();
        fs::write(manager.config_path(), "polling:\n  mode: capacitance\n").unwrap();

        let err = manager.load_with_environment(env_from(&[])).unwrap_err();
        assert!(format!("{:#}", err).contains("capacitance"));
    }

    #[test]
    fn test_validate_rejects_zero_port_and_attempts() {
        let mut config = MeterConfig::default();
        config.instrument.port = 0;
        assert!(validate(&config).is_err());

        let mut config = MeterConfig::default();
        config.link.max_attempts = 0;
        assert!(validate(&config).is_err());

        assert!(validate(&MeterConfig::default()).is_ok());
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        let (manager, _temp_dir) = create_test_config_manager();
        fs::write(manager.config_path(), "instrument: [unclosed\n").unwrap();

        assert!(manager.load_with_environment(env_from(&[])).is_err());
    }
}
