use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::args::CliArgs;
use crate::devices::profiles::DEFAULT_PROFILE;
use crate::utils::error::{TstatError, TstatResult};

pub const DEFAULT_BAUD_RATE: u32 = 19200;
pub const DEFAULT_TIMEOUT_SECS: u64 = 1;
pub const DEFAULT_PACING_MS: u64 = 100;
pub const LOCK_FILE_NAME: &str = "tstat-util.lock";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParityConfig {
    #[default]
    None,
    Even,
    Odd,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Console,
    Json,
}

/// Effective settings for one invocation. Built once in `main` and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    // Connection settings
    pub device: String,
    pub baud_rate: u32,
    pub timeout_secs: u64,
    pub parity: ParityConfig,

    // Target
    pub slave_id: Option<u8>,

    // Bus behaviour
    pub pacing_ms: u64,
    pub lock_path: PathBuf,

    // Verification and output
    pub profile: String,
    pub format: OutputFormat,
    pub debug: bool,
}

/// Optional TOML layer, every key may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub device: Option<String>,
    pub baud_rate: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub parity: Option<ParityConfig>,
    pub pacing_ms: Option<u64>,
    pub lock_path: Option<PathBuf>,
    pub profile: Option<String>,
    pub format: Option<OutputFormat>,
}

impl FileConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> TstatResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TstatError::ConfigError(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> TstatResult<Self> {
        Ok(toml::from_str(content)?)
    }
}

pub fn default_device() -> &'static str {
    if cfg!(target_os = "linux") {
        "/dev/ttyUSB0"
    } else if cfg!(target_os = "windows") {
        "COM1"
    } else if cfg!(target_os = "macos") {
        "/dev/tty.usbserial-0001"
    } else {
        "/dev/ttyS0"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: default_device().to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            parity: ParityConfig::None,
            slave_id: None,
            pacing_ms: DEFAULT_PACING_MS,
            lock_path: std::env::temp_dir().join(LOCK_FILE_NAME),
            profile: DEFAULT_PROFILE.to_string(),
            format: OutputFormat::Console,
            debug: false,
        }
    }
}

impl Config {
    /// Defaults, then the `--config` file if given, then command-line flags.
    pub fn from_args(args: &CliArgs) -> TstatResult<Self> {
        let file = match &args.config {
            Some(path) => {
                debug!("Loading configuration from {}", path.display());
                FileConfig::from_file(path)?
            }
            None => FileConfig::default(),
        };
        Ok(Self::layered(file, args))
    }

    pub fn layered(file: FileConfig, args: &CliArgs) -> Self {
        let mut config = Self::default();

        // File layer
        if let Some(device) = file.device {
            config.device = device;
        }
        if let Some(baud_rate) = file.baud_rate {
            config.baud_rate = baud_rate;
        }
        if let Some(timeout_secs) = file.timeout_secs {
            config.timeout_secs = timeout_secs;
        }
        if let Some(parity) = file.parity {
            config.parity = parity;
        }
        if let Some(pacing_ms) = file.pacing_ms {
            config.pacing_ms = pacing_ms;
        }
        if let Some(lock_path) = file.lock_path {
            config.lock_path = lock_path;
        }
        if let Some(profile) = file.profile {
            config.profile = profile;
        }
        if let Some(format) = file.format {
            config.format = format;
        }

        // Command line layer
        if let Some(device) = &args.device {
            config.device = device.clone();
        }
        if let Some(baud_rate) = args.baudrate {
            config.baud_rate = baud_rate;
        }
        if let Some(timeout) = args.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(profile) = &args.profile {
            config.profile = profile.clone();
        }
        if let Some(format) = args.format {
            config.format = format;
        }
        config.slave_id = args.id;
        config.debug = args.debug;

        config
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn require_slave_id(&self) -> TstatResult<u8> {
        self.slave_id.ok_or(TstatError::MissingDeviceId)
    }

    pub fn settings_summary(&self) -> String {
        format!(
            "\nUsing following settings:\nDevice: {}\nBaudrate: {}\nTimeout: {}\n",
            self.device, self.baud_rate, self.timeout_secs
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(argv: &[&str]) -> CliArgs {
        let mut full = vec!["tstat-util"];
        full.extend_from_slice(argv);
        CliArgs::try_parse_from(full).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = Config::layered(FileConfig::default(), &args(&["--scan", "1", "5"]));
        assert_eq!(config.baud_rate, 19200);
        assert_eq!(config.timeout(), Duration::from_secs(1));
        assert_eq!(config.pacing(), Duration::from_millis(100));
        assert_eq!(config.profile, "tstat7");
        assert_eq!(config.slave_id, None);
        assert!(config.lock_path.ends_with(LOCK_FILE_NAME));
        assert!(matches!(config.require_slave_id(), Err(TstatError::MissingDeviceId)));
    }

    #[test]
    fn test_command_line_overrides_file() {
        let file = FileConfig::from_toml(
            r#"
            device = "/dev/ttyAMA0"
            baud_rate = 9600
            parity = "even"
            pacing_ms = 250
            format = "json"
            "#,
        )
        .unwrap();

        let config = Config::layered(
            file,
            &args(&["-d", "/dev/ttyUSB3", "--id", "12", "--readone", "7", "--timeout", "3"]),
        );
        assert_eq!(config.device, "/dev/ttyUSB3");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.parity, ParityConfig::Even);
        assert_eq!(config.pacing_ms, 250);
        assert_eq!(config.timeout_secs, 3);
        assert_eq!(config.format, OutputFormat::Json);
        assert_eq!(config.require_slave_id().unwrap(), 12);
    }

    #[test]
    fn test_unknown_file_key_is_rejected() {
        let err = FileConfig::from_toml("baudrate = 9600").unwrap_err();
        assert!(matches!(err, TstatError::ConfigError(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tstat.toml");
        std::fs::write(&path, "profile = \"tstat7-legacy\"\n").unwrap();

        let path_arg = path.to_string_lossy().to_string();
        let config = Config::from_args(&args(&["--config", &path_arg, "--id", "3", "--verify"])).unwrap();
        assert_eq!(config.profile, "tstat7-legacy");

        let missing = dir.path().join("missing.toml").to_string_lossy().to_string();
        assert!(Config::from_args(&args(&["--config", &missing, "--scan", "1", "2"])).is_err());
    }
}
