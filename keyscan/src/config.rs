use std::env::var_os;
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use dotenv::var;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use crate::report::{LedOverflow, LineEnding};

const DEFAULT_CONFIG_FILE: &str = "keyscan.json";

/// Tunables read from the JSON config file. Pin numbers live in the environment instead.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Wait between asserting a row and sampling the columns.
    pub settle_delay_us: u32,
    /// What the LEDs show for key codes that do not fit in four bits.
    pub led_overflow: LedOverflow,
    /// Terminator written after each label.
    pub line_ending: LineEnding,
    /// Serial device to write labels to. Standard output when absent.
    ///
    /// The device is opened as a plain file, so its line settings (baud rate, 8N1) must already
    /// be set, e.g. with `stty -F /dev/ttyS0 115200 cs8 -cstopb -parenb raw`.
    pub serial_port: Option<PathBuf>,
}

/// A config file that exists but could not be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {}", .0.display())]
    Read(PathBuf, #[source] std::io::Error),
    #[error("Malformed config {}", .0.display())]
    Malformed(PathBuf, #[source] serde_json::Error),
}

impl Config {
    /// Loads the config file, `Ok(None)` if there is none.
    pub fn try_load() -> Result<Option<Self>, ConfigError> {
        let config_str = var_os("CONFIG_FILE");
        let config_str: &OsStr = config_str.as_deref().unwrap_or(OsStr::new(DEFAULT_CONFIG_FILE));
        Self::load_from(Path::new(config_str))
    }

    pub fn load_from(config_path: &Path) -> Result<Option<Self>, ConfigError> {
        let file = match std::fs::File::open(config_path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(ConfigError::Read(config_path.to_path_buf(), err)),
        };
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader)
            .map(Some)
            .map_err(|err| ConfigError::Malformed(config_path.to_path_buf(), err))
    }

    pub fn save(&self) -> std::io::Result<()> {
        let config_str = var("CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        self.save_to(Path::new(&config_str))
    }

    pub fn save_to(&self, config_path: &Path) -> std::io::Result<()> {
        let file = std::fs::File::create(config_path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            settle_delay_us: 1,
            led_overflow: LedOverflow::default(),
            line_ending: LineEnding::default(),
            serial_port: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("keyscan-{}-{}.json", name, std::process::id()))
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: Config = serde_json::from_str(r#"{ "settle_delay_us": 10 }"#).unwrap();
        assert_eq!(config.settle_delay_us, 10);
        assert_eq!(config.led_overflow, LedOverflow::Wrap);
        assert_eq!(config.line_ending, LineEnding::Lf);
        assert_eq!(config.serial_port, None);
    }

    #[test]
    fn enums_are_lowercase() {
        let config: Config = serde_json::from_str(
            r#"{ "led_overflow": "clamp", "line_ending": "crlf", "serial_port": "/dev/ttyS0" }"#,
        )
        .unwrap();
        assert_eq!(config.led_overflow, LedOverflow::Clamp);
        assert_eq!(config.line_ending, LineEnding::CrLf);
        assert_eq!(config.serial_port, Some(PathBuf::from("/dev/ttyS0")));
    }

    #[test]
    fn saved_config_loads_back() {
        let path = temp_path("saved");
        let config = Config {
            settle_delay_us: 4,
            led_overflow: LedOverflow::Clamp,
            ..Config::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), Some(config));
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_file_loads_nothing() {
        let path = temp_path("missing");
        assert!(Config::load_from(&path).unwrap().is_none());
    }

    #[test]
    fn malformed_file_is_an_error_and_left_alone() {
        let path = temp_path("malformed");
        let contents = r#"{"settle_delay_us":25,"led_overflow":"clmap"}"#;
        fs::write(&path, contents).unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(&err, ConfigError::Malformed(p, _) if *p == path));
        assert!(err.to_string().contains(&*path.to_string_lossy()));
        assert_eq!(fs::read_to_string(&path).unwrap(), contents);

        fs::write(&path, "settle_delay_us = 4").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Malformed(..))));
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn directory_path_is_an_error() {
        let dir = std::env::temp_dir();
        assert!(matches!(Config::load_from(&dir), Err(ConfigError::Read(..)) | Err(ConfigError::Malformed(..))));
    }
}
