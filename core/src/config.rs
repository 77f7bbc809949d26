use core::str::FromStr;

use serde::Deserialize;

use crate::{
    channel::{Channel, SampleRate},
    error::ConfigError,
    sink::OutputMode,
};

#[cfg(feature = "config")]
use std::{error::Error, path::Path};

pub type Path32 = heapless::String<32>;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccessPointConfig {
    pub ssid: heapless::String<32>,
    pub password: heapless::String<64>,
    pub ip: [u8; 4],
    pub gateway: [u8; 4],
    pub subnet: [u8; 4],
}

impl Default for AccessPointConfig {
    fn default() -> Self {
        Self {
            ssid: string("Logger-Access-Point"),
            password: string("logger1234"),
            ip: [192, 168, 1, 1],
            gateway: [192, 168, 1, 1],
            subnet: [255, 255, 255, 0],
        }
    }
}

/// Start-up configuration of the logger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerConfig {
    pub output_mode: OutputMode,
    pub channel: Channel,
    pub sample_rate: SampleRate,
    /// Byte on the diagnostic port that starts a SerialOnly stream
    pub start_command: u8,
    pub data_log_path: Path32,
    pub credits_path: Path32,
    pub access_point: AccessPointConfig,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            output_mode: OutputMode::SerialOnly,
            channel: Channel::Voltage,
            sample_rate: SampleRate::FASTEST,
            start_command: b'F',
            data_log_path: string("/DATALOG.TXT"),
            credits_path: string("/CREDITS.TXT"),
            access_point: AccessPointConfig::default(),
        }
    }
}

/// On-disk form, every field optional and checked against the closed sets
#[derive(Debug, Deserialize)]
struct ConfigDocument {
    output_mode: Option<heapless::String<16>>,
    channel: Option<heapless::String<16>>,
    sample_rate: Option<u16>,
    start_command: Option<heapless::String<4>>,
    data_log_path: Option<Path32>,
    credits_path: Option<Path32>,
    access_point: Option<AccessPointConfig>,
}

impl LoggerConfig {
    /// Parse a JSON configuration document
    ///
    /// A malformed document is an error. A well formed document with values
    /// outside the supported sets keeps the default for those values.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let (document, _) = serde_json_core::from_slice::<ConfigDocument>(bytes)?;
        Ok(Self::from_document(document))
    }

    #[cfg(feature = "config")]
    pub fn load(path: Option<&Path>) -> Result<Self, Box<dyn Error>> {
        let paths = match path {
            Some(p) => vec![p.to_path_buf()],
            None => std::env::current_dir()?
                .ancestors()
                .map(|path| path.join("logger-config.toml"))
                .collect::<Vec<_>>(),
        };

        let mut last_error: Option<Box<dyn Error>> = None;

        for path in paths {
            match std::fs::read_to_string(&path) {
                Ok(config_string) => {
                    let document: ConfigDocument = toml::from_str(&config_string)?;
                    log::info!("Loaded configuration from {}", path.display());
                    return Ok(Self::from_document(document));
                }
                Err(e) => last_error = Some(e.into()),
            }
        }

        Err(last_error.unwrap_or_else(|| "no configuration file found".into()))
    }

    fn from_document(document: ConfigDocument) -> Self {
        let mut config = Self::default();

        if let Some(mode) = document.output_mode {
            config.output_mode = checked(OutputMode::from_str(&mode), config.output_mode);
        }

        if let Some(channel) = document.channel {
            config.channel = checked(Channel::from_str(&channel), config.channel);
        }

        if let Some(rate) = document.sample_rate {
            config.sample_rate = checked(SampleRate::try_from(rate), config.sample_rate);
        }

        if let Some(command) = document.start_command {
            match command.as_bytes() {
                [byte] => config.start_command = *byte,
                _ => log::error!(
                    "Start command must be a single byte, keeping '{}'",
                    config.start_command as char
                ),
            }
        }

        if let Some(path) = document.data_log_path {
            config.data_log_path = path;
        }

        if let Some(path) = document.credits_path {
            config.credits_path = path;
        }

        if let Some(access_point) = document.access_point {
            config.access_point = access_point;
        }

        config
    }
}

fn checked<T: core::fmt::Display>(value: Result<T, ConfigError>, default: T) -> T {
    match value {
        Ok(value) => value,
        Err(e) => {
            log::error!("Configuration error: {}, keeping {}", e, default);
            default
        }
    }
}

fn string<const N: usize>(s: &str) -> heapless::String<N> {
    let mut string = heapless::String::new();
    // Only used for the built-in defaults, which all fit
    let _ = string.push_str(s);
    string
}
