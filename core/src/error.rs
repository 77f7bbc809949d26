use core::fmt;

/// Misuse of the [`MeasurementWindow`](crate::window::MeasurementWindow) lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WindowError {
    /// Capacity is zero or larger than the backing storage
    CapacityOutOfRange(usize),
    /// The window holds samples but is not full yet, it has to be reset first
    WindowInFlight { len: usize, capacity: usize },
}

impl fmt::Display for WindowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityOutOfRange(capacity) => {
                write!(f, "window capacity {capacity} is out of range")
            }
            Self::WindowInFlight { len, capacity } => write!(
                f,
                "cannot resize a window holding {len} of {capacity} samples"
            ),
        }
    }
}

/// A selector value outside of the closed sets the logger supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    UnsupportedRate(u16),
    UnknownChannel,
    UnknownMode,
    Parse,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedRate(rate) => write!(f, "unsupported sample rate {rate} SPS"),
            Self::UnknownChannel => f.write_str("unknown input channel"),
            Self::UnknownMode => f.write_str("unknown output mode"),
            Self::Parse => f.write_str("configuration document could not be parsed"),
        }
    }
}

impl From<serde_json_core::de::Error> for ConfigError {
    fn from(_: serde_json_core::de::Error) -> Self {
        Self::Parse
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcError {
    /// Transfer on the bus to the converter failed
    Bus,
    /// The converter did not answer at its address
    NotResponding,
}

impl fmt::Display for AdcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus => f.write_str("ADC bus transfer failed"),
            Self::NotResponding => f.write_str("ADC is not responding"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    NotMounted,
    Open,
    Write,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotMounted => f.write_str("storage is not mounted"),
            Self::Open => f.write_str("failed to open file"),
            Self::Write => f.write_str("failed to write file"),
        }
    }
}

/// Errors after which no valid acquisition is possible
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FatalError {
    AdcInit(AdcError),
}

impl From<AdcError> for FatalError {
    fn from(value: AdcError) -> Self {
        Self::AdcInit(value)
    }
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdcInit(e) => write!(f, "ADC initialization failed: {e}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for WindowError {}
#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}
#[cfg(feature = "std")]
impl std::error::Error for AdcError {}
#[cfg(feature = "std")]
impl std::error::Error for StorageError {}
#[cfg(feature = "std")]
impl std::error::Error for FatalError {}
