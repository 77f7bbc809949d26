//! Boundaries to the hardware around the acquisition core
//!
//! Each trait is a thin peripheral wrapper without a state machine of its
//! own. The firmware implements them on the board, tests implement them with
//! recording mocks.

use core::fmt;

use crate::{
    channel::{Channel, Gain, Mux, SampleRate},
    config::AccessPointConfig,
    error::{AdcError, StorageError},
    menu::MenuView,
    sink::OutputMode,
};

/// External converter with a conversion-ready interrupt line
pub trait Adc {
    /// Check the converter answers, fatal for the device when it does not
    fn init(&mut self) -> Result<(), AdcError>;

    fn configure(&mut self, gain: Gain, mux: Mux) -> Result<(), AdcError>;

    fn set_data_rate(&mut self, rate: SampleRate) -> Result<(), AdcError>;

    /// Start converting with the configured gain, mux and rate. Every
    /// finished conversion produces a falling edge on the ready line.
    fn begin_continuous_conversion(&mut self) -> Result<(), AdcError>;

    fn last_conversion_result(&mut self) -> Result<i16, AdcError>;

    fn attach_ready_interrupt(&mut self);

    fn detach_ready_interrupt(&mut self);
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonLevels {
    pub up: bool,
    pub down: bool,
    pub select: bool,
}

/// Everything the operator did since the previous poll
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InputSample {
    pub buttons: ButtonLevels,
    /// At most one command byte from the diagnostic channel
    pub command: Option<u8>,
}

/// Buttons plus command bytes received on the diagnostic channel
pub trait Inputs {
    /// Poll all input sources once, consuming any pending command byte
    fn poll(&mut self) -> InputSample;
}

/// Which collaborator an error screen is about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorContext {
    StorageMount,
    StorageWrite,
    Adc,
}

/// Result of probing the optional peripherals
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceStatus {
    pub network: bool,
    pub storage: bool,
    pub clock: bool,
}

/// The on-device display
pub trait Screen {
    fn render_menu(&mut self, view: MenuView);

    fn render_measurement(
        &mut self,
        mode: OutputMode,
        channel: Channel,
        timestamp: &TimeOfDay,
        mean: f32,
    );

    fn render_error(&mut self, context: ErrorContext);

    fn render_status(&mut self, status: &DeviceStatus);

    fn render_waiting_for_start(&mut self);
}

/// Removable storage holding the data log
pub trait Storage {
    fn mount(&mut self) -> bool;

    fn create_or_truncate(&mut self, path: &str) -> Result<(), StorageError>;

    fn append(&mut self, path: &str, bytes: &[u8]) -> Result<(), StorageError>;
}

pub trait Network {
    fn start_access_point(&mut self, config: &AccessPointConfig) -> bool;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    /// 1 is Monday
    pub weekday: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DateTime {
    pub const fn time_of_day(&self) -> TimeOfDay {
        TimeOfDay {
            hour: self.hour,
            minute: self.minute,
            second: self.second,
        }
    }
}

/// Wall clock time, displayed as `HH:MM:SS`
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

pub trait Clock {
    fn now(&mut self) -> DateTime;

    /// Whether the oscillator runs, a halted clock reads a stale time
    fn is_running(&mut self) -> bool;
}

/// Serial stream towards the host
pub trait SerialPort: fmt::Write {
    fn write_bytes(&mut self, bytes: &[u8]);
}

/// Audible/haptic cues, each including the settle delay after a transition
pub trait Feedback {
    fn scroll(&mut self);

    fn select(&mut self);

    fn error(&mut self);
}

/// All collaborators, borrowed for one step of the main loop
pub struct Devices<'a> {
    pub adc: &'a mut dyn Adc,
    pub inputs: &'a mut dyn Inputs,
    pub screen: &'a mut dyn Screen,
    pub storage: &'a mut dyn Storage,
    pub network: &'a mut dyn Network,
    pub clock: &'a mut dyn Clock,
    pub serial: &'a mut dyn SerialPort,
    pub feedback: &'a mut dyn Feedback,
}
