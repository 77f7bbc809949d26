#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod acquisition;
pub mod channel;
pub mod config;
pub mod error;
pub mod menu;
pub mod peripherals;
pub mod sink;
pub mod state;
pub mod window;

#[cfg(test)]
mod testing;

pub use acquisition::{Acquisition, AcquisitionState, DataReady, PollOutcome, Reconfigure};
pub use channel::{select_channel, Channel, ChannelConfig, Gain, Mux, SampleRate};
pub use config::{AccessPointConfig, LoggerConfig};
pub use error::{AdcError, ConfigError, FatalError, StorageError, WindowError};
pub use menu::{MenuPage, MenuView};
pub use sink::{OutputMode, SinkDispatch, WindowSummary};
pub use state::LoggerState;
pub use window::{InsertOutcome, MeasurementWindow, WindowStats};
