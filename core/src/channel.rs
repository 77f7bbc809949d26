//! Logical input channels and their mapping onto the ADS1115 front-end
//!
//! This is the only place where channel semantics live: which multiplexer
//! input and gain a channel uses, and how a raw conversion scales to a
//! physical value. The rest of the logger only reasons about [`Channel`].

use core::{fmt, str::FromStr};

use crate::{error::AdcError, error::ConfigError, peripherals::Adc};

/// Resistor between the measured voltage and A0 [Ω]
const VOLTAGE_DIVIDER_R1: f32 = 33_280.0;
/// Resistor between A0 and ground [Ω]
const VOLTAGE_DIVIDER_R2: f32 = 9_981.0;
/// Current transformer ratio, 30 A per volt
const CURRENT_TRANSFORMER_FACTOR: f32 = 30.0;
/// Full scale of the resistance bridge
const RESISTANCE_COEFFICIENT: f32 = 6.144;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    Voltage,
    Current,
    Resistance,
}

impl Channel {
    /// Order of the channel ring in the menu
    pub const ALL: [Channel; 3] = [Channel::Voltage, Channel::Current, Channel::Resistance];

    pub const fn label(self) -> &'static str {
        match self {
            Channel::Voltage => "Voltage",
            Channel::Current => "Current",
            Channel::Resistance => "Resistance",
        }
    }

    pub const fn unit(self) -> &'static str {
        match self {
            Channel::Voltage => "V",
            Channel::Current => "A",
            Channel::Resistance => "Ohm",
        }
    }

    pub fn config(self) -> ChannelConfig {
        let (gain, mux) = match self {
            Channel::Voltage => (Gain::TwoThirds, Mux::Single0),
            Channel::Current => (Gain::Four, Mux::Diff2_3),
            Channel::Resistance => (Gain::TwoThirds, Mux::Single1),
        };

        let coefficient = match self {
            Channel::Voltage => {
                gain.lsb_volts() * (VOLTAGE_DIVIDER_R1 + VOLTAGE_DIVIDER_R2) / VOLTAGE_DIVIDER_R1
            }
            Channel::Current => gain.lsb_volts() * CURRENT_TRANSFORMER_FACTOR,
            Channel::Resistance => RESISTANCE_COEFFICIENT,
        };

        ChannelConfig {
            channel: self,
            gain,
            mux,
            coefficient,
            offset: 0.0,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Channel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .into_iter()
            .find(|channel| channel.label().eq_ignore_ascii_case(s))
            .ok_or(ConfigError::UnknownChannel)
    }
}

/// Everything needed to acquire and interpret one channel
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelConfig {
    pub channel: Channel,
    pub gain: Gain,
    pub mux: Mux,
    pub coefficient: f32,
    pub offset: f32,
}

impl ChannelConfig {
    /// Convert a raw conversion (or a mean of them) to the channel's unit
    pub fn to_physical(&self, raw: f32) -> f32 {
        raw * self.coefficient + self.offset
    }
}

/// Apply `channel` to the converter and start converting
///
/// Gain and multiplexer are written together before the next conversion is
/// requested, so no sample is ever taken with a mix of two channels.
pub fn select_channel(adc: &mut dyn Adc, channel: Channel) -> Result<ChannelConfig, AdcError> {
    let config = channel.config();

    adc.configure(config.gain, config.mux)?;
    adc.begin_continuous_conversion()?;

    log::info!("Reading channel {} ({})", channel, config.mux.label());

    Ok(config)
}

/// Programmable gain amplifier setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Gain {
    /// ±6.144 V
    TwoThirds,
    /// ±4.096 V
    One,
    /// ±2.048 V
    Two,
    /// ±1.024 V
    Four,
    /// ±0.512 V
    Eight,
    /// ±0.256 V
    Sixteen,
}

impl Gain {
    pub const fn bits(self) -> u16 {
        match self {
            Gain::TwoThirds => 0x0000,
            Gain::One => 0x0200,
            Gain::Two => 0x0400,
            Gain::Four => 0x0600,
            Gain::Eight => 0x0800,
            Gain::Sixteen => 0x0A00,
        }
    }

    pub const fn full_scale_volts(self) -> f32 {
        match self {
            Gain::TwoThirds => 6.144,
            Gain::One => 4.096,
            Gain::Two => 2.048,
            Gain::Four => 1.024,
            Gain::Eight => 0.512,
            Gain::Sixteen => 0.256,
        }
    }

    /// Volts per bit of a 16 bit conversion
    pub fn lsb_volts(self) -> f32 {
        self.full_scale_volts() / 32_768.0
    }
}

/// Input multiplexer selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mux {
    Diff0_1,
    Diff0_3,
    Diff1_3,
    Diff2_3,
    Single0,
    Single1,
    Single2,
    Single3,
}

impl Mux {
    pub const fn bits(self) -> u16 {
        match self {
            Mux::Diff0_1 => 0x0000,
            Mux::Diff0_3 => 0x1000,
            Mux::Diff1_3 => 0x2000,
            Mux::Diff2_3 => 0x3000,
            Mux::Single0 => 0x4000,
            Mux::Single1 => 0x5000,
            Mux::Single2 => 0x6000,
            Mux::Single3 => 0x7000,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Mux::Diff0_1 => "A0-A1",
            Mux::Diff0_3 => "A0-A3",
            Mux::Diff1_3 => "A1-A3",
            Mux::Diff2_3 => "A2-A3",
            Mux::Single0 => "A0",
            Mux::Single1 => "A1",
            Mux::Single2 => "A2",
            Mux::Single3 => "A3",
        }
    }
}

/// Conversion rate, also the number of samples in one window
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleRate {
    Sps8,
    Sps16,
    Sps32,
    Sps64,
    Sps128,
    Sps250,
    Sps475,
    Sps860,
}

impl SampleRate {
    /// All rates, slowest first
    pub const ALL: [SampleRate; 8] = [
        SampleRate::Sps8,
        SampleRate::Sps16,
        SampleRate::Sps32,
        SampleRate::Sps64,
        SampleRate::Sps128,
        SampleRate::Sps250,
        SampleRate::Sps475,
        SampleRate::Sps860,
    ];
    pub const SLOWEST: SampleRate = SampleRate::Sps8;
    pub const FASTEST: SampleRate = SampleRate::Sps860;

    pub const fn sps(self) -> u16 {
        match self {
            SampleRate::Sps8 => 8,
            SampleRate::Sps16 => 16,
            SampleRate::Sps32 => 32,
            SampleRate::Sps64 => 64,
            SampleRate::Sps128 => 128,
            SampleRate::Sps250 => 250,
            SampleRate::Sps475 => 475,
            SampleRate::Sps860 => 860,
        }
    }

    pub const fn bits(self) -> u16 {
        match self {
            SampleRate::Sps8 => 0x0000,
            SampleRate::Sps16 => 0x0020,
            SampleRate::Sps32 => 0x0040,
            SampleRate::Sps64 => 0x0060,
            SampleRate::Sps128 => 0x0080,
            SampleRate::Sps250 => 0x00A0,
            SampleRate::Sps475 => 0x00C0,
            SampleRate::Sps860 => 0x00E0,
        }
    }

    /// Window length at this rate
    pub const fn window_len(self) -> usize {
        self.sps() as usize
    }

    fn index(self) -> usize {
        self as usize
    }

    /// Next faster rate, saturating at the fastest
    pub fn faster(self) -> Self {
        Self::ALL[usize::min(self.index() + 1, Self::ALL.len() - 1)]
    }

    /// Next slower rate, saturating at the slowest
    pub fn slower(self) -> Self {
        Self::ALL[self.index().saturating_sub(1)]
    }
}

impl TryFrom<u16> for SampleRate {
    type Error = ConfigError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        SampleRate::ALL
            .into_iter()
            .find(|rate| rate.sps() == value)
            .ok_or(ConfigError::UnsupportedRate(value))
    }
}

impl fmt::Display for SampleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sps())
    }
}

/// ADS1115 register pointers
pub mod register {
    pub const CONVERSION: u8 = 0x00;
    pub const CONFIG: u8 = 0x01;
    pub const LO_THRESH: u8 = 0x02;
    pub const HI_THRESH: u8 = 0x03;

    /// Threshold values that turn ALERT/RDY into a conversion-ready output
    pub const READY_HI_THRESH: u16 = 0x8000;
    pub const READY_LO_THRESH: u16 = 0x0000;
}

const CONFIG_OS_SINGLE: u16 = 0x8000;
const CONFIG_MODE_CONTINUOUS: u16 = 0x0000;
const CONFIG_COMP_TRADITIONAL: u16 = 0x0000;
const CONFIG_COMP_ACTIVE_LOW: u16 = 0x0000;
const CONFIG_COMP_NON_LATCHING: u16 = 0x0000;
const CONFIG_COMP_QUEUE_ONE: u16 = 0x0000;

/// Config register value for continuous conversion with a falling edge on
/// ALERT/RDY after every conversion
pub const fn continuous_config_word(mux: Mux, gain: Gain, rate: SampleRate) -> u16 {
    CONFIG_OS_SINGLE
        | mux.bits()
        | gain.bits()
        | CONFIG_MODE_CONTINUOUS
        | rate.bits()
        | CONFIG_COMP_TRADITIONAL
        | CONFIG_COMP_ACTIVE_LOW
        | CONFIG_COMP_NON_LATCHING
        | CONFIG_COMP_QUEUE_ONE
}
