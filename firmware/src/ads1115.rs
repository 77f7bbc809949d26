//! ADS1115 over I2C with its ALERT/RDY pin on an EXTI line

use datalogger_core::{
    channel::{continuous_config_word, register, Gain, Mux, SampleRate},
    peripherals::Adc,
    AdcError,
};
use embedded_hal::blocking::i2c::{Write, WriteRead};
use stm32f7xx_hal::{
    gpio::{Edge, ExtiPin},
    pac::EXTI,
};

/// ADDR pin tied to ground
pub const DEFAULT_ADDRESS: u8 = 0x48;

pub struct Ads1115<I2C, ALERT> {
    i2c: I2C,
    address: u8,
    alert: ALERT,
    exti: EXTI,
    gain: Gain,
    mux: Mux,
    rate: SampleRate,
}

impl<I2C, E, ALERT> Ads1115<I2C, ALERT>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
    ALERT: ExtiPin,
{
    /// The ALERT pin must already be an interrupt source, it is only
    /// enabled while acquisition is armed
    pub fn new(i2c: I2C, address: u8, mut alert: ALERT, mut exti: EXTI) -> Self {
        alert.trigger_on_edge(&mut exti, Edge::Falling);
        alert.disable_interrupt(&mut exti);

        Self {
            i2c,
            address,
            alert,
            exti,
            gain: Gain::TwoThirds,
            mux: Mux::Single0,
            rate: SampleRate::FASTEST,
        }
    }

    fn write_register(&mut self, register: u8, value: u16) -> Result<(), AdcError> {
        let [high, low] = value.to_be_bytes();
        self.i2c
            .write(self.address, &[register, high, low])
            .map_err(|_| AdcError::Bus)
    }

    fn read_register(&mut self, register: u8) -> Result<u16, AdcError> {
        let mut buffer = [0; 2];
        self.i2c
            .write_read(self.address, &[register], &mut buffer)
            .map_err(|_| AdcError::Bus)?;
        Ok(u16::from_be_bytes(buffer))
    }

    fn write_config(&mut self) -> Result<(), AdcError> {
        let config = continuous_config_word(self.mux, self.gain, self.rate);
        self.write_register(register::CONFIG, config)
    }
}

impl<I2C, E, ALERT> Adc for Ads1115<I2C, ALERT>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
    ALERT: ExtiPin,
{
    fn init(&mut self) -> Result<(), AdcError> {
        // A threshold write that does not read back means nobody is home
        self.write_register(register::HI_THRESH, register::READY_HI_THRESH)
            .map_err(|_| AdcError::NotResponding)?;
        let hi = self.read_register(register::HI_THRESH)?;
        if hi != register::READY_HI_THRESH {
            defmt::error!("ADS1115 threshold readback {=u16:#06x}", hi);
            return Err(AdcError::NotResponding);
        }
        self.write_register(register::LO_THRESH, register::READY_LO_THRESH)
    }

    fn configure(&mut self, gain: Gain, mux: Mux) -> Result<(), AdcError> {
        self.gain = gain;
        self.mux = mux;
        defmt::debug!("ADS1115 gain {}, mux {}", gain, mux);
        Ok(())
    }

    fn set_data_rate(&mut self, rate: SampleRate) -> Result<(), AdcError> {
        self.rate = rate;
        self.write_config()
    }

    fn begin_continuous_conversion(&mut self) -> Result<(), AdcError> {
        // ALERT/RDY only pulses on conversion ready with this threshold pair
        self.write_register(register::HI_THRESH, register::READY_HI_THRESH)?;
        self.write_register(register::LO_THRESH, register::READY_LO_THRESH)?;
        self.write_config()
    }

    fn last_conversion_result(&mut self) -> Result<i16, AdcError> {
        self.read_register(register::CONVERSION)
            .map(|raw| raw as i16)
    }

    fn attach_ready_interrupt(&mut self) {
        self.alert.clear_interrupt_pending_bit();
        self.alert.enable_interrupt(&mut self.exti);
    }

    fn detach_ready_interrupt(&mut self) {
        self.alert.disable_interrupt(&mut self.exti);
        self.alert.clear_interrupt_pending_bit();
    }
}
