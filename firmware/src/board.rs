//! Peripherals of the logger board, wired up to the core's collaborator traits

use datalogger_core::peripherals::Devices;
use stm32f7xx_hal::{
    gpio::{Alternate, Input, OpenDrain, Output, Pin, PullUp},
    i2c::BlockingI2c,
    pac::{I2C1, SPI3},
    spi::{self, Spi},
};

use crate::{
    ads1115::Ads1115,
    delay::BusyDelay,
    display::Display,
    network::EthernetLink,
    panel::{Buttons, Buzzer, SerialOut},
    rtc::Ds1302,
    storage::SdStorage,
};

pub type I2cBus = BlockingI2c<
    I2C1,
    Pin<'B', 8, Alternate<4, OpenDrain>>,
    Pin<'B', 9, Alternate<4, OpenDrain>>,
>;

/// Handle to I2C1, shared by the converter and the display
pub type I2cProxy = shared_bus::I2cProxy<'static, shared_bus::CortexMMutex<I2cBus>>;

pub type SdSpi = Spi<
    SPI3,
    (
        Pin<'C', 10, Alternate<6>>,
        Pin<'C', 11, Alternate<6>>,
        Pin<'C', 12, Alternate<6>>,
    ),
    spi::Enabled<u8>,
>;

pub type AdcAlert = Pin<'C', 6, Input<PullUp>>;

pub struct Board {
    pub adc: Ads1115<I2cProxy, AdcAlert>,
    pub display: Display<I2cProxy>,
    pub storage: SdStorage<SdSpi, Pin<'D', 14, Output>, BusyDelay>,
    pub network: EthernetLink,
    pub clock: Ds1302,
    pub buttons: Buttons,
    pub serial: SerialOut,
    pub buzzer: Buzzer,
}

impl Board {
    /// Borrow everything for one step of the main loop
    pub fn devices(&mut self) -> Devices<'_> {
        Devices {
            adc: &mut self.adc,
            inputs: &mut self.buttons,
            screen: &mut self.display,
            storage: &mut self.storage,
            network: &mut self.network,
            clock: &mut self.clock,
            serial: &mut self.serial,
            feedback: &mut self.buzzer,
        }
    }
}
