//! SSD1306 status display in terminal mode (16 columns, 8 rows)

use core::fmt::Write as _;

use datalogger_core::{
    menu::MenuView,
    peripherals::{DeviceStatus, ErrorContext, Screen, TimeOfDay},
    Channel, OutputMode,
};
use embedded_hal::blocking::i2c::Write;
use ssd1306::{
    mode::TerminalMode,
    prelude::*,
    size::DisplaySize128x64,
    I2CDisplayInterface, Ssd1306,
};

type Terminal<I2C> = Ssd1306<I2CInterface<I2C>, DisplaySize128x64, TerminalMode>;

pub struct Display<I2C> {
    terminal: Terminal<I2C>,
}

impl<I2C: Write> Display<I2C> {
    pub fn new(i2c: I2C) -> Self {
        let mut terminal = Ssd1306::new(
            I2CDisplayInterface::new(i2c),
            DisplaySize128x64,
            DisplayRotation::Rotate0,
        )
        .into_terminal_mode();

        if terminal.init().is_err() || terminal.clear().is_err() {
            defmt::warn!("Display did not initialize");
        }

        Self { terminal }
    }

    /// Clear and write the lines top to bottom
    fn show(&mut self, lines: core::fmt::Arguments<'_>) {
        let result = self
            .terminal
            .clear()
            .map_err(|_| core::fmt::Error)
            .and_then(|()| self.terminal.write_fmt(lines));

        if result.is_err() {
            defmt::warn!("Display write failed");
        }
    }
}

impl<I2C: Write> Screen for Display<I2C> {
    fn render_menu(&mut self, view: MenuView) {
        match view {
            MenuView::OutputMode(mode) => {
                self.show(format_args!("OUTPUT MODE\n\n> {}\n\nup/down  select", mode))
            }
            MenuView::Channel(channel) => {
                self.show(format_args!("INPUT CHANNEL\n\n> {}\n\nup/down  select", channel))
            }
            MenuView::SampleRate(rate) => {
                self.show(format_args!("SAMPLE RATE\n\n> {} SPS\n\nup/down  start", rate))
            }
        }
    }

    fn render_measurement(
        &mut self,
        mode: OutputMode,
        channel: Channel,
        timestamp: &TimeOfDay,
        mean: f32,
    ) {
        self.show(format_args!(
            "{}\n{}\n{}\n\n{:.4} {}",
            mode,
            timestamp,
            channel,
            mean,
            channel.unit()
        ));
    }

    fn render_error(&mut self, context: ErrorContext) {
        let message = match context {
            ErrorContext::StorageMount => "SD card\nnot mounted",
            ErrorContext::StorageWrite => "SD card\nwrite failed",
            ErrorContext::Adc => "ADC not\nresponding",
        };
        self.show(format_args!("ERROR\n\n{}", message));
    }

    fn render_status(&mut self, status: &DeviceStatus) {
        let state = |ok: bool| if ok { "ok" } else { "--" };
        self.show(format_args!(
            "STATUS\n\nNetwork  {}\nSD card  {}\nClock    {}\n\nselect",
            state(status.network),
            state(status.storage),
            state(status.clock)
        ));
    }

    fn render_waiting_for_start(&mut self) {
        self.show(format_args!("SERIAL_ONLY\n\nWaiting for\nstart command"));
    }
}
