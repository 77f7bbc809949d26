//! DS1302 real time clock on a bit-banged three wire bus

use datalogger_core::peripherals::{Clock, DateTime};
use embedded_hal::blocking::delay::DelayUs;
use stm32f7xx_hal::gpio::{DynamicPin, Output, Pin, PinState};

use crate::delay::BusyDelay;

const CLOCK_BURST_READ: u8 = 0xBF;
const CLOCK_HALT: u8 = 0x80;

pub struct Ds1302 {
    ce: Pin<'E', 4, Output>,
    sclk: Pin<'E', 5, Output>,
    io: DynamicPin<'E', 6>,
    delay: BusyDelay,
}

impl Ds1302 {
    pub fn new(
        mut ce: Pin<'E', 4, Output>,
        mut sclk: Pin<'E', 5, Output>,
        io: DynamicPin<'E', 6>,
        delay: BusyDelay,
    ) -> Self {
        ce.set_low();
        sclk.set_low();
        Self {
            ce,
            sclk,
            io,
            delay,
        }
    }

    /// Raw clock registers: seconds, minutes, hours, date, month, weekday, year
    fn read_clock_burst(&mut self) -> [u8; 7] {
        let mut registers = [0; 7];

        self.ce.set_high();
        self.delay.delay_us(4u8);

        self.write_byte(CLOCK_BURST_READ);
        for register in registers.iter_mut() {
            *register = self.read_byte();
        }

        self.ce.set_low();
        self.delay.delay_us(4u8);

        registers
    }

    /// LSB first, sampled by the clock on the rising edge
    fn write_byte(&mut self, byte: u8) {
        for bit in 0..8 {
            let state = if byte & (1 << bit) != 0 {
                PinState::High
            } else {
                PinState::Low
            };
            self.io.make_push_pull_output_in_state(state);
            self.delay.delay_us(1u8);
            self.sclk.set_high();
            self.delay.delay_us(1u8);

            // The first data bit is driven on the falling edge after the command
            if bit == 7 {
                self.io.make_floating_input();
            }
            self.sclk.set_low();
        }
    }

    /// LSB first, each bit valid after the falling edge
    fn read_byte(&mut self) -> u8 {
        let mut byte = 0;

        for bit in 0..8 {
            self.delay.delay_us(1u8);
            if self.io.is_high().unwrap_or(false) {
                byte |= 1 << bit;
            }
            self.sclk.set_high();
            self.delay.delay_us(1u8);
            self.sclk.set_low();
        }

        byte
    }
}

fn from_bcd(value: u8) -> u8 {
    (value >> 4) * 10 + (value & 0x0F)
}

impl Clock for Ds1302 {
    fn now(&mut self) -> DateTime {
        let [seconds, minutes, hours, date, month, weekday, year] = self.read_clock_burst();

        DateTime {
            year: 2000 + u16::from(from_bcd(year)),
            month: from_bcd(month & 0x1F),
            day: from_bcd(date & 0x3F),
            weekday: weekday & 0x07,
            // 24 hour mode
            hour: from_bcd(hours & 0x3F),
            minute: from_bcd(minutes & 0x7F),
            second: from_bcd(seconds & 0x7F),
        }
    }

    fn is_running(&mut self) -> bool {
        let [seconds, ..] = self.read_clock_burst();
        seconds & CLOCK_HALT == 0
    }
}
