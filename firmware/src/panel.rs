//! Front panel: buttons, buzzer, status LED and the diagnostic UART

use core::fmt;

use datalogger_core::peripherals::{ButtonLevels, Feedback, InputSample, Inputs, SerialPort};
use embedded_hal::{
    blocking::delay::DelayMs,
    serial::{Read, Write},
};
use stm32f7xx_hal::{
    gpio::{Input, Output, Pin, PullDown},
    pac::USART3,
    serial::{Rx, Tx},
};

use crate::delay::BusyDelay;

const BEEP_MS: u16 = 40;
const SCROLL_SETTLE_MS: u16 = 100;
const SELECT_SETTLE_MS: u16 = 250;

pub struct Buttons {
    up: Pin<'F', 12, Input<PullDown>>,
    down: Pin<'F', 13, Input<PullDown>>,
    select: Pin<'F', 14, Input<PullDown>>,
    rx: Rx<USART3>,
    previous: ButtonLevels,
}

impl Buttons {
    pub fn new(
        up: Pin<'F', 12, Input<PullDown>>,
        down: Pin<'F', 13, Input<PullDown>>,
        select: Pin<'F', 14, Input<PullDown>>,
        rx: Rx<USART3>,
    ) -> Self {
        Self {
            up,
            down,
            select,
            rx,
            previous: ButtonLevels::default(),
        }
    }
}

impl Inputs for Buttons {
    /// Rising edges only, a held button counts once
    fn poll(&mut self) -> InputSample {
        let levels = ButtonLevels {
            up: self.up.is_high(),
            down: self.down.is_high(),
            select: self.select.is_high(),
        };
        let pressed = ButtonLevels {
            up: levels.up && !self.previous.up,
            down: levels.down && !self.previous.down,
            select: levels.select && !self.previous.select,
        };
        self.previous = levels;

        InputSample {
            buttons: pressed,
            command: self.rx.read().ok(),
        }
    }
}

pub struct Buzzer {
    buzzer: Pin<'G', 2, Output>,
    led: Pin<'B', 14, Output>,
    delay: BusyDelay,
}

impl Buzzer {
    pub fn new(buzzer: Pin<'G', 2, Output>, led: Pin<'B', 14, Output>, delay: BusyDelay) -> Self {
        Self { buzzer, led, delay }
    }

    fn beep(&mut self, settle_ms: u16) {
        self.buzzer.set_high();
        self.delay.delay_ms(BEEP_MS);
        self.buzzer.set_low();
        self.delay.delay_ms(settle_ms);
    }
}

impl Feedback for Buzzer {
    fn scroll(&mut self) {
        self.led.set_low();
        self.beep(SCROLL_SETTLE_MS);
    }

    fn select(&mut self) {
        self.led.set_low();
        self.beep(SELECT_SETTLE_MS);
    }

    /// LED stays on until the next successful action
    fn error(&mut self) {
        self.led.set_high();
        for _ in 0..3 {
            self.beep(SCROLL_SETTLE_MS);
        }
    }
}

pub struct SerialOut {
    tx: Tx<USART3>,
}

impl SerialOut {
    pub fn new(tx: Tx<USART3>) -> Self {
        Self { tx }
    }
}

impl SerialPort for SerialOut {
    fn write_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            loop {
                match self.tx.write(byte) {
                    Ok(_) => break,
                    Err(_) => continue,
                }
            }
        }
    }
}

impl fmt::Write for SerialOut {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_bytes(s.as_bytes());
        Ok(())
    }
}
