use embedded_hal::blocking::delay::{DelayMs, DelayUs};

/// Cycle counting delay
///
/// SysTick belongs to the RTIC monotonic, so blocking waits outside async
/// tasks spin on the core clock instead.
#[derive(Debug, Clone, Copy)]
pub struct BusyDelay {
    cycles_per_us: u32,
}

impl BusyDelay {
    pub fn new(sysclk: fugit::HertzU32) -> Self {
        Self {
            cycles_per_us: sysclk.to_MHz().max(1),
        }
    }
}

impl DelayUs<u32> for BusyDelay {
    fn delay_us(&mut self, us: u32) {
        cortex_m::asm::delay(us.saturating_mul(self.cycles_per_us));
    }
}

impl DelayUs<u8> for BusyDelay {
    fn delay_us(&mut self, us: u8) {
        DelayUs::<u32>::delay_us(self, u32::from(us));
    }
}

impl DelayMs<u16> for BusyDelay {
    fn delay_ms(&mut self, ms: u16) {
        for _ in 0..ms {
            DelayUs::<u32>::delay_us(self, 1_000);
        }
    }
}
