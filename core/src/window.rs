use heapless::Vec;

use crate::{channel::SampleRate, error::WindowError};

/// Largest window the logger can hold, one second at the fastest rate
pub const MAX_WINDOW_LEN: usize = SampleRate::FASTEST.sps() as usize;

/// What happened to a sample handed to [`MeasurementWindow::insert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InsertOutcome {
    /// Stored, the window still has room
    Accepted,
    /// Stored, and the window is now full
    Completed,
    /// The window was already full, the sample was dropped
    Overrun,
}

/// Statistics over the samples currently held in a window
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WindowStats {
    pub len: usize,
    pub mean: f32,
    /// Population standard deviation
    pub std_dev: f32,
    pub last_sample: i16,
}

/// Fixed capacity window of raw conversions with running statistics
///
/// The window is filled one sample at a time and stops accepting samples once
/// `capacity` is reached. It only accepts new samples again after [`reset`].
///
/// [`reset`]: MeasurementWindow::reset
pub struct MeasurementWindow {
    samples: Vec<i16, MAX_WINDOW_LEN>,
    capacity: usize,
    sum: i64,
    sum_of_squares: i64,
}

impl MeasurementWindow {
    pub fn new(capacity: usize) -> Result<Self, WindowError> {
        let mut window = Self {
            samples: Vec::new(),
            capacity: 1,
            sum: 0,
            sum_of_squares: 0,
        };
        window.set_capacity(capacity)?;
        Ok(window)
    }

    /// Window holding one second of conversions at `rate`
    pub fn for_rate(rate: SampleRate) -> Self {
        Self {
            samples: Vec::new(),
            capacity: rate.window_len(),
            sum: 0,
            sum_of_squares: 0,
        }
    }

    /// Resize the window
    ///
    /// A partially filled window can not be resized, it would mix samples
    /// of two configurations into one statistic. A full window is cleared.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<(), WindowError> {
        if capacity == 0 || capacity > MAX_WINDOW_LEN {
            return Err(WindowError::CapacityOutOfRange(capacity));
        }

        if !self.is_empty() && !self.is_full() {
            return Err(WindowError::WindowInFlight {
                len: self.len(),
                capacity: self.capacity,
            });
        }

        self.reset();
        self.capacity = capacity;
        Ok(())
    }

    pub fn insert(&mut self, sample: i16) -> InsertOutcome {
        if self.is_full() {
            return InsertOutcome::Overrun;
        }

        // Capacity never exceeds the backing storage, so this can't fail
        if self.samples.push(sample).is_err() {
            return InsertOutcome::Overrun;
        }

        let sample = i64::from(sample);
        self.sum += sample;
        self.sum_of_squares += sample * sample;

        if self.is_full() {
            InsertOutcome::Completed
        } else {
            InsertOutcome::Accepted
        }
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.sum = 0;
        self.sum_of_squares = 0;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn last_sample(&self) -> Option<i16> {
        self.samples.last().copied()
    }

    pub fn mean(&self) -> Option<f32> {
        if self.is_empty() {
            return None;
        }

        Some((self.sum as f64 / self.len() as f64) as f32)
    }

    pub fn std_dev(&self) -> Option<f32> {
        if self.is_empty() {
            return None;
        }

        // n² · variance, exact in integers
        let n = self.len() as i128;
        let scaled = n * i128::from(self.sum_of_squares) - i128::from(self.sum).pow(2);
        let variance = scaled as f64 / (n * n) as f64;

        Some(libm::sqrt(variance) as f32)
    }

    pub fn stats(&self) -> Option<WindowStats> {
        Some(WindowStats {
            len: self.len(),
            mean: self.mean()?,
            std_dev: self.std_dev()?,
            last_sample: self.last_sample()?,
        })
    }
}
