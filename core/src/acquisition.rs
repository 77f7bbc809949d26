//! Interrupt driven acquisition
//!
//! The conversion-ready interrupt only raises [`DataReady`]. Everything else,
//! reading the converter, filling the window and flushing it to a sink, happens
//! in [`Acquisition::poll`] on the main loop. The window is never touched from
//! interrupt context.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::{
    channel::{select_channel, Channel, ChannelConfig, SampleRate},
    error::AdcError,
    peripherals::{Devices, ErrorContext},
    sink::{OutputMode, SinkDispatch, WindowSummary},
    window::{InsertOutcome, MeasurementWindow, WindowStats},
};

/// "New sample ready" flag shared with the conversion-ready interrupt
///
/// Single writer (the interrupt), single reader (the poll step), single bit.
#[derive(Debug)]
pub struct DataReady(AtomicBool);

impl DataReady {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Interrupt side, does nothing but store the flag
    #[inline(always)]
    pub fn signal(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Read and clear the flag
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::Acquire)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for DataReady {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcquisitionState {
    /// Ready interrupt detached
    Idle,
    /// Interrupt attached and configured, waiting for the start command
    Armed,
    /// Converting continuously, windows are filled and flushed
    Running,
}

/// Configuration change requested by the menu
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reconfigure {
    pub channel: Option<Channel>,
    pub rate: Option<SampleRate>,
    pub mode: Option<OutputMode>,
}

impl Reconfigure {
    pub const fn channel(channel: Channel) -> Self {
        Self {
            channel: Some(channel),
            rate: None,
            mode: None,
        }
    }

    pub const fn rate(rate: SampleRate) -> Self {
        Self {
            channel: None,
            rate: Some(rate),
            mode: None,
        }
    }

    pub const fn mode(mode: OutputMode) -> Self {
        Self {
            channel: None,
            rate: None,
            mode: Some(mode),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_none() && self.rate.is_none() && self.mode.is_none()
    }

    /// Later requests win per field
    fn merge(&mut self, newer: Reconfigure) {
        self.channel = newer.channel.or(self.channel);
        self.rate = newer.rate.or(self.rate);
        self.mode = newer.mode.or(self.mode);
    }
}

/// What a single [`Acquisition::poll`] did
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PollOutcome {
    Idle,
    AwaitingStart,
    Started,
    NoData,
    Sample(i16),
    Flushed(WindowStats),
    Dropped,
    ReadFailed,
}

pub struct Acquisition {
    state: AcquisitionState,
    window: MeasurementWindow,
    config: ChannelConfig,
    rate: SampleRate,
    mode: OutputMode,
    pending: Reconfigure,
    sinks: SinkDispatch,
    start_command: u8,
    overruns: u32,
    reported_overruns: u32,
    read_failures: u32,
    windows: u32,
}

impl Acquisition {
    pub fn new(
        channel: Channel,
        rate: SampleRate,
        mode: OutputMode,
        sinks: SinkDispatch,
        start_command: u8,
    ) -> Self {
        Self {
            state: AcquisitionState::Idle,
            window: MeasurementWindow::for_rate(rate),
            config: channel.config(),
            rate,
            mode,
            pending: Reconfigure::default(),
            sinks,
            start_command,
            overruns: 0,
            reported_overruns: 0,
            read_failures: 0,
            windows: 0,
        }
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    pub fn window(&self) -> &MeasurementWindow {
        &self.window
    }

    pub fn channel_config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn rate(&self) -> SampleRate {
        self.rate
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn pending(&self) -> Reconfigure {
        self.pending
    }

    /// Samples that arrived while the window was still full
    ///
    /// The window is flushed on the insert that completes it, so this stays at
    /// zero in normal operation. Conversions lost while the loop is stalled
    /// (a feedback cue, a slow card write) merge into a single ready flag and
    /// are not counted here.
    pub fn overruns(&self) -> u32 {
        self.overruns
    }

    pub fn read_failures(&self) -> u32 {
        self.read_failures
    }

    pub fn windows(&self) -> u32 {
        self.windows
    }

    /// Idle → Armed (SerialOnly) or Running
    ///
    /// Attaches the ready interrupt, programs rate and channel and sizes the
    /// window to the rate. In SerialOnly the acquisition waits for the start
    /// command before the first sample is taken.
    pub fn arm(
        &mut self,
        mode: OutputMode,
        channel: Channel,
        rate: SampleRate,
        ready: &DataReady,
        devices: &mut Devices<'_>,
    ) -> Result<(), AdcError> {
        if self.state != AcquisitionState::Idle {
            self.disarm(ready, devices);
        }

        devices.adc.attach_ready_interrupt();
        log::info!("Interrupt attached (falling edge for new data ready)");

        let armed = devices
            .adc
            .set_data_rate(rate)
            .and_then(|()| select_channel(devices.adc, channel));
        self.config = match armed {
            Ok(config) => config,
            Err(e) => {
                devices.adc.detach_ready_interrupt();
                return Err(e);
            }
        };

        self.rate = rate;
        self.mode = mode;
        self.pending = Reconfigure::default();
        self.resize_window();

        log::info!(
            "Coefficient: {}, offset: {}, window length: {}",
            self.config.coefficient,
            self.config.offset,
            self.window.capacity()
        );

        if mode == OutputMode::SerialOnly {
            self.state = AcquisitionState::Armed;
            ready.clear();
            devices.screen.render_waiting_for_start();
            log::info!("Waiting for start command");
        } else {
            self.start(ready, devices);
        }

        Ok(())
    }

    /// Back to Idle, drops the window in flight
    pub fn disarm(&mut self, ready: &DataReady, devices: &mut Devices<'_>) {
        devices.adc.detach_ready_interrupt();
        ready.clear();
        self.window.reset();
        self.pending = Reconfigure::default();
        self.state = AcquisitionState::Idle;
        log::info!(
            "Acquisition stopped after {} windows ({} samples dropped)",
            self.windows,
            self.overruns
        );
    }

    /// Request a configuration change
    ///
    /// Applied right away when nothing is in flight, otherwise deferred until
    /// the current window has been flushed.
    pub fn request(
        &mut self,
        change: Reconfigure,
        ready: &DataReady,
        devices: &mut Devices<'_>,
    ) -> Result<(), AdcError> {
        if self.state == AcquisitionState::Running && !self.window.is_empty() {
            self.pending.merge(change);
            log::debug!("Reconfiguration deferred to the end of the window");
            return Ok(());
        }

        self.apply(change, ready, devices)
    }

    fn apply(
        &mut self,
        change: Reconfigure,
        ready: &DataReady,
        devices: &mut Devices<'_>,
    ) -> Result<(), AdcError> {
        let applied = self.reprogram(change, devices);

        // A conversion signalled before the switch belongs to the old setup
        let touches_hardware = change.channel.is_some() || change.rate.is_some();
        if self.state != AcquisitionState::Idle && touches_hardware {
            ready.clear();
        }

        applied
    }

    fn reprogram(
        &mut self,
        change: Reconfigure,
        devices: &mut Devices<'_>,
    ) -> Result<(), AdcError> {
        if let Some(mode) = change.mode {
            self.mode = mode;
        }

        // Without an active acquisition the window is sized on the next arm
        let active = self.state != AcquisitionState::Idle;

        if let Some(rate) = change.rate {
            if active {
                devices.adc.set_data_rate(rate)?;
            }
            self.rate = rate;
            if active {
                self.resize_window();
            }
        }

        if change.channel.is_some() || (active && change.rate.is_some()) {
            let channel = change.channel.unwrap_or(self.config.channel);
            self.config = select_channel(devices.adc, channel)?;
        }

        Ok(())
    }

    fn resize_window(&mut self) {
        self.window.reset();
        if let Err(e) = self.window.set_capacity(self.rate.window_len()) {
            log::error!("Failed to size window: {}", e);
        }
    }

    fn start(&mut self, ready: &DataReady, devices: &mut Devices<'_>) {
        ready.clear();
        self.window.reset();
        self.sinks.begin_run();
        self.state = AcquisitionState::Running;

        if self.mode == OutputMode::SerialOnly {
            let header = writeln!(devices.serial, "START")
                .and_then(|()| writeln!(devices.serial, "{}", self.config.channel))
                .and_then(|()| writeln!(devices.serial, "{}", self.rate));
            if header.is_err() {
                log::warn!("Failed to write stream header");
            }
        }

        let timestamp = devices.clock.now().time_of_day();
        devices
            .screen
            .render_measurement(self.mode, self.config.channel, &timestamp, 0.0);

        log::info!(
            "Acquisition running: {} on {} at {} SPS",
            self.mode,
            self.config.channel,
            self.rate
        );
    }

    /// One main loop step, never blocks
    pub fn poll(
        &mut self,
        ready: &DataReady,
        command: Option<u8>,
        devices: &mut Devices<'_>,
    ) -> PollOutcome {
        match self.state {
            AcquisitionState::Idle => PollOutcome::Idle,
            AcquisitionState::Armed => {
                if command == Some(self.start_command) {
                    self.start(ready, devices);
                    PollOutcome::Started
                } else {
                    PollOutcome::AwaitingStart
                }
            }
            AcquisitionState::Running => self.poll_running(ready, devices),
        }
    }

    fn poll_running(&mut self, ready: &DataReady, devices: &mut Devices<'_>) -> PollOutcome {
        if !ready.take() {
            return PollOutcome::NoData;
        }

        let sample = match devices.adc.last_conversion_result() {
            Ok(sample) => sample,
            Err(e) => {
                self.read_failures = self.read_failures.wrapping_add(1);
                log::warn!("Reading conversion failed: {}", e);
                return PollOutcome::ReadFailed;
            }
        };

        match self.window.insert(sample) {
            InsertOutcome::Accepted => {
                self.sinks.on_sample(self.mode, sample, devices);
                PollOutcome::Sample(sample)
            }
            InsertOutcome::Completed => {
                self.sinks.on_sample(self.mode, sample, devices);
                self.flush(ready, devices)
            }
            InsertOutcome::Overrun => {
                self.overruns = self.overruns.wrapping_add(1);
                log::debug!("Window full, sample dropped");
                PollOutcome::Dropped
            }
        }
    }

    fn flush(&mut self, ready: &DataReady, devices: &mut Devices<'_>) -> PollOutcome {
        let stats = self.window.stats();
        if let Some(stats) = stats {
            let summary = WindowSummary::new(self.config, stats);
            self.sinks.on_window(self.mode, &summary, devices);
        }
        self.window.reset();
        self.windows = self.windows.wrapping_add(1);

        if self.overruns != self.reported_overruns {
            log::warn!("{} samples dropped on overrun so far", self.overruns);
            self.reported_overruns = self.overruns;
        }

        // Window is empty, this is the safe point for deferred changes
        if !self.pending.is_empty() {
            let change = core::mem::take(&mut self.pending);
            if let Err(e) = self.apply(change, ready, devices) {
                log::error!("Deferred reconfiguration failed: {}", e);
                devices.screen.render_error(ErrorContext::Adc);
                devices.feedback.error();
            }
        }

        match stats {
            Some(stats) => PollOutcome::Flushed(stats),
            None => PollOutcome::NoData,
        }
    }
}
