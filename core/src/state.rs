use crate::{
    acquisition::{Acquisition, DataReady, PollOutcome, Reconfigure},
    channel::{Channel, SampleRate},
    config::LoggerConfig,
    error::FatalError,
    menu::{MenuPage, Navigation, CREDITS},
    peripherals::{Devices, ErrorContext},
    sink::{OutputMode, SinkDispatch},
};

/// Everything the main loop owns
///
/// `mode`, `channel` and `rate` are the menu selection. The acquisition keeps
/// the configuration it is actually converting with, the two only differ
/// while a change waits for the end of a window.
pub struct LoggerState {
    pub(crate) page: MenuPage,
    pub(crate) mode: OutputMode,
    pub(crate) channel: Channel,
    pub(crate) rate: SampleRate,
    pub(crate) acquisition: Acquisition,
    pub(crate) config: LoggerConfig,
}

impl LoggerState {
    pub fn new(config: LoggerConfig) -> Self {
        let acquisition = Acquisition::new(
            config.channel,
            config.sample_rate,
            config.output_mode,
            SinkDispatch::new(&config.data_log_path),
            config.start_command,
        );

        Self {
            page: MenuPage::Status,
            mode: config.output_mode,
            channel: config.channel,
            rate: config.sample_rate,
            acquisition,
            config,
        }
    }

    /// Boot sequence
    ///
    /// An ADC that does not answer is fatal, there is nothing to log without it.
    pub fn start(
        &mut self,
        ready: &DataReady,
        devices: &mut Devices<'_>,
    ) -> Result<(), FatalError> {
        if devices.serial.write_str(CREDITS).is_err() {
            log::warn!("Writing credits failed");
        }

        if let Err(e) = devices.adc.init() {
            log::error!("Failed to initialize ADC: {}", e);
            devices.screen.render_error(ErrorContext::Adc);
            devices.feedback.error();
            return Err(e.into());
        }
        log::info!("ADC initialized");

        self.acquisition
            .request(Reconfigure::channel(self.channel), ready, devices)?;

        self.page = MenuPage::Status;
        self.probe_status(devices);

        Ok(())
    }

    /// One iteration of the main loop
    ///
    /// Inputs are polled once and shared by the menu and the acquisition, so a
    /// command byte is consumed exactly once.
    pub fn tick(&mut self, ready: &DataReady, devices: &mut Devices<'_>) -> PollOutcome {
        let input = devices.inputs.poll();
        self.navigate(Navigation::decode(input), ready, devices);
        let outcome = self.acquisition.poll(ready, input.command, devices);
        self.follow_acquisition();
        outcome
    }

    /// Once nothing is pending the menu selection matches what the
    /// acquisition converts with, unless a deferred change was rejected
    fn follow_acquisition(&mut self) {
        if !self.acquisition.pending().is_empty() {
            return;
        }

        let channel = self.acquisition.channel_config().channel;
        let rate = self.acquisition.rate();
        if channel != self.channel || rate != self.rate {
            log::warn!("Selection reverted to {} at {} SPS", channel, rate);
            self.channel = channel;
            self.rate = rate;
        }
    }

    pub fn page(&self) -> MenuPage {
        self.page
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn rate(&self) -> SampleRate {
        self.rate
    }

    pub fn acquisition(&self) -> &Acquisition {
        &self.acquisition
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        acquisition::AcquisitionState,
        error::AdcError,
        peripherals::{ButtonLevels, InputSample},
        testing::{Rig, ScreenCall},
    };

    fn select() -> InputSample {
        InputSample {
            buttons: ButtonLevels {
                select: true,
                ..ButtonLevels::default()
            },
            command: None,
        }
    }

    fn command(byte: u8) -> InputSample {
        InputSample {
            buttons: ButtonLevels::default(),
            command: Some(byte),
        }
    }

    #[test]
    fn boot() {
        let mut rig = Rig::default();
        let ready = DataReady::new();
        let mut state = LoggerState::new(LoggerConfig::default());

        state.start(&ready, &mut rig.devices()).unwrap();

        assert!(rig.serial.text().starts_with("-----"));
        assert!(rig.serial.text().contains("Data logger"));
        assert_eq!(state.page(), MenuPage::Status);
        assert!(matches!(rig.screen.calls.as_slice(), [ScreenCall::Status(_)]));
    }

    #[test]
    fn adc_init_failure_is_fatal() {
        let mut rig = Rig::default();
        let ready = DataReady::new();
        rig.adc.fail_init = true;
        let mut state = LoggerState::new(LoggerConfig::default());

        assert_eq!(
            state.start(&ready, &mut rig.devices()),
            Err(FatalError::AdcInit(AdcError::NotResponding))
        );
        assert_eq!(rig.screen.calls, [ScreenCall::Error(ErrorContext::Adc)]);
    }

    #[test]
    fn serial_session_end_to_end() {
        let mut rig = Rig::default();
        let ready = DataReady::new();
        let mut state = LoggerState::new(LoggerConfig {
            sample_rate: SampleRate::Sps8,
            ..LoggerConfig::default()
        });
        state.start(&ready, &mut rig.devices()).unwrap();

        // Status → OutputMode → InputChannel → SampleRate → armed
        for _ in 0..4 {
            rig.inputs.queue.push_back(select());
            state.tick(&ready, &mut rig.devices());
        }
        assert_eq!(state.page(), MenuPage::Logging);
        assert_eq!(state.acquisition().state(), AcquisitionState::Armed);

        rig.serial.bytes.clear();
        rig.inputs.queue.push_back(command(b'F'));
        assert_eq!(state.tick(&ready, &mut rig.devices()), PollOutcome::Started);
        assert_eq!(rig.serial.text(), "START\nVoltage\n8\n");

        rig.serial.bytes.clear();
        rig.adc.conversions.push_back(0x1234);
        ready.signal();
        assert_eq!(
            state.tick(&ready, &mut rig.devices()),
            PollOutcome::Sample(0x1234)
        );
        assert_eq!(rig.serial.bytes, [0xCC, 0x12, 0x34]);

        // Select tears the acquisition down
        rig.inputs.queue.push_back(select());
        assert_eq!(state.tick(&ready, &mut rig.devices()), PollOutcome::Idle);
        assert_eq!(state.page(), MenuPage::OutputMode);
    }

    #[test]
    fn live_channel_switch_is_deferred() {
        let mut rig = Rig::default();
        let ready = DataReady::new();
        let mut state = LoggerState::new(LoggerConfig {
            output_mode: OutputMode::DisplayOnly,
            sample_rate: SampleRate::Sps8,
            ..LoggerConfig::default()
        });
        state.start(&ready, &mut rig.devices()).unwrap();
        for _ in 0..4 {
            rig.inputs.queue.push_back(select());
            state.tick(&ready, &mut rig.devices());
        }
        assert_eq!(state.acquisition().state(), AcquisitionState::Running);

        rig.adc.conversions.push_back(10);
        ready.signal();
        state.tick(&ready, &mut rig.devices());

        rig.inputs.queue.push_back(command(b'd'));
        state.tick(&ready, &mut rig.devices());
        assert_eq!(state.channel(), Channel::Current);
        assert_eq!(
            state.acquisition().channel_config().channel,
            Channel::Voltage
        );

        for sample in 0..7 {
            rig.adc.conversions.push_back(sample);
            ready.signal();
            state.tick(&ready, &mut rig.devices());
        }
        assert_eq!(
            state.acquisition().channel_config().channel,
            Channel::Current
        );
    }

    #[test]
    fn rejected_channel_change_reverts_selection() {
        let mut rig = Rig::default();
        let ready = DataReady::new();
        let mut state = LoggerState::new(LoggerConfig {
            output_mode: OutputMode::DisplayOnly,
            sample_rate: SampleRate::Sps8,
            ..LoggerConfig::default()
        });
        state.start(&ready, &mut rig.devices()).unwrap();
        for _ in 0..4 {
            rig.inputs.queue.push_back(select());
            state.tick(&ready, &mut rig.devices());
        }

        rig.adc.conversions.push_back(10);
        ready.signal();
        state.tick(&ready, &mut rig.devices());

        rig.inputs.queue.push_back(command(b'd'));
        state.tick(&ready, &mut rig.devices());
        assert_eq!(state.channel(), Channel::Current);

        rig.adc.fail_configure = true;
        for sample in 0..7 {
            rig.adc.conversions.push_back(sample);
            ready.signal();
            state.tick(&ready, &mut rig.devices());
        }

        assert_eq!(state.channel(), Channel::Voltage);
        assert_eq!(
            state.acquisition().channel_config().channel,
            Channel::Voltage
        );
        assert_eq!(rig.screen.calls.last(), Some(&ScreenCall::Error(ErrorContext::Adc)));
    }
}
