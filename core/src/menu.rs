//! Button and command driven menu
//!
//! The menu walks through a fixed page sequence. On the selector pages `up`
//! and `down` move through a ring of options, `select` moves on to the next
//! page. Changes reach the acquisition only through
//! [`Acquisition::request`](crate::acquisition::Acquisition::request), which
//! holds them back while a window is in flight.

use core::fmt;

use crate::{
    acquisition::{AcquisitionState, DataReady, Reconfigure},
    channel::{Channel, SampleRate},
    peripherals::{DeviceStatus, Devices, ErrorContext, InputSample},
    sink::OutputMode,
    state::LoggerState,
};

pub const UP_COMMAND: u8 = b'u';
pub const DOWN_COMMAND: u8 = b'd';
pub const SELECT_COMMAND: u8 = b's';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MenuPage {
    /// Collaborator probe shown at boot
    Status,
    OutputMode,
    InputChannel,
    SampleRate,
    /// Acquisition armed or running
    Logging,
}

/// What the selector pages show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MenuView {
    OutputMode(OutputMode),
    Channel(Channel),
    SampleRate(SampleRate),
}

impl fmt::Display for MenuView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MenuView::OutputMode(mode) => write!(f, "Mode selected: {mode}"),
            MenuView::Channel(channel) => write!(f, "Input selected: {channel}"),
            MenuView::SampleRate(rate) => write!(f, "Selected sample rate: {rate}"),
        }
    }
}

/// Logical inputs of one tick, button level or command byte
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Navigation {
    pub up: bool,
    pub down: bool,
    pub select: bool,
}

impl Navigation {
    pub fn decode(input: InputSample) -> Self {
        Self {
            up: input.buttons.up || input.command == Some(UP_COMMAND),
            down: input.buttons.down || input.command == Some(DOWN_COMMAND),
            select: input.buttons.select || input.command == Some(SELECT_COMMAND),
        }
    }

    pub fn is_idle(&self) -> bool {
        !(self.up || self.down || self.select)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Down,
    Up,
}

impl Step {
    /// `down` before `up`, matching the order the inputs are checked in
    fn from_navigation(navigation: Navigation) -> impl Iterator<Item = Step> {
        [
            navigation.down.then_some(Step::Down),
            navigation.up.then_some(Step::Up),
        ]
        .into_iter()
        .flatten()
    }
}

/// `down` moves forward through the ring, `up` backward, both wrapping
fn ring_step<T: Copy + PartialEq, const N: usize>(ring: &[T; N], current: T, step: Step) -> T {
    let index = ring.iter().position(|item| *item == current).unwrap_or(0);
    let next = match step {
        Step::Down => (index + 1) % N,
        Step::Up => (index + N - 1) % N,
    };
    ring[next]
}

/// `down` to the next smaller rate, `up` to the next larger, clamped
fn rate_step(current: SampleRate, step: Step) -> SampleRate {
    match step {
        Step::Down => current.slower(),
        Step::Up => current.faster(),
    }
}

impl LoggerState {
    pub(crate) fn navigate(
        &mut self,
        navigation: Navigation,
        ready: &DataReady,
        devices: &mut Devices<'_>,
    ) {
        if navigation.is_idle() {
            return;
        }

        for step in Step::from_navigation(navigation) {
            match self.page {
                MenuPage::Status => self.probe_status(devices),
                MenuPage::OutputMode => self.step_mode(step, ready, devices),
                MenuPage::InputChannel | MenuPage::Logging => {
                    self.step_channel(step, ready, devices)
                }
                MenuPage::SampleRate => self.step_rate(step, ready, devices),
            }
        }

        if navigation.select {
            self.select(ready, devices);
        }
    }

    pub(crate) fn probe_status(&mut self, devices: &mut Devices<'_>) {
        let status = DeviceStatus {
            network: devices
                .network
                .start_access_point(&self.config.access_point),
            storage: devices.storage.mount(),
            clock: devices.clock.is_running(),
        };

        log::info!(
            "Status: network {}, storage {}, clock {}",
            status.network,
            status.storage,
            status.clock
        );
        devices.screen.render_status(&status);
    }

    fn step_mode(&mut self, step: Step, ready: &DataReady, devices: &mut Devices<'_>) {
        let mode = ring_step(&OutputMode::ALL, self.mode, step);

        if mode == OutputMode::SdOnly && !self.prepare_storage(devices) {
            report(ErrorContext::StorageMount, devices);
            log::warn!("SD card not available, keeping {}", self.mode);
            return;
        }

        if let Err(e) = self
            .acquisition
            .request(Reconfigure::mode(mode), ready, devices)
        {
            log::error!("Mode change rejected: {}", e);
            return;
        }

        self.mode = mode;
        self.confirm(MenuView::OutputMode(mode), devices);
    }

    fn step_channel(&mut self, step: Step, ready: &DataReady, devices: &mut Devices<'_>) {
        let channel = ring_step(&Channel::ALL, self.channel, step);

        match self
            .acquisition
            .request(Reconfigure::channel(channel), ready, devices)
        {
            Ok(()) => {
                self.channel = channel;
                self.confirm(MenuView::Channel(channel), devices);
            }
            Err(e) => {
                log::error!("Selecting {} failed: {}", channel, e);
                report(ErrorContext::Adc, devices);
            }
        }
    }

    fn step_rate(&mut self, step: Step, ready: &DataReady, devices: &mut Devices<'_>) {
        let rate = rate_step(self.rate, step);
        if rate == self.rate {
            return;
        }

        if let Err(e) = self
            .acquisition
            .request(Reconfigure::rate(rate), ready, devices)
        {
            log::error!("Selecting {} SPS failed: {}", rate, e);
            report(ErrorContext::Adc, devices);
            return;
        }

        self.rate = rate;
        self.confirm(MenuView::SampleRate(rate), devices);
    }

    fn select(&mut self, ready: &DataReady, devices: &mut Devices<'_>) {
        let next = match self.page {
            MenuPage::Status => MenuPage::OutputMode,
            MenuPage::OutputMode => MenuPage::InputChannel,
            MenuPage::InputChannel => MenuPage::SampleRate,
            MenuPage::SampleRate => {
                if !self.start_logging(ready, devices) {
                    return;
                }
                MenuPage::Logging
            }
            MenuPage::Logging => {
                self.acquisition.disarm(ready, devices);
                MenuPage::OutputMode
            }
        };

        self.page = next;
        devices.feedback.select();
        log::info!("Menu page: {:?}", next);

        match next {
            MenuPage::OutputMode => devices.screen.render_menu(MenuView::OutputMode(self.mode)),
            MenuPage::InputChannel => devices.screen.render_menu(MenuView::Channel(self.channel)),
            MenuPage::SampleRate => devices.screen.render_menu(MenuView::SampleRate(self.rate)),
            MenuPage::Status | MenuPage::Logging => {}
        }
    }

    /// Preliminary control and arming of the acquisition
    fn start_logging(&mut self, ready: &DataReady, devices: &mut Devices<'_>) -> bool {
        if self.mode == OutputMode::SdOnly && !self.prepare_storage(devices) {
            report(ErrorContext::StorageMount, devices);
            log::warn!("SD card not available, not starting");
            return false;
        }

        match self
            .acquisition
            .arm(self.mode, self.channel, self.rate, ready, devices)
        {
            Ok(()) => true,
            Err(e) => {
                log::error!("Arming acquisition failed: {}", e);
                report(ErrorContext::Adc, devices);
                false
            }
        }
    }

    /// Mount the card and start a fresh session on it
    pub(crate) fn prepare_storage(&self, devices: &mut Devices<'_>) -> bool {
        if !devices.storage.mount() {
            log::warn!("Card mount failed");
            return false;
        }

        let session = devices
            .storage
            .create_or_truncate(&self.config.data_log_path)
            .and_then(|()| {
                devices
                    .storage
                    .create_or_truncate(&self.config.credits_path)
            })
            .and_then(|()| {
                devices
                    .storage
                    .append(&self.config.credits_path, CREDITS.as_bytes())
            });

        match session {
            Ok(()) => {
                log::info!("Created {}", self.config.data_log_path.as_str());
                true
            }
            Err(e) => {
                log::warn!("Preparing SD session failed: {}", e);
                false
            }
        }
    }

    fn confirm(&mut self, view: MenuView, devices: &mut Devices<'_>) {
        devices.feedback.scroll();
        log::info!("{}", view);

        // Keep the sample stream clean while it is running
        let streaming = self.mode == OutputMode::SerialOnly
            && self.acquisition.state() != AcquisitionState::Idle;
        if !streaming && writeln!(devices.serial, "{view}").is_err() {
            log::warn!("Writing confirmation failed");
        }

        if self.page != MenuPage::Logging {
            devices.screen.render_menu(view);
        }
    }
}

fn report(context: ErrorContext, devices: &mut Devices<'_>) {
    devices.screen.render_error(context);
    devices.feedback.error();
}

/// Banner on the diagnostic port at boot and in the credits file
pub const CREDITS: &str = concat!(
    "-------------------------------\n",
    "Data logger ",
    env!("CARGO_PKG_VERSION"),
    "\n",
    "-------------------------------\n",
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::LoggerConfig,
        peripherals::ButtonLevels,
        testing::{AdcCall, FeedbackCall, Rig, ScreenCall},
    };

    const DOWN: Navigation = Navigation {
        up: false,
        down: true,
        select: false,
    };
    const UP: Navigation = Navigation {
        up: true,
        down: false,
        select: false,
    };
    const SELECT: Navigation = Navigation {
        up: false,
        down: false,
        select: true,
    };

    fn state_on(page: MenuPage, config: LoggerConfig) -> LoggerState {
        let mut state = LoggerState::new(config);
        state.page = page;
        state
    }

    fn display_config() -> LoggerConfig {
        LoggerConfig {
            output_mode: OutputMode::DisplayOnly,
            sample_rate: SampleRate::Sps8,
            ..LoggerConfig::default()
        }
    }

    #[test]
    fn buttons_or_commands() {
        let pressed = Navigation::decode(InputSample {
            buttons: ButtonLevels {
                up: true,
                down: false,
                select: false,
            },
            command: Some(b's'),
        });
        assert_eq!(
            pressed,
            Navigation {
                up: true,
                down: false,
                select: true
            }
        );

        assert!(Navigation::decode(InputSample {
            buttons: ButtonLevels::default(),
            command: Some(b'F'),
        })
        .is_idle());
    }

    #[test]
    fn rings_wrap() {
        assert_eq!(
            ring_step(&OutputMode::ALL, OutputMode::SerialOnly, Step::Down),
            OutputMode::SdOnly
        );
        assert_eq!(
            ring_step(&OutputMode::ALL, OutputMode::SdOnly, Step::Up),
            OutputMode::SerialOnly
        );
        assert_eq!(
            ring_step(&Channel::ALL, Channel::Voltage, Step::Down),
            Channel::Current
        );
        assert_eq!(
            ring_step(&Channel::ALL, Channel::Resistance, Step::Down),
            Channel::Voltage
        );
        assert_eq!(
            ring_step(&Channel::ALL, Channel::Voltage, Step::Up),
            Channel::Resistance
        );
    }

    #[test]
    fn random_rate_steps_stay_in_set() {
        use rand::Rng;

        let mut rng = rand::thread_rng();
        let mut rate = SampleRate::Sps128;

        for _ in 0..1000 {
            let step = if rng.gen() { Step::Up } else { Step::Down };
            rate = rate_step(rate, step);
            assert!(SampleRate::ALL.contains(&rate));
        }

        for _ in 0..10 {
            rate = rate_step(rate, Step::Up);
        }
        assert_eq!(rate, SampleRate::Sps860);
        for _ in 0..10 {
            rate = rate_step(rate, Step::Down);
        }
        assert_eq!(rate, SampleRate::Sps8);
    }

    #[test]
    fn sd_mount_failure_keeps_mode() {
        let mut rig = Rig::default();
        rig.storage.mountable = false;
        let ready = DataReady::new();
        let mut state = state_on(MenuPage::OutputMode, display_config());

        // DisplayOnly → up → SdOnly
        state.navigate(UP, &ready, &mut rig.devices());

        assert_eq!(state.mode(), OutputMode::DisplayOnly);
        let errors = rig
            .screen
            .calls
            .iter()
            .filter(|call| **call == ScreenCall::Error(ErrorContext::StorageMount))
            .count();
        assert_eq!(errors, 1);
        assert_eq!(rig.feedback.calls, [FeedbackCall::Error]);
        assert!(rig.serial.text().is_empty());
    }

    #[test]
    fn sd_mode_starts_session() {
        let mut rig = Rig::default();
        let ready = DataReady::new();
        let mut state = state_on(MenuPage::OutputMode, display_config());

        state.navigate(UP, &ready, &mut rig.devices());

        assert_eq!(state.mode(), OutputMode::SdOnly);
        assert_eq!(rig.storage.truncated, ["/DATALOG.TXT", "/CREDITS.TXT"]);
        assert_eq!(rig.storage.appended[0].0, "/CREDITS.TXT");
        assert_eq!(rig.serial.text(), "Mode selected: SD_ONLY\n");
        assert_eq!(
            rig.screen.calls.last(),
            Some(&ScreenCall::Menu(MenuView::OutputMode(OutputMode::SdOnly)))
        );
        assert_eq!(rig.feedback.calls, [FeedbackCall::Scroll]);
    }

    #[test]
    fn channel_change_configures_adc() {
        let mut rig = Rig::default();
        let ready = DataReady::new();
        let mut state = state_on(MenuPage::InputChannel, display_config());

        state.navigate(DOWN, &ready, &mut rig.devices());

        assert_eq!(state.channel(), Channel::Current);
        assert!(rig.adc.calls.contains(&AdcCall::BeginContinuous));
        assert_eq!(rig.serial.text(), "Input selected: Current\n");
    }

    #[test]
    fn channel_error_keeps_channel() {
        let mut rig = Rig::default();
        rig.adc.fail_configure = true;
        let ready = DataReady::new();
        let mut state = state_on(MenuPage::InputChannel, display_config());

        state.navigate(UP, &ready, &mut rig.devices());

        assert_eq!(state.channel(), Channel::Voltage);
        assert_eq!(rig.screen.calls, [ScreenCall::Error(ErrorContext::Adc)]);
    }

    #[test]
    fn rate_clamps_without_cue() {
        let mut rig = Rig::default();
        let ready = DataReady::new();
        let mut state = state_on(MenuPage::SampleRate, display_config());

        state.navigate(DOWN, &ready, &mut rig.devices());
        assert_eq!(state.rate(), SampleRate::Sps8);
        assert!(rig.feedback.calls.is_empty());

        state.navigate(UP, &ready, &mut rig.devices());
        assert_eq!(state.rate(), SampleRate::Sps16);
        assert_eq!(rig.serial.text(), "Selected sample rate: 16\n");
        // Selecting a rate does not touch the hardware or the window
        assert!(rig.adc.calls.is_empty());
        assert_eq!(state.acquisition().window().capacity(), 8);
    }

    #[test]
    fn pages_advance_on_select() {
        let mut rig = Rig::default();
        let ready = DataReady::new();
        let mut state = state_on(MenuPage::Status, display_config());

        state.navigate(SELECT, &ready, &mut rig.devices());
        assert_eq!(state.page(), MenuPage::OutputMode);
        state.navigate(SELECT, &ready, &mut rig.devices());
        assert_eq!(state.page(), MenuPage::InputChannel);
        state.navigate(SELECT, &ready, &mut rig.devices());
        assert_eq!(state.page(), MenuPage::SampleRate);

        assert_eq!(
            rig.screen.calls,
            [
                ScreenCall::Menu(MenuView::OutputMode(OutputMode::DisplayOnly)),
                ScreenCall::Menu(MenuView::Channel(Channel::Voltage)),
                ScreenCall::Menu(MenuView::SampleRate(SampleRate::Sps8)),
            ]
        );
        assert_eq!(rig.feedback.calls, [FeedbackCall::Select; 3]);

        state.navigate(SELECT, &ready, &mut rig.devices());
        assert_eq!(state.page(), MenuPage::Logging);
        assert_eq!(state.acquisition().state(), AcquisitionState::Running);

        state.navigate(SELECT, &ready, &mut rig.devices());
        assert_eq!(state.page(), MenuPage::OutputMode);
        assert_eq!(state.acquisition().state(), AcquisitionState::Idle);
        assert_eq!(rig.adc.calls.last(), Some(&AdcCall::DetachInterrupt));
    }

    #[test]
    fn preliminary_control_blocks_start() {
        let mut rig = Rig::default();
        rig.storage.mountable = false;
        let ready = DataReady::new();
        let mut state = state_on(
            MenuPage::SampleRate,
            LoggerConfig {
                output_mode: OutputMode::SdOnly,
                ..display_config()
            },
        );

        state.navigate(SELECT, &ready, &mut rig.devices());

        assert_eq!(state.page(), MenuPage::SampleRate);
        assert_eq!(state.acquisition().state(), AcquisitionState::Idle);
        assert_eq!(
            rig.screen.calls,
            [ScreenCall::Error(ErrorContext::StorageMount)]
        );
        assert!(!rig.adc.calls.contains(&AdcCall::AttachInterrupt));
    }

    #[test]
    fn status_page_probes_collaborators() {
        let mut rig = Rig::default();
        rig.network.available = false;
        let ready = DataReady::new();
        let mut state = state_on(MenuPage::Status, display_config());

        state.navigate(DOWN, &ready, &mut rig.devices());

        assert_eq!(
            rig.screen.calls,
            [ScreenCall::Status(DeviceStatus {
                network: false,
                storage: true,
                clock: true,
            })]
        );
        assert_eq!(rig.network.started.as_deref(), Some("Logger-Access-Point"));
    }
}
