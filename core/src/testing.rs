//! Recording collaborators for the unit tests

use std::{collections::VecDeque, fmt};

use crate::{
    acquisition::DataReady,
    channel::{Channel, Gain, Mux, SampleRate},
    config::AccessPointConfig,
    error::{AdcError, StorageError},
    menu::MenuView,
    peripherals::{
        Adc, Clock, DateTime, DeviceStatus, Devices, ErrorContext, Feedback, InputSample, Inputs,
        Network, Screen, SerialPort, Storage, TimeOfDay,
    },
    sink::OutputMode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdcCall {
    Init,
    Configure(Gain, Mux),
    SetDataRate(SampleRate),
    BeginContinuous,
    Read,
    AttachInterrupt,
    DetachInterrupt,
}

#[derive(Debug, Default)]
pub struct MockAdc {
    pub calls: Vec<AdcCall>,
    pub conversions: VecDeque<i16>,
    pub fail_init: bool,
    pub fail_configure: bool,
    pub fail_data_rate: bool,
    pub fail_read: bool,
}

impl Adc for MockAdc {
    fn init(&mut self) -> Result<(), AdcError> {
        self.calls.push(AdcCall::Init);
        if self.fail_init {
            return Err(AdcError::NotResponding);
        }
        Ok(())
    }

    fn configure(&mut self, gain: Gain, mux: Mux) -> Result<(), AdcError> {
        self.calls.push(AdcCall::Configure(gain, mux));
        if self.fail_configure {
            return Err(AdcError::Bus);
        }
        Ok(())
    }

    fn set_data_rate(&mut self, rate: SampleRate) -> Result<(), AdcError> {
        self.calls.push(AdcCall::SetDataRate(rate));
        if self.fail_data_rate {
            return Err(AdcError::Bus);
        }
        Ok(())
    }

    fn begin_continuous_conversion(&mut self) -> Result<(), AdcError> {
        self.calls.push(AdcCall::BeginContinuous);
        Ok(())
    }

    fn last_conversion_result(&mut self) -> Result<i16, AdcError> {
        self.calls.push(AdcCall::Read);
        if self.fail_read {
            return Err(AdcError::Bus);
        }
        Ok(self.conversions.pop_front().unwrap_or_default())
    }

    fn attach_ready_interrupt(&mut self) {
        self.calls.push(AdcCall::AttachInterrupt);
    }

    fn detach_ready_interrupt(&mut self) {
        self.calls.push(AdcCall::DetachInterrupt);
    }
}

#[derive(Debug, Default)]
pub struct MockInputs {
    pub queue: VecDeque<InputSample>,
}

impl Inputs for MockInputs {
    fn poll(&mut self) -> InputSample {
        self.queue.pop_front().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScreenCall {
    Menu(MenuView),
    Measurement(OutputMode, Channel, String, f32),
    Error(ErrorContext),
    Status(DeviceStatus),
    WaitingForStart,
}

#[derive(Debug, Default)]
pub struct MockScreen {
    pub calls: Vec<ScreenCall>,
    /// Raised from inside `render_measurement`, like an interrupt landing
    /// while the display is being written
    pub raise_on_measurement: Option<&'static DataReady>,
}

impl Screen for MockScreen {
    fn render_menu(&mut self, view: MenuView) {
        self.calls.push(ScreenCall::Menu(view));
    }

    fn render_measurement(
        &mut self,
        mode: OutputMode,
        channel: Channel,
        timestamp: &TimeOfDay,
        mean: f32,
    ) {
        self.calls.push(ScreenCall::Measurement(
            mode,
            channel,
            timestamp.to_string(),
            mean,
        ));
        if let Some(ready) = self.raise_on_measurement {
            ready.signal();
        }
    }

    fn render_error(&mut self, context: ErrorContext) {
        self.calls.push(ScreenCall::Error(context));
    }

    fn render_status(&mut self, status: &DeviceStatus) {
        self.calls.push(ScreenCall::Status(*status));
    }

    fn render_waiting_for_start(&mut self) {
        self.calls.push(ScreenCall::WaitingForStart);
    }
}

#[derive(Debug)]
pub struct MockStorage {
    pub mountable: bool,
    pub fail_append: bool,
    pub truncated: Vec<String>,
    pub appended: Vec<(String, String)>,
}

impl Default for MockStorage {
    fn default() -> Self {
        Self {
            mountable: true,
            fail_append: false,
            truncated: Vec::new(),
            appended: Vec::new(),
        }
    }
}

impl Storage for MockStorage {
    fn mount(&mut self) -> bool {
        self.mountable
    }

    fn create_or_truncate(&mut self, path: &str) -> Result<(), StorageError> {
        if !self.mountable {
            return Err(StorageError::NotMounted);
        }
        self.truncated.push(path.to_string());
        Ok(())
    }

    fn append(&mut self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        if !self.mountable {
            return Err(StorageError::NotMounted);
        }
        if self.fail_append {
            return Err(StorageError::Write);
        }
        self.appended.push((
            path.to_string(),
            String::from_utf8_lossy(bytes).into_owned(),
        ));
        Ok(())
    }
}

#[derive(Debug)]
pub struct MockNetwork {
    pub available: bool,
    pub started: Option<String>,
}

impl Default for MockNetwork {
    fn default() -> Self {
        Self {
            available: true,
            started: None,
        }
    }
}

impl Network for MockNetwork {
    fn start_access_point(&mut self, config: &AccessPointConfig) -> bool {
        self.started = Some(config.ssid.as_str().to_string());
        self.available
    }
}

#[derive(Debug)]
pub struct MockClock {
    pub now: DateTime,
    pub running: bool,
}

impl Default for MockClock {
    fn default() -> Self {
        Self {
            now: DateTime::default(),
            running: true,
        }
    }
}

impl Clock for MockClock {
    fn now(&mut self) -> DateTime {
        self.now
    }

    fn is_running(&mut self) -> bool {
        self.running
    }
}

#[derive(Debug, Default)]
pub struct MockSerial {
    pub bytes: Vec<u8>,
}

impl MockSerial {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

impl fmt::Write for MockSerial {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.bytes.extend_from_slice(s.as_bytes());
        Ok(())
    }
}

impl SerialPort for MockSerial {
    fn write_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackCall {
    Scroll,
    Select,
    Error,
}

#[derive(Debug, Default)]
pub struct MockFeedback {
    pub calls: Vec<FeedbackCall>,
}

impl Feedback for MockFeedback {
    fn scroll(&mut self) {
        self.calls.push(FeedbackCall::Scroll);
    }

    fn select(&mut self) {
        self.calls.push(FeedbackCall::Select);
    }

    fn error(&mut self) {
        self.calls.push(FeedbackCall::Error);
    }
}

/// One of every collaborator
#[derive(Debug, Default)]
pub struct Rig {
    pub adc: MockAdc,
    pub inputs: MockInputs,
    pub screen: MockScreen,
    pub storage: MockStorage,
    pub network: MockNetwork,
    pub clock: MockClock,
    pub serial: MockSerial,
    pub feedback: MockFeedback,
}

impl Rig {
    pub fn devices(&mut self) -> Devices<'_> {
        Devices {
            adc: &mut self.adc,
            inputs: &mut self.inputs,
            screen: &mut self.screen,
            storage: &mut self.storage,
            network: &mut self.network,
            clock: &mut self.clock,
            serial: &mut self.serial,
            feedback: &mut self.feedback,
        }
    }
}
