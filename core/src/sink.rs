use core::{fmt, fmt::Write, str::FromStr};

use crate::{
    channel::ChannelConfig,
    error::{ConfigError, StorageError},
    peripherals::{Devices, ErrorContext, TimeOfDay},
    window::WindowStats,
};

/// Start marker of every per-sample frame on the serial stream
pub const FRAME_START: u8 = 0xCC;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputMode {
    SdOnly,
    DisplayOnly,
    SerialOnly,
}

impl OutputMode {
    /// Order of the output mode ring in the menu
    pub const ALL: [OutputMode; 3] = [
        OutputMode::SdOnly,
        OutputMode::DisplayOnly,
        OutputMode::SerialOnly,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            OutputMode::SdOnly => "SD_ONLY",
            OutputMode::DisplayOnly => "DISPLAY_ONLY",
            OutputMode::SerialOnly => "SERIAL_ONLY",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for OutputMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OutputMode::ALL
            .into_iter()
            .find(|mode| mode.label().eq_ignore_ascii_case(s))
            .ok_or(ConfigError::UnknownMode)
    }
}

/// Frame sent for every accepted sample in [`OutputMode::SerialOnly`]
pub const fn sample_frame(sample: i16) -> [u8; 3] {
    let [high, low] = sample.to_be_bytes();
    [FRAME_START, high, low]
}

/// A completed window, ready for a sink
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WindowSummary {
    pub channel: ChannelConfig,
    pub stats: WindowStats,
    pub physical_mean: f32,
}

impl WindowSummary {
    pub fn new(channel: ChannelConfig, stats: WindowStats) -> Self {
        Self {
            channel,
            stats,
            physical_mean: channel.to_physical(stats.mean),
        }
    }
}

type RecordLine = heapless::String<96>;

/// Routes samples and completed windows to the sink of the active mode
///
/// Sink failures are reported and counted, they never stop the acquisition.
pub struct SinkDispatch {
    data_log_path: heapless::String<32>,
    failed_records: u32,
    /// A card write failure was already shown in this run
    write_failure_shown: bool,
}

impl SinkDispatch {
    pub fn new(data_log_path: &str) -> Self {
        let mut path = heapless::String::new();
        if path.push_str(data_log_path).is_err() {
            log::error!("Data log path '{}' is too long", data_log_path);
        }

        Self {
            data_log_path: path,
            failed_records: 0,
            write_failure_shown: false,
        }
    }

    /// Called when an acquisition starts
    pub fn begin_run(&mut self) {
        self.write_failure_shown = false;
    }

    pub fn failed_records(&self) -> u32 {
        self.failed_records
    }

    /// Called for every sample accepted into the window
    pub fn on_sample(&mut self, mode: OutputMode, sample: i16, devices: &mut Devices<'_>) {
        if mode == OutputMode::SerialOnly {
            devices.serial.write_bytes(&sample_frame(sample));
        }
    }

    /// Called once per completed window, before it is reset
    pub fn on_window(
        &mut self,
        mode: OutputMode,
        summary: &WindowSummary,
        devices: &mut Devices<'_>,
    ) {
        let timestamp = devices.clock.now().time_of_day();
        let channel = summary.channel.channel;

        log::info!(
            "{} window: mean {} ({} {}), std {}",
            channel,
            summary.stats.mean,
            summary.physical_mean,
            channel.unit(),
            summary.stats.std_dev
        );

        match mode {
            OutputMode::SerialOnly => {
                if writeln!(devices.serial, "Mean: {:.2}", summary.stats.mean).is_err() {
                    self.record_failure("serial");
                }
            }
            OutputMode::DisplayOnly => {
                devices
                    .screen
                    .render_measurement(mode, channel, &timestamp, summary.physical_mean);
            }
            OutputMode::SdOnly => {
                if let Err(e) = self.append_record(&timestamp, summary, devices) {
                    log::warn!("Dropping record: {}", e);
                    self.record_failure("SD");
                    self.show_write_failure(e, devices);
                }
            }
        }
    }

    fn append_record(
        &self,
        timestamp: &TimeOfDay,
        summary: &WindowSummary,
        devices: &mut Devices<'_>,
    ) -> Result<(), StorageError> {
        let line = record_line(timestamp, summary).ok_or(StorageError::Write)?;
        devices
            .storage
            .append(&self.data_log_path, line.as_bytes())
    }

    /// Once per run, the card may keep failing for every window
    fn show_write_failure(&mut self, error: StorageError, devices: &mut Devices<'_>) {
        if self.write_failure_shown {
            return;
        }
        self.write_failure_shown = true;

        devices.screen.render_error(ErrorContext::StorageWrite);
        if writeln!(devices.serial, "SD write failed: {}", error).is_err() {
            log::warn!("Writing failure notice failed");
        }
    }

    fn record_failure(&mut self, sink: &str) {
        self.failed_records = self.failed_records.wrapping_add(1);
        log::warn!(
            "Writing to {} failed, {} records lost so far",
            sink,
            self.failed_records
        );
    }
}

/// `HH:MM:SS,<channel>,<raw mean>,<raw std>,<physical mean>`
fn record_line(timestamp: &TimeOfDay, summary: &WindowSummary) -> Option<RecordLine> {
    let mut line = RecordLine::new();
    writeln!(
        line,
        "{},{},{:.3},{:.3},{:.6}",
        timestamp,
        summary.channel.channel,
        summary.stats.mean,
        summary.stats.std_dev,
        summary.physical_mean
    )
    .ok()?;
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        channel::Channel,
        testing::{Rig, ScreenCall},
    };

    fn summary(channel: Channel, mean: f32) -> WindowSummary {
        WindowSummary::new(
            channel.config(),
            WindowStats {
                len: 8,
                mean,
                std_dev: 1.5,
                last_sample: 100,
            },
        )
    }

    #[test]
    fn frame_layout() {
        assert_eq!(sample_frame(0x1234), [0xCC, 0x12, 0x34]);
        assert_eq!(sample_frame(-2), [0xCC, 0xFF, 0xFE]);
        assert_eq!(sample_frame(i16::MIN), [0xCC, 0x80, 0x00]);
    }

    #[test]
    fn serial_frames_per_sample() {
        let mut rig = Rig::default();
        let mut sinks = SinkDispatch::new("/DATALOG.TXT");

        sinks.on_sample(OutputMode::SerialOnly, 0x1234, &mut rig.devices());
        assert_eq!(rig.serial.bytes, [0xCC, 0x12, 0x34]);

        sinks.on_sample(OutputMode::DisplayOnly, 0x1234, &mut rig.devices());
        sinks.on_sample(OutputMode::SdOnly, 0x1234, &mut rig.devices());
        assert_eq!(rig.serial.bytes.len(), 3);
    }

    #[test]
    fn serial_mean_line() {
        let mut rig = Rig::default();
        let mut sinks = SinkDispatch::new("/DATALOG.TXT");

        sinks.on_window(
            OutputMode::SerialOnly,
            &summary(Channel::Voltage, 100.0),
            &mut rig.devices(),
        );

        assert_eq!(rig.serial.text(), "Mean: 100.00\n");
        assert!(rig.screen.calls.is_empty());
        assert!(rig.storage.appended.is_empty());
    }

    #[test]
    fn display_gets_physical_mean() {
        let mut rig = Rig::default();
        rig.clock.now.hour = 9;
        rig.clock.now.minute = 30;
        let mut sinks = SinkDispatch::new("/DATALOG.TXT");

        sinks.on_window(
            OutputMode::DisplayOnly,
            &summary(Channel::Current, 1000.0),
            &mut rig.devices(),
        );

        match rig.screen.calls.as_slice() {
            [ScreenCall::Measurement(OutputMode::DisplayOnly, Channel::Current, ts, mean)] => {
                assert_eq!(ts.as_str(), "09:30:00");
                assert!((mean - 0.9375).abs() < 1e-6);
            }
            calls => panic!("unexpected screen calls {calls:?}"),
        }
        assert!(rig.serial.bytes.is_empty());
    }

    #[test]
    fn sd_appends_record() {
        let mut rig = Rig::default();
        rig.clock.now.hour = 12;
        let mut sinks = SinkDispatch::new("/DATALOG.TXT");

        sinks.on_window(
            OutputMode::SdOnly,
            &summary(Channel::Resistance, 0.5),
            &mut rig.devices(),
        );

        assert_eq!(
            rig.storage.appended,
            [(
                "/DATALOG.TXT".to_string(),
                "12:00:00,Resistance,0.500,1.500,3.072000\n".to_string()
            )]
        );
    }

    #[test]
    fn sd_failure_is_soft() {
        let mut rig = Rig::default();
        rig.storage.fail_append = true;
        let mut sinks = SinkDispatch::new("/DATALOG.TXT");

        sinks.on_window(
            OutputMode::SdOnly,
            &summary(Channel::Voltage, 1.0),
            &mut rig.devices(),
        );
        sinks.on_window(
            OutputMode::SdOnly,
            &summary(Channel::Voltage, 1.0),
            &mut rig.devices(),
        );

        assert_eq!(sinks.failed_records(), 2);
        assert!(rig.storage.appended.is_empty());
        assert_eq!(rig.screen.calls, [ScreenCall::Error(ErrorContext::StorageWrite)]);
        assert!(rig.serial.text().starts_with("SD write failed"));
        assert_eq!(rig.serial.text().lines().count(), 1);

        sinks.begin_run();
        sinks.on_window(
            OutputMode::SdOnly,
            &summary(Channel::Voltage, 1.0),
            &mut rig.devices(),
        );
        assert_eq!(rig.screen.calls.len(), 2);
    }

    #[test]
    fn mode_from_str() {
        assert_eq!("sd_only".parse::<OutputMode>(), Ok(OutputMode::SdOnly));
        assert_eq!(
            "wifi_only".parse::<OutputMode>(),
            Err(ConfigError::UnknownMode)
        );
    }
}
