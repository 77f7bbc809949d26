//! FAT formatted SD card over SPI

use datalogger_core::{peripherals::Storage, StorageError};
use embedded_hal::{
    blocking::{
        delay::DelayUs,
        spi::{Transfer, Write},
    },
    digital::v2::OutputPin,
};
use embedded_sdmmc::{Mode, SdCard, TimeSource, Timestamp, Volume, VolumeIdx, VolumeManager};

/// File timestamps, the DS1302 is not shared with the card
pub struct FixedTime;

impl TimeSource for FixedTime {
    fn get_timestamp(&self) -> Timestamp {
        Timestamp {
            year_since_1970: 54,
            zero_indexed_month: 0,
            zero_indexed_day: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}

pub struct SdStorage<SPI, CS, DELAY>
where
    SPI: Transfer<u8> + Write<u8>,
    CS: OutputPin,
    DELAY: DelayUs<u8>,
    <SPI as Transfer<u8>>::Error: core::fmt::Debug,
    <SPI as Write<u8>>::Error: core::fmt::Debug,
{
    volumes: VolumeManager<SdCard<SPI, CS, DELAY>, FixedTime>,
    volume: Option<Volume>,
}

impl<SPI, CS, DELAY> SdStorage<SPI, CS, DELAY>
where
    SPI: Transfer<u8> + Write<u8>,
    CS: OutputPin,
    DELAY: DelayUs<u8>,
    <SPI as Transfer<u8>>::Error: core::fmt::Debug,
    <SPI as Write<u8>>::Error: core::fmt::Debug,
{
    pub fn new(spi: SPI, cs: CS, delay: DELAY) -> Self {
        Self {
            volumes: VolumeManager::new(SdCard::new(spi, cs, delay), FixedTime),
            volume: None,
        }
    }

    fn write_file(&mut self, path: &str, mode: Mode, bytes: &[u8]) -> Result<(), StorageError> {
        let volume = self.volume.ok_or(StorageError::NotMounted)?;
        // Everything lives in the root directory
        let name = path.trim_start_matches('/');

        let root = self
            .volumes
            .open_root_dir(volume)
            .map_err(|_| StorageError::Open)?;

        let written = match self.volumes.open_file_in_dir(root, name, mode) {
            Ok(file) => {
                let written = self.volumes.write(file, bytes);
                let closed = self.volumes.close_file(file);
                match (written, closed) {
                    (Ok(_), Ok(())) => Ok(()),
                    _ => Err(StorageError::Write),
                }
            }
            Err(e) => {
                defmt::warn!("Opening {} failed: {}", path, defmt::Debug2Format(&e));
                Err(StorageError::Open)
            }
        };

        if self.volumes.close_dir(root).is_err() {
            defmt::warn!("Closing root directory failed");
        }

        written
    }
}

impl<SPI, CS, DELAY> Storage for SdStorage<SPI, CS, DELAY>
where
    SPI: Transfer<u8> + Write<u8>,
    CS: OutputPin,
    DELAY: DelayUs<u8>,
    <SPI as Transfer<u8>>::Error: core::fmt::Debug,
    <SPI as Write<u8>>::Error: core::fmt::Debug,
{
    /// Re-initializes the card, so a card swapped since the last mount works
    fn mount(&mut self) -> bool {
        if let Some(volume) = self.volume.take() {
            if self.volumes.close_volume(volume).is_err() {
                defmt::warn!("Closing volume failed");
            }
        }

        self.volumes.device().mark_card_uninit();

        match self.volumes.open_volume(VolumeIdx(0)) {
            Ok(volume) => {
                self.volume = Some(volume);
                match self.volumes.device().num_bytes() {
                    Ok(size) => defmt::info!("SD card mounted, {=u64} MB", size / (1024 * 1024)),
                    Err(_) => defmt::info!("SD card mounted"),
                }
                true
            }
            Err(e) => {
                defmt::warn!("Card mount failed: {}", defmt::Debug2Format(&e));
                false
            }
        }
    }

    fn create_or_truncate(&mut self, path: &str) -> Result<(), StorageError> {
        self.write_file(path, Mode::ReadWriteCreateOrTruncate, &[])
    }

    fn append(&mut self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.write_file(path, Mode::ReadWriteCreateOrAppend, bytes)
    }
}
