//! Settings image in the nRF52840's internal flash.
//!
//! The encoded [`StorageImage`] is kept as a single `sequential-storage`
//! map item, which takes care of wear levelling and page erasure inside the
//! reserved region.

use embedded_storage_async::nor_flash::NorFlash;

use super::{StorageImage, IMAGE_MAX_LEN};
use crate::error::StorageError;
use crate::config::{STORAGE_FLASH_PAGE_COUNT, STORAGE_FLASH_PAGE_START};

/// Flash page size for nRF52840 (4 KB).
const FLASH_PAGE_SIZE: u32 = 4096;

/// Start address of our storage region.
const STORAGE_START: u32 = STORAGE_FLASH_PAGE_START * FLASH_PAGE_SIZE;

/// End address (exclusive) of our storage region.
const STORAGE_END: u32 = (STORAGE_FLASH_PAGE_START + STORAGE_FLASH_PAGE_COUNT) * FLASH_PAGE_SIZE;

/// Key of the settings image in the map storage.
const KEY_SETTINGS: u8 = 0x01;

/// Scratch space for one item plus the map's item header.
const ITEM_BUF_LEN: usize = IMAGE_MAX_LEN + 64;

impl StorageImage {
    /// Replace this image with the one stored in flash. On any error the
    /// image is left blank, which the startup migration turns into factory
    /// defaults.
    pub async fn load_from_flash(&mut self, flash: &mut impl NorFlash) -> Result<(), StorageError> {
        let mut buf = [0u8; ITEM_BUF_LEN];
        *self = StorageImage::new();

        let item = sequential_storage::map::fetch_item::<u8, &[u8], _>(
            flash,
            STORAGE_START..STORAGE_END,
            &mut sequential_storage::cache::NoCache::new(),
            &mut buf,
            &KEY_SETTINGS,
        )
        .await
        .map_err(|e| {
            error!("Flash read error: {:?}", defmt::Debug2Format(&e));
            StorageError::Flash
        })?;

        *self = StorageImage::from_item(item)?;
        info!("Loaded settings from flash");
        Ok(())
    }

    /// Persist the image if it changed since the last load or save.
    pub async fn save_to_flash(&mut self, flash: &mut impl NorFlash) -> Result<(), StorageError> {
        if !self.is_dirty() {
            debug!("Settings unchanged, nothing to save");
            return Ok(());
        }

        let mut buf = [0u8; ITEM_BUF_LEN];
        let mut data_buf = [0u8; IMAGE_MAX_LEN];
        let len = self.encode(&mut data_buf)?;
        let item = &data_buf[..len];

        sequential_storage::map::store_item::<u8, &[u8], _>(
            flash,
            STORAGE_START..STORAGE_END,
            &mut sequential_storage::cache::NoCache::new(),
            &mut buf,
            &KEY_SETTINGS,
            &item,
        )
        .await
        .map_err(|e| {
            error!("Flash write error: {:?}", defmt::Debug2Format(&e));
            StorageError::Flash
        })?;

        info!("Saved settings ({} bytes) to flash", len);
        self.mark_clean();
        Ok(())
    }
}
