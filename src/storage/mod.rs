//! Persistent settings and roster.
//!
//! The state machine talks to storage through the [`Storage`] trait. The
//! only implementation is [`StorageImage`], an in-RAM copy of the settings
//! with a dirty flag; the firmware mirrors it to internal flash (see
//! `flash.rs`) whenever an event left it dirty.
//!
//! Image layout (all multi-byte values little endian):
//!
//! ```text
//! [version][ac][bus address][emergency][invert][count u16][selected u16]
//! count × [address u16][name 10 bytes, NUL padded][functions 5 bytes]
//! ```

use crate::config::BUS_ADDRESS_UNCONFIGURED;
use crate::error::StorageError;
use crate::roster::{
    LocomotiveRecord, Roster, ADDRESS_MAX, ADDRESS_MIN, FUNCTION_BUTTONS, NAME_LEN,
    ROSTER_CAPACITY,
};

#[cfg(feature = "embedded")]
pub mod flash;

/// Layout version. A different stored value resets the settings.
pub const SCHEMA_VERSION: u8 = 2;

/// Header size in bytes.
pub const HEADER_LEN: usize = 9;

/// Size of one roster record in bytes.
pub const RECORD_LEN: usize = 2 + NAME_LEN + FUNCTION_BUTTONS;

/// Largest possible encoded image.
pub const IMAGE_MAX_LEN: usize = HEADER_LEN + ROSTER_CAPACITY * RECORD_LEN;

/// Value read from erased flash.
const ERASED: u8 = 0xFF;

/// A roster entry as persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoredLoco {
    pub address: u16,
    /// NUL padded ASCII.
    pub name: [u8; NAME_LEN],
    pub functions: [u8; FUNCTION_BUTTONS],
}

impl StoredLoco {
    pub fn from_record(record: &LocomotiveRecord) -> Self {
        let mut name = [0u8; NAME_LEN];
        let bytes = record.name.as_bytes();
        let len = bytes.len().min(NAME_LEN);
        name[..len].copy_from_slice(&bytes[..len]);
        Self {
            address: record.address,
            name,
            functions: record.functions,
        }
    }

    pub fn to_record(&self) -> LocomotiveRecord {
        let name = core::str::from_utf8(&self.name).unwrap_or("");
        LocomotiveRecord::new(self.address, self.functions, Some(name))
    }

    fn encode(&self, buf: &mut [u8]) {
        buf[0..2].copy_from_slice(&self.address.to_le_bytes());
        buf[2..2 + NAME_LEN].copy_from_slice(&self.name);
        buf[2 + NAME_LEN..RECORD_LEN].copy_from_slice(&self.functions);
    }

    fn decode(buf: &[u8]) -> Self {
        let mut name = [0u8; NAME_LEN];
        name.copy_from_slice(&buf[2..2 + NAME_LEN]);
        let mut functions = [0u8; FUNCTION_BUTTONS];
        functions.copy_from_slice(&buf[2 + NAME_LEN..RECORD_LEN]);
        Self {
            address: u16::from_le_bytes([buf[0], buf[1]]),
            name,
            functions,
        }
    }
}

/// Typed access to the persisted settings.
pub trait Storage {
    fn version(&self) -> u8;
    fn set_version(&mut self, version: u8);

    /// Own bus address, 1..=31, or 255 when not configured.
    fn bus_address(&self) -> u8;
    fn set_bus_address(&mut self, address: u8);

    fn ac_option(&self) -> bool;
    fn set_ac_option(&mut self, enabled: bool);

    /// Power button sends an emergency stop instead of track off.
    fn emergency_stop(&self) -> bool;
    fn set_emergency_stop(&mut self, enabled: bool);

    /// Reverse the encoder direction.
    fn invert_encoder(&self) -> bool;
    fn set_invert_encoder(&mut self, enabled: bool);

    fn loco_count(&self) -> u16;
    fn set_loco_count(&mut self, count: u16);

    fn selected_index(&self) -> u16;
    fn set_selected_index(&mut self, index: u16);

    fn loco(&self, index: u16) -> Option<StoredLoco>;
    fn set_loco(&mut self, index: u16, loco: &StoredLoco) -> Result<(), StorageError>;
}

/// In-RAM settings image.
#[derive(Clone, Debug)]
pub struct StorageImage {
    version: u8,
    ac_option: bool,
    bus_address: u8,
    emergency_stop: bool,
    invert_encoder: bool,
    loco_count: u16,
    selected_index: u16,
    locos: heapless::Vec<StoredLoco, ROSTER_CAPACITY>,
    dirty: bool,
}

impl Default for StorageImage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageImage {
    /// A blank image, as read from erased flash.
    pub const fn new() -> Self {
        Self {
            version: ERASED,
            ac_option: false,
            bus_address: BUS_ADDRESS_UNCONFIGURED,
            emergency_stop: false,
            invert_encoder: false,
            loco_count: 0,
            selected_index: 0,
            locos: heapless::Vec::new(),
            dirty: false,
        }
    }

    /// True when the image changed since the last [`mark_clean`](Self::mark_clean).
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Serialize into `buf`, returning the number of bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, StorageError> {
        let count = usize::from(self.loco_count).min(ROSTER_CAPACITY);
        let len = HEADER_LEN + count * RECORD_LEN;
        if buf.len() < len {
            return Err(StorageError::BufferTooSmall);
        }

        buf[0] = self.version;
        buf[1] = u8::from(self.ac_option);
        buf[2] = self.bus_address;
        buf[3] = u8::from(self.emergency_stop);
        buf[4] = u8::from(self.invert_encoder);
        buf[5..7].copy_from_slice(&(count as u16).to_le_bytes());
        buf[7..9].copy_from_slice(&self.selected_index.to_le_bytes());

        // Slots never written are persisted as address 0 and dropped on load.
        let blank = StoredLoco::default();
        for index in 0..count {
            let loco = self.locos.get(index).unwrap_or(&blank);
            let offset = HEADER_LEN + index * RECORD_LEN;
            loco.encode(&mut buf[offset..offset + RECORD_LEN]);
        }
        Ok(len)
    }

    /// Image held in a stored item. No item means erased flash and gives a
    /// blank image.
    pub fn from_item(item: Option<&[u8]>) -> Result<Self, StorageError> {
        match item {
            Some(data) => Self::decode(data),
            None => {
                info!("no stored settings");
                Ok(Self::new())
            }
        }
    }

    /// Parse an image produced by [`encode`](Self::encode).
    pub fn decode(data: &[u8]) -> Result<Self, StorageError> {
        if data.len() < HEADER_LEN {
            return Err(StorageError::Corrupt);
        }
        let count = u16::from_le_bytes([data[5], data[6]]);
        if usize::from(count) > ROSTER_CAPACITY {
            return Err(StorageError::Corrupt);
        }
        if data.len() < HEADER_LEN + usize::from(count) * RECORD_LEN {
            return Err(StorageError::Corrupt);
        }

        let mut image = Self {
            version: data[0],
            ac_option: data[1] != 0,
            bus_address: data[2],
            emergency_stop: data[3] != 0,
            invert_encoder: data[4] != 0,
            loco_count: count,
            selected_index: u16::from_le_bytes([data[7], data[8]]),
            locos: heapless::Vec::new(),
            dirty: false,
        };
        for chunk in data[HEADER_LEN..]
            .chunks_exact(RECORD_LEN)
            .take(usize::from(count))
        {
            image
                .locos
                .push(StoredLoco::decode(chunk))
                .map_err(|_| StorageError::Corrupt)?;
        }
        Ok(image)
    }
}

impl Storage for StorageImage {
    fn version(&self) -> u8 {
        self.version
    }

    fn set_version(&mut self, version: u8) {
        self.version = version;
        self.dirty = true;
    }

    fn bus_address(&self) -> u8 {
        self.bus_address
    }

    fn set_bus_address(&mut self, address: u8) {
        self.bus_address = address;
        self.dirty = true;
    }

    fn ac_option(&self) -> bool {
        self.ac_option
    }

    fn set_ac_option(&mut self, enabled: bool) {
        self.ac_option = enabled;
        self.dirty = true;
    }

    fn emergency_stop(&self) -> bool {
        self.emergency_stop
    }

    fn set_emergency_stop(&mut self, enabled: bool) {
        self.emergency_stop = enabled;
        self.dirty = true;
    }

    fn invert_encoder(&self) -> bool {
        self.invert_encoder
    }

    fn set_invert_encoder(&mut self, enabled: bool) {
        self.invert_encoder = enabled;
        self.dirty = true;
    }

    fn loco_count(&self) -> u16 {
        self.loco_count
    }

    fn set_loco_count(&mut self, count: u16) {
        self.loco_count = count;
        self.dirty = true;
    }

    fn selected_index(&self) -> u16 {
        self.selected_index
    }

    fn set_selected_index(&mut self, index: u16) {
        self.selected_index = index;
        self.dirty = true;
    }

    fn loco(&self, index: u16) -> Option<StoredLoco> {
        self.locos.get(usize::from(index)).cloned()
    }

    fn set_loco(&mut self, index: u16, loco: &StoredLoco) -> Result<(), StorageError> {
        let index = usize::from(index);
        if index >= ROSTER_CAPACITY {
            return Err(StorageError::BufferTooSmall);
        }
        while self.locos.len() < index {
            self.locos
                .push(StoredLoco::default())
                .map_err(|_| StorageError::BufferTooSmall)?;
        }
        if index == self.locos.len() {
            self.locos
                .push(loco.clone())
                .map_err(|_| StorageError::BufferTooSmall)?;
        } else {
            self.locos[index] = loco.clone();
        }
        self.dirty = true;
        Ok(())
    }
}

/// Reset the store when its layout version differs from [`SCHEMA_VERSION`].
/// Returns true when a reset happened.
pub fn migrate_if_needed<S: Storage>(storage: &mut S) -> bool {
    if storage.version() == SCHEMA_VERSION {
        return false;
    }
    warn!(
        "settings version {} != {}, restoring defaults",
        storage.version(),
        SCHEMA_VERSION
    );
    factory_defaults(storage);
    true
}

/// Unconfigured bus address, options cleared, default roster.
pub fn factory_defaults<S: Storage>(storage: &mut S) {
    storage.set_bus_address(BUS_ADDRESS_UNCONFIGURED);
    storage.set_ac_option(false);
    storage.set_emergency_stop(false);
    storage.set_invert_encoder(false);
    erase_roster(storage);
    storage.set_version(SCHEMA_VERSION);
}

/// Replace the stored roster by the single default loco and return the
/// matching in-memory roster.
pub fn erase_roster<S: Storage>(storage: &mut S) -> Roster {
    let roster = Roster::new();
    save_roster(storage, &roster);
    roster
}

/// Rebuild the roster from storage. An out-of-range count or a table
/// without any valid record resets the stored roster to the default loco.
pub fn load_roster<S: Storage>(storage: &mut S) -> Roster {
    let count = storage.loco_count();
    if count == 0 || usize::from(count) > ROSTER_CAPACITY {
        warn!("stored loco count {} invalid, resetting roster", count);
        return erase_roster(storage);
    }

    let valid = (0..count)
        .filter_map(|index| storage.loco(index))
        .any(|stored| (ADDRESS_MIN..=ADDRESS_MAX).contains(&stored.address));
    if !valid {
        warn!("no valid stored locos, resetting roster");
        return erase_roster(storage);
    }

    let records = (0..count)
        .filter_map(|index| storage.loco(index))
        .map(|stored| stored.to_record());
    let roster = Roster::from_records(records, usize::from(storage.selected_index()));

    // Records may have been dropped or reordered; the stored table must
    // match the roster slot for slot.
    let matches = roster.len() == usize::from(count)
        && roster.selected_index() == usize::from(storage.selected_index())
        && roster
            .iter()
            .enumerate()
            .all(|(index, record)| {
                storage.loco(index as u16).map(|stored| stored.address) == Some(record.address)
            });
    if !matches {
        warn!("stored roster out of step, rewriting {} locos", roster.len());
        save_roster(storage, &roster);
    }
    info!("loaded {} locos", roster.len());
    roster
}

/// Write the whole roster and the selection cursor.
pub fn save_roster<S: Storage>(storage: &mut S, roster: &Roster) {
    for (index, record) in roster.iter().enumerate() {
        if let Err(e) = storage.set_loco(index as u16, &StoredLoco::from_record(record)) {
            error!("roster write failed at {}: {}", index, e);
            return;
        }
    }
    storage.set_loco_count(roster.len() as u16);
    storage.set_selected_index(roster.selected_index() as u16);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::{DEFAULT_ADDRESS, DEFAULT_FUNCTIONS};

    fn configured() -> StorageImage {
        let mut image = StorageImage::new();
        factory_defaults(&mut image);
        image
    }

    #[test]
    fn blank_image_is_migrated() {
        let mut image = StorageImage::new();
        assert!(migrate_if_needed(&mut image));
        assert_eq!(image.version(), SCHEMA_VERSION);
        assert_eq!(image.bus_address(), BUS_ADDRESS_UNCONFIGURED);
        assert_eq!(image.loco_count(), 1);
        assert_eq!(image.loco(0).map(|l| l.address), Some(DEFAULT_ADDRESS));
        assert!(image.is_dirty());

        image.mark_clean();
        assert!(!migrate_if_needed(&mut image));
        assert!(!image.is_dirty());
    }

    #[test]
    fn encode_decode_preserves_settings_and_roster() {
        let mut image = configured();
        image.set_bus_address(7);
        image.set_emergency_stop(true);
        let mut roster = Roster::new();
        roster.add(1201, [0, 2, 5, 7, 9], Some("Ae 6/6")).unwrap();
        save_roster(&mut image, &roster);

        let mut buf = [0u8; IMAGE_MAX_LEN];
        let len = image.encode(&mut buf).unwrap();
        assert_eq!(len, HEADER_LEN + 2 * RECORD_LEN);

        let mut decoded = StorageImage::decode(&buf[..len]).unwrap();
        assert_eq!(decoded.bus_address(), 7);
        assert!(decoded.emergency_stop());
        assert!(!decoded.is_dirty());

        let loaded = load_roster(&mut decoded);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.active_address(), 1201);
        assert_eq!(loaded.active().name.as_str(), "Ae 6/6");
        assert_eq!(loaded.active().functions, [0, 2, 5, 7, 9]);
    }

    #[test]
    fn decode_rejects_truncated_and_oversized() {
        let image = configured();
        let mut buf = [0u8; IMAGE_MAX_LEN];
        let len = image.encode(&mut buf).unwrap();
        assert_eq!(
            StorageImage::decode(&buf[..len - 1]).unwrap_err(),
            StorageError::Corrupt
        );
        assert_eq!(StorageImage::decode(&buf[..4]).unwrap_err(), StorageError::Corrupt);

        buf[5..7].copy_from_slice(&(ROSTER_CAPACITY as u16 + 1).to_le_bytes());
        assert_eq!(StorageImage::decode(&buf).unwrap_err(), StorageError::Corrupt);
    }

    #[test]
    fn stored_item_parsing() {
        let blank = StorageImage::from_item(None).unwrap();
        assert_eq!(blank.version(), ERASED);
        assert_eq!(
            StorageImage::from_item(Some(&[SCHEMA_VERSION, 0, 5])).unwrap_err(),
            StorageError::Corrupt
        );

        let mut buf = [0u8; IMAGE_MAX_LEN];
        let len = configured().encode(&mut buf).unwrap();
        let image = StorageImage::from_item(Some(&buf[..len])).unwrap();
        assert_eq!(image.version(), SCHEMA_VERSION);
        assert_eq!(image.loco_count(), 1);
    }

    #[test]
    fn encode_reports_small_buffer() {
        let image = configured();
        let mut buf = [0u8; HEADER_LEN];
        assert_eq!(image.encode(&mut buf), Err(StorageError::BufferTooSmall));
    }

    #[test]
    fn invalid_count_resets_roster() {
        let mut image = configured();
        image.set_loco_count(0);
        let roster = load_roster(&mut image);
        assert_eq!(roster.active_address(), DEFAULT_ADDRESS);
        assert_eq!(image.loco_count(), 1);
    }

    #[test]
    fn table_without_valid_records_resets_roster() {
        let mut image = configured();
        image
            .set_loco(0, &StoredLoco { address: 0, ..StoredLoco::default() })
            .unwrap();
        image.set_loco_count(1);
        let roster = load_roster(&mut image);
        assert_eq!(roster.len(), 1);
        assert_eq!(image.loco(0).map(|l| l.address), Some(DEFAULT_ADDRESS));
    }

    #[test]
    fn dropped_records_are_written_back() {
        let mut image = configured();
        for (index, address) in [7, 0, 7].into_iter().enumerate() {
            let stored = StoredLoco { address, ..StoredLoco::default() };
            image.set_loco(index as u16, &stored).unwrap();
        }
        image.set_loco_count(3);
        image.mark_clean();

        let roster = load_roster(&mut image);
        assert_eq!(roster.len(), 1);
        assert_eq!(image.loco_count(), 1);
        assert_eq!(image.loco(0).map(|l| l.address), Some(7));
        assert!(image.is_dirty());

        let reloaded = load_roster(&mut image);
        assert_eq!(reloaded.active_address(), 7);
    }

    #[test]
    fn unsorted_records_are_written_back_sorted() {
        let mut image = configured();
        for (index, address) in [30, 10, 20].into_iter().enumerate() {
            let stored = StoredLoco { address, ..StoredLoco::default() };
            image.set_loco(index as u16, &stored).unwrap();
        }
        image.set_loco_count(3);

        let roster = load_roster(&mut image);
        let stored: std::vec::Vec<u16> = (0..image.loco_count())
            .filter_map(|index| image.loco(index))
            .map(|l| l.address)
            .collect();
        assert_eq!(stored, [10, 20, 30]);
        assert_eq!(roster.len(), 3);
    }

    #[test]
    fn consistent_table_is_left_alone() {
        let mut image = configured();
        image.mark_clean();
        load_roster(&mut image);
        assert!(!image.is_dirty());
    }

    #[test]
    fn selected_index_is_clamped() {
        let mut image = configured();
        image.set_selected_index(40);
        let roster = load_roster(&mut image);
        assert_eq!(roster.selected_index(), 0);
    }

    #[test]
    fn shrinking_roster_updates_count() {
        let mut image = configured();
        let mut roster = Roster::new();
        roster.add(10, DEFAULT_FUNCTIONS, None).unwrap();
        roster.add(11, DEFAULT_FUNCTIONS, None).unwrap();
        save_roster(&mut image, &roster);
        assert_eq!(image.loco_count(), 3);

        roster.remove(10).unwrap();
        save_roster(&mut image, &roster);
        assert_eq!(image.loco_count(), 2);
        let reloaded = load_roster(&mut image);
        assert_eq!(reloaded.iter().map(|r| r.address).collect::<std::vec::Vec<_>>(), [3, 11]);
    }
}
