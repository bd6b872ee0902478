//! Locomotive roster - the locally stored list of known locos.
//!
//! The roster is never empty, always sorted ascending by address and keeps
//! a selection cursor on the "active" loco that drives every bus request.
//! Runtime state (speed, direction, functions) reported by the command
//! station is cached per record.
//!
//! Two insertion paths exist on purpose:
//! - [`Roster::add`] places a single record at its sorted position.
//! - [`Roster::push_unsorted`] appends during a bulk import; the caller runs
//!   [`Roster::bubble_sort`] once when the import is complete.

use heapless::{String, Vec};

use crate::error::RosterError;
use crate::speed::{Direction, StepMode};

#[cfg(test)]
mod tests;

/// Maximum number of locos held in the roster.
pub const ROSTER_CAPACITY: usize = 200;

/// Number of physical function buttons.
pub const FUNCTION_BUTTONS: usize = 5;

/// Maximum displayed name length.
pub const NAME_LEN: usize = 10;

/// Lowest loco / turnout address.
pub const ADDRESS_MIN: u16 = 1;

/// Highest loco / turnout address.
pub const ADDRESS_MAX: u16 = 9999;

/// Highest decoder function number.
pub const FUNCTION_MAX: u8 = 28;

/// Loco created when the roster is (re)initialised.
pub const DEFAULT_ADDRESS: u16 = 3;

/// Function assignment of a freshly added loco: button n → function n.
pub const DEFAULT_FUNCTIONS: [u8; FUNCTION_BUTTONS] = [0, 1, 2, 3, 4];

pub type LocoName = String<NAME_LEN>;

/// Whether a decoder function is active.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FunctionState {
    Off,
    On,
}

/// One known locomotive plus its cached runtime state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocomotiveRecord {
    pub address: u16,
    pub name: LocoName,
    /// Decoder function triggered by each physical button.
    pub functions: [u8; FUNCTION_BUTTONS],
    pub steps: StepMode,
    pub speed: u8,
    pub direction: Direction,
    /// Active decoder functions, bit n = function n.
    pub function_bits: u32,
    pub occupied: bool,
}

impl LocomotiveRecord {
    pub fn new(address: u16, functions: [u8; FUNCTION_BUTTONS], name: Option<&str>) -> Self {
        Self {
            address,
            name: name.map(sanitize_name).unwrap_or_default(),
            functions,
            steps: StepMode::default(),
            speed: 0,
            direction: Direction::Forward,
            function_bits: 0,
            occupied: false,
        }
    }
}

/// Keep printable ASCII only, truncated to [`NAME_LEN`]. Stops at the first
/// NUL so fixed-width, zero padded buffers can be passed directly.
pub fn sanitize_name(raw: &str) -> LocoName {
    let mut name = LocoName::new();
    for c in raw.chars().take_while(|&c| c != '\0') {
        let c = if c.is_ascii_graphic() || c == ' ' { c } else { '?' };
        if name.push(c).is_err() {
            break;
        }
    }
    name
}

/// Wrap an address into 1..=9999: values below 1 become 9999, values above
/// 9999 become 1.
pub fn limit_address(value: i32) -> u16 {
    if value < i32::from(ADDRESS_MIN) {
        ADDRESS_MAX
    } else if value > i32::from(ADDRESS_MAX) {
        ADDRESS_MIN
    } else {
        value as u16
    }
}

fn address_valid(address: u16) -> bool {
    (ADDRESS_MIN..=ADDRESS_MAX).contains(&address)
}

/// Ordered, bounded, never-empty collection of locos with a selection cursor.
#[derive(Clone, Debug)]
pub struct Roster {
    records: Vec<LocomotiveRecord, ROSTER_CAPACITY>,
    selected: usize,
}

impl Default for Roster {
    fn default() -> Self {
        Self::new()
    }
}

impl Roster {
    /// A roster holding only the default loco.
    pub fn new() -> Self {
        let mut records = Vec::new();
        let pushed = records
            .push(LocomotiveRecord::new(DEFAULT_ADDRESS, DEFAULT_FUNCTIONS, None))
            .is_ok();
        debug_assert!(pushed, "empty roster rejected its first record");
        Self {
            records,
            selected: 0,
        }
    }

    /// Rebuild from persisted records. Invalid and duplicate addresses are
    /// dropped; an empty result falls back to the default roster. The cursor
    /// is clamped into range.
    pub fn from_records<I>(records: I, selected: usize) -> Self
    where
        I: IntoIterator<Item = LocomotiveRecord>,
    {
        let mut roster = Self {
            records: Vec::new(),
            selected: 0,
        };
        for record in records {
            if !address_valid(record.address) || roster.index_of(record.address).is_some() {
                continue;
            }
            if roster.records.push(record).is_err() {
                break;
            }
        }
        if roster.records.is_empty() {
            return Self::new();
        }
        roster.bubble_sort();
        roster.selected = selected.min(roster.records.len() - 1);
        roster
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LocomotiveRecord> {
        self.records.iter()
    }

    pub fn get(&self, index: usize) -> Option<&LocomotiveRecord> {
        self.records.get(index)
    }

    /// Position of `address`, if present.
    pub fn index_of(&self, address: u16) -> Option<usize> {
        self.records.iter().position(|r| r.address == address)
    }

    pub fn contains(&self, address: u16) -> bool {
        self.index_of(address).is_some()
    }

    /// Index of the active loco.
    pub fn selected_index(&self) -> usize {
        self.selected
    }

    /// The active loco.
    pub fn active(&self) -> &LocomotiveRecord {
        // `records` is never empty and `selected` is always in range.
        &self.records[self.selected]
    }

    fn active_mut(&mut self) -> &mut LocomotiveRecord {
        &mut self.records[self.selected]
    }

    pub fn active_address(&self) -> u16 {
        self.active().address
    }

    /// Insert a loco at its sorted position and make it the active one.
    pub fn add(
        &mut self,
        address: u16,
        functions: [u8; FUNCTION_BUTTONS],
        name: Option<&str>,
    ) -> Result<usize, RosterError> {
        if !address_valid(address) {
            return Err(RosterError::InvalidAddress);
        }
        if self.contains(address) {
            return Err(RosterError::AlreadyExists);
        }
        let index = self
            .records
            .iter()
            .position(|r| r.address > address)
            .unwrap_or(self.records.len());
        self.records
            .insert(index, LocomotiveRecord::new(address, functions, name))
            .map_err(|_| RosterError::Full)?;
        self.selected = index;
        Ok(index)
    }

    /// Append a loco without sorting or moving the cursor (bulk import).
    pub fn push_unsorted(
        &mut self,
        address: u16,
        functions: [u8; FUNCTION_BUTTONS],
        name: Option<&str>,
    ) -> Result<(), RosterError> {
        if !address_valid(address) {
            return Err(RosterError::InvalidAddress);
        }
        if self.contains(address) {
            return Err(RosterError::AlreadyExists);
        }
        self.records
            .push(LocomotiveRecord::new(address, functions, name))
            .map_err(|_| RosterError::Full)
    }

    /// Remove a loco. The last remaining loco can never be removed.
    pub fn remove(&mut self, address: u16) -> Result<(), RosterError> {
        if self.records.len() == 1 {
            return Err(RosterError::LastRecordRejected);
        }
        let index = self.index_of(address).ok_or(RosterError::NotFound)?;
        self.records.remove(index);
        if index < self.selected {
            self.selected -= 1;
        }
        self.selected = self.selected.min(self.records.len() - 1);
        Ok(())
    }

    /// Move the cursor one record forward (`direction > 0`) or backward
    /// (`direction < 0`), wrapping at both ends. Returns the new active
    /// address. Any encoder inversion must already be applied.
    pub fn select_next(&mut self, direction: i8) -> u16 {
        let len = self.records.len();
        if direction > 0 {
            self.selected = (self.selected + 1) % len;
        } else if direction < 0 {
            self.selected = (self.selected + len - 1) % len;
        }
        self.active_address()
    }

    /// Make the loco with `address` active.
    pub fn select_address(&mut self, address: u16) -> Result<(), RosterError> {
        self.selected = self.index_of(address).ok_or(RosterError::NotFound)?;
        Ok(())
    }

    /// Stable ascending sort by address. The active loco stays active.
    ///
    /// Deliberately a bubble sort: it runs once after a bulk import and its
    /// cost is predictable for the bounded roster.
    pub fn bubble_sort(&mut self) {
        let active = self.active_address();
        let len = self.records.len();
        for pass in 0..len {
            let mut swapped = false;
            for i in 0..len - 1 - pass {
                if self.records[i].address > self.records[i + 1].address {
                    self.records.swap(i, i + 1);
                    swapped = true;
                }
            }
            if !swapped {
                break;
            }
        }
        if let Some(index) = self.index_of(active) {
            self.selected = index;
        }
    }

    /// Replace the function assignment of a loco.
    pub fn set_functions(
        &mut self,
        address: u16,
        functions: [u8; FUNCTION_BUTTONS],
    ) -> Result<(), RosterError> {
        let index = self.index_of(address).ok_or(RosterError::NotFound)?;
        self.records[index].functions = functions;
        Ok(())
    }

    /// Apply a runtime snapshot from the bus. Ignored (returns false) unless
    /// `address` is the active loco, so an answer for a previous selection
    /// cannot overwrite the current one.
    pub fn update_runtime(
        &mut self,
        address: u16,
        speed: u8,
        direction: Direction,
        function_bits: u32,
        steps: StepMode,
    ) -> bool {
        if address != self.active_address() {
            return false;
        }
        let active = self.active_mut();
        active.steps = steps;
        active.speed = speed.min(steps.max_speed());
        active.direction = direction;
        active.function_bits = function_bits;
        true
    }

    pub fn set_occupied(&mut self, occupied: bool) {
        self.active_mut().occupied = occupied;
    }

    pub fn speed(&self) -> u8 {
        self.active().speed
    }

    pub fn set_speed(&mut self, speed: u8) {
        let active = self.active_mut();
        active.speed = speed.min(active.steps.max_speed());
    }

    /// Change the active speed by `delta`, clamped to 0..=max. Returns the
    /// new speed, or `None` when already at the bound in that direction.
    pub fn speed_adjust(&mut self, delta: i8) -> Option<u8> {
        let active = self.active_mut();
        let max = i16::from(active.steps.max_speed());
        let current = i16::from(active.speed);
        let target = (current + i16::from(delta)).clamp(0, max);
        if target == current {
            return None;
        }
        active.speed = target as u8;
        Some(active.speed)
    }

    pub fn direction(&self) -> Direction {
        self.active().direction
    }

    pub fn toggle_direction(&mut self) {
        let active = self.active_mut();
        active.direction = active.direction.toggled();
    }

    pub fn steps(&self) -> StepMode {
        self.active().steps
    }

    /// Flip a decoder function of the active loco.
    pub fn function_toggle(&mut self, function: u8) {
        if function <= FUNCTION_MAX {
            self.active_mut().function_bits ^= 1 << function;
        }
    }

    pub fn function_status(&self, function: u8) -> FunctionState {
        if function <= FUNCTION_MAX && self.active().function_bits & (1 << function) != 0 {
            FunctionState::On
        } else {
            FunctionState::Off
        }
    }

    /// Function assigned to physical `button` of the active loco.
    pub fn function_assigned(&self, button: usize) -> u8 {
        self.active()
            .functions
            .get(button)
            .copied()
            .unwrap_or_default()
    }
}
