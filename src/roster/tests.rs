//! Unit tests for the locomotive roster.
//!
//! These run on the host and cover ordering, selection, the never-empty
//! rule and the cached runtime state of the active loco.

use proptest::prelude::*;

use super::*;

fn roster_with(addresses: &[u16]) -> Roster {
    let mut roster = Roster::new();
    for &address in addresses {
        roster.add(address, DEFAULT_FUNCTIONS, None).unwrap();
    }
    roster
}

fn addresses(roster: &Roster) -> std::vec::Vec<u16> {
    roster.iter().map(|r| r.address).collect()
}

// ═══════════════════════════════════════════════════════════════════════════
// Add / Remove
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn new_roster_holds_default_loco() {
    let roster = Roster::new();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster.active_address(), DEFAULT_ADDRESS);
    assert_eq!(roster.active().functions, [0, 1, 2, 3, 4]);
}

#[test]
fn add_inserts_sorted_and_selects() {
    let mut roster = roster_with(&[10, 1]);
    assert_eq!(addresses(&roster), [1, 3, 10]);
    assert_eq!(roster.active_address(), 1);

    let index = roster.add(5, DEFAULT_FUNCTIONS, Some("BR 218")).unwrap();
    assert_eq!(index, 2);
    assert_eq!(addresses(&roster), [1, 3, 5, 10]);
    assert_eq!(roster.active_address(), 5);
    assert_eq!(roster.active().name.as_str(), "BR 218");
}

#[test]
fn add_rejects_duplicate_and_invalid() {
    let mut roster = Roster::new();
    assert_eq!(
        roster.add(DEFAULT_ADDRESS, DEFAULT_FUNCTIONS, None),
        Err(RosterError::AlreadyExists)
    );
    assert_eq!(roster.add(0, DEFAULT_FUNCTIONS, None), Err(RosterError::InvalidAddress));
    assert_eq!(
        roster.add(10_000, DEFAULT_FUNCTIONS, None),
        Err(RosterError::InvalidAddress)
    );
    assert_eq!(roster.len(), 1);
}

#[test]
fn add_reports_full() {
    let mut roster = Roster::new();
    let mut address = 100;
    while roster.len() < ROSTER_CAPACITY {
        roster.add(address, DEFAULT_FUNCTIONS, None).unwrap();
        address += 1;
    }
    assert_eq!(roster.add(9000, DEFAULT_FUNCTIONS, None), Err(RosterError::Full));
}

#[test]
fn remove_last_record_is_rejected() {
    let mut roster = Roster::new();
    assert_eq!(roster.remove(DEFAULT_ADDRESS), Err(RosterError::LastRecordRejected));
    assert_eq!(addresses(&roster), [DEFAULT_ADDRESS]);
}

#[test]
fn remove_unknown_address() {
    let mut roster = roster_with(&[7]);
    assert_eq!(roster.remove(8), Err(RosterError::NotFound));
    assert_eq!(roster.len(), 2);
}

#[test]
fn remove_selected_tail_clamps_cursor() {
    let mut roster = roster_with(&[7, 9]);
    assert_eq!(roster.active_address(), 9);
    roster.remove(9).unwrap();
    assert_eq!(roster.selected_index(), 1);
    assert_eq!(roster.active_address(), 7);
}

#[test]
fn remove_before_cursor_keeps_active_loco() {
    let mut roster = roster_with(&[7, 9]);
    roster.remove(3).unwrap();
    assert_eq!(roster.active_address(), 9);
}

// ═══════════════════════════════════════════════════════════════════════════
// Selection
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn select_next_wraps_forward() {
    let mut roster = roster_with(&[5, 8]);
    roster.select_address(8).unwrap();
    assert_eq!(roster.select_next(1), 3);
}

#[test]
fn select_next_wraps_backward() {
    let mut roster = roster_with(&[5, 8]);
    roster.select_address(3).unwrap();
    assert_eq!(roster.select_next(-1), 8);
}

#[test]
fn select_next_zero_is_no_move() {
    let mut roster = roster_with(&[5]);
    let before = roster.active_address();
    assert_eq!(roster.select_next(0), before);
}

#[test]
fn select_unknown_address() {
    let mut roster = Roster::new();
    assert_eq!(roster.select_address(42), Err(RosterError::NotFound));
}

// ═══════════════════════════════════════════════════════════════════════════
// Bulk path
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn bulk_push_then_sort_keeps_active() {
    let mut roster = Roster::new();
    roster.push_unsorted(40, DEFAULT_FUNCTIONS, Some("V200")).unwrap();
    roster.push_unsorted(2, DEFAULT_FUNCTIONS, None).unwrap();
    roster.push_unsorted(17, DEFAULT_FUNCTIONS, None).unwrap();
    assert_eq!(addresses(&roster), [3, 40, 2, 17]);
    assert_eq!(roster.active_address(), 3);

    roster.bubble_sort();
    assert_eq!(addresses(&roster), [2, 3, 17, 40]);
    assert_eq!(roster.active_address(), 3);
}

#[test]
fn bulk_push_rejects_duplicate() {
    let mut roster = Roster::new();
    assert_eq!(
        roster.push_unsorted(3, DEFAULT_FUNCTIONS, None),
        Err(RosterError::AlreadyExists)
    );
}

#[test]
fn from_records_drops_invalid_and_duplicates() {
    let records = [
        LocomotiveRecord::new(12, DEFAULT_FUNCTIONS, None),
        LocomotiveRecord::new(0, DEFAULT_FUNCTIONS, None),
        LocomotiveRecord::new(4, DEFAULT_FUNCTIONS, None),
        LocomotiveRecord::new(12, DEFAULT_FUNCTIONS, None),
    ];
    let roster = Roster::from_records(records, 7);
    assert_eq!(addresses(&roster), [4, 12]);
    assert_eq!(roster.selected_index(), 1);
}

#[test]
fn from_records_empty_falls_back_to_default() {
    let roster = Roster::from_records(core::iter::empty(), 0);
    assert_eq!(addresses(&roster), [DEFAULT_ADDRESS]);
}

// ═══════════════════════════════════════════════════════════════════════════
// Runtime state
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn runtime_update_only_for_active_loco() {
    let mut roster = roster_with(&[5]);
    roster.select_address(5).unwrap();

    assert!(!roster.update_runtime(3, 10, Direction::Backward, 0b11, StepMode::Steps128));
    assert_eq!(roster.speed(), 0);

    assert!(roster.update_runtime(5, 10, Direction::Backward, 0b11, StepMode::Steps128));
    assert_eq!(roster.speed(), 10);
    assert_eq!(roster.direction(), Direction::Backward);
    assert_eq!(roster.steps(), StepMode::Steps128);
    assert_eq!(roster.function_status(1), FunctionState::On);
}

#[test]
fn speed_adjust_clamps_and_reports_no_change() {
    let mut roster = Roster::new();
    assert_eq!(roster.speed_adjust(-1), None);
    assert_eq!(roster.speed_adjust(5), Some(5));
    assert_eq!(roster.speed_adjust(100), Some(28));
    assert_eq!(roster.speed_adjust(1), None);
    assert_eq!(roster.speed_adjust(-100), Some(0));
}

#[test]
fn speed_limit_follows_step_mode() {
    let mut roster = Roster::new();
    roster.update_runtime(DEFAULT_ADDRESS, 0, Direction::Forward, 0, StepMode::Steps14);
    assert_eq!(roster.speed_adjust(50), Some(14));
    roster.set_speed(99);
    assert_eq!(roster.speed(), 14);
}

#[test]
fn direction_toggle() {
    let mut roster = Roster::new();
    assert_eq!(roster.direction(), Direction::Forward);
    roster.toggle_direction();
    assert_eq!(roster.direction(), Direction::Backward);
}

#[test]
fn function_toggle_and_status() {
    let mut roster = Roster::new();
    assert_eq!(roster.function_status(0), FunctionState::Off);
    roster.function_toggle(0);
    roster.function_toggle(28);
    assert_eq!(roster.function_status(0), FunctionState::On);
    assert_eq!(roster.function_status(28), FunctionState::On);
    roster.function_toggle(0);
    assert_eq!(roster.function_status(0), FunctionState::Off);

    // Out of range numbers are ignored.
    roster.function_toggle(29);
    assert_eq!(roster.function_status(29), FunctionState::Off);
}

#[test]
fn function_assignment_lookup() {
    let mut roster = Roster::new();
    roster.set_functions(DEFAULT_ADDRESS, [8, 1, 12, 3, 4]).unwrap();
    assert_eq!(roster.function_assigned(0), 8);
    assert_eq!(roster.function_assigned(2), 12);
    assert_eq!(roster.function_assigned(9), 0);
}

#[test]
fn limit_address_wraps() {
    assert_eq!(limit_address(0), 9999);
    assert_eq!(limit_address(-3), 9999);
    assert_eq!(limit_address(10_000), 1);
    assert_eq!(limit_address(42), 42);
}

#[test]
fn names_are_sanitized_and_truncated() {
    assert_eq!(sanitize_name("ICE 3\0\0\0").as_str(), "ICE 3");
    assert_eq!(sanitize_name("Krokodil Ce 6/8").as_str(), "Krokodil C");
    assert_eq!(sanitize_name("a\tb").as_str(), "a?b");
}

// ═══════════════════════════════════════════════════════════════════════════
// Properties
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
enum Op {
    Add(u16),
    Remove(u16),
    Select(i8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u16..60).prop_map(Op::Add),
        (1u16..60).prop_map(Op::Remove),
        (-1i8..=1).prop_map(Op::Select),
    ]
}

proptest! {
    #[test]
    fn roster_stays_sorted_and_non_empty(ops in proptest::collection::vec(op(), 0..80)) {
        let mut roster = Roster::new();
        for op in ops {
            let len_before = roster.len();
            match op {
                Op::Add(address) => {
                    let _ = roster.add(address, DEFAULT_FUNCTIONS, None);
                }
                Op::Remove(address) => {
                    let result = roster.remove(address);
                    if len_before == 1 {
                        prop_assert_eq!(result, Err(RosterError::LastRecordRejected));
                        prop_assert_eq!(roster.len(), 1);
                    }
                }
                Op::Select(direction) => {
                    roster.select_next(direction);
                }
            }
            prop_assert!(!roster.is_empty());
            prop_assert!(roster.selected_index() < roster.len());
            let list = addresses(&roster);
            prop_assert!(list.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn bubble_sort_orders_any_import(imports in proptest::collection::vec(1u16..500, 0..60)) {
        let mut roster = Roster::new();
        for address in imports {
            let _ = roster.push_unsorted(address, DEFAULT_FUNCTIONS, None);
        }
        roster.bubble_sort();
        let list = addresses(&roster);
        prop_assert!(list.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(roster.active_address(), DEFAULT_ADDRESS);
    }
}
