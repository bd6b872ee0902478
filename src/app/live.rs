//! Live loco control under each power status, and the roster import the
//! command station can push while track power is off.

use super::{App, State};
use crate::bus::{Bus, BusCommand, BusNotification, LocoInfo, RosterEntry};
use crate::config::SKIP_AFTER_INPUT;
use crate::event::{Button, EncoderEvent, Event, Gesture, Tick};
use crate::power::{PowerCommand, PowerStatus};
use crate::roster::DEFAULT_FUNCTIONS;
use crate::storage::{self, Storage};
use crate::ui::{Color, Display};

impl<B: Bus, S: Storage, D: Display> App<B, S, D> {
    pub(super) fn power_off_entry(&mut self) {
        self.ctx.power = PowerStatus::Off;
        self.ctx.import.clear();
        self.ctx.loco_selection = false;
        self.ctx.button_released = false;
        self.display.show_status("POWER OFF", Color::Red);
        self.show_selection();

        self.ctx.roster.set_speed(0);
        self.show_loco();
        self.send_drive();
    }

    pub(super) fn power_off_event(&mut self, event: Event) {
        match event {
            Event::Tick(Tick::Medium) => self.poll_loco_info(),
            Event::Bus(BusNotification::Power(PowerStatus::On)) => self.transit(State::PowerOn),
            Event::Bus(BusNotification::Power(PowerStatus::ProgrammingMode)) => {
                self.ctx.power = PowerStatus::ProgrammingMode;
                self.transit(State::ProgrammingMode);
            }
            Event::Bus(BusNotification::LocoInfo(info)) => {
                if !self.ctx.loco_selection || self.ctx.button_released {
                    // Some command stations keep reporting the last set
                    // speed while the track is off.
                    let stopped = LocoInfo { speed: 0, ..info };
                    self.apply_loco_info(&stopped);
                    self.ctx.button_released = false;
                }
            }
            Event::Bus(BusNotification::RosterEntry(entry)) => self.import_entry(entry),
            Event::Encoder(EncoderEvent { gesture, delta }) => match gesture {
                Gesture::PushTurn => self.select_loco(delta),
                Gesture::PushedShort => self.bus.submit(BusCommand::SetPower(PowerCommand::Normal)),
                Gesture::PushedLong => self.transit(State::MainMenu1),
                Gesture::Released => self.release_selection(),
                _ => {}
            },
            Event::Button(Button::Power) => {
                self.bus.submit(BusCommand::SetPower(PowerCommand::Normal));
            }
            _ => {}
        }
    }

    pub(super) fn power_on_entry(&mut self) {
        self.ctx.loco_selection = false;
        self.ctx.power = PowerStatus::On;
        self.ctx.skip_request = 0;
        self.ctx.button_released = false;
        self.display.show_status("POWER ON", Color::Green);
        self.show_selection();
    }

    pub(super) fn power_on_event(&mut self, event: Event) {
        match event {
            Event::Tick(Tick::Medium) => self.poll_loco_info(),
            Event::Bus(BusNotification::Power(status)) => match status {
                PowerStatus::On => {}
                PowerStatus::Off => self.transit(State::PowerOff),
                PowerStatus::Emergency => self.transit(State::Emergency),
                PowerStatus::ProgrammingMode => {
                    self.ctx.power = PowerStatus::ProgrammingMode;
                    self.transit(State::ProgrammingMode);
                }
            },
            Event::Bus(BusNotification::LocoInfo(info)) => {
                if !self.ctx.loco_selection || self.ctx.button_released {
                    self.apply_loco_info(&info);
                    self.ctx.button_released = false;
                }
            }
            Event::Encoder(EncoderEvent { gesture, delta }) => match gesture {
                Gesture::Turn => {
                    if self.ctx.roster.speed_adjust(delta).is_some() {
                        self.show_loco();
                        self.send_drive();
                    }
                }
                Gesture::PushTurn => self.select_loco(delta),
                Gesture::PushedShort => {
                    if self.ctx.roster.speed() != 0 {
                        self.ctx.roster.set_speed(0);
                    } else {
                        self.ctx.roster.toggle_direction();
                    }
                    self.show_loco();
                    self.send_drive();
                    self.ctx.skip_request = SKIP_AFTER_INPUT;
                }
                Gesture::PushedNormal => {
                    self.ctx.roster.toggle_direction();
                    self.show_loco();
                    self.send_drive();
                    self.ctx.skip_request = SKIP_AFTER_INPUT;
                }
                Gesture::PushedLong => {
                    self.ctx.cv_pom = true;
                    self.ctx.cv_from_power_on = true;
                    self.transit(State::CvProgramming);
                }
                Gesture::Released => self.release_selection(),
            },
            Event::Button(Button::Power) => {
                let command = PowerCommand::power_button(self.ctx.emergency_stop_enabled);
                self.bus.submit(BusCommand::SetPower(command));
            }
            Event::Button(Button::B5) => {
                self.display.clear();
                self.transit(State::TurnoutControl);
            }
            Event::Button(button) => self.toggle_function(button),
            _ => {}
        }
    }

    pub(super) fn emergency_entry(&mut self) {
        self.ctx.power = PowerStatus::Emergency;
        self.display.show_status("EMERGENCY", Color::Yellow);
        self.show_selection();

        self.ctx.roster.set_speed(0);
        self.show_loco();
        self.send_drive();
    }

    pub(super) fn emergency_event(&mut self, event: Event) {
        match event {
            Event::Bus(BusNotification::Power(status)) => match status {
                PowerStatus::On => self.transit(State::PowerOn),
                PowerStatus::Off => self.transit(State::PowerOff),
                PowerStatus::Emergency => {}
                PowerStatus::ProgrammingMode => {
                    self.ctx.power = PowerStatus::ProgrammingMode;
                    self.transit(State::ProgrammingMode);
                }
            },
            Event::Bus(BusNotification::LocoInfo(info)) => self.apply_loco_info(&info),
            Event::Encoder(EncoderEvent { gesture, .. }) => match gesture {
                Gesture::PushedNormal => {
                    self.ctx.roster.toggle_direction();
                    self.show_loco();
                    self.send_drive();
                    self.ctx.skip_request = SKIP_AFTER_INPUT;
                }
                Gesture::PushedLong => {
                    self.ctx.cv_pom = true;
                    self.transit(State::CvProgramming);
                }
                _ => {}
            },
            Event::Button(Button::Power) => {
                self.bus.submit(BusCommand::SetPower(PowerCommand::Normal));
            }
            Event::Button(button) => self.toggle_function(button),
            _ => {}
        }
    }

    pub(super) fn programming_mode_entry(&mut self) {
        self.ctx.power = PowerStatus::ProgrammingMode;
        self.display.show_status("PROG MODE", Color::Yellow);
        self.show_selection();

        self.ctx.roster.set_speed(0);
        self.show_loco();
    }

    pub(super) fn programming_mode_event(&mut self, event: Event) {
        match event {
            Event::Bus(BusNotification::Power(PowerStatus::On)) => self.transit(State::PowerOn),
            Event::Bus(BusNotification::Power(PowerStatus::Off)) => self.transit(State::PowerOff),
            Event::Button(Button::Power) => {
                self.bus.submit(BusCommand::SetPower(PowerCommand::TrackOff));
            }
            _ => {}
        }
    }

    /// Collect one packet of a roster transfer. The command station sends
    /// every packet twice, not always back to back, so a packet whose index
    /// is already buffered is dropped. A first packet with a different
    /// address starts a new transfer. The final packet stores the new locos
    /// and restarts the throttle.
    fn import_entry(&mut self, entry: RosterEntry) {
        let buffered = self
            .ctx
            .import
            .iter()
            .find(|e| e.index == entry.index)
            .map(|e| e.address);
        match buffered {
            Some(address) if entry.index != 0 || address == entry.address => {
                debug!("roster import: packet {} repeated", entry.index);
            }
            _ => {
                if entry.index == 0 {
                    info!("roster import: {} locos announced", entry.total);
                    self.ctx.import.clear();
                    self.display.show_status("RECEIVING", Color::White);
                }
                self.buffer_import(&entry);
            }
        }

        if entry.is_last() {
            self.store_import();
            self.reinitialize();
        }
    }

    fn buffer_import(&mut self, entry: &RosterEntry) {
        if self.ctx.import.push(entry.clone()).is_err() {
            warn!("roster import: buffer full, {} dropped", entry.address);
            return;
        }
        self.display.show_selection(1, self.ctx.import.len());
    }

    fn store_import(&mut self) {
        self.display.show_status("STORING", Color::White);
        for entry in self.ctx.import.iter() {
            if self.ctx.roster.contains(entry.address) {
                continue;
            }
            match self
                .ctx
                .roster
                .push_unsorted(entry.address, DEFAULT_FUNCTIONS, Some(entry.name.as_str()))
            {
                Ok(()) => {}
                Err(e) => {
                    warn!("roster import: {} rejected: {}", entry.address, e);
                }
            }
        }
        self.display
            .show_selection(self.ctx.roster.selected_index() + 1, self.ctx.roster.len());

        self.display.show_status("SORTING", Color::White);
        self.ctx.roster.bubble_sort();
        storage::save_roster(&mut self.storage, &self.ctx.roster);
        info!("roster import: {} locos stored", self.ctx.roster.len());
        self.display.show_status("RESET", Color::Red);
    }
}
