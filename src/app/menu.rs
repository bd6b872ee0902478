//! Menus: roster add/change/delete, settings and roster transmit.

use super::{App, State};
use crate::bus::{Bus, BusCommand, BusNotification};
use crate::config::{BUS_ADDRESS_UNCONFIGURED, ROSTER_TX_INTERVAL_TICKS};
use crate::error::RosterError;
use crate::event::{Button, EncoderEvent, Event, Gesture, Tick};
use crate::power::PowerStatus;
use crate::roster::{limit_address, ADDRESS_MIN, DEFAULT_FUNCTIONS, FUNCTION_BUTTONS};
use crate::storage::{self, Storage};
use crate::ui::input_logic::{assignable, next_function};
use crate::ui::{Color, Display, Highlight, MenuPage};

impl<B: Bus, S: Storage, D: Display> App<B, S, D> {
    // Main menu, page 1: roster and CV.

    pub(super) fn main_menu1_entry(&mut self) {
        self.display.show_menu(MenuPage::Main);
    }

    pub(super) fn main_menu1_event(&mut self, event: Event) {
        match event {
            Event::Encoder(EncoderEvent { gesture, .. }) => match gesture {
                Gesture::Turn => self.transit(State::MainMenu2),
                Gesture::PushedShort | Gesture::PushedNormal | Gesture::PushedLong => {
                    self.leave_menu()
                }
                _ => {}
            },
            Event::Button(button) => match button {
                Button::B1 => {
                    self.ctx.add_address = self.ctx.roster.active_address();
                    self.transit(State::MenuLocAdd);
                }
                Button::B2 => self.transit(State::MenuLocFunctionsChange),
                Button::B3 => self.transit(State::MenuLocDelete),
                Button::B4 => {
                    self.ctx.cv_pom = false;
                    self.transit(State::CvProgramming);
                }
                Button::B5 => {
                    self.ctx.cv_pom = true;
                    self.transit(State::CvProgramming);
                }
                Button::Power => self.leave_menu(),
                Button::B0 | Button::None => {}
            },
            _ => {}
        }
    }

    // Main menu, page 2: settings.

    pub(super) fn main_menu2_entry(&mut self) {
        self.display.show_menu(MenuPage::Settings {
            emergency_stop: self.storage.emergency_stop(),
        });
    }

    pub(super) fn main_menu2_event(&mut self, event: Event) {
        match event {
            Event::Encoder(EncoderEvent { gesture, .. }) => match gesture {
                Gesture::Turn => self.transit(State::MainMenu1),
                Gesture::PushedShort | Gesture::PushedNormal | Gesture::PushedLong => {
                    self.leave_menu()
                }
                _ => {}
            },
            Event::Button(button) => match button {
                Button::B1 => {
                    self.storage.set_bus_address(BUS_ADDRESS_UNCONFIGURED);
                    self.transit(State::CheckBusAddress);
                }
                Button::B2 => {
                    let enabled = !self.storage.emergency_stop();
                    info!("emergency stop on power button: {}", enabled);
                    self.storage.set_emergency_stop(enabled);
                    self.ctx.emergency_stop_enabled = enabled;
                    self.main_menu2_entry();
                }
                Button::B3 => self.transit(State::MenuTransmitRosterDatabase),
                Button::B4 => {
                    warn!("erasing roster");
                    self.display.show_erase();
                    storage::erase_roster(&mut self.storage);
                    self.display.clear();
                    self.reinitialize();
                }
                Button::B5 => {
                    warn!("restoring factory settings");
                    self.display.show_erase();
                    self.ctx.roster = storage::erase_roster(&mut self.storage);
                    self.storage.set_ac_option(false);
                    self.storage.set_bus_address(BUS_ADDRESS_UNCONFIGURED);
                    self.storage.set_emergency_stop(false);
                    self.ctx.emergency_stop_enabled = false;
                    self.transit(State::CheckBusAddress);
                }
                Button::Power => self.leave_menu(),
                Button::B0 | Button::None => {}
            },
            _ => {}
        }
    }

    /// Back to live control; the active loco is fetched fresh.
    fn leave_menu(&mut self) {
        self.ctx.loco_selection = true;
        self.transit(State::GetPowerStatus);
    }

    // Add a loco: address first, then its function buttons.

    pub(super) fn loc_add_entry(&mut self) {
        self.display.clear();
        self.display.show_status("ADD LOC", Color::Green);
        self.display.show_address(self.ctx.add_address, Highlight::Normal);
        self.show_selection();
    }

    pub(super) fn loc_add_event(&mut self, event: Event) {
        match event {
            Event::Encoder(EncoderEvent { gesture, delta }) => match gesture {
                Gesture::Turn if delta != 0 => {
                    let next = i32::from(self.ctx.add_address) + i32::from(delta.signum());
                    self.ctx.add_address = limit_address(next);
                    self.display.show_address(self.ctx.add_address, Highlight::Normal);
                }
                Gesture::PushedNormal | Gesture::PushedLong => self.loc_add_confirm(),
                _ => {}
            },
            Event::Button(button) => {
                let next = match button {
                    Button::B0 => i32::from(self.ctx.add_address) + 1,
                    Button::B1 => i32::from(self.ctx.add_address) + 10,
                    Button::B2 => i32::from(self.ctx.add_address) + 100,
                    Button::B3 => i32::from(self.ctx.add_address) + 1000,
                    Button::B4 => i32::from(ADDRESS_MIN),
                    Button::B5 => {
                        self.loc_add_confirm();
                        return;
                    }
                    Button::Power => {
                        self.transit(State::MainMenu1);
                        return;
                    }
                    Button::None => return,
                };
                self.ctx.add_address = limit_address(next);
                self.display.show_address(self.ctx.add_address, Highlight::Normal);
            }
            _ => {}
        }
    }

    fn loc_add_confirm(&mut self) {
        if self.ctx.roster.contains(self.ctx.add_address) {
            debug!("loco {} already present", self.ctx.add_address);
            self.display
                .show_address(self.ctx.add_address, Highlight::Rejected);
        } else {
            self.transit(State::MenuLocFunctionsAdd);
        }
    }

    pub(super) fn functions_add_entry(&mut self) {
        self.display.show_status("FUNCTIONS", Color::Green);
        self.ctx.function_edit = 0;
        self.ctx.assignment = DEFAULT_FUNCTIONS;
        self.show_function_editor();
        self.show_selection();
    }

    pub(super) fn functions_add_event(&mut self, event: Event) {
        match event {
            Event::Encoder(EncoderEvent { gesture, delta }) => match gesture {
                Gesture::Turn if delta != 0 => self.edit_function(delta),
                Gesture::PushedNormal => self.functions_add_commit(),
                _ => {}
            },
            Event::Button(Button::B5) => self.functions_add_commit(),
            Event::Button(Button::Power) => self.transit(State::MainMenu1),
            Event::Button(button) => self.assign_function(button),
            _ => {}
        }
    }

    fn functions_add_commit(&mut self) {
        self.display.show_status("SORTING", Color::White);
        let address = self.ctx.add_address;
        match self.ctx.roster.add(address, self.ctx.assignment, None) {
            Ok(index) => info!("loco {} added at {}", address, index),
            Err(e) => warn!("loco {} not added: {}", address, e),
        }
        storage::save_roster(&mut self.storage, &self.ctx.roster);
        self.ctx.add_address = limit_address(i32::from(address) + 1);
        self.transit(State::MenuLocAdd);
    }

    // Change the function buttons of existing locos.

    pub(super) fn functions_change_entry(&mut self) {
        self.display.clear();
        self.ctx.function_edit = 0;
        let active = self.ctx.roster.active_address();
        self.ctx.change_address = active;
        self.ctx.change_active = active;
        self.display.show_status("CHANGE FUNC", Color::Green);
        self.display.show_address(active, Highlight::Normal);
        self.display.show_function_editor(self.ctx.function_edit);
        self.show_selection();
        self.load_assignment();
    }

    pub(super) fn functions_change_event(&mut self, event: Event) {
        match event {
            Event::Encoder(EncoderEvent { gesture, delta }) => match gesture {
                Gesture::Turn if delta != 0 => self.edit_function(delta),
                Gesture::PushTurn if delta != 0 => {
                    self.ctx.change_address = self.ctx.roster.select_next(delta.signum());
                    self.show_selection();
                    self.load_assignment();
                    self.display
                        .show_address(self.ctx.change_address, Highlight::Normal);
                }
                Gesture::PushedNormal | Gesture::PushedLong => {
                    self.functions_change_store();
                    self.ctx.loco_selection = true;
                }
                _ => {}
            },
            Event::Button(Button::B5) => self.functions_change_store(),
            Event::Button(Button::Power) => {
                let active = self.ctx.change_active;
                if active != self.ctx.change_address {
                    if let Err(e) = self.ctx.roster.select_address(active) {
                        warn!("loco {} not restored: {}", active, e);
                    }
                    self.ctx.loco_selection = true;
                }
                self.transit(State::MainMenu1);
            }
            Event::Button(button) => self.assign_function(button),
            _ => {}
        }
    }

    fn functions_change_store(&mut self) {
        let address = self.ctx.change_address;
        if let Err(e) = self.ctx.roster.set_functions(address, self.ctx.assignment) {
            warn!("functions of {} not changed: {}", address, e);
            return;
        }
        storage::save_roster(&mut self.storage, &self.ctx.roster);
        self.display.show_address(address, Highlight::Stored);
    }

    fn load_assignment(&mut self) {
        for button in 0..FUNCTION_BUTTONS {
            self.ctx.assignment[button] = self.ctx.roster.function_assigned(button);
        }
        self.show_assignment();
    }

    fn edit_function(&mut self, delta: i8) {
        self.ctx.function_edit = next_function(self.ctx.function_edit, delta);
        self.display.show_function_editor(self.ctx.function_edit);
    }

    /// Put the function being edited on a function button.
    fn assign_function(&mut self, button: Button) {
        let Some(index) = button.function_index() else {
            return;
        };
        if !assignable(index, self.ctx.function_edit) {
            return;
        }
        self.ctx.assignment[index] = self.ctx.function_edit;
        self.display
            .show_function_assignment(index, self.ctx.function_edit);
    }

    fn show_function_editor(&mut self) {
        self.display.show_function_editor(self.ctx.function_edit);
        self.show_assignment();
    }

    fn show_assignment(&mut self) {
        for (button, &function) in self.ctx.assignment.iter().enumerate() {
            self.display.show_function_assignment(button, function);
        }
    }

    // Delete a loco.

    pub(super) fn delete_entry(&mut self) {
        self.display.clear();
        self.ctx.delete_address = self.ctx.roster.active_address();
        self.display.show_status("DELETE", Color::Green);
        self.display
            .show_address(self.ctx.delete_address, Highlight::Normal);
        self.show_selection();
    }

    pub(super) fn delete_event(&mut self, event: Event) {
        match event {
            Event::Encoder(EncoderEvent { gesture, delta }) => match gesture {
                Gesture::Turn if delta != 0 => {
                    self.ctx.delete_address = self.ctx.roster.select_next(delta.signum());
                    self.show_selection();
                    self.display
                        .show_address(self.ctx.delete_address, Highlight::Normal);
                }
                Gesture::PushedNormal | Gesture::PushedLong => self.delete_confirm(),
                _ => {}
            },
            Event::Button(Button::None) => {}
            Event::Button(_) => self.transit(State::MainMenu1),
            _ => {}
        }
    }

    fn delete_confirm(&mut self) {
        let address = self.ctx.delete_address;
        match self.ctx.roster.remove(address) {
            Ok(()) => {
                info!("loco {} deleted", address);
                storage::save_roster(&mut self.storage, &self.ctx.roster);
                self.ctx.delete_address = self.ctx.roster.active_address();
                self.show_selection();
                self.display
                    .show_address(self.ctx.delete_address, Highlight::Normal);
            }
            Err(RosterError::LastRecordRejected) => {
                self.display.show_address(address, Highlight::Rejected);
            }
            Err(e) => warn!("loco {} not deleted: {}", address, e),
        }
    }

    // Send the roster to the command station, one entry per request.

    pub(super) fn transmit_entry(&mut self) {
        self.ctx.transmit_index = 0;
        self.ctx.transmit_ticks = 0;
        self.display.show_status("SEND LOC DATA", Color::White);
        self.bus.submit(BusCommand::RosterTransmission(true));
    }

    pub(super) fn transmit_exit(&mut self) {
        self.bus.submit(BusCommand::RosterTransmission(false));
    }

    pub(super) fn transmit_event(&mut self, event: Event) {
        match event {
            Event::Tick(Tick::Fast) => {
                self.ctx.transmit_ticks = self.ctx.transmit_ticks.saturating_add(1);
            }
            Event::Bus(BusNotification::RosterTransmitRequest) => self.transmit_next(),
            Event::Bus(BusNotification::Power(PowerStatus::On | PowerStatus::Off)) => {
                self.transit(State::MainMenu2)
            }
            Event::Encoder(EncoderEvent {
                gesture: Gesture::Turn | Gesture::PushedNormal | Gesture::PushedLong,
                ..
            }) => self.transit(State::MainMenu2),
            Event::Button(Button::None) => {}
            Event::Button(_) => self.transit(State::MainMenu2),
            _ => {}
        }
    }

    fn transmit_next(&mut self) {
        if self.ctx.transmit_ticks < ROSTER_TX_INTERVAL_TICKS {
            return;
        }
        self.ctx.transmit_ticks = 0;

        let total = self.ctx.roster.len() as u16;
        let index = self.ctx.transmit_index;
        let Some(record) = self.ctx.roster.get(usize::from(index)) else {
            self.transit(State::MainMenu2);
            return;
        };
        self.bus.submit(BusCommand::TransmitRosterEntry {
            address: record.address,
            index,
            total,
        });
        self.display.show_transmit_progress(index + 1, total);

        self.ctx.transmit_index += 1;
        if self.ctx.transmit_index >= total {
            info!("roster transmit: {} locos sent", total);
            self.transit(State::MainMenu2);
        }
    }
}
