//! Power-up: splash, own bus address, bus start, connecting and the first
//! loco fetch. Also the command-line hand-off.

use super::{App, State};
use crate::bus::{Bus, BusCommand, BusNotification};
use crate::config::{BUS_ADDRESS_MAX, BUS_ADDRESS_MIN, INIT_SPLASH_TICKS};
use crate::event::{EncoderEvent, Event, Gesture, Tick};
use crate::power::PowerStatus;
use crate::storage::{self, Storage};
use crate::ui::input_logic::next_bus_address;
use crate::ui::{Color, Display};

impl<B: Bus, S: Storage, D: Display> App<B, S, D> {
    pub(super) fn init_entry(&mut self) {
        self.display.clear();
        self.display.show_splash(crate::VERSION);
        storage::migrate_if_needed(&mut self.storage);
        self.ctx.roster = storage::load_roster(&mut self.storage);
        self.ctx.connect_count = 0;
    }

    pub(super) fn init_event(&mut self, event: Event) {
        if event != Event::Tick(Tick::Slow) {
            return;
        }
        self.ctx.connect_count += 1;
        if self.ctx.connect_count < INIT_SPLASH_TICKS {
            return;
        }

        let address = self.storage.bus_address();
        if (BUS_ADDRESS_MIN..=BUS_ADDRESS_MAX).contains(&address) {
            self.ctx.bus_address = address;
            self.ctx.connect_count = 0;
            self.transit(State::InitBus);
        } else {
            warn!("bus address {} not configured", address);
            self.transit(State::CheckBusAddress);
        }
    }

    pub(super) fn check_bus_address_entry(&mut self) {
        self.ctx.bus_address = BUS_ADDRESS_MIN;
        self.display.clear();
        self.display.show_status("XPRESSNET ADDRESS", Color::Yellow);
        self.display.show_bus_address(self.ctx.bus_address);
    }

    pub(super) fn check_bus_address_event(&mut self, event: Event) {
        let Event::Encoder(EncoderEvent { gesture, delta }) = event else {
            return;
        };
        match gesture {
            Gesture::Turn | Gesture::PushTurn if delta != 0 => {
                self.ctx.bus_address = next_bus_address(self.ctx.bus_address, delta);
                self.display.show_bus_address(self.ctx.bus_address);
            }
            Gesture::PushedNormal | Gesture::PushedLong => {
                info!("bus address set to {}", self.ctx.bus_address);
                self.storage.set_bus_address(self.ctx.bus_address);
                self.display.clear();
                self.reinitialize();
            }
            _ => {}
        }
    }

    pub(super) fn init_bus_entry(&mut self) {
        self.bus.submit(BusCommand::Start {
            address: self.ctx.bus_address,
        });
        self.ctx.invert_encoder = self.storage.invert_encoder();
        self.ctx.emergency_stop_enabled = self.storage.emergency_stop();
    }

    pub(super) fn init_bus_event(&mut self, event: Event) {
        if event == Event::Tick(Tick::Medium) {
            self.transit(State::GetPowerStatus);
        }
    }

    pub(super) fn get_power_status_entry(&mut self) {
        self.ctx.connect_count = 0;
        self.bus.submit(BusCommand::RequestPower);
    }

    pub(super) fn get_power_status_event(&mut self, event: Event) {
        match event {
            Event::Tick(Tick::Medium) => {
                if self.ctx.connect_count == 0 {
                    self.display.show_status("CONNECTING", Color::Green);
                }
                self.ctx.connect_count = self.ctx.connect_count.wrapping_add(1);
                self.display.show_connecting(self.ctx.connect_count);
                self.bus.submit(BusCommand::RequestPower);
            }
            Event::Bus(BusNotification::Power(PowerStatus::ProgrammingMode)) => {
                self.ctx.power = PowerStatus::ProgrammingMode;
                self.transit(State::ProgrammingMode);
            }
            Event::Bus(BusNotification::Power(status)) => {
                self.ctx.power = status;
                self.transit(State::GetLocData);
            }
            _ => {}
        }
    }

    pub(super) fn get_loc_data_event(&mut self, event: Event) {
        match event {
            Event::Tick(Tick::Medium) => self.request_loco_info(),
            Event::Bus(BusNotification::Power(PowerStatus::ProgrammingMode)) => {
                self.ctx.power = PowerStatus::ProgrammingMode;
                self.transit(State::ProgrammingMode);
            }
            Event::Bus(BusNotification::LocoInfo(info)) => {
                if info.is_placeholder() {
                    return;
                }
                self.display.clear();
                self.apply_loco_info(&info);
                let next = match self.ctx.power {
                    PowerStatus::Off => State::PowerOff,
                    PowerStatus::On => State::PowerOn,
                    PowerStatus::Emergency => State::Emergency,
                    PowerStatus::ProgrammingMode => State::ProgrammingMode,
                };
                self.transit(next);
            }
            _ => {}
        }
    }

    pub(super) fn command_line_entry(&mut self) {
        self.display.clear();
        self.display.show_status("COMMAND LINE", Color::Green);
        self.display.show_command_line();
    }
}
