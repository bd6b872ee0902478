//! Turnout (accessory decoder) control.
//!
//! Forward and Turn energise the output only briefly: the next medium tick
//! after [`TURNOUT_OFF_TICKS`] sends Off, and leaving the state while an
//! output is still energised sends Off right away.

use super::{App, State};
use crate::bus::{Bus, BusCommand, BusNotification, TurnoutPosition};
use crate::config::TURNOUT_OFF_TICKS;
use crate::event::{Button, EncoderEvent, Event, Gesture, Tick};
use crate::power::{PowerCommand, PowerStatus};
use crate::roster::{ADDRESS_MAX, ADDRESS_MIN};
use crate::storage::Storage;
use crate::ui::input_logic::step_wrapping;
use crate::ui::{Color, Display};

impl<B: Bus, S: Storage, D: Display> App<B, S, D> {
    pub(super) fn turnout_entry(&mut self) {
        self.ctx.turnout.position = TurnoutPosition::Off;
        self.display.show_status("TURNOUT", Color::Green);
        self.show_turnout();
    }

    pub(super) fn turnout_exit(&mut self) {
        if self.ctx.turnout.position.is_active() {
            self.turnout_off();
        }
    }

    pub(super) fn turnout_event(&mut self, event: Event) {
        match event {
            Event::Tick(Tick::Medium) => {
                let turnout = &mut self.ctx.turnout;
                if turnout.position.is_active() {
                    turnout.off_delay = turnout.off_delay.saturating_sub(1);
                    if turnout.off_delay == 0 {
                        self.turnout_off();
                    }
                }
            }
            Event::Bus(BusNotification::Power(PowerStatus::Off)) => {
                self.transit(State::TurnoutControlPowerOff)
            }
            Event::Bus(BusNotification::Power(PowerStatus::ProgrammingMode)) => {
                self.ctx.power = PowerStatus::ProgrammingMode;
                self.transit(State::ProgrammingMode);
            }
            Event::Encoder(EncoderEvent { gesture, delta }) => match gesture {
                Gesture::Turn if delta != 0 => {
                    self.ctx.turnout.address = step_wrapping(
                        i32::from(self.ctx.turnout.address),
                        i32::from(delta.signum()),
                        i32::from(ADDRESS_MIN),
                        i32::from(ADDRESS_MAX),
                    ) as u16;
                    self.show_turnout();
                }
                Gesture::PushedShort => {
                    self.ctx.turnout.address = ADDRESS_MIN;
                    self.show_turnout();
                }
                Gesture::PushedNormal | Gesture::PushedLong => {
                    self.transit(State::GetPowerStatus);
                }
                _ => {}
            },
            Event::Button(button) => self.turnout_button(button),
            _ => {}
        }
    }

    fn turnout_button(&mut self, button: Button) {
        let step = match button {
            Button::Power => {
                self.bus.submit(BusCommand::SetPower(PowerCommand::TrackOff));
                return;
            }
            Button::B0 => 1,
            Button::B1 => 10,
            Button::B2 => 100,
            Button::B3 => 1000,
            Button::B4 => {
                self.turnout_pulse(TurnoutPosition::Forward);
                return;
            }
            Button::B5 => {
                self.turnout_pulse(TurnoutPosition::Turn);
                return;
            }
            Button::None => return,
        };

        let address = self.ctx.turnout.address + step;
        self.ctx.turnout.address = if address > ADDRESS_MAX {
            ADDRESS_MIN
        } else {
            address
        };
        self.show_turnout();
    }

    fn turnout_pulse(&mut self, position: TurnoutPosition) {
        let turnout = self.ctx.turnout;
        if turnout.position.is_active() && turnout.active_address != turnout.address {
            self.turnout_off();
        }

        let address = self.ctx.turnout.address;
        self.ctx.turnout.position = position;
        self.ctx.turnout.active_address = address;
        self.ctx.turnout.off_delay = TURNOUT_OFF_TICKS;
        debug!("turnout {} {}", address, position);
        self.bus.submit(BusCommand::SetTurnout { address, position });
        self.show_turnout();
    }

    /// De-energise the output that was last pulsed.
    fn turnout_off(&mut self) {
        self.ctx.turnout.position = TurnoutPosition::Off;
        self.ctx.turnout.off_delay = 0;
        self.bus.submit(BusCommand::SetTurnout {
            address: self.ctx.turnout.active_address,
            position: TurnoutPosition::Off,
        });
        self.show_turnout();
    }

    fn show_turnout(&mut self) {
        let turnout = self.ctx.turnout;
        self.display.show_turnout(turnout.address, turnout.position);
    }

    pub(super) fn turnout_power_off_entry(&mut self) {
        self.ctx.power = PowerStatus::Off;
        self.display.show_status("TURNOUT", Color::Red);
    }

    pub(super) fn turnout_power_off_event(&mut self, event: Event) {
        match event {
            Event::Bus(BusNotification::Power(PowerStatus::On)) => {
                self.transit(State::TurnoutControl)
            }
            Event::Bus(BusNotification::Power(PowerStatus::ProgrammingMode)) => {
                self.ctx.power = PowerStatus::ProgrammingMode;
                self.transit(State::ProgrammingMode);
            }
            Event::Encoder(EncoderEvent {
                gesture: Gesture::PushedNormal | Gesture::PushedLong,
                ..
            }) => self.transit(State::GetLocData),
            Event::Button(Button::Power) => {
                self.bus.submit(BusCommand::SetPower(PowerCommand::Normal));
            }
            _ => {}
        }
    }
}
