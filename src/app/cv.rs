//! Host state of the CV sub-machine: forwards input to it and turns its
//! requests into bus commands.

use super::{App, State};
use crate::bus::{Bus, BusCommand, BusNotification};
use crate::cv::CvMode;
use crate::event::{Button, CvRequest, EncoderEvent, Event, Gesture};
use crate::power::{PowerCommand, PowerStatus};
use crate::storage::Storage;
use crate::ui::Display;

impl<B: Bus, S: Storage, D: Display> App<B, S, D> {
    pub(super) fn cv_entry(&mut self) {
        self.display.clear();
        let address = self.ctx.roster.active_address();
        if self.ctx.cv_pom {
            // Programming on main needs track power.
            self.bus.submit(BusCommand::SetPower(PowerCommand::Normal));
            self.cv.enter(CvMode::Pom, address);
        } else {
            self.cv.enter(CvMode::Cv, address);
        }
        self.show_cv();
    }

    pub(super) fn cv_exit(&mut self) {
        self.cv.leave();
        self.ctx.cv_from_power_on = false;
    }

    pub(super) fn cv_event(&mut self, event: Event) {
        match event {
            Event::Bus(BusNotification::Power(PowerStatus::Off)) => {
                self.transit(State::GetPowerStatus)
            }
            // Kept for the live state chosen when the session ends.
            Event::Bus(BusNotification::Power(status)) => self.ctx.power = status,
            Event::Bus(BusNotification::Cv(response)) => {
                self.cv.handle_response(response, &mut self.queue);
                self.show_cv();
            }
            Event::Tick(tick) => {
                self.cv.handle_tick(tick, &mut self.queue);
                if self.cv.is_waiting() {
                    self.show_cv();
                }
            }
            Event::Encoder(
                encoder @ EncoderEvent {
                    gesture:
                        Gesture::Turn
                        | Gesture::PushTurn
                        | Gesture::PushedShort
                        | Gesture::PushedNormal,
                    ..
                },
            ) => {
                self.cv.handle_encoder(encoder, &mut self.queue);
                self.show_cv();
            }
            Event::Button(Button::None) => {}
            Event::Button(button) => {
                self.cv.handle_button(button, &mut self.queue);
                self.show_cv();
            }
            Event::Cv(request) => self.cv_request(request),
            _ => {}
        }
    }

    fn cv_request(&mut self, request: CvRequest) {
        let command = match request {
            CvRequest::Read { cv } => BusCommand::ReadCv { cv },
            CvRequest::Write { cv, value } => BusCommand::WriteCv { cv, value },
            CvRequest::StatusRequest => BusCommand::RequestCvResult,
            CvRequest::PomWrite { address, cv, value } => {
                BusCommand::WriteCvPom { address, cv, value }
            }
            CvRequest::Exit => {
                if self.ctx.cv_from_power_on {
                    self.transit(State::GetLocData);
                } else {
                    self.bus.submit(BusCommand::SetPower(PowerCommand::TrackOff));
                    self.transit(State::MainMenu1);
                }
                return;
            }
        };
        self.bus.submit(command);
    }

    fn show_cv(&mut self) {
        let view = self.cv.view();
        self.display.show_cv(&view);
    }
}
