//! CV programming sub-machine.
//!
//! Hosted by the `CvProgramming` application state. It owns the edited CV
//! number, value and (for programming on main) loco address, and runs the
//! request/answer handshake with the command station one request at a time.
//!
//! The sub-machine never touches the bus. It posts [`CvRequest`]s into the
//! event queue and the host state turns them into bus commands, so the
//! single-consumer dispatch order is kept.
//!
//! ```text
//!   Idle ──enter──▶ Editing ──read/write──▶ Waiting ──Ready/Data/error──▶ Editing
//!                      ▲                      │ Busy: re-issue on slow tick
//!                      └──────Timeout─────────┘ (bounded)
//! ```

use crate::bus::{CvResponse, CvStatus};
use crate::config::{CV_BUSY_RETRY_LIMIT, CV_NUMBER_MAX, CV_RESPONSE_TIMEOUT_TICKS};
use crate::event::{Button, CvRequest, EncoderEvent, Event, EventQueue, Gesture, Tick};
use crate::roster::{ADDRESS_MAX, ADDRESS_MIN, DEFAULT_ADDRESS};
use crate::ui::input_logic::adjust_clamped;

/// Programming track or programming on main.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CvMode {
    #[default]
    Cv,
    Pom,
}

/// Field the encoder currently edits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CvField {
    /// Loco address, programming on main only.
    PomAddress,
    #[default]
    Number,
    Value,
}

/// Result of the last transaction, as shown to the operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CvOutcome {
    Busy,
    Ready,
    NotFound,
    ShortCircuit,
    TransferError,
    /// A value was read back.
    Data,
    /// No usable answer within the retry bound.
    Timeout,
}

/// Snapshot for the display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CvView {
    pub mode: CvMode,
    pub focus: CvField,
    pub pom_address: u16,
    pub cv: u16,
    pub value: u8,
    /// A request is outstanding.
    pub waiting: bool,
    pub outcome: Option<CvOutcome>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Editing,
    Waiting {
        /// Request to re-issue on busy.
        request: CvRequest,
        /// The outstanding request is a read.
        reading: bool,
        attempts: u8,
        busy: bool,
        silent_ticks: u8,
    },
}

pub const CV_MIN: u16 = 1;

#[derive(Clone, Debug)]
pub struct CvProgrammer {
    mode: CvMode,
    focus: CvField,
    pom_address: u16,
    cv: u16,
    value: u8,
    phase: Phase,
    outcome: Option<CvOutcome>,
}

impl Default for CvProgrammer {
    fn default() -> Self {
        Self::new()
    }
}

impl CvProgrammer {
    pub const fn new() -> Self {
        Self {
            mode: CvMode::Cv,
            focus: CvField::Number,
            pom_address: DEFAULT_ADDRESS,
            cv: CV_MIN,
            value: 0,
            phase: Phase::Idle,
            outcome: None,
        }
    }

    /// Start a session. The CV number and value of a previous session are
    /// kept; a POM session targets `pom_address`.
    pub fn enter(&mut self, mode: CvMode, pom_address: u16) {
        self.mode = mode;
        self.pom_address = pom_address.clamp(ADDRESS_MIN, ADDRESS_MAX);
        self.focus = match mode {
            CvMode::Cv => CvField::Number,
            CvMode::Pom => CvField::PomAddress,
        };
        self.outcome = None;
        self.phase = Phase::Editing;
        info!("cv: enter {}", mode);
    }

    pub fn leave(&mut self) {
        self.phase = Phase::Idle;
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.phase, Phase::Idle)
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self.phase, Phase::Waiting { .. })
    }

    pub fn mode(&self) -> CvMode {
        self.mode
    }

    pub fn view(&self) -> CvView {
        CvView {
            mode: self.mode,
            focus: self.focus,
            pom_address: self.pom_address,
            cv: self.cv,
            value: self.value,
            waiting: self.is_waiting(),
            outcome: self.outcome,
        }
    }

    pub fn handle_encoder(&mut self, event: EncoderEvent, queue: &mut EventQueue) {
        if self.phase != Phase::Editing {
            return;
        }
        match event.gesture {
            Gesture::Turn => self.adjust(i32::from(event.delta)),
            Gesture::PushTurn => self.adjust(i32::from(event.delta) * 10),
            Gesture::PushedShort => self.cycle_focus(),
            Gesture::PushedNormal => match (self.mode, self.focus) {
                (CvMode::Cv, CvField::Number) => self.read(queue),
                _ => self.write(queue),
            },
            Gesture::PushedLong | Gesture::Released => {}
        }
    }

    pub fn handle_button(&mut self, button: Button, queue: &mut EventQueue) {
        match button {
            Button::Power => {
                queue.post(Event::Cv(CvRequest::Exit));
            }
            Button::B0 if self.phase == Phase::Editing && self.mode == CvMode::Cv => {
                self.read(queue)
            }
            Button::B1 if self.phase == Phase::Editing => self.write(queue),
            _ => {}
        }
    }

    pub fn handle_response(&mut self, response: CvResponse, queue: &mut EventQueue) {
        let reading = match &mut self.phase {
            Phase::Waiting {
                reading,
                silent_ticks,
                ..
            } => {
                *silent_ticks = 0;
                *reading
            }
            _ => return,
        };

        match response.status {
            CvStatus::Busy => {
                debug!("cv: command station busy");
                if let Phase::Waiting { busy, .. } = &mut self.phase {
                    *busy = true;
                }
                self.outcome = Some(CvOutcome::Busy);
            }
            // Read accepted; fetch the result.
            CvStatus::Ready if reading => self.reissue_as(CvRequest::StatusRequest, queue),
            CvStatus::Ready => self.finish(CvOutcome::Ready),
            CvStatus::DataReady => {
                self.value = response.value;
                self.focus = CvField::Value;
                self.finish(CvOutcome::Data);
            }
            CvStatus::NotFound => self.finish(CvOutcome::NotFound),
            CvStatus::ShortCircuit => self.finish(CvOutcome::ShortCircuit),
            CvStatus::TransferError => self.finish(CvOutcome::TransferError),
        }
    }

    pub fn handle_tick(&mut self, tick: Tick, queue: &mut EventQueue) {
        if tick != Tick::Slow {
            return;
        }
        let Phase::Waiting {
            request,
            attempts,
            busy,
            silent_ticks,
            ..
        } = self.phase
        else {
            return;
        };

        if busy {
            self.retry(request, attempts, queue);
        } else if silent_ticks + 1 >= CV_RESPONSE_TIMEOUT_TICKS {
            self.retry(CvRequest::StatusRequest, attempts, queue);
        } else if let Phase::Waiting { silent_ticks, .. } = &mut self.phase {
            *silent_ticks += 1;
        }
    }

    fn retry(&mut self, request: CvRequest, attempts: u8, queue: &mut EventQueue) {
        if attempts >= CV_BUSY_RETRY_LIMIT {
            warn!("cv: no answer after {} retries", attempts);
            self.finish(CvOutcome::Timeout);
            return;
        }
        debug!("cv: retry {} of {}", attempts + 1, CV_BUSY_RETRY_LIMIT);
        queue.post(Event::Cv(request));
        if let Phase::Waiting {
            attempts: pending_attempts,
            busy,
            silent_ticks,
            ..
        } = &mut self.phase
        {
            *pending_attempts = attempts + 1;
            *busy = false;
            *silent_ticks = 0;
        }
    }

    /// Keep waiting for the same transaction with a different pending request.
    fn reissue_as(&mut self, request: CvRequest, queue: &mut EventQueue) {
        queue.post(Event::Cv(request));
        if let Phase::Waiting {
            request: pending,
            busy,
            ..
        } = &mut self.phase
        {
            *pending = request;
            *busy = false;
        }
    }

    fn read(&mut self, queue: &mut EventQueue) {
        self.send(CvRequest::Read { cv: self.cv }, true, queue);
    }

    fn write(&mut self, queue: &mut EventQueue) {
        match self.mode {
            CvMode::Cv => self.send(
                CvRequest::Write {
                    cv: self.cv,
                    value: self.value,
                },
                false,
                queue,
            ),
            CvMode::Pom => {
                queue.post(Event::Cv(CvRequest::PomWrite {
                    address: self.pom_address,
                    cv: self.cv,
                    value: self.value,
                }));
                // Main track writes are not acknowledged.
                self.outcome = Some(CvOutcome::Ready);
            }
        }
    }

    fn send(&mut self, request: CvRequest, reading: bool, queue: &mut EventQueue) {
        queue.post(Event::Cv(request));
        self.outcome = None;
        self.phase = Phase::Waiting {
            request,
            reading,
            attempts: 0,
            busy: false,
            silent_ticks: 0,
        };
    }

    fn finish(&mut self, outcome: CvOutcome) {
        debug!("cv: {}", outcome);
        self.outcome = Some(outcome);
        self.phase = Phase::Editing;
    }

    fn adjust(&mut self, delta: i32) {
        self.outcome = None;
        match self.focus {
            CvField::PomAddress => {
                self.pom_address = adjust_clamped(
                    i32::from(self.pom_address),
                    delta,
                    i32::from(ADDRESS_MIN),
                    i32::from(ADDRESS_MAX),
                ) as u16;
            }
            CvField::Number => {
                self.cv = adjust_clamped(
                    i32::from(self.cv),
                    delta,
                    i32::from(CV_MIN),
                    i32::from(CV_NUMBER_MAX),
                ) as u16;
            }
            CvField::Value => {
                self.value = adjust_clamped(i32::from(self.value), delta, 0, 255) as u8;
            }
        }
    }

    fn cycle_focus(&mut self) {
        self.focus = match (self.mode, self.focus) {
            (CvMode::Pom, CvField::PomAddress) => CvField::Number,
            (_, CvField::Number) => CvField::Value,
            (CvMode::Pom, CvField::Value) => CvField::PomAddress,
            (CvMode::Cv, _) => CvField::Number,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(queue: &mut EventQueue) -> std::vec::Vec<Event> {
        core::iter::from_fn(|| queue.next()).collect()
    }

    fn editing_cv() -> (CvProgrammer, EventQueue) {
        let mut cv = CvProgrammer::new();
        cv.enter(CvMode::Cv, 3);
        (cv, EventQueue::new())
    }

    #[test]
    fn turn_and_push_turn_adjust_focused_field() {
        let (mut cv, mut queue) = editing_cv();
        cv.handle_encoder(EncoderEvent::turn(4), &mut queue);
        assert_eq!(cv.view().cv, 5);
        cv.handle_encoder(EncoderEvent::push_turn(2), &mut queue);
        assert_eq!(cv.view().cv, 25);
        cv.handle_encoder(EncoderEvent::push_turn(-10), &mut queue);
        assert_eq!(cv.view().cv, CV_MIN);

        cv.handle_encoder(EncoderEvent::press(Gesture::PushedShort), &mut queue);
        assert_eq!(cv.view().focus, CvField::Value);
        cv.handle_encoder(EncoderEvent::push_turn(30), &mut queue);
        assert_eq!(cv.view().value, 255);
        assert!(queue.is_empty());
    }

    #[test]
    fn read_then_ready_polls_result() {
        let (mut cv, mut queue) = editing_cv();
        cv.handle_encoder(EncoderEvent::press(Gesture::PushedNormal), &mut queue);
        assert_eq!(drain(&mut queue), [Event::Cv(CvRequest::Read { cv: 1 })]);
        assert!(cv.is_waiting());

        cv.handle_response(CvResponse::status(CvStatus::Ready), &mut queue);
        assert_eq!(drain(&mut queue), [Event::Cv(CvRequest::StatusRequest)]);
        assert!(cv.is_waiting());

        cv.handle_response(CvResponse::data(1, 42), &mut queue);
        let view = cv.view();
        assert!(!view.waiting);
        assert_eq!(view.value, 42);
        assert_eq!(view.focus, CvField::Value);
        assert_eq!(view.outcome, Some(CvOutcome::Data));
    }

    #[test]
    fn busy_is_retried_on_slow_tick() {
        let (mut cv, mut queue) = editing_cv();
        cv.handle_button(Button::B0, &mut queue);
        drain(&mut queue);

        cv.handle_response(CvResponse::status(CvStatus::Busy), &mut queue);
        assert!(queue.is_empty());
        assert!(cv.is_waiting());

        cv.handle_tick(Tick::Medium, &mut queue);
        assert!(queue.is_empty());
        cv.handle_tick(Tick::Slow, &mut queue);
        assert_eq!(drain(&mut queue), [Event::Cv(CvRequest::Read { cv: 1 })]);
    }

    #[test]
    fn busy_retries_are_bounded() {
        let (mut cv, mut queue) = editing_cv();
        cv.handle_button(Button::B0, &mut queue);
        for _ in 0..CV_BUSY_RETRY_LIMIT {
            cv.handle_response(CvResponse::status(CvStatus::Busy), &mut queue);
            cv.handle_tick(Tick::Slow, &mut queue);
        }
        assert_eq!(queue.len(), 1 + usize::from(CV_BUSY_RETRY_LIMIT));
        drain(&mut queue);

        cv.handle_response(CvResponse::status(CvStatus::Busy), &mut queue);
        cv.handle_tick(Tick::Slow, &mut queue);
        assert!(queue.is_empty());
        assert!(!cv.is_waiting());
        assert_eq!(cv.view().outcome, Some(CvOutcome::Timeout));
    }

    #[test]
    fn silence_polls_for_result() {
        let (mut cv, mut queue) = editing_cv();
        cv.handle_button(Button::B0, &mut queue);
        drain(&mut queue);
        for _ in 0..CV_RESPONSE_TIMEOUT_TICKS - 1 {
            cv.handle_tick(Tick::Slow, &mut queue);
        }
        assert!(queue.is_empty());
        cv.handle_tick(Tick::Slow, &mut queue);
        assert_eq!(drain(&mut queue), [Event::Cv(CvRequest::StatusRequest)]);
    }

    #[test]
    fn errors_return_to_editing() {
        let (mut cv, mut queue) = editing_cv();
        cv.handle_encoder(EncoderEvent::press(Gesture::PushedShort), &mut queue);
        cv.handle_encoder(EncoderEvent::turn(7), &mut queue);
        cv.handle_encoder(EncoderEvent::press(Gesture::PushedNormal), &mut queue);
        assert_eq!(
            drain(&mut queue),
            [Event::Cv(CvRequest::Write { cv: 1, value: 7 })]
        );
        cv.handle_response(CvResponse::status(CvStatus::ShortCircuit), &mut queue);
        assert!(!cv.is_waiting());
        assert_eq!(cv.view().outcome, Some(CvOutcome::ShortCircuit));

        // Editing works again.
        cv.handle_encoder(EncoderEvent::turn(1), &mut queue);
        assert_eq!(cv.view().value, 8);
    }

    #[test]
    fn write_completes_on_ready() {
        let (mut cv, mut queue) = editing_cv();
        cv.handle_button(Button::B1, &mut queue);
        cv.handle_response(CvResponse::status(CvStatus::Ready), &mut queue);
        assert_eq!(drain(&mut queue), [Event::Cv(CvRequest::Write { cv: 1, value: 0 })]);
        assert_eq!(cv.view().outcome, Some(CvOutcome::Ready));
    }

    #[test]
    fn pom_writes_complete_immediately() {
        let mut cv = CvProgrammer::new();
        let mut queue = EventQueue::new();
        cv.enter(CvMode::Pom, 1201);
        assert_eq!(cv.view().focus, CvField::PomAddress);

        cv.handle_button(Button::B0, &mut queue);
        assert!(queue.is_empty());

        cv.handle_encoder(EncoderEvent::press(Gesture::PushedShort), &mut queue);
        cv.handle_encoder(EncoderEvent::turn(2), &mut queue);
        cv.handle_encoder(EncoderEvent::press(Gesture::PushedShort), &mut queue);
        cv.handle_encoder(EncoderEvent::turn(9), &mut queue);
        cv.handle_encoder(EncoderEvent::press(Gesture::PushedNormal), &mut queue);
        assert_eq!(
            drain(&mut queue),
            [Event::Cv(CvRequest::PomWrite {
                address: 1201,
                cv: 3,
                value: 9
            })]
        );
        assert!(!cv.is_waiting());
        assert_eq!(cv.view().outcome, Some(CvOutcome::Ready));
    }

    #[test]
    fn power_button_requests_exit_even_while_waiting() {
        let (mut cv, mut queue) = editing_cv();
        cv.handle_button(Button::B0, &mut queue);
        drain(&mut queue);
        cv.handle_encoder(EncoderEvent::turn(1), &mut queue);
        assert_eq!(cv.view().cv, 1);
        cv.handle_button(Button::Power, &mut queue);
        assert_eq!(drain(&mut queue), [Event::Cv(CvRequest::Exit)]);
    }

    #[test]
    fn responses_outside_a_transaction_are_ignored() {
        let (mut cv, mut queue) = editing_cv();
        cv.handle_response(CvResponse::data(8, 145), &mut queue);
        assert_eq!(cv.view().value, 0);
        assert_eq!(cv.view().outcome, None);
    }
}
