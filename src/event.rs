//! Events consumed by the application state machine.
//!
//! Every input reaches the state machine as one [`Event`]: periodic ticks,
//! bus notifications, classified encoder gestures, button presses, requests
//! from the CV sub-machine and the diagnostic console trigger. Events are
//! handled strictly one at a time through the [`EventQueue`].

use heapless::Deque;

use crate::bus::BusNotification;

/// Maximum number of events waiting to be dispatched.
pub const EVENT_QUEUE_DEPTH: usize = 16;

/// Periodic timer sources.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Tick {
    /// ~100 ms.
    Fast,
    /// ~500 ms.
    Medium,
    /// ~3 s.
    Slow,
}

/// Classified rotary encoder gesture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Gesture {
    /// Knob turned.
    Turn,
    /// Knob turned while held down.
    PushTurn,
    PushedShort,
    PushedNormal,
    PushedLong,
    /// Knob let go after a push-turn or a long press.
    Released,
}

/// Encoder event. `delta` is the signed number of detents for turns and
/// zero for presses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EncoderEvent {
    pub gesture: Gesture,
    pub delta: i8,
}

impl EncoderEvent {
    pub const fn turn(delta: i8) -> Self {
        Self {
            gesture: Gesture::Turn,
            delta,
        }
    }

    pub const fn push_turn(delta: i8) -> Self {
        Self {
            gesture: Gesture::PushTurn,
            delta,
        }
    }

    pub const fn press(gesture: Gesture) -> Self {
        Self { gesture, delta: 0 }
    }
}

/// Physical buttons.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Button {
    B0,
    B1,
    B2,
    B3,
    B4,
    B5,
    Power,
    None,
}

impl Button {
    /// Index of a function button (B0..=B4).
    pub const fn function_index(self) -> Option<usize> {
        match self {
            Self::B0 => Some(0),
            Self::B1 => Some(1),
            Self::B2 => Some(2),
            Self::B3 => Some(3),
            Self::B4 => Some(4),
            _ => None,
        }
    }
}

/// Requests raised by the CV sub-machine for its host state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CvRequest {
    /// Read a CV on the programming track.
    Read { cv: u16 },
    /// Write a CV on the programming track.
    Write { cv: u16, value: u8 },
    /// Ask the command station for the result of the last request.
    StatusRequest,
    /// Write a CV on the main track (1-based CV number).
    PomWrite { address: u16, cv: u16, value: u8 },
    /// Leave CV programming.
    Exit,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Tick(Tick),
    Bus(BusNotification),
    Encoder(EncoderEvent),
    Button(Button),
    Cv(CvRequest),
    /// The diagnostic console took over.
    CliEnter,
}

/// Single-consumer FIFO of pending events.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Deque<Event, EVENT_QUEUE_DEPTH>,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            events: Deque::new(),
        }
    }

    /// Append an event. Returns false (and drops it) when the queue is full.
    pub fn post(&mut self, event: Event) -> bool {
        if self.events.push_back(event).is_err() {
            warn!("event queue full, event dropped");
            return false;
        }
        true
    }

    /// Next event in arrival order.
    pub fn next(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
