//! Rotary encoder with push switch.
//!
//! Polled every millisecond. Detents become `Turn`, or `PushTurn` while the
//! knob is held down. The switch is classified by how long it was held; see
//! [`classify_release`] and [`long_press_due`].

use embassy_nrf::gpio::Input;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;
use embassy_time::{Duration, Instant, Ticker};
use rotary_encoder_embedded::{Direction, RotaryEncoder};

use super::input_logic::{classify_release, long_press_due};
use crate::config::ENCODER_POLL_MS;
use crate::event::{EncoderEvent, Event, Gesture, EVENT_QUEUE_DEPTH};

/// Resources for reading the rotary encoder.
pub struct EncoderResources {
    /// The pin for the encoder's push button.
    pub pin_sw: Input<'static>,
    /// The pin for phase A.
    pub pin_a: Input<'static>,
    /// The pin for phase B.
    pub pin_b: Input<'static>,
}

/// State of the push switch.
struct Push {
    since: Instant,
    turned: bool,
    long_sent: bool,
}

/// Read the encoder and switch forever.
pub async fn encoder_task(
    resources: EncoderResources,
    tx: &Sender<'static, CriticalSectionRawMutex, Event, EVENT_QUEUE_DEPTH>,
) -> ! {
    let EncoderResources {
        pin_sw,
        pin_a,
        pin_b,
    } = resources;
    let mut rotary_encoder = RotaryEncoder::new(pin_a, pin_b).into_standard_mode();
    rotary_encoder.update();

    let mut ticker = Ticker::every(Duration::from_millis(ENCODER_POLL_MS));
    let mut push: Option<Push> = None;

    loop {
        let delta: i8 = match rotary_encoder.update() {
            Direction::Clockwise => 1,
            Direction::Anticlockwise => -1,
            _ => 0,
        };
        let pressed = pin_sw.is_low();

        if pressed && push.is_none() {
            push = Some(Push {
                since: Instant::now(),
                turned: false,
                long_sent: false,
            });
        }

        if delta != 0 {
            let event = match push.as_mut() {
                Some(push) => {
                    push.turned = true;
                    EncoderEvent::push_turn(delta)
                }
                None => EncoderEvent::turn(delta),
            };
            tx.send(Event::Encoder(event)).await;
        }

        let mut released = false;
        if let Some(state) = push.as_mut() {
            let held = state.since.elapsed().as_millis();
            if pressed {
                if long_press_due(held, state.turned, state.long_sent) {
                    state.long_sent = true;
                    debug!("encoder: long press");
                    tx.send(Event::Encoder(EncoderEvent::press(Gesture::PushedLong)))
                        .await;
                }
            } else {
                released = true;
                if let Some(gesture) = classify_release(held, state.turned, state.long_sent) {
                    debug!("encoder: {} after {} ms", gesture, held);
                    tx.send(Event::Encoder(EncoderEvent::press(gesture))).await;
                }
            }
        }
        if released {
            push = None;
        }

        ticker.next().await;
    }
}
