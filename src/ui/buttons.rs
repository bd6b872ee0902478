//! Push buttons.
//!
//! Seven buttons, active-low with internal pull-up:
//!   - B0..B4 - function buttons, address digits in the editors
//!   - B5     - turnout control, confirm in the editors
//!   - POWER  - track power, leave menus
//!
//! A press only counts once the pin has stayed low for
//! [`BUTTON_DEBOUNCE_MS`], and the next press needs a clean release.

use embassy_nrf::gpio::{AnyPin, Input, Pull};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;
use embassy_time::{with_timeout, Duration};

use crate::config::BUTTON_DEBOUNCE_MS;
use crate::event::{Button, Event, EVENT_QUEUE_DEPTH};

/// Watch one button forever, sending [`Event::Button`] per press.
pub async fn button_task(
    pin: AnyPin,
    button: Button,
    tx: &Sender<'static, CriticalSectionRawMutex, Event, EVENT_QUEUE_DEPTH>,
) -> ! {
    let mut input = Input::new(pin, Pull::Up);
    let settle = Duration::from_millis(BUTTON_DEBOUNCE_MS);

    loop {
        input.wait_for_low().await;
        if with_timeout(settle, input.wait_for_high()).await.is_ok() {
            // Bounced back up before settling.
            continue;
        }

        debug!("button {}", button);
        tx.send(Event::Button(button)).await;

        // Released only when high for a full settle period.
        loop {
            input.wait_for_high().await;
            if with_timeout(settle, input.wait_for_low()).await.is_err() {
                break;
            }
        }
    }
}
