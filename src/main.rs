//! Firmware entry point for the nRF52840 throttle.
//!
//! Tasks produce [`Event`]s into one channel; the main loop is the single
//! consumer that feeds them to the state machine, then flushes the settings
//! image to flash if the event changed it.

#![no_std]
#![no_main]

use defmt::{info, unwrap, warn};
use embassy_embedded_hal::adapter::BlockingAsync;
use embassy_executor::Spawner;
use embassy_nrf::gpio::{AnyPin, Input, Pin, Pull};
use embassy_nrf::nvmc::Nvmc;
use embassy_nrf::twim::{self, Twim};
use embassy_nrf::{bind_interrupts, peripherals};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Ticker};
use static_cell::StaticCell;
use xnet_throttle::bus::{Bus, BusCommand};
use xnet_throttle::config::{TICK_FAST_MS, TICK_MEDIUM_MS, TICK_SLOW_MS};
use xnet_throttle::event::{Button, Event, Tick, EVENT_QUEUE_DEPTH};
use xnet_throttle::storage::StorageImage;
use xnet_throttle::ui::buttons::button_task;
use xnet_throttle::ui::display::OledDisplay;
use xnet_throttle::ui::encoder::{encoder_task, EncoderResources};
use xnet_throttle::App;
use {defmt_rtt as _, panic_probe as _};

bind_interrupts!(struct Irqs {
    TWISPI0 => twim::InterruptHandler<peripherals::TWISPI0>;
});

/// Commands waiting for the bus link.
const COMMAND_QUEUE_DEPTH: usize = 16;

static EVENTS: Channel<CriticalSectionRawMutex, Event, EVENT_QUEUE_DEPTH> = Channel::new();
static COMMANDS: Channel<CriticalSectionRawMutex, BusCommand, COMMAND_QUEUE_DEPTH> =
    Channel::new();

type Throttle = App<ChannelBus, StorageImage, OledDisplay<Twim<'static, peripherals::TWISPI0>>>;

// Roster and frame buffer stay off the stack.
static APP: StaticCell<Throttle> = StaticCell::new();

/// [`Bus`] that hands commands to the link task.
struct ChannelBus;

impl Bus for ChannelBus {
    fn submit(&mut self, command: BusCommand) {
        if COMMANDS.try_send(command).is_err() {
            warn!("bus queue full, {} dropped", command);
        }
    }
}

#[embassy_executor::task(pool_size = 3)]
async fn tick_task(tick: Tick, period_ms: u64) -> ! {
    let mut ticker = Ticker::every(Duration::from_millis(period_ms));
    loop {
        ticker.next().await;
        // A tick that does not fit is simply skipped.
        if EVENTS.try_send(Event::Tick(tick)).is_err() {
            warn!("event queue full, {} tick dropped", tick);
        }
    }
}

#[embassy_executor::task(pool_size = 7)]
async fn button(pin: AnyPin, button: Button) -> ! {
    button_task(pin, button, &EVENTS.sender()).await
}

#[embassy_executor::task]
async fn encoder(resources: EncoderResources) -> ! {
    encoder_task(resources, &EVENTS.sender()).await
}

/// Bus link. Commands are drained in order.
#[embassy_executor::task]
async fn bus_task() -> ! {
    // Bus transport is not wired on this board revision; commands are logged.
    loop {
        let command = COMMANDS.receive().await;
        info!("bus: {}", command);
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_nrf::init(Default::default());
    info!("xnet-throttle {}", xnet_throttle::VERSION);

    // Settings first: the state machine reads them on start.
    let mut flash = BlockingAsync::new(Nvmc::new(p.NVMC));
    let mut storage = StorageImage::new();
    if let Err(e) = storage.load_from_flash(&mut flash).await {
        warn!("settings not loaded: {}", e);
    }

    let mut i2c_config = twim::Config::default();
    i2c_config.frequency = twim::Frequency::K400;
    let i2c = Twim::new(p.TWISPI0, Irqs, p.P0_26, p.P0_27, i2c_config);
    let display = OledDisplay::new(i2c);

    unwrap!(spawner.spawn(tick_task(Tick::Fast, TICK_FAST_MS)));
    unwrap!(spawner.spawn(tick_task(Tick::Medium, TICK_MEDIUM_MS)));
    unwrap!(spawner.spawn(tick_task(Tick::Slow, TICK_SLOW_MS)));

    unwrap!(spawner.spawn(button(p.P0_11.degrade(), Button::B0)));
    unwrap!(spawner.spawn(button(p.P0_12.degrade(), Button::B1)));
    unwrap!(spawner.spawn(button(p.P0_24.degrade(), Button::B2)));
    unwrap!(spawner.spawn(button(p.P0_25.degrade(), Button::B3)));
    unwrap!(spawner.spawn(button(p.P1_08.degrade(), Button::B4)));
    unwrap!(spawner.spawn(button(p.P1_09.degrade(), Button::B5)));
    unwrap!(spawner.spawn(button(p.P0_28.degrade(), Button::Power)));

    let resources = EncoderResources {
        pin_sw: Input::new(p.P0_04, Pull::Up),
        pin_a: Input::new(p.P0_02, Pull::Up),
        pin_b: Input::new(p.P0_03, Pull::Up),
    };
    unwrap!(spawner.spawn(encoder(resources)));
    unwrap!(spawner.spawn(bus_task()));

    let app = APP.init(App::new(ChannelBus, storage, display));
    app.start();

    let events = EVENTS.receiver();
    loop {
        if app.storage().is_dirty() {
            if let Err(e) = app.storage_mut().save_to_flash(&mut flash).await {
                // Stays dirty; retried after the next event.
                warn!("settings not saved: {}", e);
            }
        }
        let event = events.receive().await;
        app.handle(event);
    }
}
