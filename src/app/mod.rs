//! Application state machine.
//!
//! One [`App`] owns the roster, the CV sub-machine and the collaborators
//! (bus, storage, display). Every input arrives as an [`Event`] and is
//! dispatched to the handler of the current [`State`]; events a state does
//! not handle are dropped. Handlers run to completion and may post further
//! events, which are dispatched in order before [`App::handle`] returns.
//!
//! State handlers are grouped by area:
//! - `setup.rs`: power-up, bus address, connecting, first loco fetch
//! - `live.rs`: driving under the four power states, roster import
//! - `turnout.rs`: accessory control
//! - `menu.rs`: roster editing, settings, roster transmit
//! - `cv.rs`: host state of the CV sub-machine

mod cv;
mod live;
mod menu;
mod setup;
mod turnout;


use heapless::Vec;

use crate::bus::{Bus, BusCommand, LocoInfo, RosterEntry, TurnoutPosition};
use crate::config::{SKIP_AFTER_DRIVE, SKIP_AFTER_INPUT};
use crate::cv::{CvProgrammer, CvView};
use crate::event::{Button, Event, EventQueue};
use crate::power::PowerStatus;
use crate::roster::{Roster, ADDRESS_MIN, DEFAULT_FUNCTIONS, FUNCTION_BUTTONS, ROSTER_CAPACITY};
use crate::speed;
use crate::storage::Storage;
use crate::ui::{Display, LocoView};

/// Operating states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    Init,
    CheckBusAddress,
    InitBus,
    GetPowerStatus,
    GetLocData,
    PowerOff,
    PowerOn,
    Emergency,
    ProgrammingMode,
    TurnoutControl,
    TurnoutControlPowerOff,
    MainMenu1,
    MainMenu2,
    MenuLocAdd,
    MenuLocFunctionsAdd,
    MenuLocFunctionsChange,
    MenuLocDelete,
    MenuTransmitRosterDatabase,
    CommandLine,
    CvProgramming,
}

/// Turnout being operated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TurnoutState {
    /// Address shown in the editor.
    pub address: u16,
    pub position: TurnoutPosition,
    /// Address the active output was sent to.
    pub active_address: u16,
    /// Medium ticks left before the output is switched off.
    pub off_delay: u8,
}

impl Default for TurnoutState {
    fn default() -> Self {
        Self {
            address: ADDRESS_MIN,
            position: TurnoutPosition::Off,
            active_address: ADDRESS_MIN,
            off_delay: 0,
        }
    }
}

/// Everything the state handlers share.
#[derive(Clone, Debug)]
pub struct Context {
    pub roster: Roster,
    /// Last power status reported by the command station.
    pub power: PowerStatus,
    pub bus_address: u8,
    /// Splash ticks in `Init`, connect attempts in `GetPowerStatus`.
    pub connect_count: u8,
    /// Medium ticks during which loco polling pauses.
    pub skip_request: u8,
    /// A different loco is being browsed; loco info is not applied.
    pub loco_selection: bool,
    /// The knob was let go after browsing; the next loco info is applied.
    pub button_released: bool,
    pub emergency_stop_enabled: bool,
    pub invert_encoder: bool,
    pub turnout: TurnoutState,
    /// CV session targets the main track.
    pub cv_pom: bool,
    /// CV session was entered by long press from live control.
    pub cv_from_power_on: bool,
    pub add_address: u16,
    /// Function number selected in the function editor.
    pub function_edit: u8,
    pub assignment: [u8; FUNCTION_BUTTONS],
    pub change_address: u16,
    /// Loco that was active when function editing started.
    pub change_active: u16,
    pub delete_address: u16,
    /// Roster packets received from the command station.
    pub import: Vec<RosterEntry, ROSTER_CAPACITY>,
    pub transmit_index: u16,
    /// Fast ticks since the last roster packet was sent.
    pub transmit_ticks: u8,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self {
            roster: Roster::new(),
            power: PowerStatus::Off,
            bus_address: 0,
            connect_count: 0,
            skip_request: 0,
            loco_selection: false,
            button_released: false,
            emergency_stop_enabled: false,
            invert_encoder: false,
            turnout: TurnoutState::default(),
            cv_pom: false,
            cv_from_power_on: false,
            add_address: ADDRESS_MIN,
            function_edit: 0,
            assignment: DEFAULT_FUNCTIONS,
            change_address: ADDRESS_MIN,
            change_active: ADDRESS_MIN,
            delete_address: ADDRESS_MIN,
            import: Vec::new(),
            transmit_index: 0,
            transmit_ticks: 0,
        }
    }
}

/// The throttle application.
pub struct App<B, S, D> {
    state: State,
    ctx: Context,
    cv: CvProgrammer,
    bus: B,
    storage: S,
    display: D,
    queue: EventQueue,
}

impl<B: Bus, S: Storage, D: Display> App<B, S, D> {
    /// Create the application. Nothing runs until [`start`](Self::start).
    pub fn new(bus: B, storage: S, display: D) -> Self {
        Self {
            state: State::Init,
            ctx: Context::new(),
            cv: CvProgrammer::new(),
            bus,
            storage,
            display,
            queue: EventQueue::new(),
        }
    }

    /// Run the `Init` entry action.
    pub fn start(&mut self) {
        info!("throttle start");
        self.reinitialize();
    }

    /// Drop all cached state and start over from `Init`, as after a reset.
    /// Pending events are discarded and no exit action runs.
    pub fn reinitialize(&mut self) {
        info!("reinitialize");
        self.queue.clear();
        self.ctx = Context::new();
        self.cv = CvProgrammer::new();
        self.state = State::Init;
        self.enter(State::Init);
    }

    /// Dispatch `event` and everything it causes.
    pub fn handle(&mut self, event: Event) {
        self.queue.post(event);
        while let Some(event) = self.queue.next() {
            self.dispatch(event);
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn roster(&self) -> &Roster {
        &self.ctx.roster
    }

    pub fn power(&self) -> PowerStatus {
        self.ctx.power
    }

    pub fn turnout(&self) -> TurnoutState {
        self.ctx.turnout
    }

    pub fn cv_view(&self) -> CvView {
        self.cv.view()
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    fn dispatch(&mut self, event: Event) {
        // The configured inversion is applied here and nowhere else.
        let event = match event {
            Event::Encoder(mut encoder) if self.ctx.invert_encoder => {
                encoder.delta = encoder.delta.saturating_neg();
                Event::Encoder(encoder)
            }
            other => other,
        };

        if event == Event::CliEnter {
            if self.state != State::CommandLine {
                self.transit(State::CommandLine);
            }
            return;
        }

        match self.state {
            State::Init => self.init_event(event),
            State::CheckBusAddress => self.check_bus_address_event(event),
            State::InitBus => self.init_bus_event(event),
            State::GetPowerStatus => self.get_power_status_event(event),
            State::GetLocData => self.get_loc_data_event(event),
            State::PowerOff => self.power_off_event(event),
            State::PowerOn => self.power_on_event(event),
            State::Emergency => self.emergency_event(event),
            State::ProgrammingMode => self.programming_mode_event(event),
            State::TurnoutControl => self.turnout_event(event),
            State::TurnoutControlPowerOff => self.turnout_power_off_event(event),
            State::MainMenu1 => self.main_menu1_event(event),
            State::MainMenu2 => self.main_menu2_event(event),
            State::MenuLocAdd => self.loc_add_event(event),
            State::MenuLocFunctionsAdd => self.functions_add_event(event),
            State::MenuLocFunctionsChange => self.functions_change_event(event),
            State::MenuLocDelete => self.delete_event(event),
            State::MenuTransmitRosterDatabase => self.transmit_event(event),
            State::CommandLine => {}
            State::CvProgramming => self.cv_event(event),
        }
    }

    /// Leave the current state and enter `next`.
    fn transit(&mut self, next: State) {
        info!("state {} -> {}", self.state, next);
        self.exit(self.state);
        self.state = next;
        self.enter(next);
    }

    fn enter(&mut self, state: State) {
        match state {
            State::Init => self.init_entry(),
            State::CheckBusAddress => self.check_bus_address_entry(),
            State::InitBus => self.init_bus_entry(),
            State::GetPowerStatus => self.get_power_status_entry(),
            State::GetLocData => self.request_loco_info(),
            State::PowerOff => self.power_off_entry(),
            State::PowerOn => self.power_on_entry(),
            State::Emergency => self.emergency_entry(),
            State::ProgrammingMode => self.programming_mode_entry(),
            State::TurnoutControl => self.turnout_entry(),
            State::TurnoutControlPowerOff => self.turnout_power_off_entry(),
            State::MainMenu1 => self.main_menu1_entry(),
            State::MainMenu2 => self.main_menu2_entry(),
            State::MenuLocAdd => self.loc_add_entry(),
            State::MenuLocFunctionsAdd => self.functions_add_entry(),
            State::MenuLocFunctionsChange => self.functions_change_entry(),
            State::MenuLocDelete => self.delete_entry(),
            State::MenuTransmitRosterDatabase => self.transmit_entry(),
            State::CommandLine => self.command_line_entry(),
            State::CvProgramming => self.cv_entry(),
        }
    }

    fn exit(&mut self, state: State) {
        match state {
            State::CheckBusAddress => self.display.clear(),
            State::TurnoutControl => self.turnout_exit(),
            State::MenuTransmitRosterDatabase => self.transmit_exit(),
            State::CvProgramming => self.cv_exit(),
            _ => {}
        }
    }

    // Helpers shared by several states.

    fn request_loco_info(&mut self) {
        let address = self.ctx.roster.active_address();
        self.bus.submit(BusCommand::RequestLocoInfo { address });
    }

    /// Send speed and direction of the active loco, then ask for its state.
    fn send_drive(&mut self) {
        let roster = &self.ctx.roster;
        let address = roster.active_address();
        let steps = roster.steps();
        let speed = speed::drive_byte(steps, roster.speed(), roster.direction());
        self.bus.submit(BusCommand::Drive {
            address,
            steps,
            speed,
        });
        self.request_loco_info();
        self.ctx.skip_request = SKIP_AFTER_DRIVE;
    }

    fn show_loco(&mut self) {
        let view = LocoView::from(self.ctx.roster.active());
        self.display.show_loco(&view);
    }

    fn show_selection(&mut self) {
        self.display.show_selection(
            self.ctx.roster.selected_index() + 1,
            self.ctx.roster.len(),
        );
    }

    /// Apply loco info for the active loco and redraw it. Answers for other
    /// addresses are ignored.
    fn apply_loco_info(&mut self, info: &LocoInfo) {
        if info.is_placeholder() {
            return;
        }
        let applied = self.ctx.roster.update_runtime(
            info.address,
            info.linear_speed(),
            info.direction(),
            info.function_bits,
            info.steps(),
        );
        if !applied {
            debug!("loco info for {} ignored", info.address);
            return;
        }
        self.ctx.roster.set_occupied(info.occupied);
        self.ctx.loco_selection = false;
        self.show_loco();
    }

    /// Periodic loco poll, paused while `skip_request` runs down or while
    /// another loco is being browsed.
    fn poll_loco_info(&mut self) {
        if self.ctx.skip_request > 0 {
            self.ctx.skip_request -= 1;
            return;
        }
        self.ctx.skip_request = SKIP_AFTER_INPUT;
        if !self.ctx.loco_selection {
            self.request_loco_info();
        }
    }

    /// Browse the roster with the knob held down.
    fn select_loco(&mut self, delta: i8) {
        if delta == 0 {
            return;
        }
        let address = self.ctx.roster.select_next(delta.signum());
        self.show_selection();
        let name = self.ctx.roster.active().name.clone();
        self.display.show_loco_preview(address, &name);
        self.ctx.loco_selection = true;
    }

    /// Knob let go: fetch the (possibly new) active loco.
    fn release_selection(&mut self) {
        if self.ctx.loco_selection {
            let index = self.ctx.roster.selected_index() as u16;
            self.storage.set_selected_index(index);
        }
        self.ctx.skip_request = SKIP_AFTER_INPUT;
        self.ctx.button_released = true;
        self.request_loco_info();
    }

    /// Toggle the function assigned to a function button.
    fn toggle_function(&mut self, button: Button) {
        let Some(index) = button.function_index() else {
            return;
        };
        let function = self.ctx.roster.function_assigned(index);
        self.ctx.roster.function_toggle(function);
        let state = self.ctx.roster.function_status(function);
        self.bus.submit(BusCommand::SetFunction {
            address: self.ctx.roster.active_address(),
            function,
            state,
        });
        self.show_loco();
    }
}
