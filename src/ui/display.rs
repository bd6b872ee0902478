//! SSD1306 OLED display driver.
//!
//! [`OledDisplay`] implements the [`Display`] trait by updating a
//! [`ScreenModel`] and redrawing the whole frame from it. The panel is
//! monochrome: green and white status lines are drawn normally, red and
//! yellow ones inverted.

use core::fmt::Write;

use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::mono_font::{MonoTextStyle, MonoTextStyleBuilder};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::Text;
use heapless::String;
use ssd1306::mode::BufferedGraphicsMode;
use ssd1306::prelude::*;
use ssd1306::I2CDisplayInterface;
use ssd1306::Ssd1306;

use super::model::ScreenModel;
use super::{Color, Display, Highlight, LocoView, MenuPage, Screen};
use crate::bus::TurnoutPosition;
use crate::cv::{CvField, CvMode, CvOutcome, CvView};
use crate::roster::FUNCTION_BUTTONS;
use crate::speed::Direction;

/// Type alias for the concrete display driver.
///
/// Generic over the I²C implementation so callers pass in their HAL's
/// I²C peripheral.
pub type Oled<I2C> =
    Ssd1306<I2CInterface<I2C>, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>;

/// One text line on the panel.
type Line = String<32>;

/// Baselines of the five text rows.
const ROWS: [i32; 5] = [10, 22, 34, 46, 58];

/// Initialise the SSD1306 display and clear the screen.
pub fn init<I2C>(i2c: I2C) -> Oled<I2C>
where
    I2C: embedded_hal::i2c::I2c,
{
    let interface = I2CDisplayInterface::new(i2c);
    let mut display = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
        .into_buffered_graphics_mode();
    if display.init().is_err() {
        warn!("display init failed");
    }
    display.clear_buffer();
    let _ = display.flush();
    display
}

fn text_style() -> MonoTextStyle<'static, BinaryColor> {
    MonoTextStyleBuilder::new()
        .font(&FONT_6X10)
        .text_color(BinaryColor::On)
        .build()
}

fn inverted_style() -> MonoTextStyle<'static, BinaryColor> {
    MonoTextStyleBuilder::new()
        .font(&FONT_6X10)
        .text_color(BinaryColor::Off)
        .background_color(BinaryColor::On)
        .build()
}

/// SSD1306 panel plus the model it renders.
pub struct OledDisplay<I2C> {
    driver: Oled<I2C>,
    model: ScreenModel,
    drawn: u32,
}

impl<I2C> OledDisplay<I2C>
where
    I2C: embedded_hal::i2c::I2c,
{
    pub fn new(i2c: I2C) -> Self {
        Self {
            driver: init(i2c),
            model: ScreenModel::new(),
            drawn: u32::MAX,
        }
    }

    pub fn model(&self) -> &ScreenModel {
        &self.model
    }

    fn text(&mut self, row: usize, x: i32, text: &str) {
        let _ = Text::new(text, Point::new(x, ROWS[row]), text_style()).draw(&mut self.driver);
    }

    /// Redraw the frame if the model changed since the last flush.
    fn render(&mut self) {
        if self.model.revision == self.drawn {
            return;
        }
        self.drawn = self.model.revision;
        self.driver.clear_buffer();

        // Menu and CV screens use the top row for their title.
        let titled = matches!(self.model.screen, Screen::Menu | Screen::Cv);
        if !titled && !self.model.status.is_empty() {
            let style = match self.model.status_color {
                Color::White | Color::Green => text_style(),
                Color::Red | Color::Yellow => inverted_style(),
            };
            let _ = Text::new(self.model.status.as_str(), Point::new(0, ROWS[0]), style)
                .draw(&mut self.driver);
        }

        match self.model.screen {
            Screen::Splash => self.draw_splash(),
            Screen::BusAddress => self.draw_bus_address(),
            Screen::Loco => self.draw_loco(),
            Screen::Turnout => self.draw_turnout(),
            Screen::Menu => self.draw_menu(),
            Screen::Address => self.draw_address(),
            Screen::Cv => self.draw_cv(),
            Screen::Transmit => self.draw_transmit(),
            Screen::Erase => self.text(2, 0, "ERASING..."),
            Screen::CommandLine => self.text(2, 0, "Serial console active"),
        }

        if self.model.connecting > 0 && self.model.screen == Screen::Splash {
            // Animated dots: "." / ".." / "..."
            let dots = match self.model.connecting % 4 {
                0 => "",
                1 => ".",
                2 => "..",
                _ => "...",
            };
            self.text(4, 0, dots);
        }

        if self.driver.flush().is_err() {
            warn!("display flush failed");
        }
    }

    fn draw_splash(&mut self) {
        self.text(1, 0, "XNET THROTTLE");
        let mut line = Line::new();
        let _ = write!(line, "v{}", self.model.version.as_str());
        self.text(2, 0, &line);
    }

    fn draw_bus_address(&mut self) {
        let mut line = Line::new();
        let _ = write!(line, "Address: {}", self.model.bus_address);
        self.text(2, 0, &line);
        self.text(4, 0, "Turn to change");
    }

    fn draw_loco(&mut self) {
        let mut line = Line::new();
        let (position, count) = self.model.selection;
        let _ = write!(line, "{}/{}", position, count);
        self.text(0, 92, &line);

        if let Some((address, name)) = self.model.preview.clone() {
            line.clear();
            let _ = write!(line, "> {} {}", address, name.as_str());
            self.text(2, 0, &line);
            return;
        }
        let Some(loco) = self.model.loco.clone() else {
            return;
        };
        self.draw_loco_view(&loco);
    }

    fn draw_loco_view(&mut self, loco: &LocoView) {
        let mut line = Line::new();
        let _ = write!(line, "{} {}", loco.address, loco.name.as_str());
        if loco.occupied {
            let _ = line.push_str(" *");
        }
        self.text(1, 0, &line);

        line.clear();
        let arrow = match loco.direction {
            Direction::Forward => ">>",
            Direction::Backward => "<<",
        };
        let _ = write!(
            line,
            "{} {:3}/{}",
            arrow,
            loco.speed,
            loco.steps.max_speed()
        );
        self.text(2, 0, &line);

        line.clear();
        for button in 0..FUNCTION_BUTTONS {
            let marker = if loco.button_active(button) { '#' } else { '-' };
            let _ = write!(line, "F{}{} ", loco.functions[button], marker);
        }
        self.text(4, 0, &line);
    }

    fn draw_turnout(&mut self) {
        let (address, position) = self.model.turnout;
        let mut line = Line::new();
        let _ = write!(line, "Turnout {}", address);
        self.text(2, 0, &line);
        let state = match position {
            TurnoutPosition::Off => "",
            TurnoutPosition::Forward => "STRAIGHT",
            TurnoutPosition::Turn => "DIVERGING",
        };
        self.text(3, 0, state);
        self.text(4, 0, "B4:str B5:div");
    }

    fn draw_menu(&mut self) {
        match self.model.menu {
            Some(MenuPage::Main) | None => {
                self.text(0, 0, "MENU 1/2");
                self.text(1, 0, "1 Add loco");
                self.text(2, 0, "2 Functions 3 Delete");
                self.text(3, 0, "4 CV prog   5 POM");
            }
            Some(MenuPage::Settings { emergency_stop }) => {
                self.text(0, 0, "MENU 2/2");
                self.text(1, 0, "1 Bus address");
                let estop = if emergency_stop { "2 E-stop: on" } else { "2 E-stop: off" };
                self.text(2, 0, estop);
                self.text(3, 0, "3 Send roster");
                self.text(4, 0, "4 Erase 5 Reset");
            }
        }
    }

    fn draw_address(&mut self) {
        let mut line = Line::new();
        let _ = write!(line, "Loco {}", self.model.address);
        match self.model.highlight {
            Highlight::Normal => {}
            Highlight::Rejected => {
                let _ = line.push_str(" !");
            }
            Highlight::Stored => {
                let _ = line.push_str(" ok");
            }
        }
        self.text(1, 0, &line);

        let (position, count) = self.model.selection;
        line.clear();
        let _ = write!(line, "{}/{}", position, count);
        self.text(0, 92, &line);

        if self.model.editing_functions {
            line.clear();
            let _ = write!(line, "Function F{}", self.model.function_edit);
            self.text(2, 0, &line);
            line.clear();
            for function in self.model.assignment {
                let _ = write!(line, "{} ", function);
            }
            self.text(4, 0, &line);
        }
    }

    fn draw_cv(&mut self) {
        let Some(view) = self.model.cv else {
            return;
        };
        let title = match view.mode {
            CvMode::Cv => "CV PROG TRACK",
            CvMode::Pom => "CV ON MAIN",
        };
        self.text(0, 0, title);

        let marker = |field| if view.focus == field { '>' } else { ' ' };
        let mut line = Line::new();
        if view.mode == CvMode::Pom {
            let _ = write!(line, "{}Loco {}", marker(CvField::PomAddress), view.pom_address);
            self.text(1, 0, &line);
        }
        line.clear();
        let _ = write!(line, "{}CV {}", marker(CvField::Number), view.cv);
        self.text(2, 0, &line);
        line.clear();
        let _ = write!(line, "{}Value {}", marker(CvField::Value), view.value);
        self.text(3, 0, &line);

        let result = match (view.waiting, view.outcome) {
            (true, _) => "WAIT",
            (false, None) => "",
            (false, Some(CvOutcome::Busy)) => "BUSY",
            (false, Some(CvOutcome::Ready)) => "READY",
            (false, Some(CvOutcome::Data)) => "DATA",
            (false, Some(CvOutcome::NotFound)) => "NO ACK",
            (false, Some(CvOutcome::ShortCircuit)) => "SHORT",
            (false, Some(CvOutcome::TransferError)) => "ERROR",
            (false, Some(CvOutcome::Timeout)) => "TIMEOUT",
        };
        self.text(4, 0, result);
    }

    fn draw_transmit(&mut self) {
        let (sent, total) = self.model.transmit;
        let mut line = Line::new();
        let _ = write!(line, "Sent {}/{}", sent, total);
        self.text(2, 0, &line);
    }
}

impl<I2C> Display for OledDisplay<I2C>
where
    I2C: embedded_hal::i2c::I2c,
{
    fn clear(&mut self) {
        self.model.clear();
        self.render();
    }

    fn show_splash(&mut self, version: &str) {
        self.model.show_splash(version);
        self.render();
    }

    fn show_status(&mut self, text: &str, color: Color) {
        self.model.show_status(text, color);
        self.render();
    }

    fn show_connecting(&mut self, count: u8) {
        self.model.show_connecting(count);
        self.render();
    }

    fn show_bus_address(&mut self, address: u8) {
        self.model.show_bus_address(address);
        self.render();
    }

    fn show_loco(&mut self, view: &LocoView) {
        self.model.show_loco(view);
        self.render();
    }

    fn show_loco_preview(&mut self, address: u16, name: &str) {
        self.model.show_loco_preview(address, name);
        self.render();
    }

    fn show_selection(&mut self, position: usize, count: usize) {
        self.model.show_selection(position, count);
        self.render();
    }

    fn show_turnout(&mut self, address: u16, position: TurnoutPosition) {
        self.model.show_turnout(address, position);
        self.render();
    }

    fn show_menu(&mut self, page: MenuPage) {
        self.model.show_menu(page);
        self.render();
    }

    fn show_address(&mut self, address: u16, highlight: Highlight) {
        self.model.show_address(address, highlight);
        self.render();
    }

    fn show_function_editor(&mut self, function: u8) {
        self.model.show_function_editor(function);
        self.render();
    }

    fn show_function_assignment(&mut self, button: usize, function: u8) {
        self.model.show_function_assignment(button, function);
        self.render();
    }

    fn show_transmit_progress(&mut self, sent: u16, total: u16) {
        self.model.show_transmit_progress(sent, total);
        self.render();
    }

    fn show_erase(&mut self) {
        self.model.show_erase();
        self.render();
    }

    fn show_command_line(&mut self) {
        self.model.show_command_line();
        self.render();
    }

    fn show_cv(&mut self, view: &CvView) {
        self.model.show_cv(view);
        self.render();
    }
}
