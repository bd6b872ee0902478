//! Host-side [`Display`] that records the latest value of every element.
//!
//! The firmware renders from the same model, so tests see exactly what the
//! operator would.

use heapless::String;

use super::{Color, Display, Highlight, LocoView, MenuPage, Screen};
use crate::bus::TurnoutPosition;
use crate::cv::CvView;
use crate::roster::FUNCTION_BUTTONS;

/// Longest status line.
pub const STATUS_LEN: usize = 20;

#[derive(Clone, Debug, Default)]
pub struct ScreenModel {
    /// View selected by the most recent update.
    pub screen: Screen,
    pub version: String<16>,
    pub status: String<STATUS_LEN>,
    pub status_color: Color,
    pub connecting: u8,
    pub bus_address: u8,
    pub loco: Option<LocoView>,
    /// Address and name browsed while selecting.
    pub preview: Option<(u16, String<16>)>,
    /// 1-based position and roster size.
    pub selection: (usize, usize),
    pub turnout: (u16, TurnoutPosition),
    pub menu: Option<MenuPage>,
    pub address: u16,
    pub highlight: Highlight,
    /// The function editor is shown below the address.
    pub editing_functions: bool,
    pub function_edit: u8,
    pub assignment: [u8; FUNCTION_BUTTONS],
    pub transmit: (u16, u16),
    pub cv: Option<CvView>,
    /// Incremented on every update; the renderer redraws when it changes.
    pub revision: u32,
}

impl ScreenModel {
    pub fn new() -> Self {
        Self::default()
    }

    fn touch(&mut self, screen: Screen) {
        self.screen = screen;
        self.revision = self.revision.wrapping_add(1);
    }
}

fn truncated<const N: usize>(text: &str) -> String<N> {
    let mut out = String::new();
    for c in text.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

impl Display for ScreenModel {
    fn clear(&mut self) {
        let revision = self.revision;
        *self = Self::default();
        self.revision = revision.wrapping_add(1);
    }

    fn show_splash(&mut self, version: &str) {
        self.version = truncated(version);
        self.touch(Screen::Splash);
    }

    fn show_status(&mut self, text: &str, color: Color) {
        self.status = truncated(text);
        self.status_color = color;
        self.revision = self.revision.wrapping_add(1);
    }

    fn show_connecting(&mut self, count: u8) {
        self.connecting = count;
        self.revision = self.revision.wrapping_add(1);
    }

    fn show_bus_address(&mut self, address: u8) {
        self.bus_address = address;
        self.touch(Screen::BusAddress);
    }

    fn show_loco(&mut self, view: &LocoView) {
        self.loco = Some(view.clone());
        self.preview = None;
        self.touch(Screen::Loco);
    }

    fn show_loco_preview(&mut self, address: u16, name: &str) {
        self.preview = Some((address, truncated(name)));
        self.touch(Screen::Loco);
    }

    fn show_selection(&mut self, position: usize, count: usize) {
        self.selection = (position, count);
        self.revision = self.revision.wrapping_add(1);
    }

    fn show_turnout(&mut self, address: u16, position: TurnoutPosition) {
        self.turnout = (address, position);
        self.touch(Screen::Turnout);
    }

    fn show_menu(&mut self, page: MenuPage) {
        self.menu = Some(page);
        self.touch(Screen::Menu);
    }

    fn show_address(&mut self, address: u16, highlight: Highlight) {
        self.address = address;
        self.highlight = highlight;
        self.touch(Screen::Address);
    }

    fn show_function_editor(&mut self, function: u8) {
        self.function_edit = function;
        self.editing_functions = true;
        self.revision = self.revision.wrapping_add(1);
    }

    fn show_function_assignment(&mut self, button: usize, function: u8) {
        if let Some(slot) = self.assignment.get_mut(button) {
            *slot = function;
        }
        self.editing_functions = true;
        self.revision = self.revision.wrapping_add(1);
    }

    fn show_transmit_progress(&mut self, sent: u16, total: u16) {
        self.transmit = (sent, total);
        self.touch(Screen::Transmit);
    }

    fn show_erase(&mut self) {
        self.touch(Screen::Erase);
    }

    fn show_command_line(&mut self) {
        self.touch(Screen::CommandLine);
    }

    fn show_cv(&mut self, view: &CvView) {
        self.cv = Some(*view);
        self.touch(Screen::Cv);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_truncated() {
        let mut model = ScreenModel::new();
        model.show_status("A VERY LONG STATUS LINE TEXT", Color::Red);
        assert_eq!(model.status.len(), STATUS_LEN);
        assert_eq!(model.status_color, Color::Red);
    }

    #[test]
    fn clear_resets_elements_but_counts_revision() {
        let mut model = ScreenModel::new();
        model.show_turnout(12, TurnoutPosition::Forward);
        let revision = model.revision;
        model.clear();
        assert_eq!(model.screen, Screen::Splash);
        assert_eq!(model.turnout, (0, TurnoutPosition::Off));
        assert!(model.revision > revision);
    }

    #[test]
    fn assignment_ignores_unknown_button() {
        let mut model = ScreenModel::new();
        model.show_function_assignment(2, 17);
        model.show_function_assignment(9, 3);
        assert_eq!(model.assignment, [0, 0, 17, 0, 0]);
    }
}
