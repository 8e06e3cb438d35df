//! Component trait: the interface every UI panel implements.
//!
//! Components own their view state, read shared data from `AppState` and
//! return `Vec<Action>`; the App is the only thing that talks to the stores.

use ratatui::crossterm::event::{KeyEvent, MouseEvent};
use ratatui::{layout::Rect, Frame};

use crate::action::{Action, ComponentId};
use crate::app_state::AppState;
use crate::widgets::status_bar::InputMode;

pub trait Component {
    fn id(&self) -> ComponentId;

    /// Only called when this component has focus.
    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action>;

    fn handle_mouse(&mut self, event: MouseEvent, area: Rect, state: &AppState) -> Vec<Action>;

    /// Called each tick (~100ms).
    fn tick(&mut self, _state: &AppState) -> Vec<Action> {
        Vec::new()
    }

    /// Receive an action dispatched by the App, focused or not.
    fn on_action(&mut self, action: &Action, state: &AppState) -> Vec<Action>;

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState);

    /// Mode shown in the status bar while this component has focus.
    /// Anything but `Normal` means the component takes every key.
    fn input_mode(&self) -> InputMode {
        InputMode::Normal
    }

    fn min_height(&self) -> u16 {
        3
    }
}
