//! ConfirmDialog: yes/no popup in front of destructive admin actions.

use ratatui::crossterm::event::{KeyCode, KeyEvent, MouseEvent};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use super::help_overlay::centered_rect;
use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    theme::{C_ACCENT, C_MUTED, C_POPUP_BG, C_PRIMARY},
};

/// A pending question guarding `T`.
#[derive(Debug)]
pub enum Confirmation<T> {
    Idle,
    Asking { message: String, payload: T },
}

impl<T> Default for Confirmation<T> {
    fn default() -> Self {
        Confirmation::Idle
    }
}

impl<T> Confirmation<T> {
    /// Replaces any question still open.
    pub fn request(&mut self, message: impl Into<String>, payload: T) {
        *self = Confirmation::Asking {
            message: message.into(),
            payload,
        };
    }

    /// Close the dialog and hand back the guarded payload.
    pub fn confirm(&mut self) -> Option<T> {
        match std::mem::take(self) {
            Confirmation::Asking { payload, .. } => Some(payload),
            Confirmation::Idle => None,
        }
    }

    pub fn cancel(&mut self) {
        *self = Confirmation::Idle;
    }

    pub fn pending(&self) -> Option<&str> {
        match self {
            Confirmation::Asking { message, .. } => Some(message),
            Confirmation::Idle => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Confirmation::Asking { .. })
    }
}

#[derive(Default)]
pub struct ConfirmDialog {
    state: Confirmation<Action>,
}

impl ConfirmDialog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }
}

impl Component for ConfirmDialog {
    fn id(&self) -> ComponentId {
        ComponentId::ConfirmDialog
    }

    /// Takes every key while open.
    fn handle_key(&mut self, key: KeyEvent, _state: &AppState) -> Vec<Action> {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                self.state.confirm().into_iter().collect()
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc | KeyCode::Char('q') => {
                self.state.cancel();
                vec![]
            }
            _ => vec![],
        }
    }

    fn handle_mouse(&mut self, _event: MouseEvent, _area: Rect, _state: &AppState) -> Vec<Action> {
        vec![]
    }

    fn on_action(&mut self, action: &Action, _state: &AppState) -> Vec<Action> {
        if let Action::AskConfirm { message, action } = action {
            self.state.request(message.clone(), (**action).clone());
        }
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, _focused: bool, _state: &AppState) {
        let Some(message) = self.state.pending() else {
            return;
        };
        let popup = centered_rect(50, 7, area);
        let lines = vec![
            Line::from(""),
            Line::from(Span::styled(
                format!(" {}", message),
                Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(vec![
                Span::styled(" y", Style::default().fg(C_ACCENT).add_modifier(Modifier::BOLD)),
                Span::styled(" confirm   ", Style::default().fg(C_MUTED)),
                Span::styled("n", Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD)),
                Span::styled(" cancel", Style::default().fg(C_MUTED)),
            ]),
        ];
        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(lines)
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(C_ACCENT))
                        .title(" confirm ")
                        .style(Style::default().bg(C_POPUP_BG)),
                )
                .wrap(Wrap { trim: false }),
            popup,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirm_hands_back_the_payload_once() {
        let mut c = Confirmation::default();
        assert!(!c.is_open());
        c.request("Delete Jazz FM?", 7);
        assert_eq!(c.pending(), Some("Delete Jazz FM?"));
        assert_eq!(c.confirm(), Some(7));
        assert!(!c.is_open());
        assert_eq!(c.confirm(), None);
    }

    #[test]
    fn cancel_drops_the_payload() {
        let mut c = Confirmation::default();
        c.request("Revoke admin?", "u1");
        c.cancel();
        assert_eq!(c.pending(), None);
        assert_eq!(c.confirm(), None);
    }

    #[test]
    fn a_new_request_replaces_the_old() {
        let mut c = Confirmation::default();
        c.request("first", 1);
        c.request("second", 2);
        assert_eq!(c.pending(), Some("second"));
        assert_eq!(c.confirm(), Some(2));
    }
}
