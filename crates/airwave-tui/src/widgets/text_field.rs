//! TextField: a labelled single-line form input built on tui-input.

use ratatui::crossterm::event::{Event, KeyEvent};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use tui_input::{backend::crossterm::EventHandler, Input};

use crate::theme::{C_FILTER_BG, C_MUTED, C_PRIMARY, C_SECONDARY};

const LABEL_WIDTH: usize = 12;

pub struct TextField {
    label: &'static str,
    input: Input,
    masked: bool,
    placeholder: &'static str,
}

impl TextField {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            input: Input::default(),
            masked: false,
            placeholder: "",
        }
    }

    pub fn masked(mut self) -> Self {
        self.masked = true;
        self
    }

    pub fn placeholder(mut self, text: &'static str) -> Self {
        self.placeholder = text;
        self
    }

    pub fn value(&self) -> &str {
        self.input.value()
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.input = Input::new(value.into());
    }

    pub fn clear(&mut self) {
        self.input.reset();
    }

    /// Returns true when the text changed.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        self.input
            .handle_event(&Event::Key(key))
            .is_some_and(|change| change.value)
    }

    /// One row: `label  value`. The cursor is placed when `focused`.
    pub fn draw(&self, frame: &mut Frame, area: Rect, focused: bool) {
        if area.height == 0 || area.width as usize <= LABEL_WIDTH + 2 {
            return;
        }
        let label_style = if focused {
            Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(C_SECONDARY)
        };
        let field_w = area.width as usize - LABEL_WIDTH - 1;
        let scroll = self.input.visual_scroll(field_w.saturating_sub(1));
        let value = self.input.value();
        let shown = if value.is_empty() {
            Span::styled(self.placeholder, Style::default().fg(C_MUTED))
        } else if self.masked {
            Span::styled(
                "•".repeat(value.chars().count().saturating_sub(scroll)),
                Style::default().fg(C_PRIMARY),
            )
        } else {
            Span::styled(
                value.chars().skip(scroll).collect::<String>(),
                Style::default().fg(C_PRIMARY),
            )
        };
        let line = Line::from(vec![
            Span::styled(format!("{:<w$} ", self.label, w = LABEL_WIDTH), label_style),
            shown,
        ]);
        let style = if focused {
            Style::default().bg(C_FILTER_BG)
        } else {
            Style::default()
        };
        frame.render_widget(Paragraph::new(line).style(style), area);

        if focused {
            let x = area.x
                + LABEL_WIDTH as u16
                + 1
                + self.input.visual_cursor().saturating_sub(scroll) as u16;
            frame.set_cursor_position((x.min(area.right().saturating_sub(1)), area.y));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};

    #[test]
    fn typing_edits_the_value() {
        let mut field = TextField::new("Email");
        for c in "ab".chars() {
            assert!(field.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)));
        }
        assert!(field.handle_key(KeyEvent::new(KeyCode::Backspace, KeyModifiers::NONE)));
        assert_eq!(field.value(), "a");
        field.set_value("x@y.z");
        assert_eq!(field.value(), "x@y.z");
        field.clear();
        assert_eq!(field.value(), "");
    }
}
