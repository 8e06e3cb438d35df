//! Status bar: bottom line with the input mode and keybindings.

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::route::Route;
use crate::theme::{C_MODE_FILTER, C_MODE_INSERT, C_MODE_NORMAL, C_MUTED, C_SEPARATOR};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    Filter,
    /// A form field or the comment box has the keyboard.
    Insert,
}

impl InputMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Filter => "FILTER",
            Self::Insert => "INSERT",
        }
    }

    pub fn color(self) -> Color {
        match self {
            Self::Normal => C_MODE_NORMAL,
            Self::Filter => C_MODE_FILTER,
            Self::Insert => C_MODE_INSERT,
        }
    }
}

pub fn draw_separator(frame: &mut Frame, area: Rect) {
    let line = Line::from(Span::styled(
        "─".repeat(area.width as usize),
        Style::default().fg(C_SEPARATOR),
    ));
    frame.render_widget(Paragraph::new(line), area);
}

fn keys_for(mode: InputMode, route: &Route) -> &'static str {
    match mode {
        InputMode::Filter => " type to search  ↑↓ move  Enter keep  Esc clear+close  Tab next pane",
        InputMode::Insert => match route {
            Route::Login | Route::Register => {
                " Tab/↑↓ field  Enter submit  ^R sign in/up  ^G GitHub  ^O Google  Esc back"
            }
            Route::Admin => " Tab field  Enter add category  ^F featured  ^U image  ^S save  Esc close",
            _ => " type  Tab next field  Enter submit  Esc leave field",
        },
        InputMode::Normal => match route {
            Route::Home | Route::Favorites => {
                " ↑↓/jk select  Enter open  p play  Space pause  f favorite  y share  ←→ vol  m mute  s sleep  1-5 go  ? help  q quit"
            }
            Route::Discover => {
                " ↑↓/jk select  Enter open  p play  / search  c/C category  f favorite  y share  ←→ vol  s sleep  ? help  q quit"
            }
            Route::Station(_) => {
                " Tab panes  p play  f favorite  y share  i comment  x delete comment  Esc back  ? help  q quit"
            }
            Route::Login | Route::Register => " Enter sign in  Tab panes  Esc back  ? help  q quit",
            Route::Profile => " e edit  u avatar  L sign out  Esc back  ? help  q quit",
            Route::Admin => {
                " t stations/users  n new  e edit  x delete  g grant  r revoke  / filter  Esc back  ? help  q quit"
            }
        },
    }
}

/// One row: mode label then the keys that apply right now.
pub fn draw_keys_bar(frame: &mut Frame, area: Rect, mode: InputMode, route: &Route) {
    let spans = vec![
        Span::styled(
            format!(" {} ", mode.label()),
            Style::default()
                .fg(mode.color())
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(keys_for(mode, route), Style::default().fg(C_MUTED)),
    ];
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
