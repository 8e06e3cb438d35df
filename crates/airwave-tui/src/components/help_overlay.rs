//! HelpOverlay component: centered popup with the keyboard reference.

use ratatui::crossterm::event::{KeyCode, KeyEvent, MouseEvent};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    theme::{C_MUTED, C_PANEL_BORDER, C_POPUP_BG, C_PRIMARY, C_SECONDARY},
};

#[derive(Default)]
pub struct HelpOverlay {
    pub visible: bool,
}

impl HelpOverlay {
    pub fn new() -> Self {
        Self { visible: false }
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
    }
}

impl Component for HelpOverlay {
    fn id(&self) -> ComponentId {
        ComponentId::HelpOverlay
    }

    fn handle_key(&mut self, key: KeyEvent, _state: &AppState) -> Vec<Action> {
        if !self.visible {
            return vec![];
        }
        match key.code {
            KeyCode::Char('?') | KeyCode::Char('q') | KeyCode::Esc => vec![Action::ToggleHelp],
            // Consume all keys while overlay is open
            _ => vec![],
        }
    }

    fn handle_mouse(&mut self, _event: MouseEvent, _area: Rect, _state: &AppState) -> Vec<Action> {
        vec![]
    }

    fn on_action(&mut self, action: &Action, _state: &AppState) -> Vec<Action> {
        if let Action::ToggleHelp = action {
            self.toggle();
        }
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, _focused: bool, state: &AppState) {
        if !self.visible {
            return;
        }

        let popup = centered_rect(70, 44, area);

        let mut help_lines: Vec<Line> = vec![
            Line::from(Span::styled(
                " keyboard shortcuts",
                Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            section(" playback"),
            help_row("space", "play / pause (resumes the last station when idle)"),
            help_row("← / →  - / +", "volume down / up"),
            help_row("m", "mute / unmute"),
            help_row("S", "stop"),
            help_row("s", "sleep timer (← → pick, enter start, c cancel)"),
            Line::from(""),
            section(" navigation"),
            help_row("1 2 3", "home / discover / favorites"),
            help_row("4", "profile, or sign in"),
            help_row("tab / shift-tab", "focus next / previous pane"),
            help_row("esc", "back"),
            Line::from(""),
            section(" station lists"),
            help_row("↑ / ↓  j / k", "move selection"),
            help_row("g / G", "jump first / last"),
            help_row("enter", "open station page"),
            help_row("p", "play selected (double-click works too)"),
            help_row("f", "add / remove favorite"),
            help_row("y", "share: copy stream url"),
            help_row("/", "search (esc clears + closes)"),
            help_row("c / C", "next / previous category (discover)"),
            Line::from(""),
            section(" station page"),
            help_row("p", "play this station"),
            help_row("enter", "open the selected related station"),
            help_row("i", "write a comment (enter posts)"),
            help_row("x", "delete your selected comment"),
            Line::from(""),
            section(" account"),
            help_row("ctrl-r", "switch sign in / sign up"),
            help_row("ctrl-g / ctrl-o", "continue with GitHub / Google"),
            help_row("e / u / L", "edit profile / avatar / sign out"),
        ];
        if state.is_admin() {
            help_lines.extend([
                Line::from(""),
                section(" admin (5)"),
                help_row("t", "switch stations / users"),
                help_row("n / e / x", "new / edit / delete station"),
                help_row("ctrl-s", "save the station form"),
                help_row("g / r", "grant / revoke admin"),
            ]);
        }
        help_lines.extend([
            Line::from(""),
            help_row("K", "toggle keys bar"),
            help_row("?", "toggle this help overlay"),
            help_row("q / ctrl-c", "quit"),
            Line::from(""),
            Line::from(Span::styled(
                " press ? or esc to close",
                Style::default().fg(C_MUTED),
            )),
        ]);

        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(help_lines)
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(C_PANEL_BORDER))
                        .style(Style::default().bg(C_POPUP_BG)),
                )
                .wrap(Wrap { trim: false }),
            popup,
        );
    }
}

fn section(title: &str) -> Line<'_> {
    Line::from(Span::styled(
        title,
        Style::default().fg(C_MUTED).add_modifier(Modifier::BOLD),
    ))
}

fn help_row<'a>(key: &'a str, desc: &'a str) -> Line<'a> {
    Line::from(vec![
        Span::raw(" "),
        Span::styled(
            format!("{:<16}", key),
            Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
        ),
        Span::styled(desc, Style::default().fg(C_SECONDARY)),
    ])
}

pub fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vert[1])[1]
}
