//! Header component: app title, route tabs and the signed-in user.
//!
//! Not focusable; tabs are clickable.

use ratatui::crossterm::event::{KeyEvent, MouseButton, MouseEvent, MouseEventKind};
use ratatui::{
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    route::Route,
    theme::{style_label, C_ACCENT, C_ADMIN, C_MUTED, C_NUMBER_HINT, C_SECONDARY},
    widgets::status_bar::draw_separator,
};

const LOGO: &str = " ♫ airwave ";

#[derive(Default)]
pub struct Header {
    /// Tab hit boxes from the last draw.
    tabs: Vec<(Route, Rect)>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }
}

fn tabs(state: &AppState) -> Vec<(char, &'static str, Route)> {
    let mut tabs = vec![
        ('1', "home", Route::Home),
        ('2', "discover", Route::Discover),
        ('3', "favorites", Route::Favorites),
    ];
    if state.user.is_some() {
        tabs.push(('4', "profile", Route::Profile));
    } else {
        tabs.push(('4', "sign in", Route::Login));
    }
    if state.is_admin() {
        tabs.push(('5', "admin", Route::Admin));
    }
    tabs
}

fn is_active(tab: &Route, current: &Route) -> bool {
    match (tab, current) {
        (Route::Login, Route::Register) => true,
        (Route::Discover, Route::Station(_)) => true,
        _ => tab == current,
    }
}

impl Component for Header {
    fn id(&self) -> ComponentId {
        ComponentId::Header
    }

    fn handle_key(&mut self, _key: KeyEvent, _state: &AppState) -> Vec<Action> {
        vec![]
    }

    fn handle_mouse(&mut self, event: MouseEvent, _area: Rect, _state: &AppState) -> Vec<Action> {
        if event.kind != MouseEventKind::Down(MouseButton::Left) {
            return vec![];
        }
        self.tabs
            .iter()
            .find(|(_, r)| {
                event.row == r.y && event.column >= r.x && event.column < r.x + r.width
            })
            .map(|(route, _)| vec![Action::Navigate(route.clone())])
            .unwrap_or_default()
    }

    fn on_action(&mut self, _action: &Action, _state: &AppState) -> Vec<Action> {
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, _focused: bool, state: &AppState) {
        if area.height == 0 {
            return;
        }
        let row = Rect { height: 1, ..area };

        self.tabs.clear();
        let mut spans = vec![Span::styled(
            LOGO,
            Style::default().fg(C_ACCENT).add_modifier(Modifier::BOLD),
        )];
        let mut x = area.x + LOGO.width() as u16;
        for (key, label, route) in tabs(state) {
            let hint = format!(" [{}] ", key);
            let width = (hint.width() + label.width()) as u16;
            spans.push(Span::styled(hint, Style::default().fg(C_NUMBER_HINT)));
            spans.push(Span::styled(label, style_label(is_active(&route, &state.route))));
            self.tabs.push((
                route,
                Rect {
                    x,
                    y: area.y,
                    width,
                    height: 1,
                },
            ));
            x += width;
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), row);

        let mut right = Vec::new();
        match &state.user {
            Some(user) => {
                if user.is_admin() {
                    right.push(Span::styled(
                        "ADMIN ",
                        Style::default().fg(C_ADMIN).add_modifier(Modifier::BOLD),
                    ));
                }
                right.push(Span::styled(
                    user.display_name().to_string(),
                    Style::default().fg(C_SECONDARY),
                ));
            }
            None => right.push(Span::styled("signed out", Style::default().fg(C_MUTED))),
        }
        right.push(Span::styled(
            format!("  {} ", state.backend_label),
            Style::default().fg(C_MUTED),
        ));
        frame.render_widget(
            Paragraph::new(Line::from(right)).alignment(Alignment::Right),
            row,
        );

        if area.height > 1 {
            draw_separator(
                frame,
                Rect {
                    y: area.y + 1,
                    height: 1,
                    ..area
                },
            );
        }
    }
}
