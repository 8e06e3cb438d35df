//! StationDetail component: the station page with its related stations.

use airwave_proto::model::RadioStation;
use ratatui::crossterm::event::{KeyCode, KeyEvent, MouseButton, MouseEvent, MouseEventKind};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
    Frame,
};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    components::player_bar::status_icon,
    route::Route,
    stores::catalog::related,
    theme::{
        style_default, style_muted, style_secondary, style_selected, style_selected_focused,
        C_CATEGORY, C_FAVORITE, C_PRIMARY,
    },
    widgets::pane_chrome::{pane_chrome, Badge},
};

#[derive(Default)]
pub struct StationDetail {
    /// Cursor in the related list.
    selected: usize,
    related_area: Rect,
}

impl StationDetail {
    pub fn new() -> Self {
        Self::default()
    }

    fn related_of<'a>(state: &'a AppState) -> Vec<&'a RadioStation> {
        state
            .open_station()
            .map(|station| related(&state.stations, station))
            .unwrap_or_default()
    }

    fn info_lines(station: &RadioStation, state: &AppState) -> Vec<Line<'static>> {
        let mut title = vec![Span::styled(
            station.name.clone(),
            Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
        )];
        if station.is_featured {
            title.push(Span::styled("  ★ featured", Style::default().fg(C_FAVORITE)));
        }
        if state.is_favorite(&station.id) {
            title.push(Span::styled("  ♥", Style::default().fg(C_FAVORITE)));
        }

        let mut lines = vec![Line::from(title)];

        if !station.category.is_empty() {
            lines.push(Line::from(Span::styled(
                station.category.join(" · "),
                Style::default().fg(C_CATEGORY),
            )));
        }
        lines.push(Line::from(""));
        match station.description.as_deref().filter(|d| !d.is_empty()) {
            Some(desc) => lines.push(Line::from(Span::styled(desc.to_string(), style_default()))),
            None => lines.push(Line::from(Span::styled("no description", style_muted()))),
        }
        lines.push(Line::from(""));

        let session = &state.session;
        let status = if session.is_current(&station.id) {
            let (icon, color) = status_icon(session.status);
            Span::styled(
                format!("{} {:?}", icon, session.status).to_lowercase(),
                Style::default().fg(color),
            )
        } else {
            Span::styled("p to play", style_muted())
        };
        lines.push(Line::from(vec![
            Span::styled("status    ", style_secondary()),
            status,
        ]));
        lines.push(Line::from(vec![
            Span::styled("stream    ", style_secondary()),
            Span::styled(station.stream_url.clone(), style_muted()),
        ]));
        lines.push(Line::from(vec![
            Span::styled("listeners ", style_secondary()),
            Span::styled(station.listeners.to_string(), style_default()),
        ]));
        if let Some(created) = station.created_at {
            lines.push(Line::from(vec![
                Span::styled("added     ", style_secondary()),
                Span::styled(created.format("%Y-%m-%d").to_string(), style_muted()),
            ]));
        }
        lines
    }
}

impl Component for StationDetail {
    fn id(&self) -> ComponentId {
        ComponentId::StationDetail
    }

    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        let Some(station) = state.open_station() else {
            return vec![];
        };
        let related = Self::related_of(state);
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                self.selected = (self.selected + 1).min(related.len().saturating_sub(1));
            }
            KeyCode::Enter => {
                if let Some(next) = related.get(self.selected) {
                    return vec![Action::Navigate(Route::Station(next.id.clone()))];
                }
            }
            KeyCode::Char('p') => return vec![Action::PlayStation(station.clone())],
            KeyCode::Char('f') => return vec![Action::ToggleFavorite(station.id.clone())],
            KeyCode::Char('y') => return vec![Action::CopyToClipboard(station.stream_url.clone())],
            _ => {}
        }
        vec![]
    }

    fn handle_mouse(&mut self, event: MouseEvent, _area: Rect, state: &AppState) -> Vec<Action> {
        let r = self.related_area;
        let inside = event.column >= r.x
            && event.column < r.x + r.width
            && event.row >= r.y
            && event.row < r.y + r.height;
        if !inside {
            return vec![];
        }
        if let MouseEventKind::Down(MouseButton::Left) = event.kind {
            let row = (event.row - r.y) as usize;
            if let Some(next) = Self::related_of(state).get(row) {
                self.selected = row;
                return vec![Action::Navigate(Route::Station(next.id.clone()))];
            }
        }
        vec![]
    }

    fn on_action(&mut self, action: &Action, _state: &AppState) -> Vec<Action> {
        if let Action::Navigate(Route::Station(_)) = action {
            self.selected = 0;
        }
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let related = Self::related_of(state);
        let count = related.len().to_string();
        let block = pane_chrome(
            "station",
            Some("enter open related"),
            focused,
            Some(Badge {
                text: &count,
                color: C_CATEGORY,
            }),
        );
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let Some(station) = state.open_station() else {
            let msg = if state.catalog_loaded {
                "station not found"
            } else {
                "loading…"
            };
            frame.render_widget(Paragraph::new(Span::styled(msg, style_muted())), inner);
            return;
        };

        let related_h = if related.is_empty() {
            1
        } else {
            related.len() as u16
        };
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(3),
                Constraint::Length(1),
                Constraint::Length(related_h),
            ])
            .split(inner);

        frame.render_widget(
            Paragraph::new(Self::info_lines(station, state)).wrap(Wrap { trim: false }),
            rows[0],
        );
        frame.render_widget(
            Paragraph::new(Span::styled("related stations", style_secondary())),
            rows[1],
        );

        self.related_area = rows[2];
        if related.is_empty() {
            frame.render_widget(
                Paragraph::new(Span::styled("  nothing similar yet", style_muted())),
                rows[2],
            );
            return;
        }
        let lines: Vec<Line> = related
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let style = match (i == self.selected, focused) {
                    (true, true) => style_selected_focused(),
                    (true, false) => style_selected(),
                    _ => style_secondary(),
                };
                Line::from(vec![
                    Span::styled(format!("  {}", s.name), style),
                    Span::styled(
                        format!("  {}", s.category.join(" · ")),
                        Style::default().fg(C_CATEGORY),
                    ),
                ])
            })
            .collect();
        frame.render_widget(Paragraph::new(lines), rows[2]);
    }
}
