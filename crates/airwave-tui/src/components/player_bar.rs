//! PlayerBar component: now playing, volume, stream clock and the sleep
//! timer picker.

use ratatui::crossterm::event::{KeyCode, KeyEvent, MouseButton, MouseEvent, MouseEventKind};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    route::Route,
    session::{PlaybackStatus, SessionState},
    theme::{
        C_ACCENT, C_CATEGORY, C_CONNECTING, C_FAVORITE, C_MUTED, C_PLAYING, C_PRIMARY,
        C_SECONDARY, C_SELECTION_BG,
    },
    widgets::{
        pane_chrome::{pane_chrome, Badge},
        progress_bar::{draw_progress, fmt_time},
    },
};

pub const VOLUME_STEP: f32 = 0.05;

pub struct PlayerBar {
    picker_open: bool,
    picker_idx: usize,
    /// Hit boxes from the last draw.
    play_area: Rect,
    volume_area: Rect,
}

pub fn status_icon(status: PlaybackStatus) -> (&'static str, Color) {
    match status {
        PlaybackStatus::Playing => ("▶", C_PLAYING),
        PlaybackStatus::Paused => ("⏸", C_CONNECTING),
        PlaybackStatus::Connecting => ("⋯", C_CONNECTING),
        PlaybackStatus::Error => ("✗", C_ACCENT),
        PlaybackStatus::Idle => ("■", C_MUTED),
    }
}

fn fmt_remaining(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

impl PlayerBar {
    pub fn new() -> Self {
        Self {
            picker_open: false,
            picker_idx: 0,
            play_area: Rect::default(),
            volume_area: Rect::default(),
        }
    }

    pub fn picker_open(&self) -> bool {
        self.picker_open
    }

    pub fn open_picker(&mut self, state: &AppState) {
        self.picker_open = !state.sleep_presets.is_empty();
        self.picker_idx = self.picker_idx.min(state.sleep_presets.len().saturating_sub(1));
    }

    /// Keys while the picker is open; it takes all of them.
    pub fn handle_picker_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        let n = state.sleep_presets.len();
        match key.code {
            KeyCode::Left | KeyCode::Char('h') => {
                self.picker_idx = self.picker_idx.saturating_sub(1);
            }
            KeyCode::Right | KeyCode::Char('l') => {
                self.picker_idx = (self.picker_idx + 1).min(n.saturating_sub(1));
            }
            KeyCode::Enter => {
                self.picker_open = false;
                if let Some(&mins) = state.sleep_presets.get(self.picker_idx) {
                    return vec![Action::StartSleep(mins)];
                }
            }
            KeyCode::Char('c') => {
                self.picker_open = false;
                return vec![Action::CancelSleep];
            }
            KeyCode::Esc | KeyCode::Char('s') | KeyCode::Char('q') => {
                self.picker_open = false;
            }
            _ => {}
        }
        vec![]
    }

    fn now_playing_line(&self, state: &AppState) -> Line<'static> {
        let session = &state.session;
        let Some(station) = &session.station else {
            if let Some(last) = state.last_station() {
                return Line::from(vec![
                    Span::styled(" ■  ", Style::default().fg(C_MUTED)),
                    Span::styled("nothing playing  ", Style::default().fg(C_SECONDARY)),
                    Span::styled(
                        format!("r resume {}", last.name),
                        Style::default().fg(C_MUTED),
                    ),
                ]);
            }
            return Line::from(Span::styled(
                " ■  nothing playing",
                Style::default().fg(C_MUTED),
            ));
        };

        let (icon, color) = status_icon(session.status);
        let mut spans = vec![
            Span::styled(format!(" {}  ", icon), Style::default().fg(color)),
            Span::styled(
                station.name.clone(),
                Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
            ),
        ];
        if state.is_favorite(&station.id) {
            spans.push(Span::styled(" ♥", Style::default().fg(C_FAVORITE)));
        }
        if let Some(category) = station.primary_category() {
            spans.push(Span::styled(
                format!("  {}", category),
                Style::default().fg(C_CATEGORY),
            ));
        }
        let note = match session.status {
            PlaybackStatus::Connecting if session.buffering => Some("buffering…"),
            PlaybackStatus::Connecting => Some("connecting…"),
            PlaybackStatus::Error => Some("stream error"),
            _ => None,
        };
        if let Some(note) = note {
            spans.push(Span::styled(
                format!("  {}", note),
                Style::default().fg(color),
            ));
        }
        Line::from(spans)
    }

    fn draw_picker(&self, frame: &mut Frame, area: Rect, state: &AppState) {
        let mut spans = vec![Span::styled(" sleep in ", Style::default().fg(C_SECONDARY))];
        for (i, mins) in state.sleep_presets.iter().enumerate() {
            let style = if i == self.picker_idx {
                Style::default()
                    .fg(C_PRIMARY)
                    .bg(C_SELECTION_BG)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(C_MUTED)
            };
            spans.push(Span::styled(format!(" {}m ", mins), style));
        }
        spans.push(Span::styled(
            "  enter start  c cancel  esc close",
            Style::default().fg(C_MUTED),
        ));
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }
}

impl Default for PlayerBar {
    fn default() -> Self {
        Self::new()
    }
}

fn sleep_badge(session: &SessionState) -> Option<String> {
    session
        .sleep_remaining
        .map(|secs| format!("sleep {}", fmt_remaining(secs)))
}

impl Component for PlayerBar {
    fn id(&self) -> ComponentId {
        ComponentId::PlayerBar
    }

    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        let current = state.session.station.as_ref();
        match key.code {
            KeyCode::Char('c') if state.session.sleep_remaining.is_some() => {
                vec![Action::CancelSleep]
            }
            KeyCode::Char('r') => state
                .last_station()
                .map(|s| vec![Action::PlayStation(s.clone())])
                .unwrap_or_default(),
            KeyCode::Char('f') => current
                .map(|s| vec![Action::ToggleFavorite(s.id.clone())])
                .unwrap_or_default(),
            KeyCode::Char('y') => current
                .map(|s| vec![Action::CopyToClipboard(s.stream_url.clone())])
                .unwrap_or_default(),
            KeyCode::Enter => current
                .map(|s| vec![Action::Navigate(Route::Station(s.id.clone()))])
                .unwrap_or_default(),
            _ => vec![],
        }
    }

    fn handle_mouse(&mut self, event: MouseEvent, _area: Rect, state: &AppState) -> Vec<Action> {
        let hit = |r: Rect| {
            r.width > 0
                && event.column >= r.x
                && event.column < r.x + r.width
                && event.row >= r.y
                && event.row < r.y + r.height
        };
        match event.kind {
            MouseEventKind::Down(MouseButton::Left) if hit(self.play_area) => {
                vec![Action::TogglePlay]
            }
            MouseEventKind::Down(MouseButton::Left) if hit(self.volume_area) => {
                let rel = event.column.saturating_sub(self.volume_area.x) as f32;
                let volume = rel / self.volume_area.width.saturating_sub(1).max(1) as f32;
                vec![Action::Volume(volume.clamp(0.0, 1.0))]
            }
            MouseEventKind::ScrollUp => {
                vec![Action::Volume((state.session.volume + VOLUME_STEP).min(1.0))]
            }
            MouseEventKind::ScrollDown => {
                vec![Action::Volume((state.session.volume - VOLUME_STEP).max(0.0))]
            }
            _ => vec![],
        }
    }

    fn on_action(&mut self, action: &Action, _state: &AppState) -> Vec<Action> {
        if let Action::StartSleep(_) | Action::CancelSleep = action {
            self.picker_open = false;
        }
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let badge_text = sleep_badge(&state.session);
        let badge = badge_text.as_deref().map(|text| Badge {
            text,
            color: C_CONNECTING,
        });
        let block = pane_chrome("player", None, focused, badge);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        if inner.height == 0 {
            return;
        }

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Length(1)])
            .split(inner);

        self.play_area = Rect { width: 4, ..rows[0] };
        frame.render_widget(Paragraph::new(self.now_playing_line(state)), rows[0]);

        if rows[1].height == 0 {
            return;
        }
        if self.picker_open {
            self.draw_picker(frame, rows[1], state);
            return;
        }

        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(rows[1]);

        let session = &state.session;
        let volume_label = if session.volume <= 0.0 {
            "muted".to_string()
        } else {
            format!("{:>3}%", (session.volume * 100.0).round() as u32)
        };
        draw_progress(
            frame,
            cols[0],
            session.volume as f64,
            " vol",
            &volume_label,
            C_SECONDARY,
        );
        self.volume_area = Rect {
            x: cols[0].x + 5,
            width: cols[0].width.saturating_sub(5 + volume_label.len() as u16 + 1),
            ..cols[0]
        };

        if let Some(pos) = session.time_pos {
            let elapsed = fmt_time(pos);
            let (progress, total) = match session.duration {
                Some(d) if d > 0.0 => (pos / d, fmt_time(d)),
                // live streams have no duration
                _ => (1.0, "live".to_string()),
            };
            draw_progress(frame, cols[1], progress, &elapsed, &total, C_PLAYING);
        }
    }

    fn min_height(&self) -> u16 {
        4
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::testing::state_with_presets as state;
    use ratatui::crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn picker_starts_the_chosen_preset() {
        let s = state(vec![5, 15, 30]);
        let mut bar = PlayerBar::new();
        bar.open_picker(&s);
        assert!(bar.picker_open());
        bar.handle_picker_key(key(KeyCode::Right), &s);
        bar.handle_picker_key(key(KeyCode::Right), &s);
        bar.handle_picker_key(key(KeyCode::Right), &s);
        let actions = bar.handle_picker_key(key(KeyCode::Enter), &s);
        assert!(matches!(actions.as_slice(), [Action::StartSleep(30)]));
        assert!(!bar.picker_open());
    }

    #[test]
    fn picker_needs_presets() {
        let s = state(vec![]);
        let mut bar = PlayerBar::new();
        bar.open_picker(&s);
        assert!(!bar.picker_open());
    }

    #[test]
    fn remaining_time_reads_as_a_clock() {
        assert_eq!(fmt_remaining(0), "0:00");
        assert_eq!(fmt_remaining(61), "1:01");
        assert_eq!(fmt_remaining(5400), "90:00");
    }
}
