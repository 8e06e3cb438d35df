//! Comments component: the discussion thread on a station page.

use airwave_proto::model::CommentWithAuthor;
use ratatui::crossterm::event::{KeyCode, KeyEvent, MouseEvent, MouseEventKind};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    stores::comments::MAX_COMMENT_LEN,
    theme::{
        style_default, style_muted, style_secondary, C_ACCENT, C_COUNTRY, C_MUTED, C_PRIMARY,
        C_SELECTION_BG,
    },
    widgets::{
        pane_chrome::{pane_chrome, Badge},
        status_bar::InputMode,
        text_field::TextField,
    },
};

pub struct Comments {
    compose: TextField,
    composing: bool,
    selected: usize,
    scroll: usize,
}

fn can_delete(comment: &CommentWithAuthor, state: &AppState) -> bool {
    state
        .user
        .as_ref()
        .is_some_and(|u| u.id == comment.comment.user_id)
}

impl Comments {
    pub fn new() -> Self {
        Self {
            compose: TextField::new("comment").placeholder("share your thoughts…"),
            composing: false,
            selected: 0,
            scroll: 0,
        }
    }

    fn station_id(state: &AppState) -> Option<String> {
        state.open_station().map(|s| s.id.clone())
    }

    fn comment_lines(&self, comment: &CommentWithAuthor, selected: bool, mine: bool) -> Vec<Line<'static>> {
        let bg = if selected {
            Style::default().bg(C_SELECTION_BG)
        } else {
            Style::default()
        };
        let mut head = vec![Span::styled(
            comment.author_name().to_string(),
            Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
        )];
        if let Some(country) = comment.author_country().filter(|c| !c.is_empty()) {
            head.push(Span::styled(format!("  {}", country), Style::default().fg(C_COUNTRY)));
        }
        if let Some(status) = comment.author_status().filter(|s| !s.is_empty()) {
            head.push(Span::styled(format!("  “{}”", status), style_muted()));
        }
        head.push(Span::styled(
            format!("  {}", comment.comment.created_at.format("%Y-%m-%d %H:%M")),
            style_muted(),
        ));
        if mine && selected {
            head.push(Span::styled("  x delete", Style::default().fg(C_ACCENT)));
        }
        vec![
            Line::from(head).style(bg),
            Line::from(Span::styled(
                format!("  {}", comment.comment.content),
                style_default(),
            ))
            .style(bg),
        ]
    }
}

impl Default for Comments {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for Comments {
    fn id(&self) -> ComponentId {
        ComponentId::Comments
    }

    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        if self.composing {
            match key.code {
                KeyCode::Esc => self.composing = false,
                KeyCode::Enter => {
                    if let Some(station_id) = Self::station_id(state) {
                        return vec![Action::PostComment {
                            station_id,
                            content: self.compose.value().to_string(),
                        }];
                    }
                }
                _ => {
                    self.compose.handle_key(key);
                }
            }
            return vec![];
        }

        let n = state.comments.len();
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                self.selected = (self.selected + 1).min(n.saturating_sub(1));
            }
            KeyCode::Char('i') if state.user.is_some() => self.composing = true,
            KeyCode::Char('x') => {
                let Some(comment) = state.comments.get(self.selected) else {
                    return vec![];
                };
                if !can_delete(comment, state) {
                    return vec![Action::Toast(
                        crate::notify::Severity::Warning,
                        "You can only delete your own comments".into(),
                    )];
                }
                return vec![Action::AskConfirm {
                    message: "Delete this comment?".into(),
                    action: Box::new(Action::DeleteComment {
                        station_id: comment.comment.station_id.clone(),
                        comment_id: comment.comment.id.clone(),
                    }),
                }];
            }
            _ => {}
        }
        vec![]
    }

    fn handle_mouse(&mut self, event: MouseEvent, _area: Rect, state: &AppState) -> Vec<Action> {
        match event.kind {
            MouseEventKind::ScrollUp => self.selected = self.selected.saturating_sub(1),
            MouseEventKind::ScrollDown => {
                self.selected = (self.selected + 1).min(state.comments.len().saturating_sub(1));
            }
            _ => {}
        }
        vec![]
    }

    fn on_action(&mut self, action: &Action, _state: &AppState) -> Vec<Action> {
        match action {
            Action::CommentPosted => {
                self.compose.clear();
                self.composing = false;
            }
            Action::Navigate(_) | Action::SignOut => {
                self.composing = false;
                self.compose.clear();
                self.selected = 0;
                self.scroll = 0;
            }
            _ => {}
        }
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let count = state.comments.len().to_string();
        let block = pane_chrome(
            "comments",
            None,
            focused,
            Some(Badge {
                text: &count,
                color: C_MUTED,
            }),
        );
        let inner = block.inner(area);
        frame.render_widget(block, area);
        if inner.height == 0 {
            return;
        }

        // Bottom row: compose box, or the sign-in hint
        let list_area = Rect {
            height: inner.height.saturating_sub(2),
            ..inner
        };
        let footer = Rect {
            y: inner.y + inner.height.saturating_sub(1),
            height: 1,
            ..inner
        };
        if state.user.is_none() {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    "Sign in to join the conversation (4)",
                    style_secondary(),
                )),
                footer,
            );
        } else if self.composing {
            self.compose.draw(frame, footer, focused);
            let len = self.compose.value().chars().count();
            let counter = format!("{}/{}", len, MAX_COMMENT_LEN);
            let w = counter.len() as u16;
            if footer.width > w + 20 {
                let color = if len > MAX_COMMENT_LEN { C_ACCENT } else { C_MUTED };
                frame.render_widget(
                    Paragraph::new(Span::styled(counter, Style::default().fg(color))),
                    Rect {
                        x: footer.x + footer.width - w,
                        width: w,
                        ..footer
                    },
                );
            }
        } else {
            frame.render_widget(
                Paragraph::new(Span::styled("i write a comment", style_muted())),
                footer,
            );
        }

        if state.comments.is_empty() {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    "No comments yet. Be the first to share your thoughts!",
                    style_muted(),
                )),
                list_area,
            );
            return;
        }

        // Two rows per comment; keep the selection in view
        self.selected = self.selected.min(state.comments.len() - 1);
        let per_page = (list_area.height as usize / 2).max(1);
        if self.selected < self.scroll {
            self.scroll = self.selected;
        } else if self.selected >= self.scroll + per_page {
            self.scroll = self.selected + 1 - per_page;
        }

        let lines: Vec<Line> = state
            .comments
            .iter()
            .enumerate()
            .skip(self.scroll)
            .take(per_page)
            .flat_map(|(i, c)| {
                self.comment_lines(c, focused && i == self.selected, can_delete(c, state))
            })
            .collect();
        frame.render_widget(Paragraph::new(lines), list_area);
    }

    fn input_mode(&self) -> InputMode {
        if self.composing {
            InputMode::Insert
        } else {
            InputMode::Normal
        }
    }

    fn min_height(&self) -> u16 {
        6
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::testing::state;
    use crate::route::Route;
    use airwave_proto::model::{RadioStation, StationComment, User};
    use chrono::Utc;
    use ratatui::crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn comment(id: &str, user_id: &str) -> CommentWithAuthor {
        CommentWithAuthor {
            comment: StationComment {
                id: id.into(),
                station_id: "s1".into(),
                user_id: user_id.into(),
                content: "great mix".into(),
                created_at: Utc::now(),
                updated_at: None,
            },
            author: None,
        }
    }

    fn station_page() -> AppState {
        let mut s = state(vec![RadioStation {
            id: "s1".into(),
            name: "One".into(),
            ..Default::default()
        }]);
        s.route = Route::Station("s1".into());
        s.comments = vec![comment("c1", "u1"), comment("c2", "u2")];
        s
    }

    #[test]
    fn compose_needs_a_user() {
        let mut s = station_page();
        let mut c = Comments::new();
        c.handle_key(key(KeyCode::Char('i')), &s);
        assert_eq!(c.input_mode(), InputMode::Normal);

        s.user = Some(User {
            id: "u1".into(),
            ..Default::default()
        });
        c.handle_key(key(KeyCode::Char('i')), &s);
        assert_eq!(c.input_mode(), InputMode::Insert);
        for ch in "hi".chars() {
            c.handle_key(key(KeyCode::Char(ch)), &s);
        }
        let actions = c.handle_key(key(KeyCode::Enter), &s);
        assert!(matches!(
            actions.as_slice(),
            [Action::PostComment { station_id, content }] if station_id == "s1" && content == "hi"
        ));

        c.on_action(&Action::CommentPosted, &s);
        assert_eq!(c.input_mode(), InputMode::Normal);
        assert_eq!(c.compose.value(), "");
    }

    #[test]
    fn delete_only_own_comments() {
        let mut s = station_page();
        s.user = Some(User {
            id: "u1".into(),
            ..Default::default()
        });
        let mut c = Comments::new();
        let actions = c.handle_key(key(KeyCode::Char('x')), &s);
        match actions.as_slice() {
            [Action::AskConfirm { action, .. }] => assert!(matches!(
                action.as_ref(),
                Action::DeleteComment { comment_id, .. } if comment_id == "c1"
            )),
            other => panic!("unexpected {other:?}"),
        }

        c.handle_key(key(KeyCode::Down), &s);
        let actions = c.handle_key(key(KeyCode::Char('x')), &s);
        assert!(matches!(actions.as_slice(), [Action::Toast(..)]));
    }
}
