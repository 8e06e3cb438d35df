//! ProfileForm component: the signed-in user's profile, editable in place.

use std::path::PathBuf;

use airwave_proto::model::User;
use ratatui::crossterm::event::{KeyCode, KeyEvent, MouseEvent};
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
    stores::identity::ProfileEdit,
    theme::{style_default, style_muted, style_secondary, C_ADMIN, C_COUNTRY, C_PRIMARY},
    widgets::{pane_chrome::pane_chrome, status_bar::InputMode, text_field::TextField},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    View,
    Edit,
    Avatar,
}

pub struct ProfileForm {
    mode: Mode,
    fields: [TextField; 3],
    focus: usize,
    avatar_path: TextField,
}

impl ProfileForm {
    pub fn new() -> Self {
        Self {
            mode: Mode::View,
            fields: [
                TextField::new("name"),
                TextField::new("country"),
                TextField::new("status").placeholder("what are you listening to?"),
            ],
            focus: 0,
            avatar_path: TextField::new("image file").placeholder("/path/to/avatar.png"),
        }
    }

    fn start_edit(&mut self, user: &User) {
        let edit = ProfileEdit::from_user(user);
        self.fields[0].set_value(edit.name);
        self.fields[1].set_value(edit.country);
        self.fields[2].set_value(edit.status);
        self.focus = 0;
        self.mode = Mode::Edit;
    }

    fn edit(&self) -> ProfileEdit {
        ProfileEdit {
            name: self.fields[0].value().to_string(),
            country: self.fields[1].value().to_string(),
            status: self.fields[2].value().to_string(),
        }
    }

    fn view_lines(user: &User) -> Vec<Line<'static>> {
        let row = |label: &'static str, value: Option<&str>| {
            let value = match value.filter(|v| !v.trim().is_empty()) {
                Some(v) => Span::styled(v.to_string(), style_default()),
                None => Span::styled("not set", style_muted()),
            };
            Line::from(vec![Span::styled(format!("{:<12} ", label), style_secondary()), value])
        };
        let mut title = vec![Span::styled(
            user.display_name().to_string(),
            Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
        )];
        if user.is_admin() {
            title.push(Span::styled(
                "  ADMIN",
                Style::default().fg(C_ADMIN).add_modifier(Modifier::BOLD),
            ));
        }
        if let Some(country) = user.country.as_deref().filter(|c| !c.is_empty()) {
            title.push(Span::styled(format!("  {}", country), Style::default().fg(C_COUNTRY)));
        }
        vec![
            Line::from(title),
            Line::from(""),
            row("email", Some(user.email.as_str())),
            row("name", user.name.as_deref()),
            row("country", user.country.as_deref()),
            row("status", user.status.as_deref()),
            row("avatar", user.avatar_url.as_deref()),
            Line::from(""),
            Line::from(Span::styled(
                "e edit profile    u upload avatar    L sign out",
                style_secondary(),
            )),
        ]
    }
}

impl Default for ProfileForm {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for ProfileForm {
    fn id(&self) -> ComponentId {
        ComponentId::ProfileForm
    }

    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        match self.mode {
            Mode::Edit => match key.code {
                KeyCode::Esc => self.mode = Mode::View,
                KeyCode::Enter => return vec![Action::SaveProfile(self.edit())],
                KeyCode::Tab | KeyCode::Down => self.focus = (self.focus + 1) % self.fields.len(),
                KeyCode::BackTab | KeyCode::Up => {
                    self.focus = (self.focus + self.fields.len() - 1) % self.fields.len();
                }
                _ => {
                    self.fields[self.focus].handle_key(key);
                }
            },
            Mode::Avatar => match key.code {
                KeyCode::Esc => self.mode = Mode::View,
                KeyCode::Enter => {
                    let path = self.avatar_path.value().trim();
                    if !path.is_empty() {
                        return vec![Action::UploadAvatar(PathBuf::from(path))];
                    }
                }
                _ => {
                    self.avatar_path.handle_key(key);
                }
            },
            Mode::View => {
                let Some(user) = &state.user else {
                    return vec![];
                };
                match key.code {
                    KeyCode::Char('e') => self.start_edit(user),
                    KeyCode::Char('u') => {
                        self.avatar_path.clear();
                        self.mode = Mode::Avatar;
                    }
                    KeyCode::Char('L') => return vec![Action::SignOut],
                    _ => {}
                }
            }
        }
        vec![]
    }

    fn handle_mouse(&mut self, _event: MouseEvent, _area: Rect, _state: &AppState) -> Vec<Action> {
        vec![]
    }

    fn on_action(&mut self, action: &Action, _state: &AppState) -> Vec<Action> {
        match action {
            Action::ProfileSaved | Action::SignOut | Action::Navigate(_) => self.mode = Mode::View,
            _ => {}
        }
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let title = match self.mode {
            Mode::View => "profile",
            Mode::Edit => "edit profile",
            Mode::Avatar => "upload avatar",
        };
        let block = pane_chrome(title, None, focused, None);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        let inner = Rect {
            x: inner.x + 1,
            y: inner.y + 1,
            width: inner.width.saturating_sub(2),
            height: inner.height.saturating_sub(1),
        };

        let Some(user) = &state.user else {
            frame.render_widget(
                Paragraph::new(Span::styled("not signed in", style_muted())),
                inner,
            );
            return;
        };

        let row = |i: u16| Rect {
            y: inner.y + i,
            height: 1,
            ..inner
        };
        match self.mode {
            Mode::View => frame.render_widget(Paragraph::new(Self::view_lines(user)), inner),
            Mode::Edit => {
                for (i, field) in self.fields.iter().enumerate() {
                    let r = row(i as u16 * 2);
                    if r.y < inner.bottom() {
                        field.draw(frame, r, focused && i == self.focus);
                    }
                }
                let hint = row(self.fields.len() as u16 * 2);
                if hint.y < inner.bottom() {
                    frame.render_widget(
                        Paragraph::new(Span::styled(
                            "enter save    tab next field    esc cancel",
                            style_secondary(),
                        )),
                        hint,
                    );
                }
            }
            Mode::Avatar => {
                self.avatar_path.draw(frame, row(0), focused);
                if inner.height > 2 {
                    frame.render_widget(
                        Paragraph::new(Span::styled(
                            "png, jpeg, gif, webp or svg    enter upload    esc cancel",
                            style_secondary(),
                        )),
                        row(2),
                    );
                }
            }
        }
    }

    fn input_mode(&self) -> InputMode {
        match self.mode {
            Mode::View => InputMode::Normal,
            Mode::Edit | Mode::Avatar => InputMode::Insert,
        }
    }

    fn min_height(&self) -> u16 {
        10
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::testing::state;
    use ratatui::crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn signed_in() -> AppState {
        let mut s = state(vec![]);
        s.user = Some(User {
            id: "u1".into(),
            email: "ada@example.com".into(),
            name: Some("Ada".into()),
            country: Some("UK".into()),
            ..Default::default()
        });
        s
    }

    #[test]
    fn edit_starts_from_the_current_profile() {
        let s = signed_in();
        let mut form = ProfileForm::new();
        form.handle_key(key(KeyCode::Char('e')), &s);
        assert_eq!(form.input_mode(), InputMode::Insert);
        form.handle_key(key(KeyCode::Tab), &s);
        form.handle_key(key(KeyCode::Tab), &s);
        for c in "tuned in".chars() {
            form.handle_key(key(KeyCode::Char(c)), &s);
        }
        let actions = form.handle_key(key(KeyCode::Enter), &s);
        assert!(matches!(
            actions.as_slice(),
            [Action::SaveProfile(edit)] if edit.name == "Ada" && edit.country == "UK" && edit.status == "tuned in"
        ));
        form.on_action(&Action::ProfileSaved, &s);
        assert_eq!(form.input_mode(), InputMode::Normal);
    }

    #[test]
    fn avatar_path_becomes_an_upload() {
        let s = signed_in();
        let mut form = ProfileForm::new();
        form.handle_key(key(KeyCode::Char('u')), &s);
        for c in "/tmp/me.png".chars() {
            form.handle_key(key(KeyCode::Char(c)), &s);
        }
        let actions = form.handle_key(key(KeyCode::Enter), &s);
        assert!(matches!(
            actions.as_slice(),
            [Action::UploadAvatar(p)] if p == &PathBuf::from("/tmp/me.png")
        ));
    }

    #[test]
    fn signed_out_ignores_keys() {
        let s = state(vec![]);
        let mut form = ProfileForm::new();
        assert!(form.handle_key(key(KeyCode::Char('L')), &s).is_empty());
        assert_eq!(form.input_mode(), InputMode::Normal);
    }
}
