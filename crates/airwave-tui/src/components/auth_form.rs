//! AuthForm component: sign in, sign up and the OAuth callback paste box.

use ratatui::crossterm::event::{
    KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
    Frame,
};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    route::Route,
    theme::{style_muted, style_secondary, C_ACCENT, C_PRIMARY},
    widgets::{pane_chrome::pane_chrome, status_bar::InputMode, text_field::TextField},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    SignIn,
    SignUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Email,
    Password,
    Confirm,
    Name,
    Callback,
}

pub struct AuthForm {
    mode: AuthMode,
    email: TextField,
    password: TextField,
    confirm: TextField,
    name: TextField,
    callback: TextField,
    /// Authorize URL of an OAuth sign-in waiting for its callback.
    oauth_url: Option<String>,
    focus: usize,
    /// Rows of the fields from the last draw, for clicks.
    field_rows: Vec<(Field, u16)>,
}

impl AuthForm {
    pub fn new() -> Self {
        Self {
            mode: AuthMode::SignIn,
            email: TextField::new("email").placeholder("you@example.com"),
            password: TextField::new("password").masked(),
            confirm: TextField::new("confirm").masked(),
            name: TextField::new("name").placeholder("optional"),
            callback: TextField::new("callback").placeholder("paste the redirect URL here"),
            oauth_url: None,
            focus: 0,
            field_rows: Vec::new(),
        }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    fn fields(&self) -> Vec<Field> {
        let mut fields = vec![Field::Email, Field::Password];
        if self.mode == AuthMode::SignUp {
            fields.extend([Field::Confirm, Field::Name]);
        }
        if self.oauth_url.is_some() {
            fields.push(Field::Callback);
        }
        fields
    }

    fn focused_field(&self) -> Field {
        let fields = self.fields();
        fields[self.focus.min(fields.len() - 1)]
    }

    fn field_mut(&mut self, field: Field) -> &mut TextField {
        match field {
            Field::Email => &mut self.email,
            Field::Password => &mut self.password,
            Field::Confirm => &mut self.confirm,
            Field::Name => &mut self.name,
            Field::Callback => &mut self.callback,
        }
    }

    fn field(&self, field: Field) -> &TextField {
        match field {
            Field::Email => &self.email,
            Field::Password => &self.password,
            Field::Confirm => &self.confirm,
            Field::Name => &self.name,
            Field::Callback => &self.callback,
        }
    }

    fn set_mode(&mut self, mode: AuthMode) {
        if self.mode != mode {
            self.mode = mode;
            self.password.clear();
            self.confirm.clear();
            self.focus = 0;
        }
    }

    fn reset(&mut self) {
        self.password.clear();
        self.confirm.clear();
        self.name.clear();
        self.callback.clear();
        self.oauth_url = None;
        self.focus = 0;
    }

    fn submit(&self) -> Vec<Action> {
        if self.focused_field() == Field::Callback {
            return vec![Action::CompleteOAuth(self.callback.value().trim().to_string())];
        }
        let email = self.email.value().trim().to_string();
        let password = self.password.value().to_string();
        match self.mode {
            AuthMode::SignIn => vec![Action::SignIn { email, password }],
            AuthMode::SignUp => {
                let name = self.name.value().trim();
                vec![Action::SignUp {
                    email,
                    password,
                    confirm: self.confirm.value().to_string(),
                    name: (!name.is_empty()).then(|| name.to_string()),
                }]
            }
        }
    }
}

impl Default for AuthForm {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for AuthForm {
    fn id(&self) -> ComponentId {
        ComponentId::AuthForm
    }

    fn handle_key(&mut self, key: KeyEvent, _state: &AppState) -> Vec<Action> {
        let n = self.fields().len();
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('r') => match self.mode {
                    AuthMode::SignIn => vec![Action::Navigate(Route::Register)],
                    AuthMode::SignUp => vec![Action::Navigate(Route::Login)],
                },
                KeyCode::Char('g') => vec![Action::SignInOAuth("github".into())],
                KeyCode::Char('o') => vec![Action::SignInOAuth("google".into())],
                _ => vec![],
            };
        }
        match key.code {
            KeyCode::Down | KeyCode::Tab => self.focus = (self.focus + 1) % n,
            KeyCode::Up | KeyCode::BackTab => self.focus = (self.focus + n - 1) % n,
            KeyCode::Enter => return self.submit(),
            KeyCode::Esc => return vec![Action::Back],
            _ => {
                let field = self.focused_field();
                self.field_mut(field).handle_key(key);
            }
        }
        vec![]
    }

    fn handle_mouse(&mut self, event: MouseEvent, _area: Rect, _state: &AppState) -> Vec<Action> {
        if let MouseEventKind::Down(MouseButton::Left) = event.kind {
            let fields = self.fields();
            if let Some((field, _)) = self.field_rows.iter().find(|(_, row)| *row == event.row) {
                if let Some(i) = fields.iter().position(|f| f == field) {
                    self.focus = i;
                }
            }
        }
        vec![]
    }

    fn on_action(&mut self, action: &Action, _state: &AppState) -> Vec<Action> {
        match action {
            Action::Navigate(Route::Login) => self.set_mode(AuthMode::SignIn),
            Action::Navigate(Route::Register) => self.set_mode(AuthMode::SignUp),
            Action::OAuthPending(url) => {
                self.oauth_url = Some(url.clone());
                self.callback.clear();
                self.focus = self.fields().len() - 1;
            }
            Action::SignedIn => {
                self.reset();
                self.email.clear();
            }
            Action::ConfirmationSent => {
                self.reset();
                self.set_mode(AuthMode::SignIn);
                self.focus = 1;
            }
            _ => {}
        }
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, _state: &AppState) {
        let title = match self.mode {
            AuthMode::SignIn => "sign in",
            AuthMode::SignUp => "create account",
        };
        let block = pane_chrome(title, None, focused, None);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let fields = self.fields();
        let current = self.focused_field();
        self.field_rows.clear();
        let mut y = inner.y + 1;
        for field in fields {
            if y >= inner.bottom() {
                break;
            }
            let row = Rect {
                y,
                height: 1,
                x: inner.x + 1,
                width: inner.width.saturating_sub(2),
            };
            self.field(field).draw(frame, row, focused && field == current);
            self.field_rows.push((field, y));
            y += 2;
        }

        let mut help: Vec<Line> = Vec::new();
        let action = match self.mode {
            AuthMode::SignIn => "enter sign in    ctrl-r create an account",
            AuthMode::SignUp => "enter sign up    ctrl-r have an account? sign in",
        };
        help.push(Line::from(Span::styled(action, style_secondary())));
        help.push(Line::from(Span::styled(
            "ctrl-g continue with GitHub    ctrl-o continue with Google",
            style_secondary(),
        )));
        if let Some(url) = &self.oauth_url {
            help.push(Line::from(""));
            help.push(Line::from(Span::styled(
                "Open this URL to authorize (copied to the clipboard):",
                Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
            )));
            help.push(Line::from(Span::styled(url.clone(), Style::default().fg(C_ACCENT))));
            help.push(Line::from(Span::styled(
                "then paste the page you land on into the callback field.",
                style_muted(),
            )));
        }
        if y < inner.bottom() {
            let help_area = Rect {
                y: y + 1,
                height: inner.bottom().saturating_sub(y + 1),
                x: inner.x + 1,
                width: inner.width.saturating_sub(2),
            };
            frame.render_widget(Paragraph::new(help).wrap(Wrap { trim: false }), help_area);
        }
    }

    fn input_mode(&self) -> InputMode {
        InputMode::Insert
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::testing::state;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn type_str(form: &mut AuthForm, s: &AppState, text: &str) {
        for c in text.chars() {
            form.handle_key(key(KeyCode::Char(c)), s);
        }
    }

    #[test]
    fn sign_in_submits_the_credentials() {
        let s = state(vec![]);
        let mut form = AuthForm::new();
        type_str(&mut form, &s, "a@b.co");
        form.handle_key(key(KeyCode::Down), &s);
        type_str(&mut form, &s, "secret");
        let actions = form.handle_key(key(KeyCode::Enter), &s);
        assert!(matches!(
            actions.as_slice(),
            [Action::SignIn { email, password }] if email == "a@b.co" && password == "secret"
        ));
    }

    #[test]
    fn sign_up_has_confirm_and_optional_name() {
        let s = state(vec![]);
        let mut form = AuthForm::new();
        assert!(matches!(
            form.handle_key(ctrl('r'), &s).as_slice(),
            [Action::Navigate(Route::Register)]
        ));
        form.on_action(&Action::Navigate(Route::Register), &s);
        assert_eq!(form.mode(), AuthMode::SignUp);
        type_str(&mut form, &s, "a@b.co");
        form.handle_key(key(KeyCode::Down), &s);
        type_str(&mut form, &s, "secret");
        form.handle_key(key(KeyCode::Down), &s);
        type_str(&mut form, &s, "secreT");
        let actions = form.handle_key(key(KeyCode::Enter), &s);
        assert!(matches!(
            actions.as_slice(),
            [Action::SignUp { confirm, name: None, .. }] if confirm == "secreT"
        ));
    }

    #[test]
    fn oauth_callback_completes_sign_in() {
        let s = state(vec![]);
        let mut form = AuthForm::new();
        assert!(matches!(
            form.handle_key(ctrl('g'), &s).as_slice(),
            [Action::SignInOAuth(p)] if p == "github"
        ));
        form.on_action(&Action::OAuthPending("https://auth.example.com".into()), &s);
        type_str(&mut form, &s, "http://localhost/#access_token=t");
        let actions = form.handle_key(key(KeyCode::Enter), &s);
        assert!(matches!(
            actions.as_slice(),
            [Action::CompleteOAuth(url)] if url == "http://localhost/#access_token=t"
        ));
        form.on_action(&Action::SignedIn, &s);
        assert_eq!(form.fields().len(), 2);
    }
}
