//! AdminPanel component: station management and user roles.

use std::path::PathBuf;

use airwave_proto::model::{RadioStation, UserWithRole};
use ratatui::crossterm::event::{
    KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, ListState, Paragraph},
    Frame,
};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    stores::admin::StationForm,
    theme::{
        style_label, style_muted, style_secondary, style_selected, style_selected_focused,
        C_ADMIN, C_CATEGORY, C_FAVORITE, C_MUTED, C_PRIMARY,
    },
    widgets::{
        filter_input::{FilterAction, FilterInput},
        pane_chrome::{pane_chrome, Badge},
        scrollable_list::ScrollableList,
        status_bar::InputMode,
        text_field::TextField,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminTab {
    Stations,
    Users,
}

const NAME: usize = 0;
const STREAM_URL: usize = 1;
const DESCRIPTION: usize = 2;
const CATEGORY: usize = 3;
const IMAGE_URL: usize = 4;
const IMAGE_FILE: usize = 5;

/// Create/edit form for one station.
struct StationEditor {
    /// `None` when creating.
    id: Option<String>,
    fields: [TextField; 6],
    categories: Vec<String>,
    is_featured: bool,
    focus: usize,
}

impl StationEditor {
    fn new(station: Option<&RadioStation>) -> Self {
        let form = station.map(StationForm::from_station).unwrap_or_default();
        let mut fields = [
            TextField::new("name"),
            TextField::new("stream url").placeholder("https://…"),
            TextField::new("description"),
            TextField::new("category").placeholder("type and press enter"),
            TextField::new("image url"),
            TextField::new("image file").placeholder("ctrl-u uploads this file"),
        ];
        fields[NAME].set_value(form.name);
        fields[STREAM_URL].set_value(form.stream_url);
        fields[DESCRIPTION].set_value(form.description);
        fields[IMAGE_URL].set_value(form.image_url.unwrap_or_default());
        Self {
            id: station.map(|s| s.id.clone()),
            fields,
            categories: form.categories,
            is_featured: form.is_featured,
            focus: NAME,
        }
    }

    fn form(&self) -> StationForm {
        let mut form = StationForm {
            name: self.fields[NAME].value().to_string(),
            stream_url: self.fields[STREAM_URL].value().to_string(),
            description: self.fields[DESCRIPTION].value().to_string(),
            categories: self.categories.clone(),
            is_featured: self.is_featured,
            image_url: Some(self.fields[IMAGE_URL].value().trim().to_string())
                .filter(|u| !u.is_empty()),
        };
        // a category still in the box counts
        form.add_category(self.fields[CATEGORY].value());
        form
    }

    fn add_pending_category(&mut self) {
        let mut form = StationForm {
            categories: std::mem::take(&mut self.categories),
            ..Default::default()
        };
        form.add_category(self.fields[CATEGORY].value());
        self.categories = form.categories;
        self.fields[CATEGORY].clear();
    }

    fn handle_key(&mut self, key: KeyEvent) -> Vec<Action> {
        let n = self.fields.len();
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('s') => vec![Action::SaveStation {
                    id: self.id.clone(),
                    form: self.form(),
                }],
                KeyCode::Char('f') => {
                    self.is_featured = !self.is_featured;
                    vec![]
                }
                KeyCode::Char('u') => {
                    let path = self.fields[IMAGE_FILE].value().trim();
                    if path.is_empty() {
                        self.focus = IMAGE_FILE;
                        vec![]
                    } else {
                        vec![Action::UploadStationImage(PathBuf::from(path))]
                    }
                }
                _ => vec![],
            };
        }
        match key.code {
            KeyCode::Tab | KeyCode::Down => self.focus = (self.focus + 1) % n,
            KeyCode::BackTab | KeyCode::Up => self.focus = (self.focus + n - 1) % n,
            KeyCode::Enter if self.focus == CATEGORY => self.add_pending_category(),
            KeyCode::Enter => self.focus = (self.focus + 1) % n,
            KeyCode::Backspace
                if self.focus == CATEGORY && self.fields[CATEGORY].value().is_empty() =>
            {
                self.categories.pop();
            }
            _ => {
                self.fields[self.focus].handle_key(key);
            }
        }
        vec![]
    }

    fn draw(&self, frame: &mut Frame, area: Rect) {
        let row = |i: u16| Rect {
            y: area.y + i,
            height: 1,
            ..area
        };
        let mut y = 0u16;
        for (i, field) in self.fields.iter().enumerate() {
            if y >= area.height {
                return;
            }
            field.draw(frame, row(y), i == self.focus);
            y += 1;
            if i == CATEGORY {
                let mut spans = vec![Span::raw(format!("{:<13}", ""))];
                if self.categories.is_empty() {
                    spans.push(Span::styled("no categories yet", style_muted()));
                }
                for c in &self.categories {
                    spans.push(Span::styled(format!("[{}] ", c), Style::default().fg(C_CATEGORY)));
                }
                if y < area.height {
                    frame.render_widget(Paragraph::new(Line::from(spans)), row(y));
                }
                y += 1;
            }
        }
        if y < area.height {
            let featured = if self.is_featured { "[x]" } else { "[ ]" };
            frame.render_widget(
                Paragraph::new(Line::from(vec![
                    Span::styled(format!("{:<13}", "featured"), style_secondary()),
                    Span::styled(featured, Style::default().fg(C_FAVORITE)),
                ])),
                row(y),
            );
        }
        y += 2;
        if y < area.height {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    "ctrl-s save  ctrl-f featured  ctrl-u upload image  backspace drops a category  esc close",
                    style_muted(),
                )),
                row(y),
            );
        }
    }
}

pub struct AdminPanel {
    tab: AdminTab,
    stations: ScrollableList<RadioStation>,
    users: ScrollableList<UserWithRole>,
    filter_input: FilterInput,
    editor: Option<StationEditor>,
    list_state: ListState,
}

impl AdminPanel {
    pub fn new() -> Self {
        Self {
            tab: AdminTab::Stations,
            stations: ScrollableList::new(|s: &RadioStation, q: &str| s.matches_query(q)),
            users: ScrollableList::new(|u: &UserWithRole, q: &str| u.matches_query(q)),
            filter_input: FilterInput::new("filter…"),
            editor: None,
            list_state: ListState::default(),
        }
    }

    pub fn tab(&self) -> AdminTab {
        self.tab
    }

    pub fn sync(&mut self, state: &AppState) {
        self.stations
            .replace_items(state.stations.clone(), |a, b| a.id == b.id);
        self.users
            .replace_items(state.users.clone(), |a, b| a.profile.id == b.profile.id);
    }

    fn set_filter(&mut self, query: &str) {
        match self.tab {
            AdminTab::Stations => self.stations.set_filter(query),
            AdminTab::Users => self.users.set_filter(query),
        }
    }

    fn move_cursor(&mut self, up: bool, n: usize) {
        match (self.tab, up) {
            (AdminTab::Stations, true) => self.stations.select_up(n),
            (AdminTab::Stations, false) => self.stations.select_down(n),
            (AdminTab::Users, true) => self.users.select_up(n),
            (AdminTab::Users, false) => self.users.select_down(n),
        }
    }

    fn station_keys(&mut self, key: KeyEvent) -> Vec<Action> {
        match key.code {
            KeyCode::Char('n') => self.editor = Some(StationEditor::new(None)),
            KeyCode::Char('e') | KeyCode::Enter => {
                if let Some(station) = self.stations.selected_item() {
                    self.editor = Some(StationEditor::new(Some(station)));
                }
            }
            KeyCode::Char('x') => {
                if let Some(station) = self.stations.selected_item() {
                    return vec![Action::AskConfirm {
                        message: format!("Delete \"{}\"? This cannot be undone.", station.name),
                        action: Box::new(Action::DeleteStation(station.clone())),
                    }];
                }
            }
            _ => {}
        }
        vec![]
    }

    fn user_keys(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        let Some(user) = self.users.selected_item() else {
            return vec![];
        };
        match key.code {
            KeyCode::Char('g') => vec![Action::AskConfirm {
                message: format!("Make {} an admin?", user.label()),
                action: Box::new(Action::GrantAdmin(user.clone())),
            }],
            KeyCode::Char('r') if user.is_admin => {
                let yourself = state
                    .user
                    .as_ref()
                    .is_some_and(|u| u.id == user.profile.id);
                let message = if yourself {
                    "Revoke your own admin role? You will lose access to this page.".to_string()
                } else {
                    format!("Revoke admin from {}?", user.label())
                };
                vec![Action::AskConfirm {
                    message,
                    action: Box::new(Action::RevokeAdmin(user.clone())),
                }]
            }
            _ => vec![],
        }
    }

    fn draw_tabs(&self, frame: &mut Frame, area: Rect) {
        let line = Line::from(vec![
            Span::styled(" stations ", style_label(self.tab == AdminTab::Stations)),
            Span::styled("│", style_muted()),
            Span::styled(" users ", style_label(self.tab == AdminTab::Users)),
            Span::styled("   t switch", style_muted()),
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }

    fn station_item(station: &RadioStation, selected: bool, focused: bool) -> ListItem<'static> {
        let style = match (selected, focused) {
            (true, true) => style_selected_focused(),
            (true, false) => style_selected(),
            _ => style_secondary(),
        };
        let mut spans = vec![Span::styled(format!(" {}", station.name), style)];
        if station.is_featured {
            spans.push(Span::styled(" ★", Style::default().fg(C_FAVORITE)));
        }
        spans.push(Span::styled(
            format!("  {}", station.category.join(" · ")),
            Style::default().fg(C_CATEGORY),
        ));
        spans.push(Span::styled(format!("  {}", station.stream_url), style_muted()));
        ListItem::new(Line::from(spans)).style(if selected { style_selected() } else { Style::default() })
    }

    fn user_item(user: &UserWithRole, selected: bool, focused: bool) -> ListItem<'static> {
        let style = match (selected, focused) {
            (true, true) => style_selected_focused(),
            (true, false) => style_selected(),
            _ => style_secondary(),
        };
        let mut spans = vec![Span::styled(format!(" {}", user.label()), style)];
        if user.is_admin {
            spans.push(Span::styled(
                "  ADMIN",
                Style::default().fg(C_ADMIN).add_modifier(Modifier::BOLD),
            ));
        }
        if !user.email.is_empty() {
            spans.push(Span::styled(format!("  {}", user.email), style_muted()));
        }
        ListItem::new(Line::from(spans)).style(if selected { style_selected() } else { Style::default() })
    }
}

impl Default for AdminPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for AdminPanel {
    fn id(&self) -> ComponentId {
        ComponentId::AdminPanel
    }

    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        if self.editor.is_some() && key.code == KeyCode::Esc {
            self.editor = None;
            return vec![];
        }
        if let Some(editor) = &mut self.editor {
            return editor.handle_key(key);
        }

        if self.filter_input.is_active() {
            match key.code {
                KeyCode::Up => self.move_cursor(true, 1),
                KeyCode::Down => self.move_cursor(false, 1),
                _ => match self.filter_input.handle_key(key) {
                    FilterAction::Changed(q) => self.set_filter(&q),
                    FilterAction::Cancelled => self.set_filter(""),
                    FilterAction::Confirmed | FilterAction::None => {}
                },
            }
            return vec![];
        }

        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(true, 1),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(false, 1),
            KeyCode::PageUp => self.move_cursor(true, 10),
            KeyCode::PageDown => self.move_cursor(false, 10),
            KeyCode::Char('/') => self.filter_input.activate(),
            KeyCode::Char('t') => {
                self.tab = match self.tab {
                    AdminTab::Stations => AdminTab::Users,
                    AdminTab::Users => AdminTab::Stations,
                };
                self.filter_input = FilterInput::new("filter…");
                self.stations.set_filter("");
                self.users.set_filter("");
                if self.tab == AdminTab::Users {
                    return vec![Action::LoadUsers];
                }
            }
            _ => {
                return match self.tab {
                    AdminTab::Stations => self.station_keys(key),
                    AdminTab::Users => self.user_keys(key, state),
                }
            }
        }
        vec![]
    }

    fn handle_mouse(&mut self, event: MouseEvent, area: Rect, _state: &AppState) -> Vec<Action> {
        if self.editor.is_some() {
            return vec![];
        }
        // border + tab row
        let rel_row = event.row.saturating_sub(area.y + 2) as usize;
        match event.kind {
            MouseEventKind::ScrollUp => self.move_cursor(true, 1),
            MouseEventKind::ScrollDown => self.move_cursor(false, 1),
            MouseEventKind::Down(MouseButton::Left) => match self.tab {
                AdminTab::Stations => {
                    self.stations.handle_click(rel_row);
                }
                AdminTab::Users => {
                    self.users.handle_click(rel_row);
                }
            },
            _ => {}
        }
        vec![]
    }

    fn on_action(&mut self, action: &Action, _state: &AppState) -> Vec<Action> {
        match action {
            Action::StationSaved => self.editor = None,
            Action::StationImageUploaded(url) => {
                if let Some(editor) = &mut self.editor {
                    editor.fields[IMAGE_URL].set_value(url.clone());
                    editor.fields[IMAGE_FILE].clear();
                }
            }
            Action::CloseFilter => self.filter_input.deactivate(),
            Action::Navigate(_) => self.editor = None,
            _ => {}
        }
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let (title, count) = match (&self.editor, self.tab) {
            (Some(e), _) if e.id.is_some() => ("edit station", String::new()),
            (Some(_), _) => ("new station", String::new()),
            (None, AdminTab::Stations) => ("admin · stations", self.stations.len().to_string()),
            (None, AdminTab::Users) => ("admin · users", self.users.len().to_string()),
        };
        let badge = (!count.is_empty()).then_some(Badge {
            text: &count,
            color: C_MUTED,
        });
        let block = pane_chrome(title, None, focused, badge);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        if inner.height < 2 {
            return;
        }

        if let Some(editor) = &self.editor {
            editor.draw(
                frame,
                Rect {
                    x: inner.x + 1,
                    y: inner.y + 1,
                    width: inner.width.saturating_sub(2),
                    height: inner.height.saturating_sub(1),
                },
            );
            return;
        }

        self.draw_tabs(frame, Rect { height: 1, ..inner });

        let filter_h = u16::from(self.filter_input.is_active() || !self.filter_input.is_empty());
        let list_area = Rect {
            y: inner.y + 1,
            height: inner.height.saturating_sub(1 + filter_h),
            ..inner
        };
        let content_h = list_area.height as usize;

        let (items, sel, empty): (Vec<ListItem>, usize, &str) = match self.tab {
            AdminTab::Stations => {
                self.stations.ensure_visible(content_h);
                let sel = self.stations.selected_in_view(content_h);
                let items = self
                    .stations
                    .visible_items(content_h)
                    .into_iter()
                    .enumerate()
                    .map(|(row, (_, s))| Self::station_item(s, row == sel, focused))
                    .collect();
                (items, sel, "no stations: press n to add one")
            }
            AdminTab::Users => {
                self.users.ensure_visible(content_h);
                let sel = self.users.selected_in_view(content_h);
                let items = self
                    .users
                    .visible_items(content_h)
                    .into_iter()
                    .enumerate()
                    .map(|(row, (_, u))| Self::user_item(u, row == sel, focused))
                    .collect();
                let empty = if state.users.is_empty() {
                    "loading users…"
                } else {
                    "no users match"
                };
                (items, sel, empty)
            }
        };

        if items.is_empty() {
            frame.render_widget(
                Paragraph::new(Span::styled(format!("  {}", empty), style_muted())),
                list_area,
            );
        } else {
            self.list_state.select(Some(sel));
            frame.render_stateful_widget(
                List::new(items).style(Style::default().fg(C_PRIMARY)),
                list_area,
                &mut self.list_state,
            );
        }

        if filter_h > 0 {
            self.filter_input.draw(
                frame,
                Rect {
                    y: inner.y + inner.height.saturating_sub(1),
                    height: 1,
                    ..inner
                },
            );
        }
    }

    fn input_mode(&self) -> InputMode {
        if self.editor.is_some() {
            InputMode::Insert
        } else if self.filter_input.is_active() {
            InputMode::Filter
        } else {
            InputMode::Normal
        }
    }
}
