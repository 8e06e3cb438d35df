//! StationList component: the home, discover and favorites pages.

use std::time::Instant;

use airwave_proto::model::RadioStation;
use ratatui::crossterm::event::{
    KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, ListState, Paragraph},
    Frame,
};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    components::player_bar::status_icon,
    route::Route,
    session::PlaybackStatus,
    stores::catalog::{search, split_featured, CategoryFilter},
    stores::favorites::favorite_stations,
    theme::{
        C_ACCENT, C_CATEGORY, C_CONNECTING, C_FAVORITE, C_MUTED, C_PLAYING, C_PRIMARY,
        C_SECONDARY, C_SELECTION_BG,
    },
    widgets::{
        filter_input::{FilterAction, FilterInput},
        pane_chrome::{pane_chrome, Badge},
        scrollable_list::ScrollableList,
        status_bar::InputMode,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    Home,
    Discover,
    Favorites,
}

impl ListMode {
    pub fn for_route(route: &Route) -> Option<Self> {
        match route {
            Route::Home => Some(ListMode::Home),
            Route::Discover => Some(ListMode::Discover),
            Route::Favorites => Some(ListMode::Favorites),
            _ => None,
        }
    }

    fn title(self) -> &'static str {
        match self {
            ListMode::Home => "featured & all stations",
            ListMode::Discover => "discover",
            ListMode::Favorites => "favorites",
        }
    }
}

pub struct StationList {
    pub list: ScrollableList<RadioStation>,
    pub filter_input: FilterInput,
    mode: ListMode,
    category: CategoryFilter,
    list_state: ListState,
    /// Last click (row, time) for double-click detection.
    last_click: Option<(usize, Instant)>,
}

/// Rows for `mode`: featured first on home, category-filtered on discover,
/// catalog order on favorites.
pub fn rows_for(mode: ListMode, category: &CategoryFilter, state: &AppState) -> Vec<RadioStation> {
    match mode {
        ListMode::Home => {
            let (featured, regular) = split_featured(&state.stations);
            featured.into_iter().chain(regular).cloned().collect()
        }
        ListMode::Discover => search(&state.stations, "", category)
            .into_iter()
            .cloned()
            .collect(),
        ListMode::Favorites => favorite_stations(&state.favorites, &state.stations)
            .into_iter()
            .cloned()
            .collect(),
    }
}

/// Step through `All` then every known category, wrapping both ways.
pub fn cycle_category(current: &CategoryFilter, categories: &[String], forward: bool) -> CategoryFilter {
    let pos = match current {
        CategoryFilter::All => 0,
        CategoryFilter::Named(c) => categories
            .iter()
            .position(|x| x.eq_ignore_ascii_case(c))
            .map_or(0, |i| i + 1),
    };
    let len = categories.len() + 1;
    let next = if forward {
        (pos + 1) % len
    } else {
        (pos + len - 1) % len
    };
    match next {
        0 => CategoryFilter::All,
        i => CategoryFilter::Named(categories[i - 1].clone()),
    }
}

impl StationList {
    pub fn new() -> Self {
        Self {
            list: ScrollableList::new(|station: &RadioStation, q: &str| station.matches_query(q)),
            filter_input: FilterInput::new("search by name or description…"),
            mode: ListMode::Home,
            category: CategoryFilter::All,
            list_state: ListState::default(),
            last_click: None,
        }
    }

    pub fn mode(&self) -> ListMode {
        self.mode
    }

    pub fn category(&self) -> &CategoryFilter {
        &self.category
    }

    /// Rebuild rows from the snapshot, keeping the cursor on the same station.
    pub fn sync(&mut self, state: &AppState) {
        if let CategoryFilter::Named(c) = &self.category {
            if !state.categories.iter().any(|x| x.eq_ignore_ascii_case(c)) {
                self.category = CategoryFilter::All;
            }
        }
        let rows = rows_for(self.mode, &self.category, state);
        self.list.replace_items(rows, |a, b| a.id == b.id);
    }

    fn set_mode(&mut self, mode: ListMode, state: &AppState) {
        if self.mode != mode {
            self.mode = mode;
            self.filter_input = FilterInput::new("search by name or description…");
            self.list.set_filter("");
            self.list.select_first();
        }
        self.sync(state);
    }

    fn selected_actions(&self, make: impl Fn(&RadioStation) -> Action) -> Vec<Action> {
        self.list.selected_item().map(|s| vec![make(s)]).unwrap_or_default()
    }

    fn render_item<'a>(
        &self,
        station: &'a RadioStation,
        is_selected: bool,
        state: &AppState,
    ) -> ListItem<'a> {
        let session = &state.session;
        let is_current = session.is_current(&station.id);

        let (icon, icon_color): (&'static str, Color) = if is_current {
            status_icon(session.status)
        } else {
            (" ", C_MUTED)
        };

        let name_color = if is_current {
            match session.status {
                PlaybackStatus::Playing => C_PLAYING,
                PlaybackStatus::Paused | PlaybackStatus::Connecting => C_CONNECTING,
                PlaybackStatus::Error => C_ACCENT,
                PlaybackStatus::Idle => C_PRIMARY,
            }
        } else if is_selected {
            C_PRIMARY
        } else {
            C_SECONDARY
        };
        let name_style = if is_current || is_selected {
            Style::default().fg(name_color).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(name_color)
        };

        let mut spans: Vec<Span> = vec![
            Span::styled(
                if state.is_favorite(&station.id) { "♥ " } else { "  " },
                Style::default().fg(C_FAVORITE),
            ),
            Span::styled(icon, Style::default().fg(icon_color)),
            Span::raw("  "),
        ];
        if station.is_featured && self.mode == ListMode::Home {
            spans.push(Span::styled("★ ", Style::default().fg(C_FAVORITE)));
        }
        spans.push(Span::styled(station.name.as_str(), name_style));

        for (i, category) in station.category.iter().enumerate() {
            spans.push(Span::styled(
                if i == 0 { "  " } else { " · " },
                Style::default().fg(C_MUTED),
            ));
            spans.push(Span::styled(category.as_str(), Style::default().fg(C_CATEGORY)));
        }

        // Description only on the selected row
        if is_selected {
            if let Some(desc) = station.description.as_deref().filter(|d| !d.is_empty()) {
                spans.push(Span::styled(
                    format!("  {}", desc),
                    Style::default().fg(C_MUTED),
                ));
            }
        }

        let item_bg = if is_selected {
            Style::default().bg(C_SELECTION_BG)
        } else {
            Style::default()
        };
        ListItem::new(Line::from(spans)).style(item_bg)
    }

    fn empty_message(&self, state: &AppState) -> &'static str {
        if !state.catalog_loaded {
            "  loading stations…"
        } else if !self.list.filter.is_empty() {
            "  no stations match your search"
        } else {
            match self.mode {
                ListMode::Favorites => "  no favorites yet: press f on a station to add it",
                ListMode::Discover => "  no stations in this category",
                ListMode::Home => "  no stations available",
            }
        }
    }
}

impl Default for StationList {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for StationList {
    fn id(&self) -> ComponentId {
        ComponentId::StationList
    }

    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        if self.filter_input.is_active() {
            match key.code {
                KeyCode::Up => {
                    self.list.select_up(1);
                    return vec![];
                }
                KeyCode::Down => {
                    self.list.select_down(1);
                    return vec![];
                }
                _ => {}
            }
            match self.filter_input.handle_key(key) {
                FilterAction::Changed(q) => self.list.set_filter(&q),
                FilterAction::Cancelled => self.list.set_filter(""),
                FilterAction::Confirmed | FilterAction::None => {}
            }
            return vec![];
        }

        let step = if key.modifiers.contains(KeyModifiers::SHIFT) {
            5
        } else {
            1
        };
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.list.select_up(step),
            KeyCode::Down | KeyCode::Char('j') => self.list.select_down(step),
            KeyCode::PageUp => self.list.select_up(10),
            KeyCode::PageDown => self.list.select_down(10),
            KeyCode::Home | KeyCode::Char('g') => self.list.select_first(),
            KeyCode::End | KeyCode::Char('G') => self.list.select_last(),

            KeyCode::Enter => {
                return self.selected_actions(|s| Action::Navigate(Route::Station(s.id.clone())))
            }
            KeyCode::Char('p') => return self.selected_actions(|s| Action::PlayStation(s.clone())),
            KeyCode::Char('f') => {
                return self.selected_actions(|s| Action::ToggleFavorite(s.id.clone()))
            }
            KeyCode::Char('y') => {
                return self.selected_actions(|s| Action::CopyToClipboard(s.stream_url.clone()))
            }
            KeyCode::Char('/') => self.filter_input.activate(),

            KeyCode::Char('c') | KeyCode::Char('C') if self.mode == ListMode::Discover => {
                self.category =
                    cycle_category(&self.category, &state.categories, key.code == KeyCode::Char('c'));
                self.list.select_first();
                self.sync(state);
            }
            _ => {}
        }
        vec![]
    }

    fn handle_mouse(&mut self, event: MouseEvent, area: Rect, _state: &AppState) -> Vec<Action> {
        let rel_row = event.row.saturating_sub(area.y + 1) as usize;
        match event.kind {
            MouseEventKind::ScrollUp => self.list.select_up(1),
            MouseEventKind::ScrollDown => self.list.select_down(1),
            MouseEventKind::Down(MouseButton::Left) => {
                let now = Instant::now();
                let is_double = self
                    .last_click
                    .is_some_and(|(row, t)| row == rel_row && t.elapsed().as_millis() < 400);

                if self.list.handle_click(rel_row) && is_double {
                    self.last_click = None;
                    return self.selected_actions(|s| Action::PlayStation(s.clone()));
                }
                self.last_click = Some((rel_row, now));
            }
            _ => {}
        }
        vec![]
    }

    fn on_action(&mut self, action: &Action, state: &AppState) -> Vec<Action> {
        match action {
            Action::Navigate(route) => {
                if let Some(mode) = ListMode::for_route(route) {
                    self.set_mode(mode, state);
                }
            }
            Action::CloseFilter => self.filter_input.deactivate(),
            _ => {}
        }
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let count = format!("{}", self.list.len());
        let title = if self.mode == ListMode::Discover {
            format!("{} · {}", self.mode.title(), self.category.label())
        } else {
            self.mode.title().to_string()
        };
        let block = pane_chrome(
            &title,
            None,
            focused,
            Some(Badge {
                text: &count,
                color: C_MUTED,
            }),
        );
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let filter_h = u16::from(self.filter_input.is_active() || !self.filter_input.is_empty());
        let list_area = Rect {
            height: inner.height.saturating_sub(filter_h),
            ..inner
        };

        if self.list.is_empty() {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    self.empty_message(state),
                    Style::default().fg(C_MUTED),
                )),
                list_area,
            );
        } else {
            let content_h = list_area.height as usize;
            self.list.ensure_visible(content_h);
            let sel_in_view = self.list.selected_in_view(content_h);
            let items: Vec<ListItem> = self
                .list
                .visible_items(content_h)
                .into_iter()
                .enumerate()
                .map(|(row, (_, station))| self.render_item(station, row == sel_in_view, state))
                .collect();

            self.list_state.select(Some(sel_in_view));
            frame.render_stateful_widget(List::new(items), list_area, &mut self.list_state);
        }

        if filter_h > 0 {
            let filter_area = Rect {
                y: inner.y + inner.height.saturating_sub(1),
                height: 1,
                ..inner
            };
            self.filter_input.draw(frame, filter_area);
        }
    }

    fn input_mode(&self) -> InputMode {
        if self.filter_input.is_active() {
            InputMode::Filter
        } else {
            InputMode::Normal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::testing::state;

    fn station(id: &str, name: &str, categories: &[&str], featured: bool) -> RadioStation {
        RadioStation {
            id: id.into(),
            name: name.into(),
            stream_url: format!("http://stream.example.com/{id}"),
            category: categories.iter().map(|c| c.to_string()).collect(),
            is_featured: featured,
            ..Default::default()
        }
    }

    fn catalog() -> Vec<RadioStation> {
        vec![
            station("s1", "Blues Hour", &["Blues"], false),
            station("s2", "Groove Salad", &["Ambient"], true),
            station("s3", "Jazz FM", &["Jazz", "Blues"], false),
        ]
    }

    fn names(list: &StationList) -> Vec<String> {
        list.list.items.iter().map(|s| s.name.clone()).collect()
    }

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    #[test]
    fn home_lists_featured_first() {
        let s = state(catalog());
        let mut list = StationList::new();
        list.sync(&s);
        assert_eq!(names(&list), vec!["Groove Salad", "Blues Hour", "Jazz FM"]);
    }

    #[test]
    fn favorites_follow_the_set() {
        let mut s = state(catalog());
        s.favorites.insert("s3".into());
        s.favorites.insert("deleted".into());
        let mut list = StationList::new();
        list.on_action(&Action::Navigate(Route::Favorites), &s);
        assert_eq!(names(&list), vec!["Jazz FM"]);
    }

    #[test]
    fn discover_cycles_categories() {
        let s = state(catalog());
        let mut list = StationList::new();
        list.on_action(&Action::Navigate(Route::Discover), &s);
        assert_eq!(list.list.len(), 3);

        // categories: Ambient, Blues, Jazz
        list.handle_key(key('c'), &s);
        assert_eq!(list.category(), &CategoryFilter::Named("Ambient".into()));
        list.handle_key(key('c'), &s);
        assert_eq!(names(&list), vec!["Blues Hour", "Jazz FM"]);
        list.handle_key(KeyEvent::new(KeyCode::Char('C'), KeyModifiers::SHIFT), &s);
        list.handle_key(KeyEvent::new(KeyCode::Char('C'), KeyModifiers::SHIFT), &s);
        assert_eq!(list.category(), &CategoryFilter::All);
    }

    #[test]
    fn search_filters_the_rows() {
        let s = state(catalog());
        let mut list = StationList::new();
        list.on_action(&Action::Navigate(Route::Discover), &s);
        list.handle_key(key('/'), &s);
        assert_eq!(list.input_mode(), InputMode::Filter);
        for c in "jazz".chars() {
            list.handle_key(key(c), &s);
        }
        assert_eq!(list.list.len(), 1);
        assert_eq!(
            list.list.selected_item().map(|s| s.name.as_str()),
            Some("Jazz FM")
        );
    }

    #[test]
    fn keys_turn_into_station_actions() {
        let s = state(catalog());
        let mut list = StationList::new();
        list.sync(&s);
        assert!(matches!(
            list.handle_key(key('p'), &s).as_slice(),
            [Action::PlayStation(st)] if st.id == "s2"
        ));
        assert!(matches!(
            list.handle_key(key('f'), &s).as_slice(),
            [Action::ToggleFavorite(id)] if id == "s2"
        ));
        assert!(matches!(
            list.handle_key(key('y'), &s).as_slice(),
            [Action::CopyToClipboard(url)] if url == "http://stream.example.com/s2"
        ));
        assert!(matches!(
            list.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE), &s).as_slice(),
            [Action::Navigate(Route::Station(id))] if id == "s2"
        ));
    }

    #[test]
    fn cycle_wraps_backwards_from_all() {
        let cats = vec!["A".to_string(), "B".to_string()];
        assert_eq!(
            cycle_category(&CategoryFilter::All, &cats, false),
            CategoryFilter::Named("B".into())
        );
        assert_eq!(
            cycle_category(&CategoryFilter::Named("gone".into()), &cats, true),
            CategoryFilter::Named("A".into())
        );
        assert_eq!(cycle_category(&CategoryFilter::All, &[], true), CategoryFilter::All);
    }
}
