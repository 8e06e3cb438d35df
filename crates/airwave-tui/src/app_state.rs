//! AppState: read-only snapshot of the stores passed to every component.
//!
//! Only the App event loop writes to it, from the messages the stores and the
//! player core publish.

use std::collections::BTreeSet;

use airwave_proto::model::{CommentWithAuthor, RadioStation, User, UserWithRole};

use crate::route::{guard, Guard, Route};
use crate::session::SessionState;
use crate::stores::catalog::categories;
use crate::widgets::status_bar::InputMode;

pub struct AppState {
    pub session: SessionState,
    /// Catalog ordered by name.
    pub stations: Vec<RadioStation>,
    pub catalog_loaded: bool,
    pub categories: Vec<String>,
    pub favorites: BTreeSet<String>,
    pub user: Option<User>,
    pub route: Route,
    /// Thread of the station page that is open.
    pub comments: Vec<CommentWithAuthor>,
    pub users: Vec<UserWithRole>,
    pub input_mode: InputMode,
    pub sleep_presets: Vec<u32>,
    pub backend_label: String,
}

impl AppState {
    pub fn new(session: SessionState, sleep_presets: Vec<u32>, backend_label: String) -> Self {
        Self {
            session,
            stations: Vec::new(),
            catalog_loaded: false,
            categories: Vec::new(),
            favorites: BTreeSet::new(),
            user: None,
            route: Route::Home,
            comments: Vec::new(),
            users: Vec::new(),
            input_mode: InputMode::Normal,
            sleep_presets,
            backend_label,
        }
    }

    pub fn set_stations(&mut self, stations: Vec<RadioStation>) {
        self.categories = categories(&stations);
        self.stations = stations;
        self.catalog_loaded = true;
    }

    /// Switch the signed-in user. Anything tied to the previous account is
    /// dropped right away rather than when its store catches up.
    pub fn set_user(&mut self, user: Option<User>) {
        let same_account = match (&self.user, &user) {
            (Some(old), Some(new)) => old.id == new.id,
            (None, None) => true,
            _ => false,
        };
        if !same_account {
            self.favorites.clear();
            self.users.clear();
        }
        self.user = user;
    }

    pub fn station(&self, id: &str) -> Option<&RadioStation> {
        self.stations.iter().find(|s| s.id == id)
    }

    /// Station whose page is open.
    pub fn open_station(&self) -> Option<&RadioStation> {
        match &self.route {
            Route::Station(id) => self.station(id),
            _ => None,
        }
    }

    pub fn is_favorite(&self, station_id: &str) -> bool {
        self.favorites.contains(station_id)
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(User::is_admin)
    }

    /// Station from the previous run, offered for resuming while idle.
    pub fn last_station(&self) -> Option<&RadioStation> {
        if self.session.station.is_some() {
            return None;
        }
        self.session
            .last_station_id
            .as_deref()
            .and_then(|id| self.station(id))
    }

    pub fn guard(&self) -> Guard {
        guard(
            &self.route,
            self.user.as_ref(),
            &self.stations,
            self.catalog_loaded,
        )
    }
}


#[cfg(test)]
mod tests {
    use super::testing::state;
    use super::*;
    use airwave_proto::model::{Profile, Role};

    fn user(id: &str) -> User {
        User {
            id: id.into(),
            email: format!("{id}@example.com"),
            ..Default::default()
        }
    }

    #[test]
    fn sign_out_drops_account_data_at_once() {
        let mut s = state(vec![]);
        s.set_user(Some(user("u1")));
        s.favorites.insert("s1".into());
        let profile = Profile {
            id: "u9".into(),
            ..Default::default()
        };
        s.users.push(UserWithRole::new(profile, false));

        s.set_user(None);
        assert!(s.user.is_none());
        assert!(s.favorites.is_empty());
        assert!(s.users.is_empty());
        assert!(!s.is_favorite("s1"));
    }

    #[test]
    fn profile_refresh_keeps_favorites() {
        let mut s = state(vec![]);
        s.set_user(Some(user("u1")));
        s.favorites.insert("s1".into());

        let mut admin = user("u1");
        admin.role = Role::Admin;
        s.set_user(Some(admin));
        assert!(s.is_admin());
        assert!(s.is_favorite("s1"));

        s.set_user(Some(user("u2")));
        assert!(s.favorites.is_empty());
    }
}
