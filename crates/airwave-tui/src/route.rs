//! Client-side routes and their access guards.

use airwave_proto::model::{RadioStation, User};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Route {
    #[default]
    Home,
    Discover,
    Station(String),
    Favorites,
    Profile,
    Login,
    Register,
    Admin,
}

/// What the view layer should do with a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    Show,
    /// Render a "sign in to continue" prompt instead of the page.
    SignInPrompt,
    Redirect(Route),
}

impl Route {
    pub fn title(&self) -> &'static str {
        match self {
            Route::Home => "home",
            Route::Discover => "discover",
            Route::Station(_) => "station",
            Route::Favorites => "favorites",
            Route::Profile => "profile",
            Route::Login => "sign in",
            Route::Register => "sign up",
            Route::Admin => "admin",
        }
    }

    /// Header tabs, selected with the number keys.
    pub fn from_digit(c: char, user: Option<&User>) -> Option<Route> {
        match c {
            '1' => Some(Route::Home),
            '2' => Some(Route::Discover),
            '3' => Some(Route::Favorites),
            '4' => Some(if user.is_some() {
                Route::Profile
            } else {
                Route::Login
            }),
            '5' if user.is_some_and(User::is_admin) => Some(Route::Admin),
            _ => None,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Route::Login | Route::Register)
    }
}

/// Decide whether `route` can be shown. Station ids are only checked once
/// the catalog has loaded, so a deep link does not bounce during start-up.
pub fn guard(
    route: &Route,
    user: Option<&User>,
    stations: &[RadioStation],
    catalog_loaded: bool,
) -> Guard {
    match route {
        Route::Profile | Route::Favorites if user.is_none() => Guard::SignInPrompt,
        Route::Admin if !user.is_some_and(User::is_admin) => Guard::Redirect(Route::Home),
        Route::Login | Route::Register if user.is_some() => Guard::Redirect(Route::Home),
        Route::Station(id) if catalog_loaded && !stations.iter().any(|s| &s.id == id) => {
            Guard::Redirect(Route::Discover)
        }
        _ => Guard::Show,
    }
}
