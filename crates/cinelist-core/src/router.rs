//! Route table and the sign-in guard.
//!
//! The router itself is external; this module defines the routes, the
//! `Navigator` seam the session layer uses to request navigation, and the
//! guard every navigation passes through.

use std::fmt;

use crate::auth::SessionView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    SignIn,
    Popular,
    Search,
    Wishlist,
}

impl Route {
    pub const ALL: [Route; 5] = [
        Route::Home,
        Route::SignIn,
        Route::Popular,
        Route::Search,
        Route::Wishlist,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::SignIn => "/signin",
            Route::Popular => "/popular",
            Route::Search => "/search",
            Route::Wishlist => "/wishlist",
        }
    }

    /// Parse a path, accepting the hash-history form (`#/popular`) too.
    pub fn from_path(path: &str) -> Option<Route> {
        let path = path.trim_start_matches('#');
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };
        Route::ALL.into_iter().find(|r| r.path() == path)
    }

    /// Everything except the sign-in page needs a session.
    pub fn requires_auth(&self) -> bool {
        !matches!(self, Route::SignIn)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Performs navigation on behalf of the session layer.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Navigator that ignores requests, for headless use.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, _route: Route) {}
}

/// Where a navigation to `target` should actually land.
pub fn guard(target: Route, session: &SessionView) -> Route {
    if target.requires_auth() && !session.is_authenticated() {
        Route::SignIn
    } else {
        target
    }
}
