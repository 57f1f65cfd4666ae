//! crates/decipher_core/src/navigation.rs
//!
//! Route classification and the navigation guard.
//!
//! `guard` is a pure function of the path and the session; the `Navigator`
//! calls it after every navigation and after every session change.

use crate::session::SessionSnapshot;

pub const LOGIN_PATH: &str = "/login";
pub const SIGNUP_PATH: &str = "/signup";
pub const HOME_PATH: &str = "/home";

/// Pages reachable without a session. They also render without chrome.
pub const AUTH_PAGES: [&str; 6] = [
    "login",
    "signup",
    "verify-otp",
    "forgot-password",
    "reset-password",
    "verify-email",
];

/// Strips the query string and fragment from a location.
fn path_only(location: &str) -> &str {
    let end = location
        .find(|c: char| c == '?' || c == '#')
        .unwrap_or(location.len());
    &location[..end]
}

/// The first segment of the path, or `home` for the root.
pub fn current_page(location: &str) -> &str {
    path_only(location)
        .trim_start_matches('/')
        .split('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or("home")
}

pub fn is_auth_page(location: &str) -> bool {
    AUTH_PAGES.contains(&current_page(location))
}

/// Whether the sidebar, search bar and hamburger render on this page.
pub fn shows_chrome(location: &str) -> bool {
    !is_auth_page(location)
}

/// Knobs for behavior the product has not settled yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardPolicy {
    /// Also send logged-in users away from the OTP, forgot-password,
    /// reset-password and verify-email pages. Off keeps them reachable.
    pub redirect_authenticated_from_recovery: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavDecision {
    /// Session restore is still running; render a loading state.
    Wait,
    Redirect(&'static str),
    Allow,
}

/// Decides what to do with `location` given the session state.
pub fn guard(
    location: &str,
    authenticated: bool,
    is_loading: bool,
    policy: &GuardPolicy,
) -> NavDecision {
    if is_loading {
        return NavDecision::Wait;
    }

    let auth_page = is_auth_page(location);
    if !auth_page && !authenticated {
        return NavDecision::Redirect(LOGIN_PATH);
    }

    let path = path_only(location);
    if authenticated && (path == LOGIN_PATH || path == SIGNUP_PATH) {
        return NavDecision::Redirect(HOME_PATH);
    }

    if authenticated && auth_page && policy.redirect_authenticated_from_recovery {
        return NavDecision::Redirect(HOME_PATH);
    }

    NavDecision::Allow
}

/// Tracks the current location and applies the guard whenever the location
/// or the session changes.
#[derive(Debug, Clone)]
pub struct Navigator {
    location: String,
    policy: GuardPolicy,
}

impl Navigator {
    pub fn new(location: impl Into<String>, policy: GuardPolicy) -> Self {
        Self {
            location: location.into(),
            policy,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn current_page(&self) -> &str {
        current_page(&self.location)
    }

    pub fn is_auth_page(&self) -> bool {
        is_auth_page(&self.location)
    }

    pub fn shows_chrome(&self) -> bool {
        shows_chrome(&self.location)
    }

    pub fn navigate(&mut self, location: &str, session: &SessionSnapshot) -> NavDecision {
        self.location = location.to_string();
        self.reevaluate(session)
    }

    pub fn on_session_change(&mut self, session: &SessionSnapshot) -> NavDecision {
        self.reevaluate(session)
    }

    /// Redirect targets are always allowed for the state that produced them,
    /// so a single hop settles the location.
    fn reevaluate(&mut self, session: &SessionSnapshot) -> NavDecision {
        let decision = guard(
            &self.location,
            session.is_authenticated(),
            session.is_loading,
            &self.policy,
        );
        if let NavDecision::Redirect(target) = decision {
            tracing::debug!("Redirecting {} -> {}", self.location, target);
            self.location = target.to_string();
        }
        decision
    }
}
