mod admin;
mod middleware;
mod public;

use std::sync::Arc;

use axum::{Router, middleware as axum_middleware};
use axum_extra::extract::CookieJar;
use tracing::debug;

use crate::{
    application::{auth::Credentials, posts::PostService, sessions::SessionStore},
    domain::posts::MarkdownRenderer,
    presentation::views::LayoutChrome,
};

use middleware::{log_responses, set_request_context};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "microblog_h";

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub title: String,
    pub view_only: bool,
    pub secure_cookie: bool,
}

#[derive(Clone)]
pub struct HttpState {
    pub posts: Arc<PostService>,
    pub sessions: Arc<SessionStore>,
    /// `None` serves the blog read-only.
    pub credentials: Option<Arc<Credentials>>,
    pub renderer: Arc<dyn MarkdownRenderer>,
    pub site: Arc<SiteSettings>,
}

impl HttpState {
    /// Login, authoring and delete routes are mounted.
    pub fn authoring(&self) -> bool {
        !self.site.view_only && self.credentials.is_some()
    }

    /// Whether the request carries a live session. Every rejection is treated
    /// as "not logged in".
    pub fn is_logged_in(&self, jar: &CookieJar) -> bool {
        if !self.authoring() {
            return false;
        }
        let token = jar.get(SESSION_COOKIE).map(|cookie| cookie.value());
        match self.sessions.check(token) {
            Ok(()) => true,
            Err(rejection) => {
                debug!(
                    target = "microblog::http::session",
                    reason = %rejection,
                    "request is not authenticated"
                );
                false
            }
        }
    }

    pub fn chrome(&self, logged_in: bool) -> LayoutChrome {
        LayoutChrome {
            site_title: self.site.title.clone(),
            authoring: self.authoring(),
            logged_in,
        }
    }
}

pub fn build_router(state: HttpState) -> Router {
    let mut router = public::routes();
    if state.authoring() {
        router = router.merge(admin::routes());
    }

    router
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
