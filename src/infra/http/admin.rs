use axum::{
    Form, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    application::{
        error::{ErrorReport, HttpError},
        repos::{PublishPostParams, RepoError},
    },
    domain::slug::url_segment,
    presentation::views::{
        CreatePostTemplate, CreatePostView, LayoutContext, LoginTemplate, LoginView,
        render_error_response, render_not_found_response, render_template_response,
    },
};

use super::{HttpState, SESSION_COOKIE};

const SOURCE: &str = "infra::http::admin";

pub(super) fn routes() -> Router<HttpState> {
    Router::new()
        .route("/login", get(login_form).post(login_submit))
        .route("/logout", post(logout))
        .route("/create", get(create_form).post(create_submit))
        .route("/posts/{slug}/delete", post(delete_post))
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
struct CreateForm {
    #[serde(default)]
    title: String,
    #[serde(default)]
    data: String,
    publish: Option<String>,
}

fn to_login() -> Response {
    Redirect::to("/login").into_response()
}

async fn login_form(State(state): State<HttpState>, jar: CookieJar) -> Response {
    if state.is_logged_in(&jar) {
        return Redirect::to("/create").into_response();
    }
    let view = LayoutContext::new(state.chrome(false), "Log in", LoginView::default());
    render_template_response(LoginTemplate { view }, StatusCode::OK)
}

async fn login_submit(
    State(state): State<HttpState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let Some(credentials) = state.credentials.as_ref() else {
        return render_not_found_response(state.chrome(false));
    };

    if !credentials.verify(&form.password) {
        let view = LayoutContext::new(
            state.chrome(false),
            "Log in",
            LoginView {
                message: Some("Login failed!".to_string()),
            },
        );
        let mut response = render_template_response(LoginTemplate { view }, StatusCode::UNAUTHORIZED);
        ErrorReport::from_message(SOURCE, StatusCode::UNAUTHORIZED, "password rejected")
            .attach(&mut response);
        return response;
    }

    let token = match state.sessions.create(credentials.session_seed()) {
        Ok(token) => token,
        Err(err) => return render_error_response(state.chrome(false), HttpError::from(err)),
    };

    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.site.secure_cookie);

    info!(target = SOURCE, "session opened");
    (jar.add(cookie), Redirect::to("/create")).into_response()
}

async fn logout(State(state): State<HttpState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE)
        && state.sessions.revoke(cookie.value())
    {
        info!(target = SOURCE, "session closed");
    }
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Redirect::to("/")).into_response()
}

async fn create_form(State(state): State<HttpState>, jar: CookieJar) -> Response {
    if !state.is_logged_in(&jar) {
        return to_login();
    }
    let view = LayoutContext::new(state.chrome(true), "New post", CreatePostView::default());
    render_template_response(CreatePostTemplate { view }, StatusCode::OK)
}

async fn create_submit(
    State(state): State<HttpState>,
    jar: CookieJar,
    Form(form): Form<CreateForm>,
) -> Response {
    if !state.is_logged_in(&jar) {
        return to_login();
    }

    if form.publish.is_none() {
        let content = CreatePostView {
            preview_html: Some(state.renderer.render(&form.data)),
            title: form.title,
            body: form.data,
            message: None,
        };
        let view = LayoutContext::new(state.chrome(true), "New post", content);
        return render_template_response(CreatePostTemplate { view }, StatusCode::OK);
    }

    let params = PublishPostParams {
        title: form.title.clone(),
        body: form.data.clone(),
    };

    match state.posts.publish(params).await {
        Ok(slug) => {
            info!(target = SOURCE, slug = %slug, "post published");
            Redirect::to(&format!("/posts/{}", url_segment(&slug))).into_response()
        }
        Err(err @ (RepoError::EmptyPost | RepoError::TitleTooLong { .. })) => {
            let http = HttpError::from(err);
            let content = CreatePostView {
                message: Some(http.public_message().to_string()),
                title: form.title,
                body: form.data,
                preview_html: None,
            };
            let status = http.status();
            let view = LayoutContext::new(state.chrome(true), "New post", content);
            let mut response = render_template_response(CreatePostTemplate { view }, status);
            http.into_report().attach(&mut response);
            response
        }
        Err(err) => {
            warn!(target = SOURCE, error = %err, "publish failed");
            render_error_response(state.chrome(true), HttpError::from(err))
        }
    }
}

async fn delete_post(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
    jar: CookieJar,
) -> Response {
    if !state.is_logged_in(&jar) {
        return to_login();
    }

    match state.posts.delete(&slug).await {
        Ok(()) => {
            info!(target = SOURCE, slug = %slug, "post deleted");
            Redirect::to("/").into_response()
        }
        Err(RepoError::NotFound { .. }) => render_not_found_response(state.chrome(true)),
        Err(err) => render_error_response(state.chrome(true), HttpError::from(err)),
    }
}
