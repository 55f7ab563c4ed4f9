use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;

use crate::{
    application::{error::HttpError, repos::RepoError},
    presentation::views::{
        IndexTemplate, IndexView, LayoutContext, PostCard, PostDetailView, PostTemplate,
        render_error_response, render_not_found_response, render_template_response,
    },
};

use super::HttpState;

pub(super) fn routes() -> Router<HttpState> {
    Router::new()
        .route("/", get(index))
        .route("/posts", get(index))
        .route("/posts/{slug}", get(post_detail))
        .route("/_health", get(health))
        .fallback(fallback)
}

async fn index(State(state): State<HttpState>, jar: CookieJar) -> Response {
    let chrome = state.chrome(state.is_logged_in(&jar));

    let index = state.posts.index();
    let posts = index.headers().iter().map(PostCard::from).collect();

    let view = LayoutContext::new(chrome, state.site.title.clone(), IndexView { posts });
    render_template_response(IndexTemplate { view }, StatusCode::OK)
}

async fn post_detail(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
    jar: CookieJar,
) -> Response {
    let chrome = state.chrome(state.is_logged_in(&jar));

    match state.posts.post(&slug).await {
        Ok(post) => {
            let header = post.header;
            let content = PostDetailView {
                href: header.href(),
                title: header.title,
                timestamp: header.timestamp,
                body_html: post.body_html,
            };
            let view = LayoutContext::new(chrome, content.title.clone(), content);
            render_template_response(PostTemplate { view }, StatusCode::OK)
        }
        Err(RepoError::NotFound { .. }) => render_not_found_response(chrome),
        Err(err) => render_error_response(chrome, HttpError::from(err)),
    }
}

async fn health(State(state): State<HttpState>) -> Response {
    let index = state.posts.index();
    (
        StatusCode::OK,
        format!(
            "ok generation={} posts={}\n",
            index.generation(),
            index.len()
        ),
    )
        .into_response()
}

async fn fallback(State(state): State<HttpState>, jar: CookieJar) -> Response {
    render_not_found_response(state.chrome(state.is_logged_in(&jar)))
}
