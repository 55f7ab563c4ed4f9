use crate::application::error::{ErrorReport, HttpError};
use crate::domain::posts::PostHeader;
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let content = ErrorPageView::not_found();
    let view = LayoutContext::new(chrome, content.title.clone(), content);
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

/// Render the error page for a failed request, keeping the original
/// diagnostic report on the response for the logging middleware.
pub fn render_error_response(chrome: LayoutChrome, error: HttpError) -> Response {
    let status = error.status();
    let content = ErrorPageView::from_message(error.public_message());
    let report = error.into_report();

    let view = LayoutContext::new(chrome, content.title.clone(), content);
    let mut response = render_template_response(ErrorTemplate { view }, status);
    report.attach(&mut response);
    response
}

/// Site-wide values every page needs.
#[derive(Clone)]
pub struct LayoutChrome {
    pub site_title: String,
    /// Login and authoring routes are mounted.
    pub authoring: bool,
    pub logged_in: bool,
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub site_title: String,
    pub page_title: String,
    pub authoring: bool,
    pub logged_in: bool,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, page_title: impl Into<String>, content: T) -> Self {
        Self {
            site_title: chrome.site_title,
            page_title: page_title.into(),
            authoring: chrome.authoring,
            logged_in: chrome.logged_in,
            content,
        }
    }
}

#[derive(Clone)]
pub struct PostCard {
    pub title: String,
    pub timestamp: String,
    pub href: String,
}

impl From<&PostHeader> for PostCard {
    fn from(header: &PostHeader) -> Self {
        Self {
            title: header.title.clone(),
            timestamp: header.timestamp.clone(),
            href: header.href(),
        }
    }
}

pub struct IndexView {
    pub posts: Vec<PostCard>,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<IndexView>,
}

pub struct PostDetailView {
    pub title: String,
    pub timestamp: String,
    pub href: String,
    pub body_html: String,
}

impl PostDetailView {
    pub fn delete_action(&self) -> String {
        format!("{}/delete", self.href)
    }
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub view: LayoutContext<PostDetailView>,
}

#[derive(Default)]
pub struct LoginView {
    pub message: Option<String>,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub view: LayoutContext<LoginView>,
}

#[derive(Default)]
pub struct CreatePostView {
    pub title: String,
    pub body: String,
    pub preview_html: Option<String>,
    pub message: Option<String>,
}

#[derive(Template)]
#[template(path = "create.html")]
pub struct CreatePostTemplate {
    pub view: LayoutContext<CreatePostView>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
    pub primary_action: Option<ErrorAction>,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page Not Found".to_string(),
            message: "The page you requested does not exist.".to_string(),
            primary_action: Some(ErrorAction::home()),
        }
    }

    pub fn from_message(message: &str) -> Self {
        Self {
            title: "Something went wrong".to_string(),
            message: message.to_string(),
            primary_action: Some(ErrorAction::home()),
        }
    }
}

pub struct ErrorAction {
    pub href: String,
    pub label: String,
}

impl ErrorAction {
    pub fn home() -> Self {
        Self {
            href: "/".to_string(),
            label: "Back to home".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}
