use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{auth::AuthError, repos::RepoError, sessions::SessionError},
    infra::error::InfraError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn public_message(&self) -> &'static str {
        self.public_message
    }

    pub fn into_report(self) -> ErrorReport {
        self.report
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<RepoError> for HttpError {
    fn from(error: RepoError) -> Self {
        const SOURCE: &str = "application::error::repo_error_to_http_error";
        match &error {
            RepoError::NotFound { .. } => {
                HttpError::from_error(SOURCE, StatusCode::NOT_FOUND, "Post not found", &error)
            }
            RepoError::EmptyPost => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Post title and content must not be empty",
                &error,
            ),
            RepoError::TitleTooLong { .. } => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Post title is too long",
                &error,
            ),
            RepoError::Malformed { .. } | RepoError::Io { .. } => HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                &error,
            ),
        }
    }
}

impl From<SessionError> for HttpError {
    fn from(error: SessionError) -> Self {
        HttpError::from_error(
            "application::error::session_error_to_http_error",
            StatusCode::SERVICE_UNAVAILABLE,
            "Login temporarily unavailable",
            &error,
        )
    }
}

/// Failure that aborts a command before or outside request handling.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_collects_the_source_chain() {
        let error = RepoError::io(
            "hello.md",
            "read",
            std::io::Error::other("disk unplugged"),
        );
        let report = ErrorReport::from_error("test", StatusCode::INTERNAL_SERVER_ERROR, &error);
        assert_eq!(report.messages.len(), 2);
        assert!(report.messages[0].contains("hello.md"));
        assert_eq!(report.messages[1], "disk unplugged");
    }

    #[test]
    fn repo_errors_map_to_public_statuses() {
        let not_found = HttpError::from(RepoError::not_found("missing.md"));
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let empty = HttpError::from(RepoError::EmptyPost);
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

        let io = HttpError::from(RepoError::io("a.md", "write", std::io::Error::other("full")));
        assert_eq!(io.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(io.public_message(), "Internal server error");
        assert!(io.into_report().messages.iter().any(|m| m == "full"));
    }

    #[test]
    fn overlong_titles_are_client_errors() {
        let error = RepoError::TitleTooLong {
            source: crate::domain::slug::SlugError::TooLong { bytes: 300 },
        };
        let http = HttpError::from(error);
        assert_eq!(http.status(), StatusCode::BAD_REQUEST);
        assert_eq!(http.public_message(), "Post title is too long");
        let report = http.into_report();
        assert!(report.messages.iter().any(|m| m.contains("300 bytes")));
    }

    #[test]
    fn app_error_keeps_the_source_message() {
        let error = AppError::from(RepoError::not_found("gone.md"));
        assert_eq!(error.to_string(), "post `gone.md` not found");
    }
}
