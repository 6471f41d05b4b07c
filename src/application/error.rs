use std::{borrow::Cow, error::Error as StdError};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::{
    application::{profiles::ProfileError, refresh::RefreshError},
    domain::error::DomainError,
    infra::error::InfraError,
};

/// Diagnostic attached to error responses so the logging middleware can report the cause.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self { source, messages }
    }

    pub fn from_message(source: &'static str, message: impl Into<String>) -> Self {
        Self {
            source,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Failure envelope shared by every JSON endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: Cow<'static, str>,
}

impl ErrorBody {
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: Cow<'static, str>,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: impl Into<Cow<'static, str>>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            status,
            public_message: public_message.into(),
            report: ErrorReport::from_message(source, detail),
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(ErrorBody::new(self.public_message))).into_response();
        self.report.attach(&mut response);
        response
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Refresh(#[from] RefreshError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Domain(DomainError::UnknownPlatform { .. }) => StatusCode::NOT_FOUND,
            AppError::Profile(_) => StatusCode::NOT_FOUND,
            AppError::Refresh(RefreshError::AlreadyRunning) => StatusCode::CONFLICT,
            AppError::Infra(_) | AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn presentation_message(&self) -> Cow<'static, str> {
        match self {
            AppError::Domain(DomainError::UnknownPlatform { slug }) => {
                format!("Unknown platform: {slug}").into()
            }
            AppError::Profile(err) => {
                format!("Data not available for {}", err.platform().display_name()).into()
            }
            AppError::Refresh(RefreshError::AlreadyRunning) => {
                "A refresh is already in progress".into()
            }
            AppError::Infra(_) | AppError::Unexpected(_) => "Unexpected error occurred".into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.presentation_message();
        let report = ErrorReport::from_error("application::error::AppError", &self);
        let mut response = (status, Json(ErrorBody::new(message))).into_response();
        report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{domain::types::Platform, infra::store::StoreError};

    #[test]
    fn maps_errors_to_statuses() {
        let unknown = AppError::from(DomainError::unknown_platform("hackerrank"));
        assert_eq!(unknown.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            unknown.presentation_message(),
            "Unknown platform: hackerrank"
        );

        let busy = AppError::from(RefreshError::AlreadyRunning);
        assert_eq!(busy.status_code(), StatusCode::CONFLICT);

        let missing = AppError::from(ProfileError::Unavailable {
            platform: Platform::Gfg,
            source: StoreError::Missing {
                path: "data/gfg.json".into(),
            },
        });
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            missing.presentation_message(),
            "Data not available for GeeksForGeeks"
        );
    }

    #[test]
    fn report_collects_source_chain() {
        let err = AppError::from(ProfileError::Unavailable {
            platform: Platform::LeetCode,
            source: StoreError::Missing {
                path: "data/leetcode.json".into(),
            },
        });
        let report = ErrorReport::from_error("test", &err);
        assert_eq!(report.messages.len(), 2);
        assert!(report.messages[1].contains("leetcode.json"));
    }
}
