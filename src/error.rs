use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid URL format")]
    InvalidUrl,
    #[error("custom suffix must be 3-32 letters, digits, underscores or hyphens")]
    InvalidSuffix,
    #[error("this suffix is already in use")]
    SuffixTaken,
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("invalid request body: {0}")]
    InvalidBody(String),
    #[error("short link not found")]
    NotFound,
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("unauthorized")]
    Unauthorized,
    #[error("human verification failed")]
    CaptchaFailed,
    #[error("old password is incorrect")]
    WrongOldPassword,
    #[error("new password must be at least {0} characters")]
    PasswordTooShort(usize),
    #[error("API endpoint not found")]
    RouteNotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidUrl
            | AppError::InvalidSuffix
            | AppError::MissingField(_)
            | AppError::InvalidBody(_)
            | AppError::WrongOldPassword
            | AppError::PasswordTooShort(_) => StatusCode::BAD_REQUEST,
            AppError::SuffixTaken => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::CaptchaFailed => StatusCode::FORBIDDEN,
            AppError::NotFound | AppError::RouteNotFound => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match &self {
            AppError::Internal(err) => {
                tracing::error!(error = ?err, "request failed");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorResponse { error })).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidBody(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_http_status() {
        assert_eq!(AppError::InvalidUrl.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::InvalidSuffix.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::SuffixTaken.status(), StatusCode::CONFLICT);
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::CaptchaFailed.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn internal_errors_hide_their_cause() {
        let response = AppError::Internal(anyhow::anyhow!("db password leaked")).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "internal server error");
    }
}
