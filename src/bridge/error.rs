use super::token::TokenError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("missing token")]
    MissingToken,

    #[error("invalid token: {0}")]
    InvalidToken(TokenError),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user not found: {0}")]
    NotFound(String),

    #[error("directory unavailable: {0}")]
    VerifierUnavailable(String),

    #[error("caller is not trusted to issue tokens")]
    Forbidden,

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<TokenError> for Error {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::MissingSecret => Self::Config("token secret is not configured".to_string()),
            err => Self::InvalidToken(err),
        }
    }
}

impl Error {
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MissingToken | Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::InvalidToken(_) | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::VerifierUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Forbidden => StatusCode::FORBIDDEN,
        }
    }

    /// Client-facing text. Never names the user, the reason a token was
    /// rejected, or the directory failure.
    #[must_use]
    pub const fn sanitized_message(&self) -> &'static str {
        match self {
            Self::Config(_) => "Internal server error",
            Self::MissingToken => "Missing token",
            Self::InvalidToken(_) => "Invalid token",
            Self::InvalidCredentials => "Invalid login. Please try again.",
            Self::NotFound(_) => "User not found",
            Self::VerifierUnavailable(_) => "Authentication service unavailable",
            Self::Forbidden => "Forbidden",
            Self::InvalidInput(_) => "Invalid input",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (self.status_code(), self.sanitized_message()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_secret_is_a_config_error() {
        let err = Error::from(TokenError::MissingSecret);
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn token_errors_are_unauthorized() {
        for token_err in [
            TokenError::Format,
            TokenError::InvalidSignature,
            TokenError::Expired,
            TokenError::UnsupportedAlg("none".to_string()),
        ] {
            let err = Error::from(token_err);
            assert!(matches!(err, Error::InvalidToken(_)));
            assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
            assert_eq!(err.sanitized_message(), "Invalid token");
        }
    }

    #[test]
    fn status_codes() {
        assert_eq!(Error::MissingToken.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Error::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            Error::NotFound("bob".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::VerifierUnavailable("down".to_string()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(Error::Forbidden.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn sanitized_message_hides_details() {
        let err = Error::NotFound("carol".to_string());
        assert!(!err.sanitized_message().contains("carol"));

        let err = Error::VerifierUnavailable("connection refused to 10.0.0.5".to_string());
        assert!(!err.sanitized_message().contains("10.0.0.5"));
    }
}
