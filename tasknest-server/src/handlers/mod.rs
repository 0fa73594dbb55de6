pub mod health;
pub mod reset;

pub mod error {
    use actix_web::http::StatusCode;
    use actix_web::{HttpResponse, HttpResponseBuilder};
    use std::fmt;

    use tasknest_common::messages::AckResponse;

    /// Handler-boundary failure. Every variant renders as HTTP 200 with an
    /// `{ok: false, error}` body; clients must inspect the envelope rather
    /// than the status code.
    #[derive(Debug)]
    pub enum HandlerError {
        MissingInput(&'static str),
        InvalidInput(&'static str),

        // Absent, expired, consumed, mismatched, and concurrently-claimed
        // codes all collapse into this one response so callers cannot probe
        // which codes exist.
        InvalidOrExpiredCode,

        AccountNotFound,
        CredentialUpdateFailed,
        UpstreamFailure(&'static str),
    }

    impl HandlerError {
        pub fn message(&self) -> &'static str {
            match self {
                HandlerError::MissingInput(msg)
                | HandlerError::InvalidInput(msg)
                | HandlerError::UpstreamFailure(msg) => msg,
                HandlerError::InvalidOrExpiredCode => "invalid_or_expired_code",
                HandlerError::AccountNotFound => "account_not_found",
                HandlerError::CredentialUpdateFailed => "credential_update_failed",
            }
        }
    }

    impl std::error::Error for HandlerError {}

    impl fmt::Display for HandlerError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.message())
        }
    }

    impl actix_web::error::ResponseError for HandlerError {
        fn error_response(&self) -> HttpResponse {
            HttpResponseBuilder::new(self.status_code()).json(AckResponse::error(self.message()))
        }

        fn status_code(&self) -> StatusCode {
            StatusCode::OK
        }
    }
}
