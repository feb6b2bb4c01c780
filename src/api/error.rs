use std::fmt;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::errors::ClickRelayError;

#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub ok: bool,
    pub error: &'a str,
}

/// HTTP 层错误包装
///
/// MalformedInput → 400，NotFound → 404，其余 → 500。
#[derive(Debug)]
pub struct ApiError(pub ClickRelayError);

impl From<ClickRelayError> for ApiError {
    fn from(err: ClickRelayError) -> Self {
        ApiError(err)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.message())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self.0 {
            ClickRelayError::MalformedInput(_) => StatusCode::BAD_REQUEST,
            ClickRelayError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            ok: false,
            error: self.0.message(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ClickRelayError::malformed_input("bad"), 400),
            (ClickRelayError::not_found("ID not found"), 404),
            (ClickRelayError::transient_backend("sheets down"), 500),
            (ClickRelayError::configuration("WHATSAPP_NUMBER not set"), 500),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status_code().as_u16(), status);
        }
    }
}
