// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Mapping of service errors onto HTTP responses.

use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use tracing::error;

use crate::error::CourierError;

#[derive(Debug)]
pub enum ApiError {
    Service(CourierError),
    /// Request body could not be decoded
    BadRequest(String),
}

impl From<CourierError> for ApiError {
    fn from(e: CourierError) -> Self {
        ApiError::Service(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Service(e) => match e {
                CourierError::EmptyUpload(_)
                | CourierError::IncompleteBundle(_)
                | CourierError::InvalidCertificate(_)
                | CourierError::InvalidEntry(_) => StatusCode::BAD_REQUEST,
                CourierError::CredentialUnavailable | CourierError::NoCertificateMaterial => {
                    StatusCode::PRECONDITION_FAILED
                }
                CourierError::NoSourceReachable => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::BadRequest(message) => message,
            ApiError::Service(e) => {
                if status.is_server_error() {
                    error!("Request failed: {}", e);
                }
                e.to_string()
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CourierError::IncompleteBundle("cert".into()), StatusCode::BAD_REQUEST),
            (CourierError::EmptyUpload("pfx".into()), StatusCode::BAD_REQUEST),
            (CourierError::InvalidEntry("A=B".into()), StatusCode::BAD_REQUEST),
            (CourierError::CredentialUnavailable, StatusCode::PRECONDITION_FAILED),
            (CourierError::NoCertificateMaterial, StatusCode::PRECONDITION_FAILED),
            (CourierError::NoSourceReachable, StatusCode::BAD_GATEWAY),
            (CourierError::TamperedOrCorrupt, StatusCode::INTERNAL_SERVER_ERROR),
            (CourierError::Store("disk full".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status(), expected);
        }
    }

    #[test]
    fn test_bad_request() {
        let response = ApiError::BadRequest("invalid base64".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
