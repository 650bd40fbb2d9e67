use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use study_models::StudyError;

/// A `StudyError` rendered as `{"detail": "..."}` with its HTTP status.
#[derive(Debug)]
pub struct ApiError(pub StudyError);

impl From<StudyError> for ApiError {
    fn from(e: StudyError) -> Self {
        ApiError(e)
    }
}

// Undecodable bodies are validation failures; anything else about the body
// (content type, read errors) is a plain bad request.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let reason = rejection.body_text();
        match rejection {
            JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => {
                ApiError(StudyError::InvalidRequest { reason })
            }
            _ => ApiError(StudyError::BadRequest { reason }),
        }
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        let reason = rejection.body_text();
        match rejection {
            FormRejection::FailedToDeserializeForm(_)
            | FormRejection::FailedToDeserializeFormBody(_) => {
                ApiError(StudyError::InvalidRequest { reason })
            }
            _ => ApiError(StudyError::BadRequest { reason }),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, Json(self.0.to_error_shape())).into_response();
        if self.0.wants_bearer_challenge() {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_errors_carry_a_challenge() {
        let response = ApiError(StudyError::InvalidCredentials).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");

        let response = ApiError(StudyError::TokenExpired).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    }

    #[test]
    fn status_follows_the_error() {
        let response = ApiError(StudyError::Gone {
            reason: "Result expired".into(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::GONE);
    }
}
