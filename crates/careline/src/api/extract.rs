//! JSON body extractors that report failures in the API's error format.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use serde::de::DeserializeOwned;

use super::error::ApiError;

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

/// `Json<T>` that rejects with [`ApiError::Validation`].
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// A JSON body whose parse failure is held until the handler asks for it.
///
/// Intake submissions check the onboarding sequence before looking at the
/// body, so a malformed out-of-sequence submit still redirects.
#[derive(Debug)]
pub struct Deferred<T>(Result<T, JsonRejection>);

impl<T> Deferred<T> {
    pub fn into_result(self) -> Result<T, ApiError> {
        self.0.map_err(ApiError::from)
    }

    pub fn is_ok(&self) -> bool {
        self.0.is_ok()
    }
}

impl<S, T> FromRequest<S> for Deferred<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = std::convert::Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            Json::<T>::from_request(req, state)
                .await
                .map(|Json(value)| value),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{StatusCode, header::CONTENT_TYPE};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Kit {
        #[allow(dead_code)]
        city: String,
    }

    fn request(body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_api_json_rejects_as_validation() {
        let err = ApiJson::<Kit>::from_request(request("{}"), &())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.to_string().contains("city"));
    }

    #[tokio::test]
    async fn test_deferred_holds_the_failure() {
        let bad = Deferred::<Kit>::from_request(request("{}"), &())
            .await
            .unwrap();
        assert!(!bad.is_ok());
        assert!(matches!(bad.into_result(), Err(ApiError::Validation(_))));

        let good = Deferred::<Kit>::from_request(request(r#"{"city":"Leeds"}"#), &())
            .await
            .unwrap();
        assert!(good.into_result().is_ok());
    }
}
