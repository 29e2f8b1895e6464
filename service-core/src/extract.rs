use async_trait::async_trait;
use axum::{
    Json,
    extract::{FromRequest, Request},
};
use validator::Validate;

use crate::error::AppError;

/// JSON extractor that runs `validator::Validate` after deserializing.
///
/// Both failure modes answer 400: a body that does not deserialize becomes a
/// `BadRequest` carrying the rejection text, and a deserialized value that
/// fails validation becomes a `ValidationError` with field-level details.
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: serde::de::DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
        value.validate()?;
        Ok(ValidJson(value))
    }
}
