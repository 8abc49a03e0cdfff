use axum::extract::FromRequest;

use crate::error::ApiError;

/// `axum::Json` whose rejections render through [`ApiError`], so a missing
/// field or a wrong type gets the same envelope as every other failure.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);
