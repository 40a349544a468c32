//! Extractors whose rejections render through [`AppError`], so malformed
//! bodies, paths and query strings get the same JSON error shape as every
//! other failure.

use axum::extract::{FromRequest, FromRequestParts};

use crate::utils::error::AppError;

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);
