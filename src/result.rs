//! Uniform operation result.
//!
//! Every store operation that can fail for business reasons returns an
//! [`OperationResult`]: an HTTP-style status, the error messages collected
//! along the way, the values produced, and optionally a renewed session
//! token. Serialised, it has the wire shape
//!
//! ```json
//! {"status_code": 207, "errors": ["17: Entry already exists"], "values": [], "new_token": null}
//! ```
//!
//! Results are built fresh per operation and only transformed by consuming
//! methods, so a returned result is never mutated in place.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// HTTP-style status code carried by a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(u16);

impl StatusCode {
    pub const OK: Self = Self(200);
    pub const CREATED: Self = Self(201);
    /// Some items of a list or batch failed while others succeeded.
    pub const MULTI_STATUS: Self = Self(207);
    pub const BAD_REQUEST: Self = Self(400);
    pub const UNAUTHORIZED: Self = Self(401);
    pub const FORBIDDEN: Self = Self(403);
    pub const NOT_FOUND: Self = Self(404);
    pub const CONFLICT: Self = Self(409);
    pub const INTERNAL_SERVER_ERROR: Self = Self(500);
    pub const SERVICE_UNAVAILABLE: Self = Self(503);

    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// 2xx
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 <= 299
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status, errors and values of one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult<T> {
    #[serde(rename = "status_code")]
    status: StatusCode,
    errors: Vec<String>,
    values: Vec<T>,
    new_token: Option<String>,
}

impl<T> OperationResult<T> {
    fn build(status: StatusCode, errors: Vec<String>, values: Vec<T>) -> Self {
        Self {
            status,
            errors,
            values,
            new_token: None,
        }
    }

    /// 200 with the given values.
    pub fn ok(values: Vec<T>) -> Self {
        Self::build(StatusCode::OK, Vec::new(), values)
    }

    /// 200 without values.
    pub fn empty() -> Self {
        Self::ok(Vec::new())
    }

    /// 201 with the created value.
    pub fn created(value: T) -> Self {
        Self::build(StatusCode::CREATED, Vec::new(), vec![value])
    }

    /// A failure with a single error message.
    pub fn failure(status: StatusCode, error: impl Into<String>) -> Self {
        Self::build(status, vec![error.into()], Vec::new())
    }

    pub fn not_found(error: impl Into<String>) -> Self {
        Self::failure(StatusCode::NOT_FOUND, error)
    }

    pub fn conflict(error: impl Into<String>) -> Self {
        Self::failure(StatusCode::CONFLICT, error)
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::failure(StatusCode::BAD_REQUEST, error)
    }

    pub fn forbidden(error: impl Into<String>) -> Self {
        Self::failure(StatusCode::FORBIDDEN, error)
    }

    pub fn unauthorized(error: impl Into<String>) -> Self {
        Self::failure(StatusCode::UNAUTHORIZED, error)
    }

    pub fn internal_error(error: impl Into<String>) -> Self {
        Self::failure(StatusCode::INTERNAL_SERVER_ERROR, error)
    }

    /// Result of a listing: values that decoded plus per-entry errors.
    ///
    /// Any error makes the listing a partial success (207).
    pub fn listing(values: Vec<T>, errors: Vec<String>) -> Self {
        let status = if errors.is_empty() {
            StatusCode::OK
        } else {
            StatusCode::MULTI_STATUS
        };
        Self::build(status, errors, values)
    }

    /// Result of a batch of `attempted` items.
    ///
    /// 200 when nothing failed, 207 when some items failed, 400 when every
    /// item failed.
    pub fn batch(values: Vec<T>, errors: Vec<String>, attempted: usize) -> Self {
        let status = if errors.is_empty() {
            StatusCode::OK
        } else if errors.len() < attempted {
            StatusCode::MULTI_STATUS
        } else {
            StatusCode::BAD_REQUEST
        };
        Self::build(status, errors, values)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn into_values(self) -> Vec<T> {
        self.values
    }

    pub fn new_token(&self) -> Option<&str> {
        self.new_token.as_deref()
    }

    /// First value, if any.
    pub fn value(&self) -> Option<&T> {
        self.values.first()
    }

    /// 2xx and no errors.
    pub fn is_success(&self) -> bool {
        self.status.is_success() && self.errors.is_empty()
    }

    /// Successful and carrying at least one value.
    pub fn is_success_and_not_empty(&self) -> bool {
        self.is_success() && !self.values.is_empty()
    }

    /// Attach a renewed session token.
    pub fn with_new_token(mut self, token: impl Into<String>) -> Self {
        self.new_token = Some(token.into());
        self
    }

    /// Convert the values, keeping status, errors and token.
    pub fn map_values<U>(self, f: impl FnMut(T) -> U) -> OperationResult<U> {
        OperationResult {
            status: self.status,
            errors: self.errors,
            values: self.values.into_iter().map(f).collect(),
            new_token: self.new_token,
        }
    }

    /// Drop the values, keeping status, errors and token.
    pub fn discard_values(self) -> OperationResult<()> {
        OperationResult {
            status: self.status,
            errors: self.errors,
            values: Vec::new(),
            new_token: self.new_token,
        }
    }
}

impl<T> From<StoreError> for OperationResult<T> {
    /// Translation used at the outermost caller: bind failures become 503,
    /// other directory failures 500.
    fn from(error: StoreError) -> Self {
        let status = if error.is_service_unavailable() {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self::failure(status, error.to_string())
    }
}
