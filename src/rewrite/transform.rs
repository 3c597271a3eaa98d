//! Pluggable body transform.
//!
//! The transform is a pure function over decoded text plus the matched
//! route's configuration. The pipeline around it owns all I/O.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rewrite::error::RewriteError;

/// Per-route transform parameters.
///
/// Deserialized from the route's `transform` table. It has no fields yet;
/// its presence on a route is what enables body rewriting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformConfig {}

/// Error reported by a transform implementation.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransformError(pub String);

/// Text transformation applied to response bodies.
pub trait BodyTransform: Send + Sync + fmt::Debug {
    /// Transform `input`. `Ok(None)` produces an empty body.
    fn transform(
        &self,
        input: &str,
        config: &TransformConfig,
    ) -> Result<Option<String>, TransformError>;
}

/// Upper-cases the whole body.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uppercase;

impl BodyTransform for Uppercase {
    fn transform(
        &self,
        input: &str,
        _config: &TransformConfig,
    ) -> Result<Option<String>, TransformError> {
        Ok(Some(input.to_uppercase()))
    }
}

/// Run `transform` over decoded bytes.
///
/// Bytes are read as UTF-8 with invalid sequences replaced. An error or a
/// panic from the transform becomes [`RewriteError::Transform`].
pub fn transform_stage(
    transform: &dyn BodyTransform,
    config: &TransformConfig,
    decoded: &[u8],
) -> Result<Bytes, RewriteError> {
    let text = String::from_utf8_lossy(decoded);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| transform.transform(&text, config)));

    match outcome {
        Ok(Ok(Some(text))) => Ok(Bytes::from(text)),
        Ok(Ok(None)) => Ok(Bytes::new()),
        Ok(Err(e)) => Err(RewriteError::Transform(e.0)),
        Err(payload) => Err(RewriteError::Transform(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("transform panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("transform panicked: {s}")
    } else {
        "transform panicked".to_string()
    }
}
