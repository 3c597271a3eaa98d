//! Rewrite pipeline errors.

use std::io;

use thiserror::Error;

/// Boxed error coming out of a body stream or a service.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Fatal failures of the rewrite pipeline.
///
/// Any of these aborts the response before the sink is written.
#[derive(Debug, Error)]
pub enum RewriteError {
    /// A registered decoder rejected the upstream body.
    #[error("failed to decode `{encoding}` body: {source}")]
    Decode {
        encoding: String,
        #[source]
        source: io::Error,
    },

    /// A registered encoder failed on the transformed body.
    #[error("failed to encode `{encoding}` body: {source}")]
    Encode {
        encoding: String,
        #[source]
        source: io::Error,
    },

    /// The body transform returned an error or panicked.
    #[error("body transform failed: {0}")]
    Transform(String),

    /// The upstream body stream errored mid-capture.
    #[error("upstream body stream failed: {0}")]
    Upstream(#[source] BoxError),

    /// The captured body grew past the configured limit.
    #[error("response body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// A second write was attempted on the same response.
    #[error("response body already written")]
    AlreadyWritten,

    /// The codec worker pool has been shut down.
    #[error("codec worker pool is closed")]
    PoolClosed,

    /// The blocking codec job was cancelled or panicked outside the transform.
    #[error("codec worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl RewriteError {
    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RewriteError::Decode { .. } => "decode",
            RewriteError::Encode { .. } => "encode",
            RewriteError::Transform(_) => "transform",
            RewriteError::Upstream(_) => "upstream",
            RewriteError::BodyTooLarge { .. } => "too_large",
            RewriteError::AlreadyWritten => "already_written",
            RewriteError::PoolClosed | RewriteError::Worker(_) => "worker",
        }
    }
}
