//! Body aggregation.
//!
//! # Responsibilities
//! - Pull every frame of a response body in arrival order
//! - Copy data frames into one contiguous buffer
//! - Release each chunk as soon as its bytes are copied
//!
//! # Design Decisions
//! - Chunks are `Bytes`; releasing one is dropping it
//! - Trailer frames are ignored (rewritten responses carry no trailers)
//! - On stream error everything received so far is dropped before returning

use bytes::{Bytes, BytesMut};
use http_body::Body as HttpBody;
use http_body_util::BodyExt;

use crate::rewrite::error::{BoxError, RewriteError};

/// Upper bound on the buffer pre-allocated from a size hint.
const MAX_PREALLOCATION: usize = 1024 * 1024;

/// Collect `body` into one buffer.
///
/// `limit` caps the number of captured bytes; exceeding it fails with
/// [`RewriteError::BodyTooLarge`].
pub async fn aggregate<B>(body: B, limit: Option<usize>) -> Result<Bytes, RewriteError>
where
    B: HttpBody<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let capacity = body.size_hint().exact().unwrap_or(0) as usize;
    let mut buf = BytesMut::with_capacity(capacity.min(MAX_PREALLOCATION));
    let mut body = std::pin::pin!(body);
    let mut chunks = 0usize;

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| RewriteError::Upstream(e.into()))?;

        let Ok(chunk) = frame.into_data() else {
            continue;
        };

        if let Some(limit) = limit {
            if buf.len() + chunk.len() > limit {
                return Err(RewriteError::BodyTooLarge { limit });
            }
        }

        buf.extend_from_slice(&chunk);
        chunks += 1;
        drop(chunk);
    }

    tracing::trace!(chunks, bytes = buf.len(), "Response body aggregated");
    Ok(buf.freeze())
}
