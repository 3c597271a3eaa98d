//! Response body rewrite subsystem.
//!
//! # Data Flow
//! ```text
//! upstream response (tagged with RouteTransform)
//!     → filter.rs (decorate the real sink)
//!     → rewriter.rs (intercept the single write)
//!     → aggregate.rs (collect chunks, release each one)
//!     → stages.rs on pool.rs (decode → transform → encode)
//!     → rewriter.rs (fix Content-Length, write once)
//!     → hyper writes to the client
//! ```
//!
//! # Design Decisions
//! - Codec table is built once at startup and never mutated
//! - CPU-bound stages never run on the I/O threads
//! - One layer of Content-Encoding is undone and redone, header untouched
//! - Any failure before the write leaves the real sink untouched

pub mod aggregate;
pub mod codec;
pub mod error;
pub mod filter;
pub mod pool;
pub mod rewriter;
pub mod sink;
pub mod snapshot;
pub mod stages;
pub mod transform;

pub use codec::{BodyDecoder, BodyEncoder, CodecRegistry, RegistryError};
pub use error::RewriteError;
pub use filter::{RewriteLayer, RewriteService, RouteTransform};
pub use pool::CodecPool;
pub use rewriter::{ResponseRewriter, RewritePolicy, RewriteState};
pub use sink::{HttpResponseSink, ResponseSink};
pub use snapshot::{BodyMode, HeaderSnapshot};
pub use transform::{BodyTransform, TransformConfig, TransformError, Uppercase};
