//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID, hop-by-hop cleanup, forwarding headers)
//!     → routing (pick the upstream)
//!     → hyper client (stream request, receive response head)
//!     → rewrite layer (body rewrite for transforming routes)
//!     → Send to client
//! ```

pub mod request;
pub mod server;

pub use request::{MakeRequestUuid, RequestIdExt, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
