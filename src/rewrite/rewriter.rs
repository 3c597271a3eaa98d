//! Response rewriter: the decorator around the real response sink.
//!
//! # States
//! ```text
//! Idle → Capturing → Processing → Writing → Done
//!   any non-terminal state → Failed
//! ```
//!
//! # Design Decisions
//! - Everything except `write_with` is delegated to the wrapped sink
//! - The pipeline runs at most once; a second write is rejected
//! - Headers are finalized strictly before the single delegate write
//! - Dropping an in-flight write (client gone) leaves the state `Failed`
//! - Failing before `Writing` means the delegate never sees a byte

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use bytes::Bytes;

use crate::rewrite::aggregate::aggregate;
use crate::rewrite::codec::CodecRegistry;
use crate::rewrite::error::RewriteError;
use crate::rewrite::pool::CodecPool;
use crate::rewrite::sink::ResponseSink;
use crate::rewrite::snapshot::{BodyMode, HeaderSnapshot};
use crate::rewrite::stages::run_text_pipeline;
use crate::rewrite::transform::{BodyTransform, TransformConfig, Uppercase};

/// Rewriter lifecycle.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteState {
    Idle = 0,
    Capturing = 1,
    Processing = 2,
    Writing = 3,
    Done = 4,
    Failed = 5,
}

impl From<u8> for RewriteState {
    fn from(val: u8) -> Self {
        match val {
            0 => RewriteState::Idle,
            1 => RewriteState::Capturing,
            2 => RewriteState::Processing,
            3 => RewriteState::Writing,
            4 => RewriteState::Done,
            _ => RewriteState::Failed,
        }
    }
}

impl RewriteState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RewriteState::Done | RewriteState::Failed)
    }
}

/// Shared, observable rewriter state.
///
/// Stays readable after the rewriter (or its in-flight future) is dropped.
#[derive(Debug, Clone)]
pub struct StateHandle(Arc<AtomicU8>);

impl StateHandle {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(RewriteState::Idle as u8)))
    }

    pub fn get(&self) -> RewriteState {
        RewriteState::from(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: RewriteState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Marks the state `Failed` unless disarmed.
struct FailOnDrop {
    state: StateHandle,
    armed: bool,
}

impl FailOnDrop {
    fn arm(state: StateHandle) -> Self {
        Self { state, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for FailOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.state.set(RewriteState::Failed);
        }
    }
}

/// Gateway-wide pieces the pipeline runs with.
#[derive(Debug, Clone)]
pub struct RewritePolicy {
    pub registry: Arc<CodecRegistry>,
    pub transform: Arc<dyn BodyTransform>,
    pub pool: CodecPool,
    /// Cap on captured body size; `None` is unbounded.
    pub max_body_bytes: Option<usize>,
}

impl RewritePolicy {
    pub fn new(registry: Arc<CodecRegistry>, transform: Arc<dyn BodyTransform>, pool: CodecPool) -> Self {
        Self {
            registry,
            transform,
            pool,
            max_body_bytes: None,
        }
    }

    pub fn with_max_body_bytes(mut self, limit: Option<usize>) -> Self {
        self.max_body_bytes = limit;
        self
    }
}

impl Default for RewritePolicy {
    fn default() -> Self {
        Self::new(
            Arc::new(CodecRegistry::with_defaults()),
            Arc::new(Uppercase),
            CodecPool::default(),
        )
    }
}

/// Decorates a [`ResponseSink`], rewriting the body on its way through.
#[derive(Debug)]
pub struct ResponseRewriter<S> {
    delegate: S,
    policy: RewritePolicy,
    config: Arc<TransformConfig>,
    snapshot: HeaderSnapshot,
    state: StateHandle,
}

impl<S: ResponseSink> ResponseRewriter<S> {
    /// Wrap `delegate`, snapshotting its headers as the upstream sent them.
    pub fn new(delegate: S, policy: RewritePolicy, config: Arc<TransformConfig>) -> Self {
        let snapshot = HeaderSnapshot::capture(delegate.headers());
        Self {
            delegate,
            policy,
            config,
            snapshot,
            state: StateHandle::new(),
        }
    }

    pub fn state(&self) -> RewriteState {
        self.state.get()
    }

    pub fn state_handle(&self) -> StateHandle {
        self.state.clone()
    }

    pub fn snapshot(&self) -> &HeaderSnapshot {
        &self.snapshot
    }

    pub fn get_ref(&self) -> &S {
        &self.delegate
    }

    pub fn into_inner(self) -> S {
        self.delegate
    }
}

impl<S: ResponseSink> ResponseSink for ResponseRewriter<S> {
    fn status(&self) -> StatusCode {
        self.delegate.status()
    }

    fn headers(&self) -> &HeaderMap {
        self.delegate.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.delegate.headers_mut()
    }

    async fn write_with(&mut self, body: Body) -> Result<(), RewriteError> {
        let current = self.state.get();
        if current != RewriteState::Idle {
            tracing::warn!(state = ?current, "Rejected repeated write on rewritten response");
            return Err(RewriteError::AlreadyWritten);
        }

        let guard = FailOnDrop::arm(self.state.clone());

        self.state.set(RewriteState::Capturing);
        let captured = aggregate(body, self.policy.max_body_bytes).await?;

        self.state.set(RewriteState::Processing);
        let output = match self.snapshot.body_mode() {
            BodyMode::Binary => captured,
            BodyMode::Text => {
                let job = text_job(&self.policy, &self.config, &self.snapshot, captured);
                let pool = self.policy.pool.clone();
                pool.run(job).await??
            }
        };

        self.state.set(RewriteState::Writing);
        set_framing(self.delegate.headers_mut(), output.len());
        self.delegate.write_with(Body::from(output)).await?;

        guard.disarm();
        self.state.set(RewriteState::Done);
        Ok(())
    }
}

/// The decode → transform → encode job for one captured body.
fn text_job(
    policy: &RewritePolicy,
    config: &Arc<TransformConfig>,
    snapshot: &HeaderSnapshot,
    captured: Bytes,
) -> impl FnOnce() -> Result<Bytes, RewriteError> + Send + 'static {
    let registry = Arc::clone(&policy.registry);
    let transform = Arc::clone(&policy.transform);
    let config = Arc::clone(config);
    let tokens = snapshot.content_encoding.clone();

    move || run_text_pipeline(&registry, &tokens, transform.as_ref(), &config, captured)
}

/// Set `Content-Length` unless the response is chunked without one.
fn set_framing(headers: &mut HeaderMap, len: usize) {
    if !headers.contains_key(TRANSFER_ENCODING) || headers.contains_key(CONTENT_LENGTH) {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
    }
}
