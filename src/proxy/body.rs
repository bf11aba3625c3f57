//! Request and response body wrappers used during dispatch.
//!
//! # Responsibilities
//! - Hand the inbound request body to whichever attempt first reads it
//! - Tell the dispatcher whether a failed attempt consumed the body
//! - Keep a target's attempt slot reserved while its response streams
//!
//! # Design Decisions
//! - Bodies are streamed, never buffered for replay
//! - An attempt that failed before touching the body leaves it intact for the
//!   next target; once any bytes were pulled, failover is impossible

use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use hyper::body::{Body as HttpBody, Frame, SizeHint};

use crate::load_balancer::AttemptGuard;

enum SlotState {
    Ready(Body),
    Taken,
}

/// Single-owner holder for the inbound request body.
#[derive(Clone)]
pub struct BodySlot {
    state: Arc<Mutex<SlotState>>,
}

impl BodySlot {
    pub fn new(body: Body) -> Self {
        Self {
            state: Arc::new(Mutex::new(SlotState::Ready(body))),
        }
    }

    /// A body for one attempt. It takes ownership of the inbound body on
    /// first poll.
    pub fn attempt_body(&self) -> Body {
        let (size_hint, end_stream) = match &*self.lock() {
            SlotState::Ready(body) => (body.size_hint(), body.is_end_stream()),
            SlotState::Taken => (SizeHint::default(), false),
        };

        Body::new(LazyBody {
            slot: self.state.clone(),
            inner: None,
            size_hint,
            end_stream,
        })
    }

    /// True once some attempt has started reading the body.
    pub fn is_consumed(&self) -> bool {
        matches!(*self.lock(), SlotState::Taken)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for BodySlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodySlot")
            .field("consumed", &self.is_consumed())
            .finish()
    }
}

struct LazyBody {
    slot: Arc<Mutex<SlotState>>,
    inner: Option<Body>,
    size_hint: SizeHint,
    end_stream: bool,
}

impl HttpBody for LazyBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        if self.inner.is_none() {
            let taken = {
                let mut state = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
                std::mem::replace(&mut *state, SlotState::Taken)
            };
            match taken {
                SlotState::Ready(body) => self.inner = Some(body),
                SlotState::Taken => {
                    return Poll::Ready(Some(Err(axum::Error::new(
                        "request body already consumed by an earlier attempt",
                    ))))
                }
            }
        }

        match self.inner.as_mut() {
            Some(body) => Pin::new(body).poll_frame(cx),
            None => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.inner {
            Some(body) => body.is_end_stream(),
            None => self.end_stream,
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.inner {
            Some(body) => body.size_hint(),
            None => self.size_hint.clone(),
        }
    }
}

/// Response body that releases its target's attempt slot when dropped.
pub struct GuardedBody {
    inner: Body,
    _guard: AttemptGuard,
}

impl GuardedBody {
    pub fn new(inner: Body, guard: AttemptGuard) -> Self {
        Self {
            inner,
            _guard: guard,
        }
    }
}

impl HttpBody for GuardedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.inner).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::target::tests::target;

    #[tokio::test]
    async fn untouched_body_survives_for_next_attempt() {
        let slot = BodySlot::new(Body::from("payload"));

        let first = slot.attempt_body();
        drop(first);
        assert!(!slot.is_consumed());

        let second = slot.attempt_body();
        let bytes = axum::body::to_bytes(second, usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"payload");
        assert!(slot.is_consumed());
    }

    #[tokio::test]
    async fn second_reader_gets_an_error() {
        let slot = BodySlot::new(Body::from("payload"));
        axum::body::to_bytes(slot.attempt_body(), usize::MAX)
            .await
            .unwrap();

        let again = axum::body::to_bytes(slot.attempt_body(), usize::MAX).await;
        assert!(again.is_err());
    }

    #[test]
    fn size_hint_is_forwarded_before_first_poll() {
        let slot = BodySlot::new(Body::from("12345"));
        let body = slot.attempt_body();
        assert_eq!(body.size_hint().exact(), Some(5));
        assert!(!slot.is_consumed());

        let empty = BodySlot::new(Body::empty()).attempt_body();
        assert!(empty.is_end_stream());
    }

    #[tokio::test]
    async fn guarded_body_releases_slot_after_streaming() {
        let t = target("http://127.0.0.1:1");
        let guard = t.try_acquire().unwrap();
        assert_eq!(t.active_attempts(), 1);

        let body = Body::new(GuardedBody::new(Body::from("abc"), guard));
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"abc");
        assert_eq!(t.active_attempts(), 0);
    }
}
