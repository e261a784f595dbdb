//! Pending expect requests in call order.

use std::collections::VecDeque;
use std::time::Duration;

use log::{debug, error};
use regex::Regex;
use tokio::sync::oneshot;
use tokio::time::Instant;

use super::output::ExpectOutput;
use crate::error::{Error, Result};

/// Sequence number of an expect request, in call order.
pub type RequestId = u64;

/// Sending side of an expect request's result.
pub type Resolver = oneshot::Sender<Result<ExpectOutput>>;

/// Lifecycle of an expect request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Waiting for a match or timeout.
    Pending,

    /// Delivered output (match or timeout).
    Resolved,

    /// Rejected with an error or abandoned by its caller.
    Cancelled,
}

/// A caller waiting for a line matching `pattern`.
#[derive(Debug)]
pub struct ExpectRequest {
    id: RequestId,
    pattern: Regex,
    timeout: Duration,
    enqueued_at: Instant,
    resolver: Option<Resolver>,
    state: RequestState,
}

impl ExpectRequest {
    pub fn new(
        id: RequestId,
        pattern: Regex,
        timeout: Duration,
        resolver: Resolver,
        now: Instant,
    ) -> Self {
        Self {
            id,
            pattern,
            timeout,
            enqueued_at: now,
            resolver: Some(resolver),
            state: RequestState::Pending,
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn enqueued_at(&self) -> Instant {
        self.enqueued_at
    }

    /// Whether nobody is waiting for the result any more.
    pub fn is_abandoned(&self) -> bool {
        self.resolver
            .as_ref()
            .is_none_or(|resolver| resolver.is_closed())
    }

    /// Deliver output. A second resolution is logged and ignored.
    pub fn resolve(&mut self, output: ExpectOutput) -> bool {
        self.complete(Ok(output), RequestState::Resolved)
    }

    /// Deliver an error. A request already resolved is left alone.
    pub fn cancel(&mut self, error: Error) -> bool {
        self.complete(Err(error), RequestState::Cancelled)
    }

    /// Drop the request without delivering anything.
    pub fn abandon(&mut self) {
        self.resolver = None;
        self.state = RequestState::Cancelled;
    }

    fn complete(&mut self, result: Result<ExpectOutput>, state: RequestState) -> bool {
        let Some(resolver) = self.resolver.take() else {
            error!(
                "expect request {} for {:?} is already {:?}; ignoring second resolution",
                self.id,
                self.pattern.as_str(),
                self.state
            );
            return false;
        };

        self.state = state;
        if resolver.send(result).is_err() {
            debug!("expect request {} resolved after its caller went away", self.id);
        }
        true
    }
}

/// FIFO of expect requests. Only the head is ever matched against.
#[derive(Debug, Default)]
pub struct ExpectQueue {
    requests: VecDeque<ExpectRequest>,
}

impl ExpectQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&mut self, request: ExpectRequest) {
        self.requests.push_back(request);
    }

    pub fn pop_front(&mut self) -> Option<ExpectRequest> {
        self.requests.pop_front()
    }

    pub fn head(&self) -> Option<&ExpectRequest> {
        self.requests.front()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Remove every request, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = ExpectRequest> + '_ {
        self.requests.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectionError;

    fn request(id: RequestId) -> (ExpectRequest, oneshot::Receiver<Result<ExpectOutput>>) {
        let (tx, rx) = oneshot::channel();
        let request = ExpectRequest::new(
            id,
            Regex::new("x").unwrap(),
            Duration::from_secs(1),
            tx,
            Instant::now(),
        );
        (request, rx)
    }

    #[test]
    fn test_second_resolution_ignored() {
        let (mut req, mut rx) = request(1);
        let output = ExpectOutput::matched("x", "x", Duration::ZERO);

        assert!(req.resolve(output.clone()));
        assert_eq!(req.state, RequestState::Resolved);
        assert!(!req.resolve(output.clone()));
        assert!(!req.cancel(ConnectionError::lost("gone").into()));
        assert_eq!(req.state, RequestState::Resolved);

        assert_eq!(rx.try_recv().unwrap().unwrap(), output);
    }

    #[test]
    fn test_abandoned_when_receiver_dropped() {
        let (req, rx) = request(1);
        assert!(!req.is_abandoned());
        drop(rx);
        assert!(req.is_abandoned());
    }

    #[test]
    fn test_queue_fifo() {
        let mut queue = ExpectQueue::new();
        let (a, _rx_a) = request(1);
        let (b, _rx_b) = request(2);
        queue.push_back(a);
        queue.push_back(b);

        assert_eq!(queue.head().map(ExpectRequest::id), Some(1));
        assert_eq!(queue.pop_front().map(|r| r.id()), Some(1));
        assert_eq!(queue.head().map(ExpectRequest::id), Some(2));
        assert_eq!(queue.drain().count(), 1);
        assert!(queue.is_empty());
    }
}
