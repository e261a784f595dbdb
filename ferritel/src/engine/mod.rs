//! Expect engine: matches received lines against queued requests.
//!
//! The engine is plain synchronous state. The session task feeds it lines,
//! new requests and timer ticks one at a time, which is what makes each
//! resolution (pop head, clear buffer, cancel timer, arm next timer) atomic
//! with respect to every other event.
//!
//! Rules:
//! - Only the queue head is matched; requests resolve strictly in call order.
//! - Only the head has an armed timer. The next request's timeout window
//!   starts when it becomes head, not when it was queued.
//! - A timeout resolves the head with the buffered lines instead of failing.

mod line_buffer;
mod output;
mod queue;
mod timer;

pub use line_buffer::LineBuffer;
pub use output::ExpectOutput;
pub use queue::{ExpectQueue, ExpectRequest, RequestId, Resolver};
pub use timer::{ArmedTimer, TimerService};

use std::time::Duration;

use log::{debug, error, trace};
use regex::Regex;
use tokio::time::Instant;

use crate::error::ConnectionError;

/// Deadline used when the requested timeout does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

fn deadline_after(now: Instant, timeout: Duration) -> Instant {
    now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE)
}

/// How `ExpectEngine::expect` handled a new request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Already-buffered output matched; the request resolved on the spot.
    Immediate,

    /// Queued. `head` is true when its timer was armed right away.
    Queued { id: RequestId, head: bool },
}

/// Line buffer, expect queue and timer of a single session.
#[derive(Debug, Default)]
pub struct ExpectEngine {
    buffer: LineBuffer,
    queue: ExpectQueue,
    timer: TimerService,
    next_id: RequestId,
}

impl ExpectEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit a request for the next output matching `pattern`.
    ///
    /// With nothing else queued, the buffered lines are checked first. A hit
    /// resolves the request immediately, clears the buffer and arms no
    /// timer.
    pub fn expect(
        &mut self,
        pattern: Regex,
        timeout: Duration,
        resolver: Resolver,
        now: Instant,
    ) -> Submission {
        let id = self.next_id;
        self.next_id += 1;
        let mut request = ExpectRequest::new(id, pattern, timeout, resolver, now);

        if !self.queue.is_empty() {
            trace!(
                "expect {:?} queued behind {} request(s)",
                request.pattern().as_str(),
                self.queue.len()
            );
            self.queue.push_back(request);
            return Submission::Queued { id, head: false };
        }

        if let Some(text) = self.buffer.take_through_match(request.pattern()) {
            debug!("expect {:?} matched buffered output", request.pattern().as_str());
            let output = ExpectOutput::matched(request.pattern().as_str(), text, Duration::ZERO);
            request.resolve(output);
            return Submission::Immediate;
        }

        self.timer.arm(id, deadline_after(now, timeout));
        self.queue.push_back(request);
        Submission::Queued { id, head: true }
    }

    /// Handle one line received in line mode.
    pub fn on_line(&mut self, line: String, now: Instant) {
        let match_end = self
            .queue
            .head()
            .and_then(|head| head.pattern().find(&line))
            .map(|m| m.end());

        let Some(end) = match_end else {
            self.buffer.push(line);
            return;
        };
        let Some(mut request) = self.queue.pop_front() else {
            self.buffer.push(line);
            return;
        };

        let text = self.buffer.take_with(&line, end);
        self.timer.cancel(request.id());
        debug!(
            "expect {:?} matched line {:?}",
            request.pattern().as_str(),
            line
        );
        let output = ExpectOutput::matched(
            request.pattern().as_str(),
            text,
            now.saturating_duration_since(request.enqueued_at()),
        );
        request.resolve(output);
        self.arm_head(now);
    }

    /// Fire the armed timer if its deadline has passed.
    pub fn on_timer(&mut self, now: Instant) {
        let Some(id) = self.timer.take_expired(now) else {
            return;
        };

        if self.queue.head().map(ExpectRequest::id) != Some(id) {
            error!("timer fired for expect request {} which is no longer pending", id);
            return;
        }
        let Some(mut request) = self.queue.pop_front() else {
            return;
        };

        let text = self.buffer.take_joined();
        debug!(
            "expect {:?} timed out after {:?}, returning {} bytes of partial output",
            request.pattern().as_str(),
            request.timeout(),
            text.len()
        );
        let output = ExpectOutput::timed_out(
            request.pattern().as_str(),
            text,
            now.saturating_duration_since(request.enqueued_at()),
        );
        request.resolve(output);
        self.arm_head(now);
    }

    /// Reject every queued request with `ConnectionError::Lost`.
    ///
    /// Returns how many callers were notified.
    pub fn purge(&mut self, reason: &str) -> usize {
        self.timer.cancel_all();
        let mut notified = 0;
        for mut request in self.queue.drain() {
            if request.cancel(ConnectionError::lost(reason).into()) {
                notified += 1;
            }
        }
        if notified > 0 {
            debug!("rejected {} pending expect request(s): {}", notified, reason);
        }
        notified
    }

    /// Discard all buffered lines.
    pub fn clear_buffer(&mut self) {
        self.buffer.clear();
    }

    /// Deadline of the armed timer, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    pub fn armed(&self) -> Option<ArmedTimer> {
        self.timer.armed()
    }

    /// Number of queued requests.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn buffered(&self) -> &LineBuffer {
        &self.buffer
    }

    /// Start the timeout window of the new head, skipping requests whose
    /// callers have gone away.
    fn arm_head(&mut self, now: Instant) {
        loop {
            let (id, timeout, abandoned) = match self.queue.head() {
                Some(head) => (head.id(), head.timeout(), head.is_abandoned()),
                None => return,
            };

            if abandoned {
                if let Some(mut request) = self.queue.pop_front() {
                    debug!("dropping expect request {}: caller went away", id);
                    request.abandon();
                }
                continue;
            }

            self.timer.arm(id, deadline_after(now, timeout));
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::oneshot;

    use super::*;
    use crate::error::{Error, Result};

    type Rx = oneshot::Receiver<Result<ExpectOutput>>;

    fn expect(engine: &mut ExpectEngine, pattern: &str, secs: u64, now: Instant) -> (Submission, Rx) {
        let (tx, rx) = oneshot::channel();
        let submission = engine.expect(
            Regex::new(pattern).unwrap(),
            Duration::from_secs(secs),
            tx,
            now,
        );
        (submission, rx)
    }

    fn text(rx: &mut Rx) -> ExpectOutput {
        rx.try_recv().expect("resolved").expect("ok")
    }

    fn line(engine: &mut ExpectEngine, line: &str, now: Instant) {
        engine.on_line(line.to_string(), now);
    }

    #[test]
    fn test_immediate_match_from_buffer() {
        let now = Instant::now();
        let mut engine = ExpectEngine::new();
        line(&mut engine, "foo", now);
        line(&mut engine, "bar123", now);

        let (submission, mut rx) = expect(&mut engine, r"\d+", 5, now);

        assert_eq!(submission, Submission::Immediate);
        let out = text(&mut rx);
        assert_eq!(out.text, "foo\nbar123");
        assert!(out.matched);
        assert!(engine.buffered().is_empty());
        assert_eq!(engine.pending(), 0);
        assert_eq!(engine.next_deadline(), None);
    }

    #[test]
    fn test_immediate_match_clears_following_lines() {
        let now = Instant::now();
        let mut engine = ExpectEngine::new();
        line(&mut engine, "a1", now);
        line(&mut engine, "b", now);

        let (submission, mut rx) = expect(&mut engine, r"\d", 5, now);

        assert_eq!(submission, Submission::Immediate);
        assert_eq!(text(&mut rx).text, "a1");
        assert!(engine.buffered().is_empty());

        // "b" is gone, so the next request waits for fresh output
        let (submission, _rx) = expect(&mut engine, "b", 5, now);
        assert_eq!(submission, Submission::Queued { id: 1, head: true });
    }

    #[test]
    fn test_line_match_resolves_head() {
        let now = Instant::now();
        let mut engine = ExpectEngine::new();

        let (submission, mut rx) = expect(&mut engine, "Linux", 5, now);
        assert_eq!(submission, Submission::Queued { id: 0, head: true });
        assert_eq!(engine.next_deadline(), Some(now + Duration::from_secs(5)));

        line(&mut engine, "uname -a", now);
        assert!(rx.try_recv().is_err());

        let later = now + Duration::from_secs(1);
        line(&mut engine, "Linux host 6.1.0 x86_64", later);

        let out = text(&mut rx);
        assert_eq!(out.text, "uname -a\nLinux");
        assert_eq!(out.elapsed, Duration::from_secs(1));
        assert!(engine.buffered().is_empty());
        assert_eq!(engine.next_deadline(), None);
    }

    #[test]
    fn test_fifo_only_head_is_matched() {
        let now = Instant::now();
        let mut engine = ExpectEngine::new();

        let (_, mut first) = expect(&mut engine, "one", 5, now);
        let (second_submission, mut second) = expect(&mut engine, "two", 5, now);
        assert_eq!(second_submission, Submission::Queued { id: 1, head: false });

        // Matches the second pattern, but the head is still waiting
        line(&mut engine, "two", now);
        assert!(second.try_recv().is_err());
        assert_eq!(engine.buffered().len(), 1);

        line(&mut engine, "one", now);
        assert_eq!(text(&mut first).text, "two\none");
        assert!(second.try_recv().is_err());

        line(&mut engine, "two again", now);
        assert_eq!(text(&mut second).text, "two");
        assert_eq!(engine.pending(), 0);
    }

    #[test]
    fn test_timeout_window_starts_at_head() {
        let start = Instant::now();
        let mut engine = ExpectEngine::new();

        let (_, mut a) = expect(&mut engine, "A", 5, start);
        let (_, _b) = expect(&mut engine, "B", 1, start);
        assert_eq!(engine.next_deadline(), Some(start + Duration::from_secs(5)));

        // B would have expired by now if its window started at enqueue time
        let t3 = start + Duration::from_secs(3);
        engine.on_timer(t3);
        line(&mut engine, "A", t3);

        assert!(text(&mut a).matched);
        let armed = engine.armed().unwrap();
        assert_eq!(armed.request, 1);
        assert_eq!(armed.deadline, t3 + Duration::from_secs(1));
    }

    #[test]
    fn test_huge_timeout_does_not_overflow() {
        let start = Instant::now();
        let mut engine = ExpectEngine::new();

        let (tx, mut a) = oneshot::channel();
        engine.expect(Regex::new("A").unwrap(), Duration::MAX, tx, start);
        let (tx, mut b) = oneshot::channel();
        engine.expect(Regex::new("B").unwrap(), Duration::MAX, tx, start);

        let deadline = engine.next_deadline().unwrap();
        assert!(deadline > start + Duration::from_secs(86400 * 365));

        // The second request is armed the same way once it becomes head
        line(&mut engine, "A", start);
        assert!(text(&mut a).matched);
        assert_eq!(engine.armed().map(|t| t.request), Some(1));
        assert!(engine.next_deadline().unwrap() > start);

        line(&mut engine, "B", start);
        assert!(text(&mut b).matched);
    }

    #[test]
    fn test_timeout_returns_partial_output() {
        let start = Instant::now();
        let mut engine = ExpectEngine::new();

        let (_, mut rx) = expect(&mut engine, "NOMATCH", 1, start);
        line(&mut engine, "only", start);
        line(&mut engine, "this", start);

        engine.on_timer(start + Duration::from_millis(999));
        assert!(rx.try_recv().is_err());

        engine.on_timer(start + Duration::from_secs(1));
        let out = text(&mut rx);
        assert_eq!(out.text, "only\nthis");
        assert!(!out.matched);
        assert!(engine.buffered().is_empty());
        assert_eq!(engine.pending(), 0);
    }

    #[test]
    fn test_timeout_arms_next_request() {
        let start = Instant::now();
        let mut engine = ExpectEngine::new();

        let (_, mut a) = expect(&mut engine, "A", 1, start);
        let (_, mut b) = expect(&mut engine, "B", 2, start);

        let t1 = start + Duration::from_secs(1);
        engine.on_timer(t1);
        assert!(!text(&mut a).matched);
        assert_eq!(engine.next_deadline(), Some(t1 + Duration::from_secs(2)));

        line(&mut engine, "B", t1);
        assert!(text(&mut b).matched);
    }

    #[test]
    fn test_match_and_timer_in_same_tick() {
        let start = Instant::now();
        let mut engine = ExpectEngine::new();

        let (_, mut rx) = expect(&mut engine, "done", 1, start);
        let deadline = start + Duration::from_secs(1);

        line(&mut engine, "done", deadline);
        engine.on_timer(deadline);

        let out = text(&mut rx);
        assert!(out.matched);
        assert_eq!(out.text, "done");
        assert_eq!(engine.next_deadline(), None);
    }

    #[test]
    fn test_purge_rejects_pending() {
        let start = Instant::now();
        let mut engine = ExpectEngine::new();

        let (_, mut a) = expect(&mut engine, "A", 5, start);
        let (_, mut b) = expect(&mut engine, "B", 5, start);

        assert_eq!(engine.purge("connection reset"), 2);
        assert_eq!(engine.pending(), 0);
        assert_eq!(engine.next_deadline(), None);

        for rx in [&mut a, &mut b] {
            match rx.try_recv().unwrap() {
                Err(Error::Connection(ConnectionError::Lost { reason })) => {
                    assert_eq!(reason, "connection reset")
                }
                other => panic!("expected connection lost, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_abandoned_request_skipped() {
        let start = Instant::now();
        let mut engine = ExpectEngine::new();

        let (_, mut a) = expect(&mut engine, "A", 5, start);
        let (_, b) = expect(&mut engine, "B", 5, start);
        let (_, mut c) = expect(&mut engine, "C", 5, start);
        drop(b);

        line(&mut engine, "A", start);
        assert!(text(&mut a).matched);
        assert_eq!(engine.armed().map(|t| t.request), Some(2));

        line(&mut engine, "C", start);
        assert!(text(&mut c).matched);
    }

    #[test]
    fn test_unmatched_lines_buffer_without_requests() {
        let now = Instant::now();
        let mut engine = ExpectEngine::new();
        line(&mut engine, "motd", now);
        line(&mut engine, "$ ", now);
        assert_eq!(engine.buffered().len(), 2);

        engine.clear_buffer();
        assert!(engine.buffered().is_empty());
    }
}
