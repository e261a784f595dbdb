//! Timer service for the queue head.
//!
//! Holds at most one armed deadline. The session loop sleeps until that
//! deadline and then asks the engine to fire it; cancelling is a plain
//! state change, so a timer cancelled while handling a line can never fire
//! afterwards.

use log::{error, trace};
use tokio::time::Instant;

use super::queue::RequestId;

/// An armed deadline for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmedTimer {
    pub request: RequestId,
    pub deadline: Instant,
}

#[derive(Debug, Default)]
pub struct TimerService {
    armed: Option<ArmedTimer>,
}

impl TimerService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer for `request`.
    pub fn arm(&mut self, request: RequestId, deadline: Instant) {
        if let Some(previous) = self.armed {
            error!(
                "arming timer for request {} while request {} is still armed",
                request, previous.request
            );
        }
        trace!("timer armed for request {}", request);
        self.armed = Some(ArmedTimer { request, deadline });
    }

    /// Cancel the timer if it is armed for `request`.
    ///
    /// Returns whether anything was cancelled.
    pub fn cancel(&mut self, request: RequestId) -> bool {
        match self.armed {
            Some(armed) if armed.request == request => {
                self.armed = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel_all(&mut self) {
        self.armed = None;
    }

    pub fn armed(&self) -> Option<ArmedTimer> {
        self.armed
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.armed.map(|armed| armed.deadline)
    }

    /// Disarm and return the request whose deadline has passed.
    pub fn take_expired(&mut self, now: Instant) -> Option<RequestId> {
        match self.armed {
            Some(armed) if armed.deadline <= now => {
                self.armed = None;
                Some(armed.request)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_expiry() {
        let start = Instant::now();
        let mut timer = TimerService::new();
        timer.arm(7, start + Duration::from_secs(1));

        assert_eq!(timer.take_expired(start), None);
        assert_eq!(timer.take_expired(start + Duration::from_secs(1)), Some(7));
        assert_eq!(timer.take_expired(start + Duration::from_secs(2)), None);
    }

    #[test]
    fn test_cancel_only_matching_request() {
        let start = Instant::now();
        let mut timer = TimerService::new();
        timer.arm(1, start);

        assert!(!timer.cancel(2));
        assert!(timer.armed().is_some());
        assert!(timer.cancel(1));
        assert!(!timer.cancel(1));
        assert_eq!(timer.deadline(), None);
    }
}
