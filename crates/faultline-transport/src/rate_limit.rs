//! Client-side submission rate limiting
//!
//! A fixed-window counter: at most `max_per_window` submissions are allowed
//! per window, and the window restarts on the first acquisition after it
//! has elapsed. Rejections are purely local; a rejected submission never
//! reaches the network.
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//! use faultline_transport::rate_limit::{RateLimitDecision, RateLimiter};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let limiter = RateLimiter::new(2, Duration::from_secs(60));
//! assert_eq!(limiter.try_acquire(), RateLimitDecision::Acquired);
//! assert_eq!(limiter.try_acquire(), RateLimitDecision::Acquired);
//! assert!(matches!(limiter.try_acquire(), RateLimitDecision::Rejected { .. }));
//! # }
//! ```

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

/// Default window length
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Result of [`RateLimiter::try_acquire`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// A slot was taken; the submission may proceed
    Acquired,
    /// The window is exhausted
    Rejected {
        /// Time until the current window ends
        retry_after: Duration,
    },
}

impl RateLimitDecision {
    pub fn is_acquired(&self) -> bool {
        matches!(self, RateLimitDecision::Acquired)
    }
}

/// Internal mutable state, protected by a Mutex.
#[derive(Debug)]
struct WindowState {
    /// Submissions acquired in the current window
    count: u32,
    /// Start of the current window
    window_start: Instant,
}

/// Fixed-window submission limiter
///
/// One instance belongs to one client and is shared by reference between
/// the send path and the retry coordinator.
#[derive(Debug)]
pub struct RateLimiter {
    /// `0` means unlimited
    max_per_window: u32,
    window: Duration,
    state: Mutex<WindowState>,
}

impl RateLimiter {
    /// Creates a limiter allowing `max_per_window` submissions per `window`.
    /// `max_per_window == 0` disables limiting.
    pub fn new(max_per_window: u32, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            state: Mutex::new(WindowState {
                count: 0,
                window_start: Instant::now(),
            }),
        }
    }

    /// `reports_per_minute` over the default one-minute window
    pub fn per_minute(reports_per_minute: u32) -> Self {
        Self::new(reports_per_minute, DEFAULT_WINDOW)
    }

    /// A limiter that never rejects
    pub fn unlimited() -> Self {
        Self::new(0, DEFAULT_WINDOW)
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_per_window == 0
    }

    pub fn max_per_window(&self) -> u32 {
        self.max_per_window
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn roll_window(&self, state: &mut WindowState, now: Instant) {
        if now.duration_since(state.window_start) >= self.window {
            if state.count > 0 {
                debug!(previous = state.count, "Rate limit window reset");
            }
            state.window_start = now;
            state.count = 0;
        }
    }

    /// Takes one submission slot if the current window has room.
    pub fn try_acquire(&self) -> RateLimitDecision {
        if self.is_unlimited() {
            return RateLimitDecision::Acquired;
        }

        let now = Instant::now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.roll_window(&mut state, now);

        if state.count >= self.max_per_window {
            let elapsed = now.duration_since(state.window_start);
            let retry_after = self.window.saturating_sub(elapsed);
            warn!(
                limit = self.max_per_window,
                retry_after_ms = retry_after.as_millis() as u64,
                "Report rate limit reached"
            );
            return RateLimitDecision::Rejected { retry_after };
        }

        state.count += 1;
        RateLimitDecision::Acquired
    }

    /// Slots left in the current window; `None` when unlimited.
    pub fn remaining(&self) -> Option<u32> {
        if self.is_unlimited() {
            return None;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.roll_window(&mut state, Instant::now());
        Some(self.max_per_window.saturating_sub(state.count))
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::unlimited()
    }
}
