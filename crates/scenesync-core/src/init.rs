//! Bounded-retry drawing surface initialization.

use crate::surface::SurfaceError;
use crate::time::{Duration, Instant};

/// Shown when the surface never came up.
pub const INIT_FAILED_MESSAGE: &str = "Canvas failed to initialize. Please refresh the page.";

/// Retry schedule for mounting the surface.
#[derive(Debug, Clone, PartialEq)]
pub struct InitConfig {
    /// Delay before the first attempt.
    pub first_attempt: Duration,
    /// Delay before retrying when the host element is missing.
    pub retry_delay: Duration,
    /// Delay before retrying after any other mount error.
    pub error_retry_delay: Duration,
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Deadline, measured from start, after which initialization has failed.
    pub timeout: Duration,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            first_attempt: Duration::from_millis(100),
            retry_delay: Duration::from_millis(500),
            error_retry_delay: Duration::from_millis(1000),
            max_retries: 5,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Where initialization stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    /// Waiting for the first attempt.
    Pending,
    /// The n-th retry is scheduled or running.
    Retrying(u32),
    Ready,
    Failed,
}

/// Drives surface mounting from the frame loop.
///
/// Call [`attempt_due`](Self::attempt_due) every tick; when it returns true,
/// try to mount and report the outcome with [`succeeded`](Self::succeeded) or
/// [`failed`](Self::failed). Once retries are exhausted nothing more is
/// attempted and the state turns `Failed` when the deadline passes.
#[derive(Debug, Clone)]
pub struct SurfaceInit {
    config: InitConfig,
    state: InitState,
    deadline: Instant,
    next_attempt: Option<Instant>,
    retries: u32,
    last_error: Option<String>,
}

impl SurfaceInit {
    pub fn new(config: InitConfig, now: Instant) -> Self {
        Self {
            deadline: now + config.timeout,
            next_attempt: Some(now + config.first_attempt),
            config,
            state: InitState::Pending,
            retries: 0,
            last_error: None,
        }
    }

    pub fn state(&self) -> InitState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == InitState::Ready
    }

    pub fn is_failed(&self) -> bool {
        self.state == InitState::Failed
    }

    /// Last mount error seen.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Blocking error to show, once initialization has failed.
    pub fn error_message(&self) -> Option<&'static str> {
        self.is_failed().then_some(INIT_FAILED_MESSAGE)
    }

    /// Whether a mount attempt should be made now. Also applies the deadline.
    pub fn attempt_due(&mut self, now: Instant) -> bool {
        match self.state {
            InitState::Ready | InitState::Failed => return false,
            InitState::Pending | InitState::Retrying(_) => {}
        }
        if now >= self.deadline {
            log::error!("{}", INIT_FAILED_MESSAGE);
            self.state = InitState::Failed;
            self.next_attempt = None;
            return false;
        }
        match self.next_attempt {
            Some(at) if at <= now => {
                self.next_attempt = None;
                true
            }
            _ => false,
        }
    }

    /// The attempt mounted the surface.
    pub fn succeeded(&mut self) {
        if self.state == InitState::Failed {
            return;
        }
        log::info!("Canvas initialized after {} retries", self.retries);
        self.state = InitState::Ready;
        self.next_attempt = None;
        self.last_error = None;
    }

    /// The attempt failed; schedule a retry if any remain.
    pub fn failed(&mut self, error: &SurfaceError, now: Instant) {
        if matches!(self.state, InitState::Ready | InitState::Failed) {
            return;
        }
        self.last_error = Some(error.to_string());
        if self.retries >= self.config.max_retries {
            log::warn!("Canvas initialization gave up: {}", error);
            self.next_attempt = None;
            return;
        }
        self.retries += 1;
        let delay = match error {
            SurfaceError::HostMissing => self.config.retry_delay,
            _ => self.config.error_retry_delay,
        };
        log::debug!(
            "Canvas init failed ({}), retry {}/{}",
            error,
            self.retries,
            self.config.max_retries
        );
        self.state = InitState::Retrying(self.retries);
        self.next_attempt = Some(now + delay);
    }
}
