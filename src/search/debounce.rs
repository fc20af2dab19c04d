use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Instant, Sleep, sleep};

/// Single resettable deadline. Rearming moves the existing deadline instead of
/// queueing a second one, so at most one fire is ever pending.
#[derive(Debug)]
pub(crate) struct Debouncer {
    window: Duration,
    deadline: Option<Pin<Box<Sleep>>>,
}

impl Debouncer {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub(crate) fn arm(&mut self) {
        let at = Instant::now() + self.window;
        match self.deadline.as_mut() {
            Some(deadline) => deadline.as_mut().reset(at),
            None => self.deadline = Some(Box::pin(sleep(self.window))),
        }
    }

    pub(crate) fn cancel(&mut self) {
        self.deadline = None;
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Resolves when the armed deadline elapses, leaving the debouncer idle.
    /// Pends forever while idle. Dropping the future keeps the deadline armed.
    pub(crate) async fn fired(&mut self) {
        match self.deadline.as_mut() {
            Some(deadline) => {
                deadline.as_mut().await;
                self.deadline = None;
            }
            None => std::future::pending().await,
        }
    }
}
