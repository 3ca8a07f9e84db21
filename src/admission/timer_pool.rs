//! Reusable deadline timers.
//!
//! Queued requests each need a timer for their queue deadline. Under
//! sustained overload that is one allocation per request; the pool keeps
//! idle `Sleep` entries around and resets them on lease instead.
//!
//! A `TimerHandle` goes back to the pool when dropped, so every exit path
//! of a wait returns it.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Instant, Sleep};

/// Upper bound on idle timers kept for reuse.
pub const DEFAULT_MAX_IDLE: usize = 64;

/// Pool of uniform deadline timers.
#[derive(Debug)]
pub struct TimerPool {
    idle: Mutex<Vec<Pin<Box<Sleep>>>>,
    max_idle: usize,
    leased: AtomicUsize,
}

impl TimerPool {
    pub fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_idle,
            leased: AtomicUsize::new(0),
        }
    }

    /// Lease a timer that fires `duration` from now.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn lease(&self, duration: Duration) -> TimerHandle<'_> {
        let deadline = Instant::now() + duration;
        let reused = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        let sleep = match reused {
            Some(mut sleep) => {
                sleep.as_mut().reset(deadline);
                sleep
            }
            None => Box::pin(tokio::time::sleep_until(deadline)),
        };

        self.leased.fetch_add(1, Ordering::Relaxed);
        TimerHandle {
            sleep: Some(sleep),
            pool: self,
        }
    }

    /// Number of timers currently leased out.
    pub fn leased(&self) -> usize {
        self.leased.load(Ordering::Relaxed)
    }

    /// Number of idle timers ready for reuse.
    pub fn idle(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn give_back(&self, sleep: Pin<Box<Sleep>>) {
        self.leased.fetch_sub(1, Ordering::Relaxed);
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.max_idle {
            idle.push(sleep);
        }
    }
}

impl Default for TimerPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IDLE)
    }
}

/// A leased timer. Resolves when its deadline passes; returns to the pool on drop.
#[derive(Debug)]
pub struct TimerHandle<'a> {
    sleep: Option<Pin<Box<Sleep>>>,
    pool: &'a TimerPool,
}

impl TimerHandle<'_> {
    /// Instant at which this timer fires.
    pub fn deadline(&self) -> Option<Instant> {
        self.sleep.as_ref().map(|sleep| sleep.deadline())
    }
}

impl Future for TimerHandle<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        match self.get_mut().sleep.as_mut() {
            Some(sleep) => sleep.as_mut().poll(cx),
            None => Poll::Ready(()),
        }
    }
}

impl Drop for TimerHandle<'_> {
    fn drop(&mut self) {
        if let Some(sleep) = self.sleep.take() {
            self.pool.give_back(sleep);
        }
    }
}
