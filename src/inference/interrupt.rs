//! Cooperative cancellation of a bucket tree reduction.
//!
//! A reduction checks its `Interrupt` before each bucket. Stopping between buckets leaves every
//! factor intact; the partially reduced tree is discarded by the caller.

use std::time::{Duration, Instant};


/// Decides whether a running reduction should stop
pub trait Interrupt {

    /// Called before bucket `bucket` (zero based) of `total` is reduced
    fn should_interrupt(&self, bucket: usize, total: usize) -> bool;

}

impl<F> Interrupt for F where F: Fn(usize, usize) -> bool {

    fn should_interrupt(&self, bucket: usize, total: usize) -> bool {
        self(bucket, total)
    }

}


/// Never interrupts
#[derive(Clone, Copy, Debug, Default)]
pub struct Never;

impl Interrupt for Never {

    fn should_interrupt(&self, _bucket: usize, _total: usize) -> bool {
        false
    }

}


/// Interrupts once a point in time has passed
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    at: Instant
}

impl Deadline {

    /// A deadline `budget` from now
    pub fn after(budget: Duration) -> Self {
        Deadline { at: Instant::now() + budget }
    }

    pub fn at(at: Instant) -> Self {
        Deadline { at }
    }

}

impl Interrupt for Deadline {

    fn should_interrupt(&self, _bucket: usize, _total: usize) -> bool {
        Instant::now() >= self.at
    }

}
