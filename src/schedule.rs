//! Fixed-rate tick scheduling without catch-up.

use std::time::{Duration, Instant};

/// Paces ticks at a fixed interval on the calling thread.
///
/// The first tick is due immediately. Each later deadline is the previous one
/// plus `interval`. When a tick overruns, the next one starts at once and the
/// schedule restarts from that moment, so missed ticks are never replayed.
#[derive(Debug)]
pub struct TickScheduler {
    interval: Duration,
    next_deadline: Option<Instant>,
    overruns: u64,
}

impl TickScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_deadline: None,
            overruns: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of ticks that started late because the previous one overran.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Block until the next tick is due and return its start time.
    pub fn wait_for_next_tick(&mut self) -> Instant {
        let now = Instant::now();
        let start = match self.next_deadline {
            None => now,
            Some(deadline) if deadline > now => {
                std::thread::sleep(deadline - now);
                deadline
            }
            Some(deadline) => {
                if now > deadline {
                    self.overruns += 1;
                    log::debug!(
                        "tick overran its slot by {:?}; starting next tick now",
                        now - deadline
                    );
                }
                now
            }
        };
        self.next_deadline = Some(start + self.interval);
        start
    }
}
