//! Wall clock abstraction and the logical play clock
//!
//! The play clock runs `play_delay` milliseconds behind the wall clock. In
//! real-time mode the delay is the observed lag of the newest data; in
//! playback mode it is the distance between now and the chosen start time.

use crate::models::Millis;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Source of wall-clock time in milliseconds since the Unix epoch
pub trait WallClock: Send + Sync + Debug {
    fn now_ms(&self) -> Millis;
}

/// The host clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now_ms(&self) -> Millis {
        chrono::Utc::now().timestamp_micros() as f64 / 1000.0
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: Millis) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(start.to_bits())),
        }
    }

    pub fn set(&self, now: Millis) {
        self.bits.store(now.to_bits(), Ordering::SeqCst);
    }

    pub fn advance(&self, delta: Millis) {
        self.set(self.now_ms() + delta);
    }
}

impl WallClock for ManualClock {
    fn now_ms(&self) -> Millis {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}

#[derive(Debug, Clone)]
pub struct PlayClock {
    wall: Arc<dyn WallClock>,
    play_delay: Millis,
}

impl PlayClock {
    pub fn new(wall: Arc<dyn WallClock>) -> Self {
        Self {
            wall,
            play_delay: 0.0,
        }
    }

    pub fn wall_now(&self) -> Millis {
        self.wall.now_ms()
    }

    /// Logical play time
    pub fn now(&self) -> Millis {
        self.wall_now() - self.play_delay
    }

    pub fn play_delay(&self) -> Millis {
        self.play_delay
    }

    /// Set the delay; non-finite values fall back to zero
    pub fn set_play_delay(&mut self, delay: Millis) {
        self.play_delay = if delay.is_finite() { delay } else { 0.0 };
    }

    /// Align the clock when a mode is entered.
    ///
    /// An explicit start outside real-time puts the play time there; otherwise
    /// the clock lines up with the newest known data, or the wall clock.
    pub fn establish(&mut self, start: Option<Millis>, realtime: bool, newest: Option<Millis>) {
        let wall = self.wall_now();
        let delay = match (start.filter(|t| *t != 0.0), newest) {
            (Some(start), _) if !realtime => wall - start,
            (_, Some(newest)) => wall - newest,
            _ => 0.0,
        };
        self.set_play_delay(delay);
    }
}
