//! Pointer position shared between input sources and the tick loop
//!
//! Any producer (mouse, touch, a gaze or head tracker) writes the latest
//! position; the tick loop reads whatever was written last. Nothing queues
//! and nothing blocks.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Off-screen position used before any source has reported
pub const OFFSCREEN: (f32, f32) = (-1000.0, -1000.0);

/// Anything that can report a 2D cursor position
pub trait PointerSource: Send + Sync {
    fn position(&self) -> (f32, f32);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSample {
    pub x: f32,
    pub y: f32,
    pub timestamp: Instant,
}

fn pack(x: f32, y: f32) -> u64 {
    ((x.to_bits() as u64) << 32) | y.to_bits() as u64
}

fn unpack(v: u64) -> (f32, f32) {
    (f32::from_bits((v >> 32) as u32), f32::from_bits(v as u32))
}

/// Last-write-wins pointer cell.
///
/// Both coordinates live in one `AtomicU64` so a reader never sees x from one
/// write and y from another.
pub struct PointerTracker {
    position: AtomicU64,
    /// Microseconds since `epoch` of the last write
    updated_us: AtomicU64,
    epoch: Instant,
}

impl PointerTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            position: AtomicU64::new(pack(OFFSCREEN.0, OFFSCREEN.1)),
            updated_us: AtomicU64::new(0),
            epoch: Instant::now(),
        })
    }

    pub fn update(&self, x: f32, y: f32) {
        self.position.store(pack(x, y), Ordering::Release);
        let us = self.epoch.elapsed().as_micros() as u64;
        self.updated_us.store(us, Ordering::Release);
    }

    /// Park the pointer off-screen, e.g. when the source loses tracking
    pub fn clear(&self) {
        self.update(OFFSCREEN.0, OFFSCREEN.1);
    }

    pub fn sample(&self) -> PointerSample {
        let (x, y) = unpack(self.position.load(Ordering::Acquire));
        let us = self.updated_us.load(Ordering::Acquire);
        PointerSample {
            x,
            y,
            timestamp: self.epoch + Duration::from_micros(us),
        }
    }
}

impl PointerSource for PointerTracker {
    fn position(&self) -> (f32, f32) {
        unpack(self.position.load(Ordering::Acquire))
    }
}

impl fmt::Debug for PointerTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (x, y) = self.position();
        f.debug_struct("PointerTracker")
            .field("x", &x)
            .field("y", &y)
            .finish()
    }
}
