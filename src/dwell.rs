//! Dwell countdown: sustained hover becomes a click
//!
//! The controller is driven once per tick with whatever the hover resolver
//! currently reports. It never sleeps and never reads the wall clock; the
//! caller passes `now`, which keeps it deterministic under test.
//!
//! State transitions:
//! - Idle -> Armed(t, now) when a target is resolved
//! - Armed(t) -> Armed(t2, now) when the resolved target changes (no partial credit)
//! - Armed(t, at) -> Idle + Commit(t) once `now - at >= required(t)`
//! - Armed -> Idle when the pointer leaves every target
//!
//! After a commit the controller sits out exactly one tick before it will arm
//! again, so the host gets a chance to swap the target set.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::target::{Target, TargetKind};

/// Per-kind dwell durations, adjustable at runtime
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DwellTimings {
    pub word: Duration,
    pub category: Duration,
    pub action: Duration,
    pub control: Duration,
}

impl Default for DwellTimings {
    fn default() -> Self {
        Self {
            word: Duration::from_millis(3000),
            category: Duration::from_millis(3000),
            action: Duration::from_millis(3000),
            control: Duration::from_millis(2000),
        }
    }
}

impl DwellTimings {
    pub fn required(&self, kind: TargetKind) -> Duration {
        match kind {
            TargetKind::Word => self.word,
            TargetKind::Category => self.category,
            TargetKind::Action => self.action,
            TargetKind::Control => self.control,
        }
    }

    pub fn set(&mut self, kind: TargetKind, duration: Duration) {
        match kind {
            TargetKind::Word => self.word = duration,
            TargetKind::Category => self.category = duration,
            TargetKind::Action => self.action = duration,
            TargetKind::Control => self.control = duration,
        }
    }
}

/// `armed_at` exists only together with a target id
#[derive(Debug, Clone, PartialEq)]
pub enum DwellState {
    Idle,
    Armed {
        target_id: String,
        kind: TargetKind,
        armed_at: Instant,
        required: Duration,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DwellEvent {
    Armed { target_id: String, generation: u64 },
    Cancelled { target_id: String },
    Commit { target_id: String, generation: u64 },
}

/// What the render surface needs to draw the fill animation
#[derive(Debug, Clone, PartialEq)]
pub struct DwellView {
    pub target_id: String,
    pub progress: f32,
}

#[derive(Debug)]
pub struct DwellController {
    timings: DwellTimings,
    state: DwellState,
    generation: u64,
    cooldown: bool,
}

impl DwellController {
    pub fn new(timings: DwellTimings) -> Self {
        Self {
            timings,
            state: DwellState::Idle,
            generation: 0,
            cooldown: false,
        }
    }

    pub fn timings(&self) -> DwellTimings {
        self.timings
    }

    /// Applies from the next arm onwards
    pub fn set_duration(&mut self, kind: TargetKind, duration: Duration) {
        self.timings.set(kind, duration);
    }

    pub fn state(&self) -> &DwellState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True if nothing has armed or reset since `generation` was handed out
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    pub fn active_target(&self) -> Option<&str> {
        match &self.state {
            DwellState::Armed { target_id, .. } => Some(target_id),
            DwellState::Idle => None,
        }
    }

    /// Advance one tick with the currently resolved target
    pub fn update(&mut self, resolved: Option<&Target>, now: Instant) -> Option<DwellEvent> {
        if self.cooldown {
            self.cooldown = false;
            return None;
        }

        match (&self.state, resolved) {
            (DwellState::Idle, None) => None,
            (DwellState::Idle, Some(target)) => Some(self.arm(target, now)),
            (DwellState::Armed { target_id, .. }, None) => {
                let target_id = target_id.clone();
                self.cancel();
                Some(DwellEvent::Cancelled { target_id })
            }
            (DwellState::Armed { target_id, .. }, Some(target)) if *target_id != target.id => {
                Some(self.arm(target, now))
            }
            (
                DwellState::Armed {
                    target_id,
                    armed_at,
                    required,
                    ..
                },
                Some(_),
            ) => {
                if now.saturating_duration_since(*armed_at) < *required {
                    return None;
                }
                let target_id = target_id.clone();
                debug!(target = %target_id, generation = self.generation, "dwell complete");
                self.state = DwellState::Idle;
                self.cooldown = true;
                Some(DwellEvent::Commit {
                    target_id,
                    generation: self.generation,
                })
            }
        }
    }

    fn arm(&mut self, target: &Target, now: Instant) -> DwellEvent {
        self.generation += 1;
        let required = self.timings.required(target.kind);
        debug!(target = %target.id, ?required, generation = self.generation, "dwell armed");
        self.state = DwellState::Armed {
            target_id: target.id.clone(),
            kind: target.kind,
            armed_at: now,
            required,
        };
        DwellEvent::Armed {
            target_id: target.id.clone(),
            generation: self.generation,
        }
    }

    fn cancel(&mut self) {
        self.generation += 1;
        self.state = DwellState::Idle;
    }

    /// Drop any countdown, e.g. on layout change or modality switch.
    /// A pending post-commit cooldown tick is kept.
    pub fn reset(&mut self) {
        if matches!(self.state, DwellState::Armed { .. }) {
            self.cancel();
        } else {
            self.generation += 1;
        }
    }

    /// Fill fraction in [0, 1]; 0 when idle
    pub fn progress(&self, now: Instant) -> f32 {
        match &self.state {
            DwellState::Idle => 0.0,
            DwellState::Armed {
                armed_at, required, ..
            } => {
                if required.is_zero() {
                    return 1.0;
                }
                let elapsed = now.saturating_duration_since(*armed_at);
                (elapsed.as_secs_f32() / required.as_secs_f32()).clamp(0.0, 1.0)
            }
        }
    }

    pub fn view(&self, now: Instant) -> Option<DwellView> {
        self.active_target().map(|id| DwellView {
            target_id: id.to_string(),
            progress: self.progress(now),
        })
    }
}
