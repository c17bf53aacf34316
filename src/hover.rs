//! Hit testing the pointer against the registered target set
//!
//! The registry is replaced wholesale on every layout change. Resolution is a
//! pure function of position and the current set; the only thing remembered
//! between ticks is the last resolved id, so changes can be reported
//! edge-triggered.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::warn;

use crate::target::Target;

/// Result of one hover tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoverUpdate<'a> {
    pub target: Option<&'a Target>,
    /// True only on the tick where the resolved id differs from the last one
    pub changed: bool,
}

#[derive(Debug, Default)]
pub struct HoverResolver {
    targets: Arc<[Target]>,
    last: Option<String>,
}

impl HoverResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a new target set. Later entries are drawn on top.
    pub fn replace(&mut self, targets: Arc<[Target]>) {
        let mut seen = HashSet::with_capacity(targets.len());
        for t in targets.iter() {
            if !seen.insert(t.id.as_str()) {
                warn!(id = %t.id, "duplicate target id in registry, topmost wins");
            }
        }
        self.targets = targets;
        self.last = None;
    }

    pub fn targets(&self) -> &Arc<[Target]> {
        &self.targets
    }

    pub fn get(&self, id: &str) -> Option<&Target> {
        self.targets.iter().rev().find(|t| t.id == id)
    }

    /// Topmost target containing the point
    pub fn resolve(&self, x: f32, y: f32) -> Option<&Target> {
        self.targets.iter().rev().find(|t| t.region.contains(x, y))
    }

    pub fn update(&mut self, x: f32, y: f32) -> HoverUpdate<'_> {
        let found = self.targets.iter().rev().find(|t| t.region.contains(x, y));
        let id = found.map(|t| t.id.as_str());
        let changed = id != self.last.as_deref();
        if changed {
            self.last = id.map(str::to_string);
        }
        HoverUpdate {
            target: found,
            changed,
        }
    }

    /// Forget the last resolved id, e.g. while hover is suspended
    pub fn release(&mut self) {
        self.last = None;
    }

    pub fn last_resolved(&self) -> Option<&str> {
        self.last.as_deref()
    }
}
