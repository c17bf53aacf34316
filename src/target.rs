//! Selectable on-screen targets and the actions they are bound to

use std::fmt;

use crate::layout::LayoutId;

pub const SPEAKER_ID: &str = "speaker";
pub const BACKSPACE_ID: &str = "backspace";

/// What sort of key a target is. Drives the dwell duration lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Action,
    Category,
    Word,
    Control,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Action => write!(f, "action"),
            TargetKind::Category => write!(f, "category"),
            TargetKind::Word => write!(f, "word"),
            TargetKind::Control => write!(f, "control"),
        }
    }
}

/// Application-supplied hit region. Edges are inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Region {
    Rect { x: f32, y: f32, width: f32, height: f32 },
    Circle { cx: f32, cy: f32, radius: f32 },
}

impl Region {
    pub fn rect(x: f32, y: f32, width: f32, height: f32) -> Self {
        Region::Rect { x, y, width, height }
    }

    pub fn circle(cx: f32, cy: f32, radius: f32) -> Self {
        Region::Circle { cx, cy, radius }
    }

    pub fn contains(&self, px: f32, py: f32) -> bool {
        match *self {
            Region::Rect { x, y, width, height } => {
                px >= x && px <= x + width && py >= y && py <= y + height
            }
            Region::Circle { cx, cy, radius } => {
                let dx = px - cx;
                let dy = py - cy;
                dx * dx + dy * dy <= radius * radius
            }
        }
    }

    /// Top-left corner and size of the bounding box, for renderers
    pub fn bounds(&self) -> (f32, f32, f32, f32) {
        match *self {
            Region::Rect { x, y, width, height } => (x, y, width, height),
            Region::Circle { cx, cy, radius } => {
                (cx - radius, cy - radius, radius * 2.0, radius * 2.0)
            }
        }
    }
}

/// A registered selectable region
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub id: String,
    pub kind: TargetKind,
    pub label: String,
    pub region: Region,
}

/// What committing a target does
#[derive(Debug, Clone, PartialEq)]
pub enum KeyAction {
    /// Speak the whole sentence
    Speak,
    Backspace,
    Clear,
    /// Return to the default layout, keeping the sentence
    Home,
    Exit,
    AnnounceTime,
    OpenLayout(LayoutId),
    /// Category key with no layout behind it
    Announce(String),
    AppendWord(String),
}

impl Target {
    pub fn new(
        id: impl Into<String>,
        kind: TargetKind,
        label: impl Into<String>,
        region: Region,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            region,
        }
    }

    pub fn action(&self) -> KeyAction {
        match self.kind {
            TargetKind::Control => match self.id.as_str() {
                BACKSPACE_ID => KeyAction::Backspace,
                _ => KeyAction::Speak,
            },
            TargetKind::Action => match self.id.as_str() {
                "clear" => KeyAction::Clear,
                "home" => KeyAction::Home,
                "exit" => KeyAction::Exit,
                "time" => KeyAction::AnnounceTime,
                _ => KeyAction::Announce(self.label.clone()),
            },
            TargetKind::Category => match LayoutId::from_category(&self.id) {
                Some(layout) => KeyAction::OpenLayout(layout),
                None => KeyAction::Announce(self.label.clone()),
            },
            TargetKind::Word => KeyAction::AppendWord(self.label.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_edges_inclusive() {
        let r = Region::rect(10.0, 10.0, 5.0, 5.0);
        assert!(r.contains(10.0, 10.0));
        assert!(r.contains(15.0, 15.0));
        assert!(!r.contains(15.1, 12.0));
        assert!(!r.contains(9.9, 12.0));
    }

    #[test]
    fn test_circle_contains() {
        let c = Region::circle(0.0, 0.0, 2.0);
        assert!(c.contains(0.0, 2.0));
        assert!(c.contains(1.0, 1.0));
        assert!(!c.contains(2.0, 2.0));
    }

    #[test]
    fn test_actions() {
        let region = Region::rect(0.0, 0.0, 1.0, 1.0);
        let speaker = Target::new(SPEAKER_ID, TargetKind::Control, "speak", region);
        let back = Target::new(BACKSPACE_ID, TargetKind::Control, "back", region);
        let vocab = Target::new("vocab", TargetKind::Category, "VOCAB", region);
        let social = Target::new("social", TargetKind::Category, "SOCIAL", region);
        let word = Target::new("toplay", TargetKind::Word, "to play", region);

        assert_eq!(speaker.action(), KeyAction::Speak);
        assert_eq!(back.action(), KeyAction::Backspace);
        assert_eq!(vocab.action(), KeyAction::OpenLayout(LayoutId::Vocab));
        assert_eq!(social.action(), KeyAction::Announce("SOCIAL".into()));
        assert_eq!(word.action(), KeyAction::AppendWord("to play".into()));
    }
}
