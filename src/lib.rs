//! Dwell and switch input engine for an AAC keyboard
//!
//! A pointer (mouse, touch, gaze or head tracker) hovers over on-screen keys;
//! holding still long enough on one selects it. Users with a single switch get
//! a scanning selector instead. Either path feeds the same sentence and the
//! same context-sensitive vocabulary grid.

pub mod clock;
pub mod config;
pub mod dwell;
pub mod error;
pub mod hover;
pub mod layout;
pub mod pointer;
pub mod render;
pub mod scan;
pub mod sentence;
pub mod session;
pub mod speech;
pub mod suggest;
pub mod target;
pub mod transcript;

pub use error::{Error, Result};
