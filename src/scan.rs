//! Hierarchical switch scanning for single-switch users
//!
//! Highlight walks speaker -> backspace -> rows on a fixed interval. A switch
//! press picks what is highlighted: a control commits straight away, a row
//! drills down into its keys, a key commits. Every commit drops back to idle
//! and the next press starts over at the controls.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Idle,
    Controls,
    Rows,
    Keys,
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanMode::Idle => write!(f, "idle"),
            ScanMode::Controls => write!(f, "controls"),
            ScanMode::Rows => write!(f, "rows"),
            ScanMode::Keys => write!(f, "keys"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanControl {
    Speaker,
    Backspace,
}

const CONTROLS: [ScanControl; 2] = [ScanControl::Speaker, ScanControl::Backspace];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanState {
    pub mode: ScanMode,
    /// Control index, row index or key position depending on `mode`
    pub cursor: Option<usize>,
    pub selected_row: Option<usize>,
}

impl ScanState {
    const IDLE: ScanState = ScanState {
        mode: ScanMode::Idle,
        cursor: None,
        selected_row: None,
    };
}

/// What a switch press committed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanSelection {
    Control(ScanControl),
    /// Absolute index into the current layout's keys
    Key(usize),
}

/// What is lit up right now, for the render surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanHighlight {
    Control(ScanControl),
    Row(usize),
    Key(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanView {
    pub enabled: bool,
    pub mode: ScanMode,
    pub highlight: Option<ScanHighlight>,
}

#[derive(Debug, Clone, Copy)]
struct ScanTimer {
    due: Instant,
    generation: u64,
}

#[derive(Debug)]
pub struct SwitchScanner {
    enabled: bool,
    state: ScanState,
    interval: Duration,
    row_width: usize,
    key_count: usize,
    timer: Option<ScanTimer>,
    generation: u64,
}

impl SwitchScanner {
    pub fn new(interval: Duration, row_width: usize, key_count: usize) -> Self {
        Self {
            enabled: false,
            state: ScanState::IDLE,
            interval,
            row_width: row_width.max(1),
            key_count,
            timer: None,
            generation: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn row_width(&self) -> usize {
        self.row_width
    }

    /// True while an auto-advance is scheduled
    pub fn timer_pending(&self) -> bool {
        self.timer.is_some()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// New auto-advance cadence. A pending advance is rescheduled from `now`.
    pub fn set_interval(&mut self, interval: Duration, now: Instant) {
        self.interval = interval;
        if self.timer.is_some() {
            self.restart_timer(now);
        }
    }

    /// Turning scanning off (or on) always starts from idle with no timer
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.go_idle();
    }

    pub fn toggle(&mut self) -> bool {
        self.set_enabled(!self.enabled);
        self.enabled
    }

    /// Keep row and key cycling inside the current layout
    pub fn set_key_count(&mut self, key_count: usize) {
        self.key_count = key_count;
        let limit = match self.state.mode {
            ScanMode::Rows => self.row_count(),
            ScanMode::Keys => self.keys_in_row(self.state.selected_row.unwrap_or(0)),
            _ => return,
        };
        if let Some(cursor) = self.state.cursor
            && cursor >= limit
        {
            self.state.cursor = Some(0);
        }
    }

    fn row_count(&self) -> usize {
        self.key_count.div_ceil(self.row_width).max(1)
    }

    fn keys_in_row(&self, row: usize) -> usize {
        let start = row * self.row_width;
        self.key_count
            .saturating_sub(start)
            .min(self.row_width)
            .max(1)
    }

    fn go_idle(&mut self) {
        self.state = ScanState::IDLE;
        self.cancel_timer();
    }

    fn cancel_timer(&mut self) {
        self.generation += 1;
        self.timer = None;
    }

    fn restart_timer(&mut self, now: Instant) {
        self.generation += 1;
        self.timer = Some(ScanTimer {
            due: now + self.interval,
            generation: self.generation,
        });
    }

    fn set_cursor(&mut self, mode: ScanMode, cursor: usize, now: Instant) {
        self.state.mode = mode;
        self.state.cursor = Some(cursor);
        self.restart_timer(now);
    }

    /// Handle one discrete switch press
    pub fn activate(&mut self, now: Instant) -> Option<ScanSelection> {
        if !self.enabled {
            return None;
        }

        let ScanState {
            mode,
            cursor,
            selected_row,
        } = self.state;

        let Some(cursor) = cursor else {
            // Fresh start, or the first press after a commit
            self.state.selected_row = None;
            self.set_cursor(ScanMode::Controls, 0, now);
            return None;
        };

        match mode {
            ScanMode::Idle => {
                self.set_cursor(ScanMode::Controls, 0, now);
                None
            }
            ScanMode::Controls => {
                let control = CONTROLS[cursor.min(CONTROLS.len() - 1)];
                debug!(?control, "scan commit");
                self.go_idle();
                Some(ScanSelection::Control(control))
            }
            ScanMode::Rows => {
                self.state.selected_row = Some(cursor);
                self.set_cursor(ScanMode::Keys, 0, now);
                None
            }
            ScanMode::Keys => {
                let row = selected_row.unwrap_or(0);
                let index = row * self.row_width + cursor;
                debug!(row, index, "scan commit");
                self.go_idle();
                Some(ScanSelection::Key(index))
            }
        }
    }

    /// Advance the highlight if the auto-advance timer is due.
    /// Returns true if the cursor moved.
    pub fn on_tick(&mut self, now: Instant) -> bool {
        let Some(timer) = self.timer else {
            return false;
        };
        if !self.enabled || timer.generation != self.generation || now < timer.due {
            return false;
        }

        let Some(cursor) = self.state.cursor else {
            self.cancel_timer();
            return false;
        };

        match self.state.mode {
            ScanMode::Idle => {
                self.cancel_timer();
                return false;
            }
            ScanMode::Controls => {
                if cursor + 1 < CONTROLS.len() {
                    self.set_cursor(ScanMode::Controls, cursor + 1, now);
                } else {
                    self.set_cursor(ScanMode::Rows, 0, now);
                }
            }
            ScanMode::Rows => {
                let next = (cursor + 1) % self.row_count();
                self.set_cursor(ScanMode::Rows, next, now);
            }
            ScanMode::Keys => {
                let row = self.state.selected_row.unwrap_or(0);
                let next = (cursor + 1) % self.keys_in_row(row);
                self.set_cursor(ScanMode::Keys, next, now);
            }
        }
        true
    }

    pub fn view(&self) -> ScanView {
        let highlight = self.state.cursor.and_then(|cursor| match self.state.mode {
            ScanMode::Idle => None,
            ScanMode::Controls => CONTROLS.get(cursor).copied().map(ScanHighlight::Control),
            ScanMode::Rows => Some(ScanHighlight::Row(cursor)),
            ScanMode::Keys => {
                let row = self.state.selected_row.unwrap_or(0);
                Some(ScanHighlight::Key(row * self.row_width + cursor))
            }
        });
        ScanView {
            enabled: self.enabled,
            mode: self.state.mode,
            highlight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_millis(1500);

    fn scanner() -> SwitchScanner {
        let mut s = SwitchScanner::new(INTERVAL, 6, 24);
        s.set_enabled(true);
        s
    }

    #[test]
    fn test_first_press_highlights_speaker() {
        let mut s = scanner();
        let t0 = Instant::now();
        assert_eq!(s.activate(t0), None);
        assert_eq!(s.state().mode, ScanMode::Controls);
        assert_eq!(
            s.view().highlight,
            Some(ScanHighlight::Control(ScanControl::Speaker))
        );
        assert_eq!(
            s.activate(t0 + Duration::from_millis(10)),
            Some(ScanSelection::Control(ScanControl::Speaker))
        );
        assert_eq!(s.state(), ScanState::IDLE);
        assert!(!s.timer_pending());
    }

    #[test]
    fn test_controls_then_rows_cycle() {
        let mut s = scanner();
        let mut now = Instant::now();
        s.activate(now);

        now += INTERVAL;
        assert!(s.on_tick(now));
        assert_eq!(
            s.view().highlight,
            Some(ScanHighlight::Control(ScanControl::Backspace))
        );

        let mut rows = Vec::new();
        for _ in 0..6 {
            now += INTERVAL;
            assert!(s.on_tick(now));
            assert_eq!(s.state().mode, ScanMode::Rows);
            rows.push(s.state().cursor.unwrap());
        }
        assert_eq!(rows, vec![0, 1, 2, 3, 0, 1]);
    }

    #[test]
    fn test_no_advance_before_interval() {
        let mut s = scanner();
        let t0 = Instant::now();
        s.activate(t0);
        assert!(!s.on_tick(t0 + Duration::from_millis(1499)));
        assert_eq!(s.state().cursor, Some(0));
    }

    #[test]
    fn test_interval_change_reschedules_pending_advance() {
        let mut s = scanner();
        let t0 = Instant::now();
        s.activate(t0);

        let t1 = t0 + Duration::from_millis(1000);
        s.set_interval(Duration::from_millis(3000), t1);
        assert!(!s.on_tick(t0 + INTERVAL));
        assert!(!s.on_tick(t1 + Duration::from_millis(2999)));
        assert!(s.on_tick(t1 + Duration::from_millis(3000)));
        assert_eq!(
            s.view().highlight,
            Some(ScanHighlight::Control(ScanControl::Backspace))
        );
    }

    #[test]
    fn test_interval_change_while_idle_schedules_nothing() {
        let mut s = scanner();
        s.set_interval(Duration::from_millis(500), Instant::now());
        assert!(!s.timer_pending());
        assert_eq!(s.interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_row_then_key_selection() {
        let mut s = scanner();
        let mut now = Instant::now();
        s.activate(now);
        // speaker -> backspace -> row 0 -> row 1
        for _ in 0..3 {
            now += INTERVAL;
            s.on_tick(now);
        }
        assert_eq!(s.view().highlight, Some(ScanHighlight::Row(1)));
        assert_eq!(s.activate(now), None);
        assert_eq!(s.state().mode, ScanMode::Keys);
        assert_eq!(s.state().selected_row, Some(1));

        for _ in 0..2 {
            now += INTERVAL;
            s.on_tick(now);
        }
        assert_eq!(s.view().highlight, Some(ScanHighlight::Key(8)));
        assert_eq!(s.activate(now), Some(ScanSelection::Key(8)));
        assert_eq!(s.state().mode, ScanMode::Idle);
        assert!(!s.timer_pending());

        // next press restarts at the controls
        s.activate(now);
        assert_eq!(s.state().mode, ScanMode::Controls);
        assert_eq!(s.state().cursor, Some(0));
    }

    #[test]
    fn test_keys_wrap_within_short_row() {
        let mut s = SwitchScanner::new(INTERVAL, 6, 8);
        s.set_enabled(true);
        let mut now = Instant::now();
        s.activate(now);
        for _ in 0..3 {
            now += INTERVAL;
            s.on_tick(now);
        }
        assert_eq!(s.state().cursor, Some(1));
        s.activate(now);
        let mut seen = Vec::new();
        for _ in 0..3 {
            now += INTERVAL;
            s.on_tick(now);
            seen.push(s.state().cursor.unwrap());
        }
        assert_eq!(seen, vec![1, 0, 1]);
    }

    #[test]
    fn test_toggle_off_clears_and_cancels() {
        let mut s = scanner();
        let mut now = Instant::now();
        s.activate(now);
        for _ in 0..3 {
            now += INTERVAL;
            s.on_tick(now);
        }
        assert!(s.timer_pending());
        assert!(!s.toggle());
        assert_eq!(s.state(), ScanState::IDLE);
        assert!(!s.timer_pending());
        assert!(!s.on_tick(now + INTERVAL * 10));
        assert_eq!(s.activate(now), None);
        assert_eq!(s.state(), ScanState::IDLE);
    }

    #[test]
    fn test_no_timer_between_commit_and_next_press() {
        let mut s = scanner();
        let t0 = Instant::now();
        s.activate(t0);
        s.activate(t0);
        assert!(!s.on_tick(t0 + INTERVAL * 5));
        assert_eq!(s.state(), ScanState::IDLE);
    }
}
