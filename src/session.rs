//! Session - the single place where input state changes
//!
//! Pointer hover, dwell completion, switch presses, scan timer ticks and
//! suggestion responses all land here and are applied one at a time from the
//! host's tick loop. Nothing in here blocks; the only async work (suggestion
//! calls) runs elsewhere and comes back through a channel drained each tick.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dwell::{DwellController, DwellEvent, DwellTimings, DwellView};
use crate::error::{Error, Result};
use crate::hover::HoverResolver;
use crate::layout::{LayoutEngine, LayoutId};
use crate::pointer::PointerSource;
use crate::scan::{ScanControl, ScanSelection, ScanView, SwitchScanner};
use crate::sentence::SentenceBuffer;
use crate::speech::{Speaker, TimeAnnouncement};
use crate::suggest::SuggestionRequester;
use crate::target::{KeyAction, Target, TargetKind};
use crate::transcript::clean_transcript;

/// Shortest dwell the +/- adjustment will go down to
pub const MIN_DWELL: Duration = Duration::from_millis(500);

/// Bounds for the scan auto-advance interval
pub const MIN_SCAN_INTERVAL: Duration = Duration::from_millis(500);
pub const MAX_SCAN_INTERVAL: Duration = Duration::from_millis(5000);

/// Input from the host that is not pointer movement
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// Binary switch pressed
    Switch,
    ToggleSwitchMode,
    /// Lengthen (positive) or shorten key dwell, in milliseconds
    AdjustDwell(i64),
    /// Slow down (positive) or speed up the scan highlight, in milliseconds
    AdjustScanInterval(i64),
    /// Recognized speech to merge into the sentence
    AppendText(String),
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Hovered target changed; `None` when the pointer left every target
    HoverChanged(Option<String>),
    Committed { target_id: String, action: KeyAction },
    LayoutChanged(LayoutId),
    SwitchMode(bool),
    Exit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    Time(TimeAnnouncement),
}

/// Everything a render surface needs after a transition
#[derive(Debug, Clone)]
pub struct RenderFrame {
    pub layout: LayoutId,
    /// Keys then controls, as registered with the hover resolver
    pub targets: Arc<[Target]>,
    pub row_width: usize,
    pub sentence: String,
    pub dwell: Option<DwellView>,
    pub scan: ScanView,
    pub overlay: Option<Overlay>,
    pub word_dwell: Duration,
    pub scan_interval: Duration,
}

pub struct Session {
    pointer: Arc<dyn PointerSource>,
    speaker: Arc<dyn Speaker>,
    hover: HoverResolver,
    dwell: DwellController,
    layout: LayoutEngine,
    scanner: SwitchScanner,
    sentence: SentenceBuffer,
    suggestions: Option<SuggestionRequester>,
    overlay: Option<(Overlay, Instant)>,
    overlay_duration: Duration,
    exit_requested: bool,
}

impl Session {
    pub fn new(config: &Config, pointer: Arc<dyn PointerSource>, speaker: Arc<dyn Speaker>) -> Self {
        let layout = LayoutEngine::new(config.grid, config.suggestions.max);
        let mut hover = HoverResolver::new();
        hover.replace(layout.registry());
        let mut scanner = SwitchScanner::new(
            config.scan.interval(),
            config.scan.row_width,
            layout.keys().len(),
        );
        scanner.set_enabled(config.scan.start_enabled);

        Self {
            pointer,
            speaker,
            hover,
            dwell: DwellController::new(config.dwell.timings()),
            layout,
            scanner,
            sentence: SentenceBuffer::new(),
            suggestions: None,
            overlay: None,
            overlay_duration: config.ui.time_overlay(),
            exit_requested: false,
        }
    }

    pub fn with_suggestions(mut self, requester: SuggestionRequester) -> Self {
        self.suggestions = Some(requester);
        self
    }

    pub fn sentence(&self) -> &str {
        self.sentence.as_str()
    }

    pub fn layout(&self) -> &LayoutEngine {
        &self.layout
    }

    pub fn dwell(&self) -> &DwellController {
        &self.dwell
    }

    pub fn scanner(&self) -> &SwitchScanner {
        &self.scanner
    }

    pub fn overlay(&self) -> Option<&Overlay> {
        self.overlay.as_ref().map(|(overlay, _)| overlay)
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    pub fn timings(&self) -> DwellTimings {
        self.dwell.timings()
    }

    /// One pass of the input loop
    #[hotpath::measure]
    pub fn on_tick(&mut self, now: Instant) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        self.drain_suggestions(&mut events);

        if self.overlay.as_ref().is_some_and(|(_, until)| now >= *until) {
            self.overlay = None;
        }

        if self.scanner.is_enabled() {
            self.scanner.on_tick(now);
            return events;
        }

        if self.overlay.is_some() {
            // Hover is suspended while an overlay covers the grid
            self.hover.release();
            if self.dwell.active_target().is_some() {
                self.dwell.reset();
            }
            return events;
        }

        let (x, y) = self.pointer.position();
        let hovered = self.hover.update(x, y);
        if hovered.changed {
            events.push(SessionEvent::HoverChanged(
                hovered.target.map(|t| t.id.clone()),
            ));
        }
        let event = self.dwell.update(hovered.target, now);

        if let Some(DwellEvent::Commit {
            target_id,
            generation,
        }) = event
        {
            if !self.dwell.is_current(generation) {
                debug!(
                    "{}",
                    Error::StaleCommit {
                        generation,
                        current: self.dwell.generation(),
                    }
                );
                return events;
            }
            match self.execute(&target_id, now) {
                Ok(mut committed) => events.append(&mut committed),
                Err(e) => debug!(error = %e, "dwell commit dropped"),
            }
        }
        events
    }

    pub fn handle(&mut self, command: SessionCommand, now: Instant) -> Vec<SessionEvent> {
        match command {
            SessionCommand::Switch => self.on_switch_signal(now),
            SessionCommand::ToggleSwitchMode => match self.toggle_switch_mode() {
                Some(enabled) => vec![SessionEvent::SwitchMode(enabled)],
                None => Vec::new(),
            },
            SessionCommand::AdjustDwell(delta_ms) => {
                self.adjust_dwell(delta_ms);
                Vec::new()
            }
            SessionCommand::AdjustScanInterval(delta_ms) => {
                self.adjust_scan_interval(delta_ms, now);
                Vec::new()
            }
            SessionCommand::AppendText(text) => self.append_text(&text),
            SessionCommand::Quit => {
                self.exit_requested = true;
                vec![SessionEvent::Exit]
            }
        }
    }

    /// Commit a target of the current layout by id
    pub fn execute(&mut self, target_id: &str, now: Instant) -> Result<Vec<SessionEvent>> {
        let target = self
            .hover
            .get(target_id)
            .cloned()
            .ok_or_else(|| Error::InvalidTarget(target_id.to_string()))?;
        Ok(self.perform(&target, now))
    }

    fn perform(&mut self, target: &Target, now: Instant) -> Vec<SessionEvent> {
        let action = target.action();
        info!(target = %target.id, kind = %target.kind, ?action, "commit");
        let mut events = vec![SessionEvent::Committed {
            target_id: target.id.clone(),
            action: action.clone(),
        }];

        match action {
            KeyAction::Speak => {
                if !self.sentence.is_blank() {
                    self.speaker.speak(self.sentence.as_str());
                }
            }
            KeyAction::Backspace => {
                self.speaker.speak("backspace");
                // Edits the sentence only; the grid on screen stays
                self.sentence.backspace();
                self.cancel_suggestions();
            }
            KeyAction::Clear => {
                self.speaker.speak("clear");
                self.sentence.clear();
                self.cancel_suggestions();
                self.show(LayoutId::Default, &mut events);
            }
            KeyAction::Home => {
                self.speaker.speak("home");
                self.show(LayoutId::Default, &mut events);
            }
            KeyAction::Exit => {
                self.speaker.speak("exit");
                self.exit_requested = true;
                events.push(SessionEvent::Exit);
            }
            KeyAction::AnnounceTime => {
                let announcement = TimeAnnouncement::at(&Local::now());
                self.speaker.speak(&announcement.spoken());
                self.overlay = Some((Overlay::Time(announcement), now + self.overlay_duration));
                self.hover.release();
                self.dwell.reset();
            }
            KeyAction::OpenLayout(id) => {
                self.speaker.speak(&target.label);
                self.show(id, &mut events);
            }
            KeyAction::Announce(label) => {
                self.speaker.speak(&label);
            }
            KeyAction::AppendWord(word) => {
                self.speaker.speak(&word);
                self.sentence.append(&word);
                self.commit_word(&mut events);
            }
        }
        events
    }

    /// Rule layout now, suggestion layout later if a provider answers in time
    fn commit_word(&mut self, events: &mut Vec<SessionEvent>) {
        let generation = self.layout.after_word(self.sentence.as_str());
        self.refresh_targets();
        events.push(SessionEvent::LayoutChanged(self.layout.id()));

        if let Some(requester) = self.suggestions.as_mut() {
            if self.sentence.is_blank() {
                requester.cancel();
            } else {
                requester.request(generation, self.sentence.as_str());
            }
        }
    }

    fn show(&mut self, id: LayoutId, events: &mut Vec<SessionEvent>) {
        self.layout.show(id);
        self.refresh_targets();
        events.push(SessionEvent::LayoutChanged(id));
    }

    /// New target set: re-register, drop any countdown, keep scanning in range
    fn refresh_targets(&mut self) {
        self.hover.replace(self.layout.registry());
        self.dwell.reset();
        self.scanner.set_key_count(self.layout.keys().len());
    }

    /// Abort the running call and drop anything already queued for the old sentence
    fn cancel_suggestions(&mut self) {
        if let Some(requester) = self.suggestions.as_mut() {
            requester.cancel();
            let dropped = requester.drain().len();
            if dropped > 0 {
                debug!(dropped, "discarded queued suggestions");
            }
        }
    }

    fn drain_suggestions(&mut self, events: &mut Vec<SessionEvent>) {
        let responses = match self.suggestions.as_ref() {
            Some(requester) => requester.drain(),
            None => return,
        };

        for response in responses {
            let words = match response.result {
                Ok(words) => words,
                Err(e) => {
                    warn!(error = %e, sentence = %response.sentence, "suggestions unavailable, keeping rule layout");
                    continue;
                }
            };
            match self.layout.apply_suggestions(response.generation, &words) {
                Ok(true) => {
                    self.refresh_targets();
                    events.push(SessionEvent::LayoutChanged(LayoutId::Suggested));
                }
                Ok(false) => debug!(sentence = %response.sentence, "no usable suggestions"),
                Err(e) => debug!(error = %e, "dropping stale suggestions"),
            }
        }
    }

    /// Discrete switch press. Ignored unless switch mode is on.
    pub fn on_switch_signal(&mut self, now: Instant) -> Vec<SessionEvent> {
        let Some(selection) = self.scanner.activate(now) else {
            return Vec::new();
        };

        let target = match selection {
            ScanSelection::Control(control) => {
                let controls = self.layout.geometry().controls();
                let index = match control {
                    ScanControl::Speaker => 0,
                    ScanControl::Backspace => 1,
                };
                Some(controls[index].clone())
            }
            ScanSelection::Key(index) => self.layout.keys().get(index).cloned(),
        };

        match target {
            Some(target) => self.perform(&target, now),
            None => {
                debug!(?selection, "scan selection outside the current layout");
                Vec::new()
            }
        }
    }

    /// Enabling suspends dwell, disabling clears all scan state
    pub fn set_switch_mode(&mut self, enabled: bool) {
        self.scanner.set_enabled(enabled);
        self.dwell.reset();
        self.hover.release();
        info!(enabled, "switch mode");
    }

    /// Flip switch mode. `None` while an overlay is open.
    pub fn toggle_switch_mode(&mut self) -> Option<bool> {
        if self.overlay.is_some() {
            debug!("switch toggle ignored while overlay is open");
            return None;
        }
        let enabled = !self.scanner.is_enabled();
        self.set_switch_mode(enabled);
        Some(enabled)
    }

    pub fn set_dwell_duration(&mut self, kind: TargetKind, duration: Duration) {
        self.dwell.set_duration(kind, duration);
    }

    /// Nudge word, category and action dwell together. Returns the new word dwell.
    pub fn adjust_dwell(&mut self, delta_ms: i64) -> Duration {
        let current = self.dwell.timings().word.as_millis() as i64;
        let next = Duration::from_millis(
            (current + delta_ms).max(MIN_DWELL.as_millis() as i64) as u64,
        );
        for kind in [TargetKind::Word, TargetKind::Category, TargetKind::Action] {
            self.dwell.set_duration(kind, next);
        }
        info!(dwell_ms = next.as_millis() as u64, "dwell time adjusted");
        next
    }

    /// Change the scan cadence, clamped to 0.5..=5 s. A pending advance is
    /// rescheduled on the new cadence. Returns the new interval.
    pub fn adjust_scan_interval(&mut self, delta_ms: i64, now: Instant) -> Duration {
        let current = self.scanner.interval().as_millis() as i64;
        let next = Duration::from_millis((current + delta_ms).clamp(
            MIN_SCAN_INTERVAL.as_millis() as i64,
            MAX_SCAN_INTERVAL.as_millis() as i64,
        ) as u64);
        self.scanner.set_interval(next, now);
        info!(interval_ms = next.as_millis() as u64, "scan interval adjusted");
        next
    }

    /// Merge recognized speech into the sentence as if it had been typed
    pub fn append_text(&mut self, text: &str) -> Vec<SessionEvent> {
        let text = clean_transcript(text);
        if text.is_empty() {
            return Vec::new();
        }
        self.sentence.append(&text);
        let mut events = Vec::new();
        self.commit_word(&mut events);
        events
    }

    pub fn frame(&self, now: Instant) -> RenderFrame {
        RenderFrame {
            layout: self.layout.id(),
            targets: self.layout.registry(),
            row_width: self.scanner.row_width(),
            sentence: self.sentence.to_string(),
            dwell: self.dwell.view(now),
            scan: self.scanner.view(),
            overlay: self.overlay().cloned(),
            word_dwell: self.dwell.timings().word,
            scan_interval: self.scanner.interval(),
        }
    }
}
