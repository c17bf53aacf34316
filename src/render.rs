//! Terminal render surface
//!
//! The session only produces `RenderFrame`s. The tick loop pushes them through
//! a `Ui` handle and the `Renderer` draws whatever arrived last.

use std::io::{self, Stdout, Write, stdout};

use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::style::{Attribute, Color, Print, SetAttribute, SetBackgroundColor, SetForegroundColor};
use crossterm::terminal::{self, BeginSynchronizedUpdate, ClearType, EndSynchronizedUpdate};
use crossterm::{cursor, execute, queue};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::scan::{ScanControl, ScanHighlight, ScanMode};
use crate::session::{Overlay, RenderFrame};
use crate::target::{BACKSPACE_ID, SPEAKER_ID, Target, TargetKind};

#[derive(Clone)]
pub enum UiEvent {
    Frame(Box<RenderFrame>),
    Status(String),
}

#[derive(Clone)]
pub struct Ui {
    tx: flume::Sender<UiEvent>,
}

impl Ui {
    pub fn new() -> (Self, flume::Receiver<UiEvent>) {
        let (tx, rx) = flume::unbounded();
        (Self { tx }, rx)
    }

    pub fn show_frame(&self, frame: RenderFrame) {
        let _ = self.tx.send(UiEvent::Frame(Box::new(frame)));
    }

    pub fn set_status(&self, text: impl Into<String>) {
        let _ = self.tx.send(UiEvent::Status(text.into()));
    }
}

/// Pad or cut `text` to exactly `width` columns, centred
pub fn fit(text: &str, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        out.push(ch);
        used += w;
    }
    let left = (width - used) / 2;
    let right = width - used - left;
    format!("{}{}{}", " ".repeat(left), out, " ".repeat(right))
}

fn kind_color(kind: TargetKind) -> Color {
    match kind {
        TargetKind::Word => Color::White,
        TargetKind::Category => Color::Yellow,
        TargetKind::Action => Color::Cyan,
        TargetKind::Control => Color::Magenta,
    }
}

fn is_highlighted(frame: &RenderFrame, index: usize, target: &Target) -> bool {
    match frame.scan.highlight {
        Some(ScanHighlight::Control(ScanControl::Speaker)) => target.id == SPEAKER_ID,
        Some(ScanHighlight::Control(ScanControl::Backspace)) => target.id == BACKSPACE_ID,
        Some(ScanHighlight::Row(row)) => {
            target.kind != TargetKind::Control && index / frame.row_width.max(1) == row
        }
        Some(ScanHighlight::Key(key)) => target.kind != TargetKind::Control && index == key,
        None => false,
    }
}

pub struct Renderer {
    out: Stdout,
    status: String,
    last: Option<Box<RenderFrame>>,
}

impl Renderer {
    pub fn new() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut out = stdout();
        execute!(
            out,
            terminal::EnterAlternateScreen,
            EnableMouseCapture,
            cursor::Hide
        )?;
        Ok(Self {
            out,
            status: String::new(),
            last: None,
        })
    }

    pub fn restore(&mut self) -> io::Result<()> {
        execute!(
            self.out,
            cursor::Show,
            DisableMouseCapture,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    pub fn handle(&mut self, event: UiEvent) -> io::Result<()> {
        match event {
            UiEvent::Frame(frame) => self.last = Some(frame),
            UiEvent::Status(text) => self.status = text,
        }
        self.draw()
    }

    fn draw(&mut self) -> io::Result<()> {
        let Some(frame) = self.last.take() else {
            return Ok(());
        };
        let result = self.draw_frame(&frame);
        self.last = Some(frame);
        result
    }

    fn draw_frame(&mut self, frame: &RenderFrame) -> io::Result<()> {
        let out = &mut self.out;
        queue!(
            out,
            BeginSynchronizedUpdate,
            cursor::MoveTo(0, 0),
            terminal::Clear(ClearType::All)
        )?;

        // Sentence bar
        queue!(
            out,
            cursor::MoveTo(0, 1),
            SetAttribute(Attribute::Bold),
            Print(format!("> {}", frame.sentence)),
            SetAttribute(Attribute::Reset)
        )?;

        let mut bottom = 0u16;
        for (index, target) in frame.targets.iter().enumerate() {
            let (x, y, w, h) = target.region.bounds();
            let (x, y) = (x.max(0.0) as u16, y.max(0.0) as u16);
            let width = (w.round() as usize).max(3);
            let height = (h.round() as u16).max(3);
            bottom = bottom.max(y + height);

            let inner = width - 2;
            let highlighted = is_highlighted(frame, index, target);
            let fill = frame
                .dwell
                .as_ref()
                .filter(|d| d.target_id == target.id)
                .map(|d| (d.progress * inner as f32).round() as usize)
                .unwrap_or(0);

            let border = if highlighted { Color::Green } else { Color::DarkGrey };
            queue!(
                out,
                SetForegroundColor(border),
                cursor::MoveTo(x, y),
                Print(format!("┌{}┐", "─".repeat(inner))),
                cursor::MoveTo(x, y + height - 1),
                Print(format!("└{}┘", "─".repeat(inner)))
            )?;
            for row in 1..height - 1 {
                queue!(out, cursor::MoveTo(x, y + row), Print("│"))?;
                queue!(out, cursor::MoveTo(x + inner as u16 + 1, y + row), Print("│"))?;
            }

            let label: Vec<char> = fit(&target.label, inner).chars().collect();
            let split = label.len().min(fill);
            let filled: String = label[..split].iter().collect();
            let rest: String = label[split..].iter().collect();
            let mid = y + height / 2;
            queue!(out, cursor::MoveTo(x + 1, mid), SetForegroundColor(kind_color(target.kind)))?;
            if highlighted {
                queue!(out, SetAttribute(Attribute::Reverse))?;
            }
            queue!(
                out,
                SetBackgroundColor(Color::DarkGreen),
                Print(filled),
                SetBackgroundColor(Color::Reset),
                Print(rest),
                SetAttribute(Attribute::Reset),
                SetForegroundColor(Color::Reset)
            )?;
        }

        let mode = if frame.scan.enabled {
            let step = frame.scan_interval.as_secs_f32();
            match frame.scan.mode {
                ScanMode::Idle => format!("switch ({:.1}s): press space to start", step),
                mode => format!("switch ({:.1}s): {}", step, mode),
            }
        } else {
            format!("dwell {:.2}s", frame.word_dwell.as_secs_f32())
        };
        queue!(
            out,
            cursor::MoveTo(0, bottom + 1),
            SetForegroundColor(Color::DarkGrey),
            Print(format!(
                "{} │ layout {} │ s switch mode · +/- dwell · [/] scan speed · q quit",
                mode, frame.layout
            ))
        )?;
        if !self.status.is_empty() {
            queue!(out, cursor::MoveTo(0, bottom + 2), Print(&self.status))?;
        }
        queue!(out, SetForegroundColor(Color::Reset))?;

        if let Some(Overlay::Time(time)) = &frame.overlay {
            let lines = [time.day.as_str(), time.date.as_str(), time.time.as_str()];
            let width = lines.iter().map(|l| l.width()).max().unwrap_or(0) + 6;
            let (x, y) = (20u16, 8u16);
            queue!(
                out,
                SetForegroundColor(Color::Black),
                SetBackgroundColor(Color::Cyan)
            )?;
            for (i, line) in ["", lines[0], lines[1], lines[2], ""].iter().enumerate() {
                queue!(out, cursor::MoveTo(x, y + i as u16), Print(fit(line, width)))?;
            }
            queue!(
                out,
                SetForegroundColor(Color::Reset),
                SetBackgroundColor(Color::Reset)
            )?;
        }

        queue!(out, EndSynchronizedUpdate)?;
        out.flush()
    }
}
