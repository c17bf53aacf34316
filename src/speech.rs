//! Speech output
//!
//! Speaking is fire-and-forget. A new utterance always cuts off the one
//! before it, so the user hears the key they just picked rather than a queue.

use std::process::{Child, Command, Stdio};
use std::sync::Mutex;

use chrono::{DateTime, Datelike, TimeZone};
use tracing::{info, warn};

pub trait Speaker: Send + Sync {
    /// Stop whatever is playing and start saying `text`
    fn speak(&self, text: &str);

    fn stop(&self) {}
}

/// Writes utterances to the log instead of a speaker
#[derive(Debug, Default)]
pub struct LogSpeaker;

impl Speaker for LogSpeaker {
    fn speak(&self, text: &str) {
        info!(%text, "speak");
    }
}

/// Runs an external TTS program (`say`, `espeak`, ...) per utterance
pub struct CommandSpeaker {
    program: String,
    args: Vec<String>,
    current: Mutex<Option<Child>>,
}

impl CommandSpeaker {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            current: Mutex::new(None),
        }
    }

    fn kill_current(current: &mut Option<Child>) {
        if let Some(mut child) = current.take() {
            // Already exited is fine
            if let Ok(None) = child.try_wait() {
                let _ = child.kill();
            }
            let _ = child.wait();
        }
    }
}

impl Speaker for CommandSpeaker {
    fn speak(&self, text: &str) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        Self::kill_current(&mut current);

        match Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => *current = Some(child),
            Err(e) => warn!(program = %self.program, error = %e, "failed to start speech command"),
        }
    }

    fn stop(&self) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        Self::kill_current(&mut current);
    }
}

impl Drop for CommandSpeaker {
    fn drop(&mut self) {
        let current = self.current.get_mut().unwrap_or_else(|e| e.into_inner());
        Self::kill_current(current);
    }
}

/// Day, date and clock time, as shown in the time overlay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeAnnouncement {
    pub day: String,
    pub date: String,
    pub time: String,
}

impl TimeAnnouncement {
    pub fn at<Tz: TimeZone>(now: &DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            day: now.format("%A").to_string(),
            date: format!("{} {}, {}", now.format("%B"), now.day(), now.year()),
            time: now.format("%I:%M:%S %p").to_string(),
        }
    }

    pub fn spoken(&self) -> String {
        format!("{}, {}, {}", self.day, self.date, self.time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_time_announcement() {
        let now = Utc.with_ymd_and_hms(2026, 3, 7, 15, 4, 9).unwrap();
        let t = TimeAnnouncement::at(&now);
        assert_eq!(t.day, "Saturday");
        assert_eq!(t.date, "March 7, 2026");
        assert_eq!(t.time, "03:04:09 PM");
        assert_eq!(t.spoken(), "Saturday, March 7, 2026, 03:04:09 PM");
    }

    #[test]
    fn test_missing_command_does_not_panic() {
        let speaker = CommandSpeaker::new("zeroclick-no-such-tts-binary", Vec::new());
        speaker.speak("hello");
        speaker.stop();
    }
}
