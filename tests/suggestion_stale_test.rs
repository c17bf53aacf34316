//! Suggestion responses racing the user's next selection

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use zeroclick::config::Config;
use zeroclick::layout::LayoutId;
use zeroclick::pointer::PointerTracker;
use zeroclick::session::{Session, SessionEvent};
use zeroclick::speech::Speaker;
use zeroclick::suggest::{SuggestionProvider, SuggestionRequester};
use zeroclick::target::{BACKSPACE_ID, SPEAKER_ID};

const BUDGET: Duration = Duration::from_millis(4000);

struct Quiet;

impl Speaker for Quiet {
    fn speak(&self, _text: &str) {}
}

/// Answers from a fixed table after `delay`; unknown sentences never answer
struct Scripted {
    delay: Duration,
    answers: Vec<(&'static str, Vec<&'static str>)>,
    asked: Mutex<Vec<String>>,
}

impl Scripted {
    fn new(delay_ms: u64, answers: Vec<(&'static str, Vec<&'static str>)>) -> Arc<Self> {
        Arc::new(Self {
            delay: Duration::from_millis(delay_ms),
            answers,
            asked: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl SuggestionProvider for Scripted {
    async fn suggest(&self, sentence: &str) -> zeroclick::Result<Vec<String>> {
        self.asked.lock().unwrap().push(sentence.to_string());
        let answer = self
            .answers
            .iter()
            .find(|(s, _)| *s == sentence)
            .map(|(_, words)| words.iter().map(|w| w.to_string()).collect());
        match answer {
            Some(words) => {
                tokio::time::sleep(self.delay).await;
                Ok(words)
            }
            None => std::future::pending().await,
        }
    }
}

fn session(provider: Arc<Scripted>) -> Session {
    let config = Config::default();
    Session::new(&config, PointerTracker::new(), Arc::new(Quiet)).with_suggestions(
        SuggestionRequester::new(provider, BUDGET, config.suggestions.max),
    )
}

fn layout_changes(events: &[SessionEvent]) -> Vec<LayoutId> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::LayoutChanged(id) => Some(*id),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_late_response_for_older_sentence_is_dropped() {
    let provider = Scripted::new(
        50,
        vec![("i", vec!["cake"]), ("i like", vec!["pizza", "trains"])],
    );
    let mut s = session(provider.clone());
    let now = Instant::now();

    s.execute("i", now).unwrap();
    // Response for "i" lands in the channel but is not drained yet
    tokio::time::sleep(Duration::from_millis(100)).await;
    s.execute("like", now).unwrap();
    assert_eq!(s.layout().id(), LayoutId::AfterILike);

    let events = s.on_tick(now);
    assert!(layout_changes(&events).is_empty());
    assert_eq!(s.layout().id(), LayoutId::AfterILike);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let events = s.on_tick(now);
    assert_eq!(layout_changes(&events), vec![LayoutId::Suggested]);
    assert_eq!(s.layout().keys()[6].label, "pizza");
    assert_eq!(s.layout().keys()[7].label, "trains");
    assert_eq!(*provider.asked.lock().unwrap(), vec!["i", "i like"]);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_keeps_rule_layout() {
    let provider = Scripted::new(0, Vec::new());
    let mut s = session(provider);
    let now = Instant::now();

    s.execute("i", now).unwrap();
    tokio::time::sleep(BUDGET - Duration::from_millis(100)).await;
    assert!(s.on_tick(now).is_empty());

    tokio::time::sleep(Duration::from_millis(200)).await;
    let events = s.on_tick(now);
    assert!(layout_changes(&events).is_empty());
    assert_eq!(s.layout().id(), LayoutId::AfterI);
    assert!(s.layout().keys().iter().any(|k| k.id == "would"));
}

#[tokio::test(start_paused = true)]
async fn test_suggested_layout_keeps_navigation() {
    let provider = Scripted::new(10, vec![("i like", vec!["pizza"])]);
    let mut s = session(provider);
    let now = Instant::now();

    s.execute("i", now).unwrap();
    s.execute("like", now).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    s.on_tick(now);
    assert_eq!(s.layout().id(), LayoutId::Suggested);

    let registry = s.layout().registry();
    for id in ["i", "questions", "describe", "vocab", "clear", SPEAKER_ID, BACKSPACE_ID] {
        assert!(registry.iter().any(|t| t.id == id), "missing {}", id);
    }
    assert_eq!(registry.len(), 26);

    // Suggested words commit like any other word
    s.execute("llm_0", now).unwrap();
    assert_eq!(s.sentence(), "i like pizza");
    assert_eq!(s.layout().id(), LayoutId::Default);
}

#[tokio::test(start_paused = true)]
async fn test_new_word_supersedes_in_flight_request() {
    let provider = Scripted::new(
        1000,
        vec![("i", vec!["cake"]), ("i love", vec!["dogs"])],
    );
    let mut s = session(provider.clone());
    let now = Instant::now();

    s.execute("i", now).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    s.execute("love", now).unwrap();
    tokio::time::sleep(Duration::from_millis(2000)).await;

    let events = s.on_tick(now);
    assert_eq!(layout_changes(&events), vec![LayoutId::Suggested]);
    assert_eq!(s.layout().keys()[6].label, "dogs");
    assert!(s.on_tick(now).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_backspace_cancels_pending_suggestions() {
    let provider = Scripted::new(500, vec![("i", vec!["cake"])]);
    let mut s = session(provider);
    let now = Instant::now();

    s.execute("i", now).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    s.execute(BACKSPACE_ID, now).unwrap();
    tokio::time::sleep(Duration::from_millis(1000)).await;

    assert!(s.on_tick(now).is_empty());
    assert_eq!(s.layout().id(), LayoutId::AfterI);
    assert_eq!(s.sentence(), "");
}

#[tokio::test(start_paused = true)]
async fn test_backspace_keeps_suggested_grid() {
    let provider = Scripted::new(10, vec![("i like", vec!["pizza"])]);
    let mut s = session(provider);
    let now = Instant::now();

    s.execute("i", now).unwrap();
    s.execute("like", now).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    s.on_tick(now);
    assert_eq!(s.layout().id(), LayoutId::Suggested);

    let events = s.execute(BACKSPACE_ID, now).unwrap();
    assert!(layout_changes(&events).is_empty());
    assert_eq!(s.sentence(), "i");
    assert_eq!(s.layout().id(), LayoutId::Suggested);
    assert_eq!(s.layout().keys()[6].label, "pizza");
}

#[tokio::test(start_paused = true)]
async fn test_backspace_discards_queued_response() {
    let provider = Scripted::new(10, vec![("i", vec!["cake"])]);
    let mut s = session(provider);
    let now = Instant::now();

    s.execute("i", now).unwrap();
    // Answer for "i" is queued but not yet drained
    tokio::time::sleep(Duration::from_millis(50)).await;
    s.execute(BACKSPACE_ID, now).unwrap();

    assert!(layout_changes(&s.on_tick(now)).is_empty());
    assert_eq!(s.layout().id(), LayoutId::AfterI);
}
