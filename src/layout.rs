//! Vocabulary grids and the rules that pick between them
//!
//! Static layouts are declarative tables of `KeySpec`s. The only layout that
//! is built at runtime is `Suggested`, which starts from the default grid and
//! has its word slots overwritten by provider suggestions.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::target::{BACKSPACE_ID, Region, SPEAKER_ID, Target, TargetKind};

/// First grid slot a suggestion may land in (the top row is navigation)
pub const SUGGESTION_SLOT_START: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutId {
    Default,
    AfterI,
    AfterILike,
    AfterILikeToPlay,
    Vocab,
    Questions,
    Places,
    People,
    Describe,
    Colors,
    Suggested,
}

impl LayoutId {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutId::Default => "default",
            LayoutId::AfterI => "afterI",
            LayoutId::AfterILike => "afterILike",
            LayoutId::AfterILikeToPlay => "afterILikeToPlay",
            LayoutId::Vocab => "vocab",
            LayoutId::Questions => "questions",
            LayoutId::Places => "places",
            LayoutId::People => "people",
            LayoutId::Describe => "describe",
            LayoutId::Colors => "colors",
            LayoutId::Suggested => "llm",
        }
    }

    /// Static layout a category key opens, if any
    pub fn from_category(id: &str) -> Option<Self> {
        match id {
            "vocab" => Some(LayoutId::Vocab),
            "questions" => Some(LayoutId::Questions),
            "places" => Some(LayoutId::Places),
            "people" => Some(LayoutId::People),
            "describe" => Some(LayoutId::Describe),
            "colors" => Some(LayoutId::Colors),
            _ => None,
        }
    }

    pub fn keys(&self) -> &'static [KeySpec] {
        match self {
            LayoutId::Default | LayoutId::Suggested => DEFAULT,
            LayoutId::AfterI => AFTER_I,
            LayoutId::AfterILike => AFTER_I_LIKE,
            LayoutId::AfterILikeToPlay | LayoutId::Vocab => VOCAB,
            LayoutId::Questions => QUESTIONS,
            LayoutId::Places => PLACES,
            LayoutId::People => PEOPLE,
            LayoutId::Describe => DESCRIBE,
            LayoutId::Colors => COLORS,
        }
    }
}

impl fmt::Display for LayoutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySpec {
    pub id: &'static str,
    pub label: &'static str,
    pub kind: TargetKind,
}

const fn w(id: &'static str, label: &'static str) -> KeySpec {
    KeySpec {
        id,
        label,
        kind: TargetKind::Word,
    }
}

const fn c(id: &'static str, label: &'static str) -> KeySpec {
    KeySpec {
        id,
        label,
        kind: TargetKind::Category,
    }
}

const fn a(id: &'static str, label: &'static str) -> KeySpec {
    KeySpec {
        id,
        label,
        kind: TargetKind::Action,
    }
}

#[rustfmt::skip]
const DEFAULT: &[KeySpec] = &[
    w("i", "i"), c("questions", "QUESTIONS"), c("places", "PLACES"), c("social", "SOCIAL"), a("time", "TIME"), a("exit", "EXIT"),
    w("my", "my"), w("can", "can"), w("to", "to"), w("eat", "eat"), w("good", "good"), c("describe", "DESCRIBE"),
    w("you", "you"), w("do", "do"), w("drink", "drink"), w("play", "play"), w("stop", "stop"), c("vocab", "VOCAB"),
    w("it", "it"), w("dont", "don't"), w("like", "like"), w("yes", "yes"), w("watch", "watch"), a("clear", "clear"),
];

#[rustfmt::skip]
const AFTER_I: &[KeySpec] = &[
    w("would", "would"), w("am", "am"), w("have", "have"), w("got", "got"), c("social", "SOCIAL"), a("home", "HOME"),
    w("could", "could"), w("can", "can"), w("m", "'m"), w("eat", "eat"), w("hurt", "hurt"), w("need", "need"),
    w("will", "will"), w("do", "do"), w("drink", "drink"), w("play", "play"), w("stop", "stop"), w("buy", "buy"),
    w("was", "was"), w("dont", "don't"), w("like", "like"), w("love", "love"), w("watch", "watch"), a("clear", "clear"),
];

#[rustfmt::skip]
const AFTER_I_LIKE: &[KeySpec] = &[
    w("i", "i"), c("questions", "QUESTIONS"), c("places", "PLACES"), c("people", "PEOPLE"), a("time", "TIME"), a("home", "HOME"),
    w("my", "my"), w("todo", "to do"), w("tohave", "to have"), w("toeat", "to eat"), w("tocall", "to call"), c("describe", "DESCRIBE"),
    w("you", "you"), w("ed", "-ed"), w("todrink", "to drink"), w("toplay", "to play"), w("tostop", "to stop"), c("vocab", "VOCAB"),
    w("it", "it"), w("s", "-s"), w("tolike", "to like"), w("tolisten", "to listen"), w("towatch", "to watch"), a("clear", "clear"),
];

/// Also shown after "to play"
#[rustfmt::skip]
const VOCAB: &[KeySpec] = &[
    w("i", "i"), w("to", "to"), w("a", "a"), w("bicycle", "bicycle"), w("videogame", "video game"), a("home", "HOME"),
    w("my", "my"), w("ed", "-ed"), w("and", "and"), w("puzzle", "puzzle"), w("boardgame", "board game"), c("colors", "colors"),
    w("me", "me"), w("ing", "-ing"), w("crayons", "crayons"), w("legos", "legos"), w("sports", "sports"), w("ball", "ball"),
    w("you", "you"), w("s", "-s"), w("cars", "cars"), w("swing", "swing"), w("watch", "watch"), a("clear", "clear"),
];

#[rustfmt::skip]
const QUESTIONS: &[KeySpec] = &[
    w("what", "what"), w("where", "where"), w("who", "who"), w("when", "when"), w("why", "why"), w("how", "how"),
    w("is", "is"), w("are", "are"), w("can", "can"), w("do", "do"), w("want", "want"), w("go", "go"),
    w("you", "you"), w("it", "it"), w("that", "that"), w("this", "this"), w("there", "there"), w("help", "help"),
    w("more", "more"), w("finished", "finished"), w("yes", "yes"), w("no", "no"), a("home", "HOME"), a("clear", "clear"),
];

#[rustfmt::skip]
const PLACES: &[KeySpec] = &[
    w("school", "school"), w("park", "park"), w("house", "house"), w("store", "store"), w("hospital", "hospital"), w("outside", "outside"),
    w("go", "go"), w("to", "to"), w("the", "the"), w("at", "at"), w("in", "in"), w("bathroom", "bathroom"),
    w("kitchen", "kitchen"), w("bedroom", "bedroom"), w("car", "car"), w("bus", "bus"), w("playground", "playground"), w("library", "library"),
    w("restaurant", "restaurant"), w("beach", "beach"), w("church", "church"), w("work", "work"), a("home", "HOME"), a("clear", "clear"),
];

#[rustfmt::skip]
const PEOPLE: &[KeySpec] = &[
    w("mom", "mom"), w("dad", "dad"), w("brother", "brother"), w("sister", "sister"), w("friend", "friend"), w("teacher", "teacher"),
    w("grandma", "grandma"), w("grandpa", "grandpa"), w("baby", "baby"), w("doctor", "doctor"), w("nurse", "nurse"), w("therapist", "therapist"),
    w("he", "he"), w("she", "she"), w("they", "they"), w("we", "we"), w("me", "me"), w("you", "you"),
    w("with", "with"), w("and", "and"), w("want", "want"), w("see", "see"), a("home", "HOME"), a("clear", "clear"),
];

#[rustfmt::skip]
const DESCRIBE: &[KeySpec] = &[
    w("big", "big"), w("small", "small"), w("hot", "hot"), w("cold", "cold"), w("happy", "happy"), w("sad", "sad"),
    w("good", "good"), w("bad", "bad"), w("fast", "fast"), w("slow", "slow"), w("loud", "loud"), w("quiet", "quiet"),
    w("tired", "tired"), w("hungry", "hungry"), w("thirsty", "thirsty"), w("sick", "sick"), w("hurt", "hurt"), w("scared", "scared"),
    w("more", "more"), w("very", "very"), w("not", "not"), c("colors", "COLORS"), a("home", "HOME"), a("clear", "clear"),
];

#[rustfmt::skip]
const COLORS: &[KeySpec] = &[
    w("red", "red"), w("blue", "blue"), w("green", "green"), w("yellow", "yellow"), w("orange", "orange"), w("purple", "purple"),
    w("pink", "pink"), w("black", "black"), w("white", "white"), w("brown", "brown"), w("gray", "gray"), w("gold", "gold"),
    w("light", "light"), w("dark", "dark"), w("and", "and"), w("the", "the"), w("it", "it"), w("is", "is"),
    w("more", "more"), w("not", "not"), w("favorite", "favorite"), w("color", "color"), a("home", "HOME"), a("clear", "clear"),
];

/// Lower-case word tokens used for rule matching.
///
/// Runs of whitespace collapse, and punctuation at either end of a token is
/// dropped (apostrophes are kept, so "don't" stays one word).
pub fn tokenize(sentence: &str) -> Vec<String> {
    sentence
        .split_whitespace()
        .map(|word| {
            word.trim_matches(|ch: char| ch.is_ascii_punctuation() && ch != '\'')
                .to_lowercase()
        })
        .filter(|word| !word.is_empty())
        .collect()
}

/// Rule-based next layout for a sentence
pub fn rule_layout(sentence: &str) -> LayoutId {
    let tokens = tokenize(sentence);
    let words: Vec<&str> = tokens.iter().map(String::as_str).collect();

    if words.ends_with(&["i", "like", "to", "play"]) || words.ends_with(&["to", "play"]) {
        LayoutId::AfterILikeToPlay
    } else if words.ends_with(&["i", "like"]) || words.ends_with(&["i", "love"]) {
        LayoutId::AfterILike
    } else if words.ends_with(&["i"]) {
        LayoutId::AfterI
    } else {
        LayoutId::Default
    }
}

/// Where keys and the two controls sit on the render surface
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct GridGeometry {
    pub origin_x: f32,
    pub origin_y: f32,
    pub cell_width: f32,
    pub cell_height: f32,
    pub gap: f32,
    pub columns: usize,
    pub speaker_x: f32,
    pub backspace_x: f32,
    pub controls_y: f32,
    pub control_width: f32,
    pub control_height: f32,
}

impl Default for GridGeometry {
    fn default() -> Self {
        Self {
            origin_x: 0.0,
            origin_y: 4.0,
            cell_width: 14.0,
            cell_height: 3.0,
            gap: 1.0,
            columns: 6,
            speaker_x: 62.0,
            backspace_x: 76.0,
            controls_y: 0.0,
            control_width: 13.0,
            control_height: 3.0,
        }
    }
}

impl GridGeometry {
    pub fn key_region(&self, index: usize) -> Region {
        let columns = self.columns.max(1);
        let col = (index % columns) as f32;
        let row = (index / columns) as f32;
        Region::rect(
            self.origin_x + col * (self.cell_width + self.gap),
            self.origin_y + row * (self.cell_height + self.gap),
            // Edges are inclusive; shave a hair off so neighbours never overlap
            self.cell_width - 0.01,
            self.cell_height - 0.01,
        )
    }

    pub fn speaker_region(&self) -> Region {
        Region::rect(
            self.speaker_x,
            self.controls_y,
            self.control_width,
            self.control_height,
        )
    }

    pub fn backspace_region(&self) -> Region {
        Region::rect(
            self.backspace_x,
            self.controls_y,
            self.control_width,
            self.control_height,
        )
    }

    pub fn controls(&self) -> [Target; 2] {
        [
            Target::new(SPEAKER_ID, TargetKind::Control, "SPEAK", self.speaker_region()),
            Target::new(BACKSPACE_ID, TargetKind::Control, "BACK", self.backspace_region()),
        ]
    }
}

/// The grid currently on screen
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutState {
    pub id: LayoutId,
    /// Grid keys in row-major order, controls excluded
    pub keys: Arc<[Target]>,
}

/// Picks the active grid and rebuilds the target registry on every change.
///
/// Every change bumps `generation`; suggestion responses carry the generation
/// they were requested at and are dropped if it has moved on.
#[derive(Debug)]
pub struct LayoutEngine {
    geometry: GridGeometry,
    max_suggestions: usize,
    current: LayoutState,
    registry: Arc<[Target]>,
    generation: u64,
}

impl LayoutEngine {
    pub fn new(geometry: GridGeometry, max_suggestions: usize) -> Self {
        let keys = place(&geometry, LayoutId::Default.keys().iter().map(owned));
        let registry = registry(&geometry, &keys);
        Self {
            geometry,
            max_suggestions,
            current: LayoutState {
                id: LayoutId::Default,
                keys,
            },
            registry,
            generation: 0,
        }
    }

    pub fn current(&self) -> &LayoutState {
        &self.current
    }

    pub fn id(&self) -> LayoutId {
        self.current.id
    }

    pub fn keys(&self) -> &Arc<[Target]> {
        &self.current.keys
    }

    /// Keys plus controls, as handed to the hover resolver
    pub fn registry(&self) -> Arc<[Target]> {
        Arc::clone(&self.registry)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// Switch to a static layout
    pub fn show(&mut self, id: LayoutId) {
        let keys = place(&self.geometry, id.keys().iter().map(owned));
        self.install(id, keys);
    }

    pub fn reset(&mut self) {
        self.show(LayoutId::Default);
    }

    /// Rule transition after the sentence changed by a word.
    /// Returns the generation a suggestion response must match.
    pub fn after_word(&mut self, sentence: &str) -> u64 {
        self.show(rule_layout(sentence));
        self.generation
    }

    /// Swap in the suggestion grid if `generation` is still current.
    ///
    /// `Ok(false)` means nothing usable came back and the rule layout stays.
    pub fn apply_suggestions(&mut self, generation: u64, suggestions: &[String]) -> Result<bool> {
        if generation != self.generation {
            return Err(Error::StaleCommit {
                generation,
                current: self.generation,
            });
        }
        let Some(slots) = suggested_keys(suggestions, self.max_suggestions) else {
            return Ok(false);
        };
        let keys = place(&self.geometry, slots.into_iter());
        self.install(LayoutId::Suggested, keys);
        Ok(true)
    }

    fn install(&mut self, id: LayoutId, keys: Arc<[Target]>) {
        self.generation += 1;
        self.registry = registry(&self.geometry, &keys);
        debug!(layout = %id, generation = self.generation, keys = keys.len(), "layout installed");
        self.current = LayoutState { id, keys };
    }
}

struct Slot {
    id: String,
    label: String,
    kind: TargetKind,
}

fn owned(spec: &KeySpec) -> Slot {
    Slot {
        id: spec.id.to_string(),
        label: spec.label.to_string(),
        kind: spec.kind,
    }
}

/// Default grid with word slots from `SUGGESTION_SLOT_START` on replaced, in
/// order, by suggestions. Navigation keys keep their place. `None` if there
/// was nothing to place.
fn suggested_keys(suggestions: &[String], max: usize) -> Option<Vec<Slot>> {
    let mut words = suggestions
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .take(max)
        .enumerate()
        .peekable();
    words.peek()?;

    let mut slots: Vec<Slot> = DEFAULT.iter().map(owned).collect();
    for slot in slots.iter_mut().skip(SUGGESTION_SLOT_START) {
        if slot.kind != TargetKind::Word {
            continue;
        }
        let Some((i, word)) = words.next() else {
            break;
        };
        *slot = Slot {
            id: format!("llm_{}", i),
            label: word.to_string(),
            kind: TargetKind::Word,
        };
    }
    Some(slots)
}

fn place(geometry: &GridGeometry, slots: impl Iterator<Item = Slot>) -> Arc<[Target]> {
    slots
        .enumerate()
        .map(|(i, slot)| Target::new(slot.id, slot.kind, slot.label, geometry.key_region(i)))
        .collect()
}

fn registry(geometry: &GridGeometry, keys: &[Target]) -> Arc<[Target]> {
    keys.iter()
        .cloned()
        .chain(geometry.controls())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_rule_layout() {
        assert_eq!(rule_layout("I"), LayoutId::AfterI);
        assert_eq!(rule_layout("I like"), LayoutId::AfterILike);
        assert_eq!(rule_layout("I love"), LayoutId::AfterILike);
        assert_eq!(rule_layout("I like to play"), LayoutId::AfterILikeToPlay);
        assert_eq!(rule_layout("you want to play"), LayoutId::AfterILikeToPlay);
        assert_eq!(rule_layout("I like a bicycle"), LayoutId::Default);
        assert_eq!(rule_layout(""), LayoutId::Default);
    }

    #[test]
    fn test_rule_layout_whitespace_and_punctuation() {
        assert_eq!(rule_layout("  I   like  "), LayoutId::AfterILike);
        assert_eq!(rule_layout("I like to play."), LayoutId::AfterILikeToPlay);
        assert_eq!(rule_layout("so, I"), LayoutId::AfterI);
        assert_eq!(tokenize("Don't STOP!"), vec!["don't", "stop"]);
    }

    #[test]
    fn test_static_tables_are_full_grids_with_unique_ids() {
        let all = [
            LayoutId::Default,
            LayoutId::AfterI,
            LayoutId::AfterILike,
            LayoutId::AfterILikeToPlay,
            LayoutId::Vocab,
            LayoutId::Questions,
            LayoutId::Places,
            LayoutId::People,
            LayoutId::Describe,
            LayoutId::Colors,
        ];
        for id in all {
            let keys = id.keys();
            assert_eq!(keys.len(), 24, "{}", id);
            let ids: HashSet<_> = keys.iter().map(|k| k.id).collect();
            assert_eq!(ids.len(), keys.len(), "{}", id);
            assert!(!ids.contains(SPEAKER_ID) && !ids.contains(BACKSPACE_ID));
        }
    }

    #[test]
    fn test_category_ids_resolve() {
        assert_eq!(LayoutId::from_category("vocab"), Some(LayoutId::Vocab));
        assert_eq!(LayoutId::from_category("places"), Some(LayoutId::Places));
        assert_eq!(LayoutId::from_category("social"), None);
    }

    #[test]
    fn test_geometry_regions_do_not_overlap() {
        let g = GridGeometry::default();
        let r0 = g.key_region(0);
        let r1 = g.key_region(1);
        let r6 = g.key_region(6);
        let (x0, y0, w0, h0) = r0.bounds();
        assert!(!r1.contains(x0 + w0, y0));
        assert!(!r6.contains(x0, y0 + h0));
        assert!(r0.contains(x0 + 1.0, y0 + 1.0));
    }

    #[test]
    fn test_registry_has_keys_then_controls() {
        let engine = LayoutEngine::new(GridGeometry::default(), 18);
        let registry = engine.registry();
        assert_eq!(registry.len(), 26);
        assert_eq!(registry[24].id, SPEAKER_ID);
        assert_eq!(registry[25].id, BACKSPACE_ID);
        assert_eq!(engine.keys().len(), 24);
    }

    #[test]
    fn test_every_change_bumps_generation() {
        let mut engine = LayoutEngine::new(GridGeometry::default(), 18);
        let g0 = engine.generation();
        engine.show(LayoutId::Vocab);
        assert_eq!(engine.id(), LayoutId::Vocab);
        let g1 = engine.after_word("I");
        assert!(g1 > g0);
        assert_eq!(engine.id(), LayoutId::AfterI);
        engine.reset();
        assert_eq!(engine.id(), LayoutId::Default);
        assert!(engine.generation() > g1);
    }

    #[test]
    fn test_suggestions_fill_word_slots_only() {
        let mut engine = LayoutEngine::new(GridGeometry::default(), 18);
        let generation = engine.after_word("I want");
        let words: Vec<String> = (0..30).map(|i| format!("w{}", i)).collect();
        assert!(engine.apply_suggestions(generation, &words).unwrap());
        assert_eq!(engine.id(), LayoutId::Suggested);

        let keys = engine.keys();
        assert_eq!(keys.len(), 24);
        // top row untouched
        for (key, spec) in keys.iter().zip(DEFAULT).take(SUGGESTION_SLOT_START) {
            assert_eq!(key.id, spec.id);
        }
        assert_eq!(keys[6].id, "llm_0");
        assert_eq!(keys[6].label, "w0");
        assert_eq!(keys[11].id, "describe");
        assert_eq!(keys[17].id, "vocab");
        assert_eq!(keys[23].id, "clear");
    }

    #[test]
    fn test_suggestions_capped() {
        let mut engine = LayoutEngine::new(GridGeometry::default(), 2);
        let generation = engine.after_word("hello");
        let words = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        engine.apply_suggestions(generation, &words).unwrap();
        let keys = engine.keys();
        assert_eq!(keys[7].label, "b");
        assert_eq!(keys[8].id, "to");
    }

    #[test]
    fn test_stale_suggestions_rejected() {
        let mut engine = LayoutEngine::new(GridGeometry::default(), 18);
        let stale = engine.after_word("I");
        engine.after_word("I like");
        let result = engine.apply_suggestions(stale, &["cake".to_string()]);
        assert!(matches!(result, Err(Error::StaleCommit { .. })));
        assert_eq!(engine.id(), LayoutId::AfterILike);
    }

    #[test]
    fn test_empty_suggestions_keep_rule_layout() {
        let mut engine = LayoutEngine::new(GridGeometry::default(), 18);
        let generation = engine.after_word("I");
        assert!(!engine.apply_suggestions(generation, &[" ".to_string()]).unwrap());
        assert_eq!(engine.id(), LayoutId::AfterI);
        assert_eq!(engine.generation(), generation);
    }
}
