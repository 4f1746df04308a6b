//! Session word list. Every player in a session types through the same
//! growing list of words; the list is produced page by page from a
//! pluggable source so tests can run against a deterministic sequence.

use embeddy::Embedded;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::{Arc, OnceLock};

/// Number of words fetched from the source at a time
pub const PAGE_SIZE: usize = 100;

/// Share of a page drawn from the yo lexicon
const YO_SHARE: f64 = 0.1;

/// A source of word pages
pub trait WordSource: Send + Sync {
    fn page(&self, count: usize) -> Vec<String>;
}

/// Word lexicons bundled into the binary
#[derive(Embedded)]
#[folder = "src/resources"]
struct Lexicon;

fn load_lexicon(name: &str) -> Vec<String> {
    let raw = Lexicon::get(name).expect("missing bundled lexicon");
    serde_json::from_slice(raw).expect("malformed bundled lexicon")
}

fn regular_words() -> &'static [String] {
    static WORDS: OnceLock<Vec<String>> = OnceLock::new();
    WORDS.get_or_init(|| load_lexicon("words_regular.json"))
}

fn yo_words() -> &'static [String] {
    static WORDS: OnceLock<Vec<String>> = OnceLock::new();
    WORDS.get_or_init(|| load_lexicon("words_yo.json"))
}

/// Production word source: samples 90% regular and 10% yo words with
/// replacement and shuffles the page
pub struct LexiconSource;

impl WordSource for LexiconSource {
    fn page(&self, count: usize) -> Vec<String> {
        let yo_count = (count as f64 * YO_SHARE) as usize;
        let regular_count = count - yo_count;

        let regular = regular_words();
        let yo = yo_words();

        let mut rng = rand::thread_rng();
        let mut page: Vec<String> = Vec::with_capacity(count);
        page.extend((0..regular_count).map(|_| regular[rng.gen_range(0..regular.len())].clone()));
        page.extend((0..yo_count).map(|_| yo[rng.gen_range(0..yo.len())].clone()));
        page.shuffle(&mut rng);
        page
    }
}

/// The accumulated word list of one session. The list only ever grows;
/// the new-word cursor starts at the end of the first page so that the
/// words handed out by [`next_word`](WordProvider::next_word) always lie
/// beyond the initial list clients received on join.
pub struct WordProvider {
    source: Arc<dyn WordSource>,
    words: Vec<String>,
    next: usize,
}

impl std::fmt::Debug for WordProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WordProvider")
            .field("words", &self.words)
            .field("next", &self.next)
            .finish()
    }
}

impl WordProvider {
    pub fn new(source: Arc<dyn WordSource>) -> WordProvider {
        let words = source.page(PAGE_SIZE);
        let next = words.len();
        WordProvider {
            source,
            words,
            next,
        }
    }

    /// The full list accumulated so far
    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// Produces the next fresh word, fetching another page when the
    /// cursor ran past the list
    pub fn next_word(&mut self) -> String {
        if self.next >= self.words.len() {
            self.extend();
        }
        let word = self.words[self.next].clone();
        self.next += 1;
        word
    }

    /// The word at an absolute position in the list, extending the list
    /// as needed so a player cursor can never run past it
    pub fn word_at(&mut self, index: usize) -> String {
        while index >= self.words.len() {
            self.extend();
        }
        self.words[index].clone()
    }

    fn extend(&mut self) {
        let page = self.source.page(PAGE_SIZE);
        self.words.extend(page);
    }
}

/// Deterministic word source used by tests across the crate
#[cfg(test)]
pub struct SequenceSource(std::sync::atomic::AtomicUsize);

#[cfg(test)]
impl SequenceSource {
    pub fn new() -> SequenceSource {
        SequenceSource(std::sync::atomic::AtomicUsize::new(0))
    }
}

#[cfg(test)]
impl WordSource for SequenceSource {
    fn page(&self, count: usize) -> Vec<String> {
        let start = self
            .0
            .fetch_add(count, std::sync::atomic::Ordering::SeqCst);
        (start..start + count).map(|i| format!("word{i}")).collect()
    }
}
