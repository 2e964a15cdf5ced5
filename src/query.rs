use rust_stemmers::{Algorithm, Stemmer};
use std::collections::{BTreeSet, HashSet};
use std::sync::OnceLock;

/// Characters stripped from both ends of every query word.
const TRIM_CHARS: &[char] = &[
    '.', ',', '\'', '"', '!', '?', ';', ':', '(', ')', '[', ']', '{', '}',
];

/// Returns a reference to a HashSet containing common English stop words.
pub fn stop_words() -> &'static HashSet<String> {
    static STOP_WORDS: OnceLock<HashSet<String>> = OnceLock::new();
    STOP_WORDS.get_or_init(|| {
        let words = [
            "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any",
            "are", "aren't", "as", "at", "be", "because", "been", "before", "being", "below",
            "between", "both", "but", "by", "can", "can't", "cannot", "could", "couldn't", "did",
            "didn't", "do", "does", "doesn't", "doing", "don't", "down", "during", "each", "few",
            "for", "from", "further", "had", "hadn't", "has", "hasn't", "have", "haven't",
            "having", "he", "he'd", "he'll", "he's", "her", "here", "here's", "hers", "herself",
            "him", "himself", "his", "how", "how's", "i", "i'd", "i'll", "i'm", "i've", "if",
            "in", "into", "is", "isn't", "it", "it's", "its", "itself", "just", "let's", "me",
            "more", "most", "mustn't", "my", "myself", "no", "nor", "not", "now", "of", "off",
            "on", "once", "only", "or", "other", "ought", "our", "ours", "ourselves", "out",
            "over", "own", "s", "same", "shan't", "she", "she'd", "she'll", "she's", "should",
            "shouldn't", "so", "some", "such", "t", "than", "that", "that's", "the", "their",
            "theirs", "them", "themselves", "then", "there", "there's", "these", "they",
            "they'd", "they'll", "they're", "they've", "this", "those", "through", "to", "too",
            "under", "until", "up", "very", "was", "wasn't", "we", "we'd", "we'll", "we're",
            "we've", "were", "weren't", "what", "what's", "when", "when's", "where", "where's",
            "which", "while", "who", "who's", "whom", "why", "why's", "will", "with", "won't",
            "would", "wouldn't", "you", "you'd", "you'll", "you're", "you've", "your", "yours",
            "yourself", "yourselves",
        ];
        words.into_iter().map(String::from).collect()
    })
}

/// Returns a reference to the English stemmer.
pub fn get_stemmer() -> &'static Stemmer {
    static STEMMER: OnceLock<Stemmer> = OnceLock::new();
    STEMMER.get_or_init(|| Stemmer::create(Algorithm::English))
}

/// Normalizes a raw query string into its identity form.
///
/// The text is lowercased, split on whitespace, stripped of surrounding
/// punctuation and filtered against the stop-word list. The surviving words
/// are joined with single spaces. Queries made only of stop words normalize
/// to the empty string.
pub fn normalize_query(raw: &str) -> String {
    let stop_words = stop_words();
    let lowered = raw.to_lowercase();

    lowered
        .split_whitespace()
        .map(|word| word.trim_matches(TRIM_CHARS))
        .filter(|word| !word.is_empty() && !stop_words.contains(*word))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalizes every query in `raw`, dropping the ones that end up empty.
/// Order and duplicates are preserved.
pub fn normalize_all<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .map(|q| normalize_query(q.as_ref()))
        .filter(|q| !q.is_empty())
        .collect()
}

/// Returns the set of words of an already normalized query.
pub fn token_set(query: &str) -> BTreeSet<String> {
    query.split_whitespace().map(String::from).collect()
}

/// Tokenizes text for content comparison: lowercase, split on non-alphanumeric
/// characters, remove stop words and apply stemming.
pub fn stemmed_tokens(text: &str) -> Vec<String> {
    let stop_words = stop_words();
    let stemmer = get_stemmer();
    let text = text.to_lowercase();

    let mut tokens = Vec::new();
    for word in text.split_whitespace() {
        let mut current_token = String::new();
        for c in word.chars() {
            if c.is_alphanumeric() {
                current_token.push(c);
            } else if !current_token.is_empty() {
                tokens.push(std::mem::take(&mut current_token));
            }
        }
        if !current_token.is_empty() {
            tokens.push(current_token);
        }
    }

    tokens
        .into_iter()
        .filter(|s| !stop_words.contains(s))
        .map(|s| stemmer.stem(&s).to_string())
        .collect()
}

/// Turns a seed query into a token usable as a file name.
///
/// Alphanumerics and `-` survive, everything else becomes `_`, and runs of `_`
/// collapse. A seed with nothing usable maps to `"seed"`.
pub fn sanitize_seed(seed: &str) -> String {
    let mut token = String::with_capacity(seed.len());
    for c in seed.trim().to_lowercase().chars() {
        if c.is_alphanumeric() || c == '-' {
            token.push(c);
        } else if !token.ends_with('_') {
            token.push('_');
        }
    }
    let token = token.trim_matches('_');
    if token.is_empty() {
        "seed".to_string()
    } else {
        token.to_string()
    }
}
