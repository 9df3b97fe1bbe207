use std::collections::BTreeSet;
use std::io;
use std::path::Path;

use tracing::{info, warn};

/// Raised when user text contains a disallowed word.
#[derive(Debug, thiserror::Error)]
#[error("text contains disallowed words")]
pub struct ContentRejected {
    pub word: String,
}

/// Plain substring blocklist applied before any scoring or persistence.
#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    words: BTreeSet<String>,
}

impl ContentFilter {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|word| word.as_ref().trim().to_string())
            .filter(|word| !word.is_empty())
            .collect();
        Self { words }
    }

    /// One word per line; blank lines are skipped.
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::new(contents.lines()))
    }

    /// Like [`ContentFilter::from_file`], but a missing or unreadable list
    /// yields an empty filter.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::from_file(path) {
            Ok(filter) => {
                info!(path = %path.display(), words = filter.len(), "loaded content filter");
                filter
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "content filter unavailable; accepting all text");
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn check(&self, text: &str) -> Result<(), ContentRejected> {
        match self.words.iter().find(|word| text.contains(word.as_str())) {
            Some(word) => Err(ContentRejected { word: word.clone() }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_substrings() {
        let filter = ContentFilter::new(["badword", "  ", " spam "]);
        assert_eq!(filter.len(), 2);
        assert!(filter.check("a perfectly fine picnic").is_ok());

        let rejected = filter.check("this has spammy notes").expect_err("blocked");
        assert_eq!(rejected.word, "spam");
        assert!(filter.check("xbadwordx").is_err());
    }

    #[test]
    fn missing_file_yields_empty_filter() {
        let filter = ContentFilter::load_or_empty(Path::new("/nonexistent/ng_words.txt"));
        assert!(filter.is_empty());
        assert!(filter.check("anything goes").is_ok());
    }

    #[test]
    fn reads_one_word_per_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ng_words.txt");
        std::fs::write(&path, "alpha\n\n beta \n").expect("write list");
        let filter = ContentFilter::from_file(&path).expect("read list");

        assert_eq!(filter.len(), 2);
        assert!(filter.check("the beta test").is_err());
    }
}
