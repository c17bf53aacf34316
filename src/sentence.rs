//! The utterance being composed

/// Words joined by single spaces. Every operation is total.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SentenceBuffer {
    text: String,
}

impl SentenceBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, word: &str) {
        if self.text.is_empty() {
            self.text.push_str(word);
        } else {
            self.text.push(' ');
            self.text.push_str(word);
        }
    }

    /// Drop the last whitespace-delimited token
    pub fn backspace(&mut self) {
        let trimmed = self.text.trim_end();
        let cut = match trimmed.rfind(char::is_whitespace) {
            Some(pos) => trimmed[..pos].trim_end().len(),
            None => 0,
        };
        self.text.truncate(cut);
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

impl std::fmt::Display for SentenceBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_backspace() {
        let mut s = SentenceBuffer::new();
        s.append("Hello");
        s.append("World");
        assert_eq!(s.as_str(), "Hello World");
        s.backspace();
        assert_eq!(s.as_str(), "Hello");
        s.backspace();
        assert_eq!(s.as_str(), "");
        s.backspace();
        assert_eq!(s.as_str(), "");
    }

    #[test]
    fn test_multi_word_label_backspaces_one_token() {
        let mut s = SentenceBuffer::new();
        s.append("i");
        s.append("like");
        s.append("to play");
        assert_eq!(s.as_str(), "i like to play");
        s.backspace();
        assert_eq!(s.as_str(), "i like to");
    }

    #[test]
    fn test_clear() {
        let mut s = SentenceBuffer::new();
        s.append("yes");
        s.clear();
        assert!(s.is_blank());
        assert_eq!(s.word_count(), 0);
    }
}
