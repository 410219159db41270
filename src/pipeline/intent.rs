//! Keyword intent classification

/// Words that mark an utterance as asking about the surroundings
pub const DEFAULT_VISION_KEYWORDS: &[&str] = &["nhìn", "thấy", "xem", "gì", "đâu", "trước mặt"];

/// What the user wants from this turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// The user asks about what the camera sees
    VisionQuery,
    /// Anything else
    Greeting,
}

/// Case-insensitive substring match against a keyword set
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    keywords: Vec<String>,
}

impl IntentClassifier {
    /// Create a classifier over `keywords`
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// Classify a transcript
    #[must_use]
    pub fn classify(&self, text: &str) -> Intent {
        let text = text.to_lowercase();
        if self.keywords.iter().any(|k| text.contains(k.as_str())) {
            Intent::VisionQuery
        } else {
            Intent::Greeting
        }
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_VISION_KEYWORDS)
    }
}
