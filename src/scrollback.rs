use chrono::Local;

pub const SCROLLBACK_LIMIT: usize = 5000;

/// Receive display text. Once it grows past the limit it is cleared
/// wholesale before the next append.
#[derive(Debug, Clone)]
pub struct Scrollback {
    text: String,
    chars: usize,
    limit: usize,
}

impl Default for Scrollback {
    fn default() -> Self {
        Self::with_limit(SCROLLBACK_LIMIT)
    }
}

impl Scrollback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            text: String::new(),
            chars: 0,
            limit,
        }
    }

    pub fn append(&mut self, s: &str) {
        if self.chars > self.limit {
            self.clear();
        }
        self.text.push_str(s);
        self.chars += s.chars().count();
    }

    /// Appends, prefixed with the wall-clock time when `timestamp` is set.
    pub fn push_received(&mut self, s: &str, timestamp: bool) {
        if timestamp {
            let now = Local::now().format("%Y-%m-%d %H:%M:%S");
            self.append(&format!("[{}] {}", now, s));
        } else {
            self.append(s);
        }
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.chars = 0;
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.chars
    }

    pub fn is_empty(&self) -> bool {
        self.chars == 0
    }
}
