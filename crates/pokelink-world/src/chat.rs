//! Bounded chat history.

use std::collections::VecDeque;

use pokelink_protocol::{ChatChannel, PlayerId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    /// `None` for server and admin messages.
    pub from: Option<PlayerId>,
    pub username: String,
    pub text: String,
    pub channel: ChatChannel,
}

impl ChatLine {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            from: None,
            username: String::from("SERVER"),
            text: text.into(),
            channel: ChatChannel::System,
        }
    }
}

/// Ring buffer of the most recent chat lines. Oldest lines fall off first.
#[derive(Debug, Clone)]
pub struct ChatLog {
    lines: VecDeque<ChatLine>,
    capacity: usize,
}

impl ChatLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, line: ChatLine) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatLine> {
        self.lines.iter()
    }

    pub fn latest(&self) -> Option<&ChatLine> {
        self.lines.back()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_over_capacity_drops_oldest() {
        let mut log = ChatLog::new(2);
        log.push(ChatLine::system("one"));
        log.push(ChatLine::system("two"));
        log.push(ChatLine::system("three"));

        let texts: Vec<_> = log.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["two", "three"]);
        assert_eq!(log.latest().unwrap().text, "three");
    }

    #[test]
    fn test_new_zero_capacity_keeps_one_line() {
        let mut log = ChatLog::new(0);
        log.push(ChatLine::system("a"));
        log.push(ChatLine::system("b"));
        assert_eq!(log.len(), 1);
    }
}
