use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
}

/// Questions and answers of the current chat, oldest first.
#[derive(Debug, Clone, Default)]
pub struct ChatHistory {
    turns: Vec<ChatTurn>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn unless `question` is already the most recent one.
    /// Returns whether the turn was added.
    pub fn record(&mut self, question: &str, answer: &str) -> bool {
        if self.turns.last().is_some_and(|turn| turn.question == question) {
            return false;
        }
        self.turns.push(ChatTurn {
            question: question.to_string(),
            answer: answer.to_string(),
        });
        true
    }

    /// The last `window` turns, oldest first.
    pub fn recent(&self, window: usize) -> &[ChatTurn] {
        let start = self.turns.len().saturating_sub(window);
        &self.turns[start..]
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
