//! Per-session conversation state.
//!
//! A `Session` is owned by whoever drives the conversation and is never shared
//! between users. It only ever grows, until `reset` clears it.

use crate::{scenario::Scenario, turn::Turn};

/// Transcript label for the salesperson's lines.
pub const USER_LABEL: &str = "User";
/// Transcript label for the prospect's lines.
pub const AI_LABEL: &str = "AI";

#[derive(Debug, Clone)]
pub struct Session {
    scenario: Scenario,
    turns: Vec<Turn>,
    transcript: String,
}

impl Session {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            turns: Vec::new(),
            transcript: String::new(),
        }
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Appends `"<label>: <text>\n\n"` to the plaintext transcript.
    pub fn append_transcript_line(&mut self, label: &str, text: &str) {
        self.transcript.push_str(label);
        self.transcript.push_str(": ");
        self.transcript.push_str(text);
        self.transcript.push_str("\n\n");
    }

    /// Clears turns and transcript together. The scenario is kept.
    pub fn reset(&mut self) {
        self.turns.clear();
        self.transcript.clear();
    }

    pub fn snapshot(&self) -> (Vec<Turn>, String) {
        (self.turns.clone(), self.transcript.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(Scenario::new("Acme", "CTO", "book a demo").unwrap())
    }

    #[test]
    fn test_append_keeps_order() {
        let mut session = session();
        session.append(Turn::user("one"));
        session.append(Turn::assistant("two"));
        session.append(Turn::user("three"));

        let texts: Vec<&str> = session.turns().iter().map(Turn::text).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_transcript_lines() {
        let mut session = session();
        session.append_transcript_line(AI_LABEL, "Hello?");
        session.append_transcript_line(USER_LABEL, "Hi, I'm calling about Acme.");
        assert_eq!(
            session.transcript(),
            "AI: Hello?\n\nUser: Hi, I'm calling about Acme.\n\n"
        );
    }

    #[test]
    fn test_reset_clears_turns_and_transcript() {
        let mut session = session();
        session.append(Turn::user("hello"));
        session.append_transcript_line(USER_LABEL, "hello");

        session.reset();

        let (turns, transcript) = session.snapshot();
        assert!(turns.is_empty());
        assert!(transcript.is_empty());
        assert_eq!(session.scenario().product_name(), "Acme");
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut session = session();
        session.append(Turn::user("hello"));
        let (turns, _) = session.snapshot();
        session.append(Turn::assistant("hi"));
        assert_eq!(turns.len(), 1);
        assert_eq!(session.turns().len(), 2);
    }
}
