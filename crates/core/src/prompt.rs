//! Prompt composition.
//!
//! Pure functions that turn a scenario and the turns so far into the ordered
//! list handed to the completion backend.

use crate::{scenario::Scenario, turn::Turn};

/// The persona's seeded opening line at the start of every conversation.
pub const OPENING_LINE: &str = "Okay, I'm ready. What have you got for me?";

/// Builds the turns for the next completion call.
///
/// With no prior turns this synthesizes the persona instructions followed by
/// the seeded opening line. Otherwise the prior turns are returned unchanged;
/// the newest user text travels separately to the completion client.
pub fn compose(scenario: &Scenario, prior_turns: &[Turn]) -> Vec<Turn> {
    if prior_turns.is_empty() {
        vec![
            Turn::system(persona_instructions(scenario)),
            Turn::assistant(OPENING_LINE),
        ]
    } else {
        prior_turns.to_vec()
    }
}

/// The system instructions that put the model in character.
pub fn persona_instructions(scenario: &Scenario) -> String {
    format!(
        "You are simulating a sales prospect for a practice sales conversation.
The salesperson is pitching {product}.
You are acting as a {prospect}.
The salesperson's goal is to {goal}

Instructions for how to behave:
1. Act realistically and naturally as this specific prospect type.
2. Ask questions about the product and show appropriate levels of interest or skepticism.
3. Present realistic objections that salespeople commonly face.
4. Respond appropriately to the salesperson's pitching techniques.
5. Keep responses concise and conversational (1-3 sentences per turn).
6. Never break character or reveal that you're an AI.
7. Don't be too easy - make the salesperson work to achieve their goal.

Respond only with your dialogue as the prospect, without any speaker label.",
        product = scenario.product_name(),
        prospect = scenario.prospect_type(),
        goal = scenario.goal(),
    )
}

/// Headings the feedback analysis is asked to use, in report order.
pub const FEEDBACK_HEADINGS: [&str; 4] = [
    "Performance Metrics",
    "Key Moments",
    "Strengths and Areas for Improvement",
    "Recommendations",
];

/// Builds the coaching request for a finished conversation.
///
/// Returns the instruction turns and the user text to send after them.
pub fn feedback_request(scenario: &Scenario, transcript: &str) -> (Vec<Turn>, String) {
    let instructions = Turn::system(
        "You are an experienced sales coach reviewing a practice sales conversation. \
         Be specific, cite what the salesperson actually said, and be constructive.",
    );

    let headings = FEEDBACK_HEADINGS
        .iter()
        .map(|h| format!("<h3>{h}</h3>"))
        .collect::<Vec<_>>()
        .join("\n");

    let request = format!(
        "Analyze this sales practice conversation.

Scenario:
- Product: {product}
- Prospect: {prospect}
- Salesperson's goal: {goal}

Conversation transcript:
---
{transcript}
---

Format your answer as HTML using exactly these section headings, in this order:
{headings}

Under Performance Metrics, rate rapport building, needs discovery, objection handling, \
value communication and closing, each as a score like 7/10 with one sentence of justification.
Under Key Moments, describe the turning points of the conversation as <li> items.
Under Strengths and Areas for Improvement, list strengths first and then areas for improvement, \
each as an <li> item, with the same number of each.
Under Recommendations, give concrete next steps as <li> items.",
        product = scenario.product_name(),
        prospect = scenario.prospect_type(),
        goal = scenario.goal(),
        transcript = transcript.trim(),
    );

    (vec![instructions], request)
}
