//! PitchPerfect core.
//!
//! Stateless request translation for sales-pitch practice: composing prompts
//! for a simulated prospect, talking to the text-generation and speech
//! backends, keeping per-session conversation state, and slicing the final
//! coaching analysis into a structured report.

pub mod coach;
pub mod error;
pub mod feedback;
pub mod llm_client;
pub mod prompt;
pub mod scenario;
pub mod session;
pub mod speech;
pub mod turn;

pub use coach::PitchCoach;
pub use error::CoachError;
