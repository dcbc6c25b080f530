//! The caller-facing operations: next prospect reply, spoken audio, and the
//! end-of-session feedback report.

use crate::{
    error::{CoachError, Result},
    feedback::{FeedbackReport, extract},
    llm_client::CompletionClient,
    prompt::{compose, feedback_request},
    scenario::Scenario,
    session::{AI_LABEL, Session, USER_LABEL},
    speech::SpeechSynthesizer,
    turn::Turn,
};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{info, instrument};

/// Drives practice conversations against the configured backends.
///
/// Holds no per-session data; every operation receives the session or history
/// it works on from the caller.
#[derive(Clone)]
pub struct PitchCoach {
    completion: Arc<dyn CompletionClient>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
}

impl PitchCoach {
    pub fn new(
        completion: Arc<dyn CompletionClient>,
        speech: Option<Arc<dyn SpeechSynthesizer>>,
    ) -> Self {
        Self { completion, speech }
    }

    pub fn has_speech(&self) -> bool {
        self.speech.is_some()
    }

    /// Opens a session seeded with the persona instructions and opening line.
    ///
    /// Returns the session and the prospect's opening line. No backend call is made.
    pub fn start_session(&self, scenario: Scenario) -> (Session, String) {
        let mut session = Session::new(scenario);
        for turn in compose(session.scenario(), &[]) {
            session.append(turn);
        }
        let opening = session
            .turns()
            .last()
            .map(|turn| turn.text().to_string())
            .unwrap_or_default();
        session.append_transcript_line(AI_LABEL, &opening);
        (session, opening)
    }

    /// Gets the prospect's reply to `user_text` and records both turns.
    ///
    /// The session is only modified once the reply has arrived; on failure it
    /// is left exactly as it was.
    #[instrument(skip_all, fields(prior_turns = session.turns().len()))]
    pub async fn next_reply(&self, session: &mut Session, user_text: &str) -> Result<String> {
        let user_text = required_text(user_text)?;
        let turns = compose(session.scenario(), session.turns());

        let reply = self.completion.complete(&turns, user_text).await?;

        if session.turns().is_empty() {
            // Reset sessions are re-seeded with the composed persona turns.
            for turn in turns {
                session.append(turn);
            }
        }
        session.append(Turn::user(user_text));
        session.append(Turn::assistant(reply.clone()));
        session.append_transcript_line(USER_LABEL, user_text);
        session.append_transcript_line(AI_LABEL, &reply);

        info!(turns = session.turns().len(), "Prospect replied");
        Ok(reply)
    }

    /// Stateless variant for callers that keep their own history.
    ///
    /// A scenario is required when `history` is empty.
    #[instrument(skip_all, fields(prior_turns = history.len()))]
    pub async fn reply_to_history(
        &self,
        scenario: Option<&Scenario>,
        history: &[Turn],
        user_text: &str,
    ) -> Result<String> {
        let user_text = required_text(user_text)?;
        let turns = match scenario {
            Some(scenario) => compose(scenario, history),
            None if history.is_empty() => {
                return Err(CoachError::invalid(
                    "a scenario is required to start a conversation",
                ));
            }
            None => history.to_vec(),
        };
        self.completion.complete(&turns, user_text).await
    }

    /// Synthesizes `text` with the configured speech backend.
    pub async fn speak(&self, text: &str) -> Result<Bytes> {
        let speech = self.speech.as_ref().ok_or_else(|| {
            CoachError::UpstreamUnavailable("speech synthesis is not configured".to_string())
        })?;
        speech.synthesize(text).await
    }

    /// Requests a coaching analysis of `transcript` and splits it into a report.
    #[instrument(skip_all, fields(product = %scenario.product_name(), transcript_len = transcript.len()))]
    pub async fn feedback(&self, scenario: &Scenario, transcript: &str) -> Result<FeedbackReport> {
        if transcript.trim().is_empty() {
            return Err(CoachError::invalid("a conversation transcript is required"));
        }
        let (turns, request) = feedback_request(scenario, transcript);
        let analysis = self.completion.complete(&turns, &request).await?;
        info!(analysis_len = analysis.len(), "Feedback analysis received");
        Ok(extract(&analysis).with_transcript(transcript))
    }

    /// Feedback for everything recorded in `session` so far.
    pub async fn session_feedback(&self, session: &Session) -> Result<FeedbackReport> {
        self.feedback(session.scenario(), session.transcript()).await
    }
}

fn required_text(text: &str) -> Result<&str> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CoachError::invalid("user text must not be empty"));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        llm_client::MockCompletionClient, prompt::OPENING_LINE, speech::MockSpeechSynthesizer,
        turn::Role,
    };

    fn acme() -> Scenario {
        Scenario::new("Acme", "CTO", "book a demo").unwrap()
    }

    fn coach(completion: MockCompletionClient) -> PitchCoach {
        PitchCoach::new(Arc::new(completion), None)
    }

    #[test]
    fn test_start_session_seeds_persona() {
        let coach = coach(MockCompletionClient::new());
        let (session, opening) = coach.start_session(acme());

        assert_eq!(opening, OPENING_LINE);
        assert_eq!(session.turns().len(), 2);
        assert_eq!(session.turns()[0].role(), Role::System);
        assert_eq!(session.transcript(), format!("AI: {OPENING_LINE}\n\n"));
    }

    #[tokio::test]
    async fn test_next_reply_sends_history_and_appends_one_reply() {
        let mut mock = MockCompletionClient::new();
        mock.expect_complete()
            .withf(|turns, text| {
                turns.len() == 2
                    && turns[0].role() == Role::System
                    && turns[1].role() == Role::Assistant
                    && text == "Hi, I'd like to show you our product"
            })
            .times(1)
            .returning(|_, _| Ok("What problem does it solve?".to_string()));
        let coach = coach(mock);
        let (mut session, _) = coach.start_session(acme());

        let reply = coach
            .next_reply(&mut session, "Hi, I'd like to show you our product")
            .await
            .unwrap();

        assert_eq!(reply, "What problem does it solve?");
        let roles: Vec<Role> = session.turns().iter().map(Turn::role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::Assistant, Role::User, Role::Assistant]
        );
        assert!(session.transcript().ends_with(
            "User: Hi, I'd like to show you our product\n\nAI: What problem does it solve?\n\n"
        ));
    }

    #[tokio::test]
    async fn test_failed_reply_leaves_session_untouched() {
        let mut mock = MockCompletionClient::new();
        mock.expect_complete().times(1).returning(|_, _| {
            Err(CoachError::UpstreamRejected {
                status: 500,
                body: "boom".to_string(),
            })
        });
        let coach = coach(mock);
        let (mut session, _) = coach.start_session(acme());
        let before = session.snapshot();

        let err = coach.next_reply(&mut session, "Hello").await.unwrap_err();

        assert!(matches!(err, CoachError::UpstreamRejected { status: 500, .. }));
        assert_eq!(session.snapshot(), before);
    }

    #[tokio::test]
    async fn test_reset_session_is_reseeded() {
        let mut mock = MockCompletionClient::new();
        mock.expect_complete()
            .withf(|turns, _| turns.len() == 2 && turns[0].role() == Role::System)
            .times(1)
            .returning(|_, _| Ok("Who is this?".to_string()));
        let coach = coach(mock);
        let (mut session, _) = coach.start_session(acme());
        session.reset();

        coach.next_reply(&mut session, "Hello").await.unwrap();

        assert_eq!(session.turns().len(), 4);
        assert_eq!(session.transcript(), "User: Hello\n\nAI: Who is this?\n\n");
    }

    #[tokio::test]
    async fn test_blank_user_text_is_invalid() {
        let coach = coach(MockCompletionClient::new());
        let (mut session, _) = coach.start_session(acme());
        let err = coach.next_reply(&mut session, "  \n").await.unwrap_err();
        assert!(matches!(err, CoachError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_reply_to_history_requires_scenario_for_empty_history() {
        let coach = coach(MockCompletionClient::new());
        let err = coach.reply_to_history(None, &[], "Hi").await.unwrap_err();
        assert!(matches!(err, CoachError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_reply_to_history_passes_history_through() {
        let history = vec![
            Turn::system("be a CFO"),
            Turn::assistant("Yes?"),
            Turn::user("Hi"),
            Turn::assistant("Go on."),
        ];
        let expected = history.clone();
        let mut mock = MockCompletionClient::new();
        mock.expect_complete()
            .withf(move |turns, text| turns == expected.as_slice() && text == "Our price is low")
            .times(1)
            .returning(|_, _| Ok("How low?".to_string()));

        let reply = coach(mock)
            .reply_to_history(Some(&acme()), &history, "Our price is low")
            .await
            .unwrap();
        assert_eq!(reply, "How low?");
    }

    #[tokio::test]
    async fn test_feedback_extracts_report() {
        let mut mock = MockCompletionClient::new();
        mock.expect_complete()
            .withf(|turns, request| {
                turns.len() == 1 && request.contains("User: We cut costs by 30%.")
            })
            .times(1)
            .returning(|_, _| {
                Ok("<h3>Performance Metrics</h3><p>Closing: 4/10</p><h3>Recommendations</h3><li>Ask for the demo.</li>".to_string())
            });
        let transcript = "AI: Hello?\n\nUser: We cut costs by 30%.\n\n";

        let report = coach(mock).feedback(&acme(), transcript).await.unwrap();

        assert_eq!(report.transcript, transcript);
        assert_eq!(
            report.metrics,
            r#"<p>Closing: <span class="metric-score">4/10</span></p>"#
        );
        assert_eq!(report.key_moments, "<p>No key moments identified</p>");
        assert_eq!(report.strengths, "<p>No feedback available</p>");
        assert_eq!(
            report.recommendations,
            r#"<li class="recommendation">Ask for the demo.</li>"#
        );
    }

    #[tokio::test]
    async fn test_feedback_requires_transcript() {
        let coach = coach(MockCompletionClient::new());
        let err = coach.feedback(&acme(), "   ").await.unwrap_err();
        assert!(matches!(err, CoachError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_speak_without_backend_is_unavailable() {
        let coach = coach(MockCompletionClient::new());
        assert!(!coach.has_speech());
        let err = coach.speak("hello").await.unwrap_err();
        assert!(matches!(err, CoachError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn test_speak_relays_audio() {
        let mut speech = MockSpeechSynthesizer::new();
        speech
            .expect_synthesize()
            .withf(|text| text == "Tell me more.")
            .times(1)
            .returning(|_| Ok(Bytes::from_static(b"ID3")));
        let coach = PitchCoach::new(Arc::new(MockCompletionClient::new()), Some(Arc::new(speech)));

        let audio = coach.speak("Tell me more.").await.unwrap();
        assert_eq!(audio, Bytes::from_static(b"ID3"));
    }
}
