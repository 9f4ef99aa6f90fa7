//! Interview session state machine.
//!
//! setup → generating → in_progress{index} → scoring → complete
//!
//! Every transition is a synchronous method on [`InterviewSession`]; the
//! async calls to the AI delegates happen between a `begin_*` and the
//! matching `finish_*`, with the session saved in between so overlapping
//! requests see the in-flight phase and are turned away.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::interview::models::{
    Answer, InterviewReport, InterviewSetup, Question, SetupPatch, SKIPPED_ANSWER,
};
use crate::interview::speech::{CaptureMode, RecognitionSegment, SpeechState};

/// An in-flight call older than this is treated as abandoned.
pub const IN_FLIGHT_TIMEOUT_SECS: i64 = 180;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    Setup,
    Generating {
        started_at: DateTime<Utc>,
    },
    InProgress {
        index: usize,
    },
    /// `started_at` is set while the scoring call is in flight.
    Scoring {
        started_at: Option<DateTime<Utc>>,
    },
    Complete,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Setup => "setup",
            Phase::Generating { .. } => "generating",
            Phase::InProgress { .. } => "in_progress",
            Phase::Scoring { .. } => "scoring",
            Phase::Complete => "complete",
        }
    }
}

/// Outcome of saving the finished session as a remote interview record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    NotAttempted,
    Saved,
    Failed {
        warning: String,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("Add a resume or a job description before starting the interview")]
    MissingSource,

    #[error("This action is not available while the interview is in the '{actual}' phase")]
    InvalidPhase { actual: &'static str },

    #[error("{0} is already in progress")]
    InFlight(&'static str),

    #[error("Your answer is empty. Confirm to skip this question")]
    SkipConfirmationRequired,
}

/// What happened after an answer was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "next", rename_all = "snake_case")]
pub enum SubmitOutcome {
    NextQuestion { index: usize },
    ReadyForScoring,
}

/// Everything the report delegate needs, detached from the session.
#[derive(Debug, Clone)]
pub struct ScoringInput {
    pub setup: InterviewSetup,
    pub questions: Vec<Question>,
    pub answers: Vec<Answer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewSession {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Incremented by the store on every save.
    pub revision: u64,
    #[serde(flatten)]
    pub phase: Phase,
    pub setup: InterviewSetup,
    pub questions: Vec<Question>,
    pub answers: Vec<Answer>,
    pub speech: SpeechState,
    pub report: Option<InterviewReport>,
    pub last_error: Option<String>,
    pub record: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InterviewSession {
    pub fn new(user_id: Uuid, recognition_supported: bool, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            revision: 0,
            phase: Phase::Setup,
            setup: InterviewSetup::default(),
            questions: Vec::new(),
            answers: Vec::new(),
            speech: SpeechState::new(recognition_supported),
            report: None,
            last_error: None,
            record: RecordStatus::NotAttempted,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn current_question(&self) -> Option<&Question> {
        match self.phase {
            Phase::InProgress { index } => self.questions.get(index),
            _ => None,
        }
    }

    pub fn update_setup(&mut self, patch: SetupPatch) -> Result<(), SessionError> {
        self.expect_setup()?;
        self.setup.apply(patch);
        Ok(())
    }

    /// Moves into `generating` and returns the setup to send to the question
    /// delegate. A second call while a recent generation is running fails.
    pub fn begin_generation(&mut self, now: DateTime<Utc>) -> Result<InterviewSetup, SessionError> {
        match self.phase {
            Phase::Setup => {}
            Phase::Generating { started_at } if !is_stale(started_at, now) => {
                return Err(SessionError::InFlight("Question generation"));
            }
            Phase::Generating { .. } => {
                tracing::warn!(session_id = %self.id, "restarting abandoned question generation");
            }
            _ => return Err(self.invalid_phase()),
        }
        if !self.setup.has_source_material() {
            return Err(SessionError::MissingSource);
        }
        self.phase = Phase::Generating { started_at: now };
        self.last_error = None;
        Ok(self.setup.clone())
    }

    /// Completes generation. Errors send the session back to `setup` with the
    /// message kept for display.
    pub fn finish_generation(
        &mut self,
        result: Result<Vec<Question>, String>,
    ) -> Result<(), SessionError> {
        if !matches!(self.phase, Phase::Generating { .. }) {
            return Err(self.invalid_phase());
        }
        match result {
            Ok(questions) => {
                self.questions = questions;
                self.answers.clear();
                self.speech.finish_turn();
                self.phase = Phase::InProgress { index: 0 };
                self.last_error = None;
            }
            Err(message) => {
                self.phase = Phase::Setup;
                self.last_error = Some(message);
            }
        }
        Ok(())
    }

    /// Returns the text to synthesize.
    pub fn start_playback(&mut self) -> Result<String, SessionError> {
        let text = self.expect_question()?.text.clone();
        self.speech.start_playback();
        Ok(text)
    }

    pub fn stop_playback(&mut self) -> Result<(), SessionError> {
        self.expect_question()?;
        self.speech.stop_playback();
        Ok(())
    }

    pub fn start_capture(&mut self) -> Result<CaptureMode, SessionError> {
        self.expect_question()?;
        Ok(self.speech.start_capture())
    }

    pub fn stop_capture(&mut self) -> Result<(), SessionError> {
        self.expect_question()?;
        self.speech.stop_capture();
        Ok(())
    }

    pub fn record_speech(&mut self, segments: &[RecognitionSegment]) -> Result<usize, SessionError> {
        self.expect_question()?;
        Ok(self.speech.record(segments))
    }

    pub fn edit_transcript(&mut self, text: String) -> Result<(), SessionError> {
        self.expect_question()?;
        self.speech.transcript.replace(text);
        Ok(())
    }

    /// Records the answer for the current question and advances. An empty
    /// transcript is only accepted as a skip when `confirm_skip` is set.
    pub fn submit_answer(&mut self, confirm_skip: bool) -> Result<SubmitOutcome, SessionError> {
        let index = match self.phase {
            Phase::InProgress { index } => index,
            _ => return Err(self.invalid_phase()),
        };
        let question = self
            .questions
            .get(index)
            .cloned()
            .ok_or(SessionError::InvalidPhase { actual: "in_progress" })?;

        let blank = self.speech.transcript.committed().trim().is_empty();
        if blank && !confirm_skip {
            return Err(SessionError::SkipConfirmationRequired);
        }
        let spoken = self.speech.finish_turn();
        let user_answer = if blank {
            SKIPPED_ANSWER.to_string()
        } else {
            spoken.trim().to_string()
        };

        self.answers.push(Answer {
            question_id: question.id,
            question_text: question.text,
            user_answer,
        });

        if index + 1 >= self.questions.len() {
            self.phase = Phase::Scoring { started_at: None };
            Ok(SubmitOutcome::ReadyForScoring)
        } else {
            self.phase = Phase::InProgress { index: index + 1 };
            Ok(SubmitOutcome::NextQuestion { index: index + 1 })
        }
    }

    /// Marks scoring as in flight and returns its input.
    pub fn begin_scoring(&mut self, now: DateTime<Utc>) -> Result<ScoringInput, SessionError> {
        match self.phase {
            Phase::Scoring { started_at: None } => {}
            Phase::Scoring {
                started_at: Some(started_at),
            } if !is_stale(started_at, now) => {
                return Err(SessionError::InFlight("Scoring"));
            }
            Phase::Scoring { .. } => {
                tracing::warn!(session_id = %self.id, "restarting abandoned scoring");
            }
            _ => return Err(self.invalid_phase()),
        }
        self.phase = Phase::Scoring {
            started_at: Some(now),
        };
        self.last_error = None;
        Ok(ScoringInput {
            setup: self.setup.clone(),
            questions: self.questions.clone(),
            answers: self.answers.clone(),
        })
    }

    /// On failure the session stays in `scoring` with every answer intact so
    /// the user can retry.
    pub fn finish_scoring(
        &mut self,
        result: Result<InterviewReport, String>,
    ) -> Result<(), SessionError> {
        if !matches!(self.phase, Phase::Scoring { started_at: Some(_) }) {
            return Err(self.invalid_phase());
        }
        match result {
            Ok(report) => {
                self.report = Some(report);
                self.phase = Phase::Complete;
                self.last_error = None;
            }
            Err(message) => {
                self.phase = Phase::Scoring { started_at: None };
                self.last_error = Some(message);
            }
        }
        Ok(())
    }

    pub fn mark_record_saved(&mut self) {
        self.record = RecordStatus::Saved;
    }

    pub fn mark_record_failed(&mut self, warning: String) {
        self.record = RecordStatus::Failed { warning };
    }

    fn expect_setup(&self) -> Result<(), SessionError> {
        match self.phase {
            Phase::Setup => Ok(()),
            _ => Err(self.invalid_phase()),
        }
    }

    fn expect_question(&self) -> Result<&Question, SessionError> {
        self.current_question().ok_or_else(|| self.invalid_phase())
    }

    fn invalid_phase(&self) -> SessionError {
        SessionError::InvalidPhase {
            actual: self.phase.name(),
        }
    }
}

fn is_stale(started_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - started_at > Duration::seconds(IN_FLIGHT_TIMEOUT_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interview::models::{Category, Difficulty, INTRODUCTION_QUESTION};

    fn now() -> DateTime<Utc> {
        "2026-03-01T10:00:00Z".parse().unwrap()
    }

    fn questions(n: u32) -> Vec<Question> {
        (1..=n)
            .map(|id| Question {
                id,
                text: if id == 1 {
                    INTRODUCTION_QUESTION.to_string()
                } else {
                    format!("Question {id}")
                },
            })
            .collect()
    }

    fn report(score: u32) -> InterviewReport {
        InterviewReport {
            score,
            feedback: "Well done".to_string(),
            strengths: vec!["Clarity".to_string()],
            weaknesses: vec![],
            question_feedback: vec![],
        }
    }

    fn ready_session() -> InterviewSession {
        let mut session = InterviewSession::new(Uuid::new_v4(), true, now());
        session
            .update_setup(SetupPatch {
                resume_text: Some("Five years of backend work".to_string()),
                category: Some(Category::Hr),
                difficulty: Some(Difficulty::Medium),
                question_count: Some(5),
                ..Default::default()
            })
            .unwrap();
        session
    }

    fn in_progress(n: u32) -> InterviewSession {
        let mut session = ready_session();
        session.begin_generation(now()).unwrap();
        session.finish_generation(Ok(questions(n))).unwrap();
        session
    }

    fn answer(session: &mut InterviewSession, text: &str) -> SubmitOutcome {
        session.edit_transcript(text.to_string()).unwrap();
        session.submit_answer(false).unwrap()
    }

    #[test]
    fn test_start_requires_resume_or_job_description() {
        let mut session = InterviewSession::new(Uuid::new_v4(), true, now());
        assert_eq!(
            session.begin_generation(now()),
            Err(SessionError::MissingSource)
        );
        assert_eq!(session.phase, Phase::Setup);

        session
            .update_setup(SetupPatch {
                job_description: Some("Senior Rust engineer".to_string()),
                ..Default::default()
            })
            .unwrap();
        let setup = session.begin_generation(now()).unwrap();
        assert_eq!(setup.job_description, "Senior Rust engineer");
        assert!(matches!(session.phase, Phase::Generating { .. }));
    }

    #[test]
    fn test_second_start_while_generating_is_rejected() {
        let mut session = ready_session();
        session.begin_generation(now()).unwrap();
        assert_eq!(
            session.begin_generation(now() + Duration::seconds(5)),
            Err(SessionError::InFlight("Question generation"))
        );
    }

    #[test]
    fn test_abandoned_generation_can_be_restarted() {
        let mut session = ready_session();
        session.begin_generation(now()).unwrap();
        let later = now() + Duration::seconds(IN_FLIGHT_TIMEOUT_SECS + 1);
        assert!(session.begin_generation(later).is_ok());
        assert_eq!(session.phase, Phase::Generating { started_at: later });
    }

    #[test]
    fn test_generation_failure_returns_to_setup_with_error() {
        let mut session = ready_session();
        session.begin_generation(now()).unwrap();
        session
            .finish_generation(Err("API error (status 529): Overloaded".to_string()))
            .unwrap();
        assert_eq!(session.phase, Phase::Setup);
        assert_eq!(
            session.last_error.as_deref(),
            Some("API error (status 529): Overloaded")
        );
        assert!(session.questions.is_empty());
    }

    #[test]
    fn test_setup_is_frozen_after_start() {
        let mut session = in_progress(5);
        let result = session.update_setup(SetupPatch {
            question_count: Some(20),
            ..Default::default()
        });
        assert_eq!(
            result,
            Err(SessionError::InvalidPhase {
                actual: "in_progress"
            })
        );
    }

    #[test]
    fn test_answers_follow_question_order_and_trigger_scoring() {
        let mut session = in_progress(5);
        assert_eq!(session.current_question().unwrap().text, INTRODUCTION_QUESTION);

        for i in 1..5 {
            assert_eq!(
                answer(&mut session, &format!("answer {i}")),
                SubmitOutcome::NextQuestion { index: i }
            );
        }
        assert_eq!(
            answer(&mut session, "answer 5"),
            SubmitOutcome::ReadyForScoring
        );
        assert_eq!(session.phase, Phase::Scoring { started_at: None });

        assert_eq!(session.answers.len(), session.questions.len());
        for (question, answer) in session.questions.iter().zip(&session.answers) {
            assert_eq!(answer.question_id, question.id);
            assert_eq!(answer.question_text, question.text);
        }
    }

    #[test]
    fn test_empty_answer_needs_skip_confirmation() {
        let mut session = in_progress(5);
        session.edit_transcript("   ".to_string()).unwrap();
        assert_eq!(
            session.submit_answer(false),
            Err(SessionError::SkipConfirmationRequired)
        );
        assert!(session.answers.is_empty());

        session.submit_answer(true).unwrap();
        assert!(session.answers[0].is_skipped());
        assert_eq!(session.answers[0].user_answer, SKIPPED_ANSWER);
    }

    #[test]
    fn test_confirm_skip_is_ignored_when_an_answer_exists() {
        let mut session = in_progress(5);
        session.edit_transcript("  Real answer ".to_string()).unwrap();
        session.submit_answer(true).unwrap();
        assert_eq!(session.answers[0].user_answer, "Real answer");
    }

    #[test]
    fn test_speech_results_feed_the_answer() {
        let mut session = in_progress(5);
        session.start_playback().unwrap();
        assert_eq!(session.start_capture().unwrap(), CaptureMode::Speech);
        session
            .record_speech(&[
                RecognitionSegment {
                    text: "I lead".to_string(),
                    is_final: false,
                },
                RecognitionSegment {
                    text: "I lead a platform team.".to_string(),
                    is_final: true,
                },
            ])
            .unwrap();
        session.submit_answer(false).unwrap();
        assert_eq!(session.answers[0].user_answer, "I lead a platform team.");
        assert_eq!(session.speech.transcript.display(), "");
    }

    #[test]
    fn test_speech_is_rejected_outside_a_turn() {
        let mut session = ready_session();
        assert_eq!(
            session.start_capture(),
            Err(SessionError::InvalidPhase { actual: "setup" })
        );
    }

    #[test]
    fn test_scoring_success_completes_session() {
        let mut session = in_progress(5);
        for i in 0..5 {
            answer(&mut session, &format!("a{i}"));
        }
        let input = session.begin_scoring(now()).unwrap();
        assert_eq!(input.answers.len(), 5);
        assert_eq!(
            session.begin_scoring(now()).unwrap_err(),
            SessionError::InFlight("Scoring")
        );

        session.finish_scoring(Ok(report(72))).unwrap();
        assert_eq!(session.phase, Phase::Complete);
        assert_eq!(session.report.as_ref().unwrap().score, 72);
    }

    #[test]
    fn test_scoring_failure_keeps_answers_and_allows_retry() {
        let mut session = in_progress(5);
        for i in 0..5 {
            answer(&mut session, &format!("a{i}"));
        }
        session.begin_scoring(now()).unwrap();
        session
            .finish_scoring(Err("malformed response".to_string()))
            .unwrap();
        assert_eq!(session.phase, Phase::Scoring { started_at: None });
        assert_eq!(session.answers.len(), 5);
        assert!(session.report.is_none());
        assert_eq!(session.last_error.as_deref(), Some("malformed response"));

        assert!(session.begin_scoring(now()).is_ok());
    }

    #[test]
    fn test_finish_without_begin_is_rejected() {
        let mut session = ready_session();
        assert!(session.finish_generation(Ok(questions(5))).is_err());
        assert!(session.finish_scoring(Ok(report(10))).is_err());
        assert!(session.report.is_none());
    }

    #[test]
    fn test_phase_is_flattened_in_json() {
        let session = in_progress(5);
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["phase"], "in_progress");
        assert_eq!(json["index"], 0);
        let back: InterviewSession = serde_json::from_value(json).unwrap();
        assert_eq!(back, session);
    }
}
