//! Interview orchestration.
//!
//! Each operation is load → mutate → write back against the session mirror.
//! Write-backs only replace an existing snapshot, so a session reset while a
//! request was in flight stays reset. The two AI calls run between a
//! `begin_*` and `finish_*` with the in-flight phase already saved; when they
//! return, the session is reloaded and the result is dropped if the session
//! was reset or moved on in the meantime.

use anyhow::anyhow;
use chrono::Utc;
use serde::de::DeserializeOwned;
use tracing::{info, warn};
use uuid::Uuid;

use crate::billing::entitlement::{evaluate, INTERVIEW_UPGRADE_MESSAGE, REPORT_UPGRADE_MESSAGE};
use crate::errors::{AppError, AI_NOT_CONFIGURED};
use crate::interview::models::{Category, Difficulty, SetupPatch};
use crate::interview::questions::generate_questions;
use crate::interview::records::{InterviewScript, NewInterviewRecord};
use crate::interview::report::{generate_report, render_report_markdown};
use crate::interview::session::{
    InterviewSession, Phase, RecordStatus, SessionError, SubmitOutcome,
};
use crate::interview::speech::{CaptureMode, RecognitionSegment};
use crate::llm_client::LlmError;
use crate::state::AppState;

/// Shown on the session when the finished interview could not be written
/// to the user's history.
pub const RECORD_SAVE_WARNING: &str =
    "Your report is ready, but it could not be saved to your interview history. Try saving it again.";

/// Loads a session, hiding sessions that belong to someone else.
pub async fn load_owned(
    state: &AppState,
    user_id: Uuid,
    id: Uuid,
) -> Result<InterviewSession, AppError> {
    match state.sessions.load(id).await? {
        Some(session) if session.user_id == user_id => Ok(session),
        _ => Err(AppError::NotFound(format!("Interview session {id} not found"))),
    }
}

pub async fn create_session(
    state: &AppState,
    user_id: Uuid,
    recognition_supported: bool,
) -> Result<InterviewSession, AppError> {
    let mut session = InterviewSession::new(user_id, recognition_supported, Utc::now());
    state.sessions.save(&mut session).await?;
    info!("Created interview session {} for user {user_id}", session.id);
    Ok(session)
}

/// Reset: the mirror entry is removed and cannot come back.
pub async fn reset_session(state: &AppState, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
    load_owned(state, user_id, id).await?;
    state.sessions.delete(id).await?;
    info!("Reset interview session {id}");
    Ok(())
}

pub async fn update_setup(
    state: &AppState,
    user_id: Uuid,
    id: Uuid,
    patch: SetupPatch,
) -> Result<InterviewSession, AppError> {
    mutate(state, user_id, id, |session| session.update_setup(patch)).await
}

/// Checks the phase, then the gate, generates the questions and, only once
/// they exist, consumes one interview from the user's allowance.
pub async fn start_interview(
    state: &AppState,
    user_id: Uuid,
    id: Uuid,
) -> Result<InterviewSession, AppError> {
    let mut session = load_owned(state, user_id, id).await?;
    let now = Utc::now();

    // Not saved until the gate passes.
    let setup = session.begin_generation(now)?;

    let subscription = state.usage.subscription(user_id).await?;
    if !evaluate(&subscription, now).can_start_interview {
        return Err(AppError::UpgradeRequired(INTERVIEW_UPGRADE_MESSAGE.to_string()));
    }

    write_back(state, &mut session, "question generation").await?;

    let generated = generate_questions(state.llm.as_ref(), &setup).await;

    let mut session = reload_in_flight(state, user_id, id, "question generation").await?;
    if !matches!(session.phase, Phase::Generating { .. }) {
        return Err(discarded(id, &session, "question generation"));
    }

    let questions = match generated {
        Ok(questions) => questions,
        Err(err) => {
            warn!("Question generation failed for session {id}: {err}");
            session.finish_generation(Err(llm_failure_message(&err)))?;
            write_back(state, &mut session, "question generation").await?;
            return Err(err.into());
        }
    };

    match state.usage.claim_interview(user_id, Utc::now()).await {
        Ok(true) => {}
        Ok(false) => {
            session.finish_generation(Err(INTERVIEW_UPGRADE_MESSAGE.to_string()))?;
            write_back(state, &mut session, "question generation").await?;
            return Err(AppError::UpgradeRequired(INTERVIEW_UPGRADE_MESSAGE.to_string()));
        }
        Err(err) => {
            session.finish_generation(Err(
                "Could not start the interview. Please try again.".to_string(),
            ))?;
            write_back(state, &mut session, "question generation").await?;
            return Err(err.into());
        }
    }

    session.finish_generation(Ok(questions))?;
    write_back(state, &mut session, "question generation").await?;
    info!(
        "Session {id} started with {} questions",
        session.questions.len()
    );
    Ok(session)
}

/// Returns the question text to synthesize together with the session.
pub async fn start_playback(
    state: &AppState,
    user_id: Uuid,
    id: Uuid,
) -> Result<(InterviewSession, String), AppError> {
    let mut text = String::new();
    let session = mutate(state, user_id, id, |session| {
        text = session.start_playback()?;
        Ok(())
    })
    .await?;
    Ok((session, text))
}

pub async fn stop_playback(
    state: &AppState,
    user_id: Uuid,
    id: Uuid,
) -> Result<InterviewSession, AppError> {
    mutate(state, user_id, id, |session| session.stop_playback()).await
}

pub async fn start_capture(
    state: &AppState,
    user_id: Uuid,
    id: Uuid,
) -> Result<(InterviewSession, CaptureMode), AppError> {
    let mut mode = CaptureMode::Manual;
    let session = mutate(state, user_id, id, |session| {
        mode = session.start_capture()?;
        Ok(())
    })
    .await?;
    Ok((session, mode))
}

pub async fn stop_capture(
    state: &AppState,
    user_id: Uuid,
    id: Uuid,
) -> Result<InterviewSession, AppError> {
    mutate(state, user_id, id, |session| session.stop_capture()).await
}

pub async fn record_speech(
    state: &AppState,
    user_id: Uuid,
    id: Uuid,
    segments: &[RecognitionSegment],
) -> Result<InterviewSession, AppError> {
    mutate(state, user_id, id, |session| {
        session.record_speech(segments).map(|_| ())
    })
    .await
}

pub async fn edit_transcript(
    state: &AppState,
    user_id: Uuid,
    id: Uuid,
    text: String,
) -> Result<InterviewSession, AppError> {
    mutate(state, user_id, id, |session| session.edit_transcript(text)).await
}

/// Records the current answer. The final answer runs scoring right away.
pub async fn submit_answer(
    state: &AppState,
    user_id: Uuid,
    id: Uuid,
    confirm_skip: bool,
) -> Result<InterviewSession, AppError> {
    let mut session = load_owned(state, user_id, id).await?;
    let outcome = session.submit_answer(confirm_skip)?;
    write_back(state, &mut session, "answer submission").await?;

    match outcome {
        SubmitOutcome::NextQuestion { .. } => Ok(session),
        SubmitOutcome::ReadyForScoring => run_scoring(state, session).await,
    }
}

/// Manual retry for a session left in `scoring` by a failed call.
pub async fn retry_scoring(
    state: &AppState,
    user_id: Uuid,
    id: Uuid,
) -> Result<InterviewSession, AppError> {
    let session = load_owned(state, user_id, id).await?;
    run_scoring(state, session).await
}

async fn run_scoring(
    state: &AppState,
    mut session: InterviewSession,
) -> Result<InterviewSession, AppError> {
    let (id, user_id) = (session.id, session.user_id);
    let input = session.begin_scoring(Utc::now())?;
    write_back(state, &mut session, "scoring").await?;

    let result = generate_report(
        state.llm.as_ref(),
        input.setup.category,
        input.setup.difficulty,
        &input.questions,
        &input.answers,
    )
    .await;

    let mut session = reload_in_flight(state, user_id, id, "scoring").await?;
    if !matches!(session.phase, Phase::Scoring { started_at: Some(_) }) {
        return Err(discarded(id, &session, "scoring"));
    }

    match result {
        Ok(report) => {
            session.finish_scoring(Ok(report))?;
            persist_record(state, &mut session).await;
            write_back(state, &mut session, "scoring").await?;
            Ok(session)
        }
        Err(err) => {
            warn!("Scoring failed for session {id}: {err}");
            session.finish_scoring(Err(llm_failure_message(&err)))?;
            write_back(state, &mut session, "scoring").await?;
            Err(err.into())
        }
    }
}

/// Retries writing the interview record. Saving twice is harmless.
pub async fn retry_persist(
    state: &AppState,
    user_id: Uuid,
    id: Uuid,
) -> Result<InterviewSession, AppError> {
    let mut session = load_owned(state, user_id, id).await?;
    if session.phase != Phase::Complete {
        return Err(SessionError::InvalidPhase {
            actual: session.phase.name(),
        }
        .into());
    }
    if session.record == RecordStatus::Saved {
        return Ok(session);
    }
    persist_record(state, &mut session).await;
    write_back(state, &mut session, "record save").await?;
    Ok(session)
}

/// Best effort: a failed insert is logged and left visible on the session.
async fn persist_record(state: &AppState, session: &mut InterviewSession) {
    let Some(record) = NewInterviewRecord::from_session(session, Utc::now()) else {
        return;
    };
    match state.records.insert(&record).await {
        Ok(_) => session.mark_record_saved(),
        Err(err) => {
            warn!(
                "Failed to save interview record {} for user {}: {err:#}",
                record.id, record.user_id
            );
            session.mark_record_failed(RECORD_SAVE_WARNING.to_string());
        }
    }
}

/// Markdown export of the live session's report. Consumes one download.
pub async fn export_session_report(
    state: &AppState,
    user_id: Uuid,
    id: Uuid,
) -> Result<String, AppError> {
    let session = load_owned(state, user_id, id).await?;
    let report = match (&session.phase, &session.report) {
        (Phase::Complete, Some(report)) => report,
        _ => {
            return Err(SessionError::InvalidPhase {
                actual: session.phase.name(),
            }
            .into())
        }
    };
    claim_download(state, user_id).await?;
    Ok(render_report_markdown(
        session.setup.category,
        session.setup.difficulty,
        report,
    ))
}

/// Markdown export of a saved interview. Consumes one download.
pub async fn export_saved_report(
    state: &AppState,
    user_id: Uuid,
    id: Uuid,
) -> Result<String, AppError> {
    let row = state
        .records
        .get(user_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Interview {id} not found")))?;
    let category: Category = parse_stored(&row.category)?;
    let difficulty: Difficulty = parse_stored(&row.difficulty)?;
    let script: InterviewScript = serde_json::from_value(row.script)
        .map_err(|e| AppError::Internal(anyhow!("interview {id} has an unreadable script: {e}")))?;

    claim_download(state, user_id).await?;
    Ok(render_report_markdown(category, difficulty, &script.feedback))
}

async fn claim_download(state: &AppState, user_id: Uuid) -> Result<(), AppError> {
    if state.usage.claim_report_download(user_id, Utc::now()).await? {
        info!("Report download claimed by user {user_id}");
        Ok(())
    } else {
        Err(AppError::UpgradeRequired(REPORT_UPGRADE_MESSAGE.to_string()))
    }
}

async fn mutate<F>(
    state: &AppState,
    user_id: Uuid,
    id: Uuid,
    apply: F,
) -> Result<InterviewSession, AppError>
where
    F: FnOnce(&mut InterviewSession) -> Result<(), SessionError>,
{
    let mut session = load_owned(state, user_id, id).await?;
    apply(&mut session)?;
    write_back(state, &mut session, "update").await?;
    Ok(session)
}

/// Saves a session that was loaded earlier in the request. If it was reset
/// in the meantime nothing is written and the caller gets 404.
async fn write_back(
    state: &AppState,
    session: &mut InterviewSession,
    operation: &str,
) -> Result<(), AppError> {
    if state.sessions.replace(session).await? {
        return Ok(());
    }
    info!(
        "Session {} was reset during {operation}; result discarded",
        session.id
    );
    Err(AppError::NotFound(format!(
        "Interview session {} not found",
        session.id
    )))
}

async fn reload_in_flight(
    state: &AppState,
    user_id: Uuid,
    id: Uuid,
    operation: &str,
) -> Result<InterviewSession, AppError> {
    load_owned(state, user_id, id).await.inspect_err(|_| {
        info!("Session {id} was reset during {operation}; result discarded");
    })
}

fn discarded(id: Uuid, session: &InterviewSession, operation: &str) -> AppError {
    info!(
        "Session {id} moved to '{}' during {operation}; result discarded",
        session.phase.name()
    );
    SessionError::InvalidPhase {
        actual: session.phase.name(),
    }
    .into()
}

/// The message kept on the session for the user to read.
fn llm_failure_message(err: &LlmError) -> String {
    match err {
        LlmError::MissingApiKey => AI_NOT_CONFIGURED.to_string(),
        other => other.to_string(),
    }
}

fn parse_stored<T: DeserializeOwned>(raw: &str) -> Result<T, AppError> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|e| AppError::Internal(anyhow!("unexpected stored value '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::billing::entitlement::testing::{free_row, MemoryUsageLedger};
    use crate::billing::entitlement::UsageLedger;
    use crate::interview::models::{InterviewReport, Question, INTRODUCTION_QUESTION};
    use crate::interview::records::testing::MemoryRecordStore;
    use crate::interview::records::RecordStore;
    use crate::interview::store::SessionStore;
    use crate::llm_client::testing::ScriptedGenerator;
    use crate::llm_client::TextGenerator;
    use crate::models::billing::SubscriptionRow;
    use crate::models::interview::InterviewRecordRow;
    use crate::state::testing::test_state;

    const SCORED_72: &str = r#"{"score": 72, "feedback": "Solid.", "strengths": ["Clear"], "weaknesses": [], "questionFeedback": []}"#;

    fn five_questions() -> String {
        serde_json::json!({
            "questions": [
                "Tell me about your background.",
                "Why this role?",
                "Describe a conflict you resolved.",
                "What motivates you?",
                "Any questions for us?"
            ]
        })
        .to_string()
    }

    fn hr_setup() -> SetupPatch {
        SetupPatch {
            resume_text: Some("Five years running payroll operations.".to_string()),
            category: Some(Category::Hr),
            difficulty: Some(Difficulty::Medium),
            question_count: Some(5),
            ..Default::default()
        }
    }

    async fn setup_session(state: &AppState, user: Uuid) -> InterviewSession {
        let session = create_session(state, user, false).await.unwrap();
        update_setup(state, user, session.id, hr_setup()).await.unwrap()
    }

    /// Session on its last question with an answer ready to submit.
    async fn last_question_session(state: &AppState, user: Uuid) -> InterviewSession {
        let mut session = InterviewSession::new(user, false, Utc::now());
        session.questions = vec![Question {
            id: 1,
            text: INTRODUCTION_QUESTION.to_string(),
        }];
        session.phase = Phase::InProgress { index: 0 };
        state.sessions.save(&mut session).await.unwrap();
        edit_transcript(state, user, session.id, "I run payroll.".to_string())
            .await
            .unwrap()
    }

    /// Generator that spends the user's free interview from another tab
    /// while the questions are being written.
    struct ClaimingGenerator {
        ledger: Arc<MemoryUsageLedger>,
        user_id: Uuid,
        reply: String,
    }

    #[async_trait]
    impl TextGenerator for ClaimingGenerator {
        async fn complete(&self, _prompt: &str, _system: &str) -> Result<String, LlmError> {
            let claimed = self
                .ledger
                .claim_interview(self.user_id, Utc::now())
                .await
                .unwrap();
            assert!(claimed);
            Ok(self.reply.clone())
        }
    }

    /// Ledger that resets the session while the interview is being claimed.
    struct ResettingLedger {
        sessions: Arc<dyn SessionStore>,
        session_id: Uuid,
    }

    #[async_trait]
    impl UsageLedger for ResettingLedger {
        async fn subscription(&self, user_id: Uuid) -> anyhow::Result<SubscriptionRow> {
            Ok(free_row(user_id))
        }

        async fn claim_interview(
            &self,
            _user_id: Uuid,
            _now: chrono::DateTime<Utc>,
        ) -> anyhow::Result<bool> {
            self.sessions.delete(self.session_id).await?;
            Ok(true)
        }

        async fn claim_report_download(
            &self,
            _user_id: Uuid,
            _now: chrono::DateTime<Utc>,
        ) -> anyhow::Result<bool> {
            Ok(true)
        }
    }

    /// Record store that resets the session while the record is written.
    struct ResettingRecordStore {
        sessions: Arc<dyn SessionStore>,
        inner: MemoryRecordStore,
    }

    #[async_trait]
    impl RecordStore for ResettingRecordStore {
        async fn insert(&self, record: &NewInterviewRecord) -> anyhow::Result<bool> {
            self.sessions.delete(record.id).await?;
            self.inner.insert(record).await
        }

        async fn list(&self, user_id: Uuid) -> anyhow::Result<Vec<InterviewRecordRow>> {
            self.inner.list(user_id).await
        }

        async fn get(
            &self,
            user_id: Uuid,
            id: Uuid,
        ) -> anyhow::Result<Option<InterviewRecordRow>> {
            self.inner.get(user_id, id).await
        }
    }

    #[tokio::test]
    async fn test_blocked_free_user_stays_in_setup_without_an_ai_call() {
        let llm = Arc::new(ScriptedGenerator::replying(&five_questions()));
        let mut state = test_state(llm.clone());
        let ledger = Arc::new(MemoryUsageLedger::default());
        state.usage = ledger.clone();
        let user = Uuid::new_v4();
        let mut used = free_row(user);
        used.interviews_taken = 1;
        ledger.put(used).await;

        let session = setup_session(&state, user).await;
        let err = start_interview(&state, user, session.id).await.unwrap_err();
        assert!(matches!(err, AppError::UpgradeRequired(_)));

        let stored = load_owned(&state, user, session.id).await.unwrap();
        assert_eq!(stored.phase, Phase::Setup);
        assert_eq!(stored.revision, session.revision);
        assert!(llm.prompts.lock().await.is_empty());
        assert_eq!(ledger.get(user).await.interviews_taken, 1);
    }

    #[tokio::test]
    async fn test_phase_conflict_is_reported_before_the_gate() {
        let mut state = test_state(Arc::new(ScriptedGenerator::default()));
        let ledger = Arc::new(MemoryUsageLedger::default());
        state.usage = ledger.clone();
        let user = Uuid::new_v4();
        let mut used = free_row(user);
        used.interviews_taken = 1;
        ledger.put(used).await;

        let session = last_question_session(&state, user).await;
        let err = start_interview(&state, user, session.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_free_interview_runs_end_to_end_and_is_recorded() {
        let llm = ScriptedGenerator::new(vec![Ok(five_questions()), Ok(SCORED_72.to_string())]);
        let mut state = test_state(Arc::new(llm));
        let ledger = Arc::new(MemoryUsageLedger::default());
        let records = Arc::new(MemoryRecordStore::default());
        state.usage = ledger.clone();
        state.records = records.clone();
        let user = Uuid::new_v4();

        let session = setup_session(&state, user).await;
        let started = start_interview(&state, user, session.id).await.unwrap();
        assert_eq!(started.phase, Phase::InProgress { index: 0 });
        assert_eq!(started.questions.len(), 5);
        assert_eq!(started.questions[0].text, INTRODUCTION_QUESTION);
        assert_eq!(ledger.get(user).await.interviews_taken, 1);

        let mut current = started;
        for i in 1..=5 {
            edit_transcript(&state, user, session.id, format!("Answer {i}"))
                .await
                .unwrap();
            current = submit_answer(&state, user, session.id, false)
                .await
                .unwrap();
        }

        assert_eq!(current.phase, Phase::Complete);
        assert_eq!(current.answers.len(), 5);
        assert_eq!(current.report.as_ref().map(|r| r.score), Some(72));
        assert_eq!(current.record, RecordStatus::Saved);

        let saved = records.list(user).await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].id, session.id);
        assert_eq!(saved[0].marks, 72);
        assert_eq!(saved[0].category, "hr");
        assert_eq!(saved[0].difficulty, "medium");
        let script: InterviewScript = serde_json::from_value(saved[0].script.clone()).unwrap();
        assert_eq!(script.answers[4].user_answer, "Answer 5");
        assert_eq!(
            script.feedback,
            InterviewReport {
                score: 72,
                feedback: "Solid.".to_string(),
                strengths: vec!["Clear".to_string()],
                weaknesses: vec![],
                question_feedback: vec![],
            }
        );
    }

    #[tokio::test]
    async fn test_interview_claimed_elsewhere_during_generation_returns_to_setup() {
        let ledger = Arc::new(MemoryUsageLedger::default());
        let user = Uuid::new_v4();
        let llm = ClaimingGenerator {
            ledger: ledger.clone(),
            user_id: user,
            reply: five_questions(),
        };
        let mut state = test_state(Arc::new(llm));
        state.usage = ledger.clone();

        let session = setup_session(&state, user).await;
        let err = start_interview(&state, user, session.id).await.unwrap_err();
        assert!(matches!(err, AppError::UpgradeRequired(_)));

        let stored = load_owned(&state, user, session.id).await.unwrap();
        assert_eq!(stored.phase, Phase::Setup);
        assert!(stored.questions.is_empty());
        assert_eq!(stored.last_error.as_deref(), Some(INTERVIEW_UPGRADE_MESSAGE));
        assert_eq!(ledger.get(user).await.interviews_taken, 1);
    }

    #[tokio::test]
    async fn test_reset_while_claiming_is_not_undone() {
        let mut state = test_state(Arc::new(ScriptedGenerator::replying(&five_questions())));
        let user = Uuid::new_v4();
        let session = setup_session(&state, user).await;
        state.usage = Arc::new(ResettingLedger {
            sessions: state.sessions.clone(),
            session_id: session.id,
        });

        let err = start_interview(&state, user, session.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(state.sessions.load(session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reset_while_saving_the_record_is_not_undone() {
        let mut state = test_state(Arc::new(ScriptedGenerator::replying(SCORED_72)));
        state.records = Arc::new(ResettingRecordStore {
            sessions: state.sessions.clone(),
            inner: MemoryRecordStore::default(),
        });
        let user = Uuid::new_v4();
        let session = last_question_session(&state, user).await;

        let err = submit_answer(&state, user, session.id, false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(state.sessions.load(session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_saved_report_export_uses_the_download_allowance() {
        let llm = ScriptedGenerator::replying(SCORED_72);
        let mut state = test_state(Arc::new(llm));
        let records = Arc::new(MemoryRecordStore::default());
        state.records = records.clone();
        let user = Uuid::new_v4();
        let session = last_question_session(&state, user).await;
        submit_answer(&state, user, session.id, false).await.unwrap();

        let markdown = export_saved_report(&state, user, session.id).await.unwrap();
        assert!(markdown.contains("72"));
        assert!(matches!(
            export_saved_report(&state, user, session.id).await,
            Err(AppError::UpgradeRequired(_))
        ));
        assert!(matches!(
            export_saved_report(&state, Uuid::new_v4(), session.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_sessions_are_private_to_their_owner() {
        let state = test_state(Arc::new(ScriptedGenerator::default()));
        let owner = Uuid::new_v4();
        let session = create_session(&state, owner, true).await.unwrap();

        assert!(load_owned(&state, owner, session.id).await.is_ok());
        assert!(matches!(
            load_owned(&state, Uuid::new_v4(), session.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            reset_session(&state, Uuid::new_v4(), session.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_setup_patch_is_mirrored_and_reset_removes_it() {
        let state = test_state(Arc::new(ScriptedGenerator::default()));
        let user = Uuid::new_v4();
        let session = create_session(&state, user, false).await.unwrap();

        let patch = SetupPatch {
            job_description: Some("Rust backend engineer".to_string()),
            question_count: Some(99),
            ..Default::default()
        };
        let updated = update_setup(&state, user, session.id, patch).await.unwrap();
        assert_eq!(updated.setup.question_count, 50);
        assert!(updated.revision > session.revision);

        let reloaded = load_owned(&state, user, session.id).await.unwrap();
        assert_eq!(reloaded.setup.job_description, "Rust backend engineer");

        reset_session(&state, user, session.id).await.unwrap();
        assert!(matches!(
            load_owned(&state, user, session.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_speech_actions_outside_an_interview_conflict() {
        let state = test_state(Arc::new(ScriptedGenerator::default()));
        let user = Uuid::new_v4();
        let session = create_session(&state, user, true).await.unwrap();

        assert!(matches!(
            start_capture(&state, user, session.id).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            submit_answer(&state, user, session.id, true).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            retry_persist(&state, user, session.id).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_scoring_keeps_answers_and_can_be_retried() {
        let llm = ScriptedGenerator::new(vec![
            Err(LlmError::Api {
                status: 529,
                message: "Overloaded".to_string(),
            }),
            Ok("not json".to_string()),
        ]);
        let state = test_state(Arc::new(llm));
        let user = Uuid::new_v4();

        let mut session = InterviewSession::new(user, false, Utc::now());
        session.questions = vec![Question {
            id: 1,
            text: "Please introduce yourself.".to_string(),
        }];
        session.phase = Phase::InProgress { index: 0 };
        state.sessions.save(&mut session).await.unwrap();

        edit_transcript(&state, user, session.id, "I build APIs.".to_string())
            .await
            .unwrap();
        let err = submit_answer(&state, user, session.id, false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Llm(_)));

        let stored = load_owned(&state, user, session.id).await.unwrap();
        assert_eq!(stored.phase, Phase::Scoring { started_at: None });
        assert_eq!(stored.answers.len(), 1);
        assert_eq!(stored.answers[0].user_answer, "I build APIs.");
        assert_eq!(
            stored.last_error.as_deref(),
            Some("API error (status 529): Overloaded")
        );

        let err = retry_scoring(&state, user, session.id).await.unwrap_err();
        assert!(matches!(err, AppError::UnprocessableEntity(_)));
        let stored = load_owned(&state, user, session.id).await.unwrap();
        assert_eq!(stored.phase, Phase::Scoring { started_at: None });
        assert!(stored.report.is_none());
    }

    #[test]
    fn test_missing_key_message_is_fixed() {
        assert_eq!(
            llm_failure_message(&LlmError::MissingApiKey),
            AI_NOT_CONFIGURED
        );
    }

    #[test]
    fn test_stored_enums_parse_from_text() {
        let category: Category = parse_stored("system_design").unwrap();
        assert_eq!(category, Category::SystemDesign);
        assert!(parse_stored::<Difficulty>("impossible").is_err());
    }
}
