//! Question generation delegate.

use serde::Deserialize;
use tracing::{info, warn};

use crate::interview::models::{InterviewSetup, Question, INTRODUCTION_QUESTION};
use crate::interview::prompts::{QUESTION_PROMPT_TEMPLATE, QUESTION_SYSTEM};
use crate::llm_client::prompts::{
    neutralize_untrusted, JSON_ONLY_SYSTEM, UNTRUSTED_INPUT_INSTRUCTION,
};
use crate::llm_client::{complete_json, LlmError, TextGenerator};

#[derive(Debug, Deserialize)]
struct GeneratedQuestions {
    questions: Vec<String>,
}

/// Asks the model for `setup.question_count` questions.
///
/// The response is accepted whole or not at all: blank entries or too few
/// questions fail the call. Extra questions are dropped, and the first
/// question is always the fixed introduction.
pub async fn generate_questions(
    llm: &dyn TextGenerator,
    setup: &InterviewSetup,
) -> Result<Vec<Question>, LlmError> {
    let prompt = build_question_prompt(setup);
    let generated: GeneratedQuestions = complete_json(llm, &prompt, QUESTION_SYSTEM).await?;
    let questions = normalize_questions(generated.questions, setup.question_count as usize)?;
    info!(
        "Generated {} {} questions",
        questions.len(),
        setup.category.as_str()
    );
    Ok(questions)
}

fn build_question_prompt(setup: &InterviewSetup) -> String {
    // User text goes in last so placeholders inside it are never expanded.
    QUESTION_PROMPT_TEMPLATE
        .replace("{json_only}", JSON_ONLY_SYSTEM)
        .replace("{untrusted}", UNTRUSTED_INPUT_INSTRUCTION)
        .replace("{category}", setup.category.label())
        .replace("{difficulty}", setup.difficulty.as_str())
        .replace("{question_count}", &setup.question_count.to_string())
        .replace(
            "{job_description}",
            &neutralize_untrusted(or_none(&setup.job_description)),
        )
        .replace("{resume_text}", &neutralize_untrusted(or_none(&setup.resume_text)))
}

fn or_none(text: &str) -> &str {
    let text = text.trim();
    if text.is_empty() {
        "(not provided)"
    } else {
        text
    }
}

fn normalize_questions(raw: Vec<String>, expected: usize) -> Result<Vec<Question>, LlmError> {
    if raw.iter().any(|q| q.trim().is_empty()) {
        return Err(LlmError::InvalidShape(
            "question list contains an empty entry".to_string(),
        ));
    }
    if raw.len() < expected {
        return Err(LlmError::InvalidShape(format!(
            "expected {expected} questions, received {}",
            raw.len()
        )));
    }
    if raw.len() > expected {
        warn!("Model returned {} questions, keeping {expected}", raw.len());
    }

    Ok(raw
        .into_iter()
        .take(expected)
        .enumerate()
        .map(|(i, text)| Question {
            id: i as u32 + 1,
            text: if i == 0 {
                INTRODUCTION_QUESTION.to_string()
            } else {
                text.trim().to_string()
            },
        })
        .collect())
}
