//! Report generation delegate and report export rendering.

use std::fmt::Write as _;

use tracing::info;

use crate::interview::models::{Answer, Category, Difficulty, InterviewReport, Question};
use crate::interview::prompts::{REPORT_PROMPT_TEMPLATE, REPORT_SYSTEM};
use crate::llm_client::prompts::{
    neutralize_untrusted, JSON_ONLY_SYSTEM, UNTRUSTED_INPUT_INSTRUCTION,
};
use crate::llm_client::{complete_json, LlmError, TextGenerator};

pub const MAX_SCORE: u32 = 100;

/// Sends the transcript to the model and parses the report strictly.
/// Anything that is not a complete report with a score in 0..=100 fails.
pub async fn generate_report(
    llm: &dyn TextGenerator,
    category: Category,
    difficulty: Difficulty,
    questions: &[Question],
    answers: &[Answer],
) -> Result<InterviewReport, LlmError> {
    let prompt = build_report_prompt(category, difficulty, questions, answers);
    let report: InterviewReport = complete_json(llm, &prompt, REPORT_SYSTEM).await?;
    if report.score > MAX_SCORE {
        return Err(LlmError::InvalidShape(format!(
            "score {} is outside 0-{MAX_SCORE}",
            report.score
        )));
    }
    info!(
        "Scored {} interview: {}/{MAX_SCORE}",
        category.as_str(),
        report.score
    );
    Ok(report)
}

fn build_report_prompt(
    category: Category,
    difficulty: Difficulty,
    questions: &[Question],
    answers: &[Answer],
) -> String {
    REPORT_PROMPT_TEMPLATE
        .replace("{json_only}", JSON_ONLY_SYSTEM)
        .replace("{untrusted}", UNTRUSTED_INPUT_INSTRUCTION)
        .replace("{category}", category.label())
        .replace("{difficulty}", difficulty.as_str())
        .replace(
            "{transcript}",
            &neutralize_untrusted(&render_transcript(questions, answers)),
        )
}

fn render_transcript(questions: &[Question], answers: &[Answer]) -> String {
    let mut out = String::new();
    for question in questions {
        let answer = answers
            .iter()
            .find(|a| a.question_id == question.id)
            .map(|a| a.user_answer.as_str())
            .unwrap_or("Skipped");
        let _ = writeln!(out, "Q{}: {}", question.id, question.text);
        let _ = writeln!(out, "A{}: {}\n", question.id, answer);
    }
    out.trim_end().to_string()
}

/// Renders a report as markdown for the browser to print.
pub fn render_report_markdown(
    category: Category,
    difficulty: Difficulty,
    report: &InterviewReport,
) -> String {
    let mut md = format!(
        "# Interview Report: {} ({})\n\n",
        category.label(),
        difficulty.as_str()
    );
    let _ = writeln!(md, "**Overall score:** {}/{MAX_SCORE}\n", report.score);
    let _ = writeln!(md, "{}\n", report.feedback.trim());

    for (title, items) in [
        ("Strengths", &report.strengths),
        ("Areas to improve", &report.weaknesses),
    ] {
        if items.is_empty() {
            continue;
        }
        let _ = writeln!(md, "## {title}\n");
        for item in items {
            let _ = writeln!(md, "- {}", item.trim());
        }
        md.push('\n');
    }

    if !report.question_feedback.is_empty() {
        md.push_str("## Question by question\n\n");
        for qf in &report.question_feedback {
            let _ = writeln!(md, "### {}. {}\n", qf.question_number, qf.question.trim());
            let _ = writeln!(md, "- **Your answer:** {}", qf.answer.trim());
            let _ = writeln!(md, "- **Rating:** {}", qf.rating.label());
            let _ = writeln!(md, "- **Feedback:** {}\n", qf.feedback.trim());
        }
    }
    md.trim_end().to_string() + "\n"
}
