// All LLM prompt constants for the interview module.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for question generation.
pub const QUESTION_SYSTEM: &str = "You are an experienced interviewer preparing a realistic \
    mock interview. You write clear, specific, open-ended questions grounded in the \
    candidate's background and the target role.";

/// Question generation prompt.
/// Replace: {json_only}, {untrusted}, {category}, {difficulty}, {question_count},
///          {job_description}, {resume_text}
pub const QUESTION_PROMPT_TEMPLATE: &str = r#"{json_only}

{untrusted}

Prepare a {category} interview at {difficulty} difficulty.

Return a JSON object with this EXACT schema:
{
  "questions": ["Please introduce yourself.", "second question", "..."]
}

HARD RULES:
1. Return EXACTLY {question_count} questions.
2. The FIRST question MUST be exactly: "Please introduce yourself."
3. Every question is a single string, asked one at a time, without numbering.
4. Tailor the remaining questions to the resume and job description below.
5. easy = fundamentals and motivation, medium = applied scenarios, hard = deep trade-offs and edge cases.

JOB DESCRIPTION:
<candidate_input>
{job_description}
</candidate_input>

RESUME:
<candidate_input>
{resume_text}
</candidate_input>"#;

/// System prompt for transcript scoring.
pub const REPORT_SYSTEM: &str = "You are a senior hiring manager scoring a mock interview \
    transcript. You are fair, specific and constructive.";

/// Scoring prompt.
/// Replace: {json_only}, {untrusted}, {category}, {difficulty}, {transcript}
pub const REPORT_PROMPT_TEMPLATE: &str = r#"{json_only}

{untrusted}

Score this {category} interview ({difficulty} difficulty).

Return a JSON object with this EXACT schema (no extra fields):
{
  "score": 72,
  "feedback": "Two or three sentences of overall feedback.",
  "strengths": ["specific strength"],
  "weaknesses": ["specific weakness"],
  "questionFeedback": [
    {
      "questionNumber": 1,
      "question": "the question text",
      "answer": "the candidate's answer",
      "feedback": "what was good and what to improve",
      "rating": "good"
    }
  ]
}

RULES:
1. "score" is an integer from 0 to 100.
2. "rating" is one of "good", "average", "needs_improvement".
3. Provide one questionFeedback entry per question, in order.
4. An answer of "Skipped" means the candidate did not answer; rate it "needs_improvement".

TRANSCRIPT:
<candidate_input>
{transcript}
</candidate_input>"#;
