use serde::{Deserialize, Serialize};

/// Bounds for `InterviewSetup::question_count`.
pub const MIN_QUESTIONS: u32 = 5;
pub const MAX_QUESTIONS: u32 = 50;
pub const DEFAULT_QUESTIONS: u32 = 10;

/// The fixed opening question of every session.
pub const INTRODUCTION_QUESTION: &str = "Please introduce yourself.";

/// Recorded as the answer when the user confirms skipping a question.
pub const SKIPPED_ANSWER: &str = "Skipped";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    #[default]
    Hr,
    Technical,
    Behavioral,
    SystemDesign,
    Frontend,
    Backend,
    DataScience,
    ProductManagement,
    Marketing,
    Sales,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Hr => "hr",
            Category::Technical => "technical",
            Category::Behavioral => "behavioral",
            Category::SystemDesign => "system_design",
            Category::Frontend => "frontend",
            Category::Backend => "backend",
            Category::DataScience => "data_science",
            Category::ProductManagement => "product_management",
            Category::Marketing => "marketing",
            Category::Sales => "sales",
        }
    }

    /// Human-readable label used inside prompts and exported reports.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Hr => "HR",
            Category::Technical => "Technical",
            Category::Behavioral => "Behavioral",
            Category::SystemDesign => "System Design",
            Category::Frontend => "Frontend Engineering",
            Category::Backend => "Backend Engineering",
            Category::DataScience => "Data Science",
            Category::ProductManagement => "Product Management",
            Category::Marketing => "Marketing",
            Category::Sales => "Sales",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewSetup {
    pub resume_text: String,
    pub job_description: String,
    pub category: Category,
    pub difficulty: Difficulty,
    pub question_count: u32,
}

impl Default for InterviewSetup {
    fn default() -> Self {
        Self {
            resume_text: String::new(),
            job_description: String::new(),
            category: Category::default(),
            difficulty: Difficulty::default(),
            question_count: DEFAULT_QUESTIONS,
        }
    }
}

impl InterviewSetup {
    /// At least one of resume / job description must carry text.
    pub fn has_source_material(&self) -> bool {
        !self.resume_text.trim().is_empty() || !self.job_description.trim().is_empty()
    }

    pub fn apply(&mut self, patch: SetupPatch) {
        if let Some(resume_text) = patch.resume_text {
            self.resume_text = resume_text;
        }
        if let Some(job_description) = patch.job_description {
            self.job_description = job_description;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(difficulty) = patch.difficulty {
            self.difficulty = difficulty;
        }
        if let Some(count) = patch.question_count {
            self.question_count = clamp_question_count(count);
        }
    }
}

/// Partial update of the setup form. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SetupPatch {
    pub resume_text: Option<String>,
    pub job_description: Option<String>,
    pub category: Option<Category>,
    pub difficulty: Option<Difficulty>,
    pub question_count: Option<i64>,
}

pub fn clamp_question_count(requested: i64) -> u32 {
    requested.clamp(MIN_QUESTIONS as i64, MAX_QUESTIONS as i64) as u32
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// 1-based position in the generated sequence.
    pub id: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: u32,
    pub question_text: String,
    pub user_answer: String,
}

impl Answer {
    pub fn is_skipped(&self) -> bool {
        self.user_answer == SKIPPED_ANSWER
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Good,
    Average,
    NeedsImprovement,
}

impl Rating {
    pub fn label(&self) -> &'static str {
        match self {
            Rating::Good => "Good",
            Rating::Average => "Average",
            Rating::NeedsImprovement => "Needs improvement",
        }
    }
}

/// Per-question feedback. Field names follow the JSON the scoring model returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionFeedback {
    pub question_number: u32,
    pub question: String,
    pub answer: String,
    pub feedback: String,
    pub rating: Rating,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewReport {
    pub score: u32,
    pub feedback: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub question_feedback: Vec<QuestionFeedback>,
}
