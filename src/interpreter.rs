//! Response interpreter
//!
//! Normalizes one raw model completion into a [`PendingQuestion`]. The
//! model is not trusted to emit pure JSON: a structured question may be
//! wrapped in prose, truncated, or absent entirely. Whatever comes in,
//! this is a total function - any decode failure degrades to treating
//! the whole reply as a free-text question, verbatim. That fallback is
//! load-bearing: the opening turn is typically plain prose.
//!
//! The extraction heuristic (first `{` to its matching `}`) can misfire
//! when a reply carries two separate JSON fragments; the first balanced
//! object wins and the rest rides along as ignored prose. Keep callers
//! behind [`interpret`] so the heuristic can be swapped for a stricter
//! grammar or provider-side structured output later.

use serde::{Deserialize, Serialize};

/// Input affordance required for the next user turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    FreeText,
    MultiChoice,
    Terminal,
}

/// One selectable option in a multi-choice question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

/// Normalized form of the most recent assistant turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingQuestion {
    pub question_text: String,
    pub kind: QuestionKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ChoiceOption>,
    #[serde(default)]
    pub allow_multiple: bool,
}

impl PendingQuestion {
    pub fn free_text(question_text: impl Into<String>) -> Self {
        Self {
            question_text: question_text.into(),
            kind: QuestionKind::FreeText,
            options: Vec::new(),
            allow_multiple: false,
        }
    }

    pub fn terminal(question_text: impl Into<String>) -> Self {
        Self {
            question_text: question_text.into(),
            kind: QuestionKind::Terminal,
            options: Vec::new(),
            allow_multiple: false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind == QuestionKind::Terminal
    }
}

/// Classify one raw completion. Total over all input; never fails.
pub fn interpret(raw: &str) -> PendingQuestion {
    extract_json_object(raw)
        .and_then(|span| serde_json::from_str::<WireQuestion>(span).ok())
        .and_then(WireQuestion::into_pending)
        .unwrap_or_else(|| PendingQuestion::free_text(raw))
}

/// Find the first balanced `{...}` span, tolerating surrounding prose.
/// String literals and escapes inside the object are honored so braces
/// in question text don't unbalance the scan.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in raw.get(start..)?.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return raw.get(start..start + offset + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

// ============================================================
// Wire schema for structured questions
// ============================================================

/// Loosely-typed shape the model is asked to emit. Both required
/// fields are optional here so a partial object falls through to the
/// free-text path instead of erroring.
#[derive(Debug, Deserialize)]
struct WireQuestion {
    question_text: Option<String>,
    input_type: Option<String>,
    #[serde(default)]
    options: Vec<WireOption>,
    #[serde(default)]
    allow_multiple: bool,
}

/// Options arrive either as bare strings or `{value, example}` objects
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireOption {
    Bare(String),
    Full {
        value: String,
        #[serde(default)]
        example: Option<String>,
    },
}

impl WireOption {
    fn into_choice(self) -> ChoiceOption {
        match self {
            WireOption::Bare(value) => ChoiceOption {
                value,
                example: None,
            },
            WireOption::Full { value, example } => ChoiceOption { value, example },
        }
    }
}

impl WireQuestion {
    /// Returns `None` when the object is not a usable structured
    /// question; the caller then falls back to free text.
    fn into_pending(self) -> Option<PendingQuestion> {
        let question_text = self.question_text?;
        let input_type = self.input_type?;

        let kind = match input_type.as_str() {
            "text" | "free_text" => QuestionKind::FreeText,
            "choice" | "multiple_choice" => QuestionKind::MultiChoice,
            "end" | "terminal" => QuestionKind::Terminal,
            _ => return None,
        };

        if kind == QuestionKind::MultiChoice && self.options.is_empty() {
            return None;
        }

        let options = if kind == QuestionKind::MultiChoice {
            self.options.into_iter().map(WireOption::into_choice).collect()
        } else {
            Vec::new()
        };

        Some(PendingQuestion {
            question_text,
            kind,
            options,
            allow_multiple: kind == QuestionKind::MultiChoice && self.allow_multiple,
        })
    }
}
