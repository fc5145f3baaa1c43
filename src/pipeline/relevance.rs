//! Relevance filter: asks the LLM which emails matter for school or work.
//!
//! Flow:
//! 1. Empty input short-circuits (no LLM call)
//! 2. One classification call over all emails, temperature 0
//! 3. Lenient JSON parse (direct, then fenced/bracketed extraction)
//! 4. Every parsed entry is matched back to an input record; the output only
//!    ever contains input records, never the model's echo

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::channels::MailRecord;
use crate::error::LlmError;
use crate::llm::{ChatMessage, CompletionRequest, FinishReason, LlmProvider};

/// Default per-email body budget in the prompt, in characters.
pub const DEFAULT_BODY_CHAR_BUDGET: usize = 500;

/// Classification must be repeatable for the same inbox.
const CLASSIFY_TEMPERATURE: f32 = 0.0;

/// Output budget before any emails are echoed.
const CLASSIFY_BASE_TOKENS: u32 = 256;

/// One `{"index", "from", "subject", "date"}` answer entry.
const CLASSIFY_TOKENS_PER_EMAIL: u32 = 96;

/// Largest output budget requested, whatever the batch size.
const CLASSIFY_MAX_TOKENS: u32 = 16_384;

/// Filtered emails plus how many were dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterResult {
    pub emails: Vec<MailRecord>,
    pub filtered_out: usize,
}

impl FilterResult {
    /// Keep everything (filter disabled).
    pub fn unfiltered(emails: Vec<MailRecord>) -> Self {
        Self {
            emails,
            filtered_out: 0,
        }
    }
}

/// LLM-backed email relevance filter.
pub struct RelevanceFilter {
    llm: Arc<dyn LlmProvider>,
    body_char_budget: usize,
}

impl RelevanceFilter {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            body_char_budget: DEFAULT_BODY_CHAR_BUDGET,
        }
    }

    pub fn with_body_char_budget(mut self, budget: usize) -> Self {
        self.body_char_budget = budget;
        self
    }

    /// Classify `records` and keep the relevant ones.
    ///
    /// LLM call failures propagate. Unparseable output is not an error: it
    /// yields an empty selection with everything counted as filtered out.
    pub async fn filter(&self, records: Vec<MailRecord>) -> Result<FilterResult, LlmError> {
        if records.is_empty() {
            debug!("No emails to classify, skipping LLM call");
            return Ok(FilterResult {
                emails: Vec::new(),
                filtered_out: 0,
            });
        }

        let max_tokens = classify_max_tokens(records.len());
        info!(
            count = records.len(),
            max_tokens,
            model = %self.llm.model_name(),
            "Classifying emails"
        );

        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_classification_system_prompt()),
            ChatMessage::user(build_classification_user_prompt(
                &records,
                self.body_char_budget,
            )),
        ])
        .with_temperature(CLASSIFY_TEMPERATURE)
        .with_max_tokens(max_tokens);

        let response = self.llm.complete(request).await?;

        let (input_cost, output_cost) = self.llm.cost_per_token();
        let cost = input_cost * Decimal::from(response.input_tokens)
            + output_cost * Decimal::from(response.output_tokens);
        debug!(
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            cost_usd = %cost,
            "Classification call complete"
        );

        if response.finish_reason == FinishReason::Length {
            warn!(
                max_tokens,
                output_tokens = response.output_tokens,
                "Classification output hit the token limit, answer may be truncated"
            );
        }

        let entries = parse_classification_response(&response.content).unwrap_or_else(|| {
            warn!(
                raw_response = %response.content,
                "Could not parse classification output, treating as no relevant emails"
            );
            Vec::new()
        });

        let selected = match_to_input(&records, &entries);
        let mut taken: Vec<Option<MailRecord>> = records.into_iter().map(Some).collect();
        let emails: Vec<MailRecord> = selected
            .into_iter()
            .filter_map(|i| taken[i].take())
            .collect();
        let filtered_out = taken.len() - emails.len();

        info!(
            relevant = emails.len(),
            filtered_out, "Email classification complete"
        );
        Ok(FilterResult {
            emails,
            filtered_out,
        })
    }
}

/// Output budget for classifying `count` emails.
fn classify_max_tokens(count: usize) -> u32 {
    let count = u32::try_from(count).unwrap_or(u32::MAX);
    CLASSIFY_BASE_TOKENS
        .saturating_add(count.saturating_mul(CLASSIFY_TOKENS_PER_EMAIL))
        .min(CLASSIFY_MAX_TOKENS)
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_classification_system_prompt() -> String {
    "You are a helpful assistant that filters emails. You classify each email as \
     relevant or not relevant to the reader's school or employment, and you answer \
     with strict JSON only."
        .to_string()
}

fn build_classification_user_prompt(records: &[MailRecord], body_char_budget: usize) -> String {
    let email_texts = records
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let body: String = e.body.chars().take(body_char_budget).collect();
            format!(
                "[{i}]\nFrom: {}\nSubject: {}\nDate: {}\nBody: {}",
                e.from, e.subject, e.date, body
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Determine which of the emails below are relevant to **school or employment**.\n\
         Be inclusive: anything mentioning school, university, college, classes, courses, \
         professors, assignments, exams, grades, financial aid, jobs, employment, \
         internships, applications, interviews, offers, recruiters, hiring or careers \
         counts as relevant.\n\n\
         Return ONLY a JSON array of the relevant emails. Each element must be an object \
         with the fields \"index\", \"from\", \"subject\" and \"date\", copied exactly \
         from the list below (\"index\" is the number in square brackets). Do not copy \
         the body.\n\
         If none are relevant, return an empty JSON array [].\n\n\
         Here are the emails:\n\n{email_texts}"
    )
}

// ── Response parsing ────────────────────────────────────────────────

/// Parse the model output into a list of candidate entries.
///
/// Returns `None` only when no JSON could be recovered at all.
fn parse_classification_response(raw: &str) -> Option<Vec<Value>> {
    let trimmed = raw.trim();
    let value = serde_json::from_str::<Value>(trimmed)
        .ok()
        .or_else(|| extract_json_candidate(trimmed))?;

    match value {
        Value::Array(items) => Some(items),
        Value::Object(mut obj) => match obj.remove("emails") {
            Some(Value::Array(items)) => Some(items),
            Some(other) => {
                obj.insert("emails".to_string(), other);
                Some(vec![Value::Object(obj)])
            }
            None => Some(vec![Value::Object(obj)]),
        },
        other => {
            warn!(value = %other, "Classification output is JSON but not an array or object");
            Some(Vec::new())
        }
    }
}

/// Pull a JSON array or object out of surrounding prose or a markdown fence.
///
/// Every `[` or `{` is tried as a start position, in order. The first value
/// that parses and looks like an answer (an object, or an array of objects)
/// wins, so labels such as `[0]` in the prose are skipped.
fn extract_json_candidate(text: &str) -> Option<Value> {
    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```")
            && let Ok(value) = serde_json::from_str::<Value>(after[..end].trim())
        {
            return Some(value);
        }
    }

    text.match_indices(['[', '{'])
        .filter_map(|(start, _)| leading_json_value(&text[start..]))
        .find(looks_like_answer)
}

/// Parse the JSON value at the start of `text`, ignoring whatever follows it.
fn leading_json_value(text: &str) -> Option<Value> {
    serde_json::Deserializer::from_str(text)
        .into_iter::<Value>()
        .next()?
        .ok()
}

fn looks_like_answer(value: &Value) -> bool {
    match value {
        Value::Object(_) => true,
        Value::Array(items) => items.iter().all(Value::is_object),
        _ => false,
    }
}

/// Map parsed entries to input indices, in the model's order.
///
/// An entry matches by `index` when it is in range, unused, and any echoed
/// `from`/`subject`/`date` agree with that record; otherwise by exact
/// `from` + `subject` + `date`. Each input is matched at most once.
fn match_to_input(records: &[MailRecord], entries: &[Value]) -> Vec<usize> {
    let mut used = vec![false; records.len()];
    let mut selected = Vec::new();

    for entry in entries {
        let Some(obj) = entry.as_object() else {
            warn!(entry = %entry, "Dropping non-object classification entry");
            continue;
        };
        let field = |name: &str| obj.get(name).and_then(Value::as_str);
        let (from, subject, date) = (field("from"), field("subject"), field("date"));

        let agrees = |r: &MailRecord| {
            from.is_none_or(|f| f == r.from)
                && subject.is_none_or(|s| s == r.subject)
                && date.is_none_or(|d| d == r.date)
        };

        let by_index = obj
            .get("index")
            .and_then(Value::as_u64)
            .and_then(|i| usize::try_from(i).ok())
            .filter(|&i| i < records.len() && !used[i] && agrees(&records[i]));

        let by_fields = || match (from, subject, date) {
            (Some(f), Some(s), Some(d)) => (0..records.len()).find(|&i| {
                let r = &records[i];
                !used[i] && r.from == f && r.subject == s && r.date == d
            }),
            _ => None,
        };

        match by_index.or_else(by_fields) {
            Some(i) => {
                used[i] = true;
                selected.push(i);
            }
            None => {
                warn!(entry = %entry, "Dropping classification entry with no matching input email");
            }
        }
    }

    selected
}
