use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_HISTORY_LIMIT: i64 = 10;

/// A single proxied LLM call. Never updated after it is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AIInteraction {
    pub id: Uuid,
    pub prompt: String,
    pub response: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewInteraction {
    pub prompt: String,
    pub response: String,
    pub model: String,
}

/// Fields are optional so an absent or `null` value reaches the blank check.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

impl GenerateRequest {
    pub fn prompt(&self) -> &str {
        self.prompt.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

impl ChatRequest {
    pub fn question(&self) -> &str {
        self.question.as_deref().unwrap_or_default()
    }

    pub fn context(&self) -> &str {
        self.context.as_deref().unwrap_or_default()
    }

    /// Wraps the question and its data context into a single prompt.
    pub fn to_prompt(&self) -> String {
        format!(
            "You are a data analyst helping a user understand a dataset they uploaded.\n\n\
            Context:\n{}\n\n\
            Question: {}\n\n\
            Answer the question using only the context above. Be concise.",
            self.context().trim(),
            self.question().trim()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_prompt_embeds_context_and_question() {
        let request = ChatRequest {
            question: Some(" Which month had the most sales? ".into()),
            context: Some("month,sales\njan,10\nfeb,30".into()),
        };
        let prompt = request.to_prompt();
        assert!(prompt.contains("Context:\nmonth,sales\njan,10\nfeb,30\n"));
        assert!(prompt.contains("Question: Which month had the most sales?\n"));
    }

    #[test]
    fn null_fields_read_as_blank() {
        let generate: GenerateRequest = serde_json::from_str(r#"{"prompt": null}"#).unwrap();
        assert_eq!(generate.prompt(), "");

        let chat: ChatRequest = serde_json::from_str(r#"{"question": null}"#).unwrap();
        assert_eq!(chat.question(), "");
        assert_eq!(chat.context(), "");
    }
}
