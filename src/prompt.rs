//! Prompt assembly for the completion backend.
//!
//! A [`Prompt`] is the system instructions (persona plus retrieved
//! context) followed by the recent conversation and the new user message.

use serde::Serialize;

use crate::models::{Message, Role};

const DEFAULT_PERSONA: &str = "You are the personal assistant of {name}. Visitors ask you about \
{name}'s background, experience, skills, projects, education and interests.

Guidelines:
- Base your answers on the knowledge base context below whenever it is relevant.
- If the context does not contain the answer, say that you do not have that information \
instead of guessing.
- Keep replies conversational, warm and professional.
- When greeted, introduce yourself briefly and offer to answer questions about {name}.";

const NO_CONTEXT: &str = "(no relevant context was found in the knowledge base)";

/// A chat message sent to the completion backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptMessage {
    /// `"user"` or `"assistant"`.
    pub role: String,
    pub content: String,
}

/// Fully assembled prompt.
#[derive(Debug, Clone, Serialize)]
pub struct Prompt {
    pub system: String,
    pub messages: Vec<PromptMessage>,
}

impl Prompt {
    /// Build a prompt from the persona, retrieved chunk texts, recent
    /// history (oldest first) and the new user message.
    pub fn assemble(
        persona: &str,
        context: &[String],
        history: &[Message],
        user_message: &str,
    ) -> Self {
        let mut system = String::with_capacity(persona.len() + 256);
        system.push_str(persona.trim_end());
        system.push_str("\n\nKnowledge base context:\n");
        if context.is_empty() {
            system.push_str(NO_CONTEXT);
        } else {
            for (i, text) in context.iter().enumerate() {
                if i > 0 {
                    system.push('\n');
                }
                system.push_str(&format!("[{}] {}", i + 1, text));
            }
        }

        let mut messages: Vec<PromptMessage> = history
            .iter()
            .map(|m| PromptMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect();
        messages.push(PromptMessage {
            role: Role::User.as_str().to_string(),
            content: user_message.to_string(),
        });

        Self { system, messages }
    }

    /// Flatten into one text block for backends that take a single string.
    pub fn render(&self) -> String {
        let mut out = self.system.clone();
        out.push_str("\n\n");
        for m in &self.messages {
            out.push_str(&format!("{}: {}\n", m.role, m.content));
        }
        out.push_str("assistant:");
        out
    }
}

/// Persona instructions for `name`, or `template` with `{name}` substituted.
pub fn persona(name: &str, template: Option<&str>) -> String {
    template.unwrap_or(DEFAULT_PERSONA).replace("{name}", name)
}
