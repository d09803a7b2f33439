// Shared message types and prompt-building utilities.
// Each application defines its own prompts.rs alongside it.
// This file contains the cross-cutting pieces.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Builds the system/user message pair every application sends.
pub fn create_message(system_prompt: &str, user_prompt: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage {
            role: Role::System,
            content: system_prompt.to_string(),
        },
        ChatMessage {
            role: Role::User,
            content: user_prompt.to_string(),
        },
    ]
}

/// Collapses every run of tabs, or of two or more spaces, into a single space.
/// Newlines survive so numbered lists stay on their own lines.
pub fn collapse_indentation(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run = String::new();
    for ch in text.chars() {
        if ch == ' ' || ch == '\t' {
            run.push(ch);
            continue;
        }
        flush_run(&mut out, &mut run, false);
        out.push(ch);
    }
    flush_run(&mut out, &mut run, false);
    out
}

/// Collapses every run of spaces and tabs (including a single tab) into one space.
pub fn collapse_blanks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run = String::new();
    for ch in text.chars() {
        if ch == ' ' || ch == '\t' {
            run.push(ch);
            continue;
        }
        flush_run(&mut out, &mut run, true);
        out.push(ch);
    }
    flush_run(&mut out, &mut run, true);
    out
}

/// Collapses every whitespace run that is two characters or longer, newlines
/// included, into one space. Used for prompts written as indented literals.
pub fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run = String::new();
    for ch in text.chars() {
        if ch.is_whitespace() {
            run.push(ch);
            continue;
        }
        if run.chars().count() >= 2 {
            out.push(' ');
        } else {
            out.push_str(&run);
        }
        run.clear();
        out.push(ch);
    }
    if run.chars().count() >= 2 {
        out.push(' ');
    } else {
        out.push_str(&run);
    }
    out
}

fn flush_run(out: &mut String, run: &mut String, always: bool) {
    if run.is_empty() {
        return;
    }
    let collapse = always || run.contains('\t') || run.len() >= 2;
    if collapse {
        out.push(' ');
    } else {
        out.push_str(run);
    }
    run.clear();
}
