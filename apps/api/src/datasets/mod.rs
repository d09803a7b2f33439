//! Synthetic Data Generator — two stages.
//!
//! Stage 1: the model turns business requirements into a JSON instruction
//! (entities, columns, row counts, output formats), streamed to the page.
//! Stage 2: the instruction is validated and generated locally. Keys and
//! simple values come from `rand`/`fake`, free text from a [`values::ValueSource`].

pub mod generator;
pub mod handlers;
pub mod instruction;
pub mod prompts;
pub mod values;
pub mod writer;

use prompts::{INSTRUCTION_PROMPT_TEMPLATE, INSTRUCTION_SYSTEM};

pub fn instruction_system_prompt() -> &'static str {
    INSTRUCTION_SYSTEM.trim()
}

pub fn instruction_user_prompt(requirements: &str) -> String {
    INSTRUCTION_PROMPT_TEMPLATE.replace("{requirements}", requirements.trim())
}
