//! Cell values — locally generated simple values and model-written free text.
//!
//! Simple columns (numbers, names, emails, products) are produced locally.
//! Anything left empty afterwards is written by a [`ValueSource`], the LLM by default.

use std::fmt;

use async_trait::async_trait;
use fake::faker::internet::en::SafeEmail;
use fake::faker::lorem::en::Word;
use fake::faker::name::en::Name;
use fake::Fake;
use rand::Rng;
use serde::Serialize;

use crate::datasets::instruction::ColumnSpec;
use crate::datasets::prompts::{cell_value_prompt, CELL_VALUE_SYSTEM};
use crate::errors::AppError;
use crate::llm_client::LlmClient;

const SIMPLE_TYPES: &[&str] = &["int", "integer", "float", "decimal", "string"];
const FREE_TEXT_NAMES: &[&str] = &["free_text", "description", "review", "comment"];

const DEFAULT_INT_RANGE: (i64, i64) = (1, 1000);
const DEFAULT_FLOAT_RANGE: (f64, f64) = (1.0, 1000.0);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Interprets model output according to the column type.
    pub fn from_generated(column: &ColumnSpec, raw: &str) -> Self {
        let text = raw.trim().trim_matches('"').trim();
        match column.data_type().as_str() {
            "int" | "integer" => text
                .parse::<i64>()
                .map(CellValue::Int)
                .unwrap_or_else(|_| CellValue::Text(text.to_string())),
            "float" | "decimal" => text
                .parse::<f64>()
                .map(|v| CellValue::Float(round2(v)))
                .unwrap_or_else(|_| CellValue::Text(text.to_string())),
            _ => CellValue::Text(text.to_string()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Int(v) => write!(f, "{v}"),
            CellValue::Float(v) => write!(f, "{v:.2}"),
            CellValue::Text(v) => f.write_str(v),
            CellValue::Null => Ok(()),
        }
    }
}

/// Writes the value of a single cell from a prompt.
///
/// Carried in `AppState` as `Arc<dyn ValueSource>`.
#[async_trait]
pub trait ValueSource: Send + Sync {
    async fn generate(&self, prompt: &str, system: &str) -> Result<String, AppError>;
}

/// Default source: one LLM call per cell.
pub struct LlmValueSource(pub LlmClient);

#[async_trait]
impl ValueSource for LlmValueSource {
    async fn generate(&self, prompt: &str, system: &str) -> Result<String, AppError> {
        Ok(self.0.complete(prompt, system).await?)
    }
}

/// Simple columns have a simple type and are not named like free text.
pub fn is_simple_column(column: &ColumnSpec) -> bool {
    let name = column.name.trim().to_lowercase();
    SIMPLE_TYPES.contains(&column.data_type().as_str()) && !FREE_TEXT_NAMES.contains(&name.as_str())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Key of row `row_idx` in a primary key column: the row index, typed like the column.
pub fn primary_key_value(column: &ColumnSpec, row_idx: usize) -> CellValue {
    match column.data_type().as_str() {
        "int" | "integer" => CellValue::Int(row_idx as i64),
        "float" | "decimal" => CellValue::Float(row_idx as f64),
        _ => CellValue::Text(row_idx.to_string()),
    }
}

/// Locally generated value for a non-foreign-key column; `Null` when the column
/// needs the value source instead.
pub fn simple_value<R: Rng + ?Sized>(
    column: &ColumnSpec,
    row_idx: usize,
    rng: &mut R,
) -> Result<CellValue, AppError> {
    if column.is_primary_key() {
        return Ok(primary_key_value(column, row_idx));
    }
    if !is_simple_column(column) {
        return Ok(CellValue::Null);
    }

    let bounds = column.bounds()?;
    let value = match column.data_type().as_str() {
        "int" | "integer" => {
            let (lo, hi) = bounds
                .map(|(lo, hi)| (lo.ceil() as i64, hi.ceil() as i64))
                .unwrap_or(DEFAULT_INT_RANGE);
            if lo >= hi {
                return Err(AppError::Validation(format!(
                    "Column '{}' has no integers in its constraints",
                    column.name
                )));
            }
            CellValue::Int(rng.gen_range(lo..hi))
        }
        "float" | "decimal" => {
            let (lo, hi) = bounds.unwrap_or(DEFAULT_FLOAT_RANGE);
            CellValue::Float(round2(rng.gen_range(lo..hi)))
        }
        _ => match column.name.trim().to_lowercase().as_str() {
            "name" => CellValue::Text(Name().fake_with_rng(rng)),
            "email" => CellValue::Text(SafeEmail().fake_with_rng(rng)),
            "product" => {
                let word: String = Word().fake_with_rng(rng);
                CellValue::Text(title_case(&word))
            }
            _ => CellValue::Null,
        },
    };
    Ok(value)
}

/// `name: value` lines for the filled, non-identifier columns of a row.
pub fn row_context(columns: &[ColumnSpec], row: &[CellValue]) -> String {
    columns
        .iter()
        .zip(row)
        .filter(|(column, value)| !value.is_null() && !column.name.to_lowercase().contains("id"))
        .map(|(column, value)| format!("{}: {value}\n", column.name))
        .collect()
}

pub fn cell_prompt(entity: &str, column: &ColumnSpec, context: &str) -> String {
    cell_value_prompt(entity, &column.name, &column.data_type, context)
}

/// Asks the value source for one cell.
pub async fn generated_value(
    source: &dyn ValueSource,
    entity: &str,
    column: &ColumnSpec,
    columns: &[ColumnSpec],
    row: &[CellValue],
) -> Result<CellValue, AppError> {
    let prompt = cell_prompt(entity, column, &row_context(columns, row));
    let raw = source.generate(&prompt, CELL_VALUE_SYSTEM).await?;
    Ok(CellValue::from_generated(column, &raw))
}
