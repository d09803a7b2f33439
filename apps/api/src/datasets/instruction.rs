//! Dataset instruction — the JSON plan the model produces in stage 1.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::errors::AppError;
use crate::llm_client::strip_json_fences;

/// Upper bound on rows generated for one entity.
pub const MAX_ROWS_PER_ENTITY: usize = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetInstruction {
    pub entities: Vec<EntitySpec>,
    #[serde(default)]
    pub formats: BTreeMap<String, String>,
    #[serde(default = "default_dataset_type")]
    pub dataset_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySpec {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub references: Option<String>,
    /// `[min, max)` for numeric columns.
    #[serde(default)]
    pub constraints: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

fn default_dataset_type() -> String {
    "tabular".to_string()
}

impl ColumnSpec {
    fn has_role(&self, role: &str) -> bool {
        self.role
            .as_deref()
            .is_some_and(|r| r.trim().eq_ignore_ascii_case(role))
    }

    pub fn is_primary_key(&self) -> bool {
        self.has_role("primary_key")
    }

    pub fn is_foreign_key(&self) -> bool {
        self.has_role("foreign_key")
    }

    pub fn data_type(&self) -> String {
        self.data_type.trim().to_lowercase()
    }

    /// Splits `references` into `(entity, column)`.
    pub fn reference(&self) -> Result<(&str, &str), AppError> {
        let raw = self.references.as_deref().unwrap_or_default().trim();
        match raw.split_once('.') {
            Some((entity, column)) if !entity.is_empty() && !column.is_empty() => {
                Ok((entity, column))
            }
            _ => Err(AppError::Validation(format!(
                "Foreign key '{}' must reference 'entity.column', got '{raw}'",
                self.name
            ))),
        }
    }

    /// Validated numeric bounds, if any.
    pub fn bounds(&self) -> Result<Option<(f64, f64)>, AppError> {
        match self.constraints.as_deref() {
            None => Ok(None),
            Some([lo, hi]) if lo < hi && (hi - lo).is_finite() => Ok(Some((*lo, *hi))),
            Some(other) => Err(AppError::Validation(format!(
                "Column '{}' constraints must be finite [min, max] with min < max, got {other:?}",
                self.name
            ))),
        }
    }
}

impl EntitySpec {
    pub fn has_foreign_keys(&self) -> bool {
        self.columns.iter().any(ColumnSpec::is_foreign_key)
    }
}

impl DatasetInstruction {
    /// Output format for an entity; csv unless the instruction asks for json.
    pub fn format_for(&self, entity: &str) -> OutputFormat {
        match self
            .formats
            .get(entity)
            .map(|f| f.trim().to_lowercase())
            .as_deref()
        {
            Some("json") => OutputFormat::Json,
            Some("csv") | None => OutputFormat::Csv,
            Some(other) => {
                warn!("Unsupported format '{other}' for {entity}, writing csv");
                OutputFormat::Csv
            }
        }
    }

    /// Structural checks that do not depend on generation order.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.entities.is_empty() {
            return Err(AppError::Validation(
                "Instruction contains no entities".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for entity in &self.entities {
            if entity.name.trim().is_empty() {
                return Err(AppError::Validation("Entity name cannot be empty".to_string()));
            }
            if !names.insert(entity.name.as_str()) {
                return Err(AppError::Validation(format!(
                    "Duplicate entity '{}'",
                    entity.name
                )));
            }
            if entity.count > MAX_ROWS_PER_ENTITY {
                return Err(AppError::Validation(format!(
                    "Entity '{}' asks for {} rows, the limit is {MAX_ROWS_PER_ENTITY}",
                    entity.name, entity.count
                )));
            }
            if entity.columns.is_empty() {
                return Err(AppError::Validation(format!(
                    "Entity '{}' has no columns",
                    entity.name
                )));
            }
            for column in &entity.columns {
                column.bounds()?;
                if column.is_foreign_key() {
                    column.reference()?;
                }
            }
        }

        if !self.dataset_type.eq_ignore_ascii_case("tabular") {
            warn!(
                "dataset_type '{}' requested; generating tabular data",
                self.dataset_type
            );
        }
        Ok(())
    }
}

/// Accepts either a JSON object or the raw model text (code fences tolerated).
pub fn parse_instruction(raw: &Value) -> Result<DatasetInstruction, AppError> {
    let instruction: DatasetInstruction = match raw {
        Value::String(text) => serde_json::from_str(strip_json_fences(text)),
        other => serde_json::from_value(other.clone()),
    }
    .map_err(|e| AppError::Validation(format!("Invalid dataset instruction: {e}")))?;

    instruction.validate()?;
    Ok(instruction)
}
