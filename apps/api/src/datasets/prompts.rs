// All LLM prompt constants for the synthetic dataset generator.

/// System prompt for stage 1: turn business requirements into a generation instruction.
pub const INSTRUCTION_SYSTEM: &str = r#"
You are a data analyst assistant. You are given a business problem and dataset requirements, then you have to analyze and output a structured JSON instruction for synthetic dataset generation.

Follow this schema:
{
  "entities": [
    {
      "name": "<entity_name>",
      "columns": [
        {"name": "<column_name>", "type": "<data_type>", "role": "<primary_key/foreign_key/attribute>", "references": "<optional: entity.column>", "constraints": <optional: [min, max] numbers for numeric columns, or null>}
      ],
      "count": <number_of_rows>
    }
  ],
  "formats": {
    "<entity_name>": "<csv/json>"
  },
  "dataset_type": "<tabular/plain_text>"
}

Output only the JSON.
"#;

/// Stage 1 user prompt. Replace `{requirements}` before sending.
pub const INSTRUCTION_PROMPT_TEMPLATE: &str = r#"
Business problem and requirements:
{requirements}
"#;

/// System prompt for filling a single free-text cell.
pub const CELL_VALUE_SYSTEM: &str = "You are generating synthetic data for a tabular dataset.";

/// Per-cell prompt for one field of one row.
pub fn cell_value_prompt(entity: &str, field: &str, field_type: &str, context: &str) -> String {
    format!(
        r#"Entity: {entity}
Field to generate: {field}, type: {field_type}

Context:
{context}
Instructions:
- Generate a realistic and contextually appropriate value for the field "{field}".
- Make sure the value matches the expected type and style for this field.
- Do not repeat the context or field name in the output.
- Only output the value, nothing else.
Now, generate the value."#
    )
}
