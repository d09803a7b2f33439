//! Dataset generation — turns a validated instruction into rows.
//!
//! Entities without foreign keys go first. Dependents follow in repeated passes,
//! so chains like `orders -> order_items -> returns` resolve regardless of the
//! order the model listed them in.

use std::collections::{HashMap, HashSet};

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

use crate::datasets::instruction::{DatasetInstruction, EntitySpec, OutputFormat};
use crate::datasets::values::{generated_value, simple_value, CellValue, ValueSource};
use crate::errors::AppError;

/// One generated table.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub name: String,
    pub format: OutputFormat,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Dataset {
    /// Values of one column, used as the key pool for foreign keys.
    fn column_values(&self, column: &str) -> Option<Vec<CellValue>> {
        let idx = self.columns.iter().position(|c| c == column)?;
        Some(self.rows.iter().map(|row| row[idx].clone()).collect())
    }
}

/// Order in which entities can be generated: every entity comes after the
/// entities its foreign keys reference.
pub fn generation_order(instruction: &DatasetInstruction) -> Result<Vec<usize>, AppError> {
    let names: HashSet<&str> = instruction.entities.iter().map(|e| e.name.as_str()).collect();

    // Roots first.
    let mut order: Vec<usize> = Vec::with_capacity(instruction.entities.len());
    let mut done: HashSet<&str> = HashSet::new();
    for (idx, entity) in instruction.entities.iter().enumerate() {
        if !entity.has_foreign_keys() {
            order.push(idx);
            done.insert(entity.name.as_str());
        }
    }

    let mut pending: Vec<usize> = (0..instruction.entities.len())
        .filter(|idx| !order.contains(idx))
        .collect();

    while !pending.is_empty() {
        let mut progressed = false;
        let mut still_pending = Vec::new();

        for idx in pending {
            let entity = &instruction.entities[idx];
            let mut ready = true;
            for column in entity.columns.iter().filter(|c| c.is_foreign_key()) {
                let (target, _) = column.reference()?;
                if !names.contains(target) {
                    return Err(AppError::Validation(format!(
                        "Entity '{}' references unknown entity '{target}'",
                        entity.name
                    )));
                }
                if !done.contains(target) {
                    ready = false;
                }
            }

            if ready {
                order.push(idx);
                done.insert(entity.name.as_str());
                progressed = true;
            } else {
                still_pending.push(idx);
            }
        }

        if !progressed {
            let stuck: Vec<&str> = still_pending
                .iter()
                .map(|idx| instruction.entities[*idx].name.as_str())
                .collect();
            return Err(AppError::Validation(format!(
                "Unresolvable foreign key references in: {}",
                stuck.join(", ")
            )));
        }
        pending = still_pending;
    }

    Ok(order)
}

/// Generates every entity of the instruction.
///
/// Local values come from `rng`; cells still empty afterwards are written by `source`.
pub async fn generate_datasets<R: Rng + Send>(
    instruction: &DatasetInstruction,
    rng: &mut R,
    source: &dyn ValueSource,
) -> Result<Vec<Dataset>, AppError> {
    let order = generation_order(instruction)?;
    let mut generated: Vec<Dataset> = Vec::with_capacity(order.len());
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for idx in order {
        let entity = &instruction.entities[idx];
        let pools = key_pools(entity, &generated, &by_name)?;

        let mut rows = Vec::with_capacity(entity.count);
        for row_idx in 0..entity.count {
            let mut row = Vec::with_capacity(entity.columns.len());
            for column in &entity.columns {
                let value = match pools.get(column.name.as_str()) {
                    Some(pool) => pool.choose(rng).cloned().unwrap_or(CellValue::Null),
                    None => simple_value(column, row_idx, rng)?,
                };
                row.push(value);
            }
            rows.push(row);
        }

        let filled = fill_missing(entity, &mut rows, source).await?;
        info!(
            "Generated {} rows for {} ({filled} cells written by the model)",
            rows.len(),
            entity.name
        );

        by_name.insert(entity.name.clone(), generated.len());
        generated.push(Dataset {
            name: entity.name.clone(),
            format: instruction.format_for(&entity.name),
            columns: entity.columns.iter().map(|c| c.name.clone()).collect(),
            rows,
        });
    }

    Ok(generated)
}

/// Referenced values for each foreign key column of `entity`.
fn key_pools<'a>(
    entity: &'a EntitySpec,
    generated: &[Dataset],
    by_name: &HashMap<String, usize>,
) -> Result<HashMap<&'a str, Vec<CellValue>>, AppError> {
    let mut pools = HashMap::new();
    for column in entity.columns.iter().filter(|c| c.is_foreign_key()) {
        let (target, target_column) = column.reference()?;
        let dataset = by_name
            .get(target)
            .map(|idx| &generated[*idx])
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "Entity '{}' references '{target}' before it exists",
                    entity.name
                ))
            })?;
        let pool = dataset.column_values(target_column).ok_or_else(|| {
            AppError::Validation(format!(
                "Column '{}.{}' references unknown column '{target}.{target_column}'",
                entity.name, column.name
            ))
        })?;
        if pool.is_empty() && entity.count > 0 {
            return Err(AppError::Validation(format!(
                "Column '{}.{}' references '{target}', which has no rows",
                entity.name, column.name
            )));
        }
        pools.insert(column.name.as_str(), pool);
    }
    Ok(pools)
}

/// Asks the value source for every empty cell outside the key columns. Returns how many were filled.
async fn fill_missing(
    entity: &EntitySpec,
    rows: &mut [Vec<CellValue>],
    source: &dyn ValueSource,
) -> Result<usize, AppError> {
    let mut filled = 0;
    for row in rows.iter_mut() {
        for (col_idx, column) in entity.columns.iter().enumerate() {
            if column.is_primary_key() || column.is_foreign_key() || !row[col_idx].is_null() {
                continue;
            }
            let value = generated_value(source, &entity.name, column, &entity.columns, row).await?;
            row[col_idx] = value;
            filled += 1;
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::instruction::parse_instruction;
    use crate::datasets::instruction::tests::shop_instruction;
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records prompts and answers with a fixed value.
    struct StubSource {
        answer: String,
        prompts: Mutex<Vec<String>>,
    }

    impl StubSource {
        fn new(answer: &str) -> Self {
            Self {
                answer: answer.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ValueSource for StubSource {
        async fn generate(&self, prompt: &str, _system: &str) -> Result<String, AppError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.answer.clone())
        }
    }

    fn names(instruction: &DatasetInstruction, order: &[usize]) -> Vec<String> {
        order
            .iter()
            .map(|idx| instruction.entities[*idx].name.clone())
            .collect()
    }

    #[test]
    fn test_roots_come_before_dependents() {
        let mut value = shop_instruction();
        value["entities"].as_array_mut().unwrap().reverse();
        let instruction = parse_instruction(&value).unwrap();
        let order = generation_order(&instruction).unwrap();
        assert_eq!(names(&instruction, &order), vec!["customers", "orders"]);
    }

    #[test]
    fn test_dependency_chains_resolve_over_several_passes() {
        let value = json!({
            "entities": [
                {"name": "refunds", "count": 2, "columns": [
                    {"name": "refund_id", "type": "int", "role": "primary_key"},
                    {"name": "item_id", "type": "int", "role": "foreign_key", "references": "items.item_id"}
                ]},
                {"name": "items", "count": 3, "columns": [
                    {"name": "item_id", "type": "int", "role": "primary_key"},
                    {"name": "order_id", "type": "int", "role": "foreign_key", "references": "orders.order_id"}
                ]},
                {"name": "orders", "count": 4, "columns": [
                    {"name": "order_id", "type": "int", "role": "primary_key"}
                ]}
            ]
        });
        let instruction = parse_instruction(&value).unwrap();
        let order = generation_order(&instruction).unwrap();
        assert_eq!(names(&instruction, &order), vec!["orders", "items", "refunds"]);
    }

    #[test]
    fn test_cyclic_references_are_rejected() {
        let value = json!({
            "entities": [
                {"name": "a", "count": 1, "columns": [
                    {"name": "b_id", "type": "int", "role": "foreign_key", "references": "b.id"}
                ]},
                {"name": "b", "count": 1, "columns": [
                    {"name": "a_id", "type": "int", "role": "foreign_key", "references": "a.id"}
                ]}
            ]
        });
        let instruction = parse_instruction(&value).unwrap();
        let err = generation_order(&instruction).unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.contains("a, b")));
    }

    #[test]
    fn test_unknown_referenced_entity_is_rejected() {
        let mut value = shop_instruction();
        value["entities"][1]["columns"][1]["references"] = json!("clients.customer_id");
        let instruction = parse_instruction(&value).unwrap();
        assert!(matches!(
            generation_order(&instruction),
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_shop_instruction_generates_valid_rows() {
        let instruction = parse_instruction(&shop_instruction()).unwrap();
        let source = StubSource::new("unused");
        let mut rng = StdRng::seed_from_u64(42);

        let datasets = generate_datasets(&instruction, &mut rng, &source).await.unwrap();
        assert_eq!(datasets.len(), 2);
        // name and email are generated locally.
        assert_eq!(source.calls(), 0);

        let customers = &datasets[0];
        assert_eq!(customers.rows.len(), 5);
        assert_eq!(customers.format, OutputFormat::Csv);
        for (i, row) in customers.rows.iter().enumerate() {
            assert_eq!(row[0], CellValue::Int(i as i64));
            assert!(row[2].to_string().contains('@'));
        }

        let orders = &datasets[1];
        assert_eq!(orders.rows.len(), 10);
        assert_eq!(orders.format, OutputFormat::Json);
        for row in &orders.rows {
            match (&row[1], &row[2]) {
                (CellValue::Int(customer), CellValue::Float(amount)) => {
                    assert!((0..5).contains(customer));
                    assert!((5.0..=50.0).contains(amount));
                }
                other => panic!("unexpected row {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_free_text_cells_are_written_by_source_with_row_context() {
        let mut value = shop_instruction();
        value["entities"][1]["columns"]
            .as_array_mut()
            .unwrap()
            .push(json!({"name": "review", "type": "string"}));
        let instruction = parse_instruction(&value).unwrap();
        let source = StubSource::new("\"Arrived quickly.\"");
        let mut rng = StdRng::seed_from_u64(1);

        let datasets = generate_datasets(&instruction, &mut rng, &source).await.unwrap();
        assert_eq!(source.calls(), 10);

        let orders = &datasets[1];
        assert!(orders
            .rows
            .iter()
            .all(|row| row[3] == CellValue::Text("Arrived quickly.".to_string())));

        let prompts = source.prompts.lock().unwrap();
        assert!(prompts[0].contains("Entity: orders"));
        assert!(prompts[0].contains("amount: "));
        assert!(!prompts[0].contains("customer_id"));
    }

    #[tokio::test]
    async fn test_string_primary_keys_are_unique_and_feed_foreign_keys() {
        let value = json!({
            "entities": [
                {"name": "customers", "count": 3, "columns": [
                    {"name": "code", "type": "string", "role": "primary_key"},
                    {"name": "name", "type": "string"}
                ]},
                {"name": "orders", "count": 20, "columns": [
                    {"name": "order_id", "type": "int", "role": "primary_key"},
                    {"name": "customer_code", "type": "string", "role": "foreign_key", "references": "customers.code"}
                ]}
            ]
        });
        let instruction = parse_instruction(&value).unwrap();
        let source = StubSource::new("DUP");
        let mut rng = StdRng::seed_from_u64(9);

        let datasets = generate_datasets(&instruction, &mut rng, &source).await.unwrap();
        assert_eq!(source.calls(), 0);

        let codes: Vec<CellValue> = datasets[0].rows.iter().map(|row| row[0].clone()).collect();
        assert_eq!(
            codes,
            vec![
                CellValue::Text("0".to_string()),
                CellValue::Text("1".to_string()),
                CellValue::Text("2".to_string()),
            ]
        );
        for row in &datasets[1].rows {
            assert!(codes.contains(&row[1]), "unexpected key {:?}", row[1]);
        }
    }

    #[tokio::test]
    async fn test_zero_count_entity_yields_no_rows() {
        let mut value = shop_instruction();
        value["entities"][1]["count"] = json!(0);
        let instruction = parse_instruction(&value).unwrap();
        let source = StubSource::new("x");
        let mut rng = StdRng::seed_from_u64(5);

        let datasets = generate_datasets(&instruction, &mut rng, &source).await.unwrap();
        assert!(datasets[1].rows.is_empty());
        assert_eq!(datasets[1].columns, vec!["order_id", "customer_id", "amount"]);
    }

    #[tokio::test]
    async fn test_reference_to_empty_entity_is_rejected() {
        let mut value = shop_instruction();
        value["entities"][0]["count"] = json!(0);
        let instruction = parse_instruction(&value).unwrap();
        let source = StubSource::new("x");
        let mut rng = StdRng::seed_from_u64(5);

        let result = generate_datasets(&instruction, &mut rng, &source).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
