//! Writes generated datasets to disk and builds the markdown preview.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::{Map, Value};

use crate::datasets::generator::Dataset;
use crate::datasets::instruction::OutputFormat;
use crate::datasets::values::CellValue;
use crate::errors::AppError;
use crate::markdown::markdown_table;

/// Rows shown per file in the summary.
const PREVIEW_ROWS: usize = 3;

/// File stem safe for any filesystem; the entity name comes from the model.
fn file_stem(name: &str) -> String {
    let stem: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "dataset".to_string()
    } else {
        stem
    }
}

/// `<stem>.<ext>`, or `<stem>_2.<ext>`, `<stem>_3.<ext>`... when an earlier
/// dataset already took the name. Compared case-insensitively.
fn unique_file_name(stem: &str, extension: &str, taken: &mut HashSet<String>) -> String {
    let mut name = format!("{stem}.{extension}");
    let mut n = 2;
    while !taken.insert(name.to_lowercase()) {
        name = format!("{stem}_{n}.{extension}");
        n += 1;
    }
    name
}

/// Writes every dataset as `<dir>/<name>.<csv|json>` and returns the paths in order.
pub fn write_datasets(dir: &Path, datasets: &[Dataset]) -> Result<Vec<PathBuf>, AppError> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;

    let mut paths = Vec::with_capacity(datasets.len());
    let mut taken: HashSet<String> = HashSet::new();
    for dataset in datasets {
        let path = dir.join(unique_file_name(
            &file_stem(&dataset.name),
            dataset.format.extension(),
            &mut taken,
        ));
        match dataset.format {
            OutputFormat::Csv => write_csv(&path, dataset),
            OutputFormat::Json => write_json(&path, dataset),
        }
        .with_context(|| format!("write {}", path.display()))?;
        paths.push(path);
    }
    Ok(paths)
}

fn write_csv(path: &Path, dataset: &Dataset) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&dataset.columns)?;
    for row in &dataset.rows {
        writer.write_record(row.iter().map(CellValue::to_string))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_json(path: &Path, dataset: &Dataset) -> anyhow::Result<()> {
    let records: Vec<Map<String, Value>> = dataset
        .rows
        .iter()
        .map(|row| {
            dataset
                .columns
                .iter()
                .zip(row)
                .map(|(column, value)| Ok((column.clone(), serde_json::to_value(value)?)))
                .collect::<Result<Map<_, _>, serde_json::Error>>()
        })
        .collect::<Result<_, _>>()?;

    let file = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(file, &records)?;
    Ok(())
}

/// "`n` files are saved at [...]" followed by a three-row preview per file.
pub fn summary_markdown(datasets: &[Dataset], paths: &[PathBuf]) -> String {
    let listed: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    let mut out = format!(
        "{} files are saved at [{}] \n",
        paths.len(),
        listed.join(", ")
    );

    for (dataset, path) in datasets.iter().zip(&listed) {
        let preview: Vec<Vec<String>> = dataset
            .rows
            .iter()
            .take(PREVIEW_ROWS)
            .map(|row| row.iter().map(CellValue::to_string).collect())
            .collect();
        out.push_str(&format!(
            "### {path}\n{}\n",
            markdown_table(&dataset.columns, &preview)
        ));
    }
    out
}
