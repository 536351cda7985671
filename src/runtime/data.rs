//! Data module for text classification
//!
//! Reads tab-separated files with a header row, selects the text and label
//! columns by name, and serves fixed-size batches. The data module can be
//! constructed partially: the configuration knows everything except the
//! model's transformation, which the owning task supplies at build time.

use std::path::{Path, PathBuf};

use super::model::Transformation;
use crate::{Error, Result};

/// One batch of raw texts with binary labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub texts: Vec<String>,
    pub labels: Vec<f32>,
}

/// Fully constructed data module.
#[derive(Debug, Clone)]
pub struct TextClassificationDataModule {
    pub train_df_path: PathBuf,
    pub valid_df_path: PathBuf,
    pub test_df_path: PathBuf,
    pub batch_size: usize,
    pub text_column_name: String,
    pub label_column_name: String,
    pub drop_last: bool,
    pub transformation: Transformation,
}

impl TextClassificationDataModule {
    pub fn train_batches(&self) -> Result<Vec<Batch>> {
        self.batches(&self.train_df_path)
    }

    pub fn valid_batches(&self) -> Result<Vec<Batch>> {
        self.batches(&self.valid_df_path)
    }

    pub fn test_batches(&self) -> Result<Vec<Batch>> {
        self.batches(&self.test_df_path)
    }

    fn batches(&self, path: &Path) -> Result<Vec<Batch>> {
        let rows = self.read_rows(path)?;
        let mut batches = Vec::new();
        for chunk in rows.chunks(self.batch_size) {
            if self.drop_last && chunk.len() < self.batch_size {
                break;
            }
            batches.push(Batch {
                texts: chunk.iter().map(|(t, _)| t.clone()).collect(),
                labels: chunk.iter().map(|(_, l)| *l).collect(),
            });
        }
        Ok(batches)
    }

    fn read_rows(&self, path: &Path) -> Result<Vec<(String, f32)>> {
        let content = std::fs::read_to_string(path)?;
        let mut lines = content.lines();
        let header = lines
            .next()
            .ok_or_else(|| Error::Serialization(format!("{}: empty data file", path.display())))?;
        let columns: Vec<&str> = header.split('\t').collect();
        let text_idx = column_index(&columns, &self.text_column_name, path)?;
        let label_idx = column_index(&columns, &self.label_column_name, path)?;

        let mut rows = Vec::new();
        for (line_no, line) in lines.enumerate() {
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let text = fields.get(text_idx).ok_or_else(|| {
                Error::Serialization(format!(
                    "{}:{}: missing column '{}'",
                    path.display(),
                    line_no + 2,
                    self.text_column_name
                ))
            })?;
            let label: f32 = fields
                .get(label_idx)
                .and_then(|f| f.parse().ok())
                .ok_or_else(|| {
                    Error::Serialization(format!(
                        "{}:{}: invalid label in column '{}'",
                        path.display(),
                        line_no + 2,
                        self.label_column_name
                    ))
                })?;
            rows.push((text.to_string(), label));
        }
        Ok(rows)
    }
}

fn column_index(columns: &[&str], name: &str, path: &Path) -> Result<usize> {
    columns.iter().position(|c| *c == name).ok_or_else(|| {
        Error::Serialization(format!(
            "{}: column '{}' not found in header",
            path.display(),
            name
        ))
    })
}

/// Data module configuration awaiting the model transformation.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialDataModule {
    pub train_df_path: PathBuf,
    pub valid_df_path: PathBuf,
    pub test_df_path: PathBuf,
    pub batch_size: usize,
    pub text_column_name: String,
    pub label_column_name: String,
    pub drop_last: bool,
}

impl PartialDataModule {
    pub fn build(self, transformation: Transformation) -> TextClassificationDataModule {
        TextClassificationDataModule {
            train_df_path: self.train_df_path,
            valid_df_path: self.valid_df_path,
            test_df_path: self.test_df_path,
            batch_size: self.batch_size,
            text_column_name: self.text_column_name,
            label_column_name: self.label_column_name,
            drop_last: self.drop_last,
            transformation,
        }
    }
}
