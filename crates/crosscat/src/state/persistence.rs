//! Persistence for learned ensembles - save/load JSON snapshots.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CrossCatError, Result};
use crate::query::Ensemble;
use crate::schema::TableSchema;

use super::chain::Chain;

/// On-disk form of a trained ensemble: the column schema plus every chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub schema: TableSchema,
    pub chains: Vec<Chain>,
    /// When the snapshot was taken.
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(schema: TableSchema, chains: Vec<Chain>) -> Self {
        Self {
            schema,
            chains,
            created_at: Utc::now(),
        }
    }

    /// Check every chain against the schema.
    pub fn validate(&self) -> Result<()> {
        for (index, chain) in self.chains.iter().enumerate() {
            chain.validate(&self.schema).map_err(|e| {
                CrossCatError::InvalidState(format!("chain {}: {}", index, e))
            })?;
        }
        Ok(())
    }

    /// Query engine over every chain of the snapshot.
    pub fn ensemble(&self) -> Result<Ensemble<'_>> {
        Ensemble::new(&self.schema, &self.chains)
    }

    /// Save the snapshot to a JSON file.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use crosscat::Snapshot;
    /// # fn example(snapshot: &Snapshot) -> crosscat::Result<()> {
    /// snapshot.save("models/census.crosscat.json")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    CrossCatError::Persistence(format!(
                        "Failed to create directory '{}': {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let file = File::create(path).map_err(|e| {
            CrossCatError::Persistence(format!(
                "Failed to create file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self).map_err(|e| {
            CrossCatError::Persistence(format!(
                "Failed to serialize snapshot '{}': {}",
                path.display(),
                e
            ))
        })?;

        Ok(())
    }

    /// Load a snapshot from a JSON file and validate every chain.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use crosscat::Snapshot;
    /// let snapshot = Snapshot::load("models/census.crosscat.json").unwrap();
    /// println!("Chains: {}", snapshot.chains.len());
    /// ```
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let file = File::open(path).map_err(|e| {
            CrossCatError::Persistence(format!(
                "Failed to open file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let reader = BufReader::new(file);
        let snapshot: Snapshot = serde_json::from_reader(reader).map_err(|e| {
            CrossCatError::Persistence(format!(
                "Failed to parse snapshot '{}': {}",
                path.display(),
                e
            ))
        })?;

        snapshot.validate()?;
        Ok(snapshot)
    }
}
