use atomicwrites::{AtomicFile, OverwriteBehavior};
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use vismatch_core::{CatalogItem, CatalogRecord, Embedding, Error, Result, Vector, EMBEDDING_FIELD};
use vismatch_embed::{EmbeddingProvider, ImageRef, ProviderError};

use crate::loader::read_records;

/// Result of embedding one catalog item.
#[derive(Debug)]
pub struct BuildOutcome {
    pub item: CatalogItem,
    pub embedding: std::result::Result<Vector, ProviderError>,
    /// The vector came from the input file rather than the provider.
    pub reused: bool,
}

impl BuildOutcome {
    pub fn to_record(&self) -> CatalogRecord {
        let embedding = match &self.embedding {
            Ok(v) => Embedding::Vector(v.clone()),
            Err(_) => Embedding::Missing,
        };
        CatalogRecord::new(self.item.clone(), embedding)
    }
}

/// Summary of a precompute run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Records written, equal to the number of input records.
    pub total: usize,
    pub embedded: usize,
    pub reused: usize,
    pub failed: usize,
    /// Records that are not complete items, written back as-is with a `null` embedding.
    pub skipped: usize,
    pub output: PathBuf,
}

/// Offline precompute: embeds every catalog image and writes the augmented file.
///
/// A failing item never aborts the batch. It is written with a `null`
/// embedding and the cause is logged, so a later run can fill it in. The output
/// always holds every input record, in input order.
pub struct CatalogBuilder<P> {
    provider: P,
    reuse_existing: bool,
}

impl<P: EmbeddingProvider> CatalogBuilder<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            reuse_existing: false,
        }
    }

    /// Keep embeddings already present in the input instead of recomputing them.
    #[must_use]
    pub fn reuse_existing(mut self, reuse: bool) -> Self {
        self.reuse_existing = reuse;
        self
    }

    /// Embed each record in order. One outcome per input record.
    pub async fn build(&self, records: Vec<CatalogRecord>) -> Vec<BuildOutcome> {
        let total = records.len();
        let mut outcomes = Vec::with_capacity(total);

        for (index, record) in records.into_iter().enumerate() {
            if let (true, Embedding::Vector(existing)) = (self.reuse_existing, &record.embedding) {
                outcomes.push(BuildOutcome {
                    embedding: Ok(existing.clone()),
                    item: record.item,
                    reused: true,
                });
                continue;
            }

            info!("[{}/{}] Computing embedding for: {}", index + 1, total, record.item.name);
            let embedding = self
                .provider
                .embed(ImageRef::Url(record.item.image_url.clone()))
                .await;

            if let Err(e) = &embedding {
                warn!(item = %record.item.id, name = %record.item.name, error = %e, "Failed to embed item");
            }

            outcomes.push(BuildOutcome {
                item: record.item,
                embedding,
                reused: false,
            });
        }

        outcomes
    }

    /// Read `input`, embed it and write the augmented catalog to `output`.
    pub async fn run(&self, input: &Path, output: &Path) -> Result<BuildReport> {
        if !input.is_file() {
            return Err(Error::Catalog(format!("{} not found", input.display())));
        }

        let values = read_records(input)?;
        let mut slots = Vec::with_capacity(values.len());
        let mut records = Vec::with_capacity(values.len());
        for (index, value) in values.into_iter().enumerate() {
            match CatalogRecord::parse(value.clone(), self.reuse_existing) {
                Ok(parsed) => {
                    slots.push(None);
                    records.push(parsed.record);
                }
                Err(e) => {
                    warn!(record = index, error = %e, "Record is not a complete item, writing it back without an embedding");
                    slots.push(Some(without_embedding(value)));
                }
            }
        }

        info!(
            provider = self.provider.name(),
            items = records.len(),
            "Processing catalog"
        );
        let outcomes = self.build(records).await;

        let mut built = outcomes.iter();
        let mut output_records = Vec::with_capacity(slots.len());
        for slot in slots {
            let value = match slot {
                Some(verbatim) => verbatim,
                None => match built.next() {
                    Some(outcome) => serde_json::to_value(outcome.to_record())?,
                    None => continue,
                },
            };
            output_records.push(value);
        }
        write_json(output, &output_records)?;

        let report = BuildReport {
            total: output_records.len(),
            embedded: outcomes.iter().filter(|o| o.embedding.is_ok() && !o.reused).count(),
            reused: outcomes.iter().filter(|o| o.reused).count(),
            failed: outcomes.iter().filter(|o| o.embedding.is_err()).count(),
            skipped: output_records.len() - outcomes.len(),
            output: output.to_path_buf(),
        };
        info!(
            total = report.total,
            embedded = report.embedded,
            reused = report.reused,
            failed = report.failed,
            output = %output.display(),
            "Precomputation complete"
        );
        Ok(report)
    }
}

/// Write outcomes as a pretty-printed augmented catalog, replacing `path` atomically.
pub fn write_augmented(path: &Path, outcomes: &[BuildOutcome]) -> Result<()> {
    let records: Vec<CatalogRecord> = outcomes.iter().map(BuildOutcome::to_record).collect();
    write_json(path, &records)
}

/// An object record gets `"embedding": null`; anything else is kept untouched.
fn without_embedding(value: Value) -> Value {
    match value {
        Value::Object(mut map) => {
            map.insert(EMBEDDING_FIELD.to_string(), Value::Null);
            Value::Object(map)
        }
        other => other,
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, records: &T) -> Result<()> {
    let data = serde_json::to_vec_pretty(records)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|f| f.write_all(&data))
        .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
    Ok(())
}
