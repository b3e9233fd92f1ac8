//! The persisted vector index, stored as LanceDB tables.
//!
//! ## On-disk layout
//!
//! The configured index directory is a LanceDB database holding two tables:
//!
//! | Table      | Rows            | Columns                                              |
//! |------------|-----------------|------------------------------------------------------|
//! | `chunks`   | one per chunk   | `position`, `text`, `vector` (fixed-size `f32` list) |
//! | `manifest` | exactly one     | format version, [`IndexKey`] fields, dimension, count |
//!
//! Saving drops the manifest first, replaces the chunks table and writes the
//! manifest last. A save that dies halfway therefore reads as a missing index
//! rather than a mix of old and new chunks. There is no locking between
//! processes.
//!
//! ## Search
//!
//! Nearest neighbours come from LanceDB's vector query with its default L2
//! metric, so `distance` is the squared Euclidean distance reported by the
//! store. Results are re-sorted by `(distance, position)` so ties keep
//! insertion order.

use crate::cache::Fingerprint;
use crate::error::PdfChatError;
use crate::output::RetrievedChunk;
use arrow_array::types::Float32Type;
use arrow_array::{
    Array, ArrayRef, FixedSizeListArray, Float32Array, Int64Array, RecordBatch,
    RecordBatchIterator, StringArray, UInt32Array,
};
use arrow_schema::{DataType, Field, Schema};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, Table};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Table holding one row per chunk.
pub const CHUNKS_TABLE: &str = "chunks";

/// Table holding the single manifest row.
pub const MANIFEST_TABLE: &str = "manifest";

/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 2;

/// Everything that determines the content of an index. Two runs with equal
/// keys produce the same chunks and vectors, so the second can reuse the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKey {
    /// Fingerprint of the document set.
    pub fingerprint: Fingerprint,
    /// Model that produced the vectors; queries must use the same one.
    pub embedding_model: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

/// Metadata row stored next to the chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexManifest {
    pub format_version: u32,
    pub key: IndexKey,
    /// Length of every vector (0 for an empty index).
    pub dimension: usize,
    pub entry_count: usize,
}

/// One indexed chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub text: String,
    pub vector: Vec<f32>,
}

/// Handle on a persisted nearest-neighbour index.
pub struct VectorIndex {
    dir: PathBuf,
    manifest: IndexManifest,
    /// `None` when the index holds no chunks.
    chunks: Option<Table>,
}

impl fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorIndex")
            .field("dir", &self.dir)
            .field("manifest", &self.manifest)
            .finish()
    }
}

impl VectorIndex {
    /// Replace whatever index lives in `dir` with the given chunks.
    ///
    /// # Errors
    /// [`PdfChatError::Internal`] when the counts differ,
    /// [`PdfChatError::DimensionMismatch`] when vector lengths disagree (both
    /// checked before anything on disk changes) and
    /// [`PdfChatError::IndexWriteFailed`] when the store rejects the write.
    pub async fn create(
        dir: &Path,
        key: IndexKey,
        texts: Vec<String>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self, PdfChatError> {
        if texts.len() != vectors.len() {
            return Err(PdfChatError::Internal(format!(
                "{} chunks but {} vectors",
                texts.len(),
                vectors.len()
            )));
        }
        let dimension = vectors.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(PdfChatError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            });
        }

        let manifest = IndexManifest {
            format_version: FORMAT_VERSION,
            key,
            dimension,
            entry_count: texts.len(),
        };
        let write_err = |e: String| PdfChatError::IndexWriteFailed {
            path: dir.to_path_buf(),
            detail: e,
        };

        std::fs::create_dir_all(dir).map_err(|e| write_err(e.to_string()))?;
        let db = open_db(dir).await.map_err(write_err)?;

        drop_if_present(&db, MANIFEST_TABLE).await.map_err(write_err)?;
        drop_if_present(&db, CHUNKS_TABLE).await.map_err(write_err)?;

        let chunks = if texts.is_empty() {
            None
        } else {
            let schema = chunks_schema(dimension);
            let batch = chunks_batch(schema.clone(), texts, vectors, dimension)
                .map_err(|e| write_err(e.to_string()))?;
            let table = db
                .create_table(
                    CHUNKS_TABLE,
                    RecordBatchIterator::new(vec![Ok(batch)], schema),
                )
                .execute()
                .await
                .map_err(|e| write_err(e.to_string()))?;
            Some(table)
        };

        let schema = manifest_schema();
        let batch = manifest_batch(schema.clone(), &manifest).map_err(|e| write_err(e.to_string()))?;
        db.create_table(
            MANIFEST_TABLE,
            RecordBatchIterator::new(vec![Ok(batch)], schema),
        )
        .execute()
        .await
        .map_err(|e| write_err(e.to_string()))?;

        info!(
            "Saved index: {} entries, dimension {} -> {}",
            manifest.entry_count,
            manifest.dimension,
            dir.display()
        );
        Ok(Self {
            dir: dir.to_path_buf(),
            manifest,
            chunks,
        })
    }

    /// Whether a complete index exists in `dir`.
    pub fn exists(dir: &Path) -> bool {
        dir.join(format!("{MANIFEST_TABLE}.lance")).is_dir()
    }

    /// Open the index in `dir`.
    ///
    /// # Errors
    /// [`PdfChatError::IndexMissing`] when no complete index exists, and
    /// [`PdfChatError::IndexCorrupt`] when the tables cannot be read, have an
    /// unknown format version or disagree with the manifest.
    pub async fn load(dir: &Path) -> Result<Self, PdfChatError> {
        if !Self::exists(dir) {
            return Err(PdfChatError::IndexMissing {
                path: dir.to_path_buf(),
            });
        }
        let corrupt = |detail: String| PdfChatError::IndexCorrupt {
            path: dir.to_path_buf(),
            detail,
        };

        let db = open_db(dir).await.map_err(corrupt)?;
        let manifest_table = db
            .open_table(MANIFEST_TABLE)
            .execute()
            .await
            .map_err(|e| corrupt(e.to_string()))?;
        let manifest = read_manifest(&manifest_table).await.map_err(corrupt)?;

        if manifest.format_version != FORMAT_VERSION {
            return Err(corrupt(format!(
                "unsupported format version {}",
                manifest.format_version
            )));
        }

        let chunks = if manifest.entry_count == 0 {
            None
        } else {
            let table = db
                .open_table(CHUNKS_TABLE)
                .execute()
                .await
                .map_err(|e| corrupt(e.to_string()))?;
            let rows = table
                .count_rows(None)
                .await
                .map_err(|e| corrupt(e.to_string()))?;
            if rows != manifest.entry_count {
                return Err(corrupt(format!(
                    "chunks table has {} rows, manifest says {}",
                    rows, manifest.entry_count
                )));
            }
            Some(table)
        };

        debug!(
            "Loaded index {}: {} entries, model {}",
            manifest.key.fingerprint.short(),
            manifest.entry_count,
            manifest.key.embedding_model
        );
        Ok(Self {
            dir: dir.to_path_buf(),
            manifest,
            chunks,
        })
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn dimension(&self) -> usize {
        self.manifest.dimension
    }

    pub fn embedding_model(&self) -> &str {
        &self.manifest.key.embedding_model
    }

    pub fn len(&self) -> usize {
        self.manifest.entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.manifest.entry_count == 0
    }

    /// The `k` entries closest to `query`, nearest first.
    ///
    /// Always returns `min(k, len)` results; there is no distance threshold.
    pub async fn search(
        &self,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, PdfChatError> {
        let Some(ref table) = self.chunks else {
            return Ok(Vec::new());
        };
        if query.len() != self.manifest.dimension {
            return Err(PdfChatError::DimensionMismatch {
                expected: self.manifest.dimension,
                actual: query.len(),
            });
        }
        let corrupt = |detail: String| PdfChatError::IndexCorrupt {
            path: self.dir.clone(),
            detail,
        };

        let batches: Vec<RecordBatch> = table
            .query()
            .nearest_to(query.to_vec())
            .map_err(|e| corrupt(e.to_string()))?
            .limit(k)
            .execute()
            .await
            .map_err(|e| corrupt(e.to_string()))?
            .try_collect()
            .await
            .map_err(|e| corrupt(e.to_string()))?;

        let mut hits: Vec<(f32, i64, String)> = Vec::new();
        for batch in &batches {
            let positions = column::<Int64Array>(batch, "position").map_err(corrupt)?;
            let texts = column::<StringArray>(batch, "text").map_err(corrupt)?;
            let distances = column::<Float32Array>(batch, "_distance").map_err(corrupt)?;
            for i in 0..batch.num_rows() {
                hits.push((
                    distances.value(i),
                    positions.value(i),
                    texts.value(i).to_string(),
                ));
            }
        }
        hits.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        Ok(hits
            .into_iter()
            .take(k)
            .enumerate()
            .map(|(rank, (distance, _, text))| RetrievedChunk {
                rank,
                distance,
                text,
            })
            .collect())
    }

    /// Every stored chunk in insertion order.
    pub async fn entries(&self) -> Result<Vec<IndexEntry>, PdfChatError> {
        let Some(ref table) = self.chunks else {
            return Ok(Vec::new());
        };
        let corrupt = |detail: String| PdfChatError::IndexCorrupt {
            path: self.dir.clone(),
            detail,
        };

        let batches: Vec<RecordBatch> = table
            .query()
            .execute()
            .await
            .map_err(|e| corrupt(e.to_string()))?
            .try_collect()
            .await
            .map_err(|e| corrupt(e.to_string()))?;

        let mut rows: Vec<(i64, IndexEntry)> = Vec::with_capacity(self.len());
        for batch in &batches {
            let positions = column::<Int64Array>(batch, "position").map_err(corrupt)?;
            let texts = column::<StringArray>(batch, "text").map_err(corrupt)?;
            let vectors = column::<FixedSizeListArray>(batch, "vector").map_err(corrupt)?;
            for i in 0..batch.num_rows() {
                let values = vectors.value(i);
                let vector = values
                    .as_any()
                    .downcast_ref::<Float32Array>()
                    .map(|v| v.values().to_vec())
                    .ok_or_else(|| corrupt("vector items are not f32".to_string()))?;
                rows.push((
                    positions.value(i),
                    IndexEntry {
                        text: texts.value(i).to_string(),
                        vector,
                    },
                ));
            }
        }
        rows.sort_by_key(|(position, _)| *position);
        Ok(rows.into_iter().map(|(_, entry)| entry).collect())
    }
}

// ── Store plumbing ───────────────────────────────────────────────────────────

async fn open_db(dir: &Path) -> Result<Connection, String> {
    let uri = dir.to_string_lossy().to_string();
    connect(&uri)
        .execute()
        .await
        .map_err(|e| format!("failed to open LanceDB at {}: {}", uri, e))
}

async fn drop_if_present(db: &Connection, table_name: &str) -> Result<(), String> {
    let names = db.table_names().execute().await.map_err(|e| e.to_string())?;
    if names.iter().any(|name| name == table_name) {
        db.drop_table(table_name, &[])
            .await
            .map_err(|e| format!("failed to drop {}: {}", table_name, e))?;
    }
    Ok(())
}

fn chunks_schema(dimension: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("position", DataType::Int64, false),
        Field::new("text", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                dimension as i32,
            ),
            false,
        ),
    ]))
}

fn manifest_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("format_version", DataType::UInt32, false),
        Field::new("fingerprint", DataType::Utf8, false),
        Field::new("embedding_model", DataType::Utf8, false),
        Field::new("chunk_size", DataType::Int64, false),
        Field::new("chunk_overlap", DataType::Int64, false),
        Field::new("dimension", DataType::Int64, false),
        Field::new("entry_count", DataType::Int64, false),
    ]))
}

fn chunks_batch(
    schema: Arc<Schema>,
    texts: Vec<String>,
    vectors: Vec<Vec<f32>>,
    dimension: usize,
) -> Result<RecordBatch, arrow_schema::ArrowError> {
    let positions: Vec<i64> = (0..texts.len() as i64).collect();
    let vectors = FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
        vectors
            .into_iter()
            .map(|v| Some(v.into_iter().map(Some).collect::<Vec<_>>())),
        dimension as i32,
    );
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(positions)),
        Arc::new(StringArray::from(texts)),
        Arc::new(vectors),
    ];
    RecordBatch::try_new(schema, columns)
}

fn manifest_batch(
    schema: Arc<Schema>,
    manifest: &IndexManifest,
) -> Result<RecordBatch, arrow_schema::ArrowError> {
    let key = &manifest.key;
    let columns: Vec<ArrayRef> = vec![
        Arc::new(UInt32Array::from(vec![manifest.format_version])),
        Arc::new(StringArray::from(vec![key.fingerprint.to_string()])),
        Arc::new(StringArray::from(vec![key.embedding_model.clone()])),
        Arc::new(Int64Array::from(vec![key.chunk_size as i64])),
        Arc::new(Int64Array::from(vec![key.chunk_overlap as i64])),
        Arc::new(Int64Array::from(vec![manifest.dimension as i64])),
        Arc::new(Int64Array::from(vec![manifest.entry_count as i64])),
    ];
    RecordBatch::try_new(schema, columns)
}

async fn read_manifest(table: &Table) -> Result<IndexManifest, String> {
    let batches: Vec<RecordBatch> = table
        .query()
        .limit(1)
        .execute()
        .await
        .map_err(|e| e.to_string())?
        .try_collect()
        .await
        .map_err(|e| e.to_string())?;
    let batch = batches
        .iter()
        .find(|b| b.num_rows() > 0)
        .ok_or_else(|| "manifest table is empty".to_string())?;

    let count = |name: &str| -> Result<usize, String> {
        let value = column::<Int64Array>(batch, name)?.value(0);
        usize::try_from(value).map_err(|_| format!("manifest {name} is negative"))
    };

    Ok(IndexManifest {
        format_version: column::<UInt32Array>(batch, "format_version")?.value(0),
        key: IndexKey {
            fingerprint: Fingerprint::from_hex(column::<StringArray>(batch, "fingerprint")?.value(0)),
            embedding_model: column::<StringArray>(batch, "embedding_model")?
                .value(0)
                .to_string(),
            chunk_size: count("chunk_size")?,
            chunk_overlap: count("chunk_overlap")?,
        },
        dimension: count("dimension")?,
        entry_count: count("entry_count")?,
    })
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T, String> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| format!("column '{}' is missing or has the wrong type", name))
}
