//! Exact vector index over a flat row-major table
//!
//! Brute-force k-NN search under squared Euclidean distance.
//! Rows are append-only: row `i` is always the `i`-th vector inserted.

use crate::error::{Result, StoreError};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Bumped whenever the on-disk layout changes
const INDEX_FORMAT_VERSION: u32 = 1;

/// A single search hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Row index inside the index (insertion order)
    pub row: usize,
    /// Squared Euclidean distance to the query
    pub distance: f32,
}

/// Exact nearest-neighbor index
#[derive(Debug, Clone)]
pub struct VectorIndex {
    /// Dimension of every row
    dimension: usize,
    /// Row-major vector table, `len() * dimension` floats
    data: Vec<f32>,
}

impl VectorIndex {
    /// Create an empty index. An index of dimension zero refuses every `add`.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    /// Append vectors as new rows.
    ///
    /// Every vector is validated before any row is written, so a batch with a
    /// single bad vector leaves the index untouched.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        if self.dimension == 0 && !vectors.is_empty() {
            return Err(StoreError::Config(
                "cannot add vectors to a zero-dimension index".to_string(),
            ));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }

        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(())
    }

    /// Return up to `k` nearest rows, closest first.
    ///
    /// Equal distances keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut neighbors: Vec<Neighbor> = self
            .data
            .par_chunks(self.dimension)
            .enumerate()
            .map(|(row, vector)| Neighbor {
                row,
                distance: squared_l2(query, vector),
            })
            .collect();

        neighbors.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.row.cmp(&b.row))
        });
        neighbors.truncate(k);

        Ok(neighbors)
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Borrow a stored row
    pub fn row(&self, row: usize) -> Option<&[f32]> {
        if row >= self.len() {
            return None;
        }
        let start = row * self.dimension;
        Some(&self.data[start..start + self.dimension])
    }

    /// Drop every row at position `rows` and beyond.
    pub(crate) fn truncate(&mut self, rows: usize) {
        self.data.truncate(rows * self.dimension);
    }

    /// Write the vector table to `path`.
    ///
    /// The table goes to a sibling `.tmp` file first and is renamed into place.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = IndexFileRef {
            format_version: INDEX_FORMAT_VERSION,
            dimension: self.dimension,
            vectors: &self.data,
        };

        let tmp_path = path.with_extension("tmp");
        {
            let file =
                File::create(&tmp_path).map_err(|e| StoreError::index_write(&tmp_path, e))?;
            let mut writer = BufWriter::new(file);
            bincode::serialize_into(&mut writer, &data)
                .map_err(|e| StoreError::index_write(&tmp_path, e))?;
            writer
                .flush()
                .map_err(|e| StoreError::index_write(&tmp_path, e))?;
            writer
                .get_ref()
                .sync_all()
                .map_err(|e| StoreError::index_write(&tmp_path, e))?;
        }

        std::fs::rename(&tmp_path, path).map_err(|e| StoreError::index_write(path, e))?;
        Ok(())
    }

    /// Read a vector table written by [`VectorIndex::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| StoreError::index_load(path, e))?;
        let reader = BufReader::new(file);

        let data: IndexFile =
            bincode::deserialize_from(reader).map_err(|e| StoreError::index_load(path, e))?;

        if data.format_version != INDEX_FORMAT_VERSION {
            return Err(StoreError::index_load(
                path,
                format!("unsupported format version {}", data.format_version),
            ));
        }
        if data.dimension == 0 {
            return Err(StoreError::index_load(path, "zero dimension"));
        }
        if data.vectors.len() % data.dimension != 0 {
            return Err(StoreError::index_load(
                path,
                format!(
                    "{} floats do not form rows of dimension {}",
                    data.vectors.len(),
                    data.dimension
                ),
            ));
        }

        Ok(Self {
            dimension: data.dimension,
            data: data.vectors,
        })
    }
}

#[derive(Serialize)]
struct IndexFileRef<'a> {
    format_version: u32,
    dimension: usize,
    vectors: &'a [f32],
}

#[derive(Deserialize)]
struct IndexFile {
    format_version: u32,
    dimension: usize,
    vectors: Vec<f32>,
}

#[inline]
fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_vector_index_new() {
        let index = VectorIndex::new(384);
        assert_eq!(index.dimension(), 384);
        assert_eq!(index.len(), 0);
        assert!(index.is_empty());
    }

    #[test]
    fn test_zero_dimension_rejects_add() {
        let mut index = VectorIndex::new(0);
        assert!(matches!(
            index.add(&[vec![], vec![]]),
            Err(StoreError::Config(_))
        ));
        assert_eq!(index.len(), 0);
        index.add(&[]).unwrap();
    }

    #[test]
    fn test_add_and_search() {
        let mut index = VectorIndex::new(3);
        index
            .add(&[
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![0.9, 0.1, 0.0], // Close to row 0
            ])
            .unwrap();

        assert_eq!(index.len(), 3);

        let results = index.search(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].row, 0);
        assert_eq!(results[0].distance, 0.0);
        assert_eq!(results[1].row, 2);
        assert!((results[1].distance - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_search_returns_ascending_distances() {
        let mut index = VectorIndex::new(2);
        let vectors: Vec<Vec<f32>> = (0..50)
            .map(|i| vec![(i * 7 % 13) as f32, (i * 3 % 11) as f32])
            .collect();
        index.add(&vectors).unwrap();

        let results = index.search(&[4.0, 4.0], 50).unwrap();
        assert_eq!(results.len(), 50);
        for pair in results.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut index = VectorIndex::new(2);
        index
            .add(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![-1.0, 0.0]])
            .unwrap();

        let results = index.search(&[0.0, 0.0], 3).unwrap();
        let rows: Vec<usize> = results.iter().map(|n| n.row).collect();
        assert_eq!(rows, vec![0, 1, 2]);
    }

    #[test]
    fn test_k_larger_than_len() {
        let mut index = VectorIndex::new(2);
        index.add(&[vec![0.0, 0.0], vec![1.0, 1.0]]).unwrap();

        let results = index.search(&[0.0, 0.0], 10).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_k_zero() {
        let mut index = VectorIndex::new(2);
        index.add(&[vec![0.0, 0.0]]).unwrap();
        assert!(index.search(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch_on_add_is_atomic() {
        let mut index = VectorIndex::new(3);
        let result = index.add(&[vec![1.0, 0.0, 0.0], vec![1.0, 2.0]]);

        assert!(matches!(
            result,
            Err(StoreError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn test_dimension_mismatch_on_search() {
        let mut index = VectorIndex::new(3);
        index.add(&[vec![1.0, 0.0, 0.0]]).unwrap();
        assert!(matches!(
            index.search(&[1.0], 1),
            Err(StoreError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_search_empty_index() {
        let index = VectorIndex::new(384);
        let results = index.search(&vec![0.0; 384], 10).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("vectors.bin");

        let mut index = VectorIndex::new(3);
        index
            .add(&[vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.5, 0.5, 0.0]])
            .unwrap();
        index.save(&path).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());

        let loaded = VectorIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.dimension(), 3);
        assert_eq!(loaded.row(2), Some(&[0.5, 0.5, 0.0][..]));

        let query = [0.4, 0.6, 0.0];
        assert_eq!(
            loaded.search(&query, 3).unwrap(),
            index.search(&query, 3).unwrap()
        );
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let result = VectorIndex::load(temp.path().join("missing.bin"));
        assert!(matches!(result, Err(StoreError::IndexLoad { .. })));
    }

    #[test]
    fn test_load_corrupt_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("corrupt.bin");
        std::fs::write(&path, b"not an index").unwrap();

        let result = VectorIndex::load(&path);
        assert!(matches!(result, Err(StoreError::IndexLoad { .. })));
    }

    #[test]
    fn test_load_truncated_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("vectors.bin");

        let mut index = VectorIndex::new(4);
        index.add(&[vec![1.0; 4], vec![2.0; 4]]).unwrap();
        index.save(&path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 6]).unwrap();

        let result = VectorIndex::load(&path);
        assert!(matches!(result, Err(StoreError::IndexLoad { .. })));
    }

    #[test]
    fn test_truncate() {
        let mut index = VectorIndex::new(2);
        index
            .add(&[vec![0.0, 0.0], vec![1.0, 1.0], vec![2.0, 2.0]])
            .unwrap();

        index.truncate(1);
        assert_eq!(index.len(), 1);
        assert_eq!(index.row(0), Some(&[0.0, 0.0][..]));
        assert_eq!(index.row(1), None);
    }
}
