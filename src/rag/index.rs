//! Flat nearest-neighbor index over embedding vectors.

use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::core::errors::RagError;

/// Exact (unindexed) vector store: rows are packed into one matrix and every
/// query scans all of them. Knowledge bases are small enough that a full scan
/// is faster than maintaining any approximate structure.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    matrix: Array2<f32>,
    dim: usize,
}

impl VectorIndex {
    /// Packs `vectors` row-wise; the row number of a vector is the ordinal of
    /// the chunk it embeds. Every vector must share one dimension.
    pub fn build(vectors: &[Vec<f32>]) -> Result<Self, RagError> {
        let Some(first) = vectors.first() else {
            return Ok(Self {
                matrix: Array2::zeros((0, 0)),
                dim: 0,
            });
        };

        let dim = first.len();
        let mut matrix = Array2::zeros((vectors.len(), dim));
        for (row, vector) in vectors.iter().enumerate() {
            if vector.len() != dim {
                return Err(RagError::DimensionMismatch {
                    expected: dim,
                    got: vector.len(),
                });
            }
            matrix
                .row_mut(row)
                .assign(&ArrayView1::from(vector.as_slice()));
        }

        Ok(Self { matrix, dim })
    }

    pub fn len(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Returns up to `k` `(row, squared_distance)` pairs ranked by ascending
    /// squared Euclidean distance. Ties keep insertion order; `k` beyond the
    /// stored count returns everything; an empty index answers any query with
    /// an empty ranking.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, RagError> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dim {
            return Err(RagError::DimensionMismatch {
                expected: self.dim,
                got: query.len(),
            });
        }

        let query = ArrayView1::from(query);
        let diffs = &self.matrix - &query;
        let distances: Array1<f32> = diffs.mapv(|x| x * x).sum_axis(Axis(1));

        let mut ranked: Vec<(usize, f32)> = distances.iter().copied().enumerate().collect();
        // Stable sort, so equal distances stay in row order.
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
        ranked.truncate(k);
        Ok(ranked)
    }
}
