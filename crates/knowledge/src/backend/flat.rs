//! Exhaustive inner-product vector index.
//!
//! Vectors live in one contiguous row-major buffer. Search scores every row,
//! so the returned top-k is exact.

use docent_core::{AppError, AppResult};

use super::sort_by_relevance;

/// Flat (brute-force) inner-product index over fixed-dimension vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIpIndex {
    dim: usize,
    data: Vec<f32>,
}

impl FlatIpIndex {
    /// Create an empty index for vectors of `dim` components.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            data: Vec::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append a vector; its position becomes its id.
    pub fn add(&mut self, vector: &[f32]) -> AppResult<()> {
        if self.dim == 0 || vector.len() != self.dim {
            return Err(AppError::Knowledge(format!(
                "Vector has {} dimensions, index expects {}",
                vector.len(),
                self.dim
            )));
        }

        self.data.extend_from_slice(vector);
        Ok(())
    }

    /// Stored vector at position `id`.
    pub fn row(&self, id: usize) -> Option<&[f32]> {
        let start = id.checked_mul(self.dim)?;
        self.data.get(start..start + self.dim)
    }

    /// Iterate stored vectors in insertion order.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dim.max(1))
    }

    /// Return up to `k` `(id, inner product)` pairs, best first.
    ///
    /// Equal scores are ordered by ascending id.
    pub fn search(&self, query: &[f32], k: usize) -> AppResult<Vec<(usize, f32)>> {
        if query.len() != self.dim {
            return Err(AppError::Knowledge(format!(
                "Query has {} dimensions, index expects {}",
                query.len(),
                self.dim
            )));
        }

        let mut scores: Vec<(usize, f32)> = self
            .rows()
            .enumerate()
            .map(|(id, row)| (id, dot(row, query)))
            .collect();

        sort_by_relevance(&mut scores);
        scores.truncate(k);
        Ok(scores)
    }
}

/// Inner product of two equal-length vectors.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Scale a vector to unit L2 norm in place. Zero vectors are left untouched.
pub fn normalize_l2(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_with(rows: &[&[f32]]) -> FlatIpIndex {
        let mut index = FlatIpIndex::new(rows[0].len());
        for row in rows {
            index.add(row).unwrap();
        }
        index
    }

    #[test]
    fn test_add_and_rows() {
        let index = index_with(&[&[1.0, 0.0], &[0.0, 1.0], &[0.5, 0.5]]);
        assert_eq!(index.len(), 3);
        assert_eq!(index.row(2), Some(&[0.5, 0.5][..]));
        assert_eq!(index.row(3), None);
        assert_eq!(index.rows().count(), 3);
    }

    #[test]
    fn test_add_rejects_wrong_dimension() {
        let mut index = FlatIpIndex::new(3);
        assert!(index.add(&[1.0, 0.0]).is_err());
        assert!(index.is_empty());
    }

    #[test]
    fn test_search_is_exact_and_ordered() {
        let index = index_with(&[&[0.1, 0.9], &[0.9, 0.1], &[0.6, 0.4]]);
        let results = index.search(&[1.0, 0.0], 2).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, 1);
        assert_eq!(results[1].0, 2);
        assert!(results[0].1 >= results[1].1);
    }

    #[test]
    fn test_search_ties_by_ascending_id() {
        let index = index_with(&[&[0.0, 1.0], &[1.0, 0.0], &[1.0, 0.0]]);
        let results = index.search(&[1.0, 0.0], 3).unwrap();
        let ids: Vec<usize> = results.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 2, 0]);
    }

    #[test]
    fn test_search_k_larger_than_index() {
        let index = index_with(&[&[1.0, 0.0]]);
        assert_eq!(index.search(&[1.0, 0.0], 10).unwrap().len(), 1);
    }

    #[test]
    fn test_search_rejects_wrong_query_dimension() {
        let index = index_with(&[&[1.0, 0.0]]);
        assert!(index.search(&[1.0, 0.0, 0.0], 1).is_err());
    }

    #[test]
    fn test_normalize_l2() {
        let mut v = vec![3.0, 4.0];
        normalize_l2(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        normalize_l2(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }
}
