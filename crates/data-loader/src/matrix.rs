//! Compressed sparse row matrices and cosine similarity over their rows.

use crate::error::{DataLoadError, Result};
use rayon::prelude::*;
use serde::Deserialize;

/// On-disk CSR layout, as exported by the offline pipeline
#[derive(Debug, Deserialize)]
struct CsrParts {
    shape: [usize; 2],
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f32>,
}

/// Row-major sparse matrix with per-row L2 norms precomputed.
///
/// Column indices inside each row are sorted, so two rows can be
/// intersected with a linear merge.
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    rows: usize,
    cols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f32>,
    norms: Vec<f32>,
}

impl CsrMatrix {
    /// Build from raw CSR parts, validating structure and sorting rows
    pub fn from_parts(
        artifact: &str,
        shape: [usize; 2],
        indptr: Vec<usize>,
        indices: Vec<usize>,
        data: Vec<f32>,
    ) -> Result<Self> {
        let [rows, cols] = shape;
        if indptr.len() != rows + 1 {
            return Err(DataLoadError::invalid_artifact(
                artifact,
                format!("indptr has {} entries, expected {}", indptr.len(), rows + 1),
            ));
        }
        if indices.len() != data.len() {
            return Err(DataLoadError::invalid_artifact(
                artifact,
                "indices and data lengths differ",
            ));
        }
        if indptr.first() != Some(&0) || indptr.last() != Some(&indices.len()) {
            return Err(DataLoadError::invalid_artifact(artifact, "indptr bounds mismatch"));
        }
        if indptr.windows(2).any(|w| w[0] > w[1]) {
            return Err(DataLoadError::invalid_artifact(artifact, "indptr is not monotonic"));
        }
        if let Some(&bad) = indices.iter().find(|&&c| c >= cols) {
            return Err(DataLoadError::invalid_artifact(
                artifact,
                format!("column index {} out of range for {} columns", bad, cols),
            ));
        }

        let mut matrix = Self {
            rows,
            cols,
            indptr,
            indices,
            data,
            norms: Vec::new(),
        };
        matrix.sort_rows();
        matrix.norms = (0..rows)
            .map(|r| {
                let (_, values) = matrix.row(r);
                values.iter().map(|v| v * v).sum::<f32>().sqrt()
            })
            .collect();
        Ok(matrix)
    }

    /// Parse the JSON CSR export
    pub fn from_json(artifact: &str, bytes: &[u8]) -> Result<Self> {
        let parts: CsrParts = serde_json::from_slice(bytes).map_err(|source| DataLoadError::Json {
            file: artifact.to_string(),
            source,
        })?;
        Self::from_parts(artifact, parts.shape, parts.indptr, parts.indices, parts.data)
    }

    /// Dense rows, for fixtures and small synthetic data
    pub fn from_dense(rows: &[Vec<f32>]) -> Self {
        let cols = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut indptr = vec![0];
        let mut indices = Vec::new();
        let mut data = Vec::new();
        for row in rows {
            for (c, &v) in row.iter().enumerate() {
                if v != 0.0 {
                    indices.push(c);
                    data.push(v);
                }
            }
            indptr.push(indices.len());
        }
        let norms = rows
            .iter()
            .map(|row| row.iter().map(|v| v * v).sum::<f32>().sqrt())
            .collect();
        Self {
            rows: rows.len(),
            cols,
            indptr,
            indices,
            data,
            norms,
        }
    }

    fn sort_rows(&mut self) {
        for r in 0..self.rows {
            let (start, end) = (self.indptr[r], self.indptr[r + 1]);
            let cols = &self.indices[start..end];
            if cols.windows(2).all(|w| w[0] <= w[1]) {
                continue;
            }
            let mut pairs: Vec<(usize, f32)> = cols
                .iter()
                .copied()
                .zip(self.data[start..end].iter().copied())
                .collect();
            pairs.sort_by_key(|&(c, _)| c);
            for (offset, (c, v)) in pairs.into_iter().enumerate() {
                self.indices[start + offset] = c;
                self.data[start + offset] = v;
            }
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Column indices and values of row `r`
    pub fn row(&self, r: usize) -> (&[usize], &[f32]) {
        let (start, end) = (self.indptr[r], self.indptr[r + 1]);
        (&self.indices[start..end], &self.data[start..end])
    }

    fn dot(&self, a: usize, b: usize) -> f32 {
        let (ai, av) = self.row(a);
        let (bi, bv) = self.row(b);
        let (mut i, mut j, mut acc) = (0, 0, 0.0f32);
        while i < ai.len() && j < bi.len() {
            match ai[i].cmp(&bi[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    acc += av[i] * bv[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        acc
    }

    /// Cosine similarity between rows `a` and `b`; 0 if either row is all zeros
    pub fn cosine(&self, a: usize, b: usize) -> f32 {
        let denom = self.norms[a] * self.norms[b];
        if denom == 0.0 {
            return 0.0;
        }
        (self.dot(a, b) / denom).clamp(-1.0, 1.0)
    }

    /// Cosine similarity of row `query` against every row, in row order
    pub fn cosine_similarities(&self, query: usize) -> Vec<f32> {
        (0..self.rows)
            .into_par_iter()
            .map(|r| self.cosine(query, r))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_roundtrip_sorts_rows() {
        let json = br#"{"shape":[2,3],"indptr":[0,2,3],"indices":[2,0,1],"data":[3.0,4.0,1.0]}"#;
        let m = CsrMatrix::from_json("test", json).unwrap();
        assert_eq!(m.rows(), 2);
        assert_eq!(m.nnz(), 3);
        let (cols, vals) = m.row(0);
        assert_eq!(cols, &[0, 2]);
        assert_eq!(vals, &[4.0, 3.0]);
    }

    #[test]
    fn test_invalid_structure_rejected() {
        let json = br#"{"shape":[2,3],"indptr":[0,2],"indices":[0,1],"data":[1.0,1.0]}"#;
        assert!(matches!(
            CsrMatrix::from_json("bad", json),
            Err(DataLoadError::InvalidArtifact { .. })
        ));

        let json = br#"{"shape":[1,2],"indptr":[0,1],"indices":[5],"data":[1.0]}"#;
        assert!(CsrMatrix::from_json("bad", json).is_err());
    }

    #[test]
    fn test_cosine_similarity() {
        let m = CsrMatrix::from_dense(&[
            vec![1.0, 0.0, 1.0],
            vec![1.0, 0.0, 1.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 0.0],
        ]);
        let sims = m.cosine_similarities(0);
        assert!((sims[0] - 1.0).abs() < 1e-6);
        assert!((sims[1] - 1.0).abs() < 1e-6);
        assert_eq!(sims[2], 0.0);
        assert_eq!(sims[3], 0.0);
    }
}
