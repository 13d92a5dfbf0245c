//! Measured `(q, I, sigma)` scattering data consumed by the fitters
//! (spec.md §4.5).

use crate::error::{Result, SaxsError};

#[derive(Clone, Debug)]
pub struct Dataset {
    pub q: Vec<f64>,
    pub i: Vec<f64>,
    pub sigma: Vec<f64>,
}

impl Dataset {
    /// Build a dataset, rejecting mismatched column lengths up front so
    /// every downstream fitter can assume `q.len() == i.len() == sigma.len()`.
    pub fn new(q: Vec<f64>, i: Vec<f64>, sigma: Vec<f64>) -> Result<Self> {
        if q.len() != i.len() || q.len() != sigma.len() {
            return Err(SaxsError::Size(format!(
                "dataset columns of unequal length: q={}, i={}, sigma={}",
                q.len(),
                i.len(),
                sigma.len()
            )));
        }
        Ok(Self { q, i, sigma })
    }

    pub fn len(&self) -> usize {
        self.q.len()
    }

    pub fn is_empty(&self) -> bool {
        self.q.is_empty()
    }

    /// The subset of rows with `q` in `[q_min, q_max]`, preserving order.
    pub fn window(&self, q_min: f64, q_max: f64) -> Dataset {
        let mut q = Vec::new();
        let mut i = Vec::new();
        let mut sigma = Vec::new();
        for idx in 0..self.q.len() {
            if self.q[idx] >= q_min && self.q[idx] <= q_max {
                q.push(self.q[idx]);
                i.push(self.i[idx]);
                sigma.push(self.sigma[idx]);
            }
        }
        Dataset { q, i, sigma }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_columns_are_rejected() {
        let err = Dataset::new(vec![0.0, 1.0], vec![0.0], vec![1.0, 1.0]);
        assert!(err.is_err());
    }

    #[test]
    fn window_keeps_only_matching_rows() {
        let d = Dataset::new(vec![0.0, 0.1, 0.2, 0.3], vec![1.0, 2.0, 3.0, 4.0], vec![0.1, 0.1, 0.1, 0.1]).unwrap();
        let w = d.window(0.1, 0.2);
        assert_eq!(w.len(), 2);
        assert_eq!(w.i, vec![2.0, 3.0]);
    }
}
