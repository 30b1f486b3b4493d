//! Isolation Forest
//!
//! Unsupervised anomaly scorer: trees isolate points by random
//! axis-aligned splits, anomalous points isolate in fewer splits.
//! Scores follow the usual orientation `0.5 - 2^(-E[h]/c(psi))` so that
//! lower = more anomalous and negative values sit past the nominal
//! boundary. Training is fully deterministic for a fixed seed.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Average path length of an unsuccessful BST search over n points.
/// The standard normalizer c(n) from the isolation forest paper.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let nf = n as f64;
            2.0 * ((nf - 1.0).ln() + EULER_GAMMA) - 2.0 * (nf - 1.0) / nf
        }
    }
}

// ============================================================================
// TREES
// ============================================================================

/// Arena-stored node; children are indices into the tree's node vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationTree {
    nodes: Vec<TreeNode>,
}

impl IsolationTree {
    /// Grow a tree over the given sample rows of `matrix`.
    fn grow(matrix: &Array2<f64>, rows: &[usize], max_depth: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow_node(matrix, rows, 0, max_depth, rng);
        tree
    }

    fn grow_node(
        &mut self,
        matrix: &Array2<f64>,
        rows: &[usize],
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        if rows.len() <= 1 || depth >= max_depth {
            let index = self.nodes.len();
            self.nodes.push(TreeNode::Leaf { size: rows.len() });
            return index;
        }

        // Only features with spread in this partition can split it
        let n_features = matrix.ncols();
        let splittable: Vec<usize> = (0..n_features)
            .filter(|&f| {
                let (min, max) = column_range(matrix, rows, f);
                max > min
            })
            .collect();

        if splittable.is_empty() {
            let index = self.nodes.len();
            self.nodes.push(TreeNode::Leaf { size: rows.len() });
            return index;
        }

        let feature = splittable[rng.gen_range(0..splittable.len())];
        let (min, max) = column_range(matrix, rows, feature);
        let threshold = rng.gen_range(min..max);

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.iter().copied().partition(|&r| matrix[[r, feature]] < threshold);

        // Reserve our slot before recursing so child indices are stable
        let index = self.nodes.len();
        self.nodes.push(TreeNode::Leaf { size: 0 });
        let left = self.grow_node(matrix, &left_rows, depth + 1, max_depth, rng);
        let right = self.grow_node(matrix, &right_rows, depth + 1, max_depth, rng);
        self.nodes[index] = TreeNode::Split { feature, threshold, left, right };
        index
    }

    /// Path length for one sample, including the leaf-size adjustment.
    fn path_length(&self, sample: &[f64]) -> f64 {
        let mut index = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[index] {
                TreeNode::Leaf { size } => {
                    return depth + average_path_length(*size);
                }
                TreeNode::Split { feature, threshold, left, right } => {
                    index = if sample[*feature] < *threshold { *left } else { *right };
                    depth += 1.0;
                }
            }
        }
    }
}

fn column_range(matrix: &Array2<f64>, rows: &[usize], feature: usize) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &r in rows {
        let v = matrix[[r, feature]];
        if v < min {
            min = v;
        }
        if v > max {
            max = v;
        }
    }
    (min, max)
}

// ============================================================================
// FOREST
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    pub tree_count: usize,
    /// Subsample size actually used (capped at the training set size)
    pub subsample_size: usize,
    pub seed: u64,
    trees: Vec<IsolationTree>,
}

impl IsolationForest {
    /// Fit a forest. `check_cancelled` is polled between trees; a
    /// cancelled fit returns `TrainingCancelled` and leaves no partial
    /// state behind.
    pub fn fit(
        matrix: &Array2<f64>,
        tree_count: usize,
        subsample_size: usize,
        seed: u64,
        check_cancelled: &dyn Fn() -> bool,
    ) -> EngineResult<Self> {
        let n = matrix.nrows();
        if n < 2 {
            return Err(EngineError::TrainingFailed(format!(
                "cannot fit a forest on {} samples",
                n
            )));
        }

        let psi = subsample_size.min(n);
        let max_depth = (psi as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut trees = Vec::with_capacity(tree_count);

        for _ in 0..tree_count {
            if check_cancelled() {
                return Err(EngineError::TrainingCancelled);
            }
            let rows = rand::seq::index::sample(&mut rng, n, psi).into_vec();
            trees.push(IsolationTree::grow(matrix, &rows, max_depth, &mut rng));
        }

        Ok(Self { tree_count, subsample_size: psi, seed, trees })
    }

    /// Decision score for one sample. Lower = more anomalous.
    pub fn decision(&self, sample: &[f64]) -> f64 {
        let mean_path = self
            .trees
            .iter()
            .map(|t| t.path_length(sample))
            .sum::<f64>()
            / self.trees.len() as f64;

        let normalizer = average_path_length(self.subsample_size);
        let anomaly_s = if normalizer > 0.0 {
            2f64.powf(-mean_path / normalizer)
        } else {
            0.5
        };
        0.5 - anomaly_s
    }

    /// Decision scores for every row of a matrix.
    pub fn decision_matrix(&self, matrix: &Array2<f64>) -> Vec<f64> {
        matrix
            .rows()
            .into_iter()
            .map(|row| self.decision(&row.to_vec()))
            .collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================
