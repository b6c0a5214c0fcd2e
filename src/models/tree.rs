//! Регрессионное дерево и случайный лес

use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::Regressor;
use crate::error::{EnergyError, Result};

const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Число случайно выбираемых признаков в каждом узле; None = все
    pub max_features: Option<usize>,
    /// L2-регуляризация значения листа: sum / (n + l2)
    pub l2_leaf_reg: f64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 12,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            l2_leaf_reg: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// CART-дерево с точным перебором порогов по критерию MSE
#[derive(Debug, Clone)]
pub struct RegressionTree {
    params: TreeParams,
    seed: u64,
    root: Option<TreeNode>,
    n_features: usize,
    gains: Array1<f64>,
}

impl RegressionTree {
    pub fn new(params: TreeParams, seed: u64) -> Self {
        Self {
            params,
            seed,
            root: None,
            n_features: 0,
            gains: Array1::zeros(0),
        }
    }

    pub fn params(&self) -> &TreeParams {
        &self.params
    }

    /// Обучение на подмножестве строк (бутстрэп, подвыборка в бустинге)
    pub(crate) fn fit_rows(
        &mut self,
        X: &Array2<f64>,
        y: &Array1<f64>,
        rows: Vec<usize>,
        rng: &mut StdRng,
    ) -> Result<()> {
        if rows.is_empty() || X.ncols() == 0 {
            return Err(EnergyError::EmptyData("tree needs at least one row".to_string()));
        }
        if X.nrows() != y.len() {
            return Err(EnergyError::ShapeMismatch {
                expected: format!("{} targets", X.nrows()),
                found: format!("{} targets", y.len()),
            });
        }

        self.n_features = X.ncols();
        let mut gains = Array1::zeros(X.ncols());
        let root = self.build(X, y, rows, 0, rng, &mut gains);
        self.root = Some(root);
        self.gains = gains;
        Ok(())
    }

    fn leaf(&self, y: &Array1<f64>, rows: &[usize]) -> TreeNode {
        let sum: f64 = rows.iter().map(|&i| y[i]).sum();
        TreeNode::Leaf {
            value: sum / (rows.len() as f64 + self.params.l2_leaf_reg),
        }
    }

    fn build(
        &self,
        X: &Array2<f64>,
        y: &Array1<f64>,
        rows: Vec<usize>,
        depth: usize,
        rng: &mut StdRng,
        gains: &mut Array1<f64>,
    ) -> TreeNode {
        let min_leaf = self.params.min_samples_leaf.max(1);
        if depth >= self.params.max_depth
            || rows.len() < self.params.min_samples_split
            || rows.len() < 2 * min_leaf
        {
            return self.leaf(y, &rows);
        }

        let features = self.candidate_features(X.ncols(), rng);
        let best = match self.best_split(X, y, &rows, &features, min_leaf) {
            Some(best) => best,
            None => return self.leaf(y, &rows),
        };

        gains[best.feature] += best.gain;
        let (left, right): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&i| X[[i, best.feature]] <= best.threshold);

        TreeNode::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(self.build(X, y, left, depth + 1, rng, gains)),
            right: Box::new(self.build(X, y, right, depth + 1, rng, gains)),
        }
    }

    fn candidate_features(&self, n_features: usize, rng: &mut StdRng) -> Vec<usize> {
        match self.params.max_features {
            Some(m) if m > 0 && m < n_features => {
                let mut chosen = rand::seq::index::sample(rng, n_features, m).into_vec();
                chosen.sort_unstable();
                chosen
            }
            _ => (0..n_features).collect(),
        }
    }

    /// Уменьшение суммы квадратов: S_L²/n_L + S_R²/n_R - S²/n
    fn best_split(
        &self,
        X: &Array2<f64>,
        y: &Array1<f64>,
        rows: &[usize],
        features: &[usize],
        min_leaf: usize,
    ) -> Option<SplitCandidate> {
        let n = rows.len();
        let total: f64 = rows.iter().map(|&i| y[i]).sum();
        let parent = total * total / n as f64;
        let mut best: Option<SplitCandidate> = None;
        let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(n);

        for &feature in features {
            pairs.clear();
            pairs.extend(rows.iter().map(|&i| (X[[i, feature]], y[i])));
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

            if pairs[0].0 == pairs[n - 1].0 {
                continue;
            }

            let mut left_sum = 0.0;
            for k in 1..n {
                left_sum += pairs[k - 1].1;
                if k < min_leaf || n - k < min_leaf {
                    continue;
                }
                let (lo, hi) = (pairs[k - 1].0, pairs[k].0);
                if lo == hi {
                    continue;
                }

                let right_sum = total - left_sum;
                let gain = left_sum * left_sum / k as f64
                    + right_sum * right_sum / (n - k) as f64
                    - parent;

                if gain > MIN_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                    let mut threshold = 0.5 * (lo + hi);
                    if threshold >= hi {
                        threshold = lo;
                    }
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        gain,
                    });
                }
            }
        }

        best
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        let mut node = self
            .root
            .as_ref()
            .ok_or(EnergyError::NotFitted("RegressionTree"))?;
        loop {
            match node {
                TreeNode::Leaf { value } => return Ok(*value),
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { &**left } else { &**right };
                }
            }
        }
    }

    /// Нормированная важность признаков (MDI), сумма = 1
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        self.root.as_ref()?;
        let total = self.gains.sum();
        if total > 0.0 {
            Some(&self.gains / total)
        } else {
            Some(Array1::zeros(self.n_features))
        }
    }
}

impl Regressor for RegressionTree {
    fn name(&self) -> &'static str {
        "RegressionTree"
    }

    fn fit(&mut self, X: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        self.fit_rows(X, y, (0..X.nrows()).collect(), &mut rng)
    }

    fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>> {
        if self.root.is_some() && X.ncols() != self.n_features {
            return Err(EnergyError::ShapeMismatch {
                expected: format!("{} features", self.n_features),
                found: format!("{} features", X.ncols()),
            });
        }
        X.rows()
            .into_iter()
            .map(|row| self.predict_row(row))
            .collect::<Result<Vec<f64>>>()
            .map(Array1::from)
    }
}

/// Случайный лес: бутстрэп-выборки и усреднение предсказаний
#[derive(Debug, Clone)]
pub struct RandomForest {
    pub n_trees: usize,
    pub tree_params: TreeParams,
    pub seed: u64,
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn new(n_trees: usize, tree_params: TreeParams, seed: u64) -> Self {
        Self {
            n_trees,
            tree_params,
            seed,
            trees: Vec::new(),
        }
    }

    /// Средняя по деревьям нормированная важность признаков
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        let first = self.trees.first()?.feature_importances()?;
        let mut sum = Array1::<f64>::zeros(first.len());
        for tree in &self.trees {
            if let Some(importances) = tree.feature_importances() {
                sum += &importances;
            }
        }
        let total = sum.sum();
        if total > 0.0 {
            Some(sum / total)
        } else {
            Some(sum)
        }
    }
}

impl Regressor for RandomForest {
    fn name(&self) -> &'static str {
        "RandomForest"
    }

    fn fit(&mut self, X: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if self.n_trees == 0 {
            return Err(EnergyError::InvalidParameter(
                "random forest needs at least one tree".to_string(),
            ));
        }
        let n = X.nrows();
        if n == 0 {
            return Err(EnergyError::EmptyData("random forest needs data".to_string()));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut trees = Vec::with_capacity(self.n_trees);
        for _ in 0..self.n_trees {
            let rows: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let mut tree = RegressionTree::new(self.tree_params.clone(), rng.gen());
            let mut tree_rng = StdRng::seed_from_u64(tree.seed);
            tree.fit_rows(X, y, rows, &mut tree_rng)?;
            trees.push(tree);
        }

        tracing::debug!("Random forest trained: {} trees", trees.len());
        self.trees = trees;
        Ok(())
    }

    fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(EnergyError::NotFitted("RandomForest"));
        }
        let mut sum = Array1::<f64>::zeros(X.nrows());
        for tree in &self.trees {
            sum += &tree.predict(X)?;
        }
        Ok(sum / self.trees.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Axis;

    fn step_data() -> (Array2<f64>, Array1<f64>) {
        let X = Array2::from_shape_fn((40, 2), |(i, j)| {
            if j == 0 {
                i as f64
            } else {
                (i % 3) as f64
            }
        });
        let y = X.map_axis(Axis(1), |row| if row[0] < 20.0 { 1.0 } else { 5.0 });
        (X, y)
    }

    #[test]
    fn tree_learns_step_function() {
        let (X, y) = step_data();
        let mut tree = RegressionTree::new(TreeParams::default(), 0);
        tree.fit(&X, &y).unwrap();
        let pred = tree.predict(&X).unwrap();
        assert_eq!(pred, y);

        let importances = tree.feature_importances().unwrap();
        assert!((importances[0] - 1.0).abs() < 1e-12);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn depth_zero_predicts_mean_with_leaf_regularization() {
        let (X, y) = step_data();
        let params = TreeParams {
            max_depth: 0,
            l2_leaf_reg: 10.0,
            ..TreeParams::default()
        };
        let mut tree = RegressionTree::new(params, 0);
        tree.fit(&X, &y).unwrap();
        let pred = tree.predict(&X).unwrap();
        let expected = y.sum() / (40.0 + 10.0);
        assert!(pred.iter().all(|p| (p - expected).abs() < 1e-12));
    }

    #[test]
    fn forest_ranks_informative_feature_first() {
        let mut rng = StdRng::seed_from_u64(3);
        let X = Array2::from_shape_fn((150, 4), |_| rng.gen_range(0.0..1.0));
        let y = X.column(2).mapv(|v| 10.0 * v * v);

        let params = TreeParams {
            max_depth: 6,
            ..TreeParams::default()
        };
        let mut forest = RandomForest::new(20, params, 194);
        forest.fit(&X, &y).unwrap();
        let importances = forest.feature_importances().unwrap();

        assert!((importances.sum() - 1.0).abs() < 1e-9);
        let best = importances
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(best, 2);
        assert!(importances[2] > 0.8);
    }

    #[test]
    fn forest_is_deterministic_for_seed() {
        let (X, y) = step_data();
        let mut a = RandomForest::new(5, TreeParams::default(), 11);
        let mut b = RandomForest::new(5, TreeParams::default(), 11);
        a.fit(&X, &y).unwrap();
        b.fit(&X, &y).unwrap();
        assert_eq!(a.predict(&X).unwrap(), b.predict(&X).unwrap());
    }

    #[test]
    fn predict_before_fit_fails() {
        let forest = RandomForest::new(3, TreeParams::default(), 0);
        assert!(forest.predict(&Array2::zeros((1, 2))).is_err());
    }
}
