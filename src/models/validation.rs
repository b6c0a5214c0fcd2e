//! Разбиение выборки: train/test и k-fold

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{EnergyError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Обучающая и тестовая части выборки
#[derive(Debug, Clone)]
pub struct TrainTest {
    pub X_train: Array2<f64>,
    pub y_train: Array1<f64>,
    pub X_test: Array2<f64>,
    pub y_test: Array1<f64>,
}

impl TrainTest {
    pub fn from_split(X: &Array2<f64>, y: &Array1<f64>, split: &Split) -> Self {
        Self {
            X_train: X.select(Axis(0), &split.train),
            y_train: y.select(Axis(0), &split.train),
            X_test: X.select(Axis(0), &split.test),
            y_test: y.select(Axis(0), &split.test),
        }
    }
}

/// Детерминированное перемешивание с фиксированным seed и отделение доли `test_size`
pub fn train_test_split(n_samples: usize, test_size: f64, seed: u64) -> Result<Split> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(EnergyError::InvalidParameter(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }
    let n_test = (n_samples as f64 * test_size).ceil() as usize;
    if n_test == 0 || n_test >= n_samples {
        return Err(EnergyError::InvalidParameter(format!(
            "cannot split {} samples with test_size {}",
            n_samples, test_size
        )));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Ok(Split {
        train,
        test: indices,
    })
}

/// K-fold без перемешивания: последовательные блоки, первые `n % k` блоков на один элемент длиннее
pub fn k_fold(n_samples: usize, n_folds: usize) -> Result<Vec<Split>> {
    if n_folds < 2 {
        return Err(EnergyError::InvalidParameter(format!(
            "n_folds must be at least 2, got {}",
            n_folds
        )));
    }
    if n_samples < n_folds {
        return Err(EnergyError::InvalidParameter(format!(
            "cannot make {} folds from {} samples",
            n_folds, n_samples
        )));
    }

    let base = n_samples / n_folds;
    let extra = n_samples % n_folds;
    let mut splits = Vec::with_capacity(n_folds);
    let mut start = 0;

    for fold in 0..n_folds {
        let size = base + usize::from(fold < extra);
        let end = start + size;
        let test: Vec<usize> = (start..end).collect();
        let train: Vec<usize> = (0..start).chain(end..n_samples).collect();
        splits.push(Split { train, test });
        start = end;
    }

    Ok(splits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn split_is_deterministic_for_fixed_seed() {
        let a = train_test_split(100, 0.3, 194).unwrap();
        let b = train_test_split(100, 0.3, 194).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.test.len(), 30);
        assert_eq!(a.train.len(), 70);

        let c = train_test_split(100, 0.3, 7).unwrap();
        assert_ne!(a.test, c.test);
    }

    #[test]
    fn split_partitions_all_rows() {
        let split = train_test_split(57, 0.3, 1).unwrap();
        let all: HashSet<usize> = split.train.iter().chain(&split.test).copied().collect();
        assert_eq!(all.len(), 57);
        assert_eq!(split.train.len() + split.test.len(), 57);
    }

    #[test]
    fn train_test_selects_rows() {
        let X = Array2::from_shape_fn((6, 2), |(i, j)| (i * 10 + j) as f64);
        let y = Array1::from_iter((0..6).map(|i| i as f64));
        let split = Split {
            train: vec![0, 2, 4],
            test: vec![5, 1],
        };
        let data = TrainTest::from_split(&X, &y, &split);
        assert_eq!(data.y_test.to_vec(), vec![5.0, 1.0]);
        assert_eq!(data.X_test[[0, 1]], 51.0);
        assert_eq!(data.X_train.nrows(), 3);
    }

    #[test]
    fn rejects_invalid_test_size() {
        assert!(train_test_split(10, 0.0, 1).is_err());
        assert!(train_test_split(10, 1.0, 1).is_err());
    }

    #[test]
    fn k_fold_covers_every_sample_once() {
        let folds = k_fold(11, 5).unwrap();
        assert_eq!(folds.len(), 5);
        let sizes: Vec<usize> = folds.iter().map(|f| f.test.len()).collect();
        assert_eq!(sizes, vec![3, 2, 2, 2, 2]);

        let mut seen: Vec<usize> = folds.iter().flat_map(|f| f.test.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..11).collect::<Vec<_>>());
        for fold in &folds {
            assert_eq!(fold.train.len() + fold.test.len(), 11);
        }
    }
}
