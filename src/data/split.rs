//! Stratified train/validation/test partitioning

use super::Dataset;
use crate::error::{VintnerError, Result};
use crate::training::TrainingConfig;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use tracing::debug;

/// Minimum members a class needs to appear on both sides of a holdout
const MIN_CLASS_MEMBERS: usize = 2;

/// Three disjoint, exhaustive partitions of a dataset. Immutable once built.
#[derive(Debug, Clone)]
pub struct Split {
    train: Dataset,
    validation: Dataset,
    test: Dataset,
    train_indices: Vec<usize>,
    validation_indices: Vec<usize>,
    test_indices: Vec<usize>,
}

impl Split {
    pub fn train(&self) -> &Dataset {
        &self.train
    }

    pub fn validation(&self) -> &Dataset {
        &self.validation
    }

    pub fn test(&self) -> &Dataset {
        &self.test
    }

    /// Row indices into the source dataset, ascending
    pub fn train_indices(&self) -> &[usize] {
        &self.train_indices
    }

    pub fn validation_indices(&self) -> &[usize] {
        &self.validation_indices
    }

    pub fn test_indices(&self) -> &[usize] {
        &self.test_indices
    }
}

/// Two-stage stratified splitter: {train+validation} vs test, then train vs validation
#[derive(Debug, Clone)]
pub struct StratifiedSplitter {
    test_size: f64,
    validation_size: f64,
    random_state: u64,
}

impl Default for StratifiedSplitter {
    fn default() -> Self {
        Self::new(0.15, 0.15)
    }
}

impl StratifiedSplitter {
    /// Fractions are relative to the full dataset
    pub fn new(test_size: f64, validation_size: f64) -> Self {
        Self {
            test_size,
            validation_size,
            random_state: 42,
        }
    }

    pub fn from_config(config: &TrainingConfig) -> Self {
        Self::new(config.test_size, config.validation_size).with_random_state(config.random_state)
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Partition `dataset` into train/validation/test
    pub fn split(&self, dataset: &Dataset) -> Result<Split> {
        if self.test_size <= 0.0 || self.validation_size <= 0.0 || self.test_size + self.validation_size >= 1.0 {
            return Err(VintnerError::ConfigError(format!(
                "invalid split fractions: test={}, validation={}",
                self.test_size, self.validation_size
            )));
        }

        let labels: Vec<i64> = dataset.y().iter().map(|&v| v as i64).collect();

        // Stage 1: hold out the test partition
        let (rest_pos, test_pos) = stratified_holdout(&labels, self.test_size, self.random_state)?;

        // Stage 2: carve validation out of the remainder
        let rest_labels: Vec<i64> = rest_pos.iter().map(|&i| labels[i]).collect();
        let relative_val = self.validation_size / (1.0 - self.test_size);
        let (train_rel, val_rel) = stratified_holdout(&rest_labels, relative_val, self.random_state)?;

        let train_indices: Vec<usize> = train_rel.iter().map(|&i| rest_pos[i]).collect();
        let validation_indices: Vec<usize> = val_rel.iter().map(|&i| rest_pos[i]).collect();

        debug!(
            train = train_indices.len(),
            validation = validation_indices.len(),
            test = test_pos.len(),
            "Stratified split computed"
        );

        Ok(Split {
            train: dataset.select(&train_indices),
            validation: dataset.select(&validation_indices),
            test: dataset.select(&test_pos),
            train_indices,
            validation_indices,
            test_indices: test_pos,
        })
    }
}

/// Split positions `0..labels.len()` into (kept, held) with `held` ≈ `fraction`
/// of the rows and per-class proportions preserved.
///
/// Both returned lists are ascending.
pub(crate) fn stratified_holdout(labels: &[i64], fraction: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    let n = labels.len();
    let mut by_class: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (pos, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(pos);
    }

    if let Some((&class, members)) = by_class.iter().find(|(_, m)| m.len() < MIN_CLASS_MEMBERS) {
        return Err(VintnerError::DataInsufficient {
            class,
            count: members.len(),
            reason: format!("at least {} members are required to stratify", MIN_CLASS_MEMBERS),
        });
    }

    // Guard against 0.15 / 0.85 * 17 = 3.0000000000000004 rounding up to 4
    let n_held = ((fraction * n as f64) - 1e-9).ceil().max(0.0) as usize;
    let n_kept = n - n_held.min(n);
    let n_classes = by_class.len();
    if n_classes == 0 {
        return Err(VintnerError::DataError("cannot split an empty dataset".to_string()));
    }
    if n_held < n_classes || n_kept < n_classes {
        return Err(VintnerError::SplitTooSmall {
            held: n_held,
            kept: n_kept,
            classes: n_classes,
        });
    }

    let counts: Vec<usize> = by_class.values().map(|m| m.len()).collect();
    let allocation = allocate_proportionally(&counts, n_held, n);

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut kept = Vec::with_capacity(n_kept);
    let mut held = Vec::with_capacity(n_held);
    for (members, &take) in by_class.values().zip(allocation.iter()) {
        let mut shuffled = members.clone();
        shuffled.shuffle(&mut rng);
        held.extend_from_slice(&shuffled[..take]);
        kept.extend_from_slice(&shuffled[take..]);
    }

    kept.sort_unstable();
    held.sort_unstable();
    Ok((kept, held))
}

/// Largest-remainder allocation of `total` draws over classes, each capped at
/// `count - 1` so every class keeps at least one member on the other side.
fn allocate_proportionally(counts: &[usize], total: usize, n: usize) -> Vec<usize> {
    let exact: Vec<f64> = counts.iter().map(|&c| c as f64 * total as f64 / n as f64).collect();
    let caps: Vec<usize> = counts.iter().map(|&c| c.saturating_sub(1)).collect();
    let mut alloc: Vec<usize> = exact
        .iter()
        .zip(caps.iter())
        .map(|(&e, &cap)| (e.floor() as usize).min(cap))
        .collect();

    // Order by descending remainder, ties by class position (ascending label)
    let mut order: Vec<usize> = (0..counts.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = exact[a] - alloc[a] as f64;
        let rb = exact[b] - alloc[b] as f64;
        rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal).then(a.cmp(&b))
    });

    let mut remaining = total.saturating_sub(alloc.iter().sum());
    while remaining > 0 {
        let mut progressed = false;
        for &k in &order {
            if remaining == 0 {
                break;
            }
            if alloc[k] < caps[k] {
                alloc[k] += 1;
                remaining -= 1;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }
    alloc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::synthetic;

    #[test]
    fn test_split_is_deterministic() {
        let ds = synthetic(&[3, 5, 6, 7], 25);
        let splitter = StratifiedSplitter::default().with_random_state(7);
        let a = splitter.split(&ds).unwrap();
        let b = splitter.split(&ds).unwrap();
        assert_eq!(a.train_indices(), b.train_indices());
        assert_eq!(a.validation_indices(), b.validation_indices());
        assert_eq!(a.test_indices(), b.test_indices());
        assert_eq!(a.train().x(), b.train().x());
    }

    #[test]
    fn test_partitions_disjoint_and_exhaustive() {
        let ds = synthetic(&[4, 5, 6], 30);
        let split = StratifiedSplitter::default().split(&ds).unwrap();
        let mut all: Vec<usize> = split
            .train_indices()
            .iter()
            .chain(split.validation_indices())
            .chain(split.test_indices())
            .copied()
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..ds.n_samples()).collect::<Vec<_>>());
    }

    #[test]
    fn test_proportions_roughly_70_15_15() {
        let ds = synthetic(&[5, 6], 100);
        let split = StratifiedSplitter::default().split(&ds).unwrap();
        assert_eq!(split.test().n_samples(), 30);
        assert_eq!(split.validation().n_samples(), 30);
        assert_eq!(split.train().n_samples(), 140);
    }

    #[test]
    fn test_class_frequencies_preserved() {
        // Imbalanced: 120 / 60 / 20
        let mut ds = synthetic(&[5], 120);
        ds = ds.concat(&synthetic(&[6], 60)).unwrap();
        ds = ds.concat(&synthetic(&[7], 20)).unwrap();
        let full = ds.class_counts();
        let n = ds.n_samples() as f64;

        let split = StratifiedSplitter::default().split(&ds).unwrap();
        for part in [split.train(), split.validation(), split.test()] {
            let counts = part.class_counts();
            let m = part.n_samples() as f64;
            for (class, &total) in &full {
                let expected = total as f64 / n;
                let got = counts.get(class).copied().unwrap_or(0) as f64 / m;
                assert!((expected - got).abs() < 0.05, "class {} drifted: {} vs {}", class, expected, got);
            }
        }
    }

    #[test]
    fn test_singleton_class_fails() {
        let ds = synthetic(&[5, 6], 10).concat(&synthetic(&[9], 1)).unwrap();
        let err = StratifiedSplitter::default().split(&ds).unwrap_err();
        match err {
            VintnerError::DataInsufficient { class, count, .. } => {
                assert_eq!(class, 9);
                assert_eq!(count, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_small_partition_reports_sizes() {
        // Every class has two members, but a 2-row holdout cannot cover four classes
        let ds = synthetic(&[3, 4, 5, 6], 2);
        let err = StratifiedSplitter::default().split(&ds).unwrap_err();
        match err {
            VintnerError::SplitTooSmall { held, kept, classes } => {
                assert_eq!((held, kept, classes), (2, 6, 4));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_twenty_rows_three_classes() {
        let ds = synthetic(&[4, 5, 6], 7).select(&(0..20).collect::<Vec<_>>());
        let split = StratifiedSplitter::default().split(&ds).unwrap();
        assert_eq!(split.test().n_samples(), 3);
        assert_eq!(split.validation().n_samples(), 3);
        assert_eq!(split.train().n_samples(), 14);
        assert_eq!(split.test().classes(), vec![4, 5, 6]);
        assert_eq!(split.validation().classes(), vec![4, 5, 6]);
    }

    #[test]
    fn test_allocation_respects_caps() {
        let alloc = allocate_proportionally(&[2, 2, 16], 10, 20);
        assert_eq!(alloc.iter().sum::<usize>(), 10);
        assert!(alloc[0] <= 1 && alloc[1] <= 1);
    }
}
