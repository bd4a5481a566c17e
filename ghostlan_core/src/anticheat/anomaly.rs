//! Unsupervised outlier scoring over behaviour features.
//!
//! The engine only talks to [`AnomalyDetector`], so the model can be swapped
//! or stubbed. The default model is an isolation forest: outliers are
//! separated by random axis-aligned cuts in fewer steps than inliers.
//!
//! ```text
//! s(x) = 2^(-E[h(x)] / c(n))
//! c(n) = 2 * H(n - 1) - 2 * (n - 1) / n
//! ```

use nalgebra::Vector6;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

/// `[acc_mean, acc_std, acc_max, speed_mean, speed_std, speed_max]`
pub type FeatureVector = Vector6<f64>;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Model evaluation failures. Never fatal to a match.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Model has not been fitted")]
    NotFitted,

    #[error("Need at least {needed} samples to fit, got {got}")]
    InsufficientSamples { needed: usize, got: usize },

    #[error("Feature {0} is not finite")]
    NonFiniteFeature(usize),
}

/// Result of scoring one feature vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnomalyVerdict {
    pub is_anomaly: bool,

    /// Model-specific outlier score (higher = more anomalous)
    pub score: f64,
}

/// Pluggable outlier model.
pub trait AnomalyDetector: Send {
    /// (Re)trains the model on the observations seen so far.
    fn fit(&mut self, samples: &[FeatureVector]) -> Result<(), DetectorError>;

    /// Scores one observation against the fitted model.
    fn score(&self, sample: &FeatureVector) -> Result<AnomalyVerdict, DetectorError>;

    /// Returns the name of this model.
    fn name(&self) -> &str;
}

fn check_finite(sample: &FeatureVector) -> Result<(), DetectorError> {
    match sample.iter().position(|v| !v.is_finite()) {
        Some(i) => Err(DetectorError::NonFiniteFeature(i)),
        None => Ok(()),
    }
}

/// Average path length of an unsuccessful BST search over `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Isolation forest hyper-parameters.
#[derive(Debug, Clone)]
pub struct IsolationForestConfig {
    /// Number of trees
    pub n_trees: usize,

    /// Sub-sample size per tree (capped by the training set)
    pub max_samples: usize,

    /// Expected share of outliers in the training data
    pub contamination: f64,

    /// Seed for sub-sampling and cuts
    pub seed: u64,
}

impl Default for IsolationForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_samples: 256,
            contamination: 0.1,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn build(points: &[FeatureVector], depth: usize, limit: usize, rng: &mut ChaCha8Rng) -> Node {
        if depth >= limit || points.len() <= 1 {
            return Node::Leaf { size: points.len() };
        }

        // Only features that still vary can separate anything
        let candidates: Vec<(usize, f64, f64)> = (0..6)
            .filter_map(|f| {
                let (lo, hi) = points.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                    (lo.min(p[f]), hi.max(p[f]))
                });
                (lo < hi).then_some((f, lo, hi))
            })
            .collect();

        if candidates.is_empty() {
            return Node::Leaf { size: points.len() };
        }

        let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
        let value = rng.gen_range(lo..hi);
        let (left, right): (Vec<FeatureVector>, Vec<FeatureVector>) =
            points.iter().partition(|p| p[feature] < value);

        Node::Split {
            feature,
            value,
            left: Box::new(Node::build(&left, depth + 1, limit, rng)),
            right: Box::new(Node::build(&right, depth + 1, limit, rng)),
        }
    }

    fn path_length(&self, x: &FeatureVector, depth: usize) -> f64 {
        match self {
            Node::Leaf { size } => depth as f64 + average_path_length(*size),
            Node::Split { feature, value, left, right } => {
                if x[*feature] < *value {
                    left.path_length(x, depth + 1)
                } else {
                    right.path_length(x, depth + 1)
                }
            }
        }
    }
}

/// Isolation forest outlier model.
pub struct IsolationForest {
    config: IsolationForestConfig,
    trees: Vec<Node>,
    sample_size: usize,

    /// Score above which an observation counts as anomalous
    threshold: Option<f64>,
}

impl IsolationForest {
    pub fn new(config: IsolationForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            sample_size: 0,
            threshold: None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.threshold.is_some()
    }

    fn raw_score(&self, x: &FeatureVector) -> f64 {
        let mean_path = self.trees.iter().map(|t| t.path_length(x, 0)).sum::<f64>()
            / self.trees.len() as f64;
        2f64.powf(-mean_path / average_path_length(self.sample_size))
    }
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::new(IsolationForestConfig::default())
    }
}

impl AnomalyDetector for IsolationForest {
    fn fit(&mut self, samples: &[FeatureVector]) -> Result<(), DetectorError> {
        if samples.len() < 2 {
            return Err(DetectorError::InsufficientSamples {
                needed: 2,
                got: samples.len(),
            });
        }
        for s in samples {
            check_finite(s)?;
        }

        // Refits are reproducible for the same training set
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        self.sample_size = self.config.max_samples.min(samples.len()).max(2);
        let limit = (self.sample_size as f64).log2().ceil() as usize;

        self.trees = (0..self.config.n_trees.max(1))
            .map(|_| {
                let subset: Vec<FeatureVector> = sample(&mut rng, samples.len(), self.sample_size)
                    .into_iter()
                    .map(|i| samples[i])
                    .collect();
                Node::build(&subset, 0, limit, &mut rng)
            })
            .collect();

        let mut scores: Vec<f64> = samples.iter().map(|s| self.raw_score(s)).collect();
        scores.sort_by(|a, b| a.total_cmp(b));
        let quantile = (1.0 - self.config.contamination).clamp(0.0, 1.0);
        let idx = ((quantile * scores.len() as f64).ceil() as usize)
            .saturating_sub(1)
            .min(scores.len() - 1);
        self.threshold = Some(scores[idx]);

        Ok(())
    }

    fn score(&self, sample: &FeatureVector) -> Result<AnomalyVerdict, DetectorError> {
        let threshold = self.threshold.ok_or(DetectorError::NotFitted)?;
        check_finite(sample)?;

        let score = self.raw_score(sample);
        Ok(AnomalyVerdict {
            is_anomaly: score > threshold,
            score,
        })
    }

    fn name(&self) -> &str {
        "IsolationForest"
    }
}
