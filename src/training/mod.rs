//! Candidate training
//!
//! Provides the classifier families compared by the pipeline:
//! - Baseline tier: majority-class dummy, multinomial logistic regression, CART
//! - Advanced tier: random forest, gradient boosting, SVM, k-nearest neighbors,
//!   and the optional XGBoost-style and LightGBM-style boosters
//!
//! plus the registry, stratified cross-validation, candidate scoring and
//! validation-driven selection.

mod config;
mod models;
mod params;
pub mod dummy;
pub mod linear_models;
pub mod decision_tree;
pub mod random_forest;
pub mod gradient_boosting;
pub mod xgboost;
pub mod lightgbm;
pub mod svm;
pub mod knn;
pub mod cross_validation;
pub mod registry;
pub mod candidates;
pub mod selector;

pub use config::TrainingConfig;
pub use models::{accuracy, Capabilities, TrainedModel};
pub use params::{Hyperparameters, ParamValue};
pub use dummy::DummyClassifier;
pub use linear_models::LogisticRegression;
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use random_forest::{MaxFeatures, RandomForest};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use xgboost::{XGBoostClassifier, XGBoostConfig};
pub use lightgbm::{LightGBMClassifier, LightGBMConfig};
pub use svm::{KernelType, SVMClassifier, SVMConfig};
pub use knn::{KNNClassifier, KNNConfig, WeightScheme};
pub use cross_validation::{cross_val_accuracy, CVResults, CVSplit, CrossValidator};
pub use registry::{AlgorithmSpec, ModelBuilder, ModelRegistry, Tier};
pub use candidates::{CandidateMetrics, CandidateModel, CandidateReport, CandidateTrainer};
pub use selector::{best_index, select_best};
