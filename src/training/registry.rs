//! Registry of candidate algorithm families
//!
//! Registration order is meaningful: the selector breaks validation ties
//! in favour of the earlier entry.

use crate::error::{Result, VintnerError};
use crate::optimizer::SearchSpace;
use serde::{Deserialize, Serialize};

use super::decision_tree::DecisionTree;
use super::dummy::DummyClassifier;
use super::gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
use super::knn::{KNNClassifier, KNNConfig, WeightScheme};
use super::lightgbm::{LightGBMClassifier, LightGBMConfig};
use super::linear_models::LogisticRegression;
use super::models::{Capabilities, TrainedModel};
use super::params::{Hyperparameters, ParamValue};
use super::random_forest::{MaxFeatures, RandomForest};
use super::svm::{SVMClassifier, SVMConfig};
use super::xgboost::{XGBoostClassifier, XGBoostConfig};

/// Candidate tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    Baseline,
    Advanced,
}

/// Builds an unfitted model from hyperparameters and a seed
pub type ModelBuilder = fn(&Hyperparameters, u64) -> Result<TrainedModel>;

/// One registered algorithm family
#[derive(Debug, Clone)]
pub struct AlgorithmSpec {
    pub id: String,
    pub tier: Tier,
    pub capabilities: Capabilities,
    pub builder: ModelBuilder,
    pub search_space: Option<SearchSpace>,
    pub available: fn() -> bool,
}

impl AlgorithmSpec {
    pub fn new(id: impl Into<String>, tier: Tier, capabilities: Capabilities, builder: ModelBuilder) -> Self {
        Self {
            id: id.into(),
            tier,
            capabilities,
            builder,
            search_space: None,
            available: always_available,
        }
    }

    pub fn with_search_space(mut self, space: Option<SearchSpace>) -> Self {
        self.search_space = space;
        self
    }

    pub fn with_availability(mut self, available: fn() -> bool) -> Self {
        self.available = available;
        self
    }

    pub fn is_available(&self) -> bool {
        (self.available)()
    }

    /// Build an unfitted model
    pub fn build(&self, params: &Hyperparameters, seed: u64) -> Result<TrainedModel> {
        (self.builder)(params, seed)
    }
}

fn always_available() -> bool {
    true
}

fn xgboost_enabled() -> bool {
    cfg!(feature = "xgboost")
}

fn lightgbm_enabled() -> bool {
    cfg!(feature = "lightgbm")
}

const PROBA_ONLY: Capabilities = Capabilities {
    probabilities: true,
    feature_importances: false,
};

const PROBA_AND_IMPORTANCES: Capabilities = Capabilities {
    probabilities: true,
    feature_importances: true,
};

/// Ordered collection of algorithm families
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    specs: Vec<AlgorithmSpec>,
}

impl ModelRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self { specs: Vec::new() }
    }

    /// Baseline then advanced families with their registered search spaces;
    /// the optional boosters come last
    pub fn standard() -> Self {
        Self::new()
            .register(Self::dummy())
            .register(Self::logistic_regression())
            .register(Self::decision_tree())
            .register(Self::random_forest())
            .register(Self::gradient_boosting())
            .register(Self::svm())
            .register(Self::knn())
            .register(Self::xgboost())
            .register(Self::lightgbm())
    }

    /// Append a family; ids must be unique
    pub fn register(mut self, spec: AlgorithmSpec) -> Self {
        self.specs.retain(|s| s.id != spec.id);
        self.specs.push(spec);
        self
    }

    /// All families in registration order
    pub fn specs(&self) -> &[AlgorithmSpec] {
        &self.specs
    }

    pub fn get(&self, id: &str) -> Option<&AlgorithmSpec> {
        self.specs.iter().find(|s| s.id == id)
    }

    pub fn require(&self, id: &str) -> Result<&AlgorithmSpec> {
        self.get(id)
            .ok_or_else(|| VintnerError::ConfigError(format!("algorithm {} is not registered", id)))
    }

    /// Position of an id in registration order
    pub fn position(&self, id: &str) -> Option<usize> {
        self.specs.iter().position(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn dummy() -> AlgorithmSpec {
        AlgorithmSpec::new("DummyClassifier", Tier::Baseline, PROBA_ONLY, build_dummy)
    }

    pub fn logistic_regression() -> AlgorithmSpec {
        AlgorithmSpec::new("LogisticRegression", Tier::Baseline, PROBA_ONLY, build_logistic_regression)
    }

    pub fn decision_tree() -> AlgorithmSpec {
        AlgorithmSpec::new("DecisionTree", Tier::Baseline, PROBA_AND_IMPORTANCES, build_decision_tree)
    }

    pub fn random_forest() -> AlgorithmSpec {
        let space = SearchSpace::new()
            .choice("n_estimators", [100i64, 200, 300])
            .choice("max_depth", [Some(10i64), Some(20), None])
            .choice("min_samples_split", [2i64, 5, 10])
            .choice("min_samples_leaf", [1i64, 2, 4]);
        AlgorithmSpec::new("RandomForest", Tier::Advanced, PROBA_AND_IMPORTANCES, build_random_forest)
            .with_search_space(Some(space))
    }

    pub fn gradient_boosting() -> AlgorithmSpec {
        AlgorithmSpec::new("GradientBoosting", Tier::Advanced, PROBA_AND_IMPORTANCES, build_gradient_boosting)
    }

    pub fn xgboost() -> AlgorithmSpec {
        let space = SearchSpace::new()
            .choice("n_estimators", [100i64, 200, 300])
            .choice("max_depth", [3i64, 4, 5, 6])
            .choice("learning_rate", [0.01, 0.1, 0.2])
            .choice("subsample", [0.8, 0.9, 1.0])
            .choice("colsample_bytree", [0.8, 0.9, 1.0]);
        AlgorithmSpec::new("XGBoost", Tier::Advanced, PROBA_AND_IMPORTANCES, build_xgboost)
            .with_search_space(Some(space))
            .with_availability(xgboost_enabled)
    }

    pub fn lightgbm() -> AlgorithmSpec {
        let space = SearchSpace::new()
            .choice("n_estimators", [100i64, 200, 300])
            .choice("max_depth", [3i64, 5, 7])
            .choice("learning_rate", [0.01, 0.1, 0.2])
            .choice("num_leaves", [31i64, 50, 100]);
        AlgorithmSpec::new("LightGBM", Tier::Advanced, PROBA_AND_IMPORTANCES, build_lightgbm)
            .with_search_space(Some(space))
            .with_availability(lightgbm_enabled)
    }

    pub fn svm() -> AlgorithmSpec {
        AlgorithmSpec::new("SVM", Tier::Advanced, PROBA_ONLY, build_svm)
    }

    pub fn knn() -> AlgorithmSpec {
        let space = SearchSpace::new()
            .choice("n_neighbors", [3i64, 5, 7, 9, 11])
            .choice("weights", ["uniform", "distance"]);
        AlgorithmSpec::new("KNN", Tier::Advanced, PROBA_ONLY, build_knn).with_search_space(Some(space))
    }
}

fn build_dummy(_params: &Hyperparameters, _seed: u64) -> Result<TrainedModel> {
    Ok(TrainedModel::Dummy(DummyClassifier::new()))
}

fn build_logistic_regression(params: &Hyperparameters, _seed: u64) -> Result<TrainedModel> {
    let model = LogisticRegression::new()
        .with_alpha(params.get_f64("alpha", 0.01)?)
        .with_max_iter(params.get_usize("max_iter", 1000)?)
        .with_learning_rate(params.get_f64("learning_rate", 0.1)?);
    Ok(TrainedModel::LogisticRegression(model))
}

fn build_decision_tree(params: &Hyperparameters, seed: u64) -> Result<TrainedModel> {
    let tree = DecisionTree::new_classifier()
        .with_max_depth_opt(params.get_opt_usize("max_depth", None)?)
        .with_min_samples_split(params.get_usize("min_samples_split", 2)?)
        .with_min_samples_leaf(params.get_usize("min_samples_leaf", 1)?)
        .with_random_state(seed);
    Ok(TrainedModel::DecisionTree(tree))
}

fn build_random_forest(params: &Hyperparameters, seed: u64) -> Result<TrainedModel> {
    let n_estimators = params.get_usize("n_estimators", 100)?;
    if n_estimators == 0 {
        return Err(VintnerError::invalid_parameter("n_estimators", 0, "must be positive"));
    }
    let forest = RandomForest::new(n_estimators)
        .with_max_depth(params.get_opt_usize("max_depth", None)?)
        .with_min_samples_split(params.get_usize("min_samples_split", 2)?)
        .with_min_samples_leaf(params.get_usize("min_samples_leaf", 1)?)
        .with_max_features(MaxFeatures::Sqrt)
        .with_random_state(seed);
    Ok(TrainedModel::RandomForest(forest))
}

fn build_gradient_boosting(params: &Hyperparameters, seed: u64) -> Result<TrainedModel> {
    let config = GradientBoostingConfig {
        n_estimators: params.get_usize("n_estimators", 100)?,
        learning_rate: params.get_f64("learning_rate", 0.1)?,
        max_depth: params.get_usize("max_depth", 3)?,
        min_samples_leaf: params.get_usize("min_samples_leaf", 1)?,
        subsample: params.get_f64("subsample", 1.0)?,
        random_state: Some(seed),
    };
    Ok(TrainedModel::GradientBoosting(GradientBoostingClassifier::new(config)))
}

fn build_xgboost(params: &Hyperparameters, seed: u64) -> Result<TrainedModel> {
    let config = XGBoostConfig {
        n_estimators: params.get_usize("n_estimators", 100)?,
        learning_rate: params.get_f64("learning_rate", 0.3)?,
        max_depth: params.get_usize("max_depth", 6)?,
        subsample: params.get_f64("subsample", 1.0)?,
        colsample_bytree: params.get_f64("colsample_bytree", 1.0)?,
        random_state: Some(seed),
        ..Default::default()
    };
    Ok(TrainedModel::XGBoost(XGBoostClassifier::new(config)))
}

fn build_lightgbm(params: &Hyperparameters, seed: u64) -> Result<TrainedModel> {
    let config = LightGBMConfig {
        n_estimators: params.get_usize("n_estimators", 100)?,
        learning_rate: params.get_f64("learning_rate", 0.1)?,
        max_depth: params.get_opt_usize("max_depth", None)?,
        num_leaves: params.get_usize("num_leaves", 31)?,
        random_state: Some(seed),
        ..Default::default()
    };
    Ok(TrainedModel::LightGBM(LightGBMClassifier::new(config)))
}

fn build_svm(params: &Hyperparameters, seed: u64) -> Result<TrainedModel> {
    let probability = match params.get("probability") {
        None => true,
        Some(ParamValue::Int(v)) => *v != 0,
        Some(other) => return Err(VintnerError::invalid_parameter("probability", other, "expected 0 or 1")),
    };
    let config = SVMConfig {
        c: params.get_f64("C", 1.0)?,
        probability,
        random_state: Some(seed),
        ..Default::default()
    };
    Ok(TrainedModel::SVM(SVMClassifier::new(config)))
}

fn build_knn(params: &Hyperparameters, _seed: u64) -> Result<TrainedModel> {
    let config = KNNConfig {
        n_neighbors: params.get_usize("n_neighbors", 5)?,
        weights: WeightScheme::parse(params.get_str("weights", "uniform")?)?,
        ..Default::default()
    };
    Ok(TrainedModel::KNN(KNNClassifier::new(config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registration_order() {
        let registry = ModelRegistry::standard();
        let ids: Vec<&str> = registry.specs().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "DummyClassifier",
                "LogisticRegression",
                "DecisionTree",
                "RandomForest",
                "GradientBoosting",
                "SVM",
                "KNN",
                "XGBoost",
                "LightGBM"
            ]
        );
        assert_eq!(registry.get("DecisionTree").unwrap().tier, Tier::Baseline);
        assert_eq!(registry.get("KNN").unwrap().tier, Tier::Advanced);
    }

    #[test]
    fn test_registered_spaces() {
        let registry = ModelRegistry::standard();
        assert_eq!(registry.get("RandomForest").unwrap().search_space.as_ref().unwrap().n_combinations(), 81);
        assert_eq!(registry.get("XGBoost").unwrap().search_space.as_ref().unwrap().n_combinations(), 324);
        assert_eq!(registry.get("LightGBM").unwrap().search_space.as_ref().unwrap().n_combinations(), 81);
        assert_eq!(registry.get("KNN").unwrap().search_space.as_ref().unwrap().n_combinations(), 10);
        assert!(registry.get("SVM").unwrap().search_space.is_none());
        assert!(registry.get("GradientBoosting").unwrap().search_space.is_none());
    }

    #[test]
    fn test_optional_boosters_follow_features() {
        let registry = ModelRegistry::standard();
        assert_eq!(registry.get("XGBoost").unwrap().is_available(), cfg!(feature = "xgboost"));
        assert_eq!(registry.get("LightGBM").unwrap().is_available(), cfg!(feature = "lightgbm"));
        assert!(registry.get("GradientBoosting").unwrap().is_available());
        assert!(registry.get("SVM").unwrap().is_available());
    }

    #[test]
    fn test_booster_builders_read_grid_params() {
        let params = Hyperparameters::new()
            .with("n_estimators", 200i64)
            .with("max_depth", 4i64)
            .with("colsample_bytree", 0.8);
        match ModelRegistry::xgboost().build(&params, 3).unwrap() {
            TrainedModel::XGBoost(m) => {
                assert_eq!(m.config().n_estimators, 200);
                assert_eq!(m.config().max_depth, 4);
                assert_eq!(m.config().colsample_bytree, 0.8);
                assert_eq!(m.config().random_state, Some(3));
            }
            other => panic!("unexpected model {}", other.model_type()),
        }

        let params = Hyperparameters::new().with("num_leaves", 50i64).with("max_depth", 7i64);
        match ModelRegistry::lightgbm().build(&params, 0).unwrap() {
            TrainedModel::LightGBM(m) => {
                assert_eq!(m.config().num_leaves, 50);
                assert_eq!(m.config().max_depth, Some(7));
            }
            other => panic!("unexpected model {}", other.model_type()),
        }
    }

    #[test]
    fn test_builders_honour_params() {
        let params = Hyperparameters::new().with("n_neighbors", 7i64).with("weights", "distance");
        match ModelRegistry::knn().build(&params, 0).unwrap() {
            TrainedModel::KNN(knn) => {
                assert_eq!(knn.config().n_neighbors, 7);
                assert_eq!(knn.config().weights, WeightScheme::Distance);
            }
            other => panic!("unexpected model {}", other.model_type()),
        }

        let bad = Hyperparameters::new().with("weights", "gaussian");
        assert!(ModelRegistry::knn().build(&bad, 0).is_err());
    }

    #[test]
    fn test_register_replaces_same_id() {
        let registry = ModelRegistry::new()
            .register(ModelRegistry::dummy())
            .register(ModelRegistry::knn())
            .register(ModelRegistry::dummy());
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.position("DummyClassifier"), Some(1));
        assert!(registry.require("SVM").is_err());
    }

    #[test]
    fn test_declared_capabilities_match_models() {
        let registry = ModelRegistry::standard();
        for spec in registry.specs() {
            let model = spec.build(&Hyperparameters::new(), 0).unwrap();
            assert_eq!(model.capabilities(), spec.capabilities, "{}", spec.id);
        }
    }
}
