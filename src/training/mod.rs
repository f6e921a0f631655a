//! Model training and selection
//!
//! Binary classifiers (labels 0 and 1) from five families, cross-validated
//! grid search over each family's hyperparameters, and a selector that
//! keeps the family with the best held-out accuracy.

pub mod adaboost;
pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod linear_models;
pub mod metrics;
pub mod random_forest;
mod estimator;
mod models;
mod search;
mod selector;

pub use adaboost::AdaBoostClassifier;
pub use cross_validation::{CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use estimator::InferenceModel;
pub use gradient_boosting::{BoostingLoss, GradientBoostingClassifier, GradientBoostingConfig};
pub use linear_models::{LogisticRegression, Penalty};
pub use metrics::ClassificationMetrics;
pub use models::{Classifier, Hyperparams, ModelKind};
pub use random_forest::{MaxFeatures, RandomForest};
pub use search::{ConfigScore, GridSearch, SearchResult};
pub use selector::{pick_best, CandidateScore, ModelSelector, SelectedModel};
