//! Model training module
//!
//! Five interchangeable binary classifiers behind the [`Classifier`] trait:
//! - Random Forest
//! - Gradient boosted trees
//! - Support Vector Machine (probabilities via Platt scaling)
//! - Logistic Regression
//! - Neural network (MLP)
//!
//! [`TrainEngine`] standardizes the training rows and fits the configured
//! variant, returning a [`FittedModel`] that scores raw factor vectors.

mod config;
mod engine;
mod models;
pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod linear_models;
pub mod neural_network;
pub mod random_forest;
pub mod svm;

pub use config::{ClassifierKind, Hyperparameters, TrainingConfig};
pub use cross_validation::{CVResults, CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use engine::{FittedModel, TrainEngine, TrainedModel};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use linear_models::LogisticRegression;
pub use models::{Classifier, DECISION_THRESHOLD};
pub use neural_network::{Activation, MLPClassifier, MLPConfig};
pub use random_forest::RandomForest;
pub use svm::{KernelType, SVMClassifier, SVMConfig};

pub(crate) use engine::fit_rows;
pub(crate) use models::sigmoid;
