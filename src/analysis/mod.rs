pub mod classifier;
pub mod client;
pub mod types;

pub use classifier::{Classifier, ClassifierError, FlowClassifier};
pub use client::analyze_behavior;
pub use types::{AnalysisInput, AnalysisOutput, AnalysisResult};
