use std::time::Duration;

use log::error;

use super::classifier::Classifier;
use super::types::{AnalysisInput, AnalysisResult};

const UNKNOWN_ERROR: &str = "An unknown error occurred.";

/// Sends one frame to the classifier and folds every failure into
/// [`AnalysisResult::Failure`]. Never returns an error to the caller.
pub async fn analyze_behavior(
    classifier: &dyn Classifier,
    input: AnalysisInput,
    timeout: Duration,
) -> AnalysisResult {
    match tokio::time::timeout(timeout, classifier.classify(&input)).await {
        Ok(Ok(output)) => AnalysisResult::Success(output),
        Ok(Err(err)) => {
            error!("Error analyzing behavior via {}: {err:?}", classifier.name());
            let message = err.to_string();
            let message = if message.trim().is_empty() {
                UNKNOWN_ERROR.to_string()
            } else {
                message
            };
            AnalysisResult::Failure(format!("Analysis failed: {message}"))
        }
        Err(_) => {
            error!(
                "Error analyzing behavior via {}: no response within {}s",
                classifier.name(),
                timeout.as_secs()
            );
            AnalysisResult::Failure(format!(
                "Analysis failed: timed out after {}s",
                timeout.as_secs()
            ))
        }
    }
}
