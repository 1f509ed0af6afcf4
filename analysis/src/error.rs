use skybuild_evaluator::EvalError;

use crate::extensions::ExtensionError;
use crate::filetree::PathResolutionError;
use crate::platforms::PlatformError;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    PathResolution(#[from] PathResolutionError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error(transparent)]
    Extension(#[from] ExtensionError),
    #[error("{0}")]
    Label(String),
}

impl From<AnalysisError> for EvalError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::PathResolution(PathResolutionError::NotFound) => {
                EvalError::NotFound("path not found".to_string())
            }
            AnalysisError::PathResolution(PathResolutionError::Transport(message)) => EvalError::Transport(message),
            AnalysisError::PathResolution(other) => EvalError::InvalidInput(other.to_string()),
            AnalysisError::Platform(other) => EvalError::SemanticError(other.to_string()),
            AnalysisError::Extension(other) => EvalError::SemanticError(other.to_string()),
            AnalysisError::Label(message) => EvalError::InvalidInput(message),
        }
    }
}
