#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("invalid module name {0:?}")]
    InvalidModuleName(String),
    #[error("file {file:?} does not declare {name:?}")]
    MissingExport { file: String, name: String },
    #[error("file {file:?} exports builtins with non-string names")]
    NonStringExportName { file: String },
    #[error("file {label:?} does not exist")]
    FileDoesNotExist { label: String },
    #[error("global {0:?} does not exist")]
    GlobalDoesNotExist(String),
    #[error("parse error in {label:?}: {message}")]
    Parse { label: String, message: String },
    #[error("interpreter error in {label:?}: {backtrace}")]
    Interpreter { label: String, backtrace: String },
}

impl From<LoaderError> for skybuild_evaluator::EvalError {
    fn from(err: LoaderError) -> Self {
        match err {
            LoaderError::Parse { label, message } => {
                skybuild_evaluator::EvalError::InterpreterError(format!("{}: {}", label, message))
            }
            LoaderError::Interpreter { label, backtrace } => {
                skybuild_evaluator::EvalError::InterpreterError(format!("{}: {}", label, backtrace))
            }
            LoaderError::FileDoesNotExist { label } => skybuild_evaluator::EvalError::NotFound(label),
            LoaderError::GlobalDoesNotExist(name) => skybuild_evaluator::EvalError::NotFound(name),
            other => skybuild_evaluator::EvalError::SemanticError(other.to_string()),
        }
    }
}
