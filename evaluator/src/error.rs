/// The error kinds the evaluator and its computations distinguish.
/// `MissingDependency` is the one non-terminal kind: the scheduler treats
/// it as a signal to retry the key once its recorded dependencies are
/// available, never as a failure propagated to requesters.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EvalError {
    /// Sentinel: at least one dependency was not yet `Completed`. A
    /// computation returns this directly once it has finished calling
    /// [`crate::engine::Environment::get`] for every dependency it needs on
    /// this attempt, so the engine sees the full fanout and can resolve
    /// every miss before retrying instead of one at a time.
    #[error("missing dependency")]
    MissingDependency,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("decode error: {0}")]
    DecodeError(String),
    #[error("interpreter error: {0}")]
    InterpreterError(String),
    #[error("semantic error: {0}")]
    SemanticError(String),
    #[error("dependency cycle: {0:?}")]
    DependencyCycle(Vec<String>),
    #[error("transport error: {0}")]
    Transport(String),
}

impl EvalError {
    pub fn is_missing_dependency(&self) -> bool {
        matches!(self, EvalError::MissingDependency)
    }
}
