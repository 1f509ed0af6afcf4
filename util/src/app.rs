use std::fmt::Debug;
use std::sync::Arc;

use crate::sandbox::FilePool;
use anyhow::{Context, Result};

#[must_use = "The exit code for the application should be returned and bubbled up to `main` so that it can be passed to `std::process::exit`."]
#[derive(Debug, PartialEq, Eq)]
pub struct ExitCode(pub i32);

/// Process-wide context shared by every evaluator worker: a scoped pool of
/// temporary storage for intermediate build artifacts.
#[derive(Clone)]
pub struct App {
    file_pool: Arc<FilePool>,
}

impl Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App").finish()
    }
}

impl App {
    pub fn new_for_testing() -> Result<Self> {
        Self::new(false, None)
    }

    pub fn new(preserve_pool_contents: bool, with_name_prefix: Option<&str>) -> Result<Self> {
        let file_pool = Arc::new(
            FilePool::new(preserve_pool_contents, with_name_prefix)
                .context("failed to create file pool")?,
        );
        Ok(Self { file_pool })
    }

    /// Get a reference to the app's scoped file pool.
    pub fn file_pool(&self) -> Arc<FilePool> {
        self.file_pool.clone()
    }
}
