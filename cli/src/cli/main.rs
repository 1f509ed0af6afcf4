use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;

use skybuild_analysis::{AnalysisEngine, BuildSpecificationValue, DirectoryAccessParametersValue, Key, Value};
use skybuild_evaluator::{Engine, Environment, EvalError};
use skybuild_labels::{CanonicalRepoName, ModuleInstance, ParsedModuleDotBazel};
use skybuild_tracing::{init_tracing, TracingOpts};
use skybuild_util::app::App;
use skybuild_util::paths::expand_tilde;
use starlark::environment::GlobalsBuilder;

mod filesystem;
mod module_file;

use filesystem::scan_directory_tree;
use module_file::parse_module_dot_bazel;

#[derive(Parser, Debug)]
enum Subcommand {
    /// Analyze and build the requested targets out of a checked-out repo.
    Build {
        /// Labels or patterns naming the targets to build.
        targets: Vec<String>,

        /// The root of the checkout to read `BUILD`/`MODULE.bazel`/`.bzl`
        /// files from.
        #[clap(long, default_value = ".")]
        repo: PathBuf,
    },
}

#[derive(Parser, Debug)]
#[clap(about = "A demand-driven build orchestrator")]
struct Opts {
    /// Disable textual user interface; happens by default on non-interactive terminals.
    #[clap(long, global = true)]
    ugly: bool,

    /// Change to the provided directory before doing anything else.
    #[clap(short = 'C', long = "work-dir", global = true)]
    working_directory: Option<PathBuf>,

    #[clap(subcommand)]
    cmd: Subcommand,
}

/// The sole module instance this demo driver can resolve `MODULE.bazel`
/// statements for: the root of the checkout it was pointed at. A
/// dependency module named by `bazel_dep` has no registry to fetch from
/// here, so it's treated as present with no statements of its own — real
/// module resolution needs a lockfile/registry client this crate
/// doesn't implement.
fn root_module() -> ModuleInstance {
    ModuleInstance::new("root", None)
}

fn fetch_module_dot_bazel(
    instance: &ModuleInstance,
    env: &Environment<'_, Key, Value>,
) -> Result<Option<ParsedModuleDotBazel>, EvalError> {
    if *instance != root_module() {
        return Ok(Some(ParsedModuleDotBazel::default()));
    }
    let repo = CanonicalRepoName::root();
    let path = "MODULE.bazel".to_string();
    let Some(Value::FileProperties(file_ref)) = env.get(Key::FileProperties {
        repo: repo.clone(),
        path: path.clone(),
    }) else {
        return Err(EvalError::MissingDependency);
    };
    if file_ref.is_none() {
        return Ok(Some(ParsedModuleDotBazel::default()));
    }
    let Some(Value::FileReader(bytes)) = env.get(Key::FileReader { repo, path }) else {
        return Err(EvalError::MissingDependency);
    };
    let source = std::str::from_utf8(&bytes).map_err(|e| EvalError::DecodeError(e.to_string()))?;
    Ok(Some(parse_module_dot_bazel(source)))
}

fn run_build(repo: PathBuf, targets: Vec<String>, _app: Arc<App>) -> Result<()> {
    let repo = expand_tilde(repo).context("expanding repo path")?;
    let (root, directory_fetcher) = scan_directory_tree(&repo)?;

    let reader_root = repo.clone();
    let file_reader = move |_repo: &CanonicalRepoName, path: &str| -> Result<Vec<u8>, EvalError> {
        std::fs::read(reader_root.join(path)).map_err(|e| EvalError::NotFound(format!("{}: {}", path, e)))
    };

    let engine_values = AnalysisEngine {
        directory_fetcher,
        file_reader,
        module_dot_bazel_fetcher: fetch_module_dot_bazel,
        build_specification: BuildSpecificationValue { target_patterns: targets },
        directory_access_parameters: DirectoryAccessParametersValue { root },
        builtins_module_names: vec!["core".to_string()],
        root_module: root_module(),
        starlark_globals: GlobalsBuilder::standard().build(),
    };

    let engine: Engine<Key, Value> = Engine::new();
    let result = engine
        .evaluate(Key::BuildResult, &engine_values)
        .map_err(|e| anyhow::anyhow!("build failed: {}", e))?;
    let Value::BuildResult(result) = result else {
        bail!("evaluator returned an unexpected value kind for the build result");
    };

    tracing::info!(
        succeeded = result.succeeded_targets,
        failed = result.failed_targets,
        "build complete"
    );
    println!("{} succeeded, {} failed", result.succeeded_targets, result.failed_targets);

    if result.failed_targets > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn run_subcommand(app: Arc<App>, cmd: Subcommand) -> Result<()> {
    match cmd {
        Subcommand::Build { targets, repo } => run_build(repo, targets, app),
    }
}

fn main() -> Result<()> {
    let started_at = Instant::now();
    let options = Opts::parse();
    if let Some(working_directory) = &options.working_directory {
        std::env::set_current_dir(working_directory).context("switching working directory")?;
    }

    let interactive = !options.ugly && termion::is_tty(&std::io::stdout());
    let _tracing_guard = init_tracing(TracingOpts {
        is_tty: interactive,
        no_color: !interactive,
        log_dir: None,
    })
    .context("setting up tracing")?;

    let app = Arc::new(App::new(false, Some("cli")).context("creating app context")?);
    run_subcommand(app, options.cmd)?;

    tracing::debug!(elapsed = ?started_at.elapsed(), "finished normally");
    Ok(())
}
