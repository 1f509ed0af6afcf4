use std::collections::{HashSet, VecDeque};

use skybuild_evaluator::EvalError;

use crate::label::ApparentLabel;
use crate::repo::{ApparentRepoName, ModuleInstance};

/// One call recorded from a `MODULE.bazel` file. `dev_dependency` is
/// carried on every statement that Bazel permits inside `if
/// module_version(...)`-style dev-only blocks, even though only some of
/// them matter to any given consumer.
#[derive(Debug, Clone)]
pub enum ModuleDotBazelStatement {
    BazelDep {
        name: String,
        version: Option<String>,
        max_compatibility_level: i32,
        repo_name: ApparentRepoName,
        dev_dependency: bool,
    },
    Module {
        name: String,
        version: Option<String>,
        compatibility_level: i32,
        repo_name: ApparentRepoName,
        bazel_compatibility: Vec<String>,
    },
    RegisterExecutionPlatforms {
        platform_labels: Vec<ApparentLabel>,
        dev_dependency: bool,
    },
    RegisterToolchains {
        toolchain_labels: Vec<ApparentLabel>,
        dev_dependency: bool,
    },
    UseExtension {
        extension_bzl_file: ApparentLabel,
        extension_name: String,
        dev_dependency: bool,
        isolate: bool,
    },
    UseRepoRule {
        repo_rule_bzl_file: ApparentLabel,
        repo_rule_name: String,
    },
}

impl ModuleDotBazelStatement {
    fn is_dev_dependency(&self) -> bool {
        match self {
            ModuleDotBazelStatement::BazelDep { dev_dependency, .. }
            | ModuleDotBazelStatement::RegisterExecutionPlatforms { dev_dependency, .. }
            | ModuleDotBazelStatement::RegisterToolchains { dev_dependency, .. }
            | ModuleDotBazelStatement::UseExtension { dev_dependency, .. } => *dev_dependency,
            ModuleDotBazelStatement::Module { .. } | ModuleDotBazelStatement::UseRepoRule { .. } => false,
        }
    }
}

/// A `MODULE.bazel` file decoded into its statements, in call order.
#[derive(Debug, Clone, Default)]
pub struct ParsedModuleDotBazel {
    pub statements: Vec<ModuleDotBazelStatement>,
}

/// Receives one module instance's statements during a breadth-first
/// module-graph visit. All methods default to a no-op so a consumer only
/// overrides the calls it cares about — mirrors the Go visitor's
/// per-concern handler structs (`usedModuleExtensionExtracting...`,
/// the execution-platform extractor, etc).
pub trait ModuleDotBazelHandler {
    fn bazel_dep(
        &mut self,
        _name: &str,
        _version: Option<&str>,
        _max_compatibility_level: i32,
        _repo_name: &ApparentRepoName,
        _dev_dependency: bool,
    ) -> Result<(), EvalError> {
        Ok(())
    }

    fn module(
        &mut self,
        _name: &str,
        _version: Option<&str>,
        _compatibility_level: i32,
        _repo_name: &ApparentRepoName,
        _bazel_compatibility: &[String],
    ) -> Result<(), EvalError> {
        Ok(())
    }

    fn register_execution_platforms(
        &mut self,
        _platform_labels: &[ApparentLabel],
        _dev_dependency: bool,
    ) -> Result<(), EvalError> {
        Ok(())
    }

    fn register_toolchains(
        &mut self,
        _toolchain_labels: &[ApparentLabel],
        _dev_dependency: bool,
    ) -> Result<(), EvalError> {
        Ok(())
    }

    fn use_extension(
        &mut self,
        _extension_bzl_file: &ApparentLabel,
        _extension_name: &str,
        _dev_dependency: bool,
        _isolate: bool,
    ) -> Result<(), EvalError> {
        Ok(())
    }

    fn use_repo_rule(
        &mut self,
        _repo_rule_bzl_file: &ApparentLabel,
        _repo_rule_name: &str,
    ) -> Result<(), EvalError> {
        Ok(())
    }
}

/// Visits every module instance reachable from `root` by BFS over
/// `bazel_dep` edges, root first, calling `make_handler` once per
/// instance to obtain the handler its statements are dispatched to.
///
/// `fetch` parses one instance's `MODULE.bazel` file; `Ok(None)` is a
/// missing-dependency signal (e.g. the file content key hasn't resolved
/// yet) that must abort the whole walk and be propagated by the caller.
///
/// An instance with `ignore_dev_dependencies` set neither traverses nor
/// forwards its dev-only statements, including `bazel_dep` edges — a
/// dev dependency of a non-root module is invisible outside dev builds
/// of the root itself.
pub fn visit_module_dot_bazel_files_breadth_first<H: ModuleDotBazelHandler>(
    root: ModuleInstance,
    fetch: impl Fn(&ModuleInstance) -> Result<Option<ParsedModuleDotBazel>, EvalError>,
    mut make_handler: impl FnMut(&ModuleInstance, bool) -> (H, bool),
) -> Result<Option<()>, EvalError> {
    let mut queue = VecDeque::new();
    let mut visited = HashSet::new();
    queue.push_back(root.clone());
    visited.insert(root);
    let mut is_root = true;

    while let Some(instance) = queue.pop_front() {
        let Some(parsed) = fetch(&instance)? else {
            return Ok(None);
        };
        let (mut handler, ignore_dev_dependencies) = make_handler(&instance, is_root);

        for statement in &parsed.statements {
            if ignore_dev_dependencies && statement.is_dev_dependency() {
                continue;
            }
            match statement {
                ModuleDotBazelStatement::BazelDep {
                    name,
                    version,
                    max_compatibility_level,
                    repo_name,
                    dev_dependency,
                } => {
                    let dep_instance = ModuleInstance::new(name.clone(), version.clone());
                    if visited.insert(dep_instance.clone()) {
                        queue.push_back(dep_instance);
                    }
                    handler.bazel_dep(
                        name,
                        version.as_deref(),
                        *max_compatibility_level,
                        repo_name,
                        *dev_dependency,
                    )?;
                }
                ModuleDotBazelStatement::Module {
                    name,
                    version,
                    compatibility_level,
                    repo_name,
                    bazel_compatibility,
                } => {
                    handler.module(name, version.as_deref(), *compatibility_level, repo_name, bazel_compatibility)?;
                }
                ModuleDotBazelStatement::RegisterExecutionPlatforms {
                    platform_labels,
                    dev_dependency,
                } => {
                    handler.register_execution_platforms(platform_labels, *dev_dependency)?;
                }
                ModuleDotBazelStatement::RegisterToolchains {
                    toolchain_labels,
                    dev_dependency,
                } => {
                    handler.register_toolchains(toolchain_labels, *dev_dependency)?;
                }
                ModuleDotBazelStatement::UseExtension {
                    extension_bzl_file,
                    extension_name,
                    dev_dependency,
                    isolate,
                } => {
                    handler.use_extension(extension_bzl_file, extension_name, *dev_dependency, *isolate)?;
                }
                ModuleDotBazelStatement::UseRepoRule {
                    repo_rule_bzl_file,
                    repo_rule_name,
                } => {
                    handler.use_repo_rule(repo_rule_bzl_file, repo_rule_name)?;
                }
            }
        }

        is_root = false;
    }

    Ok(Some(()))
}
