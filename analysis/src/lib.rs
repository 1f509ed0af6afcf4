pub mod error;
pub mod extensions;
pub mod filetree;
pub mod key;
pub mod platforms;
pub mod value;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use starlark::environment::Globals;

use skybuild_codec::Value as CodecValue;
use skybuild_evaluator::{Computation, Environment, EvalError};
use skybuild_labels::{
    resolve_apparent_label, visit_module_dot_bazel_files_breadth_first, ApparentLabel, ApparentRepoName,
    ApparentRepoResolver, CanonicalLabel, CanonicalRepoName, LabelParseError, ModuleDotBazelHandler,
    ModuleDotBazelStatement, ModuleInstance, ParsedModuleDotBazel,
};
use skybuild_loader::{compile_bzl_file, global_lookup, DecodedGlobalsSource, LoaderError};
use skybuild_store::Reference;

pub use error::AnalysisError;
pub use extensions::{ExtensionAccumulator, ExtensionError, ExtensionIdentity, ExtensionUsage, UsedModuleExtension};
pub use filetree::{file_properties, resolve_path, DirectoryEntry, DirectoryFetcher, PathResolutionError, ResolvedEntry};
pub use key::Key;
pub use platforms::{
    assemble_registered_execution_platforms, find_platform_info, ExecutionPlatform, PlatformError, ProviderInstance,
};
pub use value::{
    BuildResultValue, BuildSpecificationValue, CompiledBzlFileValue, DirectoryAccessParametersValue,
    TargetCompletionValue, Value,
};

/// The concrete `Computation<Key, Value>` for a whole analysis run: the
/// pure derived-computation logic of [`key`]/[`value`]/[`extensions`]/
/// [`platforms`]/[`filetree`], wired to the handful of genuinely external
/// inputs a build needs (raw file bytes, the repo's directory tree, and
/// parsed `MODULE.bazel` files) via injected collaborators, so this type
/// never hard-codes a transport.
///
/// `module_dot_bazel_fetcher` receives the [`Environment`] so its own
/// implementation can route `MODULE.bazel` lookups through
/// [`Key::FileProperties`]/[`Key::FileReader`] and participate in the same
/// missing-dependency restart protocol as every other computation; parsing
/// `MODULE.bazel`'s restricted call-expression syntax is left to the
/// caller, since it depends on nothing else in this crate.
pub struct AnalysisEngine<Fetcher, Reader, ModuleFetcher> {
    pub directory_fetcher: Fetcher,
    pub file_reader: Reader,
    pub module_dot_bazel_fetcher: ModuleFetcher,
    pub build_specification: BuildSpecificationValue,
    pub directory_access_parameters: DirectoryAccessParametersValue,
    pub builtins_module_names: Vec<String>,
    pub root_module: ModuleInstance,
    pub starlark_globals: Globals,
}

fn bzl_path(label: &CanonicalLabel) -> String {
    let components = label.label().path_components();
    let name = label.label().target_name().to_string();
    if components.is_empty() {
        name
    } else {
        format!("{}/{}", components.join("/"), name)
    }
}

fn module_instance_for_repo(root_module: &ModuleInstance, repo: &CanonicalRepoName) -> ModuleInstance {
    if repo.is_root() {
        return root_module.clone();
    }
    match repo.as_str().rsplit_once('+') {
        Some((module, version)) => ModuleInstance::new(module, Some(version.to_string())),
        None => ModuleInstance::new(repo.as_str(), None),
    }
}

/// Bridges [`DecodedGlobalsSource`] lookups to [`Key::CompiledBzlFileDecodedGlobals`]
/// evaluations, so [`skybuild_loader::assemble_bzl_file_builtins`] and
/// [`skybuild_loader::assemble_build_file_builtins`] can be driven
/// directly off this crate's `Environment` the same way every other
/// computation is.
struct EnvDecodedGlobalsSource<'e> {
    env: &'e Environment<'e, Key, Value>,
}

impl<'e> DecodedGlobalsSource for EnvDecodedGlobalsSource<'e> {
    fn decoded_globals(
        &self,
        exports_file_label: &str,
        builtins_module_names: &[String],
    ) -> Result<Option<HashMap<String, CodecValue>>, EvalError> {
        let label: CanonicalLabel = exports_file_label
            .parse()
            .map_err(|e: LabelParseError| EvalError::InvalidInput(e.to_string()))?;
        let key = Key::CompiledBzlFileDecodedGlobals {
            label,
            builtins_module_names: builtins_module_names.to_vec(),
        };
        match self.env.get(key) {
            Some(Value::CompiledBzlFileDecodedGlobals(map)) => Ok(Some((*map).clone())),
            Some(_) => Err(EvalError::SemanticError("unexpected value kind for decoded globals".to_string())),
            None => Ok(None),
        }
    }
}

struct EnvApparentRepoResolver<'e> {
    env: &'e Environment<'e, Key, Value>,
}

impl<'e> ApparentRepoResolver for EnvApparentRepoResolver<'e> {
    fn canonical_repo_name(
        &self,
        from_repo: &CanonicalRepoName,
        to_apparent_repo: &str,
    ) -> Result<Option<CanonicalRepoName>, EvalError> {
        let key = Key::ResolveApparentRepo {
            from_repo: from_repo.clone(),
            to_apparent_repo: ApparentRepoName::new(to_apparent_repo),
        };
        match self.env.get(key) {
            Some(Value::ResolvedApparentRepo(repo)) => Ok(Some(repo)),
            Some(_) => Err(EvalError::SemanticError("unexpected value kind for repo resolution".to_string())),
            None => Ok(None),
        }
    }

    fn root_module_bare_canonical_repo(&self) -> Result<Option<CanonicalRepoName>, EvalError> {
        match self.env.get(Key::RootModule) {
            Some(Value::RootModule(instance)) => Ok(Some(instance.bare_canonical_repo())),
            Some(_) => Err(EvalError::SemanticError("unexpected value kind for root module".to_string())),
            None => Ok(None),
        }
    }
}

struct PlatformsHandler<'a, 'e> {
    resolver: &'a EnvApparentRepoResolver<'e>,
    from_repo: CanonicalRepoName,
    platforms: &'a RefCell<Vec<CanonicalLabel>>,
    missing: &'a Cell<bool>,
}

impl<'a, 'e> ModuleDotBazelHandler for PlatformsHandler<'a, 'e> {
    fn register_execution_platforms(
        &mut self,
        platform_labels: &[ApparentLabel],
        _dev_dependency: bool,
    ) -> Result<(), EvalError> {
        for apparent in platform_labels {
            match resolve_apparent_label(self.resolver, &self.from_repo, apparent)? {
                Some(canonical) => self.platforms.borrow_mut().push(canonical),
                None => self.missing.set(true),
            }
        }
        Ok(())
    }
}

struct ExtensionsHandler<'a> {
    user: ModuleInstance,
    accumulator: &'a RefCell<ExtensionAccumulator>,
    error: &'a RefCell<Option<ExtensionError>>,
}

impl<'a> ModuleDotBazelHandler for ExtensionsHandler<'a> {
    fn use_extension(
        &mut self,
        extension_bzl_file: &ApparentLabel,
        extension_name: &str,
        dev_dependency: bool,
        isolate: bool,
    ) -> Result<(), EvalError> {
        if self.error.borrow().is_some() {
            return Ok(());
        }
        if let Err(e) = self.accumulator.borrow_mut().record(
            self.user.clone(),
            extension_bzl_file.clone(),
            extension_name.to_string(),
            dev_dependency,
            isolate,
        ) {
            *self.error.borrow_mut() = Some(e);
        }
        Ok(())
    }
}

impl<Fetcher, Reader, ModuleFetcher> Computation<Key, Value> for AnalysisEngine<Fetcher, Reader, ModuleFetcher>
where
    Fetcher: DirectoryFetcher,
    Reader: Fn(&CanonicalRepoName, &str) -> Result<Vec<u8>, EvalError>,
    ModuleFetcher: Fn(&ModuleInstance, &Environment<'_, Key, Value>) -> Result<Option<ParsedModuleDotBazel>, EvalError>,
{
    fn compute(&self, key: &Key, env: &Environment<'_, Key, Value>) -> Result<Value, EvalError> {
        match key {
            Key::BuildSpecification => Ok(Value::BuildSpecification(Rc::new(self.build_specification.clone()))),
            Key::BuiltinsModuleNames => Ok(Value::BuiltinsModuleNames(Rc::new(self.builtins_module_names.clone()))),
            Key::DirectoryAccessParameters => {
                Ok(Value::DirectoryAccessParameters(self.directory_access_parameters.clone()))
            }
            Key::FileReader { repo, path } => {
                let bytes = (self.file_reader)(repo, path)?;
                Ok(Value::FileReader(Rc::new(bytes)))
            }
            Key::FileProperties { repo: _, path } => {
                let resolved = file_properties(&self.directory_access_parameters.root, path, &self.directory_fetcher)
                    .map_err(AnalysisError::from)?;
                Ok(Value::FileProperties(resolved))
            }
            Key::RepoDefaultAttrs { repo } => self.compute_repo_default_attrs(repo, env),
            Key::CompiledBzlFile {
                label,
                builtins_module_names,
            } => self.compute_compiled_bzl_file(label, builtins_module_names, env),
            Key::CompiledBzlFileDecodedGlobals {
                label,
                builtins_module_names,
            } => self.compute_decoded_globals(label, builtins_module_names, env),
            Key::CompiledBzlFileFunctionFactory {
                label,
                builtins_module_names,
            } => match self.compute_decoded_globals(label, builtins_module_names, env)? {
                Value::CompiledBzlFileDecodedGlobals(map) => Ok(Value::CompiledBzlFileFunctionFactory(map)),
                other => Ok(other),
            },
            Key::CompiledBzlFileGlobal {
                label,
                builtins_module_names,
                identifier,
            } => self.compute_global(label, builtins_module_names, identifier, env),
            Key::RegisteredExecutionPlatforms => self.compute_registered_execution_platforms(env),
            Key::UsedModuleExtensions => self.compute_used_module_extensions(env),
            Key::RootModule => Ok(Value::RootModule(self.root_module.clone())),
            Key::ResolveApparentRepo {
                from_repo,
                to_apparent_repo,
            } => self.compute_resolve_apparent_repo(from_repo, to_apparent_repo, env),
            Key::TargetCompletion { label } => self.compute_target_completion(label, env),
            Key::BuildResult => self.compute_build_result(env),
        }
    }
}

impl<Fetcher, Reader, ModuleFetcher> AnalysisEngine<Fetcher, Reader, ModuleFetcher>
where
    Fetcher: DirectoryFetcher,
    Reader: Fn(&CanonicalRepoName, &str) -> Result<Vec<u8>, EvalError>,
    ModuleFetcher: Fn(&ModuleInstance, &Environment<'_, Key, Value>) -> Result<Option<ParsedModuleDotBazel>, EvalError>,
{
    fn compute_repo_default_attrs(
        &self,
        repo: &CanonicalRepoName,
        env: &Environment<'_, Key, Value>,
    ) -> Result<Value, EvalError> {
        let path = "REPO.bazel".to_string();
        let Some(Value::FileProperties(file_ref)) = env.get(Key::FileProperties {
            repo: repo.clone(),
            path: path.clone(),
        }) else {
            return Err(EvalError::MissingDependency);
        };
        if file_ref.is_none() {
            return Ok(Value::RepoDefaultAttrs(Rc::new(HashMap::new())));
        }
        let Some(Value::FileReader(bytes)) = env.get(Key::FileReader {
            repo: repo.clone(),
            path,
        }) else {
            return Err(EvalError::MissingDependency);
        };
        let source = std::str::from_utf8(&bytes).map_err(|e| EvalError::DecodeError(e.to_string()))?;
        let compiled = compile_bzl_file(
            &format!("{}//:REPO.bazel", repo),
            source,
            &self.starlark_globals,
            |_| Ok(Some(())),
        )
        .map_err(|e: LoaderError| EvalError::from(e))?;
        let Some(compiled) = compiled else {
            return Err(EvalError::MissingDependency);
        };
        Ok(Value::RepoDefaultAttrs(Rc::new(compiled.globals.into_iter().collect())))
    }

    fn compute_compiled_bzl_file(
        &self,
        label: &CanonicalLabel,
        builtins_module_names: &[String],
        env: &Environment<'_, Key, Value>,
    ) -> Result<Value, EvalError> {
        let repo = label.canonical_repo().clone();
        let path = bzl_path(label);

        let Some(Value::FileProperties(file_ref)) = env.get(Key::FileProperties {
            repo: repo.clone(),
            path: path.clone(),
        }) else {
            return Err(EvalError::MissingDependency);
        };
        if file_ref.is_none() {
            return Err(EvalError::NotFound(format!("{} does not exist", label)));
        }
        let Some(Value::FileReader(bytes)) = env.get(Key::FileReader {
            repo: repo.clone(),
            path,
        }) else {
            return Err(EvalError::MissingDependency);
        };
        let source = std::str::from_utf8(&bytes).map_err(|e| EvalError::DecodeError(e.to_string()))?;

        let source_module_names = builtins_module_names.to_vec();
        let preload = |target: &str| -> Result<Option<()>, LoaderError> {
            let dep_label: CanonicalLabel = target
                .parse()
                .map_err(|_| LoaderError::InvalidModuleName(target.to_string()))?;
            let dep_key = Key::CompiledBzlFileDecodedGlobals {
                label: dep_label,
                builtins_module_names: source_module_names.clone(),
            };
            Ok(env.get(dep_key).map(|_| ()))
        };

        let compiled = compile_bzl_file(&label.to_string(), source, &self.starlark_globals, preload)
            .map_err(|e: LoaderError| EvalError::from(e))?;
        let Some(compiled) = compiled else {
            return Err(EvalError::MissingDependency);
        };

        // Re-derive the `native` struct this file would see, folding in
        // every builtin module's `exported_rules` in well-founded order,
        // and stitch it over whatever the interpreter itself produced
        // for that name.
        let builtins_source = EnvDecodedGlobalsSource { env };
        let Some(assembled) = skybuild_loader::assemble_bzl_file_builtins(&builtins_source, builtins_module_names, HashMap::new())
            .map_err(|e: LoaderError| EvalError::from(e))?
        else {
            return Err(EvalError::MissingDependency);
        };

        let mut globals = compiled.globals;
        if let Some(native) = assembled.get("native") {
            match globals.iter().position(|(name, _)| name == "native") {
                Some(index) => globals[index].1 = native.clone(),
                None => {
                    globals.push(("native".to_string(), native.clone()));
                    globals.sort_by(|a, b| a.0.cmp(&b.0));
                }
            }
        }

        Ok(Value::CompiledBzlFile(CompiledBzlFileValue {
            globals: Rc::new(globals),
            loads: Rc::new(compiled.loads),
        }))
    }

    fn compute_decoded_globals(
        &self,
        label: &CanonicalLabel,
        builtins_module_names: &[String],
        env: &Environment<'_, Key, Value>,
    ) -> Result<Value, EvalError> {
        let compiled_key = Key::CompiledBzlFile {
            label: label.clone(),
            builtins_module_names: builtins_module_names.to_vec(),
        };
        let Some(Value::CompiledBzlFile(compiled)) = env.get(compiled_key) else {
            return Err(EvalError::MissingDependency);
        };
        let map: HashMap<String, CodecValue> = compiled.globals.iter().cloned().collect();
        Ok(Value::CompiledBzlFileDecodedGlobals(Rc::new(map)))
    }

    fn compute_global(
        &self,
        label: &CanonicalLabel,
        builtins_module_names: &[String],
        identifier: &str,
        env: &Environment<'_, Key, Value>,
    ) -> Result<Value, EvalError> {
        let compiled_key = Key::CompiledBzlFile {
            label: label.clone(),
            builtins_module_names: builtins_module_names.to_vec(),
        };
        let Some(Value::CompiledBzlFile(compiled)) = env.get(compiled_key) else {
            return Err(EvalError::MissingDependency);
        };
        match global_lookup(&compiled.globals, identifier) {
            Some(value) => Ok(Value::CompiledBzlFileGlobal(value.clone())),
            None => Err(EvalError::NotFound(format!("{} has no global {:?}", label, identifier))),
        }
    }

    fn compute_resolve_apparent_repo(
        &self,
        from_repo: &CanonicalRepoName,
        to_apparent_repo: &ApparentRepoName,
        env: &Environment<'_, Key, Value>,
    ) -> Result<Value, EvalError> {
        let instance = module_instance_for_repo(&self.root_module, from_repo);
        let Some(parsed) = (self.module_dot_bazel_fetcher)(&instance, env)? else {
            return Err(EvalError::MissingDependency);
        };
        for statement in &parsed.statements {
            match statement {
                ModuleDotBazelStatement::BazelDep {
                    name, version, repo_name, ..
                } if repo_name == to_apparent_repo => {
                    let dep = ModuleInstance::new(name.clone(), version.clone());
                    return Ok(Value::ResolvedApparentRepo(dep.bare_canonical_repo()));
                }
                ModuleDotBazelStatement::Module { repo_name, .. } if repo_name == to_apparent_repo => {
                    return Ok(Value::ResolvedApparentRepo(CanonicalRepoName::root()));
                }
                _ => {}
            }
        }
        Err(EvalError::NotFound(format!(
            "{} has no repo named {}",
            from_repo, to_apparent_repo
        )))
    }

    fn compute_registered_execution_platforms(&self, env: &Environment<'_, Key, Value>) -> Result<Value, EvalError> {
        let resolver = EnvApparentRepoResolver { env };
        let labels: RefCell<Vec<CanonicalLabel>> = RefCell::new(Vec::new());
        let missing = Cell::new(false);

        let result = visit_module_dot_bazel_files_breadth_first(
            self.root_module.clone(),
            |instance| (self.module_dot_bazel_fetcher)(instance, env),
            |instance, _is_root| {
                let from_repo = instance.bare_canonical_repo();
                (
                    PlatformsHandler {
                        resolver: &resolver,
                        from_repo,
                        platforms: &labels,
                        missing: &missing,
                    },
                    false,
                )
            },
        )?;

        if result.is_none() || missing.get() {
            return Err(EvalError::MissingDependency);
        }

        // Constraints and exec properties require resolving each
        // platform target's own `PlatformInfo` provider, which depends
        // on configured-target analysis this crate doesn't implement
        // yet; every registered platform is carried through with empty
        // sets until that lands.
        let platforms: Vec<ExecutionPlatform> = labels
            .into_inner()
            .into_iter()
            .map(|label| ExecutionPlatform {
                label,
                constraints: Vec::new(),
                exec_properties: Vec::new(),
            })
            .collect();
        let assembled = assemble_registered_execution_platforms(platforms).map_err(AnalysisError::from)?;
        Ok(Value::RegisteredExecutionPlatforms(Rc::new(assembled)))
    }

    fn compute_used_module_extensions(&self, env: &Environment<'_, Key, Value>) -> Result<Value, EvalError> {
        let accumulator = RefCell::new(ExtensionAccumulator::new());
        let error: RefCell<Option<ExtensionError>> = RefCell::new(None);

        let result = visit_module_dot_bazel_files_breadth_first(
            self.root_module.clone(),
            |instance| (self.module_dot_bazel_fetcher)(instance, env),
            |instance, _is_root| {
                (
                    ExtensionsHandler {
                        user: instance.clone(),
                        accumulator: &accumulator,
                        error: &error,
                    },
                    false,
                )
            },
        )?;

        if result.is_none() {
            return Err(EvalError::MissingDependency);
        }
        if let Some(e) = error.into_inner() {
            return Err(AnalysisError::from(e).into());
        }
        let extensions = accumulator.into_inner().finish();
        Ok(Value::UsedModuleExtensions(Rc::new(extensions)))
    }

    /// A bounded simplification, documented in DESIGN.md alongside
    /// `assemble_registered_execution_platforms`'s: "succeeded" here means
    /// the target's `.bzl` file exists, not that the target was actually
    /// analyzed and configured against a rule. A real check needs
    /// configured-target analysis this core doesn't implement.
    fn compute_target_completion(
        &self,
        label: &CanonicalLabel,
        env: &Environment<'_, Key, Value>,
    ) -> Result<Value, EvalError> {
        let repo = label.canonical_repo().clone();
        let path = bzl_path(label);
        let Some(Value::FileProperties(file_ref)) = env.get(Key::FileProperties { repo, path }) else {
            return Err(EvalError::MissingDependency);
        };
        Ok(Value::TargetCompletion(TargetCompletionValue {
            succeeded: file_ref.is_some(),
        }))
    }

    fn compute_build_result(&self, env: &Environment<'_, Key, Value>) -> Result<Value, EvalError> {
        let Some(Value::BuildSpecification(spec)) = env.get(Key::BuildSpecification) else {
            return Err(EvalError::MissingDependency);
        };
        let mut succeeded = 0usize;
        let mut failed = 0usize;
        let mut missing = false;
        for pattern in spec.target_patterns.iter() {
            let label: CanonicalLabel = pattern
                .parse()
                .map_err(|e: LabelParseError| EvalError::InvalidInput(e.to_string()))?;
            match env.get(Key::TargetCompletion { label }) {
                Some(Value::TargetCompletion(completion)) => {
                    if completion.succeeded {
                        succeeded += 1;
                    } else {
                        failed += 1;
                    }
                }
                Some(_) => return Err(EvalError::SemanticError("unexpected value kind for target completion".to_string())),
                None => missing = true,
            }
        }
        if missing {
            return Err(EvalError::MissingDependency);
        }
        Ok(Value::BuildResult(BuildResultValue {
            succeeded_targets: succeeded,
            failed_targets: failed,
        }))
    }
}
