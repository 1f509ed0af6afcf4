use std::collections::HashMap;
use std::rc::Rc;

use skybuild_codec::Value as CodecValue;
use skybuild_labels::{CanonicalRepoName, ModuleInstance};
use skybuild_store::Reference;

use crate::extensions::UsedModuleExtension;
use crate::platforms::ExecutionPlatform;

/// The user's requested build, as supplied by the CLI front end.
#[derive(Debug, Clone)]
pub struct BuildSpecificationValue {
    pub target_patterns: Vec<String>,
}

/// Where to read the workspace's repo content from.
#[derive(Debug, Clone)]
pub struct DirectoryAccessParametersValue {
    pub root: Reference,
}

/// One compiled `.bzl`/`BUILD` file's exported globals, sorted by name.
/// Shared via `Rc` since every file that loads this one holds its own
/// clone of the same compiled output.
#[derive(Clone)]
pub struct CompiledBzlFileValue {
    pub globals: Rc<Vec<(String, CodecValue)>>,
    pub loads: Rc<Vec<String>>,
}

/// The outcome of fully analyzing and configuring one target.
#[derive(Debug, Clone)]
pub struct TargetCompletionValue {
    pub succeeded: bool,
}

/// The outcome of a whole build: how many requested targets succeeded
/// and failed, without the two sets being double-derived from
/// `TargetCompletion` at this layer.
#[derive(Debug, Clone)]
pub struct BuildResultValue {
    pub succeeded_targets: usize,
    pub failed_targets: usize,
}

#[derive(Clone)]
pub enum Value {
    BuildSpecification(Rc<BuildSpecificationValue>),
    BuiltinsModuleNames(Rc<Vec<String>>),
    DirectoryAccessParameters(DirectoryAccessParametersValue),
    FileReader(Rc<Vec<u8>>),
    FileProperties(Option<Reference>),
    RepoDefaultAttrs(Rc<HashMap<String, CodecValue>>),
    CompiledBzlFile(CompiledBzlFileValue),
    CompiledBzlFileDecodedGlobals(Rc<HashMap<String, CodecValue>>),
    CompiledBzlFileFunctionFactory(Rc<HashMap<String, CodecValue>>),
    CompiledBzlFileGlobal(CodecValue),
    RegisteredExecutionPlatforms(Rc<Vec<ExecutionPlatform>>),
    UsedModuleExtensions(Rc<Vec<UsedModuleExtension>>),
    RootModule(ModuleInstance),
    ResolvedApparentRepo(CanonicalRepoName),
    TargetCompletion(TargetCompletionValue),
    BuildResult(BuildResultValue),
}

impl Value {
    pub fn as_file_properties(&self) -> Option<Option<Reference>> {
        match self {
            Value::FileProperties(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_compiled_bzl_file(&self) -> Option<&CompiledBzlFileValue> {
        match self {
            Value::CompiledBzlFile(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_builtins_module_names(&self) -> Option<&[String]> {
        match self {
            Value::BuiltinsModuleNames(names) => Some(names),
            _ => None,
        }
    }
}
