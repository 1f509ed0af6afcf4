use serde::{Deserialize, Serialize};

use skybuild_labels::{ApparentRepoName, CanonicalLabel, CanonicalRepoName, ModuleInstance};

/// Every derived computation the evaluator can be asked for. Each variant
/// is a pure function of its fields, so two equal keys always denote the
/// same computation and may share a [`skybuild_evaluator::Engine`] cache
/// entry — the requirement [`skybuild_evaluator::PersistentMemo`] also
/// leans on to hash a key into a cache address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    /// The user's requested build: target patterns plus the options that
    /// affect what gets analyzed. Supplied externally, not derived.
    BuildSpecification,
    /// The ordered list of builtin module names every `.bzl`/`BUILD` file
    /// compiles against, before any per-file truncation.
    BuiltinsModuleNames,
    /// Connection parameters for the repo content the workspace is
    /// checked out under (e.g. which directory fetcher backs it).
    DirectoryAccessParameters,
    /// The raw bytes of one file, addressed by repo and UNIX-format path.
    FileReader { repo: CanonicalRepoName, path: String },
    /// `Some(reference)` if `path` names a regular file in `repo`, `None`
    /// if it plainly doesn't exist; a directory at that path is an error.
    FileProperties { repo: CanonicalRepoName, path: String },
    /// The default visibility/attribute overrides a repo's `REPO.bazel`
    /// applies to every package within it.
    RepoDefaultAttrs { repo: CanonicalRepoName },
    /// Stage 1 of the loader pipeline: `label` parsed and initialized,
    /// compiled against the builtin toplevels contributed by
    /// `builtins_module_names`.
    CompiledBzlFile {
        label: CanonicalLabel,
        builtins_module_names: Vec<String>,
    },
    /// Stage 2: `label`'s `exported_toplevels`/`exported_rules` decoded
    /// into plain values, for folding into a dependent file's builtins.
    CompiledBzlFileDecodedGlobals {
        label: CanonicalLabel,
        builtins_module_names: Vec<String>,
    },
    /// Stage 3: the rule/provider function factories `label` exports,
    /// ready to be invoked by a `BUILD` file that loads them.
    CompiledBzlFileFunctionFactory {
        label: CanonicalLabel,
        builtins_module_names: Vec<String>,
    },
    /// One global by name out of an already-compiled file, found by
    /// binary search over its sorted export list.
    CompiledBzlFileGlobal {
        label: CanonicalLabel,
        builtins_module_names: Vec<String>,
        identifier: String,
    },
    /// The execution platforms registered anywhere in the module graph,
    /// sorted by label.
    RegisteredExecutionPlatforms,
    /// Every extension used anywhere in the module graph, grouped by
    /// identity in first-use order.
    UsedModuleExtensions,
    /// The root module's own identity, as declared by its own `module()`
    /// call (or the implicit unnamed root if it has none).
    RootModule,
    /// Resolves `to_apparent_repo` as seen from `from_repo`'s own
    /// `MODULE.bazel`-declared repo mapping.
    ResolveApparentRepo {
        from_repo: CanonicalRepoName,
        to_apparent_repo: ApparentRepoName,
    },
    /// Whether the target's defining `.bzl` file exists and is readable.
    /// A bounded simplification: real target completion needs configured-
    /// target analysis (evaluating the target's rule against its
    /// attributes and toolchains), which this core doesn't implement; see
    /// `compute_target_completion` and DESIGN.md.
    TargetCompletion { label: CanonicalLabel },
    /// The outcome of building every target named by the build
    /// specification.
    BuildResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_with_equal_fields_are_equal() {
        let a = Key::FileProperties {
            repo: CanonicalRepoName::root(),
            path: "foo/BUILD".to_string(),
        };
        let b = Key::FileProperties {
            repo: CanonicalRepoName::root(),
            path: "foo/BUILD".to_string(),
        };
        assert_eq!(a, b);
    }

    #[test]
    fn keys_round_trip_through_cbor() {
        let key = Key::CompiledBzlFileGlobal {
            label: "@@core+//:exports.bzl".parse().unwrap(),
            builtins_module_names: vec!["core".to_string()],
            identifier: "cc_library".to_string(),
        };
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&key, &mut bytes).unwrap();
        let decoded: Key = ciborium::de::from_reader(bytes.as_slice()).unwrap();
        assert_eq!(key, decoded);
    }
}
