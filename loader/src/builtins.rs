use std::collections::HashMap;

use skybuild_codec::Value;
use skybuild_evaluator::EvalError;

use crate::error::LoaderError;

const EXPORTS_BZL_TARGET_NAME: &str = "exports.bzl";

/// Truncates `builtins_module_names` at `own_module_name`'s own entry, so
/// a builtin module's code never depends on its own exports. A module
/// not present in the list is returned unmodified.
pub fn trim_builtin_module_names<'a>(builtins_module_names: &'a [String], own_module_name: &str) -> &'a [String] {
    match builtins_module_names.iter().position(|name| name == own_module_name) {
        Some(index) => &builtins_module_names[..index],
        None => builtins_module_names,
    }
}

/// The per-exports-file lookup `assemble_bzl_file_builtins` and
/// `assemble_build_file_builtins` need: the decoded globals of
/// `@@<module>+//:exports.bzl`, compiled using only the builtin modules
/// listed before it. Implemented by the caller as a thin wrapper around
/// the evaluator's `CompiledBzlFileDecodedGlobals` key.
pub trait DecodedGlobalsSource {
    fn decoded_globals(
        &self,
        exports_file_label: &str,
        builtins_module_names: &[String],
    ) -> Result<Option<HashMap<String, Value>>, EvalError>;
}

fn exports_file_label(module_name: &str) -> String {
    format!("@@{}+//:{}", module_name, EXPORTS_BZL_TARGET_NAME)
}

fn string_keyed_mapping(globals: &HashMap<String, Value>, exports_file: &str, key: &str) -> Result<Vec<(String, Value)>, LoaderError> {
    let mapping = globals
        .get(key)
        .ok_or_else(|| LoaderError::MissingExport {
            file: exports_file.to_string(),
            name: key.to_string(),
        })?;
    let Value::Dict(entries) = mapping else {
        return Err(LoaderError::MissingExport {
            file: exports_file.to_string(),
            name: key.to_string(),
        });
    };
    entries
        .borrow()
        .iter()
        .map(|(k, v)| match k {
            Value::Str(name) => Ok((name.to_string(), v.clone())),
            _ => Err(LoaderError::NonStringExportName {
                file: exports_file.to_string(),
            }),
        })
        .collect()
}

fn strip_plus_prefix(name: &str) -> &str {
    name.strip_prefix('+').unwrap_or(name)
}

/// Assembles the builtin toplevels a `.bzl` file compiles against:
/// `base_toplevels` plus every `exported_toplevels` entry contributed by
/// `builtins_module_names`, in order, each module compiled using only
/// the strictly-earlier ones (the prefix-truncation well-founded
/// order). Every module's `exported_rules` are additionally folded into
/// a `native` struct, preserving whatever `native` members the base set
/// already declared that no exported rule overrides.
///
/// Returns `Ok(None)` if any module's exports are still a missing
/// dependency — the whole assembly restarts once they resolve.
pub fn assemble_bzl_file_builtins(
    source: &impl DecodedGlobalsSource,
    builtins_module_names: &[String],
    base_toplevels: HashMap<String, Value>,
) -> Result<Option<HashMap<String, Value>>, LoaderError> {
    let mut all_toplevels = base_toplevels;
    let mut new_native: Vec<(String, Value)> = Vec::new();

    for (i, module_name) in builtins_module_names.iter().enumerate() {
        let exports_file = exports_file_label(module_name);
        let Some(globals) = source.decoded_globals(&exports_file, &builtins_module_names[..i])? else {
            return Ok(None);
        };

        for (name, value) in string_keyed_mapping(&globals, &exports_file, "exported_toplevels")? {
            all_toplevels.insert(strip_plus_prefix(&name).to_string(), value);
        }
        for (name, value) in string_keyed_mapping(&globals, &exports_file, "exported_rules")? {
            new_native.push((strip_plus_prefix(&name).to_string(), value));
        }
    }

    if let Some(Value::Struct(existing_native)) = all_toplevels.get("native") {
        let overridden: std::collections::HashSet<&str> = new_native.iter().map(|(n, _)| n.as_str()).collect();
        for (name, value) in existing_native.iter() {
            if !overridden.contains(name.as_str()) {
                new_native.push((name.clone(), value.clone()));
            }
        }
    }

    all_toplevels.insert("native".to_string(), Value::strukt(new_native));
    Ok(Some(all_toplevels))
}

/// Assembles the builtin rules a `BUILD` file compiles against:
/// `base_rules` plus every `exported_rules` entry contributed by
/// `builtins_module_names`. Unlike [`assemble_bzl_file_builtins`], a
/// `BUILD` file's base set has no `native` re-exposure to merge.
pub fn assemble_build_file_builtins(
    source: &impl DecodedGlobalsSource,
    builtins_module_names: &[String],
    base_rules: HashMap<String, Value>,
) -> Result<Option<HashMap<String, Value>>, LoaderError> {
    let mut all_rules = base_rules;

    for (i, module_name) in builtins_module_names.iter().enumerate() {
        let exports_file = exports_file_label(module_name);
        let Some(globals) = source.decoded_globals(&exports_file, &builtins_module_names[..i])? else {
            return Ok(None);
        };

        for (name, value) in string_keyed_mapping(&globals, &exports_file, "exported_rules")? {
            all_rules.insert(strip_plus_prefix(&name).to_string(), value);
        }
    }

    Ok(Some(all_rules))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;

    struct FakeSource {
        globals: HashMap<(String, usize), HashMap<String, Value>>,
        calls: StdRefCell<Vec<String>>,
    }

    impl DecodedGlobalsSource for FakeSource {
        fn decoded_globals(
            &self,
            exports_file_label: &str,
            builtins_module_names: &[String],
        ) -> Result<Option<HashMap<String, Value>>, EvalError> {
            self.calls.borrow_mut().push(exports_file_label.to_string());
            Ok(self
                .globals
                .get(&(exports_file_label.to_string(), builtins_module_names.len()))
                .cloned())
        }
    }

    fn dict_of(entries: Vec<(&str, Value)>) -> Value {
        Value::dict(entries.into_iter().map(|(k, v)| (Value::str(k), v)).collect())
    }

    #[test]
    fn trims_at_own_module_entry() {
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(trim_builtin_module_names(&names, "b"), &["a".to_string()]);
        assert_eq!(trim_builtin_module_names(&names, "missing"), names.as_slice());
    }

    #[test]
    fn merges_exported_toplevels_and_rules_in_well_founded_order() {
        let mut globals = HashMap::new();
        globals.insert(
            ("@@core+//:exports.bzl".to_string(), 0),
            HashMap::from([
                ("exported_toplevels".to_string(), dict_of(vec![("+glob", Value::Bool(true))])),
                ("exported_rules".to_string(), dict_of(vec![("+rule_one", Value::Int(1))])),
            ]),
        );
        let source = FakeSource {
            globals,
            calls: StdRefCell::new(Vec::new()),
        };

        let result = assemble_bzl_file_builtins(&source, &["core".to_string()], HashMap::new())
            .unwrap()
            .unwrap();

        assert!(matches!(result.get("glob"), Some(Value::Bool(true))));
        let Value::Struct(native) = result.get("native").unwrap() else {
            panic!("expected native struct");
        };
        assert!(matches!(
            native.iter().find(|(n, _)| n == "rule_one").map(|(_, v)| v),
            Some(Value::Int(1))
        ));
    }

    #[test]
    fn missing_exports_file_is_a_missing_dependency() {
        let source = FakeSource {
            globals: HashMap::new(),
            calls: StdRefCell::new(Vec::new()),
        };
        let result = assemble_bzl_file_builtins(&source, &["core".to_string()], HashMap::new()).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn build_file_builtins_skip_native_re_exposure() {
        let mut globals = HashMap::new();
        globals.insert(
            ("@@core+//:exports.bzl".to_string(), 0),
            HashMap::from([("exported_rules".to_string(), dict_of(vec![("cc_library", Value::Int(1))]))]),
        );
        let source = FakeSource {
            globals,
            calls: StdRefCell::new(Vec::new()),
        };
        let result = assemble_build_file_builtins(&source, &["core".to_string()], HashMap::new())
            .unwrap()
            .unwrap();
        assert!(matches!(result.get("cc_library"), Some(Value::Int(1))));
        assert!(result.get("native").is_none());
    }
}
