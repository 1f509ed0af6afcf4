use starlark::environment::{Globals, Module};
use starlark::eval::Evaluator;
use starlark::syntax::{AstModule, Dialect};
use starlark::values::dict::DictRef;
use starlark::values::list::ListRef;
use starlark::values::Value as StarlarkValue;

use skybuild_codec::Value;

use crate::error::LoaderError;

/// The serialized output of compiling and initializing one `.bzl` file:
/// its globals, sorted by name for [`crate::global_lookup`]'s binary
/// search, and the `load()` targets it references (surfaced before
/// initialization so every missing dependency is visible on one pass).
pub struct CompiledProgram {
    pub globals: Vec<(String, Value)>,
    pub loads: Vec<String>,
}

/// Parses `source` and preloads every `load()` target it references via
/// `preload` before initializing the module, so a caller sees every
/// missing dependency on a single computation attempt rather than one
/// at a time. `preload` returning `Ok(None)` for any target aborts
/// compilation with a missing-dependency style early return (the
/// caller is expected to translate that the same way it would a
/// `None` from `Environment::get`).
pub fn compile_bzl_file(
    label: &str,
    source: &str,
    globals: &Globals,
    mut preload: impl FnMut(&str) -> Result<Option<()>, LoaderError>,
) -> Result<Option<CompiledProgram>, LoaderError> {
    let ast = AstModule::parse(label, source.to_owned(), &Dialect::Extended).map_err(|e| LoaderError::Parse {
        label: label.to_string(),
        message: e.to_string(),
    })?;

    let loads: Vec<String> = ast.loads().into_iter().map(|load| load.module_id.to_owned()).collect();
    let mut any_missing = false;
    for target in &loads {
        if preload(target)?.is_none() {
            any_missing = true;
        }
    }
    if any_missing {
        return Ok(None);
    }

    let module = Module::new();
    {
        let mut eval = Evaluator::new(&module);
        eval.eval_module(ast, globals).map_err(|e| LoaderError::Interpreter {
            label: label.to_string(),
            backtrace: e.to_string(),
        })?;
    }

    let frozen = module.freeze().map_err(|e| LoaderError::Interpreter {
        label: label.to_string(),
        backtrace: e.to_string(),
    })?;

    let mut exported: Vec<(String, Value)> = frozen
        .names()
        .filter_map(|name| {
            frozen
                .get_option(name.as_str())
                .ok()
                .flatten()
                .map(|v| (name.as_str().to_string(), convert_value(v.value())))
        })
        .collect();
    exported.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(Some(CompiledProgram { globals: exported, loads }))
}

/// Binary search over a compiled file's sorted globals, as
/// `CompiledBzlFileGlobal` performs against an already-compiled file.
pub fn global_lookup<'a>(globals: &'a [(String, Value)], name: &str) -> Option<&'a Value> {
    globals
        .binary_search_by(|(existing, _)| existing.as_str().cmp(name))
        .ok()
        .map(|i| &globals[i].1)
}

fn convert_value(value: StarlarkValue) -> Value {
    if value.is_none() {
        return Value::None;
    }
    if let Some(b) = value.unpack_bool() {
        return Value::Bool(b);
    }
    if let Some(i) = value.unpack_i32() {
        return Value::Int(i as i64);
    }
    if let Some(s) = value.unpack_str() {
        return Value::str(s);
    }
    if let Some(list) = ListRef::from_value(value) {
        return Value::list(list.iter().map(convert_value).collect());
    }
    if let Some(dict) = DictRef::from_value(value) {
        return Value::dict(dict.iter().map(|(k, v)| (convert_value(k), convert_value(v))).collect());
    }
    // Functions, rules, providers and anything else we don't have a
    // lossless in-memory shape for: the encoder treats this as needing
    // the originating compiled program.
    Value::Function {
        name: value.to_string().into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use starlark::environment::GlobalsBuilder;

    #[test]
    fn compiles_and_sorts_globals_by_name() {
        let globals = GlobalsBuilder::standard().build();
        let result = compile_bzl_file("//:test.bzl", "z = 1\na = 2\n", &globals, |_| Ok(Some(())))
            .unwrap()
            .unwrap();
        let names: Vec<&str> = result.globals.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "z"]);
    }

    #[test]
    fn discovers_load_targets_before_initializing() {
        let globals = GlobalsBuilder::standard().build();
        let mut seen = Vec::new();
        let result = compile_bzl_file(
            "//:test.bzl",
            "load(\"//:other.bzl\", \"thing\")\nx = 1\n",
            &globals,
            |target| {
                seen.push(target.to_string());
                Ok(Some(()))
            },
        )
        .unwrap();
        assert_eq!(seen, vec!["//:other.bzl".to_string()]);
        assert!(result.is_some());
    }

    #[test]
    fn missing_load_target_aborts_compilation() {
        let globals = GlobalsBuilder::standard().build();
        let result = compile_bzl_file("//:test.bzl", "load(\"//:other.bzl\", \"thing\")\n", &globals, |_| Ok(None)).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn every_load_target_is_queried_before_reporting_a_miss() {
        let globals = GlobalsBuilder::standard().build();
        let mut seen = Vec::new();
        let result = compile_bzl_file(
            "//:test.bzl",
            "load(\"//:a.bzl\", \"a\")\nload(\"//:b.bzl\", \"b\")\nload(\"//:c.bzl\", \"c\")\n",
            &globals,
            |target| {
                seen.push(target.to_string());
                Ok(if target == "//:b.bzl" { None } else { Some(()) })
            },
        )
        .unwrap();
        assert_eq!(seen, vec!["//:a.bzl".to_string(), "//:b.bzl".to_string(), "//:c.bzl".to_string()]);
        assert!(result.is_none());
    }

    #[test]
    fn binary_search_finds_existing_global() {
        let globals = vec![("a".to_string(), Value::Int(1)), ("z".to_string(), Value::Int(2))];
        assert!(matches!(global_lookup(&globals, "z"), Some(Value::Int(2))));
        assert!(global_lookup(&globals, "missing").is_none());
    }
}
