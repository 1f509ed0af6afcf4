//! A deliberately small reader for `MODULE.bazel` files: enough to
//! recover `bazel_dep`/`module`/`register_execution_platforms`/
//! `register_toolchains`/`use_extension`/`use_repo_rule` calls written in
//! the straightforward, non-nested style real module files use, without
//! pulling in a full Starlark parser for a file format that is really
//! just a restricted declaration list. Calls that rely on computed
//! arguments, `select()`, or deeply nested expressions won't parse —
//! this is a demo-grade reader, not a spec-complete one.

use regex::Regex;

use skybuild_labels::{ApparentLabel, ApparentRepoName, ModuleDotBazelStatement, ParsedModuleDotBazel};

/// Finds every top-level call to `name(...)` in `source`, returning the
/// text between its outermost parentheses. Tracks paren depth and skips
/// over quoted strings so a parenthesis or quote inside an argument
/// value doesn't end the scan early.
fn find_calls<'a>(source: &'a str, name: &str) -> Vec<&'a str> {
    let bytes = source.as_bytes();
    let needle = format!("{}(", name);
    let mut out = Vec::new();
    let mut idx = 0usize;

    while let Some(rel) = source[idx..].find(needle.as_str()) {
        let start = idx + rel;
        let preceded_by_identifier_char = start > 0
            && (bytes[start - 1].is_ascii_alphanumeric() || bytes[start - 1] == b'_');
        let open = start + needle.len() - 1;

        let mut depth = 0i32;
        let mut in_string: Option<u8> = None;
        let mut cursor = open;
        let mut close = None;
        while cursor < bytes.len() {
            let c = bytes[cursor];
            if let Some(quote) = in_string {
                if c == b'\\' {
                    cursor += 2;
                    continue;
                }
                if c == quote {
                    in_string = None;
                }
            } else {
                match c {
                    b'"' | b'\'' => in_string = Some(c),
                    b'(' => depth += 1,
                    b')' => {
                        depth -= 1;
                        if depth == 0 {
                            close = Some(cursor);
                            break;
                        }
                    }
                    _ => {}
                }
            }
            cursor += 1;
        }

        match close {
            Some(close) => {
                if !preceded_by_identifier_char {
                    out.push(&source[open + 1..close]);
                }
                idx = close + 1;
            }
            None => idx = start + needle.len(),
        }
    }

    out
}

fn kwarg_string(body: &str, key: &str) -> Option<String> {
    let pattern = format!(r#"{}\s*=\s*"([^"]*)""#, regex::escape(key));
    Regex::new(&pattern).ok()?.captures(body).map(|c| c[1].to_string())
}

fn kwarg_bool(body: &str, key: &str, default: bool) -> bool {
    let pattern = format!(r#"{}\s*=\s*(True|False)"#, regex::escape(key));
    match Regex::new(&pattern).ok().and_then(|re| re.captures(body)) {
        Some(c) => &c[1] == "True",
        None => default,
    }
}

fn kwarg_int(body: &str, key: &str, default: i32) -> i32 {
    let pattern = format!(r#"{}\s*=\s*(-?\d+)"#, regex::escape(key));
    Regex::new(&pattern)
        .ok()
        .and_then(|re| re.captures(body))
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(default)
}

fn quoted_strings(text: &str) -> Vec<String> {
    Regex::new(r#""([^"]*)""#)
        .unwrap()
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

/// Either `key`'s quoted value, if given by keyword, or the `index`th
/// bare quoted string in the call body.
fn string_arg(body: &str, key: &str, index: usize) -> Option<String> {
    kwarg_string(body, key).or_else(|| quoted_strings(body).into_iter().nth(index))
}

fn list_arg(body: &str, key: &str) -> Vec<String> {
    let pattern = format!(r#"{}\s*=\s*\[([^\]]*)\]"#, regex::escape(key));
    match Regex::new(&pattern).ok().and_then(|re| re.captures(body)) {
        Some(c) => quoted_strings(&c[1]),
        None => quoted_strings(body),
    }
}

/// Parses `source` into its declared statements. Never fails outright —
/// a call whose arguments don't match the expected shape is simply
/// dropped, since a best-effort reading is more useful to this demo
/// driver than aborting the whole build over one malformed line.
pub fn parse_module_dot_bazel(source: &str) -> ParsedModuleDotBazel {
    let mut statements = Vec::new();

    for body in find_calls(source, "bazel_dep") {
        let Some(name) = string_arg(body, "name", 0) else { continue };
        let version = string_arg(body, "version", 1);
        let repo_name = kwarg_string(body, "repo_name").unwrap_or_else(|| name.clone());
        statements.push(ModuleDotBazelStatement::BazelDep {
            name,
            version,
            max_compatibility_level: kwarg_int(body, "max_compatibility_level", 0),
            repo_name: ApparentRepoName::new(repo_name),
            dev_dependency: kwarg_bool(body, "dev_dependency", false),
        });
    }

    for body in find_calls(source, "module") {
        let Some(name) = string_arg(body, "name", 0) else { continue };
        let version = string_arg(body, "version", 1);
        let repo_name = kwarg_string(body, "repo_name").unwrap_or_else(|| name.clone());
        statements.push(ModuleDotBazelStatement::Module {
            name,
            version,
            compatibility_level: kwarg_int(body, "compatibility_level", 0),
            repo_name: ApparentRepoName::new(repo_name),
            bazel_compatibility: list_arg(body, "bazel_compatibility"),
        });
    }

    for body in find_calls(source, "register_execution_platforms") {
        let platform_labels = quoted_strings(body)
            .into_iter()
            .filter_map(|label| label.parse::<ApparentLabel>().ok())
            .collect();
        statements.push(ModuleDotBazelStatement::RegisterExecutionPlatforms {
            platform_labels,
            dev_dependency: kwarg_bool(body, "dev_dependency", false),
        });
    }

    for body in find_calls(source, "register_toolchains") {
        let toolchain_labels = quoted_strings(body)
            .into_iter()
            .filter_map(|label| label.parse::<ApparentLabel>().ok())
            .collect();
        statements.push(ModuleDotBazelStatement::RegisterToolchains {
            toolchain_labels,
            dev_dependency: kwarg_bool(body, "dev_dependency", false),
        });
    }

    for body in find_calls(source, "use_extension") {
        let (Some(extension_bzl_file), Some(extension_name)) = (
            string_arg(body, "extension_bzl_file", 0).and_then(|s| s.parse::<ApparentLabel>().ok()),
            string_arg(body, "extension_name", 1),
        ) else {
            continue;
        };
        statements.push(ModuleDotBazelStatement::UseExtension {
            extension_bzl_file,
            extension_name,
            dev_dependency: kwarg_bool(body, "dev_dependency", false),
            isolate: kwarg_bool(body, "isolate", false),
        });
    }

    for body in find_calls(source, "use_repo_rule") {
        let (Some(repo_rule_bzl_file), Some(repo_rule_name)) = (
            string_arg(body, "repo_rule_bzl_file", 0).and_then(|s| s.parse::<ApparentLabel>().ok()),
            string_arg(body, "repo_rule_name", 1),
        ) else {
            continue;
        };
        statements.push(ModuleDotBazelStatement::UseRepoRule {
            repo_rule_bzl_file,
            repo_rule_name,
        });
    }

    ParsedModuleDotBazel { statements }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_bazel_dep_with_keyword_args() {
        let parsed = parse_module_dot_bazel(r#"bazel_dep(name = "rules_cc", version = "0.0.9")"#);
        assert_eq!(parsed.statements.len(), 1);
        match &parsed.statements[0] {
            ModuleDotBazelStatement::BazelDep { name, version, repo_name, .. } => {
                assert_eq!(name, "rules_cc");
                assert_eq!(version.as_deref(), Some("0.0.9"));
                assert_eq!(repo_name, &ApparentRepoName::new("rules_cc"));
            }
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn parses_a_module_declaration() {
        let parsed = parse_module_dot_bazel(r#"module(name = "my_module", version = "1.0")"#);
        assert_eq!(parsed.statements.len(), 1);
        assert!(matches!(parsed.statements[0], ModuleDotBazelStatement::Module { .. }));
    }

    #[test]
    fn parses_register_execution_platforms_with_multiple_labels() {
        let parsed = parse_module_dot_bazel(r#"register_execution_platforms("//platforms:a", "//platforms:b")"#);
        match &parsed.statements[0] {
            ModuleDotBazelStatement::RegisterExecutionPlatforms { platform_labels, .. } => {
                assert_eq!(platform_labels.len(), 2);
            }
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn ignores_calls_with_unparseable_names() {
        let parsed = parse_module_dot_bazel(r#"bazel_dep(version = "0.0.1")"#);
        assert!(parsed.statements.is_empty());
    }

    #[test]
    fn does_not_match_a_call_with_a_longer_identifier_prefix() {
        let parsed = parse_module_dot_bazel(r#"my_bazel_dep(name = "rules_cc")"#);
        assert!(parsed.statements.is_empty());
    }
}
