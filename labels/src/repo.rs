use std::fmt::{Debug, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A globally unique repo name of the form `<module>+<instance>`, or the
/// empty string for the root module's own repo. Carried without its `@@`
/// sigil; callers add it at display time.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CanonicalRepoName(String);

impl CanonicalRepoName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The root module is always addressed by the empty canonical repo.
    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CanonicalRepoName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@@{}", self.0)
    }
}

impl Debug for CanonicalRepoName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CanonicalRepoName({:?})", self.0)
    }
}

/// A user-visible repo name, valid only within the scope that declared
/// the mapping to it (a module's own `bazel_dep`/`use_repo` calls).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApparentRepoName(String);

impl ApparentRepoName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ApparentRepoName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl Debug for ApparentRepoName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApparentRepoName({:?})", self.0)
    }
}

/// The name and version of one instance of a module in the dependency
/// graph. Two modules with the same name but different versions (under
/// a multiple-version override) are distinct instances.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct ModuleInstance {
    pub module: String,
    pub version: Option<String>,
}

impl ModuleInstance {
    pub fn new(module: impl Into<String>, version: Option<String>) -> Self {
        Self {
            module: module.into(),
            version,
        }
    }

    /// The canonical repo name this instance is addressed by, absent
    /// any multiple-version disambiguation suffix.
    pub fn bare_canonical_repo(&self) -> CanonicalRepoName {
        match &self.version {
            Some(version) => CanonicalRepoName::new(format!("{}+{}", self.module, version)),
            None => CanonicalRepoName::new(self.module.clone()),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum CanonicalRepoNameParseError {
    #[error("canonical repo name must start with @@")]
    MissingSigil,
}

impl FromStr for CanonicalRepoName {
    type Err = CanonicalRepoNameParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix("@@") {
            Some(rest) => Ok(CanonicalRepoName::new(rest)),
            None => Err(CanonicalRepoNameParseError::MissingSigil),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_repo_is_empty_and_displays_as_bare_sigil() {
        let root = CanonicalRepoName::root();
        assert!(root.is_root());
        assert_eq!(root.to_string(), "@@");
    }

    #[test]
    fn non_root_repo_displays_with_name() {
        let repo = CanonicalRepoName::new("foo+v1");
        assert_eq!(repo.to_string(), "@@foo+v1");
    }

    #[test]
    fn module_instance_without_version_has_bare_module_name_as_repo() {
        let instance = ModuleInstance::new("foo", None);
        assert_eq!(instance.bare_canonical_repo(), CanonicalRepoName::new("foo"));
    }

    #[test]
    fn module_instance_with_version_appends_it() {
        let instance = ModuleInstance::new("foo", Some("v1".to_string()));
        assert_eq!(instance.bare_canonical_repo(), CanonicalRepoName::new("foo+v1"));
    }

    #[test]
    fn parses_canonical_repo_from_string() {
        assert_eq!("@@foo+v1".parse(), Ok(CanonicalRepoName::new("foo+v1")));
        assert_eq!(
            "foo+v1".parse::<CanonicalRepoName>(),
            Err(CanonicalRepoNameParseError::MissingSigil)
        );
    }
}
