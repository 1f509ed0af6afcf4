use std::fmt::{Debug, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::repo::{ApparentRepoName, CanonicalRepoName};

/// If no explicit target name is given, it is inferred from the last path
/// component, mirroring Bazel's `//foo/bar` === `//foo/bar:bar` rule.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TargetName {
    Name(String),
    AllTargetsInPackage,
    AllTargetsRecursive,
}

impl Display for TargetName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetName::Name(name) => write!(f, "{}", name),
            TargetName::AllTargetsInPackage => write!(f, "all"),
            TargetName::AllTargetsRecursive => write!(f, "..."),
        }
    }
}

/// How a label's repo component is written. `None` means the label
/// carried no `@`-sigil at all, and is implicitly scoped to whatever
/// repo it was read from — resolving it never needs a lookup.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RepoRef {
    None,
    Canonical(CanonicalRepoName),
    Apparent(ApparentRepoName),
    /// A literal `@@` with nothing between it and `//`: always denotes
    /// the root module, regardless of which repo the label appears in.
    BareRoot,
}

impl Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepoRef::None => Ok(()),
            RepoRef::Canonical(repo) => write!(f, "{}", repo),
            RepoRef::Apparent(repo) => write!(f, "{}", repo),
            RepoRef::BareRoot => write!(f, "@@"),
        }
    }
}

/// A label, canonical or apparent depending on its [`RepoRef`]. See
/// <https://docs.bazel.build/versions/main/build-ref.html#labels>. Does
/// not refer to a package: `path_components` may be empty (repo root).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Label {
    pub(crate) repo: RepoRef,
    pub(crate) path_components: Vec<String>,
    pub(crate) target_name: TargetName,
}

impl Label {
    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    pub fn path_components(&self) -> &[String] {
        &self.path_components
    }

    pub fn target_name(&self) -> &TargetName {
        &self.target_name
    }

    pub fn is_canonical(&self) -> bool {
        matches!(self.repo, RepoRef::Canonical(_))
    }

    /// Builds the canonical label obtained by replacing this label's
    /// repo component with an already-resolved canonical one, keeping
    /// the package and target untouched.
    pub fn with_canonical_repo(&self, repo: CanonicalRepoName) -> CanonicalLabel {
        CanonicalLabel(Label {
            repo: RepoRef::Canonical(repo),
            path_components: self.path_components.clone(),
            target_name: self.target_name.clone(),
        })
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}//{}", self.repo, self.path_components.join("/"))?;
        match &self.target_name {
            TargetName::AllTargetsRecursive => write!(f, "/..."),
            name => write!(f, ":{}", name),
        }
    }
}

impl Debug for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Label({:?})", self.to_string())
    }
}

/// A label known, by construction, to already carry a canonical repo.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct CanonicalLabel(Label);

impl CanonicalLabel {
    pub fn label(&self) -> &Label {
        &self.0
    }

    pub fn canonical_repo(&self) -> &CanonicalRepoName {
        match &self.0.repo {
            RepoRef::Canonical(repo) => repo,
            _ => unreachable!("CanonicalLabel always carries RepoRef::Canonical"),
        }
    }
}

impl Display for CanonicalLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// A label as written by a user: may still need [`crate::resolve_apparent_label`]
/// before it can address anything.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct ApparentLabel(Label);

impl ApparentLabel {
    pub fn label(&self) -> &Label {
        &self.0
    }

    /// A label already known to be canonical needs no resolution pass.
    pub fn as_canonical(&self) -> Option<CanonicalLabel> {
        match &self.0.repo {
            RepoRef::Canonical(_) => Some(CanonicalLabel(self.0.clone())),
            _ => None,
        }
    }
}

impl Display for ApparentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum LabelParseError {
    #[error("no target name")]
    NoTargetName,
    #[error("empty label")]
    EmptyLabel,
}

impl FromStr for Label {
    type Err = LabelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (repo_part, label) = match s.split_once("//") {
            None => ("", s),
            Some((repo_part, label)) => (repo_part, label),
        };

        let repo = if let Some(name) = repo_part.strip_prefix("@@") {
            if name.is_empty() {
                RepoRef::BareRoot
            } else {
                RepoRef::Canonical(CanonicalRepoName::new(name))
            }
        } else if let Some(name) = repo_part.strip_prefix('@') {
            RepoRef::Apparent(ApparentRepoName::new(name))
        } else if repo_part.is_empty() {
            RepoRef::None
        } else {
            return Err(LabelParseError::EmptyLabel);
        };

        let (package, target) = match label.split_once(':') {
            Some((package, target)) => (package, Some(target)),
            None => (label, None),
        };

        let path_components: Vec<String> = if package.is_empty() {
            Vec::new()
        } else {
            package.split('/').map(|s| s.to_string()).collect()
        };

        if target.is_none() && path_components.last().map(|s| s.as_str()) == Some("...") {
            let mut path_components = path_components;
            path_components.pop();
            return Ok(Self {
                repo,
                path_components,
                target_name: TargetName::AllTargetsRecursive,
            });
        }

        let target_name = match (path_components.last(), target) {
            (_, Some("...")) => return Err(LabelParseError::NoTargetName),
            (_, Some(target)) => TargetName::Name(target.to_string()),
            (None, None) => return Err(LabelParseError::EmptyLabel),
            (Some(last), None) => TargetName::Name(last.clone()),
        };

        Ok(Self {
            repo,
            path_components,
            target_name,
        })
    }
}

impl FromStr for ApparentLabel {
    type Err = LabelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ApparentLabel(s.parse()?))
    }
}

impl FromStr for CanonicalLabel {
    type Err = LabelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label: Label = s.parse()?;
        if !label.is_canonical() {
            return Err(LabelParseError::EmptyLabel);
        }
        Ok(CanonicalLabel(label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_label() {
        let label: Label = "@@foo+v1//bar:baz".parse().unwrap();
        assert_eq!(label.repo, RepoRef::Canonical(CanonicalRepoName::new("foo+v1")));
        assert_eq!(label.path_components, vec!["bar".to_string()]);
        assert_eq!(label.target_name, TargetName::Name("baz".to_string()));
        assert_eq!(label.to_string(), "@@foo+v1//bar:baz");
    }

    #[test]
    fn parses_apparent_label_with_repo_prefix() {
        let label: Label = "@foo//bar:baz".parse().unwrap();
        assert_eq!(label.repo, RepoRef::Apparent(ApparentRepoName::new("foo")));
    }

    #[test]
    fn parses_bare_root_label() {
        let label: Label = "@@//bar:baz".parse().unwrap();
        assert_eq!(label.repo, RepoRef::BareRoot);
    }

    #[test]
    fn parses_label_with_no_repo_prefix() {
        let label: Label = "//bar:baz".parse().unwrap();
        assert_eq!(label.repo, RepoRef::None);
    }

    #[test]
    fn infers_target_name_from_last_path_component() {
        let label: Label = "//foo/bar".parse().unwrap();
        assert_eq!(label.target_name, TargetName::Name("bar".to_string()));
    }

    #[test]
    fn recognizes_recursive_wildcard() {
        let label: Label = "//foo/bar/...".parse().unwrap();
        assert_eq!(label.path_components, vec!["foo".to_string(), "bar".to_string()]);
        assert_eq!(label.target_name, TargetName::AllTargetsRecursive);
        assert_eq!(label.to_string(), "//foo/bar/...");
    }

    #[test]
    fn rejects_empty_label() {
        assert_eq!("@@foo//".parse::<Label>(), Err(LabelParseError::EmptyLabel));
    }

    #[test]
    fn canonical_label_rejects_apparent_input() {
        assert!("@foo//bar:baz".parse::<CanonicalLabel>().is_err());
        assert!("@@foo+v1//bar:baz".parse::<CanonicalLabel>().is_ok());
    }
}
