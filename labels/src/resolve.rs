use skybuild_evaluator::EvalError;

use crate::label::{ApparentLabel, CanonicalLabel, RepoRef};
use crate::repo::CanonicalRepoName;

/// The two derived lookups `resolve_apparent_label` needs. Implemented by
/// the caller as a thin wrapper around an [`skybuild_evaluator::Environment`];
/// kept as a trait here so this crate doesn't need to know the concrete
/// `Key`/`Value` types the analysis layer evaluates over.
pub trait ApparentRepoResolver {
    /// The canonical repo that `to_apparent_repo` maps to from within
    /// `from_repo`'s scope. `Ok(None)` signals a missing dependency (the
    /// mapping isn't known yet), which the caller must propagate
    /// unchanged, not treat as "no such mapping".
    fn canonical_repo_name(
        &self,
        from_repo: &CanonicalRepoName,
        to_apparent_repo: &str,
    ) -> Result<Option<CanonicalRepoName>, EvalError>;

    /// The root module's own bare canonical repo (always the empty
    /// repo name, but obtaining it still depends on the module graph
    /// having been resolved at least once).
    fn root_module_bare_canonical_repo(&self) -> Result<Option<CanonicalRepoName>, EvalError>;
}

/// Canonicalizes `label`, which is understood to have been read from
/// `from_repo`'s scope (its `RepoRef::None` case resolves to `from_repo`
/// with no lookup at all).
///
/// Returns `Ok(None)` if resolution is blocked on a missing dependency;
/// the caller's own computation must then also restart.
pub fn resolve_apparent_label(
    resolver: &impl ApparentRepoResolver,
    from_repo: &CanonicalRepoName,
    label: &ApparentLabel,
) -> Result<Option<CanonicalLabel>, EvalError> {
    let inner = label.label();
    match inner.repo() {
        RepoRef::Canonical(_) => Ok(label.as_canonical()),
        RepoRef::None => Ok(Some(inner.with_canonical_repo(from_repo.clone()))),
        RepoRef::Apparent(to_apparent_repo) => {
            match resolver.canonical_repo_name(from_repo, to_apparent_repo.as_str())? {
                Some(canonical_repo) => Ok(Some(inner.with_canonical_repo(canonical_repo))),
                None => Ok(None),
            }
        }
        RepoRef::BareRoot => match resolver.root_module_bare_canonical_repo()? {
            Some(canonical_repo) => Ok(Some(inner.with_canonical_repo(canonical_repo))),
            None => Ok(None),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct FakeResolver {
        mapping: Vec<((CanonicalRepoName, String), CanonicalRepoName)>,
        root: Option<CanonicalRepoName>,
        calls: RefCell<usize>,
    }

    impl ApparentRepoResolver for FakeResolver {
        fn canonical_repo_name(
            &self,
            from_repo: &CanonicalRepoName,
            to_apparent_repo: &str,
        ) -> Result<Option<CanonicalRepoName>, EvalError> {
            *self.calls.borrow_mut() += 1;
            Ok(self
                .mapping
                .iter()
                .find(|((from, to), _)| from == from_repo && to == to_apparent_repo)
                .map(|(_, canonical)| canonical.clone()))
        }

        fn root_module_bare_canonical_repo(&self) -> Result<Option<CanonicalRepoName>, EvalError> {
            Ok(self.root.clone())
        }
    }

    #[test]
    fn already_canonical_label_is_returned_unchanged() {
        let resolver = FakeResolver {
            mapping: vec![],
            root: None,
            calls: RefCell::new(0),
        };
        let label: ApparentLabel = "@@foo+v1//bar:baz".parse().unwrap();
        let resolved = resolve_apparent_label(&resolver, &CanonicalRepoName::new("irrelevant"), &label)
            .unwrap()
            .unwrap();
        assert_eq!(resolved.canonical_repo(), &CanonicalRepoName::new("foo+v1"));
        assert_eq!(*resolver.calls.borrow(), 0);
    }

    #[test]
    fn no_prefix_label_resolves_to_from_repo_without_a_lookup() {
        let resolver = FakeResolver {
            mapping: vec![],
            root: None,
            calls: RefCell::new(0),
        };
        let label: ApparentLabel = "//bar:baz".parse().unwrap();
        let from_repo = CanonicalRepoName::new("foo+v1");
        let resolved = resolve_apparent_label(&resolver, &from_repo, &label).unwrap().unwrap();
        assert_eq!(resolved.canonical_repo(), &from_repo);
        assert_eq!(*resolver.calls.borrow(), 0);
    }

    #[test]
    fn apparent_repo_prefix_consults_the_mapping() {
        let from_repo = CanonicalRepoName::new("foo+v1");
        let resolver = FakeResolver {
            mapping: vec![((from_repo.clone(), "dep".to_string()), CanonicalRepoName::new("bar+v2"))],
            root: None,
            calls: RefCell::new(0),
        };
        let label: ApparentLabel = "@dep//baz:qux".parse().unwrap();
        let resolved = resolve_apparent_label(&resolver, &from_repo, &label).unwrap().unwrap();
        assert_eq!(resolved.canonical_repo(), &CanonicalRepoName::new("bar+v2"));
        assert_eq!(*resolver.calls.borrow(), 1);
    }

    #[test]
    fn unmapped_apparent_repo_is_a_missing_dependency() {
        let from_repo = CanonicalRepoName::new("foo+v1");
        let resolver = FakeResolver {
            mapping: vec![],
            root: None,
            calls: RefCell::new(0),
        };
        let label: ApparentLabel = "@dep//baz:qux".parse().unwrap();
        assert_eq!(resolve_apparent_label(&resolver, &from_repo, &label).unwrap(), None);
    }

    #[test]
    fn bare_root_prefix_rewrites_to_the_root_modules_repo() {
        let resolver = FakeResolver {
            mapping: vec![],
            root: Some(CanonicalRepoName::root()),
            calls: RefCell::new(0),
        };
        let label: ApparentLabel = "@@//bar:baz".parse().unwrap();
        let resolved = resolve_apparent_label(&resolver, &CanonicalRepoName::new("foo+v1"), &label)
            .unwrap()
            .unwrap();
        assert!(resolved.canonical_repo().is_root());
    }
}
