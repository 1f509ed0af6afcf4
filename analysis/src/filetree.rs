use std::collections::HashMap;

use skybuild_store::Reference;
use thiserror::Error;

/// One entry of a directory's Merkle-tree listing.
#[derive(Debug, Clone)]
pub enum DirectoryEntry {
    Directory(Reference),
    File(Reference),
    /// A symlink's literal target text, resolved relative to the
    /// directory that contains it.
    Symlink(String),
}

/// Reads a directory's entries given its reference. Implemented by the
/// caller as a thin wrapper that downloads and decodes the object
/// through the store.
pub trait DirectoryFetcher {
    fn entries(&self, reference: &Reference) -> Result<HashMap<String, DirectoryEntry>, PathResolutionError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedEntry {
    Directory(Reference),
    File(Reference),
}

#[derive(Error, Debug, PartialEq)]
pub enum PathResolutionError {
    #[error("path not found")]
    NotFound,
    #[error("path component {0:?} is not a directory")]
    NotADirectory(String),
    #[error("symlink resolution exceeded the loop-detection budget")]
    Loop,
    #[error("path escapes the root")]
    EscapesRoot,
    #[error("transport error: {0}")]
    Transport(String),
}

/// Maximum number of symlink hops a single resolution may take before
/// it is assumed to be looping. Matches the conservative bound common
/// filesystem path walkers use (e.g. Linux's `MAXSYMLINKS`).
const MAX_SYMLINK_HOPS: usize = 40;

/// Splits a UNIX-format relative path into its non-empty, non-`.`
/// components, leaving `..` components in place for the walker to
/// interpret against its current scope.
fn parse_components(path: &str) -> Vec<&str> {
    path.split('/').filter(|c| !c.is_empty() && *c != ".").collect()
}

/// Resolves `path` starting from `root`, expanding symlinks as
/// encountered and detecting resolution loops. A `..` component may
/// not walk above `root` — doing so is reported as [`PathResolutionError::EscapesRoot`]
/// rather than silently clamped, since a path that tries to do so is
/// malformed input, not a legitimate relative reference.
pub fn resolve_path(
    root: &Reference,
    path: &str,
    fetch: &impl DirectoryFetcher,
) -> Result<ResolvedEntry, PathResolutionError> {
    let mut scope: Vec<Reference> = vec![root.clone()];
    let mut remaining: Vec<String> = parse_components(path).into_iter().map(str::to_owned).collect();
    let mut hops = 0usize;

    while let Some(component) = remaining.first().cloned() {
        let current_dir = scope.last().expect("scope always has at least the root").clone();

        if component == ".." {
            remaining.remove(0);
            if scope.len() <= 1 {
                return Err(PathResolutionError::EscapesRoot);
            }
            scope.pop();
            continue;
        }

        let entries = fetch.entries(&current_dir)?;
        let entry = entries.get(&component).ok_or(PathResolutionError::NotFound)?;

        let is_last = remaining.len() == 1;
        match entry {
            DirectoryEntry::Directory(reference) => {
                remaining.remove(0);
                scope.push(reference.clone());
                if remaining.is_empty() {
                    return Ok(ResolvedEntry::Directory(reference.clone()));
                }
            }
            DirectoryEntry::File(reference) => {
                if !is_last {
                    return Err(PathResolutionError::NotADirectory(component));
                }
                remaining.remove(0);
                return Ok(ResolvedEntry::File(reference.clone()));
            }
            DirectoryEntry::Symlink(target) => {
                hops += 1;
                if hops > MAX_SYMLINK_HOPS {
                    return Err(PathResolutionError::Loop);
                }
                remaining.remove(0);
                let mut target_components: Vec<String> =
                    parse_components(target).into_iter().map(str::to_owned).collect();
                target_components.extend(remaining);
                remaining = target_components;
                // A relative target resolves from the directory that
                // contains the symlink, i.e. `current_dir` — already
                // the top of `scope`, so only an absolute target needs
                // to reset the walk back to the root.
                if target.starts_with('/') {
                    scope.truncate(1);
                }
            }
        }
    }

    Ok(ResolvedEntry::Directory(scope.last().expect("scope always has at least the root").clone()))
}

/// `FileProperties(repo, path)`: `Ok(None)` is the "exists = null" value
/// for a path that plainly doesn't exist; directories and loops are
/// errors, since this key answers "what is the file at this path".
pub fn file_properties(
    root: &Reference,
    path: &str,
    fetch: &impl DirectoryFetcher,
) -> Result<Option<Reference>, PathResolutionError> {
    match resolve_path(root, path, fetch) {
        Ok(ResolvedEntry::File(reference)) => Ok(Some(reference)),
        Ok(ResolvedEntry::Directory(_)) => Err(PathResolutionError::NotADirectory(path.to_string())),
        Err(PathResolutionError::NotFound) => Ok(None),
        Err(other) => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skybuild_store::ReferenceFormat;

    fn reference(seed: u8) -> Reference {
        Reference::of_contents(ReferenceFormat::default(), &[seed], 0)
    }

    struct FakeTree {
        dirs: HashMap<Reference, HashMap<String, DirectoryEntry>>,
    }

    impl DirectoryFetcher for FakeTree {
        fn entries(&self, reference: &Reference) -> Result<HashMap<String, DirectoryEntry>, PathResolutionError> {
            self.dirs.get(reference).cloned().ok_or(PathResolutionError::NotFound)
        }
    }

    fn single_file_tree() -> (Reference, FakeTree) {
        let root = reference(0);
        let sub = reference(1);
        let file = reference(2);
        let mut dirs = HashMap::new();
        dirs.insert(root.clone(), HashMap::from([("sub".to_string(), DirectoryEntry::Directory(sub.clone()))]));
        dirs.insert(sub, HashMap::from([("file.txt".to_string(), DirectoryEntry::File(file))]));
        (root, FakeTree { dirs })
    }

    #[test]
    fn resolves_nested_file() {
        let (root, tree) = single_file_tree();
        let resolved = resolve_path(&root, "sub/file.txt", &tree).unwrap();
        assert!(matches!(resolved, ResolvedEntry::File(_)));
    }

    #[test]
    fn missing_path_is_not_found() {
        let (root, tree) = single_file_tree();
        assert_eq!(file_properties(&root, "sub/missing.txt", &tree).unwrap(), None);
    }

    #[test]
    fn resolving_to_a_directory_via_file_properties_is_an_error() {
        let (root, tree) = single_file_tree();
        assert!(file_properties(&root, "sub", &tree).is_err());
    }

    #[test]
    fn walking_through_a_file_component_errors() {
        let (root, tree) = single_file_tree();
        let err = resolve_path(&root, "sub/file.txt/more", &tree).unwrap_err();
        assert!(matches!(err, PathResolutionError::NotADirectory(_)));
    }

    #[test]
    fn parent_dir_walks_back_up() {
        let (root, tree) = single_file_tree();
        let resolved = resolve_path(&root, "sub/../sub/file.txt", &tree).unwrap();
        assert!(matches!(resolved, ResolvedEntry::File(_)));
    }

    #[test]
    fn parent_dir_above_root_escapes() {
        let (root, tree) = single_file_tree();
        let err = resolve_path(&root, "../sub", &tree).unwrap_err();
        assert_eq!(err, PathResolutionError::EscapesRoot);
    }

    #[test]
    fn symlink_loop_is_detected() {
        let root = reference(0);
        let mut dirs = HashMap::new();
        dirs.insert(
            root.clone(),
            HashMap::from([("link".to_string(), DirectoryEntry::Symlink("link".to_string()))]),
        );
        let tree = FakeTree { dirs };
        let err = resolve_path(&root, "link", &tree).unwrap_err();
        assert_eq!(err, PathResolutionError::Loop);
    }
}
