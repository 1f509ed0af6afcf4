//! Bridges a real on-disk checkout into the Merkle-tree-addressed
//! [`skybuild_analysis::DirectoryFetcher`] the analysis engine expects,
//! by scanning it once up front into an in-memory content-addressed
//! tree. This mirrors, in miniature, what the store crate's own
//! ingestion path does for persisted objects.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use skybuild_analysis::{DirectoryEntry, DirectoryFetcher, PathResolutionError};
use skybuild_store::{Reference, ReferenceFormat};

pub struct FsDirectoryFetcher {
    dirs: HashMap<Reference, HashMap<String, DirectoryEntry>>,
}

impl DirectoryFetcher for FsDirectoryFetcher {
    fn entries(&self, reference: &Reference) -> Result<HashMap<String, DirectoryEntry>, PathResolutionError> {
        self.dirs.get(reference).cloned().ok_or(PathResolutionError::NotFound)
    }
}

/// Scans `root` into a Merkle tree, returning the fetcher that answers
/// [`DirectoryFetcher::entries`] for every directory discovered and the
/// reference that addresses `root` itself.
pub fn scan_directory_tree(root: &Path) -> Result<(Reference, FsDirectoryFetcher)> {
    let mut dirs = HashMap::new();
    let reference =
        scan_directory(root, &mut dirs).with_context(|| format!("scanning {}", root.display()))?;
    Ok((reference, FsDirectoryFetcher { dirs }))
}

fn scan_directory(path: &Path, dirs: &mut HashMap<Reference, HashMap<String, DirectoryEntry>>) -> Result<Reference> {
    let mut read_entries: Vec<fs::DirEntry> = fs::read_dir(path)
        .with_context(|| format!("reading directory {}", path.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    read_entries.sort_by_key(|e| e.file_name());

    let mut entries: Vec<(String, DirectoryEntry)> = Vec::with_capacity(read_entries.len());
    for entry in read_entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        let child_path = entry.path();
        let file_type = entry.file_type()?;

        let child_entry = if file_type.is_symlink() {
            let target = fs::read_link(&child_path)?;
            DirectoryEntry::Symlink(target.to_string_lossy().into_owned())
        } else if file_type.is_dir() {
            DirectoryEntry::Directory(scan_directory(&child_path, dirs)?)
        } else {
            let contents = fs::read(&child_path).with_context(|| format!("reading {}", child_path.display()))?;
            DirectoryEntry::File(Reference::of_contents(ReferenceFormat::default(), &contents, 0))
        };
        entries.push((name, child_entry));
    }

    let body = encode_listing(&entries);
    let reference = Reference::of_contents(ReferenceFormat::default(), &body, entries.len());
    dirs.insert(reference, entries.into_iter().collect());
    Ok(reference)
}

/// A stable byte encoding of a directory listing, sorted by name, used
/// only to mint the directory's own reference — never decoded back.
fn encode_listing(entries: &[(String, DirectoryEntry)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, entry) in entries {
        body.extend_from_slice(&(name.len() as u32).to_le_bytes());
        body.extend_from_slice(name.as_bytes());
        match entry {
            DirectoryEntry::Directory(reference) => {
                body.push(0);
                body.extend_from_slice(&reference.to_key_bytes());
            }
            DirectoryEntry::File(reference) => {
                body.push(1);
                body.extend_from_slice(&reference.to_key_bytes());
            }
            DirectoryEntry::Symlink(target) => {
                body.push(2);
                body.extend_from_slice(&(target.len() as u32).to_le_bytes());
                body.extend_from_slice(target.as_bytes());
            }
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use skybuild_analysis::{resolve_path, ResolvedEntry};

    #[test]
    fn scans_nested_files_into_a_resolvable_tree() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("pkg")).unwrap();
        std::fs::write(dir.path().join("pkg/BUILD"), b"# empty").unwrap();
        std::fs::write(dir.path().join("MODULE.bazel"), b"module(name = \"root\")").unwrap();

        let (root, fetcher) = scan_directory_tree(dir.path()).unwrap();
        let resolved = resolve_path(&root, "pkg/BUILD", &fetcher).unwrap();
        assert!(matches!(resolved, ResolvedEntry::File(_)));
        let resolved = resolve_path(&root, "MODULE.bazel", &fetcher).unwrap();
        assert!(matches!(resolved, ResolvedEntry::File(_)));
    }

    #[test]
    fn same_contents_scanned_twice_mint_the_same_root_reference() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        let (first, _) = scan_directory_tree(dir.path()).unwrap();
        let (second, _) = scan_directory_tree(dir.path()).unwrap();
        assert_eq!(first, second);
    }
}
