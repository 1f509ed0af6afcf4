use std::collections::HashMap;

use skybuild_labels::{ApparentLabel, ModuleInstance};
use thiserror::Error;

/// The identity of one `use_extension()` call site: which `.bzl` file
/// defines it and which top-level name it was bound to inside that
/// file. `isolate` calls get a private instance per call site, so they
/// never merge with anyone else's usage even if the identity matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExtensionIdentity {
    pub bzl_file: ApparentLabel,
    pub extension_name: String,
}

/// One module instance's use of an extension, in the order its
/// `use_extension()` call was evaluated.
#[derive(Debug, Clone)]
pub struct ExtensionUsage {
    pub user: ModuleInstance,
    pub dev_dependency: bool,
    pub isolate: bool,
}

/// All usages of one extension, grouped in first-use BFS order.
#[derive(Debug, Clone)]
pub struct UsedModuleExtension {
    pub identity: ExtensionIdentity,
    pub usages: Vec<ExtensionUsage>,
}

#[derive(Error, Debug, PartialEq)]
pub enum ExtensionError {
    /// The "safety belt": a short extension name bound to two different
    /// `.bzl` files somewhere in the module graph. Harmless on its own,
    /// but almost always indicates a name collision the author didn't
    /// intend, so it's rejected rather than silently resolved by
    /// first-use order.
    #[error("extension name {name:?} is ambiguous: bound to both {first} and {second}")]
    AmbiguousExtensionName {
        name: String,
        first: String,
        second: String,
    },
}

/// Accumulates `use_extension()` calls into grouped [`UsedModuleExtension`]
/// records, in the BFS visit order the module graph is walked in.
#[derive(Default)]
pub struct ExtensionAccumulator {
    order: Vec<ExtensionIdentity>,
    by_identity: HashMap<ExtensionIdentity, UsedModuleExtension>,
    names_seen: HashMap<String, ApparentLabel>,
}

impl ExtensionAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one `use_extension()` call, applying the safety-belt
    /// check against every extension name seen so far regardless of
    /// which `.bzl` file declared it.
    pub fn record(
        &mut self,
        user: ModuleInstance,
        bzl_file: ApparentLabel,
        extension_name: String,
        dev_dependency: bool,
        isolate: bool,
    ) -> Result<(), ExtensionError> {
        if let Some(existing_bzl_file) = self.names_seen.get(&extension_name) {
            if *existing_bzl_file != bzl_file {
                return Err(ExtensionError::AmbiguousExtensionName {
                    name: extension_name,
                    first: existing_bzl_file.to_string(),
                    second: bzl_file.to_string(),
                });
            }
        } else {
            self.names_seen.insert(extension_name.clone(), bzl_file.clone());
        }

        let identity = ExtensionIdentity {
            bzl_file,
            extension_name,
        };
        let usage = ExtensionUsage {
            user,
            dev_dependency,
            isolate,
        };

        match self.by_identity.get_mut(&identity) {
            Some(existing) => existing.usages.push(usage),
            None => {
                self.order.push(identity.clone());
                self.by_identity.insert(
                    identity.clone(),
                    UsedModuleExtension {
                        identity,
                        usages: vec![usage],
                    },
                );
            }
        }
        Ok(())
    }

    /// Emits every recorded extension, in first-use order.
    pub fn finish(self) -> Vec<UsedModuleExtension> {
        self.order
            .into_iter()
            .map(|identity| self.by_identity[&identity].clone())
            .collect()
    }
}

impl Clone for UsedModuleExtension {
    fn clone(&self) -> Self {
        Self {
            identity: self.identity.clone(),
            usages: self.usages.clone(),
        }
    }
}

impl Clone for ExtensionUsage {
    fn clone(&self) -> Self {
        Self {
            user: self.user.clone(),
            dev_dependency: self.dev_dependency,
            isolate: self.isolate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(s: &str) -> ApparentLabel {
        s.parse().unwrap()
    }

    fn module(name: &str) -> ModuleInstance {
        ModuleInstance::new(name, None)
    }

    #[test]
    fn groups_usages_by_identity_in_first_use_order() {
        let mut acc = ExtensionAccumulator::new();
        acc.record(module("root"), label("//:extensions.bzl"), "ext".to_string(), false, false)
            .unwrap();
        acc.record(module("a"), label("//:extensions.bzl"), "ext".to_string(), false, false)
            .unwrap();
        acc.record(module("root"), label("//:other.bzl"), "other".to_string(), false, false)
            .unwrap();

        let extensions = acc.finish();
        assert_eq!(extensions.len(), 2);
        assert_eq!(extensions[0].identity.extension_name, "ext");
        assert_eq!(extensions[0].usages.len(), 2);
        assert_eq!(extensions[0].usages[0].user.module, "root");
        assert_eq!(extensions[0].usages[1].user.module, "a");
        assert_eq!(extensions[1].identity.extension_name, "other");
    }

    #[test]
    fn isolated_usages_still_group_by_identity() {
        let mut acc = ExtensionAccumulator::new();
        acc.record(module("root"), label("//:extensions.bzl"), "ext".to_string(), false, true)
            .unwrap();
        acc.record(module("root"), label("//:extensions.bzl"), "ext".to_string(), false, true)
            .unwrap();
        let extensions = acc.finish();
        assert_eq!(extensions.len(), 1);
        assert_eq!(extensions[0].usages.len(), 2);
    }

    #[test]
    fn same_name_different_bzl_file_is_ambiguous() {
        let mut acc = ExtensionAccumulator::new();
        acc.record(module("root"), label("//:a.bzl"), "ext".to_string(), false, false).unwrap();
        let err = acc
            .record(module("b"), label("//:b.bzl"), "ext".to_string(), false, false)
            .unwrap_err();
        assert!(matches!(err, ExtensionError::AmbiguousExtensionName { .. }));
    }

    #[test]
    fn same_name_same_bzl_file_from_different_users_is_fine() {
        let mut acc = ExtensionAccumulator::new();
        acc.record(module("root"), label("//:a.bzl"), "ext".to_string(), false, false).unwrap();
        acc.record(module("b"), label("//:a.bzl"), "ext".to_string(), false, false).unwrap();
        assert_eq!(acc.finish().len(), 1);
    }
}
