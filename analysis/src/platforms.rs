use skybuild_labels::CanonicalLabel;
use thiserror::Error;

const PLATFORM_INFO_PROVIDER_IDENTIFIER: &str = "@@builtins_core+//:exports.bzl%PlatformInfo";

/// One `register_execution_platforms` entry, decoded from its
/// `PlatformInfo` provider instance. Constraints and exec properties
/// are carried pre-sorted so callers never need to re-sort before
/// hashing the record into a content address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlatform {
    pub label: CanonicalLabel,
    pub constraints: Vec<(CanonicalLabel, CanonicalLabel)>,
    pub exec_properties: Vec<(String, String)>,
}

/// A provider instance attached to a `ConfiguredTarget`, identified by
/// its fully-qualified provider identifier. `providers` must already be
/// sorted by identifier, as the configured-target computation emits
/// them, so [`find_platform_info`] can binary search instead of
/// scanning linearly.
pub struct ProviderInstance<'a> {
    pub identifier: &'a str,
    pub constraints: Vec<(CanonicalLabel, CanonicalLabel)>,
    pub exec_properties: Vec<(String, String)>,
}

#[derive(Error, Debug, PartialEq)]
pub enum PlatformError {
    #[error("configured target for {0} does not provide PlatformInfo")]
    MissingPlatformInfo(String),
    #[error("failed to find registered execution platforms in any of the MODULE.bazel files")]
    NoPlatformsRegistered,
}

/// Binary search over a `ConfiguredTarget`'s sorted provider list for
/// `PlatformInfo`, as `register_execution_platforms` resolution does
/// for every platform label it's given.
pub fn find_platform_info<'a>(
    providers: &'a [ProviderInstance<'a>],
    platform_label: &CanonicalLabel,
) -> Result<&'a ProviderInstance<'a>, PlatformError> {
    providers
        .binary_search_by(|p| p.identifier.cmp(PLATFORM_INFO_PROVIDER_IDENTIFIER))
        .ok()
        .map(|i| &providers[i])
        .ok_or_else(|| PlatformError::MissingPlatformInfo(platform_label.to_string()))
}

/// Builds the final `RegisteredExecutionPlatforms` value: one
/// [`ExecutionPlatform`] per resolved platform label, each with its
/// constraints sorted by setting label and exec properties sorted by
/// name. Errors if the module-graph visit registered zero platforms —
/// a build with no execution platforms at all can never select a
/// toolchain.
pub fn assemble_registered_execution_platforms(
    mut platforms: Vec<ExecutionPlatform>,
) -> Result<Vec<ExecutionPlatform>, PlatformError> {
    if platforms.is_empty() {
        return Err(PlatformError::NoPlatformsRegistered);
    }
    for platform in &mut platforms {
        platform.constraints.sort_by(|a, b| a.0.to_string().cmp(&b.0.to_string()));
        platform.exec_properties.sort_by(|a, b| a.0.cmp(&b.0));
    }
    Ok(platforms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(s: &str) -> CanonicalLabel {
        s.parse().unwrap()
    }

    #[test]
    fn finds_platform_info_by_binary_search() {
        let providers = vec![
            ProviderInstance {
                identifier: "@@a+//:exports.bzl%Alpha",
                constraints: vec![],
                exec_properties: vec![],
            },
            ProviderInstance {
                identifier: PLATFORM_INFO_PROVIDER_IDENTIFIER,
                constraints: vec![],
                exec_properties: vec![],
            },
            ProviderInstance {
                identifier: "@@z+//:exports.bzl%Zeta",
                constraints: vec![],
                exec_properties: vec![],
            },
        ];
        let found = find_platform_info(&providers, &label("@@p+//:platform")).unwrap();
        assert_eq!(found.identifier, PLATFORM_INFO_PROVIDER_IDENTIFIER);
    }

    #[test]
    fn missing_platform_info_is_an_error() {
        let providers = vec![ProviderInstance {
            identifier: "@@a+//:exports.bzl%Alpha",
            constraints: vec![],
            exec_properties: vec![],
        }];
        assert!(find_platform_info(&providers, &label("@@p+//:platform")).is_err());
    }

    #[test]
    fn sorts_constraints_and_exec_properties() {
        let platforms = vec![ExecutionPlatform {
            label: label("@@p+//:platform"),
            constraints: vec![
                (label("@@z+//:zzz"), label("@@z+//:val")),
                (label("@@a+//:aaa"), label("@@a+//:val")),
            ],
            exec_properties: vec![("zzz".to_string(), "1".to_string()), ("aaa".to_string(), "2".to_string())],
        }];
        let assembled = assemble_registered_execution_platforms(platforms).unwrap();
        assert_eq!(assembled[0].constraints[0].0.to_string(), "@@a+//:aaa");
        assert_eq!(assembled[0].exec_properties[0].0, "aaa");
    }

    #[test]
    fn empty_platform_list_is_an_error() {
        assert_eq!(
            assemble_registered_execution_platforms(vec![]).unwrap_err(),
            PlatformError::NoPlatformsRegistered
        );
    }
}
