mod label;
mod module_graph;
mod repo;
mod resolve;

pub use label::{ApparentLabel, CanonicalLabel, Label, LabelParseError, RepoRef, TargetName};
pub use module_graph::{
    visit_module_dot_bazel_files_breadth_first, ModuleDotBazelHandler, ModuleDotBazelStatement,
    ParsedModuleDotBazel,
};
pub use repo::{ApparentRepoName, CanonicalRepoName, CanonicalRepoNameParseError, ModuleInstance};
pub use resolve::{resolve_apparent_label, ApparentRepoResolver};
