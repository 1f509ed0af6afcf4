mod builtins;
mod compile;
mod error;

pub use builtins::{assemble_build_file_builtins, assemble_bzl_file_builtins, trim_builtin_module_names, DecodedGlobalsSource};
pub use compile::{compile_bzl_file, global_lookup, CompiledProgram};
pub use error::LoaderError;
