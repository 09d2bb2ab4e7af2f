//! ownable-lib: the build and packaging pipeline for digital ownables.
//!
//! A project directory goes in, a deterministic `<name>.zip` comes out:
//! - `project`: descriptor, kind and precondition checks
//! - `toolchain`: the compiler boundary (`CommandRunner`)
//! - `schema`: schema bundles and their cache
//! - `assets`: media selection, validation and placement
//! - `provenance`: the signed event chain (`Signer`)
//! - `package`: staging tree and archive assembly
//! - `build`: the orchestrator tying the stages together

pub mod assets;
pub mod build;
pub mod consts;
pub mod package;
pub mod platform;
pub mod project;
pub mod provenance;
pub mod schema;
pub mod toolchain;
pub mod util;
