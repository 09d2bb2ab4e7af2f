//! Fixed names shared across the pipeline.

pub const APP_NAME: &str = "ownable";

/// Project manifest read for the descriptor.
pub const MANIFEST_FILE: &str = "Cargo.toml";
/// Optional marker/config file selecting the ownable kind.
pub const OWNABLE_CONFIG_FILE: &str = "Ownable.toml";

pub const SOURCE_DIR: &str = "src";
pub const ASSETS_DIR: &str = "assets";
pub const DISPLAY_DOCUMENT: &str = "index.html";
pub const IMAGES_DIR: &str = "images";
pub const AUDIO_DIR: &str = "audio";
/// Where schema generation writes documents inside the project.
pub const SCHEMA_DIR: &str = "schema";

/// Hidden project directory holding the project-scoped schema cache.
pub const PROJECT_STATE_DIR: &str = ".ownable";

/// Network tag stamped into provenance records when none is configured.
pub const DEFAULT_NETWORK: &str = "T";

/// Compilation target for the contract artifact.
pub const WASM_TARGET: &str = "wasm32-unknown-unknown";

/// Length of the truncated content hash used for provenance chain ids.
pub const CHAIN_ID_LEN: usize = 40;
