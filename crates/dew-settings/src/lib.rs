//! # dew-settings
//!
//! Configuration for the dewbridge relay.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`BridgeSettings::default()`]
//! 2. **Settings file**: `~/.dewbridge/settings.json` or an explicit path
//! 3. **Environment variables**: `DEW_*` overrides (highest priority)
//!
//! The binary may layer CLI flags on top before calling
//! [`BridgeSettings::validate`].

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings_file, load_settings_from_path, resolve_logging,
    settings_path,
};
pub use types::*;
