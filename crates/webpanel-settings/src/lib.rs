//! # webpanel-settings
//!
//! Configuration for the web panel, loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`PanelSettings::default()`]
//! 2. **Config file**: `config.json` in the working directory, or the path in
//!    `WEBPANEL_CONFIG` (deep-merged over defaults)
//! 3. **Environment variables**: `WEBPANEL_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, lift_legacy_keys, load_settings, load_settings_from_path, settings_path};
pub use types::*;
