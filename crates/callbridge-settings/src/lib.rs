//! # callbridge-settings
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`CallbridgeSettings::default()`]
//! 2. **Settings file**: optional JSON, deep-merged over defaults
//! 3. **Environment variables**: `PORT` and `CALLBRIDGE_*` overrides
//!
//! Command-line flags are applied on top by the binary.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, load_settings_with};
pub use types::{CallbridgeSettings, LoggingSettings, ServerSettings, SessionSettings};
