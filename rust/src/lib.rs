pub mod config_store;
pub mod controller;
pub mod debounce;
pub mod export;
pub mod form_state;
pub mod gating;
pub mod generation;
pub mod history_store;
pub mod launcher;
pub mod local_storage;
pub mod main_ui_html;
pub mod path_utils;
pub mod renderer;
pub mod selection;
pub mod server;

/// Prefix of the per-field "last submission" keys.
pub const LAST_KEY_PREFIX: &str = "promptforge.last.";
pub const LAST_RESPONSE_KEY: &str = "promptforge.last.response";
pub const HISTORY_KEY: &str = "promptforge.history";
