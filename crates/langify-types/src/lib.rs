pub mod api;
pub mod models;

/// UI languages the interface ships translations for.
pub const SUPPORTED_UI_LANGUAGES: &[&str] = &["en", "it"];

pub const DEFAULT_UI_LANGUAGE: &str = "en";
