//! Configuration access port trait.
//!
//! Values come back as raw strings; typing and validation happen in
//! `domain::config_validation` so every error names its section and key.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
}
