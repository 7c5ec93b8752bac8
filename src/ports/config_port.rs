//! Configuration access port trait.

use crate::domain::error::TraderError;

/// Sectioned key lookup. Typed getters return `default` when the key is
/// absent and `ConfigInvalid` when it is present but does not parse.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> Result<i64, TraderError>;
    fn get_double(&self, section: &str, key: &str, default: f64) -> Result<f64, TraderError>;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> Result<bool, TraderError>;
}
