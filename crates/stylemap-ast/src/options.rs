//! Matcher options
//!
//! Rule specs carry their options as a JSON-like map. [`OptionsExt`]
//! provides typed accessors so factories do not have to match on
//! [`Value`] by hand.

use serde_json::{Map, Value};

/// Options attached to a matcher spec
pub type Options = Map<String, Value>;

/// Typed accessors for [`Options`]
pub trait OptionsExt {
    /// String option
    fn str_opt(&self, key: &str) -> Option<&str>;

    /// Boolean option
    fn bool_opt(&self, key: &str) -> Option<bool>;

    /// Integer option
    fn i64_opt(&self, key: &str) -> Option<i64>;

    /// List of strings, ignoring non-string entries
    fn str_list_opt(&self, key: &str) -> Option<Vec<&str>>;
}

impl OptionsExt for Options {
    fn str_opt(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    fn bool_opt(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    fn i64_opt(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    fn str_list_opt(&self, key: &str) -> Option<Vec<&str>> {
        self.get(key)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
    }
}
