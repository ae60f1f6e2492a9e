//! Path-tracking access to untyped JSON objects.
//!
//! Every accessor reports failures as a [`ValidationError`] whose `field`
//! is the full path of the value, e.g. `lines[4].source`.

use crate::error::ValidationError;
use serde_json::{Map, Value};
use std::str::FromStr;

/// A JSON object together with its path inside the document.
pub struct Fields<'a> {
    object: &'a Map<String, Value>,
    path: String,
}

impl<'a> Fields<'a> {
    /// Wrap `value`, which must be an object located at `path`.
    pub fn new(value: &'a Value, path: impl Into<String>) -> Result<Self, ValidationError> {
        let path = path.into();
        match value {
            Value::Object(object) => Ok(Self { object, path }),
            other => Err(ValidationError::wrong_type(
                display_path(&path),
                "an object",
                other,
            )),
        }
    }

    /// Path of a child key.
    pub fn child(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.path, key)
        }
    }

    /// Look up `key`, treating JSON `null` as absent.
    fn get(&self, key: &str) -> Option<&'a Value> {
        self.object.get(key).filter(|v| !v.is_null())
    }

    /// First present key among `keys`, with its path.
    fn get_any(&self, keys: &[&str]) -> Option<(&'a Value, String)> {
        keys.iter()
            .find_map(|key| self.get(key).map(|v| (v, self.child(key))))
    }

    pub fn str(&self, key: &str) -> Result<String, ValidationError> {
        self.opt_str(key)?
            .ok_or_else(|| ValidationError::missing(self.child(key)))
    }

    pub fn opt_str(&self, key: &str) -> Result<Option<String>, ValidationError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(ValidationError::wrong_type(self.child(key), "a string", other)),
        }
    }

    pub fn number(&self, key: &str) -> Result<f64, ValidationError> {
        self.opt_number(key)?
            .ok_or_else(|| ValidationError::missing(self.child(key)))
    }

    pub fn opt_number(&self, key: &str) -> Result<Option<f64>, ValidationError> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => number_value(value, &self.child(key)).map(Some),
        }
    }

    pub fn non_negative(&self, key: &str) -> Result<f64, ValidationError> {
        let value = self.number(key)?;
        require_non_negative(value, &self.child(key))
    }

    pub fn opt_non_negative(&self, key: &str) -> Result<Option<f64>, ValidationError> {
        match self.opt_number(key)? {
            None => Ok(None),
            Some(value) => require_non_negative(value, &self.child(key)).map(Some),
        }
    }

    pub fn opt_count(&self, key: &str) -> Result<Option<u64>, ValidationError> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value.as_u64().map(Some).ok_or_else(|| {
                ValidationError::wrong_type(self.child(key), "a non-negative integer", value)
            }),
        }
    }

    /// Parse a string field into a closed enumeration.
    pub fn parse<T>(&self, key: &str) -> Result<T, ValidationError>
    where
        T: FromStr<Err = String>,
    {
        let raw = self.str(key)?;
        raw.parse()
            .map_err(|reason| ValidationError::new(self.child(key), reason))
    }

    pub fn object(&self, key: &str) -> Result<Fields<'a>, ValidationError> {
        self.opt_object(key)?
            .ok_or_else(|| ValidationError::missing(self.child(key)))
    }

    pub fn opt_object(&self, key: &str) -> Result<Option<Fields<'a>>, ValidationError> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => Fields::new(value, self.child(key)).map(Some),
        }
    }

    /// Array under `key` with its path.
    pub fn array(&self, key: &str) -> Result<(&'a [Value], String), ValidationError> {
        let path = self.child(key);
        match self.get(key) {
            None => Err(ValidationError::missing(path)),
            Some(Value::Array(items)) => Ok((items.as_slice(), path)),
            Some(other) => Err(ValidationError::wrong_type(path, "an array", other)),
        }
    }

    /// Object under the first present key among `keys`, used as a map.
    pub fn opt_map_any(
        &self,
        keys: &[&str],
    ) -> Result<Option<(&'a Map<String, Value>, String)>, ValidationError> {
        match self.get_any(keys) {
            None => Ok(None),
            Some((Value::Object(map), path)) => Ok(Some((map, path))),
            Some((other, path)) => Err(ValidationError::wrong_type(path, "an object", other)),
        }
    }
}

/// Path of an array element.
pub fn index_path(path: &str, index: usize) -> String {
    format!("{}[{}]", path, index)
}

/// Path of a map entry.
pub fn key_path(path: &str, key: &str) -> String {
    format!("{}.{}", path, key)
}

pub fn number_value(value: &Value, path: &str) -> Result<f64, ValidationError> {
    match value.as_f64() {
        Some(n) if n.is_finite() => Ok(n),
        Some(_) => Err(ValidationError::new(path, "must be a finite number")),
        None => Err(ValidationError::wrong_type(path, "a number", value)),
    }
}

pub fn string_value(value: &Value, path: &str) -> Result<String, ValidationError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ValidationError::wrong_type(path, "a string", value))
}

fn require_non_negative(value: f64, path: &str) -> Result<f64, ValidationError> {
    if value < 0.0 {
        Err(ValidationError::new(path, "must be non-negative"))
    } else {
        Ok(value)
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "$".to_string()
    } else {
        path.to_string()
    }
}
