//! Property-bag models.
//!
//! A [`Model`] is a fixed set of named properties declared by a [`Schema`].
//! Each instance keeps two maps: the current values, and the values written
//! since the model was loaded or last saved. Mappers persist only the latter.
//!
//! A schema can attach a getter or setter override to any property. Reads go
//! override → modified → base; writes go to the override if one exists and
//! otherwise update both maps when the value actually changes. Overrides use
//! [`Model::get_raw`] / [`Model::set_raw`] to reach the stored value without
//! recursing into themselves.
//!
//! ```rust
//! use rebar::model::{Model, ModelError, Schema};
//! use serde_json::{json, Value};
//!
//! fn lowercase_email(model: &mut Model, value: Value) -> Result<(), ModelError> {
//!     let email = value.as_str().map(str::to_lowercase).map(Value::String);
//!     model.set_raw("email", email.unwrap_or(Value::Null))
//! }
//!
//! let schema = Schema::new()
//!     .property("id", Value::Null)
//!     .property("email", Value::Null)
//!     .setter("email", lowercase_email)
//!     .build();
//!
//! let mut user = Model::new(&schema);
//! user.set("email", json!("Ann@Example.com")).unwrap();
//! assert_eq!(user.get("email").unwrap(), json!("ann@example.com"));
//! assert!(user.set("nickname", json!("ann")).is_err());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

/// Computes a property value on read.
pub type Getter = fn(&Model) -> Value;

/// Validates or transforms a property value on write.
pub type Setter = fn(&mut Model, Value) -> Result<(), ModelError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown property `{0}`")]
    UnknownProperty(String),

    #[error("invalid value for `{property}`: {reason}")]
    Invalid { property: String, reason: String },
}

impl ModelError {
    pub fn invalid(property: &str, reason: impl Into<String>) -> Self {
        Self::Invalid { property: property.to_owned(), reason: reason.into() }
    }
}

/// Declared properties, their defaults, and accessor overrides.
#[derive(Default, Clone)]
pub struct Schema {
    defaults: Map<String, Value>,
    getters: HashMap<String, Getter>,
    setters: HashMap<String, Setter>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `name` with a default value.
    pub fn property(mut self, name: &str, default: Value) -> Self {
        self.defaults.insert(name.to_owned(), default);
        self
    }

    /// Attaches a getter override, declaring `name` if needed.
    pub fn getter(mut self, name: &str, getter: Getter) -> Self {
        self.defaults.entry(name.to_owned()).or_insert(Value::Null);
        self.getters.insert(name.to_owned(), getter);
        self
    }

    /// Attaches a setter override, declaring `name` if needed.
    pub fn setter(mut self, name: &str, setter: Setter) -> Self {
        self.defaults.entry(name.to_owned()).or_insert(Value::Null);
        self.setters.insert(name.to_owned(), setter);
        self
    }

    pub fn build(self) -> Arc<Schema> {
        Arc::new(self)
    }

    pub fn has(&self, name: &str) -> bool {
        self.defaults.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.defaults.keys().map(String::as_str)
    }

    pub fn default_of(&self, name: &str) -> Option<&Value> {
        self.defaults.get(name)
    }

    /// `true` when reads of `name` go through a getter, i.e. the value is
    /// computed rather than stored.
    pub fn is_computed(&self, name: &str) -> bool {
        self.getters.contains_key(name)
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("properties", &self.defaults.keys().collect::<Vec<_>>())
            .field("getters", &self.getters.keys().collect::<Vec<_>>())
            .field("setters", &self.setters.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// One record: declared properties plus pending writes.
#[derive(Clone)]
pub struct Model {
    schema: Arc<Schema>,
    properties: Map<String, Value>,
    modified: Map<String, Value>,
}

impl Model {
    /// A fresh model holding the schema defaults, with nothing modified.
    pub fn new(schema: &Arc<Schema>) -> Self {
        Self {
            schema: Arc::clone(schema),
            properties: schema.defaults.clone(),
            modified: Map::new(),
        }
    }

    /// Hydrates a model from a stored row without marking anything modified.
    /// Columns the schema does not declare are ignored.
    pub fn load(schema: &Arc<Schema>, row: Map<String, Value>) -> Self {
        let mut model = Self::new(schema);
        for (name, value) in row {
            if let Some(slot) = model.properties.get_mut(&name) {
                *slot = value;
            }
        }
        model
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn has(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    /// Reads a property through its getter override, if any.
    pub fn get(&self, name: &str) -> Result<Value, ModelError> {
        if let Some(getter) = self.schema.getters.get(name) {
            return Ok(getter(self));
        }
        self.get_raw(name).cloned()
    }

    /// Reads the stored value, bypassing overrides.
    pub fn get_raw(&self, name: &str) -> Result<&Value, ModelError> {
        self.modified.get(name)
            .or_else(|| self.properties.get(name))
            .ok_or_else(|| ModelError::UnknownProperty(name.to_owned()))
    }

    /// Writes a property through its setter override, if any.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), ModelError> {
        if let Some(setter) = self.schema.setters.get(name).copied() {
            return setter(self, value);
        }
        self.set_raw(name, value)
    }

    /// Stores a value, bypassing overrides. No-op when the value is unchanged.
    pub fn set_raw(&mut self, name: &str, value: Value) -> Result<(), ModelError> {
        let current = self.get_raw(name)?;
        if *current == value {
            return Ok(());
        }
        self.modified.insert(name.to_owned(), value.clone());
        self.properties.insert(name.to_owned(), value);
        Ok(())
    }

    /// Sets every entry of `values`. Fails before writing anything if any
    /// name is undeclared; a failing setter stops the fill where it is.
    pub fn fill(&mut self, values: Map<String, Value>) -> Result<(), ModelError> {
        if let Some(unknown) = values.keys().find(|k| !self.has(k)) {
            return Err(ModelError::UnknownProperty(unknown.clone()));
        }
        for (name, value) in values {
            self.set(&name, value)?;
        }
        Ok(())
    }

    /// Stored values of every property, bypassing getters.
    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    /// Writes not yet persisted.
    pub fn modified(&self) -> &Map<String, Value> {
        &self.modified
    }

    pub fn is_modified(&self) -> bool {
        !self.modified.is_empty()
    }

    /// Forgets pending writes, typically after a mapper saved them.
    pub fn clear_modified(&mut self) {
        self.modified.clear();
    }

    /// Every property as seen through its getter.
    pub fn to_json(&self) -> Value {
        let map = self.properties.keys()
            .map(|name| {
                let value = self.get(name).unwrap_or(Value::Null);
                (name.clone(), value)
            })
            .collect();
        Value::Object(map)
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("properties", &self.properties)
            .field("modified", &self.modified)
            .finish()
    }
}

impl Serialize for Model {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_name(model: &Model) -> Value {
        let first = model.get_raw("first").ok().and_then(Value::as_str).unwrap_or_default();
        let last = model.get_raw("last").ok().and_then(Value::as_str).unwrap_or_default();
        json!(format!("{first} {last}").trim())
    }

    fn non_negative_age(model: &mut Model, value: Value) -> Result<(), ModelError> {
        match value.as_i64() {
            Some(n) if n >= 0 => model.set_raw("age", value),
            _ => Err(ModelError::invalid("age", "must be a non-negative integer")),
        }
    }

    fn person() -> Arc<Schema> {
        Schema::new()
            .property("id", Value::Null)
            .property("first", json!(""))
            .property("last", json!(""))
            .property("age", json!(0))
            .getter("name", full_name)
            .setter("age", non_negative_age)
            .build()
    }

    #[test]
    fn unknown_property_is_rejected_and_model_unchanged() {
        let mut model = Model::new(&person());
        model.set("first", json!("Ann")).unwrap();
        let before = model.to_json();

        let err = model.set("nickname", json!("annie")).unwrap_err();
        assert_eq!(err, ModelError::UnknownProperty("nickname".into()));
        assert_eq!(model.to_json(), before);
        assert!(!model.has("nickname"));
        assert!(model.get("nickname").is_err());
    }

    #[test]
    fn writes_are_tracked_only_when_the_value_changes() {
        let schema = person();
        let mut model = Model::load(&schema, json!({ "id": 1, "first": "Ann" }).as_object().unwrap().clone());
        assert!(!model.is_modified());

        model.set("first", json!("Ann")).unwrap();
        assert!(!model.is_modified());

        model.set("first", json!("Bea")).unwrap();
        assert_eq!(model.modified().get("first"), Some(&json!("Bea")));
        assert_eq!(model.get("first").unwrap(), json!("Bea"));

        model.clear_modified();
        assert!(!model.is_modified());
        assert_eq!(model.get("first").unwrap(), json!("Bea"));
    }

    #[test]
    fn getter_override_computes_value() {
        let mut model = Model::new(&person());
        model.set("first", json!("Ann")).unwrap();
        model.set("last", json!("Lee")).unwrap();
        assert_eq!(model.get("name").unwrap(), json!("Ann Lee"));
        assert_eq!(model.to_json()["name"], json!("Ann Lee"));
    }

    #[test]
    fn setter_override_validates() {
        let mut model = Model::new(&person());
        let err = model.set("age", json!(-3)).unwrap_err();
        assert!(matches!(err, ModelError::Invalid { .. }));
        assert_eq!(model.get("age").unwrap(), json!(0));

        model.set("age", json!(41)).unwrap();
        assert_eq!(model.get("age").unwrap(), json!(41));
    }

    #[test]
    fn fill_checks_every_name_before_writing() {
        let mut model = Model::new(&person());
        let values = json!({ "first": "Ann", "shoe_size": 38 }).as_object().unwrap().clone();
        assert!(model.fill(values).is_err());
        assert_eq!(model.get("first").unwrap(), json!(""));
        assert!(!model.is_modified());
    }

    #[test]
    fn load_ignores_undeclared_columns() {
        let row = json!({ "id": 4, "joined_total": 10 }).as_object().unwrap().clone();
        let model = Model::load(&person(), row);
        assert!(!model.has("joined_total"));
        assert_eq!(model.get("id").unwrap(), json!(4));
    }

    #[test]
    fn serialises_through_getters() {
        let mut model = Model::new(&person());
        model.set("first", json!("Ann")).unwrap();
        let value = serde_json::to_value(&model).unwrap();
        assert_eq!(value["name"], json!("Ann"));
        assert_eq!(value["age"], json!(0));
    }
}
