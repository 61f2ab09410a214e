use std::collections::BTreeMap;

use serde::Deserialize;

/// Per-feature altitude mode override (text, see [`crate::AltitudeMode::parse`]).
pub const ALTITUDE_MODE_KEY: &str = "altitudeMode";
/// Per-part altitude mode overrides (list of text or null, indexed by part).
pub const ALTITUDE_MODES_KEY: &str = "altitudeModes";
/// Marks a feature's line/polygon geometry as mutating every frame.
pub const DYNAMIC_KEY: &str = "dynamic";
/// Renders point geometries as ellipsoids of this radius (meters).
pub const RADIUS_KEY: &str = "radius";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Read-only property bag of a feature.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Properties {
    values: BTreeMap<String, PropertyValue>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: PropertyValue) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: PropertyValue) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.values.get(key)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            PropertyValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_text()
    }

    pub fn list(&self, key: &str) -> Option<&[PropertyValue]> {
        match self.get(key)? {
            PropertyValue::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
