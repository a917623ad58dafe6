// Copyright (c) 2024 Damir Jelić
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The data types a parameter value can have.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ParameterType {
    /// A RGB color.
    Color,
    /// An integer between 0 and 100.
    Percent,
    /// An integer greater than or equal to zero.
    #[serde(rename = "integergreaterorequalzero")]
    #[strum(serialize = "integergreaterorequalzero")]
    IntegerGreaterOrEqualZero,
    /// An integer greater than zero.
    #[serde(rename = "integergreaterzero")]
    #[strum(serialize = "integergreaterzero")]
    IntegerGreaterZero,
    Boolean,
}

/// A RGB triple as it travels over the wire, each channel in `0..=255`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// One typed parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Color(Color),
    Boolean(bool),
    Integer(i64),
}

#[derive(Debug, thiserror::Error)]
pub enum ParameterError {
    #[error("invalid value for parameter of type {0}")]
    InvalidValue(ParameterType),
    #[error("invalid data format: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("parameter types do not match")]
    TypeMismatch,
}

impl ParameterType {
    /// The value a parameter of this type starts out with.
    pub fn default_value(self) -> Value {
        match self {
            ParameterType::Color => Value::Color(Color::default()),
            ParameterType::Percent => Value::Integer(100),
            ParameterType::IntegerGreaterOrEqualZero => Value::Integer(0),
            ParameterType::IntegerGreaterZero => Value::Integer(1),
            ParameterType::Boolean => Value::Boolean(false),
        }
    }

    /// Check that the value has this type and lies in its allowed range.
    pub fn validate(self, value: &Value) -> Result<(), ParameterError> {
        let valid = match (self, value) {
            (ParameterType::Color, Value::Color(_)) => true,
            (ParameterType::Percent, Value::Integer(v)) => (0..=100).contains(v),
            (ParameterType::IntegerGreaterOrEqualZero, Value::Integer(v)) => *v >= 0,
            (ParameterType::IntegerGreaterZero, Value::Integer(v)) => *v >= 1,
            (ParameterType::Boolean, Value::Boolean(_)) => true,
            _ => false,
        };

        valid.then_some(()).ok_or(ParameterError::InvalidValue(self))
    }
}

/// A single knob of an effect.
///
/// A parameter has a current and a default value which always share the
/// parameter's type, plus the set of peer parameters it is linked to. Links
/// are symmetric; walking them transitively yields the closure of parameters
/// that are kept equal. The propagation itself lives in
/// [`crate::shows::Visual`] since only the visual can see all of its
/// parameters at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ParameterRepr", into = "ParameterRepr")]
pub struct Parameter {
    id: Uuid,
    key: String,
    name: String,
    param_type: ParameterType,
    current: Value,
    default: Value,
    links: HashSet<Uuid>,
}

/// The serialized form: `{id, key, name, type, current, default,
/// linkedParameters}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ParameterRepr {
    id: Uuid,
    key: String,
    name: String,
    #[serde(rename = "type")]
    param_type: ParameterType,
    current: Value,
    default: Value,
    #[serde(rename = "linkedParameters", default)]
    linked_parameters: Vec<Uuid>,
}

impl Parameter {
    /// Create a new parameter with the type's default in both value cells.
    pub fn new(key: &str, param_type: ParameterType, name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            key: key.to_owned(),
            name: name.to_owned(),
            param_type,
            current: param_type.default_value(),
            default: param_type.default_value(),
            links: HashSet::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn param_type(&self) -> ParameterType {
        self.param_type
    }

    pub fn current(&self) -> Value {
        self.current
    }

    pub fn default(&self) -> Value {
        self.default
    }

    pub fn links(&self) -> &HashSet<Uuid> {
        &self.links
    }

    /// Set the current value. The caller is responsible for propagating the
    /// value through the link closure.
    pub fn set_current(&mut self, value: Value) -> Result<(), ParameterError> {
        self.param_type.validate(&value)?;
        self.current = value;
        Ok(())
    }

    pub fn set_default(&mut self, value: Value) -> Result<(), ParameterError> {
        self.param_type.validate(&value)?;
        self.default = value;
        Ok(())
    }

    /// Parse a raw JSON value according to the parameter's type and store it
    /// as the current value. Returns the parsed value so it can be pushed to
    /// linked peers.
    pub fn set_current_from_json(
        &mut self,
        raw: &serde_json::Value,
    ) -> Result<Value, ParameterError> {
        let value = self.parse(raw)?;
        self.set_current(value)?;
        Ok(value)
    }

    /// Like [`Parameter::set_current_from_json`], for the default value.
    pub fn set_default_from_json(
        &mut self,
        raw: &serde_json::Value,
    ) -> Result<Value, ParameterError> {
        let value = self.parse(raw)?;
        self.set_default(value)?;
        Ok(value)
    }

    /// Overwrite this parameter with a deserialized one, matching by key.
    ///
    /// The identity, values and links of the stored parameter win; the key,
    /// display name and type of the freshly constructed one stay since they
    /// are part of the effect's schema, not of the stored state.
    pub fn restore(&mut self, stored: Parameter) -> Result<(), ParameterError> {
        if stored.param_type != self.param_type {
            return Err(ParameterError::TypeMismatch);
        }

        self.id = stored.id;
        self.current = stored.current;
        self.default = stored.default;
        self.links = stored.links;

        Ok(())
    }

    pub(crate) fn add_link(&mut self, other: Uuid) {
        self.links.insert(other);
    }

    pub(crate) fn remove_link(&mut self, other: Uuid) {
        self.links.remove(&other);
    }

    /// The current value as a color, black for non-color parameters.
    pub fn color(&self) -> Color {
        match self.current {
            Value::Color(color) => color,
            _ => Color::default(),
        }
    }

    /// The current value as an integer, zero for non-integer parameters.
    pub fn integer(&self) -> i64 {
        match self.current {
            Value::Integer(value) => value,
            _ => 0,
        }
    }

    /// The current value as a boolean, false for non-boolean parameters.
    pub fn boolean(&self) -> bool {
        match self.current {
            Value::Boolean(value) => value,
            _ => false,
        }
    }

    fn parse(&self, raw: &serde_json::Value) -> Result<Value, ParameterError> {
        let value = match self.param_type {
            ParameterType::Color => Value::Color(serde_json::from_value(raw.clone())?),
            ParameterType::Percent
            | ParameterType::IntegerGreaterOrEqualZero
            | ParameterType::IntegerGreaterZero => {
                Value::Integer(serde_json::from_value(raw.clone())?)
            }
            ParameterType::Boolean => Value::Boolean(serde_json::from_value(raw.clone())?),
        };

        Ok(value)
    }
}

impl TryFrom<ParameterRepr> for Parameter {
    type Error = ParameterError;

    fn try_from(repr: ParameterRepr) -> Result<Self, Self::Error> {
        repr.param_type.validate(&repr.current)?;
        repr.param_type.validate(&repr.default)?;

        Ok(Self {
            id: repr.id,
            key: repr.key,
            name: repr.name,
            param_type: repr.param_type,
            current: repr.current,
            default: repr.default,
            links: repr.linked_parameters.into_iter().collect(),
        })
    }
}

impl From<Parameter> for ParameterRepr {
    fn from(parameter: Parameter) -> Self {
        let mut linked_parameters: Vec<Uuid> = parameter.links.into_iter().collect();
        linked_parameters.sort();

        Self {
            id: parameter.id,
            key: parameter.key,
            name: parameter.name,
            param_type: parameter.param_type,
            current: parameter.current,
            default: parameter.default,
            linked_parameters,
        }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn defaults() {
        assert_eq!(
            ParameterType::Color.default_value(),
            Value::Color(Color::default())
        );
        assert_eq!(ParameterType::Percent.default_value(), Value::Integer(100));
        assert_eq!(
            ParameterType::IntegerGreaterZero.default_value(),
            Value::Integer(1)
        );
        assert_eq!(
            ParameterType::IntegerGreaterOrEqualZero.default_value(),
            Value::Integer(0)
        );
        assert_eq!(
            ParameterType::Boolean.default_value(),
            Value::Boolean(false)
        );
    }

    #[test]
    fn validation() {
        ParameterType::Percent
            .validate(&Value::Integer(100))
            .expect("100 should be a valid percentage");
        ParameterType::Percent
            .validate(&Value::Integer(101))
            .expect_err("101 should not be a valid percentage");
        ParameterType::Percent
            .validate(&Value::Integer(-1))
            .expect_err("Negative percentages should be rejected");
        ParameterType::IntegerGreaterZero
            .validate(&Value::Integer(0))
            .expect_err("Zero should be rejected for a greater-than-zero integer");
        ParameterType::IntegerGreaterOrEqualZero
            .validate(&Value::Integer(0))
            .expect("Zero should be fine for a non-negative integer");
        ParameterType::Color
            .validate(&Value::Integer(7))
            .expect_err("A bare integer should not pass as a color");
    }

    #[test]
    fn json_updates() {
        let mut parameter = Parameter::new("color", ParameterType::Color, "Color");

        let value = parameter
            .set_current_from_json(&json!({"r": 255, "g": 0, "b": 12}))
            .expect("We should be able to set a color from JSON");
        assert_eq!(value, Value::Color(Color { r: 255, g: 0, b: 12 }));
        assert_eq!(parameter.current(), value);
        assert_eq!(
            parameter.default(),
            Value::Color(Color::default()),
            "Setting the current value should leave the default alone"
        );

        parameter
            .set_current_from_json(&json!({"r": 300, "g": 0, "b": 0}))
            .expect_err("A color channel outside of the u8 range should be rejected");

        let mut speed = Parameter::new("speed", ParameterType::Percent, "Speed");
        speed
            .set_current_from_json(&json!(50))
            .expect("We should be able to set a percentage from JSON");
        speed
            .set_current_from_json(&json!(101))
            .expect_err("An out-of-range percentage should be rejected");
        speed
            .set_current_from_json(&json!("fast"))
            .expect_err("A string should not pass as a percentage");
    }

    #[test]
    fn serialization_round_trip() {
        let mut parameter = Parameter::new("speed", ParameterType::Percent, "Speed");
        parameter
            .set_current(Value::Integer(30))
            .expect("We should be able to set a valid current value");
        parameter
            .set_default(Value::Integer(60))
            .expect("We should be able to set a valid default value");
        let peer = Uuid::new_v4();
        parameter.add_link(peer);

        let json = serde_json::to_value(&parameter)
            .expect("We should be able to serialize a parameter");
        assert_eq!(json["type"], "percent");
        assert_eq!(json["current"], 30);
        assert_eq!(json["default"], 60);
        assert_eq!(json["linkedParameters"][0], peer.to_string());

        let restored: Parameter = serde_json::from_value(json)
            .expect("We should be able to deserialize the parameter again");
        assert_eq!(restored.id(), parameter.id());
        assert_eq!(restored.current(), parameter.current());
        assert_eq!(restored.default(), parameter.default());
        assert_eq!(restored.links(), parameter.links());
    }

    #[test]
    fn deserialization_validates() {
        let json = json!({
            "id": Uuid::new_v4(),
            "key": "speed",
            "name": "Speed",
            "type": "percent",
            "current": 9000,
            "default": 50,
            "linkedParameters": [],
        });

        serde_json::from_value::<Parameter>(json)
            .expect_err("An out-of-range stored value should fail to deserialize");
    }

    #[test]
    fn restore_keeps_schema_fields() {
        let mut parameter = Parameter::new("speed", ParameterType::Percent, "Speed");
        let schema_key = parameter.key().to_owned();

        let mut stored = Parameter::new("ignored", ParameterType::Percent, "Ignored");
        stored.set_current(Value::Integer(5)).unwrap();
        let stored_id = stored.id();

        parameter
            .restore(stored)
            .expect("We should be able to restore a parameter of the same type");

        assert_eq!(parameter.key(), schema_key);
        assert_eq!(parameter.id(), stored_id);
        assert_eq!(parameter.current(), Value::Integer(5));

        let other = Parameter::new("flag", ParameterType::Boolean, "Flag");
        Parameter::new("speed", ParameterType::Percent, "Speed")
            .restore(other)
            .expect_err("Restoring a parameter of a different type should fail");
    }
}
