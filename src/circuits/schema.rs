use std::{collections::BTreeMap, str::FromStr};

use num_bigint::BigUint;
use serde::{ser::SerializeSeq, Serialize, Serializer};
use serde_json::Value;

use crate::{
    config::CircuitParams,
    error::{Error, Result},
};

/// One circuit signal value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputValue {
    Scalar(BigUint),
    Array(Vec<BigUint>),
    Matrix(Vec<Vec<BigUint>>),
}

impl InputValue {
    pub fn scalar(value: impl Into<BigUint>) -> Self {
        InputValue::Scalar(value.into())
    }
}

impl Serialize for InputValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            InputValue::Scalar(v) => serializer.collect_str(v),
            InputValue::Array(values) => serialize_decimal_seq(values, serializer),
            InputValue::Matrix(rows) => {
                let mut seq = serializer.serialize_seq(Some(rows.len()))?;
                for row in rows {
                    seq.serialize_element(&DecimalRow(row))?;
                }
                seq.end()
            }
        }
    }
}

struct DecimalRow<'a>(&'a [BigUint]);

impl Serialize for DecimalRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serialize_decimal_seq(self.0, serializer)
    }
}

fn serialize_decimal_seq<S: Serializer>(
    values: &[BigUint],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(values.iter().map(|v| v.to_string()))
}

/// Named witness inputs, serialized in the snarkjs input format (decimal strings).
///
/// Built fresh for every proof and handed to the prover by value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CircuitInputs {
    fields: BTreeMap<String, InputValue>,
}

impl CircuitInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: InputValue) {
        self.fields.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&InputValue> {
        self.fields.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    Scalar,
    Array(usize),
    Matrix(usize, usize),
}

impl FieldShape {
    fn matches(&self, value: &InputValue) -> bool {
        match (self, value) {
            (FieldShape::Scalar, InputValue::Scalar(_)) => true,
            (FieldShape::Array(len), InputValue::Array(values)) => values.len() == *len,
            (FieldShape::Matrix(rows, cols), InputValue::Matrix(matrix)) => {
                matrix.len() == *rows && matrix.iter().all(|row| row.len() == *cols)
            }
            _ => false,
        }
    }
}

/// Signals of the ES256 JWT selective-disclosure circuit.
pub fn jwt_field_defs(params: &CircuitParams) -> Vec<(&'static str, FieldShape)> {
    let k = params.limb_count;
    vec![
        ("message", FieldShape::Array(params.max_message_length)),
        ("messageLength", FieldShape::Scalar),
        ("periodIndex", FieldShape::Scalar),
        ("sig_r", FieldShape::Array(k)),
        ("sig_s", FieldShape::Array(k)),
        ("pubkey", FieldShape::Matrix(2, k)),
        ("matchesCount", FieldShape::Scalar),
        (
            "matchSubstring",
            FieldShape::Matrix(params.max_matches, params.max_substring_length),
        ),
        ("matchLength", FieldShape::Array(params.max_matches)),
        ("matchIndex", FieldShape::Array(params.max_matches)),
    ]
}

/// Require exactly the declared fields, each with its declared shape.
pub fn check_inputs(inputs: &CircuitInputs, field_defs: &[(&str, FieldShape)]) -> Result<()> {
    for (name, shape) in field_defs {
        let value = inputs
            .get(name)
            .ok_or_else(|| Error::InputSchema(format!("missing field {name}")))?;
        if !shape.matches(value) {
            return Err(Error::InputSchema(format!(
                "field {name} does not have shape {shape:?}"
            )));
        }
    }
    if let Some(extra) = inputs
        .names()
        .find(|name| !field_defs.iter().any(|(def, _)| def == name))
    {
        return Err(Error::InputSchema(format!("unexpected field {extra}")));
    }
    Ok(())
}

/// Read snarkjs-style input JSON back, following the field definitions.
pub fn parse_inputs(json_value: &Value, field_defs: &[(&str, FieldShape)]) -> Result<CircuitInputs> {
    let mut inputs = CircuitInputs::new();

    for (field_name, shape) in field_defs {
        let raw = json_value
            .get(*field_name)
            .ok_or_else(|| Error::InputSchema(format!("missing field {field_name}")))?;
        let value = match shape {
            FieldShape::Scalar => InputValue::Scalar(parse_bigint(raw, field_name)?),
            FieldShape::Array(_) => InputValue::Array(parse_bigint_array(raw, field_name)?),
            FieldShape::Matrix(_, _) => {
                let rows = raw.as_array().ok_or_else(|| {
                    Error::InputSchema(format!("field {field_name} must be an array"))
                })?;
                InputValue::Matrix(
                    rows.iter()
                        .map(|row| parse_bigint_array(row, field_name))
                        .collect::<Result<_>>()?,
                )
            }
        };
        inputs.insert(field_name, value);
    }

    check_inputs(&inputs, field_defs)?;
    Ok(inputs)
}

/// Accepts decimal strings as well as plain JSON numbers.
fn parse_bigint(value: &Value, field: &str) -> Result<BigUint> {
    let parsed = match value {
        Value::String(s) => BigUint::from_str(s).ok(),
        Value::Number(n) => n.as_u64().map(BigUint::from),
        _ => None,
    };
    parsed.ok_or_else(|| Error::InputSchema(format!("field {field} holds a non-integer value")))
}

fn parse_bigint_array(value: &Value, field: &str) -> Result<Vec<BigUint>> {
    value
        .as_array()
        .ok_or_else(|| Error::InputSchema(format!("field {field} must be an array")))?
        .iter()
        .map(|v| parse_bigint(v, field))
        .collect()
}
