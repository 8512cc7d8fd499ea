//! Netlist records.
//!
//! A record is a JSON array `[type, view, properties, nodes]`:
//!
//! ```text
//! ["r", [x, y, rot], {"name": "R1", "r": "1k"}, ["in", "out"]]
//! ```
//!
//! Property values may be JSON strings (engineering notation) or numbers.
//! Node names may be strings or numbers.

use serde_json::{Map, Value};

use super::value::parse_number;
use crate::error::{Result, SimError};

/// Record types that carry no electrical meaning.
const IGNORED: [&str; 4] = ["view", "w", "s", "L"];

/// A single parsed netlist record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Position in the netlist
    pub index: usize,
    /// Component type tag (`r`, `c`, `l`, `d`, `v`, `i`, `o`, `n`, `p`, `a`, `g`)
    pub kind: String,
    pub properties: Map<String, Value>,
    pub nodes: Vec<String>,
}

impl Record {
    /// Parse record `index` of a netlist. Returns `None` for records that
    /// are skipped (wires, probes, view information).
    pub fn parse(index: usize, value: &Value) -> Result<Option<Self>> {
        let fields = value
            .as_array()
            .ok_or_else(|| SimError::malformed(index, "record is not an array"))?;
        let kind = fields
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| SimError::malformed(index, "missing type tag"))?;
        if IGNORED.contains(&kind) {
            return Ok(None);
        }

        let properties = match fields.get(2) {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => Map::new(),
            Some(_) => return Err(SimError::malformed(index, "properties are not an object")),
        };
        let nodes = fields
            .get(3)
            .and_then(Value::as_array)
            .ok_or_else(|| SimError::malformed(index, "missing node list"))?
            .iter()
            .map(|node| match node {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                _ => Err(SimError::malformed(index, "node names must be strings")),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Self {
            index,
            kind: kind.to_string(),
            properties,
            nodes,
        }))
    }

    /// Device name: the `name` property, or `_<index>` when absent or empty.
    pub fn name(&self) -> String {
        match self.properties.get("name") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                let id = self
                    .properties
                    .get("_json_")
                    .and_then(Value::as_u64)
                    .map_or(self.index, |i| i as usize);
                format!("_{}", id)
            }
        }
    }

    /// Raw text of a property, if present.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.properties.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// A required numeric property.
    pub fn number(&self, key: &str) -> Result<f64> {
        match self.properties.get(key) {
            None | Some(Value::Null) => Err(SimError::MissingProperty {
                component: self.name(),
                property: key.to_string(),
            }),
            Some(value) => self.to_number(key, value),
        }
    }

    /// An optional numeric property with a default.
    pub fn number_or(&self, key: &str, default: f64) -> Result<f64> {
        match self.properties.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(default),
            Some(value) => self.to_number(key, value),
        }
    }

    fn to_number(&self, key: &str, value: &Value) -> Result<f64> {
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => parse_number(s),
            _ => None,
        };
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        parsed.ok_or_else(|| SimError::invalid_value(self.name(), key, text))
    }

    /// Fail unless the record has exactly `expected` nodes.
    pub fn expect_nodes(&self, expected: usize) -> Result<()> {
        if self.nodes.len() != expected {
            return Err(SimError::WrongTerminalCount {
                component: self.name(),
                expected,
                got: self.nodes.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use serde_json::json;

    #[test]
    fn test_parse_resistor_record() {
        let value = json!(["r", [10, 20, 0], {"name": "R1", "r": "4.7k"}, ["a", "b"]]);
        let rec = Record::parse(0, &value).unwrap().unwrap();
        assert_eq!(rec.kind, "r");
        assert_eq!(rec.name(), "R1");
        assert_eq!(rec.nodes, vec!["a", "b"]);
        assert_abs_diff_eq!(rec.number("r").unwrap(), 4700.0, epsilon = 1e-9);
    }

    #[test]
    fn test_numeric_properties_and_nodes() {
        let value = json!(["c", [], {"c": 1e-6}, [1, 0]]);
        let rec = Record::parse(3, &value).unwrap().unwrap();
        assert_eq!(rec.number("c").unwrap(), 1e-6);
        assert_eq!(rec.nodes, vec!["1", "0"]);
    }

    #[test]
    fn test_default_name() {
        let value = json!(["r", [], {"r": "1k", "name": ""}, ["a", "b"]]);
        assert_eq!(Record::parse(7, &value).unwrap().unwrap().name(), "_7");
        let value = json!(["r", [], {"r": "1k", "_json_": 2}, ["a", "b"]]);
        assert_eq!(Record::parse(7, &value).unwrap().unwrap().name(), "_2");
    }

    #[test]
    fn test_ignored_records() {
        assert!(Record::parse(0, &json!(["view", 0, 0, 2])).unwrap().is_none());
        assert!(Record::parse(0, &json!(["w", [0, 0, 8, 0]])).unwrap().is_none());
    }

    #[test]
    fn test_property_errors() {
        let value = json!(["r", [], {"name": "R1", "r": "abc"}, ["a", "b"]]);
        let rec = Record::parse(0, &value).unwrap().unwrap();
        match rec.number("r") {
            Err(SimError::InvalidValue { component, text, .. }) => {
                assert_eq!(component, "R1");
                assert_eq!(text, "abc");
            }
            other => panic!("expected invalid value, got {:?}", other),
        }
        assert!(matches!(rec.number("c"), Err(SimError::MissingProperty { .. })));
        assert_eq!(rec.number_or("area", 1.0).unwrap(), 1.0);
    }

    #[test]
    fn test_malformed_records() {
        assert!(matches!(
            Record::parse(4, &json!({"type": "r"})),
            Err(SimError::MalformedRecord { index: 4, .. })
        ));
        assert!(matches!(
            Record::parse(1, &json!(["r", [], {}])),
            Err(SimError::MalformedRecord { index: 1, .. })
        ));
    }

    #[test]
    fn test_terminal_count() {
        let rec = Record::parse(0, &json!(["r", [], {"name": "R1"}, ["a"]]))
            .unwrap()
            .unwrap();
        assert!(matches!(
            rec.expect_nodes(2),
            Err(SimError::WrongTerminalCount { expected: 2, got: 1, .. })
        ));
    }
}
