//! Per-voice parameter map: string keys to scalar/bool/string values, with
//! defaulting accessors so a malformed or missing individual parameter
//! degrades to a sane default instead of failing the whole voice (§7).

use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ParamMap(HashMap<String, ParamValue>);

impl ParamMap {
    pub fn f64(&self, key: &str, default: f64) -> f64 {
        match self.0.get(key) {
            Some(ParamValue::Number(n)) => *n,
            Some(ParamValue::Bool(b)) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            _ => default,
        }
    }

    pub fn bool(&self, key: &str, default: bool) -> bool {
        match self.0.get(key) {
            Some(ParamValue::Bool(b)) => *b,
            Some(ParamValue::Number(n)) => *n != 0.0,
            _ => default,
        }
    }

    pub fn str<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        match self.0.get(key) {
            Some(ParamValue::Text(s)) => s.as_str(),
            _ => default,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Builds a `ParamMap` from an arbitrary JSON value, keeping only the
    /// scalar/bool/string entries and silently dropping anything else (e.g.
    /// a nested `sweeps` array meant for `NoiseParams`, not this map) —
    /// one malformed key degrading gracefully rather than failing the
    /// voice's entire parameter set (§7).
    pub fn from_value(value: &serde_json::Value) -> Self {
        let mut map = HashMap::new();
        if let serde_json::Value::Object(obj) = value {
            for (k, v) in obj {
                let parsed = match v {
                    serde_json::Value::Number(n) => n.as_f64().map(ParamValue::Number),
                    serde_json::Value::Bool(b) => Some(ParamValue::Bool(*b)),
                    serde_json::Value::String(s) => Some(ParamValue::Text(s.clone())),
                    _ => None,
                };
                if let Some(parsed) = parsed {
                    map.insert(k.clone(), parsed);
                }
            }
        }
        ParamMap(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, ParamValue)]) -> ParamMap {
        let mut m = HashMap::new();
        for (k, v) in pairs {
            m.insert(k.to_string(), v.clone());
        }
        ParamMap(m)
    }

    #[test]
    fn missing_key_returns_default() {
        let m = ParamMap::default();
        assert_eq!(m.f64("baseFreq", 200.0), 200.0);
        assert_eq!(m.bool("forceMono", false), false);
        assert_eq!(m.str("curve", "linear"), "linear");
    }

    #[test]
    fn type_mismatch_falls_back_to_default() {
        let m = map(&[("baseFreq", ParamValue::Text("oops".into()))]);
        assert_eq!(m.f64("baseFreq", 220.0), 220.0);
    }

    #[test]
    fn present_values_are_returned() {
        let m = map(&[
            ("baseFreq", ParamValue::Number(440.0)),
            ("leftHigh", ParamValue::Bool(true)),
            ("curve", ParamValue::Text("logarithmic".into())),
        ]);
        assert_eq!(m.f64("baseFreq", 0.0), 440.0);
        assert_eq!(m.bool("leftHigh", false), true);
        assert_eq!(m.str("curve", "linear"), "logarithmic");
    }
}
