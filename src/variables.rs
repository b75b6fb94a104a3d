//! Process variables and the typed inputs each handler reads from them.
//!
//! The engine ships variables as a JSON object document. Handlers never
//! poke at the raw map: they extract a typed input (`PassengerInput`,
//! `ReservationInput`) and an absent or mistyped field becomes a
//! `HandlerError` instead of a silently substituted default.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::HandlerError;

// ---------------------------------------------------------------------------
// ProcessVariables
// ---------------------------------------------------------------------------

/// Variable set of one process instance, as seen by one job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessVariables(Map<String, Value>);

impl ProcessVariables {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Parse the engine's variables document.
    ///
    /// An empty document is an empty variable set; anything other than a
    /// JSON object is unreadable.
    pub fn from_document(document: &str) -> Result<Self, HandlerError> {
        if document.trim().is_empty() {
            return Ok(Self::new());
        }
        match serde_json::from_str::<Value>(document) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(other) => Err(HandlerError::UnreadableVariables(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            ))),
            Err(e) => Err(HandlerError::UnreadableVariables(e.to_string())),
        }
    }

    /// Serialize back into a variables document.
    pub fn to_document(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Set one variable, returning the previous value.
    pub fn set(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(name.into(), value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Read a required string variable.
    pub fn require_str(&self, name: &'static str) -> Result<&str, HandlerError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Err(HandlerError::MissingVariable(name)),
            Some(Value::String(s)) => Ok(s),
            Some(_) => Err(HandlerError::InvalidVariable {
                name,
                expected: "string",
            }),
        }
    }

    /// Read a required integer variable.
    ///
    /// The engine stores every number as a double, so `42.0` is accepted and
    /// fractional values are truncated toward zero.
    pub fn require_int(&self, name: &'static str) -> Result<i64, HandlerError> {
        let invalid = HandlerError::InvalidVariable {
            name,
            expected: "number",
        };
        match self.0.get(name) {
            None | Some(Value::Null) => Err(HandlerError::MissingVariable(name)),
            Some(Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    return Ok(i);
                }
                match n.as_f64() {
                    Some(f) if f.is_finite() && f.abs() < i64::MAX as f64 => Ok(f.trunc() as i64),
                    _ => Err(invalid),
                }
            }
            Some(_) => Err(invalid),
        }
    }
}

impl From<Map<String, Value>> for ProcessVariables {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Typed handler inputs
// ---------------------------------------------------------------------------

/// Input of the regulation checks: the passenger's identity card number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassengerInput {
    pub passenger_id: String,
}

impl PassengerInput {
    pub const VARIABLE: &'static str = "passengerId";

    pub fn from_variables(variables: &ProcessVariables) -> Result<Self, HandlerError> {
        Ok(Self {
            passenger_id: variables.require_str(Self::VARIABLE)?.to_string(),
        })
    }
}

/// Input of the email notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationInput {
    pub reservation_id: i64,
}

impl ReservationInput {
    pub const VARIABLE: &'static str = "reservationId";

    pub fn from_variables(variables: &ProcessVariables) -> Result<Self, HandlerError> {
        Ok(Self {
            reservation_id: variables.require_int(Self::VARIABLE)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_document_object() {
        let vars =
            ProcessVariables::from_document(r#"{"passengerId":"3201010101010001","n":1}"#)
                .unwrap();
        assert_eq!(vars.len(), 2);
        assert_eq!(vars.get("n"), Some(&json!(1)));
    }

    #[test]
    fn test_from_document_empty_is_empty_set() {
        assert!(ProcessVariables::from_document("").unwrap().is_empty());
    }

    #[test]
    fn test_from_document_rejects_non_object() {
        let err = ProcessVariables::from_document("[1,2]").unwrap_err();
        assert!(matches!(err, HandlerError::UnreadableVariables(msg) if msg.contains("array")));
    }

    #[test]
    fn test_from_document_rejects_garbage() {
        assert!(matches!(
            ProcessVariables::from_document("{not json"),
            Err(HandlerError::UnreadableVariables(_))
        ));
    }

    #[test]
    fn test_set_overwrites_single_key() {
        let mut vars = ProcessVariables::from_document(r#"{"a":1,"b":"x"}"#).unwrap();
        let previous = vars.set("b", json!(true));
        assert_eq!(previous, Some(json!("x")));
        assert_eq!(vars.get("a"), Some(&json!(1)));
        assert_eq!(vars.get("b"), Some(&json!(true)));
    }

    #[test]
    fn test_passenger_input() {
        let vars = ProcessVariables::from_document(r#"{"passengerId":"3201"}"#).unwrap();
        assert_eq!(
            PassengerInput::from_variables(&vars).unwrap().passenger_id,
            "3201"
        );
    }

    #[test]
    fn test_passenger_input_missing_and_mistyped() {
        let empty = ProcessVariables::new();
        assert!(matches!(
            PassengerInput::from_variables(&empty),
            Err(HandlerError::MissingVariable("passengerId"))
        ));

        let numeric = ProcessVariables::from_document(r#"{"passengerId":3201}"#).unwrap();
        assert!(matches!(
            PassengerInput::from_variables(&numeric),
            Err(HandlerError::InvalidVariable {
                name: "passengerId",
                expected: "string"
            })
        ));
    }

    #[test]
    fn test_reservation_input_accepts_float_and_int() {
        let float = ProcessVariables::from_document(r#"{"reservationId":42.0}"#).unwrap();
        assert_eq!(ReservationInput::from_variables(&float).unwrap().reservation_id, 42);

        let int = ProcessVariables::from_document(r#"{"reservationId":7}"#).unwrap();
        assert_eq!(ReservationInput::from_variables(&int).unwrap().reservation_id, 7);

        let fractional = ProcessVariables::from_document(r#"{"reservationId":9.75}"#).unwrap();
        assert_eq!(
            ReservationInput::from_variables(&fractional).unwrap().reservation_id,
            9
        );
    }

    #[test]
    fn test_reservation_input_rejects_string() {
        let vars = ProcessVariables::from_document(r#"{"reservationId":"42"}"#).unwrap();
        assert!(matches!(
            ReservationInput::from_variables(&vars),
            Err(HandlerError::InvalidVariable { .. })
        ));
    }

    #[test]
    fn test_null_counts_as_missing() {
        let vars = ProcessVariables::from_document(r#"{"reservationId":null}"#).unwrap();
        assert!(matches!(
            ReservationInput::from_variables(&vars),
            Err(HandlerError::MissingVariable("reservationId"))
        ));
    }
}
