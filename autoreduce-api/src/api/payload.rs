//! Request body parsing for the body-encoded run routes
//!
//! Only top-level keys are checked. `reduction_arguments` is kept as an
//! opaque JSON object and handed to the submission service unchanged.

use autoreduce_common::db::UNKNOWN_SUBMITTER;
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::selection::RunSelection;
use crate::service::ReductionOptions;

/// Body of a submission request
#[derive(Debug, Clone, PartialEq)]
pub struct RunsPayload {
    pub runs: RunSelection,
    pub options: ReductionOptions,
}

impl RunsPayload {
    /// Parse `{runs, reduction_arguments?, user_id?, description?}`
    ///
    /// A missing `runs` key is reported before any other problem. Optional
    /// keys set to `null` count as absent.
    pub fn from_body(body: &[u8]) -> Result<Self, ValidationError> {
        let mut object = parse_object(body)?;
        let runs = take_runs(&mut object)?;

        let reduction_arguments = match take_present(&mut object, "reduction_arguments") {
            None => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(ValidationError::InvalidField {
                    field: "reduction_arguments",
                    expected: "an object",
                })
            }
        };

        let submitter_id = match take_present(&mut object, "user_id") {
            None => UNKNOWN_SUBMITTER,
            Some(value) => value.as_i64().ok_or(ValidationError::InvalidField {
                field: "user_id",
                expected: "an integer",
            })?,
        };

        let description = match take_present(&mut object, "description") {
            None => String::new(),
            Some(Value::String(text)) => text,
            Some(_) => {
                return Err(ValidationError::InvalidField {
                    field: "description",
                    expected: "a string",
                })
            }
        };

        Ok(Self {
            runs,
            options: ReductionOptions {
                reduction_arguments,
                submitter_id,
                description,
            },
        })
    }
}

/// Parse the body of a removal request; only `runs` is read
pub fn removal_runs(body: &[u8]) -> Result<RunSelection, ValidationError> {
    let mut object = parse_object(body)?;
    take_runs(&mut object)
}

/// An empty body is an empty object
fn parse_object(body: &[u8]) -> Result<Map<String, Value>, ValidationError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err(ValidationError::InvalidBody(
            "expected a JSON object".to_string(),
        )),
        Err(e) => Err(ValidationError::InvalidBody(e.to_string())),
    }
}

fn take_runs(object: &mut Map<String, Value>) -> Result<RunSelection, ValidationError> {
    let runs = object.remove("runs").ok_or(ValidationError::MissingRuns)?;
    RunSelection::from_json(&runs)
}

fn take_present(object: &mut Map<String, Value>, key: &str) -> Option<Value> {
    object.remove(key).filter(|value| !value.is_null())
}
