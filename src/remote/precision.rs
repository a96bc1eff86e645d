//! Task identifiers returned by the backend are 19+ digit integers. Browsers
//! decode JSON numbers as doubles, which rounds them, so every `taskId` that
//! passes through the worker is rewritten as a decimal string.
//!
//! `serde_json` is built with `arbitrary_precision`, so a parsed number keeps
//! its original digits and `Number::to_string` reproduces them exactly.

use serde_json::{Map, Value};

pub const TASK_ID_FIELD: &str = "taskId";

/// Coerce `taskId` in an outgoing payload to a string.
pub fn normalize_request(payload: &mut Value) {
    if let Value::Object(object) = payload {
        stringify_task_id(object);
    }
}

/// Coerce `taskId` at the top level and inside a `data` object.
pub fn normalize_response(body: &mut Value) {
    let Value::Object(object) = body else {
        return;
    };

    if let Some(Value::Object(data)) = object.get_mut("data") {
        stringify_task_id(data);
    }
    stringify_task_id(object);
}

/// Only scalar ids are rewritten. `null`, arrays and objects are never issued
/// as task ids and pass through unchanged.
fn stringify_task_id(object: &mut Map<String, Value>) {
    let Some(value) = object.get_mut(TASK_ID_FIELD) else {
        return;
    };

    let text = match value {
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        _ => return,
    };
    *value = Value::String(text);
}
