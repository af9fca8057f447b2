//! Server-sent event parsing for Gradio's `/call/{endpoint}/{event_id}`
//! stream.
//!
//! The stream carries `generating` / `heartbeat` progress events and ends
//! with exactly one `complete` or `error` event.

use serde_json::Value;

use super::schema::ShapeViolation;
use super::RemoteError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub name: String,
    pub data: String,
}

/// Split a complete event stream into events.
pub fn parse_events(stream: &str) -> Vec<Event> {
    let mut events = Vec::new();
    let mut name: Option<String> = None;
    let mut data: Vec<&str> = Vec::new();

    let mut flush = |name: &mut Option<String>, data: &mut Vec<&str>| {
        if name.is_some() || !data.is_empty() {
            events.push(Event {
                name: name.take().unwrap_or_else(|| "message".to_string()),
                data: data.join("\n"),
            });
            data.clear();
        }
    };

    for line in stream.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            flush(&mut name, &mut data);
            continue;
        }
        if line.starts_with(':') {
            continue;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => name = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }
    flush(&mut name, &mut data);

    events
}

/// Outputs of the terminal `complete` event, or the service's error.
pub fn final_outputs(stream: &str) -> Result<Vec<Value>, RemoteError> {
    for event in parse_events(stream) {
        match event.name.as_str() {
            "complete" => {
                let value: Value =
                    serde_json::from_str(&event.data).map_err(|e| ShapeViolation::InvalidJson {
                        path: "complete".to_string(),
                        message: e.to_string(),
                    })?;
                return match value {
                    Value::Array(data) => Ok(data),
                    _ => Err(ShapeViolation::WrongType {
                        path: "complete".to_string(),
                        expected: "an array",
                    }
                    .into()),
                };
            }
            "error" => return Err(RemoteError::Service(error_message(&event.data))),
            _ => {}
        }
    }
    Err(ShapeViolation::Unterminated.into())
}

fn error_message(data: &str) -> String {
    match serde_json::from_str::<Value>(data) {
        Ok(Value::String(message)) => message,
        Ok(Value::Object(map)) => map
            .get("message")
            .or_else(|| map.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| "the service reported an error".to_string()),
        _ if !data.trim().is_empty() && data.trim() != "null" => data.trim().to_string(),
        _ => "the service reported an error".to_string(),
    }
}
