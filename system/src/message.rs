use crate::error::RegistryError;
use crate::types::{Payload, SessionId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A validated client request.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientRequest {
    Create,
    Join { id: String },
    Leave { id: String },
    Message { id: String, payload: Payload },
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Success,
    BadMessage,
    BadRequest,
    Error,
}

/// Reply to the connection that sent a request.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ServerResponse {
    pub response: ResponseKind,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<SessionId>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<String>,
}

impl ServerResponse {
    pub fn with_id(id: SessionId) -> Self {
        Self {
            response: ResponseKind::Success,
            id: Some(id),
            status: None,
            reason: None,
        }
    }

    pub fn sent() -> Self {
        Self {
            response: ResponseKind::Success,
            id: None,
            status: Some("sent".into()),
            reason: None,
        }
    }

    pub fn bad_message<S: Into<String>>(reason: S) -> Self {
        Self::failure(ResponseKind::BadMessage, reason)
    }

    pub fn bad_request<S: Into<String>>(reason: S) -> Self {
        Self::failure(ResponseKind::BadRequest, reason)
    }

    fn failure<S: Into<String>>(response: ResponseKind, reason: S) -> Self {
        Self {
            response,
            id: None,
            status: None,
            reason: Some(reason.into()),
        }
    }

    pub fn to_json(&self) -> String {
        // A struct of strings always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl From<RegistryError> for ServerResponse {
    fn from(error: RegistryError) -> Self {
        let kind = match error {
            RegistryError::SessionNotFound
            | RegistryError::NotAMember(_)
            | RegistryError::InvalidHandle => ResponseKind::BadRequest,
            RegistryError::UserExists
            | RegistryError::InAnotherSession(_)
            | RegistryError::UserNotFound
            | RegistryError::IdSpaceExhausted => ResponseKind::Error,
        };
        Self::failure(kind, error.to_string())
    }
}

const KNOWN_TYPES: [&str; 4] = ["create", "join", "leave", "message"];

/// Parses one inbound text frame. On failure the returned response is what
/// should be sent back.
pub fn parse_request(text: &str) -> Result<ClientRequest, ServerResponse> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ServerResponse::bad_message(e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| ServerResponse::bad_message("expected a json object"))?;

    let kind = match object.get("type") {
        None => return Err(ServerResponse::bad_message("missing key 'type'")),
        Some(Value::String(kind)) if KNOWN_TYPES.contains(&kind.as_str()) => kind.as_str(),
        Some(Value::String(kind)) => {
            return Err(ServerResponse::bad_message(format!("unknown key {}", kind)))
        }
        Some(other) => {
            return Err(ServerResponse::bad_message(format!("unknown key {}", other)))
        }
    };

    match kind {
        "create" => Ok(ClientRequest::Create),
        "join" => Ok(ClientRequest::Join {
            id: required_id(object)?,
        }),
        "leave" => Ok(ClientRequest::Leave {
            id: required_id(object)?,
        }),
        _ => {
            let id = required_id(object)?;
            let payload = object
                .get("payload")
                .map(payload_text)
                .ok_or_else(|| ServerResponse::bad_request("missing key 'payload'"))?;
            Ok(ClientRequest::Message { id, payload })
        }
    }
}

fn required_id(object: &Map<String, Value>) -> Result<String, ServerResponse> {
    match object.get("id") {
        Some(Value::String(id)) => Ok(id.clone()),
        Some(_) => Err(ServerResponse::bad_request("key 'id' must be a string")),
        None => Err(ServerResponse::bad_request("missing key 'id'")),
    }
}

/// Strings are relayed as-is; anything else as compact json.
fn payload_text(value: &Value) -> Payload {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
