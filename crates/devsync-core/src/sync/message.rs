//! Inbound frame decoding
//!
//! Frames are UTF-8 JSON of the shape `{ "type": string, "payload"?: object }`.
//! They are decoded into a closed enum at the transport boundary; tags this
//! client does not know become [`InboundMessage::Unhandled`].

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::DecodeError;

pub const SESSION_UPDATE: &str = "SESSION_UPDATE";
pub const DEVICE_REMOVED: &str = "DEVICE_REMOVED";
pub const FORCE_LOGOUT: &str = "FORCE_LOGOUT";
pub const DATA_UPDATE: &str = "DATA_UPDATE";

/// `dataType` of a DATA_UPDATE that carries user fields
pub const USER_UPDATE: &str = "USER_UPDATE";

/// A decoded control message from the session fanout endpoint
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Session list changed somewhere; re-fetch it
    SessionUpdate,
    /// A device was signed out remotely
    DeviceRemoved { device_id: String },
    /// This client must sign out
    ForceLogout,
    /// Server pushed a data change
    DataUpdate(DataUpdate),
    /// Well-formed frame with a tag this client does not handle
    Unhandled { kind: String },
}

/// Payload of a DATA_UPDATE frame
#[derive(Debug, Clone, PartialEq)]
pub enum DataUpdate {
    /// Fields to merge into the current user
    User(Map<String, Value>),
    /// Any other data type, kept for logging
    Other { data_type: String, data: Value },
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceRemovedPayload {
    device_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataUpdatePayload {
    data_type: String,
    #[serde(default)]
    data: Value,
}

impl InboundMessage {
    /// Decode a text frame
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let frame: RawFrame = serde_json::from_str(text)?;

        match frame.kind.as_str() {
            SESSION_UPDATE => Ok(InboundMessage::SessionUpdate),
            FORCE_LOGOUT => Ok(InboundMessage::ForceLogout),
            DEVICE_REMOVED => {
                let payload: DeviceRemovedPayload = parse_payload(DEVICE_REMOVED, frame.payload)?;
                Ok(InboundMessage::DeviceRemoved {
                    device_id: payload.device_id,
                })
            }
            DATA_UPDATE => {
                let payload: DataUpdatePayload = parse_payload(DATA_UPDATE, frame.payload)?;
                let update = if payload.data_type == USER_UPDATE {
                    match payload.data {
                        Value::Object(fields) => DataUpdate::User(fields),
                        other => {
                            return Err(DecodeError::InvalidUserData {
                                found: json_type_name(&other),
                            })
                        }
                    }
                } else {
                    DataUpdate::Other {
                        data_type: payload.data_type,
                        data: payload.data,
                    }
                };
                Ok(InboundMessage::DataUpdate(update))
            }
            _ => Ok(InboundMessage::Unhandled { kind: frame.kind }),
        }
    }

    /// Wire tag for logging
    pub fn kind(&self) -> &str {
        match self {
            InboundMessage::SessionUpdate => SESSION_UPDATE,
            InboundMessage::DeviceRemoved { .. } => DEVICE_REMOVED,
            InboundMessage::ForceLogout => FORCE_LOGOUT,
            InboundMessage::DataUpdate(_) => DATA_UPDATE,
            InboundMessage::Unhandled { kind } => kind,
        }
    }
}

fn parse_payload<T>(kind: &'static str, payload: Option<Value>) -> Result<T, DecodeError>
where
    T: for<'de> Deserialize<'de>,
{
    let payload = match payload {
        None | Some(Value::Null) => return Err(DecodeError::MissingPayload { kind }),
        Some(payload) => payload,
    };
    serde_json::from_value(payload).map_err(|source| DecodeError::InvalidPayload { kind, source })
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
