// src/messages/record.rs
//! Event records and their wire layout
//!
//! A serialized record is `tag ++ varint(timestamp) ++ sized(payload)`, where
//! the payload is the record's fields encoded in declaration order.

use crate::codec::{MessageReader, MessageWriter};
use crate::messages::tag::TypeTag;
use crate::utils::errors::{Result, TrackerError};
use crate::utils::time::now_ms;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// One observed occurrence with its capture time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Milliseconds since epoch, taken when the record was built
    pub timestamp: u64,

    #[serde(flatten)]
    pub kind: EventKind,
}

/// Closed set of record variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Metadata {
        key: String,
        value: String,
    },
    Event {
        name: String,
        payload: String,
    },
    UserId {
        id: String,
    },
    UserAnonymousId {
        id: String,
    },
    ScreenChange {
        frame: Vec<u8>,
    },
    Crash {
        name: String,
        reason: String,
        stacktrace: String,
    },
    ViewComponent {
        screen_name: String,
        view_name: String,
        visible: bool,
    },
    Click {
        label: String,
        x: f64,
        y: f64,
    },
    Input {
        label: String,
        value: String,
        value_masked: bool,
    },
    Performance {
        name: String,
        value: u64,
    },
    Log {
        severity: String,
        content: String,
    },
    InternalError {
        content: String,
    },
    NetworkCall {
        kind: String,
        method: String,
        url: String,
        request: String,
        response: String,
        status: u64,
        duration: u64,
    },
    Swipe {
        label: String,
        direction: String,
        x: f64,
        y: f64,
    },
    BatchMeta {
        first_index: u64,
    },
    #[serde(rename = "graphql")]
    GraphQl {
        operation_kind: String,
        operation_name: String,
        variables: String,
        response: String,
        duration: u64,
    },
}

impl EventKind {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            EventKind::Metadata { .. } => TypeTag::Metadata,
            EventKind::Event { .. } => TypeTag::Event,
            EventKind::UserId { .. } => TypeTag::UserId,
            EventKind::UserAnonymousId { .. } => TypeTag::UserAnonymousId,
            EventKind::ScreenChange { .. } => TypeTag::ScreenChange,
            EventKind::Crash { .. } => TypeTag::Crash,
            EventKind::ViewComponent { .. } => TypeTag::ViewComponent,
            EventKind::Click { .. } => TypeTag::Click,
            EventKind::Input { .. } => TypeTag::Input,
            EventKind::Performance { .. } => TypeTag::Performance,
            EventKind::Log { .. } => TypeTag::Log,
            EventKind::InternalError { .. } => TypeTag::InternalError,
            EventKind::NetworkCall { .. } => TypeTag::NetworkCall,
            EventKind::Swipe { .. } => TypeTag::Swipe,
            EventKind::BatchMeta { .. } => TypeTag::BatchMeta,
            EventKind::GraphQl { .. } => TypeTag::GraphQl,
        }
    }

    fn write_payload(&self, w: &mut MessageWriter) {
        match self {
            EventKind::Metadata { key, value } => {
                w.put_str(key);
                w.put_str(value);
            }
            EventKind::Event { name, payload } => {
                w.put_str(name);
                w.put_str(payload);
            }
            EventKind::UserId { id } | EventKind::UserAnonymousId { id } => w.put_str(id),
            EventKind::ScreenChange { frame } => w.put_bytes(frame),
            EventKind::Crash {
                name,
                reason,
                stacktrace,
            } => {
                w.put_str(name);
                w.put_str(reason);
                w.put_str(stacktrace);
            }
            EventKind::ViewComponent {
                screen_name,
                view_name,
                visible,
            } => {
                w.put_str(screen_name);
                w.put_str(view_name);
                w.put_bool(*visible);
            }
            EventKind::Click { label, x, y } => {
                w.put_str(label);
                w.put_f64(*x);
                w.put_f64(*y);
            }
            EventKind::Input {
                label,
                value,
                value_masked,
            } => {
                w.put_str(label);
                w.put_str(value);
                w.put_bool(*value_masked);
            }
            EventKind::Performance { name, value } => {
                w.put_str(name);
                w.put_uint(*value);
            }
            EventKind::Log { severity, content } => {
                w.put_str(severity);
                w.put_str(content);
            }
            EventKind::InternalError { content } => w.put_str(content),
            EventKind::NetworkCall {
                kind,
                method,
                url,
                request,
                response,
                status,
                duration,
            } => {
                w.put_str(kind);
                w.put_str(method);
                w.put_str(url);
                w.put_str(request);
                w.put_str(response);
                w.put_uint(*status);
                w.put_uint(*duration);
            }
            EventKind::Swipe {
                label,
                direction,
                x,
                y,
            } => {
                w.put_str(label);
                w.put_str(direction);
                w.put_f64(*x);
                w.put_f64(*y);
            }
            EventKind::BatchMeta { first_index } => w.put_uint(*first_index),
            EventKind::GraphQl {
                operation_kind,
                operation_name,
                variables,
                response,
                duration,
            } => {
                w.put_str(operation_kind);
                w.put_str(operation_name);
                w.put_str(variables);
                w.put_str(response);
                w.put_uint(*duration);
            }
        }
    }

    fn read_payload(tag: TypeTag, r: &mut MessageReader<'_>) -> Result<Self> {
        let kind = match tag {
            TypeTag::Metadata => EventKind::Metadata {
                key: r.read_string()?,
                value: r.read_string()?,
            },
            TypeTag::Event => EventKind::Event {
                name: r.read_string()?,
                payload: r.read_string()?,
            },
            TypeTag::UserId => EventKind::UserId {
                id: r.read_string()?,
            },
            TypeTag::UserAnonymousId => EventKind::UserAnonymousId {
                id: r.read_string()?,
            },
            TypeTag::ScreenChange => EventKind::ScreenChange {
                frame: r.read_bytes()?.to_vec(),
            },
            TypeTag::Crash => EventKind::Crash {
                name: r.read_string()?,
                reason: r.read_string()?,
                stacktrace: r.read_string()?,
            },
            TypeTag::ViewComponent => EventKind::ViewComponent {
                screen_name: r.read_string()?,
                view_name: r.read_string()?,
                visible: r.read_bool()?,
            },
            TypeTag::Click => EventKind::Click {
                label: r.read_string()?,
                x: r.read_f64()?,
                y: r.read_f64()?,
            },
            TypeTag::Input => EventKind::Input {
                label: r.read_string()?,
                value: r.read_string()?,
                value_masked: r.read_bool()?,
            },
            TypeTag::Performance => EventKind::Performance {
                name: r.read_string()?,
                value: r.read_uint()?,
            },
            TypeTag::Log => EventKind::Log {
                severity: r.read_string()?,
                content: r.read_string()?,
            },
            TypeTag::InternalError => EventKind::InternalError {
                content: r.read_string()?,
            },
            TypeTag::NetworkCall => EventKind::NetworkCall {
                kind: r.read_string()?,
                method: r.read_string()?,
                url: r.read_string()?,
                request: r.read_string()?,
                response: r.read_string()?,
                status: r.read_uint()?,
                duration: r.read_uint()?,
            },
            TypeTag::Swipe => EventKind::Swipe {
                label: r.read_string()?,
                direction: r.read_string()?,
                x: r.read_f64()?,
                y: r.read_f64()?,
            },
            TypeTag::BatchMeta => EventKind::BatchMeta {
                first_index: r.read_uint()?,
            },
            TypeTag::GraphQl => EventKind::GraphQl {
                operation_kind: r.read_string()?,
                operation_name: r.read_string()?,
                variables: r.read_string()?,
                response: r.read_string()?,
                duration: r.read_uint()?,
            },
        };
        Ok(kind)
    }
}

impl EventRecord {
    /// Build a record stamped with the current wall-clock time
    pub fn new(kind: EventKind) -> Self {
        Self::at(now_ms(), kind)
    }

    /// Build a record with an explicit timestamp
    pub fn at(timestamp: u64, kind: EventKind) -> Self {
        Self { timestamp, kind }
    }

    pub fn type_tag(&self) -> TypeTag {
        self.kind.type_tag()
    }

    /// Serialize to wire bytes. Deterministic and side-effect free.
    pub fn encode(&self) -> Result<SerializedMessage> {
        let mut payload = MessageWriter::new();
        self.kind.write_payload(&mut payload);

        let mut out = MessageWriter::with_capacity(payload.len() + 16);
        out.put_u8(self.type_tag().as_u8());
        out.put_uint(self.timestamp);
        out.put_sized(payload.as_slice())?;
        Ok(SerializedMessage(out.finish()))
    }

    /// Decode exactly one record occupying all of `bytes`
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = MessageReader::new(bytes);
        let frame = RawFrame::read(&mut reader)?;
        if !reader.is_empty() {
            return Err(TrackerError::MalformedPayload(format!(
                "{} bytes after record end",
                reader.remaining()
            )));
        }
        frame.decode()
    }
}

/// Header and undecoded payload of one record
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    pub tag: u8,
    pub timestamp: u64,
    pub payload: &'a [u8],
}

impl<'a> RawFrame<'a> {
    /// Read a record header and its size-prefixed payload.
    ///
    /// Failure here means the stream position is lost.
    pub fn read(reader: &mut MessageReader<'a>) -> Result<Self> {
        let tag = reader.read_byte()?;
        let timestamp = reader.read_uint()?;
        let payload = reader.read_sized()?;
        Ok(Self {
            tag,
            timestamp,
            payload,
        })
    }

    /// Decode the payload. Failures only affect this record.
    pub fn decode(&self) -> Result<EventRecord> {
        let tag = TypeTag::try_from(self.tag)?;
        let mut reader = MessageReader::new(self.payload);
        let kind = EventKind::read_payload(tag, &mut reader)?;
        if !reader.is_empty() {
            return Err(TrackerError::MalformedPayload(format!(
                "{} trailing bytes in {} payload",
                reader.remaining(),
                tag
            )));
        }
        Ok(EventRecord::at(self.timestamp, kind))
    }
}

/// Immutable, self-delimiting encoded record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedMessage(Bytes);

impl SerializedMessage {
    #[cfg(test)]
    pub(crate) fn from_bytes_unchecked(bytes: Bytes) -> Self {
        Self(bytes)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    /// Type tag byte of the encoded record
    pub fn tag_byte(&self) -> Option<u8> {
        self.0.first().copied()
    }
}

impl AsRef<[u8]> for SerializedMessage {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
