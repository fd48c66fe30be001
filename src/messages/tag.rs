// src/messages/tag.rs
//! Stable numeric record type tags

use crate::utils::errors::TrackerError;
use serde::{Deserialize, Serialize};

/// Record type tag as written on the wire.
///
/// Values are part of the ingestion protocol and must never be reused.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    Metadata = 92,
    Event = 93,
    UserId = 94,
    UserAnonymousId = 95,
    ScreenChange = 96,
    Crash = 97,
    ViewComponent = 98,
    Click = 100,
    Input = 101,
    Performance = 102,
    Log = 103,
    InternalError = 104,
    NetworkCall = 105,
    Swipe = 106,
    BatchMeta = 107,
    #[serde(rename = "graphql")]
    GraphQl = 109,
}

impl TypeTag {
    pub const ALL: [TypeTag; 16] = [
        TypeTag::Metadata,
        TypeTag::Event,
        TypeTag::UserId,
        TypeTag::UserAnonymousId,
        TypeTag::ScreenChange,
        TypeTag::Crash,
        TypeTag::ViewComponent,
        TypeTag::Click,
        TypeTag::Input,
        TypeTag::Performance,
        TypeTag::Log,
        TypeTag::InternalError,
        TypeTag::NetworkCall,
        TypeTag::Swipe,
        TypeTag::BatchMeta,
        TypeTag::GraphQl,
    ];

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Metadata => "metadata",
            TypeTag::Event => "event",
            TypeTag::UserId => "user_id",
            TypeTag::UserAnonymousId => "user_anonymous_id",
            TypeTag::ScreenChange => "screen_change",
            TypeTag::Crash => "crash",
            TypeTag::ViewComponent => "view_component",
            TypeTag::Click => "click",
            TypeTag::Input => "input",
            TypeTag::Performance => "performance",
            TypeTag::Log => "log",
            TypeTag::InternalError => "internal_error",
            TypeTag::NetworkCall => "network_call",
            TypeTag::Swipe => "swipe",
            TypeTag::BatchMeta => "batch_meta",
            TypeTag::GraphQl => "graphql",
        }
    }
}

impl TryFrom<u8> for TypeTag {
    type Error = TrackerError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        TypeTag::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_u8() == value)
            .ok_or(TrackerError::UnknownRecordType(value))
    }
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name(), self.as_u8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_tags_are_unique_and_round_trip() {
        let mut seen = HashSet::new();
        for tag in TypeTag::ALL {
            assert!(seen.insert(tag.as_u8()), "duplicate tag {}", tag);
            assert_eq!(TypeTag::try_from(tag.as_u8()).unwrap(), tag);
        }
    }

    #[test]
    fn test_unknown_tag() {
        assert_eq!(
            TypeTag::try_from(99),
            Err(TrackerError::UnknownRecordType(99))
        );
        assert_eq!(TypeTag::try_from(0), Err(TrackerError::UnknownRecordType(0)));
    }

    #[test]
    fn test_wire_values() {
        assert_eq!(TypeTag::Click.as_u8(), 100);
        assert_eq!(TypeTag::BatchMeta.as_u8(), 107);
        assert_eq!(TypeTag::GraphQl.to_string(), "graphql(109)");
    }
}
