//! Response bodies.

use crate::error::{ProtocolError, ProtocolResult};
use crate::resource::Resource;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Keys under which a single record may be wrapped.
const RECORD_ENVELOPES: &[&str] = &["data", "client", "feedback", "notification"];

/// One page of a list endpoint.
///
/// The item array is accepted under `items` or under the collection
/// names the server historically used (`clients`, `feedbacks`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse {
    /// Records on this page.
    #[serde(
        alias = "clients",
        alias = "feedbacks",
        alias = "notifications",
        alias = "areas",
        alias = "users",
        default
    )]
    pub items: Vec<Resource>,
    /// Page the server actually returned.
    #[serde(default = "first_page")]
    pub current_page: u32,
    /// Total number of pages for the query.
    #[serde(default = "first_page")]
    pub total_pages: u32,
    /// Total number of records matching the query.
    #[serde(default)]
    pub total: u64,
}

fn first_page() -> u32 {
    1
}

impl PageResponse {
    /// Creates a page response.
    pub fn new(items: Vec<Resource>, current_page: u32, total_pages: u32, total: u64) -> Self {
        Self {
            items,
            current_page,
            total_pages,
            total,
        }
    }

    /// Decodes a list response body.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Encodes to JSON bytes.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }
}

/// Body of `GET notifications/unread-count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCount {
    /// Number of unread notifications.
    pub count: u64,
}

impl UnreadCount {
    /// Decodes an unread count body.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Error body returned by the server on rejection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    /// Human readable message.
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    /// Extracts the server `message` from a rejection body, if any.
    ///
    /// Bodies that are not JSON, or carry an empty message, yield `None`.
    pub fn message_from(bytes: &[u8]) -> Option<String> {
        serde_json::from_slice::<ErrorBody>(bytes)
            .ok()
            .and_then(|body| body.message)
            .filter(|message| !message.trim().is_empty())
    }
}

/// Decodes a single-record response, unwrapping known envelopes.
pub fn decode_record(bytes: &[u8]) -> ProtocolResult<Resource> {
    let value: Value = serde_json::from_slice(bytes)?;
    let Value::Object(map) = &value else {
        return Err(ProtocolError::Decode("record body is not a JSON object".into()));
    };
    if map.contains_key(Resource::ID_FIELD) || map.contains_key("id") {
        return Resource::from_value(value);
    }
    RECORD_ENVELOPES
        .iter()
        .find_map(|key| map.get(*key).filter(|inner| inner.is_object()))
        .cloned()
        .map(Resource::from_value)
        .unwrap_or_else(|| Err(ProtocolError::invalid_field("_id", "no record in response")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_items_page() {
        let body = json!({
            "items": [{"_id": "a"}, {"_id": "b"}],
            "currentPage": 2,
            "totalPages": 3,
            "total": 45
        });
        let page = PageResponse::decode(&serde_json::to_vec(&body).unwrap()).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.current_page, 2);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total, 45);
    }

    #[test]
    fn decode_collection_named_arrays() {
        for key in ["clients", "feedbacks", "notifications"] {
            let body = json!({ key: [{"_id": "x"}], "currentPage": 1, "totalPages": 1, "total": 1 });
            let page = PageResponse::decode(&serde_json::to_vec(&body).unwrap()).unwrap();
            assert_eq!(page.items[0].id().as_str(), "x", "array under {key}");
        }
    }

    #[test]
    fn missing_pagination_defaults() {
        let page = PageResponse::decode(br#"{"areas": []}"#).unwrap();
        assert_eq!(page.current_page, 1);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.total, 0);
    }

    #[test]
    fn error_message_extraction() {
        assert_eq!(
            ErrorBody::message_from(br#"{"message": "Client not found"}"#),
            Some("Client not found".to_string())
        );
        assert_eq!(ErrorBody::message_from(br#"{"message": "  "}"#), None);
        assert_eq!(ErrorBody::message_from(b"<html>502</html>"), None);
    }

    #[test]
    fn record_envelopes() {
        let bare = decode_record(br#"{"_id": "c1", "name": "Acme"}"#).unwrap();
        assert_eq!(bare.id().as_str(), "c1");

        let wrapped = decode_record(br#"{"data": {"_id": "c2", "isActive": false}}"#).unwrap();
        assert_eq!(wrapped.id().as_str(), "c2");
        assert!(!wrapped.is_active());

        let notification =
            decode_record(br#"{"notification": {"_id": "n1", "isRead": true}}"#).unwrap();
        assert!(notification.is_read());

        assert!(decode_record(br#"{"ok": true}"#).is_err());
    }

    #[test]
    fn unread_count() {
        assert_eq!(UnreadCount::decode(br#"{"count": 7}"#).unwrap().count, 7);
    }
}
