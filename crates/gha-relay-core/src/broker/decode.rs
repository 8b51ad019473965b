//! Protocol decoder: raw broker bytes to a typed [`RequestEvent`].
//!
//! Pure; no I/O. Rejects anything that is not a `trigger` request with a
//! supported protocol version and a known event type.

use serde::Deserialize;

use super::request::{PatchEvent, PushEvent, RequestEvent};
use crate::error::ProtocolError;

/// Literal value of the `request` field this relay reacts to.
pub const TRIGGER_REQUEST: &str = "trigger";

/// Broker protocol versions this relay understands.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[u32] = &[1];

fn default_version() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct Envelope {
    request: String,
    event_type: String,
    #[serde(default = "default_version")]
    version: u32,
}

/// Decode one request message.
pub fn decode(raw: &[u8]) -> Result<RequestEvent, ProtocolError> {
    let envelope: Envelope = serde_json::from_slice(raw).map_err(ProtocolError::Malformed)?;

    if envelope.request != TRIGGER_REQUEST {
        return Err(ProtocolError::UnsupportedRequest(envelope.request));
    }
    if !SUPPORTED_PROTOCOL_VERSIONS.contains(&envelope.version) {
        return Err(ProtocolError::UnsupportedVersion(envelope.version));
    }

    match envelope.event_type.as_str() {
        "push" => serde_json::from_slice::<PushEvent>(raw)
            .map(RequestEvent::Push)
            .map_err(|source| ProtocolError::InvalidPayload {
                event_type: "push",
                source,
            }),
        "patch" => serde_json::from_slice::<PatchEvent>(raw)
            .map(RequestEvent::Patch)
            .map_err(|source| ProtocolError::InvalidPayload {
                event_type: "patch",
                source,
            }),
        _ => Err(ProtocolError::UnsupportedEventType(envelope.event_type)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUSH: &str = r#"{"request": "trigger","event_type": "push","version": 1,"pusher": {"id": "did:key:z6MkltRpzcq2ybm13yQpyre58JUeMvZY6toxoZVpLZ8YabRa","alias": "node_alias"},"before": "<BEFORE_COMMIT>","after": "<AFTER_COMMIT>","commits": ["<SOME_OTHER_COMMIT_BEING_PUSHED>", "<AFTER_COMMIT>"],"repository": {"id": "<RID>","name": "heartwood","description": "Radicle is a sovereign peer-to-peer network for code collaboration, built on top of Git.","private": false,"default_branch": "main","delegates": ["did:key:z6MkltRpzcq2ybm13yQpyre58JUeMvZY6toxoZVpLZ8YabRa"]}}"#;

    const PATCH: &str = r#"{"request": "trigger","event_type": "patch","version": 1,"action": "created","patch": {"id": "<PATCH_ID>","author": {"id": "did:key:z6Mk","alias": "alice"},"title": "Add feature","state": {"status": "open","conflicts": []},"before": "<BEFORE>","after": "<AFTER>","commits": ["<AFTER>"],"target": "delegates","labels": [],"assignees": [],"revisions": [{"id": "<REV1>","author": {"id": "did:key:z6Mk","alias": "alice"},"description": "first","base": "<BASE>","oid": "<OID1>","timestamp": 1700000000},{"id": "<REV2>","author": {"id": "did:key:z6Mk","alias": "alice"},"description": "second","base": "<BASE>","oid": "<AFTER>","timestamp": 1700000100}]},"repository": {"id": "<RID>","name": "heartwood"}}"#;

    #[test]
    fn test_decode_push() {
        let event = decode(PUSH.as_bytes()).expect("decode push");
        assert_eq!(event.repo(), "<RID>");
        assert_eq!(event.commit(), "<AFTER_COMMIT>");
        let RequestEvent::Push(push) = event else {
            panic!("expected push event");
        };
        assert_eq!(push.pusher.alias, "node_alias");
        assert_eq!(push.before, "<BEFORE_COMMIT>");
        assert_eq!(push.commits.len(), 2);
        assert_eq!(push.repository.default_branch, "main");
    }

    #[test]
    fn test_decode_minimal_push_without_version() {
        let raw = br#"{"request":"trigger","event_type":"push","after":"C","repository":{"id":"R"}}"#;
        let event = decode(raw).expect("decode minimal push");
        assert!(matches!(event, RequestEvent::Push(_)));
        assert_eq!(event.repo(), "R");
        assert_eq!(event.commit(), "C");
    }

    #[test]
    fn test_decode_patch() {
        let event = decode(PATCH.as_bytes()).expect("decode patch");
        assert_eq!(event.repo(), "<RID>");
        assert_eq!(event.commit(), "<AFTER>");
        let patch = event.patch().expect("patch payload");
        assert_eq!(patch.patch.id, "<PATCH_ID>");
        assert_eq!(patch.patch.revisions.len(), 2);
        assert_eq!(patch.latest_revision().unwrap().id, "<REV2>");
    }

    #[test]
    fn test_unknown_event_type_rejected() {
        let raw = br#"{"request":"trigger","event_type":"unknown","after":"C","repository":{"id":"R"}}"#;
        let err = decode(raw).unwrap_err();
        assert!(matches!(err, ProtocolError::UnsupportedEventType(ref t) if t == "unknown"));
    }

    #[test]
    fn test_non_trigger_request_rejected() {
        let raw = br#"{"request":"some request","event_type":"push","after":"C","repository":{"id":"R"}}"#;
        let err = decode(raw).unwrap_err();
        assert!(matches!(err, ProtocolError::UnsupportedRequest(_)));
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let raw = br#"{"request":"trigger","event_type":"push","version":99,"after":"C","repository":{"id":"R"}}"#;
        let err = decode(raw).unwrap_err();
        assert!(matches!(err, ProtocolError::UnsupportedVersion(99)));
    }

    #[test]
    fn test_truncated_json_is_malformed() {
        let err = decode(br#"{"request": 1"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn test_mistyped_payload_field_rejected() {
        let raw = br#"{"request":"trigger","event_type":"push","pusher":{"id":123,"alias":"a"},"after":"C","repository":{"id":"R"}}"#;
        let err = decode(raw).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidPayload {
                event_type: "push",
                ..
            }
        ));
    }
}
