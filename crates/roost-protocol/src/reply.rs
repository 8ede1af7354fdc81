//! Reading replies from the remote.
//!
//! A reply can fail in two ways that both have to be checked: a non-2xx
//! status, or a `200` whose body is the in-band `{"kind":"error"}` marker.
//! [`read_reply`] folds both into [`ProtocolError`] so callers only ever
//! see a typed value or a distinguishable failure.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use roost_transport::Response;
use serde::de::{self, DeserializeOwned, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::{Codec, EntityId, ErrorReply, ProtocolError};

#[derive(Deserialize)]
#[serde(untagged)]
enum InBand<T> {
    Rejected(ErrorReply),
    Success(T),
}

/// Checks the status, then the in-band marker, then decodes `T`.
///
/// An empty body reads as `null`, so `T = Option<_>` turns "nothing
/// there" into `None`.
pub fn read_reply<C, T>(codec: &C, response: &Response) -> Result<T, ProtocolError>
where
    C: Codec,
    T: DeserializeOwned,
{
    if !response.is_success() {
        return Err(ProtocolError::Status(response.status));
    }

    let body: &[u8] = if response.body.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        &response.body
    };

    match codec.decode::<InBand<T>>(body)? {
        InBand::Rejected(reply) => Err(ProtocolError::Rejected(reply.detail)),
        InBand::Success(value) => Ok(value),
    }
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

/// A keyed collection as the remote lists it: `{ id: record, ... }`.
///
/// Entries keep the order the remote sent them in. `null` reads as an
/// empty collection, and a repeated key keeps its first position but
/// takes the last value, so ids are unique.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection<R>(pub Vec<(EntityId, R)>);

impl<R> Collection<R> {
    pub fn into_inner(self) -> Vec<(EntityId, R)> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<R> Default for Collection<R> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<'de, R: Deserialize<'de>> Deserialize<'de> for Collection<R> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(CollectionVisitor(PhantomData))
    }
}

struct CollectionVisitor<R>(PhantomData<R>);

impl<'de, R: Deserialize<'de>> Visitor<'de> for CollectionVisitor<R> {
    type Value = Collection<R>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of id to record, or null")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(Collection::default())
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(Collection::default())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut entries: Vec<(EntityId, R)> = Vec::with_capacity(map.size_hint().unwrap_or(0));
        let mut positions: HashMap<EntityId, usize> = HashMap::new();

        while let Some((id, record)) = map.next_entry::<EntityId, R>()? {
            match positions.get(&id) {
                Some(&index) => entries[index].1 = record,
                None => {
                    positions.insert(id.clone(), entries.len());
                    entries.push((id, record));
                }
            }
        }
        Ok(Collection(entries))
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use serde::de::IgnoredAny;

    use super::*;
    use crate::{AssignedId, JsonCodec};

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Note {
        text: String,
    }

    fn ok(body: &str) -> Response {
        Response::new(200, body)
    }

    // =====================================================================
    // read_reply()
    // =====================================================================

    #[test]
    fn test_read_reply_success_decodes_value() {
        let reply: AssignedId = read_reply(&JsonCodec, &ok(r#"{"assignedId":"n1"}"#)).unwrap();
        assert_eq!(reply.assigned_id, EntityId::new("n1"));
    }

    #[test]
    fn test_read_reply_in_band_error_is_rejected_despite_200() {
        let result: Result<AssignedId, _> =
            read_reply(&JsonCodec, &ok(r#"{"kind":"error","detail":"quota"}"#));
        assert!(matches!(result, Err(ProtocolError::Rejected(d)) if d == "quota"));
    }

    #[test]
    fn test_read_reply_in_band_error_detected_for_ignored_payloads() {
        // Even when the caller doesn't care about the body, the marker
        // must still surface as a failure.
        let result: Result<IgnoredAny, _> =
            read_reply(&JsonCodec, &ok(r#"{"kind":"error","detail":"nope"}"#));
        assert!(matches!(result, Err(ProtocolError::Rejected(_))));
    }

    #[test]
    fn test_read_reply_non_success_status_returns_status_error() {
        let result: Result<IgnoredAny, _> = read_reply(&JsonCodec, &Response::new(503, ""));
        assert!(matches!(result, Err(ProtocolError::Status(503))));
    }

    #[test]
    fn test_read_reply_empty_body_reads_as_null() {
        let note: Option<Note> = read_reply(&JsonCodec, &ok("  ")).unwrap();
        assert_eq!(note, None);
    }

    #[test]
    fn test_read_reply_wrong_shape_returns_decode_error() {
        let result: Result<AssignedId, _> = read_reply(&JsonCodec, &ok(r#"{"other":1}"#));
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    // =====================================================================
    // Collection
    // =====================================================================

    #[test]
    fn test_collection_keeps_remote_order() {
        let collection: Collection<Note> = read_reply(
            &JsonCodec,
            &ok(r#"{"z":{"text":"first"},"a":{"text":"second"}}"#),
        )
        .unwrap();
        let ids: Vec<&str> = collection.0.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["z", "a"]);
    }

    #[test]
    fn test_collection_null_is_empty() {
        let collection: Collection<Note> = read_reply(&JsonCodec, &ok("null")).unwrap();
        assert!(collection.is_empty());
    }

    #[test]
    fn test_collection_repeated_key_keeps_one_entry() {
        let collection: Collection<Note> = serde_json::from_str(
            r#"{"a":{"text":"old"},"b":{"text":"b"},"a":{"text":"new"}}"#,
        )
        .unwrap();
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.0[0].0, EntityId::new("a"));
        assert_eq!(collection.0[0].1.text, "new");
    }
}
