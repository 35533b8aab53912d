//! Query reply records and their normalization.
//!
//! The query protocol answers either with a single flat record or with a
//! "columnar" record in which some fields are equal-length arrays standing for
//! N implicit rows. [`normalize`] turns both shapes into a plain sequence of
//! row records so that nothing downstream has to care which one it got.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single reply row: field name to value.
pub type Record = Map<String, Value>;

/// Fields attached by transports for diagnostics. Never part of a row.
pub const METADATA_FIELDS: &[&str] = &["raw"];

fn is_metadata(field: &str) -> bool {
    METADATA_FIELDS.contains(&field)
}

/// Normalize a raw query reply into a sequence of rows.
///
/// - A reply that is already a sequence is returned unchanged.
/// - An object with no array-valued fields becomes a one-element sequence.
/// - An object with array-valued fields expands into N rows, N being the
///   length of the first array field. Row `i` takes `field[i]` from every
///   array field and every scalar field unchanged.
///
/// Metadata fields ([`METADATA_FIELDS`]) are dropped from the rows. A null
/// reply yields no rows; any other bare scalar is wrapped as-is.
pub fn normalize(raw: Value) -> Vec<Value> {
    match raw {
        Value::Array(rows) => rows,
        Value::Null => Vec::new(),
        Value::Object(map) => {
            let fields: Vec<(String, Value)> =
                map.into_iter().filter(|(k, _)| !is_metadata(k)).collect();

            let row_count = fields.iter().find_map(|(_, v)| v.as_array().map(Vec::len));
            let Some(row_count) = row_count else {
                return vec![Value::Object(fields.into_iter().collect())];
            };

            (0..row_count)
                .map(|i| {
                    let mut row = Record::new();
                    for (key, value) in &fields {
                        match value {
                            Value::Array(column) => {
                                if let Some(cell) = column.get(i) {
                                    row.insert(key.clone(), cell.clone());
                                }
                            }
                            scalar => {
                                row.insert(key.clone(), scalar.clone());
                            }
                        }
                    }
                    Value::Object(row)
                })
                .collect()
        }
        scalar => vec![scalar],
    }
}

/// Kind of connection a client entry represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    /// A real voice client.
    Voice,
    /// A query connection (including our own session).
    Query,
}

impl ClientType {
    fn from_marker(marker: u64) -> Self {
        if marker == 1 {
            Self::Query
        } else {
            Self::Voice
        }
    }
}

/// A connected client as reported by the query interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRecord {
    /// Per-connection client id.
    pub clid: u64,
    /// Database id, stable across connections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cldbid: Option<u64>,
    /// Display name.
    pub nickname: String,
    /// Voice client or query pseudo-client.
    #[serde(rename = "type")]
    pub client_type: ClientType,
    /// Every other field of the reply row, passed through untouched.
    #[serde(flatten)]
    pub extra: Record,
}

impl ClientRecord {
    /// Build a record from one normalized reply row or event payload.
    ///
    /// Numeric fields are accepted either as JSON numbers or as decimal
    /// strings. Returns `None` when the row has no usable `clid`.
    pub fn from_row(row: &Value) -> Option<Self> {
        let map = row.as_object()?;
        let clid = field_u64(map, &["clid"])?;
        let cldbid = field_u64(map, &["client_database_id", "cldbid"]);
        let nickname = field_str(map, &["client_nickname", "nickname"]).unwrap_or_default();
        let client_type = ClientType::from_marker(field_u64(map, &["client_type"]).unwrap_or(0));

        let consumed = [
            "clid",
            "client_database_id",
            "cldbid",
            "client_nickname",
            "nickname",
            "client_type",
        ];
        let extra = map
            .iter()
            .filter(|(k, _)| !consumed.contains(&k.as_str()) && !is_metadata(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Some(Self {
            clid,
            cldbid,
            nickname,
            client_type,
            extra,
        })
    }

    /// True for real voice clients, false for query pseudo-clients.
    pub fn is_voice(&self) -> bool {
        self.client_type == ClientType::Voice
    }
}

fn field_u64(map: &Record, names: &[&str]) -> Option<u64> {
    names.iter().find_map(|name| match map.get(*name)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn field_str(map: &Record, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| match map.get(*name)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn columnar_reply_expands_into_rows() {
        let rows = normalize(json!({ "a": [1, 2], "b": [9, 9], "raw": "x" }));
        assert_eq!(rows, vec![json!({ "a": 1, "b": 9 }), json!({ "a": 2, "b": 9 })]);
    }

    #[test]
    fn flat_reply_is_wrapped() {
        assert_eq!(normalize(json!({ "a": 1 })), vec![json!({ "a": 1 })]);
    }

    #[test]
    fn sequence_is_returned_unchanged() {
        let seq = vec![json!({ "a": [1, 2] }), json!("odd"), json!(3)];
        assert_eq!(normalize(Value::Array(seq.clone())), seq);
    }

    #[test]
    fn scalar_fields_repeat_on_every_row() {
        let rows = normalize(json!({ "cid": [1, 2, 3], "pid": 0 }));
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r["pid"] == json!(0)));
        assert_eq!(rows[2]["cid"], json!(3));
    }

    #[test]
    fn null_reply_has_no_rows() {
        assert!(normalize(Value::Null).is_empty());
    }

    #[test]
    fn client_record_accepts_string_numbers() {
        let row = json!({
            "clid": "7",
            "client_database_id": 12,
            "client_nickname": "alice",
            "client_type": "0",
            "cid": 3
        });
        let record = ClientRecord::from_row(&row).expect("record");
        assert_eq!(record.clid, 7);
        assert_eq!(record.cldbid, Some(12));
        assert_eq!(record.nickname, "alice");
        assert!(record.is_voice());
        assert_eq!(record.extra.get("cid"), Some(&json!(3)));
    }

    #[test]
    fn query_clients_are_flagged() {
        let row = json!({ "clid": 1, "client_nickname": "serveradmin", "client_type": 1 });
        let record = ClientRecord::from_row(&row).expect("record");
        assert!(!record.is_voice());
    }

    #[test]
    fn row_without_clid_is_rejected() {
        assert!(ClientRecord::from_row(&json!({ "client_nickname": "ghost" })).is_none());
        assert!(ClientRecord::from_row(&json!("not a row")).is_none());
    }
}
