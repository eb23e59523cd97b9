use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::Coordinate;

/// A validated bathroom entry. `id` is `None` until the store persists it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BathroomRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default)]
    pub notes: String,
    pub is_unisex: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean_rating: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bathroom_rating: Option<i64>,
    pub location: Coordinate,
}

impl BathroomRecord {
    pub fn with_id(self, id: Uuid) -> Self {
        Self {
            id: Some(id),
            ..self
        }
    }
}

/// Untrusted form input, as typed by the user.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_unisex: bool,
    #[serde(default)]
    pub clean_rating: Option<i64>,
    #[serde(default)]
    pub bathroom_rating: Option<i64>,
    #[serde(default)]
    pub coordinate: Option<Coordinate>,
}

#[test]
fn persisted_layout_uses_document_keys() {
    let record = BathroomRecord {
        id: None,
        name: "Starbucks".into(),
        code: None,
        notes: "".into(),
        is_unisex: true,
        clean_rating: Some(4),
        bathroom_rating: None,
        location: Coordinate::new(1.0, 2.0),
    };

    let value = serde_json::to_value(&record).unwrap();

    assert_eq!(
        value,
        serde_json::json!({
            "name": "Starbucks",
            "notes": "",
            "isUnisex": true,
            "cleanRating": 4,
            "location": { "latitude": 1.0, "longitude": 2.0 },
        })
    );
}

#[test]
fn stored_document_without_optional_fields_decodes() {
    let id = Uuid::new_v4();
    let value = serde_json::json!({
        "id": id,
        "name": "Library",
        "isUnisex": false,
        "location": { "latitude": 0.0, "longitude": 0.0 },
    });

    let record: BathroomRecord = serde_json::from_value(value).unwrap();

    assert_eq!(record.id, Some(id));
    assert_eq!(record.notes, "");
    assert_eq!(record.code, None);
    assert_eq!(record.clean_rating, None);
}
