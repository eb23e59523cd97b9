use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{BathroomRecord, Coordinate};

const SUBTITLE_SEPARATOR: &str = " · ";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DisplayAnnotation {
    pub id: Uuid,
    pub title: String,
    pub subtitle: String,
    pub coordinate: Coordinate,
    pub code: Option<String>,
    pub notes: String,
    pub is_unisex: bool,
    pub clean_rating: Option<i64>,
    pub bathroom_rating: Option<i64>,
}

impl DisplayAnnotation {
    /// Projects a persisted record. Returns `None` for a record the store has
    /// not assigned an id to yet.
    pub fn project(record: &BathroomRecord) -> Option<Self> {
        let id = record.id?;

        Some(Self {
            id,
            title: record.name.clone(),
            subtitle: subtitle(record),
            coordinate: record.location,
            code: record.code.clone(),
            notes: record.notes.clone(),
            is_unisex: record.is_unisex,
            clean_rating: record.clean_rating,
            bathroom_rating: record.bathroom_rating,
        })
    }

    /// Text shown when the pin is selected.
    pub fn details(&self) -> String {
        let mut lines = vec![format!("Location: {}", self.title)];

        if let Some(rating) = self.clean_rating {
            lines.push(format!("Clean rating: {}/5", rating));
        }
        if let Some(rating) = self.bathroom_rating {
            lines.push(format!("Bathroom rating: {}/5", rating));
        }
        if let Some(code) = &self.code {
            lines.push(format!("Code: {}", code));
        }

        lines.push(format!(
            "Unisex: {}",
            if self.is_unisex { "Yes" } else { "No" }
        ));

        if !self.notes.is_empty() {
            lines.push(format!("Notes: {}", self.notes));
        }

        lines.join("\n")
    }
}

fn subtitle(record: &BathroomRecord) -> String {
    let code = record
        .code
        .as_deref()
        .filter(|code| !code.is_empty())
        .map(|code| format!("Code: {}", code));
    let unisex = record.is_unisex.then(|| "Unisex".to_string());

    [code, unisex]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(SUBTITLE_SEPARATOR)
}

/// An entry in the rendered map collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MapAnnotation {
    UserPosition(Coordinate),
    Bathroom(DisplayAnnotation),
}

impl MapAnnotation {
    pub fn bathroom(&self) -> Option<&DisplayAnnotation> {
        match self {
            Self::Bathroom(annotation) => Some(annotation),
            Self::UserPosition(_) => None,
        }
    }

    pub fn is_user_position(&self) -> bool {
        matches!(self, Self::UserPosition(_))
    }
}

#[cfg(test)]
fn record(code: Option<&str>, is_unisex: bool) -> BathroomRecord {
    BathroomRecord {
        id: Some(Uuid::new_v4()),
        name: "Starbucks".into(),
        code: code.map(Into::into),
        notes: "ask the barista".into(),
        is_unisex,
        clean_rating: Some(4),
        bathroom_rating: None,
        location: Coordinate::new(47.6, -122.3),
    }
}

#[test]
fn projection_copies_record_fields() {
    let record = record(Some("1234"), false);
    let annotation = DisplayAnnotation::project(&record).unwrap();

    assert_eq!(Some(annotation.id), record.id);
    assert_eq!(annotation.title, record.name);
    assert_eq!(annotation.coordinate, record.location);
    assert_eq!(annotation.code, record.code);
    assert_eq!(annotation.notes, record.notes);
    assert_eq!(annotation.clean_rating, Some(4));
    assert_eq!(annotation.bathroom_rating, None);
}

#[test]
fn projection_requires_an_id() {
    let mut record = record(None, false);
    record.id = None;

    assert!(DisplayAnnotation::project(&record).is_none());
}

#[test]
fn subtitle_skips_absent_facts() {
    let subtitle_of = |code, unisex| DisplayAnnotation::project(&record(code, unisex)).unwrap().subtitle;

    assert_eq!(subtitle_of(Some("1234"), true), "Code: 1234 · Unisex");
    assert_eq!(subtitle_of(Some("1234"), false), "Code: 1234");
    assert_eq!(subtitle_of(None, true), "Unisex");
    assert_eq!(subtitle_of(None, false), "");
}

#[test]
fn details_omit_missing_lines() {
    let annotation = DisplayAnnotation::project(&record(None, true)).unwrap();

    assert_eq!(
        annotation.details(),
        "Location: Starbucks\nClean rating: 4/5\nUnisex: Yes\nNotes: ask the barista"
    );
}
