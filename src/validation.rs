use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

use crate::entities::{BathroomRecord, RawInput};

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

/// Whether a bathroom must carry an access code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodePolicy {
    #[default]
    Optional,
    Required,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationError {
    MissingOrInvalidCoordinate,
    MissingName,
    MissingCode,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::MissingOrInvalidCoordinate => {
                "There was an error getting the location's coordinate."
            }
            Self::MissingName => "Please enter a name for the location.",
            Self::MissingCode => "Please enter the bathroom code.",
        };

        f.write_str(message)
    }
}

impl std::error::Error for ValidationError {}

pub fn clamp_rating(rating: i64) -> i64 {
    rating.clamp(MIN_RATING, MAX_RATING)
}

fn trimmed(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Turns raw form input into an unsaved record. Rules run in a fixed order and
/// the first violation is returned.
pub fn validate(raw: &RawInput, policy: CodePolicy) -> Result<BathroomRecord, ValidationError> {
    let location = raw
        .coordinate
        .filter(|coordinate| coordinate.is_valid())
        .ok_or(ValidationError::MissingOrInvalidCoordinate)?;

    let name = trimmed(&raw.name).ok_or(ValidationError::MissingName)?;

    let code = trimmed(&raw.code);
    if policy == CodePolicy::Required && code.is_none() {
        return Err(ValidationError::MissingCode);
    }

    Ok(BathroomRecord {
        id: None,
        name: name.into(),
        code: code.map(Into::into),
        notes: raw.notes.clone().unwrap_or_default(),
        is_unisex: raw.is_unisex,
        clean_rating: raw.clean_rating.map(clamp_rating),
        bathroom_rating: raw.bathroom_rating.map(clamp_rating),
        location,
    })
}

#[cfg(test)]
fn valid_input() -> RawInput {
    use crate::entities::Coordinate;

    RawInput {
        name: Some("Starbucks".into()),
        code: Some("123".into()),
        notes: None,
        is_unisex: false,
        clean_rating: Some(3),
        bathroom_rating: Some(3),
        coordinate: Some(Coordinate::new(47.6, -122.3)),
    }
}

#[test]
fn blank_name_fails_regardless_of_other_fields() {
    for name in [None, Some(""), Some("  "), Some("\n\t ")] {
        let raw = RawInput {
            name: name.map(Into::into),
            ..valid_input()
        };

        assert_eq!(
            validate(&raw, CodePolicy::Optional),
            Err(ValidationError::MissingName)
        );
        assert_eq!(
            validate(&raw, CodePolicy::Required),
            Err(ValidationError::MissingName)
        );
    }
}

#[test]
fn coordinate_is_checked_before_name() {
    use crate::entities::Coordinate;

    for coordinate in [
        None,
        Some(Coordinate::new(f64::NAN, 0.0)),
        Some(Coordinate::new(91.0, 0.0)),
        Some(Coordinate::new(0.0, 181.0)),
    ] {
        let raw = RawInput {
            name: Some("  ".into()),
            coordinate,
            ..valid_input()
        };

        assert_eq!(
            validate(&raw, CodePolicy::Required),
            Err(ValidationError::MissingOrInvalidCoordinate)
        );
    }
}

#[test]
fn blank_code_is_absent_when_optional() {
    let raw = RawInput {
        code: Some("".into()),
        ..valid_input()
    };

    let record = validate(&raw, CodePolicy::Optional).unwrap();

    assert_eq!(record.name, "Starbucks");
    assert_eq!(record.code, None);
    assert_eq!(record.id, None);
}

#[test]
fn blank_code_fails_when_required() {
    let raw = RawInput {
        code: Some(" \n".into()),
        ..valid_input()
    };

    assert_eq!(
        validate(&raw, CodePolicy::Required),
        Err(ValidationError::MissingCode)
    );

    let raw = RawInput {
        code: None,
        ..valid_input()
    };

    assert_eq!(
        validate(&raw, CodePolicy::Required),
        Err(ValidationError::MissingCode)
    );
}

#[test]
fn fields_are_trimmed_and_defaulted() {
    let raw = RawInput {
        name: Some("  Central Library \n".into()),
        code: Some(" 4321 ".into()),
        notes: None,
        is_unisex: true,
        ..valid_input()
    };

    let record = validate(&raw, CodePolicy::Required).unwrap();

    assert_eq!(record.name, "Central Library");
    assert_eq!(record.code.as_deref(), Some("4321"));
    assert_eq!(record.notes, "");
    assert!(record.is_unisex);
}

#[test]
fn ratings_are_clamped_not_rejected() {
    let raw = RawInput {
        clean_rating: Some(0),
        bathroom_rating: Some(42),
        ..valid_input()
    };

    let record = validate(&raw, CodePolicy::Optional).unwrap();

    assert_eq!(record.clean_rating, Some(1));
    assert_eq!(record.bathroom_rating, Some(5));

    let raw = RawInput {
        clean_rating: None,
        bathroom_rating: None,
        ..valid_input()
    };

    let record = validate(&raw, CodePolicy::Optional).unwrap();

    assert_eq!(record.clean_rating, None);
    assert_eq!(record.bathroom_rating, None);
}

#[test]
fn clamp_rating_is_bounded_and_idempotent() {
    assert_eq!(clamp_rating(0), 1);
    assert_eq!(clamp_rating(6), 5);
    assert_eq!(clamp_rating(3), 3);

    for rating in [i64::MIN, -7, 0, 1, 2, 5, 6, 100, i64::MAX] {
        let clamped = clamp_rating(rating);

        assert!((MIN_RATING..=MAX_RATING).contains(&clamped));
        assert_eq!(clamp_rating(clamped), clamped);
    }
}
