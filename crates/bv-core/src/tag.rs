//! Tag identifiers for checked-in bikes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for tag identifiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TagError {
    /// The text was not an alphabetic prefix followed by a number.
    #[error("malformed tag: {value:?}")]
    Malformed { value: String },
}

/// An identifier assigned to a bike for the duration of a visit.
///
/// A tag is a case-normalized alphabetic prefix plus a non-negative
/// number, e.g. `wa5` or `be12`. Ordering is by prefix, then number,
/// so `be9` sorts before `be10`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TagId {
    prefix: String,
    number: u32,
}

impl TagId {
    /// Creates a tag after validating and normalizing the prefix.
    pub fn new(prefix: impl Into<String>, number: u32) -> Result<Self, TagError> {
        let prefix = prefix.into();
        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(TagError::Malformed {
                value: format!("{prefix}{number}"),
            });
        }
        Ok(Self {
            prefix: prefix.to_ascii_lowercase(),
            number,
        })
    }

    /// The normalized (lowercase) alphabetic prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The numeric suffix.
    #[must_use]
    pub const fn number(&self) -> u32 {
        self.number
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix, self.number)
    }
}

impl FromStr for TagId {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let malformed = || TagError::Malformed {
            value: s.to_string(),
        };
        let split = text
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit())
            .map(|(i, _)| i)
            .ok_or_else(malformed)?;
        let (prefix, digits) = text.split_at(split);
        let number: u32 = digits.parse().map_err(|_| malformed())?;
        Self::new(prefix, number).map_err(|_| malformed())
    }
}

impl TryFrom<String> for TagId {
    type Error = TagError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TagId> for String {
    fn from(tag: TagId) -> Self {
        tag.to_string()
    }
}

/// Groups tag numbers under their prefixes, each list sorted ascending.
pub fn numbers_by_prefix<'a, I>(tags: I) -> BTreeMap<String, Vec<u32>>
where
    I: IntoIterator<Item = &'a TagId>,
{
    let mut grouped: BTreeMap<String, Vec<u32>> = BTreeMap::new();
    for tag in tags {
        grouped.entry(tag.prefix.clone()).or_default().push(tag.number);
    }
    for numbers in grouped.values_mut() {
        numbers.sort_unstable();
    }
    grouped
}

/// The greatest tag number in use under `prefix`, if any.
pub fn greatest_tag_number<'a, I>(prefix: &str, tags: I) -> Option<u32>
where
    I: IntoIterator<Item = &'a TagId>,
{
    tags.into_iter()
        .filter(|tag| tag.prefix == prefix)
        .map(TagId::number)
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(text: &str) -> TagId {
        text.parse().expect("valid test tag")
    }

    #[test]
    fn parses_and_normalizes_case() {
        let parsed = tag("WA5");
        assert_eq!(parsed.prefix(), "wa");
        assert_eq!(parsed.number(), 5);
        assert_eq!(parsed, tag("wa5"));
        assert_eq!(parsed.to_string(), "wa5");
    }

    #[test]
    fn parses_zero_padded_numbers() {
        assert_eq!(tag("be01"), tag("be1"));
        assert_eq!(tag("be01").to_string(), "be1");
    }

    #[test]
    fn rejects_malformed_tags() {
        for bad in ["", "wa", "5wa", "123", "w a5", "wa-5"] {
            assert!(bad.parse::<TagId>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn orders_by_prefix_then_number() {
        let mut tags = vec![tag("wa12"), tag("be10"), tag("wa5"), tag("be9")];
        tags.sort();
        let sorted: Vec<String> = tags.iter().map(ToString::to_string).collect();
        assert_eq!(sorted, ["be9", "be10", "wa5", "wa12"]);
    }

    #[test]
    fn serde_roundtrip() {
        let id = tag("be7");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"be7\"");
        let parsed: TagId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn serde_rejects_malformed() {
        let result: Result<TagId, _> = serde_json::from_str("\"not a tag\"");
        assert!(result.is_err());
    }

    #[test]
    fn groups_numbers_by_prefix() {
        let tags = [tag("wa5"), tag("be1"), tag("wa12"), tag("be10"), tag("be9")];
        let grouped = numbers_by_prefix(&tags);
        assert_eq!(grouped["be"], vec![1, 9, 10]);
        assert_eq!(grouped["wa"], vec![5, 12]);
    }

    #[test]
    fn finds_greatest_number_in_prefix() {
        let tags = [tag("wa5"), tag("wa12"), tag("be9")];
        assert_eq!(greatest_tag_number("wa", &tags), Some(12));
        assert_eq!(greatest_tag_number("be", &tags), Some(9));
        assert_eq!(greatest_tag_number("zz", &tags), None);
    }
}
