//! Acknowledged message-number ranges.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A range with a zero lower bound or with `lower > upper`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid sequence range {lower}-{upper}")]
pub struct InvalidSequenceRange {
    pub lower: u64,
    pub upper: u64,
}

/// Inclusive range of message numbers, `lower <= upper`, numbering from 1.
///
/// Deserialization goes through [`SequenceRange::try_new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSequenceRange", into = "RawSequenceRange")]
pub struct SequenceRange {
    lower: u64,
    upper: u64,
}

#[derive(Serialize, Deserialize)]
struct RawSequenceRange {
    lower: u64,
    upper: u64,
}

impl TryFrom<RawSequenceRange> for SequenceRange {
    type Error = InvalidSequenceRange;

    fn try_from(raw: RawSequenceRange) -> Result<Self, Self::Error> {
        Self::try_new(raw.lower, raw.upper)
    }
}

impl From<SequenceRange> for RawSequenceRange {
    fn from(range: SequenceRange) -> Self {
        Self {
            lower: range.lower,
            upper: range.upper,
        }
    }
}

impl SequenceRange {
    /// Checked constructor for ranges that come off the wire.
    pub fn try_new(lower: u64, upper: u64) -> Result<Self, InvalidSequenceRange> {
        if lower == 0 || lower > upper {
            return Err(InvalidSequenceRange { lower, upper });
        }
        Ok(Self { lower, upper })
    }

    /// # Panics
    /// If `lower` is zero or greater than `upper`.
    pub fn new(lower: u64, upper: u64) -> Self {
        match Self::try_new(lower, upper) {
            Ok(range) => range,
            Err(invalid) => panic!("{}", invalid),
        }
    }

    /// Range covering a single message number.
    pub fn single(number: u64) -> Self {
        Self::new(number, number)
    }

    pub fn lower(&self) -> u64 {
        self.lower
    }

    pub fn upper(&self) -> u64 {
        self.upper
    }

    pub fn contains(&self, number: u64) -> bool {
        self.lower <= number && number <= self.upper
    }
}

impl fmt::Display for SequenceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lower == self.upper {
            write!(f, "{}", self.lower)
        } else {
            write!(f, "{}-{}", self.lower, self.upper)
        }
    }
}

/// Ordered, disjoint, non-adjacent ranges. Merging coalesces overlapping
/// and touching ranges.
///
/// Serialized as a plain list; a deserialized list is merged range by range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<SequenceRange>", into = "Vec<SequenceRange>")]
pub struct SequenceRangeCollection {
    ranges: Vec<SequenceRange>,
}

impl SequenceRangeCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ranges(ranges: impl IntoIterator<Item = SequenceRange>) -> Self {
        let mut collection = Self::new();
        for range in ranges {
            collection.merge(range);
        }
        collection
    }

    /// Add `range`, keeping the collection ascending and coalesced.
    pub fn merge(&mut self, range: SequenceRange) {
        let at = self.ranges.partition_point(|existing| existing.lower < range.lower);
        self.ranges.insert(at, range);

        let mut merged: Vec<SequenceRange> = Vec::with_capacity(self.ranges.len());
        for next in self.ranges.drain(..) {
            match merged.last_mut() {
                Some(current) if current.upper.saturating_add(1) >= next.lower => {
                    current.upper = current.upper.max(next.upper);
                }
                _ => merged.push(next),
            }
        }
        self.ranges = merged;
    }

    pub fn contains(&self, number: u64) -> bool {
        self.ranges.iter().any(|range| range.contains(number))
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SequenceRange> {
        self.ranges.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SequenceRange> {
        self.ranges.iter()
    }
}

impl FromIterator<SequenceRange> for SequenceRangeCollection {
    fn from_iter<I: IntoIterator<Item = SequenceRange>>(iter: I) -> Self {
        Self::from_ranges(iter)
    }
}

impl From<Vec<SequenceRange>> for SequenceRangeCollection {
    fn from(ranges: Vec<SequenceRange>) -> Self {
        Self::from_ranges(ranges)
    }
}

impl From<SequenceRangeCollection> for Vec<SequenceRange> {
    fn from(collection: SequenceRangeCollection) -> Self {
        collection.ranges
    }
}

impl fmt::Display for SequenceRangeCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, range) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", range)?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_coalesces_adjacent_and_overlapping() {
        let collection: SequenceRangeCollection = [
            SequenceRange::new(5, 6),
            SequenceRange::single(1),
            SequenceRange::new(2, 3),
            SequenceRange::new(9, 12),
            SequenceRange::new(6, 7),
        ]
        .into_iter()
        .collect();

        assert_eq!(collection.to_string(), "[1-3, 5-7, 9-12]");
        assert!(collection.contains(10));
        assert!(!collection.contains(4));
    }

    #[test]
    fn merge_bridging_range() {
        let mut collection = SequenceRangeCollection::from_ranges([SequenceRange::new(1, 2), SequenceRange::new(4, 5)]);
        collection.merge(SequenceRange::single(3));
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.get(0), Some(&SequenceRange::new(1, 5)));
    }

    #[test]
    fn checked_constructor_rejects_bad_bounds() {
        assert_eq!(SequenceRange::try_new(0, 3), Err(InvalidSequenceRange { lower: 0, upper: 3 }));
        assert!(SequenceRange::try_new(5, 4).is_err());
        assert_eq!(SequenceRange::try_new(2, 2), Ok(SequenceRange::single(2)));
    }

    #[test]
    fn deserialized_ranges_are_validated() {
        let err = serde_json::from_str::<SequenceRange>(r#"{"lower":5,"upper":0}"#).unwrap_err();
        assert!(err.to_string().contains("invalid sequence range 5-0"));
        assert!(serde_json::from_str::<SequenceRange>(r#"{"lower":0,"upper":0}"#).is_err());

        let range: SequenceRange = serde_json::from_str(r#"{"lower":1,"upper":4}"#).unwrap();
        assert_eq!(range, SequenceRange::new(1, 4));
    }

    #[test]
    fn deserialized_collection_is_coalesced() {
        let json = r#"[{"lower":3,"upper":3},{"lower":1,"upper":2},{"lower":6,"upper":8}]"#;
        let collection: SequenceRangeCollection = serde_json::from_str(json).unwrap();
        assert_eq!(collection.to_string(), "[1-3, 6-8]");

        let invalid = r#"[{"lower":1,"upper":2},{"lower":4,"upper":3}]"#;
        assert!(serde_json::from_str::<SequenceRangeCollection>(invalid).is_err());

        let written = serde_json::to_string(&collection).unwrap();
        assert_eq!(written, r#"[{"lower":1,"upper":3},{"lower":6,"upper":8}]"#);
    }

    #[test]
    #[should_panic(expected = "invalid sequence range")]
    fn zero_lower_bound_rejected() {
        SequenceRange::new(0, 3);
    }
}
