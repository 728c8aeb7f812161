//! Sequence records and their text encoding.
//!
//! A record is stored as a single delimited text value:
//!
//! ```text
//! <sequence>,<class1>;<class2>;...;<classN>,<label>
//! ```
//!
//! Delimiters are not escaped. A sequence or class containing `,` or `;`
//! produces a value that does not decode back to the same record.

use crate::error::{CoreError, CoreResult};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Separates the three record fields.
pub const FIELD_DELIMITER: char = ',';

/// Separates classes within the class field.
pub const CLASS_DELIMITER: char = ';';

/// A biological sequence with its classification labels.
///
/// Two records are equal when their sequences are equal. `classes` and
/// `label` are payload and take no part in equality, so the same sequence
/// annotated differently compares equal.
#[derive(Debug, Clone)]
pub struct SequenceRecord {
    /// Sequence residues.
    pub sequence: String,
    /// Classification labels, unique and unordered.
    pub classes: BTreeSet<String>,
    /// Numeric label that must agree between merged duplicates.
    pub label: i64,
}

impl SequenceRecord {
    /// Creates a record.
    pub fn new<I, S>(sequence: impl Into<String>, classes: I, label: i64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sequence: sequence.into(),
            classes: classes.into_iter().map(Into::into).collect(),
            label,
        }
    }

    /// Encodes the record as `sequence,classes,label`.
    #[must_use]
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Decodes a record from its text form.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MalformedRecord`] if the text does not have
    /// exactly three comma-separated fields or the label is not an integer.
    pub fn decode(text: &str) -> CoreResult<Self> {
        let fields: Vec<&str> = text.split(FIELD_DELIMITER).collect();
        let [sequence, classes, label] = fields.as_slice() else {
            return Err(CoreError::malformed(
                text,
                format!("expected 3 fields, found {}", fields.len()),
            ));
        };

        let label = label
            .parse::<i64>()
            .map_err(|e| CoreError::malformed(text, format!("invalid label {label:?}: {e}")))?;

        let classes = if classes.is_empty() {
            BTreeSet::new()
        } else {
            classes.split(CLASS_DELIMITER).map(str::to_owned).collect()
        };

        Ok(Self {
            sequence: (*sequence).to_owned(),
            classes,
            label,
        })
    }

    /// Decodes a record from raw store bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MalformedRecord`] if the bytes are not UTF-8 or
    /// do not decode as a record.
    pub fn decode_bytes(bytes: &[u8]) -> CoreResult<Self> {
        let text = std::str::from_utf8(bytes).map_err(|e| {
            CoreError::malformed(String::from_utf8_lossy(bytes), format!("not UTF-8: {e}"))
        })?;
        Self::decode(text)
    }

    /// Returns a record with this record's sequence and label and the
    /// union of both class sets.
    #[must_use]
    pub fn merged_with(&self, other: &Self) -> Self {
        Self {
            sequence: self.sequence.clone(),
            classes: self.classes.union(&other.classes).cloned().collect(),
            label: self.label,
        }
    }

    /// Returns whether `sequence` and `classes` avoid the delimiters, so
    /// the encoding round-trips.
    #[must_use]
    pub fn is_encodable(&self) -> bool {
        let clean = |s: &str| !s.contains([FIELD_DELIMITER, CLASS_DELIMITER]);
        clean(&self.sequence) && self.classes.iter().all(|c| clean(c) && !c.is_empty())
    }
}

impl PartialEq for SequenceRecord {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}

impl Eq for SequenceRecord {}

impl PartialEq<str> for SequenceRecord {
    fn eq(&self, other: &str) -> bool {
        self.sequence == other
    }
}

impl AsRef<str> for SequenceRecord {
    fn as_ref(&self) -> &str {
        &self.sequence
    }
}

impl fmt::Display for SequenceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{FIELD_DELIMITER}", self.sequence)?;
        for (i, class) in self.classes.iter().enumerate() {
            if i > 0 {
                write!(f, "{CLASS_DELIMITER}")?;
            }
            f.write_str(class)?;
        }
        write!(f, "{FIELD_DELIMITER}{}", self.label)
    }
}

impl FromStr for SequenceRecord {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classes(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn encode_layout() {
        let record = SequenceRecord::new("abc", ["b", "a", "c"], 1);
        assert_eq!(record.encode(), "abc,a;b;c,1");
    }

    #[test]
    fn roundtrip_keeps_all_fields() {
        let record = SequenceRecord::new("abc", ["a", "b", "c"], 1);
        let decoded = SequenceRecord::decode(&record.encode()).unwrap();

        assert_eq!(decoded, record);
        assert_eq!(decoded.classes, record.classes);
        assert_eq!(decoded.label, 1);
    }

    #[test]
    fn empty_classes_roundtrip() {
        let record = SequenceRecord::new("MKV", Vec::<String>::new(), -3);
        assert_eq!(record.encode(), "MKV,,-3");

        let decoded: SequenceRecord = "MKV,,-3".parse().unwrap();
        assert!(decoded.classes.is_empty());
        assert_eq!(decoded.label, -3);
    }

    #[test]
    fn equality_ignores_payload() {
        let a = SequenceRecord::new("ab", ["a"], 0);
        let b = SequenceRecord::new("ab", ["z"], 7);
        let c = SequenceRecord::new("abc", ["a"], 0);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a == *"ab");
    }

    #[test]
    fn decode_rejects_wrong_field_count() {
        for text in ["abc", "abc,a", "abc,a;b,1,extra", ""] {
            let err = SequenceRecord::decode(text).unwrap_err();
            assert!(
                matches!(err, CoreError::MalformedRecord { .. }),
                "{text:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn decode_rejects_non_integer_label() {
        let err = SequenceRecord::decode("abc,a,one").unwrap_err();
        assert!(matches!(err, CoreError::MalformedRecord { ref reason, .. } if reason.contains("one")));
        assert!(SequenceRecord::decode("abc,a,").is_err());
        assert!(SequenceRecord::decode("abc,a,1.5").is_err());
    }

    #[test]
    fn decode_bytes_rejects_invalid_utf8() {
        let err = SequenceRecord::decode_bytes(&[0xff, b',', b',', b'1']).unwrap_err();
        assert!(matches!(err, CoreError::MalformedRecord { .. }));
        assert_eq!(
            SequenceRecord::decode_bytes(b"ACGT,x,2").unwrap().classes,
            classes(&["x"])
        );
    }

    #[test]
    fn delimiters_break_roundtrip() {
        let record = SequenceRecord::new("a,b", ["x"], 0);
        assert!(!record.is_encodable());
        assert!(SequenceRecord::decode(&record.encode()).is_err());

        let record = SequenceRecord::new("ab", ["x;y"], 0);
        assert!(!record.is_encodable());
        let decoded = SequenceRecord::decode(&record.encode()).unwrap();
        assert_eq!(decoded.classes, classes(&["x", "y"]));
    }

    #[test]
    fn merge_unions_classes() {
        let incoming = SequenceRecord::new("ab", ["c"], 0);
        let existing = SequenceRecord::new("ab", ["a", "b"], 0);

        let merged = incoming.merged_with(&existing);
        assert_eq!(merged.classes, classes(&["a", "b", "c"]));
        assert_eq!(merged.label, 0);

        let again = merged.merged_with(&existing);
        assert_eq!(again.classes, merged.classes);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn decode_never_panics(text in ".{0,64}") {
                let _ = SequenceRecord::decode(&text);
            }

            #[test]
            fn decoded_values_reencode_to_same_record(text in "[A-Z]{1,8},[a-z;]{0,12},-?[0-9]{1,6}") {
                if let Ok(record) = SequenceRecord::decode(&text) {
                    let again = SequenceRecord::decode(&record.encode()).unwrap();
                    prop_assert_eq!(&again.sequence, &record.sequence);
                    prop_assert_eq!(again.label, record.label);
                }
            }
        }
    }
}
