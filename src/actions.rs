//! Field-mutation actions attached to an ingest request.
//!
//! Parsed from `field=value` strings supplied on the control channel (the
//! `--op` argument in spec.md §6) and carried, reference-counted, from the
//! enqueue path through to the [`crate::slots::FileSlot`] a file lands in.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

/// Maximum number of `field=value` operations accepted per request.
///
/// Matches the original's `char *ops[11]` / `opsNum >= 10` guard in
/// `reader-scheme.c:arkime_scheme_cmd_add`.
pub const MAX_OPS: usize = 10;

/// A single `field=value` assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldOp {
    pub field: String,
    pub value: String,
}

/// Why an `--op` argument, or the set of them, was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpParseError {
    /// More than [`MAX_OPS`] operations were supplied.
    TooMany { count: usize },
    /// An operation string had no `=` separator.
    MissingEquals { raw: String },
    /// The field name half of `field=value` was empty.
    EmptyField { raw: String },
}

impl fmt::Display for OpParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpParseError::TooMany { count } => {
                write!(f, "too many ops: {count} (max {MAX_OPS})")
            }
            OpParseError::MissingEquals { raw } => {
                write!(f, "op '{raw}' is missing '='")
            }
            OpParseError::EmptyField { raw } => {
                write!(f, "op '{raw}' has an empty field name")
            }
        }
    }
}

impl std::error::Error for OpParseError {}

#[derive(Debug)]
struct ActionSetInner {
    ops: SmallVec<[FieldOp; MAX_OPS]>,
}

/// A reference-counted, immutable-after-construction bundle of field
/// operations.
///
/// Cloning an `ActionSet` is the `acquire` step from spec.md §3 (atomic
/// refcount bump via `Arc`); dropping the last clone is `release`. This
/// follows the "shared ownership with acquire/release rather than raw
/// pointers" guidance (spec.md §9) using `Arc`'s own bookkeeping instead of
/// a hand-rolled counter.
#[derive(Debug, Clone)]
pub struct ActionSet(Arc<ActionSetInner>);

impl ActionSet {
    /// Parse up to [`MAX_OPS`] `field=value` strings.
    pub fn parse<S: AsRef<str>>(strings: &[S]) -> Result<ActionSet, OpParseError> {
        if strings.len() > MAX_OPS {
            return Err(OpParseError::TooMany {
                count: strings.len(),
            });
        }
        let mut ops = SmallVec::new();
        for raw in strings {
            let raw = raw.as_ref();
            let (field, value) = raw.split_once('=').ok_or_else(|| OpParseError::MissingEquals {
                raw: raw.to_owned(),
            })?;
            if field.is_empty() {
                return Err(OpParseError::EmptyField {
                    raw: raw.to_owned(),
                });
            }
            ops.push(FieldOp {
                field: field.to_owned(),
                value: value.to_owned(),
            });
        }
        Ok(ActionSet(Arc::new(ActionSetInner { ops })))
    }

    /// An action set with no operations.
    pub fn empty() -> ActionSet {
        ActionSet(Arc::new(ActionSetInner {
            ops: SmallVec::new(),
        }))
    }

    /// The parsed operations.
    pub fn ops(&self) -> &[FieldOp] {
        &self.0.ops
    }

    /// Acquire an additional reference. Equivalent to `Clone::clone`; kept as
    /// a named method because spec.md §4.B calls this operation out as the
    /// only public mutator alongside `release`.
    pub fn acquire(&self) -> ActionSet {
        self.clone()
    }

    /// Number of outstanding references, for tests of the refcounting
    /// invariant (spec.md §8, invariant 4).
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_field_value_pairs() {
        let set = ActionSet::parse(&["tags=foo", "node=bar"]).unwrap();
        assert_eq!(
            set.ops(),
            &[
                FieldOp {
                    field: "tags".into(),
                    value: "foo".into()
                },
                FieldOp {
                    field: "node".into(),
                    value: "bar".into()
                },
            ]
        );
    }

    #[test]
    fn rejects_too_many_ops() {
        let ops: Vec<String> = (0..MAX_OPS + 1).map(|i| format!("f{i}=v")).collect();
        assert!(matches!(
            ActionSet::parse(&ops),
            Err(OpParseError::TooMany { count }) if count == MAX_OPS + 1
        ));
    }

    #[test]
    fn rejects_missing_equals() {
        assert!(matches!(
            ActionSet::parse(&["not-an-op"]),
            Err(OpParseError::MissingEquals { .. })
        ));
    }

    #[test]
    fn refcount_tracks_acquire_and_drop() {
        let set = ActionSet::parse::<&str>(&[]).unwrap();
        assert_eq!(set.strong_count(), 1);
        let second = set.acquire();
        assert_eq!(set.strong_count(), 2);
        drop(second);
        assert_eq!(set.strong_count(), 1);
    }
}
