//! Regex-based field assignment derived from a URI (component D, spec.md
//! §4.D).

use log::warn;
use regex::Regex;

use crate::actions::FieldOp;
use crate::slots::FileSlot;
use crate::uri::Uri;

/// One `{regex, field, template}` rule.
///
/// `template` uses the `regex` crate's replacement syntax (`$1`, `${name}`)
/// rather than glib's `\1` syntax the original used — the idiomatic
/// equivalent for the crate this module is grounded on.
pub struct Rule {
    pub regex: Regex,
    pub field: String,
    pub template: String,
}

/// Holds the rules loaded once at init; immutable thereafter (spec.md §4.D).
///
/// Filename rules never hold a back-reference to an `ActionSet` — they
/// target the field-op buffer living inside a [`FileSlot`] by value, per the
/// "weak reference" guidance in spec.md §9.
#[derive(Default)]
pub struct FilenameRuleEngine {
    rules: Vec<Rule>,
}

impl FilenameRuleEngine {
    pub fn new(rules: Vec<Rule>) -> Self {
        FilenameRuleEngine { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluate every rule against `uri`, appending a field-op to `slot` for
    /// each match. A template-expansion error is logged and that rule is
    /// dropped, per spec.md §4.D — it never aborts the whole file.
    pub fn apply(&self, uri: &Uri, slot: &mut FileSlot) {
        for rule in &self.rules {
            let Some(caps) = rule.regex.captures(uri.as_str()) else {
                continue;
            };
            let mut expanded = String::new();
            caps.expand(&rule.template, &mut expanded);
            if expanded.is_empty() && !rule.template.is_empty() {
                warn!(
                    "filename rule for field '{}' produced an empty expansion for '{}', dropping",
                    rule.field, uri
                );
                continue;
            }
            slot.field_ops.push(FieldOp {
                field: rule.field.clone(),
                value: expanded,
            });
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn matching_rule_appends_a_field_op() {
        let engine = FilenameRuleEngine::new(vec![Rule {
            regex: Regex::new(r"/(?P<site>[a-z]+)/capture\.pcap$").unwrap(),
            field: "site".to_string(),
            template: "$site".to_string(),
        }]);
        let mut slot = FileSlot::default();
        engine.apply(Uri::new("/data/sfo/capture.pcap"), &mut slot);
        assert_eq!(slot.field_ops.len(), 1);
        assert_eq!(slot.field_ops[0].field, "site");
        assert_eq!(slot.field_ops[0].value, "sfo");
    }

    #[test]
    fn non_matching_rule_is_skipped() {
        let engine = FilenameRuleEngine::new(vec![Rule {
            regex: Regex::new(r"^nomatch$").unwrap(),
            field: "x".to_string(),
            template: "$1".to_string(),
        }]);
        let mut slot = FileSlot::default();
        engine.apply(Uri::new("/data/sfo/capture.pcap"), &mut slot);
        assert!(slot.field_ops.is_empty());
    }
}
