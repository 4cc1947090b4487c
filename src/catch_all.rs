//! Detection of "all of the above" style options and the rule that keeps them
//! at the end of a displayed option list.

use std::collections::HashSet;
use std::fmt::Debug;

use crate::dataset::{AnswerOption, OptionId};

/// Decides whether an option is a catch-all choice.
pub trait OptionPredicate: Debug + Send + Sync {
    fn matches(&self, option: &AnswerOption) -> bool;
}

/// Matches no option at all; the default for datasets without a rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCatchAll;

impl OptionPredicate for NoCatchAll {
    fn matches(&self, _option: &AnswerOption) -> bool {
        false
    }
}

/// Label-based rule: an option is a catch-all when its normalized label equals
/// `label`, or contains `contains`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchAllRule {
    label: String,
    contains: Option<String>,
}

impl CatchAllRule {
    pub fn new(label: &str, contains: Option<&str>) -> Self {
        Self {
            label: normalize_label(label),
            contains: contains.map(normalize_label).filter(|s| !s.is_empty()),
        }
    }

    /// Rule for the Greek copy the built-in datasets use.
    pub fn greek() -> Self {
        Self::new("Όλα τα παραπάνω", Some("παραπάνω"))
    }

    pub fn matches_label(&self, label: &str) -> bool {
        let normalized = normalize_label(label);
        if !self.label.is_empty() && normalized == self.label {
            return true;
        }
        self.contains
            .as_deref()
            .is_some_and(|needle| normalized.contains(needle))
    }
}

impl OptionPredicate for CatchAllRule {
    fn matches(&self, option: &AnswerOption) -> bool {
        self.matches_label(&option.label)
    }
}

pub fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Stable partition of `order`: every id whose option matches `predicate` is
/// moved behind the others, keeping relative order on both sides.
pub fn catch_all_last(
    predicate: &dyn OptionPredicate,
    options: &[AnswerOption],
    order: Vec<OptionId>,
) -> Vec<OptionId> {
    let flagged: HashSet<&OptionId> = options
        .iter()
        .filter(|o| predicate.matches(o))
        .map(|o| &o.id)
        .collect();

    if flagged.is_empty() {
        return order;
    }

    let (others, catch_all): (Vec<OptionId>, Vec<OptionId>) =
        order.into_iter().partition(|id| !flagged.contains(id));
    others.into_iter().chain(catch_all).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<OptionId> {
        raw.iter().map(|s| OptionId::from(*s)).collect()
    }

    fn options() -> Vec<AnswerOption> {
        vec![
            AnswerOption::new("a", "Μηχανική μάθηση", false),
            AnswerOption::new("b", "  ΌΛΑ ΤΑ ΠΑΡΑΠΆΝΩ ", true),
            AnswerOption::new("c", "Νευρωνικά δίκτυα", false),
        ]
    }

    #[test]
    fn exact_match_ignores_case_and_whitespace() {
        let rule = CatchAllRule::greek();
        assert!(rule.matches_label("  όλα τα παραπάνω"));
        assert!(rule.matches_label("ΌΛΑ ΤΑ ΠΑΡΑΠΆΝΩ"));
        assert!(!rule.matches_label("Όλα"));
    }

    #[test]
    fn substring_match() {
        let rule = CatchAllRule::greek();
        assert!(rule.matches_label("Κανένα από τα παραπάνω"));
        assert!(!rule.matches_label("Τίποτα"));
    }

    #[test]
    fn exact_only_rule() {
        let rule = CatchAllRule::new("All of the above", None);
        assert!(rule.matches_label("all of the above"));
        assert!(!rule.matches_label("None of the above"));
    }

    #[test]
    fn moves_catch_all_to_the_end() {
        let rule = CatchAllRule::greek();
        let ordered = catch_all_last(&rule, &options(), ids(&["b", "c", "a"]));
        assert_eq!(ordered, ids(&["c", "a", "b"]));
    }

    #[test]
    fn multiple_catch_alls_keep_relative_order() {
        let rule = CatchAllRule::greek();
        let mut opts = options();
        opts.push(AnswerOption::new("d", "Κανένα από τα παραπάνω", false));
        let ordered = catch_all_last(&rule, &opts, ids(&["d", "a", "b", "c"]));
        assert_eq!(ordered, ids(&["a", "c", "d", "b"]));
    }

    #[test]
    fn no_match_leaves_order_untouched() {
        let ordered = catch_all_last(&NoCatchAll, &options(), ids(&["b", "a", "c"]));
        assert_eq!(ordered, ids(&["b", "a", "c"]));
    }

    #[test]
    fn already_last_is_stable() {
        let rule = CatchAllRule::greek();
        let once = catch_all_last(&rule, &options(), ids(&["a", "c", "b"]));
        let twice = catch_all_last(&rule, &options(), once.clone());
        assert_eq!(once, twice);
    }
}
