//! Numbering utility (Component G): derives sequential-index rename
//! tables and range-set summaries from a deck already decomposed into
//! [`Card`]s. Grounded on `numbering.py`'s `get_numbers`/`get_indices`/
//! `_get_ranges_from_set`.

use crate::card::{Card, Value};
use crate::kinds::ElementKind;
use crate::maprules::{Range, RenameRule, Rules};
use std::collections::BTreeMap;

/// Flatten every card's element values into per-kind lists, in the
/// order they appear across the deck. `BTreeMap` keeps kinds in a
/// stable, deterministic order for callers that print the result.
pub fn collect_numbers(cards: &[Card]) -> BTreeMap<ElementKind, Vec<i64>> {
    let mut out: BTreeMap<ElementKind, Vec<i64>> = BTreeMap::new();
    for card in cards {
        for entry in &card.values {
            let crate::kinds::ValueKind::Element(kind) = entry.kind else {
                continue;
            };
            let Value::Int(v) = entry.value else { continue };
            out.entry(kind).or_default().push(v);
        }
    }
    out
}

/// Assign 1-based indices to each distinct non-zero number per kind, in
/// order of first appearance; `0` always maps to `0` (void material and
/// universe 0 are never renumbered). The result is a [`Rules`] table of
/// offsets, one singleton range per distinct value — matching the shape
/// `numbering.py`'s `write_log_as_map` emits, rather than a formula.
pub fn sequential_index(cards: &[Card]) -> Rules {
    let numbers = collect_numbers(cards);
    let mut rules = Rules::default();
    for (kind, values) in numbers {
        let mut next_index = 1i64;
        let mut seen = std::collections::HashSet::new();
        for v in values {
            if v == 0 || !seen.insert(v) {
                continue;
            }
            let index = next_index;
            next_index += 1;
            rules.add_rename_range(kind, Range::single(v), RenameRule::Offset(index - v));
        }
    }
    rules
}

/// The minimal set of closed inclusive ranges covering `nn`, in
/// ascending order; adjacent and overlapping values merge into one
/// range. A singleton value becomes `(n, n)`.
pub fn range_summary(nn: &std::collections::BTreeSet<i64>) -> Vec<(i64, i64)> {
    let mut out = Vec::new();
    let mut iter = nn.iter().copied();
    let Some(first) = iter.next() else {
        return out;
    };
    let (mut lo, mut hi) = (first, first);
    for n in iter {
        if n == hi || n == hi + 1 {
            hi = n;
        } else {
            out.push((lo, hi));
            lo = n;
            hi = n;
        }
    }
    out.push((lo, hi));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::decompose_cell;
    use crate::kinds::CardKind;
    use crate::lexer::RawCard;
    use pretty_assertions::assert_eq;

    fn raw(text: &str) -> RawCard {
        RawCard {
            lines: text.split_inclusive('\n').map(|s| s.to_string()).collect(),
            kind: CardKind::Cell,
            line_no: 1,
        }
    }

    #[test]
    fn collect_numbers_flattens_in_order_of_appearance() {
        let mut diags = Vec::new();
        let a = decompose_cell(&raw("10 0 -1\n"), &mut diags);
        let b = decompose_cell(&raw("20 5 -1.0 -2\n"), &mut diags);
        let numbers = collect_numbers(&[a, b]);
        assert_eq!(numbers[&ElementKind::Cell], vec![10, 20]);
        assert_eq!(numbers[&ElementKind::Surface], vec![-1, -1, -2]);
    }

    #[test]
    fn sequential_index_skips_zero_and_assigns_by_first_appearance() {
        let mut diags = Vec::new();
        let a = decompose_cell(&raw("30 0 -1\n"), &mut diags);
        let b = decompose_cell(&raw("10 0 -1\n"), &mut diags);
        let rules = sequential_index(&[a, b]);
        assert_eq!(
            rules.rename_for(ElementKind::Cell, 30),
            Some(RenameRule::Offset(1 - 30))
        );
        assert_eq!(
            rules.rename_for(ElementKind::Cell, 10),
            Some(RenameRule::Offset(2 - 10))
        );
        assert_eq!(rules.rename_for(ElementKind::Material, 0), None);
    }

    #[test]
    fn range_summary_merges_contiguous_runs() {
        let nn: std::collections::BTreeSet<i64> = [1, 3, 4, 5, 7].into_iter().collect();
        assert_eq!(range_summary(&nn), vec![(1, 1), (3, 5), (7, 7)]);
    }

    #[test]
    fn range_summary_of_empty_set_is_empty() {
        let nn = std::collections::BTreeSet::new();
        assert_eq!(range_summary(&nn), Vec::<(i64, i64)>::new());
    }

    #[test]
    fn range_summary_single_value_is_one_range() {
        let nn: std::collections::BTreeSet<i64> = [42].into_iter().collect();
        assert_eq!(range_summary(&nn), vec![(42, 42)]);
    }
}
