//! Rewrite engine (Component E): applies a compiled [`Rules`] table to
//! a single [`Card`]'s values. Two independent passes — rename, then
//! change — run once per card between decomposition and emission.

use crate::card::{Card, Value};
use crate::diag::{self, Diagnostic, DiagnosticKind};
use crate::kinds::{ElementKind, ValueKind};
use crate::maprules::Rules;
use std::collections::HashMap;

/// Rename pass (§4.5). `Fill` values are looked up under `Universe`
/// (they share a namespace) but keep their own kind on output.
/// Material `0` never crosses the void boundary in either direction.
pub fn apply_rename(card: &mut Card, rules: &Rules, sink: &mut Vec<Diagnostic>) {
    let mut seen: HashMap<(ElementKind, i64), i64> = HashMap::new();

    for entry in &mut card.values {
        let ValueKind::Element(elem) = entry.kind else {
            continue;
        };
        let Value::Int(v) = entry.value else { continue };

        let lookup_kind = if elem == ElementKind::Fill {
            ElementKind::Universe
        } else {
            elem
        };
        let Some(rule) = rules.rename_for(lookup_kind, v) else {
            continue;
        };
        let range = rules.rename_range_for(lookup_kind, v);
        let new_v = rule.apply(v, range);

        if elem == ElementKind::Material && (v == 0) != (new_v == 0) {
            diag::report(
                sink,
                card.line_no,
                DiagnosticKind::VoidMaterialCrossover { from: v, to: new_v },
            );
            continue;
        }

        if let Some(&prior_v) = seen.get(&(elem, new_v)) {
            if prior_v != v {
                diag::report(
                    sink,
                    card.line_no,
                    DiagnosticKind::NonInjectiveRename {
                        old_a: prior_v,
                        old_b: v,
                        new: new_v,
                    },
                );
            }
        }
        seen.insert((elem, new_v), v);

        entry.value = Value::Int(new_v);
    }
}

/// Change pass (§4.5). Only one rule applies per card: the first
/// matching range, or — if none matched — the default rule, but only
/// when the card has an `original_name`.
pub fn apply_change(card: &mut Card, rules: &Rules) {
    let Some(etype) = card.etype else { return };
    let Some(name) = card.original_name else { return };

    let Some((rule, _ranged)) = rules.change_for(etype, name) else {
        return;
    };

    for entry in &mut card.values {
        let ValueKind::Parameter(pkind) = entry.kind else {
            continue;
        };
        if let Some(replacement) = rule.get(pkind) {
            entry.value = Value::Text(replacement.to_string());
        }
    }
}

/// Run both passes over `card` in the order §9's Open Question (b)
/// resolves: rename fully independent of change.
pub fn apply(card: &mut Card, rules: &Rules, sink: &mut Vec<Diagnostic>) {
    apply_rename(card, rules, sink);
    apply_change(card, rules);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::decompose_cell;
    use crate::lexer::RawCard;
    use crate::maprules::compile_map_str;
    use crate::kinds::CardKind;
    use pretty_assertions::assert_eq;

    fn raw(text: &str) -> RawCard {
        RawCard {
            lines: text.split_inclusive('\n').map(|s| s.to_string()).collect(),
            kind: CardKind::Cell,
            line_no: 1,
        }
    }

    #[test]
    fn offset_rename_scenario() {
        let mut diags = Vec::new();
        let mut card = decompose_cell(&raw("1 0 -2 imp:n=1\n"), &mut diags);
        let rules = compile_map_str("c: +100\n", &mut diags);
        apply(&mut card, &rules, &mut diags);
        assert_eq!(card.emit(false, &mut diags), "101 0 -2 imp:n=1\n");
    }

    #[test]
    fn void_material_is_preserved() {
        let mut diags = Vec::new();
        let mut card = decompose_cell(&raw("7 0 -3\n"), &mut diags);
        let rules = compile_map_str("m: +10\n", &mut diags);
        apply(&mut card, &rules, &mut diags);
        assert_eq!(card.emit(false, &mut diags), "7 0 -3\n");
        assert!(diags
            .iter()
            .all(|d| !matches!(d.kind, DiagnosticKind::VoidMaterialCrossover { .. })));
    }

    #[test]
    fn parameter_change_scenario() {
        let mut diags = Vec::new();
        let mut card = decompose_cell(&raw("3 5 -1.0 -4 imp:n=1 imp:p=1\n"), &mut diags);
        let rules = compile_map_str("c 3--3: imp:n=0\n", &mut diags);
        apply(&mut card, &rules, &mut diags);
        assert_eq!(
            card.emit(false, &mut diags),
            "3 5 -1.0 -4 imp:n=0 imp:p=1\n"
        );
    }

    #[test]
    fn fill_universe_coupling_scenario() {
        let mut diags = Vec::new();
        let mut card = decompose_cell(&raw("1 0 -1 u=4 fill=4\n"), &mut diags);
        let rules = compile_map_str("u: +10\n", &mut diags);
        apply(&mut card, &rules, &mut diags);
        assert_eq!(card.emit(false, &mut diags), "1 0 -1 u=14 fill=14\n");
    }

    #[test]
    fn non_injective_rename_is_logged() {
        let mut diags = Vec::new();
        let mut card = decompose_cell(&raw("1 0 1 2\n"), &mut diags);
        let rules = compile_map_str("s 1--1: +5\ns: +4\n", &mut diags);
        apply(&mut card, &rules, &mut diags);
        assert!(diags
            .iter()
            .any(|d| matches!(d.kind, DiagnosticKind::NonInjectiveRename { .. })));
    }
}
