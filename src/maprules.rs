//! Map-file compiler (Component D): parses the renumbering DSL into
//! per-[`ElementKind`] tables of rename and change rules.
//!
//! Grammar (case-insensitive, `#` not special):
//! `<prefix><range>? ':' <rhs>` where `<rhs>` is either a signed/
//! unsigned integer (a rename rule) or one or more `name[=]value`
//! pairs (a change rule). Lines without a `:` are comments.

use crate::diag::{self, Diagnostic, DiagnosticKind};
use crate::kinds::{ElementKind, ParameterKind};
use anyhow::{Context, Result};

/// An inclusive numeric range, or a single value (`lo == hi`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub lo: i64,
    pub hi: i64,
}

impl Range {
    pub fn single(n: i64) -> Range {
        Range { lo: n, hi: n }
    }

    pub fn contains(self, n: i64) -> bool {
        n >= self.lo && n <= self.hi
    }
}

/// A rename rule, §4.4: either a signed offset or an unsigned anchor
/// that maps the range's low end to a target value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameRule {
    Offset(i64),
    Anchor(i64),
}

impl RenameRule {
    /// Apply this rule to `n`, given the range it was matched under
    /// (`None` for the default, rangeless rule).
    pub fn apply(self, n: i64, range: Option<Range>) -> i64 {
        match self {
            RenameRule::Offset(delta) => n + delta,
            RenameRule::Anchor(target) => {
                let lo = range.map(|r| r.lo).unwrap_or(n);
                n + (target - lo)
            }
        }
    }
}

/// A change rule, §4.4: replacement strings keyed by parameter kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeRule {
    pub replacements: Vec<(ParameterKind, String)>,
}

impl ChangeRule {
    pub fn get(&self, kind: ParameterKind) -> Option<&str> {
        self.replacements
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
struct RuleTable<R> {
    default: Option<R>,
    by_range: Vec<(Range, R)>,
}

impl<R> Default for RuleTable<R> {
    fn default() -> Self {
        RuleTable {
            default: None,
            by_range: Vec::new(),
        }
    }
}

impl<R: Clone> RuleTable<R> {
    /// First matching range wins by declaration order; otherwise the
    /// default (rangeless) rule applies, if any.
    fn lookup(&self, n: i64) -> Option<&R> {
        self.by_range
            .iter()
            .find(|(r, _)| r.contains(n))
            .map(|(_, rule)| rule)
            .or(self.default.as_ref())
    }

    fn first_matching_range(&self, n: i64) -> Option<Range> {
        self.by_range
            .iter()
            .find(|(r, _)| r.contains(n))
            .map(|(r, _)| *r)
    }
}

/// Compiled rule tables, keyed by element kind, ready for the rewrite
/// engine.
#[derive(Debug, Clone, Default)]
pub struct Rules {
    rename: Vec<(ElementKind, RuleTable<RenameRule>)>,
    change: Vec<(ElementKind, RuleTable<ChangeRule>)>,
}

impl Rules {
    pub fn rename_for(&self, kind: ElementKind, n: i64) -> Option<RenameRule> {
        self.rename
            .iter()
            .find(|(k, _)| *k == kind)
            .and_then(|(_, t)| t.lookup(n))
            .copied()
    }

    pub fn rename_range_for(&self, kind: ElementKind, n: i64) -> Option<Range> {
        self.rename
            .iter()
            .find(|(k, _)| *k == kind)
            .and_then(|(_, t)| t.first_matching_range(n))
    }

    /// Change rule applying to `n` under `kind`, and whether it came
    /// from an explicit range match (vs. the rangeless default).
    pub fn change_for(&self, kind: ElementKind, n: i64) -> Option<(&ChangeRule, bool)> {
        let table = self.change.iter().find(|(k, _)| *k == kind).map(|(_, t)| t)?;
        if let Some((_, rule)) = table.by_range.iter().find(|(r, _)| r.contains(n)) {
            return Some((rule, true));
        }
        table.default.as_ref().map(|r| (r, false))
    }

    /// Render every rename rule as map-file lines, one per `(kind,
    /// range)` entry in declaration order, followed by each kind's
    /// default rule if present. Mirrors the shape `numbering.py`'s
    /// `write_log_as_map` produces, using full element names (always
    /// accepted by [`ElementKind::from_prefix`]) instead of numjuggler's
    /// single-letter abbreviations.
    pub fn format_rename_map(&self) -> String {
        let mut out = String::new();
        for (kind, table) in &self.rename {
            for (range, rule) in &table.by_range {
                out.push_str(&format_rename_line(*kind, Some(*range), *rule));
                out.push('\n');
            }
            if let Some(rule) = table.default {
                out.push_str(&format_rename_line(*kind, None, rule));
                out.push('\n');
            }
        }
        out
    }

    /// Append a ranged rename rule directly, bypassing the map-file
    /// grammar. Used by [`crate::numbering::sequential_index`] to build
    /// a `Rules` table out of computed offsets rather than parsed text.
    pub fn add_rename_range(&mut self, kind: ElementKind, range: Range, rule: RenameRule) {
        self.rename_table_mut(kind).by_range.push((range, rule));
    }

    fn rename_table_mut(&mut self, kind: ElementKind) -> &mut RuleTable<RenameRule> {
        if let Some(pos) = self.rename.iter().position(|(k, _)| *k == kind) {
            &mut self.rename[pos].1
        } else {
            self.rename.push((kind, RuleTable::default()));
            &mut self.rename.last_mut().unwrap().1
        }
    }

    fn change_table_mut(&mut self, kind: ElementKind) -> &mut RuleTable<ChangeRule> {
        if let Some(pos) = self.change.iter().position(|(k, _)| *k == kind) {
            &mut self.change[pos].1
        } else {
            self.change.push((kind, RuleTable::default()));
            &mut self.change.last_mut().unwrap().1
        }
    }
}

/// Read and compile a map file. Malformed lines are skipped with a
/// diagnostic; the compiler never fails on map content (only I/O can).
pub fn compile_map(path: &std::path::Path, sink: &mut Vec<Diagnostic>) -> Result<Rules> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading map file {}", path.display()))?;
    Ok(compile_map_str(&text, sink))
}

pub fn compile_map_str(text: &str, sink: &mut Vec<Diagnostic>) -> Rules {
    let mut rules = Rules::default();
    for (line_no, line) in text.lines().enumerate() {
        let line_no = line_no + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some(colon) = line.find(':') else {
            continue;
        };
        let (lhs, rhs) = (line[..colon].trim(), line[colon + 1..].trim());
        if rhs.is_empty() {
            continue;
        }
        let Some((kind, range)) = parse_lhs(lhs) else {
            diag::report(
                sink,
                line_no,
                DiagnosticKind::MalformedMapLine(line.to_string()),
            );
            continue;
        };

        if let Some(rename) = parse_rename(rhs, range.is_some()) {
            let table = rules.rename_table_mut(kind);
            match range {
                Some(r) => table.by_range.push((r, rename)),
                None => table.default = Some(rename),
            }
        } else {
            let change = parse_change(rhs);
            if change.replacements.is_empty() {
                diag::report(
                    sink,
                    line_no,
                    DiagnosticKind::MalformedMapLine(line.to_string()),
                );
                continue;
            }
            let table = rules.change_table_mut(kind);
            match range {
                Some(r) => table.by_range.push((r, change)),
                None => table.default = Some(change),
            }
        }
    }
    rules
}

fn format_rename_line(kind: ElementKind, range: Option<Range>, rule: RenameRule) -> String {
    let range_str = match range {
        Some(r) if r.lo == r.hi => format!("{}", r.lo),
        Some(r) => format!("{}--{}", r.lo, r.hi),
        None => String::new(),
    };
    let rhs = match rule {
        RenameRule::Offset(delta) if delta >= 0 => format!("+{delta}"),
        RenameRule::Offset(delta) => format!("{delta}"),
        RenameRule::Anchor(target) => format!("{target}"),
    };
    format!("{}{}: {}", kind.name(), range_str, rhs)
}

fn parse_lhs(lhs: &str) -> Option<(ElementKind, Option<Range>)> {
    let lhs = lhs.trim();
    let split_at = lhs
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(lhs.len());
    let (prefix, range_str) = lhs.split_at(split_at);
    let kind = ElementKind::from_prefix(prefix)?;
    if range_str.trim().is_empty() {
        return Some((kind, None));
    }
    parse_range(range_str.trim()).map(|r| (kind, Some(r)))
}

fn parse_range(s: &str) -> Option<Range> {
    if let Some((lo, hi)) = s.split_once("--") {
        let lo: i64 = lo.trim().parse().ok()?;
        let hi: i64 = hi.trim().parse().ok()?;
        Some(Range { lo, hi })
    } else {
        s.parse().ok().map(Range::single)
    }
}

/// §4.4: the right-hand side parses as an integer first; success makes
/// it a rename rule. A leading sign is always an offset; unsigned is
/// an anchor when attached to an explicit range, or — per the Open
/// Question in §9, resolved as an offset — when it is the bare
/// default rule with no range at all.
fn parse_rename(rhs: &str, has_range: bool) -> Option<RenameRule> {
    let rhs = rhs.trim();
    if rhs.is_empty() || rhs.contains(char::is_whitespace) {
        return None;
    }
    if let Some(signed) = rhs.strip_prefix('+').or_else(|| rhs.strip_prefix('-')) {
        let magnitude: i64 = signed.parse().ok()?;
        let delta = if rhs.starts_with('-') { -magnitude } else { magnitude };
        Some(RenameRule::Offset(delta))
    } else {
        let n: i64 = rhs.parse().ok()?;
        Some(if has_range {
            RenameRule::Anchor(n)
        } else {
            RenameRule::Offset(n)
        })
    }
}

fn parse_change(rhs: &str) -> ChangeRule {
    // '=' is optional punctuation between a name and its value (§4.4's
    // `['=']`); treat it as whitespace so `imp:n=0` and `imp:n = 0`
    // tokenize the same way.
    let normalized = rhs.replace('=', " ");
    let mut replacements = Vec::new();
    let mut tokens = normalized.split_whitespace().peekable();
    while let Some(name) = tokens.next() {
        let Some(kind) = ParameterKind::from_token(name) else {
            break;
        };
        let Some(value) = tokens.next() else {
            break;
        };
        replacements.push((kind, value.to_string()));
    }
    ChangeRule { replacements }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn offset_rename_parses_signed_integer() {
        let mut sink = Vec::new();
        let rules = compile_map_str("c: +100\n", &mut sink);
        assert_eq!(
            rules.rename_for(ElementKind::Cell, 1),
            Some(RenameRule::Offset(100))
        );
    }

    #[test]
    fn anchor_rename_with_range_maps_low_end() {
        let mut sink = Vec::new();
        let rules = compile_map_str("s 5--5: 200\n", &mut sink);
        let rule = rules.rename_for(ElementKind::Surface, 5).unwrap();
        assert_eq!(rule.apply(5, Some(Range::single(5))), 200);
    }

    #[test]
    fn change_rule_parses_parameter_pairs() {
        let mut sink = Vec::new();
        let rules = compile_map_str("c 3--3: imp:n=0\n", &mut sink);
        let (rule, ranged) = rules.change_for(ElementKind::Cell, 3).unwrap();
        assert!(ranged);
        assert_eq!(rule.get(ParameterKind::ImpN), Some("0"));
    }

    #[test]
    fn malformed_prefix_is_skipped_with_diagnostic() {
        let mut sink = Vec::new();
        let rules = compile_map_str("zzz: +1\n", &mut sink);
        assert!(rules.rename.is_empty());
        assert_eq!(sink.len(), 1);
        assert!(matches!(sink[0].kind, DiagnosticKind::MalformedMapLine(_)));
    }

    #[test]
    fn line_without_colon_is_a_comment() {
        let mut sink = Vec::new();
        let rules = compile_map_str("this is just a note\n", &mut sink);
        assert!(rules.rename.is_empty() && rules.change.is_empty());
        assert!(sink.is_empty());
    }

    #[test]
    fn range_first_match_wins_over_later_overlapping_range() {
        let mut sink = Vec::new();
        let rules = compile_map_str("c 1--10: +1\nc 5--15: +2\n", &mut sink);
        assert_eq!(
            rules.rename_for(ElementKind::Cell, 7),
            Some(RenameRule::Offset(1))
        );
    }
}
