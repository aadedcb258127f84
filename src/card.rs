//! Card decomposer and emitter (Components C and F): splits a
//! [`crate::lexer::RawCard`] into a byte-accurate template plus typed
//! identifier values, and rebuilds card text from that decomposition
//! after a rewrite pass has mutated the values.
//!
//! The template is kept as a small structured `Vec<TemplatePiece>`
//! rather than a flat string sprinkled with sentinel characters: a
//! stringly-typed template would have to be re-parsed on emission and
//! risks colliding with sentinel bytes that happen to appear in real
//! deck content. A `Vec` of literal/value/hidden pieces sidesteps both
//! problems and mirrors how `punchcard::deck.rs` keeps `CardRecord`
//! fields structured instead of serializing through an intermediate
//! string.

use crate::diag::{self, Diagnostic, DiagnosticKind};
use crate::kinds::{CardKind, DataCardKind, ElementKind, ParameterKind, ValueKind};
use crate::lexer::{is_commented, RawCard};

/// One extracted value, tagged with the kind the decomposer assigned it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueEntry {
    pub value: Value,
    pub kind: ValueKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Text(String),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Text(_) => None,
        }
    }
}

/// A single piece of a card's template. Concatenating the rendering of
/// every piece, in order, reproduces the card's original bytes when
/// `values` and `hidden` are unchanged from decomposition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePiece {
    /// Bytes copied verbatim: whitespace, comments, keywords, operators.
    Literal(String),
    /// Consumes the next entry of `Card::values`. `width` is the
    /// original token's visible width, used to left-pad integers so
    /// renumbering that doesn't change digit count preserves columns.
    Value { width: usize, is_int: bool },
    /// Consumes the next buffered original for sentinel `char` from
    /// `Card::hidden`, in declaration order.
    Hidden(char),
}

#[derive(Debug, Clone)]
pub struct Card {
    pub kind: CardKind,
    pub etype: Option<ElementKind>,
    pub dtype: Option<DataCardKind>,
    pub template: Vec<TemplatePiece>,
    /// Original text of every extracted value, in extraction order —
    /// informational (JSON/debug dumps), not consulted by `emit`.
    pub input: Vec<String>,
    pub hidden: Vec<(char, Vec<String>)>,
    pub values: Vec<ValueEntry>,
    pub original_name: Option<i64>,
    pub line_no: usize,
}

impl Card {
    /// Build a verbatim (no identifiers extracted) card: used for
    /// `Message`, `Title`, `Comment` and `BlankLine` cards, and for
    /// forms the decomposer recognizes but defers (`like … but …`,
    /// `fill` array).
    fn verbatim(raw: &RawCard) -> Card {
        Card {
            kind: raw.kind,
            etype: None,
            dtype: None,
            template: vec![TemplatePiece::Literal(raw.lines.concat())],
            input: Vec::new(),
            hidden: Vec::new(),
            values: Vec::new(),
            original_name: None,
            line_no: raw.line_no,
        }
    }

    /// Render the card back to text. `wrap` re-folds any physical line
    /// exceeding 79 visible columns per §4.6; diagnostics produced
    /// during folding are appended to `sink`.
    pub fn emit(&self, wrap: bool, sink: &mut Vec<Diagnostic>) -> String {
        let mut out = String::new();
        let mut value_cursor = 0usize;
        let mut hidden_cursors = vec![0usize; self.hidden.len()];

        for piece in &self.template {
            match piece {
                TemplatePiece::Literal(s) => out.push_str(s),
                TemplatePiece::Value { width, is_int } => {
                    let entry = &self.values[value_cursor];
                    value_cursor += 1;
                    render_value(&mut out, entry, *width, *is_int);
                }
                TemplatePiece::Hidden(c) => {
                    let slot = self
                        .hidden
                        .iter()
                        .position(|(sentinel, _)| sentinel == c)
                        .expect("every template Hidden piece has a registered sentinel");
                    let cursor = &mut hidden_cursors[slot];
                    out.push_str(&self.hidden[slot].1[*cursor]);
                    *cursor += 1;
                }
            }
        }

        if wrap {
            fold_long_lines(&out, self.line_no, sink)
        } else {
            out
        }
    }
}

fn render_value(out: &mut String, entry: &ValueEntry, width: usize, is_int: bool) {
    match (&entry.value, is_int) {
        (Value::Int(n), _) => {
            let digits = n.to_string();
            out.push_str(&digits);
            if digits.len() < width {
                out.extend(std::iter::repeat(' ').take(width - digits.len()));
            }
        }
        (Value::Text(s), _) => out.push_str(s),
    }
}

/// Post-render line folding (§4.6). Operates on the fully-rendered
/// text rather than on template pieces: each physical line wider than
/// 79 visible columns is split at the rightmost space or `:` in
/// columns 6..75, with the continuation indented by five spaces; if no
/// such point exists the line is left long and a warning recorded.
fn fold_long_lines(text: &str, line_no: usize, sink: &mut Vec<Diagnostic>) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        let (body, nl) = match line.strip_suffix('\n') {
            Some(b) => (b, "\n"),
            None => (line, ""),
        };
        if body.chars().count() <= 79 {
            out.push_str(body);
            out.push_str(nl);
            continue;
        }
        if body.chars().take(5).all(|c| c == ' ') {
            out.push_str(body);
            out.push_str(nl);
            continue;
        }
        let chars: Vec<char> = body.chars().collect();
        let hi = chars.len().min(75);
        let mut break_at = None;
        for i in (5..hi).rev() {
            if chars[i] == ' ' || chars[i] == ':' {
                break_at = Some(i);
                break;
            }
        }
        match break_at {
            Some(i) => {
                let head: String = chars[..i].iter().collect();
                let tail: String = chars[i..].iter().collect();
                out.push_str(&head);
                out.push('\n');
                out.push_str("     ");
                out.push_str(tail.trim_start());
                out.push_str(nl);
            }
            None => {
                diag::report(sink, line_no, DiagnosticKind::WrapImpossible);
                out.push_str(body);
                out.push_str(nl);
            }
        }
    }
    out
}

/// A whitespace/`=`-delimited token span within one physical line's
/// input portion, tagged with the line it came from so value pieces
/// land in the right place in the per-line template.
struct Tok {
    line: usize,
    start: usize,
    end: usize,
}

impl Tok {
    fn text<'a>(&self, lines: &'a [String]) -> &'a str {
        &lines[self.line][self.start..self.end]
    }
}

fn tokenize_line(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() || c == '=' {
            if let Some(s) = start.take() {
                spans.push((s, i));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}

fn is_tally_comment_start(line: &str) -> bool {
    let t = line.trim_start().to_ascii_lowercase();
    t.starts_with("fc") && t.as_bytes().get(2).is_some_and(u8::is_ascii_digit)
}

fn is_tally_card_start(line: &str) -> bool {
    let t = line.trim_start().to_ascii_lowercase();
    t.starts_with('f') && t.as_bytes().get(1).is_some_and(u8::is_ascii_digit)
}

/// Step 1: split one physical line into its meaningful (input) portion
/// and the bytes preserved verbatim (comment/continuation tail and the
/// line's own newline).
fn split_line(line: &str) -> (String, String) {
    if is_commented(line) {
        return (String::new(), line.to_string());
    }
    if is_tally_comment_start(line) {
        let chars: Vec<char> = line.chars().collect();
        let take = chars.len().min(80);
        let seg: String = chars[..take].iter().collect();
        let tail: String = chars[take..].iter().collect();
        return (seg, tail);
    }
    let (body, nl) = match line.strip_suffix('\n') {
        Some(b) => (b, "\n"),
        None => (line, ""),
    };
    let bytes = body.as_bytes();
    let mut term = None;
    for i in 0..bytes.len().saturating_sub(1) {
        if bytes[i] == b' ' && (bytes[i + 1] == b'$' || bytes[i + 1] == b'&') {
            term = Some(i);
            break;
        }
    }
    match term {
        Some(i) => (body[..i].to_string(), format!("{}{}", &body[i..], nl)),
        None => (body.to_string(), nl.to_string()),
    }
}

/// Step 2: mask repetition shorthand (`\d+[rRiI]`) everywhere, and
/// bracketed index groups (`[...]`) on tally cards, replacing each
/// match with a single sentinel character and recording the original
/// substring in `hidden` in left-to-right order.
fn mask_repetition(text: &str, hidden: &mut Vec<(char, Vec<String>)>) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_ascii_digit() {
            let start = i;
            let mut j = i;
            while j < chars.len() && chars[j].is_ascii_digit() {
                j += 1;
            }
            if j < chars.len() && matches!(chars[j], 'r' | 'R' | 'i' | 'I') {
                let boundary_ok = chars
                    .get(j + 1)
                    .map(|c| !c.is_ascii_alphanumeric())
                    .unwrap_or(true);
                if boundary_ok {
                    let original: String = chars[start..=j].iter().collect();
                    push_hidden(hidden, '!', original);
                    out.push('!');
                    i = j + 1;
                    continue;
                }
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

fn mask_brackets(text: &str, hidden: &mut Vec<(char, Vec<String>)>) -> String {
    let mut out = String::new();
    let mut rest = text;
    while let Some(open) = rest.find('[') {
        if let Some(close_rel) = rest[open..].find(']') {
            let close = open + close_rel;
            out.push_str(&rest[..open]);
            push_hidden(hidden, '|', rest[open..=close].to_string());
            out.push('|');
            rest = &rest[close + 1..];
        } else {
            break;
        }
    }
    out.push_str(rest);
    out
}

fn push_hidden(hidden: &mut Vec<(char, Vec<String>)>, sentinel: char, original: String) {
    if let Some(entry) = hidden.iter_mut().find(|(c, _)| *c == sentinel) {
        entry.1.push(original);
    } else {
        hidden.push((sentinel, vec![original]));
    }
}

enum Action {
    /// `start`/`end` are absolute offsets into the token's line text;
    /// usually the whole token, but narrower for e.g. the digit suffix
    /// of a `m1`/`f14`/`#20` token, leaving the letter/`#` prefix literal.
    Value { start: usize, end: usize, entry: ValueEntry },
    Hidden { start: usize, end: usize, sentinel: char, original: String },
    Literal,
}

fn value_action(tok: &Tok, entry: ValueEntry) -> Action {
    Action::Value { start: tok.start, end: tok.end, entry }
}

fn value_action_span(start: usize, end: usize, entry: ValueEntry) -> Action {
    Action::Value { start, end, entry }
}

/// Shared driver for `Cell`/`Surface`/`Data`: runs step 1 and 2 over
/// every physical line, flattens the masked input portions into a
/// token stream, hands the stream to `dispatch` to classify each token,
/// then rebuilds the per-line template and the card's `values`/`hidden`/
/// `input` from the classification.
fn decompose_typed(
    raw: &RawCard,
    dispatch: impl FnOnce(&[Tok], &[String]) -> Vec<Action>,
) -> (Vec<TemplatePiece>, Vec<String>, Vec<(char, Vec<String>)>, Vec<ValueEntry>) {
    let mut masked_lines = Vec::with_capacity(raw.lines.len());
    let mut tails = Vec::with_capacity(raw.lines.len());
    let mut hidden: Vec<(char, Vec<String>)> = Vec::new();

    for line in &raw.lines {
        let (seg, tail) = split_line(line);
        let seg = mask_repetition(&seg, &mut hidden);
        let seg = if is_tally_card_start(line) {
            mask_brackets(&seg, &mut hidden)
        } else {
            seg
        };
        masked_lines.push(seg);
        tails.push(tail);
    }

    let mut toks = Vec::new();
    for (li, text) in masked_lines.iter().enumerate() {
        for (s, e) in tokenize_line(text) {
            toks.push(Tok { line: li, start: s, end: e });
        }
    }

    let actions = dispatch(&toks, &masked_lines);
    debug_assert_eq!(actions.len(), toks.len());

    let mut input = Vec::new();
    let mut values = Vec::new();
    // per-line list of (start, end, piece-kind) replacements, sorted by start.
    let mut replacements: Vec<Vec<(usize, usize, TemplatePiece)>> =
        vec![Vec::new(); masked_lines.len()];

    for (tok, action) in toks.iter().zip(actions.into_iter()) {
        match action {
            Action::Value { start, end, entry } => {
                let text = masked_lines[tok.line][start..end].to_string();
                input.push(text);
                let width = end - start;
                let is_int = matches!(entry.value, Value::Int(_));
                values.push(entry);
                replacements[tok.line].push((start, end, TemplatePiece::Value { width, is_int }));
            }
            Action::Hidden { start, end, sentinel, original } => {
                push_hidden(&mut hidden, sentinel, original);
                replacements[tok.line].push((start, end, TemplatePiece::Hidden(sentinel)));
            }
            Action::Literal => {}
        }
    }

    let sentinels: Vec<char> = hidden.iter().map(|(c, _)| *c).collect();
    let mut template = Vec::new();
    for (li, text) in masked_lines.iter().enumerate() {
        let mut reps = std::mem::take(&mut replacements[li]);
        reps.sort_by_key(|(s, _, _)| *s);
        let mut cursor = 0usize;
        for (start, end, piece) in reps {
            push_literal_scanning_sentinels(&mut template, &text[cursor..start], &sentinels);
            template.push(piece);
            cursor = end;
        }
        push_literal_scanning_sentinels(&mut template, &text[cursor..], &sentinels);
        if !tails[li].is_empty() {
            template.push(TemplatePiece::Literal(tails[li].clone()));
        }
    }

    (template, input, hidden, values)
}

/// Appends `text` to `template`, splitting out any leftover sentinel
/// characters (masked in step 2 but never claimed as a value by the
/// per-kind dispatch, e.g. repetition shorthand `!` in a parameter
/// block) as their own `Hidden` pieces rather than copying them as
/// ordinary literal bytes.
fn push_literal_scanning_sentinels(template: &mut Vec<TemplatePiece>, text: &str, sentinels: &[char]) {
    if text.is_empty() {
        return;
    }
    let mut literal = String::new();
    for c in text.chars() {
        if sentinels.contains(&c) {
            if !literal.is_empty() {
                template.push(TemplatePiece::Literal(std::mem::take(&mut literal)));
            }
            template.push(TemplatePiece::Hidden(c));
        } else {
            literal.push(c);
        }
    }
    if !literal.is_empty() {
        template.push(TemplatePiece::Literal(literal));
    }
}

fn try_int(s: &str) -> Option<i64> {
    s.parse::<i64>().ok()
}

fn strip_leading_nondigit(tok: &str) -> (&str, &str) {
    let bytes = tok.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        let is_sign_of_number =
            c == '-' && bytes.get(i + 1).is_some_and(|b| (*b as char).is_ascii_digit());
        if c.is_ascii_digit() || is_sign_of_number {
            break;
        }
        i += 1;
    }
    (&tok[..i], &tok[i..])
}

/// Splits a data-card mnemonic token (`m1`, `f4:n`, `tr12`) into its
/// alphabetic mnemonic, its digit-id suffix, and any trailing text
/// (e.g. the `:n` particle designator), all three as byte offsets into
/// the original token so the id's value span can be computed.
fn split_mnemonic(tok: &str) -> (&str, &str, &str) {
    let mnemonic_end = tok.find(|c: char| c.is_ascii_digit()).unwrap_or(tok.len());
    let digits_end = tok[mnemonic_end..]
        .find(|c: char| !c.is_ascii_digit())
        .map(|i| mnemonic_end + i)
        .unwrap_or(tok.len());
    (&tok[..mnemonic_end], &tok[mnemonic_end..digits_end], &tok[digits_end..])
}

/// Decompose a `Cell` card (§4.3 "Cell splitter"). Cards using the
/// `like … but …` form are recognized and left textually intact per
/// the deferred-forms non-goal.
pub fn decompose_cell(raw: &RawCard, sink: &mut Vec<Diagnostic>) -> Card {
    let whole: String = raw.lines.concat();
    if whole
        .split_whitespace()
        .any(|t| t.eq_ignore_ascii_case("like"))
    {
        diag::report(
            sink,
            raw.line_no,
            DiagnosticKind::UnsupportedForm("like ... but ... cell".to_string()),
        );
        return Card::verbatim(raw);
    }

    let has_lat = whole
        .split_whitespace()
        .any(|t| t.eq_ignore_ascii_case("lat"));

    let (template, input, hidden, values) = decompose_typed(raw, |toks, lines| {
        let mut actions = Vec::with_capacity(toks.len());
        let mut i = 0usize;
        let mut material_is_zero = true;

        // header: cell id, material id, optional density
        if i < toks.len() {
            actions.push(value_action(
                &toks[i],
                ValueEntry {
                    value: Value::Int(try_int(toks[i].text(lines)).unwrap_or(0)),
                    kind: ValueKind::Element(ElementKind::Cell),
                },
            ));
            i += 1;
        }
        if i < toks.len() {
            let mat = try_int(toks[i].text(lines)).unwrap_or(0);
            material_is_zero = mat == 0;
            actions.push(value_action(
                &toks[i],
                ValueEntry {
                    value: Value::Int(mat),
                    kind: ValueKind::Element(ElementKind::Material),
                },
            ));
            i += 1;
        }
        if !material_is_zero && i < toks.len() {
            actions.push(value_action(
                &toks[i],
                ValueEntry {
                    value: Value::Text(toks[i].text(lines).to_string()),
                    kind: ValueKind::Parameter(ParameterKind::Density),
                },
            ));
            i += 1;
        }

        // geometry block: runs until a token starting with an alphabetic
        // character is seen.
        while i < toks.len() {
            let text = toks[i].text(lines);
            if text.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
                break;
            }
            if let Some(rest) = text.strip_prefix('#') {
                if let Some(n) = try_int(rest) {
                    // '#' itself stays literal; only the digit span is the
                    // value, so the span starts one character in.
                    actions.push(value_action_span(
                        toks[i].start + 1,
                        toks[i].end,
                        ValueEntry {
                            value: Value::Int(n),
                            kind: ValueKind::Element(ElementKind::Cell),
                        },
                    ));
                    i += 1;
                    continue;
                }
            }
            if let Some(rest) = text.strip_prefix('-') {
                if let Some(n) = try_int(rest) {
                    // '-' (the "inside surface" sense) stays literal; only
                    // the magnitude is renamed, same as the '#' case above.
                    actions.push(value_action_span(
                        toks[i].start + 1,
                        toks[i].end,
                        ValueEntry {
                            value: Value::Int(n),
                            kind: ValueKind::Element(ElementKind::Surface),
                        },
                    ));
                    i += 1;
                    continue;
                }
            }
            if let Some(n) = try_int(text) {
                actions.push(value_action(
                    &toks[i],
                    ValueEntry {
                        value: Value::Int(n),
                        kind: ValueKind::Element(ElementKind::Surface),
                    },
                ));
            } else if text.parse::<f64>().is_ok() {
                actions.push(Action::Hidden {
                    start: toks[i].start,
                    end: toks[i].end,
                    sentinel: '~',
                    original: text.to_string(),
                });
            } else {
                actions.push(Action::Literal);
            }
            i += 1;
        }

        // parameter block
        while i < toks.len() {
            let name = toks[i].text(lines);
            if name.eq_ignore_ascii_case("fill") {
                let next_is_plain_int = toks
                    .get(i + 1)
                    .map(|t| try_int(t.text(lines)).is_some())
                    .unwrap_or(false);
                if has_lat {
                    diag::report(sink, raw.line_no, DiagnosticKind::FillLatConflict);
                    actions.push(Action::Literal);
                    i += 1;
                } else if next_is_plain_int {
                    actions.push(Action::Literal);
                    actions.push(value_action(
                        &toks[i + 1],
                        ValueEntry {
                            value: Value::Int(try_int(toks[i + 1].text(lines)).unwrap()),
                            kind: ValueKind::Element(ElementKind::Fill),
                        },
                    ));
                    i += 2;
                } else {
                    diag::report(
                        sink,
                        raw.line_no,
                        DiagnosticKind::UnsupportedForm("fill array".to_string()),
                    );
                    actions.push(Action::Literal);
                    i += 1;
                }
            } else if name.eq_ignore_ascii_case("u") {
                if let Some(v) = toks.get(i + 1).and_then(|t| try_int(t.text(lines))) {
                    actions.push(Action::Literal);
                    actions.push(value_action(
                        &toks[i + 1],
                        ValueEntry {
                            value: Value::Int(v),
                            kind: ValueKind::Element(ElementKind::Universe),
                        },
                    ));
                    i += 2;
                } else {
                    actions.push(Action::Literal);
                    i += 1;
                }
            } else if let Some(kind) = ParameterKind::from_token(name) {
                if let Some(next) = toks.get(i + 1) {
                    actions.push(Action::Literal);
                    actions.push(value_action(
                        next,
                        ValueEntry {
                            value: Value::Text(next.text(lines).to_string()),
                            kind: ValueKind::Parameter(kind),
                        },
                    ));
                    i += 2;
                } else {
                    actions.push(Action::Literal);
                    i += 1;
                }
            } else {
                actions.push(Action::Literal);
                i += 1;
            }
        }

        actions
    });

    let original_name = values.first().and_then(|v| v.value.as_int());
    Card {
        kind: CardKind::Cell,
        etype: Some(ElementKind::Cell),
        dtype: None,
        template,
        input,
        hidden,
        values,
        original_name,
        line_no: raw.line_no,
    }
}

/// Decompose a `Surface` card (§4.3 "Surface splitter").
pub fn decompose_surface(raw: &RawCard) -> Card {
    let (template, input, hidden, values) = decompose_typed(raw, |toks, lines| {
        let mut actions = Vec::with_capacity(toks.len());
        for (idx, tok) in toks.iter().enumerate() {
            let text = tok.text(lines);
            if idx == 0 {
                let (prefix, rest) = strip_leading_nondigit(text);
                if let Some(n) = try_int(rest) {
                    actions.push(value_action_span(
                        tok.start + prefix.len(),
                        tok.end,
                        ValueEntry {
                            value: Value::Int(n),
                            kind: ValueKind::Element(ElementKind::Surface),
                        },
                    ));
                } else {
                    actions.push(Action::Literal);
                }
            } else if idx == 1 {
                if let Some(rest) = text.strip_prefix('-') {
                    // negative: a periodic reference to another surface.
                    // The '-' sense stays literal; only the magnitude is
                    // renamed (it is the referenced surface's own number).
                    if let Some(n) = try_int(rest) {
                        actions.push(value_action_span(
                            tok.start + 1,
                            tok.end,
                            ValueEntry {
                                value: Value::Int(n),
                                kind: ValueKind::Element(ElementKind::Surface),
                            },
                        ));
                    } else {
                        actions.push(Action::Literal);
                    }
                } else if let Some(n) = try_int(text) {
                    actions.push(value_action(
                        tok,
                        ValueEntry {
                            value: Value::Int(n),
                            kind: ValueKind::Element(ElementKind::Transformation),
                        },
                    ));
                } else {
                    actions.push(Action::Literal);
                }
            } else {
                actions.push(Action::Literal);
            }
        }
        actions
    });

    let original_name = values.first().and_then(|v| v.value.as_int());
    Card {
        kind: CardKind::Surface,
        etype: Some(ElementKind::Surface),
        dtype: None,
        template,
        input,
        hidden,
        values,
        original_name,
        line_no: raw.line_no,
    }
}

fn tally_reference_kind(tally_number: i64) -> Option<ElementKind> {
    match tally_number.unsigned_abs() % 10 {
        1 | 2 => Some(ElementKind::Surface),
        4 | 6 | 7 | 8 => Some(ElementKind::Cell),
        _ => None,
    }
}

/// Decompose a `Data` card (§4.3 "Data splitter"). Anything not
/// matching a known mnemonic is passed through unrecognized.
pub fn decompose_data(raw: &RawCard) -> Card {
    let mut dtype = None;
    let (template, input, hidden, values) = decompose_typed(raw, |toks, lines| {
        let mut actions = vec![Action::Literal; 0];
        if toks.is_empty() {
            return actions;
        }
        let first = toks[0].text(lines);
        let (mnemonic, suffix, _trailing) = split_mnemonic(first);
        let mnemonic_lower = mnemonic.to_ascii_lowercase();

        let (kind, elem) = match mnemonic_lower.as_str() {
            "tr" => (Some(DataCardKind::Tr), Some(ElementKind::Transformation)),
            "mt" => (Some(DataCardKind::Mt), Some(ElementKind::Material)),
            "mpn" => (Some(DataCardKind::Mpn), Some(ElementKind::Material)),
            "m" => (Some(DataCardKind::M), Some(ElementKind::Material)),
            "f" => (Some(DataCardKind::F), Some(ElementKind::Tally)),
            _ => (None, None),
        };

        let (kind, elem) = match (kind, try_int(suffix)) {
            (Some(k), Some(_)) => (Some(k), elem),
            _ => (None, None),
        };

        dtype = kind;

        if kind.is_none() {
            return vec![Action::Literal; toks.len()];
        }

        let suffix_start = toks[0].start + mnemonic.len();
        let suffix_end = suffix_start + suffix.len();
        actions.push(value_action_span(
            suffix_start,
            suffix_end,
            ValueEntry {
                value: Value::Int(try_int(suffix).unwrap()),
                kind: ValueKind::Element(elem.unwrap()),
            },
        ));

        if kind != Some(DataCardKind::F) {
            actions.resize_with(toks.len(), || Action::Literal);
            return actions;
        }

        let tally_number = try_int(suffix).unwrap();
        let body_kind = tally_reference_kind(tally_number);

        let mut idx = 1usize;
        while idx < toks.len() {
            let text = toks[idx].text(lines);
            if text.eq_ignore_ascii_case("u") {
                if let Some(v) = toks.get(idx + 1).and_then(|t| try_int(t.text(lines))) {
                    actions.push(Action::Literal);
                    actions.push(value_action(
                        &toks[idx + 1],
                        ValueEntry {
                            value: Value::Int(v),
                            kind: ValueKind::Element(ElementKind::Universe),
                        },
                    ));
                    idx += 2;
                    continue;
                }
            }
            if let (Some(n), Some(k)) = (try_int(text), body_kind) {
                actions.push(value_action(
                    &toks[idx],
                    ValueEntry {
                        value: Value::Int(n),
                        kind: ValueKind::Element(k),
                    },
                ));
            } else {
                actions.push(Action::Literal);
            }
            idx += 1;
        }
        actions
    });

    let original_name = values.first().and_then(|v| v.value.as_int());
    Card {
        kind: CardKind::Data,
        etype: None,
        dtype,
        template,
        input,
        hidden,
        values,
        original_name,
        line_no: raw.line_no,
    }
}

/// Dispatch a [`RawCard`] to the matching decomposition routine.
pub fn decompose(raw: &RawCard, sink: &mut Vec<Diagnostic>) -> Card {
    match raw.kind {
        CardKind::Cell => decompose_cell(raw, sink),
        CardKind::Surface => decompose_surface(raw),
        CardKind::Data => decompose_data(raw),
        CardKind::Message | CardKind::Title | CardKind::Comment | CardKind::BlankLine => {
            Card::verbatim(raw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw(kind: CardKind, text: &str) -> RawCard {
        RawCard {
            lines: text.split_inclusive('\n').map(|s| s.to_string()).collect(),
            kind,
            line_no: 1,
        }
    }

    #[test]
    fn round_trip_without_rewrite_reproduces_bytes() {
        let r = raw(CardKind::Cell, "1 0 -1 -2 imp:n=1\n");
        let mut sink = Vec::new();
        let card = decompose_cell(&r, &mut sink);
        assert_eq!(card.emit(false, &mut sink), "1 0 -1 -2 imp:n=1\n");
    }

    #[test]
    fn cell_extracts_material_and_surfaces() {
        let r = raw(CardKind::Cell, "1 0 -1 -2\n");
        let mut sink = Vec::new();
        let card = decompose_cell(&r, &mut sink);
        assert_eq!(card.original_name, Some(1));
        // the '-' sense is a template literal, not part of the value: the
        // renamed quantity is the surface's magnitude.
        let surfaces: Vec<i64> = card
            .values
            .iter()
            .filter(|v| v.kind == ValueKind::Element(ElementKind::Surface))
            .filter_map(|v| v.value.as_int())
            .collect();
        assert_eq!(surfaces, vec![1, 2]);
    }

    #[test]
    fn negative_surface_reference_renames_by_magnitude_and_keeps_sign() {
        let mut sink = Vec::new();
        let mut card = decompose_cell(&raw(CardKind::Cell, "1 0 -3\n"), &mut sink);
        let rules = crate::maprules::compile_map_str("s: +100\n", &mut sink);
        crate::rewrite::apply(&mut card, &rules, &mut sink);
        assert_eq!(card.emit(false, &mut sink), "1 0 -103\n");
    }

    #[test]
    fn negative_surface_periodic_reference_renames_by_magnitude() {
        let mut sink = Vec::new();
        let mut card = decompose_surface(&raw(CardKind::Surface, "5 -2\n"));
        let rules = crate::maprules::compile_map_str("s: +10\n", &mut sink);
        crate::rewrite::apply(&mut card, &rules, &mut sink);
        assert_eq!(card.emit(false, &mut sink), "15 -12\n");
    }

    #[test]
    fn void_cell_has_no_density_value() {
        let r = raw(CardKind::Cell, "7 0 -3\n");
        let mut sink = Vec::new();
        let card = decompose_cell(&r, &mut sink);
        assert!(card
            .values
            .iter()
            .all(|v| v.kind != ValueKind::Parameter(ParameterKind::Density)));
    }

    #[test]
    fn fill_and_universe_share_value_kinds() {
        let r = raw(CardKind::Cell, "1 0 -1 u=4 fill=4\n");
        let mut sink = Vec::new();
        let card = decompose_cell(&r, &mut sink);
        assert!(card
            .values
            .iter()
            .any(|v| v.kind == ValueKind::Element(ElementKind::Universe) && v.value == Value::Int(4)));
        assert!(card
            .values
            .iter()
            .any(|v| v.kind == ValueKind::Element(ElementKind::Fill) && v.value == Value::Int(4)));
    }

    #[test]
    fn like_but_cell_is_left_intact_with_diagnostic() {
        let r = raw(CardKind::Cell, "1 like 2 but mat=3\n");
        let mut sink = Vec::new();
        let card = decompose_cell(&r, &mut sink);
        assert!(card.values.is_empty());
        assert_eq!(card.emit(false, &mut sink), "1 like 2 but mat=3\n");
        assert!(sink
            .iter()
            .any(|d| matches!(d.kind, DiagnosticKind::UnsupportedForm(_))));
    }

    #[test]
    fn surface_extracts_id_and_transformation() {
        let r = raw(CardKind::Surface, "5 px 1.0\n");
        let mut sink = Vec::new();
        let card = decompose_surface(&r);
        assert_eq!(card.original_name, Some(5));
        let _ = sink;
    }

    #[test]
    fn material_card_extracts_id() {
        let r = raw(CardKind::Data, "m1 1001 1.0\n");
        let card = decompose_data(&r);
        assert_eq!(card.original_name, Some(1));
        assert_eq!(card.dtype, Some(DataCardKind::M));
    }

    #[test]
    fn tally_card_reclassifies_u_reference() {
        let r = raw(CardKind::Data, "f4:n 1 2 u=3\n");
        let card = decompose_data(&r);
        assert!(card
            .values
            .iter()
            .any(|v| v.kind == ValueKind::Element(ElementKind::Universe) && v.value == Value::Int(3)));
    }

    #[test]
    fn comment_preserved_in_template() {
        let r = raw(CardKind::Data, "mode n\n");
        let card = decompose_data(&r);
        assert!(card.values.is_empty());
        let mut sink = Vec::new();
        assert_eq!(card.emit(false, &mut sink), "mode n\n");
    }
}
