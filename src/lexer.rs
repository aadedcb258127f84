//! Card lexer (Component B): groups physical lines of a deck into the
//! raw line-groups that the decomposer will later split into template
//! and input. Pull-based in spirit — `lex` builds the full sequence up
//! front (decks are small text files) and hands it back as a plain
//! `Vec`, which callers drive with `.into_iter()` exactly as the
//! `iterator<Card>` contract in §6 describes.

use crate::diag::{self, Diagnostic, DiagnosticKind};
use crate::kinds::CardKind;

/// A contiguous group of physical lines assigned a `CardKind` by
/// position, not yet decomposed into template/input/hidden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCard {
    /// Physical lines, each retaining its own trailing `\n` (the final
    /// line of the file may lack one).
    pub lines: Vec<String>,
    pub kind: CardKind,
    /// 1-based line number of the first physical line in this group.
    pub line_no: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Title,
    Cell,
    Surface,
    Data,
}

impl Block {
    fn advance(self) -> Block {
        match self {
            Block::Title => Block::Cell,
            Block::Cell => Block::Surface,
            Block::Surface => Block::Data,
            Block::Data => Block::Data,
        }
    }

    fn card_kind(self) -> CardKind {
        match self {
            Block::Title => CardKind::Title,
            Block::Cell => CardKind::Cell,
            Block::Surface => CardKind::Surface,
            Block::Data => CardKind::Data,
        }
    }
}

/// Split `text` into raw card line-groups plus any lexer-level
/// diagnostics (currently only tab-character warnings). Never fails —
/// per §4.2's failure semantics, malformed content simply yields
/// whatever has accumulated.
pub fn lex(text: &str) -> (Vec<RawCard>, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();
    let mut cards = Vec::new();
    let lines = split_keep_newline(text);
    if lines.is_empty() {
        return (cards, diagnostics);
    }

    let first_kw = lines[0]
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();

    let mut line_no;
    let mut idx;
    let mut block;

    if first_kw == "message:" {
        let mut msg_lines = Vec::new();
        let mut i = 0;
        while i < lines.len() && !is_blankline(&lines[i]) {
            msg_lines.push(lines[i].clone());
            i += 1;
        }
        line_no = msg_lines.len();
        cards.push(RawCard {
            lines: msg_lines,
            kind: CardKind::Message,
            line_no: 1,
        });
        if i < lines.len() {
            line_no += 1;
            cards.push(RawCard {
                lines: vec![lines[i].clone()],
                kind: CardKind::BlankLine,
                line_no,
            });
            i += 1;
        }
        idx = i;
        block = Block::Title;
    } else if first_kw == "continue" {
        idx = 0;
        line_no = 0;
        block = Block::Data;
    } else {
        cards.push(RawCard {
            lines: vec![lines[0].clone()],
            kind: CardKind::Title,
            line_no: 1,
        });
        line_no = 1;
        idx = 1;
        block = Block::Cell;
    }

    let mut card_buf: Vec<String> = Vec::new();
    let mut card_start_line = 0usize;
    let mut cmnt_buf: Vec<String> = Vec::new();
    let mut cmnt_start_line = 0usize;
    let mut cf = false;

    for raw in &lines[idx..] {
        line_no += 1;
        if raw.chars().any(|c| c == '\t') {
            diag::report(&mut diagnostics, line_no, DiagnosticKind::TabCharacter);
        }

        if is_blankline(raw) {
            flush_card(&mut cards, &mut card_buf, block.card_kind(), card_start_line);
            flush_comments(&mut cards, &mut cmnt_buf, cmnt_start_line);
            cards.push(RawCard {
                lines: vec![raw.clone()],
                kind: CardKind::BlankLine,
                line_no,
            });
            block = block.advance();
            cf = false;
        } else if starts_with_indent(raw) || cf {
            if card_buf.is_empty() {
                card_start_line = if cmnt_buf.is_empty() {
                    line_no
                } else {
                    cmnt_start_line
                };
            }
            card_buf.append(&mut cmnt_buf);
            card_buf.push(raw.clone());
            cf = sets_continuation(raw);
        } else if is_commented(raw) {
            if cmnt_buf.is_empty() {
                cmnt_start_line = line_no;
            }
            cmnt_buf.push(raw.clone());
        } else {
            flush_card(&mut cards, &mut card_buf, block.card_kind(), card_start_line);
            flush_comments(&mut cards, &mut cmnt_buf, cmnt_start_line);
            card_buf.push(raw.clone());
            card_start_line = line_no;
            cf = sets_continuation(raw);
        }
    }
    flush_card(&mut cards, &mut card_buf, block.card_kind(), card_start_line);
    flush_comments(&mut cards, &mut cmnt_buf, cmnt_start_line);

    (cards, diagnostics)
}

fn flush_card(cards: &mut Vec<RawCard>, buf: &mut Vec<String>, kind: CardKind, line_no: usize) {
    if !buf.is_empty() {
        cards.push(RawCard {
            lines: std::mem::take(buf),
            kind,
            line_no,
        });
    }
}

fn flush_comments(cards: &mut Vec<RawCard>, buf: &mut Vec<String>, line_no: usize) {
    if !buf.is_empty() {
        cards.push(RawCard {
            lines: std::mem::take(buf),
            kind: CardKind::Comment,
            line_no,
        });
    }
}

fn sets_continuation(line: &str) -> bool {
    !is_fc_card(line) && has_continuation_marker(line)
}

/// Split `text` into physical lines, each keeping its own trailing `\n`
/// (required for byte-accurate reconstruction; `str::lines` would
/// discard the terminators).
fn split_keep_newline(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = text;
    while let Some(idx) = rest.find('\n') {
        out.push(rest[..=idx].to_string());
        rest = &rest[idx + 1..];
    }
    if !rest.is_empty() {
        out.push(rest.to_string());
    }
    out
}

pub(crate) fn is_blankline(line: &str) -> bool {
    line.trim().is_empty()
}

fn starts_with_indent(line: &str) -> bool {
    line.chars().take(5).all(|c| c == ' ') && line.chars().take(5).count() == 5
}

/// True if `line` is within the first 81 characters followed by a `$`
/// or `&`, or the line contains `&` at all in that window — used by
/// the lexer to decide if the *following* physical line continues this
/// one.
fn has_continuation_marker(line: &str) -> bool {
    line.chars().take(81).any(|c| c == '&')
}

/// Tally-comment cards (`fcN`) never trigger continuation via `&`.
pub(crate) fn is_fc_card(line: &str) -> bool {
    line.trim_start().to_ascii_lowercase().starts_with("fc")
}

/// First five columns contain (after left-trim) `c`/`C` followed by
/// whitespace or end of line.
pub(crate) fn is_commented(line: &str) -> bool {
    let chars: Vec<char> = line.chars().collect();
    let mut idx = 0;
    while idx < chars.len() && idx <= 5 && chars[idx] == ' ' {
        idx += 1;
    }
    if idx > 5 || idx >= chars.len() {
        return false;
    }
    if chars[idx] != 'c' && chars[idx] != 'C' {
        return false;
    }
    match chars.get(idx + 1) {
        None => true,
        Some(&c) => c.is_whitespace(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn simple_deck_splits_into_four_blocks() {
        let deck = "title line\n1 0 -1\n\n5 px 1.0\n\nm1 1001 1.0\n";
        let (cards, diags) = lex(deck);
        assert!(diags.is_empty());
        let kinds: Vec<CardKind> = cards.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                CardKind::Title,
                CardKind::Cell,
                CardKind::BlankLine,
                CardKind::Surface,
                CardKind::BlankLine,
                CardKind::Data,
            ]
        );
    }

    #[test]
    fn continuation_by_indent_is_folded_into_one_card() {
        let deck = "title\n1 0 -1 -2\n     -3 -4\n\n";
        let (cards, _) = lex(deck);
        let cell = cards.iter().find(|c| c.kind == CardKind::Cell).unwrap();
        assert_eq!(cell.lines.len(), 2);
    }

    #[test]
    fn trailing_ampersand_continues_next_line() {
        let deck = "title\n1 0 -1 &\n-2\n\n";
        let (cards, _) = lex(deck);
        let cell = cards.iter().find(|c| c.kind == CardKind::Cell).unwrap();
        assert_eq!(cell.lines.len(), 2);
    }

    #[test]
    fn fc_card_does_not_trigger_continuation_on_ampersand() {
        let deck = "title\n1 0 -1\n\n5 px 1.0\n\nfc4 some comment & not continued\nf4 1 2\n\n";
        let (cards, _) = lex(deck);
        let data_cards: Vec<&RawCard> =
            cards.iter().filter(|c| c.kind == CardKind::Data).collect();
        assert_eq!(data_cards.len(), 2);
    }

    #[test]
    fn comment_buffer_merges_into_following_card() {
        let deck = "title\nc this is a cell\n1 0 -1\n\n";
        let (cards, _) = lex(deck);
        let kinds: Vec<CardKind> = cards.iter().map(|c| c.kind).collect();
        assert!(kinds.contains(&CardKind::Comment));
        let cell = cards.iter().find(|c| c.kind == CardKind::Cell).unwrap();
        assert_eq!(cell.lines, vec!["1 0 -1\n".to_string()]);
    }

    #[test]
    fn comment_absorbed_into_card_when_it_continues() {
        // the comment line itself carries no '&', so `cf` resets to false
        // after it; "-2" needs its own 5-space indent to keep continuing
        // the cell card (matching get_cards' cf-reset behavior).
        let deck = "title\n1 0 -1 &\nc inline note\n     -2\n\n";
        let (cards, _) = lex(deck);
        let comments: Vec<&RawCard> = cards.iter().filter(|c| c.kind == CardKind::Comment).collect();
        assert!(comments.is_empty());
        let cell = cards.iter().find(|c| c.kind == CardKind::Cell).unwrap();
        assert_eq!(cell.lines.len(), 3);
    }

    #[test]
    fn tab_character_is_reported_but_not_fatal() {
        let deck = "title\n1\t0 -1\n\n";
        let (_, diags) = lex(deck);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::TabCharacter);
    }

    #[test]
    fn continue_deck_has_only_data_block() {
        let deck = "continue\nm1 1001 1.0\n";
        let (cards, _) = lex(deck);
        assert!(cards.iter().all(|c| matches!(c.kind, CardKind::Data)));
    }
}
