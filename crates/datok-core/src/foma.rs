//! Parser for the Foma textual FST export format into the `Automaton` IR.
//!
//! Accepts the sections `##foma-net`, `##props##`, `##sigma##`,
//! `##states##`, `##end##` in that order; an explicit `##end##` is not
//! required, a clean end-of-stream closes the `##states##` section just as
//! well.

use std::io::BufRead;

use hashbrown::HashSet;

use crate::alphabet::Alphabet;
use crate::automaton::{Automaton, Edge};
use crate::error::{DatokError, Result};

const EPSILON_SYMBOL: &str = "@_EPSILON_SYMBOL_@";
const UNKNOWN_SYMBOL: &str = "@_UNKNOWN_SYMBOL_@";
const IDENTITY_SYMBOL: &str = "@_IDENTITY_SYMBOL_@";
const TOKEN_SYMBOL: &str = "@_TOKEN_SYMBOL_@";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    None,
    Props,
    Sigma,
    States,
}

/// Parse a Foma export into an `Automaton`. `reader` should be positioned
/// at the start of the text (already decompressed, if the source was
/// gzip-framed).
pub fn parse_foma<R: BufRead>(mut reader: R) -> Result<Automaton> {
    let mut mode = Mode::None;
    let mut alphabet = Alphabet::new();
    let mut arc_count: u32 = 0;
    let mut state_count: u32 = 0;
    let mut automaton: Option<Automaton> = None;
    let mut mcs_skip: HashSet<u32> = HashSet::new();

    // Carried across STATES lines: Foma's "same as previous" shortening
    // means a short line reuses whichever of these fields it omits.
    let mut state: i64 = 0;
    let mut in_sym: i64 = 0;
    let mut out_sym: i64 = 0;
    let mut end: i64 = 0;
    let mut final_flag: i64 = 0;

    let mut line = String::new();
    loop {
        line.clear();
        let read = reader
            .read_line(&mut line)
            .map_err(|e| DatokError::Input(e.to_string()))?;
        if read == 0 {
            break;
        }
        let trimmed = line.strip_suffix('\n').unwrap_or(&line);

        if let Some(rest) = trimmed.strip_prefix("##") {
            if rest.starts_with("props##") {
                mode = Mode::Props;
            } else if rest.starts_with("states##") {
                mode = Mode::States;
                // Append the implicit `final` symbol, Mizobuchi's `#`.
                alphabet.sigma_count += 1;
                alphabet.final_symbol = alphabet.sigma_count;
            } else if rest.starts_with("sigma##") {
                mode = Mode::Sigma;
            } else if rest.starts_with("end##") {
                mode = Mode::None;
            } else if !rest.starts_with("foma-net") {
                return Err(DatokError::Parse(format!("unknown section line: {trimmed}")));
            }
            continue;
        }

        match mode {
            Mode::Props => {
                let fields: Vec<&str> = trimmed.split(' ').collect();
                if fields.len() < 10 {
                    return Err(DatokError::Parse("truncated ##props## line".into()));
                }
                if fields[6] != "1" {
                    return Err(DatokError::Parse("the FST needs to be deterministic".into()));
                }
                if fields[9] != "1" {
                    return Err(DatokError::Parse("the FST needs to be epsilon free".into()));
                }
                arc_count = fields[1]
                    .parse()
                    .map_err(|_| DatokError::Parse("can't read arccount".into()))?;
                state_count = fields[2]
                    .parse()
                    .map_err(|_| DatokError::Parse("can't read statecount".into()))?;
            }
            Mode::Sigma => {
                let mut parts = trimmed.splitn(2, ' ');
                let num_str = parts
                    .next()
                    .ok_or_else(|| DatokError::Parse("empty ##sigma## line".into()))?;
                let mut text = parts.next().unwrap_or("").to_string();
                let number: u32 = num_str
                    .parse::<u32>()
                    .map_err(|_| DatokError::Parse(format!("bad sigma id: {num_str}")))?
                    + 1;
                alphabet.sigma_count = number;

                let char_count = text.chars().count();
                if char_count == 1 {
                    let rune = text.chars().next().unwrap();
                    alphabet.insert_rune(number, rune);
                } else if char_count > 1 {
                    match text.as_str() {
                        EPSILON_SYMBOL => alphabet.epsilon = number,
                        UNKNOWN_SYMBOL => alphabet.unknown = number,
                        IDENTITY_SYMBOL => alphabet.identity = number,
                        TOKEN_SYMBOL => alphabet.tokenend = number,
                        _ => {
                            mcs_skip.insert(number);
                        }
                    }
                } else {
                    // Empty text: the next (blank) line carries a literal
                    // newline character.
                    line.clear();
                    let read = reader
                        .read_line(&mut line)
                        .map_err(|e| DatokError::Input(e.to_string()))?;
                    if read == 0 {
                        return Err(DatokError::Parse(
                            "unexpected end of input while reading newline symbol".into(),
                        ));
                    }
                    if line == "\n" {
                        alphabet.insert_rune(number, '\n');
                    } else {
                        text.push_str(&line);
                        mcs_skip.insert(number);
                    }
                }
            }
            Mode::States => {
                if automaton.is_none() {
                    alphabet.prefill_identity();
                    automaton = Some(Automaton::with_arc_count(
                        alphabet.clone(),
                        state_count,
                        arc_count,
                    ));
                }
                let auto = automaton.as_mut().expect("initialized above");

                let fields: Vec<&str> = trimmed.split(' ').collect();
                if fields[0] == "-1" {
                    continue;
                }
                let parsed: Result<Vec<i64>> = fields
                    .iter()
                    .map(|f| {
                        f.parse::<i64>()
                            .map_err(|_| DatokError::Parse(format!("bad state field: {f}")))
                    })
                    .collect();
                let parsed = parsed?;

                match parsed.len() {
                    5 => {
                        state = parsed[0];
                        in_sym = parsed[1];
                        out_sym = parsed[2];
                        end = parsed[3];
                        final_flag = parsed[4];
                    }
                    4 => {
                        if parsed[1] == -1 {
                            state = parsed[0];
                            final_flag = parsed[3];
                            if final_flag == 1 {
                                auto.mark_accepting(state as u32 + 1);
                            }
                            continue;
                        }
                        state = parsed[0];
                        in_sym = parsed[1];
                        end = parsed[2];
                        final_flag = parsed[3];
                        out_sym = in_sym;
                    }
                    3 => {
                        in_sym = parsed[0];
                        out_sym = parsed[1];
                        end = parsed[2];
                    }
                    2 => {
                        in_sym = parsed[0];
                        end = parsed[1];
                        out_sym = in_sym;
                    }
                    other => {
                        return Err(DatokError::Parse(format!(
                            "unsupported ##states## line with {other} fields"
                        )));
                    }
                }

                let in_renumbered = (in_sym + 1) as u32;
                let out_renumbered = (out_sym + 1) as u32;

                let mut nontoken = false;
                let mut tokenend = false;

                if in_renumbered != out_renumbered {
                    if out_renumbered == auto.alphabet.tokenend && in_renumbered == auto.alphabet.epsilon {
                        tokenend = true;
                    } else if out_renumbered == auto.alphabet.epsilon {
                        nontoken = true;
                    } else {
                        return Err(DatokError::Parse(format!(
                            "unsupported transition {state} -> {end} ({in_renumbered}:{out_renumbered})"
                        )));
                    }
                } else if in_renumbered == auto.alphabet.tokenend {
                    continue;
                } else if in_renumbered == auto.alphabet.epsilon {
                    return Err(DatokError::Parse(
                        "general epsilon transitions are not supported".into(),
                    ));
                } else if mcs_skip.contains(&in_renumbered) {
                    continue;
                }

                auto.add_edge(
                    state as u32 + 1,
                    Edge {
                        in_sym: in_renumbered,
                        out_sym: out_renumbered,
                        target: end as u32 + 1,
                        nontoken,
                        tokenend,
                    },
                );

                if final_flag == 1 {
                    auto.mark_accepting(state as u32 + 1);
                }
            }
            Mode::None => {}
        }
    }

    let mut auto = automaton.ok_or_else(|| DatokError::Parse("missing ##props## section".into()))?;
    auto.alphabet = alphabet;
    Ok(auto)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> &'static str {
        "##foma-net\n##props##\n1 3 3 3 1 1 1 0 0 1 1 0 test\n##sigma##\n0 @_EPSILON_SYMBOL_@\n1 a\n2 b\n##states##\n0 0 0 0\n1 1 1 1\n-1 -1 -1 -1 -1\n##end##\n"
    }

    #[test]
    fn parses_minimal_automaton() {
        let auto = parse_foma(Cursor::new(sample().as_bytes())).expect("parse ok");
        assert_eq!(auto.state_count, 3);
        assert_eq!(auto.alphabet.symbol_for('a'), 2);
        assert_eq!(auto.alphabet.symbol_for('b'), 3);
    }

    #[test]
    fn rejects_nondeterministic_fst() {
        let text = "##foma-net\n##props##\n1 3 3 3 1 1 0 0 0 1 1 0 test\n##end##\n";
        let err = parse_foma(Cursor::new(text.as_bytes())).unwrap_err();
        assert!(matches!(err, DatokError::Parse(_)));
    }

    #[test]
    fn rejects_non_epsilon_free_fst() {
        let text = "##foma-net\n##props##\n1 3 3 3 1 1 1 0 0 0 1 0 test\n##end##\n";
        let err = parse_foma(Cursor::new(text.as_bytes())).unwrap_err();
        assert!(matches!(err, DatokError::Parse(_)));
    }

    #[test]
    fn accepts_missing_explicit_end_marker() {
        let text = "##foma-net\n##props##\n1 1 1 1 1 1 1 0 0 1 1 0 test\n##sigma##\n0 a\n##states##\n0 0 0 1\n";
        let auto = parse_foma(Cursor::new(text.as_bytes())).expect("parse ok");
        assert_eq!(auto.state_count, 1);
        assert!(auto.is_accepting(1));
    }

    #[test]
    fn rejects_pure_epsilon_edge() {
        // in == out == epsilon (symbol 1 after renumbering of foma id 0)
        let text = "##foma-net\n##props##\n1 1 1 1 1 1 1 0 0 1 1 0 test\n##sigma##\n0 @_EPSILON_SYMBOL_@\n##states##\n0 0 0 1\n";
        let err = parse_foma(Cursor::new(text.as_bytes())).unwrap_err();
        assert!(matches!(err, DatokError::Parse(_)));
    }
}
