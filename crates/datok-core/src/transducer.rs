//! The streaming transduction hot loop (§4.4), shared by the double-array
//! and matrix tokenizers through the `TokenAutomaton` trait.
//!
//! Based on `TransduceTokenWriter` in the reference implementation, with the
//! `goto PARSECHAR` control flow re-expressed as a labeled loop guarded by a
//! `newchar` flag (§9).

use std::io::{self, Read};

use crate::alphabet::Alphabet;
use crate::error::{DatokError, Result};
use crate::token_writer::TokenWriter;

/// ASCII end-of-text marker (§6.4): closes the current text and triggers
/// `text_end`.
pub const EOT: char = '\u{0004}';

/// The result of a single-symbol step against a compiled automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub state: u32,
    pub nontoken: bool,
}

/// Common interface over the double-array and matrix runtime
/// representations, so the hot loop below is written once.
pub trait TokenAutomaton {
    fn alphabet(&self) -> &Alphabet;

    /// Attempt the transition `state --symbol-->`. `None` means invalid.
    fn step(&self, state: u32, symbol: u32) -> Option<Step>;

    /// Dereference a `separate` entry to its representative state. A no-op
    /// for representations without representative-state sharing (matrix).
    fn resolve_separate(&self, state: u32) -> u32 {
        state
    }
}

const INITIAL_BUF_LEN: usize = 1024;

/// Transduce `input` against `automaton`, driving `writer` with token,
/// sentence, and text-end events (§4.4).
pub fn transduce<A: TokenAutomaton, R: Read, W: TokenWriter>(
    automaton: &A,
    input: R,
    writer: &mut W,
) -> Result<()> {
    let alphabet = automaton.alphabet();
    let epsilon = alphabet.epsilon;
    let unknown = alphabet.unknown;
    let identity = alphabet.identity;

    let mut reader = io::BufReader::with_capacity(4096, input);

    // The buffer is organized as: [0..bufft) emitted, [bufft..buffc) the
    // current token in progress, [buffc..buffi) unconsumed look-ahead.
    let mut buffer: Vec<char> = vec!['\0'; INITIAL_BUF_LEN];
    let mut bufft: usize = 0;
    let mut buffc: usize = 0;
    let mut buffi: usize = 0;

    let mut t: u32 = 1;
    let mut t0: u32 = 0;
    let mut a: u32 = epsilon;
    let mut explicit_match = true;

    let mut epsilon_state: u32 = 0;
    let mut epsilon_offset: usize = 0;

    let mut sentence_end = false;
    let mut text_end = false;

    let mut eof = false;
    let mut eot = false;
    let mut newchar = true;

    'parse: loop {
        if newchar {
            if buffc >= buffi {
                if eof {
                    // No more input. Try to close out via a trailing epsilon
                    // step (or the last backtrack point) and loop back into
                    // the dispatch below; repeat for as long as each closed
                    // epsilon transition opens up another one. Only give up
                    // once neither is available (§4.4).
                    t0 = t;
                    if automaton.step(t0, epsilon).is_some() {
                        a = epsilon;
                        explicit_match = true;
                        newchar = false;
                        continue 'parse;
                    } else if epsilon_state != 0 {
                        t0 = epsilon_state;
                        buffc = epsilon_offset;
                        epsilon_state = 0;
                        a = epsilon;
                        explicit_match = true;
                        newchar = false;
                        continue 'parse;
                    }
                    break 'parse;
                }
                match read_char(&mut reader)? {
                    Some(c) => {
                        if buffi >= buffer.len() {
                            buffer.resize(buffer.len() * 2, '\0');
                        }
                        buffer[buffi] = c;
                        buffi += 1;
                    }
                    None => {
                        eof = true;
                        continue 'parse;
                    }
                }
            }

            let char_ = buffer[buffc];
            eot = char_ == EOT;
            let (sym, is_explicit) = alphabet.resolve(char_);
            a = sym;
            explicit_match = is_explicit;

            t0 = t;
            if automaton.step(t0, epsilon).is_some() {
                epsilon_state = t0;
                epsilon_offset = buffc;
            }
        }

        match automaton.step(t0, a) {
            None => {
                if !explicit_match && a == identity {
                    a = unknown;
                    eot = false;
                    newchar = false;
                    continue 'parse;
                } else if a != epsilon && epsilon_state != 0 {
                    t0 = epsilon_state;
                    epsilon_state = 0;
                    buffc = epsilon_offset;
                    a = epsilon;
                    explicit_match = true;
                    eot = false;
                    newchar = false;
                    continue 'parse;
                } else {
                    if buffc == bufft {
                        buffc += 1;
                    }
                    writer.token(bufft, &buffer[..buffc])?;
                    sentence_end = false;
                    text_end = false;

                    buffer.copy_within(buffc..buffi, 0);
                    buffi -= buffc;
                    epsilon_state = 0;
                    buffc = 0;
                    bufft = 0;

                    t = 1;
                    newchar = true;
                    continue 'parse;
                }
            }
            Some(step) => {
                t = step.state;
                let mut rewind = false;

                if a != epsilon {
                    buffc += 1;
                    if buffc - bufft == 1 && step.nontoken {
                        bufft += 1;
                    }
                } else if buffc > bufft {
                    writer.token(bufft, &buffer[..buffc])?;
                    rewind = true;
                    sentence_end = false;
                    text_end = false;
                } else {
                    sentence_end = true;
                    writer.sentence_end(buffc)?;
                }

                if eot {
                    eot = false;
                    text_end = true;
                    writer.text_end(buffc)?;
                    rewind = true;
                }

                if rewind {
                    buffer.copy_within(buffc..buffi, 0);
                    buffi -= buffc;
                    epsilon_offset = 0;
                    epsilon_state = 0;
                    buffc = 0;
                    bufft = 0;
                }

                t = automaton.resolve_separate(t);
                newchar = true;
            }
        }
    }

    if !eof {
        return Err(DatokError::Input("input reader did not reach EOF".into()));
    }

    if buffc > bufft {
        writer.token(bufft, &buffer[..buffc])?;
        sentence_end = false;
        text_end = false;
    }

    if !sentence_end {
        writer.sentence_end(buffc)?;
    }
    if !text_end {
        writer.text_end(buffc)?;
    }
    writer.flush()?;

    Ok(())
}

/// Decode one rune from a byte reader, manually walking UTF-8 lead/continuation
/// bytes (also used by the sigma-section reader in `format.rs`).
pub(crate) fn read_char<R: Read>(reader: &mut io::BufReader<R>) -> Result<Option<char>> {
    let mut first = [0u8; 1];
    loop {
        return match reader.read(&mut first) {
            Ok(0) => Ok(None),
            Ok(_) => {
                let byte0 = first[0];
                let extra = utf8_extra_bytes(byte0).ok_or_else(|| {
                    DatokError::Input(format!("invalid UTF-8 lead byte 0x{byte0:02x}"))
                })?;

                if extra == 0 {
                    return Ok(Some(byte0 as char));
                }

                let mut buf = [0u8; 4];
                buf[0] = byte0;
                reader.read_exact(&mut buf[1..=extra]).map_err(DatokError::Io)?;

                std::str::from_utf8(&buf[..=extra])
                    .ok()
                    .and_then(|s| s.chars().next())
                    .ok_or_else(|| DatokError::Input("invalid UTF-8 sequence in input".into()))
                    .map(Some)
            }
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => Err(DatokError::Io(e)),
        };
    }
}

pub(crate) fn utf8_extra_bytes(byte0: u8) -> Option<usize> {
    if byte0 & 0x80 == 0 {
        Some(0)
    } else if byte0 & 0xE0 == 0xC0 {
        Some(1)
    } else if byte0 & 0xF0 == 0xE0 {
        Some(2)
    } else if byte0 & 0xF8 == 0xF0 {
        Some(3)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::Alphabet;
    use crate::automaton::{Automaton, Edge};
    use crate::double_array::build as build_da;
    use crate::matrix::build as build_matrix;
    use crate::token_writer::{SimpleTokenWriter, SIMPLE};

    // A tiny "word . " tokenizer: a word-closing epsilon transition only
    // exists while inside a word (state 2) or right after a period (state
    // 3), forcing the fail→epsilon-backtrack path on a word/sentence
    // boundary exactly as the real hot loop relies on.
    //
    // States: 1 = root (between tokens), 2 = in-word, 3 = after '.'.
    fn word_dot_automaton() -> Automaton {
        let mut alphabet = Alphabet::new();
        // sigma: 1 = identity (letters), 2 = space, 3 = '.', epsilon = 4
        alphabet.identity = 1;
        alphabet.prefill_identity();
        alphabet.insert_rune(2, ' ');
        alphabet.insert_rune(3, '.');
        alphabet.epsilon = 4;
        alphabet.final_symbol = 5;
        alphabet.sigma_count = 5;

        let mut auto = Automaton::with_arc_count(alphabet, 3, 6);

        auto.add_edge(
            1,
            Edge {
                in_sym: 1,
                out_sym: 1,
                target: 2,
                nontoken: false,
                tokenend: false,
            },
        );
        auto.add_edge(
            1,
            Edge {
                in_sym: 2,
                out_sym: 4,
                target: 1,
                nontoken: true,
                tokenend: false,
            },
        );
        auto.add_edge(
            1,
            Edge {
                in_sym: 3,
                out_sym: 3,
                target: 3,
                nontoken: false,
                tokenend: false,
            },
        );

        auto.add_edge(
            2,
            Edge {
                in_sym: 1,
                out_sym: 1,
                target: 2,
                nontoken: false,
                tokenend: false,
            },
        );
        auto.add_edge(
            2,
            Edge {
                in_sym: 4,
                out_sym: 4,
                target: 1,
                nontoken: false,
                tokenend: true,
            },
        );

        auto.add_edge(
            3,
            Edge {
                in_sym: 4,
                out_sym: 4,
                target: 1,
                nontoken: false,
                tokenend: true,
            },
        );

        auto.mark_accepting(2);
        auto.mark_accepting(3);

        auto
    }

    fn run(auto: &Automaton, input: &str) -> String {
        let dat = build_da(auto).expect("build ok");
        let mut out = Vec::new();
        {
            let mut w = SimpleTokenWriter::new(&mut out, SIMPLE);
            transduce(&dat, input.as_bytes(), &mut w).expect("transduce ok");
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn splits_words_and_sentences() {
        let auto = word_dot_automaton();
        let out = run(&auto, "Hi there.");
        // Three tokens, then a synthetic sentence_end (no explicit sentence
        // boundary in this toy grammar) and the text_end blank line.
        assert_eq!(out, "Hi\nthere\n.\n\n\n");
    }

    #[test]
    fn empty_input_emits_only_text_end() {
        let auto = word_dot_automaton();
        let out = run(&auto, "");
        assert_eq!(out, "\n\n");
    }

    // An automaton where closing out at end-of-input takes two distinct
    // epsilon steps: one that closes the in-progress word (tokenend, state
    // 2 -> 3) and a second, separate one that only marks a sentence
    // boundary (state 3 -> 1). A single-step drain would close the word but
    // never fire the trailing sentence_end.
    //
    // States: 1 = root, 2 = in-word, 3 = word just closed, awaiting the
    // sentence-closing epsilon.
    fn two_step_drain_automaton() -> Automaton {
        let mut alphabet = Alphabet::new();
        alphabet.identity = 1;
        alphabet.prefill_identity();
        alphabet.epsilon = 4;
        alphabet.final_symbol = 5;
        alphabet.sigma_count = 5;

        let mut auto = Automaton::with_arc_count(alphabet, 3, 4);

        auto.add_edge(
            1,
            Edge {
                in_sym: 1,
                out_sym: 1,
                target: 2,
                nontoken: false,
                tokenend: false,
            },
        );
        auto.add_edge(
            2,
            Edge {
                in_sym: 1,
                out_sym: 1,
                target: 2,
                nontoken: false,
                tokenend: false,
            },
        );
        auto.add_edge(
            2,
            Edge {
                in_sym: 4,
                out_sym: 4,
                target: 3,
                nontoken: false,
                tokenend: true,
            },
        );
        auto.add_edge(
            3,
            Edge {
                in_sym: 4,
                out_sym: 4,
                target: 1,
                nontoken: false,
                tokenend: false,
            },
        );

        auto.mark_accepting(2);
        auto.mark_accepting(3);

        auto
    }

    #[test]
    fn end_of_input_drain_takes_more_than_one_epsilon_step() {
        let auto = two_step_drain_automaton();
        let out = run(&auto, "Hi");
        // Token closed by the first epsilon, sentence boundary fired by the
        // second, then the final text_end.
        assert_eq!(out, "Hi\n\n\n");
    }

    #[test]
    fn double_array_and_matrix_agree() {
        let auto = word_dot_automaton();
        let dat = build_da(&auto).expect("da build");
        let mat = build_matrix(&auto).expect("matrix build");

        let mut out_da = Vec::new();
        let mut out_mat = Vec::new();
        {
            let mut w = SimpleTokenWriter::new(&mut out_da, SIMPLE);
            transduce(&dat, "Hi there.".as_bytes(), &mut w).unwrap();
        }
        {
            let mut w = SimpleTokenWriter::new(&mut out_mat, SIMPLE);
            transduce(&mat, "Hi there.".as_bytes(), &mut w).unwrap();
        }
        assert_eq!(out_da, out_mat);
    }
}
