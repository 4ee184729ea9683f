//! Matrix runtime representation: a dense `state × symbol → next_state`
//! table (§4.3), usually faster than the double array for small alphabets.

use crate::alphabet::Alphabet;
use crate::automaton::Automaton;
use crate::error::{DatokError, Result};
use crate::transducer::{Step, TokenAutomaton};

/// High bit of a matrix entry marks the transition as `nontoken`.
const NONTOKEN_BIT: u32 = 1 << 31;
const STATE_MASK: u32 = !NONTOKEN_BIT;

/// A tokenizer backed by a dense state-by-symbol matrix.
#[derive(Debug, Clone)]
pub struct MatrixTokenizer {
    pub(crate) alphabet: Alphabet,
    pub(crate) state_count: u32,
    /// Highest symbol index with a populated row (inclusive).
    pub(crate) max_symbol: u32,
    /// Row-major: `matrix[(a-1) * (state_count+1) + state]`.
    pub(crate) matrix: Vec<u32>,
}

impl MatrixTokenizer {
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    pub fn state_count(&self) -> u32 {
        self.state_count
    }

    pub fn max_symbol(&self) -> u32 {
        self.max_symbol
    }

    pub fn matrix(&self) -> &[u32] {
        &self.matrix
    }

    fn index(&self, state: u32, symbol: u32) -> Option<usize> {
        if symbol == 0 || symbol > self.max_symbol {
            return None;
        }
        let idx = (symbol as usize - 1) * (self.state_count as usize + 1) + state as usize;
        if idx < self.matrix.len() {
            Some(idx)
        } else {
            None
        }
    }

    /// Whether `state` can be closed by an epsilon transition, i.e. is
    /// "sentence-endable" (§4.3).
    pub fn is_sentence_endable(&self, state: u32) -> bool {
        let epsilon = self.alphabet.epsilon;
        matches!(self.index(state, epsilon), Some(idx) if self.matrix[idx] != 0)
    }
}

impl TokenAutomaton for MatrixTokenizer {
    fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    fn step(&self, state: u32, symbol: u32) -> Option<Step> {
        let idx = self.index(state, symbol)?;
        let value = self.matrix[idx];
        if value == 0 {
            return None;
        }
        Some(Step {
            state: value & STATE_MASK,
            nontoken: value & NONTOKEN_BIT != 0,
        })
    }
}

/// Build a matrix tokenizer from the intermediate automaton via a
/// depth-first walk (§4.3).
pub fn build(auto: &Automaton) -> Result<MatrixTokenizer> {
    if auto.alphabet.sigma_count == 0 {
        return Ok(MatrixTokenizer {
            alphabet: auto.alphabet.clone(),
            state_count: auto.state_count,
            max_symbol: 0,
            matrix: Vec::new(),
        });
    }

    // The `final` pseudo-symbol never participates in a matrix lookup; the
    // highest symbol that can ever appear as `a` during transduction is one
    // below it.
    let max_symbol = auto.alphabet.sigma_count.saturating_sub(1).max(auto.alphabet.epsilon);
    if max_symbol == 0 || auto.state_count == 0 {
        return Ok(MatrixTokenizer {
            alphabet: auto.alphabet.clone(),
            state_count: auto.state_count,
            max_symbol,
            matrix: vec![0; max_symbol as usize * (auto.state_count as usize + 1)],
        });
    }

    let rows = max_symbol as usize;
    let cols = auto.state_count as usize + 1;
    let total = rows
        .checked_mul(cols)
        .ok_or_else(|| DatokError::ConstructionOverflow("matrix dimensions overflow".into()))?;
    let mut matrix = vec![0u32; total];

    let mut visited = vec![false; auto.state_count as usize + 1];
    let mut stack = vec![1u32];
    visited[1] = true;

    while let Some(s) = stack.pop() {
        for edge in auto.edges_from(s) {
            if edge.in_sym == 0 || edge.in_sym > max_symbol {
                continue;
            }
            let idx = (edge.in_sym as usize - 1) * cols + s as usize;
            let mut value = edge.target;
            if edge.nontoken {
                value |= NONTOKEN_BIT;
            }
            matrix[idx] = value;

            if !visited[edge.target as usize] {
                visited[edge.target as usize] = true;
                stack.push(edge.target);
            }
        }
    }

    Ok(MatrixTokenizer {
        alphabet: auto.alphabet.clone(),
        state_count: auto.state_count,
        max_symbol,
        matrix,
    })
}
