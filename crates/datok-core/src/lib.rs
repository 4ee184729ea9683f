//! Datok: an FST-driven tokenizer and sentence splitter.
//!
//! Consumes a pre-compiled Foma FST export, compiles it into one of two
//! compact runtime representations (a Mizobuchi-style double array, or a
//! dense matrix), and drives a streaming transduction loop that segments
//! text into tokens and sentences.
//!
//! # Architecture
//!
//! - [`alphabet`] -- rune/symbol bijection and named specials
//! - [`foma`] -- the Foma text export parser
//! - [`automaton`] -- the intermediate state/edge graph
//! - [`double_array`] -- Mizobuchi-style packed runtime representation
//! - [`matrix`] -- dense state x symbol runtime representation
//! - [`format`] -- gzip-framed binary codec for both representations
//! - [`transducer`] -- the streaming greedy-longest-match hot loop
//! - [`token_writer`] -- configurable token/sentence/text-end emission

pub mod alphabet;
pub mod automaton;
pub mod double_array;
pub mod error;
pub mod foma;
pub mod format;
pub mod matrix;
pub mod token_writer;
pub mod transducer;

pub use alphabet::Alphabet;
pub use automaton::Automaton;
pub use double_array::DoubleArrayTokenizer;
pub use error::{DatokError, Result};
pub use format::{load_tokenizer, AnyTokenizer};
pub use matrix::MatrixTokenizer;
pub use token_writer::{SimpleTokenWriter, TokenWriter};
pub use transducer::{transduce, TokenAutomaton, EOT};
