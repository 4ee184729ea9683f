//! `datok-tokenize`: split text into tokens and sentences using a compiled
//! tokenizer file.

use std::fs::File;
use std::io::{self, BufWriter};

use datok_cli::{fatal, has_flag, take_value, wants_help};
use datok_core::token_writer::{self, SimpleTokenWriter};
use datok_core::{format, transduce};

fn print_help() {
    println!(
        "Usage: datok-tokenize -t <tokenizer-file> [options] [input-file | -]\n\n\
         Options:\n\
         \x20 -t, --tokenizer <path>   Compiled tokenizer file to load\n\
         \x20     --tokens              Emit token text (default on unless --sentences alone requested)\n\
         \x20     --sentences           Emit blank lines between sentences\n\
         \x20 -p, --token-positions     Emit a line of token start/end offsets per text\n\
         \x20     --sentence-positions  Emit a line of sentence start/end offsets per text\n\
         \x20     --newline-after-eot   Treat a newline right after EOT as offset zero\n\
         \x20 -h, --help               Print this help\n\n\
         Reads stdin when no input file (or `-`) is given."
    );
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if wants_help(&args) {
        print_help();
        return;
    }

    let (tokenizer_path, args) = take_value(&args, "--tokenizer", Some("-t"));
    let tokenizer_path = tokenizer_path.unwrap_or_else(|| fatal("missing required --tokenizer/-t <path>"));

    let mut flags = 0u32;
    if has_flag(&args, "--tokens", None) {
        flags |= token_writer::TOKENS;
    }
    if has_flag(&args, "--sentences", None) {
        flags |= token_writer::SENTENCES;
    }
    if has_flag(&args, "--token-positions", Some("-p")) {
        flags |= token_writer::TOKEN_POS;
    }
    if has_flag(&args, "--sentence-positions", None) {
        flags |= token_writer::SENTENCE_POS;
    }
    if has_flag(&args, "--newline-after-eot", None) {
        flags |= token_writer::NEWLINE_AFTER_EOT;
    }
    if flags & (token_writer::TOKENS | token_writer::SENTENCES) == 0 {
        flags |= token_writer::SIMPLE;
    }

    let positional: Vec<&String> = args
        .iter()
        .filter(|a| !a.starts_with('-') || *a == "-")
        .collect();

    let tokenizer_file = File::open(&tokenizer_path).unwrap_or_else(|e| fatal(&format!("opening {tokenizer_path}: {e}")));
    let automaton = format::load_tokenizer(tokenizer_file).unwrap_or_else(|e| fatal(&format!("loading {tokenizer_path}: {e}")));

    let stdout = io::stdout();
    let mut writer = SimpleTokenWriter::new(BufWriter::new(stdout.lock()), flags);

    let result = match positional.first() {
        None => transduce(&automaton, io::stdin().lock(), &mut writer),
        Some(path) if path.as_str() == "-" => transduce(&automaton, io::stdin().lock(), &mut writer),
        Some(path) => {
            let input = File::open(path.as_str()).unwrap_or_else(|e| fatal(&format!("opening {path}: {e}")));
            transduce(&automaton, input, &mut writer)
        }
    };

    if let Err(e) = result {
        fatal(&format!("{e}"));
    }
}
