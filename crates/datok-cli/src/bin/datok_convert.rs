//! `datok-convert`: compile a Foma text export into a compact tokenizer file.

use std::fs::File;
use std::io::BufReader;

use datok_cli::{fatal, has_flag, take_value, wants_help};
use datok_core::{double_array, foma, format, matrix};

fn print_help() {
    println!(
        "Usage: datok-convert -i <foma-file> -o <tokenizer-file> [-d]\n\n\
         Options:\n\
         \x20 -i, --foma <path>        Foma text export to compile\n\
         \x20 -o, --tokenizer <path>   Output tokenizer file\n\
         \x20 -d, --double-array       Use the double-array representation (default: matrix)\n\
         \x20 -h, --help               Print this help"
    );
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if wants_help(&args) {
        print_help();
        return;
    }

    let (foma_path, args) = take_value(&args, "--foma", Some("-i"));
    let (tokenizer_path, args) = take_value(&args, "--tokenizer", Some("-o"));
    let use_double_array = has_flag(&args, "--double-array", Some("-d"));

    let foma_path = foma_path.unwrap_or_else(|| fatal("missing required --foma/-i <path>"));
    let tokenizer_path = tokenizer_path.unwrap_or_else(|| fatal("missing required --tokenizer/-o <path>"));

    let foma_file = File::open(&foma_path).unwrap_or_else(|e| fatal(&format!("opening {foma_path}: {e}")));
    let automaton = foma::parse_foma(BufReader::new(foma_file)).unwrap_or_else(|e| fatal(&format!("parsing {foma_path}: {e}")));

    let out = File::create(&tokenizer_path).unwrap_or_else(|e| fatal(&format!("creating {tokenizer_path}: {e}")));

    let result = if use_double_array {
        double_array::build(&automaton).and_then(|tok| format::write_double_array(&tok, out))
    } else {
        matrix::build(&automaton).and_then(|tok| format::write_matrix(&tok, out))
    };

    if let Err(e) = result {
        fatal(&format!("{tokenizer_path}: {e}"));
    }
}
