//! Inter-file token-overlap counter (out of core scope, spec.md §1).
//!
//! Mirrors `original_source/Assignment1/PartB.py`: tokenizes two files and
//! prints the number of unique tokens that appear in both.

use std::fs;
use std::process::ExitCode;

use crawler_tokenizer::{count_tokens, tokenize};

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let (Some(path1), Some(path2)) = (args.next(), args.next()) else {
        eprintln!("usage: overlap <path1> <path2>");
        return ExitCode::FAILURE;
    };

    let text1 = match fs::read_to_string(&path1) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("failed to read {path1}: {e}");
            return ExitCode::FAILURE;
        }
    };
    let text2 = match fs::read_to_string(&path2) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("failed to read {path2}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let tokens1 = count_tokens(tokenize(&text1));
    let tokens2 = count_tokens(tokenize(&text2));
    let overlap = tokens1.keys().filter(|token| tokens2.contains_key(*token)).count();

    println!("{overlap}");
    ExitCode::SUCCESS
}
