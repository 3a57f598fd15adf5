//! Standalone tokenizer driver (out of core scope, spec.md §1).
//!
//! Mirrors `original_source/Assignment1/PartA.py`: reads a file, tokenizes
//! it, and prints `token count` pairs sorted by descending count then
//! ascending token.

use std::fs;
use std::process::ExitCode;

use crawler_tokenizer::{count_tokens, sorted_by_count_desc_then_token_asc, tokenize};

fn main() -> ExitCode {
    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: tokenize <path>");
        return ExitCode::FAILURE;
    };

    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("failed to read {path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let counts = count_tokens(tokenize(&text));
    for (token, count) in sorted_by_count_desc_then_token_asc(&counts) {
        println!("{token} {count}");
    }

    ExitCode::SUCCESS
}
