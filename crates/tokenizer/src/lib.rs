//! Streaming tokenizer: lowercase alphanumeric runs, separators dropped.

use std::collections::HashMap;

/// Pull iterator over maximal runs of alphanumeric characters, lowercased.
///
/// Holds only the current partial token in memory, so it streams over
/// arbitrarily large input without buffering the whole thing.
pub struct Tokens<I> {
    chars: I,
    done: bool,
}

impl<I: Iterator<Item = char>> Tokens<I> {
    pub fn new(chars: I) -> Self {
        Self { chars, done: false }
    }
}

impl<I: Iterator<Item = char>> Iterator for Tokens<I> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.done {
            return None;
        }
        let mut token = String::new();
        loop {
            match self.chars.next() {
                Some(c) if c.is_alphanumeric() => token.extend(c.to_lowercase()),
                Some(_) => {
                    if !token.is_empty() {
                        return Some(token);
                    }
                    // separator with no accumulated token yet — keep scanning
                }
                None => {
                    self.done = true;
                    if !token.is_empty() {
                        return Some(token);
                    }
                    return None;
                }
            }
        }
    }
}

/// Tokenize a string slice.
pub fn tokenize(text: &str) -> Tokens<std::str::Chars<'_>> {
    Tokens::new(text.chars())
}

/// Tokenize any char stream (e.g. chars read incrementally from a file).
pub fn tokenize_chars<I: Iterator<Item = char>>(chars: I) -> Tokens<I> {
    Tokens::new(chars)
}

/// Collapse a token stream into occurrence counts.
pub fn count_tokens<I: Iterator<Item = String>>(tokens: I) -> HashMap<String, u64> {
    let mut counts = HashMap::new();
    for token in tokens {
        *counts.entry(token).or_insert(0u64) += 1;
    }
    counts
}

/// Sort counted tokens by descending count, then ascending token — the
/// tie-break spec.md requires for deterministic offline-analysis output.
pub fn sorted_by_count_desc_then_token_asc(counts: &HashMap<String, u64>) -> Vec<(String, u64)> {
    let mut pairs: Vec<(String, u64)> = counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_and_lowercases() {
        let tokens: Vec<String> = tokenize("The Cat Sat; the cat").collect();
        assert_eq!(tokens, vec!["the", "cat", "sat", "the", "cat"]);
    }

    #[test]
    fn counts_and_sorts_with_tiebreak() {
        let counts = count_tokens(tokenize("the cat sat; the cat"));
        assert_eq!(counts.get("the"), Some(&2));
        assert_eq!(counts.get("cat"), Some(&2));
        assert_eq!(counts.get("sat"), Some(&1));

        let sorted = sorted_by_count_desc_then_token_asc(&counts);
        // the(2) and cat(2) tie on count, broken by ascending token
        assert_eq!(sorted, vec![
            ("cat".to_string(), 2),
            ("the".to_string(), 2),
            ("sat".to_string(), 1),
        ]);
    }

    #[test]
    fn trailing_token_without_separator_is_emitted() {
        let tokens: Vec<String> = tokenize("hello").collect();
        assert_eq!(tokens, vec!["hello"]);
    }

    #[test]
    fn empty_input_yields_no_tokens() {
        let tokens: Vec<String> = tokenize("").collect();
        assert!(tokens.is_empty());
    }

    #[test]
    fn only_separators_yields_no_tokens() {
        let tokens: Vec<String> = tokenize(";;;   ---").collect();
        assert!(tokens.is_empty());
    }

    proptest::proptest! {
        #[test]
        fn idempotent_on_rejoin(words in proptest::collection::vec("[a-z0-9]{1,8}", 0..20)) {
            let joined = words.join(" ");
            let first: Vec<String> = tokenize(&joined).collect();
            let rejoined = first.join(",");
            let second: Vec<String> = tokenize(&rejoined).collect();

            let mut a = first.clone();
            let mut b = second.clone();
            a.sort();
            b.sort();
            proptest::prop_assert_eq!(a, b);
        }
    }
}
