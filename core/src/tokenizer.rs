use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Only ASCII letters, digits and the plain space survive; everything else is deleted.
    static ref STRIP: Regex = Regex::new(r"[^a-z0-9 ]").expect("valid regex");
}

/// Tokenize one line of text: lowercase, delete non-alphanumerics, split on whitespace.
///
/// Documents and queries must go through this same function, otherwise the
/// postings and the query terms do not line up.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let stripped = STRIP.replace_all(&lowered, "");
    stripped.split_whitespace().map(str::to_string).collect()
}

/// Tokenize a sequence of lines and concatenate the terms in order.
pub fn tokenize_lines<I, S>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines.into_iter().flat_map(|line| tokenize(line.as_ref())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        assert_eq!(tokenize("The Cat, sat!"), vec!["the", "cat", "sat"]);
    }

    #[test]
    fn punctuation_is_deleted_not_split() {
        assert_eq!(tokenize("don't re-use e.g."), vec!["dont", "reuse", "eg"]);
    }

    #[test]
    fn tabs_glue_neighbours() {
        assert_eq!(tokenize("a\tb c"), vec!["ab", "c"]);
    }

    #[test]
    fn blank_and_symbol_only_lines_yield_nothing() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   ").is_empty());
        assert!(tokenize("!!! ??? ---").is_empty());
    }

    #[test]
    fn lines_concatenate_in_order() {
        let terms = tokenize_lines(["Hello world", "", "  Again, WORLD 42"]);
        assert_eq!(terms, vec!["hello", "world", "again", "world", "42"]);
    }
}
