use search_core::tokenizer::{tokenize, tokenize_lines};

#[test]
fn it_lowercases_and_strips() {
    let words = tokenize("Running Runners RUN! The café's menu.");
    // no stemming, no stopwords, non-ASCII letters are deleted
    assert_eq!(words, vec!["running", "runners", "run", "the", "cafs", "menu"]);
}

#[test]
fn it_is_idempotent() {
    let text = "  Mixed CASE, with\tpunctuation... and 123 numbers  ";
    assert_eq!(tokenize(text), tokenize(text));
    let once = tokenize(text).join(" ");
    assert_eq!(tokenize(&once), tokenize(text));
}

#[test]
fn query_and_document_rules_match() {
    let doc = tokenize_lines(["Hello, World!"]);
    let query = tokenize("hello world");
    assert_eq!(doc, query);
}
