//! End-to-end tests for the chat scanning pipeline: tokenization, link
//! detection and ordering guarantees.

use ghbot::scan::{is_candidate_url, scan_for_links, tokenize};
use proptest::prelude::*;

#[test]
fn sentence_with_one_link_yields_exactly_that_link() {
    let links = scan_for_links("check this http://example.com/x out");
    assert_eq!(links, vec!["http://example.com/x"]);
}

#[test]
fn sentence_with_two_links_yields_both_in_order() {
    let links = scan_for_links("see https://a.test and http://b.test");
    assert_eq!(links, vec!["https://a.test", "http://b.test"]);
}

#[test]
fn link_only_message_is_detected() {
    assert_eq!(
        scan_for_links("https://example.com"),
        vec!["https://example.com"]
    );
}

#[test]
fn case_variants_are_detected() {
    let links = scan_for_links("HTTP://LOUD.example and Https://mixed.example");
    assert_eq!(links, vec!["HTTP://LOUD.example", "Https://mixed.example"]);
}

#[test]
fn empty_and_linkless_messages_yield_nothing() {
    assert!(scan_for_links("").is_empty());
    assert!(scan_for_links("   ").is_empty());
    assert!(scan_for_links("no links here, move along").is_empty());
}

#[test]
fn schemes_embedded_mid_token_are_not_links() {
    assert!(scan_for_links("see example.com/http://nested").is_empty());
}

proptest! {
    #[test]
    fn tokens_with_link_prefix_are_always_candidates(
        rest in "[!-~]{0,20}"
    ) {
        let http = format!("http:{}", rest);
        let https = format!("https:{}", rest);
        prop_assert!(is_candidate_url(&http));
        prop_assert!(is_candidate_url(&https));
    }

    #[test]
    fn tokens_without_link_prefix_are_never_candidates(
        token in "[a-gi-z][!-~]{0,20}"
    ) {
        // Anything not starting with 'h' or 'H' cannot carry the prefix.
        prop_assert!(!is_candidate_url(&token));
    }

    #[test]
    fn detected_links_are_a_subsequence_of_tokens(line in ".{0,120}") {
        let tokens: Vec<&str> = tokenize(&line).collect();
        let links = scan_for_links(&line);
        let mut cursor = 0;
        for link in links {
            let position = tokens[cursor..]
                .iter()
                .position(|t| *t == link)
                .expect("every link must appear among the tokens, in order");
            cursor += position + 1;
        }
    }
}
