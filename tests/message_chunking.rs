//! Property tests for splitting replies into Telegram-sized parts.

use oxide_relay::utils::split_long_message;
use proptest::prelude::*;

fn text_line() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9абвгдеж .,!?-]{0,160}"
}

fn line() -> impl Strategy<Value = String> {
    prop_oneof![
        8 => text_line(),
        1 => Just("```".to_string()),
        1 => Just("```rust".to_string()),
    ]
}

/// Markdown-ish document whose code fences are balanced
fn document() -> impl Strategy<Value = String> {
    prop::collection::vec(line(), 0..80).prop_map(|mut lines| {
        let fences = lines.iter().filter(|l| l.starts_with("```")).count();
        if fences % 2 == 1 {
            lines.push("```".to_string());
        }
        lines.join("\n")
    })
}

fn fence_count(part: &str) -> usize {
    part.lines()
        .filter(|l| l.trim_start().starts_with("```"))
        .count()
}

fn non_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

proptest! {
    #[test]
    fn parts_fit_the_limit(doc in document(), max in 40usize..400) {
        for part in split_long_message(&doc, max) {
            prop_assert!(part.len() <= max, "part of {} bytes exceeds {}", part.len(), max);
        }
    }

    #[test]
    fn parts_are_never_blank(doc in document(), max in 40usize..400) {
        for part in split_long_message(&doc, max) {
            prop_assert!(!part.trim().is_empty());
        }
    }

    #[test]
    fn fences_are_balanced_per_part(doc in document(), max in 40usize..400) {
        for part in split_long_message(&doc, max) {
            prop_assert_eq!(fence_count(&part) % 2, 0, "unbalanced part: {:?}", part);
        }
    }

    #[test]
    fn plain_text_is_preserved(
        lines in prop::collection::vec(text_line(), 0..60),
        max in 20usize..300,
    ) {
        let doc = lines.join("\n");
        let parts = split_long_message(&doc, max);
        prop_assert_eq!(non_whitespace(&parts.concat()), non_whitespace(&doc));
    }
}

#[test]
fn blank_input_yields_no_parts() {
    assert!(split_long_message("", 100).is_empty());
    assert!(split_long_message(" \n\n \t", 100).is_empty());
}

#[test]
fn json_reply_splits_into_valid_blocks() {
    let body: String = (0..200)
        .map(|i| format!("  \"property_{i}\": \"value number {i}\",\n"))
        .collect();
    let reply = format!("```json\n{{\n{body}}}\n```");

    let parts = split_long_message(&reply, 4000);
    assert!(parts.len() > 1);
    for part in &parts {
        assert!(part.len() <= 4000);
        assert!(part.starts_with("```"));
        assert!(part.ends_with("```"));
    }
}
