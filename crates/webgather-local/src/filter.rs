//! Reasoning-markup filtering for generated text.
//!
//! Local text-generation backends may annotate output with internal
//! reasoning wrapped in `<think>...</think>` tags, sometimes with the
//! opening or closing tag missing when generation is cut off. Nothing
//! between those markers belongs in caller-visible text.

const OPEN_TAG: &str = "<think>";
const CLOSE_TAG: &str = "</think>";

fn find_tag(haystack: &str, tag: &str, from: usize) -> Option<usize> {
    // Case-insensitive search without allocating a lowered copy per call
    // would complicate offsets; generated text is small, so lower once.
    haystack[from..]
        .to_ascii_lowercase()
        .find(tag)
        .map(|i| from + i)
}

/// Strip `<think>...</think>` reasoning spans from generated text.
///
/// Handles, in order:
/// - well-formed spans (repeatedly, anywhere in the text);
/// - a dangling `<think>` with no close: everything from it is dropped;
/// - an orphan leading `</think>`: the prefix up to and including it is
///   dropped (the model omitted the opener).
///
/// The result is trimmed. Pure and deterministic.
pub fn strip_reasoning(text: &str) -> String {
    let mut out = text.to_string();

    // Well-formed spans first.
    loop {
        let Some(start) = find_tag(&out, OPEN_TAG, 0) else {
            break;
        };
        match find_tag(&out, CLOSE_TAG, start + OPEN_TAG.len()) {
            Some(close) => {
                out.replace_range(start..close + CLOSE_TAG.len(), "");
            }
            None => {
                // Dangling open: generation was cut off mid-reasoning.
                out.truncate(start);
                break;
            }
        }
    }

    // Orphan close with no matching open left.
    if let Some(close) = find_tag(&out, CLOSE_TAG, 0) {
        out.replace_range(..close + CLOSE_TAG.len(), "");
    }

    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_plain_text_through() {
        assert_eq!(strip_reasoning("hello world"), "hello world");
    }

    #[test]
    fn removes_single_span() {
        assert_eq!(
            strip_reasoning("<think>internal</think>answer"),
            "answer"
        );
    }

    #[test]
    fn removes_multiple_spans() {
        assert_eq!(
            strip_reasoning("a<think>x</think>b<think>y</think>c"),
            "abc"
        );
    }

    #[test]
    fn removes_multiline_span() {
        assert_eq!(
            strip_reasoning("<think>\nstep 1\nstep 2\n</think>\nfinal"),
            "final"
        );
    }

    #[test]
    fn truncates_dangling_open() {
        assert_eq!(strip_reasoning("answer<think>never closed"), "answer");
    }

    #[test]
    fn drops_orphan_leading_close() {
        assert_eq!(strip_reasoning("leaked reasoning</think>answer"), "answer");
    }

    #[test]
    fn tag_matching_is_case_insensitive() {
        assert_eq!(strip_reasoning("<THINK>x</THINK>ok"), "ok");
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(strip_reasoning(""), "");
        assert_eq!(strip_reasoning("<think>only reasoning</think>"), "");
    }
}
