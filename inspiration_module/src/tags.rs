//! Hashtag extraction for inspiration text.
//!
//! A tag is `#` followed by one or more non-whitespace characters. Tags may
//! appear anywhere in a message; they are pulled out in order of appearance
//! and the remaining text is returned with the gaps they leave collapsed.

use std::sync::OnceLock;

use regex::Regex;

fn tag_regex() -> &'static Regex {
    static TAG_RE: OnceLock<Regex> = OnceLock::new();
    TAG_RE.get_or_init(|| Regex::new(r"#(\S+)").expect("tag regex"))
}

/// Result of splitting free text into tags and the tag-free remainder.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedTags {
    pub tags: Vec<String>,
    pub clean_content: String,
}

/// Extract every `#tag` token from `text`.
///
/// With no tags the content is `text.trim()` untouched. When tags are
/// removed, the horizontal whitespace around each removed token collapses to
/// a single space (or nothing at a line edge) and the result is trimmed.
pub fn parse_tags(text: &str) -> ParsedTags {
    let re = tag_regex();
    let mut tags = Vec::new();
    let mut clean = String::with_capacity(text.len());
    let mut cursor = 0;

    for caps in re.captures_iter(text) {
        let (Some(whole), Some(value)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        tags.push(value.as_str().to_string());
        push_segment(&mut clean, &text[cursor..whole.start()], cursor > 0);
        cursor = whole.end();
    }

    if tags.is_empty() {
        return ParsedTags {
            tags,
            clean_content: text.trim().to_string(),
        };
    }

    push_segment(&mut clean, &text[cursor..], true);
    ParsedTags {
        tags,
        clean_content: clean.trim().to_string(),
    }
}

/// Append `segment` to `out`, joining across a removed tag with at most one
/// space. `after_tag` marks segments that directly follow a removed token.
fn push_segment(out: &mut String, segment: &str, after_tag: bool) {
    let segment = if after_tag {
        segment.trim_start_matches(is_horizontal_space)
    } else {
        segment
    };
    let trimmed_out_len = out.trim_end_matches(is_horizontal_space).len();
    out.truncate(trimmed_out_len);
    let segment = segment.trim_end_matches(is_horizontal_space);
    if segment.is_empty() {
        return;
    }
    let needs_space = !out.is_empty() && !out.ends_with('\n') && !segment.starts_with('\n');
    if needs_space {
        out.push(' ');
    }
    out.push_str(segment);
}

fn is_horizontal_space(ch: char) -> bool {
    ch.is_whitespace() && ch != '\n'
}

/// Rebuild a message from content and tags, tags appended as `#tag`.
///
/// Used when a parsed command has to be handed back to an operation that
/// takes raw text (parked-input replay, edit with new tags).
pub fn compose_text(content: &str, tags: &[String]) -> String {
    if tags.is_empty() {
        return content.to_string();
    }
    let rendered = tags
        .iter()
        .map(|tag| format!("#{}", tag))
        .collect::<Vec<_>>()
        .join(" ");
    if content.is_empty() {
        rendered
    } else {
        format!("{} {}", content, rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_tags_anywhere_in_text() {
        let parsed = parse_tags("#design sketch for the #lobby redesign");
        assert_eq!(parsed.tags, vec!["design", "lobby"]);
        assert_eq!(parsed.clean_content, "sketch for the redesign");
    }

    #[test]
    fn no_tags_returns_trimmed_text() {
        let parsed = parse_tags("  keep   spacing\n  as is  ");
        assert!(parsed.tags.is_empty());
        assert_eq!(parsed.clean_content, "keep   spacing\n  as is");
    }

    #[test]
    fn lone_hash_is_not_a_tag() {
        let parsed = parse_tags("issue # 4 and trailing#");
        assert!(parsed.tags.is_empty());
        assert_eq!(parsed.clean_content, "issue # 4 and trailing#");
    }

    #[test]
    fn tag_inside_word_captures_rest_of_token() {
        let parsed = parse_tags("color#blue#green today");
        assert_eq!(parsed.tags, vec!["blue#green"]);
        assert_eq!(parsed.clean_content, "color today");
    }

    #[test]
    fn duplicate_tags_are_kept_in_order() {
        let parsed = parse_tags("#a one #b two #a");
        assert_eq!(parsed.tags, vec!["a", "b", "a"]);
        assert_eq!(parsed.clean_content, "one two");
    }

    #[test]
    fn only_tags_leaves_empty_content() {
        let parsed = parse_tags("#x #y");
        assert_eq!(parsed.tags, vec!["x", "y"]);
        assert_eq!(parsed.clean_content, "");
    }

    #[test]
    fn removal_keeps_line_breaks() {
        let parsed = parse_tags("first line #t\nsecond line");
        assert_eq!(parsed.clean_content, "first line\nsecond line");
    }

    #[test]
    fn reinserting_tags_keeps_non_tag_tokens() {
        let original = "plan the #trip with #friends soon";
        let parsed = parse_tags(original);
        let rebuilt = compose_text(&parsed.clean_content, &parsed.tags);
        let reparsed = parse_tags(&rebuilt);
        assert_eq!(reparsed.clean_content, parsed.clean_content);
        assert_eq!(reparsed.tags, parsed.tags);
    }

    #[test]
    fn compose_text_handles_empty_parts() {
        assert_eq!(compose_text("idea", &[]), "idea");
        assert_eq!(compose_text("", &["a".to_string()]), "#a");
        assert_eq!(
            compose_text("idea", &["a".to_string(), "b".to_string()]),
            "idea #a #b"
        );
    }
}
