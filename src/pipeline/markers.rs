//! The illustration-marker protocol: syntax, extraction, and replacement.
//!
//! An augmented document carries markers of the form
//!
//! ```text
//! <!-- illustration: a tall ship heeling into a storm swell -->
//! ```
//!
//! one per line. Extraction pulls the descriptions out in document order;
//! replacement later swaps each marker for a block-level `<img>` reference
//! once its image exists. A marker whose image could not be produced stays
//! verbatim in the text.

/// Opening token of an illustration marker.
pub const MARKER_OPEN: &str = "<!-- illustration:";

/// Closing delimiter of an illustration marker.
pub const MARKER_CLOSE: &str = "-->";

/// Extract marker descriptions in document order.
///
/// The scan is line-based: on each line containing [`MARKER_OPEN`], the text
/// between the token and the next [`MARKER_CLOSE`] on that same line is
/// captured and trimmed. Duplicates are preserved, order is first occurrence
/// in document order.
///
/// Markers that span lines are not recognised, nor is a line whose closing
/// delimiter is missing; at most one marker is captured per line. These are
/// documented limitations of the protocol, not parse errors.
pub fn extract_descriptions(content: &str) -> Vec<String> {
    let mut descriptions = Vec::new();
    for line in content.lines() {
        if let Some(start) = line.find(MARKER_OPEN) {
            let rest = &line[start + MARKER_OPEN.len()..];
            if let Some(end) = rest.find(MARKER_CLOSE) {
                descriptions.push(rest[..end].trim().to_string());
            }
        }
    }
    descriptions
}

/// Canonical textual form of the marker for a description.
///
/// Replacement matches this exact string — single spaces between the
/// delimiters and the description — which is what a service following the
/// instruction template emits.
pub fn marker_token(description: &str) -> String {
    format!("{MARKER_OPEN} {description} {MARKER_CLOSE}")
}

/// Escape a description for use inside a single-quoted attribute value.
pub fn escape_attribute(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// The block-level image reference that replaces a marker.
///
/// `src` is a path relative to the document (no escaping needed: it is
/// always `Images/illustration_<index>.png`); the description becomes the
/// escaped `alt` text.
pub fn image_tag(src: &str, description: &str) -> String {
    format!(
        "<p><img src='{src}' alt='{}' /></p>",
        escape_attribute(description)
    )
}

/// Replace the first remaining occurrence of the canonical marker for
/// `description` with an image reference to `src`.
///
/// Returns `None` when the canonical token does not occur in `content`,
/// which happens when the service emitted non-canonical spacing inside the
/// comment. Callers invoke this exactly once per extracted occurrence, in
/// extraction order, so duplicate descriptions resolve one occurrence per
/// call without double-substitution.
pub fn replace_marker(content: &str, description: &str, src: &str) -> Option<String> {
    let token = marker_token(description);
    let pos = content.find(&token)?;
    let mut out = String::with_capacity(content.len() + 64);
    out.push_str(&content[..pos]);
    out.push_str(&image_tag(src, description));
    out.push_str(&content[pos + token.len()..]);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_single_marker() {
        let text = "<p>before</p>\n<!-- illustration: a dragon over the bay -->\n<p>after</p>";
        assert_eq!(extract_descriptions(text), vec!["a dragon over the bay"]);
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let text = "<!-- illustration:    a quiet harbour at dawn   -->";
        assert_eq!(extract_descriptions(text), vec!["a quiet harbour at dawn"]);
    }

    #[test]
    fn preserves_duplicates_in_document_order() {
        let text = "\
<!-- illustration: first scene -->
<p>middle</p>
<!-- illustration: second scene -->
<!-- illustration: first scene -->";
        assert_eq!(
            extract_descriptions(text),
            vec!["first scene", "second scene", "first scene"]
        );
    }

    #[test]
    fn marker_split_across_lines_is_not_recognised() {
        let text = "<!-- illustration: a scene\nthat continues here -->";
        assert!(extract_descriptions(text).is_empty());
    }

    #[test]
    fn unterminated_marker_is_not_recognised() {
        let text = "<!-- illustration: never closed\n<p>more</p>";
        assert!(extract_descriptions(text).is_empty());
    }

    #[test]
    fn at_most_one_marker_per_line() {
        let text = "<!-- illustration: one --> <!-- illustration: two -->";
        assert_eq!(extract_descriptions(text), vec!["one"]);
    }

    #[test]
    fn other_comments_are_ignored() {
        let text = "<!-- note: not an illustration -->\n<!-- page 3 -->";
        assert!(extract_descriptions(text).is_empty());
    }

    #[test]
    fn round_trip_single_marker() {
        let desc = "a lighthouse beam sweeping across dark water";
        let text = format!("<p>intro</p>\n{}\n<p>outro</p>", marker_token(desc));

        let extracted = extract_descriptions(&text);
        assert_eq!(extracted, vec![desc]);

        let replaced = replace_marker(&text, desc, "Images/illustration_0.png").unwrap();
        assert!(!replaced.contains(MARKER_OPEN));
        assert_eq!(replaced.matches("<img").count(), 1);
        assert!(replaced.contains("src='Images/illustration_0.png'"));
        assert!(replaced.contains(&format!("alt='{desc}'")));
    }

    #[test]
    fn replaces_first_occurrence_only() {
        let desc = "the same scene";
        let token = marker_token(desc);
        let text = format!("{token}\n<p>between</p>\n{token}");

        let once = replace_marker(&text, desc, "Images/illustration_0.png").unwrap();
        assert_eq!(once.matches("<img").count(), 1);
        assert_eq!(once.matches(&token).count(), 1);
        assert!(once.find("<img").unwrap() < once.find(&token).unwrap());

        let twice = replace_marker(&once, desc, "Images/illustration_1.png").unwrap();
        assert_eq!(twice.matches("<img").count(), 2);
        assert!(!twice.contains(&token));
    }

    #[test]
    fn replacement_escapes_attribute_characters() {
        let desc = r#"fish & chips, "fresh" <daily> at the sailor's rest"#;
        let text = marker_token(desc);

        let replaced = replace_marker(&text, desc, "Images/illustration_2.png").unwrap();
        assert!(replaced.contains("&amp;"));
        assert!(replaced.contains("&quot;fresh&quot;"));
        assert!(replaced.contains("&lt;daily&gt;"));
        assert!(replaced.contains("sailor&#39;s"));
        assert!(!replaced.contains(MARKER_OPEN));
    }

    #[test]
    fn replace_requires_canonical_spacing() {
        // Extraction tolerates missing spaces; replacement does not, because
        // it matches the canonical token exactly.
        let text = "<!-- illustration:a cramped marker -->";
        assert_eq!(extract_descriptions(text), vec!["a cramped marker"]);
        assert!(replace_marker(text, "a cramped marker", "Images/illustration_0.png").is_none());
    }

    #[test]
    fn escape_attribute_passes_plain_text_through() {
        assert_eq!(escape_attribute("plain text 123"), "plain text 123");
    }
}
