use once_cell::sync::Lazy;
use regex::Regex;

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[a-z][^>]*>").unwrap());
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Reduce a description field that may carry HTML fragments to plain text.
///
/// Status-page feeds embed markup in `description`/`content` elements
/// (escaped in RSS, structured or escaped in Atom). After the XML parser
/// has resolved entities once, the remaining text can still contain tags
/// and a second layer of entities. This decodes entities, removes tags,
/// and collapses runs of whitespace.
///
/// Plain-text input passes through unchanged apart from whitespace
/// normalization.
pub fn strip_html(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);
    let stripped = RE_TAGS.replace_all(&decoded, " ");
    let collapsed = RE_WS.replace_all(&stripped, " ");
    collapsed.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_unchanged() {
        assert_eq!(strip_html("All systems operational"), "All systems operational");
    }

    #[test]
    fn tags_are_removed() {
        assert_eq!(
            strip_html("<p>Incident <strong>resolved</strong>.</p>"),
            "Incident resolved ."
        );
    }

    #[test]
    fn escaped_markup_is_decoded_then_stripped() {
        // The second entity layer survives XML parsing in feeds that
        // double-escape their descriptions.
        assert_eq!(
            strip_html("&lt;p&gt;Scheduled maintenance&lt;/p&gt;"),
            "Scheduled maintenance"
        );
    }

    #[test]
    fn whitespace_is_collapsed() {
        assert_eq!(strip_html("  update:\n\n  monitoring  "), "update: monitoring");
    }

    #[test]
    fn empty_input_yields_empty() {
        assert_eq!(strip_html(""), "");
        assert_eq!(strip_html("   \n "), "");
    }
}
