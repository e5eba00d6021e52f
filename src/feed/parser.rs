use chrono::{DateTime, Utc};
use roxmltree::{Document, Node};
use thiserror::Error;

use crate::feed::dates::normalize_date;
use crate::util::strip_html;

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
const DC_NS: &str = "http://purl.org/dc/elements/1.1/";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("feed payload is empty")]
    EmptyPayload,
    #[error("malformed feed XML: {0}")]
    Xml(#[from] roxmltree::Error),
}

/// Which syndication dialect a document speaks. Decided once per
/// document from the root element; each variant has its own extraction
/// function rather than per-field conditionals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeedDialect {
    Rss,
    Atom,
}

/// One `<item>`/`<entry>` reduced to the shape shared by both dialects,
/// with its publish date already resolved to UTC.
#[derive(Debug, Clone, PartialEq)]
pub struct RawItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub guid: String,
    pub pub_date: DateTime<Utc>,
}

/// Adapter output for one document.
#[derive(Debug)]
pub struct ParsedFeed {
    pub items: Vec<RawItem>,
    /// Items discarded because no usable publish date could be parsed.
    /// A data-quality fact about the upstream feed, not an error.
    pub dropped_dates: usize,
}

/// Field values pulled from one item before date resolution.
struct Extracted {
    title: String,
    link: String,
    description: String,
    guid: String,
    raw_date: Option<String>,
}

/// Parse raw feed bytes into normalized items.
///
/// The dialect is detected from the document root: an Atom `feed`
/// element selects Atom extraction over namespace-qualified `entry`
/// children (with an unqualified fallback for feeds that omit the
/// declaration); anything else is treated as RSS, selecting `item`
/// descendants anywhere in the document.
///
/// # Errors
///
/// Returns [`ParseError`] when the payload is empty or is not
/// well-formed XML. The caller isolates the failure to this source.
pub fn parse_feed(bytes: &[u8], source: &str) -> Result<ParsedFeed, ParseError> {
    let text = String::from_utf8_lossy(bytes);
    if text.trim().is_empty() {
        return Err(ParseError::EmptyPayload);
    }

    let doc = Document::parse(&text)?;
    let root = doc.root_element();
    let dialect = if root.tag_name().name() == "feed" {
        FeedDialect::Atom
    } else {
        FeedDialect::Rss
    };

    let nodes: Vec<Node> = match dialect {
        FeedDialect::Atom => atom_entries(root),
        FeedDialect::Rss => root
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == "item")
            .collect(),
    };

    let mut items = Vec::with_capacity(nodes.len());
    let mut dropped = 0usize;
    for node in nodes {
        let extracted = match dialect {
            FeedDialect::Rss => extract_rss(node),
            FeedDialect::Atom => extract_atom(node),
        };
        match normalize_date(extracted.raw_date.as_deref()) {
            Some(pub_date) => items.push(RawItem {
                title: extracted.title,
                link: extracted.link,
                description: extracted.description,
                guid: extracted.guid,
                pub_date,
            }),
            None => dropped += 1,
        }
    }

    tracing::debug!(
        source = %source,
        dialect = ?dialect,
        items = items.len(),
        dropped = dropped,
        "parsed feed"
    );

    Ok(ParsedFeed {
        items,
        dropped_dates: dropped,
    })
}

fn extract_rss(item: Node) -> Extracted {
    let title = first_text(item, &["title"]).unwrap_or_else(|| "(no title)".to_string());
    let link = first_text(item, &["link"]).unwrap_or_default();
    let description = first_text(item, &["description", "summary", "content"])
        .map(|d| strip_html(&d))
        .unwrap_or_default();
    let external_id = first_text(item, &["guid"]).unwrap_or_default();
    let raw_date = first_text(item, &["pubDate"])
        .or_else(|| dc_date(item))
        .or_else(|| first_text(item, &["updated", "published"]));

    let guid = dedup_key(&external_id, &link, &title);
    Extracted {
        title,
        link,
        description,
        guid,
        raw_date,
    }
}

fn extract_atom(entry: Node) -> Extracted {
    let title = atom_text(entry, "title").unwrap_or_else(|| "(no title)".to_string());
    // Atom links are self-closing with an href attribute, unlike RSS.
    let link = atom_child(entry, "link")
        .and_then(|n| n.attribute("href"))
        .map(|href| href.trim().to_string())
        .unwrap_or_default();
    let description = atom_content(entry)
        .map(|d| strip_html(&d))
        .unwrap_or_default();
    let external_id = atom_text(entry, "id").unwrap_or_default();
    let raw_date = atom_text(entry, "updated").or_else(|| atom_text(entry, "published"));

    let guid = dedup_key(&external_id, &link, &title);
    Extracted {
        title,
        link,
        description,
        guid,
        raw_date,
    }
}

/// Atom `content` carries plain text, escaped HTML, or structured XHTML
/// child elements. Structured content is flattened by concatenating
/// every descendant text node; the other forms read as ordinary text.
/// `summary` is consulted only when no `content` element exists.
fn atom_content(entry: Node) -> Option<String> {
    if let Some(content) = atom_child(entry, "content") {
        let text = if content.attribute("type") == Some("xhtml") {
            content
                .descendants()
                .filter(|n| n.is_text())
                .filter_map(|n| n.text())
                .collect::<String>()
        } else {
            content.text().unwrap_or_default().to_string()
        };
        return Some(text.trim().to_string());
    }
    atom_text(entry, "summary")
}

/// Dedup key material: external id if present, else link, else a
/// title-derived fallback, so every item yields a usable key even when
/// the source feed omits identifiers entirely.
fn dedup_key(external_id: &str, link: &str, title: &str) -> String {
    if !external_id.is_empty() {
        external_id.to_string()
    } else if !link.is_empty() {
        link.to_string()
    } else {
        format!("{title}|no-guid")
    }
}

/// Atom `entry` children of the root, namespace-qualified, falling back
/// to unqualified lookup for feeds that omit the declaration.
fn atom_entries<'a, 'i>(root: Node<'a, 'i>) -> Vec<Node<'a, 'i>> {
    let qualified: Vec<Node> = root
        .children()
        .filter(|n| {
            n.is_element()
                && n.tag_name().name() == "entry"
                && n.tag_name().namespace() == Some(ATOM_NS)
        })
        .collect();
    if !qualified.is_empty() {
        return qualified;
    }
    root.children()
        .filter(|n| n.is_element() && n.tag_name().name() == "entry")
        .collect()
}

/// First child element with the given Atom-qualified name, else the
/// unqualified name.
fn atom_child<'a, 'i>(parent: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    parent
        .children()
        .find(|n| {
            n.is_element()
                && n.tag_name().name() == name
                && n.tag_name().namespace() == Some(ATOM_NS)
        })
        .or_else(|| {
            parent.children().find(|n| {
                n.is_element()
                    && n.tag_name().name() == name
                    && n.tag_name().namespace().is_none()
            })
        })
}

fn atom_text(parent: Node, name: &str) -> Option<String> {
    atom_child(parent, name).and_then(node_text)
}

/// First non-empty text among the named children, in priority order.
fn first_text(parent: Node, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| child_by_local(parent, name).and_then(node_text))
}

fn child_by_local<'a, 'i>(parent: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    parent
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn dc_date(item: Node) -> Option<String> {
    item.children()
        .find(|n| {
            n.is_element()
                && n.tag_name().name() == "date"
                && n.tag_name().namespace() == Some(DC_NS)
        })
        .and_then(node_text)
}

/// Trimmed text content of a node; `None` when absent or empty.
fn node_text(node: Node) -> Option<String> {
    let text = node.text()?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(xml: &str) -> ParsedFeed {
        parse_feed(xml.as_bytes(), "test").unwrap()
    }

    const RSS_BASIC: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Example Status</title>
  <item>
    <title>Elevated error rates</title>
    <link>https://status.example.com/incidents/1</link>
    <description>&lt;p&gt;We are &lt;b&gt;investigating&lt;/b&gt;.&lt;/p&gt;</description>
    <guid>incident-1</guid>
    <pubDate>Mon, 02 Jan 2023 10:00:00 -0500</pubDate>
  </item>
  <item>
    <title>Maintenance window</title>
    <link>https://status.example.com/incidents/2</link>
    <description>Scheduled.</description>
    <guid>incident-2</guid>
    <pubDate>Tue, 03 Jan 2023 08:00:00 GMT</pubDate>
  </item>
</channel></rss>"#;

    #[test]
    fn rss_items_are_extracted() {
        let parsed = parse(RSS_BASIC);
        assert_eq!(parsed.items.len(), 2);
        assert_eq!(parsed.dropped_dates, 0);

        let first = &parsed.items[0];
        assert_eq!(first.title, "Elevated error rates");
        assert_eq!(first.link, "https://status.example.com/incidents/1");
        assert_eq!(first.description, "We are investigating .");
        assert_eq!(first.guid, "incident-1");
        assert_eq!(
            first.pub_date,
            normalize_date(Some("2023-01-02T15:00:00Z")).unwrap()
        );
    }

    #[test]
    fn rss_missing_title_gets_placeholder() {
        let xml = r#"<rss><channel><item>
            <link>https://example.com/a</link>
            <pubDate>Mon, 02 Jan 2023 10:00:00 GMT</pubDate>
        </item></channel></rss>"#;
        let parsed = parse(xml);
        assert_eq!(parsed.items[0].title, "(no title)");
    }

    #[test]
    fn rss_guid_falls_back_to_link_then_title() {
        let xml = r#"<rss><channel>
          <item>
            <title>Linked</title>
            <link>https://example.com/a</link>
            <pubDate>Mon, 02 Jan 2023 10:00:00 GMT</pubDate>
          </item>
          <item>
            <title>Bare</title>
            <pubDate>Mon, 02 Jan 2023 11:00:00 GMT</pubDate>
          </item>
        </channel></rss>"#;
        let parsed = parse(xml);
        assert_eq!(parsed.items[0].guid, "https://example.com/a");
        assert_eq!(parsed.items[1].guid, "Bare|no-guid");
    }

    #[test]
    fn rss_description_priority_falls_through_summary_then_content() {
        let xml = r#"<rss><channel>
          <item>
            <title>A</title>
            <summary>From summary</summary>
            <content>From content</content>
            <pubDate>Mon, 02 Jan 2023 10:00:00 GMT</pubDate>
          </item>
          <item>
            <title>B</title>
            <content>Only content</content>
            <pubDate>Mon, 02 Jan 2023 11:00:00 GMT</pubDate>
          </item>
        </channel></rss>"#;
        let parsed = parse(xml);
        assert_eq!(parsed.items[0].description, "From summary");
        assert_eq!(parsed.items[1].description, "Only content");
    }

    #[test]
    fn rss_dc_date_is_recognized() {
        let xml = r#"<rss xmlns:dc="http://purl.org/dc/elements/1.1/"><channel>
          <item>
            <title>DC dated</title>
            <dc:date>2023-01-02T10:00:00Z</dc:date>
          </item>
        </channel></rss>"#;
        let parsed = parse(xml);
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(
            parsed.items[0].pub_date,
            normalize_date(Some("2023-01-02T10:00:00Z")).unwrap()
        );
    }

    #[test]
    fn rss_item_without_parseable_date_is_dropped() {
        let xml = r#"<rss><channel>
          <item><title>Undated</title><guid>u1</guid></item>
          <item><title>Bad date</title><guid>u2</guid><pubDate>soonish</pubDate></item>
          <item><title>Dated</title><guid>u3</guid><pubDate>Mon, 02 Jan 2023 10:00:00 GMT</pubDate></item>
        </channel></rss>"#;
        let parsed = parse(xml);
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.items[0].guid, "u3");
        assert_eq!(parsed.dropped_dates, 2);
    }

    const ATOM_BASIC: &str = r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Example Status</title>
  <entry>
    <title>Degraded performance</title>
    <link href="https://status.example.com/incidents/9"/>
    <id>tag:example.com,2023:9</id>
    <updated>2023-01-02T10:00:00+02:00</updated>
    <summary>Investigating slow responses.</summary>
  </entry>
</feed>"#;

    #[test]
    fn atom_entries_are_extracted() {
        let parsed = parse(ATOM_BASIC);
        assert_eq!(parsed.items.len(), 1);

        let entry = &parsed.items[0];
        assert_eq!(entry.title, "Degraded performance");
        // href attribute, not element text
        assert_eq!(entry.link, "https://status.example.com/incidents/9");
        assert_eq!(entry.guid, "tag:example.com,2023:9");
        assert_eq!(entry.description, "Investigating slow responses.");
        assert_eq!(
            entry.pub_date,
            normalize_date(Some("2023-01-02T08:00:00Z")).unwrap()
        );
    }

    #[test]
    fn atom_xhtml_content_is_flattened() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
          <entry>
            <title>Structured</title>
            <id>s1</id>
            <updated>2023-01-02T10:00:00Z</updated>
            <content type="xhtml">
              <div xmlns="http://www.w3.org/1999/xhtml">
                <p>Incident <em>resolved</em>.</p>
              </div>
            </content>
          </entry>
        </feed>"#;
        let parsed = parse(xml);
        // Tags vanish at the XML level here, so no spaces are injected.
        assert_eq!(parsed.items[0].description, "Incident resolved.");
    }

    #[test]
    fn atom_content_wins_over_summary() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
          <entry>
            <title>Both</title>
            <id>b1</id>
            <updated>2023-01-02T10:00:00Z</updated>
            <content>Primary body</content>
            <summary>Secondary</summary>
          </entry>
        </feed>"#;
        let parsed = parse(xml);
        assert_eq!(parsed.items[0].description, "Primary body");
    }

    #[test]
    fn atom_without_namespace_declaration_still_parses() {
        let xml = r#"<feed>
          <entry>
            <title>Plain</title>
            <id>p1</id>
            <updated>2023-01-02T10:00:00Z</updated>
          </entry>
        </feed>"#;
        let parsed = parse(xml);
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.items[0].guid, "p1");
    }

    #[test]
    fn atom_published_is_used_when_updated_absent() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
          <entry>
            <title>Published only</title>
            <id>p2</id>
            <published>2023-01-05T00:00:00Z</published>
          </entry>
        </feed>"#;
        let parsed = parse(xml);
        assert_eq!(
            parsed.items[0].pub_date,
            normalize_date(Some("2023-01-05T00:00:00Z")).unwrap()
        );
    }

    #[test]
    fn atom_feed_with_zero_entries_is_empty_not_an_error() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
          <title>Quiet</title>
        </feed>"#;
        let parsed = parse(xml);
        assert!(parsed.items.is_empty());
        assert_eq!(parsed.dropped_dates, 0);
    }

    #[test]
    fn malformed_xml_is_a_parse_error() {
        let result = parse_feed(b"<rss><channel><item>", "test");
        assert!(matches!(result, Err(ParseError::Xml(_))));
    }

    #[test]
    fn empty_payload_is_an_error() {
        assert!(matches!(
            parse_feed(b"", "test"),
            Err(ParseError::EmptyPayload)
        ));
        assert!(matches!(
            parse_feed(b"   \n", "test"),
            Err(ParseError::EmptyPayload)
        ));
    }
}
