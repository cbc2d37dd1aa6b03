//! Minimal tag scanner for pulling text out of server-rendered HTML.
//!
//! Tags are tokenized with a regex, then a single pass over the tokens assigns
//! each element its parent and end the way browsers do for sloppy markup:
//! optional end tags (`</p>`, `</li>`, ...) are implied by the next tag that
//! cannot nest inside, and end tags that close nothing are ignored. That is
//! enough to answer where an element ends, which tags are its descendants,
//! which elements follow it at the same level, and what its text is.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)<!--.*?-->|<![^>]*>|<\?[^>]*>|<(/?)([A-Za-z][A-Za-z0-9:-]*)((?:[^>"']|"[^"]*"|'[^']*')*)>"#,
    )
    .expect("tag pattern is valid")
});

static MARKUP_DECL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!--.*?-->|<![^>]*>|<\?[^>]*>").expect("declaration pattern is valid")
});

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("attribute pattern is valid")
});

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});").expect("entity pattern is valid")
});

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Start tags that end an open `<p>`.
const CLOSES_PARAGRAPH: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "details", "dialog", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "hgroup", "hr", "li", "main", "menu", "nav", "ol", "p", "pre", "section", "table",
    "ul",
];

/// Elements an implied end tag may reach through.
const PHRASING_ELEMENTS: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "cite", "code", "data", "dfn", "em", "font", "i", "kbd",
    "label", "mark", "q", "s", "samp", "small", "span", "strong", "sub", "sup", "time", "u",
    "var",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Open,
    Close,
    SelfClosing,
}

#[derive(Debug, Clone)]
pub struct Tag {
    pub name: String,
    pub kind: TagKind,
    pub attrs: Vec<(String, String)>,
    /// Byte offset of `<`.
    pub start: usize,
    /// Byte offset just past `>`.
    pub end: usize,
}

impl Tag {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|classes| classes.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    fn is_leaf(&self) -> bool {
        self.kind == TagKind::SelfClosing || VOID_ELEMENTS.contains(&self.name.as_str())
    }
}

/// Whether the start tag `next` implicitly ends an open `open` element.
fn implies_end(open: &str, next: &str) -> bool {
    match open {
        "p" => CLOSES_PARAGRAPH.contains(&next),
        "li" => next == "li",
        "dt" | "dd" => matches!(next, "dt" | "dd"),
        "option" => matches!(next, "option" | "optgroup"),
        "optgroup" => next == "optgroup",
        "tr" => next == "tr",
        "td" | "th" => matches!(next, "td" | "th" | "tr"),
        _ => false,
    }
}

/// Parent links and element extents, indexed like the tag list.
#[derive(Debug)]
struct Structure {
    parents: Vec<Option<usize>>,
    /// First tag index past the element: its end tag, or the tag that implied its end.
    ends: Vec<usize>,
    closes: Vec<Option<usize>>,
}

impl Structure {
    fn build(tags: &[Tag]) -> Self {
        let mut structure = Self {
            parents: vec![None; tags.len()],
            ends: (1..=tags.len()).collect(),
            closes: vec![None; tags.len()],
        };
        let mut open: Vec<usize> = Vec::new();

        for (i, tag) in tags.iter().enumerate() {
            if tag.kind == TagKind::Close {
                // End tags that match no open element are dropped.
                if let Some(pos) = open.iter().rposition(|&o| tags[o].name == tag.name) {
                    structure.closes[open[pos]] = Some(i);
                    for element in open.drain(pos..) {
                        structure.ends[element] = i;
                    }
                }
                continue;
            }

            while let Some(pos) = Self::implied_end(tags, &open, &tag.name) {
                for element in open.drain(pos..) {
                    structure.ends[element] = i;
                }
            }

            structure.parents[i] = open.last().copied();
            if !tag.is_leaf() {
                open.push(i);
            }
        }

        for element in open {
            structure.ends[element] = tags.len();
        }
        structure
    }

    /// Stack position of an open element that the start tag `next` ends, looking
    /// down through phrasing elements only.
    fn implied_end(tags: &[Tag], open: &[usize], next: &str) -> Option<usize> {
        for (pos, &element) in open.iter().enumerate().rev() {
            let name = tags[element].name.as_str();
            if implies_end(name, next) {
                return Some(pos);
            }
            if !PHRASING_ELEMENTS.contains(&name) {
                return None;
            }
        }
        None
    }
}

/// A tokenized HTML page. Elements are addressed by the index of their opening tag.
#[derive(Debug)]
pub struct Document<'a> {
    source: &'a str,
    tags: Vec<Tag>,
    structure: Structure,
}

impl<'a> Document<'a> {
    pub fn parse(source: &'a str) -> Self {
        let mut tags = Vec::new();
        let mut pos = 0;

        while let Some(caps) = TAG_RE.captures_at(source, pos) {
            let whole = caps.get(0).expect("group 0 always matches");
            pos = whole.end();

            // Comments, doctypes and processing instructions carry no element.
            let Some(name) = caps.get(2) else {
                continue;
            };
            let name = name.as_str().to_ascii_lowercase();
            let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
            let raw_attrs = caps.get(3).map(|m| m.as_str()).unwrap_or_default();

            let kind = if closing {
                TagKind::Close
            } else if raw_attrs.trim_end().ends_with('/') {
                TagKind::SelfClosing
            } else {
                TagKind::Open
            };

            let attrs = if closing {
                Vec::new()
            } else {
                parse_attrs(raw_attrs.trim_end().trim_end_matches('/'))
            };

            let is_raw_text = kind == TagKind::Open && RAW_TEXT_ELEMENTS.contains(&name.as_str());
            tags.push(Tag {
                name: name.clone(),
                kind,
                attrs,
                start: whole.start(),
                end: whole.end(),
            });

            // Skip straight to the closing tag so markup inside scripts is not tokenized.
            if is_raw_text {
                let closing_tag = format!("</{}", name);
                let rest = source[pos..].to_ascii_lowercase();
                match rest.find(&closing_tag) {
                    Some(offset) => pos += offset,
                    None => break,
                }
            }
        }

        let structure = Structure::build(&tags);
        Self {
            source,
            tags,
            structure,
        }
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn tag(&self, index: usize) -> &Tag {
        &self.tags[index]
    }

    /// First opening tag at or after `from` that satisfies `predicate`.
    pub fn find_from<F>(&self, from: usize, predicate: F) -> Option<usize>
    where
        F: Fn(&Tag) -> bool,
    {
        (from..self.tags.len()).find(|&i| self.tags[i].kind != TagKind::Close && predicate(&self.tags[i]))
    }

    pub fn find<F>(&self, predicate: F) -> Option<usize>
    where
        F: Fn(&Tag) -> bool,
    {
        self.find_from(0, predicate)
    }

    /// Index of the end tag closing `index`. `None` for leaves and for
    /// elements whose end is implied or missing.
    pub fn closing_tag(&self, index: usize) -> Option<usize> {
        self.structure.closes[index]
    }

    /// Index of the enclosing element's opening tag.
    pub fn parent(&self, index: usize) -> Option<usize> {
        self.structure.parents[index]
    }

    /// Range of tag indices strictly inside the element at `index`.
    pub fn descendants(&self, index: usize) -> std::ops::Range<usize> {
        index + 1..self.structure.ends[index].max(index + 1)
    }

    /// Opening tags of the elements that follow `index` under the same parent.
    pub fn next_siblings(&self, index: usize) -> Vec<usize> {
        let parent = self.parent(index);
        let limit = parent.map_or(self.tags.len(), |p| self.structure.ends[p]);
        (self.structure.ends[index].max(index + 1)..limit)
            .filter(|&i| self.tags[i].kind != TagKind::Close && self.parent(i) == parent)
            .collect()
    }

    /// Whitespace-collapsed, entity-decoded text content of the element at `index`.
    pub fn inner_text(&self, index: usize) -> String {
        let open = &self.tags[index];
        if open.is_leaf() {
            return String::new();
        }

        let content_end = self
            .tags
            .get(self.structure.ends[index])
            .map_or(self.source.len(), |end| end.start);

        let mut text = String::new();
        let mut cursor = open.end;
        let mut i = index + 1;
        while cursor < content_end {
            let next_start = self
                .tags
                .get(i)
                .map(|t| t.start.min(content_end))
                .unwrap_or(content_end);
            if next_start > cursor {
                let gap = &self.source[cursor..next_start];
                text.push_str(&MARKUP_DECL_RE.replace_all(gap, " "));
            }
            let Some(tag) = self.tags.get(i) else {
                break;
            };
            if tag.start >= content_end {
                break;
            }
            text.push(' ');
            if tag.kind == TagKind::Open && RAW_TEXT_ELEMENTS.contains(&tag.name.as_str()) {
                match self.closing_tag(i) {
                    Some(close) => {
                        cursor = self.tags[close].end;
                        i = close + 1;
                        continue;
                    }
                    None => break,
                }
            }
            cursor = tag.end;
            i += 1;
        }

        collapse_whitespace(&decode_entities(&text))
    }
}

fn parse_attrs(raw: &str) -> Vec<(String, String)> {
    ATTR_RE
        .captures_iter(raw)
        .map(|caps| {
            let name = caps[1].to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| decode_entities(m.as_str()))
                .unwrap_or_default();
            (name, value)
        })
        .collect()
}

pub fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &Captures| {
            let entity = &caps[1];
            let decoded = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match entity {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some('\u{a0}'),
                    "rupee" | "inr" => Some('₹'),
                    _ => None,
                }
            };
            decoded
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attributes_with_mixed_quoting() {
        let doc = Document::parse(
            r#"<div onclick="fnTotalPortfolioValue()" class='card  shadow' data-id=7 hidden></div>"#,
        );
        let div = doc.tag(0);

        assert_eq!(div.name, "div");
        assert_eq!(div.attr("onclick"), Some("fnTotalPortfolioValue()"));
        assert!(div.has_class("card"));
        assert!(div.has_class("shadow"));
        assert!(!div.has_class("car"));
        assert_eq!(div.attr("data-id"), Some("7"));
        assert_eq!(div.attr("hidden"), Some(""));
    }

    #[test]
    fn test_closing_tag_balances_nested_elements() {
        let doc = Document::parse("<div><div><span>a</span></div><p>b</p></div><div>c</div>");

        let outer = doc.find(|t| t.name == "div").unwrap();
        let close = doc.closing_tag(outer).unwrap();
        assert_eq!(close, 7);
        assert_eq!(doc.inner_text(outer), "a b");
    }

    #[test]
    fn test_descendants_stop_at_element_end() {
        let doc = Document::parse(
            r#"<div id="a"><span class="x">1</span></div><span class="x">2</span>"#,
        );

        let div = doc.find(|t| t.attr("id") == Some("a")).unwrap();
        let spans: Vec<String> = doc
            .descendants(div)
            .filter(|&i| doc.tag(i).name == "span" && doc.tag(i).kind == TagKind::Open)
            .map(|i| doc.inner_text(i))
            .collect();

        assert_eq!(spans, vec!["1"]);
    }

    #[test]
    fn test_next_siblings_skip_nested_and_stop_at_parent() {
        let doc = Document::parse(
            "<div><h6>Label</h6><br><section><h4>inner</h4></section><h4>value</h4></div><h4>outside</h4>",
        );

        let h6 = doc.find(|t| t.name == "h6").unwrap();
        let names: Vec<String> = doc
            .next_siblings(h6)
            .into_iter()
            .map(|i| format!("{}:{}", doc.tag(i).name, doc.inner_text(i)))
            .collect();

        assert_eq!(names, vec!["br:", "section:inner", "h4:value"]);
    }

    fn sibling_names(doc: &Document, index: usize) -> Vec<String> {
        doc.next_siblings(index)
            .into_iter()
            .map(|i| format!("{}:{}", doc.tag(i).name, doc.inner_text(i)))
            .collect()
    }

    #[test]
    fn test_unclosed_paragraph_ends_at_block_start() {
        let doc = Document::parse(
            "<div><h6>Label</h6><p>as of <b>today<h4>value</h4></div><h4>outside</h4>",
        );

        let h6 = doc.find(|t| t.name == "h6").unwrap();
        let p = doc.find(|t| t.name == "p").unwrap();

        assert_eq!(doc.inner_text(p), "as of today");
        assert_eq!(doc.closing_tag(p), None);
        assert_eq!(sibling_names(&doc, h6), vec!["p:as of today", "h4:value"]);
    }

    #[test]
    fn test_stray_end_tags_are_ignored() {
        let doc = Document::parse("<div><h6>Label</h6></span></p><h4>value</h4></div>");

        let h6 = doc.find(|t| t.name == "h6").unwrap();
        let div = doc.find(|t| t.name == "div").unwrap();

        assert_eq!(sibling_names(&doc, h6), vec!["h4:value"]);
        assert_eq!(doc.parent(h6), Some(div));
        assert_eq!(doc.inner_text(div), "Label value");
    }

    #[test]
    fn test_list_items_and_table_cells_imply_their_ends() {
        let doc = Document::parse(
            "<ul><li>one<li>two<span>!</span></ul><table><tr><td>a<td>b<tr><td>c</table>",
        );

        let first_li = doc.find(|t| t.name == "li").unwrap();
        assert_eq!(sibling_names(&doc, first_li), vec!["li:two !"]);

        let first_td = doc.find(|t| t.name == "td").unwrap();
        assert_eq!(sibling_names(&doc, first_td), vec!["td:b"]);

        let first_tr = doc.find(|t| t.name == "tr").unwrap();
        assert_eq!(sibling_names(&doc, first_tr), vec!["tr:c"]);
    }

    #[test]
    fn test_end_tag_closes_implied_children() {
        let doc = Document::parse("<div><p>one<p>two</div><span>after</span>");

        let div = doc.find(|t| t.name == "div").unwrap();
        let names: Vec<&str> = doc
            .descendants(div)
            .filter(|&i| doc.tag(i).kind == TagKind::Open)
            .map(|i| doc.tag(i).name.as_str())
            .collect();

        assert_eq!(names, vec!["p", "p"]);
        assert_eq!(sibling_names(&doc, div), vec!["span:after"]);
    }

    #[test]
    fn test_script_content_is_not_tokenized() {
        let doc = Document::parse(
            r#"<script>var s = "<span class='comma_fixed'>9</span>";</script><span class="comma_fixed">1</span>"#,
        );

        let spans: Vec<usize> = doc
            .tags()
            .iter()
            .enumerate()
            .filter(|(_, t)| t.name == "span" && t.kind == TagKind::Open)
            .map(|(i, _)| i)
            .collect();

        assert_eq!(spans.len(), 1);
        assert_eq!(doc.inner_text(spans[0]), "1");
    }

    #[test]
    fn test_comments_are_ignored() {
        let doc = Document::parse("<!-- <h6>MF Current Cost</h6> --><h6>Other</h6>");
        assert_eq!(doc.tags().len(), 2);
        assert_eq!(doc.inner_text(0), "Other");
    }

    #[test]
    fn test_inner_text_drops_comments() {
        let doc = Document::parse("<h4><!-- 9,999 -->1,000</h4>");
        assert_eq!(doc.inner_text(0), "1,000");
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("&#8377;2,000"), "₹2,000");
        assert_eq!(decode_entities("&#x20B9;&nbsp;5"), "₹\u{a0}5");
        assert_eq!(decode_entities("A &amp; B"), "A & B");
        assert_eq!(decode_entities("&unknown;"), "&unknown;");
    }

    #[test]
    fn test_inner_text_collapses_whitespace() {
        let doc = Document::parse("<h4>\n   &#8377;\n   <span>2,000</span>\n</h4>");
        assert_eq!(doc.inner_text(0), "₹ 2,000");
    }
}
