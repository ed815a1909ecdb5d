//! Sitemap XML reader.
//!
//! Parses sitemap documents as specified by <https://www.sitemaps.org/protocol.html>:
//! - `<sitemapindex>` documents list other sitemaps in `<sitemap><loc>` pairs
//! - `<urlset>` documents list pages in `<url>` records with `<loc>`,
//!   optional `<lastmod>` and optional `<priority>`
//!
//! Parsing builds a small element tree first so classification can be written
//! as tag-path selections (`sitemap > loc`, `url > loc`, ...).

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use sitemapper_shared::{Result, SitemapUrlEntry, SitemapperError};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One element of a parsed document.
///
/// Names are local names: `<image:loc>` becomes `loc`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    /// Local tag name.
    pub name: String,
    /// Concatenated text and CDATA directly inside this element, unescaped.
    pub text: String,
    /// Child elements in document order.
    pub children: Vec<XmlElement>,
}

/// What a sitemap document turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum SitemapDocument {
    /// A sitemap index: URLs of nested sitemap documents.
    Index(Vec<String>),
    /// A content sitemap: the pages it lists.
    Leaf(Vec<SitemapUrlEntry>),
}

impl SitemapDocument {
    /// Number of page entries (zero for an index).
    pub fn entry_count(&self) -> usize {
        match self {
            Self::Index(_) => 0,
            Self::Leaf(entries) => entries.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tree navigation
// ---------------------------------------------------------------------------

impl XmlElement {
    fn named(name: String) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    /// First direct child called `name`.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Trimmed text of the first direct child called `name`, if non-empty.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name)
            .map(|c| c.text.trim())
            .filter(|t| !t.is_empty())
    }

    /// Select this element and its descendants matching a child-combinator
    /// path: `["url", "loc"]` behaves like the CSS selector `url > loc`.
    pub fn select<'a>(&'a self, path: &[&str]) -> Vec<&'a XmlElement> {
        let mut out = Vec::new();
        if !path.is_empty() {
            self.collect_descendants(path, &mut out);
        }
        out
    }

    fn collect_descendants<'a>(&'a self, path: &[&str], out: &mut Vec<&'a XmlElement>) {
        if self.name == path[0] {
            self.collect_chain(&path[1..], out);
        }
        for child in &self.children {
            child.collect_descendants(path, out);
        }
    }

    fn collect_chain<'a>(&'a self, rest: &[&str], out: &mut Vec<&'a XmlElement>) {
        let Some((head, tail)) = rest.split_first() else {
            out.push(self);
            return;
        };
        for child in self.children.iter().filter(|c| c.name == *head) {
            child.collect_chain(tail, out);
        }
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse `text` into an element tree.
///
/// Fails with a parse error unless the text is a single well-formed root
/// element (optionally surrounded by a declaration, comments and whitespace).
pub fn parse_document(text: &str) -> Result<XmlElement> {
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            SitemapperError::parse(format!(
                "malformed XML at byte {}: {e}",
                reader.buffer_position()
            ))
        })?;

        match event {
            Event::Start(start) => {
                if root.is_some() {
                    return Err(SitemapperError::parse("multiple root elements"));
                }
                stack.push(XmlElement::named(local_name(&start)));
            }
            Event::Empty(start) => {
                let element = XmlElement::named(local_name(&start));
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                // quick-xml has already checked that the end tag matches.
                let element = stack
                    .pop()
                    .ok_or_else(|| SitemapperError::parse("unexpected closing tag"))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(t) => {
                let unescaped = t
                    .unescape()
                    .map_err(|e| SitemapperError::parse(format!("bad character data: {e}")))?;
                push_text(&mut stack, &unescaped)?;
            }
            Event::CData(c) => {
                let raw = c.into_inner();
                push_text(&mut stack, &String::from_utf8_lossy(&raw))?;
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctype.
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(SitemapperError::parse(format!(
            "unexpected end of document inside <{}>",
            open.name
        )));
    }

    root.ok_or_else(|| SitemapperError::parse("document has no root element"))
}

fn local_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

/// Hand a finished element to its parent, or make it the document root.
fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(SitemapperError::parse("multiple root elements")),
    }
    Ok(())
}

fn push_text(stack: &mut [XmlElement], text: &str) -> Result<()> {
    match stack.last_mut() {
        Some(open) => open.text.push_str(text),
        None if text.trim().is_empty() => {}
        None => return Err(SitemapperError::parse("text outside of the root element")),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classify a parsed document as an index or a leaf sitemap.
///
/// Any `sitemap > loc` reference makes the document an index. Otherwise each
/// `url` record with a non-empty `loc` becomes one entry, in document order.
/// A `priority` outside `0.0..=1.0` is dropped.
pub fn classify(root: &XmlElement) -> SitemapDocument {
    let references: Vec<String> = root
        .select(&["sitemap", "loc"])
        .into_iter()
        .map(|loc| loc.text.trim())
        .filter(|loc| !loc.is_empty())
        .map(str::to_string)
        .collect();

    if !references.is_empty() {
        return SitemapDocument::Index(references);
    }

    let entries = root
        .select(&["url"])
        .into_iter()
        .filter_map(|record| {
            let url = record.child_text("loc")?;
            Some(SitemapUrlEntry {
                url: url.to_string(),
                last_modified: record.child_text("lastmod").map(str::to_string),
                priority: record
                    .child_text("priority")
                    .and_then(|p| p.parse::<f32>().ok())
                    .filter(|p| (0.0..=1.0).contains(p)),
            })
        })
        .collect();

    SitemapDocument::Leaf(entries)
}

/// Parse and classify in one step.
pub fn read_sitemap(text: &str) -> Result<SitemapDocument> {
    let root = parse_document(text)?;
    Ok(classify(&root))
}
