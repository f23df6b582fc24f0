//! Org-mode to HTML rendering for note bodies.
//!
//! This is intentionally a pragmatic subset of org: headings, paragraphs, lists,
//! tables, source/quote/example blocks, inline emphasis and links. It produces:
//! 1. body HTML with every piece of text escaped
//! 2. a table of contents from the headings
//! 3. the `id:` link targets found in the body, for backlink resolution

mod inline;

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

use roamweb_shared::text::{escape_html, slugify};
use roamweb_shared::{MarkupRenderer, Node, RenderedNote, Result, RoamWebError, TitleMap, TocEntry};

use inline::InlineRenderer;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Options for org rendering.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Prefix for generated note and image URLs.
    pub base_url: String,
}

/// [`MarkupRenderer`] that reads each note's org file from disk.
#[derive(Debug, Clone, Default)]
pub struct OrgRenderer {
    opts: RenderOptions,
}

impl OrgRenderer {
    pub fn new(opts: RenderOptions) -> Self {
        Self { opts }
    }
}

impl MarkupRenderer for OrgRenderer {
    fn render_note(&self, node: &Node, titles: &TitleMap) -> Result<RenderedNote> {
        let source =
            std::fs::read_to_string(&node.file).map_err(|e| RoamWebError::io(&node.file, e))?;
        render_org(&source, titles, &self.opts)
    }
}

/// Render an org document.
///
/// Fails only on structurally broken input, such as a `#+begin_` block that
/// is never closed.
#[instrument(skip_all, fields(len = source.len()))]
pub fn render_org(source: &str, titles: &TitleMap, opts: &RenderOptions) -> Result<RenderedNote> {
    let mut doc = DocumentBuilder::new(titles, &opts.base_url);
    let lines: Vec<&str> = source.lines().collect();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim();

        if trimmed.is_empty() {
            doc.flush();
            i += 1;
            continue;
        }

        if let Some(keyword) = keyword(trimmed) {
            match keyword {
                Keyword::Title(title) => {
                    if doc.title.is_none() {
                        doc.title = Some(title.to_string());
                    }
                }
                Keyword::BeginBlock(kind, arg) => {
                    let end = find_block_end(&lines, i, kind)?;
                    doc.flush();
                    doc.block(kind, arg, &lines[i + 1..end]);
                    i = end + 1;
                    continue;
                }
                Keyword::Other => {}
            }
            i += 1;
            continue;
        }

        if is_drawer_start(trimmed) {
            // Property drawers hold metadata, never content.
            let end = lines[i + 1..]
                .iter()
                .position(|l| l.trim().eq_ignore_ascii_case(":END:"))
                .map(|p| i + 1 + p)
                .ok_or_else(|| {
                    RoamWebError::parse(format!("unterminated drawer starting at line {}", i + 1))
                })?;
            i = end + 1;
            continue;
        }

        if trimmed.starts_with("# ") || trimmed == "#" {
            i += 1;
            continue;
        }

        if let Some((level, text)) = heading(line) {
            doc.flush();
            doc.heading(level, text);
        } else if is_rule(trimmed) {
            doc.flush();
            doc.html.push_str("<hr>\n");
        } else if trimmed.starts_with('|') {
            doc.flush_paragraph();
            doc.close_list();
            doc.table_rows.push(trimmed);
        } else if let Some((kind, text)) = list_item(line) {
            doc.flush_paragraph();
            doc.flush_table();
            doc.list_item(kind, text);
        } else if doc.list.is_some() && line.starts_with(char::is_whitespace) {
            doc.continue_list_item(trimmed);
        } else {
            doc.close_list();
            doc.flush_table();
            doc.paragraph.push(trimmed);
        }
        i += 1;
    }
    doc.flush();

    debug!(
        headings = doc.toc.len(),
        links = doc.inline.links.len(),
        "org rendering complete"
    );

    Ok(RenderedNote {
        title: doc.title,
        html: doc.html,
        toc: doc.toc,
        links: doc.inline.links,
    })
}

// ---------------------------------------------------------------------------
// Line classification
// ---------------------------------------------------------------------------

enum Keyword<'a> {
    Title(&'a str),
    BeginBlock(&'a str, &'a str),
    Other,
}

fn keyword(trimmed: &str) -> Option<Keyword<'_>> {
    let rest = trimmed.strip_prefix("#+")?;
    let (name, value) = rest.split_once([':', ' ']).unwrap_or((rest, ""));
    let value = value.trim();

    if name.eq_ignore_ascii_case("title") {
        return Some(Keyword::Title(value));
    }
    if name.len() > 6 && name.is_char_boundary(6) && name[..6].eq_ignore_ascii_case("begin_") {
        return Some(Keyword::BeginBlock(&name[6..], value));
    }
    Some(Keyword::Other)
}

fn find_block_end(lines: &[&str], start: usize, kind: &str) -> Result<usize> {
    let end_marker = format!("#+end_{kind}");
    lines[start + 1..]
        .iter()
        .position(|l| l.trim().eq_ignore_ascii_case(&end_marker))
        .map(|p| start + 1 + p)
        .ok_or_else(|| {
            RoamWebError::parse(format!(
                "unterminated #+begin_{kind} block starting at line {}",
                start + 1
            ))
        })
}

fn is_drawer_start(trimmed: &str) -> bool {
    static DRAWER_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^:[A-Za-z_-]+:$").expect("valid regex"));
    DRAWER_RE.is_match(trimmed) && !trimmed.eq_ignore_ascii_case(":END:")
}

/// `** Heading text :tag1:tag2:` → `(2, "Heading text")`.
fn heading(line: &str) -> Option<(usize, &str)> {
    static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^(\*+)\s+(.*?)(?:\s+:[\w@#%:]+:)?\s*$").expect("valid regex")
    });

    let caps = HEADING_RE.captures(line)?;
    let level = caps.get(1)?.as_str().len();
    let text = caps.get(2)?.as_str();
    Some((level, text))
}

fn is_rule(trimmed: &str) -> bool {
    trimmed.len() >= 5 && trimmed.chars().all(|c| c == '-')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Unordered,
    Ordered,
}

impl ListKind {
    fn tag(self) -> &'static str {
        match self {
            ListKind::Unordered => "ul",
            ListKind::Ordered => "ol",
        }
    }
}

fn list_item(line: &str) -> Option<(ListKind, &str)> {
    static ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^\s*(?:([-+])|(\d+)[.)])\s+(.*)$").expect("valid regex")
    });

    let caps = ITEM_RE.captures(line)?;
    let kind = if caps.get(1).is_some() {
        ListKind::Unordered
    } else {
        ListKind::Ordered
    };
    Some((kind, caps.get(3)?.as_str()))
}

// ---------------------------------------------------------------------------
// Document builder
// ---------------------------------------------------------------------------

struct DocumentBuilder<'a> {
    inline: InlineRenderer<'a>,
    title: Option<String>,
    html: String,
    toc: Vec<TocEntry>,
    anchors: HashMap<String, usize>,
    paragraph: Vec<&'a str>,
    list: Option<(ListKind, Vec<String>)>,
    table_rows: Vec<&'a str>,
}

impl<'a> DocumentBuilder<'a> {
    fn new(titles: &'a TitleMap, base_url: &'a str) -> Self {
        Self {
            inline: InlineRenderer::new(titles, base_url),
            title: None,
            html: String::new(),
            toc: Vec::new(),
            anchors: HashMap::new(),
            paragraph: Vec::new(),
            list: None,
            table_rows: Vec::new(),
        }
    }

    fn flush(&mut self) {
        self.flush_paragraph();
        self.close_list();
        self.flush_table();
    }

    fn flush_paragraph(&mut self) {
        if self.paragraph.is_empty() {
            return;
        }
        let text = self.paragraph.join(" ");
        self.paragraph.clear();
        let body = self.inline.render(&text);
        self.html.push_str(&format!("<p>{body}</p>\n"));
    }

    fn heading(&mut self, level: usize, text: &str) {
        let anchor = self.unique_anchor(text);
        let tag = (level + 1).min(6);
        let body = self.inline.render(text);
        self.html
            .push_str(&format!("<h{tag} id=\"{anchor}\">{body}</h{tag}>\n"));
        self.toc.push(TocEntry {
            level,
            title: text.to_string(),
            anchor,
        });
    }

    fn unique_anchor(&mut self, text: &str) -> String {
        let mut base = slugify(text);
        if base.is_empty() {
            base = "section".to_string();
        }
        let seen = self.anchors.entry(base.clone()).or_insert(0);
        *seen += 1;
        if *seen == 1 {
            base
        } else {
            format!("{base}-{seen}")
        }
    }

    fn list_item(&mut self, kind: ListKind, text: &str) {
        if self.list.as_ref().is_some_and(|(k, _)| *k != kind) {
            self.close_list();
        }
        let rendered = self.inline.render(text);
        self.list
            .get_or_insert_with(|| (kind, Vec::new()))
            .1
            .push(rendered);
    }

    fn continue_list_item(&mut self, text: &str) {
        let rendered = self.inline.render(text);
        if let Some(last) = self.list.as_mut().and_then(|(_, items)| items.last_mut()) {
            last.push(' ');
            last.push_str(&rendered);
        }
    }

    fn close_list(&mut self) {
        let Some((kind, items)) = self.list.take() else {
            return;
        };
        let tag = kind.tag();
        self.html.push_str(&format!("<{tag}>\n"));
        for item in items {
            self.html.push_str(&format!("<li>{item}</li>\n"));
        }
        self.html.push_str(&format!("</{tag}>\n"));
    }

    fn flush_table(&mut self) {
        if self.table_rows.is_empty() {
            return;
        }
        let rows = std::mem::take(&mut self.table_rows);
        let has_header = rows.get(1).is_some_and(|r| is_table_rule(r));

        self.html.push_str("<table>\n");
        for (idx, row) in rows.iter().enumerate() {
            if is_table_rule(row) {
                continue;
            }
            let cell_tag = if has_header && idx == 0 { "th" } else { "td" };
            self.html.push_str("<tr>");
            for cell in row.trim_matches('|').split('|') {
                let body = self.inline.render(cell.trim());
                self.html
                    .push_str(&format!("<{cell_tag}>{body}</{cell_tag}>"));
            }
            self.html.push_str("</tr>\n");
        }
        self.html.push_str("</table>\n");
    }

    fn block(&mut self, kind: &str, arg: &str, body: &[&str]) {
        let text = body.join("\n");
        match kind.to_ascii_lowercase().as_str() {
            "src" => {
                let lang = arg.split_whitespace().next().unwrap_or("");
                let class = if lang.is_empty() {
                    String::new()
                } else {
                    format!(" class=\"language-{}\"", escape_html(lang))
                };
                self.html.push_str(&format!(
                    "<pre><code{class}>{}</code></pre>\n",
                    escape_html(&text)
                ));
            }
            "example" | "export" => {
                self.html
                    .push_str(&format!("<pre>{}</pre>\n", escape_html(&text)));
            }
            "quote" => {
                let paragraphs: Vec<String> = text
                    .split("\n\n")
                    .filter(|p| !p.trim().is_empty())
                    .map(|p| {
                        let joined = p.lines().map(str::trim).collect::<Vec<_>>().join(" ");
                        format!("<p>{}</p>", self.inline.render(&joined))
                    })
                    .collect();
                self.html.push_str(&format!(
                    "<blockquote>\n{}\n</blockquote>\n",
                    paragraphs.join("\n")
                ));
            }
            other => {
                let joined = body.iter().map(|l| l.trim()).collect::<Vec<_>>().join(" ");
                let rendered = self.inline.render(&joined);
                self.html.push_str(&format!(
                    "<div class=\"{}\">{rendered}</div>\n",
                    escape_html(other)
                ));
            }
        }
    }
}

fn is_table_rule(row: &str) -> bool {
    row.starts_with("|-")
}
