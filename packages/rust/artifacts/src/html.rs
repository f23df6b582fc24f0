//! Built-in HTML templates for the four page kinds.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use roamweb_shared::text::escape_html;
use roamweb_shared::{
    Graph, GraphView, HomeView, LinkRef, NotePreview, NoteView, Page, PageTemplates, Result,
    RoamWebError, SiteInfo, TagRef, TagView, TocEntry,
};

/// Renders pages with the bundled layout, `assets/style.css` and `assets/site.js`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlTemplates;

impl HtmlTemplates {
    pub fn new() -> Self {
        Self
    }
}

impl PageTemplates for HtmlTemplates {
    fn render(&self, page: &Page) -> Result<String> {
        let site = page.site();
        tracing::trace!(kind = page.kind(), "rendering page");
        let (title, body) = match page {
            Page::Home(view) => (site.title.clone(), home_body(view)),
            Page::Note(view) => (view.title.clone(), note_body(view)?),
            Page::Graph(view) => ("Graph".to_string(), graph_body(view)?),
            Page::Tag(view) => (format!("#{}", view.tag), tag_body(view)),
        };
        Ok(layout(site, page.kind(), &title, &body))
    }
}

fn layout(site: &SiteInfo, kind: &str, title: &str, body: &str) -> String {
    let base = &site.base_url;
    let page_title = if title == site.title {
        escape_html(title)
    } else {
        format!("{} | {}", escape_html(title), escape_html(&site.title))
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{page_title}</title>
<link rel="stylesheet" href="{base}/assets/style.css">
</head>
<body class="page-{kind}" data-base-url="{base}">
<header class="site-header">
<a class="site-title" href="{base}/index.html">{site_title}</a>
<nav>
<a href="{base}/index.html">Home</a>
<a href="{base}/graph.html">Graph</a>
</nav>
<div class="search">
<input id="search-input" type="search" placeholder="Search notes..." autocomplete="off">
<ul id="search-results"></ul>
</div>
</header>
<main>
{body}
</main>
<script src="{base}/assets/site.js"></script>
</body>
</html>
"#,
        site_title = escape_html(&site.title),
    )
}

fn home_body(view: &HomeView) -> String {
    let mut out = String::from("<h1>Recent notes</h1>\n");
    out.push_str(&preview_list(&view.site, &view.recent_notes));
    out
}

fn note_body(view: &NoteView) -> Result<String> {
    let base = &view.site.base_url;
    let mut out = String::from("<article class=\"note\">\n");
    let _ = writeln!(out, "<h1>{}</h1>", escape_html(&view.title));

    if view.date.is_some() || !view.tags.is_empty() {
        out.push_str("<div class=\"meta\">");
        if let Some(date) = view.date {
            let _ = write!(out, "<time>{}</time>", format_date(date));
        }
        out.push_str(&tag_links(base, &view.tags));
        out.push_str("</div>\n");
    }

    if !view.toc.is_empty() {
        out.push_str(&toc_html(&view.toc));
    }

    let _ = writeln!(out, "<div class=\"content\">\n{}</div>", view.content_html);
    out.push_str("</article>\n");

    if !view.links.is_empty() {
        out.push_str(&link_section(base, "Links", "links", &view.links));
    }
    if !view.backlinks.is_empty() {
        out.push_str(&link_section(base, "Backlinks", "backlinks", &view.backlinks));
    }

    if view.has_graph {
        out.push_str("<section class=\"local-graph\">\n<h2>Graph</h2>\n");
        let _ = writeln!(
            out,
            r#"<canvas class="graph" data-focus="{}"></canvas>"#,
            escape_html(&view.id)
        );
        out.push_str(&graph_data(&view.local_graph)?);
        out.push_str("</section>\n");
    }

    Ok(out)
}

fn graph_body(view: &GraphView) -> Result<String> {
    let mut out = String::from("<h1>Graph</h1>\n");

    if !view.top_tags.is_empty() || !view.all_tags.is_empty() {
        out.push_str("<div class=\"graph-filters\">\n");
        for tag in &view.top_tags {
            let _ = writeln!(
                out,
                r#"<button class="tag-filter" data-tag="{0}">#{0}</button>"#,
                escape_html(tag)
            );
        }
        out.push_str("<select id=\"tag-select\">\n<option value=\"\">All tags</option>\n");
        for tag in &view.all_tags {
            let _ = writeln!(out, r#"<option value="{0}">{0}</option>"#, escape_html(tag));
        }
        out.push_str("</select>\n</div>\n");
    }

    out.push_str("<canvas class=\"graph graph-full\"></canvas>\n");
    out.push_str(&graph_data(&view.graph)?);
    Ok(out)
}

fn tag_body(view: &TagView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "<h1>#{}</h1>", escape_html(&view.tag));
    out.push_str(&preview_list(&view.site, &view.notes));
    out
}

fn preview_list(site: &SiteInfo, notes: &[NotePreview]) -> String {
    if notes.is_empty() {
        return "<p class=\"empty\">No notes yet.</p>\n".to_string();
    }

    let mut out = String::from("<ul class=\"note-list\">\n");
    for note in notes {
        let _ = write!(
            out,
            r#"<li><a href="{}/notes/{}.html">{}</a>"#,
            site.base_url,
            escape_html(&note.id),
            escape_html(&note.title)
        );
        if let Some(date) = note.date {
            let _ = write!(out, " <time>{}</time>", format_date(date));
        }
        out.push_str(&tag_links(&site.base_url, &note.tags));
        out.push_str("</li>\n");
    }
    out.push_str("</ul>\n");
    out
}

fn tag_links(base: &str, tags: &[TagRef]) -> String {
    let mut out = String::new();
    for tag in tags {
        let _ = write!(
            out,
            r#" <a class="tag" href="{base}/tags/{}.html">#{}</a>"#,
            escape_html(&tag.slug),
            escape_html(&tag.name)
        );
    }
    out
}

fn link_section(base: &str, heading: &str, class: &str, links: &[LinkRef]) -> String {
    let mut out = format!("<section class=\"{class}\">\n<h2>{heading}</h2>\n<ul>\n");
    for link in links {
        let _ = writeln!(
            out,
            r#"<li><a href="{base}/notes/{}.html">{}</a></li>"#,
            escape_html(&link.id),
            escape_html(&link.title)
        );
    }
    out.push_str("</ul>\n</section>\n");
    out
}

fn toc_html(toc: &[TocEntry]) -> String {
    let mut out = String::from("<nav class=\"toc\">\n<ul>\n");
    for entry in toc {
        let _ = writeln!(
            out,
            r##"<li class="toc-level-{}"><a href="#{}">{}</a></li>"##,
            entry.level,
            escape_html(&entry.anchor),
            escape_html(&entry.title)
        );
    }
    out.push_str("</ul>\n</nav>\n");
    out
}

/// Embed a graph as inline JSON for `site.js`.
fn graph_data(graph: &Graph) -> Result<String> {
    let json = serde_json::to_string(graph)
        .map_err(|e| RoamWebError::Render(format!("graph serialization failed: {e}")))?;
    // `</script>` inside a title must not end the element early.
    let json = json.replace("</", "<\\/");
    Ok(format!(
        "<script type=\"application/json\" class=\"graph-data\">{json}</script>\n"
    ))
}

fn format_date(date: DateTime<Utc>) -> String {
    date.format("%b %-d, %Y").to_string()
}
