//! Inline org markup: links, code spans and emphasis.

use std::sync::LazyLock;

use regex::Regex;

use roamweb_shared::TitleMap;
use roamweb_shared::text::escape_html;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "webp"];

/// Renders inline markup for one note, collecting `id:` link targets.
pub(crate) struct InlineRenderer<'a> {
    titles: &'a TitleMap,
    base_url: &'a str,
    /// Every `id:` target seen so far, in document order.
    pub links: Vec<String>,
}

impl<'a> InlineRenderer<'a> {
    pub fn new(titles: &'a TitleMap, base_url: &'a str) -> Self {
        Self {
            titles,
            base_url,
            links: Vec::new(),
        }
    }

    /// Render one logical line (or a joined paragraph) to HTML.
    pub fn render(&mut self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() + 16);
        let mut plain = String::new();
        let mut rest = text;

        while let Some(pos) = rest.find(['[', '~', '=']) {
            let (before, from) = rest.split_at(pos);
            plain.push_str(before);
            let prev = plain.chars().next_back();

            let consumed = if from.starts_with("[[") {
                self.try_link(from)
            } else if from.starts_with('~') || from.starts_with('=') {
                try_code_span(from, prev)
            } else {
                None
            };

            match consumed {
                Some((html, len)) => {
                    out.push_str(&emphasize(&plain));
                    plain.clear();
                    out.push_str(&html);
                    rest = &from[len..];
                }
                None => {
                    let ch_len = from.chars().next().map_or(1, char::len_utf8);
                    plain.push_str(&from[..ch_len]);
                    rest = &from[ch_len..];
                }
            }
        }
        plain.push_str(rest);
        out.push_str(&emphasize(&plain));
        out
    }

    /// `[[target]]` or `[[target][description]]`.
    fn try_link(&mut self, s: &str) -> Option<(String, usize)> {
        static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^\[\[([^\]]+)\](?:\[([^\]]+)\])?\]").expect("valid regex")
        });

        let caps = LINK_RE.captures(s)?;
        let len = caps.get(0)?.end();
        let target = caps.get(1)?.as_str();
        let desc = caps.get(2).map(|m| m.as_str());

        Some((self.link_html(target, desc), len))
    }

    fn link_html(&mut self, target: &str, desc: Option<&str>) -> String {
        if let Some(id) = target.strip_prefix("id:") {
            self.links.push(id.to_string());
            return match self.titles.get(id) {
                Some(title) => format!(
                    r#"<a class="internal" href="{}/notes/{}.html">{}</a>"#,
                    self.base_url,
                    escape_html(id),
                    escape_html(desc.unwrap_or(title)),
                ),
                None => format!(
                    r#"<span class="unpublished">{}</span>"#,
                    escape_html(desc.unwrap_or(id))
                ),
            };
        }

        if target.starts_with("http://") || target.starts_with("https://") {
            if desc.is_none() && is_image(target) {
                return format!(r#"<img src="{}" alt="">"#, escape_html(target));
            }
            return format!(
                r#"<a class="external" href="{}" rel="noopener">{}</a>"#,
                escape_html(target),
                escape_html(desc.unwrap_or(target)),
            );
        }

        if let Some(path) = target.strip_prefix("file:") {
            if is_image(path) {
                let src = image_src(path);
                return format!(
                    r#"<img src="{}/{}" alt="{}">"#,
                    self.base_url,
                    escape_html(&src),
                    escape_html(desc.unwrap_or("")),
                );
            }
        }

        escape_html(desc.unwrap_or(target))
    }
}

/// `~code~` or `=verbatim=`, only when the marker starts a word.
fn try_code_span(s: &str, prev: Option<char>) -> Option<(String, usize)> {
    if prev.is_some_and(|c| c.is_alphanumeric()) {
        return None;
    }

    let marker = s.chars().next()?;
    let body = &s[1..];
    let end = body.find(marker)?;
    if end == 0 {
        return None;
    }

    let inner = &body[..end];
    if inner.starts_with(char::is_whitespace) || inner.ends_with(char::is_whitespace) {
        return None;
    }

    let after = body[end + 1..].chars().next();
    if after.is_some_and(|c| c.is_alphanumeric()) {
        return None;
    }

    Some((
        format!("<code>{}</code>", escape_html(inner)),
        end + 2,
    ))
}

/// Escape plain text, then apply `*bold*`, `/italic/` and `+strike+`.
fn emphasize(text: &str) -> String {
    static BOLD_RE: LazyLock<Regex> = LazyLock::new(|| emphasis_regex(r"\*"));
    static ITALIC_RE: LazyLock<Regex> = LazyLock::new(|| emphasis_regex("/"));
    static STRIKE_RE: LazyLock<Regex> = LazyLock::new(|| emphasis_regex(r"\+"));

    let mut html = escape_html(text);
    for (re, tag) in [(&*BOLD_RE, "strong"), (&*ITALIC_RE, "em"), (&*STRIKE_RE, "del")] {
        // Twice, since adjacent spans share the separator between them.
        for _ in 0..2 {
            html = re
                .replace_all(&html, format!("${{pre}}<{tag}>${{body}}</{tag}>${{post}}"))
                .into_owned();
        }
    }
    html
}

fn emphasis_regex(marker: &str) -> Regex {
    Regex::new(&format!(
        r"(?P<pre>^|[\s(\[{{])(?:{marker})(?P<body>[^\s{marker}](?:[^{marker}]*?[^\s{marker}])?)(?:{marker})(?P<post>$|[\s.,;:!?)\]}}-])"
    ))
    .expect("valid regex")
}

fn is_image(path: &str) -> bool {
    path.rsplit_once('.')
        .is_some_and(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Site-relative location of an image linked from a note.
///
/// Images are published from the `img/` directory of the notes folder.
fn image_src(path: &str) -> String {
    if let Some(idx) = path.find("img/") {
        return path[idx..].to_string();
    }
    path.trim_start_matches("./").trim_start_matches('/').to_string()
}
