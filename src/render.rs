//! Markdown to HTML conversion with metadata extraction.
//!
//! The pipeline parses the source with pulldown-cmark, rewrites the event
//! stream (typographic quotes, heading ids, syntect-highlighted code
//! blocks), serializes to an HTML fragment and passes it through an
//! ammonia allow-list before it reaches the template. Sanitization is
//! always on; the allow-list admits everything the renderer itself emits.

use std::collections::HashMap;
use std::fmt;

use pulldown_cmark::{html, CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::html::{styled_line_to_highlighted_html, IncludeBackground};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;
use time::macros::format_description;

/// Title used when a document carries no usable front matter.
pub const FALLBACK_TITLE: &str = "mdserve: Markdown webserver";

/// Typographic quote replacements applied to smart-punctuated text.
#[derive(Debug, Clone, Copy)]
pub struct QuoteTable {
    pub left_single: &'static str,
    pub right_single: &'static str,
    pub left_double: &'static str,
    pub right_double: &'static str,
}

/// German quotation marks: low-9 opening, high-6 closing.
pub const QUOTES_DE: QuoteTable = QuoteTable {
    left_single: "\u{201a}",
    right_single: "\u{2018}",
    left_double: "\u{201e}",
    right_double: "\u{201c}",
};

/// English quotation marks, the smart-punctuation defaults.
pub const QUOTES_EN: QuoteTable = QuoteTable {
    left_single: "\u{2018}",
    right_single: "\u{2019}",
    left_double: "\u{201c}",
    right_double: "\u{201d}",
};

/// Renderer failure. Maps to a 500 response; the message is only logged.
#[derive(Debug)]
pub struct RenderError(pub String);

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Front-matter metadata of a single document.
#[derive(Debug, Default, PartialEq)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub date: Option<String>,
}

impl DocumentMetadata {
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(FALLBACK_TITLE)
    }

    pub fn display_date(&self) -> String {
        self.date.clone().unwrap_or_else(today_display_date)
    }
}

/// Today's date in the template's day-numbered long-month style,
/// e.g. `02. January 2026`.
pub fn today_display_date() -> String {
    let format = format_description!("[day]. [month repr:long] [year]");
    time::OffsetDateTime::now_utc()
        .date()
        .format(&format)
        .unwrap_or_default()
}

/// Immutable rendering configuration, built once at startup and shared by
/// all requests. Rendering is stateless, so concurrent reuse is safe.
pub struct RenderOptions {
    quotes: QuoteTable,
    highlight_theme: String,
    auto_heading_ids: bool,
    options: Options,
    syntaxes: SyntaxSet,
    themes: ThemeSet,
    sanitizer: ammonia::Builder<'static>,
}

impl RenderOptions {
    pub fn new(lang: &str) -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_DEFINITION_LIST);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_MATH);
        options.insert(Options::ENABLE_WIKILINKS);
        options.insert(Options::ENABLE_YAML_STYLE_METADATA_BLOCKS);
        options.insert(Options::ENABLE_SMART_PUNCTUATION);

        let mut sanitizer = ammonia::Builder::default();
        sanitizer
            .add_generic_attributes(["id", "class"])
            .add_tags(["input"])
            .add_tag_attributes("input", ["type", "checked", "disabled"])
            .add_tag_attributes("span", ["style"]);

        RenderOptions {
            quotes: if lang == "de" { QUOTES_DE } else { QUOTES_EN },
            highlight_theme: "InspiredGitHub".to_string(),
            auto_heading_ids: true,
            options,
            syntaxes: SyntaxSet::load_defaults_newlines(),
            themes: ThemeSet::load_defaults(),
            sanitizer,
        }
    }

    fn highlight_block(&self, lang: &str, code: &str) -> Result<String, RenderError> {
        let syntax = self
            .syntaxes
            .find_syntax_by_token(lang)
            .unwrap_or_else(|| self.syntaxes.find_syntax_plain_text());
        let theme = self
            .themes
            .themes
            .get(&self.highlight_theme)
            .ok_or_else(|| RenderError(format!("unknown theme: {}", self.highlight_theme)))?;
        let mut highlighter = HighlightLines::new(syntax, theme);

        let mut out = String::from("<pre class=\"highlight\"><code>");
        for (number, line) in LinesWithEndings::from(code).enumerate() {
            let ranges = highlighter
                .highlight_line(line, &self.syntaxes)
                .map_err(|e| RenderError(e.to_string()))?;
            let line_html = styled_line_to_highlighted_html(&ranges, IncludeBackground::No)
                .map_err(|e| RenderError(e.to_string()))?;
            out.push_str(&format!("<span class=\"ln\">{:>3} </span>", number + 1));
            out.push_str(&line_html);
        }
        out.push_str("</code></pre>");
        Ok(out)
    }
}

/// Convert Markdown source into a sanitized HTML fragment plus its
/// front-matter metadata.
pub fn render(
    opts: &RenderOptions,
    source: &str,
) -> Result<(String, DocumentMetadata), RenderError> {
    // First pass: heading ids (deduplicated in document order) and the raw
    // front-matter text.
    let mut heading_ids: Vec<String> = Vec::new();
    let mut id_counts: HashMap<String, usize> = HashMap::new();
    let mut meta_text = String::new();
    {
        let mut in_meta = false;
        let mut in_heading = false;
        let mut buf = String::new();
        for ev in Parser::new_ext(source, opts.options) {
            match ev {
                Event::Start(Tag::MetadataBlock(_)) => in_meta = true,
                Event::End(TagEnd::MetadataBlock(_)) => in_meta = false,
                Event::Start(Tag::Heading { .. }) => {
                    in_heading = true;
                    buf.clear();
                }
                Event::End(TagEnd::Heading(_)) => {
                    if in_heading {
                        in_heading = false;
                        let mut id = slugify(&buf);
                        if id.is_empty() {
                            id = "section".to_string();
                        }
                        let count = id_counts.entry(id.clone()).or_insert(0);
                        if *count > 0 {
                            id = format!("{}-{}", id, *count);
                        }
                        *count += 1;
                        heading_ids.push(id);
                    }
                }
                Event::Text(t) => {
                    if in_meta {
                        meta_text.push_str(&t);
                    } else if in_heading {
                        buf.push_str(&t);
                    }
                }
                Event::Code(t) => {
                    if in_heading {
                        buf.push_str(&t);
                    }
                }
                Event::SoftBreak | Event::HardBreak => {
                    if in_heading {
                        buf.push(' ');
                    }
                }
                _ => {}
            }
        }
    }
    let metadata = parse_front_matter(&meta_text);

    // Second pass: rewrite the event stream and serialize it in a single
    // `push_html` call so stateful constructs (tables, footnotes) render
    // correctly.
    let mut events: Vec<Event> = Vec::new();
    let mut heading_idx = 0usize;
    let mut in_meta = false;
    let mut code_lang: Option<String> = None;
    let mut code_buf = String::new();
    for ev in Parser::new_ext(source, opts.options) {
        match ev {
            Event::Start(Tag::MetadataBlock(_)) => in_meta = true,
            Event::End(TagEnd::MetadataBlock(_)) => in_meta = false,
            _ if in_meta => {}
            Event::Start(Tag::CodeBlock(kind)) => {
                code_lang = Some(match kind {
                    CodeBlockKind::Fenced(lang) => {
                        lang.split_whitespace().next().unwrap_or("").to_string()
                    }
                    CodeBlockKind::Indented => String::new(),
                });
                code_buf.clear();
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(lang) = code_lang.take() {
                    let block = opts.highlight_block(&lang, &code_buf)?;
                    events.push(Event::Html(block.into()));
                }
            }
            Event::Text(t) => {
                if code_lang.is_some() {
                    code_buf.push_str(&t);
                } else {
                    events.push(Event::Text(
                        substitute_quotes(&t, &opts.quotes).into(),
                    ));
                }
            }
            Event::Start(Tag::Heading { level, .. }) if opts.auto_heading_ids => {
                let lvl = heading_level(level);
                let id = heading_ids
                    .get(heading_idx)
                    .map(String::as_str)
                    .unwrap_or("section");
                heading_idx += 1;
                events.push(Event::Html(format!("<h{} id=\"{}\">", lvl, id).into()));
            }
            Event::End(TagEnd::Heading(level)) if opts.auto_heading_ids => {
                events.push(Event::Html(format!("</h{}>", heading_level(level)).into()));
            }
            other => events.push(other),
        }
    }

    let mut out = String::new();
    html::push_html(&mut out, events.into_iter());
    let clean = opts.sanitizer.clean(&out).to_string();
    Ok((clean, metadata))
}

/// Replace the quote characters produced by smart punctuation with the
/// configured locale variants. Event-level, so code is never touched.
fn substitute_quotes(text: &str, quotes: &QuoteTable) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\u{2018}' => out.push_str(quotes.left_single),
            '\u{2019}' => out.push_str(quotes.right_single),
            '\u{201c}' => out.push_str(quotes.left_double),
            '\u{201d}' => out.push_str(quotes.right_double),
            _ => out.push(ch),
        }
    }
    out
}

/// Parse `Key: value` lines out of the front-matter block. Lines that
/// don't fit the shape are skipped, so malformed front matter degrades to
/// absent metadata instead of failing the request.
fn parse_front_matter(raw: &str) -> DocumentMetadata {
    let mut metadata = DocumentMetadata::default();
    for line in raw.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let mut value = value.trim();
        if (value.starts_with('"') && value.ends_with('"') && value.len() >= 2)
            || (value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2)
        {
            value = &value[1..value.len() - 1];
        }
        if value.is_empty() {
            continue;
        }
        let key = key.trim();
        if key.eq_ignore_ascii_case("title") {
            metadata.title = Some(value.to_string());
        } else if key.eq_ignore_ascii_case("date") {
            metadata.date = Some(value.to_string());
        }
    }
    metadata
}

fn heading_level(level: HeadingLevel) -> u32 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn slugify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_dash = false;
    for ch in text.chars() {
        let c = ch.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() {
            out.push(c);
            last_dash = false;
        } else if (c.is_whitespace() || c == '-' || c == '_') && !last_dash && !out.is_empty() {
            out.push('-');
            last_dash = true;
        }
    }
    if out.ends_with('-') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(lang: &str) -> RenderOptions {
        RenderOptions::new(lang)
    }

    #[test]
    fn front_matter_title_and_date_extracted() {
        let source = "---\nTitle: Foo\nDate: 01. January 2024\n---\n\nBody text.\n";
        let (html, meta) = render(&opts("en"), source).unwrap();
        assert_eq!(meta.title.as_deref(), Some("Foo"));
        assert_eq!(meta.date.as_deref(), Some("01. January 2024"));
        assert_eq!(meta.display_title(), "Foo");
        assert_eq!(meta.display_date(), "01. January 2024");
        // The metadata block never leaks into the body.
        assert!(!html.contains("Foo"));
        assert!(html.contains("Body text."));
    }

    #[test]
    fn missing_front_matter_falls_back() {
        let (_, meta) = render(&opts("en"), "# Hi\n").unwrap();
        assert_eq!(meta.title, None);
        assert_eq!(meta.display_title(), FALLBACK_TITLE);
        assert_eq!(meta.display_date(), today_display_date());
    }

    #[test]
    fn empty_front_matter_values_fall_back() {
        let source = "---\nTitle:\nDate: \"\"\n---\n\nBody.\n";
        let (_, meta) = render(&opts("en"), source).unwrap();
        assert_eq!(meta.display_title(), FALLBACK_TITLE);
        assert_eq!(meta.date, None);
    }

    #[test]
    fn quoted_front_matter_values_unquoted() {
        let source = "---\nTitle: \"Quoted Title\"\n---\n\nBody.\n";
        let (_, meta) = render(&opts("en"), source).unwrap();
        assert_eq!(meta.title.as_deref(), Some("Quoted Title"));
    }

    #[test]
    fn headings_get_slug_ids() {
        let (html, _) = render(&opts("de"), "# Hi\n").unwrap();
        assert!(html.contains("<h1 id=\"hi\">Hi</h1>"), "got: {}", html);
    }

    #[test]
    fn duplicate_headings_get_suffixed_ids() {
        let (html, _) = render(&opts("en"), "## Setup\n\ntext\n\n## Setup\n").unwrap();
        assert!(html.contains("<h2 id=\"setup\">"));
        assert!(html.contains("<h2 id=\"setup-1\">"));
    }

    #[test]
    fn rendering_is_idempotent() {
        let options = opts("de");
        let source = "---\nTitle: X\n---\n\n# A \"quote\"\n\n```rust\nfn main() {}\n```\n\n| a | b |\n|---|---|\n| 1 | 2 |\n";
        let (first, _) = render(&options, source).unwrap();
        let (second, _) = render(&options, source).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn german_quotes_substituted() {
        let (html, _) = render(&opts("de"), "Er sagte \"Hallo\" zu mir.\n").unwrap();
        assert!(html.contains("\u{201e}Hallo\u{201c}"), "got: {}", html);
    }

    #[test]
    fn english_quotes_substituted() {
        let (html, _) = render(&opts("en"), "He said \"hello\" to me.\n").unwrap();
        assert!(html.contains("\u{201c}hello\u{201d}"), "got: {}", html);
    }

    #[test]
    fn quotes_in_code_untouched() {
        let (html, _) = render(&opts("de"), "Use `print(\"hi\")` here.\n").unwrap();
        // Straight quotes survive inside code; no German marks appear.
        assert!(html.contains("\"hi\""), "got: {}", html);
        assert!(!html.contains("\u{201e}"));
    }

    #[test]
    fn fenced_code_is_highlighted_with_line_numbers() {
        let source = "```rust\nfn main() {\n    println!(\"hi\");\n}\n```\n";
        let (html, _) = render(&opts("en"), source).unwrap();
        assert!(html.contains("class=\"highlight\""), "got: {}", html);
        assert!(html.contains("class=\"ln\""));
        // Three lines, three line numbers.
        assert_eq!(html.matches("class=\"ln\"").count(), 3);
    }

    #[test]
    fn unknown_code_language_falls_back_to_plain() {
        let source = "```nosuchlanguage\nstuff\n```\n";
        let (html, _) = render(&opts("en"), source).unwrap();
        assert!(html.contains("stuff"));
    }

    #[test]
    fn tables_render() {
        let source = "| a | b |\n|---|---|\n| 1 | 2 |\n";
        let (html, _) = render(&opts("en"), source).unwrap();
        assert!(html.contains("<table>"), "got: {}", html);
        assert!(html.contains("<td>1</td>"));
    }

    #[test]
    fn task_lists_keep_checkboxes() {
        let source = "- [x] done\n- [ ] open\n";
        let (html, _) = render(&opts("en"), source).unwrap();
        assert!(html.contains("<input"), "got: {}", html);
        assert!(html.contains("checkbox"));
    }

    #[test]
    fn strikethrough_renders() {
        let (html, _) = render(&opts("en"), "~~gone~~\n").unwrap();
        assert!(html.contains("<del>gone</del>"));
    }

    #[test]
    fn definition_lists_render() {
        let source = "Term\n: the definition\n";
        let (html, _) = render(&opts("en"), source).unwrap();
        assert!(html.contains("<dt>Term</dt>"), "got: {}", html);
        assert!(html.contains("<dd>the definition</dd>"));
    }

    #[test]
    fn footnotes_render() {
        let source = "A claim[^1].\n\n[^1]: The source.\n";
        let (html, _) = render(&opts("en"), source).unwrap();
        assert!(html.contains("footnote-reference"), "got: {}", html);
        assert!(html.contains("footnote-definition"));
        assert!(html.contains("The source."));
    }

    #[test]
    fn wikilinks_render_as_links() {
        let (html, _) = render(&opts("en"), "See [[OtherPage]] for more.\n").unwrap();
        assert!(html.contains("href=\"OtherPage\""), "got: {}", html);
        assert!(html.contains("OtherPage</a>"));
    }

    #[test]
    fn math_spans_emitted() {
        let (html, _) = render(&opts("en"), "Euler: $e^{i\\pi}+1=0$\n").unwrap();
        assert!(html.contains("math"), "got: {}", html);
    }

    #[test]
    fn scripts_are_sanitized_away() {
        let source = "Hello <script>alert(1)</script> world\n\n<img src=x onerror=alert(1)>\n";
        let (html, _) = render(&opts("en"), source).unwrap();
        assert!(!html.contains("<script"), "got: {}", html);
        assert!(!html.contains("onerror"));
    }

    #[test]
    fn unclosed_front_matter_is_not_metadata() {
        let source = "---\nTitle: Foo\n\nBody without closing fence.\n";
        let (_, meta) = render(&opts("en"), source).unwrap();
        assert_eq!(meta.title, None);
    }

    #[test]
    fn slugify_basics() {
        assert_eq!(slugify("Hi"), "hi");
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("  Weird -- Spacing  "), "weird-spacing");
        assert_eq!(slugify("Ümläute"), "mlute");
    }
}
