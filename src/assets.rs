//! Built-in static assets, compiled into the binary.
//!
//! Assets are served read-only from this bundle, never from the
//! user-supplied directory, so requests under the `assets/` namespace can
//! never reach the filesystem sandbox at all.

const TEMPLATE: &str = include_str!("../assets/md.tmpl");
const CSS_LEFT: &str = include_str!("../assets/md-left.css");
const CSS_BLOCK: &str = include_str!("../assets/md-block.css");
const KATEX_CSS: &str = include_str!("../assets/katex/katex.css");

/// Reserved path prefix answered from the bundle.
pub const ASSET_PREFIX: &str = "assets/";

/// The fixed in-binary asset set. The stylesheet variant is chosen once at
/// startup from the justification flag.
pub struct AssetBundle {
    css: &'static str,
}

impl AssetBundle {
    pub fn new(justify: bool) -> Self {
        AssetBundle {
            css: if justify { CSS_BLOCK } else { CSS_LEFT },
        }
    }

    /// The page template with its four ordered `%s` slots.
    pub fn template(&self) -> &'static str {
        TEMPLATE
    }

    /// Look up a bundled asset by cleaned request path.
    pub fn lookup(&self, path: &str) -> Option<&'static [u8]> {
        let rest = path.strip_prefix(ASSET_PREFIX)?;
        match rest {
            "md.css" => Some(self.css.as_bytes()),
            "katex/katex.css" => Some(KATEX_CSS.as_bytes()),
            _ => None,
        }
    }
}

/// Escape text destined for the template's title and date slots. The body
/// slot arrives sanitized; these two come straight from front matter.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
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

/// Substitute the template's `%s` slots in order. The template contract is
/// exactly four fields: language, title, body, date.
pub fn fill_template(template: &str, fields: [&str; 4]) -> String {
    let mut out = String::with_capacity(template.len() + fields.iter().map(|f| f.len()).sum::<usize>());
    let mut rest = template;
    let mut fields = fields.iter();
    while let Some(pos) = rest.find("%s") {
        out.push_str(&rest[..pos]);
        out.push_str(fields.next().copied().unwrap_or(""));
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stylesheet_variant_follows_justify_flag() {
        let left = AssetBundle::new(false);
        let block = AssetBundle::new(true);
        let left_css = left.lookup("assets/md.css").unwrap();
        let block_css = block.lookup("assets/md.css").unwrap();
        assert_ne!(left_css, block_css);
        assert!(std::str::from_utf8(block_css)
            .unwrap()
            .contains("text-align: justify"));
    }

    #[test]
    fn unknown_assets_miss() {
        let bundle = AssetBundle::new(false);
        assert!(bundle.lookup("assets/nope.css").is_none());
        assert!(bundle.lookup("md.css").is_none());
        assert!(bundle.lookup("assets/../md.css").is_none());
    }

    #[test]
    fn katex_css_is_bundled() {
        let bundle = AssetBundle::new(false);
        assert!(bundle.lookup("assets/katex/katex.css").is_some());
    }

    #[test]
    fn template_has_exactly_four_slots() {
        assert_eq!(TEMPLATE.matches("%s").count(), 4);
    }

    #[test]
    fn escape_html_neutralizes_markup() {
        assert_eq!(
            escape_html("</title><script>alert(1)</script>"),
            "&lt;/title&gt;&lt;script&gt;alert(1)&lt;/script&gt;"
        );
        assert_eq!(escape_html("Tom & \"Jerry\"'s"), "Tom &amp; &quot;Jerry&quot;&#39;s");
        assert_eq!(escape_html("Plain Title"), "Plain Title");
    }

    #[test]
    fn fill_template_substitutes_in_order() {
        let html = fill_template("<html lang=\"%s\"><title>%s</title>%s<i>%s</i>", [
            "de",
            "A Title",
            "<p>body</p>",
            "01. January 2024",
        ]);
        assert_eq!(
            html,
            "<html lang=\"de\"><title>A Title</title><p>body</p><i>01. January 2024</i>"
        );
    }

    #[test]
    fn fill_template_on_the_real_template() {
        let bundle = AssetBundle::new(false);
        let html = fill_template(bundle.template(), ["en", "T", "<p>B</p>", "D"]);
        assert!(html.contains("<html lang=\"en\">"));
        assert!(html.contains("<title>T</title>"));
        assert!(html.contains("<p>B</p>"));
        assert!(!html.contains("%s"));
    }
}
