//! Filing-document text preparation.
//!
//! Extraction patterns run over plain text. Filings arrive as HTML, so
//! scripts, styles and markup are stripped and whitespace collapsed first.

use std::sync::LazyLock;

use regex::Regex;

static SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("valid regex")
});
static STYLE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?is)<style[^>]*>.*?</style>").expect("valid regex")
});
static TAG: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static WS: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Reduce a filing HTML document to plain text suitable for the pattern
/// extractors.
pub fn document_text(html: &str) -> String {
  let text = SCRIPT.replace_all(html, " ");
  let text = STYLE.replace_all(&text, " ");
  let text = TAG.replace_all(&text, " ");
  let text = text
    .replace("&nbsp;", " ")
    .replace("&amp;", "&")
    .replace("&#39;", "'")
    .replace("&#34;", "\"")
    .replace("&rsquo;", "'")
    .replace("&ldquo;", "\"")
    .replace("&rdquo;", "\"");

  WS.replace_all(&text, " ").trim().to_string()
}

/// A short window of source text around a match, used as the quoted-text
/// provenance on fact events.
pub fn excerpt(text: &str, start: usize, end: usize) -> String {
  const WINDOW: usize = 120;

  let mut s = start.saturating_sub(WINDOW);
  while s > 0 && !text.is_char_boundary(s) {
    s -= 1;
  }
  let mut e = end.saturating_add(WINDOW).min(text.len());
  while e < text.len() && !text.is_char_boundary(e) {
    e += 1;
  }
  text[s..e].trim().to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn strips_markup_and_collapses_whitespace() {
    let html = "<html><style>p{color:red}</style><body>\
                <p>held approximately <b>713,502</b> bitcoins</p>\
                <script>var x=1;</script></body></html>";
    assert_eq!(
      document_text(html),
      "held approximately 713,502 bitcoins"
    );
  }

  #[test]
  fn decodes_common_entities() {
    assert_eq!(document_text("cash&nbsp;&amp;&nbsp;equivalents"), "cash & equivalents");
  }

  #[test]
  fn excerpt_clamps_to_document() {
    let text = "short document";
    assert_eq!(excerpt(text, 0, 5), "short document");
  }
}
