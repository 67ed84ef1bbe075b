// Markdown rendering for completion results

use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, html};
use serde::Serialize;

/// URL schemes a link or image in model output may use
const ALLOWED_SCHEMES: [&str; 3] = ["http", "https", "mailto"];

/// Destination unchanged if relative or of an allowed scheme, else `#`
fn safe_destination(dest: CowStr<'_>) -> CowStr<'_> {
    let Some(end) = dest.find(|c| matches!(c, ':' | '/' | '?' | '#')) else {
        return dest;
    };
    if !dest[end..].starts_with(':') {
        return dest;
    }
    // Browsers ignore whitespace and control characters inside a scheme
    let scheme: String = dest[..end]
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    if ALLOWED_SCHEMES.contains(&scheme.as_str()) {
        dest
    } else {
        CowStr::Borrowed("#")
    }
}

pub fn render_markdown(input: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    // Model output is untrusted: raw HTML becomes text, unsafe URLs become `#`
    let parser = Parser::new_ext(input, options).map(|event| match event {
        Event::Html(text) | Event::InlineHtml(text) => Event::Text(text),
        Event::Start(Tag::Link { link_type, dest_url, title, id }) => Event::Start(Tag::Link {
            link_type,
            dest_url: safe_destination(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image { link_type, dest_url, title, id }) => Event::Start(Tag::Image {
            link_type,
            dest_url: safe_destination(dest_url),
            title,
            id,
        }),
        other => other,
    });
    let mut output = String::new();
    html::push_html(&mut output, parser);
    output
}

/// A completion result in both raw and rendered form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedResult {
    pub markdown: String,
    pub html: String,
}

impl RenderedResult {
    pub fn new(markdown: impl Into<String>) -> Self {
        let markdown = markdown.into();
        let html = render_markdown(&markdown);
        RenderedResult { markdown, html }
    }

    /// Text placed on the clipboard by the copy button: the raw result, unchanged
    pub fn clipboard_text(&self) -> &str {
        &self.markdown
    }
}
