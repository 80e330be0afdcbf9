//! Markdown to HTML for notification webhooks.
//!
//! Rendering is CommonMark via `pulldown-cmark`, with two deviations that
//! downstream mail templates rely on: headings of every level render as
//! `<header>`, and links carry `rel="nofollow"`.

use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, TagEnd, html};

/// Renders markdown to an HTML fragment.
pub fn to_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, Options::empty()).map(|event| match event {
        Event::Start(Tag::Heading { .. }) => Event::Html(CowStr::from("<header>")),
        Event::End(TagEnd::Heading(_)) => Event::Html(CowStr::from("</header>\n")),
        Event::Start(Tag::Link {
            dest_url, title, ..
        }) => Event::InlineHtml(CowStr::from(link_open(&dest_url, &title))),
        Event::End(TagEnd::Link) => Event::InlineHtml(CowStr::from("</a>")),
        other => other,
    });

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

fn link_open(href: &str, title: &str) -> String {
    if title.is_empty() {
        format!(r#"<a href="{}" rel="nofollow">"#, escape_attr(href))
    } else {
        format!(
            r#"<a href="{}" title="{}" rel="nofollow">"#,
            escape_attr(href),
            escape_attr(title)
        )
    }
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_render_as_header() {
        assert_eq!(to_html("# Title"), "<header>Title</header>\n");
        assert_eq!(to_html("### Third"), "<header>Third</header>\n");
    }

    #[test]
    fn paragraphs_and_emphasis() {
        assert_eq!(
            to_html("Some *soft* and **loud** text"),
            "<p>Some <em>soft</em> and <strong>loud</strong> text</p>\n"
        );
    }

    #[test]
    fn bullets_render_as_list() {
        let html = to_html("* one\n* two");
        assert_eq!(html, "<ul>\n<li>one</li>\n<li>two</li>\n</ul>\n");
    }

    #[test]
    fn indented_bullets_nest() {
        let html = to_html("* one\n  * inner\n* two");
        assert!(html.contains("<li>one\n<ul>\n<li>inner</li>\n</ul>\n</li>"), "{html}");
    }

    #[test]
    fn links_are_nofollow() {
        assert_eq!(
            to_html("[docs](https://example.com/a?b=1&c=2)"),
            "<p><a href=\"https://example.com/a?b=1&amp;c=2\" rel=\"nofollow\">docs</a></p>\n"
        );
    }

    #[test]
    fn bare_urls_are_not_linked() {
        let html = to_html("visit https://example.com today");
        assert!(!html.contains("<a"), "{html}");
    }

    #[test]
    fn link_titles_are_escaped() {
        let html = to_html(r#"[x](/y "say \"hi\"")"#);
        assert!(html.contains(r#"title="say &quot;hi&quot;""#), "{html}");
    }
}
