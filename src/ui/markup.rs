use lmchat::services::markdown::Span;

/// Pango markup for a run of styled spans.
pub fn spans_to_markup(spans: &[Span]) -> String {
    let mut markup = String::new();
    for span in spans {
        let mut close = Vec::new();

        if let Some(url) = &span.link {
            markup.push_str(&format!("<a href=\"{}\">", glib::markup_escape_text(url)));
            close.push("</a>");
        }
        for (on, open, end) in [
            (span.style.strike, "<s>", "</s>"),
            (span.style.italic, "<i>", "</i>"),
            (span.style.bold, "<b>", "</b>"),
            (span.style.code, "<tt>", "</tt>"),
        ] {
            if on {
                markup.push_str(open);
                close.push(end);
            }
        }

        markup.push_str(&glib::markup_escape_text(&span.text));

        for tag in close.iter().rev() {
            markup.push_str(tag);
        }
    }
    markup
}
