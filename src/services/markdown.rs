use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Style {
    pub bold: bool,
    pub italic: bool,
    pub strike: bool,
    pub code: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    pub style: Style,
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlock {
    pub language: Option<String>,
    pub code: String,
}

impl CodeBlock {
    /// Header label; untagged fences read as plain text.
    pub fn label(&self) -> &str {
        self.language.as_deref().unwrap_or("text")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(Vec<Span>),
    Heading { level: u8, spans: Vec<Span> },
    Code(CodeBlock),
    Quote(Vec<Block>),
    List { start: Option<u64>, items: Vec<Vec<Block>> },
    Table { head: Vec<Vec<Span>>, rows: Vec<Vec<Vec<Span>>> },
    Rule,
}

/// Parse GitHub-flavoured markdown into renderable blocks.
///
/// Incomplete input is fine: an unterminated fence becomes a code block
/// holding whatever has arrived so far.
pub fn render(text: &str) -> Vec<Block> {
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES | Options::ENABLE_TASKLISTS;
    let mut builder = Builder::default();
    for event in Parser::new_ext(text, options) {
        builder.event(event);
    }
    builder.finish()
}

enum Frame {
    Quote(Vec<Block>),
    List {
        start: Option<u64>,
        items: Vec<Vec<Block>>,
    },
    Item(Vec<Block>),
    Table {
        head: Vec<Vec<Span>>,
        rows: Vec<Vec<Vec<Span>>>,
    },
    Row(Vec<Vec<Span>>),
}

#[derive(Default)]
struct Builder {
    root: Vec<Block>,
    frames: Vec<Frame>,
    spans: Vec<Span>,
    style: Style,
    link: Option<String>,
    heading: Option<u8>,
    code: Option<CodeBlock>,
}

impl Builder {
    fn event(&mut self, event: Event) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => match self.code.as_mut() {
                Some(block) => block.code.push_str(&text),
                None => self.push_text(&text, self.style),
            },
            Event::Code(code) => {
                let style = Style { code: true, ..self.style };
                self.push_text(&code, style);
            }
            Event::Html(html) | Event::InlineHtml(html) => self.push_text(&html, self.style),
            Event::SoftBreak => self.push_text(" ", self.style),
            Event::HardBreak => self.push_text("\n", self.style),
            Event::TaskListMarker(done) => {
                self.push_text(if done { "\u{2611} " } else { "\u{2610} " }, self.style)
            }
            Event::Rule => {
                self.flush_inline();
                self.emit(Block::Rule);
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag) {
        match tag {
            Tag::Heading { level, .. } => {
                self.flush_inline();
                self.heading = Some(heading_level(level));
            }
            Tag::CodeBlock(kind) => {
                self.flush_inline();
                let language = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .map(str::to_string),
                    CodeBlockKind::Indented => None,
                };
                self.code = Some(CodeBlock {
                    language,
                    code: String::new(),
                });
            }
            Tag::BlockQuote(_) => {
                self.flush_inline();
                self.frames.push(Frame::Quote(Vec::new()));
            }
            Tag::List(start) => {
                self.flush_inline();
                self.frames.push(Frame::List {
                    start,
                    items: Vec::new(),
                });
            }
            Tag::Item => self.frames.push(Frame::Item(Vec::new())),
            Tag::Table(_) => {
                self.flush_inline();
                self.frames.push(Frame::Table {
                    head: Vec::new(),
                    rows: Vec::new(),
                });
            }
            Tag::TableHead | Tag::TableRow => self.frames.push(Frame::Row(Vec::new())),
            Tag::TableCell => self.spans.clear(),
            Tag::Strong => self.style.bold = true,
            Tag::Emphasis => self.style.italic = true,
            Tag::Strikethrough => self.style.strike = true,
            Tag::Link { dest_url, .. } => self.link = Some(dest_url.to_string()),
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.flush_inline(),
            TagEnd::Heading(_) => {
                if let Some(level) = self.heading.take() {
                    let spans = std::mem::take(&mut self.spans);
                    self.emit(Block::Heading { level, spans });
                }
            }
            TagEnd::CodeBlock => {
                if let Some(mut block) = self.code.take() {
                    let trimmed = block.code.trim_end_matches('\n').len();
                    block.code.truncate(trimmed);
                    self.emit(Block::Code(block));
                }
            }
            TagEnd::BlockQuote(_) => {
                self.flush_inline();
                if let Some(Frame::Quote(blocks)) = self.frames.pop() {
                    self.emit(Block::Quote(blocks));
                }
            }
            TagEnd::List(_) => {
                self.flush_inline();
                if let Some(Frame::List { start, items }) = self.frames.pop() {
                    self.emit(Block::List { start, items });
                }
            }
            TagEnd::Item => {
                self.flush_inline();
                if let Some(Frame::Item(blocks)) = self.frames.pop() {
                    if let Some(Frame::List { items, .. }) = self.frames.last_mut() {
                        items.push(blocks);
                    }
                }
            }
            TagEnd::TableCell => {
                let cell = std::mem::take(&mut self.spans);
                if let Some(Frame::Row(cells)) = self.frames.last_mut() {
                    cells.push(cell);
                }
            }
            TagEnd::TableHead | TagEnd::TableRow => {
                if let Some(Frame::Row(cells)) = self.frames.pop() {
                    if let Some(Frame::Table { head, rows }) = self.frames.last_mut() {
                        if matches!(tag, TagEnd::TableHead) {
                            *head = cells;
                        } else {
                            rows.push(cells);
                        }
                    }
                }
            }
            TagEnd::Table => {
                if let Some(Frame::Table { head, rows }) = self.frames.pop() {
                    self.emit(Block::Table { head, rows });
                }
            }
            TagEnd::Strong => self.style.bold = false,
            TagEnd::Emphasis => self.style.italic = false,
            TagEnd::Strikethrough => self.style.strike = false,
            TagEnd::Link => self.link = None,
            _ => {}
        }
    }

    fn push_text(&mut self, text: &str, style: Style) {
        // Merge runs with identical formatting so the widget gets fewer spans.
        if let Some(last) = self.spans.last_mut() {
            if last.style == style && last.link == self.link {
                last.text.push_str(text);
                return;
            }
        }
        self.spans.push(Span {
            text: text.to_string(),
            style,
            link: self.link.clone(),
        });
    }

    /// Close the running paragraph, if any. Tight list items carry bare text
    /// with no paragraph around it, so nested blocks flush it here.
    fn flush_inline(&mut self) {
        if self.heading.is_some() || self.spans.is_empty() {
            return;
        }
        let spans = std::mem::take(&mut self.spans);
        self.emit(Block::Paragraph(spans));
    }

    fn emit(&mut self, block: Block) {
        let sink = match self.frames.last_mut() {
            Some(Frame::Quote(blocks)) | Some(Frame::Item(blocks)) => blocks,
            _ => &mut self.root,
        };
        sink.push(block);
    }

    fn finish(mut self) -> Vec<Block> {
        self.flush_inline();
        self.root
    }
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(spans: &[Span]) -> String {
        spans.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn test_plain_paragraph() {
        let blocks = render("Hello world");
        match blocks.as_slice() {
            [Block::Paragraph(spans)] => {
                assert_eq!(spans.len(), 1);
                assert_eq!(spans[0].text, "Hello world");
                assert_eq!(spans[0].style, Style::default());
            }
            other => panic!("unexpected blocks: {:?}", other),
        }
    }

    #[test]
    fn test_inline_styles_and_links() {
        let blocks = render("**bold**, *italic*, ~~gone~~, `code` and [docs](https://lmstudio.ai)");
        let Block::Paragraph(spans) = &blocks[0] else {
            panic!("expected paragraph");
        };
        assert!(spans.iter().any(|s| s.style.bold && s.text == "bold"));
        assert!(spans.iter().any(|s| s.style.italic && s.text == "italic"));
        assert!(spans.iter().any(|s| s.style.strike && s.text == "gone"));
        assert!(spans.iter().any(|s| s.style.code && s.text == "code"));
        assert!(spans
            .iter()
            .any(|s| s.text == "docs" && s.link.as_deref() == Some("https://lmstudio.ai")));
    }

    #[test]
    fn test_code_block_language_and_label() {
        let blocks = render("```python\nprint('hi')\n```");
        assert_eq!(
            blocks,
            vec![Block::Code(CodeBlock {
                language: Some("python".to_string()),
                code: "print('hi')".to_string(),
            })]
        );

        match render("```\nls -la\n```").as_slice() {
            [Block::Code(untagged)] => assert_eq!(untagged.label(), "text"),
            other => panic!("expected one code block, got {:?}", other),
        }
    }

    #[test]
    fn test_unterminated_fence_while_streaming() {
        let blocks = render("Here you go:\n\n```rust\nfn main() {\n    println!(");
        assert_eq!(blocks.len(), 2);
        match &blocks[1] {
            Block::Code(code) => {
                assert_eq!(code.label(), "rust");
                assert!(code.code.starts_with("fn main() {"));
            }
            other => panic!("expected code block, got {:?}", other),
        }
    }

    #[test]
    fn test_code_blocks_nested_in_lists_and_quotes() {
        let text = "1. first\n\n   ```sh\n   cargo run\n   ```\n\n> ```toml\n> [package]\n> ```\n";
        let blocks = render(text);
        assert_eq!(blocks.len(), 2);

        match &blocks[0] {
            Block::List { items, .. } => match items[0].as_slice() {
                [_, Block::Code(code)] => {
                    assert_eq!(code.label(), "sh");
                    assert_eq!(code.code, "cargo run");
                }
                other => panic!("expected paragraph then code, got {:?}", other),
            },
            other => panic!("expected list, got {:?}", other),
        }
        match &blocks[1] {
            Block::Quote(inner) => {
                assert!(matches!(inner.as_slice(), [Block::Code(code)] if code.label() == "toml"))
            }
            other => panic!("expected quote, got {:?}", other),
        }
    }

    #[test]
    fn test_heading() {
        let blocks = render("## Setup steps");
        assert!(matches!(
            blocks.as_slice(),
            [Block::Heading { level: 2, spans }] if text_of(spans) == "Setup steps"
        ));
    }

    #[test]
    fn test_tight_list_with_nested_list() {
        let blocks = render("3. one\n4. two\n   - inner\n");
        let Block::List { start, items } = &blocks[0] else {
            panic!("expected list");
        };
        assert_eq!(*start, Some(3));
        assert_eq!(items.len(), 2);
        assert!(matches!(&items[0][0], Block::Paragraph(spans) if text_of(spans) == "one"));
        assert!(matches!(&items[1][1], Block::List { start: None, items } if items.len() == 1));
    }

    #[test]
    fn test_table() {
        let blocks = render("| Model | Size |\n|---|---|\n| qwen | 7B |\n| llama | 8B |\n");
        let Block::Table { head, rows } = &blocks[0] else {
            panic!("expected table");
        };
        assert_eq!(head.len(), 2);
        assert_eq!(text_of(&head[0]), "Model");
        assert_eq!(rows.len(), 2);
        assert_eq!(text_of(&rows[1][1]), "8B");
    }

    #[test]
    fn test_quote_and_rule() {
        let blocks = render("> quoted\n\n---\n\nafter");
        assert!(matches!(&blocks[0], Block::Quote(inner) if inner.len() == 1));
        assert_eq!(blocks[1], Block::Rule);
        assert!(matches!(&blocks[2], Block::Paragraph(_)));
    }
}
