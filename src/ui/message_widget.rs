use std::time::Duration;

use gtk::prelude::*;
use relm4::prelude::*;

use lmchat::models::{Message, Role};
use lmchat::services::markdown::{self, Block, CodeBlock, Span};

use super::markup::spans_to_markup;

pub struct MessageInit {
    pub message: Message,
    /// The assistant reply that playback is still filling in.
    pub streaming: bool,
}

pub struct MessageWidget {
    message: Message,
    streaming: bool,
    content_box: gtk::Box,
    copy_button: gtk::Button,
}

#[derive(Debug)]
pub enum MessageWidgetMsg {
    Reveal(String),
    SetStreaming(bool),
    RequestCopy,
}

#[derive(Debug)]
pub enum MessageWidgetOutput {
    Copy(String),
}

#[relm4::factory(pub)]
impl FactoryComponent for MessageWidget {
    type Init = MessageInit;
    type Input = MessageWidgetMsg;
    type Output = MessageWidgetOutput;
    type CommandOutput = ();
    type ParentWidget = gtk::Box;

    view! {
        gtk::Box {
            set_orientation: gtk::Orientation::Horizontal,
            set_margin_top: 4,
            set_margin_bottom: 4,
            set_margin_start: 12,
            set_margin_end: 12,
        }
    }

    fn init_model(init: Self::Init, _index: &DynamicIndex, _sender: FactorySender<Self>) -> Self {
        let content_box = gtk::Box::builder()
            .orientation(gtk::Orientation::Vertical)
            .spacing(4)
            .margin_start(10)
            .margin_end(10)
            .margin_top(8)
            .margin_bottom(8)
            .build();

        let copy_button = gtk::Button::builder()
            .icon_name("edit-copy-symbolic")
            .tooltip_text("Copy message")
            .halign(gtk::Align::End)
            .valign(gtk::Align::Start)
            .build();
        copy_button.add_css_class("flat");
        copy_button.add_css_class("circular");

        Self {
            message: init.message,
            streaming: init.streaming,
            content_box,
            copy_button,
        }
    }

    fn init_widgets(
        &mut self,
        _index: &DynamicIndex,
        root: Self::Root,
        _returned_widget: &<Self::ParentWidget as relm4::factory::FactoryView>::ReturnedWidget,
        sender: FactorySender<Self>,
    ) -> Self::Widgets {
        let is_user = self.message.role == Role::User;

        let bubble = gtk::Box::builder()
            .orientation(gtk::Orientation::Vertical)
            .build();
        bubble.add_css_class("card");
        bubble.add_css_class(if is_user {
            "message-bubble-user"
        } else {
            "message-bubble-assistant"
        });

        let header = gtk::Box::builder()
            .orientation(gtk::Orientation::Horizontal)
            .spacing(8)
            .margin_start(10)
            .margin_end(4)
            .margin_top(4)
            .build();
        let role_label = gtk::Label::builder()
            .label(if is_user { "You" } else { "Assistant" })
            .halign(gtk::Align::Start)
            .hexpand(true)
            .build();
        role_label.add_css_class("caption");
        role_label.add_css_class("dim-label");
        header.append(&role_label);

        let sender_copy = sender.input_sender().clone();
        self.copy_button.connect_clicked(move |_| {
            sender_copy.emit(MessageWidgetMsg::RequestCopy);
        });
        header.append(&self.copy_button);
        header.add_css_class("message-actions");

        bubble.append(&header);
        bubble.append(&self.content_box);

        root.set_halign(if is_user {
            gtk::Align::End
        } else {
            gtk::Align::Fill
        });
        if is_user {
            root.set_margin_start(64);
        } else {
            bubble.set_hexpand(true);
        }
        root.append(&bubble);

        self.render();

        let widgets = view_output!();
        widgets
    }

    fn update(&mut self, msg: Self::Input, sender: FactorySender<Self>) {
        match msg {
            MessageWidgetMsg::Reveal(text) => {
                self.message.content = text;
                self.render();
            }
            MessageWidgetMsg::SetStreaming(streaming) => {
                self.streaming = streaming;
                self.render();
            }
            MessageWidgetMsg::RequestCopy => {
                let _ = sender.output(MessageWidgetOutput::Copy(self.message.content.clone()));
            }
        }
    }
}

impl MessageWidget {
    fn render(&self) {
        while let Some(child) = self.content_box.first_child() {
            self.content_box.remove(&child);
        }

        self.copy_button
            .set_visible(!self.streaming && self.message.is_copyable());

        if self.streaming && self.message.content.is_empty() {
            self.content_box.append(&typing_indicator());
            return;
        }

        if self.message.role == Role::User {
            let label = gtk::Label::builder()
                .label(&self.message.content)
                .halign(gtk::Align::Start)
                .wrap(true)
                .wrap_mode(gtk::pango::WrapMode::WordChar)
                .selectable(true)
                .build();
            self.content_box.append(&label);
            return;
        }

        for block in markdown::render(&self.message.content) {
            self.content_box.append(&block_widget(&block));
        }
    }
}

fn typing_indicator() -> gtk::Widget {
    let dots = gtk::Box::builder()
        .orientation(gtk::Orientation::Horizontal)
        .spacing(4)
        .build();
    dots.add_css_class("typing-indicator");
    for _ in 0..3 {
        dots.append(&gtk::Label::new(Some("\u{2022}")));
    }
    dots.upcast()
}

fn rich_label(spans: &[Span]) -> gtk::Label {
    let label = gtk::Label::builder()
        .halign(gtk::Align::Start)
        .xalign(0.0)
        .wrap(true)
        .wrap_mode(gtk::pango::WrapMode::WordChar)
        .selectable(true)
        .use_markup(true)
        .build();
    label.set_markup(&spans_to_markup(spans));
    label
}

fn block_widget(block: &Block) -> gtk::Widget {
    match block {
        Block::Paragraph(spans) => rich_label(spans).upcast(),
        Block::Heading { level, spans } => {
            let label = rich_label(spans);
            label.add_css_class(match level {
                1 => "heading-1",
                2 => "heading-2",
                3 => "heading-3",
                _ => "heading-4",
            });
            label.upcast()
        }
        Block::Code(code) => code_block(code),
        Block::Quote(inner) => {
            let quote = gtk::Box::builder()
                .orientation(gtk::Orientation::Vertical)
                .spacing(4)
                .build();
            quote.add_css_class("blockquote");
            for block in inner {
                quote.append(&block_widget(block));
            }
            quote.upcast()
        }
        Block::List { start, items } => list(*start, items),
        Block::Table { head, rows } => table(head, rows),
        Block::Rule => gtk::Separator::builder()
            .orientation(gtk::Orientation::Horizontal)
            .margin_top(4)
            .margin_bottom(4)
            .build()
            .upcast(),
    }
}

fn code_block(block: &CodeBlock) -> gtk::Widget {
    let outer = gtk::Box::builder()
        .orientation(gtk::Orientation::Vertical)
        .margin_top(4)
        .margin_bottom(4)
        .build();
    outer.add_css_class("code-block");

    let header = gtk::Box::builder()
        .orientation(gtk::Orientation::Horizontal)
        .spacing(8)
        .build();
    header.add_css_class("code-block-header");

    let language = gtk::Label::builder()
        .label(block.label())
        .halign(gtk::Align::Start)
        .hexpand(true)
        .build();
    language.add_css_class("code-block-language");
    header.append(&language);

    let copy_button = gtk::Button::builder()
        .icon_name("edit-copy-symbolic")
        .tooltip_text("Copy code")
        .build();
    copy_button.add_css_class("flat");
    copy_button.add_css_class("circular");

    let code = block.code.clone();
    copy_button.connect_clicked(move |button| {
        button.clipboard().set_text(&code);
        button.set_icon_name("object-select-symbolic");
        let button = button.clone();
        glib::timeout_add_local_once(Duration::from_millis(1500), move || {
            // Streaming re-renders may have dropped the button already.
            if button.parent().is_some() {
                button.set_icon_name("edit-copy-symbolic");
            }
        });
    });
    header.append(&copy_button);
    outer.append(&header);

    let view = gtk::TextView::builder()
        .editable(false)
        .cursor_visible(false)
        .wrap_mode(gtk::WrapMode::WordChar)
        .monospace(true)
        .top_margin(8)
        .bottom_margin(8)
        .left_margin(12)
        .right_margin(12)
        .build();
    view.buffer().set_text(&block.code);
    view.add_css_class("code-block-content");
    outer.append(&view);

    outer.upcast()
}

fn list(start: Option<u64>, items: &[Vec<Block>]) -> gtk::Widget {
    let list = gtk::Box::builder()
        .orientation(gtk::Orientation::Vertical)
        .spacing(2)
        .margin_start(4)
        .build();

    for (i, item) in items.iter().enumerate() {
        let row = gtk::Box::builder()
            .orientation(gtk::Orientation::Horizontal)
            .spacing(6)
            .build();

        let marker = match start {
            Some(first) => format!("{}.", first + i as u64),
            None => "\u{2022}".to_string(),
        };
        row.append(
            &gtk::Label::builder()
                .label(marker)
                .valign(gtk::Align::Start)
                .build(),
        );

        let body = gtk::Box::builder()
            .orientation(gtk::Orientation::Vertical)
            .spacing(2)
            .hexpand(true)
            .build();
        for block in item {
            body.append(&block_widget(block));
        }
        row.append(&body);
        list.append(&row);
    }

    list.upcast()
}

fn table(head: &[Vec<Span>], rows: &[Vec<Vec<Span>>]) -> gtk::Widget {
    let grid = gtk::Grid::builder()
        .column_spacing(16)
        .row_spacing(4)
        .margin_top(4)
        .margin_bottom(4)
        .build();
    grid.add_css_class("md-table");

    for (col, cell) in head.iter().enumerate() {
        let label = rich_label(cell);
        label.add_css_class("md-table-head");
        grid.attach(&label, col as i32, 0, 1, 1);
    }
    for (row, cells) in rows.iter().enumerate() {
        for (col, cell) in cells.iter().enumerate() {
            grid.attach(&rich_label(cell), col as i32, row as i32 + 1, 1, 1);
        }
    }

    grid.upcast()
}
