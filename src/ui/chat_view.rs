use adw::prelude::*;
use relm4::factory::FactoryVecDeque;
use relm4::prelude::*;

use lmchat::config;
use lmchat::models::Message;

use crate::ui::input_area::{InputArea, InputAreaMsg, InputAreaOutput};
use crate::ui::message_widget::{
    MessageInit, MessageWidget, MessageWidgetMsg, MessageWidgetOutput,
};

pub struct ChatView {
    messages: FactoryVecDeque<MessageWidget>,
    input_area: Controller<InputArea>,
    scrolled_window: gtk::ScrolledWindow,
    is_empty: bool,
    error: Option<String>,
    user_scrolled_up: bool,
}

#[derive(Debug)]
pub enum ChatViewMsg {
    /// Replace the transcript. `streaming` marks the last message as the
    /// reply still being played back.
    ShowMessages {
        messages: Vec<Message>,
        streaming: bool,
    },
    RevealLast(String),
    StreamEnded,
    SetLoading(bool),
    SetConnected(bool),
    SetError(Option<String>),
    DismissError,
    UserSend(String),
    Stop,
    CopyToClipboard(String),
    ScrollToBottom,
    ScrollPositionChanged,
}

#[derive(Debug)]
pub enum ChatViewOutput {
    Send(String),
    Stop,
    DismissError,
}

#[relm4::component(pub)]
impl Component for ChatView {
    type Init = ();
    type Input = ChatViewMsg;
    type Output = ChatViewOutput;
    type CommandOutput = ();

    view! {
        gtk::Box {
            set_orientation: gtk::Orientation::Vertical,
            set_vexpand: true,

            adw::Banner {
                set_button_label: Some("Dismiss"),
                #[watch]
                set_title: model.error.as_deref().unwrap_or_default(),
                #[watch]
                set_revealed: model.error.is_some(),
                connect_button_clicked => ChatViewMsg::DismissError,
            },

            #[local_ref]
            empty_page -> adw::StatusPage {
                set_vexpand: true,
                #[watch]
                set_visible: model.is_empty,
            },

            gtk::Overlay {
                set_vexpand: true,
                #[watch]
                set_visible: !model.is_empty,

                #[local_ref]
                scrolled_window -> gtk::ScrolledWindow {
                    set_vexpand: true,
                    set_hscrollbar_policy: gtk::PolicyType::Never,

                    #[local_ref]
                    message_list -> gtk::Box {
                        set_orientation: gtk::Orientation::Vertical,
                        set_margin_top: 8,
                        set_margin_bottom: 8,
                        set_margin_start: 16,
                        set_margin_end: 16,
                    },
                },

                add_overlay = &gtk::Button {
                    set_icon_name: "go-down-symbolic",
                    set_tooltip_text: Some("Scroll to bottom"),
                    set_halign: gtk::Align::Center,
                    set_valign: gtk::Align::End,
                    set_margin_bottom: 12,
                    add_css_class: "circular",
                    add_css_class: "osd",
                    #[watch]
                    set_visible: model.user_scrolled_up,
                    connect_clicked => ChatViewMsg::ScrollToBottom,
                },
            },

            gtk::Separator {
                set_orientation: gtk::Orientation::Horizontal,
            },

            model.input_area.widget().clone(),
        }
    }

    fn init(
        _init: Self::Init,
        root: Self::Root,
        sender: ComponentSender<Self>,
    ) -> ComponentParts<Self> {
        let messages = FactoryVecDeque::builder()
            .launch(gtk::Box::default())
            .forward(sender.input_sender(), |output| match output {
                MessageWidgetOutput::Copy(text) => ChatViewMsg::CopyToClipboard(text),
            });

        let input_area = InputArea::builder()
            .launch(())
            .forward(sender.input_sender(), |output| match output {
                InputAreaOutput::Send(text) => ChatViewMsg::UserSend(text),
                InputAreaOutput::Stop => ChatViewMsg::Stop,
            });

        let suggestions = gtk::FlowBox::builder()
            .selection_mode(gtk::SelectionMode::None)
            .max_children_per_line(2)
            .min_children_per_line(1)
            .column_spacing(8)
            .row_spacing(8)
            .halign(gtk::Align::Center)
            .build();
        for (label, icon) in config::SUGGESTIONS {
            let button = gtk::Button::builder()
                .label(format!("{}  {}", icon, label))
                .build();
            button.add_css_class("suggestion");
            button.add_css_class("card");
            let sender_suggestion = sender.input_sender().clone();
            let prompt = label.to_string();
            button.connect_clicked(move |_| {
                sender_suggestion.emit(ChatViewMsg::UserSend(prompt.clone()));
            });
            suggestions.insert(&button, -1);
        }

        let empty_page = adw::StatusPage::builder()
            .icon_name("user-available-symbolic")
            .title("How can I help you today?")
            .description("Ask about AI tools, coding, or software")
            .child(&suggestions)
            .build();

        let scrolled_window = gtk::ScrolledWindow::new();

        let model = Self {
            messages,
            input_area,
            scrolled_window: scrolled_window.clone(),
            is_empty: true,
            error: None,
            user_scrolled_up: false,
        };

        let message_list = model.messages.widget();
        let widgets = view_output!();

        let sender_scroll = sender.input_sender().clone();
        scrolled_window.vadjustment().connect_value_changed(move |_| {
            sender_scroll.emit(ChatViewMsg::ScrollPositionChanged);
        });

        ComponentParts { model, widgets }
    }

    fn update(&mut self, msg: Self::Input, sender: ComponentSender<Self>, _root: &Self::Root) {
        match msg {
            ChatViewMsg::ShowMessages {
                messages,
                streaming,
            } => {
                self.is_empty = messages.is_empty();

                let last = messages.len().saturating_sub(1);
                let mut guard = self.messages.guard();
                guard.clear();
                for (i, message) in messages.into_iter().enumerate() {
                    guard.push_back(MessageInit {
                        message,
                        streaming: streaming && i == last,
                    });
                }
                drop(guard);
                sender.input(ChatViewMsg::ScrollToBottom);
            }
            ChatViewMsg::RevealLast(text) => {
                if let Some(last) = self.messages.len().checked_sub(1) {
                    self.messages.send(last, MessageWidgetMsg::Reveal(text));
                }
                self.follow_output(&sender);
            }
            ChatViewMsg::StreamEnded => {
                if let Some(last) = self.messages.len().checked_sub(1) {
                    self.messages.send(last, MessageWidgetMsg::SetStreaming(false));
                }
            }
            ChatViewMsg::SetLoading(loading) => {
                self.input_area.emit(InputAreaMsg::SetSending(loading));
            }
            ChatViewMsg::SetConnected(connected) => {
                self.input_area.emit(InputAreaMsg::SetEnabled(connected));
            }
            ChatViewMsg::SetError(error) => self.error = error,
            ChatViewMsg::DismissError => {
                self.error = None;
                let _ = sender.output(ChatViewOutput::DismissError);
            }
            ChatViewMsg::UserSend(text) => {
                let _ = sender.output(ChatViewOutput::Send(text));
            }
            ChatViewMsg::Stop => {
                let _ = sender.output(ChatViewOutput::Stop);
            }
            ChatViewMsg::CopyToClipboard(text) => {
                if let Some(display) = gtk::gdk::Display::default() {
                    display.clipboard().set_text(&text);
                }
            }
            ChatViewMsg::ScrollToBottom => {
                self.user_scrolled_up = false;
                let adj = self.scrolled_window.vadjustment();
                glib::idle_add_local_once(move || {
                    adj.set_value(adj.upper());
                });
            }
            ChatViewMsg::ScrollPositionChanged => {
                self.user_scrolled_up = !self.at_bottom();
            }
        }
    }
}

impl ChatView {
    fn at_bottom(&self) -> bool {
        let adj = self.scrolled_window.vadjustment();
        adj.value() >= adj.upper() - adj.page_size() - 50.0
    }

    /// Keep the newest text in view unless the user scrolled away.
    fn follow_output(&mut self, sender: &ComponentSender<Self>) {
        self.user_scrolled_up = !self.at_bottom();
        if !self.user_scrolled_up {
            sender.input(ChatViewMsg::ScrollToBottom);
        }
    }
}
