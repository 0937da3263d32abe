use gtk::prelude::*;
use relm4::prelude::*;

pub struct InputArea {
    buffer: gtk::TextBuffer,
    sending: bool,
    enabled: bool,
    has_text: bool,
}

#[derive(Debug)]
pub enum InputAreaMsg {
    SendClicked,
    StopClicked,
    SetSending(bool),
    /// Disabled while the server is unreachable.
    SetEnabled(bool),
    TextChanged,
}

#[derive(Debug)]
pub enum InputAreaOutput {
    Send(String),
    Stop,
}

#[relm4::component(pub)]
impl Component for InputArea {
    type Init = ();
    type Input = InputAreaMsg;
    type Output = InputAreaOutput;
    type CommandOutput = ();

    view! {
        gtk::Box {
            set_orientation: gtk::Orientation::Horizontal,
            set_spacing: 4,
            set_margin_top: 8,
            set_margin_bottom: 8,
            set_margin_start: 12,
            set_margin_end: 12,
            add_css_class: "input-card",

            gtk::ScrolledWindow {
                set_hexpand: true,
                set_max_content_height: 150,
                set_propagate_natural_height: true,
                set_min_content_height: 40,

                #[name = "text_view"]
                gtk::TextView {
                    set_wrap_mode: gtk::WrapMode::WordChar,
                    set_accepts_tab: false,
                    set_top_margin: 8,
                    set_bottom_margin: 8,
                    set_left_margin: 8,
                    set_right_margin: 8,
                    set_buffer: Some(&model.buffer),
                    #[watch]
                    set_sensitive: model.enabled && !model.sending,
                },
            },

            gtk::Button {
                set_icon_name: "go-up-symbolic",
                set_tooltip_text: Some("Send message (Enter)"),
                set_valign: gtk::Align::End,
                set_margin_bottom: 4,
                set_margin_end: 4,
                add_css_class: "suggested-action",
                add_css_class: "circular",
                #[watch]
                set_visible: !model.sending,
                #[watch]
                set_sensitive: model.enabled && model.has_text,
                connect_clicked => InputAreaMsg::SendClicked,
            },

            gtk::Button {
                set_icon_name: "media-playback-stop-symbolic",
                set_tooltip_text: Some("Stop generating (Esc)"),
                set_valign: gtk::Align::End,
                set_margin_bottom: 4,
                set_margin_end: 4,
                add_css_class: "destructive-action",
                add_css_class: "circular",
                #[watch]
                set_visible: model.sending,
                connect_clicked => InputAreaMsg::StopClicked,
            },
        }
    }

    fn init(
        _init: Self::Init,
        root: Self::Root,
        sender: ComponentSender<Self>,
    ) -> ComponentParts<Self> {
        let buffer = gtk::TextBuffer::new(None::<&gtk::TextTagTable>);

        let model = Self {
            buffer: buffer.clone(),
            sending: false,
            enabled: false,
            has_text: false,
        };

        let widgets = view_output!();

        // Enter sends, Shift+Enter inserts a newline.
        let sender_key = sender.clone();
        let key_controller = gtk::EventControllerKey::new();
        key_controller.connect_key_pressed(move |_, key, _code, modifier| {
            let is_enter = key == gtk::gdk::Key::Return || key == gtk::gdk::Key::KP_Enter;
            if is_enter && !modifier.contains(gtk::gdk::ModifierType::SHIFT_MASK) {
                sender_key.input(InputAreaMsg::SendClicked);
                gtk::glib::Propagation::Stop
            } else {
                gtk::glib::Propagation::Proceed
            }
        });
        widgets.text_view.add_controller(key_controller);

        let sender_buf = sender.clone();
        buffer.connect_changed(move |_| {
            sender_buf.input(InputAreaMsg::TextChanged);
        });

        ComponentParts { model, widgets }
    }

    fn update(&mut self, msg: Self::Input, sender: ComponentSender<Self>, _root: &Self::Root) {
        match msg {
            InputAreaMsg::SendClicked => {
                let text = self.text();
                let trimmed = text.trim();
                if trimmed.is_empty() || self.sending || !self.enabled {
                    return;
                }
                let _ = sender.output(InputAreaOutput::Send(trimmed.to_string()));
                self.buffer.set_text("");
            }
            InputAreaMsg::StopClicked => {
                let _ = sender.output(InputAreaOutput::Stop);
            }
            InputAreaMsg::SetSending(sending) => self.sending = sending,
            InputAreaMsg::SetEnabled(enabled) => self.enabled = enabled,
            InputAreaMsg::TextChanged => {
                self.has_text = !self.text().trim().is_empty();
            }
        }
    }
}

impl InputArea {
    fn text(&self) -> String {
        let (start, end) = self.buffer.bounds();
        self.buffer.text(&start, &end, false).to_string()
    }
}
