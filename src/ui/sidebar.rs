use adw::prelude::*;
use relm4::factory::FactoryVecDeque;
use relm4::prelude::*;

use lmchat::providers::ModelInfo;
use lmchat::state::Connection;

/// What a session row needs to draw itself.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    /// False for the session a reply is streaming into.
    pub deletable: bool,
}

// --- SessionRow factory component ---

#[derive(Debug)]
pub struct SessionRow {
    summary: SessionSummary,
}

#[derive(Debug)]
pub enum SessionRowOutput {
    Delete(String),
}

#[relm4::factory(pub)]
impl FactoryComponent for SessionRow {
    type Init = SessionSummary;
    type Input = ();
    type Output = SessionRowOutput;
    type CommandOutput = ();
    type ParentWidget = gtk::ListBox;

    view! {
        gtk::Box {
            set_orientation: gtk::Orientation::Horizontal,
            set_spacing: 4,
            set_margin_all: 6,

            gtk::Label {
                set_label: &self.summary.title,
                set_halign: gtk::Align::Start,
                set_hexpand: true,
                set_ellipsize: gtk::pango::EllipsizeMode::End,
                set_max_width_chars: 30,
            },

            gtk::Button {
                set_icon_name: "user-trash-symbolic",
                set_tooltip_text: Some("Delete chat"),
                add_css_class: "flat",
                add_css_class: "circular",
                set_sensitive: self.summary.deletable,
                connect_clicked[sender, id = self.summary.id.clone()] => move |_| {
                    let _ = sender.output(SessionRowOutput::Delete(id.clone()));
                },
            },
        }
    }

    fn init_model(summary: Self::Init, _index: &DynamicIndex, _sender: FactorySender<Self>) -> Self {
        Self { summary }
    }
}

// --- Sidebar component ---

pub struct Sidebar {
    sessions: FactoryVecDeque<SessionRow>,
    loading: bool,
    connection: Connection,
    model_list: gtk::StringList,
    model_paths: Vec<String>,
    model_dropdown: gtk::DropDown,
    url_buffer: gtk::EntryBuffer,
}

#[derive(Debug)]
pub enum SidebarMsg {
    SetSessions {
        sessions: Vec<SessionSummary>,
        active_id: String,
    },
    SetLoading(bool),
    SetConnection(Connection),
    SetModels {
        models: Vec<ModelInfo>,
        selected: Option<String>,
    },
    SetServerUrl(String),
    NewChat,
    RowActivated(usize),
    Delete(String),
    ModelChanged(u32),
    SaveUrl,
    Refresh,
}

#[derive(Debug)]
pub enum SidebarOutput {
    NewChat,
    SelectSession(String),
    DeleteSession(String),
    SelectModel(String),
    SaveServerUrl(String),
    Refresh,
}

#[relm4::component(pub)]
impl Component for Sidebar {
    type Init = ();
    type Input = SidebarMsg;
    type Output = SidebarOutput;
    type CommandOutput = ();

    view! {
        adw::ToolbarView {
            add_top_bar = &adw::HeaderBar {
                set_show_end_title_buttons: false,

                pack_start = &gtk::Button {
                    set_icon_name: "list-add-symbolic",
                    set_tooltip_text: Some("New Chat (Ctrl+N)"),
                    #[watch]
                    set_sensitive: !model.loading,
                    connect_clicked => SidebarMsg::NewChat,
                },

                #[wrap(Some)]
                set_title_widget = &adw::WindowTitle {
                    set_title: "Chats",
                },
            },

            #[wrap(Some)]
            set_content = &gtk::Box {
                set_orientation: gtk::Orientation::Vertical,

                gtk::ScrolledWindow {
                    set_hscrollbar_policy: gtk::PolicyType::Never,
                    set_vexpand: true,

                    #[local_ref]
                    session_list -> gtk::ListBox {
                        set_selection_mode: gtk::SelectionMode::Single,
                        add_css_class: "navigation-sidebar",
                    },
                },

                gtk::Separator {},

                gtk::Box {
                    set_orientation: gtk::Orientation::Vertical,
                    set_spacing: 8,
                    set_margin_all: 12,

                    gtk::Box {
                        set_orientation: gtk::Orientation::Horizontal,
                        set_spacing: 8,

                        gtk::Box {
                            set_valign: gtk::Align::Center,
                            add_css_class: "status-dot",
                            #[watch]
                            set_css_classes: &["status-dot", status_class(model.connection)],
                        },

                        gtk::Label {
                            set_halign: gtk::Align::Start,
                            set_hexpand: true,
                            add_css_class: "caption",
                            #[watch]
                            set_label: status_text(model.connection),
                        },

                        gtk::Button {
                            set_icon_name: "view-refresh-symbolic",
                            set_tooltip_text: Some("Reconnect"),
                            add_css_class: "flat",
                            add_css_class: "circular",
                            connect_clicked => SidebarMsg::Refresh,
                        },
                    },

                    #[local_ref]
                    model_dropdown -> gtk::DropDown {
                        set_tooltip_text: Some("Model"),
                        #[watch]
                        set_sensitive: !model.model_paths.is_empty() && !model.loading,
                    },

                    gtk::Label {
                        set_label: "Server URL",
                        set_halign: gtk::Align::Start,
                        add_css_class: "caption",
                        add_css_class: "dim-label",
                    },

                    gtk::Box {
                        set_orientation: gtk::Orientation::Horizontal,
                        add_css_class: "linked",

                        gtk::Entry {
                            set_hexpand: true,
                            set_buffer: &model.url_buffer,
                            set_placeholder_text: Some(lmchat::config::DEFAULT_SERVER_URL),
                            connect_activate => SidebarMsg::SaveUrl,
                        },

                        gtk::Button {
                            set_label: "Save",
                            connect_clicked => SidebarMsg::SaveUrl,
                        },
                    },
                },
            },
        }
    }

    fn init(
        _init: Self::Init,
        root: Self::Root,
        sender: ComponentSender<Self>,
    ) -> ComponentParts<Self> {
        let sessions = FactoryVecDeque::builder()
            .launch(gtk::ListBox::default())
            .forward(sender.input_sender(), |output| match output {
                SessionRowOutput::Delete(id) => SidebarMsg::Delete(id),
            });

        let model_list = gtk::StringList::new(&[]);
        let model_dropdown =
            gtk::DropDown::new(Some(model_list.clone()), None::<gtk::Expression>);

        let model = Self {
            sessions,
            loading: false,
            connection: Connection::Checking,
            model_list,
            model_paths: Vec::new(),
            model_dropdown: model_dropdown.clone(),
            url_buffer: gtk::EntryBuffer::default(),
        };

        let session_list = model.sessions.widget();
        let model_dropdown = &model.model_dropdown;
        let widgets = view_output!();

        let sender_row = sender.clone();
        model.sessions.widget().connect_row_activated(move |_, row| {
            sender_row.input(SidebarMsg::RowActivated(row.index() as usize));
        });

        let sender_model = sender.clone();
        model.model_dropdown.connect_selected_notify(move |dropdown| {
            sender_model.input(SidebarMsg::ModelChanged(dropdown.selected()));
        });

        ComponentParts { model, widgets }
    }

    fn update(&mut self, msg: Self::Input, sender: ComponentSender<Self>, _root: &Self::Root) {
        match msg {
            SidebarMsg::SetSessions {
                sessions,
                active_id,
            } => {
                let active = sessions.iter().position(|s| s.id == active_id);
                let mut guard = self.sessions.guard();
                guard.clear();
                for summary in sessions {
                    guard.push_back(summary);
                }
                drop(guard);

                let list = self.sessions.widget();
                match active.and_then(|i| list.row_at_index(i as i32)) {
                    Some(row) => list.select_row(Some(&row)),
                    None => list.unselect_all(),
                }
            }
            SidebarMsg::SetLoading(loading) => self.loading = loading,
            SidebarMsg::SetConnection(connection) => self.connection = connection,
            SidebarMsg::SetModels { models, selected } => {
                let names: Vec<&str> = models.iter().map(ModelInfo::display_name).collect();
                self.model_paths = models.iter().map(|m| m.path.clone()).collect();
                self.model_list
                    .splice(0, self.model_list.n_items(), &names);

                let index = selected
                    .and_then(|path| self.model_paths.iter().position(|p| *p == path))
                    .unwrap_or(0);
                if !self.model_paths.is_empty() {
                    self.model_dropdown.set_selected(index as u32);
                }
            }
            SidebarMsg::SetServerUrl(url) => self.url_buffer.set_text(url),
            SidebarMsg::NewChat => {
                let _ = sender.output(SidebarOutput::NewChat);
            }
            SidebarMsg::RowActivated(index) => {
                let id = self.sessions.get(index).map(|row| row.summary.id.clone());
                if let Some(id) = id {
                    let _ = sender.output(SidebarOutput::SelectSession(id));
                }
            }
            SidebarMsg::Delete(id) => {
                let _ = sender.output(SidebarOutput::DeleteSession(id));
            }
            SidebarMsg::ModelChanged(index) => {
                if let Some(path) = self.model_paths.get(index as usize) {
                    let _ = sender.output(SidebarOutput::SelectModel(path.clone()));
                }
            }
            SidebarMsg::SaveUrl => {
                let url = self.url_buffer.text().trim().to_string();
                if !url.is_empty() {
                    let _ = sender.output(SidebarOutput::SaveServerUrl(url));
                }
            }
            SidebarMsg::Refresh => {
                let _ = sender.output(SidebarOutput::Refresh);
            }
        }
    }
}

fn status_class(connection: Connection) -> &'static str {
    match connection {
        Connection::Checking => "checking",
        Connection::Connected => "connected",
        Connection::Failed => "failed",
    }
}

fn status_text(connection: Connection) -> &'static str {
    match connection {
        Connection::Checking => "Connecting\u{2026}",
        Connection::Connected => "Connected",
        Connection::Failed => "Disconnected",
    }
}
