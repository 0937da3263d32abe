use std::sync::Arc;

use adw::prelude::*;
use relm4::prelude::*;
use tokio_util::sync::CancellationToken;

use lmchat::config;
use lmchat::models::Session;
use lmchat::providers::{LmStudioProvider, ModelInfo, ModelServer, ProviderError};
use lmchat::services::chat::{self, ChatDispatchParams, ChatEvent};
use lmchat::services::title::{self, TitleParams};
use lmchat::services::{Database, PersistHandle, SessionStore, SettingsService};
use lmchat::state::{AppState, SendPlan};

use crate::ui::chat_view::{ChatView, ChatViewMsg, ChatViewOutput};
use crate::ui::sidebar::{SessionSummary, Sidebar, SidebarMsg, SidebarOutput};

pub struct App {
    state: AppState,
    db: Option<Database>,
    persist: Option<PersistHandle>,
    server: Arc<dyn ModelServer>,
    cancel: Option<CancellationToken>,
    sidebar: Controller<Sidebar>,
    chat_view: Controller<ChatView>,
    connection_banner: adw::Banner,
    content_title: adw::WindowTitle,
    toast_overlay: adw::ToastOverlay,
}

#[derive(Debug)]
pub enum AppMsg {
    NewChat,
    SelectSession(String),
    DeleteSession(String),
    Send(String),
    Stop,
    SelectModel(String),
    SaveServerUrl(String),
    Refresh,
    DismissError,
}

#[derive(Debug)]
pub enum AppCmd {
    Initialized {
        db: Database,
        sessions: Vec<Session>,
        server_url: String,
    },
    InitFailed(String),
    ModelsLoaded {
        url: String,
        models: Vec<ModelInfo>,
    },
    ConnectionFailed {
        url: String,
        error: ProviderError,
    },
    Chat {
        stream_id: u64,
        event: ChatEvent,
    },
    TitleGenerated {
        session_id: String,
        title: String,
    },
}

#[relm4::component(pub, async)]
impl AsyncComponent for App {
    type Init = ();
    type Input = AppMsg;
    type Output = ();
    type CommandOutput = AppCmd;

    view! {
        adw::ApplicationWindow {
            set_title: Some(config::APP_NAME),
            set_default_width: 1100,
            set_default_height: 760,
            set_width_request: 360,
            set_height_request: 480,

            #[local_ref]
            toast_overlay -> adw::ToastOverlay {},
        }
    }

    async fn init(
        _init: Self::Init,
        root: Self::Root,
        sender: AsyncComponentSender<Self>,
    ) -> AsyncComponentParts<Self> {
        let sidebar = Sidebar::builder()
            .launch(())
            .forward(sender.input_sender(), |output| match output {
                SidebarOutput::NewChat => AppMsg::NewChat,
                SidebarOutput::SelectSession(id) => AppMsg::SelectSession(id),
                SidebarOutput::DeleteSession(id) => AppMsg::DeleteSession(id),
                SidebarOutput::SelectModel(path) => AppMsg::SelectModel(path),
                SidebarOutput::SaveServerUrl(url) => AppMsg::SaveServerUrl(url),
                SidebarOutput::Refresh => AppMsg::Refresh,
            });

        let chat_view = ChatView::builder()
            .launch(())
            .forward(sender.input_sender(), |output| match output {
                ChatViewOutput::Send(text) => AppMsg::Send(text),
                ChatViewOutput::Stop => AppMsg::Stop,
                ChatViewOutput::DismissError => AppMsg::DismissError,
            });

        let toast_overlay = adw::ToastOverlay::new();
        toast_overlay.set_hexpand(true);
        toast_overlay.set_vexpand(true);

        // Stays up until the server answers.
        let connection_banner = adw::Banner::new("");
        connection_banner.set_button_label(Some("Retry"));
        let sender_retry = sender.input_sender().clone();
        connection_banner.connect_button_clicked(move |_| {
            sender_retry.emit(AppMsg::Refresh);
        });

        let content_box = gtk::Box::new(gtk::Orientation::Vertical, 0);
        content_box.append(&connection_banner);
        content_box.append(chat_view.widget());

        let content_title = adw::WindowTitle::new(config::APP_NAME, "");
        let content_header = adw::HeaderBar::new();
        content_header.set_title_widget(Some(&content_title));

        let content_toolbar = adw::ToolbarView::new();
        content_toolbar.add_top_bar(&content_header);
        content_toolbar.set_content(Some(&content_box));

        let content_page = adw::NavigationPage::builder()
            .title("Chat")
            .tag("content")
            .child(&content_toolbar)
            .build();

        let sidebar_page = adw::NavigationPage::builder()
            .title("Chats")
            .tag("sidebar")
            .child(sidebar.widget())
            .build();

        let split_view = adw::NavigationSplitView::new();
        split_view.set_min_sidebar_width(220.0);
        split_view.set_max_sidebar_width(320.0);
        split_view.set_sidebar(Some(&sidebar_page));
        split_view.set_content(Some(&content_page));

        match adw::BreakpointCondition::parse("max-width: 600px") {
            Ok(condition) => {
                let breakpoint = adw::Breakpoint::new(condition);
                breakpoint.add_setter(&split_view, "collapsed", Some(&true.to_value()));
                root.add_breakpoint(breakpoint);
            }
            Err(e) => tracing::warn!("Invalid breakpoint condition: {}", e),
        }

        toast_overlay.set_child(Some(&split_view));

        let model = App {
            state: AppState::new(Vec::new(), config::DEFAULT_SERVER_URL.to_string()),
            db: None,
            persist: None,
            server: Arc::new(LmStudioProvider::new()),
            cancel: None,
            sidebar,
            chat_view,
            connection_banner,
            content_title,
            toast_overlay: toast_overlay.clone(),
        };

        let widgets = view_output!();

        let app = relm4::main_adw_application();

        let sender_new = sender.input_sender().clone();
        let new_chat_action = gio::SimpleAction::new("new-chat", None);
        new_chat_action.connect_activate(move |_, _| {
            sender_new.emit(AppMsg::NewChat);
        });
        app.add_action(&new_chat_action);
        app.set_accels_for_action("app.new-chat", &["<Control>n"]);

        let sender_stop = sender.input_sender().clone();
        let stop_action = gio::SimpleAction::new("stop-generation", None);
        stop_action.connect_activate(move |_, _| {
            sender_stop.emit(AppMsg::Stop);
        });
        app.add_action(&stop_action);
        app.set_accels_for_action("app.stop-generation", &["Escape"]);

        sender.command(|out, _| {
            Box::pin(async move {
                let cmd = match Self::load_storage().await {
                    Ok((db, sessions, server_url)) => AppCmd::Initialized {
                        db,
                        sessions,
                        server_url,
                    },
                    Err(e) => AppCmd::InitFailed(format!("{:#}", e)),
                };
                let _ = out.send(cmd);
            })
        });

        AsyncComponentParts { model, widgets }
    }

    async fn update(
        &mut self,
        msg: Self::Input,
        sender: AsyncComponentSender<Self>,
        _root: &Self::Root,
    ) {
        match msg {
            AppMsg::NewChat => {
                if self.state.new_chat().is_some() {
                    self.persist_changes();
                    self.sync_sessions();
                    self.sync_chat();
                }
            }
            AppMsg::SelectSession(id) => {
                if self.state.switch_session(&id) {
                    self.sync_chat();
                }
                // Puts the list selection back when the switch was refused.
                self.sync_sessions();
            }
            AppMsg::DeleteSession(id) => {
                if self.state.delete_session(&id) {
                    self.persist_changes();
                    self.sync_sessions();
                    self.sync_chat();
                }
            }
            AppMsg::Send(text) => {
                let Some(plan) = self.state.begin_send(&text) else {
                    return;
                };
                self.persist_changes();
                self.sync_sessions();
                self.sync_chat();
                self.sync_loading();
                self.dispatch(plan, &sender);
            }
            AppMsg::Stop => {
                if let Some(token) = self.cancel.take() {
                    token.cancel();
                }
                if self.state.stop() {
                    self.chat_view.emit(ChatViewMsg::StreamEnded);
                    self.persist_changes();
                    self.sync_sessions();
                    self.sync_loading();
                }
            }
            AppMsg::SelectModel(path) => {
                if self.state.select_model(&path) {
                    tracing::debug!("Selected model {}", path);
                }
            }
            AppMsg::SaveServerUrl(url) => {
                if url == self.state.server_url() && self.state.is_connected() {
                    return;
                }
                self.state.set_server_url(url.clone());
                if let Some(db) = self.db.clone() {
                    sender.command(move |_out, _| {
                        Box::pin(async move {
                            if let Err(e) = SettingsService::save_server_url(&db, &url).await {
                                tracing::error!("Failed to save server URL: {:#}", e);
                            }
                        })
                    });
                }
                self.show_toast("Server URL saved");
                self.sync_connection();
                self.check_connection(&sender);
            }
            AppMsg::Refresh => {
                let url = self.state.server_url().to_string();
                self.state.set_server_url(url);
                self.sync_connection();
                self.check_connection(&sender);
            }
            AppMsg::DismissError => self.state.dismiss_error(),
        }
    }

    async fn update_cmd(
        &mut self,
        msg: Self::CommandOutput,
        sender: AsyncComponentSender<Self>,
        _root: &Self::Root,
    ) {
        match msg {
            AppCmd::Initialized {
                db,
                sessions,
                server_url,
            } => {
                tracing::info!("Loaded {} chat sessions", sessions.len());
                self.attach_storage(db, AppState::new(sessions, server_url));
                self.sidebar
                    .emit(SidebarMsg::SetServerUrl(self.state.server_url().to_string()));
                self.sync_all();
                self.check_connection(&sender);
            }
            AppCmd::InitFailed(err) => {
                tracing::error!("Failed to open storage: {}", err);
                self.show_toast("Could not open chat storage; chats will not be kept");
                match Database::new_in_memory() {
                    Ok(db) => {
                        let sessions = SessionStore::load(&db).await;
                        let url = config::DEFAULT_SERVER_URL.to_string();
                        self.attach_storage(db, AppState::new(sessions, url));
                    }
                    Err(e) => tracing::error!("Failed to create in-memory storage: {:#}", e),
                }
                self.sidebar
                    .emit(SidebarMsg::SetServerUrl(self.state.server_url().to_string()));
                self.sync_all();
                self.check_connection(&sender);
            }
            AppCmd::ModelsLoaded { url, models } => {
                if url != self.state.server_url() {
                    return;
                }
                tracing::info!("{} offers {} models", url, models.len());
                self.state.set_models(models);
                self.sync_connection();
            }
            AppCmd::ConnectionFailed { url, error } => {
                if url != self.state.server_url() {
                    return;
                }
                tracing::warn!("Could not reach {}: {}", url, error);
                self.state.connection_failed(&error);
                self.sync_connection();
            }
            AppCmd::Chat { stream_id, event } => self.handle_chat_event(stream_id, event),
            AppCmd::TitleGenerated { session_id, title } => {
                if self.state.retitle(&session_id, title) {
                    self.persist_changes();
                    self.sync_sessions();
                }
            }
        }
    }
}

impl App {
    async fn load_storage() -> anyhow::Result<(Database, Vec<Session>, String)> {
        let db = Database::new().await?;
        let sessions = SessionStore::load(&db).await;
        let server_url = SettingsService::load_server_url(&db).await;
        Ok((db, sessions, server_url))
    }

    fn attach_storage(&mut self, db: Database, state: AppState) {
        let (persist, writer) = PersistHandle::channel(db.clone());
        relm4::spawn(writer.run());
        self.state = state;
        self.db = Some(db);
        self.persist = Some(persist);
        self.persist_changes();
    }

    fn show_toast(&self, message: &str) {
        let toast = adw::Toast::new(message);
        toast.set_timeout(3);
        self.toast_overlay.add_toast(toast);
    }

    fn persist_changes(&mut self) {
        let Some(persist) = &self.persist else {
            return;
        };
        if let Some(snapshot) = self.state.take_snapshot() {
            persist.schedule(snapshot);
        }
    }

    fn check_connection(&self, sender: &AsyncComponentSender<Self>) {
        let server = self.server.clone();
        let url = self.state.server_url().to_string();
        sender.command(move |out, _| {
            Box::pin(async move {
                let cmd = match server.list_models(&url).await {
                    Ok(models) => AppCmd::ModelsLoaded { url, models },
                    Err(error) => AppCmd::ConnectionFailed { url, error },
                };
                let _ = out.send(cmd);
            })
        });
    }

    fn dispatch(&mut self, plan: SendPlan, sender: &AsyncComponentSender<Self>) {
        let model = self.state.current_model();
        let base_url = self.state.server_url().to_string();

        if plan.needs_title && self.state.is_connected() {
            if let Some(model) = model.clone() {
                let server = self.server.clone();
                let params = TitleParams {
                    session_id: plan.session_id.clone(),
                    base_url: base_url.clone(),
                    model,
                    prompt: plan.prompt.clone(),
                };
                sender.command(move |out, _| {
                    Box::pin(async move {
                        title::run_title_task(server, params, |session_id, title| {
                            let _ = out.send(AppCmd::TitleGenerated { session_id, title });
                        })
                        .await;
                    })
                });
            }
        }

        let cancel_token = CancellationToken::new();
        self.cancel = Some(cancel_token.clone());

        let server = self.server.clone();
        let stream_id = plan.stream_id;
        let params = ChatDispatchParams {
            base_url,
            model,
            history: plan.history,
        };
        sender.command(move |out, _| {
            Box::pin(async move {
                chat::run_streaming(
                    server,
                    params,
                    cancel_token,
                    config::PLAYBACK_TICK,
                    |event| {
                        let _ = out.send(AppCmd::Chat { stream_id, event });
                    },
                )
                .await;
            })
        });
    }

    fn handle_chat_event(&mut self, stream_id: u64, event: ChatEvent) {
        match event {
            ChatEvent::Reveal(text) => {
                // Written out when the reply ends.
                if self.state.reveal(stream_id, text.clone()) {
                    self.chat_view.emit(ChatViewMsg::RevealLast(text));
                }
            }
            ChatEvent::Finished(text) => {
                if self.state.finish_stream(stream_id, text.clone()) {
                    self.cancel = None;
                    self.chat_view.emit(ChatViewMsg::RevealLast(text));
                    self.chat_view.emit(ChatViewMsg::StreamEnded);
                    self.persist_changes();
                    self.sync_sessions();
                    self.sync_loading();
                }
            }
            ChatEvent::Failed(error) => {
                if self.state.fail_stream(stream_id, error) {
                    self.cancel = None;
                    self.persist_changes();
                    self.sync_sessions();
                    self.sync_chat();
                    self.sync_loading();
                }
            }
        }
    }

    fn sync_all(&self) {
        self.sync_sessions();
        self.sync_chat();
        self.sync_loading();
        self.sync_connection();
    }

    fn sync_sessions(&self) {
        let streaming = self.state.streaming_session_id();
        let sessions = self
            .state
            .sessions()
            .iter()
            .map(|s| SessionSummary {
                id: s.id.clone(),
                title: s.title.clone(),
                deletable: streaming != Some(s.id.as_str()),
            })
            .collect();
        self.sidebar.emit(SidebarMsg::SetSessions {
            sessions,
            active_id: self.state.active_id().to_string(),
        });

        if let Some(session) = self.state.active_session() {
            self.content_title.set_subtitle(&session.title);
        }
    }

    fn sync_chat(&self) {
        let streaming = self.state.streaming_session_id() == Some(self.state.active_id());
        let messages = self
            .state
            .visible_messages()
            .into_iter()
            .cloned()
            .collect();
        self.chat_view
            .emit(ChatViewMsg::ShowMessages { messages, streaming });
        self.chat_view
            .emit(ChatViewMsg::SetError(self.state.error().map(str::to_string)));
    }

    fn sync_loading(&self) {
        let loading = self.state.is_loading();
        self.sidebar.emit(SidebarMsg::SetLoading(loading));
        self.chat_view.emit(ChatViewMsg::SetLoading(loading));
    }

    fn sync_connection(&self) {
        match self.state.connection_banner() {
            Some(text) => {
                self.connection_banner.set_title(&text);
                self.connection_banner.set_revealed(true);
            }
            None => self.connection_banner.set_revealed(false),
        }

        self.sidebar
            .emit(SidebarMsg::SetConnection(self.state.connection()));
        self.sidebar.emit(SidebarMsg::SetModels {
            models: self.state.models().to_vec(),
            selected: self.state.selected_model().map(str::to_string),
        });
        self.chat_view
            .emit(ChatViewMsg::SetConnected(self.state.is_connected()));
    }
}
