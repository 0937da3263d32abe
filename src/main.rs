mod app;
mod ui;

use gtk::prelude::*;
use relm4::prelude::*;
use tracing_subscriber::EnvFilter;

use app::App;
use lmchat::config::APP_ID;

const STYLE: &str = include_str!("../data/style.css");

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let app = adw::Application::builder().application_id(APP_ID).build();

    app.connect_startup(|_| {
        let Some(display) = gtk::gdk::Display::default() else {
            tracing::warn!("No default display; skipping stylesheet");
            return;
        };

        let provider = gtk::CssProvider::new();
        provider.load_from_string(STYLE);
        gtk::style_context_add_provider_for_display(
            &display,
            &provider,
            gtk::STYLE_PROVIDER_PRIORITY_APPLICATION,
        );
    });

    RelmApp::from_app(app).run_async::<App>(());
}
