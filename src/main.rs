#![windows_subsystem = "windows"]

mod app;
mod ui;

use app::App;

fn main() -> iced::Result {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    iced::application(App::title, App::update, App::view)
        .subscription(App::subscription)
        .theme(App::theme)
        .exit_on_close_request(false)
        .window_size((1000.0, 720.0))
        .run_with(App::new)
}
