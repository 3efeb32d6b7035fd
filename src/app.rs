use std::path::PathBuf;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use iced::futures::{SinkExt, Stream};
use iced::{window, Element, Subscription, Task, Theme};
use log::error;

use uart_assistant::connection::{DataBits, Parity, StopBits};
use uart_assistant::event::{self, Event, EventReceiver};
use uart_assistant::hex::DataFormat;
use uart_assistant::settings::{Settings, SettingsStore};
use uart_assistant::{file, serial, theme, Controller, Error};

const PORT_REFRESH: Duration = Duration::from_secs(2);
const INBOX_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Page {
    #[default]
    Terminal,
    Shortcuts,
    Settings,
}

#[derive(Debug, Clone)]
pub enum Message {
    Show(Page),

    // Connection
    RefreshPorts,
    PortsUpdated(Vec<String>),
    PortSelected(String),
    BaudSelected(u32),
    DataBitsSelected(DataBits),
    ParitySelected(Parity),
    StopBitsSelected(StopBits),
    ReceiveFormatSelected(DataFormat),
    SendFormatSelected(DataFormat),
    ToggleConnection,

    // Terminal
    TimestampToggled(bool),
    LineEndingToggled(bool),
    InputChanged(String),
    Send,
    ClearInput,
    ClearTerminal,
    AutoSendPeriodChanged(String),
    AutoSendToggled(bool),
    OpenFile,
    FileChosen(Option<PathBuf>),
    SaveLog,
    LogTargetChosen(Option<PathBuf>),

    // Shortcuts
    ShortcutEdited(usize, String),
    SendShortcut(usize),
    ExportShortcuts,
    ExportTargetChosen(Option<PathBuf>),
    ImportShortcuts,
    ImportSourceChosen(Option<PathBuf>),

    // Settings page
    Edit(SettingsEdit),
    ChooseAutosaveDir,
    AutosaveDirChosen(Option<PathBuf>),
    RestoreDefaults,
    ApplySettings,
    CommitSettings,
    CancelSettings,

    // Background
    Inbox(Event),
    CloseRequested(window::Id),
    DismissNotice,
}

/// Edits to the settings draft, applied only on Apply/OK.
#[derive(Debug, Clone)]
pub enum SettingsEdit {
    FontFamily(String),
    FontSize(u16),
    Theme(String),
    ReceiveFormat(DataFormat),
    SendFormat(DataFormat),
    Baud(u32),
    DataBits(DataBits),
    Parity(Parity),
    StopBits(StopBits),
    AutoSendMs(String),
    Timestamp(bool),
    LineEnding(bool),
    EchoSent(bool),
    AutoRefresh(bool),
    Autosave(bool),
    AutosaveInterval(String),
    Sniffer(bool),
    Head(String),
    Tail(String),
}

pub struct App {
    pub(crate) controller: Controller,
    inbox: EventReceiver,
    pub(crate) page: Page,
    pub(crate) ports: Vec<String>,
    pub(crate) selected_port: Option<String>,
    pub(crate) auto_send_period: String,
    pub(crate) draft: Settings,
    pub(crate) draft_auto_send: String,
    pub(crate) draft_autosave_interval: String,
    pub(crate) themes: Vec<String>,
    theme: Theme,
    pub(crate) notice: Option<String>,
}

impl App {
    pub fn new() -> (Self, Task<Message>) {
        let store = SettingsStore::beside_executable();
        let settings = store.load_or_default();
        let (tx, rx) = event::channel();
        let themes_dir = theme::themes_dir();

        let app = Self {
            controller: Controller::new(store, settings.clone(), tx),
            inbox: rx,
            page: Page::Terminal,
            ports: vec![],
            selected_port: None,
            auto_send_period: settings.auto_send_ms.to_string(),
            draft_auto_send: settings.auto_send_ms.to_string(),
            draft_autosave_interval: settings.autosave.interval_secs.to_string(),
            themes: theme::available(&themes_dir),
            theme: theme::resolve(&settings.theme, &themes_dir),
            draft: settings,
            notice: None,
        };

        (app, Task::done(Message::RefreshPorts))
    }

    pub fn title(&self) -> String {
        match self.controller.connection() {
            Some(config) => format!("UartAssistant - {}", config),
            None => "UartAssistant".to_string(),
        }
    }

    pub fn theme(&self) -> Theme {
        self.theme.clone()
    }

    fn report(&mut self, result: Result<(), Error>) {
        if let Err(e) = result {
            error!("{}", e);
            self.notice = Some(e.to_string());
        }
    }

    fn reset_draft(&mut self) {
        self.draft = self.controller.settings().clone();
        self.draft_auto_send = self.draft.auto_send_ms.to_string();
        self.draft_autosave_interval = self.draft.autosave.interval_secs.to_string();
    }

    fn apply_draft(&mut self) -> Result<(), Error> {
        let mut settings = self.draft.clone();
        settings.auto_send_ms = self
            .draft_auto_send
            .trim()
            .parse()
            .map_err(|_| Error::InvalidInterval(self.draft_auto_send.clone()))?;
        settings.autosave.interval_secs = self
            .draft_autosave_interval
            .trim()
            .parse()
            .map_err(|_| Error::InvalidInterval(self.draft_autosave_interval.clone()))?;

        self.controller.apply_settings(settings)?;
        let applied = self.controller.settings();
        self.theme = theme::resolve(&applied.theme, &theme::themes_dir());
        self.auto_send_period = applied.auto_send_ms.to_string();
        self.reset_draft();
        Ok(())
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Show(page) => {
                if page == Page::Settings && self.page != Page::Settings {
                    self.reset_draft();
                }
                self.page = page;
            }

            Message::RefreshPorts => {
                return Task::perform(async { serial::list_ports() }, Message::PortsUpdated);
            }
            Message::PortsUpdated(ports) => {
                self.ports = ports;
                let still_there = self
                    .selected_port
                    .as_ref()
                    .is_some_and(|p| self.ports.contains(p));
                if !still_there && !self.controller.is_open() {
                    self.selected_port = self.ports.first().cloned();
                }
            }
            Message::PortSelected(port) => self.selected_port = Some(port),
            Message::BaudSelected(baud) => self.controller.settings_mut().baud_rate = baud,
            Message::DataBitsSelected(bits) => self.controller.settings_mut().data_bits = bits,
            Message::ParitySelected(parity) => self.controller.settings_mut().parity = parity,
            Message::StopBitsSelected(bits) => self.controller.settings_mut().stop_bits = bits,
            Message::ReceiveFormatSelected(format) => {
                self.controller.settings_mut().receive_format = format;
            }
            Message::SendFormatSelected(format) => self.controller.settings_mut().send_format = format,
            Message::ToggleConnection => {
                if self.controller.is_open() {
                    self.controller.close();
                } else {
                    let result = self.controller.open(self.selected_port.as_deref());
                    self.report(result);
                }
            }

            Message::TimestampToggled(on) => self.controller.settings_mut().timestamp = on,
            Message::LineEndingToggled(on) => self.controller.settings_mut().line_ending = on,
            Message::InputChanged(input) => self.controller.set_input(input),
            Message::Send => {
                let result = self.controller.send_input();
                self.report(result);
            }
            Message::ClearInput => self.controller.set_input(String::new()),
            Message::ClearTerminal => self.controller.clear_scrollback(),
            Message::AutoSendPeriodChanged(period) => self.auto_send_period = period,
            Message::AutoSendToggled(true) => {
                let result = self.controller.start_auto_send(&self.auto_send_period);
                self.report(result);
            }
            Message::AutoSendToggled(false) => self.controller.stop_auto_send(),
            Message::OpenFile => return Task::perform(file::pick_file(), Message::FileChosen),
            Message::FileChosen(Some(path)) => {
                let result = self.controller.load_input_file(&path);
                self.report(result);
            }
            Message::SaveLog => {
                return Task::perform(file::pick_save_file("session_log.txt"), Message::LogTargetChosen);
            }
            Message::LogTargetChosen(Some(path)) => {
                let result = self.controller.save_log(&path);
                self.report(result);
            }

            Message::ShortcutEdited(index, text) => {
                let result = self.controller.shortcuts_mut().set(index, &text).map_err(Error::from);
                self.report(result);
            }
            Message::SendShortcut(index) => {
                let result = self.controller.send_shortcut(index);
                self.report(result);
            }
            Message::ExportShortcuts => {
                return Task::perform(file::pick_save_file("shortcuts.txt"), Message::ExportTargetChosen);
            }
            Message::ExportTargetChosen(Some(path)) => {
                let result = self.controller.export_shortcuts(&path);
                self.report(result);
            }
            Message::ImportShortcuts => {
                return Task::perform(file::pick_file(), Message::ImportSourceChosen);
            }
            Message::ImportSourceChosen(Some(path)) => {
                let result = self.controller.import_shortcuts(&path);
                self.report(result);
            }

            Message::Edit(edit) => self.edit_draft(edit),
            Message::ChooseAutosaveDir => {
                return Task::perform(file::pick_folder(), Message::AutosaveDirChosen);
            }
            Message::AutosaveDirChosen(Some(dir)) => self.draft.autosave.directory = Some(dir),
            Message::RestoreDefaults => {
                let extra = std::mem::take(&mut self.draft.extra);
                self.draft = Settings {
                    extra,
                    ..Settings::default()
                };
                self.draft_auto_send = self.draft.auto_send_ms.to_string();
                self.draft_autosave_interval = self.draft.autosave.interval_secs.to_string();
            }
            Message::ApplySettings => {
                let result = self.apply_draft();
                self.report(result);
            }
            Message::CommitSettings => match self.apply_draft() {
                Ok(()) => self.page = Page::Terminal,
                Err(e) => self.report(Err(e)),
            },
            Message::CancelSettings => {
                self.reset_draft();
                self.page = Page::Terminal;
            }

            Message::Inbox(event) => {
                let result = self.controller.handle_event(event);
                self.report(result);
            }
            Message::CloseRequested(id) => {
                self.controller.shutdown();
                return window::close(id);
            }
            Message::DismissNotice => self.notice = None,

            // dialog cancelled
            Message::FileChosen(None)
            | Message::LogTargetChosen(None)
            | Message::ExportTargetChosen(None)
            | Message::ImportSourceChosen(None)
            | Message::AutosaveDirChosen(None) => {}
        }

        Task::none()
    }

    fn edit_draft(&mut self, edit: SettingsEdit) {
        let d = &mut self.draft;
        match edit {
            SettingsEdit::FontFamily(family) => d.font_family = family,
            SettingsEdit::FontSize(size) => d.font_size = size,
            SettingsEdit::Theme(name) => d.theme = name,
            SettingsEdit::ReceiveFormat(format) => d.receive_format = format,
            SettingsEdit::SendFormat(format) => d.send_format = format,
            SettingsEdit::Baud(baud) => d.baud_rate = baud,
            SettingsEdit::DataBits(bits) => d.data_bits = bits,
            SettingsEdit::Parity(parity) => d.parity = parity,
            SettingsEdit::StopBits(bits) => d.stop_bits = bits,
            SettingsEdit::AutoSendMs(ms) => self.draft_auto_send = ms,
            SettingsEdit::Timestamp(on) => d.timestamp = on,
            SettingsEdit::LineEnding(on) => d.line_ending = on,
            SettingsEdit::EchoSent(on) => d.echo_sent = on,
            SettingsEdit::AutoRefresh(on) => d.auto_refresh_ports = on,
            SettingsEdit::Autosave(on) => d.autosave.enabled = on,
            SettingsEdit::AutosaveInterval(secs) => self.draft_autosave_interval = secs,
            SettingsEdit::Sniffer(on) => d.sniffer.enabled = on,
            SettingsEdit::Head(head) => d.sniffer.head = head,
            SettingsEdit::Tail(tail) => d.sniffer.tail = tail,
        }
    }

    pub fn view(&self) -> Element<'_, Message> {
        crate::ui::view(self)
    }

    pub fn subscription(&self) -> Subscription<Message> {
        let mut subscriptions = vec![
            Subscription::run_with_id("event-inbox", inbox(self.inbox.clone())),
            window::close_requests().map(Message::CloseRequested),
        ];
        if self.controller.settings().auto_refresh_ports && !self.controller.is_open() {
            subscriptions.push(iced::time::every(PORT_REFRESH).map(|_| Message::RefreshPorts));
        }
        Subscription::batch(subscriptions)
    }
}

/// Bridges the worker/timer channel into the iced runtime.
fn inbox(rx: EventReceiver) -> impl Stream<Item = Message> {
    iced::stream::channel(64, move |mut output| async move {
        loop {
            let rx = rx.clone();
            let event = match tokio::task::spawn_blocking(move || rx.recv_timeout(INBOX_POLL)).await {
                Ok(Ok(event)) => event,
                Ok(Err(RecvTimeoutError::Timeout)) => continue,
                Ok(Err(RecvTimeoutError::Disconnected)) | Err(_) => break,
            };
            if output.send(Message::Inbox(event)).await.is_err() {
                break;
            }
        }
    })
}
