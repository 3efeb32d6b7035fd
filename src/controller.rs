//! Main window logic without the window: owns the serial worker, the two
//! periodic timers, settings, scrollback and shortcuts, and turns user
//! intents and background events into state changes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};

use crate::connection::ConnectionConfig;
use crate::error::{Error, Result, ShortcutError};
use crate::event::{Event, EventSender};
use crate::file;
use crate::hex::DataFormat;
use crate::packet::PacketExtractor;
use crate::scrollback::Scrollback;
use crate::serial::{SerialEvent, SerialWorker};
use crate::settings::{AutoSave, Settings, SettingsStore, MIN_AUTOSAVE_SECS, MIN_AUTO_SEND_MS};
use crate::shortcuts::Shortcuts;
use crate::timer::{PeriodicTimer, TickSource};

pub struct Controller {
    settings: Settings,
    store: SettingsStore,
    events: EventSender,
    worker: Option<SerialWorker>,
    auto_send: PeriodicTimer,
    autosave: PeriodicTimer,
    scrollback: Scrollback,
    shortcuts: Shortcuts,
    sniffer: Option<PacketExtractor>,
    input: String,
    sent_bytes: u64,
    received_bytes: u64,
}

impl Controller {
    pub fn new(store: SettingsStore, settings: Settings, events: EventSender) -> Self {
        let sniffer = build_sniffer(&settings).unwrap_or_else(|e| {
            warn!("packet sniffer disabled: {}", e);
            None
        });
        let mut controller = Self {
            settings,
            store,
            events,
            worker: None,
            auto_send: PeriodicTimer::new(),
            autosave: PeriodicTimer::new(),
            scrollback: Scrollback::new(),
            shortcuts: Shortcuts::new(),
            sniffer,
            input: String::new(),
            sent_bytes: 0,
            received_bytes: 0,
        };
        if let Err(e) = controller.restart_autosave() {
            warn!("auto-save not started: {}", e);
        }
        controller
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Session-only changes, e.g. the connection pickers. Not persisted.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn scrollback(&self) -> &Scrollback {
        &self.scrollback
    }

    pub fn shortcuts(&self) -> &Shortcuts {
        &self.shortcuts
    }

    pub fn shortcuts_mut(&mut self) -> &mut Shortcuts {
        &mut self.shortcuts
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, input: String) {
        self.input = input;
    }

    pub fn connection(&self) -> Option<&ConnectionConfig> {
        self.worker.as_ref().map(SerialWorker::config)
    }

    pub fn is_open(&self) -> bool {
        self.worker.as_ref().is_some_and(SerialWorker::is_open)
    }

    pub fn is_auto_sending(&self) -> bool {
        self.auto_send.is_running()
    }

    pub fn is_autosaving(&self) -> bool {
        self.autosave.is_running()
    }

    pub fn sent_bytes(&self) -> u64 {
        self.sent_bytes
    }

    pub fn received_bytes(&self) -> u64 {
        self.received_bytes
    }

    pub fn open(&mut self, port: Option<&str>) -> Result<()> {
        if self.is_open() {
            return Err(Error::AlreadyOpen);
        }
        let port = port.map(str::trim).filter(|p| !p.is_empty()).ok_or(Error::NoPort)?;
        let worker = SerialWorker::open(self.settings.connection(port), self.events.clone())?;
        self.attach(worker);
        Ok(())
    }

    /// Takes over an already running worker.
    pub fn attach(&mut self, worker: SerialWorker) {
        self.close();
        self.worker = Some(worker);
    }

    pub fn close(&mut self) {
        self.stop_auto_send();
        if let Some(mut worker) = self.worker.take() {
            worker.close();
        }
    }

    pub fn send_input(&mut self) -> Result<()> {
        let text = self.input.clone();
        self.send_text(&text)
    }

    pub fn send_shortcut(&mut self, index: usize) -> Result<()> {
        let text = self
            .shortcuts
            .get(index)
            .ok_or(ShortcutError::OutOfRange(index))?
            .to_string();
        self.send_text(&text)
    }

    fn send_text(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let worker = self.worker.as_ref().ok_or(Error::NotOpen)?;
        let written = worker.send(text, worker.config().send_format)?;
        self.sent_bytes += written as u64;

        if self.settings.echo_sent {
            let mut line = format!(">> {}", text);
            if !line.ends_with('\n') {
                line.push('\n');
            }
            self.scrollback.push_received(&line, self.settings.timestamp);
        }
        Ok(())
    }

    /// Starts periodic re-sending of the input buffer.
    pub fn start_auto_send(&mut self, period: &str) -> Result<()> {
        let ms: u64 = period
            .trim()
            .parse()
            .map_err(|_| Error::InvalidInterval(period.to_string()))?;
        if ms < MIN_AUTO_SEND_MS {
            return Err(Error::IntervalTooShort {
                value: ms,
                min: MIN_AUTO_SEND_MS,
            });
        }
        if !self.is_open() {
            return Err(Error::NotOpen);
        }
        self.settings.auto_send_ms = ms;
        self.auto_send
            .start(Duration::from_millis(ms), TickSource::AutoSend, self.events.clone());
        info!("auto-send every {} ms", ms);
        Ok(())
    }

    pub fn stop_auto_send(&mut self) {
        self.auto_send.stop();
    }

    /// Checks, persists and activates new settings. On error nothing changes,
    /// neither here nor on disk.
    pub fn apply_settings(&mut self, mut settings: Settings) -> Result<()> {
        if settings.auto_send_ms < MIN_AUTO_SEND_MS {
            return Err(Error::IntervalTooShort {
                value: settings.auto_send_ms,
                min: MIN_AUTO_SEND_MS,
            });
        }
        check_autosave(&settings.autosave)?;
        let sniffer = build_sniffer(&settings)?;
        settings.validate();

        self.store.save(&settings)?;
        self.settings = settings;
        self.sniffer = sniffer;
        self.restart_autosave()
    }

    fn restart_autosave(&mut self) -> Result<()> {
        self.autosave.stop();
        let autosave = &self.settings.autosave;
        if !autosave.enabled {
            return Ok(());
        }
        check_autosave(autosave)?;
        self.autosave.start(
            Duration::from_secs(autosave.interval_secs),
            TickSource::AutoSave,
            self.events.clone(),
        );
        Ok(())
    }

    /// Writes the scrollback into the auto-save directory now.
    pub fn autosave_now(&self) -> Result<PathBuf> {
        let dir = self.settings.autosave.directory.as_deref().ok_or(Error::NoAutosaveDir)?;
        Ok(file::write_autosave(dir, self.scrollback.as_str())?)
    }

    pub fn handle_event(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Serial(SerialEvent::Received { text, bytes }) => {
                self.received_bytes += bytes as u64;
                self.scrollback.push_received(&text, self.settings.timestamp);
                let hex_display = self
                    .connection()
                    .is_some_and(|c| c.receive_format == DataFormat::Hex);
                if let Some(result) = self
                    .sniffer
                    .filter(|_| hex_display)
                    .and_then(|sniffer| sniffer.extract(&text))
                {
                    self.scrollback.append(&format!("  => {}\n", result));
                }
                Ok(())
            }
            Event::Serial(SerialEvent::DecodeFailed(e)) => Err(e.into()),
            Event::Serial(SerialEvent::ReadFailed(message)) => {
                self.reap_worker();
                Err(Error::Read(message))
            }
            Event::Serial(SerialEvent::Closed) => {
                self.reap_worker();
                Ok(())
            }
            Event::Tick(TickSource::AutoSend) => {
                self.auto_send.acknowledge();
                if !self.auto_send.is_running() {
                    return Ok(());
                }
                self.send_input().inspect_err(|_| self.auto_send.stop())
            }
            Event::Tick(TickSource::AutoSave) => {
                self.autosave.acknowledge();
                if !self.autosave.is_running() {
                    return Ok(());
                }
                match self.autosave_now() {
                    Ok(_) => Ok(()),
                    Err(e) => {
                        self.autosave.stop();
                        Err(e)
                    }
                }
            }
        }
    }

    /// Drops a worker whose read loop ended on its own.
    fn reap_worker(&mut self) {
        if self.worker.as_ref().is_some_and(|w| !w.is_open()) {
            info!("serial connection lost");
            self.close();
        }
    }

    pub fn clear_scrollback(&mut self) {
        self.scrollback.clear();
        self.sent_bytes = 0;
        self.received_bytes = 0;
    }

    pub fn load_input_file(&mut self, path: &Path) -> Result<()> {
        self.input = file::read_text(path)?;
        Ok(())
    }

    pub fn save_log(&self, path: &Path) -> Result<()> {
        file::save_text(path, self.scrollback.as_str())?;
        Ok(())
    }

    pub fn import_shortcuts(&mut self, path: &Path) -> Result<()> {
        Ok(self.shortcuts.import_from(path)?)
    }

    pub fn export_shortcuts(&self, path: &Path) -> Result<()> {
        Ok(self.shortcuts.export_to(path)?)
    }

    pub fn shutdown(&mut self) {
        self.close();
        self.autosave.stop();
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn check_autosave(autosave: &AutoSave) -> Result<()> {
    if !autosave.enabled {
        return Ok(());
    }
    if autosave.directory.is_none() {
        return Err(Error::NoAutosaveDir);
    }
    if autosave.interval_secs < MIN_AUTOSAVE_SECS {
        return Err(Error::IntervalTooShort {
            value: autosave.interval_secs,
            min: MIN_AUTOSAVE_SECS,
        });
    }
    Ok(())
}

fn build_sniffer(settings: &Settings) -> Result<Option<PacketExtractor>> {
    if !settings.sniffer.enabled {
        return Ok(None);
    }
    let sniffer = PacketExtractor::parse(&settings.sniffer.head, &settings.sniffer.tail)?;
    Ok(Some(sniffer))
}
