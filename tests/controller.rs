use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use uart_assistant::connection::ConnectionConfig;
use uart_assistant::event::{self, Event, EventReceiver};
use uart_assistant::hex::DataFormat;
use uart_assistant::serial::{SerialEvent, SerialWorker};
use uart_assistant::settings::{Settings, SettingsStore};
use uart_assistant::timer::TickSource;
use uart_assistant::{Controller, Error};

struct Idle;

impl Read for Idle {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        thread::sleep(Duration::from_millis(5));
        Err(io::ErrorKind::TimedOut.into())
    }
}

struct Unplugged;

impl Read for Unplugged {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::ErrorKind::BrokenPipe.into())
    }
}

#[derive(Clone, Default)]
struct Sink(Arc<Mutex<Vec<u8>>>);

impl Sink {
    fn bytes(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn controller(dir: &Path, settings: Settings) -> (Controller, EventReceiver) {
    let (tx, rx) = event::channel();
    let store = SettingsStore::new(dir.join("settings.json"));
    (Controller::new(store, settings, tx), rx)
}

fn worker<R: Read + Send + 'static>(reader: R, format: DataFormat) -> (SerialWorker, Sink, EventReceiver) {
    let mut config = ConnectionConfig::new("mock", 115200);
    config.send_format = format;
    config.receive_format = format;
    config.line_ending = false;
    let sink = Sink::default();
    let (tx, rx) = event::channel();
    (SerialWorker::spawn(config, reader, sink.clone(), tx), sink, rx)
}

#[test]
fn sending_needs_an_open_port() {
    let dir = tempfile::tempdir().unwrap();
    let (mut c, _rx) = controller(dir.path(), Settings::default());
    c.set_input("01 02".to_string());
    assert!(matches!(c.send_input(), Err(Error::NotOpen)));
    assert!(matches!(c.start_auto_send("100"), Err(Error::NotOpen)));
    assert!(matches!(c.open(Some("  ")), Err(Error::NoPort)));
}

#[test]
fn sends_input_and_counts_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let (mut c, _rx) = controller(dir.path(), Settings::default());
    let (w, sink, _wrx) = worker(Idle, DataFormat::Hex);
    c.attach(w);
    assert!(c.is_open());

    c.set_input("5a 01 a5".to_string());
    c.send_input().unwrap();
    assert_eq!(sink.bytes(), vec![0x5a, 0x01, 0xa5]);
    assert_eq!(c.sent_bytes(), 3);
    assert!(c.scrollback().is_empty());

    c.set_input("zz".to_string());
    assert!(matches!(c.send_input(), Err(Error::Send(_))));
    assert_eq!(c.sent_bytes(), 3);
    c.close();
}

#[test]
fn empty_input_is_not_sent() {
    let dir = tempfile::tempdir().unwrap();
    let (mut c, _rx) = controller(dir.path(), Settings::default());
    let (w, sink, _wrx) = worker(Idle, DataFormat::Ascii);
    c.attach(w);
    c.send_input().unwrap();
    assert!(sink.bytes().is_empty());
    c.close();
}

#[test]
fn echoes_sent_text_when_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        echo_sent: true,
        timestamp: false,
        ..Settings::default()
    };
    let (mut c, _rx) = controller(dir.path(), settings);
    let (w, sink, _wrx) = worker(Idle, DataFormat::Ascii);
    c.attach(w);

    c.set_input("AT".to_string());
    c.send_input().unwrap();
    assert_eq!(sink.bytes(), b"AT");
    assert_eq!(c.scrollback().as_str(), ">> AT\n");
    c.close();
}

#[test]
fn sends_shortcut_slots() {
    let dir = tempfile::tempdir().unwrap();
    let (mut c, _rx) = controller(dir.path(), Settings::default());
    let (w, sink, _wrx) = worker(Idle, DataFormat::Hex);
    c.attach(w);

    c.shortcuts_mut().set(3, "aa bb").unwrap();
    c.send_shortcut(3).unwrap();
    c.send_shortcut(4).unwrap();
    assert_eq!(sink.bytes(), vec![0xaa, 0xbb]);
    assert!(c.send_shortcut(11).is_err());
    c.close();
}

#[test]
fn rejects_bad_auto_send_periods() {
    let dir = tempfile::tempdir().unwrap();
    let (mut c, _rx) = controller(dir.path(), Settings::default());
    let (w, _sink, _wrx) = worker(Idle, DataFormat::Hex);
    c.attach(w);

    assert!(matches!(c.start_auto_send("fast"), Err(Error::InvalidInterval(_))));
    assert!(matches!(
        c.start_auto_send("5"),
        Err(Error::IntervalTooShort { value: 5, min: 10 })
    ));
    assert!(!c.is_auto_sending());
    c.close();
}

#[test]
fn auto_send_repeats_until_stopped() {
    let dir = tempfile::tempdir().unwrap();
    let (mut c, rx) = controller(dir.path(), Settings::default());
    let (w, sink, _wrx) = worker(Idle, DataFormat::Hex);
    c.attach(w);

    c.set_input("01".to_string());
    c.start_auto_send("20").unwrap();
    assert!(c.is_auto_sending());
    assert_eq!(c.settings().auto_send_ms, 20);

    for _ in 0..3 {
        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(event, Event::Tick(TickSource::AutoSend));
        c.handle_event(event).unwrap();
    }
    c.stop_auto_send();
    assert!(!c.is_auto_sending());
    assert_eq!(sink.bytes(), vec![1, 1, 1]);

    // closing the port stops auto-send as well
    c.start_auto_send("20").unwrap();
    c.close();
    assert!(!c.is_auto_sending());
}

#[test]
fn received_lines_reach_the_scrollback() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        timestamp: false,
        ..Settings::default()
    };
    let (mut c, _rx) = controller(dir.path(), settings);
    let (w, _sink, _wrx) = worker(Idle, DataFormat::Ascii);
    c.attach(w);

    c.handle_event(Event::Serial(SerialEvent::Received {
        text: "OK\n".to_string(),
        bytes: 3,
    }))
    .unwrap();
    assert_eq!(c.scrollback().as_str(), "OK\n");
    assert_eq!(c.received_bytes(), 3);

    c.clear_scrollback();
    assert!(c.scrollback().is_empty());
    assert_eq!(c.received_bytes(), 0);
    c.close();
}

#[test]
fn sniffer_annotates_framed_hex_lines() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = Settings {
        timestamp: false,
        ..Settings::default()
    };
    settings.sniffer.enabled = true;
    settings.sniffer.head = "5a".to_string();
    settings.sniffer.tail = "a5".to_string();
    let (mut c, _rx) = controller(dir.path(), settings);
    let (w, _sink, _wrx) = worker(Idle, DataFormat::Hex);
    c.attach(w);

    c.handle_event(Event::Serial(SerialEvent::Received {
        text: "5a 01 02 03 04 a5\r\n".to_string(),
        bytes: 6,
    }))
    .unwrap();
    c.handle_event(Event::Serial(SerialEvent::Received {
        text: "01 02\r\n".to_string(),
        bytes: 2,
    }))
    .unwrap();

    assert_eq!(
        c.scrollback().as_str(),
        "5a 01 02 03 04 a5\r\n  => [258, 772]\n01 02\r\n"
    );
    c.close();
}

#[test]
fn lost_connection_drops_the_worker() {
    let dir = tempfile::tempdir().unwrap();
    let (mut c, _rx) = controller(dir.path(), Settings::default());
    let (w, _sink, wrx) = worker(Unplugged, DataFormat::Hex);
    c.attach(w);

    let failed = wrx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert!(matches!(c.handle_event(failed), Err(Error::Read(_))));
    let closed = wrx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(closed, Event::Serial(SerialEvent::Closed));
    c.handle_event(closed).unwrap();

    assert!(!c.is_open());
    assert!(c.connection().is_none());
}

#[test]
fn autosave_tick_writes_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let logs = dir.path().join("logs");
    let mut settings = Settings {
        timestamp: false,
        ..Settings::default()
    };
    settings.autosave.enabled = true;
    settings.autosave.directory = Some(logs.clone());
    settings.autosave.interval_secs = 3600;
    let (mut c, _rx) = controller(dir.path(), settings);
    assert!(c.is_autosaving());

    c.handle_event(Event::Serial(SerialEvent::Received {
        text: "hello\n".to_string(),
        bytes: 6,
    }))
    .unwrap();
    c.handle_event(Event::Tick(TickSource::AutoSave)).unwrap();

    let files: Vec<_> = fs::read_dir(&logs).unwrap().collect();
    assert_eq!(files.len(), 1);
    let path = files[0].as_ref().unwrap().path();
    assert_eq!(fs::read_to_string(path).unwrap(), "hello\n");
    c.shutdown();
    assert!(!c.is_autosaving());
}

#[test]
fn autosave_without_directory_stays_off() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = Settings::default();
    settings.autosave.enabled = true;
    let (c, _rx) = controller(dir.path(), settings);
    assert!(!c.is_autosaving());
    assert!(matches!(c.autosave_now(), Err(Error::NoAutosaveDir)));
}

#[test]
fn applied_settings_are_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let (mut c, _rx) = controller(dir.path(), Settings::default());

    let settings = Settings {
        echo_sent: true,
        baud_rate: 9600,
        ..Settings::default()
    };
    c.apply_settings(settings).unwrap();
    assert!(c.settings().echo_sent);

    let stored = SettingsStore::new(dir.path().join("settings.json")).load().unwrap();
    assert!(stored.echo_sent);
    assert_eq!(stored.baud_rate, 9600);
}

#[test]
fn invalid_sniffer_settings_are_not_applied() {
    let dir = tempfile::tempdir().unwrap();
    let (mut c, _rx) = controller(dir.path(), Settings::default());

    let mut settings = Settings::default();
    settings.sniffer.enabled = true;
    settings.sniffer.head = "zz".to_string();
    assert!(matches!(c.apply_settings(settings), Err(Error::Parse(_))));
    assert!(!c.settings().sniffer.enabled);
    assert!(!dir.path().join("settings.json").exists());
}

#[test]
fn input_file_and_log_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        timestamp: false,
        ..Settings::default()
    };
    let (mut c, _rx) = controller(dir.path(), settings);

    let input = dir.path().join("input.txt");
    fs::write(&input, "01 02 03").unwrap();
    c.load_input_file(&input).unwrap();
    assert_eq!(c.input(), "01 02 03");
    assert!(c.load_input_file(&dir.path().join("missing.txt")).is_err());

    c.handle_event(Event::Serial(SerialEvent::Received {
        text: "line\n".to_string(),
        bytes: 5,
    }))
    .unwrap();
    let log = dir.path().join("session.txt");
    c.save_log(&log).unwrap();
    assert_eq!(fs::read_to_string(log).unwrap(), "line\n");
}

#[test]
fn shortcuts_survive_export_and_import() {
    let dir = tempfile::tempdir().unwrap();
    let (mut c, _rx) = controller(dir.path(), Settings::default());
    c.shortcuts_mut().set(1, "AT").unwrap();
    c.shortcuts_mut().set(10, "01 02").unwrap();

    let path = dir.path().join("shortcuts.txt");
    c.export_shortcuts(&path).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "1 AT\n10 01 02\n");

    let (mut other, _rx) = controller(dir.path(), Settings::default());
    other.import_shortcuts(&path).unwrap();
    assert_eq!(other.shortcuts().get(1), Some("AT"));
    assert_eq!(other.shortcuts().get(10), Some("01 02"));
}

#[test]
fn too_short_periods_are_refused_on_apply() {
    let dir = tempfile::tempdir().unwrap();
    let (mut c, _rx) = controller(dir.path(), Settings::default());

    let settings = Settings {
        auto_send_ms: 2,
        ..Settings::default()
    };
    assert!(matches!(
        c.apply_settings(settings),
        Err(Error::IntervalTooShort { value: 2, min: 10 })
    ));

    let mut settings = Settings::default();
    settings.autosave.enabled = true;
    settings.autosave.directory = Some(dir.path().join("logs"));
    settings.autosave.interval_secs = 3;
    assert!(matches!(
        c.apply_settings(settings),
        Err(Error::IntervalTooShort { value: 3, min: 5 })
    ));

    assert_eq!(c.settings(), &Settings::default());
    assert!(!c.is_autosaving());
    assert!(!dir.path().join("settings.json").exists());
}

#[test]
fn failed_apply_keeps_previous_settings() {
    let dir = tempfile::tempdir().unwrap();
    let (mut c, _rx) = controller(dir.path(), Settings::default());

    let mut settings = Settings {
        theme: "light".to_string(),
        ..Settings::default()
    };
    settings.autosave.enabled = true;
    assert!(matches!(c.apply_settings(settings), Err(Error::NoAutosaveDir)));

    assert_eq!(c.settings().theme, "default");
    assert!(!c.settings().autosave.enabled);
    assert!(!dir.path().join("settings.json").exists());
}
