//! The serial worker: one device handle, a read loop on its own thread and a
//! mutex-guarded write half shared with the UI thread.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, trace, warn};

use crate::connection::ConnectionConfig;
use crate::error::{ConnectionError, DecodeError, SendError};
use crate::event::{Event, EventSender};
use crate::hex::{self, DataFormat};

pub const READ_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialEvent {
    Received { text: String, bytes: usize },
    DecodeFailed(DecodeError),
    ReadFailed(String),
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Closed,
}

pub fn list_ports() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
        Err(e) => {
            warn!("failed to enumerate serial ports: {}", e);
            vec![]
        }
    }
}

/// Splits a timeout-bounded byte stream into lines.
pub struct LineReader<R> {
    inner: R,
    pending: Vec<u8>,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pending: Vec::new(),
        }
    }

    /// Returns the next `\n`-terminated line, or whatever arrived before the
    /// read timed out. `None` means the timeout elapsed with no data. End of
    /// stream flushes pending data, then fails with `UnexpectedEof`.
    pub fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut buf = [0u8; 256];
        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                let rest = self.pending.split_off(pos + 1);
                return Ok(Some(std::mem::replace(&mut self.pending, rest)));
            }
            match self.inner.read(&mut buf) {
                Ok(0) => {
                    return self
                        .take_pending()
                        .map(Some)
                        .ok_or_else(|| io::ErrorKind::UnexpectedEof.into());
                }
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(self.take_pending());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn take_pending(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}

type SharedWriter = Arc<Mutex<Option<Box<dyn Write + Send>>>>;

pub struct SerialWorker {
    config: ConnectionConfig,
    running: Arc<AtomicBool>,
    writer: SharedWriter,
    handle: Option<JoinHandle<()>>,
}

impl SerialWorker {
    pub fn open(config: ConnectionConfig, events: EventSender) -> Result<Self, ConnectionError> {
        let port = config
            .builder(READ_TIMEOUT)?
            .open()
            .map_err(|e| ConnectionError::from_serialport(&config.port, e))?;
        let writer = port
            .try_clone()
            .map_err(|e| ConnectionError::from_serialport(&config.port, e))?;
        info!("opened {}", config);
        Ok(Self::spawn(config, port, writer, events))
    }

    /// Starts the read loop over an already opened device.
    pub fn spawn<R, W>(config: ConnectionConfig, reader: R, writer: W, events: EventSender) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let boxed: Box<dyn Write + Send> = Box::new(writer);
        let writer: SharedWriter = Arc::new(Mutex::new(Some(boxed)));

        let handle = {
            let running = Arc::clone(&running);
            let writer = Arc::clone(&writer);
            let format = config.receive_format;
            let line_ending = config.line_ending;
            thread::spawn(move || read_loop(reader, format, line_ending, running, writer, events))
        };

        Self {
            config,
            running,
            writer,
            handle: Some(handle),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        if self.running.load(Ordering::SeqCst) {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Formats one received line the way this connection displays it.
    pub fn format(&self, bytes: &[u8], format: DataFormat) -> Result<String, DecodeError> {
        hex::format_received(bytes, format, self.config.line_ending)
    }

    /// Encodes and writes `text`. Returns the number of bytes written.
    pub fn send(&self, text: &str, format: DataFormat) -> Result<usize, SendError> {
        let mut guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let writer = guard.as_mut().ok_or(SendError::NotOpen)?;
        let bytes = hex::encode_outgoing(text, format, self.config.line_ending)?;
        writer.write_all(&bytes).map_err(SendError::WriteFailed)?;
        writer.flush().map_err(SendError::WriteFailed)?;
        trace!("sent {} bytes to {}", bytes.len(), self.config.port);
        Ok(bytes.len())
    }

    /// Stops the read loop and waits for it. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        // waits for an in-flight send to finish
        self.writer.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("serial read loop for {} panicked", self.config.port);
            }
            info!("closed {}", self.config.port);
        }
    }
}

impl Drop for SerialWorker {
    fn drop(&mut self) {
        self.close();
    }
}

fn read_loop<R: Read>(
    reader: R,
    format: DataFormat,
    line_ending: bool,
    running: Arc<AtomicBool>,
    writer: SharedWriter,
    events: EventSender,
) {
    let mut lines = LineReader::new(reader);
    debug!("serial read loop started");

    while running.load(Ordering::SeqCst) {
        match lines.read_line() {
            Ok(None) => continue,
            Ok(Some(bytes)) => {
                trace!("received {:?}", bytes);
                let event = match hex::format_received(&bytes, format, line_ending) {
                    Ok(text) => SerialEvent::Received {
                        text,
                        bytes: bytes.len(),
                    },
                    Err(e) => {
                        warn!("{}", e);
                        SerialEvent::DecodeFailed(e)
                    }
                };
                if events.send(Event::Serial(event)).is_err() {
                    break;
                }
            }
            Err(e) => {
                error!("serial read failed: {}", e);
                let _ = events.send(Event::Serial(SerialEvent::ReadFailed(e.to_string())));
                break;
            }
        }
    }

    // still flagged as running means nobody asked us to stop
    if running.swap(false, Ordering::SeqCst) {
        writer.lock().unwrap_or_else(PoisonError::into_inner).take();
        let _ = events.send(Event::Serial(SerialEvent::Closed));
    }
    debug!("serial read loop finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Plays back chunks, then behaves like an idle port.
    struct Scripted {
        chunks: VecDeque<io::Result<Vec<u8>>>,
    }

    impl Scripted {
        fn new(chunks: Vec<io::Result<Vec<u8>>>) -> Self {
            Self {
                chunks: chunks.into(),
            }
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.chunks.pop_front() {
                Some(Ok(data)) => {
                    buf[..data.len()].copy_from_slice(&data);
                    Ok(data.len())
                }
                Some(Err(e)) => Err(e),
                None => {
                    thread::sleep(Duration::from_millis(5));
                    Err(io::ErrorKind::TimedOut.into())
                }
            }
        }
    }

    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn config(receive: DataFormat, line_ending: bool) -> ConnectionConfig {
        let mut config = ConnectionConfig::new("mock", 115200);
        config.receive_format = receive;
        config.send_format = DataFormat::Hex;
        config.line_ending = line_ending;
        config
    }

    fn next(rx: &crate::event::EventReceiver) -> Event {
        rx.recv_timeout(Duration::from_secs(2)).expect("no event")
    }

    #[test]
    fn splits_lines_and_flushes_partial_data_on_timeout() {
        let mut lines = LineReader::new(Scripted::new(vec![
            Ok(b"ab\ncd".to_vec()),
            Ok(b"e\nf".to_vec()),
        ]));
        assert_eq!(lines.read_line().unwrap(), Some(b"ab\n".to_vec()));
        assert_eq!(lines.read_line().unwrap(), Some(b"cde\n".to_vec()));
        assert_eq!(lines.read_line().unwrap(), Some(b"f".to_vec()));
        assert_eq!(lines.read_line().unwrap(), None);
    }

    #[test]
    fn end_of_stream_is_an_error_after_pending_data() {
        let mut lines = LineReader::new(&b"ab\ncd"[..]);
        assert_eq!(lines.read_line().unwrap(), Some(b"ab\n".to_vec()));
        assert_eq!(lines.read_line().unwrap(), Some(b"cd".to_vec()));
        assert_eq!(
            lines.read_line().unwrap_err().kind(),
            io::ErrorKind::UnexpectedEof
        );
    }

    #[test]
    fn worker_stops_at_end_of_stream() {
        let (tx, rx) = crate::event::channel();
        let worker = SerialWorker::spawn(config(DataFormat::Hex, false), io::empty(), Sink::default(), tx);

        assert!(matches!(next(&rx), Event::Serial(SerialEvent::ReadFailed(_))));
        assert_eq!(next(&rx), Event::Serial(SerialEvent::Closed));
        assert!(!worker.is_open());
    }

    #[test]
    fn clean_timeout_is_not_an_error() {
        let mut lines = LineReader::new(Scripted::new(vec![]));
        assert!(lines.read_line().unwrap().is_none());
    }

    #[test]
    fn received_lines_are_formatted_per_config() {
        let (tx, rx) = crate::event::channel();
        let reader = Scripted::new(vec![Ok(vec![0x5a, 0x02, 0x0a])]);
        let mut worker = SerialWorker::spawn(config(DataFormat::Hex, true), reader, Sink::default(), tx);

        assert_eq!(
            next(&rx),
            Event::Serial(SerialEvent::Received {
                text: "5a 02 0a\r\n".to_string(),
                bytes: 3
            })
        );
        worker.close();
    }

    #[test]
    fn invalid_utf8_is_reported_and_reading_continues() {
        let (tx, rx) = crate::event::channel();
        let reader = Scripted::new(vec![Ok(vec![0xff, b'\n']), Ok(b"ok\n".to_vec())]);
        let mut worker = SerialWorker::spawn(config(DataFormat::Ascii, false), reader, Sink::default(), tx);

        assert!(matches!(next(&rx), Event::Serial(SerialEvent::DecodeFailed(_))));
        assert_eq!(
            next(&rx),
            Event::Serial(SerialEvent::Received {
                text: "ok\n".to_string(),
                bytes: 3
            })
        );
        assert!(worker.is_open());
        worker.close();
    }

    #[test]
    fn hex_send_writes_exact_bytes() {
        let (tx, _rx) = crate::event::channel();
        let sink = Sink::default();
        let mut worker = SerialWorker::spawn(config(DataFormat::Hex, false), Scripted::new(vec![]), sink.clone(), tx);

        assert_eq!(worker.send("5a 5a 02 03 5a", DataFormat::Hex).unwrap(), 5);
        assert_eq!(*sink.0.lock().unwrap(), vec![0x5a, 0x5a, 0x02, 0x03, 0x5a]);
        worker.close();
    }

    #[test]
    fn malformed_hex_writes_nothing() {
        let (tx, _rx) = crate::event::channel();
        let sink = Sink::default();
        let mut worker = SerialWorker::spawn(config(DataFormat::Hex, true), Scripted::new(vec![]), sink.clone(), tx);

        assert!(matches!(worker.send("5a 5", DataFormat::Hex), Err(SendError::Parse(_))));
        assert!(sink.0.lock().unwrap().is_empty());
        worker.close();
    }

    #[test]
    fn ascii_send_appends_crlf() {
        let (tx, _rx) = crate::event::channel();
        let sink = Sink::default();
        let mut worker = SerialWorker::spawn(config(DataFormat::Ascii, true), Scripted::new(vec![]), sink.clone(), tx);

        worker.send("AT", DataFormat::Ascii).unwrap();
        assert_eq!(*sink.0.lock().unwrap(), b"AT\r\n".to_vec());
        worker.close();
    }

    #[test]
    fn write_failure_is_reported() {
        let (tx, _rx) = crate::event::channel();
        let mut worker = SerialWorker::spawn(config(DataFormat::Ascii, false), Scripted::new(vec![]), Broken, tx);

        assert!(matches!(worker.send("x", DataFormat::Ascii), Err(SendError::WriteFailed(_))));
        worker.close();
    }

    #[test]
    fn close_is_idempotent_and_blocks_later_sends() {
        let (tx, rx) = crate::event::channel();
        let mut worker = SerialWorker::spawn(config(DataFormat::Hex, false), Scripted::new(vec![]), Sink::default(), tx);

        worker.close();
        worker.close();
        assert_eq!(worker.state(), ConnectionState::Closed);
        assert!(matches!(worker.send("00", DataFormat::Hex), Err(SendError::NotOpen)));
        // a requested close does not announce itself
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn read_error_closes_the_worker() {
        let (tx, rx) = crate::event::channel();
        let reader = Scripted::new(vec![Err(io::ErrorKind::BrokenPipe.into())]);
        let worker = SerialWorker::spawn(config(DataFormat::Hex, false), reader, Sink::default(), tx);

        assert!(matches!(next(&rx), Event::Serial(SerialEvent::ReadFailed(_))));
        assert_eq!(next(&rx), Event::Serial(SerialEvent::Closed));
        assert!(!worker.is_open());
        assert!(matches!(worker.send("00", DataFormat::Hex), Err(SendError::NotOpen)));
    }
}
