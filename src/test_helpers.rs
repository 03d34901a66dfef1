//! Test utilities: temporary log files and scripted collaborators.

use crate::file::{FileId, Opened, Opener};
use crate::watcher::{Watch, WatchEvent};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc;
use tokio::time::Instant;

pub struct TempLogFile {
    pub path: PathBuf,
    _temp_dir: tempfile::TempDir,
}

impl TempLogFile {
    /// Create a new temporary log file for testing
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("test.log");

        File::create(&path)?;

        Ok(Self {
            path,
            _temp_dir: temp_dir,
        })
    }

    /// Create a temporary log file with initial content followed by a newline
    pub fn with_content(content: &str) -> std::io::Result<Self> {
        let temp_file = Self::new()?;
        temp_file.append_content(content)?;
        Ok(temp_file)
    }

    /// Create a temporary log file holding exactly `content`
    pub fn with_raw_content(content: &str) -> std::io::Result<Self> {
        let temp_file = Self::new()?;
        temp_file.append_raw(content)?;
        Ok(temp_file)
    }

    /// Append a newline-terminated line, creating the file if needed
    pub fn append_content(&self, content: &str) -> std::io::Result<()> {
        self.append_raw(&format!("{}\n", content))
    }

    /// Append bytes exactly as given, creating the file if needed
    pub fn append_raw(&self, content: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.write_all(content.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Move the file aside the way a log rotator does, returning its new path
    pub fn rotate(&self) -> std::io::Result<PathBuf> {
        let rotated = self.path.with_extension("log.1");
        std::fs::rename(&self.path, &rotated)?;
        Ok(rotated)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchCall {
    Watch(PathBuf),
    Unwatch(PathBuf),
}

/// In-memory [`Watch`] fed by a [`WatchScript`].
pub struct ScriptedWatcher {
    events: mpsc::UnboundedReceiver<WatchEvent>,
    calls: Arc<Mutex<Vec<WatchCall>>>,
    fail_watch: bool,
}

/// Test side of a [`ScriptedWatcher`]. Dropping it closes the event feed.
pub struct WatchScript {
    events: mpsc::UnboundedSender<WatchEvent>,
    calls: Arc<Mutex<Vec<WatchCall>>>,
}

pub fn scripted_watcher() -> (ScriptedWatcher, WatchScript) {
    let (tx, rx) = mpsc::unbounded_channel();
    let calls = Arc::new(Mutex::new(Vec::new()));
    (
        ScriptedWatcher {
            events: rx,
            calls: calls.clone(),
            fail_watch: false,
        },
        WatchScript { events: tx, calls },
    )
}

impl ScriptedWatcher {
    /// Makes every `watch` call fail.
    pub fn failing(mut self) -> Self {
        self.fail_watch = true;
        self
    }
}

impl WatchScript {
    pub fn send(&self, event: WatchEvent) {
        let _ = self.events.send(event);
    }

    pub fn calls(&self) -> Vec<WatchCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Watch for ScriptedWatcher {
    fn watch(&mut self, path: &Path) -> notify::Result<()> {
        if self.fail_watch {
            return Err(notify::Error::generic("watch refused"));
        }
        self.calls
            .lock()
            .unwrap()
            .push(WatchCall::Watch(path.to_path_buf()));
        Ok(())
    }

    fn unwatch(&mut self, path: &Path) {
        self.calls
            .lock()
            .unwrap()
            .push(WatchCall::Unwatch(path.to_path_buf()));
    }

    async fn next_event(&mut self) -> Option<WatchEvent> {
        self.events.recv().await
    }
}

/// In-memory file handle. Reads play back queued chunks and report end of
/// data once the queue is empty, so more can be queued after a scan.
#[derive(Clone, Default)]
pub struct ScriptedReader {
    chunks: Arc<Mutex<VecDeque<io::Result<Vec<u8>>>>>,
}

impl ScriptedReader {
    pub fn new(content: Vec<u8>) -> Self {
        let reader = Self::default();
        reader.chunks.lock().unwrap().push_back(Ok(content));
        reader
    }

    /// Queues bytes for a later read, as if appended to the file.
    pub fn push(&self, content: &str) {
        self.chunks
            .lock()
            .unwrap()
            .push_back(Ok(content.as_bytes().to_vec()));
    }

    /// Makes the next read after the queued data fail with `kind`.
    pub fn fail(&self, kind: io::ErrorKind) {
        self.chunks.lock().unwrap().push_back(Err(io::Error::from(kind)));
    }
}

impl AsyncRead for ScriptedReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut chunks = self.chunks.lock().unwrap();
        match chunks.pop_front() {
            None => Poll::Ready(Ok(())),
            Some(Err(e)) => Poll::Ready(Err(e)),
            Some(Ok(data)) => {
                let n = data.len().min(buf.remaining());
                buf.put_slice(&data[..n]);
                if n < data.len() {
                    chunks.push_front(Ok(data[n..].to_vec()));
                }
                Poll::Ready(Ok(()))
            }
        }
    }
}

/// In-memory [`Opener`] that plays back a fixed list of open outcomes.
///
/// Each successful open gets a fresh [`FileId`], which stays the identity of
/// the path until [`ScriptedOpener::replace`] is called. Once the script runs
/// out every open fails with `NotFound`.
#[derive(Clone)]
pub struct ScriptedOpener {
    outcomes: Arc<Mutex<VecDeque<io::Result<Vec<u8>>>>>,
    attempts: Arc<Mutex<Vec<Instant>>>,
    readers: Arc<Mutex<Vec<ScriptedReader>>>,
    current: Arc<Mutex<Option<FileId>>>,
    next_ino: Arc<Mutex<u64>>,
}

impl ScriptedOpener {
    pub fn new(outcomes: Vec<io::Result<&str>>) -> Self {
        let outcomes = outcomes
            .into_iter()
            .map(|outcome| outcome.map(|content| content.as_bytes().to_vec()))
            .collect();
        Self {
            outcomes: Arc::new(Mutex::new(outcomes)),
            attempts: Arc::new(Mutex::new(Vec::new())),
            readers: Arc::new(Mutex::new(Vec::new())),
            current: Arc::new(Mutex::new(None)),
            next_ino: Arc::new(Mutex::new(1)),
        }
    }

    pub fn missing() -> io::Result<&'static str> {
        Err(io::Error::from(io::ErrorKind::NotFound))
    }

    /// Simulates the path no longer naming the file that was opened last.
    pub fn replace(&self) {
        *self.current.lock().unwrap() = None;
    }

    /// The handle returned by the `index`th successful open.
    pub fn reader(&self, index: usize) -> ScriptedReader {
        self.readers.lock().unwrap()[index].clone()
    }

    /// When each open was attempted, in order.
    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().clone()
    }
}

impl Opener for ScriptedOpener {
    type Reader = ScriptedReader;

    async fn open(&mut self, _path: &Path) -> io::Result<Opened<ScriptedReader>> {
        self.attempts.lock().unwrap().push(Instant::now());
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(io::Error::from(io::ErrorKind::NotFound)));
        let content = outcome?;

        let id = {
            let mut next_ino = self.next_ino.lock().unwrap();
            let id = FileId::new(0, *next_ino);
            *next_ino += 1;
            id
        };
        *self.current.lock().unwrap() = Some(id);

        let size = content.len() as u64;
        let reader = ScriptedReader::new(content);
        self.readers.lock().unwrap().push(reader.clone());

        Ok(Opened {
            size,
            id: Some(id),
            reader,
        })
    }

    async fn identity(&mut self, _path: &Path) -> Option<FileId> {
        *self.current.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_temp_log_file_creation() {
        let temp_file = TempLogFile::new().unwrap();
        assert!(temp_file.path().exists());
    }

    #[tokio::test]
    async fn test_temp_log_file_with_content() {
        let temp_file = TempLogFile::with_content("test line").unwrap();

        let file_content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert_eq!(file_content, "test line\n");
    }

    #[tokio::test]
    async fn test_append_raw_keeps_bytes_exact() {
        let temp_file = TempLogFile::with_raw_content("line 1\nline 2").unwrap();
        temp_file.append_raw("\r\n").unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert_eq!(content, "line 1\nline 2\r\n");
    }

    #[tokio::test]
    async fn test_rotate_moves_file_aside() {
        let temp_file = TempLogFile::with_content("before rotation").unwrap();
        let rotated = temp_file.rotate().unwrap();

        assert!(!temp_file.path().exists());
        assert_eq!(
            std::fs::read_to_string(&rotated).unwrap(),
            "before rotation\n"
        );

        temp_file.append_content("after rotation").unwrap();
        assert_eq!(
            std::fs::read_to_string(temp_file.path()).unwrap(),
            "after rotation\n"
        );
    }

    #[tokio::test]
    async fn test_scripted_opener_plays_back_outcomes() {
        let mut opener = ScriptedOpener::new(vec![ScriptedOpener::missing(), Ok("data")]);

        assert!(opener.open(Path::new("x")).await.is_err());
        let opened = opener.open(Path::new("x")).await.unwrap();
        assert_eq!(opened.size, 4);
        assert_eq!(opener.identity(Path::new("x")).await, opened.id);

        opener.replace();
        assert_eq!(opener.identity(Path::new("x")).await, None);
        assert!(opener.open(Path::new("x")).await.is_err());
        assert_eq!(opener.attempts().len(), 3);
    }

    #[tokio::test]
    async fn test_scripted_reader_resumes_after_end_of_data() {
        use tokio::io::AsyncReadExt;

        let mut reader = ScriptedReader::new(b"abc".to_vec());
        let mut buf = [0u8; 2];

        assert_eq!(reader.read(&mut buf).await.unwrap(), 2);
        assert_eq!(reader.read(&mut buf).await.unwrap(), 1);
        assert_eq!(reader.read(&mut buf).await.unwrap(), 0);

        reader.push("d");
        reader.fail(io::ErrorKind::Other);
        assert_eq!(reader.read(&mut buf).await.unwrap(), 1);
        assert_eq!(&buf[..1], b"d");
        assert!(reader.read(&mut buf).await.is_err());
    }
}
