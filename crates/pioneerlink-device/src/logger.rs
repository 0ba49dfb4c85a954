//! Append-only raw byte logs, one file per stream, per logging session.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use pioneerlink_transport::RawSink;
use tracing::{debug, warn};

use crate::error::{LinkError, Result};

/// Log of sent commands.
pub const COMMANDS_FILE: &str = "commands.bin";
/// Log of bytes received on the command/reply channel.
pub const REPLIES_FILE: &str = "replies.bin";
/// Log of accepted telemetry datagrams.
pub const TELEMETRY_FILE: &str = "telemetry.bin";

struct Session {
    path: PathBuf,
    writer: BufWriter<File>,
}

/// One raw byte log.
///
/// Writes outside a session are dropped. Appends are serialized by an
/// internal lock, so the logger can be shared between receive workers and
/// the caller's thread.
pub struct RawLogger {
    file_name: &'static str,
    session: Mutex<Option<Session>>,
}

impl RawLogger {
    pub fn new(file_name: &'static str) -> Self {
        Self {
            file_name,
            session: Mutex::new(None),
        }
    }

    pub fn file_name(&self) -> &'static str {
        self.file_name
    }

    /// Start appending to `folder/<file_name>`, ending any current session.
    pub fn start(&self, folder: &Path) -> Result<PathBuf> {
        let path = folder.join(self.file_name);
        fs::create_dir_all(folder).map_err(|source| LinkError::Logger {
            path: folder.to_path_buf(),
            source,
        })?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| LinkError::Logger {
                path: path.clone(),
                source,
            })?;

        let previous = lock(&self.session).replace(Session {
            path: path.clone(),
            writer: BufWriter::new(file),
        });
        if let Some(previous) = previous {
            finish(previous);
        }
        debug!(path = %path.display(), "raw log started");
        Ok(path)
    }

    /// Flush and close the current session, if any.
    pub fn stop(&self) {
        if let Some(session) = lock(&self.session).take() {
            finish(session);
        }
    }

    pub fn is_active(&self) -> bool {
        lock(&self.session).is_some()
    }

    /// Path of the current session file.
    pub fn path(&self) -> Option<PathBuf> {
        lock(&self.session).as_ref().map(|s| s.path.clone())
    }

    pub fn append(&self, bytes: &[u8]) {
        let mut guard = lock(&self.session);
        let Some(session) = guard.as_mut() else {
            return;
        };
        if let Err(err) = session.writer.write_all(bytes) {
            warn!(path = %session.path.display(), error = %err, "raw log write failed, closing");
            *guard = None;
        }
    }
}

impl RawSink for RawLogger {
    fn write(&self, bytes: &[u8]) {
        self.append(bytes);
    }
}

impl Drop for RawLogger {
    fn drop(&mut self) {
        self.stop();
    }
}

fn finish(mut session: Session) {
    if let Err(err) = session.writer.flush() {
        warn!(path = %session.path.display(), error = %err, "raw log flush failed");
    }
    debug!(path = %session.path.display(), "raw log stopped");
}

/// The three raw logs of a link.
pub struct LoggerSet {
    pub commands: Arc<RawLogger>,
    pub replies: Arc<RawLogger>,
    pub telemetry: Arc<RawLogger>,
}

impl Default for LoggerSet {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggerSet {
    pub fn new() -> Self {
        Self {
            commands: Arc::new(RawLogger::new(COMMANDS_FILE)),
            replies: Arc::new(RawLogger::new(REPLIES_FILE)),
            telemetry: Arc::new(RawLogger::new(TELEMETRY_FILE)),
        }
    }

    fn all(&self) -> [&Arc<RawLogger>; 3] {
        [&self.commands, &self.replies, &self.telemetry]
    }

    /// Start every log in `folder`.
    ///
    /// Stops at the first failure; logs started before it stay active.
    pub fn start(&self, folder: &Path) -> Result<()> {
        for logger in self.all() {
            logger.start(folder)?;
        }
        Ok(())
    }

    pub fn stop(&self) {
        for logger in self.all() {
            logger.stop();
        }
    }

    pub fn is_active(&self) -> bool {
        self.all().iter().any(|logger| logger.is_active())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "pioneerlink-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ))
    }

    #[test]
    fn writes_outside_session_are_dropped() {
        let logger = RawLogger::new(COMMANDS_FILE);
        logger.append(b"lost");
        assert!(!logger.is_active());
        assert!(logger.path().is_none());
    }

    #[test]
    fn session_appends_and_flushes_on_stop() {
        let dir = temp_dir("raw-log");
        let logger = RawLogger::new(REPLIES_FILE);

        let path = logger.start(&dir).expect("logger should start");
        assert_eq!(path, dir.join("replies.bin"));
        logger.append(&[0x81, 0x02]);
        logger.write(&[0x00]);
        logger.stop();

        let contents = fs::read(&path).expect("log should be readable");
        assert_eq!(contents, vec![0x81, 0x02, 0x00]);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn restarting_in_same_folder_appends() {
        let dir = temp_dir("raw-append");
        let logger = RawLogger::new(TELEMETRY_FILE);

        logger.start(&dir).expect("first session");
        logger.append(b"ab");
        logger.start(&dir).expect("second session");
        logger.append(b"cd");
        logger.stop();

        let contents = fs::read(dir.join(TELEMETRY_FILE)).expect("log should be readable");
        assert_eq!(contents, b"abcd");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn logger_set_uses_three_files() {
        let dir = temp_dir("raw-set");
        let set = LoggerSet::new();
        set.start(&dir).expect("set should start");
        assert!(set.is_active());

        set.commands.append(&[1]);
        set.replies.append(&[2]);
        set.telemetry.append(&[3]);
        set.stop();
        assert!(!set.is_active());

        assert_eq!(fs::read(dir.join(COMMANDS_FILE)).unwrap(), vec![1]);
        assert_eq!(fs::read(dir.join(REPLIES_FILE)).unwrap(), vec![2]);
        assert_eq!(fs::read(dir.join(TELEMETRY_FILE)).unwrap(), vec![3]);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn start_in_unwritable_location_fails() {
        let dir = temp_dir("raw-blocked");
        fs::create_dir_all(&dir).expect("temp dir should be creatable");
        let blocker = dir.join("file");
        fs::write(&blocker, b"x").expect("blocker should be writable");

        let logger = RawLogger::new(COMMANDS_FILE);
        let err = logger.start(&blocker.join("sub")).expect_err("start should fail");
        assert!(matches!(err, LinkError::Logger { .. }));
        assert!(!logger.is_active());
        let _ = fs::remove_dir_all(&dir);
    }
}
