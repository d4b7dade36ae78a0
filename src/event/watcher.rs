use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use log::{debug, warn};
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc as tokio_mpsc;

use super::types::SimEvent;

/// How often the file is polled when no change notification arrives
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to open events file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to watch events file: {0}")]
    Notify(#[from] notify::Error),
}

/// Watches a JSON-lines file and forwards each new event to a channel
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    file_path: PathBuf,
}

impl FileWatcher {
    /// Start watching `path`. With `from_start` the lines already in the
    /// file are replayed first; otherwise only lines appended later count.
    pub fn new(
        path: impl AsRef<Path>,
        from_start: bool,
        event_tx: tokio_mpsc::Sender<SimEvent>,
    ) -> Result<Self, WatchError> {
        let file_path = path.as_ref().to_path_buf();

        // Create the file if it doesn't exist
        if !file_path.exists() {
            std::fs::write(&file_path, "")?;
        }

        let initial_position = if from_start {
            0
        } else {
            std::fs::metadata(&file_path).map(|m| m.len()).unwrap_or(0)
        };

        let (tx, rx) = mpsc::channel();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                if let Ok(event) = res {
                    let _ = tx.send(event);
                }
            },
            Config::default(),
        )?;
        watcher.watch(&file_path, RecursiveMode::NonRecursive)?;

        let watch_path = file_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut last_pos = initial_position;
            loop {
                // A notification or a quiet poll interval both mean: read what's new
                match rx.recv_timeout(POLL_INTERVAL) {
                    Ok(_) | Err(mpsc::RecvTimeoutError::Timeout) => {}
                    Err(mpsc::RecvTimeoutError::Disconnected) => return,
                }
                match read_new_lines(&watch_path, &mut last_pos) {
                    Ok(events) => {
                        for event in events {
                            if event_tx.blocking_send(event).is_err() {
                                return; // Channel closed
                            }
                        }
                    }
                    Err(e) => debug!("Events file unreadable: {}", e),
                }
            }
        });

        Ok(Self {
            _watcher: watcher,
            file_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

/// Parse one input line; blank lines are skipped, bad lines logged
pub fn parse_line(line: &str) -> Option<SimEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<SimEvent>(line) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Failed to parse event: {} - Line: {}", e, line);
            None
        }
    }
}

/// Read complete lines appended since `last_position`
fn read_new_lines(path: &Path, last_position: &mut u64) -> Result<Vec<SimEvent>, std::io::Error> {
    let mut file = File::open(path)?;
    let current_size = file.metadata()?.len();

    // If file was truncated, start from beginning
    if current_size < *last_position {
        *last_position = 0;
    }
    file.seek(SeekFrom::Start(*last_position))?;

    let mut reader = BufReader::new(file);
    let mut events = Vec::new();
    let mut line = String::new();
    loop {
        line.clear();
        let read = reader.read_line(&mut line)?;
        // A line without its newline is still being written
        if read == 0 || !line.ends_with('\n') {
            break;
        }
        *last_position += read as u64;
        events.extend(parse_line(&line));
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("roomwalk-{}-{}.jsonl", name, std::process::id()));
        let _ = std::fs::remove_file(&path);
        path
    }

    #[test]
    fn test_read_new_lines_resumes_and_skips_partial() {
        let path = temp_file("resume");
        let mut file = File::create(&path).unwrap();
        writeln!(file, r#"{{"type": "bot_left", "session_key": "a"}}"#).unwrap();
        writeln!(file, "not json").unwrap();
        writeln!(file).unwrap();
        write!(file, r#"{{"type": "meeting_ended""#).unwrap();
        file.flush().unwrap();

        let mut pos = 0;
        let events = read_new_lines(&path, &mut pos).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].session_key(), Some("a"));

        writeln!(file, "}}").unwrap();
        file.flush().unwrap();
        let events = read_new_lines(&path, &mut pos).unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], SimEvent::MeetingEnded));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_truncated_file_restarts() {
        let path = temp_file("truncate");
        std::fs::write(&path, "{\"type\": \"meeting_ended\"}\n").unwrap();
        let mut pos = 1000;
        let events = read_new_lines(&path, &mut pos).unwrap();
        assert_eq!(events.len(), 1);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_parse_line_rejects_garbage() {
        assert!(parse_line("   ").is_none());
        assert!(parse_line("{\"type\": \"unknown\"}").is_none());
        assert!(parse_line("{\"type\": \"meeting_ended\"}").is_some());
    }
}
