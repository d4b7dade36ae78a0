pub mod queue;
pub mod types;
pub mod watcher;

pub use queue::{create_event_queue, EventReceiver, EventSender};
pub use types::*;
pub use watcher::{parse_line, FileWatcher, WatchError};
