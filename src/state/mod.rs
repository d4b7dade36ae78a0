pub mod activity;
pub mod meeting;

pub use activity::{ActivityBoard, AnimTarget, SessionActivity};
pub use meeting::{MeetingBoard, MeetingCoordinator, MeetingSeat};
