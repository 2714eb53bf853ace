pub mod logging;
pub mod notifications;

pub use logging::{init_logging, init_test_logging};
pub use notifications::{LogSink, Notification, NotificationSink, RecordingSink};
