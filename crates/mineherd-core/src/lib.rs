pub mod aggregate;
pub mod config;
pub mod record;
pub mod status;

pub use aggregate::{read_log, LogReader};
pub use config::Config;
pub use record::LogRecord;
pub use status::ServerStatus;
