use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

/// One parsed line from any log source. Lines that match neither timestamp
/// grammar still become records: raw text, no timestamp, no prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
	pub timestamp: Option<DateTime<Utc>>,
	pub prefix: Option<String>,
	pub message: String,
}

impl LogRecord {
	pub fn raw(line: &str) -> LogRecord {
		LogRecord {
			timestamp: None,
			prefix: None,
			message: line.to_string(),
		}
	}
}

// `[12:00:00] [Server thread/INFO]: joined the game`
static SHORT_LINE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^\[(\d{2}):(\d{2}):(\d{2})\] \[(.+?)\]:? (.*)$").unwrap());

// `2012-08-14 12:00:00 [INFO] joined the game` (pre-rotation format)
static LEGACY_LINE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}) \[(.+?)\]:? (.*)$").unwrap()
});

static FILE_DATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").unwrap());

/// Parse a line in the short bracketed format. The time of day is combined
/// with `base_date` in the configured offset, then normalized to UTC.
/// Anything that does not resolve to a real instant is yielded raw.
pub fn parse_short_line(line: &str, base_date: NaiveDate, utc_offset: i32) -> LogRecord {
	let line = line.trim_end_matches(['\r', '\n']);
	let Some(caps) = SHORT_LINE.captures(line) else {
		return LogRecord::raw(line);
	};
	let hour: u32 = caps[1].parse().unwrap_or(99);
	let minute: u32 = caps[2].parse().unwrap_or(99);
	let second: u32 = caps[3].parse().unwrap_or(99);
	let Some(time) = NaiveTime::from_hms_opt(hour, minute, second) else {
		return LogRecord::raw(line);
	};
	let Some(offset) = FixedOffset::east_opt(utc_offset * 3600) else {
		return LogRecord::raw(line);
	};
	let Some(local) = base_date.and_time(time).and_local_timezone(offset).single() else {
		return LogRecord::raw(line);
	};
	LogRecord {
		timestamp: Some(local.with_timezone(&Utc)),
		prefix: Some(caps[4].to_string()),
		message: caps[5].to_string(),
	}
}

/// Parse a line in the legacy full-timestamp format, interpreted as UTC.
pub fn parse_legacy_line(line: &str) -> LogRecord {
	let line = line.trim_end_matches(['\r', '\n']);
	let Some(caps) = LEGACY_LINE.captures(line) else {
		return LogRecord::raw(line);
	};
	let Ok(naive) = chrono::NaiveDateTime::parse_from_str(&caps[1], "%Y-%m-%d %H:%M:%S") else {
		return LogRecord::raw(line);
	};
	LogRecord {
		timestamp: Some(naive.and_utc()),
		prefix: Some(caps[2].to_string()),
		message: caps[3].to_string(),
	}
}

/// Calendar date a rotated log file's records belong to: the first ten
/// characters of its name iff they look like `YYYY-MM-DD`, else `fallback`.
/// The fallback is a known imprecision, kept as-is.
pub fn file_date(name: &str, fallback: NaiveDate) -> NaiveDate {
	if FILE_DATE.is_match(name) {
		NaiveDate::parse_from_str(&name[..10], "%Y-%m-%d").unwrap_or(fallback)
	} else {
		fallback
	}
}

/// Today in the configured offset, the date the live log's records carry.
pub fn today(utc_offset: i32) -> NaiveDate {
	match FixedOffset::east_opt(utc_offset * 3600) {
		Some(offset) => Utc::now().with_timezone(&offset).date_naive(),
		None => Utc::now().date_naive(),
	}
}
