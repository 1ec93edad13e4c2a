use log::{LevelFilter, Log, Metadata, Record};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Environment variable that overrides the build-mode log level.
pub const LOG_LEVEL_ENV: &str = "APP_BRICKS_LOG_LEVEL";

/// Writes every record to stdout.
pub struct StdoutLogger;

/// Writes to `<dir>/<YYYY-MM-DD>.log`, switching files when the UTC day changes.
pub struct FileLogger {
    state: Mutex<FileLoggerState>,
}

struct FileLoggerState {
    dir: PathBuf,
    current_date: String,
    file: File,
}

fn open_day_file(dir: &std::path::Path, date: &str) -> std::io::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(format!("{date}.log")))
}

impl FileLogger {
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let current_date = format_today();
        let file = open_day_file(&dir, &current_date)?;
        Ok(FileLogger {
            state: Mutex::new(FileLoggerState {
                dir,
                current_date,
                file,
            }),
        })
    }
}

/// `timestamp [LEVEL] [thread:name] file:line - message`
fn format_record(record: &Record) -> String {
    let thread = std::thread::current();
    let thread_name = match thread.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", thread.id()),
    };
    format!(
        "{} [{}] [thread:{}] {}:{} - {}",
        format_timestamp(),
        record.level(),
        thread_name,
        record.file().unwrap_or("unknown"),
        record.line().unwrap_or(0),
        record.args()
    )
}

impl Log for StdoutLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        println!("{}", format_record(record));
    }

    fn flush(&self) {
        std::io::stdout().flush().ok();
    }
}

impl Log for FileLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let today = format_today();
        if today != state.current_date {
            match open_day_file(&state.dir, &today) {
                Ok(file) => {
                    state.file = file;
                    state.current_date = today;
                }
                // keep writing to the previous day's file
                Err(e) => eprintln!("Failed to open log file for {}: {}", today, e),
            }
        }

        let line = format_record(record);
        if let Err(e) = writeln!(state.file, "{line}") {
            eprintln!("Failed to write to log file: {}", e);
            eprintln!("{line}");
        }
    }

    fn flush(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.file.flush().ok();
    }
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Current time as YYYY-MM-DDTHH:MM:SS (UTC)
pub fn format_timestamp() -> String {
    let secs = unix_seconds();
    let (year, month, day) = civil_from_days((secs / 86400) as i64);
    let time_of_day = secs % 86400;
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
        year,
        month,
        day,
        time_of_day / 3600,
        (time_of_day % 3600) / 60,
        time_of_day % 60
    )
}

/// Current date as YYYY-MM-DD (UTC)
pub fn format_today() -> String {
    let (year, month, day) = civil_from_days((unix_seconds() / 86400) as i64);
    format!("{:04}-{:02}-{:02}", year, month, day)
}

// Howard Hinnant's days-to-civil algorithm (public domain)
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

/// Parse a level name as accepted in `APP_BRICKS_LOG_LEVEL`.
///
/// Case-insensitive. `warning` and `critical`/`fatal` are accepted next to
/// the `log` crate's own names; `critical` maps to `Error`.
pub fn parse_level(name: &str) -> Option<LevelFilter> {
    match name.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(LevelFilter::Trace),
        "debug" => Some(LevelFilter::Debug),
        "info" => Some(LevelFilter::Info),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "error" | "critical" | "fatal" => Some(LevelFilter::Error),
        "off" | "none" => Some(LevelFilter::Off),
        _ => None,
    }
}

/// Level from `APP_BRICKS_LOG_LEVEL`, if set to a known name.
pub fn max_level_from_env() -> Option<LevelFilter> {
    std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|value| parse_level(&value))
}

fn default_max_level() -> LevelFilter {
    max_level_from_env().unwrap_or(if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    })
}

/// Install `StdoutLogger` as the global logger.
///
/// Max level is Debug in debug builds and Info in release builds unless
/// `APP_BRICKS_LOG_LEVEL` names another one. Only the first call in a process
/// has an effect.
pub fn init_stdout_logger() {
    static LOGGER: StdoutLogger = StdoutLogger;

    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(default_max_level());
    }
}

/// Install a `FileLogger` writing into `dir` as the global logger.
///
/// Same level rules as [`init_stdout_logger`]. Fails if the directory or the
/// day file cannot be created.
pub fn init_file_logger(dir: impl Into<PathBuf>) -> std::io::Result<()> {
    let logger = FileLogger::new(dir)?;

    // set_logger needs a 'static reference; the logger lives for the process
    if log::set_logger(Box::leak(Box::new(logger))).is_ok() {
        log::set_max_level(default_max_level());
    }

    Ok(())
}

/// Log at Error level, flush stdout and exit the process with status 1.
#[macro_export]
macro_rules! log_fatal {
    ($($arg:tt)*) => {{
        $crate::log::error!($($arg)*);
        {
            use std::io::Write;
            let _ = std::io::stdout().flush();
        }
        std::process::exit(1);
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_civil_from_days_epoch() {
        assert_eq!(civil_from_days(0), (1970, 1, 1));
    }

    #[test]
    fn test_civil_from_days_leap_day() {
        assert_eq!(civil_from_days(11016), (2000, 2, 29));
    }

    #[test]
    fn test_file_logger_switches_file_on_new_day() {
        let test_dir = std::env::temp_dir()
            .join(format!("brick-log-test-{}-rollover", std::process::id()));
        let _ = fs::remove_dir_all(&test_dir);

        let logger = FileLogger::new(&test_dir).expect("Failed to create FileLogger");
        let stale_path = test_dir.join("1999-01-01.log");
        {
            let mut state = logger.state.lock().unwrap();
            state.current_date = "1999-01-01".to_string();
            state.file = open_day_file(&test_dir, "1999-01-01").unwrap();
        }

        let record = log::RecordBuilder::new()
            .level(log::Level::Info)
            .target("test")
            .file(Some("test.rs"))
            .line(Some(1))
            .args(format_args!("after midnight"))
            .build();
        logger.log(&record);

        let today_path = test_dir.join(format!("{}.log", format_today()));
        let content = fs::read_to_string(&today_path).expect("today's file missing");
        assert!(content.contains("after midnight"));
        assert_eq!(fs::read_to_string(&stale_path).unwrap(), "");
        assert_eq!(logger.state.lock().unwrap().current_date, format_today());

        fs::remove_dir_all(&test_dir).ok();
    }
}
