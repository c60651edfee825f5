//! 標準出力とログファイルへの同時出力
//!
//! `logs/<prefix>_<YYYYmmdd_HHMMSS>.log` を作成し、`log` クレートのレコードを両方に書く。
//! 警告以上は標準エラーへ。

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use log::{LevelFilter, Log, Metadata, Record};

pub const LOG_DIR: &str = "logs";

pub struct FileLogger {
    level: LevelFilter,
    file: Mutex<BufWriter<File>>,
}

impl FileLogger {
    /// ログファイルを作成
    pub fn create(dir: &Path, prefix: &str, level: LevelFilter) -> Result<(Self, PathBuf)> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
        let path = dir.join(log_file_name(prefix, chrono::Local::now()));
        let file = File::create(&path)
            .with_context(|| format!("Failed to create log file {}", path.display()))?;
        Ok((
            Self {
                level,
                file: Mutex::new(BufWriter::new(file)),
            },
            path,
        ))
    }
}

pub fn log_file_name<Tz>(prefix: &str, now: chrono::DateTime<Tz>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("{}_{}.log", prefix, now.format("%Y%m%d_%H%M%S"))
}

fn format_record(record: &Record) -> String {
    match record.level() {
        log::Level::Info => format!("{}", record.args()),
        level => format!("[{}] {}", level, record.args()),
    }
}

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let msg = format_record(record);
        if record.level() <= log::Level::Warn {
            eprintln!("{}", msg);
        } else {
            println!("{}", msg);
        }
        if let Ok(mut f) = self.file.lock() {
            let _ = writeln!(f, "{}", msg);
        }
    }

    fn flush(&self) {
        if let Ok(mut f) = self.file.lock() {
            let _ = f.flush();
        }
    }
}

/// グローバルロガーとして登録し、ログファイルのパスを返す
pub fn init(prefix: &str, level: LevelFilter) -> Result<PathBuf> {
    let (logger, path) = FileLogger::create(Path::new(LOG_DIR), prefix, level)?;
    log::set_boxed_logger(Box::new(logger))
        .map_err(|e| anyhow::anyhow!("Failed to install logger: {}", e))?;
    log::set_max_level(level);
    eprintln!("Log: {}", path.display());
    Ok(path)
}
