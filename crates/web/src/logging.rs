//! Size-triggered log rotation: when `log.path` is set, writes go to that
//! file instead of stderr, rolling over to `<path>.1`, `<path>.2`, ... once
//! the active file exceeds `log.max_size_bytes`, dropping whatever falls
//! off the end of `log.max_files`. No log-rotation crate is pulled in —
//! the policy itself (rename chain, drop the oldest) is small enough to
//! write directly against `std::fs`.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub struct RotatingFileWriter {
    path: PathBuf,
    max_size_bytes: u64,
    max_files: u32,
    file: File,
    written: u64,
}

impl RotatingFileWriter {
    pub fn open(path: PathBuf, max_size_bytes: u64, max_files: u32) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();
        Ok(Self { path, max_size_bytes, max_files, file, written })
    }

    fn rotate(&mut self) -> io::Result<()> {
        for index in (1..self.max_files).rev() {
            let from = rotated_path(&self.path, index);
            let to = rotated_path(&self.path, index + 1);
            if from.exists() {
                let _ = std::fs::rename(&from, &to);
            }
        }
        if self.max_files > 0 {
            let _ = std::fs::rename(&self.path, rotated_path(&self.path, 1));
        }
        self.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

fn rotated_path(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

impl Write for RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written >= self.max_size_bytes && self.max_size_bytes > 0 {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Initializes `env_logger`, targeting `log_path` when one is configured
/// (falling back to stderr, and logging the fallback reason, if the file
/// can't be opened) or stderr directly otherwise.
pub fn init(log_path: Option<&Path>, max_size_bytes: u64, max_files: u32) {
    let mut builder = env_logger::Builder::from_default_env();

    if let Some(path) = log_path {
        match RotatingFileWriter::open(path.to_path_buf(), max_size_bytes, max_files) {
            Ok(writer) => {
                builder.target(env_logger::Target::Pipe(Box::new(writer)));
            }
            Err(err) => {
                eprintln!("could not open log file {}: {err}; logging to stderr", path.display());
            }
        }
    }

    builder.init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_when_size_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("railwatch.log");
        let mut writer = RotatingFileWriter::open(path.clone(), 8, 3).unwrap();

        writer.write_all(b"12345678").unwrap();
        writer.write_all(b"rotated-line").unwrap();

        assert!(path.exists());
        assert!(rotated_path(&path, 1).exists());
    }

    #[test]
    fn drops_oldest_past_max_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("railwatch.log");

        for _ in 0..5 {
            let mut writer = RotatingFileWriter::open(path.clone(), 1, 2).unwrap();
            writer.write_all(b"x").unwrap();
        }

        assert!(rotated_path(&path, 1).exists());
        assert!(!rotated_path(&path, 3).exists());
    }
}
