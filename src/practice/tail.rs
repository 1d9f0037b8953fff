//! Reader for the capture output channel

use crate::token::CanonicalToken;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Follows the output file, returning tokens appended since the last read
#[derive(Debug, Clone)]
pub struct TokenTail {
    path: PathBuf,
    position: u64,
}

impl TokenTail {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            position: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a capture session currently has the channel open
    pub fn channel_exists(&self) -> bool {
        self.path.exists()
    }

    /// Move the read position to the current end of the file
    pub fn skip_existing(&mut self) {
        self.position = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
    }

    /// Complete lines appended since the last call
    ///
    /// A missing file yields nothing. A file shorter than the read position
    /// was recreated by a new session and is read from the start.
    pub fn read_new(&mut self) -> Vec<CanonicalToken> {
        match self.try_read_new() {
            Ok(tokens) => tokens,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.position = 0;
                Vec::new()
            }
            Err(e) => {
                log::debug!("could not read {}: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    fn try_read_new(&mut self) -> io::Result<Vec<CanonicalToken>> {
        let mut file = File::open(&self.path)?;
        let len = file.metadata()?.len();
        if len < self.position {
            self.position = 0;
        }
        if len == self.position {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(self.position))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;

        // Leave a trailing partial line for the next read
        let complete = match buf.iter().rposition(|b| *b == b'\n') {
            Some(idx) => idx + 1,
            None => return Ok(Vec::new()),
        };
        self.position += complete as u64;

        let text = String::from_utf8_lossy(&buf[..complete]);
        Ok(text.lines().filter_map(CanonicalToken::from_line).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, OpenOptions};
    use std::io::Write;

    fn strs(tokens: &[CanonicalToken]) -> Vec<&str> {
        tokens.iter().map(|t| t.as_str()).collect()
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut tail = TokenTail::new(dir.path().join("none.txt"));
        assert!(tail.read_new().is_empty());
        assert!(!tail.channel_exists());
    }

    #[test]
    fn reads_only_new_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.txt");
        fs::write(&path, "cmd+k\n").unwrap();

        let mut tail = TokenTail::new(&path);
        assert_eq!(strs(&tail.read_new()), vec!["cmd+k"]);
        assert!(tail.read_new().is_empty());

        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, "cmd+s").unwrap();
        writeln!(f, "`").unwrap();
        assert_eq!(strs(&tail.read_new()), vec!["cmd+s", "`"]);
    }

    #[test]
    fn skip_existing_ignores_old_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.txt");
        fs::write(&path, "a\nb\n").unwrap();

        let mut tail = TokenTail::new(&path);
        tail.skip_existing();
        assert!(tail.read_new().is_empty());

        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, "c").unwrap();
        assert_eq!(strs(&tail.read_new()), vec!["c"]);
    }

    #[test]
    fn partial_line_waits_for_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.txt");
        fs::write(&path, "cmd+k\ncmd").unwrap();

        let mut tail = TokenTail::new(&path);
        assert_eq!(strs(&tail.read_new()), vec!["cmd+k"]);

        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        write!(f, "+s\n").unwrap();
        assert_eq!(strs(&tail.read_new()), vec!["cmd+s"]);
    }

    #[test]
    fn recreated_file_is_read_from_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.txt");
        fs::write(&path, "one\ntwo\nthree\n").unwrap();

        let mut tail = TokenTail::new(&path);
        assert_eq!(tail.read_new().len(), 3);

        fs::remove_file(&path).unwrap();
        assert!(tail.read_new().is_empty());
        fs::write(&path, "x\n").unwrap();
        assert_eq!(strs(&tail.read_new()), vec!["x"]);
    }

    #[test]
    fn truncated_file_is_read_from_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.txt");
        fs::write(&path, "one\ntwo\nthree\n").unwrap();

        let mut tail = TokenTail::new(&path);
        tail.read_new();
        fs::write(&path, "x\n").unwrap();
        assert_eq!(strs(&tail.read_new()), vec!["x"]);
    }
}
