use std::fs::File;
use std::io::{self, BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use tracing::error;

use crate::error::{Result, VrmrError};
use crate::kv::parse_line;

/// Values of one key in one object file, read lazily.
///
/// The file stays open while values remain and is closed as soon as the
/// end of file or an error is reached, or the iterator is dropped.
pub struct AnswerIter {
    path: PathBuf,
    key: String,
    max_len: usize,
    lines: Option<Lines<BufReader<File>>>,
}

impl AnswerIter {
    /// Open `path` and prepare to scan it for `question`, matched
    /// case-insensitively.
    pub fn open(path: &Path, question: &str, max_len: usize) -> Result<Self> {
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => VrmrError::NotFound(path.display().to_string()),
            _ => {
                error!(path = %path.display(), "opening file failed: {}", e);
                VrmrError::io_at(path, e)
            }
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            key: question.to_ascii_uppercase(),
            max_len,
            lines: Some(BufReader::new(file).lines()),
        })
    }

    /// Whether the file handle is still held.
    pub fn is_open(&self) -> bool {
        self.lines.is_some()
    }

    fn finish(&mut self) {
        self.lines = None;
    }
}

impl Iterator for AnswerIter {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let lines = self.lines.as_mut()?;
        loop {
            let line = match lines.next() {
                None => {
                    self.finish();
                    return None;
                }
                Some(Err(e)) => {
                    let err = VrmrError::io_at(&self.path, e);
                    self.finish();
                    return Some(Err(err));
                }
                Some(Ok(line)) => line,
            };

            let Some((key, value)) = parse_line(&line) else {
                continue;
            };
            if !key.eq_ignore_ascii_case(&self.key) {
                continue;
            }
            if value.len() > self.max_len {
                let err = VrmrError::ValueTooLong {
                    key: self.key.clone(),
                    max: self.max_len,
                };
                self.finish();
                return Some(Err(err));
            }
            return Some(Ok(value.to_string()));
        }
    }
}

/// First value of `question` in the file at `path`.
pub fn ask_file(path: &Path, question: &str, max_len: usize) -> Result<Option<String>> {
    let mut answers = AnswerIter::open(path, question, max_len)?;
    answers.next().transpose()
}
