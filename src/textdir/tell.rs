use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tracing::{debug, error};

use crate::error::{Result, VrmrError};
use crate::kv::{check_entry, format_line, line_has_key};
use crate::list::{List, NodeId};

/// Write `key=value` into the file at `path`.
///
/// The whole file is read into a line list, edited there and written back.
/// With `overwrite` the first line of the key is replaced and any later
/// ones are dropped. Without it the new line goes right after the last line
/// of the key. A key not present yet is appended at the end.
///
/// Keys must be plain words and values must not hold line breaks; both are
/// checked before the file is touched.
pub fn tell_file(path: &Path, key: &str, value: &str, overwrite: bool) -> Result<()> {
    check_entry(key, value)?;

    let text = fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => VrmrError::NotFound(path.display().to_string()),
        _ => {
            error!(path = %path.display(), "reading file failed: {}", e);
            VrmrError::io_at(path, e)
        }
    })?;

    let key = key.to_ascii_uppercase();
    let new_line = format_line(&key, value);
    let mut lines: List<String> = text.lines().map(String::from).collect();

    if overwrite {
        let found: Vec<NodeId> = lines
            .cursor_top()
            .filter(|(_, line)| line_has_key(line, &key))
            .map(|(id, _)| id)
            .collect();
        match found.split_first() {
            Some((first, rest)) => {
                if let Some(line) = lines.get_mut(*first) {
                    *line = new_line;
                }
                for id in rest {
                    lines.remove_node(*id)?;
                }
            }
            None => {
                lines.append(new_line);
            }
        }
    } else {
        let last = lines
            .cursor_bot()
            .find(|(_, line)| line_has_key(line, &key))
            .map(|(id, _)| id);
        match last {
            Some(id) => {
                lines.insert_after(Some(id), new_line)?;
            }
            None => {
                lines.append(new_line);
            }
        }
    }

    write_lines(path, &lines)?;
    debug!(path = %path.display(), key = %key, overwrite, "value written");
    Ok(())
}

/// Truncate the file and write every line of the list.
fn write_lines(path: &Path, lines: &List<String>) -> Result<()> {
    let file = File::create(path).map_err(|e| {
        error!(path = %path.display(), "opening file for writing failed: {}", e);
        VrmrError::io_at(path, e)
    })?;
    let mut out = BufWriter::new(file);
    for line in lines {
        writeln!(out, "{}", line).map_err(|e| VrmrError::io_at(path, e))?;
    }
    out.flush().map_err(|e| VrmrError::io_at(path, e))?;
    Ok(())
}
