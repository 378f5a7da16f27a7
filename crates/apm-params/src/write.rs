//! Whole-file replacement with LF line endings

use crate::error::{ParamFileError, ParamResult};
use std::io::Write;
use std::path::Path;

/// Replace `path` with `lines`, each terminated by `\n`
///
/// Content goes to a temporary file in the same directory first, which is
/// then renamed over the target, so readers never see a half-written file.
///
/// # Errors
/// Returns [`ParamFileError::Io`] if the temporary file cannot be created,
/// written or renamed.
pub fn write_lines(lines: &[String], path: &Path) -> ParamResult<()> {
    let mut content = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }
    write_atomically(&content, path)
}

/// Replace `path` with `content` verbatim
///
/// # Errors
/// Returns [`ParamFileError::Io`] on any filesystem failure.
pub fn write_atomically(content: &str, path: &Path) -> ParamResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp =
        tempfile::NamedTempFile::new_in(dir).map_err(|e| ParamFileError::io_error(path, e))?;
    tmp.write_all(content.as_bytes())
        .and_then(|()| tmp.flush())
        .map_err(|e| ParamFileError::io_error(path, e))?;
    tmp.persist(path)
        .map_err(|e| ParamFileError::io_error(path, e.error))?;
    tracing::debug!("Wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_lf_endings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.param");
        write_lines(&["A,1".to_string(), "B,2".to_string()], &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "A,1\nB,2\n");
    }

    #[test]
    fn replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.param");
        std::fs::write(&path, "OLD,1\r\nOLDER,2\r\n").unwrap();
        write_lines(&["NEW,3".to_string()], &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "NEW,3\n");
    }
}
