//! Annotation merger
//!
//! Rewrites parameter files so every documented parameter line is preceded
//! by a freshly generated comment block:
//!
//! ```text
//! # <human name>
//! # <wrapped documentation lines>
//! # <field>: <value>
//! # <code: label columns>
//! # Default: <value>
//! NAME,VALUE
//! ```
//!
//! Existing comment lines are dropped; only parameter lines are re-emitted.

use crate::columns::format_columns;
use crate::config::AnnotateConfig;
use crate::error::{DocError, DocResult};
use crate::index::{DocumentationEntry, DocumentationIndex};
use apm_params::{extract_parameter_name_and_validate, format_value, ParameterSet};
use std::path::{Path, PathBuf};

/// Parameter file of the in-flight magnetometer calibration step
pub const MAGNETOMETER_FIT_PARAM_FILE: &str = "24_inflight_magnetometer_fit_setup.param";

/// Companion documentation of the in-flight magnetometer calibration script
pub const MAGNETOMETER_FIT_XML_FILE: &str = "24_inflight_magnetometer_fit_setup.pdef.xml";

/// Parameter that only the magnetometer calibration documentation describes
pub const MAGNETOMETER_FIT_SENTINEL: &str = "MAGH_ALT_DELTA";

/// Per-file annotation outcome
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationReport {
    /// Annotated file
    pub path: PathBuf,
    /// Parameters found in the documentation index
    pub documented: usize,
    /// Parameters missing from the documentation index, in output order
    pub undocumented: Vec<String>,
    /// File left untouched because its documentation is not available yet
    pub skipped: bool,
}

impl AnnotationReport {
    /// Total parameter lines processed
    #[inline]
    #[must_use]
    pub fn total(&self) -> usize {
        self.documented + self.undocumented.len()
    }
}

/// Parameter files designated by `target`
///
/// A file is returned as is; a directory yields its `*.param` and `*.parm`
/// files in name order; anything else yields nothing.
///
/// # Errors
/// Returns [`DocError::Io`] if the directory cannot be listed.
pub fn resolve_targets(target: &Path) -> DocResult<Vec<PathBuf>> {
    if target.is_file() {
        return Ok(vec![target.to_path_buf()]);
    }
    if !target.is_dir() {
        tracing::warn!("Target {} is neither a file nor a directory", target.display());
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    let entries = std::fs::read_dir(target).map_err(|e| DocError::io_error(target, e))?;
    for entry in entries {
        let path = entry.map_err(|e| DocError::io_error(target, e))?.path();
        let is_param = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| ext == "param" || ext == "parm");
        if is_param && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Annotation merger over one documentation index
#[derive(Debug, Clone)]
pub struct Annotator<'a> {
    index: &'a DocumentationIndex,
    defaults: Option<&'a ParameterSet>,
    config: AnnotateConfig,
}

impl<'a> Annotator<'a> {
    /// Create annotator
    #[inline]
    #[must_use]
    pub fn new(index: &'a DocumentationIndex, config: AnnotateConfig) -> Self {
        Self {
            index,
            defaults: None,
            config,
        }
    }

    /// With default values, emitted as `Default:` lines
    #[inline]
    #[must_use]
    pub fn with_defaults(mut self, defaults: &'a ParameterSet) -> Self {
        self.defaults = Some(defaults);
        self
    }

    /// Annotate a file or every parameter file of a directory
    ///
    /// # Errors
    /// Stops at the first file that cannot be read, parsed or written.
    pub fn annotate(&self, target: &Path) -> DocResult<Vec<AnnotationReport>> {
        resolve_targets(target)?
            .iter()
            .map(|path| self.annotate_file(path))
            .collect()
    }

    /// Rewrite one parameter file in place
    ///
    /// # Errors
    /// - [`DocError::Io`] if the file cannot be read
    /// - [`DocError::ParamFile`] for a malformed parameter line, or a write failure
    pub fn annotate_file(&self, path: &Path) -> DocResult<AnnotationReport> {
        let is_magfit = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(MAGNETOMETER_FIT_PARAM_FILE));
        if is_magfit && !self.index.contains(MAGNETOMETER_FIT_SENTINEL) {
            tracing::debug!("Skipping {}: its documentation is not loaded", path.display());
            return Ok(AnnotationReport {
                path: path.to_path_buf(),
                skipped: true,
                ..AnnotationReport::default()
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| DocError::io_error(path, e))?;
        let (annotated, report) = self.annotate_str(&content, path)?;
        apm_params::write_atomically(&annotated, path)?;

        tracing::info!(
            "{}: {} parameters documented, {} undocumented",
            path.display(),
            report.documented,
            report.undocumented.len()
        );
        if !report.undocumented.is_empty() {
            tracing::warn!(
                "Undocumented parameters in {}: {}",
                path.display(),
                report.undocumented.join(", ")
            );
        }
        Ok(report)
    }

    /// Produce the annotated content of a parameter file
    ///
    /// `path` is used for error messages and the report only.
    ///
    /// # Errors
    /// Returns [`DocError::ParamFile`] for a line without a valid name and separator.
    pub fn annotate_str(
        &self,
        content: &str,
        path: &Path,
    ) -> DocResult<(String, AnnotationReport)> {
        let mut lines: Vec<(usize, &str)> = content
            .lines()
            .enumerate()
            .map(|(idx, line)| (idx + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
            .collect();
        if let Some(dialect) = self.config.sort.dialect() {
            lines.sort_by(|(_, a), (_, b)| dialect.compare(a, b));
        }

        let mut report = AnnotationReport {
            path: path.to_path_buf(),
            ..AnnotationReport::default()
        };
        let mut out = String::with_capacity(content.len() * 4);

        for (pos, (line_nr, line)) in lines.into_iter().enumerate() {
            let name = extract_parameter_name_and_validate(line, path, line_nr)?;
            match self.index.get(name) {
                Some(entry) => {
                    report.documented += 1;
                    if !self.config.delete_only {
                        if pos > 0 {
                            out.push('\n');
                        }
                        out.push_str("# ");
                        out.push_str(&self.documentation_block(name, entry));
                        out.push('\n');
                    }
                }
                None => report.undocumented.push(name.to_string()),
            }
            out.push_str(line);
            out.push('\n');
        }

        Ok((out, report))
    }

    /// Comment block body for one parameter, lines joined by `\n# `
    #[must_use]
    pub fn documentation_block(&self, name: &str, entry: &DocumentationEntry) -> String {
        let mut parts =
            Vec::with_capacity(entry.documentation_lines.len() + entry.fields.len() + 2);
        parts.push(entry.human_name.clone());
        parts.extend(entry.documentation_lines.iter().cloned());
        parts.extend(entry.fields.iter().map(|(key, value)| format!("{key}: {value}")));
        parts.extend(format_columns(
            &entry.choices,
            self.config.column_width,
            self.config.max_columns,
        ));
        if let Some(default) = self.defaults.and_then(|d| d.get(name)) {
            parts.push(format!("Default: {}", format_value(default.value())));
        }
        parts.join("\n# ")
    }
}
