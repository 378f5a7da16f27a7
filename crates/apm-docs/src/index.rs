//! Documentation index built from the `apm.pdef.xml` tree
//!
//! Every `<param>` element anywhere in the tree becomes one
//! [`DocumentationEntry`], keyed by its name with the vehicle prefix
//! (`ArduCopter:`) removed.

use crate::error::{DocError, DocResult};
use crate::vehicle::VehicleType;
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};

/// Parsed documentation of one parameter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentationEntry {
    /// Short display name
    pub human_name: String,
    /// Word-wrapped description
    pub documentation_lines: Vec<String>,
    /// Free-form metadata (`ReadOnly`, `Bitmask`, `Range`, `Units`, ...)
    pub fields: IndexMap<String, String>,
    /// Decimal code → label
    pub choices: IndexMap<String, String>,
}

impl DocumentationEntry {
    /// Look up a metadata field
    #[inline]
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Check if a metadata field holds a truthy value
    ///
    /// Absent, empty, `0`, `false` and `False` count as false.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.field(name)
            .map(str::trim)
            .is_some_and(|v| !matches!(v, "" | "0" | "false" | "False"))
    }

    /// Full documentation as one paragraph
    #[must_use]
    pub fn documentation(&self) -> String {
        self.documentation_lines.join(" ")
    }
}

/// Parameter name → documentation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentationIndex {
    entries: BTreeMap<String, DocumentationEntry>,
}

impl DocumentationIndex {
    /// Create empty index
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse XML text and build the index
    ///
    /// Whitespace-only text yields an empty index. `origin` names the
    /// document in error messages.
    ///
    /// # Errors
    /// Returns [`DocError::Xml`] for malformed XML; never retried.
    pub fn from_xml(
        xml: &str,
        origin: &str,
        vehicle: VehicleType,
        max_line_length: usize,
    ) -> DocResult<Self> {
        if xml.trim().is_empty() {
            return Ok(Self::new());
        }
        let doc =
            roxmltree::Document::parse(xml).map_err(|e| DocError::xml(origin, e.to_string()))?;
        Ok(Self::from_document(&doc, vehicle, max_line_length))
    }

    /// Build the index from a parsed tree
    #[must_use]
    pub fn from_document(
        doc: &roxmltree::Document<'_>,
        vehicle: VehicleType,
        max_line_length: usize,
    ) -> Self {
        let prefix = format!("{}:", vehicle.doc_prefix());
        let wrapper = LineWrapper::new(max_line_length);
        let mut entries = BTreeMap::new();

        for param in doc.descendants().filter(|n| n.has_tag_name("param")) {
            let Some(name) = param.attribute("name") else {
                continue;
            };
            let name = name.strip_prefix(prefix.as_str()).unwrap_or(name);
            entries.insert(name.to_string(), build_entry(param, &wrapper));
        }

        tracing::debug!("Indexed documentation for {} parameters", entries.len());
        Self { entries }
    }

    /// Look up a parameter
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DocumentationEntry> {
        self.entries.get(name)
    }

    /// Check if a parameter is documented
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of documented parameters
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if index is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace an entry
    #[inline]
    pub fn insert(&mut self, name: impl Into<String>, entry: DocumentationEntry) {
        self.entries.insert(name.into(), entry);
    }

    /// Add every entry of `other`, replacing same-named ones
    pub fn merge(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }

    /// Iterate in name order
    #[inline]
    pub fn iter(&self) -> btree_map::Iter<'_, String, DocumentationEntry> {
        self.entries.iter()
    }

    /// Names of parameters documented as read-only
    #[must_use]
    pub fn read_only_names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.flag("ReadOnly"))
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

fn build_entry(param: roxmltree::Node<'_, '_>, wrapper: &LineWrapper) -> DocumentationEntry {
    let mut fields = IndexMap::new();
    let mut choices = IndexMap::new();

    for child in param.children().filter(roxmltree::Node::is_element) {
        if child.has_tag_name("field") {
            if let Some(field_name) = child.attribute("name").filter(|n| !n.is_empty()) {
                fields.insert(field_name.to_string(), child.text().unwrap_or_default().to_string());
            }
        } else if child.has_tag_name("values") {
            for value in child.children().filter(|n| n.has_tag_name("value")) {
                if let Some(code) = value.attribute("code").filter(|c| !c.is_empty()) {
                    choices.insert(code.to_string(), value.text().unwrap_or_default().to_string());
                }
            }
        }
    }

    if let (Some(units), Some(unit_text)) = (fields.get("Units"), fields.get("UnitText")) {
        let merged = format!("{units} ({unit_text})");
        fields.insert("Units".to_string(), merged);
        fields.shift_remove("UnitText");
    }

    DocumentationEntry {
        human_name: param.attribute("humanName").unwrap_or_default().to_string(),
        documentation_lines: param
            .attribute("documentation")
            .map(|d| wrapper.split(d))
            .unwrap_or_default(),
        fields,
        choices,
    }
}

/// Greedy word wrapper matching `.{1,N}(?:\s|$)` repeatedly
#[derive(Debug, Clone)]
pub struct LineWrapper {
    pattern: Option<Regex>,
}

impl LineWrapper {
    /// Create wrapper for lines of at most `max_line_length` characters
    #[must_use]
    pub fn new(max_line_length: usize) -> Self {
        let pattern = Regex::new(&format!(r".{{1,{}}}(?:\s|$)", max_line_length.max(1)));
        if let Err(e) = &pattern {
            tracing::error!("Cannot build line wrap pattern for width {max_line_length}: {e}");
        }
        Self {
            pattern: pattern.ok(),
        }
    }

    /// Wrap `text`, trimming trailing whitespace from each line
    #[must_use]
    pub fn split(&self, text: &str) -> Vec<String> {
        match &self.pattern {
            Some(re) => re
                .find_iter(text)
                .map(|m| m.as_str().trim_end().to_string())
                .collect(),
            None => vec![text.to_string()],
        }
    }
}

/// Wrap `text` into lines of at most `max_line_length` characters
#[must_use]
pub fn split_into_lines(text: &str, max_line_length: usize) -> Vec<String> {
    LineWrapper::new(max_line_length).split(text)
}
