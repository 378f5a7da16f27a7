//! APM Parameter Documentation
//!
//! Fetches the ArduPilot parameter metadata (`apm.pdef.xml`), indexes it and
//! merges it into parameter files as comments.
//!
//! # Architecture
//!
//! ```text
//! cache dir / cwd / URLs → DocumentFetcher → XML text → DocumentationIndex
//!                                                            ↓
//!                         parameter files ← Annotator ← + default values
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use apm_docs::prelude::*;
//! use std::path::Path;
//!
//! # fn example() -> Result<(), apm_docs::DocError> {
//! let vehicle = VehicleType::ArduCopter;
//! let dir = Path::new("vehicle_templates/ArduCopter/diatone_taycan_mxc");
//! let fetcher = DocumentFetcher::new(HttpDocumentSource::new(&FetchConfig::default())?);
//! let doc = fetcher.fetch(&FetchRequest {
//!     directory: dir,
//!     filename: PARAM_DEFINITION_XML_FILE,
//!     primary_url: format!("{}{PARAM_DEFINITION_XML_FILE}", vehicle.xml_url(Some("4.5.1"))),
//!     fallback_url: None,
//!     vehicle,
//! })?;
//! let index = DocumentationIndex::from_xml(&doc.text, &doc.origin_label(), vehicle, 100)?;
//! let defaults = load_default_param_file(dir)?;
//! Annotator::new(&index, AnnotateConfig::default())
//!     .with_defaults(&defaults)
//!     .annotate(dir)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod annotate;
pub mod columns;
pub mod config;
pub mod defaults;
pub mod error;
pub mod fetch;
pub mod index;
pub mod vehicle;

pub use annotate::{
    resolve_targets, AnnotationReport, Annotator, MAGNETOMETER_FIT_PARAM_FILE,
    MAGNETOMETER_FIT_SENTINEL, MAGNETOMETER_FIT_XML_FILE,
};
pub use columns::format_columns;
pub use config::{
    AnnotateConfig, FetchConfig, ProxySettings, SortMode, DEFAULT_MAX_LINE_LENGTH, DEFAULT_TIMEOUT,
    MAX_LINE_LENGTH_RANGE,
};
pub use defaults::{load_default_param_file, DEFAULT_PARAM_FILE};
pub use error::{DocError, DocResult, SourceError};
pub use fetch::{
    DocumentFetcher, DocumentOrigin, DocumentSource, FetchRequest, FetchedDocument,
    HttpDocumentSource,
};
pub use index::{split_into_lines, DocumentationEntry, DocumentationIndex, LineWrapper};
pub use vehicle::{VehicleType, BASE_URL, PARAM_DEFINITION_XML_FILE};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for fetching documentation and annotating files
    pub use crate::annotate::{AnnotationReport, Annotator};
    pub use crate::config::{AnnotateConfig, FetchConfig, SortMode};
    pub use crate::defaults::load_default_param_file;
    pub use crate::error::{DocError, DocResult};
    pub use crate::fetch::{DocumentFetcher, DocumentSource, FetchRequest, HttpDocumentSource};
    pub use crate::index::{DocumentationEntry, DocumentationIndex};
    pub use crate::vehicle::{VehicleType, PARAM_DEFINITION_XML_FILE};
}
