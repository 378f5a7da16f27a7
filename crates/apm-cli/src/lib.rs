//! `apm-annotate` command line
//!
//! Fetches the parameter documentation of a vehicle, then rewrites a
//! parameter file (or every parameter file of a directory) with a
//! documentation comment block above each documented parameter.
//!
//! ```text
//! apm-annotate <target> --vehicle-type ArduCopter [--firmware-version 4.5.1]
//!              [--sort none|missionplanner|mavproxy] [--max-line-length 100]
//!              [--delete-documentation-annotations] [--verbose]
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

use anyhow::Context;
use apm_docs::{
    load_default_param_file, AnnotateConfig, AnnotationReport, Annotator, DocumentFetcher,
    DocumentSource, DocumentationIndex, FetchRequest, SortMode, VehicleType,
    MAGNETOMETER_FIT_PARAM_FILE, MAGNETOMETER_FIT_XML_FILE, PARAM_DEFINITION_XML_FILE,
};
use apm_params::ParameterSet;
use clap::builder::PossibleValuesParser;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotateOptions {
    /// Parameter file or directory
    pub target: PathBuf,
    /// Vehicle whose documentation is used
    pub vehicle: VehicleType,
    /// Firmware version selecting the stable documentation tree
    pub firmware_version: Option<String>,
    /// Annotation settings
    pub config: AnnotateConfig,
    /// Debug logging
    pub verbose: bool,
}

/// Command definition
#[must_use]
pub fn command() -> Command {
    Command::new("apm-annotate")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Annotate ArduPilot parameter files with their online documentation")
        .arg(
            Arg::new("target")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Parameter file or directory of parameter files"),
        )
        .arg(
            Arg::new("vehicle-type")
                .short('t')
                .long("vehicle-type")
                .default_value("ArduCopter")
                .value_parser(PossibleValuesParser::new(VehicleType::ALL.map(VehicleType::as_str)))
                .help("Vehicle type whose documentation is used"),
        )
        .arg(
            Arg::new("firmware-version")
                .long("firmware-version")
                .help("Firmware version, selects the stable documentation (e.g. 4.5.1)"),
        )
        .arg(
            Arg::new("sort")
                .short('s')
                .long("sort")
                .default_value("none")
                .value_parser(["none", "missionplanner", "mavproxy"])
                .help("Sort the parameters of each file"),
        )
        .arg(
            Arg::new("max-line-length")
                .short('m')
                .long("max-line-length")
                .default_value("100")
                .value_parser(value_parser!(usize))
                .help("Maximum documentation line length (50-300)"),
        )
        .arg(
            Arg::new("delete-documentation-annotations")
                .long("delete-documentation-annotations")
                .action(ArgAction::SetTrue)
                .help("Remove the documentation comments instead of generating them"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Debug logging"),
        )
}

impl AnnotateOptions {
    /// Build options from parsed arguments
    ///
    /// # Errors
    /// Unsupported vehicle or sort mode, or a line length outside 50..=300.
    pub fn from_matches(matches: &ArgMatches) -> anyhow::Result<Self> {
        let target = matches
            .get_one::<PathBuf>("target")
            .cloned()
            .context("missing target")?;
        let vehicle: VehicleType = matches
            .get_one::<String>("vehicle-type")
            .map_or("ArduCopter", String::as_str)
            .parse()?;
        let sort: SortMode = matches
            .get_one::<String>("sort")
            .map_or("none", String::as_str)
            .parse()?;
        let max_line_length = matches
            .get_one::<usize>("max-line-length")
            .copied()
            .unwrap_or(apm_docs::DEFAULT_MAX_LINE_LENGTH);
        let config = AnnotateConfig::new()
            .with_sort(sort)
            .with_delete_only(matches.get_flag("delete-documentation-annotations"))
            .with_max_line_length(max_line_length)?;

        Ok(Self {
            target,
            vehicle,
            firmware_version: matches.get_one::<String>("firmware-version").cloned(),
            config,
            verbose: matches.get_flag("verbose"),
        })
    }

    /// Directory holding the documentation cache, default values and
    /// companion documentation
    #[must_use]
    pub fn xml_dir(&self) -> PathBuf {
        if self.target.is_dir() {
            return self.target.clone();
        }
        match self.target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` wins; otherwise `info`, or `debug` with `verbose`.
pub fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}

/// Fetch the documentation and annotate the target
///
/// # Errors
/// Documentation that cannot be fetched or parsed, or a parameter file that
/// cannot be read, parsed or written.
pub fn run<S: DocumentSource>(
    options: &AnnotateOptions,
    fetcher: &DocumentFetcher<S>,
) -> anyhow::Result<Vec<AnnotationReport>> {
    let xml_dir = options.xml_dir();
    let request = FetchRequest {
        directory: &xml_dir,
        filename: PARAM_DEFINITION_XML_FILE,
        primary_url: format!(
            "{}{PARAM_DEFINITION_XML_FILE}",
            options.vehicle.xml_url(options.firmware_version.as_deref())
        ),
        fallback_url: None,
        vehicle: options.vehicle,
    };
    let document = fetcher
        .fetch(&request)
        .with_context(|| format!("fetching {} documentation", options.vehicle))?;
    let index = DocumentationIndex::from_xml(
        &document.text,
        &document.origin_label(),
        options.vehicle,
        options.config.max_line_length,
    )?;
    tracing::info!(
        "Loaded documentation of {} parameters from {}",
        index.len(),
        document.origin_label()
    );

    let read_only = index.read_only_names();
    if !read_only.is_empty() {
        tracing::info!("Read-only parameters: {}", read_only.join(", "));
    }

    let defaults = load_default_param_file(&xml_dir)?;
    let mut reports = Annotator::new(&index, options.config.clone())
        .with_defaults(&defaults)
        .annotate(&options.target)
        .with_context(|| format!("annotating {}", options.target.display()))?;

    if let Some(report) = annotate_magnetometer_fit(&xml_dir, options, &defaults)? {
        reports.push(report);
    }
    Ok(reports)
}

/// Annotate the magnetometer calibration step with its own documentation
fn annotate_magnetometer_fit(
    xml_dir: &Path,
    options: &AnnotateOptions,
    defaults: &ParameterSet,
) -> anyhow::Result<Option<AnnotationReport>> {
    let xml_path = xml_dir.join(MAGNETOMETER_FIT_XML_FILE);
    let param_path = xml_dir.join(MAGNETOMETER_FIT_PARAM_FILE);
    if !xml_path.is_file() || !param_path.is_file() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&xml_path)
        .with_context(|| format!("reading {}", xml_path.display()))?;
    let index = DocumentationIndex::from_xml(
        &text,
        &xml_path.display().to_string(),
        options.vehicle,
        options.config.max_line_length,
    )?;
    let report = Annotator::new(&index, options.config.clone())
        .with_defaults(defaults)
        .annotate_file(&param_path)
        .with_context(|| format!("annotating {}", param_path.display()))?;
    Ok(Some(report))
}
