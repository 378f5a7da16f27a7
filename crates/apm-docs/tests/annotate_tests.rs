//! End-to-end fetch, index and annotate scenarios

use apm_docs::prelude::*;
use apm_docs::{
    DocumentOrigin, DocumentationEntry, MAGNETOMETER_FIT_PARAM_FILE, MAGNETOMETER_FIT_XML_FILE,
};
use apm_test_utils::{sample_index, InMemorySource, VehicleDir, SAMPLE_MAGFIT_XML, SAMPLE_PDEF_XML};
use pretty_assertions::assert_eq;

fn named(human: &str) -> DocumentationEntry {
    DocumentationEntry {
        human_name: human.to_string(),
        ..DocumentationEntry::default()
    }
}

#[test]
fn mavproxy_sort_orders_blocks_by_ascii_name() {
    let vehicle = VehicleDir::new();
    let file = vehicle.write("01_test.param", "PARAM2 100\nPARAM_1\t100\nPARAM1,100\n");

    let mut index = DocumentationIndex::new();
    index.insert("PARAM1", named("Param one"));
    index.insert("PARAM2", named("Param two"));
    index.insert("PARAM_1", named("Param underscore"));

    let config = AnnotateConfig::default().with_sort(SortMode::MavProxy);
    let reports = Annotator::new(&index, config).annotate(&file).unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].documented, 3);
    assert_eq!(
        vehicle.read("01_test.param"),
        "# Param one\nPARAM1,100\n\n# Param two\nPARAM2 100\n\n# Param underscore\nPARAM_1\t100\n"
    );
}

#[test]
fn annotation_is_idempotent() {
    let vehicle = VehicleDir::new();
    vehicle.write("00_default.param", "PARAM1,0.5\nBATT_CAPACITY,3300\n");
    let file = vehicle.write(
        "02_battery.param",
        "BATT_MONITOR,4\nBATT_CAPACITY,5000  # measured\nPARAM1,0.25\nUNKNOWN_PARAM,7\n",
    );

    let index = sample_index();
    let defaults = load_default_param_file(vehicle.path()).unwrap();
    let annotator = Annotator::new(&index, AnnotateConfig::default()).with_defaults(&defaults);

    let first = annotator.annotate_file(&file).unwrap();
    let once = vehicle.read("02_battery.param");
    let second = annotator.annotate_file(&file).unwrap();

    assert_eq!(vehicle.read("02_battery.param"), once);
    assert_eq!(first, second);
    assert_eq!(first.undocumented, vec!["UNKNOWN_PARAM".to_string()]);
    assert!(once.contains(
        "# Units: mAh (milliampere hour)\n# Default: 3300\nBATT_CAPACITY,5000  # measured\n"
    ));
    assert!(once.contains(
        "# 0: Disabled\n# 3: Analog Voltage Only\n# 4: Analog Voltage and Current\nBATT_MONITOR,4\n"
    ));
}

#[test]
fn delete_only_restores_bare_lines() {
    let vehicle = VehicleDir::new();
    let file = vehicle.write("03.param", "PARAM1,1\nPARAM2,2\n");
    let index = sample_index();

    Annotator::new(&index, AnnotateConfig::default()).annotate_file(&file).unwrap();
    assert!(vehicle.read("03.param").starts_with("# Param one\n"));

    Annotator::new(&index, AnnotateConfig::default().with_delete_only(true))
        .annotate_file(&file)
        .unwrap();
    assert_eq!(vehicle.read("03.param"), "PARAM1,1\nPARAM2,2\n");
}

#[test]
fn directory_target_covers_param_and_parm_files() {
    let vehicle = VehicleDir::new();
    vehicle.write("b.parm", "PARAM2,1\n");
    vehicle.write("a.param", "PARAM1,1\n");
    vehicle.write("notes.txt", "not a parameter file");

    let index = sample_index();
    let reports = Annotator::new(&index, AnnotateConfig::default())
        .annotate(vehicle.path())
        .unwrap();

    let names: Vec<_> = reports
        .iter()
        .map(|r| r.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a.param", "b.parm"]);
    assert_eq!(vehicle.read("notes.txt"), "not a parameter file");
}

#[test]
fn magnetometer_fit_file_waits_for_its_documentation() {
    let vehicle = VehicleDir::new();
    let content = "MAGH_ALT_DELTA,50\n";
    let file = vehicle.write(MAGNETOMETER_FIT_PARAM_FILE, content);

    let mut index = sample_index();
    let report = Annotator::new(&index, AnnotateConfig::default())
        .annotate_file(&file)
        .unwrap();
    assert!(report.skipped);
    assert_eq!(vehicle.read(MAGNETOMETER_FIT_PARAM_FILE), content);

    index.merge(
        DocumentationIndex::from_xml(
            SAMPLE_MAGFIT_XML,
            MAGNETOMETER_FIT_XML_FILE,
            VehicleType::ArduCopter,
            100,
        )
        .unwrap(),
    );
    let report = Annotator::new(&index, AnnotateConfig::default())
        .annotate_file(&file)
        .unwrap();
    assert!(!report.skipped);
    assert_eq!(
        vehicle.read(MAGNETOMETER_FIT_PARAM_FILE),
        "# Altitude delta\n# Altitude change that triggers a new fit\n# Units: m\nMAGH_ALT_DELTA,50\n"
    );
}

#[test]
fn malformed_line_names_file_and_line() {
    let vehicle = VehicleDir::new();
    let file = vehicle.write("04.param", "PARAM1,1\n# comment\nPARAM2:2\n");
    let index = sample_index();

    let err = Annotator::new(&index, AnnotateConfig::default())
        .annotate_file(&file)
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("04.param"), "{message}");
    assert!(message.contains("line 3"), "{message}");
    assert_eq!(vehicle.read("04.param"), "PARAM1,1\n# comment\nPARAM2:2\n");
}

#[test]
fn fetched_documentation_is_cached_next_to_the_files() {
    let vehicle = VehicleDir::new();
    let url = format!(
        "{}{}",
        VehicleType::ArduCopter.xml_url(Some("4.5.1")),
        PARAM_DEFINITION_XML_FILE
    );
    let source = InMemorySource::new().with_body(url.clone(), SAMPLE_PDEF_XML);
    let fetcher = DocumentFetcher::new(source).with_working_dir(vehicle.path().join("elsewhere"));
    let request = FetchRequest {
        directory: vehicle.path(),
        filename: PARAM_DEFINITION_XML_FILE,
        primary_url: url.clone(),
        fallback_url: None,
        vehicle: VehicleType::ArduCopter,
    };

    let first = fetcher.fetch(&request).unwrap();
    assert_eq!(first.origin, DocumentOrigin::Remote(url.clone()));
    let second = fetcher.fetch(&request).unwrap();
    assert!(matches!(second.origin, DocumentOrigin::Cache(_)));
    assert_eq!(fetcher.source().requested(), vec![url]);

    let index = DocumentationIndex::from_xml(
        &second.text,
        &second.origin_label(),
        VehicleType::ArduCopter,
        100,
    )
    .unwrap();
    assert_eq!(index, sample_index());
}
