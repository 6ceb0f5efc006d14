//! End-to-end runs of the batch runner feeding the report service.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use lookalike::prelude::*;
use lookalike::{DEFAULT_TEMPLATE, MISMATCH_COMMENT, PASSED_COMMENT};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn write_png(dir: &Path, name: &str, color: [u8; 4]) -> String {
    let mut img = RgbaImage::new(8, 8);
    for pixel in img.pixels_mut() {
        *pixel = Rgba(color);
    }
    let path = dir.join(name);
    DynamicImage::ImageRgba8(img)
        .save_with_format(&path, ImageFormat::Png)
        .unwrap();
    path.to_string_lossy().into_owned()
}

struct Fixture {
    dir: TempDir,
    cases: Vec<TestCase>,
}

/// Case 1 matches, case 2 mismatches, case 3 has an unreachable source
fn three_cases() -> Fixture {
    let dir = TempDir::new().unwrap();
    let inputs = dir.path().join("inputs");
    fs::create_dir_all(&inputs).unwrap();
    let templates = dir.path().join("templates");
    fs::create_dir_all(&templates).unwrap();
    fs::write(templates.join("template.html"), DEFAULT_TEMPLATE).unwrap();

    let black = write_png(&inputs, "black.png", [0, 0, 0, 255]);
    let black_again = write_png(&inputs, "black-again.png", [0, 0, 0, 255]);
    let white = write_png(&inputs, "white.png", [255, 255, 255, 255]);
    let missing = inputs.join("missing.png").to_string_lossy().into_owned();

    let cases = vec![
        TestCase::new(1u32, black_again, black.clone()),
        TestCase::new(2u32, white, black.clone()),
        TestCase::new(3u32, missing, black),
    ];
    Fixture { dir, cases }
}

fn config(fixture: &Fixture) -> ReportConfiguration {
    ReportConfiguration::new()
        .with_output_directory(fixture.dir.path().join("out"))
        .with_template_directory(fixture.dir.path().join("templates"))
}

fn run(fixture: &Fixture, config: ReportConfiguration) -> (ReportService, Vec<TestResult>) {
    let assets: Arc<dyn AssetStore> = Arc::new(NativeAssetStore::new());
    let executor = CaseExecutor::new(Arc::new(ThresholdComparer::default()), Arc::clone(&assets));
    let results = BatchRunner::new(executor, BatchConfig::new().with_max_workers(2))
        .run_blocking(fixture.cases.clone())
        .unwrap();

    let service = ReportService::new(assets, config).unwrap();
    for result in &results {
        service.add_result(result).unwrap();
    }
    (service, results)
}

fn result_for<'a>(results: &'a [TestResult], id: u64) -> &'a TestResult {
    results
        .iter()
        .find(|r| r.test_id == TestId::Number(id))
        .unwrap()
}

#[test]
fn three_case_scenario_with_successes_shown() {
    let fixture = three_cases();
    let (service, mut results) = run(&fixture, config(&fixture));

    assert_eq!(results.len(), 3);

    let matched = result_for(&results, 1);
    assert!(matched.test_passed);
    assert!(matched.comments().iter().any(|c| c == PASSED_COMMENT));
    assert!(matched.has_difference());

    let mismatched = result_for(&results, 2);
    assert!(!mismatched.test_passed);
    assert!(mismatched.comments().iter().any(|c| c == MISMATCH_COMMENT));
    assert!(mismatched.has_difference());

    let unreachable = result_for(&results, 3);
    assert!(!unreachable.test_passed);
    assert!(unreachable.comments()[0].contains("Problem encountered retrieving"));
    assert!(unreachable.source_image.is_none());
    assert!(unreachable.reference_image.is_none());
    assert!(unreachable.difference_image.is_none());

    assert_eq!(service.passed_tests(), 1);
    assert_eq!(service.failed_tests(), 2);
    assert_eq!(service.entries().len(), 3);

    let report = service.finalize().unwrap();
    assert_eq!(report, fixture.dir.path().join("out/report/report.html"));
    let html = fs::read_to_string(&report).unwrap();
    assert!(html.contains("Failures: 2,3") || html.contains("Failures: 3,2"));

    for result in &mut results {
        result.release_images();
    }
}

#[test]
fn three_case_scenario_with_successes_hidden() {
    let fixture = three_cases();
    let (service, _results) = run(&fixture, config(&fixture).with_display_successes(false));

    assert_eq!(service.passed_tests(), 1);
    assert_eq!(service.failed_tests(), 2);
    assert_eq!(service.entries().len(), 2);
    assert!(service.entries().iter().all(|e| !e.test_passed));

    // Two images for the mismatch (generated, diff) plus its reference copy
    let images = fs::read_dir(fixture.dir.path().join("out/report/images"))
        .unwrap()
        .count();
    assert_eq!(images, 3);
}

#[test]
fn linked_references_point_at_original_locator() {
    let fixture = three_cases();
    let (service, _results) = run(&fixture, config(&fixture).with_copy_reference_images(false));

    let reference = &fixture.cases[1].reference_location;
    for entry in service.entries() {
        if entry.test_id == TestId::Number(2) {
            assert_eq!(entry.reference_path, lookalike::report::make_uri(reference));
        }
    }
    let copied = fs::read_dir(fixture.dir.path().join("out/report/images"))
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .file_name()
                .to_string_lossy()
                .contains("reference")
        })
        .count();
    assert_eq!(copied, 0);
}

#[test]
fn finalize_twice_is_byte_identical() {
    let fixture = three_cases();
    let (service, _results) = run(&fixture, config(&fixture).with_junit(true));

    let first = fs::read(service.finalize().unwrap()).unwrap();
    let first_junit = fs::read(fixture.dir.path().join("out/report/junit.xml")).unwrap();
    let second = fs::read(service.finalize().unwrap()).unwrap();
    let second_junit = fs::read(fixture.dir.path().join("out/report/junit.xml")).unwrap();

    assert_eq!(first, second);
    assert_eq!(first_junit, second_junit);
}

#[test]
fn failed_finalize_can_be_retried() {
    let fixture = three_cases();
    let template = fixture.dir.path().join("templates/template.html");
    fs::remove_file(&template).unwrap();
    let (service, _results) = run(&fixture, config(&fixture));

    assert!(matches!(
        service.finalize().unwrap_err(),
        LookalikeError::Template { .. }
    ));
    assert_eq!(service.summary().total(), 3);

    fs::write(&template, "{{passed}}|{{failed}}").unwrap();
    let report = service.finalize().unwrap();
    assert_eq!(fs::read_to_string(report).unwrap(), "1|2");
}
