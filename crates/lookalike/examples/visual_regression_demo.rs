//! Visual Regression Demo
//!
//! Demonstrates the pipeline end to end:
//! - Pixel statistics with configurable tolerances
//! - A concurrent batch over generated cases
//! - An HTML report with generated, reference and difference images
//!
//! Run with: cargo run --example visual_regression_demo -p lookalike

use image::{DynamicImage, Rgba, RgbaImage};
use lookalike::prelude::*;
use std::path::Path;
use std::sync::Arc;

fn main() -> LookalikeResult<()> {
    println!("=== Visual Regression Demo ===\n");

    // Demo 1: Tolerances
    println!("1. Comparison Tolerances");
    println!("   ---------------------");

    let red = solid(40, 40, Rgba([255, 0, 0, 255]));
    let almost_red = solid(40, 40, Rgba([250, 0, 0, 255]));

    let strict = ThresholdComparer::new(ComparisonConfig::default().with_color_threshold(0));
    let lenient = ThresholdComparer::new(ComparisonConfig::default().with_color_threshold(10));
    let strict_stats = strict.stats(&red, &almost_red);
    let lenient_stats = lenient.stats(&red, &almost_red);
    println!(
        "   strict:  {:.1}% differ (max color diff {})",
        strict_stats.diff_percentage(),
        strict_stats.max_color_diff
    );
    println!(
        "   lenient: {:.1}% differ, identical = {}\n",
        lenient_stats.diff_percentage(),
        lenient_stats.is_identical()
    );

    // Demo 2: Batch run
    println!("2. Batch Run");
    println!("   ---------");

    let workspace = tempfile::tempdir()?;
    let dir = workspace.path();
    let red_path = save(&red, dir, "red.png")?;
    let green_path = save(&solid(40, 40, Rgba([0, 255, 0, 255])), dir, "green.png")?;
    let small_path = save(&solid(20, 20, Rgba([255, 0, 0, 255])), dir, "small.png")?;

    let cases = vec![
        TestCase::new(1u32, red_path.clone(), red_path.clone()),
        TestCase::new("colour-change", green_path, red_path.clone()),
        TestCase::new("resized", small_path, red_path),
        TestCase::new("missing", dir.join("nope.png").display().to_string(), "nope.png"),
    ];

    let assets: Arc<dyn AssetStore> = Arc::new(NativeAssetStore::new());
    let executor = CaseExecutor::new(Arc::new(ThresholdComparer::default()), Arc::clone(&assets));
    let runner = BatchRunner::new(executor, BatchConfig::new().with_max_workers(2));
    let mut results = runner.run_blocking(cases)?;

    for result in &results {
        let status = if result.test_passed { "PASS" } else { "FAIL" };
        println!(
            "   {status} {:<14} {}",
            result.test_id.to_string(),
            result.comments().join("; ")
        );
    }

    // Demo 3: Report
    println!("\n3. Report");
    println!("   ------");

    let templates = dir.join("templates");
    assets.create_folder(&templates)?;
    assets.save_text(lookalike::DEFAULT_TEMPLATE, &templates.join("template.html"))?;

    let config = ReportConfiguration::new()
        .with_output_directory(dir.join("out"))
        .with_template_directory(templates)
        .with_junit(true);
    let report = generate_report(assets, config, &results)?;
    for result in &mut results {
        result.release_images();
    }
    println!("   written to {}", report.display());

    println!("\n=== Demo Complete ===");
    Ok(())
}

fn solid(width: u32, height: u32, color: Rgba<u8>) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, color))
}

fn save(image: &DynamicImage, dir: &Path, name: &str) -> LookalikeResult<String> {
    let path = dir.join(name);
    let display = path.display().to_string();
    image
        .save(&path)
        .map_err(|e| LookalikeError::persistence(&display, e.to_string()))?;
    Ok(display)
}
