mod common;

use std::fs;
use std::io::Cursor;

use calamine::{Data, Reader, Xlsx, open_workbook_from_rs};
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use tempfile::TempDir;

use common::fixture;
use student_dashboard::chart::{self, ChartData, ChartKind, ChartSpec};
use student_dashboard::downloader::{
    ExportOptions, PDF_REPORT_FILENAME, ReportBundle, XLSX_REPORT_FILENAME, record_lines, to_pdf,
    to_xlsx,
};
use student_dashboard::dashboard::Dashboard;
use student_dashboard::error::{DashboardError, Result};
use student_dashboard::filter::FilterParams;
use student_dashboard::graph::{ChartRasterizer, PlottersRasterizer};

/// Solid-colour PNG of the requested size.
struct SolidRasterizer;

impl ChartRasterizer for SolidRasterizer {
    fn rasterize(&self, _spec: &ChartSpec, width: u32, height: u32) -> Result<Vec<u8>> {
        let image = RgbImage::from_pixel(width, height, Rgb([40, 90, 160]));
        let mut png = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
            .map_err(|e| DashboardError::Export(e.to_string()))?;
        Ok(png)
    }
}

struct BrokenRasterizer;

impl ChartRasterizer for BrokenRasterizer {
    fn rasterize(&self, spec: &ChartSpec, _width: u32, _height: u32) -> Result<Vec<u8>> {
        Err(DashboardError::Export(format!("cannot draw {}", spec.title)))
    }
}

fn options_in(root: &TempDir) -> ExportOptions {
    ExportOptions {
        chart_width: 80,
        chart_height: 60,
        temp_root: Some(root.path().to_path_buf()),
    }
}

fn entries(root: &TempDir) -> usize {
    fs::read_dir(root.path()).unwrap().count()
}

#[test]
fn pdf_report_contains_rows_and_charts() {
    let dataset = fixture();
    let view = dataset.view();
    let charts = vec![
        chart::grades_bar(view.records()),
        chart::subject_pie(dataset.records()),
    ];
    let root = TempDir::new().unwrap();

    let blob = to_pdf(&view, &charts, &SolidRasterizer, &options_in(&root)).unwrap();

    assert_eq!(blob.filename, PDF_REPORT_FILENAME);
    assert_eq!(blob.content_type, "application/pdf");
    assert!(blob.bytes.starts_with(b"%PDF"));
    assert_eq!(entries(&root), 0, "scratch space left behind");
}

#[test]
fn pdf_report_of_empty_view_is_still_a_document() {
    let dataset = fixture();
    let empty = dataset.view().with_records(Vec::new());
    let root = TempDir::new().unwrap();

    let blob = to_pdf(&empty, &[], &SolidRasterizer, &options_in(&root)).unwrap();

    assert!(blob.bytes.starts_with(b"%PDF"));
}

#[test]
fn long_reports_span_pages() {
    let dataset = fixture();
    let mut records = Vec::new();
    for _ in 0..10 {
        records.extend(dataset.records().iter().cloned());
    }
    let long = dataset.view().with_records(records);
    let short = dataset.view().with_records(dataset.records()[..1].to_vec());
    let root = TempDir::new().unwrap();

    let long_blob = to_pdf(&long, &[], &SolidRasterizer, &options_in(&root)).unwrap();
    let short_blob = to_pdf(&short, &[], &SolidRasterizer, &options_in(&root)).unwrap();

    // 80 records at five lines each need several pages.
    assert!(long_blob.bytes.starts_with(b"%PDF"));
    assert!(long_blob.bytes.len() > short_blob.bytes.len());
    assert_eq!(entries(&root), 0);
}

#[test]
fn full_size_charts_keep_the_report_small() {
    let bundle = Dashboard::new(fixture()).report_bundle(&FilterParams::default());
    assert_eq!(bundle.charts.len(), 5);
    let root = TempDir::new().unwrap();
    let options = ExportOptions {
        temp_root: Some(root.path().to_path_buf()),
        ..ExportOptions::default()
    };

    let blob = bundle.into_pdf(&SolidRasterizer, &options).unwrap();

    // Five raw 800x600 RGB images alone would be over 7MB.
    assert!(blob.bytes.starts_with(b"%PDF"));
    assert!(blob.bytes.len() < 1024 * 1024, "{} bytes", blob.bytes.len());
}

#[test]
fn rasterizer_failure_aborts_export_and_cleans_up() {
    let dataset = fixture();
    let view = dataset.view();
    let charts = vec![chart::grades_bar(view.records())];
    let root = TempDir::new().unwrap();

    let err = to_pdf(&view, &charts, &BrokenRasterizer, &options_in(&root)).unwrap_err();

    assert!(matches!(err, DashboardError::Export(message) if message.contains("All Students Grades")));
    assert_eq!(entries(&root), 0, "scratch space left behind");
}

#[test]
fn concurrent_exports_do_not_collide() {
    let dataset = fixture();
    let root = TempDir::new().unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let view = dataset.view();
                let options = options_in(&root);
                scope.spawn(move || {
                    let charts = vec![chart::attendance_scatter(view.records())];
                    to_pdf(&view, &charts, &SolidRasterizer, &options)
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }
    });

    assert_eq!(entries(&root), 0);
}

#[test]
fn record_block_matches_report_layout() {
    let dataset = fixture();
    let lines = record_lines(&dataset.records()[0]);

    assert_eq!(lines[0], "Student Name: Aarav, Student ID: S001");
    assert_eq!(lines[1], "Domain Test -01: 60, Domain Test -02: 70");
    assert_eq!(lines[2], "Assignment grades: 65, Attendance records: 20");
    assert_eq!(lines[3], "Participation levels (in the classroom): High");
    assert!(lines[4].is_empty());
}

#[test]
fn xlsx_round_trips_rows_and_columns() {
    let dataset = fixture();
    let view = dataset.view();

    let blob = to_xlsx(&view).unwrap();
    assert_eq!(blob.filename, XLSX_REPORT_FILENAME);

    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(blob.bytes)).unwrap();
    let range = workbook.worksheet_range("Sheet1").unwrap();

    assert_eq!(range.get_size(), (view.len() + 1, view.columns().len()));

    let header: Vec<String> = range.rows().next().unwrap().iter().map(|c| c.to_string()).collect();
    assert_eq!(header, view.columns());

    // Row 1 is S001: numbers stay numbers, text stays text.
    assert_eq!(range.get_value((1, 1)), Some(&Data::String("S001".to_string())));
    assert_eq!(range.get_value((1, 4)), Some(&Data::Float(60.0)));
    assert_eq!(range.get_value((1, 9)), Some(&Data::String("B1".to_string())));
}

#[test]
fn xlsx_leaves_missing_values_blank() {
    let dataset = fixture();
    let mut record = dataset.records()[0].clone();
    record.attendance = f64::NAN;
    let view = dataset.view().with_records(vec![record]);

    let blob = to_xlsx(&view).unwrap();
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(blob.bytes)).unwrap();
    let range = workbook.worksheet_range("Sheet1").unwrap();

    assert_eq!(range.get_value((1, 6)), Some(&Data::Float(65.0)));
    assert!(matches!(range.get_value((1, 7)), None | Some(Data::Empty)));
    assert_eq!(range.get_value((1, 9)), Some(&Data::String("B1".to_string())));
}

#[test]
fn xlsx_of_empty_view_has_only_headers() {
    let dataset = fixture();
    let empty = dataset.view().with_records(Vec::new());

    let blob = ReportBundle::new(empty, Vec::new()).into_xlsx().unwrap();
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(blob.bytes)).unwrap();
    let range = workbook.worksheet_range("Sheet1").unwrap();

    assert_eq!(range.get_size().0, 1);
}

#[test]
fn plotters_rejects_mismatched_chart_data() {
    let spec = ChartSpec {
        kind: ChartKind::Pie,
        title: "Broken".to_string(),
        x_label: String::new(),
        y_label: String::new(),
        color_label: None,
        hole: None,
        data: ChartData::Grouped {
            categories: Vec::new(),
            series: Vec::new(),
        },
    };

    let err = PlottersRasterizer.rasterize(&spec, 100, 100).unwrap_err();
    assert!(matches!(err, DashboardError::Export(_)));

    let err = PlottersRasterizer
        .rasterize(&chart::grades_bar(&[]), 0, 100)
        .unwrap_err();
    assert!(matches!(err, DashboardError::Export(_)));
}

fn assert_png(bytes: &[u8], width: u32, height: u32) {
    assert!(bytes.starts_with(b"\x89PNG\r\n\x1a\n"));
    let decoded = image::load_from_memory(bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (width, height));
}

#[test]
fn plotters_renders_every_report_chart() {
    let dashboard = Dashboard::new(fixture());
    let mut charts = dashboard.report_bundle(&FilterParams::default()).charts;
    charts.push(chart::test_comparison(&dashboard.dataset().records()[..3]));

    for spec in &charts {
        let png = PlottersRasterizer.rasterize(spec, 400, 300).unwrap();
        assert_png(&png, 400, 300);
    }
}

#[test]
fn plotters_renders_charts_without_data() {
    for spec in [
        chart::grades_bar(&[]),
        chart::attendance_scatter(&[]),
        chart::student_treemap(&[]),
        chart::participation_scatter(&[]),
        chart::test_comparison(&[]),
    ] {
        let png = PlottersRasterizer.rasterize(&spec, 320, 240).unwrap();
        assert_png(&png, 320, 240);
    }
}
