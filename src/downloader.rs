use crate::chart::ChartSpec;
use crate::error::{DashboardError, Result};
use crate::graph::ChartRasterizer;
use crate::record::{
    ActiveView, COL_ASSIGNMENT, COL_ATTENDANCE, COL_DOMAIN_TEST_1, COL_DOMAIN_TEST_2,
    COL_PARTICIPATION, FieldValue, StudentRecord, format_number,
};
use image::{DynamicImage, GenericImageView, ImageOutputFormat};
use printpdf::{
    BuiltinFont, Image, ImageFilter, ImageTransform, IndirectFontRef, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference,
};
use rust_xlsxwriter::{Workbook, Worksheet};
use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const PDF_REPORT_FILENAME: &str = "filtered_student_report.pdf";
pub const XLSX_REPORT_FILENAME: &str = "filtered_student_report.xlsx";
pub const XLSX_SHEET_NAME: &str = "Sheet1";

const PDF_CONTENT_TYPE: &str = "application/pdf";
const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

// A4 portrait, millimetres.
const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 10.0;
const LINE_HEIGHT: f32 = 10.0;
const FONT_SIZE: f32 = 12.0;
const IMAGE_WIDTH: f32 = 190.0;
const JPEG_QUALITY: u8 = 85;

/// Knobs for report generation
#[derive(Clone, Debug)]
pub struct ExportOptions {
    /// Width of each rasterized chart in pixels
    pub chart_width: u32,

    /// Height of each rasterized chart in pixels
    pub chart_height: u32,

    /// Directory under which per-export scratch space is created;
    /// the system temporary directory when `None`
    pub temp_root: Option<PathBuf>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            chart_width: 800,
            chart_height: 600,
            temp_root: None,
        }
    }
}

/// A finished export: the bytes plus what the browser needs to save them
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportBlob {
    pub filename: &'static str,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Filtered rows and the charts that go with them, exported once
#[derive(Clone, Debug)]
pub struct ReportBundle {
    pub view: ActiveView,
    pub charts: Vec<ChartSpec>,
}

impl ReportBundle {
    pub fn new(view: ActiveView, charts: Vec<ChartSpec>) -> Self {
        ReportBundle { view, charts }
    }

    /// Consume the bundle into a PDF report. See [`to_pdf`].
    pub fn into_pdf(
        self,
        rasterizer: &dyn ChartRasterizer,
        options: &ExportOptions,
    ) -> Result<ExportBlob> {
        to_pdf(&self.view, &self.charts, rasterizer, options)
    }

    /// Consume the bundle into a spreadsheet. Charts are not part of it.
    pub fn into_xlsx(self) -> Result<ExportBlob> {
        to_xlsx(&self.view)
    }
}

/// Convert a view to XLSX format
///
/// This function exports the view to a single-sheet workbook named
/// "Sheet1" using the rust_xlsxwriter library. The first row holds the
/// column headers in the view's column order; numeric cells are written as
/// numbers so spreadsheet applications can sort and sum them.
///
/// # Arguments
/// * `view` - The filtered rows to export
///
/// # Returns
/// * `Result<ExportBlob>` - XLSX file content or an `Export` error
///
/// # Examples
/// ```
/// use student_dashboard::downloader::to_xlsx;
/// use student_dashboard::record::Dataset;
///
/// let dataset = Dataset::from_records(Vec::new()).unwrap();
/// match to_xlsx(&dataset.view()) {
///     Ok(blob) => println!("XLSX generated: {} bytes", blob.bytes.len()),
///     Err(e) => eprintln!("Failed to generate XLSX: {}", e),
/// }
/// ```
pub fn to_xlsx(view: &ActiveView) -> Result<ExportBlob> {
    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name(XLSX_SHEET_NAME)?;

    for (c, column) in view.columns().iter().enumerate() {
        worksheet.write_string(0, c as u16, column)?;
    }

    for (r, record) in view.records().iter().enumerate() {
        let row = (r + 1) as u32;
        for (c, column) in view.columns().iter().enumerate() {
            match record.field(column) {
                Some(FieldValue::Number(number)) if number.is_finite() => {
                    worksheet.write_number(row, c as u16, number)?;
                }
                // Missing values stay blank cells.
                Some(FieldValue::Number(_)) => {}
                Some(value) => {
                    worksheet.write_string(row, c as u16, &value.to_string())?;
                }
                None => {}
            }
        }
    }

    workbook.push_worksheet(worksheet);
    let bytes = workbook.save_to_buffer()?;

    log::info!(
        "exported spreadsheet: {} rows, {} bytes",
        view.len(),
        bytes.len()
    );

    Ok(ExportBlob {
        filename: XLSX_REPORT_FILENAME,
        content_type: XLSX_CONTENT_TYPE,
        bytes,
    })
}

/// Convert a view and its charts to a PDF report
///
/// Every record becomes a block of four text lines followed by a blank
/// line, in view order. Each chart is then rasterized and appended as an
/// image 190mm wide. Pages break whenever the next line or image would not
/// fit.
///
/// # Arguments
/// * `view` - The filtered rows to list
/// * `charts` - Charts to append, in order
/// * `rasterizer` - Produces the PNG for each chart
/// * `options` - Chart size and scratch-space location
///
/// # Returns
/// * `Result<ExportBlob>` - PDF file content or an error
///
/// # Implementation Notes
/// * Each call creates its own uniquely named scratch directory for chart
///   images and the assembled document
/// * The directory is removed on every exit path, including errors
/// * Nothing is returned unless the whole document was assembled
pub fn to_pdf(
    view: &ActiveView,
    charts: &[ChartSpec],
    rasterizer: &dyn ChartRasterizer,
    options: &ExportOptions,
) -> Result<ExportBlob> {
    let scratch = scratch_dir(options)?;
    let bytes = assemble_pdf(view, charts, rasterizer, options, scratch.path())?;

    if let Err(e) = scratch.close() {
        log::warn!("could not remove report scratch directory: {e}");
    }

    log::info!(
        "exported pdf: {} rows, {} charts, {} bytes",
        view.len(),
        charts.len(),
        bytes.len()
    );

    Ok(ExportBlob {
        filename: PDF_REPORT_FILENAME,
        content_type: PDF_CONTENT_TYPE,
        bytes,
    })
}

fn scratch_dir(options: &ExportOptions) -> Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("student-report-");
    let dir = match &options.temp_root {
        Some(root) => builder.tempdir_in(root)?,
        None => builder.tempdir()?,
    };
    Ok(dir)
}

fn assemble_pdf(
    view: &ActiveView,
    charts: &[ChartSpec],
    rasterizer: &dyn ChartRasterizer,
    options: &ExportOptions,
    scratch: &Path,
) -> Result<Vec<u8>> {
    let (doc, page, layer) = PdfDocument::new(
        "Filtered Student Report",
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        "Layer 1",
    );
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(pdf_error)?;

    {
        let mut cursor = PageCursor {
            doc: &doc,
            layer: doc.get_page(page).get_layer(layer),
            y: PAGE_HEIGHT - MARGIN,
        };

        for record in view.records() {
            for line in record_lines(record) {
                cursor.line(&line, &font);
            }
        }

        for (i, spec) in charts.iter().enumerate() {
            let png = rasterizer.rasterize(spec, options.chart_width, options.chart_height)?;
            let path = scratch.join(format!("chart-{i}.png"));
            fs::write(&path, &png)?;
            let image = image::open(&path).map_err(|e| {
                DashboardError::Export(format!("chart {:?} is not a readable image: {e}", spec.title))
            })?;
            // Alpha channels are flattened away before embedding.
            cursor.image(&DynamicImage::ImageRgb8(image.to_rgb8()))?;
        }
    }

    let pdf_path = scratch.join("report.pdf");
    let mut writer = BufWriter::new(File::create(&pdf_path)?);
    doc.save(&mut writer).map_err(pdf_error)?;
    writer.flush()?;
    drop(writer);

    Ok(fs::read(&pdf_path)?)
}

/// The fixed text block printed for one student.
pub fn record_lines(record: &StudentRecord) -> [String; 5] {
    [
        format!(
            "Student Name: {}, Student ID: {}",
            record.name, record.id
        ),
        format!(
            "{}: {}, {}: {}",
            COL_DOMAIN_TEST_1,
            format_number(record.domain_test_1),
            COL_DOMAIN_TEST_2,
            format_number(record.domain_test_2)
        ),
        format!(
            "{}: {}, {}: {}",
            COL_ASSIGNMENT,
            format_number(record.assignment_grade),
            COL_ATTENDANCE,
            format_number(record.attendance)
        ),
        format!("{}: {}", COL_PARTICIPATION, record.participation_level),
        String::new(),
    ]
}

fn pdf_error(err: impl std::fmt::Debug) -> DashboardError {
    DashboardError::Export(format!("pdf assembly: {err:?}"))
}

// Top-down writing position; opens a new page when content would overflow.
struct PageCursor<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
}

impl PageCursor<'_> {
    fn ensure_room(&mut self, height: f32) {
        if self.y - height < MARGIN {
            let (page, layer) = self
                .doc
                .add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT - MARGIN;
        }
    }

    fn line(&mut self, text: &str, font: &IndirectFontRef) {
        self.ensure_room(LINE_HEIGHT);
        self.y -= LINE_HEIGHT;
        if !text.is_empty() {
            self.layer
                .use_text(text, FONT_SIZE, Mm(MARGIN), Mm(self.y + 3.0), font);
        }
    }

    // Embedded as a JPEG (DCT) stream.
    fn image(&mut self, image: &DynamicImage) -> Result<()> {
        let mut jpeg = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut jpeg), ImageOutputFormat::Jpeg(JPEG_QUALITY))
            .map_err(|e| DashboardError::Export(format!("chart jpeg encoding: {e}")))?;

        let (width, height) = image.dimensions();
        let usable = PAGE_HEIGHT - 2.0 * MARGIN;
        let mut dpi = width as f32 * 25.4 / IMAGE_WIDTH;
        if height as f32 * 25.4 / dpi > usable {
            dpi = height as f32 * 25.4 / usable;
        }
        let height_mm = height as f32 * 25.4 / dpi;

        self.ensure_room(height_mm);
        self.y -= height_mm;
        let mut embedded = Image::from_dynamic_image(image);
        embedded.image.image_data = jpeg;
        embedded.image.image_filter = Some(ImageFilter::DCT);
        embedded.add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(MARGIN)),
                translate_y: Some(Mm(self.y)),
                dpi: Some(dpi),
                ..Default::default()
            },
        );
        Ok(())
    }
}
