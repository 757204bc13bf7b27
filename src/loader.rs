use crate::error::{DashboardError, Result};
use crate::record::{
    COL_ASSIGNMENT, COL_ATTENDANCE, COL_COURSE, COL_DOMAIN_TEST_1, COL_DOMAIN_TEST_2,
    COL_PARTICIPATION, COL_SL_NO, COL_STUDENT_ID, COL_STUDENT_NAME, Dataset, ParticipationLevel,
    REQUIRED_COLUMNS, StudentRecord,
};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;

/// Load a dataset from an uploaded file
///
/// This is the entry point used by the web host. The upload is accepted only
/// when its file name carries a `.csv` extension; anything else is rejected
/// before a single byte is parsed.
///
/// # Arguments
/// * `filename` - Name of the uploaded file, as reported by the browser
/// * `bytes` - Raw file content
///
/// # Returns
/// * `Result<Dataset>` - The validated dataset or an error
///
/// # Errors
/// * `UnsupportedFormat` if the file is not a CSV
/// * `MissingColumns` if any required header is absent
/// * `InvalidValue` / `DuplicateId` for malformed rows
///
/// # Examples
/// ```
/// use student_dashboard::loader::load_upload;
///
/// let csv = "SL.No,Student ID,Student Name,\"Course (Course Id, course Name)\",Domain Test -01,\
/// Domain Test -02,Assignment grades,Attendance records,Participation levels (in the classroom)\n\
/// 1,S1,Asha,MERN,80,90,75,88,High\n";
/// let dataset = load_upload("class.csv", csv.as_bytes()).unwrap();
/// assert_eq!(dataset.len(), 1);
///
/// assert!(load_upload("class.xlsx", csv.as_bytes()).is_err());
/// ```
pub fn load_upload(filename: &str, bytes: &[u8]) -> Result<Dataset> {
    ensure_csv(Path::new(filename))?;
    let dataset = from_csv_reader(bytes)?;
    log::info!(
        "loaded {} from upload: {} records kept, {} dropped",
        filename,
        dataset.len(),
        dataset.dropped_rows()
    );
    Ok(dataset)
}

/// Load a dataset from a CSV file on disk
///
/// # Arguments
/// * `filepath` - Path to the CSV file to load
///
/// # Returns
/// * `Result<Dataset>` - The loaded dataset or an error
///
/// # Examples
/// ```no_run
/// use student_dashboard::loader::load_dataset;
///
/// match load_dataset("students.csv") {
///     Ok(dataset) => println!("Loaded {} students", dataset.len()),
///     Err(e) => eprintln!("Error loading CSV: {}", e),
/// }
/// ```
pub fn load_dataset(filepath: impl AsRef<Path>) -> Result<Dataset> {
    let path = filepath.as_ref();
    ensure_csv(path)?;
    let file = std::fs::File::open(path)?;
    let dataset = from_csv_reader(file)?;
    log::info!(
        "loaded {}: {} records kept, {} dropped",
        path.display(),
        dataset.len(),
        dataset.dropped_rows()
    );
    Ok(dataset)
}

/// Parse CSV content into a dataset
///
/// The header row is validated first: every required column must be present,
/// otherwise the whole load fails with `MissingColumns`. Columns beyond the
/// required set are preserved in their original order. Rows whose domain
/// test scores are not both positive are dropped while building the
/// dataset; a blank score counts as missing, so its row is dropped too.
/// Blank assignment grades and attendance are kept as missing values.
///
/// # Arguments
/// * `reader` - Any source of CSV bytes
///
/// # Returns
/// * `Result<Dataset>` - The parsed dataset or an error
pub fn from_csv_reader<R: Read>(reader: R) -> Result<Dataset> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::Headers)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let columns: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    let index = ColumnIndex::resolve(&columns)?;

    let mut records = Vec::new();
    for (offset, row) in csv_reader.records().enumerate() {
        let row = row?;
        // Header is line 1, first data row is line 2.
        records.push(index.parse_row(&row, offset + 2)?);
    }

    Dataset::new(columns, records)
}

fn ensure_csv(path: &Path) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    match extension.as_deref() {
        Some("csv") => Ok(()),
        Some(ext) => Err(DashboardError::UnsupportedFormat(format!(".{ext}"))),
        None => Err(DashboardError::UnsupportedFormat(
            "file has no extension".to_string(),
        )),
    }
}

// Positions of the required headers within one upload.
struct ColumnIndex {
    positions: HashMap<&'static str, usize>,
    extras: Vec<(usize, String)>,
}

impl ColumnIndex {
    fn resolve(columns: &[String]) -> Result<Self> {
        let mut positions = HashMap::new();
        let mut missing = Vec::new();

        for required in REQUIRED_COLUMNS {
            match columns.iter().position(|c| c == required) {
                Some(pos) => {
                    positions.insert(required, pos);
                }
                None => missing.push(required.to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(DashboardError::MissingColumns(missing));
        }

        let extras = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !REQUIRED_COLUMNS.contains(&c.as_str()))
            .map(|(pos, c)| (pos, c.clone()))
            .collect();

        Ok(ColumnIndex { positions, extras })
    }

    fn raw<'r>(&self, row: &'r StringRecord, column: &'static str) -> &'r str {
        self.positions
            .get(column)
            .and_then(|&pos| row.get(pos))
            .unwrap_or("")
            .trim()
    }

    fn text(&self, row: &StringRecord, column: &'static str, line: usize) -> Result<String> {
        let value = self.raw(row, column);
        if value.is_empty() {
            return Err(invalid(line, column, value));
        }
        Ok(value.to_string())
    }

    // A blank numeric cell is a missing value (NaN), not a malformed one.
    fn number(&self, row: &StringRecord, column: &'static str, line: usize) -> Result<f64> {
        let value = self.raw(row, column);
        if value.is_empty() {
            return Ok(f64::NAN);
        }
        value.parse::<f64>().map_err(|_| invalid(line, column, value))
    }

    fn parse_row(&self, row: &StringRecord, line: usize) -> Result<StudentRecord> {
        let sequence_raw = self.raw(row, COL_SL_NO);
        let sequence_no = sequence_raw
            .parse::<i64>()
            .or_else(|_| sequence_raw.parse::<f64>().map(|v| v as i64))
            .map_err(|_| invalid(line, COL_SL_NO, sequence_raw))?;

        let participation_raw = self.raw(row, COL_PARTICIPATION);
        let participation_level = ParticipationLevel::parse(participation_raw)
            .ok_or_else(|| invalid(line, COL_PARTICIPATION, participation_raw))?;

        let extra: BTreeMap<String, String> = self
            .extras
            .iter()
            .map(|(pos, name)| (name.clone(), row.get(*pos).unwrap_or("").to_string()))
            .collect();

        Ok(StudentRecord {
            sequence_no,
            id: self.text(row, COL_STUDENT_ID, line)?,
            name: self.text(row, COL_STUDENT_NAME, line)?,
            course: self.text(row, COL_COURSE, line)?,
            domain_test_1: self.number(row, COL_DOMAIN_TEST_1, line)?,
            domain_test_2: self.number(row, COL_DOMAIN_TEST_2, line)?,
            assignment_grade: self.number(row, COL_ASSIGNMENT, line)?,
            attendance: self.number(row, COL_ATTENDANCE, line)?,
            participation_level,
            extra,
        })
    }
}

fn invalid(line: usize, column: &str, value: &str) -> DashboardError {
    DashboardError::InvalidValue {
        row: line,
        column: column.to_string(),
        value: value.to_string(),
    }
}
