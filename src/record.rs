use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use crate::error::{DashboardError, Result};

pub const COL_SL_NO: &str = "SL.No";
pub const COL_STUDENT_ID: &str = "Student ID";
pub const COL_STUDENT_NAME: &str = "Student Name";
pub const COL_COURSE: &str = "Course (Course Id, course Name)";
pub const COL_DOMAIN_TEST_1: &str = "Domain Test -01";
pub const COL_DOMAIN_TEST_2: &str = "Domain Test -02";
pub const COL_ASSIGNMENT: &str = "Assignment grades";
pub const COL_ATTENDANCE: &str = "Attendance records";
pub const COL_PARTICIPATION: &str = "Participation levels (in the classroom)";

/// Headers an upload must carry, in the order the sample exports use.
pub const REQUIRED_COLUMNS: [&str; 9] = [
    COL_SL_NO,
    COL_STUDENT_ID,
    COL_STUDENT_NAME,
    COL_COURSE,
    COL_DOMAIN_TEST_1,
    COL_DOMAIN_TEST_2,
    COL_ASSIGNMENT,
    COL_ATTENDANCE,
    COL_PARTICIPATION,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ParticipationLevel {
    High,
    Medium,
    Low,
}

impl ParticipationLevel {
    pub const ALL: [ParticipationLevel; 3] = [
        ParticipationLevel::High,
        ParticipationLevel::Medium,
        ParticipationLevel::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipationLevel::High => "High",
            ParticipationLevel::Medium => "Medium",
            ParticipationLevel::Low => "Low",
        }
    }

    /// Case-insensitive parse of the classroom participation label.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "high" => Some(ParticipationLevel::High),
            "medium" => Some(ParticipationLevel::Medium),
            "low" => Some(ParticipationLevel::Low),
            _ => None,
        }
    }
}

impl fmt::Display for ParticipationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the two domain tests every student sits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DomainTest {
    First,
    Second,
}

impl DomainTest {
    pub const BOTH: [DomainTest; 2] = [DomainTest::First, DomainTest::Second];

    pub fn score(self, record: &StudentRecord) -> f64 {
        match self {
            DomainTest::First => record.domain_test_1,
            DomainTest::Second => record.domain_test_2,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            DomainTest::First => COL_DOMAIN_TEST_1,
            DomainTest::Second => COL_DOMAIN_TEST_2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StudentRecord {
    pub sequence_no: i64,
    pub id: String,
    pub name: String,
    pub course: String,
    pub domain_test_1: f64,
    pub domain_test_2: f64,
    pub assignment_grade: f64,
    pub attendance: f64,
    pub participation_level: ParticipationLevel,
    /// Columns outside the required schema, kept verbatim for export.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl StudentRecord {
    pub fn score_difference(&self) -> f64 {
        (self.domain_test_1 - self.domain_test_2).abs()
    }

    pub fn has_positive_scores(&self) -> bool {
        self.domain_test_1 > 0.0 && self.domain_test_2 > 0.0
    }

    /// Looks a cell up by its CSV header.
    pub fn field(&self, column: &str) -> Option<FieldValue<'_>> {
        let value = match column {
            COL_SL_NO => FieldValue::Number(self.sequence_no as f64),
            COL_STUDENT_ID => FieldValue::Text(&self.id),
            COL_STUDENT_NAME => FieldValue::Text(&self.name),
            COL_COURSE => FieldValue::Text(&self.course),
            COL_DOMAIN_TEST_1 => FieldValue::Number(self.domain_test_1),
            COL_DOMAIN_TEST_2 => FieldValue::Number(self.domain_test_2),
            COL_ASSIGNMENT => FieldValue::Number(self.assignment_grade),
            COL_ATTENDANCE => FieldValue::Number(self.attendance),
            COL_PARTICIPATION => FieldValue::Text(self.participation_level.as_str()),
            other => return self.extra.get(other).map(|raw| FieldValue::from_raw(raw)),
        };
        Some(value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Number(f64),
}

impl<'a> FieldValue<'a> {
    pub fn from_raw(raw: &'a str) -> Self {
        match raw.trim().parse::<f64>() {
            Ok(number) if number.is_finite() => FieldValue::Number(number),
            _ => FieldValue::Text(raw),
        }
    }
}

impl fmt::Display for FieldValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Number(number) => f.write_str(&format_number(*number)),
        }
    }
}

/// Whole numbers print without a fractional part ("80", not "80.0").
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// The loaded upload. Immutable once built; a new upload replaces it.
#[derive(Clone, Debug, Serialize)]
pub struct Dataset {
    columns: Vec<String>,
    records: Vec<StudentRecord>,
    dropped_rows: usize,
}

impl Dataset {
    /// Builds the working set: rows without a positive score on both domain
    /// tests are dropped for good, and the remaining IDs must be unique.
    pub fn new(columns: Vec<String>, records: Vec<StudentRecord>) -> Result<Self> {
        let total = records.len();
        let records: Vec<StudentRecord> = records
            .into_iter()
            .filter(StudentRecord::has_positive_scores)
            .collect();
        let dropped_rows = total - records.len();

        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if !seen.insert(record.id.as_str()) {
                return Err(DashboardError::DuplicateId(record.id.clone()));
            }
        }

        if dropped_rows > 0 {
            log::warn!("dropped {dropped_rows} of {total} rows without positive scores on both domain tests");
        }

        Ok(Dataset {
            columns,
            records,
            dropped_rows,
        })
    }

    /// Dataset over the canonical column set, for records built in code.
    pub fn from_records(records: Vec<StudentRecord>) -> Result<Self> {
        let columns = REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect();
        Dataset::new(columns, records)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[StudentRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn dropped_rows(&self) -> usize {
        self.dropped_rows
    }

    /// Distinct course identifiers, ordered.
    pub fn courses(&self) -> Vec<String> {
        distinct_courses(&self.records)
    }

    /// The unfiltered view.
    pub fn view(&self) -> ActiveView {
        ActiveView::new(self.columns.clone(), self.records.clone())
    }
}

/// A filtered copy of the dataset. Every filter step builds a new one.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ActiveView {
    columns: Vec<String>,
    records: Vec<StudentRecord>,
}

impl ActiveView {
    pub fn new(columns: Vec<String>, records: Vec<StudentRecord>) -> Self {
        ActiveView { columns, records }
    }

    /// A new view with the same columns over another row set.
    pub fn with_records(&self, records: Vec<StudentRecord>) -> Self {
        ActiveView::new(self.columns.clone(), records)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[StudentRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub fn distinct_courses(records: &[StudentRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.course.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
