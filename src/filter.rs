use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

use crate::record::{ActiveView, Dataset, ParticipationLevel, StudentRecord};

/// One of the four fixed attendance-percentage ranges.
///
/// The first bucket is closed on both ends (`[0, 25]`); the others are
/// `(lower, upper]`. Attendance outside `[0, 100]` belongs to no bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendanceBucket {
    UpTo25,
    UpTo50,
    UpTo75,
    UpTo100,
}

impl AttendanceBucket {
    pub const ALL: [AttendanceBucket; 4] = [
        AttendanceBucket::UpTo25,
        AttendanceBucket::UpTo50,
        AttendanceBucket::UpTo75,
        AttendanceBucket::UpTo100,
    ];

    pub fn bounds(self) -> (f64, f64) {
        match self {
            AttendanceBucket::UpTo25 => (0.0, 25.0),
            AttendanceBucket::UpTo50 => (25.0, 50.0),
            AttendanceBucket::UpTo75 => (50.0, 75.0),
            AttendanceBucket::UpTo100 => (75.0, 100.0),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AttendanceBucket::UpTo25 => "0-25",
            AttendanceBucket::UpTo50 => "26-50",
            AttendanceBucket::UpTo75 => "51-75",
            AttendanceBucket::UpTo100 => "76-100",
        }
    }

    pub fn contains(self, attendance: f64) -> bool {
        let (lower, upper) = self.bounds();
        match self {
            AttendanceBucket::UpTo25 => attendance >= lower && attendance <= upper,
            _ => attendance > lower && attendance <= upper,
        }
    }

    pub fn containing(attendance: f64) -> Option<Self> {
        Self::ALL.into_iter().find(|bucket| bucket.contains(attendance))
    }

    /// Maps the dashboard's 0..=100 slider (step 25) onto a bucket.
    /// Zero means "no attendance filter", which is not the same as `UpTo25`.
    pub fn from_slider(value: u32) -> Option<Self> {
        match value {
            0 => None,
            1..=25 => Some(AttendanceBucket::UpTo25),
            26..=50 => Some(AttendanceBucket::UpTo50),
            51..=75 => Some(AttendanceBucket::UpTo75),
            _ => Some(AttendanceBucket::UpTo100),
        }
    }
}

impl fmt::Display for AttendanceBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Column the sorted table is ordered by (always descending).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortCriteria {
    #[default]
    Attendance,
    DomainTest1,
    DomainTest2,
    AssignmentGrade,
}

impl SortCriteria {
    pub fn key(self, record: &StudentRecord) -> f64 {
        match self {
            SortCriteria::Attendance => record.attendance,
            SortCriteria::DomainTest1 => record.domain_test_1,
            SortCriteria::DomainTest2 => record.domain_test_2,
            SortCriteria::AssignmentGrade => record.assignment_grade,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortCriteria::Attendance => "Attendance",
            SortCriteria::DomainTest1 => "Domain Test 1 Marks",
            SortCriteria::DomainTest2 => "Domain Test 2 Marks",
            SortCriteria::AssignmentGrade => "Assignment Marks",
        }
    }
}

/// Every widget selection on the dashboard. Absent or empty means
/// "no constraint".
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    pub attendance: Option<AttendanceBucket>,
    pub courses: BTreeSet<String>,
    pub participation: BTreeSet<ParticipationLevel>,
    pub search_ids: Vec<String>,
    pub sort: SortCriteria,
}

impl FilterParams {
    pub fn is_unconstrained(&self) -> bool {
        self.attendance.is_none() && self.courses.is_empty() && self.participation.is_empty()
    }
}

/// Restricts the dataset to one attendance bucket, or returns it whole.
pub fn filter_attendance(dataset: &Dataset, bucket: Option<AttendanceBucket>) -> ActiveView {
    match bucket {
        None => dataset.view(),
        Some(bucket) => {
            let records = dataset
                .records()
                .iter()
                .filter(|r| bucket.contains(r.attendance))
                .cloned()
                .collect();
            ActiveView::new(dataset.columns().to_vec(), records)
        }
    }
}

/// Intersects the course and participation predicates.
///
/// Both predicates are evaluated against the same input view, so neither
/// narrows the other's candidate set. An empty selection passes everything.
pub fn filter_membership(
    view: &ActiveView,
    courses: &BTreeSet<String>,
    participation: &BTreeSet<ParticipationLevel>,
) -> ActiveView {
    if courses.is_empty() && participation.is_empty() {
        return view.clone();
    }

    let records = view
        .records()
        .iter()
        .filter(|r| {
            let course_ok = courses.is_empty() || courses.contains(&r.course);
            let participation_ok =
                participation.is_empty() || participation.contains(&r.participation_level);
            course_ok && participation_ok
        })
        .cloned()
        .collect();
    view.with_records(records)
}

/// Runs the full pipeline: attendance first, then the membership filters.
pub fn apply_filters(dataset: &Dataset, params: &FilterParams) -> ActiveView {
    let attendance_view = filter_attendance(dataset, params.attendance);
    filter_membership(&attendance_view, &params.courses, &params.participation)
}

/// Exact-match lookup of student IDs over the whole dataset, in dataset order.
pub fn search_by_ids(dataset: &Dataset, ids: &[String]) -> ActiveView {
    let wanted: HashSet<&str> = ids.iter().map(|id| id.trim()).collect();
    let records = dataset
        .records()
        .iter()
        .filter(|r| wanted.contains(r.id.as_str()))
        .cloned()
        .collect();
    ActiveView::new(dataset.columns().to_vec(), records)
}

/// Sorts descending by the chosen column; equal keys keep their order and
/// missing values go last.
pub fn sort_records(records: &[StudentRecord], criteria: SortCriteria) -> Vec<StudentRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| {
        let (ka, kb) = (criteria.key(a), criteria.key(b));
        ka.is_nan().cmp(&kb.is_nan()).then_with(|| kb.total_cmp(&ka))
    });
    sorted
}
