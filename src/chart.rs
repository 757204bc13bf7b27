use serde::Serialize;
use std::collections::BTreeMap;

use crate::record::{
    COL_ASSIGNMENT, COL_ATTENDANCE, COL_COURSE, COL_DOMAIN_TEST_1, COL_DOMAIN_TEST_2,
    COL_PARTICIPATION, COL_SL_NO, COL_STUDENT_NAME, StudentRecord, format_number,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ChartKind {
    Bar,
    GroupedBar,
    Scatter,
    Pie,
    Treemap,
}

/// A categorical mark: one bar, one scatter point or one pie slice.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CategoryPoint {
    pub label: String,
    pub value: f64,
    /// Continuous colour channel, when the chart has one.
    pub color: Option<f64>,
    pub hover: Vec<(String, String)>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub values: Vec<f64>,
}

/// One leaf of a treemap, addressed by its path from the root.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TreeLeaf {
    pub path: Vec<String>,
    pub value: f64,
    pub color: f64,
    pub hover: Vec<(String, String)>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "shape", content = "values", rename_all = "snake_case")]
pub enum ChartData {
    Points(Vec<CategoryPoint>),
    Grouped {
        categories: Vec<String>,
        series: Vec<Series>,
    },
    Tree {
        levels: Vec<String>,
        leaves: Vec<TreeLeaf>,
    },
}

/// Renderer-neutral description of one chart.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub color_label: Option<String>,
    /// Fraction of the pie radius left empty.
    pub hole: Option<f64>,
    pub data: ChartData,
}

impl ChartSpec {
    fn new(kind: ChartKind, title: &str, x_label: &str, y_label: &str, data: ChartData) -> Self {
        ChartSpec {
            kind,
            title: title.to_string(),
            x_label: x_label.to_string(),
            y_label: y_label.to_string(),
            color_label: None,
            hole: None,
            data,
        }
    }

    pub fn is_empty(&self) -> bool {
        match &self.data {
            ChartData::Points(points) => points.is_empty(),
            ChartData::Grouped { categories, .. } => categories.is_empty(),
            ChartData::Tree { leaves, .. } => leaves.is_empty(),
        }
    }
}

// Group-by-and-sum keyed on a string column, keys ordered. Missing values
// add nothing.
fn sum_by<'a>(
    records: &'a [StudentRecord],
    key: impl Fn(&'a StudentRecord) -> &'a str,
    value: impl Fn(&StudentRecord) -> f64,
) -> Vec<CategoryPoint> {
    let mut sums: BTreeMap<&str, f64> = BTreeMap::new();
    for record in records {
        let sum = sums.entry(key(record)).or_insert(0.0);
        let value = value(record);
        if !value.is_nan() {
            *sum += value;
        }
    }
    sums.into_iter()
        .map(|(label, value)| CategoryPoint {
            label: label.to_string(),
            value,
            color: None,
            hover: Vec::new(),
        })
        .collect()
}

/// "All Students Grades": assignment grades summed per student name.
pub fn grades_bar(records: &[StudentRecord]) -> ChartSpec {
    ChartSpec::new(
        ChartKind::Bar,
        "All Students Grades",
        COL_STUDENT_NAME,
        COL_ASSIGNMENT,
        ChartData::Points(sum_by(records, |r| r.name.as_str(), |r| r.assignment_grade)),
    )
}

/// "All Students Attendance": attendance summed per student name.
pub fn attendance_scatter(records: &[StudentRecord]) -> ChartSpec {
    ChartSpec::new(
        ChartKind::Scatter,
        "All Students Attendance",
        COL_STUDENT_NAME,
        COL_ATTENDANCE,
        ChartData::Points(sum_by(records, |r| r.name.as_str(), |r| r.attendance)),
    )
}

/// "Subject Comparison": one slice per course, weighted by serial number.
pub fn subject_pie(records: &[StudentRecord]) -> ChartSpec {
    let mut spec = ChartSpec::new(
        ChartKind::Pie,
        "Subject Comparison",
        COL_COURSE,
        COL_SL_NO,
        ChartData::Points(sum_by(records, |r| r.course.as_str(), |r| r.sequence_no as f64)),
    );
    spec.hole = Some(0.3);
    spec
}

/// "All Students Treemap": name → course → participation, sized by serial
/// number and coloured by assignment grade.
pub fn student_treemap(records: &[StudentRecord]) -> ChartSpec {
    let leaves = records
        .iter()
        .map(|r| TreeLeaf {
            path: vec![
                r.name.clone(),
                r.course.clone(),
                r.participation_level.to_string(),
            ],
            value: r.sequence_no as f64,
            color: r.assignment_grade,
            hover: vec![
                (COL_DOMAIN_TEST_1.to_string(), format_number(r.domain_test_1)),
                (COL_DOMAIN_TEST_2.to_string(), format_number(r.domain_test_2)),
            ],
        })
        .collect();

    let mut spec = ChartSpec::new(
        ChartKind::Treemap,
        "All Students Treemap",
        "",
        "",
        ChartData::Tree {
            levels: vec![
                COL_STUDENT_NAME.to_string(),
                COL_COURSE.to_string(),
                COL_PARTICIPATION.to_string(),
            ],
            leaves,
        },
    );
    spec.color_label = Some(COL_ASSIGNMENT.to_string());
    spec
}

/// Participation level against assignment grade, coloured by attendance.
pub fn participation_scatter(records: &[StudentRecord]) -> ChartSpec {
    let points = records
        .iter()
        .filter(|r| !r.assignment_grade.is_nan())
        .map(|r| CategoryPoint {
            label: r.participation_level.to_string(),
            value: r.assignment_grade,
            color: Some(r.attendance),
            hover: vec![(COL_STUDENT_NAME.to_string(), r.name.clone())],
        })
        .collect();

    let mut spec = ChartSpec::new(
        ChartKind::Scatter,
        "Relation between Participation, Attendance and Grades",
        COL_PARTICIPATION,
        COL_ASSIGNMENT,
        ChartData::Points(points),
    );
    spec.color_label = Some(COL_ATTENDANCE.to_string());
    spec
}

/// "Test Results Comparison": both tests and the assignment grade side by
/// side for each searched student.
pub fn test_comparison(records: &[StudentRecord]) -> ChartSpec {
    let categories = records.iter().map(|r| r.name.clone()).collect();
    let series = vec![
        Series {
            name: COL_DOMAIN_TEST_1.to_string(),
            values: records.iter().map(|r| r.domain_test_1).collect(),
        },
        Series {
            name: COL_DOMAIN_TEST_2.to_string(),
            values: records.iter().map(|r| r.domain_test_2).collect(),
        },
        Series {
            name: COL_ASSIGNMENT.to_string(),
            values: records.iter().map(|r| r.assignment_grade).collect(),
        },
    ];

    ChartSpec::new(
        ChartKind::GroupedBar,
        "Test Results Comparison",
        COL_STUDENT_NAME,
        "Marks",
        ChartData::Grouped { categories, series },
    )
}
