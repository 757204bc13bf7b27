#![allow(dead_code)]

use std::collections::BTreeMap;

use student_dashboard::loader::load_dataset;
use student_dashboard::record::{Dataset, ParticipationLevel, StudentRecord};

pub const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/students.csv");

pub fn fixture() -> Dataset {
    load_dataset(FIXTURE).unwrap()
}

pub fn student(
    id: &str,
    course: &str,
    tests: (f64, f64),
    assignment_grade: f64,
    attendance: f64,
    participation_level: ParticipationLevel,
) -> StudentRecord {
    StudentRecord {
        sequence_no: id.trim_start_matches('S').parse().unwrap_or(0),
        id: id.to_string(),
        name: format!("Student {id}"),
        course: course.to_string(),
        domain_test_1: tests.0,
        domain_test_2: tests.1,
        assignment_grade,
        attendance,
        participation_level,
        extra: BTreeMap::new(),
    }
}

pub fn ids(records: &[StudentRecord]) -> Vec<&str> {
    records.iter().map(|r| r.id.as_str()).collect()
}
