mod common;

use common::{FIXTURE, fixture, ids};
use student_dashboard::error::DashboardError;
use student_dashboard::loader::{from_csv_reader, load_dataset, load_upload};
use student_dashboard::record::{ParticipationLevel, REQUIRED_COLUMNS};

const HEADER: &str = "SL.No,Student ID,Student Name,\"Course (Course Id, course Name)\",\
Domain Test -01,Domain Test -02,Assignment grades,Attendance records,\
Participation levels (in the classroom)";

fn csv(rows: &[&str]) -> String {
    let mut content = HEADER.to_string();
    for row in rows {
        content.push('\n');
        content.push_str(row);
    }
    content.push('\n');
    content
}

#[test]
fn fixture_loads_and_drops_unscored_rows() {
    let dataset = fixture();

    assert_eq!(dataset.len(), 8);
    assert_eq!(dataset.dropped_rows(), 2);
    assert!(!ids(dataset.records()).contains(&"S009"));
    assert!(!ids(dataset.records()).contains(&"S010"));
    assert_eq!(dataset.courses(), vec!["AWS".to_string(), "MERN".to_string()]);
}

#[test]
fn fixture_fields_are_typed() {
    let dataset = fixture();
    let first = &dataset.records()[0];

    assert_eq!(first.sequence_no, 1);
    assert_eq!(first.id, "S001");
    assert_eq!(first.name, "Aarav");
    assert_eq!(first.course, "MERN");
    assert_eq!(first.domain_test_1, 60.0);
    assert_eq!(first.domain_test_2, 70.0);
    assert_eq!(first.assignment_grade, 65.0);
    assert_eq!(first.attendance, 20.0);
    assert_eq!(first.participation_level, ParticipationLevel::High);
}

#[test]
fn extra_columns_are_preserved_in_order() {
    let dataset = fixture();

    assert_eq!(dataset.columns().len(), REQUIRED_COLUMNS.len() + 1);
    assert_eq!(dataset.columns().last().map(String::as_str), Some("Batch"));
    assert_eq!(
        dataset.records()[2].extra.get("Batch").map(String::as_str),
        Some("B2")
    );
}

#[test]
fn zero_score_row_is_dropped() {
    let content = csv(&["1,S1,A,MERN,80,90,70,88,High", "2,S2,B,MERN,0,85,60,70,Low"]);
    let dataset = load_upload("class.csv", content.as_bytes()).unwrap();

    assert_eq!(ids(dataset.records()), vec!["S1"]);
    assert_eq!(dataset.dropped_rows(), 1);
}

#[test]
fn blank_test_score_row_is_dropped() {
    let content = csv(&["1,S1,A,MERN,80,90,70,88,High", "2,S2,B,MERN,,85,60,70,Low"]);
    let dataset = from_csv_reader(content.as_bytes()).unwrap();

    assert_eq!(ids(dataset.records()), vec!["S1"]);
    assert_eq!(dataset.dropped_rows(), 1);
}

#[test]
fn blank_assignment_and_attendance_are_missing_values() {
    let content = csv(&[
        "1,S1,A,MERN,80,90,,88,High",
        "2,S2,B,MERN,70,85,60,,Low",
    ]);
    let dataset = from_csv_reader(content.as_bytes()).unwrap();

    assert_eq!(dataset.len(), 2);
    assert_eq!(dataset.dropped_rows(), 0);
    assert!(dataset.records()[0].assignment_grade.is_nan());
    assert_eq!(dataset.records()[0].attendance, 88.0);
    assert!(dataset.records()[1].attendance.is_nan());
}

#[test]
fn non_csv_upload_is_rejected() {
    let content = csv(&["1,S1,A,MERN,80,90,70,88,High"]);

    let err = load_upload("class.xlsx", content.as_bytes()).unwrap_err();
    assert!(matches!(err, DashboardError::UnsupportedFormat(_)));

    let err = load_upload("class", content.as_bytes()).unwrap_err();
    assert!(matches!(err, DashboardError::UnsupportedFormat(_)));

    assert!(load_upload("CLASS.CSV", content.as_bytes()).is_ok());
}

#[test]
fn missing_columns_are_all_reported() {
    let content = "SL.No,Student ID,Student Name\n1,S1,A\n";
    let err = from_csv_reader(content.as_bytes()).unwrap_err();

    match err {
        DashboardError::MissingColumns(missing) => {
            assert_eq!(missing.len(), REQUIRED_COLUMNS.len() - 3);
            assert!(missing.contains(&"Domain Test -01".to_string()));
            assert!(missing.contains(&"Attendance records".to_string()));
        }
        other => panic!("expected MissingColumns, got {other:?}"),
    }
}

#[test]
fn unparseable_number_names_row_and_column() {
    let content = csv(&[
        "1,S1,A,MERN,80,90,70,88,High",
        "2,S2,B,MERN,eighty,85,60,70,Low",
    ]);
    let err = from_csv_reader(content.as_bytes()).unwrap_err();

    match err {
        DashboardError::InvalidValue { row, column, value } => {
            assert_eq!(row, 3);
            assert_eq!(column, "Domain Test -01");
            assert_eq!(value, "eighty");
        }
        other => panic!("expected InvalidValue, got {other:?}"),
    }
}

#[test]
fn unknown_participation_level_is_invalid() {
    let content = csv(&["1,S1,A,MERN,80,90,70,88,Sometimes"]);
    let err = from_csv_reader(content.as_bytes()).unwrap_err();

    assert!(matches!(err, DashboardError::InvalidValue { ref column, .. } if column == "Participation levels (in the classroom)"));
}

#[test]
fn duplicate_ids_are_rejected() {
    let content = csv(&[
        "1,S1,A,MERN,80,90,70,88,High",
        "2,S1,B,AWS,70,75,60,70,Low",
    ]);
    let err = from_csv_reader(content.as_bytes()).unwrap_err();

    assert!(matches!(err, DashboardError::DuplicateId(id) if id == "S1"));
}

#[test]
fn header_only_file_is_an_empty_dataset() {
    let dataset = from_csv_reader(csv(&[]).as_bytes()).unwrap();

    assert!(dataset.is_empty());
    assert_eq!(dataset.columns().len(), REQUIRED_COLUMNS.len());
}

#[test]
fn missing_file_is_an_io_error() {
    let path = FIXTURE.replace("students.csv", "absent.csv");
    let err = load_dataset(path).unwrap_err();

    assert!(matches!(err, DashboardError::Io(_)));
}
