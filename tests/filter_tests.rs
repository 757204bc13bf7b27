mod common;

use std::collections::BTreeSet;

use common::{fixture, ids, student};
use student_dashboard::filter::{
    AttendanceBucket, FilterParams, SortCriteria, apply_filters, filter_attendance,
    filter_membership, search_by_ids, sort_records,
};
use student_dashboard::record::{Dataset, ParticipationLevel};

fn courses(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[test]
fn no_filters_keep_every_student() {
    let dataset = fixture();
    let view = apply_filters(&dataset, &FilterParams::default());

    assert_eq!(view.len(), dataset.len());
    assert_eq!(view.columns(), dataset.columns());
}

#[test]
fn course_filter_keeps_only_that_course() {
    let dataset = fixture();
    let params = FilterParams {
        courses: courses(&["MERN"]),
        ..FilterParams::default()
    };
    let view = apply_filters(&dataset, &params);

    assert_eq!(ids(view.records()), vec!["S001", "S002", "S003", "S004"]);
    assert!(view.records().iter().all(|r| r.course == "MERN"));
}

#[test]
fn unknown_course_yields_empty_view_not_error() {
    let dataset = fixture();
    let params = FilterParams {
        courses: courses(&["Rust"]),
        ..FilterParams::default()
    };

    assert!(apply_filters(&dataset, &params).is_empty());
}

#[test]
fn attendance_runs_before_course_and_participation() {
    let dataset = fixture();
    let params = FilterParams {
        attendance: Some(AttendanceBucket::UpTo100),
        courses: courses(&["MERN"]),
        ..FilterParams::default()
    };

    assert_eq!(ids(apply_filters(&dataset, &params).records()), vec!["S003"]);
}

#[test]
fn course_and_participation_are_independent_predicates() {
    let dataset = fixture();
    let attendance_view = filter_attendance(&dataset, Some(AttendanceBucket::UpTo100));
    let high: BTreeSet<ParticipationLevel> = [ParticipationLevel::High].into_iter().collect();

    let by_participation = filter_membership(&attendance_view, &BTreeSet::new(), &high);
    assert_eq!(ids(by_participation.records()), vec!["S003", "S006"]);

    let both = filter_membership(&attendance_view, &courses(&["AWS"]), &high);
    assert_eq!(ids(both.records()), vec!["S006"]);

    let chained = filter_membership(&by_participation, &courses(&["AWS"]), &BTreeSet::new());
    assert_eq!(chained, both);
}

#[test]
fn attendance_buckets_partition_the_dataset() {
    let dataset = fixture();
    let total: usize = AttendanceBucket::ALL
        .into_iter()
        .map(|bucket| filter_attendance(&dataset, Some(bucket)).len())
        .sum();

    assert_eq!(total, dataset.len());
    assert_eq!(
        ids(filter_attendance(&dataset, Some(AttendanceBucket::UpTo25)).records()),
        vec!["S001"]
    );
}

#[test]
fn slider_zero_differs_from_first_bucket() {
    let dataset = fixture();
    let unfiltered = filter_attendance(&dataset, AttendanceBucket::from_slider(0));
    let first = filter_attendance(&dataset, AttendanceBucket::from_slider(25));

    assert_eq!(unfiltered.len(), dataset.len());
    assert_eq!(first.len(), 1);
}

#[test]
fn bucket_boundaries_are_upper_inclusive() {
    let dataset = Dataset::from_records(vec![
        student("S1", "MERN", (50.0, 50.0), 50.0, 0.0, ParticipationLevel::Low),
        student("S2", "MERN", (50.0, 50.0), 50.0, 25.0, ParticipationLevel::Low),
        student("S3", "MERN", (50.0, 50.0), 50.0, 50.0, ParticipationLevel::Low),
        student("S4", "MERN", (50.0, 50.0), 50.0, 100.0, ParticipationLevel::Low),
    ])
    .unwrap();

    let first = filter_attendance(&dataset, Some(AttendanceBucket::UpTo25));
    assert_eq!(ids(first.records()), vec!["S1", "S2"]);

    let second = filter_attendance(&dataset, Some(AttendanceBucket::UpTo50));
    assert_eq!(ids(second.records()), vec!["S3"]);

    let last = filter_attendance(&dataset, Some(AttendanceBucket::UpTo100));
    assert_eq!(ids(last.records()), vec!["S4"]);
}

#[test]
fn search_matches_exact_ids_over_whole_dataset() {
    let dataset = fixture();
    let found = search_by_ids(&dataset, &["S006".to_string(), " S002 ".to_string(), "S999".to_string()]);

    assert_eq!(ids(found.records()), vec!["S002", "S006"]);
    assert!(search_by_ids(&dataset, &["S00".to_string()]).is_empty());
}

#[test]
fn sort_is_descending_and_stable() {
    let dataset = fixture();

    let by_attendance = sort_records(dataset.records(), SortCriteria::Attendance);
    assert_eq!(
        ids(&by_attendance),
        vec!["S006", "S003", "S005", "S008", "S004", "S002", "S007", "S001"]
    );

    // S002 and S004 tie on the first test and keep dataset order.
    let by_first_test = sort_records(dataset.records(), SortCriteria::DomainTest1);
    assert_eq!(
        ids(&by_first_test),
        vec!["S003", "S006", "S002", "S004", "S008", "S001", "S005", "S007"]
    );
}

#[test]
fn missing_values_sort_last_and_match_no_bucket() {
    let records = vec![
        student("S1", "MERN", (80.0, 90.0), f64::NAN, f64::NAN, ParticipationLevel::High),
        student("S2", "MERN", (70.0, 85.0), 40.0, 30.0, ParticipationLevel::Low),
        student("S3", "AWS", (60.0, 75.0), 90.0, 95.0, ParticipationLevel::Medium),
    ];

    let sorted = sort_records(&records, SortCriteria::AssignmentGrade);
    assert_eq!(ids(&sorted), vec!["S3", "S2", "S1"]);

    assert_eq!(AttendanceBucket::containing(f64::NAN), None);
}
