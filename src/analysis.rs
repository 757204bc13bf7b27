use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{DashboardError, Result};
use crate::filter::AttendanceBucket;
use crate::record::{DomainTest, ParticipationLevel, StudentRecord};

/// How many students the consistency and discrepancy rankings keep.
pub const RANKING_SIZE: usize = 10;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParticipationShare {
    pub level: ParticipationLevel,
    pub count: usize,
    pub percentage: f64,
}

/// High, Medium and Low shares for one course, in that order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParticipationBreakdown {
    pub course: String,
    pub shares: Vec<ParticipationShare>,
}

impl ParticipationBreakdown {
    pub fn total(&self) -> usize {
        self.shares.iter().map(|s| s.count).sum()
    }

    pub fn share(&self, level: ParticipationLevel) -> Option<&ParticipationShare> {
        self.shares.iter().find(|s| s.level == level)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoreGap {
    pub student_id: String,
    pub student_name: String,
    pub score_difference: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AttendanceAverages {
    pub bucket: AttendanceBucket,
    pub label: &'static str,
    pub students: usize,
    /// `None` when the bucket is empty.
    pub assignment_grade: Option<f64>,
    pub domain_test_1: Option<f64>,
    pub domain_test_2: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClassAverage {
    pub course: String,
    pub students: usize,
    pub domain_test_1: f64,
    pub domain_test_2: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CohortEntry {
    pub student_id: String,
    pub student_name: String,
    pub score: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BelowAverageCohort {
    pub course: String,
    pub test: DomainTest,
    pub class_average: f64,
    pub students: Vec<CohortEntry>,
}

/// Participation counts and percentages for one course
///
/// # Errors
/// * `NotComputable` when the course has no records, since every
///   percentage would divide by zero
pub fn participation_breakdown(
    records: &[StudentRecord],
    course: &str,
) -> Result<ParticipationBreakdown> {
    let mut counts: BTreeMap<ParticipationLevel, usize> = BTreeMap::new();
    for record in records.iter().filter(|r| r.course == course) {
        *counts.entry(record.participation_level).or_insert(0) += 1;
    }

    let total: usize = counts.values().sum();
    if total == 0 {
        return Err(DashboardError::NotComputable(course.to_string()));
    }

    let shares = ParticipationLevel::ALL
        .into_iter()
        .map(|level| {
            let count = counts.get(&level).copied().unwrap_or(0);
            ParticipationShare {
                level,
                count,
                percentage: count as f64 / total as f64 * 100.0,
            }
        })
        .collect();

    Ok(ParticipationBreakdown {
        course: course.to_string(),
        shares,
    })
}

/// The students whose two domain test scores are closest, smallest gap first.
pub fn consistency_ranking(records: &[StudentRecord]) -> Vec<ScoreGap> {
    let mut ranked: Vec<&StudentRecord> = records.iter().collect();
    ranked.sort_by(|a, b| a.score_difference().total_cmp(&b.score_difference()));
    to_gaps(&ranked)
}

/// The students whose two domain test scores differ the most, largest first.
pub fn discrepancy_ranking(records: &[StudentRecord]) -> Vec<ScoreGap> {
    let mut ranked: Vec<&StudentRecord> = records.iter().collect();
    ranked.sort_by(|a, b| b.score_difference().total_cmp(&a.score_difference()));
    to_gaps(&ranked)
}

fn to_gaps(ranked: &[&StudentRecord]) -> Vec<ScoreGap> {
    ranked
        .iter()
        .take(RANKING_SIZE)
        .map(|r| ScoreGap {
            student_id: r.id.clone(),
            student_name: r.name.clone(),
            score_difference: r.score_difference(),
        })
        .collect()
}

/// Mean assignment grade and test scores per attendance bucket.
///
/// All four buckets are always reported; empty ones carry `None` means.
pub fn attendance_averages(records: &[StudentRecord]) -> Vec<AttendanceAverages> {
    AttendanceBucket::ALL
        .into_iter()
        .map(|bucket| {
            let members: Vec<&StudentRecord> = records
                .iter()
                .filter(|r| bucket.contains(r.attendance))
                .collect();
            AttendanceAverages {
                bucket,
                label: bucket.label(),
                students: members.len(),
                assignment_grade: mean(members.iter().map(|r| r.assignment_grade)),
                domain_test_1: mean(members.iter().map(|r| r.domain_test_1)),
                domain_test_2: mean(members.iter().map(|r| r.domain_test_2)),
            }
        })
        .collect()
}

/// Mean of both domain tests for every course, ordered by course identifier.
pub fn class_averages(records: &[StudentRecord]) -> Vec<ClassAverage> {
    let mut groups: BTreeMap<&str, Vec<&StudentRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.course.as_str()).or_default().push(record);
    }

    groups
        .into_iter()
        .filter_map(|(course, members)| {
            Some(ClassAverage {
                course: course.to_string(),
                students: members.len(),
                domain_test_1: mean(members.iter().map(|r| r.domain_test_1))?,
                domain_test_2: mean(members.iter().map(|r| r.domain_test_2))?,
            })
        })
        .collect()
}

/// Class average of one test within one course
///
/// # Errors
/// * `CourseNotFound` when no record belongs to `course`
pub fn class_average(records: &[StudentRecord], course: &str, test: DomainTest) -> Result<f64> {
    mean(
        records
            .iter()
            .filter(|r| r.course == course)
            .map(|r| test.score(r)),
    )
    .ok_or_else(|| DashboardError::CourseNotFound(course.to_string()))
}

/// Students of `course` scoring strictly below its class average on `test`,
/// highest score first.
///
/// # Errors
/// * `CourseNotFound` when no record belongs to `course`
pub fn below_average_cohort(
    records: &[StudentRecord],
    course: &str,
    test: DomainTest,
) -> Result<BelowAverageCohort> {
    let class_average = class_average(records, course, test)?;

    let mut members: Vec<&StudentRecord> = records
        .iter()
        .filter(|r| r.course == course && test.score(r) < class_average)
        .collect();
    members.sort_by(|a, b| test.score(b).total_cmp(&test.score(a)));

    Ok(BelowAverageCohort {
        course: course.to_string(),
        test,
        class_average,
        students: members
            .into_iter()
            .map(|r| CohortEntry {
                student_id: r.id.clone(),
                student_name: r.name.clone(),
                score: test.score(r),
            })
            .collect(),
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PerformanceTrend {
    Improved,
    Declined,
    NoChange,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PerformanceLevel {
    Excellent,
    Good,
    Average,
    Poor,
}

impl PerformanceLevel {
    /// Banded on the second domain test.
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            PerformanceLevel::Excellent
        } else if score >= 70.0 {
            PerformanceLevel::Good
        } else if score >= 50.0 {
            PerformanceLevel::Average
        } else {
            PerformanceLevel::Poor
        }
    }

    pub fn guidance(self) -> &'static str {
        match self {
            PerformanceLevel::Excellent => "No",
            PerformanceLevel::Good => "Maybe",
            PerformanceLevel::Average => "Yes",
            PerformanceLevel::Poor => "Definitely",
        }
    }
}

/// Per-student summary shown next to a search result.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PerformanceAssessment {
    pub student_id: String,
    pub student_name: String,
    /// Second test minus first test.
    pub score_change: f64,
    pub trend: PerformanceTrend,
    pub level: PerformanceLevel,
    pub guidance_needed: &'static str,
}

pub fn assess_performance(record: &StudentRecord) -> PerformanceAssessment {
    let score_change = record.domain_test_2 - record.domain_test_1;
    let trend = if score_change > 0.0 {
        PerformanceTrend::Improved
    } else if score_change < 0.0 {
        PerformanceTrend::Declined
    } else {
        PerformanceTrend::NoChange
    };
    let level = PerformanceLevel::from_score(record.domain_test_2);

    PerformanceAssessment {
        student_id: record.id.clone(),
        student_name: record.name.clone(),
        score_change,
        trend,
        level,
        guidance_needed: level.guidance(),
    }
}

// Missing (NaN) values are skipped.
fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
