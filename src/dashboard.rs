use serde::Serialize;

use crate::analysis::{
    self, AttendanceAverages, BelowAverageCohort, ClassAverage, ParticipationBreakdown,
    PerformanceAssessment, ScoreGap,
};
use crate::chart::{self, ChartSpec};
use crate::downloader::ReportBundle;
use crate::error::DashboardError;
use crate::filter::{self, FilterParams, SortCriteria};
use crate::record::{ActiveView, Dataset, DomainTest, StudentRecord, distinct_courses};

/// Charts drawn from the active view and the dataset.
#[derive(Clone, Debug, Serialize)]
pub struct DashboardCharts {
    pub grades_bar: ChartSpec,
    pub attendance_scatter: ChartSpec,
    pub subject_pie: ChartSpec,
    pub student_treemap: ChartSpec,
    pub participation_scatter: ChartSpec,
}

impl DashboardCharts {
    /// The order charts are appended to the PDF report.
    pub fn into_report_order(self) -> Vec<ChartSpec> {
        vec![
            self.grades_bar,
            self.attendance_scatter,
            self.subject_pie,
            self.student_treemap,
            self.participation_scatter,
        ]
    }

    pub fn get(&self, name: &str) -> Option<&ChartSpec> {
        match name {
            "grades_bar" => Some(&self.grades_bar),
            "attendance_scatter" => Some(&self.attendance_scatter),
            "subject_pie" => Some(&self.subject_pie),
            "student_treemap" => Some(&self.student_treemap),
            "participation_scatter" => Some(&self.participation_scatter),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchResults {
    pub records: Vec<StudentRecord>,
    pub assessments: Vec<PerformanceAssessment>,
    pub comparison: ChartSpec,
}

#[derive(Clone, Debug, Serialize)]
pub struct CourseParticipation {
    pub course: String,
    /// `None` when the course has no students in the attendance view.
    pub breakdown: Option<ParticipationBreakdown>,
}

/// Everything one dashboard refresh shows.
#[derive(Clone, Debug, Serialize)]
pub struct DashboardView {
    pub total_students: usize,
    pub dropped_rows: usize,
    pub courses: Vec<String>,
    pub active_view: ActiveView,
    pub sort: SortCriteria,
    pub sorted_table: Vec<StudentRecord>,
    pub search: Option<SearchResults>,
    pub charts: DashboardCharts,
    pub consistency: Vec<ScoreGap>,
    pub discrepancy: Vec<ScoreGap>,
    pub attendance_averages: Vec<AttendanceAverages>,
    pub participation: Vec<CourseParticipation>,
    pub class_averages: Vec<ClassAverage>,
    pub below_average: Vec<BelowAverageCohort>,
}

/// A loaded dataset and the views derived from it.
///
/// Every call recomputes from the dataset; nothing is cached between
/// refreshes, so a call depends only on its parameters.
#[derive(Clone, Debug)]
pub struct Dashboard {
    dataset: Dataset,
}

impl Dashboard {
    pub fn new(dataset: Dataset) -> Self {
        log::info!(
            "dashboard ready: {} students across {} courses",
            dataset.len(),
            dataset.courses().len()
        );
        Dashboard { dataset }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Runs the filter pipeline and every analysis for one set of widget
    /// selections.
    pub fn render(&self, params: &FilterParams) -> DashboardView {
        let attendance_view = filter::filter_attendance(&self.dataset, params.attendance);
        let active_view =
            filter::filter_membership(&attendance_view, &params.courses, &params.participation);
        let scoped = attendance_view.records();

        log::debug!(
            "filters {:?} kept {} of {} students",
            params,
            active_view.len(),
            self.dataset.len()
        );

        let search = if params.search_ids.is_empty() {
            None
        } else {
            let found = filter::search_by_ids(&self.dataset, &params.search_ids);
            Some(SearchResults {
                assessments: found.records().iter().map(analysis::assess_performance).collect(),
                comparison: chart::test_comparison(found.records()),
                records: found.records().to_vec(),
            })
        };

        let participation = distinct_courses(scoped)
            .into_iter()
            .map(|course| {
                let breakdown = match analysis::participation_breakdown(scoped, &course) {
                    Ok(breakdown) => Some(breakdown),
                    Err(e) => {
                        log::warn!("{e}");
                        None
                    }
                };
                CourseParticipation { course, breakdown }
            })
            .collect();

        let mut below_average = Vec::new();
        for course in distinct_courses(scoped) {
            for test in DomainTest::BOTH {
                match analysis::below_average_cohort(scoped, &course, test) {
                    Ok(cohort) => below_average.push(cohort),
                    Err(DashboardError::CourseNotFound(course)) => {
                        log::warn!("no students in course {course}; cohort skipped");
                    }
                    Err(e) => log::warn!("cohort for {course} skipped: {e}"),
                }
            }
        }

        DashboardView {
            total_students: self.dataset.len(),
            dropped_rows: self.dataset.dropped_rows(),
            courses: self.dataset.courses(),
            sort: params.sort,
            sorted_table: filter::sort_records(self.dataset.records(), params.sort),
            search,
            charts: self.charts(&active_view, &attendance_view),
            consistency: analysis::consistency_ranking(scoped),
            discrepancy: analysis::discrepancy_ranking(scoped),
            attendance_averages: analysis::attendance_averages(scoped),
            participation,
            class_averages: analysis::class_averages(scoped),
            below_average,
            active_view,
        }
    }

    /// The filtered rows and the report charts, ready for export.
    pub fn report_bundle(&self, params: &FilterParams) -> ReportBundle {
        let attendance_view = filter::filter_attendance(&self.dataset, params.attendance);
        let active_view =
            filter::filter_membership(&attendance_view, &params.courses, &params.participation);
        let charts = self.charts(&active_view, &attendance_view).into_report_order();
        ReportBundle::new(active_view, charts)
    }

    fn charts(&self, active_view: &ActiveView, attendance_view: &ActiveView) -> DashboardCharts {
        DashboardCharts {
            grades_bar: chart::grades_bar(active_view.records()),
            attendance_scatter: chart::attendance_scatter(active_view.records()),
            subject_pie: chart::subject_pie(self.dataset.records()),
            student_treemap: chart::student_treemap(active_view.records()),
            participation_scatter: chart::participation_scatter(attendance_view.records()),
        }
    }
}
