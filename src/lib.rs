/*!
# Student Performance Dashboard

A browser-based analytics dashboard for student performance data, built in Rust.

## Overview

Instructors upload a CSV export of their class and explore it through
widgets: an attendance slider, course and participation selectors, a
student ID search and a sort selector. Every widget change recomputes the
filtered view, the charts and the summary analyses. The filtered view can be
downloaded as a PDF report (student details plus charts) or as an Excel
spreadsheet.

## Architecture

### Ingest Layer
- CSV parsing and header validation (`loader`)
- Typed student records and the immutable dataset (`record`)

### Analysis Layer
- Filter pipeline: attendance bucket first, then course and participation
  (`filter`)
- Aggregation engine: participation shares, consistency and discrepancy
  rankings, attendance-bucket averages, class averages and below-average
  cohorts (`analysis`)
- Chart builder producing renderer-neutral chart specs (`chart`)

### Output Layer
- Chart rasterization with plotters (`graph`)
- PDF and XLSX report export (`downloader`)

### Host Layer
- The dashboard pipeline tying it together (`dashboard`)
- axum web server behind the `web` feature (`app`), configured by `config`
- The `dashboard-cli` binary for scripted use

## Input Format

The CSV must carry these headers (extra columns are kept and exported):

`SL.No`, `Student ID`, `Student Name`, `Course (Course Id, course Name)`,
`Domain Test -01`, `Domain Test -02`, `Assignment grades`,
`Attendance records`, `Participation levels (in the classroom)`

Rows without a positive score on both domain tests are removed at load.

## REST API Endpoints

- `GET /` - Dashboard page
- `POST /api/upload` - Replaces the dataset (multipart field `file`)
- `POST /api/dashboard` - Recomputes the dashboard for the posted widget state
- `POST /api/chart/{name}` - One chart as PNG
- `POST /api/export/pdf`, `POST /api/export/xlsx` - Report downloads
*/

pub mod analysis;
pub mod chart;
pub mod config;
pub mod dashboard;
pub mod downloader;
pub mod error;
pub mod filter;
pub mod graph;
pub mod loader;
pub mod record;

#[cfg(feature = "web")]
pub mod app;

pub use dashboard::{Dashboard, DashboardView};
pub use downloader::{ExportBlob, ExportOptions, ReportBundle};
pub use error::{DashboardError, Result};
pub use filter::{AttendanceBucket, FilterParams, SortCriteria};
pub use graph::{ChartRasterizer, PlottersRasterizer};
pub use loader::{load_dataset, load_upload};
pub use record::{ActiveView, Dataset, ParticipationLevel, StudentRecord};
