#![cfg(not(tarpaulin_include))]

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use student_dashboard::dashboard::{Dashboard, DashboardView};
use student_dashboard::downloader::ExportOptions;
use student_dashboard::filter::{AttendanceBucket, FilterParams, SortCriteria};
use student_dashboard::graph::PlottersRasterizer;
use student_dashboard::loader::load_dataset;
use student_dashboard::record::{ParticipationLevel, format_number};

#[derive(Parser)]
#[command(name = "dashboard-cli")]
#[command(about = "Student performance analytics from the command line", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the dashboard for a CSV file
    Summary {
        #[arg(long)]
        csv: PathBuf,
        #[command(flatten)]
        filters: FilterArgs,
        /// Emit the full view as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a filtered report
    Export {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, value_enum)]
        format: Format,
        #[arg(long, default_value = ".")]
        out: PathBuf,
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value_t = 800)]
        chart_width: u32,
        #[arg(long, default_value_t = 600)]
        chart_height: u32,
    },
}

#[derive(Args)]
struct FilterArgs {
    /// Attendance slider position (0 = all, 25, 50, 75, 100)
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=100))]
    attendance: u32,
    #[arg(long)]
    course: Vec<String>,
    #[arg(long, value_enum)]
    participation: Vec<Participation>,
    /// Student ID to look up; repeatable
    #[arg(long)]
    search: Vec<String>,
    #[arg(long, value_enum, default_value_t = Sort::Attendance)]
    sort: Sort,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Pdf,
    Xlsx,
}

#[derive(Clone, Copy, ValueEnum)]
enum Participation {
    High,
    Medium,
    Low,
}

#[derive(Clone, Copy, ValueEnum)]
enum Sort {
    Attendance,
    Test1,
    Test2,
    Assignment,
}

impl FilterArgs {
    fn into_params(self) -> FilterParams {
        FilterParams {
            attendance: AttendanceBucket::from_slider(self.attendance),
            courses: self.course.into_iter().collect(),
            participation: self
                .participation
                .into_iter()
                .map(|p| match p {
                    Participation::High => ParticipationLevel::High,
                    Participation::Medium => ParticipationLevel::Medium,
                    Participation::Low => ParticipationLevel::Low,
                })
                .collect::<BTreeSet<_>>(),
            search_ids: self.search,
            sort: match self.sort {
                Sort::Attendance => SortCriteria::Attendance,
                Sort::Test1 => SortCriteria::DomainTest1,
                Sort::Test2 => SortCriteria::DomainTest2,
                Sort::Assignment => SortCriteria::AssignmentGrade,
            },
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Summary { csv, filters, json } => {
            let dashboard = Dashboard::new(load_dataset(&csv)?);
            let view = dashboard.render(&filters.into_params());
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_summary(&view);
            }
        }
        Commands::Export {
            csv,
            format,
            out,
            filters,
            chart_width,
            chart_height,
        } => {
            let dashboard = Dashboard::new(load_dataset(&csv)?);
            let bundle = dashboard.report_bundle(&filters.into_params());
            let blob = match format {
                Format::Pdf => {
                    let options = ExportOptions {
                        chart_width,
                        chart_height,
                        ..ExportOptions::default()
                    };
                    bundle.into_pdf(&PlottersRasterizer, &options)?
                }
                Format::Xlsx => bundle.into_xlsx()?,
            };
            fs::create_dir_all(&out)?;
            let path = out.join(blob.filename);
            fs::write(&path, &blob.bytes)?;
            println!("Wrote {} ({} bytes).", path.display(), blob.bytes.len());
        }
    }

    Ok(())
}

fn print_summary(view: &DashboardView) {
    println!(
        "{} of {} students shown ({} rows removed at load)",
        view.active_view.len(),
        view.total_students,
        view.dropped_rows
    );

    if let Some(search) = &view.search {
        println!("\nSearch results:");
        for a in &search.assessments {
            println!(
                "- {} ({}) change {} {:?}, level {:?}, guidance needed: {}",
                a.student_name,
                a.student_id,
                format_number(a.score_change),
                a.trend,
                a.level,
                a.guidance_needed
            );
        }
    }

    println!("\nMost consistent students:");
    for gap in &view.consistency {
        println!("- {} ({}) {}", gap.student_name, gap.student_id, format_number(gap.score_difference));
    }

    println!("\nLargest score differences:");
    for gap in &view.discrepancy {
        println!("- {} ({}) {}", gap.student_name, gap.student_id, format_number(gap.score_difference));
    }

    println!("\nAverages by attendance:");
    for avg in &view.attendance_averages {
        println!(
            "- {:>6}: {} students, assignment {}, test 1 {}, test 2 {}",
            avg.label,
            avg.students,
            mean_or_na(avg.assignment_grade),
            mean_or_na(avg.domain_test_1),
            mean_or_na(avg.domain_test_2)
        );
    }

    println!("\nParticipation by course:");
    for course in &view.participation {
        match &course.breakdown {
            Some(breakdown) => {
                let shares: Vec<String> = breakdown
                    .shares
                    .iter()
                    .map(|s| format!("{} {:.1}%", s.level, s.percentage))
                    .collect();
                println!("- {}: {}", course.course, shares.join(", "));
            }
            None => println!("- {}: not computable", course.course),
        }
    }

    println!("\nClass averages:");
    for avg in &view.class_averages {
        println!(
            "- {}: test 1 {:.2}, test 2 {:.2} ({} students)",
            avg.course, avg.domain_test_1, avg.domain_test_2, avg.students
        );
    }

    println!("\nBelow class average:");
    for cohort in &view.below_average {
        let names: Vec<&str> = cohort.students.iter().map(|s| s.student_name.as_str()).collect();
        println!(
            "- {} {} (average {:.2}): {}",
            cohort.course,
            cohort.test.column(),
            cohort.class_average,
            if names.is_empty() { "none".to_string() } else { names.join(", ") }
        );
    }
}

fn mean_or_na(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"))
}
