use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::downloader::ExportOptions;

/// Web host settings. Every flag can also come from the environment.
#[derive(Parser, Debug, Clone)]
#[command(name = "student-dashboard", version, about = "Student performance dashboard server")]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "DASHBOARD_ADDR", default_value = "127.0.0.1:3000")]
    pub addr: SocketAddr,

    /// Width of exported chart images, in pixels
    #[arg(long, env = "DASHBOARD_CHART_WIDTH", default_value_t = 800)]
    pub chart_width: u32,

    /// Height of exported chart images, in pixels
    #[arg(long, env = "DASHBOARD_CHART_HEIGHT", default_value_t = 600)]
    pub chart_height: u32,

    /// Largest accepted upload, in megabytes
    #[arg(long, env = "DASHBOARD_MAX_UPLOAD_MB", default_value_t = 10)]
    pub max_upload_mb: usize,

    /// Root directory for export scratch space
    #[arg(long, env = "DASHBOARD_TEMP_DIR")]
    pub temp_dir: Option<PathBuf>,
}

impl ServerConfig {
    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            chart_width: self.chart_width,
            chart_height: self.chart_height,
            temp_root: self.temp_dir.clone(),
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }
}
