use clap::Parser;

use crate::config::{self, Config};

#[derive(Parser, Debug)]
#[command(name = "glimpse")]
#[command(about = "🖥  Web-accessible remote desktop server", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Port to listen on
    #[arg(long, default_value_t = config::DEFAULT_PORT)]
    pub port: u16,

    /// Shared secret for control (mouse + keyboard) sessions
    #[arg(long)]
    pub password: String,

    /// Optional shared secret for view-only sessions
    #[arg(long = "view_password")]
    pub view_password: Option<String>,

    /// Capture the union of all displays instead of the primary one
    #[arg(long)]
    pub fullscreen: bool,

    /// Frame pacing cap per session, frames per second
    #[arg(long, default_value_t = config::DEFAULT_MAX_FPS)]
    pub fps: u32,

    /// Input dispatch cap per session, events per second
    #[arg(long, default_value_t = config::DEFAULT_MAX_IPS)]
    pub ips: u32,

    /// Lower bound on client-requested JPEG quality
    #[arg(long, default_value_t = config::DEFAULT_MIN_QUALITY)]
    pub min_quality: u8,

    /// Upper bound on client-requested JPEG quality
    #[arg(long, default_value_t = config::DEFAULT_MAX_QUALITY)]
    pub max_quality: u8,

    /// Consecutive partial frames before a forced full repaint
    #[arg(long, default_value_t = config::DEFAULT_PARTIAL_REPAINT)]
    pub partial_repaint: u32,

    /// Consecutive empty frames before a forced full repaint
    #[arg(long, default_value_t = config::DEFAULT_EMPTY_REPAINT)]
    pub empty_repaint: u32,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn into_config(self) -> Config {
        Config {
            port: self.port,
            control_password: self.password,
            view_password: self.view_password,
            fullscreen: self.fullscreen,
            max_fps: self.fps,
            max_ips: self.ips,
            min_quality: self.min_quality,
            max_quality: self.max_quality,
            partial_frames_before_full_repaint: self.partial_repaint,
            empty_frames_before_full_repaint: self.empty_repaint,
        }
    }
}
