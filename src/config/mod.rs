//! Process-wide immutable configuration.
//!
//! Built once at startup from CLI flags, validated, then shared read-only
//! with every session via `Arc<Config>`. Nothing here mutates after init.

use anyhow::Result;
use std::time::Duration;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 7417;
/// Default frame pacing cap, frames per second.
pub const DEFAULT_MAX_FPS: u32 = 20;
/// Default input dispatch cap, events per second.
pub const DEFAULT_MAX_IPS: u32 = 60;
/// Default JPEG quality bounds applied to client-requested quality.
pub const DEFAULT_MIN_QUALITY: u8 = 20;
pub const DEFAULT_MAX_QUALITY: u8 = 95;
/// Default number of consecutive partial frames before a forced full repaint.
pub const DEFAULT_PARTIAL_REPAINT: u32 = 60;
/// Default number of consecutive empty frames before a forced full repaint.
pub const DEFAULT_EMPTY_REPAINT: u32 = 600;

/// Server configuration and shared secrets.
///
/// The control password selects a controller session (input allowed); the
/// optional view password selects a view-only session.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub control_password: String,
    pub view_password: Option<String>,
    /// Capture the union of all displays instead of the primary one.
    pub fullscreen: bool,
    pub max_fps: u32,
    pub max_ips: u32,
    pub min_quality: u8,
    pub max_quality: u8,
    /// Consecutive partial frames allowed before a forced full repaint.
    pub partial_frames_before_full_repaint: u32,
    /// Consecutive empty frames allowed before a forced full repaint.
    pub empty_frames_before_full_repaint: u32,
}

impl Config {
    /// Check every bound and the password combination.
    /// Violations are fatal initialization errors.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.port != 0, "port must be in [1, 65535]");
        anyhow::ensure!(
            !self.control_password.is_empty(),
            "a control password is required"
        );
        if let Some(view) = &self.view_password {
            anyhow::ensure!(!view.is_empty(), "view password must not be empty");
            anyhow::ensure!(
                view != &self.control_password,
                "view password must differ from the control password"
            );
        }
        anyhow::ensure!(
            (1..=60).contains(&self.max_fps),
            "fps must be in [1, 60]"
        );
        anyhow::ensure!(
            (1..=240).contains(&self.max_ips),
            "ips must be in [1, 240]"
        );
        anyhow::ensure!(
            (1..=100).contains(&self.min_quality) && (1..=100).contains(&self.max_quality),
            "quality bounds must be in [1, 100]"
        );
        anyhow::ensure!(
            self.min_quality <= self.max_quality,
            "min quality must not exceed max quality"
        );
        anyhow::ensure!(
            self.partial_frames_before_full_repaint > 0,
            "partial repaint threshold must be positive"
        );
        anyhow::ensure!(
            self.empty_frames_before_full_repaint > 0,
            "empty repaint threshold must be positive"
        );
        Ok(())
    }

    /// Minimum time between two frame responses on one session.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.max_fps as f64)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            control_password: String::new(),
            view_password: None,
            fullscreen: false,
            max_fps: DEFAULT_MAX_FPS,
            max_ips: DEFAULT_MAX_IPS,
            min_quality: DEFAULT_MIN_QUALITY,
            max_quality: DEFAULT_MAX_QUALITY,
            partial_frames_before_full_repaint: DEFAULT_PARTIAL_REPAINT,
            empty_frames_before_full_repaint: DEFAULT_EMPTY_REPAINT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            control_password: "secret".into(),
            ..Config::default()
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_missing_control_password_rejected() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_view_password_must_differ() {
        let mut config = valid();
        config.view_password = Some("secret".into());
        assert!(config.validate().is_err());

        config.view_password = Some("other".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_quality_bounds_ordered() {
        let mut config = valid();
        config.min_quality = 90;
        config.max_quality = 30;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_repaint_threshold_rejected() {
        let mut config = valid();
        config.empty_frames_before_full_repaint = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_frame_interval_follows_fps() {
        let mut config = valid();
        config.max_fps = 20;
        assert_eq!(config.frame_interval(), Duration::from_millis(50));
    }
}
