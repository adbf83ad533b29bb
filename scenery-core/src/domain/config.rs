//! Render job configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Quality tier for a render
///
/// Each tier maps to a fixed resolution/frame-rate preset. The engine uses
/// the same preset to name the directory it writes videos into, so the tier
/// drives both the command line and artifact discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Quality {
    /// 854x480 at 15 fps. Also the fallback for unrecognised values.
    #[default]
    Low,
    Medium,
    High,
    Ultra,
}

/// Resolution and frame rate behind a quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityPreset {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

impl Quality {
    pub const ALL: [Quality; 4] = [Quality::Low, Quality::Medium, Quality::High, Quality::Ultra];

    /// Single-letter flag passed to the engine as `-q<flag>`
    pub fn flag(self) -> char {
        match self {
            Quality::Low => 'l',
            Quality::Medium => 'm',
            Quality::High => 'h',
            Quality::Ultra => 'k',
        }
    }

    /// Directory name the engine uses for video output at this tier
    pub fn dir_name(self) -> &'static str {
        match self {
            Quality::Low => "480p15",
            Quality::Medium => "720p30",
            Quality::High => "1080p60",
            Quality::Ultra => "2160p60",
        }
    }

    pub fn preset(self) -> QualityPreset {
        let (width, height, frame_rate) = match self {
            Quality::Low => (854, 480, 15),
            Quality::Medium => (1280, 720, 30),
            Quality::High => (1920, 1080, 60),
            Quality::Ultra => (3840, 2160, 60),
        };
        QualityPreset {
            width,
            height,
            frame_rate,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Quality::Low => "low",
            Quality::Medium => "medium",
            Quality::High => "high",
            Quality::Ultra => "ultra",
        }
    }

    /// Parses a quality from a flag (`h`), a name (`high`) or a directory
    /// name (`1080p60`), ignoring case.
    ///
    /// Anything unrecognised falls back to [`Quality::Low`].
    pub fn from_str_lossy(value: &str) -> Self {
        let value = value.trim().to_ascii_lowercase();
        Quality::ALL
            .into_iter()
            .find(|q| {
                value == q.name()
                    || value == q.dir_name()
                    || (value.len() == 1 && value.starts_with(q.flag()))
            })
            .unwrap_or_default()
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Quality {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Quality::from_str_lossy(s))
    }
}

impl From<String> for Quality {
    fn from(value: String) -> Self {
        Quality::from_str_lossy(&value)
    }
}

impl From<Quality> for String {
    fn from(value: Quality) -> Self {
        value.name().to_string()
    }
}

/// Settings for a single render request
///
/// Owned by the caller and handed to the render service per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderJobConfig {
    pub quality: Quality,
    /// Container/extension of the produced video (mp4, mov, gif, webm)
    pub format: String,
    /// Wall-clock budget for the engine process, in seconds
    pub timeout_secs: u64,
    /// Overrides the session's temporary media root
    pub output_dir: Option<PathBuf>,
    pub disable_caching: bool,
    pub fps: u32,
}

impl Default for RenderJobConfig {
    fn default() -> Self {
        Self {
            quality: Quality::Low,
            format: "mp4".to_string(),
            timeout_secs: 30,
            output_dir: None,
            disable_caching: true,
            fps: 30,
        }
    }
}

impl RenderJobConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(output_dir.into());
        self
    }

    pub fn with_caching(mut self, enabled: bool) -> Self {
        self.disable_caching = !enabled;
        self
    }

    /// Checks the invariants a job needs before it can be started
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_secs == 0 {
            return Err("timeout must be greater than 0 seconds".to_string());
        }

        if self.fps == 0 {
            return Err("fps must be greater than 0".to_string());
        }

        if self.format.is_empty() || !self.format.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(format!("invalid output format '{}'", self.format));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RenderJobConfig::default();
        assert_eq!(config.quality, Quality::Low);
        assert_eq!(config.format, "mp4");
        assert_eq!(config.timeout_secs, 30);
        assert!(config.disable_caching);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_quality_mappings_are_stable() {
        let dirs: Vec<_> = Quality::ALL.iter().map(|q| q.dir_name()).collect();
        assert_eq!(dirs, ["480p15", "720p30", "1080p60", "2160p60"]);

        let flags: String = Quality::ALL.iter().map(|q| q.flag()).collect();
        assert_eq!(flags, "lmhk");

        for q in Quality::ALL {
            let preset = q.preset();
            assert!(q.dir_name().ends_with(&format!("p{}", preset.frame_rate)));
            assert!(q.dir_name().starts_with(&preset.height.to_string()));
        }
    }

    #[test]
    fn test_lossy_parse() {
        assert_eq!(Quality::from_str_lossy("h"), Quality::High);
        assert_eq!(Quality::from_str_lossy("ULTRA"), Quality::Ultra);
        assert_eq!(Quality::from_str_lossy("720p30"), Quality::Medium);
        assert_eq!(Quality::from_str_lossy("k"), Quality::Ultra);
        assert_eq!(Quality::from_str_lossy(""), Quality::Low);
        assert_eq!(Quality::from_str_lossy("garbage"), Quality::Low);
        assert_eq!("hh".parse::<Quality>().unwrap(), Quality::Low);
    }

    #[test]
    fn test_deserialize_unknown_quality_falls_back() {
        let config: RenderJobConfig =
            serde_json::from_str(r#"{"quality": "cinematic", "timeout_secs": 5}"#).unwrap();
        assert_eq!(config.quality, Quality::Low);
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.format, "mp4");

        let json = serde_json::to_value(RenderJobConfig::default().with_quality(Quality::High))
            .unwrap();
        assert_eq!(json["quality"], "high");
    }

    #[test]
    fn test_validation() {
        assert!(RenderJobConfig::default().with_timeout_secs(0).validate().is_err());
        assert!(RenderJobConfig::default().with_format("").validate().is_err());
        assert!(RenderJobConfig::default().with_format("mp4;rm").validate().is_err());

        let mut config = RenderJobConfig::default();
        config.fps = 0;
        assert!(config.validate().is_err());
    }
}
