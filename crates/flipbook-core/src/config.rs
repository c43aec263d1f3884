//! Flipbook configuration.
//!
//! Configuration can be created programmatically, loaded from a JSON file, or
//! read from environment variables. Every field has a default, so partial
//! files are fine.

use crate::window::{MAX_WINDOW_LEN, WINDOW_AHEAD, WINDOW_BEHIND};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlipbookConfig {
    /// Painted pages never get wider than this, in device-independent pixels.
    pub max_page_width: f32,
    /// Viewports narrower than this present one page at a time.
    pub narrow_breakpoint: f32,
    pub window_behind: u32,
    pub window_ahead: u32,
    pub book_width: f32,
    pub book_height: f32,
    pub narrow_book_height: f32,
    /// Horizontal space left around the book on narrow viewports.
    pub narrow_gutter: f32,
    /// Render a thumbnail strip of every page.
    pub thumbnails: bool,
    pub thumbnail_width: f32,
    /// Placeholder aspect ratio for pages whose size the decoder did not report.
    pub default_aspect_ratio: f32,
}

impl Default for FlipbookConfig {
    fn default() -> Self {
        Self {
            max_page_width: 750.0,
            narrow_breakpoint: 768.0,
            window_behind: WINDOW_BEHIND,
            window_ahead: WINDOW_AHEAD,
            book_width: 836.0,
            book_height: 467.0,
            narrow_book_height: 271.0,
            narrow_gutter: 32.0,
            thumbnails: true,
            thumbnail_width: 55.0,
            default_aspect_ratio: 612.0 / 792.0,
        }
    }
}

impl FlipbookConfig {
    pub fn with_max_page_width(mut self, width: f32) -> Self {
        self.max_page_width = width;
        self
    }

    pub fn with_narrow_breakpoint(mut self, width: f32) -> Self {
        self.narrow_breakpoint = width;
        self
    }

    pub fn with_thumbnails(mut self, enabled: bool) -> Self {
        self.thumbnails = enabled;
        self
    }

    /// Window radius `(behind, ahead)`, clamped so the window never exceeds
    /// [`MAX_WINDOW_LEN`] pages.
    pub fn window_radius(&self) -> (u32, u32) {
        let behind = self.window_behind.min(MAX_WINDOW_LEN - 1);
        let ahead = self.window_ahead.min(MAX_WINDOW_LEN - 1 - behind);
        (behind, ahead)
    }

    /// Loads configuration from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `FLIPBOOK_MAX_PAGE_WIDTH`: paint width cap in pixels (default: 750)
    /// - `FLIPBOOK_NARROW_BREAKPOINT`: single-page breakpoint in pixels (default: 768)
    /// - `FLIPBOOK_THUMBNAILS`: `true`/`false`/`1`/`0` (default: true)
    /// - `FLIPBOOK_THUMBNAIL_WIDTH`: thumbnail width in pixels (default: 55)
    ///
    /// # Errors
    /// Returns an error if any environment variable contains an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("FLIPBOOK_MAX_PAGE_WIDTH") {
            config.max_page_width = parse_width("FLIPBOOK_MAX_PAGE_WIDTH", &val)?;
        }

        if let Ok(val) = std::env::var("FLIPBOOK_NARROW_BREAKPOINT") {
            config.narrow_breakpoint = parse_width("FLIPBOOK_NARROW_BREAKPOINT", &val)?;
        }

        if let Ok(val) = std::env::var("FLIPBOOK_THUMBNAILS") {
            config.thumbnails = match val.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(ConfigError::InvalidValue("FLIPBOOK_THUMBNAILS".to_string())),
            };
        }

        if let Ok(val) = std::env::var("FLIPBOOK_THUMBNAIL_WIDTH") {
            config.thumbnail_width = parse_width("FLIPBOOK_THUMBNAIL_WIDTH", &val)?;
        }

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let widths = [
            ("max_page_width", self.max_page_width),
            ("narrow_breakpoint", self.narrow_breakpoint),
            ("book_width", self.book_width),
            ("book_height", self.book_height),
            ("narrow_book_height", self.narrow_book_height),
            ("thumbnail_width", self.thumbnail_width),
            ("default_aspect_ratio", self.default_aspect_ratio),
        ];

        for (key, value) in widths {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidValue(key.to_string()));
            }
        }

        if !self.narrow_gutter.is_finite() || self.narrow_gutter < 0.0 {
            return Err(ConfigError::InvalidValue("narrow_gutter".to_string()));
        }

        Ok(())
    }
}

fn parse_width(key: &str, value: &str) -> Result<f32, ConfigError> {
    value
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|width| width.is_finite() && *width > 0.0)
        .ok_or_else(|| ConfigError::InvalidValue(key.to_string()))
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for configuration key: {0}")]
    InvalidValue(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
