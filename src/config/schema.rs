//! Configuration schema types for `site.toml`
//!
//! Defines the structure and validation rules for sitepipe project configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::tasks::TaskId;

/// How raster images are handled by a build flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImagePolicy {
    /// Recompress every image
    Optimize,
    /// Copy images unchanged
    Copy,
    /// Recompress only images newer than their output
    Changed,
}

impl ImagePolicy {
    /// The graph task implementing this policy.
    pub fn task(self) -> TaskId {
        match self {
            ImagePolicy::Optimize => TaskId::OptimizeImages,
            ImagePolicy::Copy => TaskId::CopyImages,
            ImagePolicy::Changed => TaskId::ChangedImages,
        }
    }
}

/// Project metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name (required)
    pub name: String,
    /// Source directory
    #[serde(default = "default_src")]
    pub src: PathBuf,
    /// Build output directory
    #[serde(default = "default_out")]
    pub out: PathBuf,
}

fn default_src() -> PathBuf {
    PathBuf::from("source")
}

fn default_out() -> PathBuf {
    PathBuf::from("build")
}

/// Static assets copied verbatim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyConfig {
    /// Glob patterns relative to the source directory
    #[serde(default = "default_copy_patterns")]
    pub patterns: Vec<String>,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self { patterns: default_copy_patterns() }
    }
}

fn default_copy_patterns() -> Vec<String> {
    vec![
        "fonts/*.{woff2,woff}".to_string(),
        "*.ico".to_string(),
        "img/favicons/*.*".to_string(),
    ]
}

/// Browser versions used for vendor prefixing.
///
/// Versions are written as `"major"` or `"major.minor"`. Browsers left out
/// are not targeted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserTargets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firefox: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ios_saf: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opera: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safari: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samsung: Option<String>,
}

impl BrowserTargets {
    /// Iterate over the configured `(browser, version)` pairs.
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        let all = [
            ("android", &self.android),
            ("chrome", &self.chrome),
            ("edge", &self.edge),
            ("firefox", &self.firefox),
            ("ios_saf", &self.ios_saf),
            ("opera", &self.opera),
            ("safari", &self.safari),
            ("samsung", &self.samsung),
        ];
        all.into_iter().filter_map(|(name, v)| v.as_deref().map(|v| (name, v))).collect()
    }
}

fn default_browsers() -> BrowserTargets {
    BrowserTargets {
        chrome: Some("90".to_string()),
        edge: Some("90".to_string()),
        firefox: Some("88".to_string()),
        ios_saf: Some("13".to_string()),
        safari: Some("13".to_string()),
        ..Default::default()
    }
}

/// Stylesheet compilation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StylesConfig {
    /// Sass entry point
    #[serde(default = "default_styles_entry")]
    pub entry: PathBuf,
    /// Output path relative to the output directory
    #[serde(default = "default_styles_output")]
    pub output: PathBuf,
    /// Write a `.map` file next to the stylesheet
    #[serde(default = "default_true")]
    pub source_map: bool,
    /// Extra Sass load paths, relative to the source directory
    #[serde(default)]
    pub load_paths: Vec<PathBuf>,
    /// Prefixing targets
    #[serde(default = "default_browsers")]
    pub browsers: BrowserTargets,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            entry: default_styles_entry(),
            output: default_styles_output(),
            source_map: true,
            load_paths: vec![],
            browsers: default_browsers(),
        }
    }
}

fn default_styles_entry() -> PathBuf {
    PathBuf::from("sass/style.scss")
}

fn default_styles_output() -> PathBuf {
    PathBuf::from("css/style.min.css")
}

fn default_true() -> bool {
    true
}

/// HTML minification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtmlConfig {
    #[serde(default = "default_html_patterns")]
    pub patterns: Vec<String>,
}

impl Default for HtmlConfig {
    fn default() -> Self {
        Self { patterns: default_html_patterns() }
    }
}

fn default_html_patterns() -> Vec<String> {
    vec!["*.html".to_string()]
}

/// JavaScript minification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptsConfig {
    #[serde(default = "default_script_patterns")]
    pub patterns: Vec<String>,
    /// Suffix replacing `.js` in output names
    #[serde(default = "default_script_suffix")]
    pub suffix: String,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self { patterns: default_script_patterns(), suffix: default_script_suffix() }
    }
}

fn default_script_patterns() -> Vec<String> {
    vec!["js/*.js".to_string()]
}

fn default_script_suffix() -> String {
    ".min.js".to_string()
}

/// Raster image settings, shared by the image tasks and WebP conversion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    #[serde(default = "default_image_patterns")]
    pub patterns: Vec<String>,
    #[serde(default = "default_image_exclude")]
    pub exclude: Vec<String>,
    /// JPEG re-encode quality (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// oxipng preset (0-6)
    #[serde(default = "default_png_level")]
    pub png_level: u8,
    /// Image handling in the development flow
    #[serde(default = "default_dev_policy")]
    pub dev: ImagePolicy,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            patterns: default_image_patterns(),
            exclude: default_image_exclude(),
            jpeg_quality: default_jpeg_quality(),
            png_level: default_png_level(),
            dev: default_dev_policy(),
        }
    }
}

fn default_image_patterns() -> Vec<String> {
    vec!["img/**/*.{png,jpg}".to_string()]
}

fn default_image_exclude() -> Vec<String> {
    vec!["img/favicons/*.{png,jpg}".to_string()]
}

fn default_jpeg_quality() -> u8 {
    75
}

fn default_png_level() -> u8 {
    2
}

fn default_dev_policy() -> ImagePolicy {
    ImagePolicy::Copy
}

/// WebP conversion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebpConfig {
    /// Lossy quality (0-100)
    #[serde(default = "default_webp_quality")]
    pub quality: f32,
    #[serde(default)]
    pub lossless: bool,
}

impl Default for WebpConfig {
    fn default() -> Self {
        Self { quality: default_webp_quality(), lossless: false }
    }
}

fn default_webp_quality() -> f32 {
    75.0
}

/// Standalone SVG optimization settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvgConfig {
    #[serde(default = "default_svg_patterns")]
    pub patterns: Vec<String>,
    #[serde(default = "default_svg_exclude")]
    pub exclude: Vec<String>,
}

impl Default for SvgConfig {
    fn default() -> Self {
        Self { patterns: default_svg_patterns(), exclude: default_svg_exclude() }
    }
}

fn default_svg_patterns() -> Vec<String> {
    vec!["img/**/*.svg".to_string()]
}

fn default_svg_exclude() -> Vec<String> {
    vec!["img/icons/*.svg".to_string(), "img/favicons/*.svg".to_string()]
}

/// Icon sprite settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpriteConfig {
    #[serde(default = "default_sprite_patterns")]
    pub patterns: Vec<String>,
    #[serde(default = "default_sprite_output")]
    pub output: PathBuf,
}

impl Default for SpriteConfig {
    fn default() -> Self {
        Self { patterns: default_sprite_patterns(), output: default_sprite_output() }
    }
}

fn default_sprite_patterns() -> Vec<String> {
    vec!["img/icons/*.svg".to_string()]
}

fn default_sprite_output() -> PathBuf {
    PathBuf::from("img/sprite.svg")
}

/// Development server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on (0 picks a free port)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Send permissive CORS headers
    #[serde(default = "default_true")]
    pub cors: bool,
    /// Inject the live-reload client into HTML responses
    #[serde(default = "default_true")]
    pub live_reload: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port(), cors: true, live_reload: true }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

/// A watch trigger: source paths matching `pattern` re-run `task`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchRuleConfig {
    pub pattern: String,
    pub task: String,
}

impl WatchRuleConfig {
    fn new(pattern: &str, task: &str) -> Self {
        Self { pattern: pattern.to_string(), task: task.to_string() }
    }
}

/// Watch mode settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
    /// Clear terminal between rebuilds
    #[serde(default)]
    pub clear_screen: bool,
    /// Trigger table, checked in order
    #[serde(default = "default_watch_rules")]
    pub rules: Vec<WatchRuleConfig>,
}

fn default_debounce_ms() -> u32 {
    100
}

fn default_watch_rules() -> Vec<WatchRuleConfig> {
    vec![
        WatchRuleConfig::new("sass/**/*.scss", "styles"),
        WatchRuleConfig::new("js/**/*.js", "scripts"),
        WatchRuleConfig::new("*.html", "clean"),
    ]
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 100, clear_screen: false, rules: default_watch_rules() }
    }
}

/// Scheduler settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Concurrent tasks (0 = available parallelism)
    #[serde(default)]
    pub jobs: usize,
}

/// Complete site.toml configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Project metadata (required)
    pub project: ProjectConfig,
    #[serde(default)]
    pub copy: CopyConfig,
    #[serde(default)]
    pub styles: StylesConfig,
    #[serde(default)]
    pub html: HtmlConfig,
    #[serde(default)]
    pub scripts: ScriptsConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub webp: WebpConfig,
    #[serde(default)]
    pub svg: SvgConfig,
    #[serde(default)]
    pub sprite: SpriteConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub build: BuildConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "images.jpeg_quality")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "site.toml: '{}' {}", self.field, self.message)
    }
}

impl SiteConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: &str| {
            errors.push(ConfigValidationError {
                field: field.to_string(),
                message: message.to_string(),
            });
        };

        if self.project.name.is_empty() {
            push("project.name", "must be a non-empty string");
        }

        if self.project.src == self.project.out {
            push("project.out", "must differ from project.src");
        }

        if !(1..=100).contains(&self.images.jpeg_quality) {
            push("images.jpeg_quality", "must be between 1 and 100");
        }

        if self.images.png_level > 6 {
            push("images.png_level", "must be between 0 and 6");
        }

        if !(0.0..=100.0).contains(&self.webp.quality) {
            push("webp.quality", "must be between 0 and 100");
        }

        if !self.scripts.suffix.ends_with(".js") {
            push("scripts.suffix", "must end with \".js\"");
        }

        for (browser, version) in self.styles.browsers.entries() {
            if parse_browser_version(version).is_none() {
                push(
                    &format!("styles.browsers.{}", browser),
                    "must be a version like \"13\" or \"13.1\"",
                );
            }
        }

        for (i, rule) in self.watch.rules.iter().enumerate() {
            if rule.task.parse::<TaskId>().is_err() {
                push(&format!("watch.rules[{}].task", i), "is not a known task");
            }
            if glob::Pattern::new(&rule.pattern).is_err() {
                push(&format!("watch.rules[{}].pattern", i), "is not a valid glob");
            }
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

/// Parse a `"major[.minor[.patch]]"` browser version into lightningcss'
/// packed `major << 16 | minor << 8 | patch` form.
pub fn parse_browser_version(version: &str) -> Option<u32> {
    let mut parts = version.trim().split('.');
    let major: u32 = parts.next()?.parse().ok()?;
    let minor: u32 = parts.next().map(str::parse::<u32>).transpose().ok()?.unwrap_or(0);
    let patch: u32 = parts.next().map(str::parse::<u32>).transpose().ok()?.unwrap_or(0);
    if parts.next().is_some() || major > 0xffff || minor > 0xff || patch > 0xff {
        return None;
    }
    Some((major << 16) | (minor << 8) | patch)
}
