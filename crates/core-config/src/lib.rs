//! Configuration loading and parsing for the layout engine.
//!
//! Parses `vline.toml` (or an override path provided by the binary). Every
//! section is optional and every field has a default, so an absent or
//! partial file yields a usable configuration. Unknown fields are ignored to
//! allow forward evolution without warnings.
//!
//! Values that would break the engine (zero widths, zero retry budget) are
//! clamped by [`Config::sanitized`]; clamping is logged under the `config`
//! target so misconfiguration is visible without failing startup.

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::info;

/// How a paragraph wider than the available width is partitioned into rows.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WrapMode {
    /// Break at letter/digit run boundaries, falling back to a hard split.
    #[default]
    Words,
    /// Break at the exact width limit.
    Chars,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WrapConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub mode: WrapMode,
    /// Let one whitespace character hang past the width limit.
    #[serde(default = "default_true")]
    pub allow_trailing_whitespace: bool,
    /// Keep a line terminator on the row of the preceding content.
    #[serde(default = "default_true")]
    pub keep_terminator_with_row: bool,
}

impl Default for WrapConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: WrapMode::Words,
            allow_trailing_whitespace: true,
            keep_terminator_with_row: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BuildConfig {
    /// Rebuilds covering more characters than this only estimate paragraph
    /// boundaries and leave leaf runs unbuilt.
    #[serde(default = "BuildConfig::default_max_chars_for_local_runs")]
    pub max_chars_for_local_runs: usize,
    /// Distance from the edit to the enclosing run start below which the
    /// previous run is rebuilt as well.
    #[serde(default = "BuildConfig::default_look_back_tolerance")]
    pub look_back_tolerance: usize,
    #[serde(default = "BuildConfig::default_max_text_run_chars")]
    pub max_text_run_chars: usize,
    /// Attempts for a rebuild that keeps getting marked stale. The last one
    /// ignores staleness.
    #[serde(default = "BuildConfig::default_rebuild_attempts")]
    pub rebuild_attempts: u32,
    /// Node lists shorter than this renumber directly instead of keeping a gap.
    #[serde(default = "BuildConfig::default_gap_threshold")]
    pub gap_threshold: usize,
    /// Always materialize leaf runs regardless of rebuild size.
    #[serde(default)]
    pub accurate_span: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_chars_for_local_runs: Self::default_max_chars_for_local_runs(),
            look_back_tolerance: Self::default_look_back_tolerance(),
            max_text_run_chars: Self::default_max_text_run_chars(),
            rebuild_attempts: Self::default_rebuild_attempts(),
            gap_threshold: Self::default_gap_threshold(),
            accurate_span: false,
        }
    }
}

impl BuildConfig {
    const fn default_max_chars_for_local_runs() -> usize {
        2000
    }
    const fn default_look_back_tolerance() -> usize {
        1
    }
    const fn default_max_text_run_chars() -> usize {
        256
    }
    const fn default_rebuild_attempts() -> u32 {
        3
    }
    const fn default_gap_threshold() -> usize {
        16
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default = "MetricsConfig::default_char_width")]
    pub char_width: f64,
    #[serde(default = "MetricsConfig::default_row_height")]
    pub row_height: f64,
    #[serde(default = "MetricsConfig::default_ascent")]
    pub ascent: f64,
    #[serde(default = "MetricsConfig::default_tab_size")]
    pub tab_size: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            char_width: Self::default_char_width(),
            row_height: Self::default_row_height(),
            ascent: Self::default_ascent(),
            tab_size: Self::default_tab_size(),
        }
    }
}

impl MetricsConfig {
    const fn default_char_width() -> f64 {
        7.0
    }
    const fn default_row_height() -> f64 {
        16.0
    }
    const fn default_ascent() -> f64 {
        12.0
    }
    const fn default_tab_size() -> usize {
        8
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EventsConfig {
    #[serde(default = "EventsConfig::default_coalesce_delay_ms")]
    pub coalesce_delay_ms: u64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            coalesce_delay_ms: Self::default_coalesce_delay_ms(),
        }
    }
}

impl EventsConfig {
    const fn default_coalesce_delay_ms() -> u64 {
        50
    }
}

/// What happens when the debug tree validator finds an inconsistency.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IntegrityMode {
    /// Validator never runs.
    Off,
    /// Failures are logged with a structural dump.
    #[default]
    Log,
    /// Failures are logged and returned as errors.
    Strict,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct CheckConfig {
    #[serde(default)]
    pub integrity: IntegrityMode,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub wrap: WrapConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub check: CheckConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub file: ConfigFile,    // parsed (or default) data
}

const fn default_true() -> bool {
    true
}

/// Best-effort config path following platform conventions (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from("vline.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("vline").join("vline.toml");
    }
    PathBuf::from("vline.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        return Ok(Config::default());
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => Ok(Config {
            raw: Some(content),
            file,
        }
        .sanitized()),
        Err(e) => {
            info!(target: "config", path = %path.display(), error = %e, "config_parse_failed_using_defaults");
            Ok(Config::default())
        }
    }
}

impl Config {
    /// Parse configuration from an in-memory TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file = toml::from_str::<ConfigFile>(content)?;
        Ok(Config {
            raw: Some(content.to_string()),
            file,
        }
        .sanitized())
    }

    /// Clamp values the engine cannot operate with.
    pub fn sanitized(mut self) -> Self {
        let build = &mut self.file.build;
        if build.rebuild_attempts == 0 {
            info!(target: "config", raw = 0, clamped = 1, "rebuild_attempts_clamped");
            build.rebuild_attempts = 1;
        }
        if build.max_text_run_chars == 0 {
            info!(target: "config", raw = 0, clamped = 1, "max_text_run_chars_clamped");
            build.max_text_run_chars = 1;
        }
        if build.gap_threshold < 2 {
            info!(target: "config", raw = build.gap_threshold, clamped = 2, "gap_threshold_clamped");
            build.gap_threshold = 2;
        }
        let metrics = &mut self.file.metrics;
        if !(metrics.char_width > 0.0) {
            info!(target: "config", raw = metrics.char_width, clamped = 1.0, "char_width_clamped");
            metrics.char_width = 1.0;
        }
        if !(metrics.row_height > 0.0) {
            info!(target: "config", raw = metrics.row_height, clamped = 1.0, "row_height_clamped");
            metrics.row_height = 1.0;
        }
        if metrics.tab_size == 0 {
            info!(target: "config", raw = 0, clamped = 1, "tab_size_clamped");
            metrics.tab_size = 1;
        }
        self
    }

    pub fn wrap(&self) -> &WrapConfig {
        &self.file.wrap
    }

    pub fn build(&self) -> &BuildConfig {
        &self.file.build
    }

    pub fn metrics(&self) -> &MetricsConfig {
        &self.file.metrics
    }

    pub fn coalesce_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.file.events.coalesce_delay_ms)
    }

    pub fn integrity(&self) -> IntegrityMode {
        self.file.check.integrity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex, MutexGuard};
    use tracing::Level;
    use tracing::subscriber::with_default;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct BufferWriter {
        inner: Arc<Mutex<Vec<u8>>>,
    }

    impl BufferWriter {
        fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
            let buf = Arc::new(Mutex::new(Vec::new()));
            (Self { inner: buf.clone() }, buf)
        }
    }

    struct LockedWriter<'a> {
        guard: MutexGuard<'a, Vec<u8>>,
    }

    impl<'a> Write for LockedWriter<'a> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.guard.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for BufferWriter {
        type Writer = LockedWriter<'a>;

        fn make_writer(&'a self) -> Self::Writer {
            LockedWriter {
                guard: self.inner.lock().expect("log buffer poisoned"),
            }
        }
    }

    #[test]
    fn default_config_when_missing_file() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_hopefully__.toml"))).unwrap();
        assert!(!cfg.wrap().enabled);
        assert_eq!(cfg.wrap().mode, WrapMode::Words);
        assert_eq!(cfg.build().max_chars_for_local_runs, 2000);
        assert_eq!(cfg.build().rebuild_attempts, 3);
        assert_eq!(cfg.integrity(), IntegrityMode::Log);
    }

    #[test]
    fn parses_wrap_and_build_sections() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            "[wrap]\nenabled = true\nmode = \"chars\"\nallow_trailing_whitespace = false\n\
             [build]\nlook_back_tolerance = 4\nmax_text_run_chars = 32\n",
        )
        .unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert!(cfg.wrap().enabled);
        assert_eq!(cfg.wrap().mode, WrapMode::Chars);
        assert!(!cfg.wrap().allow_trailing_whitespace);
        assert!(cfg.wrap().keep_terminator_with_row);
        assert_eq!(cfg.build().look_back_tolerance, 4);
        assert_eq!(cfg.build().max_text_run_chars, 32);
        assert_eq!(cfg.build().gap_threshold, 16);
    }

    #[test]
    fn parse_error_falls_back_to_defaults() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[wrap\nenabled = ").unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert!(cfg.raw.is_none());
        assert!(!cfg.wrap().enabled);
    }

    #[test]
    fn integrity_mode_and_delay() {
        let cfg =
            Config::from_toml_str("[check]\nintegrity = \"strict\"\n[events]\ncoalesce_delay_ms = 5\n")
                .unwrap();
        assert_eq!(cfg.integrity(), IntegrityMode::Strict);
        assert_eq!(cfg.coalesce_delay(), std::time::Duration::from_millis(5));
    }

    #[test]
    fn clamp_logging_uses_config_target() {
        let (writer, buffer) = BufferWriter::new();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .with_target(true)
            .with_ansi(false)
            .without_time()
            .with_writer(writer)
            .finish();

        let cfg = with_default(subscriber, || {
            Config::from_toml_str("[build]\nrebuild_attempts = 0\n[metrics]\ntab_size = 0\n").unwrap()
        });

        let log_output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(log_output.contains("INFO config:"));
        assert!(log_output.contains("rebuild_attempts_clamped"));
        assert!(log_output.contains("tab_size_clamped"));
        assert_eq!(cfg.build().rebuild_attempts, 1);
        assert_eq!(cfg.metrics().tab_size, 1);
    }
}
