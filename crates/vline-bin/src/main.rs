//! vline entrypoint.
//!
//! Loads a text file into a document, attaches a layout hierarchy and
//! replays scripted edits against it, printing the change descriptors each
//! step produced and the final tree structure.
use anyhow::{Context, Result, bail};
use clap::Parser;
use core_config::load_from;
use core_layout::{ChangeDescriptor, FoldModel, FoldRunProducer, HierarchyOptions, LayoutHierarchy};
use core_text::Document;
use std::fmt::Write as _;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use tracing::{debug, error, info};
use tracing_appender::non_blocking::WorkerGuard;

/// One scripted document edit.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Edit {
    Insert { offset: usize, text: String },
    Remove { offset: usize, length: usize },
}

/// `i:OFFSET:TEXT` or `r:OFFSET:LEN`. `\n` and `\t` in TEXT are unescaped.
fn parse_edit(s: &str) -> Result<Edit, String> {
    let mut parts = s.splitn(3, ':');
    let (Some(kind), Some(offset), Some(rest)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("expected i:OFFSET:TEXT or r:OFFSET:LEN, got `{s}`"));
    };
    let offset = offset
        .parse::<usize>()
        .map_err(|e| format!("bad offset `{offset}`: {e}"))?;
    match kind {
        "i" => Ok(Edit::Insert {
            offset,
            text: rest.replace("\\n", "\n").replace("\\t", "\t"),
        }),
        "r" => {
            let length = rest.parse::<usize>().map_err(|e| format!("bad length `{rest}`: {e}"))?;
            Ok(Edit::Remove { offset, length })
        }
        other => Err(format!("unknown edit kind `{other}` (use i or r)")),
    }
}

/// `START..END`.
fn parse_range(s: &str) -> Result<Range<usize>, String> {
    let (start, end) = s
        .split_once("..")
        .ok_or_else(|| format!("expected START..END, got `{s}`"))?;
    let start = start.parse::<usize>().map_err(|e| format!("bad start `{start}`: {e}"))?;
    let end = end.parse::<usize>().map_err(|e| format!("bad end `{end}`: {e}"))?;
    if end < start {
        return Err(format!("range end {end} before start {start}"));
    }
    Ok(start..end)
}

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "vline", version, about = "Visual-line layout inspector")]
struct Args {
    /// UTF-8 text file to lay out. An empty document is used when omitted.
    pub path: Option<PathBuf>,
    /// Configuration file path (overrides discovery of `vline.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Edit to replay, in order: `i:OFFSET:TEXT` or `r:OFFSET:LEN`.
    #[arg(long = "edit", value_parser = parse_edit)]
    pub edits: Vec<Edit>,
    /// Collapse a fold over `START..END` before replaying edits.
    #[arg(long = "fold", value_parser = parse_range)]
    pub folds: Vec<Range<usize>>,
    /// Display only `START..END` of the document.
    #[arg(long = "region", value_parser = parse_range)]
    pub region: Option<Range<usize>>,
    /// Container width in pixels.
    #[arg(long = "width")]
    pub width: Option<f64>,
    /// Enable wrapping regardless of configuration.
    #[arg(long = "wrap")]
    pub wrap: bool,
    /// Print the tree after every step instead of only at the end.
    #[arg(long = "dump-each")]
    pub dump_each: bool,
}

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self { log_guard: None }
    }

    fn configure_logging(&mut self) -> Result<()> {
        let log_dir = Path::new(".");
        let log_path = log_dir.join("vline.log");
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let file_appender = tracing_appender::rolling::never(log_dir, "vline.log");
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        match tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .try_init()
        {
            Ok(_) => {
                self.log_guard = Some(guard);
            }
            Err(_err) => {
                // Global subscriber already installed; dropping the guard shuts the writer down.
            }
        }
        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

fn load_text(path: Option<&Path>) -> Result<String> {
    let Some(path) = path else {
        return Ok(String::new());
    };
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    // The layout tree splits paragraphs on '\n' only.
    let content = content.replace("\r\n", "\n");
    debug!(
        target: "io",
        file = %path.display(),
        size_bytes = content.len(),
        line_count = content.lines().count(),
        "file_read_ok"
    );
    Ok(content)
}

fn describe(change: &ChangeDescriptor) -> String {
    let mut out = String::new();
    match change.cause {
        Some(cause) => {
            let _ = write!(out, "{cause:?}");
        }
        None => out.push_str("Layout"),
    }
    if let Some(chars) = &change.chars {
        let _ = write!(out, " chars={}..{}", chars.start, chars.end);
    }
    if let Some(y) = &change.y {
        let _ = write!(out, " y={:.1}..{:.1} delta={:+.1}", y.y0, y.y1, y.delta);
    }
    out
}

fn report_step(out: &mut String, label: &str, hierarchy: &LayoutHierarchy, dump: bool) {
    let _ = writeln!(out, "== {label}");
    for change in hierarchy.take_changes() {
        let _ = writeln!(out, "  {}", describe(&change));
    }
    if dump {
        out.push_str(&hierarchy.dump());
    }
}

fn apply_edit(doc: &Document, edit: &Edit) -> Result<()> {
    match edit {
        Edit::Insert { offset, text } => doc.insert(*offset, text)?,
        Edit::Remove { offset, length } => doc.remove(*offset, *length)?,
    }
    Ok(())
}

/// Build the tree, replay the script and return the printed report.
fn run(args: &Args) -> Result<String> {
    let mut config = load_from(args.config.clone())?;
    if args.wrap {
        config.file.wrap.enabled = true;
    }
    let text = load_text(args.path.as_deref())?;
    let doc = Arc::new(Document::new(&text));
    let folds = Arc::new(FoldModel::new());

    let mut options =
        HierarchyOptions::new(config).producer(Box::new(FoldRunProducer::new(Arc::clone(&folds))));
    if let Some(region) = args.region.clone() {
        options = options.region(region);
    }
    if let Some(width) = args.width {
        options = options.available_width(width);
    }
    let hierarchy = LayoutHierarchy::attach(Arc::clone(&doc), options)?;
    info!(
        target: "runtime.startup",
        chars = doc.len_chars(),
        paragraphs = hierarchy.paragraph_count(),
        "hierarchy_ready"
    );

    let mut out = String::new();
    report_step(&mut out, "attach", &hierarchy, args.dump_each);

    for range in &args.folds {
        hierarchy.notify(folds.collapse(&doc, range.clone())?);
        hierarchy.flush_pending();
        report_step(&mut out, &format!("fold {}..{}", range.start, range.end), &hierarchy, args.dump_each);
    }

    for edit in &args.edits {
        apply_edit(&doc, edit)?;
        hierarchy.flush_pending();
        if let Some(err) = hierarchy.take_error() {
            error!(target: "runtime", %err, ?edit, "edit_failed");
            bail!("layout failed after {edit:?}: {err}");
        }
        report_step(&mut out, &format!("{edit:?}"), &hierarchy, args.dump_each);
    }

    if args.width.is_some() {
        let (_, height) = hierarchy.preferred_size();
        hierarchy.ensure_layout(0.0..height.max(1.0) * 4.0)?;
        report_step(&mut out, "layout", &hierarchy, false);
    }

    hierarchy.check()?;
    let (width, height) = hierarchy.preferred_size();
    let _ = writeln!(out, "== final size={width:.1}x{height:.1}");
    out.push_str(&hierarchy.dump());
    Ok(out)
}

fn main() -> Result<()> {
    let mut startup = AppStartup::new();
    startup.configure_logging()?;
    AppStartup::install_panic_hook();
    info!(target: "runtime", "startup");

    let args = Args::parse();
    let report = run(&args)?;
    print!("{report}");
    info!(target: "runtime", "shutdown");
    drop(startup.log_guard.take());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["vline", "--config", "/nonexistent/vline.toml"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn edits_parse_with_escapes() {
        assert_eq!(
            parse_edit("i:3:a\\nb").unwrap(),
            Edit::Insert {
                offset: 3,
                text: "a\nb".to_string()
            }
        );
        assert_eq!(parse_edit("r:0:2").unwrap(), Edit::Remove { offset: 0, length: 2 });
        assert_eq!(
            parse_edit("i:1:a:b").unwrap(),
            Edit::Insert {
                offset: 1,
                text: "a:b".to_string()
            }
        );
        assert!(parse_edit("x:1:2").is_err());
        assert!(parse_edit("r:1").is_err());
        assert!(parse_edit("r:one:2").is_err());
    }

    #[test]
    fn ranges_parse() {
        assert_eq!(parse_range("4..12").unwrap(), 4..12);
        assert!(parse_range("12..4").is_err());
        assert!(parse_range("4-12").is_err());
    }

    #[test]
    fn script_reports_each_step() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "abc\r\ndef\n").unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let report = run(&args(&[&path, "--edit", "i:1:X", "--edit", "r:4:1"])).unwrap();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[0], "== attach");
        assert!(lines[1].starts_with("  FullRebuild chars=0..8"));
        assert_eq!(lines[2], "== Insert { offset: 1, text: \"X\" }");
        assert_eq!(lines[3], "  ModUpdate chars=0..5");
        assert_eq!(lines[4], "== Remove { offset: 4, length: 1 }");
        assert!(lines[5].starts_with("  ModUpdate chars=0..8"));
        assert!(report.contains("== final size=56.0x16.0"));
        assert!(report.contains("document region=0..8 paragraphs=1"));
    }

    #[test]
    fn folds_join_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "a {{\n  b\n}}\nc\n").unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let report = run(&args(&[&path, "--fold", "3..8"])).unwrap();
        assert!(report.contains("== fold 3..8\n  RebuildParagraphs"));
        assert!(report.contains("paragraphs=2"));
        assert!(report.contains("Fold 3..8"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = run(&args(&["/nonexistent/input.txt"])).unwrap_err();
        assert!(err.to_string().contains("reading"));
    }
}
