//! SuperCopy - Command-line front end for the copy/unpack engine.
//!
//! Parses arguments, resolves defaults the engine leaves to the caller
//! (worker count, copy vs unpack), and renders progress either as a
//! throttled bar on stderr or as JSON lines on stdout.

use clap::Parser;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use supercopy_engine::{
    run_copy, ArchiveDispatcher, ArchiveFormat, EngineConfig, EngineError, ProgressEvent,
    ProgressSink, ProgressTally, DEFAULT_BUFFER_SIZE,
};
use supercopy_engine::archive::DEFAULT_RAR_TOOL;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// SuperCopy - Parallel copy with optional verification, and archive unpacking
#[derive(Parser, Debug)]
#[command(name = "supercopy")]
#[command(version)]
#[command(about = "Copy files and directories in parallel, or unpack zip/7z/rar archives")]
struct Args {
    /// File or directory to copy, or archive to unpack
    #[arg(value_name = "SOURCE")]
    source: PathBuf,

    /// Destination path (copied into when it is an existing directory)
    #[arg(value_name = "DESTINATION")]
    destination: PathBuf,

    /// Treat SOURCE as an archive and extract it into DESTINATION
    #[arg(long)]
    unpack: bool,

    /// Number of parallel copy workers (default: available CPUs)
    #[arg(short = 'w', long, value_name = "N")]
    workers: Option<usize>,

    /// Read/write buffer size in bytes
    #[arg(short = 'b', long = "buffer", value_name = "BYTES", default_value_t = DEFAULT_BUFFER_SIZE)]
    buffer_size: usize,

    /// Verify every copied file with SHA-256
    #[arg(long)]
    verify: bool,

    /// External tool used for rar archives
    #[arg(long, value_name = "PATH", default_value = DEFAULT_RAR_TOOL)]
    rar_tool: PathBuf,

    /// Emit progress events as JSON lines on stdout
    #[arg(long)]
    json: bool,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short = 'v', long)]
    verbose: bool,
}

/// How a run that got past setup ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunOutcome {
    Clean,
    PartialFailure,
}

impl RunOutcome {
    fn exit_code(self) -> i32 {
        match self {
            RunOutcome::Clean => 0,
            RunOutcome::PartialFailure => 1,
        }
    }
}

struct BarState {
    tally: ProgressTally,
    started_at: Instant,
    last_draw: Option<Instant>,
}

/// Human-readable progress on stderr.
struct CliProgress {
    state: Mutex<BarState>,
}

impl CliProgress {
    fn new() -> Self {
        CliProgress {
            state: Mutex::new(BarState {
                tally: ProgressTally::new(),
                started_at: Instant::now(),
                last_draw: None,
            }),
        }
    }

    fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_idx = 0;

        while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
            size /= 1024.0;
            unit_idx += 1;
        }

        format!("{:.2} {}", size, UNITS[unit_idx])
    }

    fn format_duration(elapsed: Duration) -> String {
        let secs = elapsed.as_secs();
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, mins, secs)
        } else if mins > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}s", secs)
        }
    }

    fn progress_bar(fraction: f64) -> String {
        let percent = (fraction.clamp(0.0, 1.0) * 100.0) as u32;
        let filled = (percent / 5) as usize;
        let empty = 20 - filled;
        format!("[{}{}] {:3}%", "=".repeat(filled), " ".repeat(empty), percent)
    }

    fn render_line(tally: &ProgressTally) -> String {
        // Fall back to item counts when every file is empty
        let fraction = if tally.total_bytes > 0 {
            tally.byte_fraction()
        } else {
            tally.file_fraction()
        };
        format!(
            "\r{} {}/{} items | {}/{}",
            Self::progress_bar(fraction),
            tally.items_done,
            tally.file_count,
            Self::format_bytes(tally.bytes_done),
            Self::format_bytes(tally.total_bytes)
        )
    }

    fn draw(state: &mut BarState, force: bool) {
        // Throttle redraws to at most once per 200ms
        if !force {
            if let Some(last) = state.last_draw {
                if last.elapsed() < Duration::from_millis(200) {
                    return;
                }
            }
        }
        state.last_draw = Some(Instant::now());
        eprint!("{}", Self::render_line(&state.tally));
        let _ = io::stderr().flush();
    }
}

impl ProgressSink for CliProgress {
    fn on_start(&self, file_count: usize, total_bytes: u64) {
        let Ok(mut state) = self.state.lock() else { return };
        state.tally.apply(&ProgressEvent::Start { file_count, total_bytes });
        state.started_at = Instant::now();
        eprintln!(
            "Processing {} items ({})",
            file_count,
            Self::format_bytes(total_bytes)
        );
        Self::draw(&mut state, true);
    }

    fn on_item(&self, bytes: u64) {
        let Ok(mut state) = self.state.lock() else { return };
        state.tally.apply(&ProgressEvent::Item { bytes });
        Self::draw(&mut state, false);
    }

    fn on_finish(&self) {
        let Ok(mut state) = self.state.lock() else { return };
        state.tally.apply(&ProgressEvent::Finish);
        Self::draw(&mut state, true);
        eprintln!();
        eprintln!("Elapsed: {}", Self::format_duration(state.started_at.elapsed()));
    }
}

/// Machine-readable progress: one JSON object per event.
struct JsonLinesSink<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    fn new(out: W) -> Self {
        JsonLinesSink { out: Mutex::new(out) }
    }

    fn write_event(&self, event: &ProgressEvent) -> io::Result<()> {
        let line = serde_json::to_string(event)?;
        let mut out = self
            .out
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "progress writer poisoned"))?;
        writeln!(out, "{}", line)?;
        out.flush()
    }

    fn emit(&self, event: ProgressEvent) {
        // A closed stdout (e.g. piped into `head`) must not abort the run
        if let Err(e) = self.write_event(&event) {
            debug!(error = %e, ?event, "Dropped progress event");
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> ProgressSink for JsonLinesSink<W> {
    fn on_start(&self, file_count: usize, total_bytes: u64) {
        self.emit(ProgressEvent::Start { file_count, total_bytes });
    }

    fn on_item(&self, bytes: u64) {
        self.emit(ProgressEvent::Item { bytes });
    }

    fn on_finish(&self) {
        self.emit(ProgressEvent::Finish);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Parse arguments, run, and map the outcome to an exit code
fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let exit_code = match run_cli(&args) {
        Ok(outcome) => outcome.exit_code(),
        Err(msg) => {
            eprintln!("Error: {}", msg);
            2
        }
    };

    std::process::exit(exit_code);
}

/// Main CLI logic - separated for testability
fn run_cli(args: &Args) -> Result<RunOutcome, String> {
    let sink: Box<dyn ProgressSink> = if args.json {
        Box::new(JsonLinesSink::new(io::stdout()))
    } else {
        Box::new(CliProgress::new())
    };
    run_with_sink(args, sink.as_ref())
}

fn run_with_sink(args: &Args, sink: &dyn ProgressSink) -> Result<RunOutcome, String> {
    if is_unpack_mode(args) {
        if args.verify {
            return Err("--verify does not apply when unpacking an archive".to_string());
        }
        return run_unpack_mode(args, sink);
    }

    let config = EngineConfig::new(resolve_workers(args.workers), args.buffer_size, args.verify)
        .map_err(|e| e.to_string())?;
    debug!(workers = config.worker_count, buffer = config.buffer_size, "Resolved configuration");

    let report = run_copy(&args.source, &args.destination, &config, Some(sink)).map_err(describe)?;

    if report.file_count == 0 {
        eprintln!("Nothing to copy.");
        return Ok(RunOutcome::Clean);
    }

    let failed = report.errors.len();
    eprintln!(
        "Summary: {} copied, {} failed ({} of {})",
        report.file_count - failed,
        failed,
        CliProgress::format_bytes(report.bytes_reported),
        CliProgress::format_bytes(report.total_bytes)
    );
    eprintln!("Destination: {}", report.destination_root.display());

    if failed == 0 {
        return Ok(RunOutcome::Clean);
    }

    eprintln!();
    eprintln!("Failed files:");
    for failure in &report.errors {
        match &failure.error {
            Some(error) => eprintln!("  {}: {}", failure.source_path.display(), error),
            None => eprintln!("  {}: (unknown error)", failure.source_path.display()),
        }
    }
    Ok(RunOutcome::PartialFailure)
}

fn run_unpack_mode(args: &Args, sink: &dyn ProgressSink) -> Result<RunOutcome, String> {
    let report = ArchiveDispatcher::new()
        .with_rar_tool(args.rar_tool.clone())
        .unpack(&args.source, &args.destination, Some(sink))
        .map_err(describe)?;

    eprintln!(
        "Unpacked {} archive: {} members ({})",
        report.format,
        report.member_count,
        CliProgress::format_bytes(report.total_bytes)
    );
    Ok(RunOutcome::Clean)
}

fn is_unpack_mode(args: &Args) -> bool {
    args.unpack || looks_like_archive(&args.source)
}

fn looks_like_archive(path: &Path) -> bool {
    ArchiveFormat::from_path(path).is_some()
}

fn resolve_workers(requested: Option<usize>) -> usize {
    requested.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    })
}

fn describe(error: EngineError) -> String {
    match error {
        EngineError::ExternalToolMissing { .. } => format!(
            "{} (install it or pass --rar-tool with the path to an unrar-compatible tool)",
            error
        ),
        _ => error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    struct NullSink;

    impl ProgressSink for NullSink {
        fn on_start(&self, _file_count: usize, _total_bytes: u64) {}
        fn on_item(&self, _bytes: u64) {}
        fn on_finish(&self) {}
    }

    fn args(source: PathBuf, destination: PathBuf) -> Args {
        Args {
            source,
            destination,
            unpack: false,
            workers: Some(2),
            buffer_size: DEFAULT_BUFFER_SIZE,
            verify: false,
            rar_tool: PathBuf::from(DEFAULT_RAR_TOOL),
            json: false,
            verbose: false,
        }
    }

    #[test]
    fn test_cli_copies_directory() {
        let src_dir = TempDir::new().expect("Failed to create temp dir");
        let dst_dir = TempDir::new().expect("Failed to create temp dir");
        fs::write(src_dir.path().join("test.txt"), "hello").expect("Failed to write file");

        let mut cli_args = args(src_dir.path().to_path_buf(), dst_dir.path().join("out"));
        cli_args.verify = true;

        let result = run_with_sink(&cli_args, &NullSink);
        assert_eq!(result, Ok(RunOutcome::Clean));
        assert_eq!(
            fs::read_to_string(dst_dir.path().join("out").join("test.txt")).expect("Failed to read"),
            "hello"
        );
    }

    #[test]
    fn test_cli_empty_source_is_clean() {
        let src_dir = TempDir::new().expect("Failed to create temp dir");
        let dst_dir = TempDir::new().expect("Failed to create temp dir");

        let cli_args = args(src_dir.path().to_path_buf(), dst_dir.path().join("out"));
        assert_eq!(run_with_sink(&cli_args, &NullSink), Ok(RunOutcome::Clean));
    }

    #[test]
    fn test_cli_rejects_missing_source() {
        let dst_dir = TempDir::new().expect("Failed to create temp dir");

        let cli_args = args(PathBuf::from("/nonexistent/path"), dst_dir.path().to_path_buf());
        let result = run_with_sink(&cli_args, &NullSink);
        assert!(result.is_err(), "CLI should reject missing source");
    }

    #[test]
    fn test_cli_rejects_zero_workers() {
        let src_dir = TempDir::new().expect("Failed to create temp dir");
        let dst_dir = TempDir::new().expect("Failed to create temp dir");

        let mut cli_args = args(src_dir.path().to_path_buf(), dst_dir.path().to_path_buf());
        cli_args.workers = Some(0);
        assert!(run_with_sink(&cli_args, &NullSink).is_err());
    }

    #[test]
    fn test_cli_rejects_verify_when_unpacking() {
        let src_dir = TempDir::new().expect("Failed to create temp dir");
        let archive = src_dir.path().join("bundle.zip");
        fs::write(&archive, b"PK").expect("Failed to write file");

        let mut cli_args = args(archive, src_dir.path().join("out"));
        cli_args.verify = true;
        let result = run_with_sink(&cli_args, &NullSink);
        assert!(result.is_err());
        assert!(!src_dir.path().join("out").exists());
    }

    #[test]
    fn test_cli_detects_archive_by_extension() {
        assert!(is_unpack_mode(&args(PathBuf::from("a/b.ZIP"), PathBuf::from("out"))));
        assert!(is_unpack_mode(&args(PathBuf::from("x.7z"), PathBuf::from("out"))));
        assert!(is_unpack_mode(&args(PathBuf::from("x.rar"), PathBuf::from("out"))));
        assert!(!is_unpack_mode(&args(PathBuf::from("photos"), PathBuf::from("out"))));

        let mut forced = args(PathBuf::from("bundle.bin"), PathBuf::from("out"));
        forced.unpack = true;
        assert!(is_unpack_mode(&forced));
    }

    #[test]
    fn test_cli_unsupported_forced_unpack_is_fatal() {
        let src_dir = TempDir::new().expect("Failed to create temp dir");
        let file = src_dir.path().join("archive.xyz");
        fs::write(&file, b"data").expect("Failed to write file");

        let mut cli_args = args(file, src_dir.path().join("out"));
        cli_args.unpack = true;
        let result = run_with_sink(&cli_args, &NullSink);
        assert!(result.is_err());
        assert!(!src_dir.path().join("out").exists());
    }

    #[test]
    fn test_cli_missing_rar_tool_names_the_flag() {
        let src_dir = TempDir::new().expect("Failed to create temp dir");
        let archive = src_dir.path().join("data.rar");
        fs::write(&archive, b"Rar!").expect("Failed to write file");

        let mut cli_args = args(archive, src_dir.path().join("out"));
        cli_args.rar_tool = PathBuf::from("supercopy-no-such-archiver");
        let message = run_with_sink(&cli_args, &NullSink).expect_err("missing tool is fatal");
        assert!(message.contains("supercopy-no-such-archiver"));
        assert!(message.contains("--rar-tool"));
        assert!(!src_dir.path().join("out").exists());
    }

    #[test]
    fn test_resolve_workers() {
        assert_eq!(resolve_workers(Some(3)), 3);
        assert!(resolve_workers(None) >= 1);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunOutcome::Clean.exit_code(), 0);
        assert_eq!(RunOutcome::PartialFailure.exit_code(), 1);
    }

    #[test]
    fn test_json_sink_writes_one_line_per_event() {
        let sink = JsonLinesSink::new(Vec::new());
        sink.on_start(2, 10);
        sink.on_item(4);
        sink.on_item(6);
        sink.on_finish();

        let text = String::from_utf8(sink.into_inner()).expect("utf8 output");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                r#"{"event":"start","file_count":2,"total_bytes":10}"#,
                r#"{"event":"item","bytes":4}"#,
                r#"{"event":"item","bytes":6}"#,
                r#"{"event":"finish"}"#,
            ]
        );
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "reader went away"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_json_sink_survives_closed_output() {
        let sink = JsonLinesSink::new(BrokenPipe);
        let result = sink.write_event(&ProgressEvent::Item { bytes: 1 });
        assert_eq!(result.map_err(|e| e.kind()), Err(io::ErrorKind::BrokenPipe));

        // Sink hooks swallow the error and keep going
        sink.on_start(1, 1);
        sink.on_item(1);
        sink.on_finish();
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(CliProgress::format_bytes(512), "512.00 B");
        assert_eq!(CliProgress::format_bytes(1536), "1.50 KB");
        assert_eq!(CliProgress::format_duration(Duration::from_secs(59)), "59s");
        assert_eq!(CliProgress::format_duration(Duration::from_secs(3725)), "1h 2m 5s");
        assert_eq!(CliProgress::progress_bar(0.5), "[==========          ]  50%");
    }

    #[test]
    fn test_render_line_uses_item_fraction_for_empty_files() {
        let mut tally = ProgressTally::new();
        tally.apply(&ProgressEvent::Start { file_count: 2, total_bytes: 0 });
        tally.apply(&ProgressEvent::Item { bytes: 0 });
        let line = CliProgress::render_line(&tally);
        assert!(line.contains(" 50%"), "Got: {}", line);
        assert!(line.contains("1/2 items"));
    }
}
