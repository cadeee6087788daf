//! Progress and result output on the terminal.
//!
//! While in single-line mode every message overwrites the previous one, so a
//! long scan shows one moving progress line. The first message that has to
//! stay visible (a debug line, a result, a fatal error) switches the renderer
//! to multi-line mode for the rest of the process, after which every message
//! is appended on its own line.

use std::{
    fmt::Display,
    io::{self, IsTerminal, Write},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tracing_subscriber::fmt::MakeWriter;

/// Moves to a fresh line, back up, and erases it. Emitted only on terminals.
const CLEAR_LINE: &str = "\n\x1b[1A\x1b[K";

const INFO_PREFIX: &str = "[INFO]: ";
const DEBUG_PREFIX: &str = "[DEBUG]: ";
const FATAL_PREFIX: &str = "[FATAL]: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    SingleLine,
    MultiLine,
}

/// What to do with the current progress line when leaving single-line mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDisable {
    /// Keep the progress line and start a new one below it.
    NewLine,
    /// Erase the progress line.
    ClearLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Stdout,
    Stderr,
}

struct Output {
    writer: Box<dyn Write + Send>,
    is_terminal: bool,
}

impl Output {
    fn clear_line(&mut self) -> io::Result<()> {
        // Never send control sequences into a pipe or file.
        if self.is_terminal {
            self.writer.write_all(CLEAR_LINE.as_bytes())?;
        }
        Ok(())
    }
}

struct State {
    mode: RenderMode,
    stdout: Output,
    stderr: Output,
}

impl State {
    fn output(&mut self, target: Target) -> &mut Output {
        match target {
            Target::Stdout => &mut self.stdout,
            Target::Stderr => &mut self.stderr,
        }
    }

    fn disable_single_line_mode(&mut self, behavior: OnDisable) -> io::Result<()> {
        if self.mode == RenderMode::MultiLine {
            return Ok(());
        }

        self.mode = RenderMode::MultiLine;
        match behavior {
            OnDisable::ClearLine => self.stderr.clear_line()?,
            OnDisable::NewLine => writeln!(self.stderr.writer)?,
        }
        self.stderr.writer.flush()
    }

    fn emit(&mut self, target: Target, prefix: &str, message: &dyn Display) -> io::Result<()> {
        let single_line = self.mode == RenderMode::SingleLine;
        let output = self.output(target);

        if single_line {
            output.clear_line()?;
            write!(output.writer, "{prefix}{message}")?;
        } else {
            writeln!(output.writer, "{prefix}{message}")?;
        }
        output.writer.flush()
    }
}

/// Renders progress, debug, result and fatal messages.
///
/// Results go to the primary stream, everything else to the diagnostic
/// stream. The mode and both streams sit behind a single lock so a mode
/// change and the write that caused it cannot interleave with another
/// caller's output.
pub struct StatusLine {
    state: Mutex<State>,
    debug: bool,
}

impl StatusLine {
    /// Creates a renderer over arbitrary streams.
    ///
    /// A diagnostic stream that is not a terminal starts out in multi-line
    /// mode, since overwriting lines only makes sense on a terminal.
    pub fn new(
        stdout: Box<dyn Write + Send>,
        stdout_is_terminal: bool,
        stderr: Box<dyn Write + Send>,
        stderr_is_terminal: bool,
        debug: bool,
    ) -> Self {
        // Unlike a NewLine transition this writes nothing, so redirected
        // stderr does not start with a blank line.
        let mode = if stderr_is_terminal {
            RenderMode::SingleLine
        } else {
            RenderMode::MultiLine
        };

        Self {
            state: Mutex::new(State {
                mode,
                stdout: Output {
                    writer: stdout,
                    is_terminal: stdout_is_terminal,
                },
                stderr: Output {
                    writer: stderr,
                    is_terminal: stderr_is_terminal,
                },
            }),
            debug,
        }
    }

    /// Creates a renderer over the process's stdout and stderr.
    ///
    /// Also turns colour off globally when stderr is not a terminal.
    pub fn stdio(debug: bool) -> Self {
        let stderr_is_terminal = io::stderr().is_terminal();
        if !stderr_is_terminal {
            colored::control::set_override(false);
        }

        Self::new(
            Box::new(io::stdout()),
            io::stdout().is_terminal(),
            Box::new(io::stderr()),
            stderr_is_terminal,
            debug,
        )
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic mid-write leaves nothing worth protecting.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mode(&self) -> RenderMode {
        self.lock().mode
    }

    /// Whether colour and line erasure may be used on the diagnostic stream.
    pub fn stderr_is_terminal(&self) -> bool {
        self.lock().stderr.is_terminal
    }

    /// Ensures no later message overwrites an earlier one. No-op once in
    /// multi-line mode.
    pub fn disable_single_line_mode(&self, behavior: OnDisable) {
        // Diagnostics are best-effort.
        let _ = self.lock().disable_single_line_mode(behavior);
    }

    /// Progress message on stderr. Repeated calls overwrite each other while
    /// in single-line mode.
    pub fn info(&self, message: impl Display) {
        let _ = self.lock().emit(Target::Stderr, INFO_PREFIX, &message);
    }

    /// Debug message on stderr, shown only when debugging is enabled. Always
    /// leaves single-line mode so every debug line stays visible.
    pub fn debug(&self, message: impl Display) {
        if !self.debug {
            return;
        }

        let mut state = self.lock();
        let _ = state
            .disable_single_line_mode(OnDisable::NewLine)
            .and_then(|()| state.emit(Target::Stderr, DEBUG_PREFIX, &message));
    }

    /// Result line on stdout. Erases any progress line first so results
    /// start clean.
    pub fn println(&self, message: impl Display) -> io::Result<()> {
        let mut state = self.lock();
        state.disable_single_line_mode(OnDisable::ClearLine)?;
        state.emit(Target::Stdout, "", &message)
    }

    /// Writes a fatal message to stderr below the current progress line,
    /// leaving the decision to exit to the caller.
    pub fn report_fatal(&self, message: impl Display) {
        let mut state = self.lock();
        let _ = state
            .disable_single_line_mode(OnDisable::NewLine)
            .and_then(|()| state.emit(Target::Stderr, FATAL_PREFIX, &message));
    }

    /// Writes an already formatted log record to stderr. Like a debug line it
    /// leaves single-line mode first so the record is never overwritten.
    pub fn log(&self, record: &[u8]) -> io::Result<()> {
        let mut state = self.lock();
        state.disable_single_line_mode(OnDisable::NewLine)?;
        state.stderr.writer.write_all(record)?;
        state.stderr.writer.flush()
    }

    /// Writes a fatal message and exits with status 1.
    pub fn fatal(&self, message: impl Display) -> ! {
        self.report_fatal(message);
        std::process::exit(1)
    }
}

/// `tracing-subscriber` writer that sends formatted events through a
/// [`StatusLine`], under the same lock as progress output.
#[derive(Clone)]
pub struct LogSink(Arc<StatusLine>);

impl LogSink {
    pub fn new(status: Arc<StatusLine>) -> Self {
        Self(status)
    }
}

pub struct LogWriter<'a>(&'a StatusLine);

impl Write for LogWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // The fmt layer hands over each event as one complete buffer.
        self.0.log(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogSink {
    type Writer = LogWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A clonable in-memory stream for inspecting renderer output.
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn renderer(stderr_is_terminal: bool, debug: bool) -> (StatusLine, SharedBuffer, SharedBuffer) {
        let stdout = SharedBuffer::default();
        let stderr = SharedBuffer::default();
        let line = StatusLine::new(
            Box::new(stdout.clone()),
            false,
            Box::new(stderr.clone()),
            stderr_is_terminal,
            debug,
        );
        (line, stdout, stderr)
    }

    #[test]
    fn test_info_overwrites_in_single_line_mode() {
        let (line, stdout, stderr) = renderer(true, false);

        line.info("scanning a");
        line.info("scanning b");

        assert_eq!(line.mode(), RenderMode::SingleLine);
        assert_eq!(
            stderr.contents(),
            format!("{CLEAR_LINE}[INFO]: scanning a{CLEAR_LINE}[INFO]: scanning b")
        );
        assert!(stdout.contents().is_empty());
    }

    #[test]
    fn test_non_terminal_stderr_starts_multi_line() {
        let (line, _stdout, stderr) = renderer(false, false);

        assert_eq!(line.mode(), RenderMode::MultiLine);
        line.info("scanning a");
        line.info("scanning b");

        assert_eq!(stderr.contents(), "[INFO]: scanning a\n[INFO]: scanning b\n");
    }

    #[test]
    fn test_debug_suppressed_without_flag() {
        let (line, _stdout, stderr) = renderer(true, false);

        line.debug("hidden");

        assert_eq!(line.mode(), RenderMode::SingleLine);
        assert!(stderr.contents().is_empty());
    }

    #[test]
    fn test_debug_keeps_progress_line_visible() {
        let (line, _stdout, stderr) = renderer(true, true);

        line.info("scanning a");
        line.debug("Found PR: 5");
        line.info("scanning b");

        assert_eq!(line.mode(), RenderMode::MultiLine);
        assert_eq!(
            stderr.contents(),
            format!("{CLEAR_LINE}[INFO]: scanning a\n[DEBUG]: Found PR: 5\n[INFO]: scanning b\n")
        );
    }

    #[test]
    fn test_println_clears_progress_and_writes_stdout() {
        let (line, stdout, stderr) = renderer(true, false);

        line.info("scanning a");
        line.println("https://example.com/1").unwrap();
        line.println("https://example.com/2").unwrap();

        assert_eq!(
            stderr.contents(),
            format!("{CLEAR_LINE}[INFO]: scanning a{CLEAR_LINE}")
        );
        assert_eq!(stdout.contents(), "https://example.com/1\nhttps://example.com/2\n");
    }

    #[test]
    fn test_multi_line_mode_is_permanent() {
        let (line, _stdout, stderr) = renderer(true, false);

        line.disable_single_line_mode(OnDisable::ClearLine);
        line.disable_single_line_mode(OnDisable::NewLine);
        line.disable_single_line_mode(OnDisable::ClearLine);
        line.info("after");

        assert_eq!(line.mode(), RenderMode::MultiLine);
        // Only the first transition produces output.
        assert_eq!(stderr.contents(), format!("{CLEAR_LINE}[INFO]: after\n"));
    }

    #[test]
    fn test_clear_line_skipped_off_terminal() {
        let (line, _stdout, stderr) = renderer(false, false);

        line.disable_single_line_mode(OnDisable::ClearLine);
        line.info("plain");

        assert!(!stderr.contents().contains('\x1b'));
    }

    #[test]
    fn test_report_fatal_starts_new_line() {
        let (line, stdout, stderr) = renderer(true, false);

        line.info("scanning a");
        line.report_fatal("ListRepositories failed: denied");

        assert_eq!(
            stderr.contents(),
            format!("{CLEAR_LINE}[INFO]: scanning a\n[FATAL]: ListRepositories failed: denied\n")
        );
        assert!(stdout.contents().is_empty());
    }

    #[test]
    fn test_log_records_do_not_garble_progress_line() {
        let stdout = SharedBuffer::default();
        let stderr = SharedBuffer::default();
        let line = Arc::new(StatusLine::new(
            Box::new(stdout.clone()),
            false,
            Box::new(stderr.clone()),
            true,
            false,
        ));
        let subscriber = tracing_subscriber::fmt()
            .with_writer(LogSink::new(Arc::clone(&line)))
            .with_ansi(false)
            .without_time()
            .with_target(false)
            .finish();

        line.info("scanning a");
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("config file not found");
        });
        line.info("scanning b");

        assert_eq!(line.mode(), RenderMode::MultiLine);
        let contents = stderr.contents();
        assert!(contents.starts_with(&format!("{CLEAR_LINE}[INFO]: scanning a\n")));
        assert!(contents.contains("WARN config file not found\n[INFO]: scanning b\n"));
        assert!(!contents.contains("\x1b[2m"));
        assert!(stdout.contents().is_empty());
    }

    #[test]
    fn test_terminal_flag_is_reported() {
        assert!(renderer(true, false).0.stderr_is_terminal());
        assert!(!renderer(false, false).0.stderr_is_terminal());
    }
}
