//! Output destinations for recorded lines.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Builds the writer a profiler records into.
///
/// Any `Fn() -> io::Result<Box<dyn Write + Send>>` closure is a sink factory.
///
/// # Example
///
/// ```rust
/// use sea_orm_profiler::ProfilingParameters;
/// use std::io::{self, Write};
///
/// let params = ProfilingParameters::default()
///     .with_sink(|| -> io::Result<Box<dyn Write + Send>> { Ok(Box::new(io::stderr())) });
/// ```
pub trait SinkFactory: Send + Sync {
    fn build_writer(&self) -> io::Result<Box<dyn Write + Send>>;
}

impl<F> SinkFactory for F
where
    F: Fn() -> io::Result<Box<dyn Write + Send>> + Send + Sync,
{
    fn build_writer(&self) -> io::Result<Box<dyn Write + Send>> {
        self()
    }
}

/// Writes to standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl SinkFactory for ConsoleSink {
    fn build_writer(&self) -> io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(io::stdout()))
    }
}

/// Writes to a file, truncating it. Missing parent directories are created.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SinkFactory for FileSink {
    fn build_writer(&self) -> io::Result<Box<dyn Write + Send>> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Ok(Box::new(File::create(&self.path)?))
    }
}

/// A built writer. Every line is flushed as soon as it is written, and the
/// lines of one call are never interleaved with another caller's.
pub struct Sink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl Sink {
    /// Build the writer from its factory. Called once per profiler.
    pub fn open(factory: &dyn SinkFactory) -> io::Result<Self> {
        Ok(Self {
            writer: Mutex::new(factory.build_writer()?),
        })
    }

    pub fn write_lines<S: AsRef<str>>(&self, lines: &[S]) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        for line in lines {
            writeln!(writer, "{}", line.as_ref())?;
            writer.flush()?;
        }
        Ok(())
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink").finish_non_exhaustive()
    }
}
