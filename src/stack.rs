//! Call-site capture and filtering for recorded events.

use std::fmt;

use once_cell::sync::Lazy;
use regex::RegexSet;

// Frames of the profiler, the async runtime, the standard library and the
// test harness. Matched against the demangled symbol name with any leading
// `<` removed.
static INFRASTRUCTURE_FRAMES: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"^sea_orm_profiler::",
        r"^(std|core|alloc)::",
        r"^(&(mut )?)?\w+ as (std|core|alloc)::",
        r"^backtrace::",
        r"^tokio::",
        r"^futures(_\w+)?::",
        r"^async_trait::",
        r"^test::",
        r"^__rust",
        r"^rust_begin_unwind",
        r"^__libc_start",
        r"^(start_thread|__clone3?|clone3?)$",
        r"^_start$",
    ])
    .unwrap()
});

/// One frame of a call stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Path of the function's module or impl, e.g. `my_app::service`.
    pub component: String,
    /// Function name.
    pub method: String,
    /// Source file name, when debug info is available.
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl StackFrame {
    /// Build a frame from a demangled symbol name.
    pub fn from_symbol(symbol: &str, file: Option<String>, line: Option<u32>) -> Self {
        let mut name = symbol.trim();
        while let Some(stripped) = name.strip_suffix("::{{closure}}") {
            name = stripped;
        }
        let (component, method) = match name.rfind("::") {
            Some(idx) => (&name[..idx], &name[idx + 2..]),
            None => ("", name),
        };
        Self {
            component: component.to_string(),
            method: method.to_string(),
            file,
            line,
        }
    }

    /// Full symbol path, `component::method`.
    pub fn qualified_name(&self) -> String {
        if self.component.is_empty() {
            self.method.clone()
        } else {
            format!("{}::{}", self.component, self.method)
        }
    }

    /// Whether this frame belongs to the profiler, the runtime or the test harness.
    pub fn is_infrastructure(&self) -> bool {
        let name = self.qualified_name();
        INFRASTRUCTURE_FRAMES.is_match(name.trim_start_matches('<'))
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.qualified_name())?;
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{file}:{line}")?,
            (Some(file), None) => write!(f, "{file}")?,
            _ => write!(f, "Unknown Source")?,
        }
        write!(f, ")")
    }
}

/// An ordered call stack, innermost frame first.
///
/// Transformations return new traces and leave the original untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackTrace {
    frames: Vec<StackFrame>,
}

impl StackTrace {
    pub fn from_frames(frames: Vec<StackFrame>) -> Self {
        Self { frames }
    }

    /// Capture the current thread's call stack. Frames without symbol
    /// information are dropped and repeats are collapsed.
    pub fn capture() -> Self {
        let backtrace = backtrace::Backtrace::new();
        let frames = backtrace
            .frames()
            .iter()
            .flat_map(|frame| frame.symbols())
            .filter_map(|symbol| {
                let name = symbol.name()?;
                let file = symbol
                    .filename()
                    .and_then(|path| path.file_name())
                    .map(|file| file.to_string_lossy().into_owned());
                Some(StackFrame::from_symbol(
                    &format!("{name:#}"),
                    file,
                    symbol.lineno(),
                ))
            })
            .collect();
        Self { frames }.collapse_repeats()
    }

    /// Drop frames of the profiler, the async runtime, the standard library
    /// and the test harness, so the trace starts at application code.
    ///
    /// Application frames left adjacent by the removal are collapsed.
    pub fn filter_infrastructure(&self) -> Self {
        Self {
            frames: self
                .frames
                .iter()
                .filter(|frame| !frame.is_infrastructure())
                .cloned()
                .collect(),
        }
        .collapse_repeats()
    }

    /// Keep only the innermost of consecutive frames of the same function.
    ///
    /// Async functions show up once per poll layer, each pointing at a
    /// different line of the same body.
    pub fn collapse_repeats(&self) -> Self {
        let mut frames = self.frames.clone();
        frames.dedup_by(|outer, inner| {
            outer.component == inner.component && outer.method == inner.method
        });
        Self { frames }
    }

    /// Keep at most `depth` frames from the top of the stack.
    pub fn limit_depth(&self, depth: usize) -> Self {
        Self {
            frames: self.frames.iter().take(depth).cloned().collect(),
        }
    }

    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Display lines, one per frame, each prefixed with a tab.
    pub fn to_lines(&self) -> Vec<String> {
        self.frames.iter().map(|frame| format!("\t{frame}")).collect()
    }
}
