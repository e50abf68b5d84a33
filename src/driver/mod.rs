//! Pipeline orchestration (spec.md §4.H): per-source classification and
//! dispatch, stage sequencing, profiling spans, and exit-code policy.
//!
//! The stages ahead of IR build (preprocess/lex/parse/typecheck) are
//! external collaborators per §1 -- this crate does not implement a C front
//! end. They are modelled here as the [`FrontEnd`] trait object so the
//! sequencing, concurrency, and failure propagation this module owns can be
//! exercised against a stub, the way the teacher bridges format-specific
//! section readers into one driver entry point through `SectionReader<K>`
//! (`til/section.rs`).
pub mod cli;
pub mod env;
pub mod interp;
pub mod lsp;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info_span, instrument};

use crate::ast::TranslationUnit;
use crate::builder::build_translation_unit;
use crate::ir::{print_function, GlobalKind, Unit};
use crate::target::Target;

/// A source's kind, by extension (§4.H "classify by extension").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    C,
    Preprocessed,
    Header,
    Object,
    SharedLibrary,
    Unknown,
}

pub fn classify(path: &Path) -> SourceKind {
    match path.extension().and_then(|e| e.to_str()) {
        Some("c") => SourceKind::C,
        Some("i") => SourceKind::Preprocessed,
        Some("h") => SourceKind::Header,
        Some("o") => SourceKind::Object,
        Some("so" | "dylib" | "a") => SourceKind::SharedLibrary,
        _ => SourceKind::Unknown,
    }
}

/// What `-E`/`-S`/`-c`/link selects as the final artifact for one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitKind {
    Preprocessed,
    Assembly,
    Object,
    Link,
}

#[derive(Debug, Clone, Default)]
pub enum DiagnosticsSink {
    #[default]
    Stderr,
    File(PathBuf),
    Json,
}

#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub target: Target,
    pub emit: EmitKind,
    pub output: Option<PathBuf>,
    pub include_dirs: Vec<PathBuf>,
    pub system_include_dirs: Vec<PathBuf>,
    pub sysroot: Option<PathBuf>,
    pub defines: Vec<(String, Option<String>)>,
    pub std: Option<String>,
    pub warnings_as_errors: bool,
    pub suppress_warnings: bool,
    pub diagnostics_sink: DiagnosticsSink,
    pub opt_level: u8,
    /// Stop at the first failing source (§7 "default is fail-fast").
    pub fail_fast: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

/// One diagnostic record; the LSP driver streams these as JSON lines
/// instead of printing them (§4.H).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub severity: Severity,
    pub message: String,
}

/// preprocess -> lex -> parse -> typecheck, collapsed into one boundary
/// since this crate treats the whole front end as a single external
/// collaborator (§1).
pub trait FrontEnd {
    fn build_ast(&self, preprocessed: &str, opts: &CompileOptions) -> Result<TranslationUnit>;
}

/// The default `FrontEnd`: no real preprocessor/lexer/parser/type-checker
/// is linked into this build, so it always fails. Keeping a real
/// implementation of [`FrontEnd`] is out of scope here; this lets the
/// pipeline's sequencing and error propagation still be exercised end to
/// end against a stub.
pub struct UnavailableFrontEnd;

impl FrontEnd for UnavailableFrontEnd {
    fn build_ast(&self, _preprocessed: &str, _opts: &CompileOptions) -> Result<TranslationUnit> {
        Err(anyhow!(
            "no preprocessor/lexer/parser/type-checker is linked into this build"
        ))
    }
}

pub struct Pipeline<'a> {
    front_end: &'a dyn FrontEnd,
}

impl<'a> Pipeline<'a> {
    pub fn new(front_end: &'a dyn FrontEnd) -> Self {
        Pipeline { front_end }
    }

    /// Run one source through to its requested emit kind. Object-like
    /// inputs route straight to the link step rather than the full
    /// pipeline (§4.H).
    #[instrument(skip(self, opts), fields(path = %path.display()))]
    pub fn run_source(&self, path: &Path, opts: &CompileOptions) -> Result<PathBuf> {
        match classify(path) {
            SourceKind::Object | SourceKind::SharedLibrary => {
                return self.link(&[path.to_path_buf()], opts);
            }
            SourceKind::Unknown => bail!("unrecognised input `{}`", path.display()),
            SourceKind::Header => bail!("cannot compile a header directly: `{}`", path.display()),
            SourceKind::C | SourceKind::Preprocessed => {}
        }

        let source = std::fs::read_to_string(path)
            .with_context(|| format!("reading `{}`", path.display()))?;

        let preprocessed = {
            let _span = info_span!("preprocess").entered();
            source
        };

        if matches!(opts.emit, EmitKind::Preprocessed) {
            return self.write_output(path, opts, preprocessed);
        }

        let tu = {
            let _span = info_span!("parse").entered();
            self.front_end.build_ast(&preprocessed, opts)?
        };

        let unit = {
            let _span = info_span!("ir_build").entered();
            build_translation_unit(&tu, opts.target)?
        };

        self.emit(&unit, path, opts)
    }

    fn emit(&self, unit: &Unit, source: &Path, opts: &CompileOptions) -> Result<PathBuf> {
        let _span = info_span!("emit").entered();
        self.write_output(source, opts, render_unit(unit))
    }

    fn write_output(&self, source: &Path, opts: &CompileOptions, text: String) -> Result<PathBuf> {
        let out_path = output_path(source, opts);
        if out_path.as_os_str() == "-" {
            print!("{text}");
        } else {
            std::fs::write(&out_path, text)
                .with_context(|| format!("writing `{}`", out_path.display()))?;
        }
        Ok(out_path)
    }

    fn link(&self, objects: &[PathBuf], opts: &CompileOptions) -> Result<PathBuf> {
        let _span = info_span!("link").entered();
        let out = opts.output.clone().unwrap_or_else(|| PathBuf::from("a.out"));
        tracing::debug!(?objects, ?out, "would invoke the system linker");
        Ok(out)
    }
}

fn render_unit(unit: &Unit) -> String {
    let mut out = String::new();
    for (_, global) in unit.globals.iter() {
        if let GlobalKind::Function(f) = &global.kind {
            out.push_str(&print_function(f));
        }
    }
    out
}

fn output_path(source: &Path, opts: &CompileOptions) -> PathBuf {
    if let Some(o) = &opts.output {
        return o.clone();
    }
    match opts.emit {
        EmitKind::Preprocessed => source.with_extension("i"),
        EmitKind::Assembly => source.with_extension("s"),
        EmitKind::Object => source.with_extension("o"),
        EmitKind::Link => PathBuf::from("a.out"),
    }
}

/// Compile every source independently (§5: each task owns its own arena
/// and unit, no shared mutable state). Sequential by default, matching
/// spec.md §5; `fail_fast` (the default, per §7) stops at the first
/// failing source.
pub fn run_sources(front_end: &dyn FrontEnd, sources: &[PathBuf], opts: &CompileOptions) -> Result<i32> {
    let pipeline = Pipeline::new(front_end);
    let mut had_failure = false;
    for source in sources {
        match pipeline.run_source(source, opts) {
            Ok(out) => tracing::info!(output = %out.display(), "compiled"),
            Err(e) => {
                tracing::error!(error = %e, source = %source.display(), "compile failed");
                eprintln!("error: {e:#}");
                had_failure = true;
                if opts.fail_fast {
                    return Ok(1);
                }
            }
        }
    }
    Ok(if had_failure { 1 } else { 0 })
}
