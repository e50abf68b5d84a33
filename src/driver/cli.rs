//! Command-line surface (spec.md §6), modelled on the teacher's
//! `clap::Parser` usage in `tools/tools.rs`.
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};

use crate::driver::{CompileOptions, DiagnosticsSink, EmitKind};
use crate::target::Target;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ArchFlag {
    X86_64,
    Arm64,
    Rv32i,
}

impl ArchFlag {
    fn as_flag(self) -> &'static str {
        match self {
            ArchFlag::X86_64 => "x86_64",
            ArchFlag::Arm64 => "arm64",
            ArchFlag::Rv32i => "rv32i",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OptLevel {
    O0,
    O1,
    O2,
    O3,
}

impl OptLevel {
    fn as_u8(self) -> u8 {
        match self {
            OptLevel::O0 => 0,
            OptLevel::O1 => 1,
            OptLevel::O2 => 2,
            OptLevel::O3 => 3,
        }
    }
}

/// A self-hosting C11 compiler's driver: preprocess, compile, or link one or
/// more sources.
#[derive(Clone, Debug, Parser)]
#[command(version)]
pub struct Args {
    /// Source files, or `-` for stdin.
    pub inputs: Vec<PathBuf>,

    /// Preprocess only.
    #[arg(short = 'E')]
    pub preprocess_only: bool,
    /// Emit assembly.
    #[arg(short = 'S')]
    pub assembly_only: bool,
    /// Emit an object file.
    #[arg(short = 'c')]
    pub object_only: bool,

    /// Output path; `-` means stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Target triple, e.g. `aarch64-apple-darwin`.
    #[arg(long = "target", conflicts_with = "arch")]
    pub target_triple: Option<String>,
    /// Target architecture shorthand.
    #[arg(long = "arch", value_enum, conflicts_with = "target_triple")]
    pub arch: Option<ArchFlag>,

    /// User include directory, repeatable.
    #[arg(short = 'I')]
    pub include_dirs: Vec<PathBuf>,
    /// System include directory, repeatable.
    #[arg(long = "isystem")]
    pub system_include_dirs: Vec<PathBuf>,
    /// SDK root override.
    #[arg(long = "isysroot")]
    pub sysroot: Option<PathBuf>,
    /// Preprocessor define, `NAME[=value]`, repeatable.
    #[arg(short = 'D')]
    pub defines: Vec<String>,

    /// Language standard, e.g. `c17`.
    #[arg(long = "std")]
    pub std: Option<String>,
    /// Treat warnings as errors.
    #[arg(long = "Werror")]
    pub warnings_as_errors: bool,
    /// Suppress warnings.
    #[arg(short = 'w')]
    pub suppress_warnings: bool,
    /// Diagnostics sink: `stderr`, `json`, or a file path.
    #[arg(long = "fdiagnostics-sink")]
    pub diagnostics_sink: Option<String>,
    /// Log sink: a path, `-` for stdout, or `off`.
    #[arg(long = "flog")]
    pub log_sink: Option<String>,
    /// Optimisation level.
    #[arg(short = 'O', value_enum)]
    pub opt_level: Option<OptLevel>,

    /// Run the LSP driver instead of compiling.
    #[arg(long)]
    pub lsp: bool,
    /// Run the interpreter driver on the (single) input instead of emitting.
    #[arg(long)]
    pub interp: bool,
    /// Keep compiling remaining sources after one fails.
    #[arg(long)]
    pub keep_going: bool,
}

impl Args {
    pub fn resolve_target(&self) -> Result<Target> {
        match (&self.target_triple, self.arch) {
            (Some(_), Some(_)) => Err(anyhow!("-target and -arch are mutually exclusive")),
            (Some(triple), None) => Target::from_triple(triple),
            (None, Some(arch)) => Target::from_arch_flag(arch.as_flag()),
            (None, None) => Ok(Target::host()),
        }
    }

    pub fn emit_kind(&self) -> EmitKind {
        if self.preprocess_only {
            EmitKind::Preprocessed
        } else if self.assembly_only {
            EmitKind::Assembly
        } else if self.object_only {
            EmitKind::Object
        } else {
            EmitKind::Link
        }
    }

    pub fn diagnostics_sink(&self) -> DiagnosticsSink {
        match self.diagnostics_sink.as_deref() {
            None | Some("stderr") => DiagnosticsSink::Stderr,
            Some("json") => DiagnosticsSink::Json,
            Some(path) => DiagnosticsSink::File(PathBuf::from(path)),
        }
    }

    pub fn to_compile_options(&self) -> Result<CompileOptions> {
        Ok(CompileOptions {
            target: self.resolve_target()?,
            emit: self.emit_kind(),
            output: self.output.clone(),
            include_dirs: self.include_dirs.clone(),
            system_include_dirs: self.system_include_dirs.clone(),
            sysroot: self.sysroot.clone(),
            defines: self.defines.iter().map(|d| split_define(d)).collect(),
            std: self.std.clone(),
            warnings_as_errors: self.warnings_as_errors,
            suppress_warnings: self.suppress_warnings,
            diagnostics_sink: self.diagnostics_sink(),
            opt_level: self.opt_level.unwrap_or(OptLevel::O0).as_u8(),
            fail_fast: !self.keep_going,
        })
    }
}

fn split_define(raw: &str) -> (String, Option<String>) {
    match raw.split_once('=') {
        Some((k, v)) => (k.to_string(), Some(v.to_string())),
        None => (raw.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            inputs: vec![],
            preprocess_only: false,
            assembly_only: false,
            object_only: false,
            output: None,
            target_triple: None,
            arch: None,
            include_dirs: vec![],
            system_include_dirs: vec![],
            sysroot: None,
            defines: vec![],
            std: None,
            warnings_as_errors: false,
            suppress_warnings: false,
            diagnostics_sink: None,
            log_sink: None,
            opt_level: None,
            lsp: false,
            interp: false,
            keep_going: false,
        }
    }

    #[test]
    fn target_and_arch_conflict() {
        let mut args = base_args();
        args.target_triple = Some("x86_64-linux-gnu".into());
        args.arch = Some(ArchFlag::Arm64);
        assert!(args.resolve_target().is_err());
    }

    #[test]
    fn default_target_is_host() {
        let args = base_args();
        assert_eq!(args.resolve_target().unwrap(), Target::host());
    }

    #[test]
    fn emit_kind_prefers_earliest_flag() {
        let mut args = base_args();
        args.preprocess_only = true;
        args.object_only = true;
        assert_eq!(args.emit_kind(), EmitKind::Preprocessed);
    }

    #[test]
    fn define_without_value_splits_to_none() {
        assert_eq!(split_define("FOO"), ("FOO".to_string(), None));
        assert_eq!(
            split_define("FOO=1"),
            ("FOO".to_string(), Some("1".to_string()))
        );
    }
}
