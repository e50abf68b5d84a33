//! Syntax-only diagnostics driver (spec.md §4.H "bypasses codegen, streams
//! diagnostics as JSON lines instead of printing them"). One document in,
//! one `Diagnostic` per line out -- no persistent server state, no actual
//! LSP transport (stdin/stdout framing, `textDocument/*` methods) is
//! implemented; that belongs to whatever editor integration drives this
//! binary, named out as a Non-goal.
use std::io::Write;

use anyhow::Result;

use crate::driver::{CompileOptions, Diagnostic, FrontEnd, Severity};

/// Run the front end over `source` and write one JSON `Diagnostic` per line
/// to `out`. A front-end failure becomes a single error diagnostic rather
/// than propagating, since the whole point of this driver is to never kill
/// the editor session over one bad keystroke.
pub fn check_document(
    front_end: &dyn FrontEnd,
    file: &str,
    source: &str,
    opts: &CompileOptions,
    out: &mut dyn Write,
) -> Result<()> {
    let diagnostics = run_checks(front_end, file, source, opts);
    for d in &diagnostics {
        serde_json::to_writer(&mut *out, d)?;
        writeln!(out)?;
    }
    Ok(())
}

fn run_checks(
    front_end: &dyn FrontEnd,
    file: &str,
    source: &str,
    opts: &CompileOptions,
) -> Vec<Diagnostic> {
    match front_end.build_ast(source, opts) {
        Ok(_) => Vec::new(),
        Err(e) => vec![Diagnostic {
            file: file.to_string(),
            line: 1,
            column: 1,
            severity: Severity::Error,
            message: e.to_string(),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::UnavailableFrontEnd;
    use crate::target::Target;

    fn opts() -> CompileOptions {
        CompileOptions {
            target: Target::host(),
            emit: crate::driver::EmitKind::Object,
            output: None,
            include_dirs: vec![],
            system_include_dirs: vec![],
            sysroot: None,
            defines: vec![],
            std: None,
            warnings_as_errors: false,
            suppress_warnings: false,
            diagnostics_sink: crate::driver::DiagnosticsSink::Json,
            opt_level: 0,
            fail_fast: true,
        }
    }

    #[test]
    fn unavailable_front_end_reports_one_error_diagnostic() {
        let diags = run_checks(&UnavailableFrontEnd, "a.c", "int main(void) {}", &opts());
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Error);
    }

    #[test]
    fn check_document_emits_one_json_line_per_diagnostic() {
        let mut buf = Vec::new();
        check_document(&UnavailableFrontEnd, "a.c", "int main(void) {}", &opts(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("\"severity\""));
    }
}
