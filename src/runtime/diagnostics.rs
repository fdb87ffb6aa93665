use crate::language::span::Span;
use crate::runtime::error::RuntimeError;
use miette::{Diagnostic, NamedSource, Report, SourceSpan};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
pub struct RuntimeDiagnostic {
    #[source_code]
    src: NamedSource,
    #[label("{label}")]
    span: SourceSpan,
    message: String,
    label: String,
}

impl RuntimeDiagnostic {
    pub fn from_error(src: NamedSource, err: &RuntimeError) -> Self {
        Self {
            src,
            span: to_source_span(err.span),
            message: err.to_string(),
            label: "evaluation failed here".to_string(),
        }
    }
}

pub fn to_source_span(span: Span) -> SourceSpan {
    (span.start, span.len()).into()
}

/// Renders an error against its source text with the offending position
/// underlined.
pub fn render_runtime_error(name: &str, source: &str, err: &RuntimeError) -> String {
    let diagnostic =
        RuntimeDiagnostic::from_error(NamedSource::new(name, source.to_string()), err);
    format!("{:?}", Report::new(diagnostic))
}

pub fn report_runtime_error(error: &RuntimeError) {
    eprintln!("Runtime error: {}", error);
}
