//! Non-fatal problem reporting.

use std::fmt;
use std::sync::Arc;

use keel_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink, Location};

use crate::error::{CodecError, CodecResult};
use crate::model::FieldType;

/// A field's declared type is one the codec cannot serialize.
pub const UNSUPPORTED_FIELD_TYPE: DiagnosticCode = DiagnosticCode::new(Category::Warning, 301);
/// A decoded value does not fit the field it was read for.
pub const TYPE_MISMATCH_ON_ASSIGN: DiagnosticCode = DiagnosticCode::new(Category::Warning, 302);
/// A value has no encodable form and was written as null.
pub const UNENCODABLE_VALUE: DiagnosticCode = DiagnosticCode::new(Category::Warning, 303);
/// A bean's type is bound as never serializable.
pub const UNSUPPORTED_TYPE: DiagnosticCode = DiagnosticCode::new(Category::Warning, 304);
/// The problem limit was exceeded.
pub const TOO_MANY_PROBLEMS: DiagnosticCode = DiagnosticCode::new(Category::Error, 310);

/// Which half of the round trip a problem was found in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Writing the cache entry.
    Store,
    /// Reading it back.
    Load,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Store => f.write_str("store"),
            Phase::Load => f.write_str("load"),
        }
    }
}

/// Reports problems of one pass into a shared sink, enforcing the per-pass
/// problem limit.
pub struct ProblemReporter {
    sink: Arc<DiagnosticSink>,
    max_problems: usize,
    reported: usize,
}

impl ProblemReporter {
    /// Creates a reporter failing the pass after `max_problems` problems.
    pub fn new(sink: Arc<DiagnosticSink>, max_problems: usize) -> Self {
        Self {
            sink,
            max_problems,
            reported: 0,
        }
    }

    /// Problems reported by this pass so far.
    pub fn reported(&self) -> usize {
        self.reported
    }

    /// Emits a diagnostic. Fails once the limit is crossed.
    pub fn report(&mut self, diag: Diagnostic) -> CodecResult<()> {
        tracing::warn!(code = %diag.code, location = %diag.location, "{}", diag.message);
        self.sink.emit(diag);
        self.reported += 1;
        if self.reported > self.max_problems {
            self.sink.emit(Diagnostic::error(
                TOO_MANY_PROBLEMS,
                format!("maximum number of problems ({}) reached", self.max_problems),
                Location::UNKNOWN,
            ));
            return Err(CodecError::TooManyProblems {
                count: self.reported,
            });
        }
        Ok(())
    }

    /// Reports a field whose declared type cannot be serialized.
    pub fn unsupported_field_type(
        &mut self,
        declaring: &str,
        field: &str,
        ty: &FieldType,
        phase: Phase,
        location: Location,
    ) -> CodecResult<()> {
        let verb = match phase {
            Phase::Store => "serialize",
            Phase::Load => "deserialize",
        };
        self.report(
            Diagnostic::warning(
                UNSUPPORTED_FIELD_TYPE,
                format!("cannot {verb} field `{declaring}.{field}` of type `{ty}`"),
                location,
            )
            .with_note(format!("reported during {phase}")),
        )
    }

    /// Reports a decoded value that was not assignable to its field.
    pub fn type_mismatch(
        &mut self,
        declaring: &str,
        field: &str,
        value: &str,
        target: &FieldType,
        location: Location,
    ) -> CodecResult<()> {
        self.report(Diagnostic::warning(
            TYPE_MISMATCH_ON_ASSIGN,
            format!(
                "value of type {value} is not assignable to field `{declaring}.{field}` \
                 of type `{target}`"
            ),
            location,
        ))
    }

    /// Reports a value with no encodable form.
    pub fn unencodable_value(&mut self, value: &str, location: Location) -> CodecResult<()> {
        self.report(
            Diagnostic::warning(
                UNENCODABLE_VALUE,
                format!("cannot serialize a value of type {value}"),
                location,
            )
            .with_help("declare the field transient or capture a serializable value instead"),
        )
    }

    /// Reports a bean whose type is bound as unsupported.
    pub fn unsupported_type(&mut self, ty: &str, location: Location) -> CodecResult<()> {
        self.report(Diagnostic::warning(
            UNSUPPORTED_TYPE,
            format!("cannot serialize object of type `{ty}`"),
            location,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_field_is_a_warning() {
        let sink = Arc::new(DiagnosticSink::new());
        let mut problems = ProblemReporter::new(Arc::clone(&sink), 10);
        problems
            .unsupported_field_type(
                "Task",
                "thread",
                &FieldType::unsupported("Thread"),
                Phase::Store,
                Location::new(vec!["bean Task".into()]),
            )
            .unwrap();
        let diags = sink.diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, UNSUPPORTED_FIELD_TYPE);
        assert_eq!(
            diags[0].message,
            "cannot serialize field `Task.thread` of type `Thread`"
        );
        assert!(!sink.has_errors());
    }

    #[test]
    fn limit_turns_fatal() {
        let sink = Arc::new(DiagnosticSink::new());
        let mut problems = ProblemReporter::new(Arc::clone(&sink), 2);
        problems.unencodable_value("`Socket`", Location::UNKNOWN).unwrap();
        problems.unencodable_value("`Socket`", Location::UNKNOWN).unwrap();
        let err = problems
            .unencodable_value("`Socket`", Location::UNKNOWN)
            .unwrap_err();
        assert!(matches!(err, CodecError::TooManyProblems { count: 3 }));
        assert_eq!(sink.count_of(TOO_MANY_PROBLEMS), 1);
        assert!(sink.has_errors());
    }

    #[test]
    fn phase_display() {
        assert_eq!(Phase::Store.to_string(), "store");
        assert_eq!(Phase::Load.to_string(), "load");
    }
}
