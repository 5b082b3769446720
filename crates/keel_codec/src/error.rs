//! Error types for encode and decode passes.
//!
//! Only fatal conditions are errors. Problems the codec can degrade around
//! (unsupported field types, values that don't fit their field) are reported
//! as diagnostics and the pass continues.

use keel_common::InternalError;

/// Error type returned by user hooks (legacy methods, constructors, model hooks).
pub type HookError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the codec.
pub type CodecResult<T> = Result<T, CodecError>;

/// Fatal errors that abort an encode or decode pass.
///
/// The cache layer treats any of these as a cache miss.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A legacy hook called a protocol method the recorder does not emulate.
    #[error("`{method}` is not supported by the configuration cache (in `{bean}`)")]
    UnsupportedLegacyOperation {
        /// The legacy protocol method that was invoked.
        method: &'static str,
        /// The bean type whose hook invoked it.
        bean: String,
    },

    /// A legacy read hook read a different kind of value than was written.
    #[error("legacy stream of `{bean}` out of sync: expected {expected}, found {found}")]
    LegacyStreamMismatch {
        /// The bean type whose hook performed the read.
        bean: String,
        /// The value kind the hook asked for.
        expected: &'static str,
        /// The value kind actually present in the stream.
        found: &'static str,
    },

    /// A class token has no entry in the decode environment.
    #[error("unknown class token {0}")]
    UnknownClassToken(u32),

    /// A service token has no entry in the decode environment.
    #[error("unknown service token {0}")]
    UnknownServiceToken(u32),

    /// A persisted environment names a type the host registry does not know.
    #[error("type `{0}` is not registered")]
    UnknownType(String),

    /// A back-reference points past the beans decoded so far.
    #[error("unknown bean reference {0}")]
    UnknownBeanReference(u32),

    /// A string back-reference points past the strings decoded so far.
    #[error("unknown string reference {0}")]
    UnknownStringReference(u32),

    /// The stream contains a tag byte no value kind uses.
    #[error("invalid value tag {0:#04x}")]
    InvalidTag(u8),

    /// A service could not be resolved from the active isolate owner.
    #[error("service `{name}` is not available from {owner}")]
    ServiceUnavailable {
        /// Name of the requested service.
        name: String,
        /// Display name of the owner that was asked.
        owner: String,
    },

    /// A serialization constructor returned an instance of another type.
    #[error("constructor of `{expected}` returned an instance of `{found}`")]
    ConstructorTypeMismatch {
        /// The type being decoded.
        expected: String,
        /// The type of the instance the constructor returned.
        found: String,
    },

    /// The stream holds a custom-coded bean but no codec is bound to its type.
    #[error("no custom codec is bound to `{0}`")]
    MissingBinding(String),

    /// An owner-scoped operation ran outside any isolate.
    #[error("no isolate owner is active")]
    NoActiveOwner,

    /// More non-fatal problems were reported than the configured limit.
    #[error("too many problems ({count}), discarding the entry")]
    TooManyProblems {
        /// Number of problems reported when the limit was crossed.
        count: usize,
    },

    /// The wire encoder failed.
    #[error("wire encoding failed: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    /// The wire decoder failed (truncated or corrupt input).
    #[error("wire decoding failed: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    /// An error raised by a user hook, passed through untouched.
    #[error(transparent)]
    Hook(HookError),

    /// A bug in the codec itself.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl CodecError {
    /// Converts an error returned by a user hook.
    ///
    /// Codec errors that travelled through the hook (for example an
    /// unsupported legacy call propagated with `?`) come back out as the
    /// original variant; anything else is wrapped in [`CodecError::Hook`].
    pub fn from_hook(err: HookError) -> Self {
        match err.downcast::<CodecError>() {
            Ok(codec) => *codec,
            Err(other) => CodecError::Hook(other),
        }
    }

    /// Returns `true` for the unsupported-legacy-operation variant.
    pub fn is_unsupported_legacy_operation(&self) -> bool {
        matches!(self, CodecError::UnsupportedLegacyOperation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("user hook exploded")]
    struct UserFailure;

    #[test]
    fn codec_error_survives_hook_boundary() {
        let inner = CodecError::UnsupportedLegacyOperation {
            method: "reset",
            bean: "Foo".to_string(),
        };
        let boxed: HookError = Box::new(inner);
        let back = CodecError::from_hook(boxed);
        assert!(back.is_unsupported_legacy_operation());
    }

    #[test]
    fn user_error_is_wrapped_unchanged() {
        let back = CodecError::from_hook(Box::new(UserFailure));
        match back {
            CodecError::Hook(e) => {
                assert_eq!(e.to_string(), "user hook exploded");
                assert!(e.downcast_ref::<UserFailure>().is_some());
            }
            other => panic!("expected Hook, got {other:?}"),
        }
    }

    #[test]
    fn display_mismatch() {
        let err = CodecError::LegacyStreamMismatch {
            bean: "Foo".to_string(),
            expected: "int",
            found: "string",
        };
        assert_eq!(
            err.to_string(),
            "legacy stream of `Foo` out of sync: expected int, found string"
        );
    }

    #[test]
    fn display_too_many_problems() {
        let err = CodecError::TooManyProblems { count: 513 };
        assert!(err.to_string().contains("513"));
    }
}
