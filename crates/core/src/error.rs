//! The single failure channel.
//!
//! Every failure the language can raise is an [`Error`]: a kind tag from the
//! closed [`ErrorKind`] set, a message, an optional payload (the value a
//! script passed to `throw`), and a backtrace of frames accumulated while the
//! failure unwinds through function invocations. `try` blocks catch errors
//! and hand scripts an object built from these fields; anything uncaught
//! surfaces to the host unchanged.

use crate::source::SourceLocation;
use std::any::Any;
use std::fmt;
use thiserror::Error as ThisError;

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// The closed set of failure kinds. Native bindings map OS errors into one
/// of these; scripts can never observe a kind outside this list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum ErrorKind {
    /// The tokenizer or parser rejected the input.
    #[error("parse")]
    Parse,
    /// An operator or path modifier was applied to an incompatible type.
    #[error("type_mismatch")]
    TypeMismatch,
    /// Integer divide/modulo by zero, overflow, or real-to-integer of a
    /// non-finite value.
    #[error("arithmetic")]
    Arithmetic,
    /// A write through a constant or temporary reference.
    #[error("not_assignable")]
    NotAssignable,
    /// A write to a frozen variable.
    #[error("immutable_assign")]
    ImmutableAssign,
    /// A read through a path whose non-terminal step is missing.
    #[error("unset_member")]
    UnsetMember,
    /// `unset()` on a reference with no path.
    #[error("no_modifier")]
    NoModifier,
    /// Container auto-extension exceeded the implementation limit, or a
    /// file/system resource was exhausted or unavailable.
    #[error("resource")]
    Resource,
    /// A standard-library precondition failed.
    #[error("argument")]
    Argument,
    /// No native overload matched the provided arguments.
    #[error("argument_mismatch")]
    ArgumentMismatch,
    /// A duplicate name in the same scope.
    #[error("redeclaration")]
    Redeclaration,
    /// `break` or `continue` escaped a function body.
    #[error("stray_control")]
    StrayControl,
    /// The host interrupt flag was observed at a statement boundary.
    #[error("interrupted")]
    Interrupted,
    /// A value surfaced by a script `throw`.
    #[error("user")]
    User,
}

/// The erased payload slot. The runtime stores its `Value` here for `user`
/// failures; `as_any` gets it back on catch. The `Debug` bound keeps the
/// whole error printable.
pub trait Payload: fmt::Debug {
    fn as_any(&self) -> &dyn Any;
}

/// One backtrace entry: which function, where, and which statement of its
/// body was executing.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub function: String,
    pub location: SourceLocation,
    pub statement: usize,
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "at '{}' ({}) statement {}",
            self.function, self.location, self.statement
        )
    }
}

/// A tagged failure travelling up the statement executor.
#[derive(Debug, ThisError)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    payload: Option<Box<dyn Payload>>,
    frames: Vec<Frame>,
    /// The innermost statement observed while unwinding, not yet attributed
    /// to a function frame. See [`Error::note_statement`].
    pending: Option<(SourceLocation, usize)>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error {
            kind,
            message: message.into(),
            payload: None,
            frames: Vec::new(),
            pending: None,
        }
    }

    /// A `parse` failure; the message carries the position.
    pub fn parse(message: impl Into<String>, span: crate::source::Span) -> Self {
        Error::new(ErrorKind::Parse, format!("{} at {}", message.into(), span))
    }

    pub fn with_payload(mut self, payload: Box<dyn Payload>) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn payload(&self) -> Option<&dyn Payload> {
        self.payload.as_deref()
    }

    /// Record one more frame as the failure unwinds outward. Frames are
    /// ordered innermost first.
    pub fn push_frame(&mut self, function: impl Into<String>, location: SourceLocation, statement: usize) {
        self.frames.push(Frame {
            function: function.into(),
            location,
            statement,
        });
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Record the statement a failure was crossing, innermost wins. The
    /// executor notes this on the way out; the function runtime consumes it
    /// with [`Error::take_note`] when it pushes the enclosing frame.
    pub fn note_statement(&mut self, location: SourceLocation, index: usize) {
        if self.pending.is_none() {
            self.pending = Some((location, index));
        }
    }

    pub fn take_note(&mut self) -> Option<(SourceLocation, usize)> {
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Span;

    #[test]
    fn test_kind_tags_render_as_snake_case() {
        assert_eq!(ErrorKind::TypeMismatch.to_string(), "type_mismatch");
        assert_eq!(ErrorKind::ArgumentMismatch.to_string(), "argument_mismatch");
        assert_eq!(ErrorKind::User.to_string(), "user");
    }

    #[test]
    fn test_error_display_and_frames() {
        let mut err = Error::new(ErrorKind::Arithmetic, "division by zero");
        assert_eq!(err.to_string(), "arithmetic: division by zero");

        err.push_frame("inner", SourceLocation::new("demo.ast", 4), 0);
        err.push_frame("<top>", SourceLocation::new("demo.ast", 1), 2);
        assert_eq!(err.frames().len(), 2);
        assert_eq!(err.frames()[0].function, "inner");
        assert_eq!(err.frames()[1].location.line(), 1);
    }

    #[test]
    fn test_parse_error_carries_position() {
        let err = Error::parse("unexpected token", Span::new(3, 14));
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(err.message().contains("line 3, column 14"));
    }
}
