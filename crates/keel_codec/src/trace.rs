//! Bean-trace frames used to attribute diagnostics to a spot in the graph.

use std::fmt;

use keel_diagnostics::Location;

/// One level of the trace stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TraceFrame {
    /// A bean's state is being written or read.
    Bean(String),
    /// A field, named `declaringType.fieldName`.
    Field {
        /// The type declaring the field.
        declaring: String,
        /// The field name.
        name: String,
    },
    /// An element of a list or map.
    Element(usize),
}

impl TraceFrame {
    /// A field frame.
    pub fn field(declaring: &str, name: &str) -> Self {
        TraceFrame::Field {
            declaring: declaring.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceFrame::Bean(ty) => write!(f, "bean {ty}"),
            TraceFrame::Field { declaring, name } => write!(f, "field {declaring}.{name}"),
            TraceFrame::Element(i) => write!(f, "element {i}"),
        }
    }
}

/// The stack of frames active in a pass.
pub struct Tracer {
    frames: Vec<TraceFrame>,
    log_frames: bool,
}

impl Tracer {
    /// Creates an empty tracer; `log_frames` emits a trace event per frame.
    pub fn new(log_frames: bool) -> Self {
        Self {
            frames: Vec::new(),
            log_frames,
        }
    }

    /// Enters a frame.
    pub fn push(&mut self, frame: TraceFrame, position: usize) {
        if self.log_frames {
            tracing::trace!(depth = self.frames.len(), position, "{frame}");
        }
        self.frames.push(frame);
    }

    /// Leaves the innermost frame.
    pub fn pop(&mut self) {
        self.frames.pop();
    }

    /// Number of active frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// The current frame chain as a diagnostic location.
    pub fn location(&self) -> Location {
        Location::new(self.frames.iter().map(ToString::to_string).collect())
    }
}
