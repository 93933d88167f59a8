use thiserror::Error; // Import the `Error` derive macro from the `thiserror` crate

// Errors surfaced to the evaluator by name and namespace resolution
#[derive(Debug, Error)] // Automatically implement `Debug` and `Error` traits for the enum
pub enum ResolveError {
    // No prefix of the name is bound and the root segment is absent too
    #[error("unresolved variable: {name}")]
    UnresolvedVariable { name: String },

    // The root resolved but a member segment could not be followed
    #[error("unresolved property '{segment}' in {name}")]
    UnresolvedProperty { name: String, segment: String },

    // Functor creation failed; fails the call site only
    #[error("namespace '{tag}' failed to initialize: {reason}")]
    NamespaceInitialization { tag: String, reason: String },

    #[error("namespace '{tag}' is reserved for engine use")]
    ReservedNamespace { tag: String },

    #[error("variable '{name}' is reserved for engine use")]
    ReservedVariable { name: String },

    #[error("unknown namespace: {tag}")]
    UnknownNamespace { tag: String },

    #[error("unknown function {namespace}:{function}")]
    UnknownFunction { namespace: String, function: String },

    #[error("{function} expects {expected} argument(s), got {got}")]
    ArityMismatch {
        function: String,
        expected: String,
        got: usize,
    },

    // Variant for names or call references that do not parse, with a message
    #[error("malformed name: {0}")]
    MalformedName(String),

    // Options or bindings that fail to (de)serialize
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    // Variant for errors raised by namespace functions at call time
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl ResolveError {
    /// True when a lenient evaluator may substitute a default instead of failing.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ResolveError::UnresolvedVariable { .. } | ResolveError::UnresolvedProperty { .. }
        )
    }
}

// Type alias for results that use `ResolveError` as the error type
pub type Result<T> = std::result::Result<T, ResolveError>;
