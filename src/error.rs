//! Error types and handling for valuepack

/// Result type alias for valuepack operations
pub type Result<T> = std::result::Result<T, PackError>;

/// Build-time failures raised while planning a record layout
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Alignment constraints that no placement can honour
    #[error("Unsatisfiable layout for field {field}: {reason}")]
    Unsatisfiable { field: String, reason: String },

    /// A field declaration that violates its kind's rules
    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },
}

impl SchemaError {
    /// Create an unsatisfiable-constraint error
    pub fn unsatisfiable(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unsatisfiable {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid-field error
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Name of the offending field
    pub fn field(&self) -> &str {
        match self {
            Self::Unsatisfiable { field, .. } | Self::InvalidField { field, .. } => field,
        }
    }
}

/// Comprehensive error types for packed record access
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    /// Schema planning failures
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Integer or ordinal outside the field's declared range
    #[error("Range error: {value} outside [{min}, {max}] for field {field}")]
    Range {
        field: String,
        value: i128,
        min: i64,
        max: i64,
    },

    /// Text longer than the field's byte bound
    #[error("Length error: {actual} bytes exceed max {max} for field {field}")]
    Length {
        field: String,
        actual: usize,
        max: u32,
    },

    /// Null written to a non-nullable field
    #[error("Nullability error: field {field} is not nullable")]
    Nullability { field: String },

    /// Array index outside `[0, length)`
    #[error("Index error: {index} outside [0, {length}) for field {field}")]
    Index {
        field: String,
        index: i64,
        length: u32,
    },

    /// Value of the wrong shape for the field
    #[error("Type error: {field} - {message}")]
    Type { field: String, message: String },

    /// Access mode the field did not declare
    #[error("Unsupported access: {access} on field {field}")]
    UnsupportedAccess { field: String, access: String },

    /// No field with the given name
    #[error("Field not found: {name}")]
    FieldNotFound { name: String },

    /// Atomic access at a misaligned address
    #[error("Alignment error: address {address:#x} not aligned to {alignment}")]
    Alignment { address: usize, alignment: usize },

    /// Access past the end of the backing store
    #[error("Out of bounds: {len} bytes at offset {offset} exceed capacity {capacity}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    /// Stored bytes that do not decode under the field's schema
    #[error("Corrupted field {field}: {message}")]
    Corrupted { field: String, message: String },

    /// I/O related errors (marshalling, file operations, mmap)
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Invalid parameters or configuration
    #[error("Invalid parameter: {parameter} - {message}")]
    InvalidParameter { parameter: String, message: String },

    /// Platform-specific errors
    #[error("Platform error: {message}")]
    Platform { message: String },
}

impl PackError {
    /// Create an I/O error from a standard I/O error
    pub fn from_io(source: std::io::Error, context: &str) -> Self {
        Self::Io {
            message: format!("{}: {}", context, source),
            source: Some(source),
        }
    }

    /// Create a range error
    pub fn range(field: impl Into<String>, value: i128, min: i64, max: i64) -> Self {
        Self::Range {
            field: field.into(),
            value,
            min,
            max,
        }
    }

    /// Create a length error
    pub fn length(field: impl Into<String>, actual: usize, max: u32) -> Self {
        Self::Length {
            field: field.into(),
            actual,
            max,
        }
    }

    /// Create a nullability error
    pub fn nullability(field: impl Into<String>) -> Self {
        Self::Nullability {
            field: field.into(),
        }
    }

    /// Create an index error
    pub fn index(field: impl Into<String>, index: i64, length: u32) -> Self {
        Self::Index {
            field: field.into(),
            index,
            length,
        }
    }

    /// Create a type error
    pub fn type_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Type {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported access error
    pub fn unsupported(field: impl Into<String>, access: impl Into<String>) -> Self {
        Self::UnsupportedAccess {
            field: field.into(),
            access: access.into(),
        }
    }

    /// Create a field not found error
    pub fn field_not_found(name: impl Into<String>) -> Self {
        Self::FieldNotFound { name: name.into() }
    }

    /// Create an alignment error
    pub fn alignment(address: usize, alignment: usize) -> Self {
        Self::Alignment { address, alignment }
    }

    /// Create an out of bounds error
    pub fn out_of_bounds(offset: usize, len: usize, capacity: usize) -> Self {
        Self::OutOfBounds {
            offset,
            len,
            capacity,
        }
    }

    /// Create a corrupted field error
    pub fn corrupted(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupted {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a platform error
    pub fn platform(message: impl Into<String>) -> Self {
        Self::Platform {
            message: message.into(),
        }
    }

    /// Whether the error was caused by a bad value supplied by the caller
    pub fn is_caller_input(&self) -> bool {
        matches!(
            self,
            Self::Range { .. }
                | Self::Length { .. }
                | Self::Nullability { .. }
                | Self::Index { .. }
                | Self::Type { .. }
        )
    }
}

// Convert from common error types
impl From<std::io::Error> for PackError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io(err, "I/O operation failed")
    }
}

impl From<bincode::Error> for PackError {
    fn from(err: bincode::Error) -> Self {
        Self::serialization(format!("Bincode error: {}", err))
    }
}

impl From<serde_json::Error> for PackError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = PackError::range("count", 11, -5, 10);
        assert!(matches!(err, PackError::Range { .. }));
        assert!(err.is_caller_input());

        let err = PackError::index("items", -1, 4);
        assert!(matches!(err, PackError::Index { index: -1, .. }));

        let err: PackError = SchemaError::invalid_field("flag", "missing alignment").into();
        assert!(matches!(err, PackError::Schema(SchemaError::InvalidField { .. })));
        assert!(!err.is_caller_input());
    }

    #[test]
    fn test_error_display() {
        let err = PackError::length("name", 6, 5);
        let display = format!("{}", err);
        assert!(display.contains("Length error"));
        assert!(display.contains("name"));

        let err = SchemaError::unsatisfiable("x", "too wide");
        assert_eq!(err.field(), "x");
        assert!(format!("{}", err).contains("too wide"));
    }
}
