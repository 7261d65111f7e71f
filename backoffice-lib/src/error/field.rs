//! Typed access failures on rows

/// A column of a [`Record`](crate::model::Record) could not be read as the
/// requested type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("column '{column}' {problem}")]
pub struct FieldError {
    pub column: String,
    pub problem: FieldProblem,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldProblem {
    #[error("is absent from the row")]
    Absent,
    #[error("holds {actual}, expected {expected}")]
    WrongType {
        expected: &'static str,
        actual: &'static str,
    },
    /// Text that should hold a number or timestamp and does not.
    #[error("holds {value:?}, not a valid {expected}")]
    Unparsable { expected: &'static str, value: String },
}

impl FieldError {
    pub fn missing(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            problem: FieldProblem::Absent,
        }
    }

    pub fn type_mismatch(column: impl Into<String>, expected: &'static str, actual: &'static str) -> Self {
        Self {
            column: column.into(),
            problem: FieldProblem::WrongType { expected, actual },
        }
    }

    pub fn unparsable(column: impl Into<String>, expected: &'static str, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            problem: FieldProblem::Unparsable {
                expected,
                value: value.into(),
            },
        }
    }

    /// Returns `true` if the column is not in the row at all.
    pub fn is_absent(&self) -> bool {
        self.problem == FieldProblem::Absent
    }
}
