use std::fmt;

/// Database failure classification for the payment store
#[derive(Debug, Clone)]
pub enum DatabaseErrorKind {
    /// Connection pool is exhausted
    PoolExhausted,
    /// Record not found
    NotFound {
        entity: String,
        id: String,
    },
    /// Unique constraint violation (e.g., duplicate enrollment)
    UniqueConstraintViolation {
        constraint: String,
    },
    /// Foreign key constraint violation (e.g., course row missing)
    ForeignKeyViolation {
        constraint: String,
    },
    /// Query execution error
    QueryError {
        message: String,
    },
    /// Transaction error
    TransactionError {
        message: String,
    },
    /// Database connection error
    ConnectionError {
        message: String,
    },
    /// Configuration error
    ConfigError {
        message: String,
    },
    /// Unknown error
    Unknown {
        message: String,
    },
}

/// Result type for database operations
pub type DbResult<T> = Result<T, DatabaseError>;

#[derive(Debug, Clone)]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
    pub context: Option<String>,
    pub is_retryable: bool,
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind) -> Self {
        let is_retryable = matches!(
            kind,
            DatabaseErrorKind::PoolExhausted | DatabaseErrorKind::ConnectionError { .. }
        );

        Self {
            kind,
            context: None,
            is_retryable,
        }
    }

    pub fn with_context<S: Into<String>>(mut self, context: S) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.is_retryable
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::NotFound { .. })
    }

    /// True for the error classes an enrollment insert can raise
    /// without invalidating the payment itself.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self.kind,
            DatabaseErrorKind::UniqueConstraintViolation { .. }
                | DatabaseErrorKind::ForeignKeyViolation { .. }
        )
    }

    /// Map SQLx error to our custom error type
    pub fn from_sqlx(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => Self::new(DatabaseErrorKind::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            }),
            sqlx::Error::PoolTimedOut => Self::new(DatabaseErrorKind::PoolExhausted),
            sqlx::Error::PoolClosed => Self::new(DatabaseErrorKind::ConnectionError {
                message: "Connection pool is closed".to_string(),
            }),
            sqlx::Error::Configuration(msg) => Self::new(DatabaseErrorKind::ConfigError {
                message: msg.to_string(),
            }),
            sqlx::Error::Database(db_err) => {
                let constraint = db_err
                    .constraint()
                    .unwrap_or("unknown")
                    .to_string();
                match db_err.code().as_deref() {
                    // Postgres: unique_violation
                    Some("23505") => Self::new(DatabaseErrorKind::UniqueConstraintViolation {
                        constraint,
                    }),
                    // Postgres: foreign_key_violation
                    Some("23503") => Self::new(DatabaseErrorKind::ForeignKeyViolation {
                        constraint,
                    }),
                    _ => Self::new(DatabaseErrorKind::QueryError {
                        message: db_err.message().to_string(),
                    }),
                }
            }
            sqlx::Error::Io(io_err) => Self::new(DatabaseErrorKind::ConnectionError {
                message: io_err.to_string(),
            }),
            _ => Self::new(DatabaseErrorKind::Unknown {
                message: error.to_string(),
            }),
        }
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match &self.kind {
            DatabaseErrorKind::PoolExhausted => {
                "Database connection pool exhausted. Please try again.".to_string()
            }
            DatabaseErrorKind::NotFound { entity, id } => {
                format!("{} with ID '{}' not found", entity, id)
            }
            DatabaseErrorKind::UniqueConstraintViolation { constraint } => {
                format!("Unique constraint '{}' violated", constraint)
            }
            DatabaseErrorKind::ForeignKeyViolation { constraint } => {
                format!("Foreign key constraint '{}' violated", constraint)
            }
            DatabaseErrorKind::QueryError { message } => {
                format!("Database query failed: {}", message)
            }
            DatabaseErrorKind::TransactionError { message } => {
                format!("Transaction failed: {}", message)
            }
            DatabaseErrorKind::ConnectionError { message } => {
                format!("Database connection error: {}", message)
            }
            DatabaseErrorKind::ConfigError { message } => {
                format!("Database configuration error: {}", message)
            }
            DatabaseErrorKind::Unknown { message } => {
                format!("Unknown database error: {}", message)
            }
        };

        if let Some(context) = &self.context {
            write!(f, "{} ({})", message, context)
        } else {
            write!(f, "{}", message)
        }
    }
}

impl std::error::Error for DatabaseError {}

impl PartialEq for DatabaseError {
    fn eq(&self, other: &Self) -> bool {
        // For testing purposes
        format!("{:?}", self.kind) == format!("{:?}", other.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(DatabaseError::new(DatabaseErrorKind::PoolExhausted).is_retryable());
        assert!(!DatabaseError::new(DatabaseErrorKind::QueryError {
            message: "syntax".to_string()
        })
        .is_retryable());
    }

    #[test]
    fn test_constraint_violation_classification() {
        let unique = DatabaseError::new(DatabaseErrorKind::UniqueConstraintViolation {
            constraint: "enrollments_user_course_key".to_string(),
        });
        let fk = DatabaseError::new(DatabaseErrorKind::ForeignKeyViolation {
            constraint: "enrollments_course_id_fkey".to_string(),
        });
        assert!(unique.is_constraint_violation());
        assert!(fk.is_constraint_violation());
        assert!(!DatabaseError::new(DatabaseErrorKind::PoolExhausted).is_constraint_violation());
    }

    #[test]
    fn test_context_is_appended() {
        let err = DatabaseError::new(DatabaseErrorKind::PoolExhausted)
            .with_context("settling ORDER-1");
        assert!(err.to_string().contains("settling ORDER-1"));
    }
}
