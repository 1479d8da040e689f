//! Enrollment existence check consumed by the purchase flow
//!
//! Enrollment rows are created inside payment settlement (see
//! `PaymentStore::settle`), never here; this repository only answers
//! whether a user already has access to a course.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::error::{DatabaseError, DbResult};

#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    async fn is_enrolled(&self, user_id: Uuid, course_id: Uuid) -> DbResult<bool>;
}

pub struct EnrollmentRepository {
    pool: PgPool,
}

impl EnrollmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EnrollmentStore for EnrollmentRepository {
    async fn is_enrolled(&self, user_id: Uuid, course_id: Uuid) -> DbResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM enrollments WHERE user_id = $1 AND course_id = $2)",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
