//! Course lookup consumed by the purchase flow
//!
//! Courses are owned by the catalog subsystem; this repository only
//! reads the fields purchasing needs. The catalog stores prices as a
//! decimal in major currency units; they are converted to integer
//! cents on load so no amount math ever touches floating point.

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::error::{DatabaseError, DatabaseErrorKind, DbResult};
use crate::gateway::types::parse_major_units;

pub const COURSE_STATUS_PUBLISHED: &str = "published";

#[derive(Debug, Clone)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    /// Price in minor currency units
    pub price_cents: i64,
    pub status: String,
}

impl Course {
    /// Only published courses may be purchased
    pub fn is_published(&self) -> bool {
        self.status == COURSE_STATUS_PUBLISHED
    }
}

/// Raw catalog row; the decimal price column arrives as text
#[derive(Debug, FromRow)]
struct CourseRow {
    id: Uuid,
    title: String,
    price: String,
    status: String,
}

impl CourseRow {
    fn into_course(self) -> DbResult<Course> {
        let price_cents = parse_major_units(&self.price).map_err(|e| {
            DatabaseError::new(DatabaseErrorKind::QueryError {
                message: format!("course {} has an unusable price: {e}", self.id),
            })
        })?;
        Ok(Course {
            id: self.id,
            title: self.title,
            price_cents,
            status: self.status,
        })
    }
}

#[async_trait]
pub trait CourseStore: Send + Sync {
    async fn find_course(&self, id: Uuid) -> DbResult<Option<Course>>;
}

pub struct CourseRepository {
    pool: PgPool,
}

impl CourseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CourseStore for CourseRepository {
    async fn find_course(&self, id: Uuid) -> DbResult<Option<Course>> {
        sqlx::query_as::<_, CourseRow>(
            "SELECT id, title, price::TEXT AS price, status FROM courses WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .map(CourseRow::into_course)
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_published_courses_are_purchasable() {
        let mut course = Course {
            id: Uuid::new_v4(),
            title: "Rust for Beginners".to_string(),
            price_cents: 4999,
            status: "published".to_string(),
        };
        assert!(course.is_published());

        course.status = "draft".to_string();
        assert!(!course.is_published());

        course.status = "archived".to_string();
        assert!(!course.is_published());
    }

    #[test]
    fn test_decimal_price_converts_to_cents_on_load() {
        let row = CourseRow {
            id: Uuid::new_v4(),
            title: "Rust for Beginners".to_string(),
            price: "49.99".to_string(),
            status: "published".to_string(),
        };
        assert_eq!(row.into_course().unwrap().price_cents, 4999);

        let row = CourseRow {
            id: Uuid::new_v4(),
            title: "Intro".to_string(),
            price: "10.00".to_string(),
            status: "published".to_string(),
        };
        assert_eq!(row.into_course().unwrap().price_cents, 1000);
    }

    #[test]
    fn test_unusable_price_is_a_query_error() {
        let row = CourseRow {
            id: Uuid::new_v4(),
            title: "Broken".to_string(),
            price: "-1.00".to_string(),
            status: "published".to_string(),
        };
        assert!(row.into_course().is_err());
    }
}
