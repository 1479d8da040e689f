//! Integration tests for the transactional settlement path
//!
//! These tests require a running Postgres instance.
//! Run with: DATABASE_URL=postgres://... cargo test --features db-tests --test settlement_integration_test

#[cfg(feature = "db-tests")]
mod settlement_tests {
    use chrono::Utc;
    use sqlx::PgPool;
    use uuid::Uuid;

    use edupay_backend::database::payment_repository::{
        NewPayment, PaymentRepository, PaymentStatus, PaymentStore, SettleOutcome, Settlement,
    };
    use edupay_backend::database::{init_pool, PoolConfig};

    async fn setup_db() -> PgPool {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = init_pool(&database_url, Some(PoolConfig::default()))
            .await
            .expect("Failed to init DB pool");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");
        pool
    }

    async fn insert_course(pool: &PgPool) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO courses (id, title, price, status) \
             VALUES ($1, $2, $3::numeric, 'published')",
        )
        .bind(id)
        .bind("Settlement test course")
        .bind("49.99")
        .execute(pool)
        .await
        .expect("Failed to insert course");
        id
    }

    async fn insert_pending(
        repo: &PaymentRepository,
        user_id: Uuid,
        course_id: Uuid,
    ) -> String {
        let order_reference = Uuid::new_v4().simple().to_string();
        repo.insert_pending(NewPayment {
            order_reference: order_reference.clone(),
            user_id,
            course_id,
            amount_cents: 4999,
            currency: "VND".to_string(),
            payment_method: "vnpay".to_string(),
        })
        .await
        .expect("Failed to insert pending payment");
        order_reference
    }

    fn completed_settlement() -> Settlement {
        Settlement {
            status: PaymentStatus::Completed,
            transaction_no: Some("14422574".to_string()),
            response_code: "00".to_string(),
            paid_at: Some(Utc::now()),
        }
    }

    async fn enrollment_count(pool: &PgPool, user_id: Uuid, course_id: Uuid) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM enrollments WHERE user_id = $1 AND course_id = $2")
            .bind(user_id)
            .bind(course_id)
            .fetch_one(pool)
            .await
            .expect("Failed to count enrollments")
    }

    #[tokio::test]
    async fn test_double_settle_creates_one_enrollment() {
        let pool = setup_db().await;
        let repo = PaymentRepository::new(pool.clone());
        let course_id = insert_course(&pool).await;
        let user_id = Uuid::new_v4();
        let order_reference = insert_pending(&repo, user_id, course_id).await;

        let first = repo
            .settle(&order_reference, completed_settlement())
            .await
            .unwrap()
            .unwrap();
        match first {
            SettleOutcome::Applied {
                payment,
                enrollment_created,
            } => {
                assert_eq!(payment.status, PaymentStatus::Completed);
                assert!(enrollment_created);
                assert_eq!(payment.transaction_no.as_deref(), Some("14422574"));
            }
            other => panic!("expected the first settle to apply, got {other:?}"),
        }

        let second = repo
            .settle(&order_reference, completed_settlement())
            .await
            .unwrap()
            .unwrap();
        match second {
            SettleOutcome::AlreadyTerminal(payment) => {
                assert_eq!(payment.status, PaymentStatus::Completed);
            }
            other => panic!("expected the repeat settle to short-circuit, got {other:?}"),
        }

        assert_eq!(enrollment_count(&pool, user_id, course_id).await, 1);
    }

    #[tokio::test]
    async fn test_enrollment_conflict_leaves_degraded_status() {
        let pool = setup_db().await;
        let repo = PaymentRepository::new(pool.clone());
        let course_id = insert_course(&pool).await;
        let user_id = Uuid::new_v4();
        let order_reference = insert_pending(&repo, user_id, course_id).await;

        // Force the enrollment insert to hit the unique constraint
        sqlx::query("INSERT INTO enrollments (id, user_id, course_id) VALUES ($1, $2, $3)")
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(course_id)
            .execute(&pool)
            .await
            .unwrap();

        let outcome = repo
            .settle(&order_reference, completed_settlement())
            .await
            .unwrap()
            .unwrap();
        match outcome {
            SettleOutcome::Applied {
                payment,
                enrollment_created,
            } => {
                assert_eq!(payment.status, PaymentStatus::CompletedEnrollmentFailed);
                assert!(!enrollment_created);
            }
            other => panic!("expected a degraded settlement, got {other:?}"),
        }

        // The row must be neither pending nor failed after the rollback
        let status: String =
            sqlx::query_scalar("SELECT status FROM payments WHERE order_reference = $1")
                .bind(&order_reference)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(status, "completed_enrollment_failed");
        assert_eq!(enrollment_count(&pool, user_id, course_id).await, 1);
    }

    #[tokio::test]
    async fn test_failed_settlement_records_code_without_enrollment() {
        let pool = setup_db().await;
        let repo = PaymentRepository::new(pool.clone());
        let course_id = insert_course(&pool).await;
        let user_id = Uuid::new_v4();
        let order_reference = insert_pending(&repo, user_id, course_id).await;

        let outcome = repo
            .settle(
                &order_reference,
                Settlement {
                    status: PaymentStatus::Failed,
                    transaction_no: None,
                    response_code: "24".to_string(),
                    paid_at: None,
                },
            )
            .await
            .unwrap()
            .unwrap();
        match outcome {
            SettleOutcome::Applied {
                payment,
                enrollment_created,
            } => {
                assert_eq!(payment.status, PaymentStatus::Failed);
                assert_eq!(payment.response_code.as_deref(), Some("24"));
                assert!(!enrollment_created);
            }
            other => panic!("expected the settle to apply, got {other:?}"),
        }

        assert_eq!(enrollment_count(&pool, user_id, course_id).await, 0);
    }

    #[tokio::test]
    async fn test_unknown_order_reference_settles_to_none() {
        let pool = setup_db().await;
        let repo = PaymentRepository::new(pool);
        let outcome = repo
            .settle("no-such-reference", completed_settlement())
            .await
            .unwrap();
        assert!(outcome.is_none());
    }
}
