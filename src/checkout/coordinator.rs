//! Reconciliation coordinator
//!
//! Drives the payment lifecycle: initiation (with conflict checks
//! before the processor is ever contacted), callback settlement
//! (signature check, idempotency guard, atomic complete-and-enroll),
//! and out-of-band status reconciliation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error as log_error, info, warn};
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::database::course_repository::CourseStore;
use crate::database::enrollment_repository::EnrollmentStore;
use crate::database::payment_repository::{
    NewPayment, Payment, PaymentStatus, PaymentStore, Settlement, SettleOutcome,
};
use crate::error::{AppError, AppErrorKind, AppResult};
use crate::gateway::types::{
    GatewayResponse, InitiateRequest, RefundRequest, ReturnCallback, StatusQuery,
};
use crate::gateway::{codes, PaymentGateway};

use super::types::{LiveStatus, PaymentCreated, ReturnOutcome, StatusView};

/// Label recorded in `payments.payment_method`
const PAYMENT_METHOD: &str = "vnpay";

pub struct CheckoutService {
    config: GatewayConfig,
    gateway: Arc<dyn PaymentGateway>,
    payments: Arc<dyn PaymentStore>,
    courses: Arc<dyn CourseStore>,
    enrollments: Arc<dyn EnrollmentStore>,
}

impl CheckoutService {
    pub fn new(
        config: GatewayConfig,
        gateway: Arc<dyn PaymentGateway>,
        payments: Arc<dyn PaymentStore>,
        courses: Arc<dyn CourseStore>,
        enrollments: Arc<dyn EnrollmentStore>,
    ) -> Self {
        Self {
            config,
            gateway,
            payments,
            courses,
            enrollments,
        }
    }

    /// Initiate a purchase: validate, create the pending payment row,
    /// build the redirect URL. Every rejection happens before the
    /// processor is involved.
    pub async fn create_payment_request(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        bank_code: Option<String>,
        client_ip: String,
    ) -> AppResult<PaymentCreated> {
        if !self.config.purchasing_enabled {
            return Err(AppError::new(AppErrorKind::PurchasingDisabled));
        }

        let course = self
            .courses
            .find_course(course_id)
            .await?
            .ok_or_else(|| AppError::not_found("course", course_id.to_string()))?;
        if !course.is_published() {
            return Err(AppError::conflict("course is not open for purchase"));
        }

        if self.enrollments.is_enrolled(user_id, course_id).await? {
            return Err(AppError::conflict("user is already enrolled in this course"));
        }

        if self.payments.has_pending(user_id, course_id).await? {
            return Err(AppError::conflict(
                "a pending payment already exists for this course",
            ));
        }

        let order_reference = Uuid::new_v4().simple().to_string();
        let payment = self
            .payments
            .insert_pending(NewPayment {
                order_reference: order_reference.clone(),
                user_id,
                course_id,
                amount_cents: course.price_cents,
                currency: self.config.currency.clone(),
                payment_method: PAYMENT_METHOD.to_string(),
            })
            .await?;

        let redirect_url = self.gateway.payment_url(&InitiateRequest {
            order_reference: order_reference.clone(),
            amount_minor: course.price_cents,
            order_info: format!("Course purchase: {}", course.title),
            client_ip,
            bank_code,
        })?;

        info!(
            payment_id = %payment.id,
            order_reference = %order_reference,
            user_id = %user_id,
            course_id = %course_id,
            amount_cents = course.price_cents,
            "payment request created"
        );

        Ok(PaymentCreated {
            payment_id: payment.id,
            order_reference,
            redirect_url,
        })
    }

    /// Reconcile the processor's return callback.
    ///
    /// The processor delivers at-least-once; a repeat delivery for an
    /// already-terminal payment is answered from the recorded state
    /// without any side effect.
    pub async fn handle_return(
        &self,
        params: &HashMap<String, String>,
    ) -> AppResult<ReturnOutcome> {
        if !self.gateway.verify_return(params) {
            // Full parameter set kept for forensic review
            warn!(params = ?params, "callback rejected: signature mismatch");
            return Err(AppError::new(AppErrorKind::SignatureMismatch));
        }

        let callback = ReturnCallback::from_params(params)?;
        let success = codes::is_success(&callback.response_code);

        let settlement = Settlement {
            status: if success {
                PaymentStatus::Completed
            } else {
                PaymentStatus::Failed
            },
            transaction_no: callback.transaction_no.clone(),
            response_code: callback.response_code.clone(),
            paid_at: Some(callback.paid_at.unwrap_or_else(Utc::now)),
        };

        let outcome = self
            .payments
            .settle(&callback.order_reference, settlement)
            .await?
            // The row is always created before the buyer is redirected,
            // so an unknown reference is forged or stale, not early.
            .ok_or_else(|| AppError::not_found("payment", callback.order_reference.clone()))?;

        Ok(self.describe_outcome(&callback.order_reference, &callback.response_code, outcome))
    }

    /// Recorded state plus the processor's authoritative answer. An
    /// unreachable processor yields `live: unknown`, never a
    /// definitive failure.
    pub async fn query_payment_status(
        &self,
        payment_id: Uuid,
        client_ip: String,
    ) -> AppResult<StatusView> {
        let payment = self.require_payment(payment_id).await?;

        let live = match self
            .gateway
            .query_status(&StatusQuery {
                order_reference: payment.order_reference.clone(),
                transaction_date: payment.created_at,
                client_ip,
            })
            .await
        {
            Ok(response) => LiveStatus::Reported {
                message: codes::describe(&response.response_code).to_string(),
                transaction_status: response.transaction_status,
                response_code: response.response_code,
            },
            Err(e) => {
                warn!(
                    payment_id = %payment_id,
                    order_reference = %payment.order_reference,
                    error = %e,
                    "processor status query unavailable"
                );
                LiveStatus::Unknown {
                    reason: e.to_string(),
                }
            }
        };

        Ok(StatusView {
            payment_id: payment.id,
            order_reference: payment.order_reference,
            recorded_status: payment.status,
            response_code: payment.response_code,
            live,
        })
    }

    /// Administrative reconciliation for a payment whose callback was
    /// lost: query the processor and, iff it reports the transaction
    /// settled and our row is still pending, apply the same atomic
    /// complete-and-enroll transition the callback would have.
    pub async fn confirm_pending(
        &self,
        payment_id: Uuid,
        client_ip: String,
    ) -> AppResult<ReturnOutcome> {
        let payment = self.require_payment(payment_id).await?;
        if payment.status.is_terminal() {
            return Err(AppError::conflict(format!(
                "payment is already {}",
                payment.status.as_str()
            )));
        }

        let response = self
            .gateway
            .query_status(&StatusQuery {
                order_reference: payment.order_reference.clone(),
                transaction_date: payment.created_at,
                client_ip,
            })
            .await?;

        if !response.is_settled() {
            return Err(AppError::conflict(format!(
                "processor does not report this payment as settled (code {}: {})",
                response.response_code,
                codes::describe(&response.response_code)
            )));
        }

        info!(
            payment_id = %payment_id,
            order_reference = %payment.order_reference,
            "processor confirmed settlement; applying administrative completion"
        );

        let paid_at = response
            .pay_date
            .as_deref()
            .and_then(crate::gateway::types::parse_gateway_time)
            .unwrap_or_else(Utc::now);

        let outcome = self
            .payments
            .settle(
                &payment.order_reference,
                Settlement {
                    status: PaymentStatus::Completed,
                    transaction_no: response.transaction_no.clone(),
                    response_code: response.response_code.clone(),
                    paid_at: Some(paid_at),
                },
            )
            .await?
            .ok_or_else(|| {
                AppError::not_found("payment", payment.order_reference.clone())
            })?;

        // A callback may land between the pending check above and the
        // settle call; answer that exactly like the early check does.
        match outcome {
            SettleOutcome::AlreadyTerminal(p) => Err(AppError::conflict(format!(
                "payment is already {}",
                p.status.as_str()
            ))),
            applied => Ok(self.describe_outcome(
                &payment.order_reference,
                &response.response_code,
                applied,
            )),
        }
    }

    /// Forward a refund request to the processor. The payment row is
    /// left untouched; marking it refunded is a separate operator
    /// decision once the processor's answer is reviewed.
    pub async fn request_refund(
        &self,
        payment_id: Uuid,
        initiated_by: String,
        client_ip: String,
    ) -> AppResult<GatewayResponse> {
        let payment = self.require_payment(payment_id).await?;
        if !matches!(
            payment.status,
            PaymentStatus::Completed | PaymentStatus::CompletedEnrollmentFailed
        ) {
            return Err(AppError::conflict(format!(
                "payment in state {} cannot be refunded",
                payment.status.as_str()
            )));
        }

        self.gateway
            .refund(&RefundRequest {
                order_reference: payment.order_reference.clone(),
                amount_minor: payment.amount_cents,
                transaction_no: payment.transaction_no.clone(),
                transaction_date: payment.paid_at.unwrap_or(payment.created_at),
                initiated_by,
                client_ip,
            })
            .await
    }

    async fn require_payment(&self, payment_id: Uuid) -> AppResult<Payment> {
        self.payments
            .find_by_id(payment_id)
            .await?
            .ok_or_else(|| AppError::not_found("payment", payment_id.to_string()))
    }

    fn describe_outcome(
        &self,
        order_reference: &str,
        callback_code: &str,
        outcome: SettleOutcome,
    ) -> ReturnOutcome {
        match outcome {
            SettleOutcome::AlreadyTerminal(payment) => {
                info!(
                    order_reference,
                    status = payment.status.as_str(),
                    "repeat callback answered from recorded state"
                );
                let code = payment
                    .response_code
                    .clone()
                    .unwrap_or_else(|| callback_code.to_string());
                ReturnOutcome {
                    order_reference: payment.order_reference,
                    status: payment.status,
                    message: codes::describe(&code).to_string(),
                    response_code: Some(code),
                    enrollment_created: false,
                }
            }
            SettleOutcome::Applied {
                payment,
                enrollment_created,
            } => {
                if payment.status == PaymentStatus::CompletedEnrollmentFailed {
                    log_error!(
                        order_reference,
                        payment_id = %payment.id,
                        "payment settled but enrollment missing; needs manual repair"
                    );
                } else {
                    info!(
                        order_reference,
                        status = payment.status.as_str(),
                        enrollment_created,
                        transaction_no = ?payment.transaction_no,
                        "callback settled"
                    );
                }
                ReturnOutcome {
                    order_reference: payment.order_reference,
                    status: payment.status,
                    response_code: payment.response_code,
                    enrollment_created,
                    message: codes::describe(callback_code).to_string(),
                }
            }
        }
    }
}
