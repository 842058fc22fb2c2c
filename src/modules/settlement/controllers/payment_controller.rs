use std::sync::Arc;

use actix_web::{web, HttpResponse};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::core::error::AppError;
use crate::modules::payments::models::PaymentMethod;
use crate::modules::settlement::models::{ReversePaymentRequest, SettlePaymentRequest};
use crate::modules::settlement::services::{ReversalService, SettlementService};

/// Settle body; the loan comes from the path
#[derive(Debug, Deserialize)]
pub struct SettlePaymentBody {
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub reference_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub cash_session_id: Option<String>,
    pub branch_id: String,
    pub created_by: String,
}

impl SettlePaymentBody {
    fn into_request(self, loan_id: String) -> SettlePaymentRequest {
        SettlePaymentRequest {
            loan_id,
            amount: self.amount,
            payment_method: self.payment_method,
            reference_number: self.reference_number,
            notes: self.notes,
            cash_session_id: self.cash_session_id,
            branch_id: self.branch_id,
            created_by: self.created_by,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReversePaymentBody {
    pub reason: String,
    pub reversed_by: String,
}

/// Apply a payment to a loan
/// POST /api/v1/loans/{loan_id}/payments
pub async fn settle_payment(
    service: web::Data<Arc<SettlementService>>,
    path: web::Path<String>,
    body: web::Json<SettlePaymentBody>,
) -> Result<HttpResponse, AppError> {
    let request = body.into_inner().into_request(path.into_inner());
    let outcome = service.settle(request).await?;

    Ok(HttpResponse::Created().json(outcome))
}

/// Reverse a completed payment
/// POST /api/v1/payments/{payment_id}/reverse
pub async fn reverse_payment(
    service: web::Data<Arc<ReversalService>>,
    path: web::Path<String>,
    body: web::Json<ReversePaymentBody>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let request = ReversePaymentRequest {
        payment_id: path.into_inner(),
        reason: body.reason,
        reversed_by: body.reversed_by,
    };
    let outcome = service.reverse(request).await?;

    Ok(HttpResponse::Ok().json(outcome))
}

/// GET /api/v1/loans/{loan_id}/payoff
pub async fn get_payoff(
    service: web::Data<Arc<SettlementService>>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let quote = service.payoff_quote(&path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(quote))
}

/// GET /api/v1/loans/{loan_id}/payments
pub async fn list_payments(
    service: web::Data<Arc<SettlementService>>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let payments = service.list_payments(&path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(payments))
}

/// Configure payment routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/loans/{loan_id}/payments", web::post().to(settle_payment))
            .route("/loans/{loan_id}/payments", web::get().to(list_payments))
            .route("/loans/{loan_id}/payoff", web::get().to(get_payoff))
            .route("/payments/{payment_id}/reverse", web::post().to(reverse_payment)),
    );
}
