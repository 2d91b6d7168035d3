//! Teller-to-teller cash transfers: send, list pending, accept.
//!
//! The backend is the ledger. Nothing here adjusts a balance; a transfer
//! stays `Sent` until the destination teller accepts it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use shared::{
    domain::{TellerId, TransferId, TransferState},
    protocol::{
        AcceptTransferRequest, PendingTransfersResponse, SendTransferRequest, TillAudit,
        TillResponse, TransferPayload,
    },
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{error::ClientError, ApiClient};

pub const MIN_TRANSFER_AMOUNT: u64 = 1;
pub const MAX_TRANSFER_AMOUNT: u64 = 9_999_999_999_999;
pub const MAX_AMOUNT_DIGITS: usize = 13;

/// A send precondition that failed before any request was made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferViolation {
    #[error("a till cannot send a transfer to itself ({0})")]
    SameTeller(TellerId),
    #[error("destination till is required")]
    MissingDestination,
    #[error("amount must be at least {}", MIN_TRANSFER_AMOUNT)]
    AmountTooSmall,
    #[error("amount {} exceeds the maximum of {}", format_amount(*.0), format_amount(MAX_TRANSFER_AMOUNT))]
    AmountTooLarge(u64),
    #[error("amount may have at most {} digits", MAX_AMOUNT_DIGITS)]
    TooManyDigits,
}

pub fn validate_send(
    origin: &TellerId,
    destination: &TellerId,
    amount: u64,
) -> Result<(), TransferViolation> {
    if destination.as_str().trim().is_empty() {
        return Err(TransferViolation::MissingDestination);
    }
    if origin == destination {
        return Err(TransferViolation::SameTeller(origin.clone()));
    }
    if amount < MIN_TRANSFER_AMOUNT {
        return Err(TransferViolation::AmountTooSmall);
    }
    if amount > MAX_TRANSFER_AMOUNT {
        return Err(TransferViolation::AmountTooLarge(amount));
    }
    if amount.to_string().len() > MAX_AMOUNT_DIGITS {
        return Err(TransferViolation::TooManyDigits);
    }
    Ok(())
}

/// Reads an amount as typed into the till screen: thousands dots and any
/// other non-digit are dropped, and input is cut at the digit limit.
pub fn parse_amount_input(raw: &str) -> u64 {
    raw.chars()
        .filter(char::is_ascii_digit)
        .take(MAX_AMOUNT_DIGITS)
        .fold(0u64, |acc, digit| {
            acc * 10 + u64::from(digit as u8 - b'0')
        })
}

/// Renders an amount with `.` as the thousands separator (`1.500.000`).
pub fn format_amount(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push('.');
        }
        out.push(digit);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub id: TransferId,
    pub origin_teller: TellerId,
    pub destination_teller: TellerId,
    pub amount: u64,
    pub state: TransferState,
    pub sent_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}

impl TransferRequest {
    /// The pending list omits the destination; the caller knows it.
    fn from_payload(payload: TransferPayload, destination: &TellerId) -> Self {
        let state = payload.state.unwrap_or(if payload.accepted_at.is_some() {
            TransferState::Accepted
        } else {
            TransferState::Sent
        });
        Self {
            id: payload.transfer_id,
            origin_teller: payload.origin_teller,
            destination_teller: payload
                .destination_teller
                .unwrap_or_else(|| destination.clone()),
            amount: payload.amount,
            state,
            sent_at: payload.sent_at,
            accepted_at: payload.accepted_at,
        }
    }
}

/// Raw transfer endpoints.
#[async_trait]
pub trait TransferLedger: Send + Sync {
    async fn submit_transfer(
        &self,
        request: SendTransferRequest,
    ) -> Result<TillResponse<TransferPayload>, ClientError>;
    async fn pending_transfers(
        &self,
        destination: &TellerId,
    ) -> Result<PendingTransfersResponse, ClientError>;
    async fn accept_transfer(
        &self,
        request: AcceptTransferRequest,
    ) -> Result<TillResponse<TransferPayload>, ClientError>;
}

#[async_trait]
impl TransferLedger for ApiClient {
    async fn submit_transfer(
        &self,
        mut request: SendTransferRequest,
    ) -> Result<TillResponse<TransferPayload>, ClientError> {
        request.audit = self.current_audit().await;
        self.send_json(Method::POST, "/cajero/traslado/enviar", &request)
            .await
    }

    async fn pending_transfers(
        &self,
        destination: &TellerId,
    ) -> Result<PendingTransfersResponse, ClientError> {
        self.get_json(
            "/cajero/traslado/consultar-pendientes",
            &[("cajeroDestino", destination.as_str())],
        )
        .await
    }

    async fn accept_transfer(
        &self,
        mut request: AcceptTransferRequest,
    ) -> Result<TillResponse<TransferPayload>, ClientError> {
        request.audit = self.current_audit().await;
        self.send_json(Method::POST, "/cajero/traslado/aceptar", &request)
            .await
    }
}

impl ApiClient {
    async fn current_audit(&self) -> TillAudit {
        self.session()
            .await
            .map(|session| session.audit())
            .unwrap_or_default()
    }
}

/// Drives the handshake for one till screen.
pub struct TransferDesk<L: TransferLedger> {
    ledger: L,
}

impl<L: TransferLedger> TransferDesk<L> {
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Checks the preconditions locally, then asks the backend to create the
    /// transfer. The returned receipt is always `Sent`.
    pub async fn send(
        &self,
        origin: &TellerId,
        destination: &TellerId,
        amount: u64,
    ) -> Result<TransferRequest, ClientError> {
        validate_send(origin, destination, amount).map_err(|violation| {
            warn!(origin = %origin, destination = %destination, amount, %violation, "transfer: rejected locally");
            violation
        })?;

        let response = self
            .ledger
            .submit_transfer(SendTransferRequest {
                origin_teller: origin.clone(),
                destination_teller: destination.clone(),
                amount,
                audit: TillAudit::default(),
            })
            .await
            .map_err(|err| log_failure("send", err))?;

        let payload = accepted_payload(response)?;
        let mut receipt = TransferRequest::from_payload(payload, destination);
        receipt.state = TransferState::Sent;
        receipt.accepted_at = None;
        info!(
            transfer_id = receipt.id.0,
            origin = %receipt.origin_teller,
            destination = %receipt.destination_teller,
            amount = receipt.amount,
            "transfer: sent"
        );
        Ok(receipt)
    }

    /// Transfers waiting for `destination`. There is no push channel, so call
    /// this again after every accept.
    pub async fn list_pending(
        &self,
        destination: &TellerId,
    ) -> Result<Vec<TransferRequest>, ClientError> {
        let response = self
            .ledger
            .pending_transfers(destination)
            .await
            .map_err(|err| log_failure("list pending", err))?;
        if !response.success {
            return Err(ClientError::Rejected {
                message: response.message,
            });
        }
        let pending: Vec<TransferRequest> = response
            .transfers
            .into_iter()
            .map(|payload| TransferRequest::from_payload(payload, destination))
            .filter(|transfer| {
                transfer.state == TransferState::Sent && transfer.destination_teller == *destination
            })
            .collect();
        info!(destination = %destination, count = pending.len(), "transfer: pending listed");
        Ok(pending)
    }

    /// Accepts one transfer. Rejecting a second acceptance is the backend's job.
    pub async fn accept(
        &self,
        transfer_id: TransferId,
        destination: &TellerId,
    ) -> Result<TransferRequest, ClientError> {
        let response = self
            .ledger
            .accept_transfer(AcceptTransferRequest {
                transfer_id,
                destination_teller: destination.clone(),
                audit: TillAudit::default(),
            })
            .await
            .map_err(|err| log_failure("accept", err))?;

        let payload = accepted_payload(response)?;
        let mut transfer = TransferRequest::from_payload(payload, destination);
        transfer.state = TransferState::Accepted;
        info!(
            transfer_id = transfer.id.0,
            destination = %destination,
            amount = transfer.amount,
            "transfer: accepted"
        );
        Ok(transfer)
    }
}

fn accepted_payload(
    response: TillResponse<TransferPayload>,
) -> Result<TransferPayload, ClientError> {
    match (response.success, response.data) {
        (true, Some(payload)) => Ok(payload),
        (_, _) => Err(ClientError::Rejected {
            message: response.message,
        }),
    }
}

fn log_failure(step: &str, err: ClientError) -> ClientError {
    error!(step, error = %err, "transfer: request failed");
    err
}

#[cfg(test)]
#[path = "tests/transfer_tests.rs"]
mod tests;
