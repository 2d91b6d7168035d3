use super::*;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

use chrono::TimeZone;

use crate::error::UserAction;

#[derive(Default)]
struct CountingLedger {
    submits: AtomicUsize,
    last_submit: Mutex<Option<SendTransferRequest>>,
    pending: Mutex<Vec<TransferPayload>>,
    reject_with: Option<String>,
}

impl CountingLedger {
    fn rejecting(message: &str) -> Self {
        Self {
            reject_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    fn submit_count(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }
}

fn sent_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0)
        .single()
        .expect("valid timestamp")
}

fn payload(id: i64, origin: &str, destination: Option<&str>, amount: u64) -> TransferPayload {
    TransferPayload {
        transfer_id: TransferId(id),
        origin_teller: origin.into(),
        destination_teller: destination.map(TellerId::from),
        amount,
        sent_at: sent_at(),
        accepted_at: None,
        state: None,
    }
}

#[async_trait]
impl TransferLedger for CountingLedger {
    async fn submit_transfer(
        &self,
        request: SendTransferRequest,
    ) -> Result<TillResponse<TransferPayload>, ClientError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        *self.last_submit.lock().expect("lock") = Some(request.clone());
        if let Some(message) = &self.reject_with {
            return Ok(TillResponse {
                success: false,
                message: message.clone(),
                data: None,
            });
        }
        Ok(TillResponse {
            success: true,
            message: "Traslado enviado".into(),
            data: Some(TransferPayload {
                state: Some(TransferState::Sent),
                ..payload(
                    41,
                    request.origin_teller.as_str(),
                    Some(request.destination_teller.as_str()),
                    request.amount,
                )
            }),
        })
    }

    async fn pending_transfers(
        &self,
        _destination: &TellerId,
    ) -> Result<PendingTransfersResponse, ClientError> {
        Ok(PendingTransfersResponse {
            success: true,
            message: String::new(),
            transfers: self.pending.lock().expect("lock").clone(),
        })
    }

    async fn accept_transfer(
        &self,
        request: AcceptTransferRequest,
    ) -> Result<TillResponse<TransferPayload>, ClientError> {
        if let Some(message) = &self.reject_with {
            return Ok(TillResponse {
                success: false,
                message: message.clone(),
                data: None,
            });
        }
        Ok(TillResponse {
            success: true,
            message: String::new(),
            data: Some(TransferPayload {
                accepted_at: Some(sent_at()),
                ..payload(request.transfer_id.0, "Caja 1", None, 500_000)
            }),
        })
    }
}

fn teller(name: &str) -> TellerId {
    TellerId::from(name)
}

#[tokio::test]
async fn same_teller_is_rejected_without_a_request() {
    let desk = TransferDesk::new(CountingLedger::default());
    let err = desk
        .send(&teller("Caja 1"), &teller("Caja 1"), 10_000)
        .await
        .expect_err("self transfer must fail");

    assert!(matches!(
        err,
        ClientError::InvalidTransfer(TransferViolation::SameTeller(_))
    ));
    assert!(err.is_local());
    assert_eq!(desk.ledger().submit_count(), 0);
}

#[tokio::test]
async fn amount_bounds_are_checked_before_the_backend() {
    let desk = TransferDesk::new(CountingLedger::default());
    let origin = teller("Caja 1");
    let destination = teller("Caja 2");

    let too_large = desk
        .send(&origin, &destination, MAX_TRANSFER_AMOUNT + 1)
        .await
        .expect_err("above maximum");
    assert!(matches!(
        too_large,
        ClientError::InvalidTransfer(TransferViolation::AmountTooLarge(_))
    ));
    let zero = desk
        .send(&origin, &destination, 0)
        .await
        .expect_err("zero amount");
    assert!(matches!(
        zero,
        ClientError::InvalidTransfer(TransferViolation::AmountTooSmall)
    ));
    assert_eq!(desk.ledger().submit_count(), 0);

    let receipt = desk
        .send(&origin, &destination, MAX_TRANSFER_AMOUNT)
        .await
        .expect("maximum is allowed");
    assert_eq!(receipt.amount, MAX_TRANSFER_AMOUNT);
    assert_eq!(receipt.state, TransferState::Sent);
    assert_eq!(desk.ledger().submit_count(), 1);
}

#[tokio::test]
async fn missing_destination_is_rejected() {
    let desk = TransferDesk::new(CountingLedger::default());
    let err = desk
        .send(&teller("Caja 1"), &teller("  "), 100)
        .await
        .expect_err("blank destination");
    assert!(matches!(
        err,
        ClientError::InvalidTransfer(TransferViolation::MissingDestination)
    ));
    assert_eq!(desk.ledger().submit_count(), 0);
}

#[tokio::test]
async fn send_forwards_tellers_and_amount() {
    let desk = TransferDesk::new(CountingLedger::default());
    let receipt = desk
        .send(&teller("Caja 1"), &teller("Caja 2"), 500_000)
        .await
        .expect("send");

    let forwarded = desk
        .ledger()
        .last_submit
        .lock()
        .expect("lock")
        .clone()
        .expect("request recorded");
    assert_eq!(forwarded.origin_teller, teller("Caja 1"));
    assert_eq!(forwarded.destination_teller, teller("Caja 2"));
    assert_eq!(forwarded.amount, 500_000);
    assert_eq!(receipt.id, TransferId(41));
    assert_eq!(receipt.destination_teller, teller("Caja 2"));
    assert!(receipt.accepted_at.is_none());
}

#[tokio::test]
async fn backend_rejection_surfaces_its_message() {
    let desk = TransferDesk::new(CountingLedger::rejecting("Saldo insuficiente en caja"));
    let err = desk
        .send(&teller("Caja 1"), &teller("Caja 2"), 500_000)
        .await
        .expect_err("rejected");

    assert!(!err.is_local());
    assert_eq!(
        err.user_message(UserAction::SendTransfer),
        "Saldo insuficiente en caja"
    );
}

#[tokio::test]
async fn pending_list_keeps_only_unaccepted_transfers_for_the_destination() {
    let ledger = CountingLedger::default();
    {
        let mut pending = ledger.pending.lock().expect("lock");
        pending.push(payload(1, "Caja 1", None, 500_000));
        pending.push(TransferPayload {
            accepted_at: Some(sent_at()),
            ..payload(2, "Caja 3", None, 20_000)
        });
        pending.push(payload(3, "Caja 3", Some("Caja 4"), 70_000));
        pending.push(payload(4, "Caja 3", Some("Caja 2"), 80_000));
    }
    let desk = TransferDesk::new(ledger);

    let pending = desk.list_pending(&teller("Caja 2")).await.expect("list");
    let ids: Vec<i64> = pending.iter().map(|transfer| transfer.id.0).collect();
    assert_eq!(ids, vec![1, 4]);
    assert!(pending
        .iter()
        .all(|transfer| transfer.state == TransferState::Sent));
    assert_eq!(pending[0].destination_teller, teller("Caja 2"));
}

#[tokio::test]
async fn accept_marks_the_transfer_accepted() {
    let desk = TransferDesk::new(CountingLedger::default());
    let accepted = desk
        .accept(TransferId(9), &teller("Caja 2"))
        .await
        .expect("accept");
    assert_eq!(accepted.id, TransferId(9));
    assert_eq!(accepted.state, TransferState::Accepted);
    assert_eq!(accepted.destination_teller, teller("Caja 2"));
}

#[test]
fn amount_input_drops_separators_and_caps_digits() {
    assert_eq!(parse_amount_input("1.500.000"), 1_500_000);
    assert_eq!(parse_amount_input("$ 20,000"), 20_000);
    assert_eq!(parse_amount_input(""), 0);
    assert_eq!(parse_amount_input("12345678901234567"), 1_234_567_890_123);
}

#[test]
fn amounts_render_with_dot_thousands() {
    assert_eq!(format_amount(0), "0");
    assert_eq!(format_amount(999), "999");
    assert_eq!(format_amount(1_500_000), "1.500.000");
    assert_eq!(format_amount(MAX_TRANSFER_AMOUNT), "9.999.999.999.999");
}

#[test]
fn violation_messages_name_the_limit() {
    assert_eq!(
        TransferViolation::AmountTooLarge(MAX_TRANSFER_AMOUNT + 1).to_string(),
        "amount 10.000.000.000.000 exceeds the maximum of 9.999.999.999.999"
    );
    assert_eq!(
        TransferViolation::AmountTooSmall.to_string(),
        "amount must be at least 1"
    );
}
