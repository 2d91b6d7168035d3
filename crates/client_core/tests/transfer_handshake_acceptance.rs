use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use client_core::{ApiClient, ClientError, TransferDesk, UserAction};
use jsonwebtoken::{encode, EncodingKey, Header};
use shared::{
    domain::{TellerId, TillId, TransferId, TransferState, UserId},
    protocol::{
        AcceptTransferRequest, PendingTransfersResponse, SendTransferRequest, TillResponse,
        TokenClaims, TransferPayload,
    },
};
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct Ledger {
    transfers: Arc<Mutex<Vec<TransferPayload>>>,
    audited_tills: Arc<Mutex<Vec<Option<TillId>>>>,
}

type TillReply = (StatusCode, Json<TillResponse<TransferPayload>>);

fn till_error(status: StatusCode, message: &str) -> TillReply {
    (
        status,
        Json(TillResponse {
            success: false,
            message: message.to_string(),
            data: None,
        }),
    )
}

async fn send_transfer(
    State(ledger): State<Ledger>,
    headers: HeaderMap,
    Json(request): Json<SendTransferRequest>,
) -> TillReply {
    if !headers.contains_key("authorization") {
        return till_error(StatusCode::UNAUTHORIZED, "Token requerido");
    }
    if request.origin_teller == request.destination_teller {
        return till_error(StatusCode::BAD_REQUEST, "No puede enviarse a la misma caja");
    }
    ledger
        .audited_tills
        .lock()
        .expect("lock")
        .push(request.audit.id_caja);

    let mut transfers = ledger.transfers.lock().expect("lock");
    let payload = TransferPayload {
        transfer_id: TransferId(transfers.len() as i64 + 1),
        origin_teller: request.origin_teller,
        destination_teller: Some(request.destination_teller),
        amount: request.amount,
        sent_at: Utc::now(),
        accepted_at: None,
        state: Some(TransferState::Sent),
    };
    transfers.push(payload.clone());
    (
        StatusCode::OK,
        Json(TillResponse {
            success: true,
            message: "Traslado enviado".into(),
            data: Some(payload),
        }),
    )
}

async fn pending_transfers(
    State(ledger): State<Ledger>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<PendingTransfersResponse> {
    let destination = query.get("cajeroDestino").cloned().unwrap_or_default();
    let transfers = ledger
        .transfers
        .lock()
        .expect("lock")
        .iter()
        .filter(|transfer| {
            transfer.state == Some(TransferState::Sent)
                && transfer
                    .destination_teller
                    .as_ref()
                    .is_some_and(|teller| teller.as_str() == destination)
        })
        .map(|transfer| TransferPayload {
            destination_teller: None,
            state: None,
            ..transfer.clone()
        })
        .collect();
    Json(PendingTransfersResponse {
        success: true,
        message: String::new(),
        transfers,
    })
}

async fn accept_transfer(
    State(ledger): State<Ledger>,
    Json(request): Json<AcceptTransferRequest>,
) -> TillReply {
    let mut transfers = ledger.transfers.lock().expect("lock");
    let Some(transfer) = transfers
        .iter_mut()
        .find(|transfer| transfer.transfer_id == request.transfer_id)
    else {
        return till_error(StatusCode::NOT_FOUND, "Traslado no encontrado");
    };
    if transfer.destination_teller.as_ref() != Some(&request.destination_teller) {
        return till_error(StatusCode::FORBIDDEN, "El traslado es para otra caja");
    }
    if transfer.state == Some(TransferState::Accepted) {
        return till_error(StatusCode::CONFLICT, "Traslado ya aceptado");
    }
    transfer.state = Some(TransferState::Accepted);
    transfer.accepted_at = Some(Utc::now());
    (
        StatusCode::OK,
        Json(TillResponse {
            success: true,
            message: "Traslado aceptado".into(),
            data: Some(transfer.clone()),
        }),
    )
}

async fn spawn_till_backend() -> (String, Ledger) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let ledger = Ledger::default();
    let app = Router::new()
        .route("/cajero/traslado/enviar", post(send_transfer))
        .route(
            "/cajero/traslado/consultar-pendientes",
            get(pending_transfers),
        )
        .route("/cajero/traslado/aceptar", post(accept_transfer))
        .with_state(ledger.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), ledger)
}

async fn signed_in_till(base_url: &str, user: i64, till: i64, till_name: &str) -> ApiClient {
    let claims = TokenClaims {
        id_usuario: UserId(user),
        correo: format!("cajero{user}@banco.co"),
        nombre: format!("Cajero {user}"),
        rol: "cajero".into(),
        id_usuario_rol: None,
        id_caja: Some(TillId(till)),
        nombre_caja: Some(till_name.into()),
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"till-backend"),
    )
    .expect("token");
    let client = ApiClient::new(base_url).expect("client");
    client.restore_session(&token).await.expect("session");
    client
}

#[tokio::test]
async fn send_list_accept_handshake_acceptance() {
    let (base_url, ledger) = spawn_till_backend().await;
    let till_a = signed_in_till(&base_url, 1, 10, "Caja 1").await;
    let till_b = signed_in_till(&base_url, 2, 20, "Caja 2").await;

    let teller_a = till_a.require_session().await.expect("session a").teller();
    let teller_b = till_b.require_session().await.expect("session b").teller();
    assert_eq!(teller_a, TellerId::from("Caja 1"));

    let desk_a = TransferDesk::new(till_a);
    let desk_b = TransferDesk::new(till_b);

    let receipt = desk_a
        .send(&teller_a, &teller_b, 500_000)
        .await
        .expect("send");
    assert_eq!(receipt.state, TransferState::Sent);
    assert_eq!(
        ledger.audited_tills.lock().expect("lock").as_slice(),
        &[Some(TillId(10))]
    );

    let pending = desk_b.list_pending(&teller_b).await.expect("pending");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, receipt.id);
    assert_eq!(pending[0].amount, 500_000);
    assert_eq!(pending[0].origin_teller, teller_a);
    assert_eq!(pending[0].state, TransferState::Sent);
    assert!(desk_a
        .list_pending(&teller_a)
        .await
        .expect("origin pending")
        .is_empty());

    let accepted = desk_b
        .accept(receipt.id, &teller_b)
        .await
        .expect("accept");
    assert_eq!(accepted.state, TransferState::Accepted);
    assert!(accepted.accepted_at.is_some());

    assert!(desk_b
        .list_pending(&teller_b)
        .await
        .expect("pending after accept")
        .is_empty());

    let again = desk_b
        .accept(receipt.id, &teller_b)
        .await
        .expect_err("second accept");
    match &again {
        ClientError::Http { status, error } => {
            assert_eq!(*status, 409);
            assert_eq!(error.message, "Traslado ya aceptado");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        again.user_message(UserAction::AcceptTransfer),
        "Could not accept the transfer. Please try again."
    );
}

#[tokio::test]
async fn self_transfer_never_reaches_the_backend() {
    let (base_url, ledger) = spawn_till_backend().await;
    let till = signed_in_till(&base_url, 1, 10, "Caja 1").await;
    let teller = till.require_session().await.expect("session").teller();

    let err = TransferDesk::new(till)
        .send(&teller, &teller, 1_000)
        .await
        .expect_err("self transfer");
    assert!(err.is_local());
    assert!(ledger.transfers.lock().expect("lock").is_empty());
}
