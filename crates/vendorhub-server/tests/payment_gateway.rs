use std::time::Duration;

use serde_json::json;
use vendorhub_core::models::PaymentMethod;
use vendorhub_server::payments::{
    GatewayError, GatewayStatus, HttpPaymentGateway, PaymentGateway, PaymentIntent,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn intent() -> PaymentIntent {
    PaymentIntent {
        reference: "PAY-LOCAL-1".into(),
        vendor_id: "v1".into(),
        amount: 2500,
        currency: "KES".into(),
        method: PaymentMethod::MobileMoney,
        phone_number: Some("+254700000000".into()),
        description: "Starter subscription".into(),
    }
}

fn gateway(server: &MockServer) -> HttpPaymentGateway {
    HttpPaymentGateway::new(server.uri(), "test-key", Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn initiate_posts_intent_with_bearer_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payments"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "reference": "PAY-LOCAL-1",
            "amount": 2500,
            "method": "mobile_money",
            "phoneNumber": "+254700000000",
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "reference": "GW-99" })))
        .expect(1)
        .mount(&server)
        .await;

    let receipt = gateway(&server).initiate(&intent()).await.unwrap();
    assert_eq!(receipt.reference, "GW-99");
}

#[tokio::test]
async fn initiate_surfaces_rejections() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payments"))
        .respond_with(ResponseTemplate::new(422).set_body_string("invalid phone"))
        .mount(&server)
        .await;

    match gateway(&server).initiate(&intent()).await {
        Err(GatewayError::Rejected { status, body }) => {
            assert_eq!(status, 422);
            assert_eq!(body, "invalid phone");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn initiate_requires_a_reference() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "reference": " " })))
        .mount(&server)
        .await;

    let err = gateway(&server).initiate(&intent()).await.unwrap_err();
    assert!(matches!(err, GatewayError::InvalidResponse(_)));
}

#[tokio::test]
async fn status_maps_gateway_states() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/payments/GW-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "processing" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/payments/GW-2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": "completed", "transactionId": "TX-2" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/payments/GW-3"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": "declined", "message": "Card expired" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/payments/GW-4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "teleported" })))
        .mount(&server)
        .await;

    let gw = gateway(&server);
    assert_eq!(gw.status("GW-1").await.unwrap(), GatewayStatus::Pending);
    assert_eq!(
        gw.status("GW-2").await.unwrap(),
        GatewayStatus::Successful {
            transaction_id: Some("TX-2".into())
        }
    );
    assert_eq!(
        gw.status("GW-3").await.unwrap(),
        GatewayStatus::Failed {
            message: "Card expired".into()
        }
    );
    assert!(matches!(
        gw.status("GW-4").await,
        Err(GatewayError::InvalidResponse(_))
    ));
    assert!(matches!(
        gw.status("GW-404").await,
        Err(GatewayError::Rejected { status: 404, .. })
    ));
}
