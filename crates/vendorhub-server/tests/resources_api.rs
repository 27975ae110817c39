mod common;

use reqwest::StatusCode;
use serde_json::{Value, json};
use vendorhub_core::time::{format_date, today};

use common::{TestServer, json_of};

async fn add_staff(server: &TestServer, token: &str, name: &str, role: &str) -> Value {
    let (status, body) = json_of(
        server
            .post(
                "/api/staff",
                token,
                json!({
                    "name": name,
                    "phone": "+254711000000",
                    "role": role,
                    "licenseNumber": format!("DL-{name}"),
                }),
            )
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["staff"].clone()
}

#[tokio::test]
async fn staff_pagination_and_csv_export() {
    let server = TestServer::start().await;
    let (_, token) = server.vendor("Coast Lines", "bus").await;
    for i in 0..12 {
        let role = if i % 3 == 0 { "driver" } else { "conductor" };
        add_staff(&server, &token, &format!("Member {i:02}"), role).await;
    }

    let (status, body) = json_of(server.get("/api/staff?page=3&limit=5", &token).send().await.unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"], json!({ "page": 3, "limit": 5, "total": 12, "pages": 3 }));
    assert_eq!(body["staff"].as_array().unwrap().len(), 2);

    // Defaults apply and junk values fall back.
    let (_, body) = json_of(server.get("/api/staff?page=abc&limit=0", &token).send().await.unwrap()).await;
    assert_eq!(body["pagination"]["page"], 1);
    assert_eq!(body["pagination"]["limit"], 1);
    let (_, body) = json_of(server.get("/api/staff", &token).send().await.unwrap()).await;
    assert_eq!(body["pagination"]["limit"], 10);
    assert_eq!(body["pagination"]["pages"], 2);
    assert_eq!(body["staff"][0]["name"], "Member 00");

    let (status, body) = json_of(
        server
            .post(
                "/api/staff",
                &token,
                json!({ "name": "No Licence", "phone": "+254711000001", "role": "driver" }),
            )
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"], json!(["licenseNumber"]));

    let (_, body) = json_of(server.get("/api/staff?role=driver", &token).send().await.unwrap()).await;
    assert_eq!(body["pagination"]["total"], 4);
    let (_, body) = json_of(server.get("/api/staff?search=member%2011", &token).send().await.unwrap()).await;
    assert_eq!(body["pagination"]["total"], 1);

    let resp = server.get("/api/staff/export", &token).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()["content-type"].to_str().unwrap().starts_with("text/csv"));
    let disposition = resp.headers()["content-disposition"].to_str().unwrap().to_string();
    assert!(disposition.contains(&format!("staff-{}.csv", format_date(today()))));
    let csv = resp.text().await.unwrap();
    assert_eq!(csv.lines().count(), 13);
    assert!(csv.lines().next().unwrap().contains("Name"));

    server.stop().await;
}

#[tokio::test]
async fn empty_export_is_header_only() {
    let server = TestServer::start().await;
    let (_, token) = server.vendor("Coast Lines", "bus").await;

    let csv = server
        .get("/api/dispatches/export", &token)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(csv.lines().count(), 1);

    let (_, body) = json_of(server.get("/api/dispatches", &token).send().await.unwrap()).await;
    assert_eq!(body["pagination"]["total"], 0);
    assert_eq!(body["pagination"]["pages"], 0);

    server.stop().await;
}

#[tokio::test]
async fn bus_registration_is_unique_per_tenant() {
    let server = TestServer::start().await;
    let (_, token) = server.vendor("Coast Lines", "bus").await;
    let (_, other) = server.vendor("Rival Buses", "bus").await;
    let bus = json!({ "registrationNumber": "KBX 123A", "model": "Isuzu", "capacity": 33 });

    let (status, body) = json_of(server.post("/api/fleet", &token, bus.clone()).send().await.unwrap()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["bus"]["status"], "active");

    let dup = json!({ "registrationNumber": " kbx 123a ", "model": "Isuzu", "capacity": 33 });
    let resp = server.post("/api/fleet", &token, dup.clone()).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let resp = server.post("/api/fleet", &other, dup).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let (status, body) = json_of(
        server
            .post("/api/fleet", &token, json!({ "model": "Isuzu" }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"], json!(["registrationNumber", "capacity"]));

    server.stop().await;
}

#[tokio::test]
async fn compliance_status_is_derived_from_expiry() {
    let server = TestServer::start().await;
    let (_, token) = server.vendor("Coast Lines", "bus").await;
    let soon = format_date(today() + time::Duration::days(10));

    for (title, expires) in [
        ("Road licence", Some("2020-01-31".to_string())),
        ("Fleet insurance", Some(soon)),
        ("Operating permit", Some("2099-12-31".to_string())),
        ("Fire certificate", None),
    ] {
        let mut record = json!({
            "documentType": "license",
            "title": title,
            "issuedAt": "2019-01-01",
        });
        if let Some(expires) = expires {
            record["expiresAt"] = json!(expires);
        }
        let (status, body) = json_of(server.post("/api/compliance", &token, record).send().await.unwrap()).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }

    let (_, body) = json_of(server.get("/api/compliance", &token).send().await.unwrap()).await;
    assert_eq!(
        body["summary"],
        json!({ "total": 4, "valid": 2, "expiringSoon": 1, "expired": 1 })
    );
    assert_eq!(body["records"][0]["title"], "Road licence");
    assert_eq!(body["records"][0]["status"], "expired");

    let (_, body) = json_of(server.get("/api/compliance?status=expiring_soon", &token).send().await.unwrap()).await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["records"][0]["title"], "Fleet insurance");

    let resp = server
        .post(
            "/api/compliance",
            &token,
            json!({ "documentType": "passport", "title": "x", "issuedAt": "2019-01-01" }),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    server.stop().await;
}

#[tokio::test]
async fn compliance_list_filters_by_issue_date() {
    let server = TestServer::start().await;
    let (_, token) = server.vendor("Coast Lines", "bus").await;

    for (title, issued) in [
        ("Road licence", "2026-01-15"),
        ("Fleet insurance", "2026-02-10"),
        ("Operating permit", "2026-03-05"),
    ] {
        let record = json!({
            "documentType": "license",
            "title": title,
            "issuedAt": issued,
            "expiresAt": "2099-12-31",
        });
        let (status, body) = json_of(server.post("/api/compliance", &token, record).send().await.unwrap()).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }

    let (status, body) = json_of(
        server
            .get("/api/compliance?from=2026-02-01&to=2026-02-28", &token)
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["records"][0]["title"], "Fleet insurance");
    assert_eq!(body["summary"]["total"], 1);

    let (_, body) = json_of(server.get("/api/compliance?from=2026-02-10", &token).send().await.unwrap()).await;
    assert_eq!(body["pagination"]["total"], 2);

    let resp = server
        .get("/api/compliance?from=2026-03-01&to=2026-02-01", &token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    server.stop().await;
}

#[tokio::test]
async fn prescription_workflow() {
    let server = TestServer::start().await;
    let (vendor_id, owner) = server.vendor("City Pharmacy", "pharmacy").await;
    let clerk = server
        .vendor_user(&vendor_id, "counter@city.test", "staff")
        .await;
    let (_, bus) = server.vendor("Coast Lines", "bus").await;

    let order = json!({
        "patientName": "Wanjiru",
        "doctorName": "Dr. Otieno",
        "medications": [{ "name": "Amoxicillin", "dosage": "500mg", "quantity": 21 }],
    });
    let resp = server.post("/api/prescriptions", &bus, order.clone()).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let (status, body) = json_of(
        server
            .post(
                "/api/prescriptions",
                &clerk,
                json!({ "patientName": "Wanjiru", "doctorName": "Dr. Otieno", "medications": [] }),
            )
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"], json!(["medications"]));

    let (status, body) = json_of(server.post("/api/prescriptions", &clerk, order).send().await.unwrap()).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["prescription"]["status"], "pending");
    let id = body["prescription"]["id"].as_str().unwrap().to_string();
    let status_path = format!("/api/prescriptions/{id}/status");

    let resp = server
        .patch(&status_path, &clerk, json!({ "status": "dispensed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    for step in ["verified", "dispensed"] {
        let resp = server
            .patch(&status_path, &clerk, json!({ "status": step }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let resp = server
        .put(&format!("/api/prescriptions/{id}"), &owner, json!({ "notes": "late edit" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let resp = server
        .delete(&format!("/api/prescriptions/{id}"), &clerk)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let (_, body) = json_of(server.get("/api/prescriptions?status=dispensed", &owner).send().await.unwrap()).await;
    assert_eq!(body["pagination"]["total"], 1);

    server.stop().await;
}

#[tokio::test]
async fn settings_default_then_persist() {
    let server = TestServer::start().await;
    let (vendor_id, owner) = server.vendor("Lakeside Hotel", "hotel").await;
    let clerk = server
        .vendor_user(&vendor_id, "desk@lakeside.test", "staff")
        .await;

    let (status, body) = json_of(server.get("/api/settings", &owner).send().await.unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["settings"]["id"], vendor_id.as_str());

    let resp = server
        .put("/api/settings", &clerk, json!({ "timezone": "Africa/Nairobi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let (status, body) = json_of(
        server
            .put("/api/settings", &owner, json!({ "timezone": "Africa/Nairobi" }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (_, body) = json_of(server.get("/api/settings", &clerk).send().await.unwrap()).await;
    assert_eq!(body["settings"]["timezone"], "Africa/Nairobi");

    server.stop().await;
}
