use reqwest::StatusCode;
use serde_json::json;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Build the app (same router as prod), but bind to an ephemeral port.
        let app = depot_api::app::build_app().await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn post_json(
    client: &reqwest::Client,
    url: String,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let res = client.post(url).json(&body).send().await.unwrap();
    let status = res.status();
    let body: serde_json::Value = res.json().await.unwrap();
    (status, body)
}

/// Directories are updated by a background subscriber, so poll until the
/// freshly created entity is visible before referencing it.
async fn wait_until_listed(
    client: &reqwest::Client,
    url: String,
    array_key: &str,
    id_key: &str,
    id: &str,
) {
    for _ in 0..100 {
        let res = client.get(&url).send().await.unwrap();
        if res.status() == StatusCode::OK {
            let body: serde_json::Value = res.json().await.unwrap();
            let listed = body[array_key]
                .as_array()
                .map(|items| items.iter().any(|item| item[id_key] == id))
                .unwrap_or(false);
            if listed {
                return;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("{id} did not appear under {array_key} within timeout");
}

async fn create_warehouse(client: &reqwest::Client, base_url: &str, name: &str) -> String {
    let (status, body) = post_json(
        client,
        format!("{base_url}/v1/warehouses"),
        json!({ "name": name, "capacity": 1000 }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["warehouse_id"].as_str().unwrap().to_string();
    wait_until_listed(
        client,
        format!("{base_url}/v1/warehouses"),
        "warehouses",
        "warehouse_id",
        &id,
    )
    .await;
    id
}

async fn create_supplier(client: &reqwest::Client, base_url: &str, name: &str) -> String {
    let (status, body) = post_json(
        client,
        format!("{base_url}/v1/suppliers"),
        json!({ "name": name }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["supplier_id"].as_str().unwrap().to_string();
    wait_until_listed(
        client,
        format!("{base_url}/v1/suppliers"),
        "suppliers",
        "supplier_id",
        &id,
    )
    .await;
    id
}

async fn create_product(client: &reqwest::Client, base_url: &str, title: &str) -> String {
    let (status, body) = post_json(
        client,
        format!("{base_url}/v1/products"),
        json!({ "title": title, "price": 1500 }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["product_id"].as_str().unwrap().to_string();
    wait_until_listed(
        client,
        format!("{base_url}/v1/products"),
        "products",
        "product_id",
        &id,
    )
    .await;
    id
}

/// Current quantity of a product in a warehouse as reported by the inventory
/// listing; `None` when the listing omits the pair.
async fn listed_quantity(
    client: &reqwest::Client,
    base_url: &str,
    warehouse_id: &str,
    product_id: &str,
) -> Option<i64> {
    let res = client
        .get(format!(
            "{base_url}/v1/inventory?warehouse_id={warehouse_id}"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();

    body["inventory"]
        .as_array()
        .unwrap()
        .iter()
        .find(|item| item["product_id"] == product_id)
        .map(|item| item["quantity"].as_i64().unwrap())
}

/// The API is eventually consistent (command path vs. projection update), so
/// poll briefly until the listing reports the expected quantity.
async fn expect_quantity_eventually(
    client: &reqwest::Client,
    base_url: &str,
    warehouse_id: &str,
    product_id: &str,
    expected: Option<i64>,
) {
    for _ in 0..100 {
        if listed_quantity(client, base_url, warehouse_id, product_id).await == expected {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("inventory listing did not reach quantity {expected:?} within timeout");
}

#[tokio::test(flavor = "multi_thread")]
async fn health_endpoint_is_public() {
    let srv = TestServer::spawn().await;

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread")]
async fn import_export_check_lifecycle() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let warehouse = create_warehouse(&client, &srv.base_url, "North depot").await;
    let supplier = create_supplier(&client, &srv.base_url, "Acme Wholesale").await;
    let product = create_product(&client, &srv.base_url, "USB-C cable").await;

    // Import 5 units at price 100: total_amount must be 500.
    let (status, body) = post_json(
        &client,
        format!("{}/v1/inventory/imports", srv.base_url),
        json!({
            "warehouse_id": warehouse,
            "supplier_id": supplier,
            "products": [{ "product_id": product, "quantity": 5, "unit_price": 100 }],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Import recorded successfully");
    assert!(body["import_id"].is_string());

    expect_quantity_eventually(&client, &srv.base_url, &warehouse, &product, Some(5)).await;

    let res = client
        .get(format!("{}/v1/inventory/imports", srv.base_url))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["total"], 1);
    assert_eq!(body["imports"][0]["total_amount"], 500);
    assert_eq!(body["imports"][0]["supplier_id"], supplier);

    // Export 3 of the 5.
    let (status, _) = post_json(
        &client,
        format!("{}/v1/inventory/exports", srv.base_url),
        json!({
            "warehouse_id": warehouse,
            "products": [{ "product_id": product, "quantity": 3 }],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    expect_quantity_eventually(&client, &srv.base_url, &warehouse, &product, Some(2)).await;

    // Counting exactly 2 raises no discrepancies.
    let (status, body) = post_json(
        &client,
        format!("{}/v1/inventory/checks", srv.base_url),
        json!({
            "warehouse_id": warehouse,
            "products": [{ "product_id": product, "actual_quantity": 2 }],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["discrepancies"].as_array().unwrap().len(), 0);

    // Counting 10 reports difference +8 and snaps the level to 10.
    let (status, body) = post_json(
        &client,
        format!("{}/v1/inventory/checks", srv.base_url),
        json!({
            "warehouse_id": warehouse,
            "products": [{ "product_id": product, "actual_quantity": 10 }],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let discrepancies = body["discrepancies"].as_array().unwrap();
    assert_eq!(discrepancies.len(), 1);
    assert_eq!(discrepancies[0]["expected_quantity"], 2);
    assert_eq!(discrepancies[0]["difference"], 8);

    expect_quantity_eventually(&client, &srv.base_url, &warehouse, &product, Some(10)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_export_identifies_the_product_and_changes_nothing() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let warehouse = create_warehouse(&client, &srv.base_url, "Depot").await;
    let supplier = create_supplier(&client, &srv.base_url, "Supplier").await;
    let product = create_product(&client, &srv.base_url, "Charger").await;

    post_json(
        &client,
        format!("{}/v1/inventory/imports", srv.base_url),
        json!({
            "warehouse_id": warehouse,
            "supplier_id": supplier,
            "products": [{ "product_id": product, "quantity": 2, "unit_price": 50 }],
        }),
    )
    .await;
    expect_quantity_eventually(&client, &srv.base_url, &warehouse, &product, Some(2)).await;

    let (status, body) = post_json(
        &client,
        format!("{}/v1/inventory/exports", srv.base_url),
        json!({
            "warehouse_id": warehouse,
            "products": [{ "product_id": product, "quantity": 5 }],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "insufficient_stock");
    assert!(body["message"].as_str().unwrap().contains(&product));

    // Projection untouched, nothing logged.
    assert_eq!(
        listed_quantity(&client, &srv.base_url, &warehouse, &product).await,
        Some(2)
    );
    let res = client
        .get(format!("{}/v1/inventory/exports", srv.base_url))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["total"], 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn internal_transfer_moves_the_full_quantity() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let warehouse_a = create_warehouse(&client, &srv.base_url, "A").await;
    let warehouse_b = create_warehouse(&client, &srv.base_url, "B").await;
    let supplier = create_supplier(&client, &srv.base_url, "Supplier").await;
    let product = create_product(&client, &srv.base_url, "Router").await;

    post_json(
        &client,
        format!("{}/v1/inventory/imports", srv.base_url),
        json!({
            "warehouse_id": warehouse_a,
            "supplier_id": supplier,
            "products": [{ "product_id": product, "quantity": 10, "unit_price": 1 }],
        }),
    )
    .await;
    expect_quantity_eventually(&client, &srv.base_url, &warehouse_a, &product, Some(10)).await;

    let (status, _) = post_json(
        &client,
        format!("{}/v1/inventory/transfers", srv.base_url),
        json!({
            "type": "internal",
            "from_warehouse_id": warehouse_a,
            "to_warehouse_id": warehouse_b,
            "products": [{ "product_id": product, "quantity": 10 }],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    expect_quantity_eventually(&client, &srv.base_url, &warehouse_b, &product, Some(10)).await;
    // The drained source level is omitted from the listing.
    expect_quantity_eventually(&client, &srv.base_url, &warehouse_a, &product, None).await;

    // A transfer of a warehouse onto itself is rejected up front.
    let (status, body) = post_json(
        &client,
        format!("{}/v1/inventory/transfers", srv.base_url),
        json!({
            "type": "internal",
            "from_warehouse_id": warehouse_b,
            "to_warehouse_id": warehouse_b,
            "products": [{ "product_id": product, "quantity": 1 }],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test(flavor = "multi_thread")]
async fn initial_inventory_reconstructs_past_levels() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let warehouse = create_warehouse(&client, &srv.base_url, "Depot").await;
    let supplier = create_supplier(&client, &srv.base_url, "Supplier").await;
    let product = create_product(&client, &srv.base_url, "Switch").await;

    post_json(
        &client,
        format!("{}/v1/inventory/imports", srv.base_url),
        json!({
            "warehouse_id": warehouse,
            "supplier_id": supplier,
            "products": [{ "product_id": product, "quantity": 7, "unit_price": 10 }],
        }),
    )
    .await;
    expect_quantity_eventually(&client, &srv.base_url, &warehouse, &product, Some(7)).await;

    let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
    let res = client
        .get(format!(
            "{}/v1/inventory/initial?warehouse_id={}&date={}",
            srv.base_url, warehouse, today
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    let levels = body.as_array().unwrap();
    assert_eq!(levels.len(), 1);
    assert_eq!(levels[0]["product_id"], product);
    assert_eq!(levels[0]["quantity"], 7);
    assert_eq!(levels[0]["name"], "Switch");

    // Before any movement existed, the reconstruction is empty.
    let yesterday = (chrono::Utc::now() - chrono::Duration::days(1))
        .format("%Y-%m-%d")
        .to_string();
    let res = client
        .get(format!(
            "{}/v1/inventory/initial?warehouse_id={}&date={}",
            srv.base_url, warehouse, yesterday
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body.as_array().unwrap().len(), 0);

    // The date parameter is mandatory and validated.
    let res = client
        .get(format!("{}/v1/inventory/initial", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .get(format!(
            "{}/v1/inventory/initial?date=2025-13-99",
            srv.base_url
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread")]
async fn list_endpoints_validate_query_parameters() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/v1/inventory?limit=0", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .get(format!("{}/v1/inventory?limit=101", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .get(format!("{}/v1/inventory/imports?page=zero", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .get(format!(
            "{}/v1/inventory/imports?start_date=2025-06-09&end_date=2025-06-01",
            srv.base_url
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Start date must be before end date.");

    // Unknown references are 404s before anything is recorded.
    let (status, _) = post_json(
        &client,
        format!("{}/v1/inventory/imports", srv.base_url),
        json!({
            "warehouse_id": uuid::Uuid::now_v7().to_string(),
            "supplier_id": uuid::Uuid::now_v7().to_string(),
            "products": [],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread")]
async fn fund_accounts_and_vouchers_flow() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, body) = post_json(
        &client,
        format!("{}/v1/funds/accounts", srv.base_url),
        json!({ "name": "Main till", "type": "cash", "initial_balance": 100 }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let account = body["account_id"].as_str().unwrap().to_string();
    wait_until_listed(
        &client,
        format!("{}/v1/funds/accounts", srv.base_url),
        "accounts",
        "account_id",
        &account,
    )
    .await;

    let (status, _) = post_json(
        &client,
        format!("{}/v1/funds/vouchers", srv.base_url),
        json!({ "account_id": account, "type": "receipt", "amount": 50 }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // A payment beyond the balance is refused.
    let (status, body) = post_json(
        &client,
        format!("{}/v1/funds/vouchers", srv.base_url),
        json!({ "account_id": account, "type": "payment", "amount": 500 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "insufficient_funds");

    // Balance as of today reflects the opening balance plus the receipt.
    let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
    for _ in 0..100 {
        let res = client
            .get(format!(
                "{}/v1/funds/initial-balance?account_id={}&date={}",
                srv.base_url, account, today
            ))
            .send()
            .await
            .unwrap();
        if res.status() == StatusCode::OK {
            let body: serde_json::Value = res.json().await.unwrap();
            if body["balance"] == 150 {
                return;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("fund balance did not reach 150 within timeout");
}
