use httpmock::prelude::*;
use portfolio_sync::utils::error::ErrorCategory;
use portfolio_sync::{
    EnvCredentialSource, JobConfig, PortfolioExtractor, PortfolioMetrics, RunState,
    SessionClient, SheetSync, Stage, SyncJob,
};
use std::sync::Arc;

const INVESTOR_PAGE: &str = include_str!("fixtures/investor_page.html");
const SERVICE_ACCOUNT_KEY: &str = include_str!("fixtures/service_account_key.pem");

/// Stores the three secrets a run needs under a per-test variable prefix.
fn seed_secrets(prefix: &str, token_uri: &str) -> EnvCredentialSource {
    let source = EnvCredentialSource::with_prefix(prefix);
    let key = serde_json::json!({
        "type": "service_account",
        "private_key_id": "kid-1",
        "private_key": SERVICE_ACCOUNT_KEY,
        "client_email": "sheets-writer@investbux-script.iam.gserviceaccount.com",
        "token_uri": token_uri,
    });
    std::env::set_var(source.variable_name("investbux-enc-userid"), "ENCUSER123");
    std::env::set_var(source.variable_name("investbux-enc-pass"), "ENCPASS456");
    std::env::set_var(
        source.variable_name("credentials-google-sheet"),
        key.to_string(),
    );
    source
}

fn config_for(server: &MockServer) -> JobConfig {
    JobConfig::from_toml_str(&format!(
        r#"
[portal]
base_url = "{base}"

[secrets]
backend = "env"

[sheet]
spreadsheet_id = "sheet-123"
mf_cost_cell = "Sheet1!B4"
total_value_cell = "Sheet1!B5"
api_base_url = "{base}"
"#,
        base = server.base_url()
    ))
    .unwrap()
}

fn build_job(
    config: &JobConfig,
    secrets: EnvCredentialSource,
    dry_run: bool,
) -> SyncJob<
    Arc<EnvCredentialSource>,
    SessionClient,
    PortfolioExtractor,
    SheetSync<Arc<EnvCredentialSource>>,
> {
    let secrets = Arc::new(secrets);
    let portal = SessionClient::new(
        config.portal.base_url.clone(),
        config.portal.user_agent.clone(),
    );
    let writer = SheetSync::new(secrets.clone(), config.sheet.spreadsheet_id.clone())
        .with_credentials_secret(config.secrets.sheet_credentials_secret.clone())
        .with_api_base_url(config.sheet.api_base_url.clone());
    SyncJob::new(
        secrets,
        portal,
        PortfolioExtractor::new(config.extract.offset),
        writer,
        config.job_settings(dry_run).unwrap(),
    )
}

fn mock_sheet_update<'a>(server: &'a MockServer, cell: &str, value: i64) -> httpmock::Mock<'a> {
    let path = format!("/v4/spreadsheets/sheet-123/values/{}", cell);
    let body = serde_json::json!({
        "range": cell,
        "majorDimension": "ROWS",
        "values": [[value]]
    });
    server.mock(|when, then| {
        when.method(PUT)
            .path(path)
            .query_param("valueInputOption", "USER_ENTERED")
            .header("Authorization", "Bearer ya29.e2e")
            .json_body(body);
        then.status(200).json_body(serde_json::json!({
            "spreadsheetId": "sheet-123",
            "updatedRange": cell,
            "updatedCells": 1
        }));
    })
}

#[tokio::test]
async fn test_end_to_end_sync_writes_offset_values() {
    let server = MockServer::start();
    let secrets = seed_secrets("E2E_SUCCESS_", &server.url("/token"));

    let login_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/validateLoginNew")
            .header("X-Requested-With", "XMLHttpRequest")
            .body_contains("enc_userid=ENCUSER123")
            .body_contains("enc_pass=ENCPASS456");
        then.status(200)
            .header("Set-Cookie", "JSESSIONID=abc; Path=/; HttpOnly")
            .json_body(serde_json::json!({"status": 200, "status_msg": "Success"}));
    });
    let investor_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/investor")
            .header("Cookie", "JSESSIONID=abc");
        then.status(200)
            .header("Content-Type", "text/html; charset=utf-8")
            .body(INVESTOR_PAGE);
    });
    let token_mock = server.mock(|when, then| {
        when.method(POST).path("/token").body_contains("assertion=");
        then.status(200).json_body(serde_json::json!({
            "access_token": "ya29.e2e",
            "expires_in": 3599,
            "token_type": "Bearer"
        }));
    });
    let mf_cost_mock = mock_sheet_update(&server, "Sheet1!B4", 7000);
    let total_mock = mock_sheet_update(&server, "Sheet1!B5", 15000);

    let config = config_for(&server);
    let report = build_job(&config, secrets, false).run().await;

    assert_eq!(report.state(), RunState::Done);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(
        report.metrics,
        Some(PortfolioMetrics {
            total_portfolio_value: 15000,
            mf_current_cost: 7000,
        })
    );
    login_mock.assert();
    investor_mock.assert();
    token_mock.assert_hits(2);
    mf_cost_mock.assert();
    total_mock.assert();
}

#[tokio::test]
async fn test_rejected_login_halts_before_fetch_and_sync() {
    let server = MockServer::start();
    let secrets = seed_secrets("E2E_LOGIN_401_", &server.url("/token"));

    let login_mock = server.mock(|when, then| {
        when.method(POST).path("/validateLoginNew");
        then.status(401).body("Unauthorized");
    });
    let investor_mock = server.mock(|when, then| {
        when.method(GET).path("/investor");
        then.status(200).body(INVESTOR_PAGE);
    });
    let sheet_mock = server.mock(|when, then| {
        when.method(PUT);
        then.status(200);
    });

    let config = config_for(&server);
    let report = build_job(&config, secrets, false).run().await;

    assert_eq!(report.state(), RunState::Failed(Stage::LoggedIn));
    assert_eq!(report.reached(), Stage::CredentialsResolved);
    assert_eq!(
        report.first_error().map(|e| e.category()),
        Some(ErrorCategory::Transport)
    );
    login_mock.assert();
    investor_mock.assert_hits(0);
    sheet_mock.assert_hits(0);
}

#[tokio::test]
async fn test_portal_status_rejection_is_authentication_failure() {
    let server = MockServer::start();
    let secrets = seed_secrets("E2E_LOGIN_STATUS_", &server.url("/token"));

    server.mock(|when, then| {
        when.method(POST).path("/validateLoginNew");
        then.status(200)
            .json_body(serde_json::json!({"status": 401, "status_msg": "bad creds"}));
    });
    let investor_mock = server.mock(|when, then| {
        when.method(GET).path("/investor");
        then.status(200).body(INVESTOR_PAGE);
    });

    let config = config_for(&server);
    let report = build_job(&config, secrets, false).run().await;

    assert_eq!(report.state(), RunState::Failed(Stage::LoggedIn));
    assert_eq!(report.exit_code(), 2);
    assert!(report.metrics.is_none());
    let message = report.first_error().map(|e| e.to_string()).unwrap_or_default();
    assert!(message.contains("bad creds"));
    investor_mock.assert_hits(0);
}

#[tokio::test]
async fn test_dry_run_reads_portal_without_touching_sheet() {
    let server = MockServer::start();
    let secrets = seed_secrets("E2E_DRY_RUN_", &server.url("/token"));

    server.mock(|when, then| {
        when.method(POST).path("/validateLoginNew");
        then.status(200)
            .header("Set-Cookie", "JSESSIONID=dry; Path=/")
            .json_body(serde_json::json!({"status": 200}));
    });
    server.mock(|when, then| {
        when.method(GET).path("/investor");
        then.status(200).body(INVESTOR_PAGE);
    });
    let token_mock = server.mock(|when, then| {
        when.method(POST).path("/token");
        then.status(200).json_body(serde_json::json!({"access_token": "ya29.e2e"}));
    });
    let sheet_mock = server.mock(|when, then| {
        when.method(PUT);
        then.status(200);
    });

    let config = config_for(&server);
    let report = build_job(&config, secrets, true).run().await;

    assert_eq!(report.state(), RunState::Done);
    assert_eq!(report.metrics.map(|m| m.total_portfolio_value), Some(15000));
    token_mock.assert_hits(0);
    sheet_mock.assert_hits(0);
}

#[tokio::test]
async fn test_sheet_rejection_of_first_cell_still_writes_second() {
    let server = MockServer::start();
    let secrets = seed_secrets("E2E_PARTIAL_", &server.url("/token"));

    server.mock(|when, then| {
        when.method(POST).path("/validateLoginNew");
        then.status(200)
            .header("Set-Cookie", "JSESSIONID=abc; Path=/")
            .json_body(serde_json::json!({"status": 200}));
    });
    server.mock(|when, then| {
        when.method(GET).path("/investor");
        then.status(200).body(INVESTOR_PAGE);
    });
    server.mock(|when, then| {
        when.method(POST).path("/token");
        then.status(200).json_body(serde_json::json!({"access_token": "ya29.e2e"}));
    });
    server.mock(|when, then| {
        when.method(PUT)
            .path("/v4/spreadsheets/sheet-123/values/Sheet1!B4");
        then.status(403).json_body(serde_json::json!({
            "error": {"code": 403, "message": "The caller does not have permission", "status": "PERMISSION_DENIED"}
        }));
    });
    let total_mock = mock_sheet_update(&server, "Sheet1!B5", 15000);

    let config = config_for(&server);
    let report = build_job(&config, secrets, false).run().await;

    assert_eq!(report.state(), RunState::Failed(Stage::Cell1Updated));
    assert!(report.has_completed(Stage::Cell2Updated));
    assert_eq!(report.exit_code(), 5);
    let message = report.first_error().map(|e| e.to_string()).unwrap_or_default();
    assert!(message.contains("Sheet1!B4"));
    assert!(message.contains("permission"));
    total_mock.assert();
}
