//! Test helpers: build AppState and router on the in-memory backends.
//!
//! Run from workspace root: `cargo test -p fleetport-api`.

#![allow(dead_code)]

use async_trait::async_trait;
use axum_test::TestServer;
use chrono::NaiveDate;
use fleetport_api::setup::routes;
use fleetport_api::setup::services::{build_state, Backends};
use fleetport_api::AppState;
use fleetport_core::models::{calendar_age, NewVehicle};
use fleetport_core::Config;
use fleetport_db::{MemoryVehicleStore, VehicleStore};
use fleetport_infra::{DeliveryStatus, Notifier, NotifyError};
use fleetport_worker::MemoryJobTransport;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

pub const TEST_EMAIL: &str = "ops@example.com";

/// (email, message, file name)
pub type SentNotification = (String, String, Option<String>);

/// Notifier double that records every message.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        email: &str,
        message: &str,
        file_name: Option<&str>,
    ) -> Result<DeliveryStatus, NotifyError> {
        self.sent.lock().unwrap().push((
            email.to_string(),
            message.to_string(),
            file_name.map(str::to_string),
        ));
        Ok(DeliveryStatus::Delivered)
    }
}

/// Test application: server plus handles on the doubles behind it.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryVehicleStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub async fn seed_vehicle(&self, vin: &str, model: &str, manufactured: NaiveDate) {
        let today = chrono::Utc::now().date_naive();
        self.store
            .insert(&NewVehicle {
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                email: "ada@example.com".into(),
                car_make: "Toyota".into(),
                car_model: model.into(),
                vin: vin.into(),
                manufactured_date: manufactured,
                age_of_vehicle: calendar_age(manufactured, today),
            })
            .await
            .expect("Failed to seed vehicle");
    }

    /// Polls the job endpoint until the job reaches a terminal status.
    pub async fn wait_for_job(&self, job_id: &str) -> serde_json::Value {
        for _ in 0..250 {
            let response = self.server.get(&format!("/api/v1/jobs/{}", job_id)).await;
            assert_eq!(response.status_code(), 200);
            let job: serde_json::Value = response.json();
            match job["status"].as_str() {
                Some("completed") | Some("failed") | Some("dropped") => return job,
                _ => sleep(Duration::from_millis(20)).await,
            }
        }
        panic!("Job {} did not finish in time", job_id);
    }
}

/// Setup test app with the in-memory store and transport and temporary
/// transfer directories.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}).await
}

/// Same as [`setup_test_app`], with a chance to adjust the config first.
pub async fn setup_test_app_with(adjust: impl FnOnce(&mut Config)) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

    let mut config = Config {
        upload_dir: temp_dir.path().join("uploads"),
        export_dir: temp_dir.path().join("export"),
        job_poll_interval_ms: 20,
        retention_enabled: false,
        ..Config::default()
    };
    adjust(&mut config);

    let store = Arc::new(MemoryVehicleStore::new());
    let notifier = Arc::new(RecordingNotifier::default());

    let state = build_state(
        &config,
        Backends {
            db_pool: None,
            store: store.clone(),
            transport: Arc::new(MemoryJobTransport::new()),
            notifier: notifier.clone(),
        },
    )
    .await
    .expect("Failed to build application state");

    let app = routes::setup_routes(&config, state.clone());
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        state,
        store,
        notifier,
        _temp_dir: temp_dir,
    }
}
