mod helpers;

use axum_test::multipart::{MultipartForm, Part};
use bytes::Bytes;
use chrono::NaiveDate;
use helpers::{setup_test_app, setup_test_app_with, TEST_EMAIL};
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};
use serde_json::json;

const CARS_CSV: &str = "first_name,last_name,email,car_make,car_model,vin,manufactured_date\n\
Ada,Lovelace,ada@example.com,Toyota,Corolla,A1,2015-03-01\n\
Alan,Turing,alan@example.com,Honda,Civic,A2,2018-07-15\n\
Ada,Lovelace,ada@example.com,Toyota,Corolla,A1,2015-03-01\n";

fn upload_form(file_name: &str, contents: &'static str, email: Option<&str>) -> MultipartForm {
    let part = Part::bytes(Bytes::from_static(contents.as_bytes()))
        .file_name(file_name.to_string())
        .mime_type("text/csv");
    let form = MultipartForm::new().add_part("file", part);
    match email {
        Some(email) => form.add_text("email", email.to_string()),
        None => form,
    }
}

#[tokio::test]
async fn import_upload_queues_job_and_skips_duplicates() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/api/v1/vehicles/import")
        .multipart(upload_form("cars.csv", CARS_CSV, Some(TEST_EMAIL)))
        .await;

    assert_eq!(response.status_code(), 202);
    let body: serde_json::Value = response.json();
    let saved = body["saved_file_path"].as_str().unwrap();
    assert!(saved.ends_with("-cars.csv"));
    assert!(std::path::Path::new(saved).exists());

    let job = app.wait_for_job(body["job_id"].as_str().unwrap()).await;
    assert_eq!(job["status"], "completed");
    assert_eq!(job["result"]["imported"], 2);
    assert_eq!(job["result"]["skipped"], 1);
    assert_eq!(app.store.len(), 2);

    let sent = app.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, TEST_EMAIL);
    assert_eq!(
        sent[0].1,
        "Import Successful! 2 new vehicles added, 1 duplicates skipped."
    );
}

fn fleet_workbook() -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let header = ["First Name", "Last Name", "Email", "Car Make", "Car Model", "VIN", "Manufactured Date"];
    for (col, title) in header.iter().enumerate() {
        sheet.write_string(0, col as u16, *title).unwrap();
    }
    for (col, value) in ["Grace", "Hopper", "grace@example.com", "Honda", "Civic", "X1"]
        .iter()
        .enumerate()
    {
        sheet.write_string(1, col as u16, *value).unwrap();
    }
    let built = ExcelDateTime::from_ymd(2012, 9, 9).unwrap();
    sheet
        .write_datetime_with_format(1, 6, &built, &Format::new().set_num_format("yyyy-mm-dd"))
        .unwrap();
    workbook.save_to_buffer().unwrap()
}

#[tokio::test]
async fn import_accepts_excel_workbook() {
    let app = setup_test_app().await;

    let part = Part::bytes(Bytes::from(fleet_workbook()))
        .file_name("fleet.xlsx")
        .mime_type("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet");
    let form = MultipartForm::new()
        .add_part("file", part)
        .add_text("email", TEST_EMAIL);

    let response = app
        .client()
        .post("/api/v1/vehicles/import")
        .multipart(form)
        .await;
    assert_eq!(response.status_code(), 202);
    let body: serde_json::Value = response.json();

    let job = app.wait_for_job(body["job_id"].as_str().unwrap()).await;
    assert_eq!(job["status"], "completed");
    assert_eq!(job["result"]["imported"], 1);

    let vehicle: serde_json::Value = app.client().get("/api/v1/vehicles/X1").await.json();
    assert_eq!(vehicle["manufactured_date"], "2012-09-09");
    assert_eq!(vehicle["car_make"], "Honda");
}

#[tokio::test]
async fn import_rejects_unsupported_extension() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/api/v1/vehicles/import")
        .multipart(upload_form("cars.pdf", CARS_CSV, Some(TEST_EMAIL)))
        .await;

    assert_eq!(response.status_code(), 400);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "UNSUPPORTED_FORMAT");

    let uploads = std::fs::read_dir(app.state.files.upload_dir()).unwrap().count();
    assert_eq!(uploads, 0);
}

#[tokio::test]
async fn import_rejects_oversized_file() {
    let app = setup_test_app_with(|config| config.max_upload_size_bytes = 64).await;

    let response = app
        .client()
        .post("/api/v1/vehicles/import")
        .multipart(upload_form("cars.csv", CARS_CSV, Some(TEST_EMAIL)))
        .await;

    assert_eq!(response.status_code(), 413);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "PAYLOAD_TOO_LARGE");
    let uploads = std::fs::read_dir(app.state.files.upload_dir()).unwrap().count();
    assert_eq!(uploads, 0);
}

#[tokio::test]
async fn import_requires_email_and_file() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/api/v1/vehicles/import")
        .multipart(upload_form("cars.csv", CARS_CSV, None))
        .await;
    assert_eq!(response.status_code(), 400);

    let response = app
        .client()
        .post("/api/v1/vehicles/import")
        .multipart(MultipartForm::new().add_text("email", TEST_EMAIL))
        .await;
    assert_eq!(response.status_code(), 400);

    let response = app
        .client()
        .post("/api/v1/vehicles/import")
        .multipart(upload_form("cars.csv", CARS_CSV, Some("not-an-email")))
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn export_then_download() {
    let app = setup_test_app().await;
    app.seed_vehicle("OLD1", "Corolla", NaiveDate::from_ymd_opt(2001, 1, 1).unwrap())
        .await;
    app.seed_vehicle("NEW1", "Civic", chrono::Utc::now().date_naive())
        .await;

    let response = app
        .client()
        .post("/api/v1/vehicles/export")
        .json(&json!({ "min_age": 5, "email": TEST_EMAIL }))
        .await;

    assert_eq!(response.status_code(), 202);
    let body: serde_json::Value = response.json();
    assert_eq!(body["min_age"], 5);
    assert_eq!(body["email"], TEST_EMAIL);

    let job = app.wait_for_job(body["job_id"].as_str().unwrap()).await;
    assert_eq!(job["status"], "completed");
    assert_eq!(job["result"]["exported"], 1);
    let file_name = job["result"]["file_name"].as_str().unwrap().to_string();

    let (_, message, notified_file) = app.notifier.sent().pop().unwrap();
    assert_eq!(message, "Export complete! 1 vehicles exported.");
    assert_eq!(notified_file.as_deref(), Some(file_name.as_str()));

    let download = app
        .client()
        .get("/api/v1/vehicles/export/download")
        .add_query_param("file_name", &file_name)
        .await;

    assert_eq!(download.status_code(), 200);
    assert_eq!(download.header("content-type"), "text/csv");
    assert!(download
        .header("content-disposition")
        .to_str()
        .unwrap()
        .starts_with("attachment"));

    let text = download.text();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("id,first_name,last_name,email,car_make,car_model,vin,manufactured_date,age_of_vehicle")
    );
    assert!(lines.next().unwrap().contains(",OLD1,2001-01-01,"));
    assert_eq!(lines.next(), None);
}

#[tokio::test]
async fn export_with_no_match_sends_no_file() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/api/v1/vehicles/export")
        .json(&json!({ "min_age": 50, "email": TEST_EMAIL }))
        .await;
    let body: serde_json::Value = response.json();

    let job = app.wait_for_job(body["job_id"].as_str().unwrap()).await;
    assert_eq!(job["result"]["exported"], 0);

    let sent = app.notifier.sent();
    assert_eq!(
        sent,
        vec![(
            TEST_EMAIL.to_string(),
            "No vehicles found older than 50 years.".to_string(),
            None
        )]
    );
    let exports = std::fs::read_dir(app.state.files.export_dir()).unwrap().count();
    assert_eq!(exports, 0);
}

#[tokio::test]
async fn export_rejects_negative_age_and_bad_email() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/api/v1/vehicles/export")
        .json(&json!({ "min_age": -1, "email": TEST_EMAIL }))
        .await;
    assert_eq!(response.status_code(), 400);

    let response = app
        .client()
        .post("/api/v1/vehicles/export")
        .json(&json!({ "min_age": 3, "email": "nobody" }))
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn download_missing_file_is_not_found() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .get("/api/v1/vehicles/export/download")
        .add_query_param("file_name", "export_vehicles_1.csv")
        .await;
    assert_eq!(response.status_code(), 404);

    let response = app
        .client()
        .get("/api/v1/vehicles/export/download")
        .add_query_param("file_name", "../secrets.csv")
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .get(&format!("/api/v1/jobs/{}", uuid::Uuid::new_v4()))
        .await;
    assert_eq!(response.status_code(), 404);
}
