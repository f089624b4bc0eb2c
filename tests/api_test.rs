use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use serde_json::{json, Value};

use gpa_predictor::api;
use gpa_predictor::report::read_batch_csv;
use gpa_predictor::{BandPreset, BandSet, LinearModel, Scorer, StudentTable};

const STUDENTS: &str = "\
NIM,nama,rata2_nilai,rata2_hadir,jumlah_mk_diambil,IPK
1,Ayu,90,15,8,3.5
2,Budi,70,10,10,2.9
3,Citra,80,13,9,
4,Dewi,n/a,12,9,3.0
";

// predicted GPA = grade / 25
fn scorer() -> Scorer {
    let table = StudentTable::from_reader(STUDENTS.as_bytes()).unwrap();
    let model = LinearModel::new([0.04, 0.0, 0.0], 0.0);
    Scorer::new(table, Box::new(model), BandSet::preset(BandPreset::Classic))
}

macro_rules! app {
    () => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(scorer()))
                .configure(api::configure),
        )
        .await
    };
}

#[actix_web::test]
async fn health_check_responds() {
    let app = app!();
    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn student_lookup_returns_prediction() {
    let app = app!();
    let req = test::TestRequest::get().uri("/students/1").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["student"]["name"], "Ayu");
    assert_eq!(body["student"]["avg_grade"], 90.0);
    assert_eq!(body["category"]["label"], "SUCCESSFUL");
    assert_eq!(body["category"]["severity"], "success");
    assert!((body["predicted_gpa"].as_f64().unwrap() - 3.6).abs() < 1e-9);
}

#[actix_web::test]
async fn unknown_student_is_404() {
    let app = app!();
    let req = test::TestRequest::get().uri("/students/999").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "student `999` not found");
}

#[actix_web::test]
async fn incomplete_student_is_400() {
    let app = app!();
    let req = test::TestRequest::get().uri("/students/4").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn predict_scores_manual_features() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/predict")
        .set_json(json!({"avg_grade": 76.0, "avg_attendance": 13.0, "course_count": 10}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["category"]["label"], "FAIRLY SUCCESSFUL");
    assert_eq!(body["features"]["course_count"], 10);
}

#[actix_web::test]
async fn predict_rejects_out_of_range_input() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/predict")
        .set_json(json!({"avg_grade": 76.0, "avg_attendance": 30.0, "course_count": 10}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn batch_keeps_order_and_marks_misses() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/batch-predict")
        .insert_header(("content-type", "text/csv"))
        .set_payload("NIM\n3\n999\n1\n4\n")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["total_students"], 4);
    let rows = body["rows"].as_array().unwrap();
    let ids: Vec<&str> = rows.iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["3", "999", "1", "4"]);

    let labels: Vec<&str> = rows.iter().map(|r| r["category"].as_str().unwrap()).collect();
    assert_eq!(labels, vec!["FAIRLY SUCCESSFUL", "NOT FOUND", "SUCCESSFUL", "NOT FOUND"]);
    assert_eq!(rows[1]["found"], false);
    assert_eq!(body["summary"]["not_found"], 2);
}

#[actix_web::test]
async fn batch_accepts_excel_upload() {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "nim").unwrap();
    sheet.write_number(1, 0, 2.0).unwrap();
    sheet.write_number(2, 0, 7.0).unwrap();
    let upload = workbook.save_to_buffer().unwrap();

    let app = app!();
    let req = test::TestRequest::post()
        .uri("/batch-predict")
        .insert_header((
            "content-type",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ))
        .set_payload(upload)
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    let rows = body["rows"].as_array().unwrap();
    assert_eq!(rows[0]["id"], "2");
    assert_eq!(rows[0]["category"], "LESS SUCCESSFUL");
    assert_eq!(rows[1]["category"], "NOT FOUND");
}

#[actix_web::test]
async fn batch_rejects_corrupt_workbook() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/batch-predict")
        .insert_header(("content-type", "application/vnd.ms-excel"))
        .set_payload("NIM\n1\n")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn batch_without_id_column_is_400() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/batch-predict")
        .set_payload("name\nAyu\n")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn batch_csv_download_matches_json_result() {
    let app = app!();
    let upload = "student_id\n2\n1\nunknown\n";

    let req = test::TestRequest::post()
        .uri("/batch-predict")
        .set_payload(upload)
        .to_request();
    let json: Value = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/batch-predict/csv")
        .set_payload(upload)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let disposition = resp
        .headers()
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("batch_predictions.csv"));

    let bytes = test::read_body(resp).await;
    let reloaded = read_batch_csv(bytes.as_ref()).unwrap();
    let rows = json["rows"].as_array().unwrap();
    assert_eq!(reloaded.len(), rows.len());
    for (csv_row, json_row) in reloaded.iter().zip(rows) {
        assert_eq!(csv_row.id, json_row["id"].as_str().unwrap());
        assert_eq!(csv_row.category, json_row["category"].as_str().unwrap());
    }
}

#[actix_web::test]
async fn model_info_and_bands_are_exposed() {
    let app = app!();
    let req = test::TestRequest::get().uri("/model/info").to_request();
    let info: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(info["bands"], "classic");
    assert_eq!(info["model"]["feature_names"][2], "course_count");

    let req = test::TestRequest::get().uri("/bands").to_request();
    let bands: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(bands["bands"].as_array().unwrap().len(), 3);
    assert_eq!(bands["bands"][2]["lower_bound"], Value::Null);
}

#[actix_web::test]
async fn analytics_summarizes_table() {
    let app = app!();
    let req = test::TestRequest::get().uri("/analytics").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["total_students"], 4);
    assert_eq!(body["complete_records"], 3);
    assert_eq!(body["chart_data"]["counts"], json!([1, 1, 1]));
}
