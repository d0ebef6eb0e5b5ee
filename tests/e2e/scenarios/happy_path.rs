use crate::harness::{Assertion, TestRun};
use serde_json::json;
use verdict_core::{Cleanup, FieldCheck, Scenario, Step};

fn register_and_fetch() -> Scenario {
    Scenario::new("register_and_fetch")
        .step(
            Step::post("/api/Student")
                .json(json!({"first_name": "Test", "last_name": "Student"}))
                .expect_status(201)
                .capture("student_id", "student_id")
                .creates(Cleanup::delete("/api/Student/{student_id}")),
        )
        .step(
            Step::get("/api/Student/{student_id}")
                .check(FieldCheck::equals("student_id", json!("{student_id}")))
                .check(FieldCheck::equals("first_name", json!("Test"))),
        )
}

#[test]
fn test_create_read_and_clean_up() {
    let run = TestRun::campus().unwrap();
    run.run(&register_and_fetch()).unwrap().expect(&[
        Assertion::Passed,
        Assertion::Captured("student_id".into()),
        Assertion::RequestOrder(vec![
            "POST /api/Student".into(),
            "GET /api/Student/1".into(),
            "DELETE /api/Student/1".into(),
        ]),
        Assertion::CleanupAttempted(1),
        Assertion::CleanupFailures(0),
        Assertion::ServerEmpty,
    ]);
}

#[test]
fn test_captured_id_keeps_json_type_in_body() {
    let run = TestRun::campus().unwrap();
    let scenario = Scenario::new("typed_capture")
        .step(
            Step::post("/api/hostel")
                .json(json!({"hostel_name": "North"}))
                .expect_status(201)
                .capture("hostel_id", "hostel_id")
                .creates(Cleanup::delete("/api/hostel/{hostel_id}")),
        )
        .step(
            Step::post("/api/hostel/rooms")
                .json(json!({"hostel_id": "{hostel_id}", "label": "room for {hostel_id}"}))
                .expect_status(201)
                .capture("room_id", "room_id")
                .creates(Cleanup::delete("/api/hostel/rooms/{room_id}")),
        );

    let outcome = run.run(&scenario).unwrap().expect(&[Assertion::Passed]);
    let room = outcome.requests[1].body.clone().unwrap();
    assert_eq!(room["hostel_id"], json!(1));
    assert_eq!(room["label"], json!("room for 1"));
}

#[test]
fn test_default_and_step_headers_are_sent() {
    let run = TestRun::campus().unwrap().header("X-Campus-Tenant", "north");
    let scenario = Scenario::new("headers")
        .step(Step::get("/api/Role").header("Accept", "application/vnd.campus+json"));

    let outcome = run.run(&scenario).unwrap().expect(&[Assertion::Passed]);
    let request = &outcome.requests[0];
    assert_eq!(request.header("content-type"), Some("application/json"));
    assert_eq!(request.header("accept"), Some("application/vnd.campus+json"));
    assert_eq!(request.header("x-campus-tenant"), Some("north"));
}

#[test]
fn test_nested_field_capture() {
    let server = crate::harness::StubServer::campus().unwrap();
    server.respond_with(
        "POST",
        "/api/enrolment",
        201,
        r#"{"data": {"enrolment": {"id": 77}}, "status": "Registered"}"#,
    );
    let run = TestRun::on(server);
    let scenario = Scenario::new("nested").step(
        Step::post("/api/enrolment")
            .json(json!({"course": "CS101"}))
            .expect_status(201)
            .capture("enrolment_id", "data.enrolment.id")
            .check(FieldCheck::one_of(
                "status",
                vec![json!("submitted"), json!("registered")],
            )),
    );

    let outcome = run.run(&scenario).unwrap().expect(&[Assertion::Passed]);
    assert_eq!(outcome.report.captures["enrolment_id"], json!(77));
}

#[test]
fn test_optional_check_tolerates_absent_field() {
    let run = TestRun::campus().unwrap();
    let scenario = Scenario::new("optional_status").step(
        Step::post("/api/student")
            .json(json!({"first_name": "Opt"}))
            .expect_status(201)
            .capture("student_id", "student_id")
            .check(
                FieldCheck::one_of("registrationStatus", vec![json!("submitted")]).optional(),
            )
            .creates(Cleanup::delete("/api/student/{student_id}")),
    );

    run.run(&scenario)
        .unwrap()
        .expect(&[Assertion::Passed, Assertion::ServerEmpty]);
}

#[test]
fn test_progress_reports_steps_and_cleanup() {
    use std::cell::RefCell;
    use verdict_core::{HttpTransport, ScenarioRunner};

    let run = TestRun::campus().unwrap();
    let config = run.config().unwrap();
    let runner = ScenarioRunner::new(HttpTransport::new(&config).unwrap(), config);

    let seen = RefCell::new(Vec::new());
    let report = runner.run_with_progress(&register_and_fetch(), &|current, total, label| {
        seen.borrow_mut().push((current, total, label.to_string()));
    });

    assert!(report.passed());
    let seen = seen.into_inner();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0].0, 0);
    assert_eq!(seen[0].1, 2);
    assert_eq!(seen[1].0, 1);
    assert!(seen[2].2.starts_with("cleanup DELETE"));
}
