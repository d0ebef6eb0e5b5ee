use crate::harness::{Assertion, FailureKind, StubServer, TestRun};
use serde_json::json;
use std::net::TcpListener;
use std::time::Duration;
use verdict_core::{Cleanup, FieldCheck, RunConfig, Scenario, Step, StepFailure};

#[test]
fn test_unexpected_status_reports_body() {
    let run = TestRun::campus().unwrap();
    let scenario = Scenario::new("missing_exam").step(Step::get("/api/Exam/42"));

    let outcome = run.run(&scenario).unwrap().expect(&[
        Assertion::FailedAt(0),
        Assertion::Failure(FailureKind::UnexpectedStatus),
        Assertion::FailureMentions("not found".into()),
    ]);
    let failed = outcome.report.failure.unwrap();
    match failed.failure {
        StepFailure::UnexpectedStatus {
            method,
            url,
            expected,
            observed,
            ..
        } => {
            assert_eq!(method, "GET");
            assert!(url.ends_with("/api/Exam/42"));
            assert_eq!(expected, vec![200]);
            assert_eq!(observed, 404);
        }
        other => panic!("unexpected failure: {:?}", other),
    }
}

#[test]
fn test_missing_capture_field() {
    let server = StubServer::campus().unwrap();
    server.respond_with("POST", "/api/user", 201, r#"{"id": 9}"#);
    let run = TestRun::on(server);

    let scenario = Scenario::new("wrong_id_field")
        .step(
            Step::post("/api/User")
                .json(json!({"full_name": "Ada"}))
                .expect_status(201)
                .capture("user_id", "user_id")
                .creates(Cleanup::delete("/api/User/{user_id}")),
        )
        .step(Step::get("/api/User/{user_id}"));

    run.run(&scenario).unwrap().expect(&[
        Assertion::FailedAt(0),
        Assertion::Failure(FailureKind::MissingField),
        Assertion::FailureMentions("user_id".into()),
        Assertion::CleanupAttempted(0),
        Assertion::RequestsSent(1),
    ]);
}

#[test]
fn test_null_capture_counts_as_missing() {
    let server = StubServer::campus().unwrap();
    server.respond_with("POST", "/api/user", 201, r#"{"user_id": null}"#);
    let run = TestRun::on(server);

    let scenario = Scenario::new("null_id").step(
        Step::post("/api/User")
            .json(json!({"full_name": "Ada"}))
            .expect_status(201)
            .capture("user_id", "user_id"),
    );

    run.run(&scenario)
        .unwrap()
        .expect(&[Assertion::Failure(FailureKind::MissingField)]);
}

#[test]
fn test_malformed_response_body() {
    let server = StubServer::campus().unwrap();
    server.respond_with("POST", "/api/exam", 201, "<html>created</html>");
    let run = TestRun::on(server);

    let scenario = Scenario::new("html_reply").step(
        Step::post("/api/Exam")
            .json(json!({"dept_id": 1}))
            .expect_status(201)
            .capture("exam_id", "exam_id"),
    );

    run.run(&scenario).unwrap().expect(&[
        Assertion::Failure(FailureKind::MalformedResponse),
        Assertion::FailureMentions("<html>created</html>".into()),
    ]);
}

#[test]
fn test_unparsed_body_is_fine_without_captures() {
    let server = StubServer::campus().unwrap();
    server.respond_with("GET", "/dashboard", 200, "<html>hub</html>");
    let run = TestRun::on(server);

    run.run(&Scenario::new("html_ok").step(Step::get("/dashboard")))
        .unwrap()
        .expect(&[Assertion::Passed]);
}

#[test]
fn test_unresolved_reference_sends_nothing() {
    let run = TestRun::campus().unwrap();
    let scenario = Scenario::new("typo")
        .step(
            Step::post("/api/Student")
                .json(json!({"first_name": "Typo"}))
                .expect_status(201)
                .capture("student_id", "student_id")
                .creates(Cleanup::delete("/api/Student/{student_id}")),
        )
        .step(Step::get("/api/Student/{studnet_id}"));

    run.run(&scenario).unwrap().expect(&[
        Assertion::FailedAt(1),
        Assertion::Failure(FailureKind::UnresolvedReference),
        Assertion::FailureMentions("studnet_id".into()),
        Assertion::RequestOrder(vec![
            "POST /api/Student".into(),
            "DELETE /api/Student/1".into(),
        ]),
        Assertion::ServerEmpty,
    ]);
}

#[test]
fn test_unresolved_cleanup_reference_blocks_creation() {
    let run = TestRun::campus().unwrap();
    let scenario = Scenario::new("bad_cleanup").step(
        Step::post("/api/hostel")
            .json(json!({"hostel_name": "East"}))
            .expect_status(201)
            .capture("hostel_id", "hostel_id")
            .creates(Cleanup::delete("/api/hostel/{hostel}")),
    );

    run.run(&scenario).unwrap().expect(&[
        Assertion::Failure(FailureKind::UnresolvedReference),
        Assertion::RequestsSent(0),
        Assertion::ServerEmpty,
    ]);
}

#[test]
fn test_field_mismatch_names_field_and_values() {
    let run = TestRun::campus().unwrap();
    let scenario = Scenario::new("wrong_type").step(
        Step::post("/api/Exam")
            .json(json!({"assessment_type": "Midterm"}))
            .expect_status(201)
            .capture("exam_id", "exam_id")
            .check(FieldCheck::equals("assessment_type", json!("Final")))
            .creates(Cleanup::delete("/api/Exam/{exam_id}")),
    );

    run.run(&scenario).unwrap().expect(&[
        Assertion::Failure(FailureKind::FieldMismatch),
        Assertion::FailureMentions("assessment_type".into()),
        Assertion::FailureMentions("Final".into()),
        Assertion::FailureMentions("Midterm".into()),
        Assertion::ServerEmpty,
    ]);
}

#[test]
fn test_request_timeout() {
    let server = StubServer::campus().unwrap();
    server.delay("GET", "/api/role", Duration::from_millis(1500));
    let run = TestRun::on(server).timeout(Duration::from_millis(200));

    let outcome = run
        .run(&Scenario::new("slow").step(Step::get("/api/Role")))
        .unwrap()
        .expect(&[Assertion::Failure(FailureKind::Timeout)]);
    assert!(outcome.report.steps[0].status.is_none());
}

#[test]
fn test_connection_refused() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let config = RunConfig::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
    let scenario = Scenario::new("offline").step(Step::get("/api/Role"));

    let report = verdict_core::run(&scenario, &config).unwrap();
    match report.failure.map(|f| f.failure) {
        Some(StepFailure::Transport { timed_out, url, .. }) => {
            assert!(!timed_out);
            assert!(url.ends_with("/api/Role"));
        }
        other => panic!("expected transport failure, got {:?}", other),
    }
}
