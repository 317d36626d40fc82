// tests/question_tests.rs

mod common;

use common::{assignment_body, free_text, multiple_choice, spawn_app, submission_body};
use serde_json::{Value, json};

#[tokio::test]
async fn owner_manages_questions_of_an_assignment() {
    let app = spawn_app().await;
    let lecturer = app.user("prof_x", "LECTURER").await;

    let assignment = app
        .create_assignment(
            &lecturer,
            &assignment_body(10, 60, vec![multiple_choice("Which protocol is connectionless?", 1)]),
        )
        .await;
    let assignment_id = assignment["id"].as_i64().unwrap();

    let mut body = free_text("Explain the three-way handshake", 10);
    body["assignmentId"] = json!(assignment_id);
    let response = app.post(&lecturer, "/api/questions", &body).await;
    assert_eq!(response.status().as_u16(), 201);
    let created: Value = response.json().await.unwrap();
    assert_eq!(created["assignmentId"], assignment_id);
    assert_eq!(created["position"], 1);
    let question_path = format!("/api/questions/{}", created["id"]);

    let response = app
        .patch(&lecturer, &question_path, &free_text("Explain slow start", 20))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["id"], created["id"]);
    assert_eq!(updated["title"], "Explain slow start");
    assert_eq!(updated["maxScore"], 20);

    let fetched: Value = app
        .get(&lecturer, &format!("/api/assignments/{assignment_id}"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["maxScore"], 21);

    let first_path = format!("/api/questions/{}", assignment["questions"][0]["id"]);
    assert_eq!(app.delete(&lecturer, &first_path).await.status().as_u16(), 204);
    assert_eq!(app.get(&lecturer, &first_path).await.status().as_u16(), 404);

    let remaining: Vec<Value> = app
        .get(&lecturer, &format!("/api/questions/assignment/{assignment_id}"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["position"], 0);

    // The last question cannot go.
    let response = app.delete(&lecturer, &question_path).await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn students_see_questions_without_answer_keys() {
    let app = spawn_app().await;
    let lecturer = app.user("prof_x", "LECTURER").await;
    let student = app.user("sam", "STUDENT").await;

    let assignment = app
        .create_assignment(
            &lecturer,
            &assignment_body(-5, 60, vec![multiple_choice("Which protocol is connectionless?", 1)]),
        )
        .await;

    let listed: Vec<Value> = app
        .get(&student, &format!("/api/questions/assignment/{}", assignment["id"]))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].get("correctAnswer").is_none());

    let single: Value = app
        .get(&lecturer, &format!("/api/questions/{}", listed[0]["id"]))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(single["correctAnswer"], 1);

    let mut body = free_text("Explain NAT", 5);
    body["assignmentId"] = assignment["id"].clone();
    let response = app.post(&student, "/api/questions", &body).await;
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn questions_are_validated_and_must_exist() {
    let app = spawn_app().await;
    let lecturer = app.user("prof_x", "LECTURER").await;

    let assignment = app
        .create_assignment(&lecturer, &assignment_body(10, 60, vec![free_text("Explain NAT", 5)]))
        .await;

    let mut body = free_text("Explain NAT traversal", 1001);
    body["assignmentId"] = assignment["id"].clone();
    let response = app.post(&lecturer, "/api/questions", &body).await;
    assert_eq!(response.status().as_u16(), 400);
    let error: Value = response.json().await.unwrap();
    assert_eq!(error["fields"][0]["field"], "question");

    body["maxScore"] = json!(5);
    body["assignmentId"] = json!(9999);
    let response = app.post(&lecturer, "/api/questions", &body).await;
    assert_eq!(response.status().as_u16(), 404);

    let response = app.get(&lecturer, "/api/questions/assignment/9999").await;
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn questions_lock_after_first_submission() {
    let app = spawn_app().await;
    let lecturer = app.user("prof_x", "LECTURER").await;
    let student = app.user("sam", "STUDENT").await;

    let assignment = app
        .create_assignment(
            &lecturer,
            &assignment_body(
                -5,
                60,
                vec![
                    multiple_choice("Which protocol is connectionless?", 1),
                    free_text("Explain NAT", 5),
                ],
            ),
        )
        .await;
    let response = app
        .post(
            &student,
            "/api/submissions",
            &submission_body(&assignment, &[json!(1), json!("address rewriting")]),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);

    let question_path = format!("/api/questions/{}", assignment["questions"][1]["id"]);

    let response = app
        .patch(&lecturer, &question_path, &free_text("Explain NAT", 50))
        .await;
    assert_eq!(response.status().as_u16(), 409);
    let error: Value = response.json().await.unwrap();
    assert_eq!(error["code"], "ASSIGNMENT_LOCKED");

    assert_eq!(app.delete(&lecturer, &question_path).await.status().as_u16(), 409);

    let mut body = free_text("Explain PAT", 5);
    body["assignmentId"] = assignment["id"].clone();
    assert_eq!(
        app.post(&lecturer, "/api/questions", &body).await.status().as_u16(),
        409
    );
}
