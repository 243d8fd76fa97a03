mod common;

use reqwest::StatusCode;
use serde_json::{Value, json};

use common::{TestServer, message, start};

async fn create_assignment(server: &TestServer, token: &str, body: Value) -> reqwest::Response {
    server
        .client
        .post(server.url("/assignments"))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .unwrap()
}

async fn new_assignment(server: &TestServer, token: &str, title: &str, due: &str) -> i64 {
    let res = create_assignment(
        server,
        token,
        json!({ "title": title, "description": "Read chapter 3", "dueDate": due }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    body["id"].as_i64().unwrap()
}

async fn get(server: &TestServer, token: &str, path: &str) -> reqwest::Response {
    server
        .client
        .get(server.url(path))
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
}

async fn delete_assignment(server: &TestServer, token: &str, id: i64) -> reqwest::Response {
    server
        .client
        .delete(server.url(&format!("/assignments/{id}")))
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
}

async fn grade(server: &TestServer, token: &str, submission_id: i64, grade: &str) -> reqwest::Response {
    server
        .client
        .put(server.url(&format!("/submissions/{submission_id}/grade")))
        .bearer_auth(token)
        .json(&json!({ "grade": grade }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn only_teachers_create_assignments() {
    let server = start().await;
    let teacher = server.token_for("grace", "teacher").await;
    let student = server.token_for("alice", "student").await;

    let body = json!({ "title": "Essay", "description": "", "dueDate": "2026-11-01T12:00:00Z" });
    let res = create_assignment(&server, &student, body.clone()).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = create_assignment(&server, &teacher, body).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    assert_eq!(created["title"], "Essay");
    assert_eq!(created["dueDate"], "2026-11-01T12:00:00Z");

    let res = create_assignment(
        &server,
        &teacher,
        json!({ "title": "Bad", "dueDate": "next tuesday" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reads_are_cached_and_updates_invalidate() {
    let server = start().await;
    let teacher = server.token_for("grace", "teacher").await;
    let id = new_assignment(&server, &teacher, "Essay", "2026-11-01T12:00:00Z").await;
    let key = format!("assignment:{id}");

    assert!(!server.kv_exists(&key).await);
    let res = get(&server, &teacher, &format!("/assignments/{id}")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(server.kv_exists(&key).await);

    let res = server
        .client
        .put(server.url(&format!("/assignments/{id}")))
        .bearer_auth(&teacher)
        .json(&json!({ "title": "Essay (revised)" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(!server.kv_exists(&key).await);

    let body: Value = get(&server, &teacher, &format!("/assignments/{id}"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["title"], "Essay (revised)");
    assert_eq!(body["description"], "Read chapter 3");
}

#[tokio::test]
async fn missing_assignments_are_not_cached() {
    let server = start().await;
    let student = server.token_for("alice", "student").await;

    let res = get(&server, &student, "/assignments/999").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(message(res).await, "Assignment not found");
    assert!(!server.kv_exists("assignment:999").await);
}

#[tokio::test]
async fn list_is_cached_per_ordering() {
    let server = start().await;
    let teacher = server.token_for("grace", "teacher").await;
    new_assignment(&server, &teacher, "B", "2026-12-01T12:00:00Z").await;
    new_assignment(&server, &teacher, "A", "2026-11-01T12:00:00Z").await;

    let res = get(&server, &teacher, "/assignments?sortBy=dueDate:desc").await;
    assert_eq!(res.status(), StatusCode::OK);
    let list: Vec<Value> = res.json().await.unwrap();
    let titles: Vec<&str> = list.iter().map(|a| a["title"].as_str().unwrap()).collect();
    assert_eq!(titles, ["B", "A"]);
    assert!(server.kv_exists("assignments:all:dueDate:desc").await);

    get(&server, &teacher, "/assignments").await;
    assert!(server.kv_exists("assignments:all:none").await);

    let res = get(&server, &teacher, "/assignments?sortBy=colour:asc").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let res = get(&server, &teacher, "/assignments?sortBy=title:sideways").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn only_the_owner_deletes() {
    let server = start().await;
    let owner = server.token_for("grace", "teacher").await;
    let other = server.token_for("ada", "teacher").await;
    let id = new_assignment(&server, &owner, "Essay", "2026-11-01T12:00:00Z").await;
    get(&server, &owner, &format!("/assignments/{id}")).await;

    let res = delete_assignment(&server, &other, id).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert!(server.kv_exists(&format!("assignment:{id}")).await);

    let res = delete_assignment(&server, &owner, id).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(message(res).await, "Assignment deleted successfully");
    assert!(!server.kv_exists(&format!("assignment:{id}")).await);

    let res = get(&server, &owner, &format!("/assignments/{id}")).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let res = delete_assignment(&server, &owner, id).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn new_assignment_notifies_the_student() {
    let server = start().await;
    let teacher = server.token_for("grace", "teacher").await;

    let res = create_assignment(
        &server,
        &teacher,
        json!({
            "title": "Fish & Chips",
            "description": "Compare <b>recipes</b>",
            "dueDate": "2026-11-01T12:00:00Z",
            "studentEmail": "alice@school.test",
        }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let sent = server.wait_for_mail(1).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "alice@school.test");
    assert_eq!(sent[0].subject, "New assignment: Fish & Chips");
    assert!(sent[0].html_body.contains("Fish &amp; Chips"));
    assert!(sent[0].html_body.contains("&lt;b&gt;recipes&lt;/b&gt;"));
    assert!(sent[0].html_body.contains("grace"));
}

#[tokio::test]
async fn submissions_report_and_grading() {
    let server = start().await;
    let teacher = server.token_for("grace", "teacher").await;
    let other_teacher = server.token_for("ada", "teacher").await;
    let student = server.token_for("alice", "student").await;
    let id = new_assignment(&server, &teacher, "Essay", "2026-11-01T12:00:00Z").await;
    let report_key = format!("submissions:assignment:{id}");

    // teachers cannot submit
    let res = server
        .client
        .post(server.url(&format!("/assignments/{id}/submit")))
        .bearer_auth(&teacher)
        .json(&json!({ "content": "my answer" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = server
        .client
        .post(server.url("/assignments/999/submit"))
        .bearer_auth(&student)
        .json(&json!({ "content": "lost" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = server
        .client
        .post(server.url(&format!("/assignments/{id}/submit")))
        .bearer_auth(&student)
        .json(&json!({ "content": "my answer" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let submission: Value = res.json().await.unwrap();
    let submission_id = submission["id"].as_i64().unwrap();
    assert_eq!(submission["assignmentId"].as_i64(), Some(id));

    // report is teacher-only and cached
    let res = get(&server, &student, &format!("/assignments/{id}/submissions")).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let res = get(&server, &teacher, &format!("/assignments/{id}/submissions")).await;
    assert_eq!(res.status(), StatusCode::OK);
    let report: Vec<Value> = res.json().await.unwrap();
    assert_eq!(report.len(), 1);
    assert!(report[0]["grade"].is_null());
    assert!(server.kv_exists(&report_key).await);

    let res = grade(&server, &other_teacher, submission_id, "F").await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert!(server.kv_exists(&report_key).await);

    let res = grade(&server, &teacher, submission_id, "A").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(!server.kv_exists(&report_key).await);

    let report: Vec<Value> = get(&server, &teacher, &format!("/assignments/{id}/submissions"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(report[0]["grade"], "A");

    let res = get(&server, &teacher, "/assignments/999/submissions").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn submissions_filter_by_due_date() {
    let server = start().await;
    let teacher = server.token_for("grace", "teacher").await;
    let student = server.token_for("alice", "student").await;
    let early = new_assignment(&server, &teacher, "Early", "2026-11-01T12:00:00Z").await;
    let late = new_assignment(&server, &teacher, "Late", "2026-12-01T12:00:00Z").await;

    for id in [early, late] {
        let res = server
            .client
            .post(server.url(&format!("/assignments/{id}/submit")))
            .bearer_auth(&student)
            .json(&json!({ "content": format!("answer {id}") }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let all: Vec<Value> = get(&server, &teacher, "/submissions")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let res = get(&server, &teacher, "/submissions?dueDate=2026-12-01").await;
    assert_eq!(res.status(), StatusCode::OK);
    let filtered: Vec<Value> = res.json().await.unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0]["assignmentId"].as_i64(), Some(late));

    let desc: Vec<Value> = get(&server, &teacher, "/submissions?sortBy=id:desc")
        .await
        .json()
        .await
        .unwrap();
    assert!(desc[0]["id"].as_i64() > desc[1]["id"].as_i64());

    let res = get(&server, &teacher, "/submissions?dueDate=tomorrow").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let res = get(&server, &student, "/submissions").await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}
