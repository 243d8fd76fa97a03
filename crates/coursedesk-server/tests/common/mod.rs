//! Shared harness: a real server on an ephemeral port with in-memory backends.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use coursedesk_db_memory::{InMemoryKeyValueStore, InMemoryRecordStore};
use coursedesk_notifications::{NotificationError, Notifier};
use coursedesk_server::{AppConfig, AppState, build_app};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Keeps every message instead of delivering it.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentMail>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<String, NotificationError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            html_body: html_body.to_string(),
        });
        Ok(format!("recorded-{}", sent.len()))
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

pub struct TestServer {
    pub base_url: String,
    pub client: Client,
    pub kv: Arc<InMemoryKeyValueStore>,
    pub notifier: Arc<RecordingNotifier>,
    _handle: JoinHandle<()>,
}

pub async fn start() -> TestServer {
    start_with(AppConfig::default()).await
}

pub async fn start_with(config: AppConfig) -> TestServer {
    let kv = Arc::new(InMemoryKeyValueStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let state = AppState::new(
        Arc::new(config),
        Arc::new(InMemoryRecordStore::new()),
        kv.clone(),
        notifier.clone(),
    );
    let app = build_app(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base_url: format!("http://{addr}"),
        client: Client::new(),
        kv,
        notifier,
        _handle: handle,
    }
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn register(&self, username: &str, password: &str, role: &str) -> Response {
        self.client
            .post(self.url("/auth/register"))
            .json(&json!({ "username": username, "password": password, "role": role }))
            .send()
            .await
            .unwrap()
    }

    pub async fn login(&self, username: &str, password: &str) -> Response {
        self.client
            .post(self.url("/auth/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .unwrap()
    }

    /// Registers `username` with `role` and returns a bearer token.
    pub async fn token_for(&self, username: &str, role: &str) -> String {
        let res = self.register(username, "correct horse", role).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let res = self.login(username, "correct horse").await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    /// Current value of a key in the shared key-value store, as text.
    pub async fn kv_value(&self, key: &str) -> Option<String> {
        use coursedesk_storage::KeyValueStore;
        self.kv
            .get(key)
            .await
            .unwrap()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    pub async fn kv_exists(&self, key: &str) -> bool {
        use coursedesk_storage::KeyValueStore;
        self.kv.exists(key).await.unwrap()
    }

    /// Waits until the notifier has recorded `count` messages.
    pub async fn wait_for_mail(&self, count: usize) -> Vec<SentMail> {
        for _ in 0..50 {
            let sent = self.notifier.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.notifier.sent()
    }
}

pub async fn message(res: Response) -> String {
    let body: Value = res.json().await.unwrap();
    body["message"].as_str().unwrap_or_default().to_string()
}
