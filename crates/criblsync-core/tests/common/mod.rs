#![allow(dead_code)]

//! In-process stand-in for the token, search and management APIs.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use criblsync_core::endpoints::{ClientCredentials, CloudEndpoints, DEFAULT_AUDIENCE};
use criblsync_core::http::CloudClient;
use serde_json::{json, Value};
use url::Url;

pub const TOKEN: &str = "token-0123456789abcdef";
pub const JOB_ID: &str = "job-42";
pub const COMMIT_ID: &str = "c0ffee";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub content_type: Option<String>,
    pub authorization: Option<String>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("request body is not JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.clone()).expect("request body is not UTF-8")
    }

    pub fn route(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

#[derive(Debug, Default)]
pub struct FakeCloudState {
    pub reject_token: bool,
    pub job_statuses: VecDeque<String>,
    pub results_body: String,
    pub existing_lookups: Vec<String>,
    pub catalog_fails: bool,
    pub upload_response: Option<Value>,
    pub commit_response: Option<Value>,
    pub requests: Vec<RecordedRequest>,
}

#[derive(Clone, Default)]
pub struct FakeCloud {
    state: Arc<Mutex<FakeCloudState>>,
}

impl FakeCloud {
    pub fn configure(&self, apply: impl FnOnce(&mut FakeCloudState)) {
        apply(&mut self.state.lock().unwrap());
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn routes(&self) -> Vec<String> {
        self.requests().iter().map(RecordedRequest::route).collect()
    }

    pub fn request(&self, method: Method, path: &str) -> RecordedRequest {
        self.requests()
            .into_iter()
            .find(|request| request.method == method && request.path == path)
            .unwrap_or_else(|| panic!("no {method} {path} request recorded"))
    }

    /// Serves on an ephemeral local port and returns a client pointed at it.
    pub async fn start(&self) -> CloudClient {
        let router = Router::new().fallback(handle).with_state(self.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake cloud");
        let addr = listener.local_addr().expect("fake cloud address");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("fake cloud server");
        });

        let root = Url::parse(&format!("http://{addr}/")).unwrap();
        let endpoints = CloudEndpoints::new(root.join("oauth/token").unwrap(), DEFAULT_AUDIENCE, root);
        CloudClient::new(endpoints, Duration::from_secs(5)).expect("build client")
    }
}

pub fn credentials() -> ClientCredentials {
    ClientCredentials::new("client-id", "client-secret")
}

pub fn statuses(values: &[&str]) -> VecDeque<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn query_param(uri: &Uri, name: &str) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

async fn handle(
    State(cloud): State<FakeCloud>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut state = cloud.state.lock().unwrap();
    state.requests.push(RecordedRequest {
        method: method.clone(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        content_type: header_value(&headers, header::CONTENT_TYPE),
        authorization: header_value(&headers, header::AUTHORIZATION),
        body: body.to_vec(),
    });

    let path = uri.path().trim_start_matches('/').to_string();
    let segments: Vec<&str> = path.split('/').collect();

    match (method.as_str(), segments.as_slice()) {
        ("POST", ["oauth", "token"]) => {
            if state.reject_token {
                (StatusCode::UNAUTHORIZED, "invalid client").into_response()
            } else {
                Json(json!({"access_token": TOKEN, "token_type": "Bearer"})).into_response()
            }
        }
        ("POST", ["m", _, "search", "jobs"]) => {
            Json(json!({"count": 1, "items": [{"id": JOB_ID}]})).into_response()
        }
        ("GET", ["m", _, "search", "jobs", _]) => {
            let status = state
                .job_statuses
                .pop_front()
                .unwrap_or_else(|| "running".to_string());
            Json(json!({"items": [{"id": JOB_ID, "status": status}]})).into_response()
        }
        ("GET", ["m", _, "search", "jobs", _, "results"]) => {
            (StatusCode::OK, state.results_body.clone()).into_response()
        }
        ("PUT", ["m", _, "system", "lookups"]) => {
            let response = state.upload_response.clone().unwrap_or_else(|| {
                let filename = query_param(&uri, "filename").unwrap_or_default();
                json!({"filename": format!("{filename}.tmp-1"), "rows": 0})
            });
            Json(response).into_response()
        }
        ("GET", ["m", _, "system", "lookups", _]) => {
            if state.catalog_fails {
                (StatusCode::INTERNAL_SERVER_ERROR, "catalog unavailable").into_response()
            } else {
                let items: Vec<Value> = state
                    .existing_lookups
                    .iter()
                    .map(|id| json!({"id": id}))
                    .collect();
                Json(json!({"count": items.len(), "items": items})).into_response()
            }
        }
        ("POST", ["m", _, "system", "lookups"]) | ("PATCH", ["m", _, "system", "lookups", _]) => {
            Json(json!({"count": 1, "items": []})).into_response()
        }
        ("POST", ["m", _, "version", "commit"]) => {
            let response = state
                .commit_response
                .clone()
                .unwrap_or_else(|| json!({"count": 1, "items": [{"commit": COMMIT_ID}]}));
            Json(response).into_response()
        }
        ("PATCH", ["master", "groups", _, "deploy"]) => {
            Json(json!({"count": 1, "items": []})).into_response()
        }
        _ => (StatusCode::NOT_FOUND, "no such route").into_response(),
    }
}
