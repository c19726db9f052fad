use std::net::SocketAddr;
use std::path::PathBuf;

pub use ::common::BuildOutcome;
use ::common::BuildReport;
use reqwest::Client;
use serde_json::{Value, json};

use server::backend::init_gateways;
use server::config::{
    AppConfig, BackendKind, CorsConfig, DatabaseConfig, MqAppConfig, ServerConfig,
    StagingConfig, StorageBackend, StorageConfig,
};
use server::lifecycle::Lifecycle;
use server::state::AppState;

pub const USER: &str = "alice";

/// Smallest payload recognized as a gzip archive.
pub const GZIP_ARCHIVE: &[u8] = &[0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03];

pub mod routes {
    pub const NS: &str = "workspace";

    pub fn applications() -> String {
        format!("/api/v1/namespaces/{NS}/applications")
    }

    pub fn application(name: &str) -> String {
        format!("/api/v1/namespaces/{NS}/applications/{name}")
    }

    pub fn store(name: &str) -> String {
        format!("/api/v1/namespaces/{NS}/applications/{name}/store")
    }

    pub fn stage(name: &str) -> String {
        format!("/api/v1/namespaces/{NS}/applications/{name}/stage")
    }

    pub fn deploy(name: &str) -> String {
        format!("/api/v1/namespaces/{NS}/applications/{name}/deploy")
    }

    pub fn restart(name: &str) -> String {
        format!("/api/v1/namespaces/{NS}/applications/{name}/restart")
    }

    pub fn stage_complete(stage_id: &str) -> String {
        format!("/api/v1/namespaces/{NS}/staging/{stage_id}/complete")
    }

    /// `kind` is `configuration` or `service`.
    pub fn bindings(app: &str, kind: &str) -> String {
        format!("/api/v1/namespaces/{NS}/applications/{app}/{kind}bindings")
    }

    pub fn binding(app: &str, kind: &str, name: &str) -> String {
        format!("/api/v1/namespaces/{NS}/applications/{app}/{kind}bindings/{name}")
    }

    pub fn dependents(kind: &str) -> String {
        format!("/api/v1/namespaces/{NS}/{kind}s")
    }

    pub fn dependent(kind: &str, name: &str) -> String {
        format!("/api/v1/namespaces/{NS}/{kind}s/{name}")
    }
}

/// A running test server on memory backends, with no MQ.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub lifecycle: Lifecycle,
}

pub struct TestResponse {
    pub status: u16,
    pub text: String,
    pub body: Value,
}

fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors: CorsConfig::default(),
        },
        backend: BackendKind::Memory,
        database: DatabaseConfig {
            url: String::new(),
            max_connections: 1,
        },
        storage: StorageConfig {
            backend: StorageBackend::Memory,
            path: PathBuf::new(),
            max_blob_size: 1024 * 1024,
            s3: None,
        },
        mq: MqAppConfig::default(),
        staging: StagingConfig {
            default_builder_image: "builder/default:1".to_string(),
            registry_url: "registry.test/apps".to_string(),
            poll_interval_ms: 10,
            max_poll_interval_ms: 50,
            complete_timeout_secs: 1,
        },
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        let config = test_config();
        let gateways = init_gateways(&config, None)
            .await
            .expect("Failed to build gateways");
        let lifecycle = Lifecycle::new(gateways, (&config.staging).into());

        let state = AppState {
            config,
            lifecycle: lifecycle.clone(),
        };
        let app = server::build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            client: Client::new(),
            lifecycle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn post(&self, path: &str, body: &Value) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .header("x-forwarded-user", USER)
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn post_anonymous(&self, path: &str, body: &Value) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .header("x-forwarded-user", USER)
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn patch(&self, path: &str, body: &Value) -> TestResponse {
        let res = self
            .client
            .patch(self.url(path))
            .header("x-forwarded-user", USER)
            .json(body)
            .send()
            .await
            .expect("Failed to send PATCH request");

        TestResponse::from_response(res).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> TestResponse {
        let res = self
            .client
            .put(self.url(path))
            .header("x-forwarded-user", USER)
            .json(body)
            .send()
            .await
            .expect("Failed to send PUT request");

        TestResponse::from_response(res).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .delete(self.url(path))
            .header("x-forwarded-user", USER)
            .send()
            .await
            .expect("Failed to send DELETE request");

        TestResponse::from_response(res).await
    }

    pub async fn delete_with_body(&self, path: &str, body: &Value) -> TestResponse {
        let res = self
            .client
            .delete(self.url(path))
            .header("x-forwarded-user", USER)
            .json(body)
            .send()
            .await
            .expect("Failed to send DELETE request");

        TestResponse::from_response(res).await
    }

    pub async fn delete_applications(&self, names: &[&str]) -> TestResponse {
        let query: Vec<(&str, &str)> = names.iter().map(|n| ("applications[]", *n)).collect();
        let res = self
            .client
            .delete(self.url(&routes::applications()))
            .header("x-forwarded-user", USER)
            .query(&query)
            .send()
            .await
            .expect("Failed to send DELETE request");

        TestResponse::from_response(res).await
    }

    pub async fn upload(&self, app: &str, file_bytes: Vec<u8>) -> TestResponse {
        let part = reqwest::multipart::Part::bytes(file_bytes)
            .file_name("app.tar.gz")
            .mime_str("application/gzip")
            .expect("Failed to set MIME type");
        let form = reqwest::multipart::Form::new().part("file", part);

        let res = self
            .client
            .post(self.url(&routes::store(app)))
            .header("x-forwarded-user", USER)
            .multipart(form)
            .send()
            .await
            .expect("Failed to send upload request");

        TestResponse::from_response(res).await
    }

    pub async fn create_app(&self, name: &str) {
        let res = self
            .post(
                &routes::applications(),
                &json!({"name": name, "routes": [format!("{name}.example.com")]}),
            )
            .await;
        assert_eq!(res.status, 201, "create_app failed: {}", res.text);
    }

    pub async fn upload_blob(&self, app: &str) -> String {
        let res = self.upload(app, GZIP_ARCHIVE.to_vec()).await;
        assert_eq!(res.status, 200, "upload failed: {}", res.text);
        res.body["blobuid"].as_str().unwrap().to_string()
    }

    /// Stage `blob_uid` and return the stage ID.
    pub async fn stage(&self, app: &str, blob_uid: &str) -> String {
        let res = self
            .post(&routes::stage(app), &json!({"blobuid": blob_uid}))
            .await;
        assert_eq!(res.status, 200, "stage failed: {}", res.text);
        res.body["stage"]["id"].as_str().unwrap().to_string()
    }

    /// Report the build run as finished, the way the build pipeline would.
    pub async fn finish_build(&self, stage_id: &str, outcome: BuildOutcome) {
        self.lifecycle
            .builds()
            .complete(&BuildReport::new(stage_id, outcome))
            .await
            .expect("Failed to complete build run");
    }

    /// Create, upload, stage, build and deploy an application.
    pub async fn deployed_app(&self, name: &str) -> String {
        self.create_app(name).await;
        let uid = self.upload_blob(name).await;
        let stage_id = self.stage(name, &uid).await;
        self.finish_build(&stage_id, BuildOutcome::Succeeded).await;
        let res = self
            .post(&routes::deploy(name), &json!({"stage": {"id": stage_id}}))
            .await;
        assert_eq!(res.status, 200, "deploy failed: {}", res.text);
        stage_id
    }

    pub async fn create_dependent(&self, kind: &str, name: &str, data: Value) {
        let res = self
            .post(&routes::dependents(kind), &json!({"name": name, "data": data}))
            .await;
        assert_eq!(res.status, 201, "create {kind} failed: {}", res.text);
    }

    pub async fn bind(&self, app: &str, kind: &str, names: &[&str]) -> TestResponse {
        self.post(&routes::bindings(app, kind), &json!({"names": names}))
            .await
    }

    /// Current workload revision, `None` when not deployed.
    pub async fn revision(&self, app: &str) -> Option<u64> {
        let res = self.get(&routes::application(app)).await;
        assert_eq!(res.status, 200, "show failed: {}", res.text);
        res.body["workload"]["revision"].as_u64()
    }
}

impl TestResponse {
    pub async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let text = res.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self { status, text, body }
    }

    /// Title of the first error entry.
    pub fn error_title(&self) -> &str {
        self.body["errors"][0]["title"].as_str().unwrap_or_default()
    }
}
