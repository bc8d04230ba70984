//! End-to-end tests: MongoDB in a container, the server as a child
//! process, plain reqwest as the client. Run with
//! `cargo test --features e2e` from the tests crate.

use std::time::Duration;

use cart_shared::heartbeat::HeartbeatResponse;
use serde_json::Value;
use testcontainers::{
    GenericImage,
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
};
use tokio::time::sleep;
use uuid::Uuid;

const ADMIN_USERNAME: &str = "e2e-admin";
const ADMIN_PASSWORD: &str = "e2e-password";

async fn start_mongo() -> (String, testcontainers::ContainerAsync<GenericImage>) {
    let image = GenericImage::new("mongo", "7.0.5")
        .with_exposed_port(27017.tcp())
        .with_wait_for(WaitFor::message_on_stdout("Waiting for connections"));
    let container = image.start().await.expect("Failed to start MongoDB");
    let port = container.get_host_port_ipv4(27017).await.unwrap();
    (format!("mongodb://127.0.0.1:{port}"), container)
}

struct TestServer {
    child: tokio::process::Child,
    base_url: String,
    _workdir: tempfile::TempDir,
}

impl TestServer {
    /// Launches `cart-server` against the given Mongo and waits for its
    /// heartbeat to come up.
    async fn start(mongo_uri: &str, port: u16) -> Self {
        let workdir = tempfile::tempdir().expect("Failed to create workdir");
        let library = workdir.path().join("library/roms");
        std::fs::create_dir_all(&library).unwrap();

        let child = tokio::process::Command::new("cargo")
            .args(["run", "--package", "cart-server"])
            .current_dir(env!("CARGO_MANIFEST_DIR").to_string() + "/..")
            .env("MONGO_URI", mongo_uri)
            .env("MONGO_DB", format!("e2e_{}", Uuid::new_v4().simple()))
            .env("HOST", "127.0.0.1")
            .env("PORT", port.to_string())
            .env("AUTH_SECRET_KEY", "e2e-secret")
            .env("ADMIN_USERNAME", ADMIN_USERNAME)
            .env("ADMIN_PASSWORD", ADMIN_PASSWORD)
            .env("LIBRARY_PATH", workdir.path().join("library"))
            .env("ASSETS_PATH", workdir.path().join("assets"))
            .env("RESOURCES_PATH", workdir.path().join("resources"))
            .env("CONFIG_PATH", workdir.path().join("config.yml"))
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .expect("Failed to start server");

        let base_url = format!("http://127.0.0.1:{port}");
        let server = Self {
            child,
            base_url,
            _workdir: workdir,
        };
        server.wait_until_up().await;
        server
    }

    /// The first request may hit a cold cargo build, so the deadline is
    /// generous.
    async fn wait_until_up(&self) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(180);
        loop {
            if let Ok(response) =
                reqwest::get(format!("{}/api/heartbeat", self.base_url)).await
            {
                if response.status().is_success() {
                    return;
                }
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "Server did not come up in time"
            );
            sleep(Duration::from_millis(500)).await;
        }
    }

    async fn login(&self) -> String {
        let response = reqwest::Client::new()
            .post(format!("{}/api/token", self.base_url))
            .form(&[
                ("grant_type", "password"),
                ("username", ADMIN_USERNAME),
                ("password", ADMIN_PASSWORD),
            ])
            .send()
            .await
            .expect("Token request failed");
        assert!(response.status().is_success(), "Login failed");

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["token_type"], "bearer");
        assert!(body["refresh_token"].as_str().is_some_and(|t| !t.is_empty()));
        body["access_token"].as_str().unwrap().to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
    }
}

#[tokio::test]
async fn heartbeat_reports_all_subsystems() {
    let (mongo_uri, _mongo) = start_mongo().await;
    let server = TestServer::start(&mongo_uri, 8091).await;

    let raw: Value = reqwest::get(format!("{}/api/heartbeat", server.base_url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // The six upper-cased keys are a wire contract.
    let keys = raw.as_object().unwrap();
    for key in [
        "VERSION",
        "NEW_VERSION",
        "WATCHER",
        "SCHEDULER",
        "ANY_SOURCE_ENABLED",
        "METADATA_SOURCES",
    ] {
        assert!(keys.contains_key(key), "missing heartbeat key {key}");
    }

    let heartbeat: HeartbeatResponse = serde_json::from_value(raw).unwrap();
    assert!(!heartbeat.version.is_empty());
    // No credentials configured in this environment.
    assert!(!heartbeat.any_source_enabled);
    assert_eq!(heartbeat.metadata_sources["IGDB_API_ENABLED"], false);
    assert!(heartbeat.scheduler.get("RESCAN").is_some());
    assert_eq!(heartbeat.watcher["ENABLED"], false);
}

#[tokio::test]
async fn token_flow_and_current_user() {
    let (mongo_uri, _mongo) = start_mongo().await;
    let server = TestServer::start(&mongo_uri, 8092).await;

    let token = server.login().await;

    let me: Value = reqwest::Client::new()
        .get(format!("{}/api/users/me", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["username"], ADMIN_USERNAME);
    assert_eq!(me["role"], "admin");

    // No token, no user list.
    let unauthorized = reqwest::get(format!("{}/api/users", server.base_url))
        .await
        .unwrap();
    assert_eq!(unauthorized.status().as_u16(), 401);
}

#[tokio::test]
async fn config_is_readable_without_auth() {
    let (mongo_uri, _mongo) = start_mongo().await;
    let server = TestServer::start(&mongo_uri, 8093).await;

    let config: Value = reqwest::get(format!("{}/api/config", server.base_url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(config["ROMS_FOLDER_NAME"], "roms");
    assert_eq!(config["FIRMWARE_FOLDER_NAME"], "bios");
}
