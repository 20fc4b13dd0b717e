//! Helpers for running the controller against the stub emulator binary

#![allow(dead_code)]

use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use dsemu::{ControlClient, ControlEndpoint, EmulatorConfig};
use shared::env_vars;

pub fn stub_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_stub-emulator"))
}

/// Remove every datastore variable so discovery finds nothing
pub fn clear_datastore_env() {
    for name in env_vars::ALL {
        // SAFETY: suites touching the environment run under #[serial].
        unsafe { std::env::remove_var(name) };
    }
}

pub fn advertise(url: &str, project: &str) {
    // SAFETY: suites touching the environment run under #[serial].
    unsafe {
        std::env::set_var(env_vars::DATASTORE_HOST, url);
        std::env::set_var(env_vars::DATASTORE_PROJECT_ID, project);
    }
}

pub fn free_port() -> u16 {
    TcpListener::bind(("127.0.0.1", 0))
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

pub fn port_is_listening(port: u16) -> bool {
    TcpStream::connect(("127.0.0.1", port)).is_ok()
}

#[cfg(unix)]
pub fn process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// Controller configuration launching the stub instead of gcloud
pub fn stub_config(port: u16) -> EmulatorConfig {
    EmulatorConfig::builder()
        .port(port)
        .binary(stub_binary())
        .startup_timeout(Duration::from_secs(10))
        .poll_interval(Duration::from_millis(50))
        .shutdown_grace(Duration::from_secs(2))
        .build()
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

pub async fn entity_count(base_url: &str) -> u64 {
    let body: serde_json::Value = http_client()
        .get(format!("{base_url}/entities"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["count"].as_u64().unwrap()
}

pub async fn put_entity(base_url: &str, kind: &str, name: &str) {
    let response = http_client()
        .put(format!("{base_url}/entities/{kind}/{name}"))
        .json(&serde_json::json!({ "name": name }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
}

/// A stub started outside any controller, killed when dropped
pub struct SharedInstance {
    child: Child,
    pub port: u16,
}

impl SharedInstance {
    pub async fn start(project: &str) -> Self {
        let port = free_port();
        let child = Command::new(stub_binary())
            .args(["beta", "emulators", "datastore", "start"])
            .arg(format!("--host-port=localhost:{port}"))
            .arg(format!("--project={project}"))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();

        let instance = Self { child, port };
        let client = ControlClient::from_base_url(instance.base_url()).unwrap();
        let deadline = Instant::now() + Duration::from_secs(10);
        while !client.health().await {
            assert!(Instant::now() < deadline, "shared stub never became healthy");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        instance
    }

    pub fn base_url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }
}

impl Drop for SharedInstance {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
