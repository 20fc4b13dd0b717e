//! Helpers for driving the controller against throwaway launcher scripts

#![allow(dead_code)]

use std::fs;
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::time::Duration;

use dsemu::EmulatorConfig;
use shared::env_vars;

/// Remove every datastore variable so discovery finds nothing
pub fn clear_datastore_env() {
    for name in env_vars::ALL {
        // SAFETY: suites touching the environment run under #[serial].
        unsafe { std::env::remove_var(name) };
    }
}

/// Advertise a running emulator the way a previous session would
pub fn advertise(url: &str, project: &str) {
    // SAFETY: suites touching the environment run under #[serial].
    unsafe {
        std::env::set_var(env_vars::DATASTORE_HOST, url);
        std::env::set_var(env_vars::DATASTORE_PROJECT_ID, project);
    }
}

/// Write an executable shell script standing in for the emulator launcher
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A loopback port nothing is listening on
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

/// Read a pid written by a launcher script, waiting briefly for the file
pub fn read_pid(path: &Path) -> u32 {
    for _ in 0..50 {
        if let Ok(text) = fs::read_to_string(path) {
            if let Ok(pid) = text.trim().parse() {
                return pid;
            }
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    panic!("no pid written to {}", path.display());
}

/// Short timeouts so failure paths finish quickly
pub fn fast_config(binary: &Path, port: u16) -> EmulatorConfig {
    EmulatorConfig::builder()
        .host("127.0.0.1")
        .port(port)
        .binary(binary)
        .startup_timeout(Duration::from_secs(1))
        .poll_interval(Duration::from_millis(50))
        .shutdown_grace(Duration::from_millis(500))
        .build()
}
