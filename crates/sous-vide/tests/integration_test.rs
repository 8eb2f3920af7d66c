use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn binary() -> &'static str {
    env!("CARGO_BIN_EXE_sous-vide")
}

struct CookerProcess {
    child: Child,
    addr: String,
}

impl CookerProcess {
    fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .expect("Failed to bind ephemeral port for integration test");
        let addr = listener
            .local_addr()
            .expect("Failed to resolve bound address");
        let bind_addr = format!("127.0.0.1:{}", addr.port());
        drop(listener);

        let child = Command::new(binary())
            .args([
                "--time-scale",
                "60",
                "--sample-period",
                "0.2",
                "--cycle-time",
                "2",
                "--min-duration",
                "0.1",
                "--run-seconds",
                "30",
                "--bind",
                &bind_addr,
            ])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("Failed to start sous-vide");

        // Loop until port is open (up to 5s)
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(5) {
            if TcpStream::connect(&bind_addr).is_ok() {
                break;
            }
            thread::sleep(Duration::from_millis(100));
        }

        Self {
            child,
            addr: bind_addr,
        }
    }

    fn request(&self, method: &str, path: &str, body: Option<(&str, &str)>) -> (u16, String) {
        let mut stream = TcpStream::connect(&self.addr).expect("Failed to connect to sous-vide");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("Failed to set read timeout");

        let mut raw = format!("{method} {path} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n", self.addr);
        match body {
            Some((content_type, body)) => {
                raw.push_str(&format!(
                    "Content-Type: {content_type}\r\nContent-Length: {}\r\n\r\n{body}",
                    body.len()
                ));
            }
            None => raw.push_str("\r\n"),
        }
        stream.write_all(raw.as_bytes()).expect("Failed to send request");

        let mut response = String::new();
        stream
            .read_to_string(&mut response)
            .expect("Failed to read response");
        let (head, body) = response
            .split_once("\r\n\r\n")
            .expect("response without header terminator");
        let status = head
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
            .expect("response without status code");
        (status, body.to_string())
    }

    fn state(&self) -> serde_json::Value {
        let (status, body) = self.request("GET", "/state", None);
        assert_eq!(status, 200);
        serde_json::from_str(&body).expect("state should be JSON")
    }
}

impl Drop for CookerProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[test]
fn state_endpoint_reports_samples() {
    let cooker = CookerProcess::start();

    let start = Instant::now();
    let mut state = cooker.state();
    while state["temperature"].is_null() && start.elapsed() < Duration::from_secs(5) {
        thread::sleep(Duration::from_millis(100));
        state = cooker.state();
    }

    assert_eq!(state["target"], 78.0);
    let temperature = state["temperature"].as_f64().expect("a sample should have arrived");
    assert!((60.0..90.0).contains(&temperature), "temperature {temperature}");
    let setting = state["setting"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&setting));
}

#[test]
fn form_post_updates_target() {
    let cooker = CookerProcess::start();

    let (status, body) = cooker.request(
        "POST",
        "/state",
        Some(("application/x-www-form-urlencoded", "target=100&kp=0.5")),
    );
    assert_eq!(status, 200, "{body}");

    let state = cooker.state();
    assert_eq!(state["target"], 100.0);
    assert_eq!(state["kp"], 0.5);
}

#[test]
fn rejected_updates_leave_state_unchanged() {
    let cooker = CookerProcess::start();

    let (status, _) = cooker.request(
        "POST",
        "/state",
        Some(("application/x-www-form-urlencoded", "target=90&setting=1")),
    );
    assert_eq!(status, 400);
    let (status, _) = cooker.request(
        "POST",
        "/state",
        Some(("application/x-www-form-urlencoded", "target=warm")),
    );
    assert_eq!(status, 400);
    assert_eq!(cooker.state()["target"], 78.0);

    let (status, _) = cooker.request("GET", "/missing", None);
    assert_eq!(status, 404);
}

#[test]
fn root_serves_cooker_page() {
    let cooker = CookerProcess::start();

    let (status, page) = cooker.request("GET", "/", None);
    assert_eq!(status, 200);
    assert!(page.contains("<form id=\"tuning\">"), "{page}");

    let (status, script) = cooker.request("GET", "/cooker.js", None);
    assert_eq!(status, 200);
    assert!(script.contains("fetch(\"/state\")"));
}

#[test]
fn timed_run_exits_cleanly_and_writes_log_file() {
    let dir = tempfile::tempdir().unwrap();
    let status = Command::new(binary())
        .args(["--simulate", "--no-server", "--run-seconds", "0.5", "--log-dir"])
        .arg(dir.path())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("Failed to run sous-vide");
    assert!(status.success());

    let files = std::fs::read_dir(dir.path()).unwrap().count();
    assert!(files > 0, "no log file written");
}

#[test]
fn unknown_flag_fails() {
    let status = Command::new(binary())
        .arg("--definitely-not-a-flag")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("Failed to run sous-vide");
    assert!(!status.success());
}

#[test]
fn oversized_durations_are_config_errors() {
    for flag in ["--run-seconds", "--sample-period"] {
        let output = Command::new(binary())
            .args(["--simulate", "--no-server", flag, "1e30"])
            .stdout(Stdio::null())
            .output()
            .expect("Failed to run sous-vide");
        assert_eq!(output.status.code(), Some(1), "{flag}");
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains(flag), "{stderr}");
    }
}
