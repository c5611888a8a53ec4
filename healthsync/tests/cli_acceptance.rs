use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

use tempfile::TempDir;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
    export_dir: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");
        let export_dir = base.join("export");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_data).expect("failed to create XDG_DATA_HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");
        fs::create_dir_all(&export_dir).expect("failed to create export dir");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_data,
            xdg_config,
            xdg_state,
            export_dir,
        }
    }

    fn write_config(&self, server_url: &str) {
        let dir = self.xdg_config.join("healthsync");
        fs::create_dir_all(&dir).expect("failed to create config dir");
        fs::write(
            dir.join("config.toml"),
            format!(
                "[sink]\nserver_url = \"{server_url}\"\nuser_id = \"S1234\"\ntimeout_secs = 5\n"
            ),
        )
        .expect("failed to write config");
    }

    fn write_export(&self, category: &str, lines: &[&str]) {
        fs::write(
            self.export_dir.join(format!("{category}.jsonl")),
            lines.join("\n"),
        )
        .expect("failed to write export");
    }

    fn artifact_dir(&self) -> PathBuf {
        self.xdg_data.join("healthsync/healthCSVFolder")
    }

    fn run_args(&self) -> Vec<String> {
        vec![
            "run".to_string(),
            "--from".to_string(),
            "2024-05-02".to_string(),
            "--to".to_string(),
            "2024-05-02".to_string(),
            "--source".to_string(),
            self.export_dir.display().to_string(),
        ]
    }
}

fn run_bin(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("healthsync"));

    Command::new(bin_path)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env("TZ", "UTC")
        .output()
        .unwrap_or_else(|e| panic!("failed to execute healthsync: {e}"))
}

/// Runs the binary off the async runtime so the mock server keeps serving
async fn run_bin_async(env: &CliTestEnv, args: Vec<String>) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("healthsync"));
    let mut command = Command::new(bin_path);
    command
        .args(&args)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env("TZ", "UTC");

    tokio::task::spawn_blocking(move || command.output())
        .await
        .expect("blocking task panicked")
        .unwrap_or_else(|e| panic!("failed to execute healthsync: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "healthsync {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

fn posted_payload(request: &wiremock::Request) -> String {
    let body: serde_json::Value =
        serde_json::from_slice(&request.body).expect("request body is not JSON");
    body["m2m:cin"]["con"]
        .as_str()
        .expect("missing m2m:cin.con")
        .to_string()
}

#[test]
fn status_reports_missing_user_id() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, &["status"]);
    assert_success(&["status"], &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("User ID:         <not set>"));
    assert!(
        stdout.contains("Status: Not ready"),
        "expected not-ready status, got:\n{stdout}"
    );
}

#[test]
fn status_shows_configured_sink() {
    let env = CliTestEnv::new();
    env.write_config("http://127.0.0.1:7579");

    let output = run_bin(&env, &["status"]);
    assert_success(&["status"], &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Server URL:      http://127.0.0.1:7579"));
    assert!(stdout.contains("User ID:         S1234"));
    assert!(stdout.contains("Status: Ready to upload"));
}

#[test]
fn run_without_user_id_fails() {
    let env = CliTestEnv::new();

    let output = run_bin(
        &env,
        &["run", "--from", "2024-05-02", "--to", "2024-05-02"],
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("sink is not configured"),
        "expected configuration error, got:\n{stderr}"
    );
}

#[test]
fn pending_with_empty_store() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, &["pending"]);
    assert_success(&["pending"], &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No pending artifacts."));
}

#[tokio::test(flavor = "multi_thread")]
async fn run_uploads_every_category_and_clears_artifacts() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&mock_server)
        .await;

    let env = CliTestEnv::new();
    env.write_config(&mock_server.uri());
    env.write_export(
        "steps",
        &[
            r#"{"start":"2024-05-01T08:00:00Z","end":"2024-05-01T08:10:00Z","device":"iPhone","value":120}"#,
            r#"{"start":"2024-05-02T09:00:00Z","end":"2024-05-02T09:05:00Z","device":"Watch","value":33.9}"#,
        ],
    );

    let args = env.run_args();
    let output = run_bin_async(&env, args.clone()).await;
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    assert_success(&arg_refs, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Run complete"), "got:\n{stdout}");

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 5, "one chunk per category");

    let steps = requests
        .iter()
        .find(|r| r.url.path() == "/Mobius/S1234/health/steps")
        .expect("steps chunk was not posted");
    assert_eq!(
        posted_payload(steps),
        "1714550400,1714551000,iPhone,120,1714640400,1714640700,Watch,33"
    );

    // Missing exports are failed queries and upload the failure sentinel
    let heart_rate = requests
        .iter()
        .find(|r| r.url.path() == "/Mobius/S1234/health/HR")
        .expect("heart rate chunk was not posted");
    assert_eq!(
        posted_payload(heart_rate),
        "1714521600,1714608000,iPhone,-1"
    );

    let leftovers: Vec<_> = fs::read_dir(env.artifact_dir())
        .expect("artifact dir should exist")
        .collect();
    assert!(leftovers.is_empty(), "artifacts should be removed after upload");
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_upload_leaves_artifacts_for_resume() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let env = CliTestEnv::new();
    env.write_config(&mock_server.uri());

    let output = run_bin_async(&env, env.run_args()).await;
    assert!(!output.status.success(), "run should fail when the sink rejects chunks");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("run 'resume' to retry"), "got:\n{stderr}");

    let output = run_bin_async(&env, vec!["pending".to_string()]).await;
    assert_success(&["pending"], &output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Pending artifacts (5):"), "got:\n{stdout}");
    assert!(stdout.contains("HR_0.csv"));

    mock_server.reset().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&mock_server)
        .await;

    let output = run_bin_async(&env, vec!["resume".to_string()]).await;
    assert_success(&["resume"], &output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Delivered 5 of 5 artifact(s)"), "got:\n{stdout}");

    let output = run_bin_async(&env, vec!["pending".to_string()]).await;
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No pending artifacts."), "got:\n{stdout}");
}
