use std::io::Read;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output};
use std::time::Duration;

const BIN: &str = env!("CARGO_BIN_EXE_cachefront");

struct TestServer {
    process: Child,
    base: String,
}

impl TestServer {
    fn spawn(args: &[&str], port: u16) -> Self {
        let process = Command::new(BIN)
            .args(args)
            .env_remove("RUST_LOG")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .expect("Failed to start server");

        Self {
            process,
            base: format!("http://127.0.0.1:{}", port),
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.process.kill();
        let _ = self.process.wait();
    }
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Poll until `url` answers 200; the loading page (418) means "not yet"
async fn wait_until_ready(url: &str, server: &mut TestServer) -> bool {
    let client = reqwest::Client::new();
    for _ in 0..100 {
        if let Ok(Some(status)) = server.process.try_wait() {
            eprintln!("Server exited unexpectedly with status: {}", status);
            if let Some(mut stderr) = server.process.stderr.take() {
                let mut s = String::new();
                stderr.read_to_string(&mut s).unwrap();
                eprintln!("STDERR:\n{}", s);
            }
            return false;
        }

        if let Ok(response) = client.get(url).send().await {
            if response.status() == 200 {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

fn write_site(root: &Path) {
    std::fs::write(root.join("index.html"), "<h1>cachefront</h1>").unwrap();
    std::fs::write(root.join("app.js"), "console.log('hello');\n".repeat(400)).unwrap();
    std::fs::write(root.join("setup.php"), "<?php echo 1;").unwrap();
    std::fs::create_dir(root.join("docs")).unwrap();
    std::fs::write(root.join("docs").join("guide.txt"), "read me").unwrap();
}

fn write_config(dir: &Path, port: u16, admin_port: u16) -> PathBuf {
    let settings = dir.join("settings.toml");
    std::fs::write(
        &settings,
        r#"
[values]
default_document = "/index.html"
brotli_enabled = false

[[mime]]
pattern = "^html$"
type = "text/html; charset=utf-8"

[[mime]]
pattern = "^js$"
type = "text/javascript"

[[forbidden]]
kind = "extension"
data = "php"
"#,
    )
    .unwrap();

    let config = dir.join("cachefront.toml");
    std::fs::write(
        &config,
        format!(
            "listen = \"127.0.0.1:{port}\"\nsites_dir = {site:?}\nsettings_file = {settings:?}\n\n\
             [admin]\nlisten = \"127.0.0.1:{admin_port}\"\n",
            site = dir.join("site"),
        ),
    )
    .unwrap();
    config
}

#[tokio::test]
async fn test_file_server_mode() {
    let site = tempfile::tempdir().unwrap();
    write_site(site.path());
    let port = free_port();
    let listen = format!("127.0.0.1:{}", port);
    let root = site.path().to_str().unwrap();

    let mut server = TestServer::spawn(&["file-server", "--listen", &listen, "--root", root], port);
    let url = format!("{}/", server.base);
    assert!(wait_until_ready(&url, &mut server).await, "server did not become ready");

    let response = reqwest::get(&url).await.unwrap();
    assert_eq!(response.headers()["content-type"], "text/html; charset=utf-8");
    assert_eq!(response.text().await.unwrap(), "<h1>cachefront</h1>");

    let response = reqwest::Client::new()
        .get(format!("{}/app.js", server.base))
        .header("accept-encoding", "gzip")
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers()["content-encoding"], "gzip");
    let body = response.bytes().await.unwrap();
    let mut decoded = String::new();
    flate2::read::GzDecoder::new(&body[..])
        .read_to_string(&mut decoded)
        .unwrap();
    assert_eq!(decoded, "console.log('hello');\n".repeat(400));

    let response = reqwest::get(format!("{}/docs", server.base)).await.unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_run_with_settings_and_admin() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("site")).unwrap();
    write_site(&dir.path().join("site"));
    let port = free_port();
    let admin_port = free_port();
    let config = write_config(dir.path(), port, admin_port);

    let mut server = TestServer::spawn(&["run", config.to_str().unwrap()], port);
    let url = format!("{}/index.html", server.base);
    assert!(wait_until_ready(&url, &mut server).await, "server did not become ready");
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/setup.php", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    let response = client
        .get(format!("{}/app.js", server.base))
        .header("accept-encoding", "br, gzip")
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers()["content-type"], "text/javascript");
    // Brotli is disabled in the settings document
    assert_eq!(response.headers()["content-encoding"], "gzip");

    let admin = format!("http://127.0.0.1:{}", admin_port);
    let health: serde_json::Value = client
        .get(format!("{}/health", admin))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["ready"], true);
    assert_eq!(health["last_build"]["files"], 4);

    std::fs::write(dir.path().join("site").join("new.html"), "fresh").unwrap();
    let response = client.post(format!("{}/reload", admin)).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let response = client.get(format!("{}/new.html", server.base)).send().await.unwrap();
    assert_eq!(response.text().await.unwrap(), "fresh");

    let metrics = client
        .get(format!("{}/metrics", admin))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("cachefront_responses_total"));
}

fn run_cli(args: &[&str]) -> Output {
    Command::new(BIN).args(args).output().expect("Failed to run cachefront")
}

#[test]
fn test_validate_command() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("site")).unwrap();
    let config = write_config(dir.path(), 8080, 9090);

    let output = run_cli(&["validate", config.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("is valid"));

    std::fs::write(
        dir.path().join("settings.toml"),
        "[[forbidden]]\nkind = \"regex\"\ndata = \"(unclosed\"\n",
    )
    .unwrap();
    let output = run_cli(&["validate", config.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Configuration Error"));
}

#[test]
fn test_version_command() {
    let output = run_cli(&["version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("Cachefront v"));
}
