use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::net::TcpListener;
use std::path::Path;
use tempfile::{tempdir, TempDir};

/// Creates a small MkDocs site: two pages on disk, one nav entry pointing nowhere.
fn create_site() -> TempDir {
    let dir = tempdir().expect("Creating temp site dir failed");
    let root = dir.path();
    fs::create_dir_all(root.join("docs/guides")).unwrap();
    fs::write(root.join("docs/index.md"), "# Home\n").unwrap();
    fs::write(root.join("docs/guides/tutorial.md"), "# Tutorial\n").unwrap();
    fs::write(
        root.join("mkdocs.yml"),
        "site_name: Test\nnav:\n  - Home: index.md\n  - Guides:\n      - Tutorial: guides/tutorial.md\n      - Gone: guides/gone.md\n  - Source: https://github.com/example/site\n",
    )
    .expect("Writing temp config failed");
    dir
}

fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

fn bin(site: &Path) -> Command {
    let mut cmd = Command::cargo_bin("diataxis-scan").expect("Binary exists");
    cmd.current_dir(site).env_remove("OPENAI_API_KEY");
    cmd
}

#[test]
fn nav_subcommand_prints_flattened_paths() {
    let site = create_site();
    let output = bin(site.path())
        .arg("nav")
        .arg("--config")
        .arg(site.path().join("mkdocs.yml"))
        .output()
        .unwrap();
    assert!(output.status.success());
    let refs: Vec<String> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(refs, vec!["index.md", "guides/tutorial.md", "guides/gone.md"]);
}

#[test]
fn hosted_provider_without_key_fails_before_processing() {
    let site = create_site();
    bin(site.path())
        .arg("classify")
        .arg("--config")
        .arg(site.path().join("mkdocs.yml"))
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("OPENAI_API_KEY"));
}

#[test]
fn missing_config_is_fatal() {
    let site = create_site();
    bin(site.path())
        .args(["classify", "--provider", "local", "--config"])
        .arg(site.path().join("absent.yml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not load site config"));
}

#[test]
fn malformed_nav_is_fatal() {
    let site = create_site();
    fs::write(site.path().join("mkdocs.yml"), "nav:\n  - Broken:\n").unwrap();
    bin(site.path())
        .args(["nav", "--config"])
        .arg(site.path().join("mkdocs.yml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid navigation"));
}

#[test]
fn per_file_failures_do_not_fail_the_run() {
    let site = create_site();
    let output = bin(site.path())
        .args(["classify", "--provider", "local", "--delay-ms", "0"])
        .arg("--ollama-host")
        .arg(closed_port_url())
        .arg("--config")
        .arg(site.path().join("mkdocs.yml"))
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(report.as_object().unwrap().is_empty());
}

#[test]
fn include_errors_marks_failed_entries() {
    let site = create_site();
    let output = bin(site.path())
        .args(["classify", "-p", "ollama", "--delay-ms", "0", "--include-errors"])
        .arg("--ollama-host")
        .arg(closed_port_url())
        .arg("--config")
        .arg(site.path().join("mkdocs.yml"))
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    // Keys appear in navigation order.
    let positions: Vec<usize> = ["\"index.md\"", "\"guides/tutorial.md\"", "\"guides/gone.md\""]
        .iter()
        .map(|k| stdout.find(k).expect("key present"))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));

    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let obj = report.as_object().unwrap();
    assert_eq!(obj.len(), 3);
    assert!(obj["guides/gone.md"]["error"]
        .as_str()
        .unwrap()
        .contains("missing file"));
    assert!(obj["index.md"]["error"]
        .as_str()
        .unwrap()
        .contains("network error"));
}

fn git(dir: &Path, args: &[&str]) {
    let output = std::process::Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["-c", "user.name=Docs Bot", "-c", "user.email=docs@example.com"])
        .args(["-c", "commit.gpgsign=false"])
        .args(args)
        .output()
        .expect("git must be installed");
    assert!(output.status.success(), "git {args:?} failed");
}

#[test]
fn existing_checkout_update_keeps_stdout_pure_json() {
    let site = create_site();
    let root = site.path();
    fs::write(root.join("mkdocs.yml"), "nav:\n  - External: ext/doc/a.md\n").unwrap();

    let upstream = root.join("upstream");
    fs::create_dir_all(upstream.join("doc")).unwrap();
    git(&upstream, &["init", "-q"]);
    fs::write(upstream.join("doc/a.md"), "# A\n").unwrap();
    git(&upstream, &["add", "."]);
    git(&upstream, &["commit", "-q", "-m", "initial"]);

    // Pre-existing working copy: the run pulls instead of cloning.
    let clone_dir = root.join("clones");
    fs::create_dir_all(&clone_dir).unwrap();
    git(
        &clone_dir,
        &["clone", "-q", upstream.to_str().unwrap(), "ext"],
    );

    let output = bin(root)
        .args(["classify", "-p", "local", "--delay-ms", "0", "--include-errors"])
        .arg("--ollama-host")
        .arg(closed_port_url())
        .arg("--clone-dir")
        .arg(&clone_dir)
        .arg("--repo")
        .arg(format!("ext={}", upstream.display()))
        .arg("--config")
        .arg(root.join("mkdocs.yml"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout)
        .unwrap_or_else(|e| panic!("stdout is not JSON ({e}): {}", String::from_utf8_lossy(&output.stdout)));
    // The page was read from the checkout; only the provider call failed.
    assert!(report["ext/doc/a.md"]["error"]
        .as_str()
        .unwrap()
        .contains("network error"));
}
