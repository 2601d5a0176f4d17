use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static TEMP_NONCE: AtomicU64 = AtomicU64::new(0);

fn wpp_bin() -> PathBuf {
    if let Some(path) = option_env!("CARGO_BIN_EXE_wpp") {
        return PathBuf::from(path);
    }

    let mut exe = std::env::current_exe().expect("test executable path should be known");
    exe.pop();
    if exe.file_name().and_then(|name| name.to_str()) == Some("deps") {
        exe.pop();
    }
    exe.join("wpp")
}

fn temp_source_path(prefix: &str) -> PathBuf {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time should move forward")
        .as_nanos();
    let counter = TEMP_NONCE.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("{prefix}-{timestamp}-{counter}.wpp"))
}

fn write_temp_source(prefix: &str, contents: &str) -> PathBuf {
    let path = temp_source_path(prefix);
    std::fs::write(&path, contents).expect("temp source write should succeed");
    path
}

#[test]
fn wpp_prints_the_document_value() {
    let path = write_temp_source(
        "wpp-cli-hello",
        r#"let greet(x) "hello " .. x greet("world")"#,
    );

    let output = Command::new(wpp_bin())
        .arg(&path)
        .output()
        .expect("wpp should execute");

    let _ = std::fs::remove_file(path);

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "hello world");
}

#[test]
fn wpp_concatenates_multiple_files_in_order() {
    let first = write_temp_source("wpp-cli-first", r#""one ""#);
    let second = write_temp_source("wpp-cli-second", r#""two""#);

    let output = Command::new(wpp_bin())
        .arg(&first)
        .arg(&second)
        .output()
        .expect("wpp should execute");

    let _ = std::fs::remove_file(first);
    let _ = std::fs::remove_file(second);

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "one two");
}

#[test]
fn definitions_flow_into_later_files() {
    let first = write_temp_source("wpp-cli-defs", r#"let shout(x) x .. "!""#);
    let second = write_temp_source("wpp-cli-uses", r#"shout("hey")"#);

    let output = Command::new(wpp_bin())
        .arg(&first)
        .arg(&second)
        .output()
        .expect("wpp should execute");

    let _ = std::fs::remove_file(first);
    let _ = std::fs::remove_file(second);

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "hey!");
}

#[test]
fn parse_errors_exit_nonzero_with_a_located_diagnostic() {
    let path = write_temp_source("wpp-cli-parse-error", "let greet(");

    let output = Command::new(wpp_bin())
        .arg(&path)
        .output()
        .expect("wpp should execute");

    let _ = std::fs::remove_file(&path);

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty(), "no output on failure");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error[E0002]"), "stderr was: {stderr}");
    assert!(
        stderr.contains(&path.display().to_string()),
        "stderr should name the file: {stderr}"
    );
}

#[test]
fn runtime_errors_exit_nonzero() {
    let path = write_temp_source("wpp-cli-runtime-error", "nope");

    let output = Command::new(wpp_bin())
        .arg(&path)
        .output()
        .expect("wpp should execute");

    let _ = std::fs::remove_file(path);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error[E0003]"), "stderr was: {stderr}");
}

#[test]
fn disable_run_rejects_subprocess_intrinsics() {
    let path = write_temp_source("wpp-cli-disable-run", r#"run("echo hi")"#);

    let output = Command::new(wpp_bin())
        .arg("--disable-run")
        .arg(&path)
        .output()
        .expect("wpp should execute");

    let _ = std::fs::remove_file(path);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("disabled"), "stderr was: {stderr}");
}

#[test]
fn no_arguments_prints_usage_and_fails() {
    let output = Command::new(wpp_bin())
        .output()
        .expect("wpp should execute");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("usage"));
}

#[test]
fn repl_evaluates_lines_and_recovers_from_errors() {
    use std::io::Write;
    use std::process::Stdio;

    let mut child = Command::new(wpp_bin())
        .arg("--repl")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("wpp --repl should start");

    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(b"let f(x) x .. x\nbroken(\nf(\"ab\")\n")
        .expect("writing to the repl should succeed");

    let output = child
        .wait_with_output()
        .expect("wpp --repl should terminate on EOF");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("abab"), "stdout was: {stdout}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error["), "stderr was: {stderr}");
}
