use assert_cmd::Command;

fn quizr(home: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("quizr").unwrap();
    cmd.env("HOME", home).env("XDG_CONFIG_HOME", home.join("config"));
    cmd
}

#[test]
fn refuses_to_run_without_a_terminal() {
    let home = tempfile::tempdir().unwrap();
    let assert = quizr(home.path()).assert().failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).into_owned();
    assert!(stderr.contains("stdin must be a tty"), "stderr: {stderr}");
}

#[test]
fn help_lists_the_debug_flag() {
    let home = tempfile::tempdir().unwrap();
    let assert = quizr(home.path()).arg("--help").assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    assert!(stdout.contains("--debug-questions"));
}

#[test]
fn clear_works_headless() {
    let home = tempfile::tempdir().unwrap();
    let db = home.path().join("progress.db");
    let assert = quizr(home.path())
        .args(["--variant", "yes-no", "--clear", "--db"])
        .arg(&db)
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    assert!(stdout.contains("cleared stored yes-no progress"), "stdout: {stdout}");
    assert!(db.exists());
}
