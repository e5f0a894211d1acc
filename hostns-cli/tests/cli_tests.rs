use std::fs;
use std::io::{BufRead, BufReader};
use std::process::Stdio;

use assert_cmd::Command;
use predicates::prelude::*;

/// Binary with the `HOSTNS_*` environment cleared and no namespace switch
fn hostns() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_hostns"));
    cmd.env_remove("HOSTNS_PROC_DIR")
        .env_remove("HOSTNS_OS_RELEASE")
        .env_remove("HOSTNS_LOCK_TIMEOUT_MS")
        .env_remove("RUST_LOG")
        .args(["--process", "none"]);
    cmd
}

#[test]
fn test_help_command() {
    Command::new(env!("CARGO_BIN_EXE_hostns"))
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("namespace of a host process"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("ls"))
        .stdout(predicate::str::contains("cat"))
        .stdout(predicate::str::contains("write"))
        .stdout(predicate::str::contains("empty-files"))
        .stdout(predicate::str::contains("lock"))
        .stdout(predicate::str::contains("distro"));
}

#[test]
fn test_version_command() {
    Command::new(env!("CARGO_BIN_EXE_hostns"))
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("hostns"));
}

#[test]
fn test_invalid_command() {
    Command::new(env!("CARGO_BIN_EXE_hostns"))
        .arg("invalid")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_invalid_process_name() {
    Command::new(env!("CARGO_BIN_EXE_hostns"))
        .args(["--process", "usr/bin/kubelet", "ls", "/tmp"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid process name"));
}

#[test]
fn test_write_then_cat() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("hello.txt");

    hostns()
        .arg("write")
        .arg(&file)
        .arg("hello from the host")
        .arg("--sync")
        .assert()
        .success();

    hostns()
        .arg("cat")
        .arg(&file)
        .assert()
        .success()
        .stdout("hello from the host");
}

#[test]
fn test_write_from_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("piped");

    hostns()
        .arg("write")
        .arg(&file)
        .write_stdin("piped content\n")
        .assert()
        .success();

    assert_eq!(fs::read_to_string(&file).unwrap(), "piped content\n");
}

#[test]
fn test_cat_missing_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("absent");

    hostns()
        .arg("cat")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error: failed to read file content of"))
        .stderr(predicate::str::contains(file.display().to_string()));
}

#[test]
fn test_ls_sorted_with_kinds() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("b.conf"), "").unwrap();
    fs::create_dir(dir.path().join("a.d")).unwrap();

    hostns()
        .arg("ls")
        .arg(dir.path())
        .assert()
        .success()
        .stdout("dir     a.d\nfile    b.conf\n");
}

#[test]
fn test_mkdir_and_stat() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("var/lib/app");

    hostns()
        .arg("mkdir")
        .arg(&target)
        .args(["--mtime", "1600000000"])
        .assert()
        .success()
        .stdout(predicate::str::contains(target.display().to_string()));

    hostns()
        .arg("stat")
        .arg(&target)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"kind\": \"dir\""))
        .stdout(predicate::str::contains("\"modified\": 1600000000"));
}

#[test]
fn test_rm_top_level_prohibited() {
    hostns()
        .args(["rm", "--recursive-dir", "/var"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to remove host directory /var"))
        .stderr(predicate::str::contains("prohibited operation on top level path /var"));

    hostns()
        .args(["rm", "/"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("prohibited"));
}

#[test]
fn test_rm_directory_tree() {
    let dir = tempfile::tempdir().unwrap();
    let tree = dir.path().join("data");
    fs::create_dir_all(tree.join("nested")).unwrap();
    fs::write(tree.join("nested/file"), "x").unwrap();

    hostns()
        .args(["rm", "--recursive-dir"])
        .arg(&tree)
        .assert()
        .success();

    assert!(!tree.exists());
}

#[test]
fn test_cp_and_empty_files() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    fs::create_dir_all(src.join("sub")).unwrap();
    fs::write(src.join("sub/empty"), "").unwrap();
    fs::write(src.join("full"), "content").unwrap();

    hostns().arg("cp").arg(&src).arg(&dst).assert().success();
    assert_eq!(fs::read_to_string(dst.join("full")).unwrap(), "content");

    hostns()
        .arg("empty-files")
        .arg(&dst)
        .assert()
        .success()
        .stdout(format!("{}\n", dst.join("sub/empty").display()));
}

#[test]
fn test_df_json() {
    let dir = tempfile::tempdir().unwrap();

    hostns()
        .arg("df")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"storage_maximum\""))
        .stdout(predicate::str::contains("\"block_size\""));
}

#[test]
fn test_distro_talos_uses_kubelet() {
    let dir = tempfile::tempdir().unwrap();
    let release = dir.path().join("os-release");
    fs::write(&release, "NAME=\"Talos\"\nID=\"talos\"\nVERSION_ID=v1.7\n").unwrap();

    hostns()
        .arg("distro")
        .env("HOSTNS_OS_RELEASE", &release)
        .assert()
        .success()
        .stdout(predicate::str::contains("distro:  talos"))
        .stdout(predicate::str::contains("process: kubelet"));
}

#[test]
fn test_distro_other_uses_no_switch() {
    let dir = tempfile::tempdir().unwrap();
    let release = dir.path().join("os-release");
    fs::write(&release, "ID=ubuntu\nID_LIKE=debian\n").unwrap();

    hostns()
        .arg("distro")
        .arg("--os-release")
        .arg(&release)
        .assert()
        .success()
        .stdout(predicate::str::contains("distro:  ubuntu"))
        .stdout(predicate::str::contains("process: none"));
}

#[test]
fn test_distro_missing_release_file() {
    let dir = tempfile::tempdir().unwrap();

    hostns()
        .arg("distro")
        .arg("--os-release")
        .arg(dir.path().join("missing"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}

#[test]
fn test_named_process_not_found() {
    let proc_dir = tempfile::tempdir().unwrap();

    Command::new(env!("CARGO_BIN_EXE_hostns"))
        .arg("--proc-dir")
        .arg(proc_dir.path())
        .args(["--process", "kubelet", "ls", "/tmp"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("process kubelet not found"));
}

#[test]
fn test_lock_hold_and_release() {
    let dir = tempfile::tempdir().unwrap();
    let lock = dir.path().join("lock");

    hostns()
        .arg("lock")
        .arg(&lock)
        .args(["--hold-ms", "10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("locked"))
        .stdout(predicate::str::contains("released"));
}

#[test]
fn test_lock_times_out_while_held_elsewhere() {
    let dir = tempfile::tempdir().unwrap();
    let lock = dir.path().join("lock");

    let mut holder = std::process::Command::new(env!("CARGO_BIN_EXE_hostns"))
        .args(["--process", "none", "lock"])
        .arg(&lock)
        .args(["--hold-ms", "3000"])
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();

    let mut first_line = String::new();
    BufReader::new(holder.stdout.take().unwrap())
        .read_line(&mut first_line)
        .unwrap();
    assert!(first_line.starts_with("locked"));

    hostns()
        .args(["--lock-timeout-ms", "100", "lock"])
        .arg(&lock)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to lock file"))
        .stderr(predicate::str::contains("timed out after 100ms"));

    holder.kill().unwrap();
    holder.wait().unwrap();
}

#[test]
fn test_namespaces_no_root_needed() {
    hostns()
        .arg("namespaces")
        .assert()
        .success()
        .stdout(predicate::str::contains("Namespaces of the current thread"))
        .stdout(predicate::str::contains("MNT:"));
}
