use std::{fs, path::PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn source(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    path
}

fn bfjit() -> Command {
    Command::cargo_bin("bfjit").unwrap()
}

#[test]
fn help_exits_cleanly() {
    bfjit()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--jit"));
}

#[test]
fn unknown_flags_are_rejected() {
    bfjit().args(["hello.bf", "--frobnicate"]).assert().failure();
}

#[test]
fn rejects_other_extensions() {
    let dir = TempDir::new().unwrap();
    let path = source(&dir, "hello.txt", "++.");

    bfjit()
        .arg(&path)
        .args(["-t", "x86_64"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(".bf"));
}

#[test]
fn unmatched_bracket_produces_nothing() {
    let dir = TempDir::new().unwrap();
    let path = source(&dir, "broken.bf", "+]");

    bfjit()
        .arg(&path)
        .args(["-t", "x86_64"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unmatched ']'"));

    assert!(!path.with_extension("asm").exists());
}

#[test]
fn unknown_target_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = source(&dir, "hello.bf", "++.");

    bfjit().arg(&path).args(["-t", "mips"]).assert().failure();
    assert!(!path.with_extension("asm").exists());
}

#[test]
fn writes_assembly_next_to_the_source() {
    let dir = TempDir::new().unwrap();
    let path = source(&dir, "hello.bf", "++[->+<]>.");

    bfjit()
        .arg(&path)
        .args(["-t", "x86_64", "-a"])
        .assert()
        .success();

    let assembly = fs::read_to_string(path.with_extension("asm")).unwrap();
    assert!(assembly.contains("_start"));
    assert!(assembly.contains("syscall"));

    bfjit()
        .arg(&path)
        .args(["-t", "arm32"])
        .assert()
        .success();
    let assembly = fs::read_to_string(path.with_extension("s")).unwrap();
    assert!(assembly.contains("svc #0"));
}

#[test]
fn output_can_be_renamed() {
    let dir = TempDir::new().unwrap();
    let path = source(&dir, "hello.bf", "+.");
    let output = dir.path().join("custom.out");

    bfjit()
        .arg(&path)
        .args(["-t", "x86_64", "-o"])
        .arg(&output)
        .assert()
        .success();

    assert!(output.exists());
    assert!(!path.with_extension("asm").exists());
}

#[test]
fn debug_runs_and_traces() {
    let dir = TempDir::new().unwrap();
    let path = source(&dir, "hello.bf", "++.");

    bfjit()
        .arg(&path)
        .args(["-t", "x86_64", "-d"])
        .assert()
        .success()
        .stdout(predicate::eq(&[2u8][..]));

    let trace = fs::read_to_string(path.with_extension("dbg")).unwrap();
    assert!(trace.starts_with("Debugging information:\n"));
    assert!(trace.contains("[PC 0]: Increased value at 0 from 0 to 1."));
    assert!(trace.contains("Total output: \u{2}"));
}

#[test]
fn debug_reports_pointer_underflow() {
    let dir = TempDir::new().unwrap();
    let path = source(&dir, "under.bf", "<");

    bfjit()
        .arg(&path)
        .args(["-t", "x86_64", "-d"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("underflow"));
}

#[test]
fn debug_enforces_the_cycle_limit() {
    let dir = TempDir::new().unwrap();
    let path = source(&dir, "forever.bf", "+[]");

    bfjit()
        .arg(&path)
        .args(["-t", "x86_64", "-d", "-c", "100"])
        .assert()
        .code(1);
}

#[test]
fn empty_tape_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = source(&dir, "hello.bf", "+.");

    for mode in ["-d", "-j"] {
        bfjit()
            .arg(&path)
            .args(["-t", "x86_64", "-m", "0", mode])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("at least one cell"))
            .stderr(predicate::str::contains("panicked").not());
    }
}

#[test]
fn arm32_cannot_run_natively() {
    let dir = TempDir::new().unwrap();
    let path = source(&dir, "hello.bf", "++.");

    bfjit()
        .arg(&path)
        .args(["-t", "arm32", "-j"])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty());
}

#[cfg(all(target_arch = "x86_64", target_os = "linux"))]
mod native {
    use std::{path::Path, process};

    use super::*;

    fn on_path(tool: &str) -> bool {
        process::Command::new(tool)
            .arg("--version")
            .output()
            .is_ok()
    }

    /// Assembles & links the NASM output, `None` when the toolchain isn't installed
    fn assembled(dir: &TempDir, path: &Path, optimizations: &[&str]) -> Option<PathBuf> {
        if !on_path("nasm") || !on_path("ld") {
            return None;
        }

        bfjit()
            .arg(path)
            .args(["-t", "x86_64"])
            .args(optimizations)
            .assert()
            .success();

        let object = dir.path().join("program.o");
        let binary = dir.path().join("program");
        let status = process::Command::new("nasm")
            .args(["-f", "elf64", "-o"])
            .arg(&object)
            .arg(path.with_extension("asm"))
            .status()
            .unwrap();
        assert!(status.success());

        let status = process::Command::new("ld")
            .arg("-o")
            .arg(&binary)
            .arg(&object)
            .status()
            .unwrap();
        assert!(status.success());
        Some(binary)
    }

    #[test]
    fn assembled_output_matches_the_jit() {
        let dir = TempDir::new().unwrap();
        let path = source(&dir, "hello.bf", "++.>+++++[-<+>]<.");

        for optimizations in [&["-n"][..], &[][..]] {
            let Some(binary) = assembled(&dir, &path, optimizations) else {
                return;
            };

            let native = process::Command::new(&binary).output().unwrap();
            assert!(native.status.success());
            assert_eq!(native.stdout, [2, 7]);

            bfjit()
                .arg(&path)
                .arg("-j")
                .args(optimizations)
                .assert()
                .success()
                .stdout(predicate::eq(&native.stdout[..]));
        }
    }

    #[test]
    fn jit_writes_the_cell() {
        let dir = TempDir::new().unwrap();
        let path = source(&dir, "hello.bf", "++.");

        for optimizations in [&["-n"][..], &[][..]] {
            bfjit()
                .arg(&path)
                .arg("-j")
                .args(optimizations)
                .assert()
                .success()
                .stdout(predicate::eq(&[2u8][..]));
        }
    }

    #[test]
    fn jit_reads_input() {
        let dir = TempDir::new().unwrap();
        // the last read hits end of input and keeps the 'b'
        let path = source(&dir, "echo.bf", ",.,.,.");

        bfjit()
            .arg(&path)
            .args(["-j", "-a"])
            .write_stdin("ab")
            .assert()
            .success()
            .stdout("abb");
    }
}
