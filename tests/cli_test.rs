use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Command, Output};

const EXPECTED_LINE: &str = "Hello world!\n";

fn probe(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_wxprobe"))
        .args(args)
        .output()
        .expect("failed to spawn wxprobe")
}

/// `exit(-EINVAL)` as seen by the parent: only the low byte survives.
fn einval_exit_code() -> i32 {
    (-libc::EINVAL) as u8 as i32
}

fn assert_usage_rejection(out: &Output) {
    assert_eq!(out.status.code(), Some(einval_exit_code()), "{:?}", out);
    assert!(out.stdout.is_empty(), "unexpected stdout: {:?}", out);

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(
        stderr.contains("<stack|heap|freed_heap|bss|mmap|memfd>"),
        "missing usage text: {:?}",
        stderr
    );
}

#[test]
fn test_missing_mode_prints_usage() {
    assert_usage_rejection(&probe(&[]));
}

#[test]
fn test_unknown_mode_prints_usage() {
    assert_usage_rejection(&probe(&["bogus"]));
}

#[test]
fn test_extra_arguments_print_usage() {
    assert_usage_rejection(&probe(&["stack", "heap"]));
}

#[test]
fn test_writable_modes_execute_payload() {
    for mode in ["stack", "heap", "bss", "mmap", "memfd"] {
        let out = probe(&[mode]);

        assert!(
            out.status.success(),
            "mode {} failed: status={:?} stderr={:?}",
            mode,
            out.status,
            String::from_utf8_lossy(&out.stderr)
        );
        assert_eq!(
            String::from_utf8_lossy(&out.stdout),
            EXPECTED_LINE,
            "mode {} wrote unexpected output",
            mode
        );
    }
}

#[test]
fn test_mode_token_is_case_insensitive() {
    let out = probe(&["MMAP"]);

    assert!(out.status.success(), "{:?}", out);
    assert_eq!(String::from_utf8_lossy(&out.stdout), EXPECTED_LINE);
}

#[test]
fn test_memfd_short_write_aborts_before_invocation() {
    // A one-byte file size limit in the child truncates the memfd write;
    // the run must die on the fatal path without mapping or invoking.
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_wxprobe"));
    cmd.arg("memfd");
    unsafe {
        cmd.pre_exec(|| {
            let limit = libc::rlimit {
                rlim_cur: 1,
                rlim_max: 1,
            };
            if libc::setrlimit(libc::RLIMIT_FSIZE, &limit) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let out = cmd.output().expect("failed to spawn wxprobe");

    // exit(-1), low byte as seen by the parent
    assert_eq!(out.status.code(), Some(255), "{:?}", out);
    assert!(
        out.stdout.is_empty(),
        "payload ran after a short write: {:?}",
        out
    );

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(
        stderr.contains("short write to memfd: 1 of"),
        "missing short-write diagnostic: {:?}",
        stderr
    );
}

#[test]
fn test_freed_heap_succeeds_or_dies_by_signal() {
    let out = probe(&["freed_heap"]);

    match out.status.code() {
        Some(0) => {
            assert_eq!(String::from_utf8_lossy(&out.stdout), EXPECTED_LINE);
        }
        Some(code) => {
            panic!("freed_heap exited with unrelated status {}: {:?}", code, out);
        }
        None => {
            // Killed during the probe; allocator- and platform-dependent,
            // and a valid outcome of the measurement.
            assert!(out.status.signal().is_some(), "{:?}", out);
        }
    }
}
