//! Runs the configured type checker to gather diagnostics.

use log::{debug, info, warn};
use std::path::Path;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Run `command` in `root` and return its combined output.
///
/// The type checker exits non-zero whenever it reports errors, so the exit
/// status is ignored. `None` means no usable output: the command could not
/// start or exceeded `timeout`. Callers fall back to schema-only corrections.
pub fn run_diagnostics(command: &[String], root: &Path, timeout: Duration) -> Option<String> {
    let (program, args) = command.split_first()?;
    info!("Running {} (timeout {}s)", command.join(" "), timeout.as_secs());

    let handle = match duct::cmd(program.as_str(), args)
        .dir(root)
        .stderr_to_stdout()
        .stdout_capture()
        .unchecked()
        .start()
    {
        Ok(handle) => handle,
        Err(e) => {
            warn!("Failed to start {program}: {e}");
            return None;
        }
    };

    let started = Instant::now();
    loop {
        match handle.try_wait() {
            Ok(Some(output)) => {
                debug!(
                    "{program} exited with {:?} after {:.1}s",
                    output.status.code(),
                    started.elapsed().as_secs_f64()
                );
                return Some(String::from_utf8_lossy(&output.stdout).into_owned());
            }
            Ok(None) if started.elapsed() >= timeout => {
                warn!("{program} timed out after {}s", timeout.as_secs());
                if let Err(e) = handle.kill() {
                    debug!("Failed to kill {program}: {e}");
                }
                return None;
            }
            Ok(None) => std::thread::sleep(POLL_INTERVAL),
            Err(e) => {
                warn!("Failed to wait for {program}: {e}");
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".into(), "-c".into(), script.into()]
    }

    #[test]
    #[cfg(unix)]
    fn captures_output_despite_failure_status() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_diagnostics(
            &sh("echo \"a.ts(1,1): error TS2551: x\"; echo oops >&2; exit 2"),
            dir.path(),
            Duration::from_secs(10),
        )
        .unwrap();
        assert!(output.contains("error TS2551"));
        assert!(output.contains("oops"));
    }

    #[test]
    #[cfg(unix)]
    fn times_out() {
        let dir = tempfile::tempdir().unwrap();
        let started = Instant::now();
        assert!(run_diagnostics(&sh("exec sleep 5"), dir.path(), Duration::from_millis(200)).is_none());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn missing_program_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let command = vec!["relfix-definitely-not-a-program".to_string()];
        assert!(run_diagnostics(&command, dir.path(), Duration::from_secs(1)).is_none());
        assert!(run_diagnostics(&[], dir.path(), Duration::from_secs(1)).is_none());
    }
}
