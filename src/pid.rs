use std::path::PathBuf;

const PID_FILE_NAME: &str = "scribed.pid";

/// Path to the daemon's PID file under the configured runtime directory.
pub fn pid_file_path(runtime_dir: &std::path::Path) -> PathBuf {
    runtime_dir.join(PID_FILE_NAME)
}

/// Write the current process id to the PID file, overwriting any existing
/// one.
pub fn write_pid_file(path: &std::path::Path) -> std::io::Result<()> {
    std::fs::write(path, std::process::id().to_string())
}

/// Read a running instance's pid from the PID file, if present and valid.
pub fn read_pid_file(path: &std::path::Path) -> Option<i32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Remove the PID file. Idempotent: a missing file is not an error.
pub fn remove_pid_file(path: &std::path::Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
