//! Hermetic filesystem sandbox for CLI tests.
//!
//! - A project tree under an `assert_fs::TempDir`, cleaned up on drop
//! - Runs workspace binaries with a minimal, color-free environment
//! - `snapshot_run` captures exit code and both streams with the sandbox
//!   path replaced by `<ROOT>`, ready for `insta`
//!
//! ## Quick example
//! ```no_run
//! use relfix_test_utils::sandbox::Sandbox;
//!
//! let mut sb = Sandbox::new();
//! sb.write("prisma/schema.prisma", "model Booking {\n  Club Club @relation(fields: [clubId])\n}\n")
//!     .write("app/page.ts", "include: { club: true }\n");
//!
//! let output = sb.snapshot_run("relfix", ["fix", "--apply"]);
//! assert!(output.contains("Exit Code: 0"));
//! assert_eq!(sb.read("app/page.ts"), "include: { Club: true }\n");
//! ```

use assert_fs::TempDir;
use assert_fs::fixture::PathChild;
use duct::Expression;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

pub struct Sandbox {
    root: TempDir,
    pub home: PathBuf,
    default_cwd: PathBuf,
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Sandbox {
    /// Create a new sandbox; all state is under an auto-cleaned TempDir.
    pub fn new() -> Self {
        let root = TempDir::new().expect("create sandbox TempDir");
        let home = root.child(".home").to_path_buf();
        fs::create_dir_all(&home).expect("create home dir");
        let default_cwd = root.path().to_path_buf();
        Self {
            root,
            home,
            default_cwd,
        }
    }

    /// Get the current default working directory for commands.
    pub fn default_cwd(&self) -> &Path {
        &self.default_cwd
    }

    /// Set the default working directory for commands. Path is relative to sandbox root if not absolute.
    pub fn set_default_cwd<P: AsRef<Path>>(&mut self, cwd: P) -> &mut Self {
        let cwd = cwd.as_ref();
        self.default_cwd = if cwd.is_absolute() {
            cwd.to_path_buf()
        } else {
            self.root_path().join(cwd)
        };
        self
    }

    /// Absolute path to the sandbox root.
    pub fn root_path(&self) -> &Path {
        self.root.path()
    }

    /// Write/overwrite a file relative to the sandbox root.
    pub fn write<P: AsRef<Path>, S: AsRef<[u8]>>(&mut self, rel: P, contents: S) -> &mut Self {
        let p = self.root_path().join(rel);
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(p, contents).expect("write file");
        self
    }

    /// Read a file relative to the sandbox root.
    pub fn read<P: AsRef<Path>>(&self, rel: P) -> String {
        let p = self.root_path().join(rel);
        fs::read_to_string(&p).unwrap_or_else(|e| panic!("read {}: {e}", p.display()))
    }

    pub fn exists<P: AsRef<Path>>(&self, rel: P) -> bool {
        self.root_path().join(rel).exists()
    }

    /// Build a `duct::Expression` pre-wired with the sandbox env and default cwd.
    pub fn cmd<S: AsRef<OsStr>, I: IntoIterator>(&self, program: S, args: I) -> Expression
    where
        I::Item: AsRef<OsStr>,
    {
        let args: Vec<_> = args
            .into_iter()
            .map(|arg| arg.as_ref().to_os_string())
            .collect();
        let expr = duct::cmd(program.as_ref(), args).dir(&self.default_cwd);
        self.inject_env(expr)
    }

    /// Run a cargo binary inside this sandbox and return stdout as String.
    /// Errors if the process exits with non-zero status.
    pub fn run<I>(&self, program: &str, args: I, cwd: Option<&Path>) -> Result<String, String>
    where
        I: IntoIterator,
        I::Item: AsRef<OsStr>,
    {
        let mut expr = self.cmd(assert_cmd::cargo::cargo_bin(program), args);
        if let Some(dir) = cwd {
            expr = expr.dir(if dir.is_absolute() {
                dir.to_path_buf()
            } else {
                self.root_path().join(dir)
            });
        }
        expr.read().map_err(|e| format!("command failed: {e}"))
    }

    /// Run a cargo binary and render exit code, stdout and stderr as one
    /// string with sandbox paths normalized.
    pub fn snapshot_run<I>(&self, program: &str, args: I) -> String
    where
        I: IntoIterator,
        I::Item: AsRef<OsStr>,
    {
        let output = self
            .cmd(assert_cmd::cargo::cargo_bin(program), args)
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()
            .expect("spawn command");

        let code = output
            .status
            .code()
            .map_or_else(|| "signal".to_string(), |c| c.to_string());
        let stdout = self.normalize(&String::from_utf8_lossy(&output.stdout));
        let stderr = self.normalize(&String::from_utf8_lossy(&output.stderr));
        format!("Exit Code: {code}\n--- STDOUT ---\n{stdout}--- STDERR ---\n{stderr}")
    }

    fn normalize(&self, text: &str) -> String {
        let mut text = text.replace('\\', "/");
        let mut roots = vec![self.root_path().to_string_lossy().replace('\\', "/")];
        if let Ok(canonical) = fs::canonicalize(self.root_path()) {
            roots.insert(0, canonical.to_string_lossy().replace('\\', "/"));
        }
        for root in roots {
            text = text.replace(&root, "<ROOT>");
        }
        text
    }

    pub fn inject_env(&self, expr: Expression) -> Expression {
        let mut env_map: HashMap<String, String> = HashMap::new();
        if let Ok(path) = std::env::var("PATH") {
            env_map.insert("PATH".into(), path);
        }
        env_map.insert("HOME".into(), self.home.to_string_lossy().into_owned());
        env_map.insert(
            "XDG_CONFIG_HOME".into(),
            self.home.to_string_lossy().into_owned(),
        );
        env_map.insert("NO_COLOR".into(), "1".into());
        expr.full_env(&env_map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_read_relative_to_root() {
        let mut sb = Sandbox::new();
        sb.write("app/page.ts", "export {}\n")
            .write("lib/util.ts", "export const x = 1;\n");

        assert!(sb.exists("app/page.ts"));
        assert_eq!(sb.read("lib/util.ts"), "export const x = 1;\n");
        assert!(!sb.exists("missing.ts"));
    }

    #[test]
    fn test_cwd_relative_to_sandbox() {
        let mut sb = Sandbox::new();
        sb.write("test_dir/file.txt", "test content");

        sb.set_default_cwd("test_dir");
        assert_eq!(sb.default_cwd(), sb.root_path().join("test_dir"));

        let output = sb.cmd("ls", ["-a"]).read().expect("ls should succeed");
        assert!(output.contains("file.txt"));

        let no_color = sb
            .cmd("sh", ["-c", "echo $NO_COLOR"])
            .read()
            .expect("echo should succeed");
        assert_eq!(no_color.trim(), "1");
    }

    #[test]
    fn test_normalize_replaces_root() {
        let sb = Sandbox::new();
        let text = format!("wrote {}/app/page.ts\n", sb.root_path().display());
        assert_eq!(sb.normalize(&text), "wrote <ROOT>/app/page.ts\n");
    }
}
