//! Integration tests for Pool

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn pool_cmd() -> Command {
        let mut cmd = cargo_bin_cmd!("pool");
        cmd.env_remove("POOL_DIR").env_remove("POOL_CONFIG");
        cmd
    }

    /// A scratch area with an isolated config file
    struct Scratch {
        dir: TempDir,
    }

    impl Scratch {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            fs::create_dir(dir.path().join("buildroot")).unwrap();
            fs::create_dir(dir.path().join("pool")).unwrap();
            fs::create_dir(dir.path().join("stock")).unwrap();
            Self { dir }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        /// Command run against the scratch pool
        fn cmd(&self) -> Command {
            let mut cmd = pool_cmd();
            cmd.arg("--config")
                .arg(self.path("config.toml"))
                .arg("--pool")
                .arg(self.path("pool"));
            cmd
        }

        fn init(&self) {
            self.cmd()
                .arg("init")
                .arg(self.path("buildroot"))
                .assert()
                .success();
        }
    }

    fn arg(path: &Path) -> &str {
        path.to_str().unwrap()
    }

    #[test]
    fn help_displays() {
        pool_cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("pool of Debian packages"));
    }

    #[test]
    fn version_displays() {
        pool_cmd()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("pool"));
    }

    #[test]
    fn worker_is_hidden_from_help() {
        pool_cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("__worker").not());
    }

    #[test]
    fn config_path() {
        pool_cmd()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let scratch = Scratch::new();
        scratch
            .cmd()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[tools]"));
    }

    #[test]
    fn debug_env_accepts_any_value() {
        for value in ["1", "yes", "0", ""] {
            pool_cmd()
                .env("DEBUG", value)
                .args(["config", "path"])
                .assert()
                .success()
                .stdout(predicate::str::contains("config.toml"));
        }
    }

    #[test]
    fn debug_env_keeps_pool_commands_working() {
        let scratch = Scratch::new();
        scratch.init();

        scratch
            .cmd()
            .env("DEBUG", "1")
            .args(["info", "--build-root"])
            .assert()
            .success()
            .stdout(predicate::str::contains(arg(&scratch.path("buildroot"))));
    }

    #[test]
    fn completions_bash() {
        pool_cmd()
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("pool"));
    }

    #[test]
    fn commands_outside_a_pool_fail() {
        let scratch = Scratch::new();
        scratch
            .cmd()
            .arg("list")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"))
            .stderr(predicate::str::contains("no pool found"));
    }

    #[test]
    fn init_creates_control_dir() {
        let scratch = Scratch::new();
        scratch.init();

        assert!(scratch.path("pool/.pool/pkgcache").is_dir());
        assert!(scratch.path("pool/.pool/stocks").is_dir());
        assert_eq!(
            fs::read_link(scratch.path("pool/.pool/build/root")).unwrap(),
            scratch.path("buildroot")
        );
    }

    #[test]
    fn init_twice_fails() {
        let scratch = Scratch::new();
        scratch.init();

        scratch
            .cmd()
            .arg("init")
            .arg(scratch.path("buildroot"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("already initialized"));
    }

    #[test]
    fn init_requires_buildroot_dir() {
        let scratch = Scratch::new();
        scratch
            .cmd()
            .arg("init")
            .arg(scratch.path("missing"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("is not a directory"));
    }

    #[test]
    fn register_info_unregister() {
        let scratch = Scratch::new();
        scratch.init();
        let stock = scratch.path("stock");

        scratch
            .cmd()
            .args(["register", arg(&stock)])
            .assert()
            .success();

        scratch
            .cmd()
            .args(["info", "--stocks"])
            .assert()
            .success()
            .stdout(predicate::str::contains(arg(&stock)));

        scratch
            .cmd()
            .args(["register", arg(&stock)])
            .assert()
            .failure()
            .stderr(predicate::str::contains("already registered"));

        scratch
            .cmd()
            .args(["unregister", arg(&stock)])
            .assert()
            .success();

        scratch
            .cmd()
            .args(["info", "--stocks"])
            .assert()
            .success()
            .stdout(predicate::str::is_empty());
    }

    #[test]
    fn unregister_unknown_stock_fails() {
        let scratch = Scratch::new();
        scratch.init();

        scratch
            .cmd()
            .args(["unregister", arg(&scratch.path("stock"))])
            .assert()
            .failure()
            .stderr(predicate::str::contains("no registered stock"));
    }

    #[test]
    fn empty_pool_queries() {
        let scratch = Scratch::new();
        scratch.init();
        scratch
            .cmd()
            .args(["register", arg(&scratch.path("stock"))])
            .assert()
            .success();

        scratch
            .cmd()
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::is_empty());

        scratch
            .cmd()
            .args(["list", "foo*"])
            .assert()
            .success()
            .stderr(predicate::str::contains("foo*: no matching packages"));

        scratch
            .cmd()
            .args(["exists", "foo"])
            .assert()
            .code(1)
            .stdout("false\n");

        scratch
            .cmd()
            .args(["resolve", "foo"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("can't resolve non-existent package"));

        scratch.cmd().arg("gc").assert().success();
    }

    #[test]
    fn getpath_requires_version() {
        let scratch = Scratch::new();
        scratch.init();

        scratch
            .cmd()
            .args(["getpath", "foo"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("explicit version required"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn get_missing_package_warns() {
        let scratch = Scratch::new();
        scratch.init();
        let out = scratch.path("out");

        scratch
            .cmd()
            .args(["get", arg(&out), "ghost"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("no such package (ghost)"));

        scratch
            .cmd()
            .args(["get", "-q", arg(&out), "ghost"])
            .assert()
            .success();

        scratch
            .cmd()
            .args(["get", "--strict", arg(&out), "ghost"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
    }

    #[test]
    fn info_build_without_log_fails() {
        let scratch = Scratch::new();
        scratch.init();

        scratch
            .cmd()
            .args(["info-build", "foo"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("no build log"));
    }

    #[test]
    fn pool_found_from_pool_dir_env() {
        let scratch = Scratch::new();
        scratch.init();

        pool_cmd()
            .current_dir(scratch.path("stock"))
            .env("POOL_DIR", scratch.path("pool"))
            .arg("--config")
            .arg(scratch.path("config.toml"))
            .args(["info", "--build-root"])
            .assert()
            .success()
            .stdout(predicate::str::contains(arg(&scratch.path("buildroot"))));
    }
}
