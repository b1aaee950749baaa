//! Integration tests for the age/gpg backends and git sync.
//!
//! Real age, gpg and git are not required: each test writes a small shell
//! script that behaves like the tool for the arguments Lockbox passes.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use lockbox::backend::{BackendConfig, ExternalKind};
use lockbox::crypto::Argon2Params;
use lockbox::git::GitConfig;
use lockbox::{LockboxError, ManagerState, Namespace, SecretsManager, StoreConfig};
use tempfile::TempDir;

/// Stand-in for age/gpg: "encrypts" by prefixing the input file with a
/// 4-byte marker and "decrypts" by stripping it.  The input file is always
/// the last argument.
fn fake_cipher(marker: &str) -> String {
    format!(
        r#"#!/bin/sh
for arg in "$@"; do last="$arg"; done
case " $* " in
  *" --encrypt "*) printf '{marker}'; cat "$last" ;;
  *" --decrypt "*) tail -c +5 "$last" ;;
  *) echo "unexpected arguments: $*" >&2; exit 64 ;;
esac
"#
    )
}

/// Stand-in for git that records its arguments.  Commits report "nothing
/// to commit" while a `clean` marker file exists; pulls fail while a
/// `offline` marker exists.
fn fake_git(dir: &Path) -> String {
    let log = dir.join("git.log");
    let clean = dir.join("clean");
    let offline = dir.join("offline");
    format!(
        r#"#!/bin/sh
echo "$*" >> "{log}"
case "$1" in
  commit)
    if [ -f "{clean}" ]; then echo "nothing to commit, working tree clean"; exit 1; fi ;;
  pull)
    if [ -f "{offline}" ]; then echo "fatal: unable to access remote" >&2; exit 128; fi ;;
esac
exit 0
"#,
        log = log.display(),
        clean = clean.display(),
        offline = offline.display(),
    )
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

struct Fixture {
    tmp: TempDir,
    store_dir: PathBuf,
    tool: PathBuf,
    git: Option<PathBuf>,
}

impl Fixture {
    fn new(kind: ExternalKind, with_git: bool) -> Self {
        let tmp = TempDir::new().unwrap();
        let bin = tmp.path().join("bin");
        fs::create_dir(&bin).unwrap();

        let marker = match kind {
            ExternalKind::Age => "AGE!",
            ExternalKind::Gpg => "GPG!",
        };
        let tool = write_script(&bin, kind.tool_name(), &fake_cipher(marker));
        let git = with_git.then(|| write_script(&bin, "git", &fake_git(tmp.path())));
        let store_dir = tmp.path().join("secrets");

        Self {
            tmp,
            store_dir,
            tool,
            git,
        }
    }

    fn config(&self, kind: ExternalKind) -> StoreConfig {
        StoreConfig {
            path: self.store_dir.clone(),
            backend: BackendConfig::External {
                kind,
                recipient: "age1recipient".into(),
                identity: Some(self.tmp.path().join("identity.txt")),
                program: Some(self.tool.clone()),
            },
            git: self.git.as_ref().map(|program| GitConfig {
                repo: self.tmp.path().to_path_buf(),
                program: program.to_string_lossy().into_owned(),
            }),
        }
    }

    fn open(&self, kind: ExternalKind) -> SecretsManager {
        SecretsManager::open(self.config(kind)).expect("open")
    }

    fn git_log(&self) -> Vec<String> {
        fs::read_to_string(self.tmp.path().join("git.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn touch(&self, marker: &str) {
        fs::write(self.tmp.path().join(marker), b"").unwrap();
    }
}

// ---------------------------------------------------------------------------
// age backend
// ---------------------------------------------------------------------------

#[test]
fn age_backend_round_trip() {
    let fx = Fixture::new(ExternalKind::Age, false);
    let manager = fx.open(ExternalKind::Age);
    assert_eq!(manager.state(), ManagerState::Uninitialized);

    // The password is ignored by external backends.
    manager.initialize("").unwrap();
    assert!(fx.store_dir.is_dir());

    manager.store("github_token", b"ghp_abc123").unwrap();
    let on_disk = fs::read(fx.store_dir.join("github_token.age")).unwrap();
    assert!(on_disk.starts_with(b"AGE!"));

    assert_eq!(manager.retrieve("github_token").unwrap().as_slice(), b"ghp_abc123");
    assert!(manager.exists("github_token").unwrap());
}

#[test]
fn age_backend_lists_and_deletes_files() {
    let fx = Fixture::new(ExternalKind::Age, false);
    let manager = fx.open(ExternalKind::Age);
    manager.initialize("ignored").unwrap();

    manager.store("b_key", b"2").unwrap();
    manager.store("a_key", b"1").unwrap();
    fs::write(fx.store_dir.join("notes.txt"), b"not a secret").unwrap();

    assert_eq!(manager.list().unwrap(), vec!["a_key".to_string(), "b_key".to_string()]);

    manager.delete("a_key").unwrap();
    assert!(!fx.store_dir.join("a_key.age").exists());
    assert!(matches!(manager.delete("a_key"), Err(LockboxError::NotFound(_))));
    assert!(matches!(manager.retrieve("a_key"), Err(LockboxError::NotFound(_))));
}

#[test]
fn age_backend_reopens_existing_directory_locked() {
    let fx = Fixture::new(ExternalKind::Age, false);
    {
        let manager = fx.open(ExternalKind::Age);
        manager.initialize("").unwrap();
        manager.store("token", b"value").unwrap();
    }

    let manager = fx.open(ExternalKind::Age);
    assert_eq!(manager.state(), ManagerState::Locked);
    assert!(matches!(manager.retrieve("token"), Err(LockboxError::Locked)));

    let report = manager.unlock("anything").unwrap();
    assert_eq!(report.unlocked, 1);
    assert_eq!(manager.retrieve("token").unwrap().as_slice(), b"value");

    manager.lock().unwrap();
    assert!(matches!(manager.list(), Err(LockboxError::Locked)));
}

#[test]
fn unlock_without_directory_is_not_initialized() {
    let fx = Fixture::new(ExternalKind::Age, false);
    let manager = fx.open(ExternalKind::Age);

    assert!(matches!(manager.unlock(""), Err(LockboxError::NotInitialized(_))));
    assert_eq!(manager.state(), ManagerState::Uninitialized);
}

#[test]
fn external_backend_has_no_password_to_change() {
    let fx = Fixture::new(ExternalKind::Age, false);
    let manager = fx.open(ExternalKind::Age);
    manager.initialize("").unwrap();

    assert!(matches!(
        manager.change_password("old", "new"),
        Err(LockboxError::Unsupported(_))
    ));
}

#[test]
fn failing_tool_reports_status_and_stderr() {
    let fx = Fixture::new(ExternalKind::Age, false);
    let manager = fx.open(ExternalKind::Age);
    manager.initialize("").unwrap();
    manager.store("token", b"value").unwrap();

    write_script(
        fx.tool.parent().unwrap(),
        "age",
        "#!/bin/sh\necho 'age: error: no identity matched any of the recipients' >&2\nexit 1\n",
    );

    match manager.retrieve("token") {
        Err(LockboxError::ExternalToolFailed { status, output, .. }) => {
            assert_eq!(status, 1);
            assert!(output.contains("no identity matched"));
        }
        other => panic!("expected ExternalToolFailed, got {other:?}"),
    }
}

#[test]
fn missing_tool_is_reported_at_open() {
    let fx = Fixture::new(ExternalKind::Age, false);
    let mut config = fx.config(ExternalKind::Age);
    if let BackendConfig::External { program, .. } = &mut config.backend {
        *program = Some(fx.tmp.path().join("bin/does-not-exist"));
    }

    assert!(matches!(
        SecretsManager::open(config),
        Err(LockboxError::ToolNotFound(_))
    ));
}

#[test]
fn namespace_over_external_backend() {
    let fx = Fixture::new(ExternalKind::Age, false);
    let manager = fx.open(ExternalKind::Age);
    manager.initialize("").unwrap();

    Namespace::api_keys(&manager).store("github", b"ghp_1").unwrap();

    assert!(fx.store_dir.join("apikey_github.age").exists());
    assert_eq!(Namespace::api_keys(&manager).list().unwrap(), vec!["github".to_string()]);
}

#[test]
fn file_names_must_be_path_safe() {
    let fx = Fixture::new(ExternalKind::Age, false);
    let manager = fx.open(ExternalKind::Age);
    manager.initialize("").unwrap();

    for name in ["my key", "../escape", ".hidden", "OpenAI:prod"] {
        assert!(
            matches!(manager.store(name, b"x"), Err(LockboxError::InvalidName(_))),
            "{name:?} should be rejected"
        );
    }
    assert!(manager.list().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// gpg backend
// ---------------------------------------------------------------------------

#[test]
fn gpg_backend_round_trip() {
    let fx = Fixture::new(ExternalKind::Gpg, false);
    let manager = fx.open(ExternalKind::Gpg);
    manager.initialize("").unwrap();

    manager.store("db_password", &[0u8, 1, 2, 255]).unwrap();

    let on_disk = fs::read(fx.store_dir.join("db_password.gpg")).unwrap();
    assert!(on_disk.starts_with(b"GPG!"));
    assert_eq!(manager.retrieve("db_password").unwrap().as_slice(), &[0u8, 1, 2, 255]);
}

// ---------------------------------------------------------------------------
// git sync
// ---------------------------------------------------------------------------

#[test]
fn store_and_delete_are_committed() {
    let fx = Fixture::new(ExternalKind::Age, true);
    let manager = fx.open(ExternalKind::Age);
    manager.initialize("").unwrap();

    manager.store("github_token", b"ghp_abc123").unwrap();
    manager.delete("github_token").unwrap();

    assert_eq!(
        fx.git_log(),
        vec![
            "add --all -- secrets/github_token.age",
            "commit --quiet -m lockbox: update github_token -- secrets/github_token.age",
            "add --all -- secrets/github_token.age",
            "commit --quiet -m lockbox: remove github_token -- secrets/github_token.age",
        ]
    );
}

#[test]
fn nothing_to_commit_is_not_an_error() {
    let fx = Fixture::new(ExternalKind::Age, true);
    let manager = fx.open(ExternalKind::Age);
    manager.initialize("").unwrap();
    fx.touch("clean");

    manager.store("token", b"same").unwrap();
    assert_eq!(manager.retrieve("token").unwrap().as_slice(), b"same");
}

#[test]
fn sync_and_push_run_git() {
    let fx = Fixture::new(ExternalKind::Age, true);
    let manager = fx.open(ExternalKind::Age);

    // Neither needs the store to be unlocked.
    manager.sync().unwrap();
    manager.push().unwrap();

    assert_eq!(fx.git_log(), vec!["pull --rebase --quiet", "push --quiet"]);
}

#[test]
fn failed_pull_is_reported() {
    let fx = Fixture::new(ExternalKind::Age, true);
    let manager = fx.open(ExternalKind::Age);
    fx.touch("offline");

    match manager.sync() {
        Err(LockboxError::ExternalToolFailed { status, output, .. }) => {
            assert_eq!(status, 128);
            assert!(output.contains("unable to access remote"));
        }
        other => panic!("expected ExternalToolFailed, got {other:?}"),
    }
}

#[test]
fn sync_without_git_is_a_no_op() {
    let fx = Fixture::new(ExternalKind::Age, false);
    let manager = fx.open(ExternalKind::Age);

    manager.sync().unwrap();
    manager.push().unwrap();
    assert!(fx.git_log().is_empty());
}

#[test]
fn builtin_backend_rejects_git_sync() {
    let tmp = TempDir::new().unwrap();
    let mut config = StoreConfig::builtin(tmp.path().join("secrets.json"), Argon2Params::minimum());
    config.git = Some(GitConfig::new(tmp.path()));

    assert!(matches!(
        SecretsManager::open(config),
        Err(LockboxError::Unsupported(_))
    ));
}
