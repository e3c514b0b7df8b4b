use leasegate::config::{ConfigError, ConfigLoader, FailureMode};
use std::{
    env, fs,
    path::PathBuf,
    sync::{Mutex, MutexGuard, OnceLock},
};
use tempfile::TempDir;

// 32 bytes of 'a', base64-encoded.
const PEPPER_B64: &str = "YWFhYWFhYWFhYWFhYWFhYWFhYWFhYWFhYWFhYWFhYWE=";

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn env_guard() -> MutexGuard<'static, ()> {
    env_lock()
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}

fn clear_env() {
    let keys: Vec<String> = env::vars()
        .map(|(key, _)| key)
        .filter(|key| key.starts_with("LEASEGATE_"))
        .collect();
    unsafe {
        for key in keys {
            env::remove_var(key);
        }
    }
}

fn write_env_file(dir: &TempDir, name: &str, contents: &str) {
    let path = dir.path().join(name);
    fs::write(path, contents).unwrap();
}

fn loader(dir: &TempDir) -> ConfigLoader {
    ConfigLoader::with_base_dir(PathBuf::from(dir.path()))
}

#[test]
fn loads_defaults_when_no_env_present() {
    let _guard = env_guard();
    clear_env();
    let temp_dir = TempDir::new().unwrap();

    let cfg = loader(&temp_dir).load().expect("config loads with defaults");

    assert_eq!(cfg.profile, "local");
    assert_eq!(cfg.api_bind_addr, "0.0.0.0:8080");
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.invite.ttl_hours, 168);
    assert_eq!(cfg.invite.pending_ttl_minutes, 30);
    assert!(cfg.onboarding.require_areas);
    assert_eq!(cfg.rate_limits.invite_validation.capacity, 5);
    assert_eq!(
        cfg.rate_limits.invite_validation.failure_mode,
        FailureMode::FailClosed
    );
    assert_eq!(cfg.rate_limits.api.failure_mode, FailureMode::FailOpen);
    cfg.bind_addr().expect("default bind addr parses");
    clear_env();
}

#[test]
fn layered_env_files_apply_in_order() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", "LEASEGATE_API_BIND_ADDR=127.0.0.1:3000\n");
    write_env_file(
        &temp_dir,
        ".env.test",
        "LEASEGATE_API_BIND_ADDR=192.168.0.10:5000\n",
    );
    write_env_file(
        &temp_dir,
        ".env.test.local",
        "LEASEGATE_API_BIND_ADDR=10.0.0.5:6000\n",
    );

    // Select profile via .env.local before profile-specific files load.
    write_env_file(
        &temp_dir,
        ".env.local",
        "LEASEGATE_PROFILE=test\nLEASEGATE_API_BIND_ADDR=127.0.0.1:4000\n",
    );

    let cfg = loader(&temp_dir)
        .load()
        .expect("config loads with layered env files");

    assert_eq!(cfg.profile, "test");
    assert_eq!(cfg.api_bind_addr, "10.0.0.5:6000");
    clear_env();
}

#[test]
fn os_environment_has_highest_precedence() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        "LEASEGATE_API_BIND_ADDR=127.0.0.1:3000\nLEASEGATE_RATE_LIMIT_INVITE_VALIDATION_CAPACITY=3\n",
    );

    unsafe {
        env::set_var("LEASEGATE_API_BIND_ADDR", "0.0.0.0:9090");
        env::set_var("LEASEGATE_RATE_LIMIT_INVITE_VALIDATION_CAPACITY", "2");
    }

    let cfg = loader(&temp_dir).load().expect("config loads with env override");
    assert_eq!(cfg.api_bind_addr, "0.0.0.0:9090");
    assert_eq!(cfg.rate_limits.invite_validation.capacity, 2);

    clear_env();
}

#[test]
fn production_profile_requires_secrets() {
    let _guard = env_guard();
    clear_env();
    let temp_dir = TempDir::new().unwrap();

    unsafe {
        env::set_var("LEASEGATE_PROFILE", "production");
    }
    assert!(matches!(
        loader(&temp_dir).load(),
        Err(ConfigError::MissingJwtSecret)
    ));

    unsafe {
        env::set_var("LEASEGATE_AUTH_JWT_SECRET", "prod-secret");
    }
    assert!(matches!(
        loader(&temp_dir).load(),
        Err(ConfigError::MissingInvitePepper)
    ));

    unsafe {
        env::set_var("LEASEGATE_INVITE_PEPPER", PEPPER_B64);
    }
    let cfg = loader(&temp_dir).load().expect("complete production config");
    assert_eq!(cfg.invite.pepper.as_deref().map(<[u8]>::len), Some(32));

    let redacted = cfg.redacted_json().unwrap();
    assert!(!redacted.contains("prod-secret"));
    assert!(!redacted.contains(PEPPER_B64));

    clear_env();
}

#[test]
fn malformed_pepper_is_rejected() {
    let _guard = env_guard();
    clear_env();
    let temp_dir = TempDir::new().unwrap();

    unsafe {
        env::set_var("LEASEGATE_INVITE_PEPPER", "not base64!");
    }
    assert!(matches!(
        loader(&temp_dir).load(),
        Err(ConfigError::InvalidInvitePepperBase64 { .. })
    ));

    unsafe {
        env::set_var("LEASEGATE_INVITE_PEPPER", "c2hvcnQ=");
    }
    assert!(matches!(
        loader(&temp_dir).load(),
        Err(ConfigError::InvalidInvitePepperLength { length: 5 })
    ));

    clear_env();
}

#[test]
fn rate_limit_rules_are_configurable() {
    let _guard = env_guard();
    clear_env();
    let temp_dir = TempDir::new().unwrap();

    write_env_file(
        &temp_dir,
        ".env",
        "LEASEGATE_RATE_LIMIT_API_CAPACITY=50\nLEASEGATE_RATE_LIMIT_API_WINDOW_SECONDS=10\nLEASEGATE_RATE_LIMIT_API_FAILURE_MODE=closed\n",
    );
    let cfg = loader(&temp_dir).load().expect("custom api rule loads");
    assert_eq!(cfg.rate_limits.api.capacity, 50);
    assert_eq!(cfg.rate_limits.api.window_seconds, 10);
    assert_eq!(cfg.rate_limits.api.failure_mode, FailureMode::FailClosed);

    unsafe {
        env::set_var("LEASEGATE_RATE_LIMIT_AUTH_FAILURE_MODE", "sometimes");
    }
    assert!(matches!(
        loader(&temp_dir).load(),
        Err(ConfigError::InvalidFailureMode { .. })
    ));

    clear_env();
}

#[test]
fn invalid_bind_addr_returns_error() {
    let _guard = env_guard();
    clear_env();
    let temp_dir = TempDir::new().unwrap();

    unsafe {
        env::set_var("LEASEGATE_API_BIND_ADDR", "not-an-addr");
    }

    let result = loader(&temp_dir).load();
    assert!(matches!(result, Err(ConfigError::InvalidBindAddr { .. })));

    clear_env();
}
