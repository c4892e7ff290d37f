//! CLI integration tests
//!
//! Tests the command-line interface end-to-end.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

const KEY_ENV_VARS: [&str; 5] = [
    "KETTLE_STRONG_PASSWORD_ENCODED_PUBKEY_PATH",
    "KETTLE_STRONG_PASSWORD_ENCODED_PUBKEY_FILENAME",
    "KETTLE_STRONG_PASSWORD_ENCODED_PRIVKEY_PATH",
    "KETTLE_STRONG_PASSWORD_ENCODED_PRIVKEY_FILENAME",
    "KETTLE_TWO_WAY_PASSWORD_ENCODER_SEED",
];

/// Build a strongpass command that runs in `dir` with a clean key environment
fn strongpass(dir: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_strongpass"));
    command.current_dir(dir);
    for var in KEY_ENV_VARS {
        command.env_remove(var);
    }
    command.env_remove("RUST_LOG");
    command
}

/// Run strongpass with the given arguments and nothing on stdin
fn run(dir: &Path, args: &[&str]) -> Output {
    strongpass(dir)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .expect("failed to run strongpass")
}

/// Run `strongpass encode --secret-stdin` feeding `secret` on stdin
fn run_encode(dir: &Path, extra_args: &[&str], secret: &str) -> Output {
    let mut child = strongpass(dir)
        .arg("encode")
        .arg("--secret-stdin")
        .args(extra_args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn strongpass");

    {
        let stdin = child.stdin.as_mut().expect("failed to open stdin");
        // Ignore BrokenPipe errors - the command may exit before reading stdin
        // if it encounters an error (e.g., key file not found)
        let _ = stdin.write_all(secret.as_bytes());
    }

    child.wait_with_output().expect("failed to wait for strongpass")
}

/// Get path to testdata directory
fn testdata_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

fn stdout_line(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout)
        .trim_end_matches('\n')
        .to_string()
}

fn assert_success(output: &Output, what: &str) {
    assert!(
        output.status.success(),
        "{} failed: {}",
        what,
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn test_keygen_writes_key_files() {
    let temp_dir = TempDir::new().unwrap();

    let output = run(temp_dir.path(), &["keygen"]);
    assert_success(&output, "keygen");

    let public_key = fs::read_to_string(temp_dir.path().join("public.key")).unwrap();
    let private_key = fs::read_to_string(temp_dir.path().join("private.key")).unwrap();
    assert!(!public_key.is_empty());
    assert!(!private_key.is_empty());
    assert!(!public_key.contains('\n'));
    // Nothing is printed unless asked for.
    assert!(output.stdout.is_empty());
}

#[test]
fn test_keygen_refuses_to_overwrite() {
    let temp_dir = TempDir::new().unwrap();
    assert_success(&run(temp_dir.path(), &["keygen"]), "first keygen");
    let original = fs::read(temp_dir.path().join("private.key")).unwrap();

    let output = run(temp_dir.path(), &["keygen"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("refusing to overwrite"),
        "Expected overwrite refusal, got: {}",
        stderr
    );
    assert_eq!(fs::read(temp_dir.path().join("private.key")).unwrap(), original);

    assert_success(&run(temp_dir.path(), &["keygen", "--force"]), "forced keygen");
    assert_ne!(fs::read(temp_dir.path().join("private.key")).unwrap(), original);
}

#[test]
fn test_keygen_print_lists_both_keys() {
    let temp_dir = TempDir::new().unwrap();
    let output = run(temp_dir.path(), &["keygen", "--print"]);
    assert_success(&output, "keygen --print");

    let public_key = fs::read_to_string(temp_dir.path().join("public.key")).unwrap();
    let private_key = fs::read_to_string(temp_dir.path().join("private.key")).unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&format!("Public key:{}", public_key)));
    assert!(stdout.contains(&format!("Private key:{}", private_key)));
}

#[test]
fn test_encode_decode_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    assert_success(&run(temp_dir.path(), &["keygen"]), "keygen");

    let output = run_encode(temp_dir.path(), &[], "justatestpassword\n");
    assert_success(&output, "encode");
    let encoded = stdout_line(&output);
    assert!(encoded.starts_with("SPEncrypted "));

    let output = run(temp_dir.path(), &["decode", &encoded]);
    assert_success(&output, "decode");
    assert_eq!(stdout_line(&output), "justatestpassword");
}

#[test]
fn test_encode_without_prefix_then_strict_decode() {
    let temp_dir = TempDir::new().unwrap();
    assert_success(&run(temp_dir.path(), &["keygen"]), "keygen");

    let output = run_encode(temp_dir.path(), &["--no-prefix"], "secret");
    assert_success(&output, "encode --no-prefix");
    let encoded = stdout_line(&output);
    assert!(!encoded.starts_with("SPEncrypted "));

    let output = run(temp_dir.path(), &["decode", "--strict", &encoded]);
    assert_success(&output, "decode --strict");
    assert_eq!(stdout_line(&output), "secret");
}

#[test]
fn test_encode_leaves_variables_alone() {
    let temp_dir = TempDir::new().unwrap();
    assert_success(&run(temp_dir.path(), &["keygen"]), "keygen");

    let output = run_encode(temp_dir.path(), &[], "secret${FOO}");
    assert_success(&output, "encode");
    assert_eq!(stdout_line(&output), "secret${FOO}");
}

#[test]
fn test_decode_with_fixture_keys_from_flags() {
    let temp_dir = TempDir::new().unwrap();
    let vectors: serde_json::Value =
        serde_json::from_str(include_str!("../testdata/strong-vectors.json")).unwrap();
    let ciphertext = vectors[0]["ciphertext"].as_str().unwrap();
    let plaintext = vectors[0]["plaintext"].as_str().unwrap();
    let testdata = testdata_path();
    let testdata = testdata.to_str().unwrap();

    let output = run(
        temp_dir.path(),
        &[
            "--public-key-dir",
            testdata,
            "--private-key-dir",
            testdata,
            "decode",
            &format!("SPEncrypted {}", ciphertext),
        ],
    );
    assert_success(&output, "decode");
    assert_eq!(stdout_line(&output), plaintext);
}

#[test]
fn test_key_locations_from_environment() {
    let temp_dir = TempDir::new().unwrap();
    let key_dir = temp_dir.path().join("keys");
    fs::create_dir(&key_dir).unwrap();

    let output = strongpass(temp_dir.path())
        .env("KETTLE_STRONG_PASSWORD_ENCODED_PUBKEY_PATH", &key_dir)
        .env("KETTLE_STRONG_PASSWORD_ENCODED_PRIVKEY_PATH", &key_dir)
        .env("KETTLE_STRONG_PASSWORD_ENCODED_PRIVKEY_FILENAME", "secret.key")
        .arg("keygen")
        .output()
        .unwrap();
    assert_success(&output, "keygen");

    assert!(key_dir.join("public.key").exists());
    assert!(key_dir.join("secret.key").exists());
    assert!(!temp_dir.path().join("private.key").exists());
}

#[test]
fn test_key_location_flags_override_environment() {
    let temp_dir = TempDir::new().unwrap();
    let key_dir = temp_dir.path().join("keys");
    fs::create_dir(&key_dir).unwrap();

    let output = strongpass(temp_dir.path())
        .env("KETTLE_STRONG_PASSWORD_ENCODED_PUBKEY_PATH", &key_dir)
        .env("KETTLE_STRONG_PASSWORD_ENCODED_PRIVKEY_PATH", &key_dir)
        .env("KETTLE_STRONG_PASSWORD_ENCODED_PRIVKEY_FILENAME", "secret.key")
        .args(["--private-key-file", "flag.key", "keygen"])
        .output()
        .unwrap();
    assert_success(&output, "keygen");

    // Directories still come from the environment, the file name from the flag.
    assert!(key_dir.join("public.key").exists());
    assert!(key_dir.join("flag.key").exists());
    assert!(!key_dir.join("secret.key").exists());
}

#[test]
fn test_decode_legacy_value() {
    let temp_dir = TempDir::new().unwrap();
    assert_success(&run(temp_dir.path(), &["keygen"]), "keygen");

    let output = run(
        temp_dir.path(),
        &["decode", "Encrypted 6a757374616e6f60d8eddcab0bd39780bb18bd63c99dbdde"],
    );
    assert_success(&output, "decode");
    assert_eq!(stdout_line(&output), "justanobfuscatedpassword");
}

#[test]
fn test_decode_plaintext_passes_through() {
    let temp_dir = TempDir::new().unwrap();
    assert_success(&run(temp_dir.path(), &["keygen"]), "keygen");

    let output = run(temp_dir.path(), &["decode", "plain"]);
    assert_success(&output, "decode");
    assert_eq!(stdout_line(&output), "plain");
}

#[test]
fn test_corrupt_strong_value_fails_in_both_modes() {
    let temp_dir = TempDir::new().unwrap();
    assert_success(&run(temp_dir.path(), &["keygen"]), "keygen");
    let corrupt = "SPEncrypted 6a757374616e6f60d8eddcab0bd39780bb18bd63c99dbdde";

    let output = run(temp_dir.path(), &["decode", corrupt]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error:"));

    // Lenient mode tries the legacy scheme first, which rejects the prefix.
    let output = run(temp_dir.path(), &["decode", "--lenient", corrupt]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("falling back to legacy decoding"));
    assert!(stderr.contains("not legacy obfuscated"));
}

#[test]
fn test_lenient_decode_of_bare_legacy_value() {
    let temp_dir = TempDir::new().unwrap();
    assert_success(&run(temp_dir.path(), &["keygen"]), "keygen");

    let output = run(
        temp_dir.path(),
        &["decode", "--lenient", "6a757374616e6f60d8eddcab0bd39780bb18bd63c99dbdde"],
    );
    assert_success(&output, "decode --lenient");
    assert_eq!(stdout_line(&output), "justanobfuscatedpassword");
    assert!(String::from_utf8_lossy(&output.stderr).contains("falling back to legacy decoding"));
}

#[test]
fn test_missing_keys_fail() {
    let temp_dir = TempDir::new().unwrap();

    let output = run(temp_dir.path(), &["decode", "plain"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("cannot load public key"),
        "Expected key load error, got: {}",
        stderr
    );
    assert!(output.stdout.is_empty());
}

#[test]
fn test_prefixes() {
    let temp_dir = TempDir::new().unwrap();
    let output = run(temp_dir.path(), &["prefixes"]);
    assert_success(&output, "prefixes");
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "SPEncrypted \nEncrypted \n"
    );
}
