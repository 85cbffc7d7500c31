//! Handshake URL signing.
//!
//! The push endpoint rejects connections without a `signature` query
//! parameter. It is derived in two steps:
//!
//! 1. [`param_digest`]: a fixed, ordered subset of the URL's query
//!    parameters is joined as `key=value,key=value,...` and MD5-hashed.
//! 2. A [`Signer`] turns the hex digest into the final signature. The
//!    platform's algorithm ships as obfuscated JavaScript, so the default
//!    [`ScriptSigner`] runs it in a JavaScript runtime subprocess.
//!
//! # Script contract
//!
//! The runtime is started as `<runtime> -e <bootstrap> <script> <function>`.
//! The bootstrap evaluates the script in the global context, reads the
//! digest (UTF-8) from stdin, calls `<function>(digest)` and writes the
//! result (UTF-8, no trailing newline) to stdout. A non-zero exit status
//! means the function threw; stderr carries the reason.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use livetap_core::SignatureError;
use livetap_settings::SignerSettings;
use md5::{Digest, Md5};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Query parameters covered by the signature, in digest order.
pub const SIGNED_PARAMS: [&str; 13] = [
    "live_id",
    "aid",
    "version_code",
    "webcast_sdk_version",
    "room_id",
    "sub_room_id",
    "sub_channel_id",
    "did_rule",
    "user_unique_id",
    "device_platform",
    "device_type",
    "ac",
    "identity",
];

const BOOTSTRAP: &str = r"
const fs = require('fs');
const vm = require('vm');
const [scriptPath, fnName] = process.argv.slice(1);
const input = fs.readFileSync(0, 'utf8').trim();
vm.runInThisContext(fs.readFileSync(scriptPath, 'utf8'), { filename: scriptPath });
const fn = globalThis[fnName];
if (typeof fn !== 'function') {
  process.stderr.write(`${fnName} is not a function`);
  process.exit(3);
}
process.stdout.write(String(fn(input)));
";

/// MD5 hex digest of the signed parameters of `url`.
///
/// The query is split verbatim on `&` and `=`, without percent-decoding,
/// because the signature is computed over the literal text the server
/// receives. Missing parameters contribute an empty value.
pub fn param_digest(url: &str) -> String {
    let query = url.split_once('?').map_or("", |(_, q)| q);
    let pairs: Vec<(&str, &str)> = query
        .split('&')
        .filter(|p| !p.is_empty())
        .map(|p| {
            let key = p.split('=').next().unwrap_or_default();
            let value = p.rsplit('=').next().unwrap_or_default();
            if p.contains('=') { (key, value) } else { (key, "") }
        })
        .collect();

    let joined = SIGNED_PARAMS
        .iter()
        .map(|name| {
            // Later duplicates win.
            let value = pairs
                .iter()
                .rev()
                .find(|(k, _)| k == name)
                .map_or("", |(_, v)| *v);
            format!("{name}={value}")
        })
        .collect::<Vec<_>>()
        .join(",");

    format!("{:x}", Md5::digest(joined.as_bytes()))
}

/// Turns a parameter digest into a handshake signature.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Sign one digest.
    async fn sign(&self, digest: &str) -> Result<String, SignatureError>;
}

/// Runs the platform signing script through an external JavaScript runtime.
#[derive(Clone, Debug)]
pub struct ScriptSigner {
    runtime: String,
    script_path: PathBuf,
    function: String,
    timeout: Duration,
}

impl ScriptSigner {
    /// Build a signer from settings.
    pub fn from_settings(settings: &SignerSettings) -> Self {
        Self {
            runtime: settings.runtime.clone(),
            script_path: PathBuf::from(&settings.script_path),
            function: settings.function.clone(),
            timeout: Duration::from_millis(settings.timeout_ms),
        }
    }
}

#[async_trait]
impl Signer for ScriptSigner {
    async fn sign(&self, digest: &str) -> Result<String, SignatureError> {
        if !self.script_path.is_file() {
            return Err(SignatureError::ScriptUnavailable(format!(
                "{}: no such file",
                self.script_path.display()
            )));
        }

        let mut cmd = tokio::process::Command::new(&self.runtime);
        let _ = cmd
            .arg("-e")
            .arg(BOOTSTRAP)
            .arg(&self.script_path)
            .arg(&self.function)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(runtime = %self.runtime, script = %self.script_path.display(), "spawning signer");

        let mut child = cmd
            .spawn()
            .map_err(|e| SignatureError::ScriptUnavailable(format!("{}: {e}", self.runtime)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(digest.as_bytes())
                .await
                .map_err(|e| SignatureError::ScriptFailed(format!("write stdin: {e}")))?;
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| SignatureError::Timeout(self.timeout))?
            .map_err(|e| SignatureError::ScriptFailed(format!("wait: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(status = ?output.status.code(), stderr = %stderr, "signer exited with failure");
            return Err(SignatureError::ScriptFailed(stderr));
        }

        let signature = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if signature.is_empty() {
            return Err(SignatureError::EmptySignature);
        }
        Ok(signature)
    }
}

/// Signs push endpoint URLs.
#[derive(Clone)]
pub struct SignatureProvider {
    signer: Arc<dyn Signer>,
}

impl SignatureProvider {
    /// Wrap a signer.
    pub fn new(signer: Arc<dyn Signer>) -> Self {
        Self { signer }
    }

    /// Signature for `url`.
    pub async fn sign_url(&self, url: &str) -> Result<String, SignatureError> {
        let digest = param_digest(url);
        debug!(%digest, "signing handshake parameters");
        let signature = self.signer.sign(&digest).await?;
        if signature.is_empty() {
            return Err(SignatureError::EmptySignature);
        }
        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const URL: &str = "wss://push.example/webcast/im/push/v2/?app_name=douyin_web\
        &version_code=180800&webcast_sdk_version=1.0.14-beta.0&aid=6383&live_id=1\
        &did_rule=3&user_unique_id=7319483754668557238&identity=audience\
        &room_id=7777&device_platform=web&heartbeatDuration=0";

    struct EchoSigner;

    #[async_trait]
    impl Signer for EchoSigner {
        async fn sign(&self, digest: &str) -> Result<String, SignatureError> {
            Ok(format!("sig-{digest}"))
        }
    }

    struct BlankSigner;

    #[async_trait]
    impl Signer for BlankSigner {
        async fn sign(&self, _digest: &str) -> Result<String, SignatureError> {
            Ok(String::new())
        }
    }

    #[test]
    fn digest_of_known_url() {
        assert_eq!(param_digest(URL), "14447de12d66a30fd3c6f9a01713837f");
    }

    #[test]
    fn digest_ignores_parameter_order_and_extras() {
        let shuffled = "wss://x/?room_id=7777&identity=audience&device_platform=web\
            &user_unique_id=7319483754668557238&did_rule=3&live_id=1&aid=6383\
            &webcast_sdk_version=1.0.14-beta.0&version_code=180800&cursor=abc";
        assert_eq!(param_digest(shuffled), param_digest(URL));
    }

    #[test]
    fn digest_without_query_uses_empty_values() {
        assert_eq!(param_digest("wss://x/"), "95053653bedc0264b2a3a2a9a72050db");
    }

    #[test]
    fn digest_changes_with_room() {
        let other = URL.replace("room_id=7777", "room_id=7778");
        assert_ne!(param_digest(&other), param_digest(URL));
    }

    #[tokio::test]
    async fn signature_is_deterministic() {
        let provider = SignatureProvider::new(Arc::new(EchoSigner));
        let a = provider.sign_url(URL).await.unwrap();
        let b = provider.sign_url(URL).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a, "sig-14447de12d66a30fd3c6f9a01713837f");
    }

    #[tokio::test]
    async fn blank_signature_is_rejected() {
        let provider = SignatureProvider::new(Arc::new(BlankSigner));
        let err = provider.sign_url(URL).await.unwrap_err();
        assert_matches!(err, SignatureError::EmptySignature);
    }

    #[tokio::test]
    async fn missing_script_is_unavailable() {
        let signer = ScriptSigner::from_settings(&SignerSettings {
            script_path: "/nonexistent/sign.js".into(),
            ..SignerSettings::default()
        });
        let err = signer.sign("abc").await.unwrap_err();
        assert_matches!(err, SignatureError::ScriptUnavailable(msg) if msg.contains("sign.js"));
    }

    #[tokio::test]
    async fn missing_runtime_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("sign.js");
        std::fs::write(&script, "function get_sign(x) { return x; }").unwrap();

        let signer = ScriptSigner::from_settings(&SignerSettings {
            script_path: script.display().to_string(),
            runtime: "/nonexistent/js-runtime".into(),
            ..SignerSettings::default()
        });
        let err = signer.sign("abc").await.unwrap_err();
        assert_matches!(err, SignatureError::ScriptUnavailable(_));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn url_for(pairs: &[(&str, String)]) -> String {
            let query: Vec<String> = pairs.iter().map(|(k, v)| format!("{k}={v}")).collect();
            format!("wss://push.example/ws/?{}", query.join("&"))
        }

        proptest! {
            #[test]
            fn digest_is_deterministic(values in proptest::collection::vec("[A-Za-z0-9._%-]{0,16}", 13)) {
                let pairs: Vec<(&str, String)> = SIGNED_PARAMS.iter().copied().zip(values).collect();
                let url = url_for(&pairs);
                let digest = param_digest(&url);
                prop_assert_eq!(&digest, &param_digest(&url));
                prop_assert_eq!(digest.len(), 32);
                prop_assert!(digest.bytes().all(|b| b.is_ascii_hexdigit()));
            }

            #[test]
            fn digest_ignores_order(values in proptest::collection::vec("[A-Za-z0-9._%-]{0,16}", 13)) {
                let mut pairs: Vec<(&str, String)> = SIGNED_PARAMS.iter().copied().zip(values).collect();
                let forward = param_digest(&url_for(&pairs));
                pairs.reverse();
                prop_assert_eq!(forward, param_digest(&url_for(&pairs)));
            }
        }
    }
}
