//! Out-of-process script backend.
//!
//! Runs `<script> --url <URL> --output-file <path> --timeout <seconds>` and
//! decodes the frame stream the script leaves in `<path>`. The output file is
//! read whatever the exit code was: scripts often exit non-zero after writing
//! a perfectly good error response.

use async_trait::async_trait;
use crawlkit_core::{FetchRequest, NormalizedResponse, codec};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, instrument, warn};

use super::{BackendDescriptor, FetchBackend};
use crate::error::{ConfigError, FetchError, ProcessError};
use crate::host::ProcessRunner;

/// Setting holding the script path.
pub const SCRIPT_SETTING: &str = "script";

/// Setting holding extra arguments placed before the standard ones.
pub const ARGS_SETTING: &str = "args";

/// Runs an external script per fetch.
#[derive(Debug, Clone)]
pub struct ScriptBackend {
    name: String,
    script: Option<String>,
    extra_args: Vec<String>,
    runner: ProcessRunner,
}

impl ScriptBackend {
    /// Creates the backend from its descriptor.
    pub fn new(descriptor: &BackendDescriptor) -> Self {
        let extra_args = descriptor
            .settings
            .get(ARGS_SETTING)
            .and_then(serde_json::Value::as_array)
            .map(|args| {
                args.iter()
                    .filter_map(|a| a.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: descriptor.name.clone(),
            script: descriptor.setting_str(SCRIPT_SETTING).map(str::to_string),
            extra_args,
            runner: ProcessRunner::new(),
        }
    }

    /// Command-line arguments for one run.
    pub fn arguments(&self, url: &str, output: &str, timeout: Duration) -> Vec<String> {
        let mut args = self.extra_args.clone();
        args.extend([
            "--url".to_string(),
            url.to_string(),
            "--output-file".to_string(),
            output.to_string(),
            "--timeout".to_string(),
            timeout.as_secs().max(1).to_string(),
        ]);
        args
    }

    async fn run(
        &self,
        request: &FetchRequest,
        timeout: Duration,
    ) -> Result<NormalizedResponse, FetchError> {
        let script = self.script.as_deref().ok_or_else(|| ConfigError::MissingSetting {
            backend: self.name.clone(),
            setting: SCRIPT_SETTING.to_string(),
        })?;

        // Removed when dropped, on every path out of here.
        let output = NamedTempFile::new()?;
        let output_path = output.path().display().to_string();
        let args = self.arguments(&request.url, &output_path, timeout);

        let result = self.runner.run_with_timeout(script, &args, timeout).await?;
        if let Some(error) = result.exit_error() {
            debug!(error = %error, "Script exited non-zero, reading output anyway");
        }

        let data = tokio::fs::read(output.path()).await?;
        if data.is_empty() {
            return Err(unreadable(result.exit_error(), "output file is empty"));
        }

        let mut response = codec::decode_response(&data);
        if response.url.is_empty() && response.status_code == 0 && response.errors.is_empty() {
            return Err(unreadable(result.exit_error(), "output has no response fields"));
        }
        if response.url.is_empty() {
            response.url.clone_from(&request.url);
        }
        response.requested_url.clone_from(&request.url);
        Ok(response)
    }
}

fn unreadable(exit: Option<ProcessError>, reason: &str) -> FetchError {
    let message = match exit {
        Some(exit) => format!("{reason} ({exit})"),
        None => reason.to_string(),
    };
    ProcessError::UnreadableOutput(message).into()
}

#[async_trait]
impl FetchBackend for ScriptBackend {
    #[instrument(skip(self, request), fields(backend = %self.name, url = %request.url))]
    async fn fetch(&self, request: &FetchRequest, timeout: Duration) -> NormalizedResponse {
        match self.run(request, timeout).await {
            Ok(response) => {
                debug!(status = response.status_code, "Script fetch completed");
                response.with_backend(&self.name)
            }
            Err(e) => {
                warn!(error = %e, "Script fetch failed");
                NormalizedResponse::failed(&request.url, e.to_string()).with_backend(&self.name)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::backend::BackendKind;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// Writes an executable shell script into `dir`.
    fn write_script(dir: &TempDir, body: &str) -> String {
        let path = dir.path().join("fetch.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    fn backend(script: &str) -> ScriptBackend {
        ScriptBackend::new(
            &BackendDescriptor::new("script", BackendKind::Script).with_setting(SCRIPT_SETTING, script),
        )
    }

    /// Shell snippet that writes a frame stream to the `--output-file` argument.
    const WRITE_OK: &str = r#"
out=""
while [ $# -gt 0 ]; do
  case "$1" in --output-file) out="$2"; shift;; esac
  shift
done
printf 'url:https://example.org/final\0status_code:200\0headers:{"Content-Type":"text/html"}\0page_content:<p>hi</p>\0' > "$out"
"#;

    #[test]
    fn test_arguments_layout() {
        let backend = backend("/bin/true");
        let args = backend.arguments("https://a", "/tmp/out", Duration::from_secs(7));
        assert_eq!(
            args,
            vec!["--url", "https://a", "--output-file", "/tmp/out", "--timeout", "7"]
        );
    }

    #[tokio::test]
    async fn test_reads_output_file() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, WRITE_OK);
        let response = backend(&script)
            .fetch(&FetchRequest::new("https://example.org"), Duration::from_secs(5))
            .await;

        assert_eq!(response.status_code, 200);
        assert_eq!(response.url, "https://example.org/final");
        assert_eq!(response.requested_url, "https://example.org");
        assert_eq!(response.text.as_deref(), Some("<p>hi</p>"));
        assert!(response.errors.is_empty());
    }

    #[tokio::test]
    async fn test_output_read_despite_nonzero_exit() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, &format!("{WRITE_OK}\nexit 2"));
        let response = backend(&script)
            .fetch(&FetchRequest::new("https://example.org"), Duration::from_secs(5))
            .await;
        assert_eq!(response.status_code, 200);
    }

    #[tokio::test]
    async fn test_empty_output_is_error() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, "echo broken >&2; exit 1");
        let response = backend(&script)
            .fetch(&FetchRequest::new("https://example.org"), Duration::from_secs(5))
            .await;
        assert_eq!(response.status_code, 0);
        assert!(response.errors[0].contains("output file is empty"));
        assert!(response.errors[0].contains("broken"));
    }

    #[tokio::test]
    async fn test_missing_script_setting() {
        let backend = ScriptBackend::new(&BackendDescriptor::new("script", BackendKind::Script));
        let response = backend
            .fetch(&FetchRequest::new("https://example.org"), Duration::from_secs(1))
            .await;
        assert!(response.errors[0].contains("requires setting 'script'"));
    }
}
