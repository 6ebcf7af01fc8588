//! Runtime configuration: Ollama host resolution, model defaults, provider kinds

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Fallback Ollama endpoint when nothing else is configured
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11435";
/// Default model for both Ollama providers
pub const OLLAMA_DEFAULT_MODEL: &str = "mistral-small3.2:latest";
/// Default Gemini model
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.5-pro";
/// Default model for single-field verification
pub const VERIFY_DEFAULT_MODEL: &str = "qwen3-vl:32b";
/// Second model of conflict reconciliation, reconciled against Gemini
pub const CONFLICT_MODEL_B: &str = "qwen3-vl:235b-cloud";
/// Root directory of the per-model output cache
pub const DEFAULT_OUTPUT_DIR: &str = "_multi_model_output";
/// Provider request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 1800;
/// DPI used to render the page image sent to a model
pub const DEFAULT_RENDER_DPI: f32 = 200.0;
/// DPI used to render pages for Tesseract
pub const OCR_RENDER_DPI: f32 = 300.0;

const OLLAMA_HOST_KEY: &str = "OLLAMA_HOST";
const GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";

/// LLM backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ProviderKind {
    /// Ollama REST API (`/api/generate`)
    #[value(name = "ollama")]
    Ollama,
    /// `ollama run` subprocess
    #[value(name = "ollama_cli")]
    OllamaCli,
    /// Google Gemini REST API
    #[value(name = "gemini")]
    Gemini,
}

impl ProviderKind {
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Ollama | ProviderKind::OllamaCli => OLLAMA_DEFAULT_MODEL,
            ProviderKind::Gemini => GEMINI_DEFAULT_MODEL,
        }
    }

    /// Suffix used in output file names (`<pdf>.<type>.<suffix>.json`)
    pub fn file_suffix(&self) -> &'static str {
        match self {
            ProviderKind::Ollama | ProviderKind::OllamaCli => "ollama",
            ProviderKind::Gemini => "gemini",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::OllamaCli => "ollama_cli",
            ProviderKind::Gemini => "gemini",
        }
    }

    /// Guess the provider that produced a model output directory
    pub fn infer_from_model_dir(model_dir_name: &str) -> Self {
        if model_dir_name.to_lowercase().contains("gemini") {
            ProviderKind::Gemini
        } else {
            ProviderKind::Ollama
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve the Ollama host: environment, then `.env`, then `.env.template`, then the default.
pub fn resolve_ollama_host() -> String {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf));
    resolve_ollama_host_from(
        std::env::var(OLLAMA_HOST_KEY).ok(),
        &std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        exe_dir.as_deref(),
    )
}

/// Host resolution with explicit inputs
pub fn resolve_ollama_host_from(
    env_value: Option<String>,
    cwd: &Path,
    fallback_dir: Option<&Path>,
) -> String {
    if let Some(host) = env_value.filter(|h| !h.trim().is_empty()) {
        return host;
    }

    for file_name in [".env", ".env.template"] {
        let Some(path) = locate_env_file(file_name, cwd, fallback_dir) else {
            continue;
        };
        if let Some(host) = read_env_file(&path) {
            tracing::debug!(path = %path.display(), "OLLAMA_HOST taken from env file");
            return host;
        }
    }

    DEFAULT_OLLAMA_HOST.to_string()
}

fn locate_env_file(file_name: &str, cwd: &Path, fallback_dir: Option<&Path>) -> Option<PathBuf> {
    let primary = cwd.join(file_name);
    if primary.is_file() {
        return Some(primary);
    }
    fallback_dir
        .map(|dir| dir.join(file_name))
        .filter(|p| p.is_file())
}

/// Read the `OLLAMA_HOST` key from a dotenv file. Unreadable files and other keys are ignored.
pub fn read_env_file(path: &Path) -> Option<String> {
    let iter = dotenvy::from_path_iter(path).ok()?;
    for item in iter {
        match item {
            Ok((key, value)) if key == OLLAMA_HOST_KEY => {
                let value = value.trim().to_string();
                if value.is_empty() {
                    return None;
                }
                return Some(value);
            }
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "skipping malformed env line");
                continue;
            }
        }
    }
    None
}

/// Gemini API key from the argument or `GOOGLE_API_KEY`
pub fn resolve_api_key(arg: Option<&str>) -> Option<String> {
    arg.map(str::to_string)
        .filter(|k| !k.is_empty())
        .or_else(|| std::env::var(GOOGLE_API_KEY).ok().filter(|k| !k.is_empty()))
}

/// Everything a provider needs to be built
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub model: String,
    pub api_key: Option<String>,
    pub ollama_host: String,
    pub timeout_secs: u64,
}

impl ProviderConfig {
    /// Build a config, filling in the default model and checking the Gemini key
    pub fn new(
        kind: ProviderKind,
        model: Option<String>,
        api_key: Option<String>,
        ollama_host: String,
        timeout_secs: u64,
    ) -> Result<Self> {
        let model = model.unwrap_or_else(|| kind.default_model().to_string());
        if kind == ProviderKind::Gemini && api_key.is_none() {
            return Err(Error::Config {
                reason: "--api-key or GOOGLE_API_KEY is required for Gemini".to_string(),
            });
        }
        Ok(Self {
            kind,
            model,
            api_key,
            ollama_host,
            timeout_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_env_variable_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".env"), "OLLAMA_HOST=http://from-file:1\n").unwrap();

        let host = resolve_ollama_host_from(
            Some("http://from-env:2".to_string()),
            dir.path(),
            None,
        );
        assert_eq!(host, "http://from-env:2");
    }

    #[test]
    fn test_empty_env_variable_falls_through() {
        let dir = tempfile::tempdir().unwrap();
        let host = resolve_ollama_host_from(Some("  ".to_string()), dir.path(), None);
        assert_eq!(host, DEFAULT_OLLAMA_HOST);
    }

    #[test]
    fn test_env_file_with_export_quotes_and_comment() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(".env"),
            "# local settings\nOTHER=1\nexport OLLAMA_HOST=\"http://10.0.0.5:11434\" # gpu box\n",
        )
        .unwrap();

        let host = resolve_ollama_host_from(None, dir.path(), None);
        assert_eq!(host, "http://10.0.0.5:11434");
    }

    #[test]
    fn test_template_used_when_env_lacks_key() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".env"), "OTHER=1\n").unwrap();
        fs::write(
            dir.path().join(".env.template"),
            "OLLAMA_HOST=http://template:11435\n",
        )
        .unwrap();

        let host = resolve_ollama_host_from(None, dir.path(), None);
        assert_eq!(host, "http://template:11435");
    }

    #[test]
    fn test_fallback_dir_searched() {
        let cwd = tempfile::tempdir().unwrap();
        let exe_dir = tempfile::tempdir().unwrap();
        fs::write(exe_dir.path().join(".env"), "OLLAMA_HOST=http://beside-binary\n").unwrap();

        let host = resolve_ollama_host_from(None, cwd.path(), Some(exe_dir.path()));
        assert_eq!(host, "http://beside-binary");
    }

    #[test]
    fn test_default_host() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            resolve_ollama_host_from(None, dir.path(), None),
            DEFAULT_OLLAMA_HOST
        );
    }

    #[test]
    fn test_provider_kind_helpers() {
        assert_eq!(ProviderKind::OllamaCli.file_suffix(), "ollama");
        assert_eq!(ProviderKind::Gemini.file_suffix(), "gemini");
        assert_eq!(ProviderKind::Ollama.default_model(), OLLAMA_DEFAULT_MODEL);
        assert_eq!(
            ProviderKind::infer_from_model_dir("Gemini-2.5-flash"),
            ProviderKind::Gemini
        );
        assert_eq!(
            ProviderKind::infer_from_model_dir("qwen3-vl_32b"),
            ProviderKind::Ollama
        );
    }

    #[test]
    fn test_gemini_requires_key() {
        let result = ProviderConfig::new(
            ProviderKind::Gemini,
            None,
            None,
            DEFAULT_OLLAMA_HOST.to_string(),
            30,
        );
        assert!(matches!(result, Err(Error::Config { .. })));

        let config = ProviderConfig::new(
            ProviderKind::Ollama,
            None,
            None,
            DEFAULT_OLLAMA_HOST.to_string(),
            30,
        )
        .unwrap();
        assert_eq!(config.model, OLLAMA_DEFAULT_MODEL);
    }
}
