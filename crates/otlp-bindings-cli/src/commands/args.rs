//! Argument groups shared between commands.
//!
//! Each group is read once at startup and turned into the explicit
//! configuration struct of the stage it drives.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use otlp_bindings_codegen::{CompilerConfig, Toolchain, DEFAULT_PROTOC_VERSION};
use otlp_bindings_core::{resolve_version, GitTagLocator, SchemaVersion, TaskCategory, TaskPolicy};
use otlp_bindings_publish::{RegistryAuth, RegistryConfig, RetryPolicy};
use otlp_bindings_source::{LocalSource, SourceConfig, DEFAULT_ARCHIVE_URL_TEMPLATE};

/// Name of the published bindings crate.
pub const DEFAULT_CRATE_NAME: &str = "opentelemetry-proto-bindings";

/// Public registry used when only a token is configured.
pub const DEFAULT_PUBLIC_REGISTRY_URL: &str = "https://crates.io";

/// Output format for reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

// =============================================================================
// Version
// =============================================================================

/// Schema version selection.
#[derive(Args, Debug, Clone)]
pub struct VersionArgs {
    /// Release version to build; defaults to the nearest version tag
    #[arg(long)]
    pub release_version: Option<String>,

    /// Repository searched for the nearest version tag
    #[arg(long, default_value = ".")]
    pub repo_dir: PathBuf,
}

impl VersionArgs {
    /// Resolves the schema version.
    pub fn resolve(&self) -> Result<SchemaVersion> {
        let locator = GitTagLocator::new(&self.repo_dir);
        resolve_version(self.release_version.as_deref(), &locator)
            .context("Failed to resolve schema version")
    }
}

// =============================================================================
// Proto sources
// =============================================================================

/// Proto source selection.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Working directory for archives, sources and the generated crate
    #[arg(long, default_value = "build")]
    pub work_dir: PathBuf,

    /// Local opentelemetry-proto checkout to use instead of downloading
    #[arg(long, env = "OTLP_PROTO_LOCAL_DIR")]
    pub local_proto_dir: Option<PathBuf>,

    /// Accept a local checkout whose version cannot be confirmed
    #[arg(long)]
    pub skip_local_version_check: bool,

    /// Archive URL template with a {version} placeholder
    #[arg(long, default_value = DEFAULT_ARCHIVE_URL_TEMPLATE)]
    pub archive_url: String,

    /// Archive download timeout in seconds
    #[arg(long, default_value = "300")]
    pub download_timeout: u64,
}

impl SourceArgs {
    /// Builds the provider configuration.
    pub fn config(&self) -> SourceConfig {
        let config = SourceConfig::new(&self.work_dir)
            .with_timeout(Duration::from_secs(self.download_timeout));

        match &self.local_proto_dir {
            Some(dir) => {
                let mut local = LocalSource::new(dir);
                if self.skip_local_version_check {
                    local = local.without_version_check();
                }
                config.with_local(local)
            }
            None => config.with_archive_url_template(&self.archive_url),
        }
    }

    /// Builds the configuration used to download a compatibility baseline,
    /// which always comes from the release archives.
    pub fn baseline_config(&self) -> SourceConfig {
        SourceConfig::new(&self.work_dir)
            .with_timeout(Duration::from_secs(self.download_timeout))
            .with_archive_url_template(&self.archive_url)
    }
}

// =============================================================================
// Compilation
// =============================================================================

/// Compiler and output settings.
#[derive(Args, Debug, Clone)]
pub struct CodegenArgs {
    /// Name of the generated crate
    #[arg(long, default_value = DEFAULT_CRATE_NAME)]
    pub crate_name: String,

    /// protoc executable
    #[arg(long, env = "PROTOC", default_value = "protoc")]
    pub protoc: PathBuf,

    /// Expected protoc version
    #[arg(long, default_value = DEFAULT_PROTOC_VERSION)]
    pub protoc_version: String,

    /// Accept any installed protoc version
    #[arg(long)]
    pub skip_protoc_version_check: bool,

    /// Output directory for packaged artifacts
    #[arg(short, long, default_value = "dist")]
    pub out_dir: PathBuf,
}

impl CodegenArgs {
    /// Builds the compiler configuration for a working directory.
    pub fn config(&self, work_dir: &std::path::Path) -> CompilerConfig {
        let mut toolchain = Toolchain::new().with_protoc(&self.protoc);
        toolchain = if self.skip_protoc_version_check {
            toolchain.without_version_check()
        } else {
            toolchain.with_expected_version(&self.protoc_version)
        };
        CompilerConfig::new(&self.crate_name, work_dir.join("crate")).with_toolchain(toolchain)
    }
}

// =============================================================================
// Task policy
// =============================================================================

/// Optional task selection.
#[derive(Args, Debug, Clone, Default)]
pub struct TaskArgs {
    /// Optional task categories to run (test, bench, docs, compat, style, sources)
    #[arg(long, value_delimiter = ',')]
    pub enable: Vec<TaskCategory>,

    /// Baseline release for the compatibility check
    #[arg(long)]
    pub compat_baseline: Option<String>,
}

impl TaskArgs {
    /// Builds the task policy. Nothing optional runs unless enabled.
    pub fn policy(&self) -> TaskPolicy {
        self.enable
            .iter()
            .fold(TaskPolicy::new(), |policy, category| policy.enable(*category))
    }

    /// Parses the compatibility baseline, if any.
    pub fn baseline(&self) -> Result<Option<SchemaVersion>> {
        self.compat_baseline
            .as_deref()
            .map(SchemaVersion::parse)
            .transpose()
            .context("Invalid --compat-baseline")
    }
}

// =============================================================================
// Registries
// =============================================================================

/// Publish targets and the release-transition policy.
#[derive(Args, Debug, Clone)]
pub struct RegistryArgs {
    /// Primary (internal) registry URL
    #[arg(long, env = "PRIMARY_REGISTRY_URL")]
    pub primary_registry_url: Option<String>,

    /// Username for the primary registry
    #[arg(long, env = "PRIMARY_REGISTRY_USERNAME")]
    pub primary_username: Option<String>,

    /// Password for the primary registry
    #[arg(long, env = "PRIMARY_REGISTRY_PASSWORD", hide_env_values = true)]
    pub primary_password: Option<String>,

    /// API token for the primary registry
    #[arg(long, env = "PRIMARY_REGISTRY_TOKEN", hide_env_values = true)]
    pub primary_token: Option<String>,

    /// Wait for the release on the primary registry as well
    #[arg(long)]
    pub verify_primary_release: bool,

    /// Public registry URL
    #[arg(long, env = "PUBLIC_REGISTRY_URL")]
    pub public_registry_url: Option<String>,

    /// API token for the public registry
    #[arg(long, env = "CARGO_REGISTRY_TOKEN", hide_env_values = true)]
    pub public_token: Option<String>,

    /// Allow plain http registry URLs
    #[arg(long)]
    pub allow_insecure_registry: bool,

    /// Connect timeout in seconds
    #[arg(long, default_value = "300")]
    pub connect_timeout: u64,

    /// Request timeout in seconds
    #[arg(long, default_value = "300")]
    pub timeout: u64,

    /// Maximum release status checks per registry
    #[arg(long, default_value = "300")]
    pub max_attempts: u32,

    /// Delay between release status checks in seconds
    #[arg(long, default_value = "10")]
    pub retry_delay: u64,
}

impl RegistryArgs {
    /// Builds the publish targets in upload order: primary, then public.
    pub fn targets(&self) -> Result<Vec<RegistryConfig>> {
        let mut targets = Vec::new();

        if let Some(url) = &self.primary_registry_url {
            let auth = determine_auth(
                self.primary_token.as_deref(),
                self.primary_username.as_deref(),
                self.primary_password.as_deref(),
            )?;
            targets.push(
                self.target("primary", url)
                    .with_auth(auth)
                    .with_release_verification(self.verify_primary_release),
            );
        }

        if self.public_registry_url.is_some() || self.public_token.is_some() {
            let url = self
                .public_registry_url
                .as_deref()
                .unwrap_or(DEFAULT_PUBLIC_REGISTRY_URL);
            let auth = determine_auth(self.public_token.as_deref(), None, None)?;
            targets.push(self.target("public", url).with_auth(auth));
        }

        if targets.is_empty() {
            anyhow::bail!(
                "No publish target configured: set PRIMARY_REGISTRY_URL, PUBLIC_REGISTRY_URL or CARGO_REGISTRY_TOKEN"
            );
        }
        Ok(targets)
    }

    /// Builds the release-transition retry policy.
    pub const fn retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(self.retry_delay))
    }

    fn target(&self, name: &str, url: &str) -> RegistryConfig {
        let config = RegistryConfig::new(name, url)
            .with_connect_timeout(Duration::from_secs(self.connect_timeout))
            .with_timeout(Duration::from_secs(self.timeout));
        if self.allow_insecure_registry {
            config.allow_insecure()
        } else {
            config
        }
    }
}

/// Determines the authentication method from credentials.
///
/// A token takes precedence over a username/password pair.
pub fn determine_auth(
    token: Option<&str>,
    username: Option<&str>,
    password: Option<&str>,
) -> Result<RegistryAuth> {
    if let Some(token) = token {
        return Ok(RegistryAuth::token(token));
    }

    if let (Some(username), Some(password)) = (username, password) {
        return Ok(RegistryAuth::basic(username, password));
    }

    if username.is_some() || password.is_some() {
        anyhow::bail!("Both a username and a password are required for basic authentication");
    }

    // No auth - useful for local registries
    Ok(RegistryAuth::None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    /// Task flags only. These carry no `env` fallbacks, so parsing does not
    /// depend on the process environment.
    #[derive(Parser)]
    struct TaskHarness {
        #[command(flatten)]
        tasks: TaskArgs,
    }

    fn parse_tasks(args: &[&str]) -> TaskArgs {
        TaskHarness::parse_from(std::iter::once("otlp-bindings").chain(args.iter().copied())).tasks
    }

    /// Registry flags at their command-line defaults, with no credentials.
    fn registry_args() -> RegistryArgs {
        RegistryArgs {
            primary_registry_url: None,
            primary_username: None,
            primary_password: None,
            primary_token: None,
            verify_primary_release: false,
            public_registry_url: None,
            public_token: None,
            allow_insecure_registry: false,
            connect_timeout: 300,
            timeout: 300,
            max_attempts: 300,
            retry_delay: 10,
        }
    }

    #[test]
    fn test_determine_auth_none() {
        let auth = determine_auth(None, None, None).unwrap();
        assert!(matches!(auth, RegistryAuth::None));
    }

    #[test]
    fn test_determine_auth_token() {
        match determine_auth(Some("cio_token"), None, None).unwrap() {
            RegistryAuth::Token { token } => assert_eq!(token, "cio_token"),
            other => panic!("expected token auth, got {other:?}"),
        }
    }

    #[test]
    fn test_determine_auth_basic() {
        match determine_auth(None, Some("user"), Some("pass")).unwrap() {
            RegistryAuth::Basic { username, password } => {
                assert_eq!(username, "user");
                assert_eq!(password, "pass");
            }
            other => panic!("expected basic auth, got {other:?}"),
        }
    }

    #[test]
    fn test_determine_auth_incomplete_basic() {
        assert!(determine_auth(None, Some("user"), None).is_err());
        assert!(determine_auth(None, None, Some("pass")).is_err());
    }

    #[test]
    fn test_determine_auth_token_takes_precedence() {
        let auth = determine_auth(Some("token"), Some("user"), Some("pass")).unwrap();
        assert!(matches!(auth, RegistryAuth::Token { .. }));
    }

    #[test]
    fn test_default_policy_enables_nothing() {
        assert_eq!(parse_tasks(&[]).policy(), TaskPolicy::new());
        assert_eq!(TaskArgs::default().policy(), TaskPolicy::new());
    }

    #[test]
    fn test_enable_list() {
        let policy = parse_tasks(&["--enable", "test,docs"]).policy();
        assert!(policy.is_enabled(TaskCategory::Test));
        assert!(policy.is_enabled(TaskCategory::Documentation));
        assert!(!policy.is_enabled(TaskCategory::StyleCheck));
    }

    #[test]
    fn test_unknown_category_rejected() {
        let result = TaskHarness::try_parse_from(["otlp-bindings", "--enable", "javadoc"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_targets_in_upload_order() {
        let args = RegistryArgs {
            primary_registry_url: Some("https://registry.example.com".to_string()),
            primary_username: Some("deployer".to_string()),
            primary_password: Some("secret".to_string()),
            public_token: Some("cio_token".to_string()),
            ..registry_args()
        };
        let targets = args.targets().unwrap();

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].name, "primary");
        assert!(!targets[0].verify_release);
        assert!(matches!(targets[0].auth, RegistryAuth::Basic { .. }));
        assert_eq!(targets[1].name, "public");
        assert_eq!(targets[1].url, DEFAULT_PUBLIC_REGISTRY_URL);
        assert!(targets[1].verify_release);
    }

    #[test]
    fn test_no_targets_is_an_error() {
        assert!(registry_args().targets().is_err());
    }

    #[test]
    fn test_retry_policy_from_args() {
        let args = RegistryArgs {
            max_attempts: 3,
            retry_delay: 1,
            ..registry_args()
        };
        let retry = args.retry();
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.delay, Duration::from_secs(1));
    }

    #[test]
    fn test_primary_token_overrides_basic_credentials() {
        let args = RegistryArgs {
            primary_registry_url: Some("https://registry.example.com".to_string()),
            primary_username: Some("deployer".to_string()),
            primary_password: Some("secret".to_string()),
            primary_token: Some("internal_token".to_string()),
            verify_primary_release: true,
            ..registry_args()
        };
        let targets = args.targets().unwrap();

        assert_eq!(targets.len(), 1);
        assert!(targets[0].verify_release);
        assert!(matches!(targets[0].auth, RegistryAuth::Token { .. }));
    }
}
