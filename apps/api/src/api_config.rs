use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rigger_core::AppError;
use rigger_domain::WorkspaceTemplate;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditBackendConfig {
    Postgres {
        database_url: String,
        max_connections: u32,
    },
    Memory,
}

impl AuditBackendConfig {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Postgres { .. } => "postgres",
            Self::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRuntimeConfig {
    pub program: String,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
    pub backend_config: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub api_host: String,
    pub api_port: u16,
    pub frontend_urls: Vec<String>,
    pub audit_backend: AuditBackendConfig,
    pub tool: ToolRuntimeConfig,
    pub workspace_root: PathBuf,
    pub template: WorkspaceTemplate,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = parsed_env("API_PORT", 8000_u16)?;
        let frontend_urls = split_list(
            env::var("FRONTEND_URLS")
                .unwrap_or_else(|_| "http://localhost:5173,http://localhost:3000".to_owned())
                .as_str(),
        );

        let audit_backend = match env::var("AUDIT_BACKEND")
            .unwrap_or_else(|_| "postgres".to_owned())
            .as_str()
        {
            "postgres" => AuditBackendConfig::Postgres {
                database_url: required_non_empty_env("DATABASE_URL")?,
                max_connections: parsed_env("DATABASE_MAX_CONNECTIONS", 10_u32)?,
            },
            "memory" => AuditBackendConfig::Memory,
            other => {
                return Err(AppError::Validation(format!(
                    "AUDIT_BACKEND must be either 'postgres' or 'memory', got '{other}'"
                )));
            }
        };

        let tool = ToolRuntimeConfig {
            program: env::var("TERRAFORM_BIN").unwrap_or_else(|_| "terraform".to_owned()),
            timeout: Duration::from_secs(parsed_env("TOOL_TIMEOUT_SECONDS", 1800_u64)?),
            output_limit_bytes: parsed_env("TOOL_OUTPUT_LIMIT_BYTES", 1024 * 1024_usize)?,
            backend_config: parse_backend_config(
                env::var("TF_BACKEND_CONFIG").unwrap_or_default().as_str(),
            )?,
        };
        if tool.timeout.is_zero() {
            return Err(AppError::Validation(
                "TOOL_TIMEOUT_SECONDS must be greater than zero".to_owned(),
            ));
        }

        let workspace_root = PathBuf::from(
            env::var("WORKSPACE_ROOT").unwrap_or_else(|_| "terraform_templates".to_owned()),
        );

        let defaults = WorkspaceTemplate::default();
        let template = WorkspaceTemplate {
            module_source: env::var("MODULE_SOURCE").unwrap_or(defaults.module_source),
            ami: env::var("INSTANCE_AMI").unwrap_or(defaults.ami),
            instance_type: env::var("INSTANCE_TYPE").unwrap_or(defaults.instance_type),
            state_bucket: env::var("STATE_BUCKET").unwrap_or(defaults.state_bucket),
            region: env::var("STATE_REGION").unwrap_or(defaults.region),
            lock_table: env::var("STATE_LOCK_TABLE").unwrap_or(defaults.lock_table),
        };

        Ok(Self {
            migrate_only,
            api_host,
            api_port,
            frontend_urls,
            audit_backend,
            tool,
            workspace_root,
            template,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Validation(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

fn parsed_env<T>(name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map_err(|error| AppError::Validation(format!("invalid {name}: {error}"))),
        _ => Ok(default),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn parse_backend_config(value: &str) -> Result<Vec<(String, String)>, AppError> {
    split_list(value)
        .into_iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, setting)) if !key.trim().is_empty() => {
                Ok((key.trim().to_owned(), setting.trim().to_owned()))
            }
            _ => Err(AppError::Validation(format!(
                "TF_BACKEND_CONFIG entries must be key=value, got '{pair}'"
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{parse_backend_config, split_list};

    #[test]
    fn frontend_urls_are_split_and_trimmed() {
        assert_eq!(
            split_list(" http://localhost:5173 , ,http://localhost:3000"),
            vec!["http://localhost:5173", "http://localhost:3000"]
        );
    }

    #[test]
    fn backend_config_pairs_are_parsed() {
        let parsed = parse_backend_config("bucket=state, region = us-east-1");
        let Ok(pairs) = parsed else {
            panic!("backend config should parse");
        };
        assert_eq!(
            pairs,
            vec![
                ("bucket".to_owned(), "state".to_owned()),
                ("region".to_owned(), "us-east-1".to_owned()),
            ]
        );
    }

    #[test]
    fn backend_config_rejects_entries_without_separator() {
        assert!(parse_backend_config("bucket").is_err());
        assert!(parse_backend_config("=value").is_err());
        assert!(matches!(parse_backend_config(""), Ok(pairs) if pairs.is_empty()));
    }
}
