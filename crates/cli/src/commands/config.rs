use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use docusphere_core::config::{AppConfig, LoadOptions};
use toml::Value;

/// One reported setting: its dotted path, rendered value, and the
/// environment variables that can set it, in precedence order.
struct Setting {
    key_path: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for setting in settings(&config) {
        let source = field_source(
            setting.key_path,
            setting.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(setting.key_path, &setting.value, source));
    }

    lines.join("\n")
}

fn settings(config: &AppConfig) -> Vec<Setting> {
    vec![
        Setting {
            key_path: "database.url",
            value: config.database.url.clone(),
            env_keys: &["DOCUSPHERE_DATABASE_URL"],
        },
        Setting {
            key_path: "database.max_connections",
            value: config.database.max_connections.to_string(),
            env_keys: &["DOCUSPHERE_DATABASE_MAX_CONNECTIONS"],
        },
        Setting {
            key_path: "database.timeout_secs",
            value: config.database.timeout_secs.to_string(),
            env_keys: &["DOCUSPHERE_DATABASE_TIMEOUT_SECS"],
        },
        Setting {
            key_path: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["DOCUSPHERE_SERVER_BIND_ADDRESS"],
        },
        Setting {
            key_path: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["DOCUSPHERE_SERVER_PORT"],
        },
        Setting {
            key_path: "server.graceful_shutdown_secs",
            value: config.server.graceful_shutdown_secs.to_string(),
            env_keys: &["DOCUSPHERE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        },
        Setting {
            key_path: "workflow.rejection_policy",
            value: config.workflow.rejection_policy.as_str().to_string(),
            env_keys: &["DOCUSPHERE_WORKFLOW_REJECTION_POLICY"],
        },
        Setting {
            key_path: "workflow.default_min_validations",
            value: config.workflow.default_min_validations.to_string(),
            env_keys: &["DOCUSPHERE_WORKFLOW_DEFAULT_MIN_VALIDATIONS"],
        },
        Setting {
            key_path: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["DOCUSPHERE_LOGGING_LEVEL", "DOCUSPHERE_LOG_LEVEL"],
        },
        Setting {
            key_path: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["DOCUSPHERE_LOGGING_FORMAT", "DOCUSPHERE_LOG_FORMAT"],
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    ["docusphere.toml", "config/docusphere.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
