//! 配置加载器实现
//!
//! 提供TOML配置文件解析、环境变量替换和错误处理功能

use crate::config::types::{validate_config, Config};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};

/// 配置加载器trait，定义配置加载接口
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    /// 从文件加载配置
    ///
    /// # 参数
    /// * `path` - 配置文件路径
    ///
    /// # 返回
    /// * `Result<Config>` - 加载的配置或错误
    async fn load_from_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<Config>;

    /// 从字符串加载配置
    ///
    /// # 参数
    /// * `content` - 配置文件内容
    ///
    /// # 返回
    /// * `Result<Config>` - 加载的配置或错误
    async fn load_from_string(&self, content: &str) -> Result<Config>;

    /// 验证配置
    fn validate(&self, config: &Config) -> Result<()>;
}

/// TOML配置加载器实现
#[derive(Debug, Clone)]
pub struct TomlConfigLoader {
    /// 是否启用环境变量替换
    enable_env_substitution: bool,
}

impl TomlConfigLoader {
    /// 创建新的TOML配置加载器
    ///
    /// # 参数
    /// * `enable_env_substitution` - 是否启用环境变量替换
    pub fn new(enable_env_substitution: bool) -> Self {
        Self {
            enable_env_substitution,
        }
    }

    /// 加载配置文件，文件不存在时使用默认配置
    ///
    /// # 返回
    /// * `Result<(Config, bool)>` - 配置以及是否来自文件
    pub async fn load_or_default<P: AsRef<Path> + Send>(&self, path: P) -> Result<(Config, bool)> {
        let path = path.as_ref();
        if path.exists() {
            Ok((self.load_from_file(path).await?, true))
        } else {
            log::info!("配置文件 {} 不存在，使用默认配置", path.display());
            Ok((Config::default(), false))
        }
    }

    /// 替换字符串中的环境变量
    ///
    /// 注释行中的占位符不做替换。
    fn substitute_env_vars(&self, content: &str) -> Result<String> {
        if !self.enable_env_substitution {
            return Ok(content.to_string());
        }

        // 匹配 ${VAR_NAME} 格式的环境变量
        let env_var_regex = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .map_err(|e| ConfigError::ParseError(format!("正则表达式错误: {}", e)))?;

        let mut lines = Vec::new();
        for line in content.lines() {
            if line.trim_start().starts_with('#') {
                lines.push(line.to_string());
                continue;
            }

            let mut result = line.to_string();
            for captures in env_var_regex.captures_iter(line) {
                let full_match = &captures[0];
                let var_name = &captures[1];

                match std::env::var(var_name) {
                    Ok(value) => {
                        result = result.replace(full_match, &value);
                    }
                    Err(_) => {
                        return Err(ConfigError::EnvVarError {
                            var: var_name.to_string(),
                        }
                        .into());
                    }
                }
            }
            lines.push(result);
        }

        Ok(lines.join("\n"))
    }

    /// 解析TOML内容
    fn parse_toml(&self, content: &str) -> Result<Config> {
        let processed_content = self.substitute_env_vars(content)?;

        let mut config: Config = toml::from_str(&processed_content)
            .map_err(|e| ConfigError::ParseError(format!("TOML解析失败: {}", e)))?;
        config.normalize();

        Ok(config)
    }
}

impl Default for TomlConfigLoader {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl ConfigLoader for TomlConfigLoader {
    async fn load_from_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_string_lossy().to_string(),
            }
            .into());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::ParseError(format!("读取文件失败: {}", e)))?;

        let config = self.parse_toml(&content)?;
        self.validate(&config)?;

        log::info!("成功加载配置文件: {}", path.display());
        log::debug!("配置内容: {:?}", config);

        Ok(config)
    }

    async fn load_from_string(&self, content: &str) -> Result<Config> {
        let config = self.parse_toml(content)?;
        self.validate(&config)?;

        log::debug!("成功解析配置字符串");

        Ok(config)
    }

    fn validate(&self, config: &Config) -> Result<()> {
        validate_config(config).map_err(|e| ConfigError::ValidationError(e).into())
    }
}

/// 获取默认配置文件路径
///
/// 当前目录存在 `config.toml` 时优先使用，否则使用系统配置目录下的
/// `uptime-sentinel/config.toml`。
pub fn get_default_config_path() -> PathBuf {
    if Path::new("config.toml").exists() {
        return PathBuf::from("config.toml");
    }
    dirs::config_dir()
        .map(|config_dir| config_dir.join(crate::APP_NAME).join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageBackend;
    use serial_test::serial;
    use std::env;

    const TEST_CONFIG_TOML: &str = r#"
log_level = "debug"

[server]
port = 8080
cors_origins = ["http://localhost:5173"]

[scheduler]
tick_interval_seconds = 2
max_concurrent_checks = 3

[storage]
backend = "sqlite"
path = "sentinel.db"
"#;

    const TEST_CONFIG_WITH_ENV_VARS: &str = r#"
[notification]
# slack_webhook_url = "${NOT_SET_ANYWHERE}"
slack_webhook_url = "${SENTINEL_TEST_WEBHOOK}"

[auth]
password = "${SENTINEL_TEST_PASSWORD}"
"#;

    #[tokio::test]
    async fn test_toml_parsing() {
        let loader = TomlConfigLoader::new(false);
        let config = loader.load_from_string(TEST_CONFIG_TOML).await.unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.scheduler.tick_interval_seconds, 2);
        assert_eq!(config.scheduler.max_concurrent_checks, 3);
        assert_eq!(config.scheduler.request_timeout_seconds, 10);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert!(config.auth.password.is_none());
    }

    #[tokio::test]
    async fn test_empty_document_uses_defaults() {
        let loader = TomlConfigLoader::new(true);
        let config = loader.load_from_string("").await.unwrap();
        assert_eq!(config, Config::default());
    }

    #[tokio::test]
    #[serial]
    async fn test_env_var_substitution() {
        env::set_var("SENTINEL_TEST_WEBHOOK", "https://hooks.slack.test/abc");
        env::set_var("SENTINEL_TEST_PASSWORD", "");

        let loader = TomlConfigLoader::new(true);
        let config = loader
            .load_from_string(TEST_CONFIG_WITH_ENV_VARS)
            .await
            .unwrap();

        assert_eq!(
            config.notification.slack_webhook_url.as_deref(),
            Some("https://hooks.slack.test/abc")
        );
        // 空值视为未设置
        assert!(config.auth.password.is_none());

        env::remove_var("SENTINEL_TEST_WEBHOOK");
        env::remove_var("SENTINEL_TEST_PASSWORD");
    }

    #[tokio::test]
    #[serial]
    async fn test_env_var_substitution_missing_var() {
        env::remove_var("SENTINEL_TEST_MISSING");
        let content = r#"
[auth]
password = "${SENTINEL_TEST_MISSING}"
"#;

        let loader = TomlConfigLoader::new(true);
        let result = loader.load_from_string(content).await;

        assert!(result.is_err());
        if let Err(e) = result {
            assert!(e.to_string().contains("SENTINEL_TEST_MISSING"));
        }
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let loader = TomlConfigLoader::new(false);
        let result = loader
            .load_from_string("[scheduler]\ntick_interval_seconds = 0\n")
            .await;
        assert!(result.unwrap_err().to_string().contains("扫描间隔"));
    }

    #[tokio::test]
    async fn test_load_from_file_and_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, TEST_CONFIG_TOML).unwrap();

        let loader = TomlConfigLoader::new(false);
        let config = loader.load_from_file(&path).await.unwrap();
        assert_eq!(config.server.port, 8080);

        let missing = dir.path().join("missing.toml");
        let err = loader.load_from_file(&missing).await.unwrap_err();
        assert!(err.to_string().contains("配置文件不存在"));

        let (config, from_file) = loader.load_or_default(&missing).await.unwrap();
        assert!(!from_file);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_substitute_env_vars_disabled() {
        let loader = TomlConfigLoader::new(false);
        let content = "test ${VAR} content";
        let result = loader.substitute_env_vars(content).unwrap();
        assert_eq!(result, content);
    }

    #[test]
    fn test_get_default_config_path() {
        let path = get_default_config_path();
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }
}
