//! 配置管理
//!
//! 配置来源按优先级从低到高：内置默认值、TOML 配置文件、`PACS__` 前缀的环境变量。

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use pacs_core::utils::is_valid_ae_title;
use pacs_core::Printer;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info};

/// 打印子系统完整配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintConfig {
    /// 服务器配置
    pub server: ServerConfig,
    /// DICOM配置
    pub dicom: DicomConfig,
    /// 派发配置
    pub dispatch: DispatchSettings,
    /// 查询配置
    pub query: QueryConfig,
    /// 日志配置
    pub logging: LoggingConfig,
    /// 启动时注册的打印机
    pub printers: Vec<PrinterConfig>,
}

/// 配置文件中的打印机条目
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterConfig {
    pub name: String,
    pub ae_title: String,
    pub host: String,
    pub port: u16,
    pub description: Option<String>,
    pub is_default: bool,
}

impl PrinterConfig {
    pub fn to_printer(&self) -> Printer {
        Printer {
            name: self.name.trim().to_string(),
            ae_title: self.ae_title.trim().to_string(),
            host: self.host.clone(),
            port: self.port,
            description: self.description.clone(),
            is_default: self.is_default,
        }
    }
}

impl PrintConfig {
    /// 转换为目录使用的打印机列表
    pub fn printers(&self) -> Vec<Printer> {
        self.printers.iter().map(PrinterConfig::to_printer).collect()
    }
}

/// 服务器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听主机
    pub host: String,
    /// HTTP端口
    pub http_port: u16,
}

/// DICOM配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DicomConfig {
    /// 作为打印SCU时的AE Title
    pub ae_title: String,
}

/// 派发配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    /// 工作任务数
    pub workers: usize,
    /// 队列容量
    pub queue_capacity: usize,
    /// 传输超时（秒）
    pub transport_timeout_secs: u64,
}

impl DispatchSettings {
    pub fn transport_timeout(&self) -> Duration {
        Duration::from_secs(self.transport_timeout_secs)
    }
}

/// 查询配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub default_page_size: usize,
}

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别或 EnvFilter 指令
    pub level: String,
    pub format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8080,
        }
    }
}

impl Default for DicomConfig {
    fn default() -> Self {
        Self {
            ae_title: "PACS_PRINT".to_string(),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 64,
            transport_timeout_secs: 30,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { default_page_size: 10 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    /// 配置数据
    config: Arc<RwLock<PrintConfig>>,
    /// 配置文件路径
    config_path: Option<PathBuf>,
    /// 配置验证器
    validator: ConfigValidator,
}

impl ConfigManager {
    /// 加载并校验配置；未指定文件时只使用默认值与环境变量
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let validator = ConfigValidator::new();
        let config = Self::load_config(config_path)?;
        validator.validate(&config)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path: config_path.map(Path::to_path_buf),
            validator,
        })
    }

    fn load_config(config_path: Option<&Path>) -> Result<PrintConfig> {
        let mut builder = Config::builder();
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix("PACS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration sources")?;

        let config: PrintConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        match config_path {
            Some(path) => info!("Configuration loaded from: {}", path.display()),
            None => info!("No configuration file given, using defaults and environment"),
        }
        Ok(config)
    }

    /// 获取配置
    pub async fn get_config(&self) -> PrintConfig {
        self.config.read().await.clone()
    }

    /// 校验后替换当前配置
    pub async fn update_config(&self, new_config: PrintConfig) -> Result<()> {
        self.validator.validate(&new_config)?;
        *self.config.write().await = new_config;
        info!("Configuration updated successfully");
        Ok(())
    }

    /// 重新加载配置
    pub async fn reload_config(&self) -> Result<()> {
        let new_config = Self::load_config(self.config_path.as_deref())?;
        self.update_config(new_config).await
    }
}

/// 配置验证器
#[derive(Debug)]
pub struct ConfigValidator {
    /// 验证规则
    validation_rules: Vec<ValidationRule>,
}

/// 验证规则
#[derive(Debug)]
struct ValidationRule {
    /// 字段路径
    field_path: &'static str,
    /// 验证函数
    validator: fn(&PrintConfig) -> Result<()>,
}

impl ConfigValidator {
    /// 创建新的配置验证器
    pub fn new() -> Self {
        let validation_rules = vec![
            ValidationRule {
                field_path: "server.http_port",
                validator: |config| {
                    anyhow::ensure!(config.server.http_port != 0, "HTTP port cannot be 0");
                    Ok(())
                },
            },
            ValidationRule {
                field_path: "dicom.ae_title",
                validator: |config| {
                    anyhow::ensure!(
                        is_valid_ae_title(&config.dicom.ae_title),
                        "'{}' is not a valid AE title",
                        config.dicom.ae_title
                    );
                    Ok(())
                },
            },
            ValidationRule {
                field_path: "dispatch.workers",
                validator: |config| {
                    anyhow::ensure!(config.dispatch.workers > 0, "at least one dispatch worker is required");
                    Ok(())
                },
            },
            ValidationRule {
                field_path: "dispatch.queue_capacity",
                validator: |config| {
                    anyhow::ensure!(config.dispatch.queue_capacity > 0, "queue capacity cannot be 0");
                    Ok(())
                },
            },
            ValidationRule {
                field_path: "dispatch.transport_timeout_secs",
                validator: |config| {
                    anyhow::ensure!(config.dispatch.transport_timeout_secs > 0, "transport timeout cannot be 0");
                    Ok(())
                },
            },
            ValidationRule {
                field_path: "query.default_page_size",
                validator: |config| {
                    anyhow::ensure!(config.query.default_page_size > 0, "default page size cannot be 0");
                    Ok(())
                },
            },
            ValidationRule {
                field_path: "printers",
                validator: |config| {
                    for printer in config.printers() {
                        printer
                            .validate()
                            .with_context(|| format!("printer '{}'", printer.name))?;
                    }
                    let defaults = config.printers.iter().filter(|p| p.is_default).count();
                    anyhow::ensure!(defaults <= 1, "{} printers are marked as default", defaults);
                    Ok(())
                },
            },
        ];

        Self { validation_rules }
    }

    /// 验证配置
    pub fn validate(&self, config: &PrintConfig) -> Result<()> {
        for rule in &self.validation_rules {
            if let Err(e) = (rule.validator)(config) {
                error!("Configuration validation failed for {}: {:#}", rule.field_path, e);
                return Err(e.context(format!("invalid configuration value {}", rule.field_path)));
            }
        }
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn printer(name: &str, is_default: bool) -> PrinterConfig {
        PrinterConfig {
            name: name.to_string(),
            ae_title: "DRYVIEW".to_string(),
            host: "10.0.0.20".to_string(),
            port: 104,
            description: None,
            is_default,
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = PrintConfig::default();
        assert_eq!(config.server.http_port, 8080);
        assert_eq!(config.dispatch.transport_timeout(), Duration::from_secs(30));
        ConfigValidator::new().validate(&config).unwrap();
    }

    #[test]
    fn test_validator_rejects_bad_values() {
        let validator = ConfigValidator::new();

        let mut config = PrintConfig::default();
        config.dispatch.workers = 0;
        assert!(validator.validate(&config).is_err());

        let mut config = PrintConfig::default();
        config.query.default_page_size = 0;
        assert!(validator.validate(&config).is_err());

        let mut config = PrintConfig::default();
        config.dicom.ae_title = "AN_AE_TITLE_TOO_LONG".to_string();
        assert!(validator.validate(&config).is_err());

        let mut config = PrintConfig::default();
        config.printers = vec![printer("a", true), printer("b", true)];
        let err = validator.validate(&config).unwrap_err();
        assert!(format!("{:#}", err).contains("2 printers"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[server]
http_port = 9090

[dispatch]
workers = 2

[logging]
format = "json"

[[printers]]
name = "hp-film-1"
ae_title = "HPFILM"
host = "192.168.1.50"
port = 104
is_default = true

[[printers]]
name = "dry-2"
ae_title = "DRY2"
host = "192.168.1.51"
port = 105
"#
        )
        .unwrap();

        let manager = ConfigManager::new(Some(file.path())).unwrap();
        let config = tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(manager.get_config());

        assert_eq!(config.server.http_port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.dispatch.workers, 2);
        assert_eq!(config.dispatch.queue_capacity, 64);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.printers.len(), 2);
        let printers = config.printers();
        assert_eq!(printers[0].name, "hp-film-1");
        assert_eq!(printers[0].ae_title, "HPFILM");
        assert!(printers[0].is_default);
        assert!(!printers[1].is_default);
    }

    #[test]
    fn test_invalid_printer_is_rejected() {
        let mut config = PrintConfig::default();
        let mut bad = printer("", false);
        bad.ae_title = "BAD\\AE".to_string();
        config.printers = vec![bad];
        assert!(ConfigValidator::new().validate(&config).is_err());
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(file, "[query]\ndefault_page_size = 0\n").unwrap();
        assert!(ConfigManager::new(Some(file.path())).is_err());
    }

    #[tokio::test]
    async fn test_update_config_validates_first() {
        let manager = ConfigManager::new(None).unwrap();

        let mut bad = manager.get_config().await;
        bad.server.http_port = 0;
        assert!(manager.update_config(bad).await.is_err());
        assert_eq!(manager.get_config().await.server.http_port, 8080);

        let mut good = manager.get_config().await;
        good.query.default_page_size = 25;
        manager.update_config(good).await.unwrap();
        assert_eq!(manager.get_config().await.query.default_page_size, 25);
    }
}
