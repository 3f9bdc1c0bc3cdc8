//! 配置快照与配置存储
//!
//! 支持文件配置、环境变量和默认值。核心流程在每次尝试开始时
//! 复制一份完整的 [`ProxyConfig`]，之后不再逐字段读取共享配置。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::constants;
use crate::env::{self, EnvVar};
use crate::translation::error::{TranslationError, TranslationResult};

/// 日志与提示语言
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    Chinese,
}

impl Language {
    /// 由配置中的语言索引得到语言，未知索引回退为中文
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => Language::English,
            _ => Language::Chinese,
        }
    }
}

/// 翻译代理配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    // 上游配置
    pub api_address: String,
    pub api_key: String,
    pub model_name: String,
    pub temperature: f64,

    // 提示词
    pub system_prompt: String,
    pub pre_prompt: String,
    pub context_num: usize,

    // 本地服务
    pub port: u16,
    pub max_threads: usize,
    pub language: usize,

    // 术语表与规则
    pub enable_glossary: bool,
    pub glossary_path: String,
    pub glossary_history: Vec<String>,
    pub rules_path: Option<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            api_address: constants::DEFAULT_API_ADDRESS.to_string(),
            api_key: constants::DEFAULT_API_KEY.to_string(),
            model_name: constants::DEFAULT_MODEL.to_string(),
            temperature: constants::DEFAULT_TEMPERATURE,

            system_prompt: constants::DEFAULT_SYSTEM_PROMPT.to_string(),
            pre_prompt: constants::DEFAULT_PRE_PROMPT.to_string(),
            context_num: constants::DEFAULT_CONTEXT_NUM,

            port: constants::DEFAULT_PORT,
            max_threads: constants::DEFAULT_MAX_THREADS,
            language: constants::DEFAULT_LANGUAGE,

            enable_glossary: false,
            glossary_path: String::new(),
            glossary_history: Vec::new(),
            rules_path: None,
        }
    }
}

impl ProxyConfig {
    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if !(self.api_address.starts_with("http://") || self.api_address.starts_with("https://")) {
            return Err(TranslationError::ConfigError(format!(
                "API 地址必须以 http:// 或 https:// 开头: {}",
                self.api_address
            )));
        }

        if self.port == 0 {
            return Err(TranslationError::ConfigError("端口不能为0".to_string()));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(TranslationError::ConfigError(format!(
                "温度必须在 0.0 - 2.0 之间: {}",
                self.temperature
            )));
        }

        Ok(())
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) -> TranslationResult<()> {
        let env_error = |e: env::EnvError| TranslationError::ConfigError(e.to_string());

        if let Some(value) = env::upstream::ApiAddress::get_override() {
            self.api_address = value.map_err(env_error)?;
            tracing::info!("环境变量覆盖 API 地址: {}", self.api_address);
        }
        if let Some(value) = env::upstream::ApiKey::get_override() {
            self.api_key = value.map_err(env_error)?;
        }
        if let Some(value) = env::upstream::Model::get_override() {
            self.model_name = value.map_err(env_error)?;
        }
        if let Some(value) = env::upstream::Temperature::get_override() {
            self.temperature = value.map_err(env_error)?;
        }
        if let Some(value) = env::upstream::ContextNum::get_override() {
            self.context_num = value.map_err(env_error)?;
        }
        if let Some(value) = env::server::Port::get_override() {
            self.port = value.map_err(env_error)?;
        }
        if let Some(value) = env::server::MaxThreads::get_override() {
            self.max_threads = value.map_err(env_error)?;
        }

        Ok(())
    }

    /// 实际使用的工作线程数（至少为1）
    pub fn worker_threads(&self) -> usize {
        self.max_threads.max(1)
    }

    pub fn language(&self) -> Language {
        Language::from_index(self.language)
    }

    /// 上游完整的 chat completions 地址
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_address.trim_end_matches('/'))
    }

    /// 上游模型列表地址
    pub fn models_url(&self) -> String {
        format!("{}/models", self.api_address.trim_end_matches('/'))
    }

    /// 展开 `~` 后的术语表路径
    pub fn expanded_glossary_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.glossary_path).as_ref())
    }

    /// 记录最近使用的术语表路径（去重，最新在前，最多10条）
    pub fn remember_glossary(&mut self, path: &str) {
        self.glossary_history.retain(|p| p != path);
        self.glossary_history.insert(0, path.to_string());
        self.glossary_history.truncate(10);
    }
}

/// 配置管理器
pub struct ConfigManager {
    config: ProxyConfig,
    path: Option<PathBuf>,
}

impl ConfigManager {
    /// 按搜索路径加载配置并应用环境变量覆盖
    pub fn new() -> TranslationResult<Self> {
        Self::load_dotenv();

        for path in constants::CONFIG_PATHS {
            let expanded = PathBuf::from(shellexpand::tilde(path).as_ref());
            if expanded.exists() {
                return Self::from_path(expanded);
            }
        }

        tracing::info!("未找到配置文件，使用默认配置");
        let mut config = ProxyConfig::default();
        config.apply_env_overrides()?;
        config.validate()?;

        Ok(Self { config, path: None })
    }

    /// 从指定文件加载配置
    pub fn from_path<P: AsRef<Path>>(path: P) -> TranslationResult<Self> {
        let path = path.as_ref().to_path_buf();
        tracing::info!("加载配置文件: {}", path.display());

        let mut config = Self::load_from_file(&path)?;
        config.apply_env_overrides()?;
        config.validate()?;

        Ok(Self {
            config,
            path: Some(path),
        })
    }

    /// 获取配置
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// 配置文件路径（使用默认配置时为 None）
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn load_from_file(path: &Path) -> TranslationResult<ProxyConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TranslationError::ConfigError(format!("读取配置文件失败: {}", e)))?;

        if path.extension().map_or(false, |ext| ext == "json") {
            serde_json::from_str(&content)
                .map_err(|e| TranslationError::ConfigError(format!("解析JSON配置失败: {}", e)))
        } else {
            toml::from_str(&content)
                .map_err(|e| TranslationError::ConfigError(format!("解析TOML配置失败: {}", e)))
        }
    }

    /// 将配置写入文件
    pub fn save_to_file(config: &ProxyConfig, path: &Path) -> TranslationResult<()> {
        let content = if path.extension().map_or(false, |ext| ext == "json") {
            serde_json::to_string_pretty(config)?
        } else {
            toml::to_string_pretty(config)?
        };

        std::fs::write(path, content)
            .map_err(|e| TranslationError::ConfigError(format!("写入配置文件失败: {}", e)))
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        for env_file in constants::ENV_FILES {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config<P: AsRef<Path>>(path: P) -> TranslationResult<()> {
        Self::save_to_file(&ProxyConfig::default(), path.as_ref())
    }
}
