//! 翻译代理命令行入口

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;

use llm_translate_proxy::env::{self, EnvVar};
use llm_translate_proxy::translation::collaborators::{
    GlossaryProvider, JsonGlossary, NoGlossary, NoRules, RegexRuleSet, TextRuleEngine,
};
use llm_translate_proxy::translation::config::{ConfigManager, ProxyConfig};
use llm_translate_proxy::translation::core::LlmClient;
use llm_translate_proxy::translation::events::ServerEvent;
use llm_translate_proxy::translation::storage::credentials::parse_keys;
use llm_translate_proxy::translation::{TranslationError, TranslationResult};
use llm_translate_proxy::web::ProxyServer;

#[derive(Parser)]
#[command(name = "llm-translate-proxy", version, about = "Local translation proxy for game text hooks")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the proxy and serve until Ctrl-C
    Serve {
        /// Configuration file (TOML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Override the listening port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Send a minimal request with every configured API key
    CheckKeys {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// List the models offered by the configured endpoint
    Models {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Write an example configuration file
    InitConfig {
        #[arg(default_value = "llm-proxy.toml")]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the supported environment variables
    EnvVars,
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_logging() {
    let level = env::core::LogLevel::get().unwrap_or_else(|e| {
        eprintln!("Warning: {}", e);
        "info".to_string()
    });
    let level = level.parse::<tracing::Level>().unwrap_or(tracing::Level::INFO);
    let no_color = env::core::NoColor::get().unwrap_or(false);

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(!no_color)
        .with_target(false)
        .init();
}

fn run(command: Command) -> TranslationResult<()> {
    match command {
        Command::Serve { config, port } => serve(config.as_deref(), port),
        Command::CheckKeys { config } => check_keys(config.as_deref()),
        Command::Models { config } => list_models(config.as_deref()),
        Command::InitConfig { path, force } => init_config(&path, force),
        Command::EnvVars => {
            print!("{}", env::generate_env_docs());
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> TranslationResult<ProxyConfig> {
    let manager = match path {
        Some(path) => ConfigManager::from_path(path)?,
        None => ConfigManager::new()?,
    };
    match manager.path() {
        Some(path) => tracing::debug!("配置来源: {}", path.display()),
        None => tracing::debug!("配置来源: 默认值与环境变量"),
    }
    Ok(manager.config().clone())
}

fn runtime() -> TranslationResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| TranslationError::ServerError(format!("创建运行时失败: {}", e)))
}

fn build_collaborators(config: &ProxyConfig) -> TranslationResult<(Arc<dyn GlossaryProvider>, Arc<dyn TextRuleEngine>)> {
    let glossary: Arc<dyn GlossaryProvider> = if config.enable_glossary {
        Arc::new(JsonGlossary::new())
    } else {
        Arc::new(NoGlossary)
    };

    let rules: Arc<dyn TextRuleEngine> = match &config.rules_path {
        Some(path) => {
            let expanded = shellexpand::tilde(path).into_owned();
            let rules = RegexRuleSet::load(&expanded)?;
            tracing::info!("已加载 {} 条文本规则: {}", rules.rule_count(), expanded);
            Arc::new(rules)
        }
        None => Arc::new(NoRules),
    };

    Ok((glossary, rules))
}

fn serve(config_path: Option<&Path>, port: Option<u16>) -> TranslationResult<()> {
    let mut config = load_config(config_path)?;
    if let Some(port) = port {
        config.port = port;
    }

    let (glossary, rules) = build_collaborators(&config)?;
    let mut server = ProxyServer::from_config(config, glossary, rules)?;
    let mut events = server.subscribe();
    let addr = server.start()?;
    println!("Listening on http://{} (Ctrl-C to stop)", addr);

    runtime()?.block_on(async {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => break,
                event = events.recv() => match event {
                    Ok(ServerEvent::TokenUsage { prompt, completion }) => {
                        tracing::debug!("Token 用量: prompt {} / completion {}", prompt, completion);
                    }
                    Ok(ServerEvent::WorkFinished { success }) => {
                        tracing::debug!("请求处理完毕: {}", if success { "成功" } else { "失败" });
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("事件订阅落后，跳过 {} 条", skipped);
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    });

    server.stop();
    Ok(())
}

fn check_keys(config_path: Option<&Path>) -> TranslationResult<()> {
    let config = load_config(config_path)?;
    if parse_keys(&config.api_key).is_empty() {
        return Err(TranslationError::NoCredentials);
    }

    let client = LlmClient::new()?;
    let probes = runtime()?.block_on(client.probe_keys(&config));

    let mut failed = 0;
    for probe in &probes {
        match &probe.outcome {
            Ok(()) => println!("OK    {}", probe.key),
            Err(e) => {
                failed += 1;
                println!("FAIL  {}  {}", probe.key, e);
            }
        }
    }

    if failed > 0 {
        return Err(TranslationError::InvalidResult(format!(
            "{}/{} 个密钥不可用",
            failed,
            probes.len()
        )));
    }
    Ok(())
}

fn list_models(config_path: Option<&Path>) -> TranslationResult<()> {
    let config = load_config(config_path)?;
    let key = parse_keys(&config.api_key)
        .into_iter()
        .next()
        .ok_or(TranslationError::NoCredentials)?;

    let client = LlmClient::new()?;
    let models = runtime()?.block_on(client.list_models(&config, &key))?;
    for model in models {
        println!("{}", model);
    }
    Ok(())
}

fn init_config(path: &Path, force: bool) -> TranslationResult<()> {
    if path.exists() && !force {
        return Err(TranslationError::ConfigError(format!(
            "{} 已存在，使用 --force 覆盖",
            path.display()
        )));
    }

    ConfigManager::generate_example_config(path)?;
    println!("已生成示例配置文件: {}", path.display());
    Ok(())
}
