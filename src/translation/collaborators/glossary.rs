//! 术语表实现

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::GlossaryProvider;
use crate::translation::error::{TranslationError, TranslationResult};

/// 不提供任何术语的空实现
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGlossary;

impl GlossaryProvider for NoGlossary {
    fn get_context_prompt(&self, _text: &str) -> String {
        String::new()
    }

    fn add_new_term(&self, _source: &str, _target: &str) {}

    fn set_file_path(&self, _path: &str) {}
}

#[derive(Debug, Default)]
struct GlossaryState {
    path: Option<PathBuf>,
    terms: BTreeMap<String, String>,
}

/// 基于 JSON 文件 `{"原文": "译文"}` 的术语表
#[derive(Debug, Default)]
pub struct JsonGlossary {
    state: Mutex<GlossaryState>,
}

impl JsonGlossary {
    pub fn new() -> Self {
        Self::default()
    }

    /// 打开术语表文件，文件不存在时视为空表
    pub fn open<P: AsRef<Path>>(path: P) -> TranslationResult<Self> {
        let glossary = Self::new();
        glossary.load(path.as_ref())?;
        Ok(glossary)
    }

    /// 当前术语数量
    pub fn len(&self) -> usize {
        self.lock().terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 查询单个术语
    pub fn lookup(&self, source: &str) -> Option<String> {
        self.lock().terms.get(source).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GlossaryState> {
        // 中毒时沿用内部数据
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn load(&self, path: &Path) -> TranslationResult<()> {
        let terms = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str::<BTreeMap<String, String>>(&content).map_err(|e| {
                    TranslationError::ConfigError(format!("术语表格式错误 {}: {}", path.display(), e))
                })?
            }
        } else {
            BTreeMap::new()
        };

        tracing::info!("已加载术语表 {} ({} 条)", path.display(), terms.len());

        let mut state = self.lock();
        state.path = Some(path.to_path_buf());
        state.terms = terms;
        Ok(())
    }

    fn persist(state: &GlossaryState) -> TranslationResult<()> {
        let Some(path) = &state.path else {
            return Ok(());
        };
        let content = serde_json::to_string_pretty(&state.terms)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl GlossaryProvider for JsonGlossary {
    fn get_context_prompt(&self, text: &str) -> String {
        let haystack = text.to_lowercase();
        let state = self.lock();

        let hits: Vec<String> = state
            .terms
            .iter()
            .filter(|(source, _)| !source.is_empty() && haystack.contains(&source.to_lowercase()))
            .map(|(source, target)| format!("{} = {}", source, target))
            .collect();

        if hits.is_empty() {
            return String::new();
        }

        format!("【Glossary】:\n{}\n", hits.join("\n"))
    }

    fn add_new_term(&self, source: &str, target: &str) {
        let mut state = self.lock();
        state.terms.insert(source.to_string(), target.to_string());
        if let Err(e) = Self::persist(&state) {
            tracing::warn!("写入术语表失败: {}", e);
        }
    }

    fn set_file_path(&self, path: &str) {
        let expanded = PathBuf::from(shellexpand::tilde(path).as_ref());
        if let Err(e) = self.load(&expanded) {
            tracing::warn!("加载术语表失败: {}", e);
        }
    }
}
