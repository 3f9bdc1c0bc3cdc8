//! 转义冻结/解冻编解码
//!
//! 把模板变量 `{{...}}`、标签 `<...>` 以及换行/回车/制表符（字面量
//! `\n` 形式与真实控制字符两种）替换为带空格隔离的占位符 ` [T_n] `，
//! 避免模型合并或丢弃它们；解冻时连同占位符两侧的空白一起换回原文。
//!
//! 编号只由从左到右的出现顺序决定，每次冻结都从 0 开始。
//!
//! 解冻会吞掉占位符两侧的全部空白，包括原文中紧挨受保护片段的空格，
//! 所以只有片段两侧没有空白时冻结再解冻才与原文完全一致。

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// 受保护片段的匹配规则，顺序即优先级：先长后短，先特殊后通用
static ESCAPE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{.*?\}\}|<[^>]+>|\\r\\n|\\n|\\r|\\t|\r\n|\n|\r|\t")
        .expect("escape pattern is a valid regex")
});

/// 占位符及其两侧的任意空白
static THAW_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\[T_(\d+)\]\s*").expect("thaw pattern is a valid regex"));

static PLACEHOLDER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[T_\d+\]").expect("placeholder pattern is a valid regex"));

/// 占位符到原始片段的映射，只在单个请求内有效
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EscapeMap {
    fragments: Vec<String>,
}

impl EscapeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已生成的占位符数量，也是下一个占位符的编号
    pub fn counter(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// 按占位符查找原始片段，例如 `get("[T_0]")`
    pub fn get(&self, token: &str) -> Option<&str> {
        let index = token.strip_prefix("[T_")?.strip_suffix(']')?.parse::<usize>().ok()?;
        self.get_index(index)
    }

    pub fn get_index(&self, index: usize) -> Option<&str> {
        self.fragments.get(index).map(String::as_str)
    }

    /// 按编号顺序遍历 `(占位符, 原始片段)`
    pub fn iter(&self) -> impl Iterator<Item = (String, &str)> {
        self.fragments
            .iter()
            .enumerate()
            .map(|(i, fragment)| (placeholder(i), fragment.as_str()))
    }

    fn push(&mut self, fragment: &str) -> String {
        let token = placeholder(self.fragments.len());
        self.fragments.push(fragment.to_string());
        token
    }

    /// 冻结文本；映射会先被清空，编号重新从 0 开始
    pub fn freeze(&mut self, input: &str) -> String {
        self.fragments.clear();

        let mut output = String::with_capacity(input.len() + 8);
        let mut last_end = 0;

        for found in ESCAPE_PATTERN.find_iter(input) {
            output.push_str(&input[last_end..found.start()]);

            let token = self.push(found.as_str());
            output.push(' ');
            output.push_str(&token);
            output.push(' ');

            last_end = found.end();
        }

        output.push_str(&input[last_end..]);
        output
    }

    /// 解冻文本；找不到的占位符去掉两侧空白后原样保留
    pub fn thaw(&self, input: &str) -> String {
        THAW_PATTERN
            .replace_all(input, |caps: &Captures| {
                let restored = caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| self.get_index(index));
                match restored {
                    Some(fragment) => fragment.to_string(),
                    None => format!("[T_{}]", &caps[1]),
                }
            })
            .into_owned()
    }
}

fn placeholder(index: usize) -> String {
    format!("[T_{}]", index)
}

/// 冻结文本，返回受保护文本与新的映射
pub fn freeze(input: &str) -> (String, EscapeMap) {
    let mut map = EscapeMap::new();
    let frozen = map.freeze(input);
    (frozen, map)
}

/// 用映射解冻文本
pub fn thaw(input: &str, map: &EscapeMap) -> String {
    map.thaw(input)
}

/// 文本中是否含有 `[T_n]` 占位符
pub fn contains_placeholder(text: &str) -> bool {
    PLACEHOLDER_PATTERN.is_match(text)
}
