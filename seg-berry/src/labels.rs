//! 数据集类别名称表 (`dataset.json`).
//!
//! 同时兼容两种 `labels` 写法:
//!
//! 1. `{"background": 0, "liver": 1}`, 即名称到编号;
//! 2. `{"0": "background", "1": "liver"}`, 即编号到名称.

use crate::consts::BACKGROUND;
use crate::{json, ScoreError, ScoreResult};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// 类别编号到名称的映射.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetLabels {
    names: BTreeMap<u16, String>,
}

impl DatasetLabels {
    /// 由 `(编号, 名称)` 直接构造.
    pub fn from_pairs<S: Into<String>, I: IntoIterator<Item = (u16, S)>>(it: I) -> Self {
        Self {
            names: it.into_iter().map(|(id, s)| (id, s.into())).collect(),
        }
    }

    /// 读取 `dataset.json`.
    pub fn load<P: AsRef<Path>>(path: P) -> ScoreResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ScoreError::io(path, e))?;
        let doc: Value = json::from_str(&text).map_err(|source| ScoreError::Json {
            path: path.to_owned(),
            source,
        })?;
        Self::from_document(&doc)
    }

    /// 从已解析的 `dataset.json` 文档中提取 `labels`.
    pub fn from_document(doc: &Value) -> ScoreResult<Self> {
        let labels = doc
            .get("labels")
            .and_then(Value::as_object)
            .ok_or_else(|| ScoreError::Manifest("missing `labels` object".to_string()))?;

        let mut names = BTreeMap::new();
        for (k, v) in labels.iter() {
            let (id, name) = match (k.parse::<u16>(), v) {
                // "1": "liver"
                (Ok(id), Value::String(name)) => (id, name.clone()),
                // "liver": 1 或 "liver": "1"
                (_, v) => (parse_id(v).ok_or_else(|| bad_entry(k, v))?, k.clone()),
            };
            if names.insert(id, name).is_some() {
                return Err(ScoreError::Manifest(format!("class {id} is listed twice")));
            }
        }
        Ok(Self { names })
    }

    /// 类别名称.
    #[inline]
    pub fn name(&self, class_id: u16) -> Option<&str> {
        self.names.get(&class_id).map(String::as_str)
    }

    /// 前景类别个数, 即最大类别编号 (背景为 0).
    #[inline]
    pub fn class_count(&self) -> u16 {
        self.names
            .keys()
            .next_back()
            .copied()
            .unwrap_or(BACKGROUND)
    }

    /// 检查外部给定的类别数 `n_classes` 是否与名称表一致.
    pub fn check_class_count(&self, n_classes: u16) -> ScoreResult<()> {
        let own = self.class_count();
        if own == n_classes {
            Ok(())
        } else {
            Err(ScoreError::ClassCountMismatch {
                left_name: "label manifest".to_string(),
                left: own,
                right_name: "requested".to_string(),
                right: n_classes,
            })
        }
    }

    /// 按编号升序迭代前景类别.
    pub fn foreground(&self) -> impl Iterator<Item = (u16, &str)> {
        self.names
            .iter()
            .filter(|(id, _)| **id != BACKGROUND)
            .map(|(id, s)| (*id, s.as_str()))
    }
}

/// 检查多处来源 (如训练集与测试集) 的类别数是否一致, 一致时返回该类别数.
pub fn consistent_class_count<'a, I>(counts: I) -> ScoreResult<u16>
where
    I: IntoIterator<Item = (&'a str, u16)>,
{
    let mut it = counts.into_iter();
    let Some((first_name, first)) = it.next() else {
        return Err(ScoreError::Manifest("no class count given".to_string()));
    };
    for (name, n) in it {
        if n != first {
            return Err(ScoreError::ClassCountMismatch {
                left_name: first_name.to_string(),
                left: first,
                right_name: name.to_string(),
                right: n,
            });
        }
    }
    Ok(first)
}

fn parse_id(v: &Value) -> Option<u16> {
    match v {
        Value::Number(n) => n.as_u64().and_then(|x| u16::try_from(x).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn bad_entry(k: &str, v: &Value) -> ScoreError {
    ScoreError::Manifest(format!("cannot read class id from `{k}`: {v}"))
}
