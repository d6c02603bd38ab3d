//! 中心代码映射与 `"All"` 展开.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;

use super::{FlatRow, LongFormRow};
use crate::consts::ALL_CENTERS;
use crate::{json, ScoreError, ScoreResult};

/// 中心代码到中心名称的映射.
///
/// 中心代码是病例编号中第一个空白分隔的记号, 如 `"UMCU 001.nii.gz"` 的 `UMCU`.
/// 表中没有的代码原样作为中心名称.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CenterMap {
    codes: BTreeMap<String, String>,
}

impl CenterMap {
    /// 空映射表: 所有代码原样透传.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条映射.
    #[inline]
    pub fn with(mut self, code: impl Into<String>, label: impl Into<String>) -> Self {
        self.codes.insert(code.into(), label.into());
        self
    }

    /// 由 `(代码, 名称)` 直接构造.
    pub fn from_pairs<C, L, I>(it: I) -> Self
    where
        C: Into<String>,
        L: Into<String>,
        I: IntoIterator<Item = (C, L)>,
    {
        Self {
            codes: it.into_iter().map(|(c, l)| (c.into(), l.into())).collect(),
        }
    }

    /// 读取形如 `{"UMCU": "Center A"}` 的 JSON 映射文件.
    pub fn load<P: AsRef<Path>>(path: P) -> ScoreResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ScoreError::io(path, e))?;
        let doc: Value = json::from_str(&text).map_err(|source| ScoreError::Json {
            path: path.to_owned(),
            source,
        })?;
        let Value::Object(map) = doc else {
            return Err(ScoreError::Manifest(format!(
                "center table `{}` must be a JSON object",
                path.display()
            )));
        };

        let mut codes = BTreeMap::new();
        for (code, label) in map {
            let Value::String(label) = label else {
                return Err(ScoreError::Manifest(format!(
                    "center `{code}` must map to a string"
                )));
            };
            codes.insert(code, label);
        }
        Ok(Self { codes })
    }

    /// 映射条数.
    #[inline]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// 是否为空表?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// 由病例编号推导中心名称.
    pub fn derive(&self, pt_id: &str) -> String {
        let code = pt_id.split_whitespace().next().unwrap_or_default();
        self.codes
            .get(code)
            .cloned()
            .unwrap_or_else(|| code.to_string())
    }

    /// 一行展开为两行: 先是 `"All"` 行, 再是推导出的中心行. 其余列完全相同.
    pub(crate) fn expand(&self, row: FlatRow) -> [LongFormRow; 2] {
        let center = self.derive(&row.pt_id);
        let all = row.clone().into_long(ALL_CENTERS.to_string());
        [all, row.into_long(center)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(pt_id: &str) -> FlatRow {
        FlatRow {
            pt_id: pt_id.to_string(),
            anatomy: "tumor".to_string(),
            method: Some("A".to_string()),
            class_id: None,
            metric_name: "dice".to_string(),
            metric: 0.5,
            segment_volume: 3.0,
            volume: 100.0,
        }
    }

    #[test]
    fn test_derive() {
        let m = CenterMap::new().with("UMCU", "Center A").with("USZ", "Center B");
        assert_eq!(m.derive("UMCU 001.nii.gz"), "Center A");
        assert_eq!(m.derive("USZ  017"), "Center B");
        assert_eq!(m.derive("KSA 3"), "KSA");
        assert_eq!(m.derive("UMCU_001"), "UMCU_001");
        assert_eq!(m.derive(""), "");
    }

    #[test]
    fn test_expand() {
        let m = CenterMap::from_pairs([("P1", "Site X")]);
        let [all, site] = m.expand(flat("P1 a"));
        assert_eq!(all.center, ALL_CENTERS);
        assert_eq!(site.center, "Site X");
        assert_eq!(all.pt_id, site.pt_id);
        assert_eq!(all.metric, site.metric);
        assert_eq!(all.method, site.method);
    }

    #[test]
    fn test_load() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("centers.json");
        std::fs::write(&good, r#"{"UMCU": "Center A", "USZ": "Center B"}"#).unwrap();
        let m = CenterMap::load(&good).unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.derive("USZ 1"), "Center B");

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, r#"{"UMCU": 1}"#).unwrap();
        assert!(matches!(CenterMap::load(&bad), Err(ScoreError::Manifest(_))));
    }
}
