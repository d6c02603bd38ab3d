//! JSON 评分文件.
//!
//! 评分文件是一个 JSON 对象, 键为病例编号, 值为:
//!
//! 1. 单类别模式: 一条评分记录 (对象, 无 `"class"` 字段);
//! 2. 多类别模式: 按类别排列的评分记录列表 (每条都有 `"class"` 字段).
//!
//! 病例顺序与记录内字段顺序在读写时均原样保留, 未知字段 (如 `time`) 同样保留.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde_json::{Map, Value};

use crate::consts::keys;
use crate::json::{self, f64_to_value, value_to_f64};
use crate::metrics::{MetricKind, SegScores};
use crate::{ScoreError, ScoreResult};

/// 有序字段表.
pub type FieldMap = Map<String, Value>;

/// 一条原样保存的评分记录. 汇总阶段只依赖它, 因此可以容忍任意额外字段.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreFields(FieldMap);

impl ScoreFields {
    /// 空记录.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 借出底层字段表.
    #[inline]
    pub fn as_map(&self) -> &FieldMap {
        &self.0
    }

    /// 获取字段原值.
    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// 获取字段数值. 非数值字段返回 `None`, `null` 与非有限记号均可读出.
    #[inline]
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(value_to_f64)
    }

    /// 多类别记录的类别编号.
    #[inline]
    pub fn class_id(&self) -> Option<u16> {
        self.0
            .get(keys::CLASS)
            .and_then(Value::as_u64)
            .and_then(|c| u16::try_from(c).ok())
    }

    /// 写入字段. 已存在的字段保持原有位置.
    #[inline]
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// 写入数值字段. 非有限值按约定编码.
    #[inline]
    pub fn insert_f64(&mut self, key: impl Into<String>, value: f64) {
        self.insert(key, f64_to_value(value));
    }

    /// 按原顺序迭代全部字段.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// 按原顺序迭代可作为指标的字段, 即除 `volume` / `segment_volume` / `class` 外的全部字段.
    #[inline]
    pub fn metric_fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.iter().filter(|(k, _)| !keys::is_bookkeeping(k))
    }
}

impl From<FieldMap> for ScoreFields {
    #[inline]
    fn from(map: FieldMap) -> Self {
        Self(map)
    }
}

/// 由评分收集器产生的一条完整记录.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    /// 类别编号. 单类别模式为 `None`, 写出时不带 `"class"` 字段.
    pub class_id: Option<u16>,

    /// 四项指标.
    pub scores: SegScores,

    /// 整幅图像物理体积 (立方毫米).
    pub volume: f64,

    /// 参考标注中该类别的物理体积 (立方毫米).
    pub segment_volume: f64,

    /// 其余字段, 如 `time`.
    pub extra: FieldMap,
}

impl MetricRecord {
    /// 从原样记录中解析. 缺少任一指标或体积字段时返回 `Err`.
    pub fn from_fields(patient: &str, fields: &ScoreFields) -> ScoreResult<Self> {
        let require = |key: &str| {
            fields.get_f64(key).ok_or_else(|| ScoreError::MissingField {
                patient: patient.to_string(),
                field: key.to_string(),
            })
        };

        let scores = SegScores {
            dice: require(keys::DICE)?,
            iou: require(keys::IOU)?,
            hd95: require(keys::HD95)?,
            assd: require(keys::ASSD)?,
        };
        let volume = require(keys::VOLUME)?;
        let segment_volume = require(keys::SEGMENT_VOLUME)?;

        let class_id = match fields.get(keys::CLASS) {
            None => None,
            Some(_) => Some(fields.class_id().ok_or_else(|| ScoreError::Layout {
                patient: patient.to_string(),
                detail: "`class` is not a class id".to_string(),
            })?),
        };

        let known = |k: &str| {
            keys::is_bookkeeping(k) || MetricKind::ALL.iter().any(|m| m.name() == k)
        };
        let extra = fields
            .iter()
            .filter(|&(k, _)| !known(k))
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();

        Ok(Self {
            class_id,
            scores,
            volume,
            segment_volume,
            extra,
        })
    }
}

impl From<&MetricRecord> for ScoreFields {
    fn from(r: &MetricRecord) -> Self {
        let mut fields = ScoreFields::new();
        for kind in MetricKind::ALL {
            fields.insert_f64(kind.name(), r.scores.get(kind));
        }
        if let Some(c) = r.class_id {
            fields.insert(keys::CLASS, Value::from(c));
        }
        fields.insert_f64(keys::VOLUME, r.volume);
        fields.insert_f64(keys::SEGMENT_VOLUME, r.segment_volume);
        for (k, v) in r.extra.iter() {
            fields.insert(k.clone(), v.clone());
        }
        fields
    }
}

/// 一个病例的评分.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreEntry {
    /// 单类别模式: 一条记录.
    Single(ScoreFields),

    /// 多类别模式: 每个类别一条记录.
    Multi(Vec<ScoreFields>),
}

impl ScoreEntry {
    /// 全部记录.
    #[inline]
    pub fn records(&self) -> &[ScoreFields] {
        match self {
            Self::Single(f) => std::slice::from_ref(f),
            Self::Multi(v) => v.as_slice(),
        }
    }

    /// 全部记录, 可变.
    #[inline]
    pub fn records_mut(&mut self) -> &mut [ScoreFields] {
        match self {
            Self::Single(f) => std::slice::from_mut(f),
            Self::Multi(v) => v.as_mut_slice(),
        }
    }

    fn from_value(patient: &str, v: Value) -> ScoreResult<Self> {
        let layout = |detail: &str| ScoreError::Layout {
            patient: patient.to_string(),
            detail: detail.to_string(),
        };
        match v {
            Value::Object(m) => Ok(Self::Single(m.into())),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(m) => Ok(ScoreFields::from(m)),
                    _ => Err(layout("class entries must be objects")),
                })
                .collect::<ScoreResult<Vec<_>>>()
                .map(Self::Multi),
            _ => Err(layout("expected an object or a list of objects")),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Self::Single(f) => Value::Object(f.0.clone()),
            Self::Multi(v) => Value::Array(v.iter().map(|f| Value::Object(f.0.clone())).collect()),
        }
    }
}

impl From<MetricRecord> for ScoreEntry {
    #[inline]
    fn from(r: MetricRecord) -> Self {
        Self::Single(ScoreFields::from(&r))
    }
}

impl From<Vec<MetricRecord>> for ScoreEntry {
    #[inline]
    fn from(v: Vec<MetricRecord>) -> Self {
        Self::Multi(v.iter().map(ScoreFields::from).collect())
    }
}

/// 一个评分文件, 病例按插入顺序排列.
///
/// # 注意
///
/// `index` 记录病例编号在 `entries` 中的位置, 两者必须同步修改.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreFile {
    entries: Vec<(String, ScoreEntry)>,
    index: HashMap<String, usize>,
}

impl ScoreFile {
    /// 空评分文件.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 预留 `n` 个病例的空评分文件.
    pub fn with_capacity(n: usize) -> Self {
        Self {
            entries: Vec::with_capacity(n),
            index: HashMap::with_capacity(n),
        }
    }

    /// 读取评分文件. 文件不存在, 不是合法 JSON 或结构不符时返回 `Err`.
    pub fn read<P: AsRef<Path>>(path: P) -> ScoreResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ScoreError::io(path, e))?;
        let doc: Value = json::from_str(&text).map_err(|source| ScoreError::Json {
            path: path.to_owned(),
            source,
        })?;
        Self::from_value(doc)
    }

    /// 从 JSON 文本解析.
    pub fn from_json_str(text: &str) -> ScoreResult<Self> {
        Self::from_value(json::from_str(text)?)
    }

    fn from_value(doc: Value) -> ScoreResult<Self> {
        let Value::Object(map) = doc else {
            return Err(ScoreError::Layout {
                patient: String::new(),
                detail: "score file must be a JSON object".to_string(),
            });
        };
        let mut file = Self::with_capacity(map.len());
        for (pt, v) in map {
            let entry = ScoreEntry::from_value(&pt, v)?;
            file.insert(pt, entry);
        }
        Ok(file)
    }

    /// 转换为 JSON 值.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(pt, e)| (pt.clone(), e.to_value()))
                .collect(),
        )
    }

    /// 序列化为 4 空格缩进的 JSON 文本. 非有限值写为裸 `Infinity` / `NaN`.
    pub fn to_json_string(&self) -> ScoreResult<String> {
        Ok(json::to_string_pretty(&self.to_value())?)
    }

    /// 一次性写出到 `path`.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> ScoreResult<()> {
        let path = path.as_ref();
        let text = self.to_json_string()?;
        std::fs::write(path, text).map_err(|e| ScoreError::io(path, e))
    }

    /// 病例数.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否没有任何病例?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 查找病例.
    pub fn get(&self, patient: &str) -> Option<&ScoreEntry> {
        self.index.get(patient).map(|&i| &self.entries[i].1)
    }

    /// 按顺序迭代 `(病例编号, 评分)`.
    #[inline]
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, &ScoreEntry)> {
        self.entries.iter().map(|(pt, e)| (pt.as_str(), e))
    }

    /// 添加病例. 病例已存在时原位替换, 与 JSON 对象语义一致.
    pub fn insert(&mut self, patient: impl Into<String>, entry: impl Into<ScoreEntry>) {
        let patient = patient.into();
        let entry = entry.into();
        match self.index.get(&patient) {
            Some(&i) => self.entries[i].1 = entry,
            None => {
                self.index.insert(patient.clone(), self.entries.len());
                self.entries.push((patient, entry));
            }
        }
    }

    /// 将 `reference` 中同名病例的 `key` 字段复制到本文件的每条记录中 (如预测耗时 `time`).
    ///
    /// 返回未能更新的病例编号: 在 `reference` 中不存在, 或其记录中没有 `key`.
    /// 这些病例保持不变.
    pub fn merge_field(&mut self, key: &str, reference: &ScoreFile) -> Vec<String> {
        let mut missing = Vec::new();
        for (pt, entry) in self.entries.iter_mut() {
            let value = reference
                .get(pt)
                .and_then(|r| r.records().iter().find_map(|f| f.get(key)));
            match value {
                Some(v) => {
                    for fields in entry.records_mut() {
                        fields.insert(key, v.clone());
                    }
                }
                None => missing.push(pt.clone()),
            }
        }
        if !missing.is_empty() {
            tracing::warn!(key, count = missing.len(), "field missing in reference file");
        }
        missing
    }
}

impl fmt::Display for ScoreFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let records: usize = self.entries.iter().map(|(_, e)| e.records().len()).sum();
        write!(f, "{} patients, {} records", self.len(), records)
    }
}
