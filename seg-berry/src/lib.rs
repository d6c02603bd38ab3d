#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 对三维分割预测结果与参考标注进行逐病例、逐类别评分,
//! 并将多方法、多解剖结构、多中心的评分文件汇总成统一的长表.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 该 crate 不负责影像编解码. 标签体数据通过 `nifti` crate 读入,
//!   其余格式请自行实现 [`collect::VolumeReader`].
//! 2. 逐条数据的问题 (读不到的体数据, 缺失的参考标注, 缺失评分文件的解剖目录等)
//!   只会记入 [`SkipReport`], 不会中断批处理; 只有调用方的配置错误才返回 `Err`.
//!
//! # 开发计划
//!
//! ### 掩膜评分 ✅
//!
//! Dice, IoU, HD95, ASSD. 退化情形 (空预测 / 空参考) 有固定取值,
//! 距离以毫米为单位, 由精确的可分离欧氏距离变换求得.
//!
//! 实现位于 `seg-berry/src/metrics`.
//!
//! ### 评分收集 ✅
//!
//! 按文件名匹配预测目录与参考目录, 单类别或多类别模式逐病例评分,
//! 最终一次性写出 JSON 评分文件.
//!
//! 实现位于 `seg-berry/src/collect`.
//!
//! ### 评分文件读写 ✅
//!
//! 兼容 Python `json` 写出的裸 `Infinity` / `NaN` 记号, 保留未知字段 (如 `time`).
//!
//! 实现位于 `seg-berry/src/scores` 和 `seg-berry/src/json.rs`.
//!
//! ### 长表汇总 ✅
//!
//! 1. 每个 (病例, 解剖结构, 指标) 展开为 `"All"` 与派生中心两行. ✅
//! 2. 中心代码映射表可注入. ✅
//! 3. 显式文件列表与按解剖子目录自动发现两种输入构造方式. ✅
//! 4. 透视 (pivot) 与 CSV 导出, 可无损还原评分文件. ✅
//!
//! 实现位于 `seg-berry/src/table`.
//!
//! ### 小功能 ✅
//!
//! 1. 分中心描述统计, 两方法配对差值. ✅
//! 2. 评分文件字段合并 (预测耗时). ✅
//! 3. `dataset.json` 类别名称表. ✅

/// 三维索引, 按 `(z, h, w)` 即 (切片, 行, 列) 排列.
pub type Idx3d = (usize, usize, usize);

/// 体素物理分辨率 (单位: 毫米), 与 [`Idx3d`] 同样按 `(z, h, w)` 排列.
pub type Spacing3d = [f64; 3];

pub mod consts;

mod error;

pub use error::{ScoreError, ScoreResult};

mod report;

pub use report::{SkipReason, SkipReport, Skipped};

pub mod json;

pub mod labels;

/// 三维标签体数据与二值掩膜.
mod volume;

pub use volume::{BinaryMask, LabelVolume, VolumeGeometry};

pub mod metrics;

pub mod collect;

pub mod scores;

pub mod table;

pub mod prelude;
