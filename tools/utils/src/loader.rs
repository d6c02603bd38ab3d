//! 对 `seg-berry` 输入的更一层封装: 由环境变量或主目录确定默认路径与映射表.

use seg_berry::prelude::*;
use std::env;
use std::path::{Path, PathBuf};

/// 评分根目录的环境变量.
pub const SCORES_DIR_VAR: &str = "SEG_SCORES_DIR";

/// 中心代码表文件的环境变量.
pub const CENTER_MAP_VAR: &str = "SEG_CENTER_MAP";

/// 类别名称表 (`dataset.json`) 的环境变量.
pub const DATASET_FILE_VAR: &str = "SEG_DATASET_FILE";

/// 返回 `$HOME/dataset/<parts...>`. 无法确定主目录时返回 `None`.
pub fn home_dataset_dir_with<I, P>(parts: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut dir = dirs::home_dir()?.join("dataset");
    dir.extend(parts);
    Some(dir)
}

/// 非空环境变量 `var` 的值.
fn non_empty_var(var: &str) -> Option<PathBuf> {
    env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// 获取评分根目录.
///
/// 1. 若环境变量 `$SEG_SCORES_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/scores`.
pub fn scores_dir_from_env_or_home() -> Option<PathBuf> {
    non_empty_var(SCORES_DIR_VAR).or_else(|| home_dataset_dir_with(["scores"]))
}

/// 相对路径视作相对评分根目录; 根目录不可得时原样返回.
pub fn resolve_in_scores_dir<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() || path.exists() {
        return path.to_owned();
    }
    match scores_dir_from_env_or_home() {
        Some(root) => root.join(path),
        None => path.to_owned(),
    }
}

/// 读取中心代码表.
///
/// 1. 若给定 `explicit`, 则读取该文件;
/// 2. 否则若环境变量 `$SEG_CENTER_MAP` 非空, 则读取其指向的文件;
/// 3. 否则返回空表 (中心即病例编号的首个词).
pub fn center_map(explicit: Option<&Path>) -> ScoreResult<CenterMap> {
    match explicit.map(Path::to_owned).or_else(|| non_empty_var(CENTER_MAP_VAR)) {
        Some(path) => {
            let map = CenterMap::load(&path)?;
            tracing::debug!(path = %path.display(), codes = map.len(), "center map loaded");
            Ok(map)
        }
        None => Ok(CenterMap::new()),
    }
}

/// 读取类别名称表.
///
/// 1. 若给定 `explicit`, 则读取该文件;
/// 2. 否则若环境变量 `$SEG_DATASET_FILE` 非空, 则读取其指向的文件;
/// 3. 否则返回 `None`.
pub fn dataset_labels(explicit: Option<&Path>) -> ScoreResult<Option<DatasetLabels>> {
    explicit
        .map(Path::to_owned)
        .or_else(|| non_empty_var(DATASET_FILE_VAR))
        .map(DatasetLabels::load)
        .transpose()
}
