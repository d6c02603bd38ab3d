//! 汇总输入: 方法名与其评分文件.

use std::path::{Path, PathBuf};

use crate::consts::SCORE_FILE_NAME;
use crate::{ScoreError, ScoreResult, SkipReason, SkipReport};

/// 一个方法及其评分文件, 文件按给定顺序排列.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSource {
    /// 方法名.
    pub method: String,

    /// 评分文件路径. 每个文件的父目录名即解剖结构名.
    pub files: Vec<PathBuf>,
}

/// 自动发现的结果.
#[derive(Debug, Clone)]
pub struct Discovery {
    /// 发现的评分文件.
    pub source: MethodSource,

    /// 没有评分文件的解剖子目录.
    pub skipped: SkipReport,
}

impl MethodSource {
    /// 显式给定文件列表.
    pub fn from_files<S, I, P>(method: S, files: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            method: method.into(),
            files: files.into_iter().map(Into::into).collect(),
        }
    }

    /// 在方法根目录 `root` 下自动发现解剖子目录.
    ///
    /// 按名称顺序检查每个直接子目录, 含有 `scores.json` 的记入结果,
    /// 其余记入跳过报告. `root` 不是目录时返回 `Err`.
    pub fn discover<S, P>(method: S, root: P) -> ScoreResult<Discovery>
    where
        S: Into<String>,
        P: AsRef<Path>,
    {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(ScoreError::NotADirectory(root.to_owned()));
        }

        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(root).map_err(|e| ScoreError::io(root, e))? {
            let entry = entry.map_err(|e| ScoreError::io(root, e))?;
            let path = entry.path();
            if path.is_dir() {
                dirs.push(path);
            }
        }
        dirs.sort_unstable();

        let method = method.into();
        let mut skipped = SkipReport::new();
        let mut files = Vec::with_capacity(dirs.len());
        for mut dir in dirs {
            dir.push(SCORE_FILE_NAME);
            if dir.is_file() {
                files.push(dir);
            } else {
                dir.pop();
                skipped.push(dir.display().to_string(), SkipReason::MissingScoreFile);
            }
        }
        tracing::debug!(%method, anatomies = files.len(), "discovered score files");

        Ok(Discovery {
            source: Self { method, files },
            skipped,
        })
    }
}

/// 合并同名方法: 文件按出现顺序拼接, 方法按首次出现顺序排列.
pub fn group_sources<I: IntoIterator<Item = MethodSource>>(sources: I) -> Vec<MethodSource> {
    let mut groups: Vec<MethodSource> = Vec::new();
    for src in sources {
        match groups.iter_mut().find(|g| g.method == src.method) {
            Some(g) => g.files.extend(src.files),
            None => groups.push(src),
        }
    }
    groups
}
