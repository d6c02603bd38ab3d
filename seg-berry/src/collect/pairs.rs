//! 按文件名配对预测与参考标签.

use std::path::{Path, PathBuf};

use crate::consts::SCORE_FILE_NAME;
use crate::{ScoreError, ScoreResult};

/// 一对同名的预测 / 参考文件. 参考文件不一定存在.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumePair {
    /// 文件名, 即配对键.
    pub file_name: String,

    /// 预测文件路径.
    pub prediction: PathBuf,

    /// 参考目录下的同名路径.
    pub reference: PathBuf,
}

/// 列出 `pred_dir` 下的全部普通文件 (评分文件本身除外), 按文件名排序后与 `ref_dir` 配对.
///
/// 任一路径不是目录时返回 `Err`.
pub fn pair_loader<P: AsRef<Path>, Q: AsRef<Path>>(
    pred_dir: P,
    ref_dir: Q,
) -> ScoreResult<PairLoader> {
    let pred_dir = pred_dir.as_ref().to_owned();
    let ref_dir = ref_dir.as_ref().to_owned();
    for dir in [&pred_dir, &ref_dir] {
        if !dir.is_dir() {
            return Err(ScoreError::NotADirectory(dir.clone()));
        }
    }

    let mut names = Vec::new();
    let entries = std::fs::read_dir(&pred_dir).map_err(|e| ScoreError::io(&pred_dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| ScoreError::io(&pred_dir, e))?;
        let is_file = entry
            .file_type()
            .map_err(|e| ScoreError::io(entry.path(), e))?
            .is_file();
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_file && name != SCORE_FILE_NAME {
            names.push(name);
        }
    }
    names.sort_unstable();
    names.reverse();

    Ok(PairLoader {
        pred_dir,
        ref_dir,
        names_rev: names,
    })
}

/// 预测 / 参考文件对迭代器, 按文件名升序产出.
#[derive(Debug)]
pub struct PairLoader {
    pred_dir: PathBuf,
    ref_dir: PathBuf,
    names_rev: Vec<String>,
}

impl Iterator for PairLoader {
    type Item = VolumePair;

    fn next(&mut self) -> Option<Self::Item> {
        let file_name = self.names_rev.pop()?;
        let prediction = self.pred_dir.join(&file_name);
        let reference = self.ref_dir.join(&file_name);
        Some(VolumePair {
            file_name,
            prediction,
            reference,
        })
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.names_rev.len(), Some(self.names_rev.len()))
    }
}

impl ExactSizeIterator for PairLoader {
    #[inline]
    fn len(&self) -> usize {
        self.names_rev.len()
    }
}
