//! 通用常量.

/// 背景标签值. 背景永远不参与评分.
pub const BACKGROUND: u16 = 0;

/// 评分文件的约定文件名.
pub const SCORE_FILE_NAME: &str = "scores.json";

/// "跨中心汇总" 哨兵中心名.
pub const ALL_CENTERS: &str = "All";

/// HD95 使用的分位数.
pub const HD_PERCENTILE: f64 = 95.0;

/// 评分记录中的字段名.
pub mod keys {
    /// Dice 系数.
    pub const DICE: &str = "dice";

    /// 交并比.
    pub const IOU: &str = "iou";

    /// 95% Hausdorff 距离.
    pub const HD95: &str = "hd95";

    /// 平均对称表面距离.
    pub const ASSD: &str = "assd";

    /// 整幅图像的物理体积 (立方毫米).
    pub const VOLUME: &str = "volume";

    /// 参考标注中该类别的物理体积 (立方毫米).
    pub const SEGMENT_VOLUME: &str = "segment_volume";

    /// 多类别模式下的类别编号.
    pub const CLASS: &str = "class";

    /// 外部合并进来的预测耗时 (秒).
    pub const TIME: &str = "time";

    /// 不会被展开为长表指标行的记账字段.
    pub const BOOKKEEPING: [&str; 3] = [VOLUME, SEGMENT_VOLUME, CLASS];

    /// 字段是否为记账字段?
    #[inline]
    pub fn is_bookkeeping(key: &str) -> bool {
        BOOKKEEPING.contains(&key)
    }
}

/// 常见 NIfTI 扩展名, 较长者在前.
pub const NIFTI_EXTENSIONS: [&str; 2] = [".nii.gz", ".nii"];
