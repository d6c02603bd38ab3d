//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx3d, Spacing3d};

pub use crate::{BinaryMask, LabelVolume, VolumeGeometry};
pub use crate::{ScoreError, ScoreResult, SkipReason, SkipReport};

pub use crate::metrics::stats::Summary;
pub use crate::metrics::{score, MetricKind, SegScores};

pub use crate::collect::{
    resolve_output, ClassSelector, Collection, NiftiReader, PatientIdStyle, ScoreCollector,
    VolumeReader,
};

pub use crate::labels::DatasetLabels;
pub use crate::scores::{MetricRecord, ScoreEntry, ScoreFields, ScoreFile};

pub use crate::table::{
    AggregatedTable, AnatomyRule, CenterMap, LongFormRow, MethodSource, PivotTable,
    ScoreTableBuilder,
};

pub use crate::consts::{keys, ALL_CENTERS, SCORE_FILE_NAME};
