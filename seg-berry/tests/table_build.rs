use std::fs;
use std::path::{Path, PathBuf};

use seg_berry::prelude::*;
use seg_berry::table::group_sources;

fn write_scores(dir: &Path, anatomy: &str, text: &str) -> PathBuf {
    let d = dir.join(anatomy);
    fs::create_dir_all(&d).unwrap();
    let path = d.join(SCORE_FILE_NAME);
    fs::write(&path, text).unwrap();
    path
}

fn site_map() -> CenterMap {
    CenterMap::new().with("P1", "Site X").with("P2", "Site Y")
}

#[test]
fn test_two_files_four_rows() {
    let root = tempfile::tempdir().unwrap();
    let a = write_scores(
        &root.path().join("run1"),
        "tumor",
        r#"{"P1 site-x": {"dice": 0.9, "segment_volume": 12.0}}"#,
    );
    let b = write_scores(
        &root.path().join("run2"),
        "tumor",
        r#"{"P2 site-y": {"dice": 0.8, "segment_volume": 7.5}}"#,
    );

    let table = ScoreTableBuilder::new(site_map())
        .build([MethodSource::from_files("A", [a, b])])
        .unwrap();

    assert_eq!(table.len(), 4);
    assert!(table.iter().all(|r| r.metric_name == "dice"));
    assert!(table.iter().all(|r| r.anatomy == "tumor"));
    assert!(table.iter().all(|r| r.method.as_deref() == Some("A")));
    assert_eq!(table.centers(), ["All", "Site X", "Site Y"]);
    assert_eq!(table.rows()[0].segment_volume, 12.0);
    assert!(table.skipped.is_empty());
}

#[test]
fn test_every_row_has_all_twin() {
    let root = tempfile::tempdir().unwrap();
    let f = write_scores(
        root.path(),
        "liver",
        r#"{
            "UMCU 001.nii.gz": {"dice": 0.9, "iou": 0.8, "hd95": 2.0, "assd": 0.5,
                                "volume": 100.0, "segment_volume": 5.0, "time": 3.0},
            "USZ 002.nii.gz": {"dice": 0.0, "iou": 0.0, "hd95": Infinity, "assd": Infinity,
                               "volume": 100.0, "segment_volume": 0.0}
        }"#,
    );
    let centers = CenterMap::new().with("UMCU", "Center A").with("USZ", "Center B");
    let table = ScoreTableBuilder::new(centers).read_file(&f, None).unwrap();

    // 9 个指标字段, 每个展开两行.
    assert_eq!(table.len(), 18);
    for pair in table.rows().chunks(2) {
        let (all, site) = (&pair[0], &pair[1]);
        assert!(all.is_all_centers());
        assert!(!site.is_all_centers());
        assert_eq!(all.pt_id, site.pt_id);
        assert_eq!(all.anatomy, site.anatomy);
        assert_eq!(all.metric_name, site.metric_name);
        assert_eq!(all.metric, site.metric);
    }
    assert_eq!(table.without_all_centers().centers(), ["Center A", "Center B"]);
    assert_eq!(table.metric("time").len(), 2);
    assert_eq!(table.metric_names(), ["dice", "iou", "hd95", "assd", "time"]);
    assert!(table.methods().is_empty());
}

#[test]
fn test_round_trip_through_pivot() {
    let text = r#"{
        "UMCU 001.nii.gz": {"dice": 0.912345678901234, "iou": 0.8, "hd95": 2.25, "assd": 0.5,
                            "volume": 1234.5, "segment_volume": 5.125, "time": 3.0},
        "UMCU 002.nii.gz": {"dice": 0.0, "iou": 0.0, "hd95": Infinity, "assd": Infinity,
                            "volume": 1234.5, "segment_volume": 0.0}
    }"#;
    let root = tempfile::tempdir().unwrap();
    let f = write_scores(root.path(), "tumor", text);
    let original = ScoreFile::from_json_str(text).unwrap();

    let table = ScoreTableBuilder::default().read_file(&f, Some("A")).unwrap();
    let back = table.without_all_centers().pivot().to_score_file().unwrap();

    assert_eq!(back.len(), original.len());
    for (pt, entry) in original.iter() {
        let restored = back.get(pt).unwrap();
        assert_eq!(restored.records().len(), entry.records().len());
        for (a, b) in entry.records().iter().zip(restored.records()) {
            let a = MetricRecord::from_fields(pt, a).unwrap();
            let b = MetricRecord::from_fields(pt, b).unwrap();
            assert_eq!(a, b);
        }
    }
    // 未过滤 "All" 行时, 同一病例出现两次.
    assert!(table.pivot().to_score_file().is_err());
}

#[test]
fn test_round_trip_multi_class() {
    let text = r#"{
        "P1 a.nii.gz": [
            {"dice": 0.5, "iou": 0.25, "hd95": 2.0, "assd": 1.0, "class": 1, "volume": 8.0, "segment_volume": 1.0},
            {"dice": 1.0, "iou": 1.0, "hd95": 0.0, "assd": 0.0, "class": 2, "volume": 8.0, "segment_volume": 0.0}
        ]
    }"#;
    let root = tempfile::tempdir().unwrap();
    let f = write_scores(root.path(), "organs", text);
    let table = ScoreTableBuilder::default().read_file(&f, None).unwrap();
    let back = table.filter_center(ALL_CENTERS).pivot().to_score_file().unwrap();
    assert_eq!(back, ScoreFile::from_json_str(text).unwrap());
}

#[test]
fn test_nan_drop_multi_class() {
    let root = tempfile::tempdir().unwrap();
    let f = write_scores(
        root.path(),
        "organs",
        r#"{
            "P1 a.nii.gz": [
                {"dice": NaN, "iou": 0.1, "hd95": 4.0, "assd": 1.0, "class": 1, "volume": 8.0, "segment_volume": 1.0},
                {"dice": NaN, "iou": 0.2, "hd95": 5.0, "assd": 2.0, "class": 2, "volume": 8.0, "segment_volume": 2.0},
                {"dice": NaN, "iou": 0.3, "hd95": 6.0, "assd": 3.0, "class": 3, "volume": 8.0, "segment_volume": 3.0}
            ]
        }"#,
    );
    let table = ScoreTableBuilder::default().read_file(&f, None).unwrap();
    assert_eq!(table.len(), 24);

    let kept = table.drop_nan();
    assert_eq!(kept.len(), 18);
    assert!(kept.iter().all(|r| r.metric.is_finite()));
    assert!(kept.iter().all(|r| r.metric_name != "dice"));
    assert_eq!(table.metric("iou").len(), kept.metric("iou").len());
}

#[test]
fn test_non_finite_drop() {
    let root = tempfile::tempdir().unwrap();
    let f = write_scores(
        root.path(),
        "tumor",
        r#"{
            "P1 a.nii.gz": {"dice": 0.0, "iou": 0.0, "hd95": Infinity, "assd": Infinity, "volume": 8.0, "segment_volume": 1.0},
            "P2 b.nii.gz": {"dice": NaN, "iou": 0.5, "hd95": -Infinity, "assd": 2.0, "volume": 8.0, "segment_volume": 1.0}
        }"#,
    );
    let table = ScoreTableBuilder::default().read_file(&f, None).unwrap();
    assert_eq!(table.len(), 16);

    // `drop_nan` 保留无穷大.
    let no_nan = table.drop_nan();
    assert_eq!(no_nan.len(), 14);
    assert_eq!(no_nan.iter().filter(|r| r.metric.is_infinite()).count(), 6);

    let finite = table.drop_non_finite();
    assert_eq!(finite.len(), 8);
    assert!(finite.iter().all(|r| r.metric.is_finite()));
    assert_eq!(finite.metric("hd95").len(), 0);
    assert_eq!(finite.metric("assd").len(), 2);
    assert_eq!(finite.metric("dice").len(), 2);
    assert_eq!(finite.centers(), ["All", "P1", "P2"]);
}

#[test]
fn test_class_label_anatomy() {
    let root = tempfile::tempdir().unwrap();
    let f = write_scores(
        root.path(),
        "organs",
        r#"{
            "P1 a.nii.gz": [
                {"dice": 0.9, "class": 1, "volume": 8.0, "segment_volume": 1.0},
                {"dice": 0.8, "class": 2, "volume": 8.0, "segment_volume": 1.0}
            ]
        }"#,
    );
    let labels = DatasetLabels::from_pairs([(0, "background"), (1, "liver")]);
    let table = ScoreTableBuilder::default()
        .anatomy_rule(AnatomyRule::ClassLabels(labels))
        .read_file(&f, None)
        .unwrap();

    assert_eq!(table.anatomies(), ["liver"]);
    assert_eq!(table.len(), 2);
    assert_eq!(table.skipped.len(), 1);
    assert_eq!(
        table.skipped.iter().next().unwrap().reason,
        SkipReason::UnknownClassLabel(2)
    );
}

#[test]
fn test_non_numeric_field_is_skipped() {
    let root = tempfile::tempdir().unwrap();
    let f = write_scores(
        root.path(),
        "tumor",
        r#"{"P1 a": {"dice": 0.9, "note": "manual", "segment_volume": 1.0}}"#,
    );
    let table = ScoreTableBuilder::default()
        .anatomy_rule(AnatomyRule::ParentDirCapitalized)
        .read_file(&f, None)
        .unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.anatomies(), ["Tumor"]);
    assert_eq!(
        table.skipped.iter().next().unwrap().reason,
        SkipReason::NonNumericField("note".to_string())
    );
}

#[test]
fn test_malformed_file_is_an_error() {
    let root = tempfile::tempdir().unwrap();
    let f = write_scores(root.path(), "tumor", "{not json");
    assert!(matches!(
        ScoreTableBuilder::default().read_file(&f, None),
        Err(ScoreError::Json { .. })
    ));
    let missing = root.path().join("nowhere").join(SCORE_FILE_NAME);
    assert!(matches!(
        ScoreTableBuilder::default().build_files([missing]),
        Err(ScoreError::Io { .. })
    ));
}

#[test]
fn test_discovery() {
    let root = tempfile::tempdir().unwrap();
    write_scores(root.path(), "brain", r#"{"P1 x": {"dice": 1.0}}"#);
    fs::create_dir(root.path().join("skin")).unwrap();
    fs::write(root.path().join("notes.txt"), "").unwrap();

    let found = MethodSource::discover("A", root.path()).unwrap();
    assert_eq!(found.source.method, "A");
    assert_eq!(found.source.files.len(), 1);
    assert!(found.source.files[0].ends_with("brain/scores.json"));
    assert_eq!(found.skipped.len(), 1);
    assert_eq!(
        found.skipped.iter().next().unwrap().reason,
        SkipReason::MissingScoreFile
    );

    let table = ScoreTableBuilder::default().build([found.source]).unwrap();
    assert_eq!(table.anatomies(), ["brain"]);
}

#[test]
fn test_same_method_merged_and_ordered() {
    let root = tempfile::tempdir().unwrap();
    let a1 = write_scores(&root.path().join("a"), "brain", r#"{"P1 x": {"dice": 0.1}}"#);
    let b1 = write_scores(&root.path().join("b"), "brain", r#"{"P1 x": {"dice": 0.2}}"#);
    let a2 = write_scores(&root.path().join("a"), "skin", r#"{"P1 x": {"dice": 0.3}}"#);

    let sources = vec![
        MethodSource::from_files("A", [&a1]),
        MethodSource::from_files("B", [&b1]),
        MethodSource::from_files("A", [&a2]),
    ];
    assert_eq!(group_sources(sources.clone()).len(), 2);

    let table = ScoreTableBuilder::default().build(sources).unwrap();
    let values: Vec<f64> = table.filter_center(ALL_CENTERS).iter().map(|r| r.metric).collect();
    assert_eq!(values, [0.1, 0.3, 0.2]);
    assert_eq!(table.methods(), ["A", "B"]);

    // 同一文件登记两次会重复计数.
    let twice = ScoreTableBuilder::default()
        .build([MethodSource::from_files("A", [&a1, &a1])])
        .unwrap();
    assert_eq!(twice.len(), 4);
    let pivot = twice.without_all_centers().pivot();
    assert_eq!(pivot.len(), 1);
    assert_eq!(pivot.rows()[0].metrics["dice"], 0.1);
}

#[test]
fn test_summary_and_differences() {
    let root = tempfile::tempdir().unwrap();
    let a = write_scores(
        &root.path().join("a"),
        "tumor",
        r#"{"P1 x": {"dice": 0.9}, "P2 y": {"dice": 0.7}}"#,
    );
    let b = write_scores(
        &root.path().join("b"),
        "tumor",
        r#"{"P1 x": {"dice": 0.8}, "P2 y": {"dice": 0.6}}"#,
    );
    let table = ScoreTableBuilder::default()
        .build([
            MethodSource::from_files("A", [&a]),
            MethodSource::from_files("B", [&b]),
        ])
        .unwrap();

    let summary = table.filter(|r| r.method.as_deref() == Some("A")).summarize("dice");
    assert_eq!(summary[0].center, ALL_CENTERS);
    assert_eq!(summary[0].summary.n, 2);
    assert!((summary[0].summary.mean - 0.8).abs() < 1e-12);

    let report = table.paired_differences("dice").unwrap();
    let all = report.entries.iter().find(|e| e.center == ALL_CENTERS).unwrap();
    assert_eq!(all.n, 2);
    assert!((all.mean - 0.1).abs() < 1e-12);
    assert_eq!(report.entries.len(), 3);
}

#[test]
fn test_long_csv() {
    let root = tempfile::tempdir().unwrap();
    let f = write_scores(
        root.path(),
        "tumor",
        r#"{"P1 x": {"dice": NaN, "hd95": Infinity, "segment_volume": 1.5}}"#,
    );
    let table = ScoreTableBuilder::new(site_map()).read_file(&f, Some("A")).unwrap();
    let mut buf = Vec::new();
    table.write_long_csv(&mut buf).unwrap();
    let text = String::from_utf8(buf).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[1], "P1 x,tumor,A,All,,dice,,1.5,");
    assert_eq!(lines[4], "P1 x,tumor,A,Site X,,hd95,inf,1.5,");
}
