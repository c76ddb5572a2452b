use marginalia_core::alto::{Block, Document, Geometry, Line, NodeKind, Page, TextStyle, Word};
use marginalia_core::error::AnnotError;
use marginalia_core::features::FeatureValue;
use marginalia_core::features::aggregate::{build_tables, get_features, get_features_by_name};
use marginalia_core::features::line::LineFeatures;
use marginalia_core::params::FeatureParams;

fn word(content: &str, hpos: f64, width: f64, style: Option<&str>) -> Word {
    Word {
        geometry: Geometry {
            hpos,
            vpos: 100.0,
            width,
            height: 10.0,
        },
        content: content.into(),
        style_ref: style.map(String::from),
    }
}

fn line_at(vpos: f64, height: f64, words: Vec<Word>) -> Line {
    Line {
        geometry: Geometry {
            hpos: 72.0,
            vpos,
            width: 400.0,
            height,
        },
        words,
    }
}

fn block_of(lines: Vec<Line>) -> Block {
    Block {
        geometry: Geometry {
            hpos: 72.0,
            vpos: 80.0,
            width: 450.0,
            height: 600.0,
        },
        lines,
    }
}

fn page_of(physical_num: u32, blocks: Vec<Block>) -> Page {
    Page {
        physical_num,
        geometry: Geometry {
            hpos: 0.0,
            vpos: 0.0,
            width: 612.0,
            height: 792.0,
        },
        blocks,
    }
}

/// One page, one block, one line of three words with lengths 2, 5, 9.
fn three_word_doc() -> Document {
    let words = vec![
        word("ab", 72.0, 20.0, Some("it")),
        word("cdefg", 100.0, 50.0, Some("rm")),
        word("hijklmnop", 160.0, 90.0, Some("rm")),
    ];
    let mut doc = Document {
        pages: vec![page_of(1, vec![block_of(vec![line_at(100.0, 10.0, words)])])],
        ..Default::default()
    };
    doc.styles.insert(
        "it".into(),
        TextStyle {
            font_family: "CMTI10".into(),
            font_size: 10.0,
        },
    );
    doc.styles.insert(
        "rm".into(),
        TextStyle {
            font_family: "CMR10".into(),
            font_size: 10.0,
        },
    );
    doc
}

fn num(v: &FeatureValue) -> f64 {
    v.as_num().expect("numeric cell")
}

#[test]
fn tables_have_one_row_per_node() {
    let doc = three_word_doc();
    let tables = build_tables(&doc, &FeatureParams::default());

    assert_eq!(tables.tables["Page"].len(), 1);
    assert_eq!(tables.tables["TextBlock"].len(), 1);
    assert_eq!(tables.tables["TextLine"].len(), 1);
    assert_eq!(tables.tables["String"].len(), 3);

    // Back-reference columns point at the parent's row.
    let word_row = &tables.tables["String"].rows[2];
    assert_eq!(num(&word_row["TextLine"]), 0.0);
    let line_row = &tables.tables["TextLine"].rows[0];
    assert_eq!(num(&line_row["TextBlock"]), 0.0);
}

#[test]
fn leaf_word_yields_one_row_per_word_with_broadcast_columns() {
    let doc = three_word_doc();
    let tables = build_tables(&doc, &FeatureParams::default());
    let table = get_features(&tables, NodeKind::Word, false, false).unwrap();

    assert_eq!(table.len(), 3);
    let row = &table.rows[0];
    assert_eq!(row["String.word"], FeatureValue::Text("ab".into()));
    assert_eq!(row["String.word_position"], FeatureValue::Text("start".into()));
    // Coarser kinds are broadcast onto every word row; the join keys are
    // consumed.
    assert_eq!(row["Page.page_position"], FeatureValue::Text("start".into()));
    assert!(row.contains_key("TextLine.line_position"));
    assert!(row.contains_key("TextBlock.block_position"));
    assert!(!row.contains_key("String.TextLine"));
    assert!(!row.contains_key("TextLine.TextBlock"));
}

#[test]
fn context_deltas_are_zero_at_the_edges() {
    let doc = three_word_doc();
    let tables = build_tables(&doc, &FeatureParams::default());
    let table = get_features(&tables, NodeKind::Word, false, true).unwrap();

    // lengths are 2, 5, 9
    assert_eq!(num(&table.rows[0]["String.length_prev"]), 0.0);
    assert_eq!(num(&table.rows[1]["String.length_prev"]), 3.0);
    assert_eq!(num(&table.rows[2]["String.length_prev"]), 4.0);
    assert_eq!(num(&table.rows[0]["String.length_next"]), -3.0);
    assert_eq!(num(&table.rows[1]["String.length_next"]), -4.0);
    assert_eq!(num(&table.rows[2]["String.length_next"]), 0.0);

    // Booleans get no delta columns.
    assert!(!table.rows[0].contains_key("String.italic_next"));
}

#[test]
fn standardize_centers_numerics_and_remaps_bools() {
    let doc = three_word_doc();
    let tables = build_tables(&doc, &FeatureParams::default());
    let table = get_features(&tables, NodeKind::Word, true, false).unwrap();

    let lengths: Vec<f64> = table.rows.iter().map(|r| num(&r["String.length"])).collect();
    assert!(lengths.iter().sum::<f64>().abs() < 1e-9);
    assert!(lengths[0] < lengths[1] && lengths[1] < lengths[2]);

    // CMTI10 classifies as italic; booleans become ±1.
    assert_eq!(num(&table.rows[0]["String.italic"]), 1.0);
    assert_eq!(num(&table.rows[1]["String.italic"]), -1.0);

    // Text columns pass through untouched.
    assert_eq!(
        table.rows[0]["String.word"],
        FeatureValue::Text("ab".into())
    );
}

#[test]
fn leaf_line_aggregates_word_columns() {
    let mut doc = three_word_doc();
    // A second line with a single word, to exercise the small-group path.
    doc.pages[0].blocks[0]
        .lines
        .push(line_at(120.0, 10.0, vec![word("z", 72.0, 8.0, None)]));

    let tables = build_tables(&doc, &FeatureParams::default());
    let table = get_features(&tables, NodeKind::Line, false, false).unwrap();
    assert_eq!(table.len(), 2);

    let first = &table.rows[0];
    assert_eq!(num(&first["String.length_min"]), 2.0);
    assert_eq!(num(&first["String.length_max"]), 9.0);
    assert!((num(&first["String.length_mean"]) - 16.0 / 3.0).abs() < 1e-9);
    // Sample std of (2, 5, 9).
    assert!((num(&first["String.length_std"]) - 3.5118845842842465).abs() < 1e-9);
    assert_eq!(num(&first["String.length.first"]), 2.0);
    assert_eq!(num(&first["String.length.second"]), 5.0);
    assert_eq!(num(&first["String.length.last"]), 9.0);

    match &first["String.word"] {
        FeatureValue::Bag(bag) => {
            assert_eq!(bag.len(), 3);
            assert_eq!(bag["ab"], 1);
        }
        other => panic!("expected a bag, got {other:?}"),
    }

    // One-word group: no spread, neutral second child.
    let second = &table.rows[1];
    assert_eq!(num(&second["String.length_std"]), 0.0);
    assert_eq!(num(&second["String.length.second"]), 0.0);
    assert_eq!(num(&second["String.length.last"]), 1.0);
}

#[test]
fn leaf_page_rolls_everything_up() {
    let mut doc = three_word_doc();
    doc.pages.push(page_of(
        2,
        vec![block_of(vec![line_at(
            100.0,
            10.0,
            vec![word("only", 72.0, 30.0, None)],
        )])],
    ));

    let tables = build_tables(&doc, &FeatureParams::default());
    let table = get_features(&tables, NodeKind::Page, false, false).unwrap();

    assert_eq!(table.len(), 2);
    assert_eq!(
        table.rows[0]["Page.page_position"],
        FeatureValue::Text("start".into())
    );
    assert_eq!(
        table.rows[1]["Page.page_position"],
        FeatureValue::Text("end".into())
    );
    assert!(table.rows[0].contains_key("TextBlock.prev_delta_h_mean"));
}

#[test]
fn empty_document_yields_no_features() {
    let tables = build_tables(&Document::default(), &FeatureParams::default());
    assert!(matches!(
        get_features(&tables, NodeKind::Word, true, true),
        Err(AnnotError::NoFeatures)
    ));
}

#[test]
fn unknown_leaf_kind_is_rejected() {
    let doc = three_word_doc();
    let tables = build_tables(&doc, &FeatureParams::default());
    assert!(matches!(
        get_features_by_name(&tables, "Paragraph", true, true),
        Err(AnnotError::UnknownLeafKind(_))
    ));
    assert!(get_features_by_name(&tables, "String", false, false).is_ok());
}

#[test]
fn repeated_headers_are_flagged() {
    let header_words = |page: u32| {
        vec![
            word("Preprint", 72.0, 60.0, None),
            word("Notes", 140.0, 40.0, None),
            word("No", 190.0, 20.0, None),
            word(if page == 1 { "12" } else { "13" }, 220.0, 16.0, None),
        ]
    };
    let body_words = |text: &str| {
        text.split(' ')
            .enumerate()
            .map(|(i, t)| word(t, 72.0 + 40.0 * i as f64, 35.0, None))
            .collect::<Vec<_>>()
    };

    let doc = Document {
        pages: vec![
            page_of(
                1,
                vec![
                    block_of(vec![line_at(30.0, 10.0, header_words(1))]),
                    block_of(vec![line_at(
                        100.0,
                        10.0,
                        body_words("the quick brown fox jumps"),
                    )]),
                ],
            ),
            page_of(
                2,
                vec![
                    block_of(vec![line_at(30.0, 10.0, header_words(2))]),
                    block_of(vec![line_at(
                        100.0,
                        10.0,
                        body_words("over the lazy dog instead"),
                    )]),
                ],
            ),
        ],
        ..Default::default()
    };

    let params = FeatureParams::default();
    let lf = LineFeatures::new(&doc, &params);

    // "Preprint Notes No 12" and "... No 13" fold to the same pattern.
    let h1 = lf.extract(&doc.pages[0].blocks[0], (0, 0), 0);
    assert_eq!(h1["repetitive"], FeatureValue::Bool(true));
    assert_eq!(h1["repetitive_first"], FeatureValue::Bool(true));

    let h2 = lf.extract(&doc.pages[1].blocks[0], (1, 0), 0);
    assert_eq!(h2["repetitive"], FeatureValue::Bool(true));
    assert_eq!(h2["repetitive_first"], FeatureValue::Bool(false));

    let b1 = lf.extract(&doc.pages[0].blocks[1], (0, 1), 0);
    assert_eq!(b1["repetitive"], FeatureValue::Bool(false));
}

#[test]
fn eight_character_patterns_are_too_short_to_repeat() {
    // "Notes 12" / "Notes 13" fold to "notes XX": eight characters, one
    // under the default minimum, so the recurrence is ignored.
    let header = |n: &str| {
        block_of(vec![line_at(
            30.0,
            10.0,
            vec![
                word("Notes", 72.0, 40.0, None),
                word(n, 120.0, 16.0, None),
            ],
        )])
    };
    let doc = Document {
        pages: vec![page_of(1, vec![header("12")]), page_of(2, vec![header("13")])],
        ..Default::default()
    };

    let params = FeatureParams::default();
    let lf = LineFeatures::new(&doc, &params);
    let row = lf.extract(&doc.pages[0].blocks[0], (0, 0), 0);
    assert_eq!(row["repetitive"], FeatureValue::Bool(false));

    // Lowering the cutoff by one character admits the same pattern.
    let relaxed = FeatureParams {
        repetition_min_pattern_len: 8,
        ..FeatureParams::default()
    };
    let lf = LineFeatures::new(&doc, &relaxed);
    let row = lf.extract(&doc.pages[0].blocks[0], (0, 0), 0);
    assert_eq!(row["repetitive"], FeatureValue::Bool(true));
}

#[test]
fn negative_line_gap_becomes_column_break_sentinel() {
    let block = block_of(vec![
        line_at(100.0, 10.0, vec![word("left", 72.0, 30.0, None)]),
        // Jumps back up the page: a column break.
        line_at(50.0, 10.0, vec![word("right", 300.0, 30.0, None)]),
    ]);
    let doc = Document {
        pages: vec![page_of(1, vec![block])],
        ..Default::default()
    };

    let params = FeatureParams::default();
    let lf = LineFeatures::new(&doc, &params);
    let row = lf.extract(&doc.pages[0].blocks[0], (0, 0), 1);
    assert_eq!(
        num(&row["prev_delta_v"]),
        params.column_break_sentinel
    );
}
