use marginalia_core::alto::NodeKind;
use marginalia_core::alto::parser::{parse_document, parse_link_annotations};
use marginalia_core::geom::BBX;

const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<alto xmlns="http://www.loc.gov/standards/alto/ns-v3#">
  <Styles>
    <TextStyle ID="font0" FONTFAMILY="CMBX12" FONTSIZE="14.3"/>
    <TextStyle ID="font1" FONTFAMILY="CMR10" FONTSIZE="9.9"/>
  </Styles>
  <Layout>
    <Page PHYSICAL_IMG_NR="1" WIDTH="612" HEIGHT="792">
      <PrintSpace>
        <TextBlock HPOS="72" VPOS="80" WIDTH="468" HEIGHT="40">
          <TextLine HPOS="72" VPOS="80" WIDTH="468" HEIGHT="18">
            <String CONTENT="Sparse" HPOS="72" VPOS="80" WIDTH="60" HEIGHT="14" STYLEREFS="font0"/>
            <SP WIDTH="4"/>
            <String CONTENT="Recovery" HPOS="136" VPOS="80" WIDTH="80" HEIGHT="14" STYLEREFS="font0"/>
          </TextLine>
          <TextLine HPOS="72" VPOS="102" WIDTH="200" HEIGHT="14">
            <String CONTENT="Lemma" HPOS="72" VPOS="102" WIDTH="50" HEIGHT="11" STYLEREFS="font1"/>
            <String CONTENT="1" HPOS="126" VPOS="102" WIDTH="8" HEIGHT="11" STYLEREFS="font1"/>
          </TextLine>
        </TextBlock>
      </PrintSpace>
    </Page>
    <Page WIDTH="612" HEIGHT="792">
      <PrintSpace>
        <TextBlock HPOS="72" VPOS="80" WIDTH="100" HEIGHT="20"/>
      </PrintSpace>
    </Page>
  </Layout>
</alto>
"#;

#[test]
fn parses_pages_blocks_lines_words() {
    let doc = parse_document(SAMPLE).unwrap();

    assert_eq!(doc.pages.len(), 2);
    assert_eq!(doc.pages[0].physical_num, 1);
    // No PHYSICAL_IMG_NR on the second page: falls back to position.
    assert_eq!(doc.pages[1].physical_num, 2);
    assert_eq!(doc.pages[0].geometry.width, 612.0);

    let block = &doc.pages[0].blocks[0];
    assert_eq!(block.lines.len(), 2);
    assert_eq!(block.lines[0].text(), "Sparse Recovery");
    assert_eq!(block.first_line_text(), "Sparse Recovery");
    assert_eq!(doc.word_count(), 4);

    let word = &block.lines[0].words[1];
    assert_eq!(word.content, "Recovery");
    assert_eq!(word.style_ref.as_deref(), Some("font0"));
    assert_eq!(word.geometry.right(), 216.0);

    // Empty second-page block survives as a leaf.
    assert_eq!(doc.pages[1].blocks.len(), 1);
    assert!(doc.pages[1].blocks[0].lines.is_empty());
}

#[test]
fn style_table_is_captured() {
    let doc = parse_document(SAMPLE).unwrap();
    assert_eq!(doc.styles.len(), 2);
    let bold = &doc.styles["font0"];
    assert_eq!(bold.font_family, "CMBX12");
    assert_eq!(bold.font_size, 14.3);
}

#[test]
fn node_views_flatten_in_document_order() {
    let doc = parse_document(SAMPLE).unwrap();

    let words = doc.nodes(NodeKind::Word);
    assert_eq!(words.len(), 4);
    assert_eq!(words[0].text.as_deref(), Some("Sparse"));
    assert_eq!(words[0].bbx, BBX::new(1, 72.0, 80.0, 132.0, 94.0));

    let blocks = doc.nodes(NodeKind::Block);
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[1].bbx.page_num, 2);
    assert!(blocks[0].text.is_none());
}

#[test]
fn broken_xml_is_an_error() {
    assert!(parse_document("<alto><Page></alto>").is_err());
}

const LINKS: &str = r#"<ANNOTATIONS>
  <ANNOTATION pagenum="1">
    <ACTION type="uri"><DEST>https://arxiv.org/abs/1234.5678</DEST></ACTION>
    <QUADPOINTS><QUADRILATERAL>
      <POINT HPOS="100" VPOS="200"/>
      <POINT HPOS="180" VPOS="200"/>
      <POINT HPOS="100" VPOS="212"/>
      <POINT HPOS="180" VPOS="212"/>
    </QUADRILATERAL></QUADPOINTS>
  </ANNOTATION>
  <ANNOTATION pagenum="2">
    <ACTION type="goto"><DEST>page3</DEST></ACTION>
    <QUADPOINTS><QUADRILATERAL>
      <POINT HPOS="0" VPOS="0"/>
    </QUADRILATERAL></QUADPOINTS>
  </ANNOTATION>
</ANNOTATIONS>
"#;

#[test]
fn link_annotations_keep_only_uri_actions() {
    let boxes = parse_link_annotations(LINKS).unwrap();
    assert_eq!(boxes.len(), 1);

    let b = &boxes[0];
    assert_eq!(b.label, "https://arxiv.org/abs/1234.5678");
    assert_eq!(b.group, 0);
    assert_eq!(b.bbx, BBX::new(1, 100.0, 200.0, 180.0, 212.0));
}
