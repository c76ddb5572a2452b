//! Streaming parser for the layout converter's XML output.
//!
//! Reads the ALTO layout document into the typed tree in [`crate::alto`],
//! and the companion annotation XML into link boxes. Both parsers are
//! tolerant of missing geometry (defaulting to 0) but fail on structurally
//! broken XML.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::geom::{BBX, LabelledBox};

use super::{Block, Document, Geometry, Line, Page, TextStyle, Word};

fn attributes(e: &BytesStart) -> Result<FxHashMap<String, String>> {
    let mut map = FxHashMap::default();
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        map.insert(key, value);
    }
    Ok(map)
}

fn float_attr(attrs: &FxHashMap<String, String>, name: &str) -> f64 {
    attrs
        .get(name)
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(0.0)
}

fn geometry(attrs: &FxHashMap<String, String>) -> Geometry {
    Geometry {
        hpos: float_attr(attrs, "HPOS"),
        vpos: float_attr(attrs, "VPOS"),
        width: float_attr(attrs, "WIDTH"),
        height: float_attr(attrs, "HEIGHT"),
    }
}

/// Parses an ALTO layout document.
pub fn parse_document(xml: &str) -> Result<Document> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut doc = Document::default();
    let mut cur_page: Option<Page> = None;
    let mut cur_block: Option<Block> = None;
    let mut cur_line: Option<Line> = None;

    loop {
        let event = reader.read_event()?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                let name = e.local_name();
                match name.as_ref() {
                    b"TextStyle" => {
                        let attrs = attributes(e)?;
                        if let Some(id) = attrs.get("ID") {
                            doc.styles.insert(
                                id.clone(),
                                TextStyle {
                                    font_family: attrs
                                        .get("FONTFAMILY")
                                        .cloned()
                                        .unwrap_or_default(),
                                    font_size: float_attr(&attrs, "FONTSIZE"),
                                },
                            );
                        }
                    }
                    b"Page" => {
                        let attrs = attributes(e)?;
                        let physical_num = attrs
                            .get("PHYSICAL_IMG_NR")
                            .and_then(|v| v.parse::<u32>().ok())
                            .unwrap_or(doc.pages.len() as u32 + 1);
                        let page = Page {
                            physical_num,
                            geometry: geometry(&attrs),
                            blocks: Vec::new(),
                        };
                        if is_empty {
                            doc.pages.push(page);
                        } else {
                            cur_page = Some(page);
                        }
                    }
                    b"TextBlock" if cur_page.is_some() => {
                        let attrs = attributes(e)?;
                        let block = Block {
                            geometry: geometry(&attrs),
                            lines: Vec::new(),
                        };
                        if is_empty {
                            cur_page.as_mut().unwrap().blocks.push(block);
                        } else {
                            cur_block = Some(block);
                        }
                    }
                    b"TextLine" if cur_block.is_some() => {
                        let attrs = attributes(e)?;
                        let line = Line {
                            geometry: geometry(&attrs),
                            words: Vec::new(),
                        };
                        if is_empty {
                            cur_block.as_mut().unwrap().lines.push(line);
                        } else {
                            cur_line = Some(line);
                        }
                    }
                    b"String" => {
                        if let Some(line) = cur_line.as_mut() {
                            let attrs = attributes(e)?;
                            line.words.push(Word {
                                geometry: geometry(&attrs),
                                content: attrs.get("CONTENT").cloned().unwrap_or_default(),
                                style_ref: attrs.get("STYLEREFS").cloned(),
                            });
                        }
                    }
                    _ => {}
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"TextLine" => {
                    if let (Some(line), Some(block)) = (cur_line.take(), cur_block.as_mut()) {
                        block.lines.push(line);
                    }
                }
                b"TextBlock" => {
                    if let (Some(block), Some(page)) = (cur_block.take(), cur_page.as_mut()) {
                        page.blocks.push(block);
                    }
                }
                b"Page" => {
                    if let Some(page) = cur_page.take() {
                        doc.pages.push(page);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(doc)
}

/// Parses the converter's annotation XML into one labelled box per URI link
/// action: the box is the hull of the link's quad points, the label is the
/// link destination.
pub fn parse_link_annotations(xml: &str) -> Result<Vec<LabelledBox>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut out = Vec::new();
    let mut page_num: u32 = 0;
    let mut is_uri = false;
    let mut in_dest = false;
    let mut dest: Option<String> = None;
    let mut points: Vec<(f64, f64)> = Vec::new();

    loop {
        let event = reader.read_event()?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"ANNOTATION" => {
                        let attrs = attributes(e)?;
                        page_num = attrs
                            .get("pagenum")
                            .and_then(|v| v.parse::<u32>().ok())
                            .unwrap_or(0);
                        is_uri = false;
                        dest = None;
                        points.clear();
                    }
                    b"ACTION" => {
                        let attrs = attributes(e)?;
                        is_uri = attrs.get("type").is_some_and(|t| t == "uri");
                    }
                    b"DEST" => in_dest = true,
                    b"POINT" => {
                        let attrs = attributes(e)?;
                        points.push((float_attr(&attrs, "HPOS"), float_attr(&attrs, "VPOS")));
                    }
                    _ => {}
                }
            }
            Event::Text(ref t) => {
                if in_dest {
                    dest = Some(t.unescape()?.into_owned());
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"DEST" => in_dest = false,
                b"ANNOTATION" => {
                    if let Some(dest) = dest.take() {
                        if is_uri && !points.is_empty() {
                            let (mut min_h, mut min_v) = points[0];
                            let (mut max_h, mut max_v) = points[0];
                            for &(h, v) in &points[1..] {
                                min_h = min_h.min(h);
                                max_h = max_h.max(h);
                                min_v = min_v.min(v);
                                max_v = max_v.max(v);
                            }
                            let bbx = BBX::new(page_num, min_h, min_v, max_h, max_v);
                            out.push(LabelledBox::new(bbx, dest.as_str(), 0));
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out)
}
