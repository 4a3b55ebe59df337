use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::app::error::ProvisionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Bounds {
    /// Truncating midpoint, the point `input tap` receives. Summed in `i64`
    /// so coordinates near `i32::MAX` cannot overflow.
    pub fn center(&self) -> (i32, i32) {
        (midpoint(self.x1, self.x2), midpoint(self.y1, self.y2))
    }
}

fn midpoint(a: i32, b: i32) -> i32 {
    // The mean of two i32 values always fits back into i32.
    ((i64::from(a) + i64::from(b)) / 2) as i32
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiNode {
    pub text: String,
    pub bounds: Bounds,
}

/// Parses uiautomator bounds such as `[100,200][300,400]`.
///
/// Returns `None` unless there are exactly four integer components.
pub fn parse_bounds(raw: &str) -> Option<Bounds> {
    let cleaned = raw.replace("][", ",").replace(['[', ']'], "");
    let parts: Vec<&str> = cleaned.split(',').collect();
    if parts.len() != 4 {
        return None;
    }
    let mut coords = [0i32; 4];
    for (slot, part) in coords.iter_mut().zip(parts) {
        *slot = part.trim().parse().ok()?;
    }
    Some(Bounds {
        x1: coords[0],
        y1: coords[1],
        x2: coords[2],
        y2: coords[3],
    })
}

struct NodeAttributes {
    text: String,
    bounds: String,
}

fn node_attributes(
    element: &BytesStart<'_>,
    decoder: Decoder,
) -> Result<NodeAttributes, ProvisionError> {
    let mut text = String::new();
    let mut bounds = String::new();
    for attr in element.attributes() {
        let attr = attr.map_err(|err| ProvisionError::parse("UI dump", err.to_string()))?;
        let target = match attr.key.as_ref() {
            b"text" => &mut text,
            b"bounds" => &mut bounds,
            _ => continue,
        };
        *target = attr
            .decode_and_unescape_value(decoder)
            .map_err(|err| ProvisionError::parse("UI dump", err.to_string()))?
            .into_owned();
    }
    Ok(NodeAttributes { text, bounds })
}

/// Scans every `node` element in document order and returns the first whose
/// `text` equals `label` ignoring case and whose bounds are well formed.
pub fn find_node_by_label(xml: &str, label: &str) -> Result<Option<UiNode>, ProvisionError> {
    let wanted = label.to_lowercase();
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref element)) | Ok(Event::Empty(ref element))
                if element.name().as_ref() == b"node" =>
            {
                let attrs = node_attributes(element, reader.decoder())?;
                if attrs.text.to_lowercase() != wanted {
                    continue;
                }
                if let Some(bounds) = parse_bounds(&attrs.bounds) {
                    return Ok(Some(UiNode {
                        text: attrs.text,
                        bounds,
                    }));
                }
            }
            Ok(Event::Eof) => return Ok(None),
            Err(err) => return Err(ProvisionError::parse("UI dump", err.to_string())),
            _ => {}
        }
    }
}

pub fn contains_text(xml: &str, text: &str) -> bool {
    xml.to_lowercase().contains(&text.to_lowercase())
}
