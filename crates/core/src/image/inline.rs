//! Inline image dictionaries (`BI ... ID`).

use crate::interp::content::token_to_object;
use crate::model::objects::{PDFDict, PDFObject, PDFStream};
use crate::parser::lexer::PSToken;
use std::collections::HashMap;

/// Full key for an inline-image abbreviation.
fn expand_key(key: &str) -> &str {
    match key {
        "W" => "Width",
        "H" => "Height",
        "BPC" => "BitsPerComponent",
        "CS" => "ColorSpace",
        "F" => "Filter",
        "DP" => "DecodeParms",
        "IM" => "ImageMask",
        "D" => "Decode",
        "I" => "Interpolate",
        "L" => "Length",
        other => other,
    }
}

/// Colour space abbreviations valid only inside inline images.
fn expand_color_space(value: PDFObject) -> PDFObject {
    match value {
        PDFObject::Name(name) => PDFObject::Name(
            match name.as_str() {
                "G" => "DeviceGray",
                "RGB" => "DeviceRGB",
                "CMYK" => "DeviceCMYK",
                "I" => "Indexed",
                _ => return PDFObject::Name(name),
            }
            .to_string(),
        ),
        PDFObject::Array(mut items) => {
            if let Some(first) = items.first_mut() {
                *first = expand_color_space(std::mem::replace(first, PDFObject::Null));
            }
            PDFObject::Array(items)
        }
        other => other,
    }
}

/// Stream equivalent of an inline image, with abbreviated keys and colour
/// space names expanded. Filter abbreviations are handled by the filter
/// chain itself.
pub fn inline_stream(dict: HashMap<String, PSToken>, data: Vec<u8>) -> PDFStream {
    let attrs: PDFDict = dict
        .into_iter()
        .map(|(key, value)| {
            let key = expand_key(&key).to_string();
            let mut value = token_to_object(value);
            if key == "ColorSpace" {
                value = expand_color_space(value);
            }
            (key, value)
        })
        .filter(|(_, value)| !value.is_null())
        .collect();
    PDFStream::new(attrs, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbreviations_expand() {
        let mut dict = HashMap::new();
        dict.insert("W".to_string(), PSToken::Int(4));
        dict.insert("H".to_string(), PSToken::Int(2));
        dict.insert("BPC".to_string(), PSToken::Int(8));
        dict.insert("CS".to_string(), PSToken::Literal("RGB".into()));
        dict.insert("F".to_string(), PSToken::Literal("AHx".into()));
        let stream = inline_stream(dict, b"00ff>".to_vec());

        assert_eq!(stream.get("Width"), Some(&PDFObject::Int(4)));
        assert_eq!(stream.get("Height"), Some(&PDFObject::Int(2)));
        assert_eq!(stream.get("BitsPerComponent"), Some(&PDFObject::Int(8)));
        assert_eq!(stream.name_attr("ColorSpace"), Some("DeviceRGB"));
        assert_eq!(stream.name_attr("Filter"), Some("AHx"));
        assert_eq!(stream.rawdata(), b"00ff>");
    }

    #[test]
    fn indexed_array_abbreviation() {
        let cs = expand_color_space(PDFObject::Array(vec![
            PDFObject::Name("I".into()),
            PDFObject::Name("G".into()),
            PDFObject::Int(1),
            PDFObject::String(vec![0, 255]),
        ]));
        let items = cs.as_array().unwrap();
        assert_eq!(items[0], PDFObject::Name("Indexed".into()));
        // the base stays abbreviated; ColorSpace::from_name accepts both
        assert_eq!(items[1], PDFObject::Name("G".into()));
    }

    #[test]
    fn resource_names_are_kept() {
        assert_eq!(
            expand_color_space(PDFObject::Name("CS0".into())),
            PDFObject::Name("CS0".into())
        );
    }
}
