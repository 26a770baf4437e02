//! PDF colour space descriptors.
//!
//! Only the structure needed to describe an image is kept: the family, the
//! component count, and for Indexed spaces the base space and `hival`.

use crate::document::PDFDocument;
use crate::model::objects::PDFObject;
use std::fmt;

/// Nesting bound for indirect and Indexed colour spaces.
const MAX_COLORSPACE_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorSpace {
    DeviceGray,
    DeviceRGB,
    DeviceCMYK,
    CalGray,
    CalRGB,
    Lab,
    ICCBased { n: usize },
    Indexed { base: Box<ColorSpace>, hival: u32 },
    Separation,
    DeviceN { n: usize },
    Pattern,
    Unknown(String),
}

impl ColorSpace {
    /// Colour space for a bare name, expanding the inline abbreviations
    /// `G`, `RGB` and `CMYK`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "DeviceGray" | "G" => Self::DeviceGray,
            "DeviceRGB" | "RGB" => Self::DeviceRGB,
            "DeviceCMYK" | "CMYK" => Self::DeviceCMYK,
            "CalGray" => Self::CalGray,
            "CalRGB" => Self::CalRGB,
            "Lab" => Self::Lab,
            "Pattern" => Self::Pattern,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Build a descriptor from a `/ColorSpace` value, following indirect
    /// references through `doc`.
    pub fn from_object(obj: &PDFObject, doc: &PDFDocument) -> Self {
        Self::from_object_at(obj, doc, 0)
    }

    fn from_object_at(obj: &PDFObject, doc: &PDFDocument, depth: usize) -> Self {
        if depth > MAX_COLORSPACE_DEPTH {
            tracing::debug!("colour space nesting too deep");
            return Self::Unknown("nested".into());
        }
        match obj {
            PDFObject::Name(name) => Self::from_name(name),
            PDFObject::Ref(_) => match doc.resolve(obj) {
                Ok(resolved) => Self::from_object_at(&resolved, doc, depth + 1),
                Err(err) => {
                    tracing::debug!(error = %err, "unresolvable colour space");
                    Self::Unknown("unresolved".into())
                }
            },
            PDFObject::Array(arr) => Self::from_array(arr, doc, depth),
            other => Self::Unknown(other.type_name().into()),
        }
    }

    fn from_array(arr: &[PDFObject], doc: &PDFDocument, depth: usize) -> Self {
        let Some(family) = arr.first().and_then(|f| f.as_name().ok()) else {
            return Self::Unknown("array".into());
        };
        let arg = |i: usize| arr.get(i).and_then(|o| doc.resolve(o).ok());

        match family {
            "ICCBased" => {
                let n = arg(1)
                    .and_then(|profile| profile.as_dict().ok()?.get("N")?.as_int().ok())
                    .and_then(|n| usize::try_from(n).ok());
                match n {
                    Some(n) => Self::ICCBased { n },
                    None => Self::Unknown("ICCBased".into()),
                }
            }
            "Indexed" | "I" => {
                let base = arr.get(1).map_or_else(
                    || Self::Unknown("Indexed".into()),
                    |b| Self::from_object_at(b, doc, depth + 1),
                );
                let hival = arg(2)
                    .and_then(|h| h.as_int().ok())
                    .and_then(|h| u32::try_from(h).ok())
                    .unwrap_or(0);
                Self::Indexed {
                    base: Box::new(base),
                    hival,
                }
            }
            "Separation" => Self::Separation,
            "DeviceN" => {
                let n = arg(1).and_then(|names| names.as_array().ok().map(Vec::len));
                Self::DeviceN { n: n.unwrap_or(0) }
            }
            // [/CalRGB << ... >>], [/Pattern /DeviceRGB], [/DeviceGray]
            name => Self::from_name(name),
        }
    }

    /// Components per sample, when known.
    pub fn components(&self) -> Option<usize> {
        match self {
            Self::DeviceGray | Self::CalGray | Self::Separation | Self::Indexed { .. } => Some(1),
            Self::DeviceRGB | Self::CalRGB | Self::Lab => Some(3),
            Self::DeviceCMYK => Some(4),
            Self::ICCBased { n } | Self::DeviceN { n } => Some(*n),
            Self::Pattern | Self::Unknown(_) => None,
        }
    }

    /// Short family label used in image listings.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::DeviceGray | Self::CalGray => "gray",
            Self::DeviceRGB | Self::CalRGB => "rgb",
            Self::DeviceCMYK => "cmyk",
            Self::Lab => "lab",
            Self::ICCBased { .. } => "icc",
            Self::Indexed { .. } => "index",
            Self::Separation => "sep",
            Self::DeviceN { .. } => "devn",
            Self::Pattern => "pattern",
            Self::Unknown(_) => "?",
        }
    }
}

impl fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ICCBased { n } => write!(f, "ICCBased({n})"),
            Self::Indexed { base, hival } => write!(f, "Indexed({base}, {hival})"),
            Self::DeviceN { n } => write!(f, "DeviceN({n})"),
            Self::Unknown(name) => write!(f, "Unknown({name})"),
            other => write!(f, "{other:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbreviations_expand() {
        assert_eq!(ColorSpace::from_name("G"), ColorSpace::DeviceGray);
        assert_eq!(ColorSpace::from_name("RGB"), ColorSpace::DeviceRGB);
        assert_eq!(ColorSpace::from_name("CMYK"), ColorSpace::DeviceCMYK);
        assert_eq!(
            ColorSpace::from_name("Spot"),
            ColorSpace::Unknown("Spot".into())
        );
    }

    #[test]
    fn component_counts() {
        let indexed = ColorSpace::Indexed {
            base: Box::new(ColorSpace::DeviceRGB),
            hival: 255,
        };
        assert_eq!(indexed.components(), Some(1));
        assert_eq!(ColorSpace::ICCBased { n: 4 }.components(), Some(4));
        assert_eq!(ColorSpace::Pattern.components(), None);
        assert_eq!(indexed.to_string(), "Indexed(DeviceRGB, 255)");
        assert_eq!(indexed.label(), "index");
    }
}
