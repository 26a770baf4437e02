//! Stream filter pipeline.
//!
//! A [`FilterChain`] is read from a stream's `/Filter` and `/DecodeParms`
//! entries and applied left to right by [`decode`]. When the last filter is
//! an image-native codec (DCT, JPX, CCITT, JBIG2) the still-encoded bytes
//! are returned untouched so the image keeps its storable format.

pub mod predictor;

use crate::codec::{ascii85decode, asciihexdecode, flatedecode, lzwdecode_with_earlychange, rldecode};
use crate::document::PDFDocument;
use crate::error::{PdfError, Result};
use crate::model::objects::{PDFDict, PDFObject, PDFStream};
use predictor::{PredictorParams, apply_predictor};
use serde::Serialize;
use smallvec::SmallVec;

/// Upper bound on decoded output of one stream.
pub const MAX_IMAGE_DECODED_BYTES: usize = 256 * 1024 * 1024;

/// Storable format of an extracted payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NativeType {
    Jpeg,
    Jp2,
    Ccitt,
    Jbig2,
    /// Raw sample data; the engine does not re-encode it
    Raw,
}

impl NativeType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Jp2 => "jp2",
            Self::Ccitt => "ccitt",
            Self::Jbig2 => "jbig2",
            Self::Raw => "raw",
        }
    }

    /// File extension used in output identifiers.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Jp2 => "jp2",
            Self::Ccitt => "ccitt",
            Self::Jbig2 => "jb2",
            Self::Raw => "raw",
        }
    }
}

impl std::fmt::Display for NativeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single decode filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterKind {
    AsciiHex,
    Ascii85,
    Lzw,
    Flate,
    RunLength,
    Dct,
    Jpx,
    Ccitt,
    Jbig2,
    Crypt,
    Unknown(String),
}

impl FilterKind {
    /// Map a filter name, full or inline abbreviation.
    pub fn from_name(name: &str) -> Self {
        match name {
            "ASCIIHexDecode" | "AHx" => Self::AsciiHex,
            "ASCII85Decode" | "A85" => Self::Ascii85,
            "LZWDecode" | "LZW" => Self::Lzw,
            "FlateDecode" | "Fl" => Self::Flate,
            "RunLengthDecode" | "RL" => Self::RunLength,
            "DCTDecode" | "DCT" => Self::Dct,
            "JPXDecode" => Self::Jpx,
            "CCITTFaxDecode" | "CCF" => Self::Ccitt,
            "JBIG2Decode" => Self::Jbig2,
            "Crypt" => Self::Crypt,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::AsciiHex => "ASCIIHexDecode",
            Self::Ascii85 => "ASCII85Decode",
            Self::Lzw => "LZWDecode",
            Self::Flate => "FlateDecode",
            Self::RunLength => "RunLengthDecode",
            Self::Dct => "DCTDecode",
            Self::Jpx => "JPXDecode",
            Self::Ccitt => "CCITTFaxDecode",
            Self::Jbig2 => "JBIG2Decode",
            Self::Crypt => "Crypt",
            Self::Unknown(name) => name,
        }
    }

    /// The native type for image codecs whose output is kept encoded.
    pub const fn native_type(&self) -> Option<NativeType> {
        match self {
            Self::Dct => Some(NativeType::Jpeg),
            Self::Jpx => Some(NativeType::Jp2),
            Self::Ccitt => Some(NativeType::Ccitt),
            Self::Jbig2 => Some(NativeType::Jbig2),
            _ => None,
        }
    }
}

/// One filter with its (optional) parameter dictionary.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterStage {
    pub kind: FilterKind,
    pub params: Option<PDFDict>,
}

/// Ordered filter chain of a stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterChain {
    stages: SmallVec<[FilterStage; 2]>,
}

impl FilterChain {
    pub fn new(stages: impl IntoIterator<Item = FilterStage>) -> Self {
        Self {
            stages: stages.into_iter().collect(),
        }
    }

    /// Read `/Filter` and `/DecodeParms`, resolving indirect values.
    ///
    /// A single parameter dictionary alongside several filters applies to
    /// each of them.
    pub fn from_stream(stream: &PDFStream, doc: &PDFDocument) -> Result<Self> {
        let filter_obj = match stream.get_any(&["Filter", "F"]) {
            Some(obj) => doc.resolve(obj)?,
            None => return Ok(Self::default()),
        };
        let names: Vec<String> = match filter_obj {
            PDFObject::Name(name) => vec![name],
            PDFObject::Array(items) => items
                .iter()
                .map(|item| doc.resolve(item)?.as_name().map(str::to_string))
                .collect::<Result<_>>()?,
            PDFObject::Null => Vec::new(),
            other => {
                return Err(PdfError::TypeError {
                    expected: "filter name or array",
                    got: other.type_name(),
                });
            }
        };

        let params_list: Vec<Option<PDFDict>> =
            match stream.get_any(&["DecodeParms", "DP"]).map(|p| doc.resolve(p)) {
                Some(Ok(PDFObject::Dict(d))) => vec![Some(d)],
                Some(Ok(PDFObject::Array(items))) => items
                    .iter()
                    .map(|item| match doc.resolve(item) {
                        Ok(PDFObject::Dict(d)) => Some(d),
                        _ => None,
                    })
                    .collect(),
                Some(Err(err)) => return Err(err),
                _ => Vec::new(),
            };

        let broadcast = params_list.len() == 1 && names.len() > 1;
        let stages = names.into_iter().enumerate().map(|(idx, name)| {
            let params = if broadcast {
                params_list[0].clone()
            } else {
                params_list.get(idx).cloned().flatten()
            };
            FilterStage {
                kind: FilterKind::from_name(&name),
                params,
            }
        });
        Ok(Self::new(stages))
    }

    pub fn stages(&self) -> &[FilterStage] {
        &self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Native type of the terminal filter, `Raw` when there is none.
    pub fn native_type(&self) -> NativeType {
        self.stages
            .last()
            .and_then(|stage| stage.kind.native_type())
            .unwrap_or(NativeType::Raw)
    }

    /// Filter names in order, for listings and logs.
    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.kind.name()).collect()
    }
}

/// Decoding bounds and strictness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    pub max_decoded_bytes: usize,
    /// Fail on damaged compressed data instead of keeping partial output.
    pub strict: bool,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_decoded_bytes: MAX_IMAGE_DECODED_BYTES,
            strict: true,
        }
    }
}

impl DecodeLimits {
    pub const fn with_max_bytes(max_decoded_bytes: usize) -> Self {
        Self {
            max_decoded_bytes,
            strict: true,
        }
    }

    /// Same bound, tolerant of damaged data (content streams).
    pub const fn lenient(self) -> Self {
        Self {
            strict: false,
            ..self
        }
    }
}

/// Output of [`decode`].
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub native: NativeType,
    pub data: Vec<u8>,
    /// Parameters of the native codec (CCITT `K`/`Columns`, JBIG2 globals)
    pub codec_params: Option<PDFDict>,
}

/// Apply `chain` to `raw` left to right.
///
/// Fails with [`PdfError::UnsupportedFilter`] for `Crypt`, unknown names and
/// image codecs that are not last, and with [`PdfError::CorruptStream`] when
/// a codec rejects its input or the output grows past the limit.
pub fn decode(raw: &[u8], chain: &FilterChain, limits: &DecodeLimits) -> Result<Decoded> {
    let max = limits.max_decoded_bytes;
    let mut data = raw.to_vec();
    let last = chain.stages.len().saturating_sub(1);

    for (idx, stage) in chain.stages.iter().enumerate() {
        data = match &stage.kind {
            FilterKind::Dct | FilterKind::Jpx | FilterKind::Ccitt | FilterKind::Jbig2 => {
                if idx != last {
                    return Err(PdfError::UnsupportedFilter(format!(
                        "{} followed by further filters",
                        stage.kind.name()
                    )));
                }
                return Ok(Decoded {
                    native: chain.native_type(),
                    data,
                    codec_params: stage.params.clone(),
                });
            }
            FilterKind::AsciiHex => asciihexdecode(&data)?,
            FilterKind::Ascii85 => ascii85decode(&data)?,
            FilterKind::Flate => flatedecode(&data, max, limits.strict)?,
            FilterKind::Lzw => {
                let early_change = stage
                    .params
                    .as_ref()
                    .and_then(|p| p.get("EarlyChange"))
                    .and_then(|v| v.as_int().ok())
                    .unwrap_or(1);
                lzwdecode_with_earlychange(&data, early_change, max, limits.strict)?
            }
            FilterKind::RunLength => rldecode(&data)?,
            FilterKind::Crypt => {
                return Err(PdfError::UnsupportedFilter("Crypt".into()));
            }
            FilterKind::Unknown(name) => {
                return Err(PdfError::UnsupportedFilter(name.clone()));
            }
        };
        enforce_max_len(data.len(), max)?;

        if let Some(predictor) = stage.params.as_ref().and_then(PredictorParams::from_dict) {
            data = apply_predictor(&data, &predictor)?;
            enforce_max_len(data.len(), max)?;
        }
    }

    Ok(Decoded {
        native: NativeType::Raw,
        data,
        codec_params: None,
    })
}

fn enforce_max_len(len: usize, max: usize) -> Result<()> {
    if len > max {
        return Err(PdfError::CorruptStream(format!(
            "decoded data exceeds limit ({len} > {max})"
        )));
    }
    Ok(())
}
