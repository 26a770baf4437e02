//! XObject lookup and image payload extraction.

use crate::document::PDFDocument;
use crate::error::{PdfError, Result};
use crate::filter::{self, DecodeLimits, FilterChain, NativeType};
use crate::interp::scope::ResourceScope;
use crate::model::colorspace::ColorSpace;
use crate::model::objects::{PDFDict, PDFObject, PDFStream};
use crate::utils::{MATRIX_IDENTITY, Matrix, matrix_from_slice};
use bytes::Bytes;

/// Slack allowed on top of the computed raw sample size when bounding
/// decompression (predictor tags, padding, trailing garbage).
const RAW_SIZE_SLACK: usize = 64 * 1024;

/// A named XObject resolved once at lookup.
#[derive(Debug, Clone)]
pub enum XObject {
    Image(ImageObject),
    Form(FormXObject),
    /// PostScript XObjects and anything without a usable `/Subtype`.
    Unknown { subtype: Option<String> },
}

/// Form XObject: a reusable content stream.
#[derive(Debug, Clone)]
pub struct FormXObject {
    pub objid: Option<u32>,
    /// `/Matrix`, identity when absent or malformed
    pub matrix: Matrix,
    /// `/Resources`, resolved; `None` means inherit the enclosing scope
    pub resources: Option<PDFDict>,
    stream: PDFStream,
}

impl FormXObject {
    fn from_stream(stream: &PDFStream, doc: &PDFDocument) -> Self {
        let matrix = stream
            .get("Matrix")
            .and_then(|m| doc.resolve(m).ok())
            .and_then(|m| {
                let values: Vec<f64> = m
                    .as_array()
                    .ok()?
                    .iter()
                    .map(PDFObject::as_num)
                    .collect::<Result<_>>()
                    .ok()?;
                matrix_from_slice(&values)
            })
            .unwrap_or(MATRIX_IDENTITY);
        let resources = match stream.get("Resources").map(|r| doc.resolve(r)) {
            Some(Ok(PDFObject::Dict(dict))) => Some(dict),
            _ => None,
        };
        Self {
            objid: stream.objid,
            matrix,
            resources,
            stream: stream.clone(),
        }
    }

    /// Decoded content stream of the form.
    pub fn content(&self, doc: &PDFDocument) -> Result<Vec<u8>> {
        doc.decode_stream(&self.stream)
    }
}

/// An image XObject or inline image, ready to extract.
#[derive(Debug, Clone)]
pub struct ImageObject {
    pub objid: Option<u32>,
    pub width: u32,
    pub height: u32,
    /// `None` for JPX images that leave it to the codestream
    pub bits_per_component: Option<u32>,
    pub color_space: Option<ColorSpace>,
    pub filters: FilterChain,
    pub has_soft_mask: bool,
    pub image_mask: bool,
    pub inline: bool,
    raw: Bytes,
}

impl ImageObject {
    /// Build from an image XObject stream.
    ///
    /// Missing or non-positive `/Width` or `/Height` is
    /// [`PdfError::NotAnImage`].
    pub fn from_stream(stream: &PDFStream, doc: &PDFDocument) -> Result<Self> {
        let color_space = stream
            .get_any(&["ColorSpace", "CS"])
            .map(|cs| ColorSpace::from_object(cs, doc));
        Self::build(stream, doc, color_space, false)
    }

    /// Build from an inline image whose dictionary keys are already expanded.
    ///
    /// A colour space given by resource name is looked up in the scope's
    /// `/ColorSpace` dictionary.
    pub fn from_inline(
        stream: &PDFStream,
        doc: &PDFDocument,
        scope: &ResourceScope,
    ) -> Result<Self> {
        let color_space = stream.get("ColorSpace").map(|cs| match cs {
            PDFObject::Name(name) => match ColorSpace::from_name(name) {
                ColorSpace::Unknown(_) => scope
                    .lookup(doc, "ColorSpace", name)
                    .map_or_else(|| ColorSpace::Unknown(name.clone()), |obj| {
                        ColorSpace::from_object(&obj, doc)
                    }),
                known => known,
            },
            other => ColorSpace::from_object(other, doc),
        });
        Self::build(stream, doc, color_space, true)
    }

    fn build(
        stream: &PDFStream,
        doc: &PDFDocument,
        color_space: Option<ColorSpace>,
        inline: bool,
    ) -> Result<Self> {
        let dimension = |key: &str| -> Result<u32> {
            stream
                .get(key)
                .and_then(|v| doc.resolve(v).ok())
                .and_then(|v| v.as_int().ok())
                .and_then(|v| u32::try_from(v).ok())
                .filter(|&v| v > 0)
                .ok_or_else(|| PdfError::NotAnImage(format!("missing or invalid /{key}")))
        };
        let width = dimension("Width")?;
        let height = dimension("Height")?;

        let image_mask = stream
            .get("ImageMask")
            .and_then(|v| v.as_bool().ok())
            .unwrap_or(false);
        let filters = FilterChain::from_stream(stream, doc)?;
        let bits_per_component = if image_mask {
            Some(1)
        } else {
            stream
                .get("BitsPerComponent")
                .and_then(|v| doc.resolve(v).ok())
                .and_then(|v| v.as_int().ok())
                .and_then(|v| u32::try_from(v).ok())
        };

        Ok(Self {
            objid: stream.objid,
            width,
            height,
            bits_per_component,
            color_space: if image_mask { None } else { color_space },
            filters,
            has_soft_mask: stream.get("SMask").is_some(),
            image_mask,
            inline,
            raw: stream.rawdata_bytes(),
        })
    }

    /// Undecoded payload.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Storable type the payload will have after extraction.
    pub fn native_type(&self) -> NativeType {
        self.filters.native_type()
    }

    /// Size in bytes of the unfiltered sample data, when computable.
    pub fn expected_raw_len(&self) -> Option<usize> {
        let bpc = self.bits_per_component? as usize;
        let components = if self.image_mask {
            1
        } else {
            self.color_space.as_ref()?.components()?
        };
        let row_bits = (self.width as usize)
            .checked_mul(components)?
            .checked_mul(bpc)?;
        row_bits.div_ceil(8).checked_mul(self.height as usize)
    }
}

/// An image payload in its storable form.
#[derive(Debug, Clone)]
pub struct ExtractedImage {
    pub native: NativeType,
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub bits_per_component: Option<u32>,
    pub color_space: Option<ColorSpace>,
    pub has_soft_mask: bool,
    pub image_mask: bool,
    /// Native codec parameters (CCITT `K`/`Columns`, JBIG2 globals)
    pub codec_params: Option<PDFDict>,
}

impl ExtractedImage {
    pub const fn extension(&self) -> &'static str {
        self.native.extension()
    }
}

/// Look up `/XObject/<name>` in `scope`, innermost layer first.
pub fn resolve(doc: &PDFDocument, name: &str, scope: &ResourceScope) -> Result<XObject> {
    let entry = scope
        .lookup(doc, "XObject", name)
        .ok_or_else(|| PdfError::KeyError(format!("XObject /{name}")))?;
    let obj = doc.resolve_shared(&entry)?;
    let PDFObject::Stream(stream) = obj.as_ref() else {
        return Ok(XObject::Unknown { subtype: None });
    };
    match stream.name_attr("Subtype") {
        Some("Image") => ImageObject::from_stream(stream, doc).map(XObject::Image),
        Some("Form") => Ok(XObject::Form(FormXObject::from_stream(stream, doc))),
        other => Ok(XObject::Unknown {
            subtype: other.map(str::to_string),
        }),
    }
}

/// Like [`resolve`], but only images are accepted.
pub fn resolve_image(doc: &PDFDocument, name: &str, scope: &ResourceScope) -> Result<ImageObject> {
    match resolve(doc, name, scope)? {
        XObject::Image(image) => Ok(image),
        XObject::Form(_) => Err(PdfError::NotAnImage(format!("/{name} is a form"))),
        XObject::Unknown { .. } => Err(PdfError::NotAnImage(format!("/{name}"))),
    }
}

/// Produce the storable bytes of `image`.
///
/// Native codec payloads pass through after any preceding filters. Raw
/// sample data shorter than its dimensions require is
/// [`PdfError::CorruptStream`].
pub fn extract(image: &ImageObject, limits: &DecodeLimits) -> Result<ExtractedImage> {
    let expected = image.expected_raw_len();
    let mut limits = *limits;
    if image.native_type() == NativeType::Raw
        && let Some(expected) = expected
    {
        let bound = expected.saturating_mul(2).saturating_add(RAW_SIZE_SLACK);
        limits.max_decoded_bytes = limits.max_decoded_bytes.min(bound);
    }

    let decoded = filter::decode(image.raw(), &image.filters, &limits)?;

    if decoded.native == NativeType::Raw
        && let Some(expected) = expected
        && decoded.data.len() < expected
    {
        return Err(PdfError::CorruptStream(format!(
            "image data truncated: {} of {expected} bytes",
            decoded.data.len()
        )));
    }

    Ok(ExtractedImage {
        native: decoded.native,
        data: decoded.data,
        width: image.width,
        height: image.height,
        bits_per_component: image.bits_per_component,
        color_space: image.color_space.clone(),
        has_soft_mask: image.has_soft_mask,
        image_mask: image.image_mask,
        codec_params: decoded.codec_params,
    })
}
