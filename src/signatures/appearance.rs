//! Signer description shown by the signature widget.
//!
//! The widget is placed with a zero rectangle, so viewers list the
//! signature without drawing it on the page; the appearance stream still
//! carries the signer block for viewers that render it in the signature
//! panel.
//!
//! PDF Spec: ISO 32000-1:2008, Section 12.5.5 (Appearance Streams)

use super::chain::SignerIdentity;
use super::types::SignatureAppearance;
use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};
use crate::writer::ObjectSerializer;
use chrono::{DateTime, Utc};

/// Font size of the signer block.
const FONT_SIZE: f64 = 6.0;
/// Line spacing of the signer block.
const LEADING: f64 = 7.5;
/// Horizontal padding.
const MARGIN: f64 = 2.0;

/// Color space of an embedded JPEG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    /// One component per pixel
    DeviceGray,
    /// Three components per pixel
    DeviceRGB,
    /// Four components per pixel
    DeviceCMYK,
}

impl ColorSpace {
    fn from_components(components: u8) -> Option<Self> {
        match components {
            1 => Some(ColorSpace::DeviceGray),
            3 => Some(ColorSpace::DeviceRGB),
            4 => Some(ColorSpace::DeviceCMYK),
            _ => None,
        }
    }

    /// PDF name of the color space.
    pub fn pdf_name(&self) -> &'static str {
        match self {
            ColorSpace::DeviceGray => "DeviceGray",
            ColorSpace::DeviceRGB => "DeviceRGB",
            ColorSpace::DeviceCMYK => "DeviceCMYK",
        }
    }
}

/// Logo drawn to the left of the signer description.
///
/// JPEG data is embedded as-is with the DCTDecode filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureGraphic {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Color space read from the frame header
    pub color_space: ColorSpace,
    /// Encoded JPEG bytes
    pub data: Vec<u8>,
}

impl SignatureGraphic {
    /// Read dimensions and color space from a JPEG's frame header.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when `data` is not a baseline or progressive JPEG.
    pub fn from_jpeg(data: Vec<u8>) -> Result<Self> {
        let (width, height, color_space) = parse_jpeg_header(&data)?;
        if width == 0 || height == 0 {
            return Err(Error::Config("JPEG logo has no pixels".to_string()));
        }
        Ok(Self {
            width,
            height,
            color_space,
            data,
        })
    }

    /// The Image XObject embedding this graphic.
    pub fn to_xobject(&self) -> Object {
        let mut dict = Dict::new();
        dict.insert("Type".to_string(), Object::name("XObject"));
        dict.insert("Subtype".to_string(), Object::name("Image"));
        dict.insert("Width".to_string(), Object::Integer(i64::from(self.width)));
        dict.insert("Height".to_string(), Object::Integer(i64::from(self.height)));
        dict.insert("ColorSpace".to_string(), Object::name(self.color_space.pdf_name()));
        dict.insert("BitsPerComponent".to_string(), Object::Integer(8));
        dict.insert("Filter".to_string(), Object::name("DCTDecode"));
        if self.color_space == ColorSpace::DeviceCMYK {
            // Adobe writes inverted CMYK JPEGs
            dict.insert(
                "Decode".to_string(),
                Object::Array([1, 0, 1, 0, 1, 0, 1, 0].iter().map(|&v| Object::Integer(v)).collect()),
            );
        }
        Object::Stream {
            dict,
            data: bytes::Bytes::from(self.data.clone()),
        }
    }
}

/// Scan the JPEG markers up to the first start-of-frame segment.
fn parse_jpeg_header(data: &[u8]) -> Result<(u32, u32, ColorSpace)> {
    if !data.starts_with(&[0xFF, 0xD8]) {
        return Err(Error::Config("logo is not a JPEG image".to_string()));
    }

    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        let marker = data[pos + 1];
        pos += 2;

        if marker == 0xFF || marker == 0x00 || (0xD0..=0xD7).contains(&marker) {
            continue;
        }

        let is_frame = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_frame {
            let header = data
                .get(pos..pos + 8)
                .ok_or_else(|| Error::Config("truncated JPEG frame header".to_string()))?;
            let height = u32::from(u16::from_be_bytes([header[3], header[4]]));
            let width = u32::from(u16::from_be_bytes([header[5], header[6]]));
            let color_space = ColorSpace::from_components(header[7])
                .ok_or_else(|| Error::Config(format!("JPEG with {} components", header[7])))?;
            return Ok((width, height, color_space));
        }

        let Some(length) = data.get(pos..pos + 2) else {
            break;
        };
        pos += usize::from(u16::from_be_bytes([length[0], length[1]]));
    }

    Err(Error::Config("no JPEG frame header found".to_string()))
}

/// Lines describing the signer, in display order.
pub fn description_lines(
    identity: &SignerIdentity,
    appearance: &SignatureAppearance,
    signing_time: DateTime<Utc>,
) -> Vec<String> {
    let mut lines = vec![
        format!("Signed by {}", identity.display_name()),
        format!("ID: {}", identity.serial_number.as_deref().unwrap_or("")),
        format!("Date: {}", signing_time.format("%Y.%m.%d %H:%M:%S")),
    ];
    if !appearance.location.is_empty() {
        lines.push(format!("Location: {}", appearance.location));
    }
    if !appearance.reason.is_empty() {
        lines.push(format!("Reason: {}", appearance.reason));
    }
    lines
}

/// Build the Form XObject holding the signer block.
///
/// With a graphic, the image named `/Im1` (written at `graphic.0`) is
/// scaled to the block height and the text starts to its right.
pub fn signer_block(lines: &[String], graphic: Option<(ObjectRef, &SignatureGraphic)>) -> Object {
    let widest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) as f64;
    let text_width = widest * FONT_SIZE * 0.5 + 2.0 * MARGIN;
    let height = (lines.len() as f64 * LEADING + 2.0 * MARGIN).ceil();

    let image_width = graphic.map_or(0.0, |(_, g)| {
        let inner = height - 2.0 * MARGIN;
        (inner * f64::from(g.width) / f64::from(g.height) + MARGIN).ceil()
    });
    let width = (image_width + text_width).ceil();

    let mut content = Vec::new();
    if graphic.is_some() {
        let inner = height - 2.0 * MARGIN;
        content.extend_from_slice(
            format!(
                "q\n{} 0 0 {} {} {} cm\n/Im1 Do\nQ\n",
                image_width - MARGIN,
                inner,
                MARGIN,
                MARGIN
            )
            .as_bytes(),
        );
    }
    content.extend_from_slice(
        format!(
            "BT\n/F1 {} Tf\n{} TL\n{} {} Td\n",
            FONT_SIZE,
            LEADING,
            image_width + MARGIN,
            height - MARGIN - FONT_SIZE
        )
        .as_bytes(),
    );
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            content.extend_from_slice(b"T*\n");
        }
        content.push(b'(');
        content.extend_from_slice(&escape_latin1(line));
        content.extend_from_slice(b") Tj\n");
    }
    content.extend_from_slice(b"ET");

    let font = ObjectSerializer::dict(vec![
        ("Type", Object::name("Font")),
        ("Subtype", Object::name("Type1")),
        ("BaseFont", Object::name("Helvetica")),
        ("Encoding", Object::name("WinAnsiEncoding")),
    ]);
    let mut fonts = Dict::new();
    fonts.insert("F1".to_string(), font);
    let mut resources = Dict::new();
    resources.insert("Font".to_string(), Object::Dictionary(fonts));
    if let Some((image_ref, _)) = graphic {
        let mut images = Dict::new();
        images.insert("Im1".to_string(), Object::Reference(image_ref));
        resources.insert("XObject".to_string(), Object::Dictionary(images));
    }

    let mut dict = Dict::new();
    dict.insert("Type".to_string(), Object::name("XObject"));
    dict.insert("Subtype".to_string(), Object::name("Form"));
    dict.insert("FormType".to_string(), Object::Integer(1));
    dict.insert("BBox".to_string(), ObjectSerializer::rect(0.0, 0.0, width, height));
    dict.insert("Resources".to_string(), Object::Dictionary(resources));

    Object::Stream {
        dict,
        data: bytes::Bytes::from(content),
    }
}

/// Encode text for a literal string shown with a WinAnsi font.
///
/// Characters outside Latin-1 become `?`.
fn escape_latin1(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        let byte = u8::try_from(u32::from(c)).unwrap_or(b'?');
        match byte {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(byte);
            },
            b'\n' | b'\r' => out.push(b' '),
            _ => out.push(byte),
        }
    }
    out
}
