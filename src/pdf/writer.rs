//! PDF export via lopdf
//!
//! Two export paths:
//! - `stamp_pdf_page`: draws the stamp directly onto an existing PDF page
//!   as an image XObject, keeping the page vector content intact.
//! - `raster_to_pdf`: wraps an already-composited raster as a single-page
//!   PDF for the raster export path.

use crate::error::{Error, Result};
use crate::stamp::{BlendMode, PlacementResult};
use image::RgbaImage;
use lopdf::{dictionary, Document, Object, Stream};

/// XObject and ExtGState names injected into stamped page resources.
const STAMP_XOBJECT_NAME: &str = "ImStamp";
const STAMP_GSTATE_NAME: &str = "GSstamp";

/// Load a PDF for writing. Encrypted documents are rejected up front:
/// lopdf does not decrypt, and appending content to encrypted streams
/// would corrupt the file.
fn load_pdf(pdf_bytes: &[u8]) -> Result<Document> {
    let doc = Document::load_mem(pdf_bytes).map_err(|e| Error::InvalidPdf {
        reason: format!("{}", e),
    })?;
    if doc.trailer.get(b"Encrypt").is_ok() {
        return Err(Error::PasswordRequired);
    }
    Ok(doc)
}

/// Page count via lopdf, without PDFium.
pub fn page_count_from_bytes(pdf_bytes: &[u8]) -> Result<u32> {
    Ok(load_pdf(pdf_bytes)?.get_pages().len() as u32)
}

fn blend_mode_pdf_name(mode: BlendMode) -> &'static str {
    match mode {
        BlendMode::Normal => "Normal",
        BlendMode::Multiply => "Multiply",
        BlendMode::Screen => "Screen",
        BlendMode::Overlay => "Overlay",
        BlendMode::Darken => "Darken",
        BlendMode::Lighten => "Lighten",
    }
}

/// Split an RGBA raster into an RGB image stream and a DeviceGray SMask
/// stream carrying the alpha channel.
fn image_xobjects(doc: &mut Document, raster: &RgbaImage) -> Result<lopdf::ObjectId> {
    let (w, h) = raster.dimensions();
    if w == 0 || h == 0 {
        return Err(Error::InvalidRaster {
            reason: format!("raster is {}x{}", w, h),
        });
    }

    let mut rgb = Vec::with_capacity((w * h * 3) as usize);
    let mut alpha = Vec::with_capacity((w * h) as usize);
    for pixel in raster.pixels() {
        rgb.push(pixel[0]);
        rgb.push(pixel[1]);
        rgb.push(pixel[2]);
        alpha.push(pixel[3]);
    }

    let smask_stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => w as i64,
            "Height" => h as i64,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        alpha,
    );
    let smask_id = doc.add_object(smask_stream);

    let image_stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => w as i64,
            "Height" => h as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "SMask" => smask_id,
        },
        rgb,
    );
    Ok(doc.add_object(image_stream))
}

fn ensure_named_dict<'a>(
    res_dict: &'a mut lopdf::Dictionary,
    name: &str,
) -> Result<&'a mut lopdf::Dictionary> {
    let owned = res_dict
        .remove(name.as_bytes())
        .unwrap_or_else(|| Object::Dictionary(dictionary! {}));

    let sanitized = match owned {
        Object::Dictionary(dict) => Object::Dictionary(dict),
        Object::Reference(_) => Object::Dictionary(dictionary! {}),
        _ => {
            return Err(Error::PdfWrite {
                reason: format!("page resources entry {} is not a dictionary", name),
            })
        }
    };

    res_dict.set(name, sanitized);
    match res_dict.get_mut(name.as_bytes()) {
        Ok(Object::Dictionary(ref mut dict)) => Ok(dict),
        _ => Err(Error::PdfWrite {
            reason: format!("page resources entry {} is not a dictionary", name),
        }),
    }
}

/// Inject the stamp XObject and graphics state into the page resources,
/// resolving an indirect Resources reference if present.
fn inject_resources(
    doc: &mut Document,
    page_id: lopdf::ObjectId,
    image_id: lopdf::ObjectId,
    gstate_id: lopdf::ObjectId,
) -> Result<()> {
    let mut resources_obj = {
        let page_dict = doc
            .get_object_mut(page_id)
            .and_then(|o| o.as_dict_mut())
            .map_err(|_| Error::PdfWrite {
                reason: "page object is not a dictionary".to_string(),
            })?;
        page_dict
            .remove(b"Resources")
            .unwrap_or_else(|| Object::Dictionary(dictionary! {}))
    };

    match &mut resources_obj {
        Object::Reference(id) => {
            let res_dict = doc
                .get_object_mut(*id)
                .and_then(|o| o.as_dict_mut())
                .map_err(|_| Error::PdfWrite {
                    reason: "page resources reference is not a dictionary".to_string(),
                })?;
            ensure_named_dict(res_dict, "XObject")?.set(STAMP_XOBJECT_NAME, image_id);
            ensure_named_dict(res_dict, "ExtGState")?.set(STAMP_GSTATE_NAME, gstate_id);
        }
        Object::Dictionary(ref mut dict) => {
            ensure_named_dict(dict, "XObject")?.set(STAMP_XOBJECT_NAME, image_id);
            ensure_named_dict(dict, "ExtGState")?.set(STAMP_GSTATE_NAME, gstate_id);
        }
        _ => {
            return Err(Error::PdfWrite {
                reason: "page resources is neither a dictionary nor a reference".to_string(),
            })
        }
    }

    let page_dict = doc
        .get_object_mut(page_id)
        .and_then(|o| o.as_dict_mut())
        .map_err(|_| Error::PdfWrite {
            reason: "page object is not a dictionary".to_string(),
        })?;
    page_dict.set("Resources", resources_obj);
    Ok(())
}

/// Draw the stamp onto one page of an existing PDF.
///
/// `placement` must be computed for a bottom-left-origin canvas
/// (`CanvasSpec::pdf_page`): its `(x, y)` translates directly into the
/// image draw transform. The page is 1-indexed; out-of-range pages clamp
/// to the last page. Opacity (0 invisible, 100 opaque) and blend mode are
/// applied through an ExtGState, leaving the stamp's own alpha in the
/// SMask. Encrypted documents are rejected with `PasswordRequired`.
pub fn stamp_pdf_page(
    pdf_bytes: &[u8],
    stamp: &RgbaImage,
    page: u32,
    placement: &PlacementResult,
    opacity_percent: f32,
    blend_mode: BlendMode,
) -> Result<Vec<u8>> {
    let mut doc = load_pdf(pdf_bytes)?;

    let pages = doc.get_pages();
    let page_count = pages.len() as u32;
    if page_count == 0 {
        return Err(Error::InvalidPdf {
            reason: "PDF has no pages".to_string(),
        });
    }
    let target = page.clamp(1, page_count);
    let page_id = *pages.get(&target).ok_or_else(|| Error::PdfWrite {
        reason: format!("page {} missing from page tree", target),
    })?;

    let image_id = image_xobjects(&mut doc, stamp)?;

    let opacity = opacity_percent.clamp(0.0, 100.0) / 100.0;
    let gstate = dictionary! {
        "Type" => "ExtGState",
        "ca" => Object::Real(opacity),
        "CA" => Object::Real(opacity),
        "BM" => blend_mode_pdf_name(blend_mode),
    };
    let gstate_id = doc.add_object(gstate);

    inject_resources(&mut doc, page_id, image_id, gstate_id)?;

    let content = format!(
        "q /{} gs {} 0 0 {} {} {} cm /{} Do Q",
        STAMP_GSTATE_NAME,
        placement.width,
        placement.height,
        placement.x,
        placement.y,
        STAMP_XOBJECT_NAME
    );
    doc.add_page_contents(page_id, content.into_bytes())
        .map_err(|e| Error::PdfWrite {
            reason: format!("failed to append stamp content: {}", e),
        })?;

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(|e| Error::PdfWrite {
        reason: format!("{}", e),
    })?;
    Ok(out)
}

/// Wrap a composited raster as a single-page PDF.
///
/// The page is sized 1 point per pixel, so the raster fills the page
/// exactly without resampling.
pub fn raster_to_pdf(page: &RgbaImage) -> Result<Vec<u8>> {
    let (w, h) = page.dimensions();
    if w == 0 || h == 0 {
        return Err(Error::InvalidRaster {
            reason: format!("page raster is {}x{}", w, h),
        });
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let image_id = image_xobjects(&mut doc, page)?;

    let content = format!("q {} 0 0 {} 0 0 cm /Im0 Do Q", w, h);
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), (w as i64).into(), (h as i64).into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(|e| Error::PdfWrite {
        reason: format!("{}", e),
    })?;
    Ok(out)
}

/// Read page dimensions in points from a PDF without PDFium, walking up
/// to the parent for an inherited MediaBox.
pub fn page_size_from_bytes(pdf_bytes: &[u8], page: u32) -> Result<(f32, f32)> {
    let doc = load_pdf(pdf_bytes)?;
    let pages = doc.get_pages();
    let page_count = pages.len() as u32;
    if page_count == 0 {
        return Err(Error::InvalidPdf {
            reason: "PDF has no pages".to_string(),
        });
    }
    let target = page.clamp(1, page_count);
    let page_id = *pages.get(&target).ok_or_else(|| Error::PdfWrite {
        reason: format!("page {} missing from page tree", target),
    })?;

    let mut current = Some(page_id);
    while let Some(id) = current {
        let dict = doc
            .get_object(id)
            .and_then(|o| o.as_dict())
            .map_err(|_| Error::PdfWrite {
                reason: "page object is not a dictionary".to_string(),
            })?;
        if let Some((w, h)) = extract_media_box(&doc, dict) {
            return Ok((w, h));
        }
        current = dict.get(b"Parent").and_then(|p| p.as_reference()).ok();
    }

    Err(Error::PdfWrite {
        reason: format!("page {} has no MediaBox", target),
    })
}

fn extract_media_box(doc: &Document, dict: &lopdf::Dictionary) -> Option<(f32, f32)> {
    let raw = dict.get(b"MediaBox").ok()?;
    let resolved = match raw {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let arr = resolved.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let llx = obj_to_f32(&arr[0])?;
    let lly = obj_to_f32(&arr[1])?;
    let urx = obj_to_f32(&arr[2])?;
    let ury = obj_to_f32(&arr[3])?;
    Some((urx - llx, ury - lly))
}

fn obj_to_f32(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(f) => Some(*f),
        _ => None,
    }
}
