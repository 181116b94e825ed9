//! Embedded-image census over PDF page resources.
//!
//! Raster images are `XObject`s with `/Subtype /Image`; form `XObject`s
//! (`/Subtype /Form`) are reported as vector content and searched for nested
//! images. Each object is reported once per page.

use anyhow::{Context, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

const MAX_FORM_DEPTH: usize = 8;
const MAX_PARENT_HOPS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    Raster,
    Vector,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInfo {
    pub object: u32,
    pub generation: u16,
    pub kind: ImageKind,
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageImages {
    pub page: u32,
    pub images: Vec<ImageInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfInspection {
    pub path: String,
    pub page_count: u32,
    /// Pages with at least one image, in page order.
    pub pages: Vec<PageImages>,
    pub raster_images: usize,
    pub vector_images: usize,
}

pub fn inspect_pdf(path: &Path) -> Result<PdfInspection> {
    let doc = Document::load(path).with_context(|| format!("open pdf: {}", path.display()))?;
    Ok(inspect_document(&doc, path))
}

/// Number of raster images a converter is expected to extract from `path`.
pub fn count_images(path: &Path) -> Result<usize> {
    Ok(inspect_pdf(path)?.raster_images)
}

pub fn inspect_document(doc: &Document, path: &Path) -> PdfInspection {
    let pages = doc.get_pages();
    let page_count = pages.len() as u32;

    let mut out = Vec::new();
    let mut raster_images = 0;
    let mut vector_images = 0;
    for (page, page_id) in pages {
        let mut images = Vec::new();
        if let Some(resources) = page_resources(doc, page_id) {
            let mut seen = BTreeSet::new();
            collect_xobjects(doc, resources, &mut seen, &mut images, 0);
        }
        if images.is_empty() {
            continue;
        }
        for img in &images {
            match img.kind {
                ImageKind::Raster => raster_images += 1,
                ImageKind::Vector => vector_images += 1,
            }
        }
        out.push(PageImages { page, images });
    }

    PdfInspection {
        path: path.display().to_string(),
        page_count,
        pages: out,
        raster_images,
        vector_images,
    }
}

/// Page `/Resources`, following `/Parent` for inherited entries.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok();
    let mut hops = 0;
    while let Some(dict) = node {
        if let Ok(res) = dict.get(b"Resources") {
            return resolve_dict(doc, res);
        }
        hops += 1;
        if hops > MAX_PARENT_HOPS {
            break;
        }
        node = dict
            .get(b"Parent")
            .ok()
            .and_then(|p| p.as_reference().ok())
            .and_then(|id| doc.get_dictionary(id).ok());
    }
    None
}

fn collect_xobjects(
    doc: &Document,
    resources: &Dictionary,
    seen: &mut BTreeSet<ObjectId>,
    out: &mut Vec<ImageInfo>,
    depth: usize,
) {
    let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|o| resolve_dict(doc, o))
    else {
        return;
    };

    for (_name, obj) in xobjects.iter() {
        let Ok(id) = obj.as_reference() else {
            continue;
        };
        if !seen.insert(id) {
            continue;
        }
        let Ok(Object::Stream(stream)) = doc.get_object(id) else {
            continue;
        };
        let subtype = match stream.dict.get(b"Subtype").and_then(|s| s.as_name()) {
            Ok(name) => name,
            Err(_) => continue,
        };
        match subtype {
            b"Image" => out.push(raster_info(id, stream)),
            b"Form" => {
                out.push(vector_info(id, stream));
                if depth < MAX_FORM_DEPTH {
                    let nested = stream
                        .dict
                        .get(b"Resources")
                        .ok()
                        .and_then(|o| resolve_dict(doc, o));
                    if let Some(nested) = nested {
                        collect_xobjects(doc, nested, seen, out, depth + 1);
                    }
                }
            }
            _ => {}
        }
    }
}

fn raster_info(id: ObjectId, stream: &Stream) -> ImageInfo {
    let dim = |key: &[u8]| {
        stream
            .dict
            .get(key)
            .and_then(|o| o.as_i64())
            .map(|v| v.max(0) as u32)
            .unwrap_or(0)
    };
    ImageInfo {
        object: id.0,
        generation: id.1,
        kind: ImageKind::Raster,
        format: image_format(&stream.dict).to_string(),
        width: dim(b"Width"),
        height: dim(b"Height"),
        bytes: stream.content.len(),
    }
}

fn vector_info(id: ObjectId, stream: &Stream) -> ImageInfo {
    let (width, height) = stream
        .dict
        .get(b"BBox")
        .and_then(|o| o.as_array())
        .ok()
        .and_then(|bbox| {
            let v: Vec<f64> = bbox.iter().filter_map(number).collect();
            (v.len() == 4).then(|| ((v[2] - v[0]).abs() as u32, (v[3] - v[1]).abs() as u32))
        })
        .unwrap_or((0, 0));
    ImageInfo {
        object: id.0,
        generation: id.1,
        kind: ImageKind::Vector,
        format: "form".to_string(),
        width,
        height,
        bytes: stream.content.len(),
    }
}

/// Format implied by the last stream filter, as an extractor would name it.
fn image_format(dict: &Dictionary) -> &'static str {
    let last = match dict.get(b"Filter") {
        Ok(Object::Name(n)) => Some(n.as_slice()),
        Ok(Object::Array(a)) => a.last().and_then(|o| o.as_name().ok()),
        _ => None,
    };
    match last {
        Some(b"DCTDecode") => "jpeg",
        Some(b"JPXDecode") => "jpx",
        Some(b"JBIG2Decode") => "jbig2",
        Some(b"CCITTFaxDecode") => "tiff",
        _ => "png",
    }
}

fn number(o: &Object) -> Option<f64> {
    match o {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    resolve(doc, obj)?.as_dict().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn format_follows_last_filter() {
        let d = dictionary! { "Filter" => "DCTDecode" };
        assert_eq!(image_format(&d), "jpeg");
        let d = dictionary! {
            "Filter" => vec![Object::Name(b"FlateDecode".to_vec()), Object::Name(b"JPXDecode".to_vec())]
        };
        assert_eq!(image_format(&d), "jpx");
        assert_eq!(image_format(&Dictionary::new()), "png");
    }
}
