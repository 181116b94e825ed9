#![allow(dead_code)]

use anyhow::{Result, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use lopdf::{Dictionary, Document, Object, Stream, dictionary};
use pdfmill::{
    config::{Config, Layout},
    engine::{ConvertIn, ConvertOut, DocDiag, Engine, GpuReport, ImagePayload, PrepareOut, SmokeTest},
};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn image_stream() -> Stream {
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 2,
            "Height" => 2,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8
        },
        vec![0u8; 12],
    )
}

fn finish(mut doc: Document, pages_id: lopdf::ObjectId, kids: Vec<Object>, pages_extra: Dictionary, path: &Path) {
    let mut pages = dictionary! {
        "Type" => "Pages",
        "Count" => kids.len() as i64,
        "Kids" => kids,
        "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(595), Object::Integer(842)]
    };
    for (k, v) in pages_extra.iter() {
        pages.set(k.clone(), v.clone());
    }
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id
    });
    doc.trailer.set("Root", catalog_id);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    doc.save(path).unwrap();
}

fn blank_content(doc: &mut Document) -> lopdf::ObjectId {
    doc.add_object(Stream::new(dictionary! {}, b"q Q".to_vec()))
}

/// A PDF whose page `i` carries `images_per_page[i]` distinct image XObjects.
pub fn write_pdf(path: &Path, images_per_page: &[usize]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::new();
    for &n in images_per_page {
        let mut xobjects = Dictionary::new();
        for i in 0..n {
            let id = doc.add_object(image_stream());
            xobjects.set(format!("Im{i}"), id);
        }
        let content_id = blank_content(&mut doc);
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! { "XObject" => xobjects }
        });
        kids.push(page_id.into());
    }
    finish(doc, pages_id, kids, Dictionary::new(), path);
}

/// One page whose only XObject is a form that itself draws one image.
pub fn write_pdf_with_form(path: &Path) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let img_id = doc.add_object(image_stream());
    let form_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(100), Object::Integer(50)],
            "Resources" => dictionary! { "XObject" => dictionary! { "Im0" => img_id } }
        },
        b"q /Im0 Do Q".to_vec(),
    ));
    let content_id = blank_content(&mut doc);
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! { "XObject" => dictionary! { "Fm0" => form_id } }
    });
    finish(doc, pages_id, vec![page_id.into()], Dictionary::new(), path);
}

/// Two pages without their own resources, sharing one image through the page tree.
pub fn write_pdf_inherited(path: &Path) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let img_id = doc.add_object(image_stream());
    let mut kids: Vec<Object> = Vec::new();
    for _ in 0..2 {
        let content_id = blank_content(&mut doc);
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id
        });
        kids.push(page_id.into());
    }
    let extra = dictionary! {
        "Resources" => dictionary! { "XObject" => dictionary! { "Im0" => img_id } }
    };
    finish(doc, pages_id, kids, extra, path);
}

pub fn bytes_payload(tag: &[u8]) -> ImagePayload {
    ImagePayload::Bytes {
        data: STANDARD.encode(tag),
    }
}

/// Scripted stand-in for the Python collaborators.
pub struct FakeEngine {
    pub markdown: String,
    pub images: BTreeMap<String, ImagePayload>,
    pub models_ok: bool,
    /// Inputs whose file name contains this string fail to convert.
    pub fail_on: Option<String>,
    /// Inputs whose file name contains this string get an `ok = false` reply.
    pub reject_on: Option<String>,
    pub calls: RefCell<Vec<ConvertIn>>,
}

impl FakeEngine {
    pub fn with_images(names: &[&str]) -> Self {
        let images = names
            .iter()
            .map(|n| (n.to_string(), bytes_payload(n.as_bytes())))
            .collect();
        Self {
            markdown: "# converted\n".to_string(),
            images,
            models_ok: true,
            fail_on: None,
            reject_on: None,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl Engine for FakeEngine {
    fn doctor(&self) -> Result<DocDiag> {
        Ok(DocDiag {
            python_exe: "fake".into(),
            python_version: "0".into(),
            marker_version: None,
            torch_version: None,
            ok: true,
            error: None,
        })
    }

    fn gpu_report(&self) -> Result<GpuReport> {
        Ok(GpuReport {
            torch_version: "0".into(),
            cuda_available: false,
            cuda_version: None,
            device_count: 0,
            current_device: None,
            device_name: None,
            tensor_test: SmokeTest { ok: true, error: None },
            gpu_test: None,
        })
    }

    fn prepare_models(&self) -> Result<PrepareOut> {
        Ok(PrepareOut {
            ok: self.models_ok,
            model_cache_dir: None,
            error: (!self.models_ok).then(|| "no network".to_string()),
        })
    }

    fn convert(&self, req: &ConvertIn) -> Result<ConvertOut> {
        self.calls.borrow_mut().push(req.clone());
        if let Some(pat) = &self.fail_on {
            if req.input_pdf.contains(pat.as_str()) {
                return Err(anyhow!("converter crashed"));
            }
        }
        if let Some(pat) = &self.reject_on {
            if req.input_pdf.contains(pat.as_str()) {
                return Ok(ConvertOut {
                    ok: false,
                    markdown: String::new(),
                    meta: serde_json::Value::Null,
                    images: BTreeMap::new(),
                    error: Some("marker refused the document".to_string()),
                });
            }
        }
        Ok(ConvertOut {
            ok: true,
            markdown: self.markdown.clone(),
            meta: serde_json::Value::Null,
            images: if req.extract_images {
                self.images.clone()
            } else {
                BTreeMap::new()
            },
            error: None,
        })
    }
}

/// Scratch project root with `pdf/input` created.
pub struct Project {
    pub tmp: TempDir,
    pub cfg: Config,
    pub layout: Layout,
}

impl Project {
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = Config::default();
        cfg.logging.write_to_file = false;
        let layout = cfg.layout(Some(tmp.path())).unwrap();
        std::fs::create_dir_all(&layout.input).unwrap();
        Self { tmp, cfg, layout }
    }

    pub fn input(&self, rel: &str) -> PathBuf {
        self.layout.input.join(rel)
    }

    pub fn output(&self, rel: &str) -> PathBuf {
        self.layout.output.join(rel)
    }
}

pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|rd| {
            rd.filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
