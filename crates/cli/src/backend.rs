//! lopdf-backed collaborators: the page analyzer and the page writer.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};
use tracing::debug;

use pagesieve_core::analyzer::{PageAnalysis, PageAnalyzer, PageKind};
use pagesieve_core::error::{Result, SieveError};
use pagesieve_core::extract::DocumentWriter;

/// Pages with less extractable text than this are not considered text
/// pages.
const TEXT_THRESHOLD: usize = 10;

/// Page-tree attributes a page may inherit from its ancestors.
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Read-side backend for one loaded document.
pub struct LopdfAnalyzer {
    doc: Document,
    pages: BTreeMap<u32, ObjectId>,
}

impl LopdfAnalyzer {
    pub fn open(path: &Path) -> Result<Self> {
        let doc = Document::load(path).map_err(|e| {
            SieveError::evaluation(format!("cannot load {}: {e}", path.display()))
        })?;
        let pages = doc.get_pages();
        Ok(Self { doc, pages })
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    fn page_id(&self, page: usize) -> Result<ObjectId> {
        self.pages
            .get(&(page as u32))
            .copied()
            .ok_or_else(|| {
                SieveError::evaluation(format!(
                    "page {page} not available (document has {} pages)",
                    self.pages.len()
                ))
            })
    }

    /// Byte size of the page: its content streams plus first-level
    /// XObject streams.
    fn page_size(&self, page_id: ObjectId) -> u64 {
        let mut size: u64 = 0;
        for content_id in self.doc.get_page_contents(page_id) {
            if let Ok(Object::Stream(stream)) = self.doc.get_object(content_id) {
                size += stream.content.len() as u64;
            }
        }
        for xobject_id in self.xobject_ids(page_id) {
            if let Ok(Object::Stream(stream)) = self.doc.get_object(xobject_id) {
                size += stream.content.len() as u64;
            }
        }
        size
    }

    fn xobject_ids(&self, page_id: ObjectId) -> Vec<ObjectId> {
        let mut ids = Vec::new();
        let Some(resources) = self.resources_dict(page_id) else {
            return ids;
        };
        let xobjects = match resources.get(b"XObject") {
            Ok(value) => self.resolve_dict(value),
            Err(_) => None,
        };
        if let Some(xobjects) = xobjects {
            for (_, value) in xobjects.iter() {
                if let Ok(id) = value.as_reference() {
                    ids.push(id);
                }
            }
        }
        ids
    }

    /// The page's Resources dictionary, following inheritance and
    /// indirect references.
    fn resources_dict(&self, page_id: ObjectId) -> Option<&Dictionary> {
        let page_dict = self.doc.get_object(page_id).ok()?.as_dict().ok()?;
        if let Ok(value) = page_dict.get(b"Resources") {
            return self.resolve_dict(value);
        }
        let inherited = inherited_attr(&self.doc, page_id, b"Resources")?;
        match inherited {
            Object::Reference(id) => self.doc.get_object(id).ok()?.as_dict().ok(),
            _ => None,
        }
    }

    fn resolve_dict<'a>(&'a self, value: &'a Object) -> Option<&'a Dictionary> {
        match value {
            Object::Dictionary(dict) => Some(dict),
            Object::Reference(id) => self.doc.get_object(*id).ok()?.as_dict().ok(),
            _ => None,
        }
    }

    fn has_images(&self, page_id: ObjectId) -> bool {
        self.xobject_ids(page_id).iter().any(|&id| {
            matches!(
                self.doc.get_object(id),
                Ok(Object::Stream(stream))
                    if stream
                        .dict
                        .get(b"Subtype")
                        .and_then(Object::as_name)
                        .is_ok_and(|name| name == b"Image")
            )
        })
    }
}

impl PageAnalyzer for LopdfAnalyzer {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn analyze(&self, page: usize) -> Result<PageAnalysis> {
        let page_id = self.page_id(page)?;
        let text = self.doc.extract_text(&[page as u32]).unwrap_or_default();

        let has_text = text.trim().len() > TEXT_THRESHOLD;
        let has_images = self.has_images(page_id);
        let kind = match (has_text, has_images) {
            (true, true) => PageKind::Mixed,
            (true, false) => PageKind::Text,
            (false, true) => PageKind::Image,
            (false, false) => PageKind::Empty,
        };

        Ok(PageAnalysis {
            text,
            kind,
            size_bytes: self.page_size(page_id),
        })
    }
}

/// Write-side backend: copies selected pages of a source document into
/// fresh output documents.
pub struct LopdfWriter {
    doc: Document,
    pages: BTreeMap<u32, ObjectId>,
}

impl LopdfWriter {
    pub fn open(path: &Path) -> Result<Self> {
        let doc = Document::load(path).map_err(|e| {
            SieveError::evaluation(format!("cannot load {}: {e}", path.display()))
        })?;
        let pages = doc.get_pages();
        Ok(Self { doc, pages })
    }
}

impl DocumentWriter for LopdfWriter {
    fn write_pages(&self, pages: &[usize], dest: &Path) -> Result<u64> {
        let mut target = Document::with_version("1.5");
        let mut memo: HashMap<ObjectId, ObjectId> = HashMap::new();
        let mut kid_ids: Vec<ObjectId> = Vec::new();

        for &page in pages {
            let &page_id = self.pages.get(&(page as u32)).ok_or_else(|| {
                SieveError::range(format!(
                    "page {page} out of range (1-{})",
                    self.pages.len()
                ))
            })?;
            kid_ids.push(copy_page(&self.doc, page_id, &mut target, &mut memo)?);
        }

        let kids: Vec<Object> = kid_ids.iter().map(|&id| Object::Reference(id)).collect();
        let pages_id = target.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => kid_ids.len() as i64,
        });
        for &kid in &kid_ids {
            if let Ok(dict) = target
                .get_object_mut(kid)
                .and_then(Object::as_dict_mut)
            {
                dict.set("Parent", Object::Reference(pages_id));
            }
        }

        let catalog_id = target.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        target.trailer.set("Root", Object::Reference(catalog_id));
        target.compress();

        debug!(pages = pages.len(), dest = %dest.display(), "writing output document");
        target
            .save(dest)
            .map_err(|e| SieveError::io(dest, std::io::Error::other(e)))?;
        let bytes = std::fs::metadata(dest)
            .map(|m| m.len())
            .map_err(|e| SieveError::io(dest, e))?;
        Ok(bytes)
    }
}

/// Rewrite a document with compressed streams. Returns (before, after)
/// byte sizes.
pub fn optimize_document(input: &Path, dest: &Path) -> Result<(u64, u64)> {
    let before = std::fs::metadata(input)
        .map(|m| m.len())
        .map_err(|e| SieveError::io(input, e))?;
    let mut doc = Document::load(input).map_err(|e| {
        SieveError::evaluation(format!("cannot load {}: {e}", input.display()))
    })?;
    doc.compress();
    doc.save(dest)
        .map_err(|e| SieveError::io(dest, std::io::Error::other(e)))?;
    let after = std::fs::metadata(dest)
        .map(|m| m.len())
        .map_err(|e| SieveError::io(dest, e))?;
    Ok((before, after))
}

/// Copy one page dictionary into `target`, pulling in every object it
/// references. Shared resources are copied once per output document; the
/// page dict itself is always fresh so duplicated pages get their own
/// entry.
fn copy_page(
    src: &Document,
    page_id: ObjectId,
    target: &mut Document,
    memo: &mut HashMap<ObjectId, ObjectId>,
) -> Result<ObjectId> {
    let page_dict = src
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|e| SieveError::evaluation(format!("malformed page object: {e}")))?;

    let mut copied = Dictionary::new();
    for (key, value) in page_dict.iter() {
        // The parent link would drag in the whole source page tree; the
        // new tree sets its own.
        if key == b"Parent" {
            continue;
        }
        copied.set(key.clone(), copy_value(src, value, target, memo)?);
    }

    // Pull inherited page-tree attributes down onto the page itself.
    for key in INHERITABLE_KEYS {
        if !copied.has(key) {
            if let Some(value) = inherited_attr(src, page_id, key) {
                copied.set(key.to_vec(), copy_value(src, &value, target, memo)?);
            }
        }
    }

    Ok(target.add_object(Object::Dictionary(copied)))
}

fn copy_value(
    src: &Document,
    value: &Object,
    target: &mut Document,
    memo: &mut HashMap<ObjectId, ObjectId>,
) -> Result<Object> {
    Ok(match value {
        Object::Reference(id) => Object::Reference(copy_tree(src, *id, target, memo)?),
        Object::Array(items) => {
            let mut copied = Vec::with_capacity(items.len());
            for item in items {
                copied.push(copy_value(src, item, target, memo)?);
            }
            Object::Array(copied)
        }
        Object::Dictionary(dict) => {
            let mut copied = Dictionary::new();
            for (key, item) in dict.iter() {
                if key == b"Parent" {
                    continue;
                }
                copied.set(key.clone(), copy_value(src, item, target, memo)?);
            }
            Object::Dictionary(copied)
        }
        Object::Stream(stream) => {
            let mut copied_dict = Dictionary::new();
            for (key, item) in stream.dict.iter() {
                copied_dict.set(key.clone(), copy_value(src, item, target, memo)?);
            }
            let mut copied = stream.clone();
            copied.dict = copied_dict;
            Object::Stream(copied)
        }
        other => other.clone(),
    })
}

fn copy_tree(
    src: &Document,
    id: ObjectId,
    target: &mut Document,
    memo: &mut HashMap<ObjectId, ObjectId>,
) -> Result<ObjectId> {
    if let Some(&mapped) = memo.get(&id) {
        return Ok(mapped);
    }
    // Reserve the slot first so reference cycles terminate.
    let new_id = target.new_object_id();
    memo.insert(id, new_id);

    let value = src
        .get_object(id)
        .map_err(|e| SieveError::evaluation(format!("dangling object reference: {e}")))?
        .clone();
    let copied = copy_value(src, &value, target, memo)?;
    target.objects.insert(new_id, copied);
    Ok(new_id)
}

/// Look up an inheritable attribute on the page's ancestor chain.
fn inherited_attr(src: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = page_id;
    for _ in 0..32 {
        let dict = src.get_object(current).ok()?.as_dict().ok()?;
        if current != page_id {
            if let Ok(value) = dict.get(key) {
                return Some(value.clone());
            }
        }
        current = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
    None
}
