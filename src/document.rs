//! In-memory document model.
//!
//! A [`Document`] is the parsed handle the engine works on: pages with
//! their operator lists and resources, plus the document-level carriers
//! (metadata, outline, annotations, XMP packet, search index) held in a
//! [`Catalog`]. File-level parsing and writing happen outside this crate.
//!
//! # Example
//!
//! ```
//! use pdf_sanitizer::document::{Document, Page, Resources};
//! use pdf_sanitizer::fonts::Font;
//!
//! let resources = Resources::new().with_font("F1", Font::simple("Helvetica"));
//! let page = Page::from_content(b"BT /F1 12 Tf 72 700 Td (Hello) Tj ET", resources)?;
//! let doc = Document::builder().page(page).metadata("Title", "Greeting").build();
//! assert_eq!(doc.copy_text(0)?, "Hello");
//! # Ok::<(), pdf_sanitizer::Error>(())
//! ```

use crate::annotations::Annotation;
use crate::content::{parse_content_stream, serialize_content_stream, Matrix, Operator};
use crate::encryption::{self, AccessControlDescriptor, Action, Permissions, ProtectedDocument};
use crate::error::{Error, Result};
use crate::extractors::PageText;
use crate::fonts::Font;
use crate::geometry::Rect;
use crate::outline::OutlineItem;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// US Letter, the media box used when none is given.
pub const DEFAULT_MEDIA_BOX: Rect = Rect {
    x: 0.0,
    y: 0.0,
    width: 612.0,
    height: 792.0,
};

/// An image XObject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageXObject {
    /// Width in samples
    pub width: u32,
    /// Height in samples
    pub height: u32,
    /// Encoded image data
    pub data: Vec<u8>,
}

/// A form XObject: a self-contained content stream with its own resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormXObject {
    /// Parsed content
    pub operators: Vec<Operator>,
    /// Resources used by the content
    pub resources: Resources,
    /// Form matrix (form space to user space)
    pub matrix: Matrix,
    /// Form bounding box in form space
    pub bbox: Rect,
}

impl FormXObject {
    /// Parse a form's content stream.
    pub fn from_content(content: &[u8], resources: Resources) -> Result<Self> {
        Ok(Self {
            operators: parse_content_stream(content)?,
            resources,
            matrix: Matrix::identity(),
            bbox: DEFAULT_MEDIA_BOX,
        })
    }

    /// Set the form matrix.
    pub fn with_matrix(mut self, matrix: Matrix) -> Self {
        self.matrix = matrix;
        self
    }

    /// Set the bounding box.
    pub fn with_bbox(mut self, bbox: Rect) -> Self {
        self.bbox = bbox;
        self
    }
}

/// An external object painted with `Do`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum XObject {
    /// Raster image
    Image(ImageXObject),
    /// Form
    Form(FormXObject),
}

/// Resources scoped to a page or form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    /// Fonts by resource name
    pub fonts: BTreeMap<String, Font>,
    /// XObjects by resource name
    pub xobjects: BTreeMap<String, XObject>,
}

impl Resources {
    /// Empty resources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a font under `name`.
    pub fn with_font(mut self, name: impl Into<String>, font: Font) -> Self {
        self.fonts.insert(name.into(), font);
        self
    }

    /// Add an XObject under `name`.
    pub fn with_xobject(mut self, name: impl Into<String>, xobject: XObject) -> Self {
        self.xobjects.insert(name.into(), xobject);
        self
    }
}

/// A page: operators, resources and media box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Parsed content stream
    pub operators: Vec<Operator>,
    /// Page resources
    pub resources: Resources,
    /// Page boundaries
    pub media_box: Rect,
}

impl Page {
    /// A page from already parsed operators.
    pub fn new(operators: Vec<Operator>, resources: Resources) -> Self {
        Self {
            operators,
            resources,
            media_box: DEFAULT_MEDIA_BOX,
        }
    }

    /// Parse a content stream into a page.
    pub fn from_content(content: &[u8], resources: Resources) -> Result<Self> {
        Ok(Self::new(parse_content_stream(content)?, resources))
    }

    /// Serialize the operators back into content stream bytes.
    pub fn content_stream(&self) -> Vec<u8> {
        serialize_content_stream(&self.operators)
    }
}

/// Document-level data outside the page content streams.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Document information dictionary, in insertion order
    pub metadata: IndexMap<String, String>,
    /// Outline (bookmark) roots
    pub outline: Vec<OutlineItem>,
    /// Annotations of all pages
    pub annotations: Vec<Annotation>,
    /// XMP metadata packet
    pub xmp: Option<String>,
    /// Embedded search index
    pub search_index: Option<String>,
}

/// Who unlocked a protected document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Owner password: every permission, may change security
    Owner,
    /// User password: the recorded permissions
    User(Permissions),
}

impl Access {
    /// Permissions this access level grants.
    pub fn permissions(&self) -> Permissions {
        match self {
            Access::Owner => Permissions::all(),
            Access::User(perms) => *perms,
        }
    }
}

/// Protection state of a document handle.
#[derive(Debug, Clone, PartialEq)]
pub enum Protection {
    /// No access control
    Unprotected,
    /// Protected and unlocked with a password
    Unlocked {
        /// The access control entries the document was locked with
        descriptor: AccessControlDescriptor,
        /// Access level of the password that unlocked it
        access: Access,
    },
}

/// Per-instance exclusive-use flag. Clones start free.
#[derive(Default)]
struct ExclusiveUse(AtomicBool);

impl Clone for ExclusiveUse {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl PartialEq for ExclusiveUse {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl std::fmt::Debug for ExclusiveUse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", if self.0.load(Ordering::Acquire) { "busy" } else { "free" })
    }
}

/// Held while an operation uses a document; releases the flag on drop.
#[derive(Debug)]
pub struct OperationGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// A parsed document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pages: Vec<Page>,
    catalog: Catalog,
    protection: Protection,
    in_use: ExclusiveUse,
}

impl Document {
    /// Start building a document.
    pub fn builder() -> DocumentBuilder {
        DocumentBuilder::default()
    }

    pub(crate) fn assemble(pages: Vec<Page>, catalog: Catalog, protection: Protection) -> Self {
        Self {
            pages,
            catalog,
            protection,
            in_use: ExclusiveUse::default(),
        }
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// All pages in order.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// The page at `index`.
    pub fn page(&self, index: usize) -> Result<&Page> {
        self.pages.get(index).ok_or(Error::PageOutOfRange {
            index,
            count: self.pages.len(),
        })
    }

    pub(crate) fn pages_mut(&mut self) -> &mut Vec<Page> {
        &mut self.pages
    }

    /// Document-level carriers.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub(crate) fn catalog_mut(&mut self) -> &mut Catalog {
        &mut self.catalog
    }

    /// Document information dictionary.
    pub fn metadata(&self) -> &IndexMap<String, String> {
        &self.catalog.metadata
    }

    /// Outline roots.
    pub fn outline(&self) -> &[OutlineItem] {
        &self.catalog.outline
    }

    /// Annotations of all pages.
    pub fn annotations(&self) -> &[Annotation] {
        &self.catalog.annotations
    }

    /// XMP metadata packet.
    pub fn xmp(&self) -> Option<&str> {
        self.catalog.xmp.as_deref()
    }

    /// Embedded search index.
    pub fn search_index(&self) -> Option<&str> {
        self.catalog.search_index.as_deref()
    }

    /// Protection state.
    pub fn protection(&self) -> &Protection {
        &self.protection
    }

    /// Whether the document carries access control.
    pub fn is_protected(&self) -> bool {
        !matches!(self.protection, Protection::Unprotected)
    }

    /// Permissions of the current handle; unprotected documents allow everything.
    pub fn permissions(&self) -> Permissions {
        match &self.protection {
            Protection::Unprotected => Permissions::all(),
            Protection::Unlocked { access, .. } => access.permissions(),
        }
    }

    /// Claim exclusive use of this document.
    ///
    /// Returns [`Error::Busy`] while another guard is alive.
    pub fn begin_operation(&self) -> Result<OperationGuard<'_>> {
        self.in_use
            .0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::Busy)?;
        Ok(OperationGuard { flag: &self.in_use.0 })
    }

    /// Check that the current handle may perform `action`.
    pub fn authorize(&self, action: Action) -> Result<()> {
        let allowed = match &self.protection {
            Protection::Unprotected => true,
            Protection::Unlocked { access: Access::Owner, .. } => true,
            Protection::Unlocked {
                access: Access::User(perms),
                ..
            } => perms.allows(action),
        };
        if allowed {
            Ok(())
        } else {
            log::debug!("Denied {} on user-unlocked document", action);
            Err(Error::PermissionDenied(action))
        }
    }

    /// Extracted text of a page with glyph provenance (requires the copy permission).
    ///
    /// # Errors
    ///
    /// - [`Error::PermissionDenied`] if the handle may not copy text
    /// - [`Error::PageOutOfRange`] if `page_index` is out of range
    /// - any extraction error for the page
    pub fn page_text(&self, page_index: usize) -> Result<PageText> {
        self.authorize(Action::Copy)?;
        let page = self.page(page_index)?;
        crate::extractors::extract_page_text(page, page_index)
    }

    /// Extracted text of a page (requires the copy permission).
    pub fn copy_text(&self, page_index: usize) -> Result<String> {
        Ok(self.page_text(page_index)?.text)
    }

    /// Set a metadata field (requires the modify permission).
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.authorize(Action::Modify)?;
        self.catalog.metadata.insert(key.into(), value.into());
        Ok(())
    }

    /// Add an annotation (requires the annotate permission).
    pub fn add_annotation(&mut self, annotation: Annotation) -> Result<()> {
        self.authorize(Action::Annotate)?;
        self.page(annotation.page_index)?;
        self.catalog.annotations.push(annotation);
        Ok(())
    }

    /// Drop protection from an owner-unlocked document.
    ///
    /// A user-unlocked document fails with [`Error::PermissionDenied`];
    /// an unprotected document is left as is. The `&mut` receiver already
    /// rules out a live [`OperationGuard`] on this handle.
    pub fn remove_protection(&mut self) -> Result<()> {
        match &self.protection {
            Protection::Unprotected => Ok(()),
            Protection::Unlocked { access: Access::Owner, .. } => {
                self.protection = Protection::Unprotected;
                log::info!("Removed protection");
                Ok(())
            },
            Protection::Unlocked { .. } => Err(Error::PermissionDenied(Action::ChangeSecurity)),
        }
    }

    /// Protect this document again with new credentials (owner access only).
    ///
    /// Returns [`Error::Busy`] while another operation holds this document.
    pub fn reissue_protection(
        &self,
        user_password: &str,
        owner_password: Option<&str>,
        permissions: Permissions,
    ) -> Result<ProtectedDocument> {
        let _guard = self.begin_operation()?;
        self.authorize(Action::ChangeSecurity)?;
        let mut plain = self.clone();
        plain.protection = Protection::Unprotected;
        encryption::protect(&plain, user_password, owner_password, permissions)
    }
}

/// Builder for [`Document`].
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    pages: Vec<Page>,
    catalog: Catalog,
}

impl DocumentBuilder {
    /// Append a page.
    pub fn page(mut self, page: Page) -> Self {
        self.pages.push(page);
        self
    }

    /// Set a metadata field.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.catalog.metadata.insert(key.into(), value.into());
        self
    }

    /// Append an outline root.
    pub fn outline(mut self, item: OutlineItem) -> Self {
        self.catalog.outline.push(item);
        self
    }

    /// Add an annotation.
    pub fn annotation(mut self, annotation: Annotation) -> Self {
        self.catalog.annotations.push(annotation);
        self
    }

    /// Set the XMP packet.
    pub fn xmp(mut self, xmp: impl Into<String>) -> Self {
        self.catalog.xmp = Some(xmp.into());
        self
    }

    /// Set the embedded search index.
    pub fn search_index(mut self, index: impl Into<String>) -> Self {
        self.catalog.search_index = Some(index.into());
        self
    }

    /// Finish building an unprotected document.
    pub fn build(self) -> Document {
        Document::assemble(self.pages, self.catalog, Protection::Unprotected)
    }
}
