//! Access control: AES-256 encryption with user and owner passwords.
//!
//! Implements the standard security handler at revision 6 (ISO 32000-2,
//! §7.6.4) for documents handled by this crate:
//!
//! - [`protect`] derives U/UE/O/OE/Perms from two independent passwords,
//!   seals every page and document-level part under a random file key, and
//!   returns a [`ProtectedDocument`].
//! - [`unlock`] authenticates a password (owner first, then user) and
//!   returns the document together with the granted [`Permissions`].
//! - [`Document::remove_protection`] and [`Document::reissue_protection`]
//!   complete the state machine; both need owner access.
//!
//! # Security Considerations
//!
//! - Passwords are NFKC-normalised and truncated to 127 bytes before hashing
//! - Password validation uses constant-time comparison to prevent timing attacks
//! - Neither password can be derived from the other; O is salted and bound to U
//! - A Perms entry that does not match P is reported as tampering

use crate::document::{Access, Catalog, Document, Page, Protection};
use crate::error::{Error, Result};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

mod aes;
mod algorithms;
mod handler;

pub use handler::SealingHandler;

/// Encryption algorithm of an access control descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    /// AES with 256-bit key in CBC mode (PDF 2.0, V=5, R=6)
    Aes256,
}

impl Algorithm {
    /// Get the key length in bytes for this algorithm.
    pub fn key_length(&self) -> usize {
        match self {
            Algorithm::Aes256 => 32,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Aes256 => write!(f, "AES-256"),
        }
    }
}

/// Revision of the standard security handler written by [`protect`].
pub const REVISION: u32 = 6;

bitflags! {
    /// Permissions granted to a user-password holder.
    ///
    /// The four flags are independent; the owner always has all of them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Permissions: u32 {
        /// Print (including high-quality print)
        const PRINT = 1 << 0;
        /// Modify content (including page assembly)
        const MODIFY = 1 << 1;
        /// Copy or extract text and graphics
        const COPY = 1 << 2;
        /// Add or modify annotations (including form filling)
        const ANNOTATE = 1 << 3;
    }
}

// P bit positions (1-based in the PDF reference, 0-based here).
const P_PRINT: i32 = 1 << 2;
const P_MODIFY: i32 = 1 << 3;
const P_COPY: i32 = 1 << 4;
const P_ANNOTATE: i32 = 1 << 5;
const P_FILL_FORMS: i32 = 1 << 8;
const P_ACCESSIBILITY: i32 = 1 << 9;
const P_ASSEMBLE: i32 = 1 << 10;
const P_PRINT_HIGH_QUALITY: i32 = 1 << 11;
/// Bits 7-8 and 13-32 must be set; bits 1-2 must be clear.
const P_RESERVED: i32 = 0xFFFF_F0C0_u32 as i32;

impl Permissions {
    /// Encode as the 32-bit P value.
    ///
    /// ```
    /// use pdf_sanitizer::encryption::Permissions;
    ///
    /// let p = Permissions::PRINT.to_bitmask();
    /// assert_eq!(p as u32, 0xFFFF_FAC4);
    /// ```
    pub fn to_bitmask(self) -> i32 {
        let mut p = P_RESERVED | P_ACCESSIBILITY;
        if self.contains(Permissions::PRINT) {
            p |= P_PRINT | P_PRINT_HIGH_QUALITY;
        }
        if self.contains(Permissions::MODIFY) {
            p |= P_MODIFY | P_ASSEMBLE;
        }
        if self.contains(Permissions::COPY) {
            p |= P_COPY;
        }
        if self.contains(Permissions::ANNOTATE) {
            p |= P_ANNOTATE | P_FILL_FORMS;
        }
        p
    }

    /// Decode a P value.
    pub fn from_bitmask(p: i32) -> Self {
        let mut perms = Permissions::empty();
        if p & P_PRINT != 0 {
            perms |= Permissions::PRINT;
        }
        if p & P_MODIFY != 0 {
            perms |= Permissions::MODIFY;
        }
        if p & P_COPY != 0 {
            perms |= Permissions::COPY;
        }
        if p & P_ANNOTATE != 0 {
            perms |= Permissions::ANNOTATE;
        }
        perms
    }

    /// Whether these permissions allow `action`.
    pub fn allows(self, action: Action) -> bool {
        match action {
            Action::Print => self.contains(Permissions::PRINT),
            Action::Modify => self.contains(Permissions::MODIFY),
            Action::Copy => self.contains(Permissions::COPY),
            Action::Annotate => self.contains(Permissions::ANNOTATE),
            Action::ChangeSecurity => false,
        }
    }
}

/// An operation gated by access control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Printing (checked on behalf of the viewer)
    Print,
    /// Modifying content, metadata or running redaction
    Modify,
    /// Copying text out of the document
    Copy,
    /// Adding annotations
    Annotate,
    /// Removing or replacing protection (owner only)
    ChangeSecurity,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Print => "print",
            Action::Modify => "modify",
            Action::Copy => "copy",
            Action::Annotate => "annotate",
            Action::ChangeSecurity => "change security",
        };
        f.write_str(name)
    }
}

/// PDF encryption permissions as raw P bits.
///
/// ISO 32000-2 Table 22: user access permissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionBits {
    bits: i32,
}

impl PermissionBits {
    /// Create permissions from the P field value.
    pub fn from_bits(bits: i32) -> Self {
        Self { bits }
    }

    /// The raw P value.
    pub fn bits(&self) -> i32 {
        self.bits
    }

    /// Check if printing is allowed.
    pub fn can_print(&self) -> bool {
        (self.bits & P_PRINT) != 0
    }

    /// Check if modifying the document is allowed.
    pub fn can_modify(&self) -> bool {
        (self.bits & P_MODIFY) != 0
    }

    /// Check if copying text/graphics is allowed.
    pub fn can_copy(&self) -> bool {
        (self.bits & P_COPY) != 0
    }

    /// Check if adding/modifying annotations is allowed.
    pub fn can_annotate(&self) -> bool {
        (self.bits & P_ANNOTATE) != 0
    }

    /// Check if filling form fields is allowed.
    pub fn can_fill_forms(&self) -> bool {
        (self.bits & P_FILL_FORMS) != 0
    }

    /// Check if content extraction for accessibility is allowed.
    pub fn can_extract_accessibility(&self) -> bool {
        (self.bits & P_ACCESSIBILITY) != 0
    }
}

/// The encryption dictionary entries of a protected document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessControlDescriptor {
    /// Encryption algorithm
    pub algorithm: Algorithm,
    /// Security handler revision (R)
    pub revision: u32,
    /// User password hash (U): hash, validation salt, key salt
    pub user_hash: Vec<u8>,
    /// File key wrapped with the user password (UE)
    pub user_key: Vec<u8>,
    /// Owner password hash (O), bound to U
    pub owner_hash: Vec<u8>,
    /// File key wrapped with the owner password (OE)
    pub owner_key: Vec<u8>,
    /// Encrypted permissions (Perms)
    pub perms: Vec<u8>,
    /// User access permissions (P)
    pub permission_bitmask: i32,
    /// Whether document metadata is encrypted
    pub encrypt_metadata: bool,
}

/// Security settings readable without a password.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityInfo {
    /// Encryption algorithm
    pub algorithm: Algorithm,
    /// Security handler revision
    pub revision: u32,
    /// Key length in bits
    pub key_length_bits: usize,
    /// Whether document metadata is encrypted
    pub encrypt_metadata: bool,
    /// Declared user permissions
    pub permissions: PermissionBits,
}

/// A locked document: access control entries plus sealed content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectedDocument {
    descriptor: AccessControlDescriptor,
    sealed_pages: Vec<Vec<u8>>,
    sealed_catalog: Vec<u8>,
}

impl ProtectedDocument {
    /// The access control entries.
    pub fn descriptor(&self) -> &AccessControlDescriptor {
        &self.descriptor
    }

    /// Number of sealed pages.
    pub fn page_count(&self) -> usize {
        self.sealed_pages.len()
    }

    /// Inspect the security settings without a password.
    pub fn security_info(&self) -> SecurityInfo {
        SecurityInfo {
            algorithm: self.descriptor.algorithm,
            revision: self.descriptor.revision,
            key_length_bits: self.descriptor.algorithm.key_length() * 8,
            encrypt_metadata: self.descriptor.encrypt_metadata,
            permissions: PermissionBits::from_bits(self.descriptor.permission_bitmask),
        }
    }

    /// Whether a sealed part contains `needle` in clear text.
    #[cfg(test)]
    pub(crate) fn leaks(&self, needle: &[u8]) -> bool {
        self.sealed_pages
            .iter()
            .chain(std::iter::once(&self.sealed_catalog))
            .any(|part| part.windows(needle.len()).any(|w| w == needle))
    }
}

/// Protect a document with independent user and owner passwords.
///
/// A missing owner password is replaced by 32 random bytes (hex-encoded),
/// which leaves the document without a usable owner credential.
///
/// # Errors
///
/// - [`Error::AlreadyProtected`] if `document` carries protection
/// - [`Error::InvalidConfig`] if both passwords are equal
/// - [`Error::Busy`] if another operation holds `document`
///
/// # Example
///
/// ```
/// use pdf_sanitizer::document::Document;
/// use pdf_sanitizer::encryption::{protect, unlock, Permissions};
///
/// let doc = Document::builder().build();
/// let protected = protect(&doc, "u1", Some("o1"), Permissions::PRINT)?;
/// let (_, perms) = unlock(&protected, "u1")?;
/// assert_eq!(perms, Permissions::PRINT);
/// # Ok::<(), pdf_sanitizer::Error>(())
/// ```
pub fn protect(
    document: &Document,
    user_password: &str,
    owner_password: Option<&str>,
    permissions: Permissions,
) -> Result<ProtectedDocument> {
    let _guard = document.begin_operation()?;
    if document.is_protected() {
        return Err(Error::AlreadyProtected);
    }

    let user = algorithms::prepare_password(user_password);
    let owner = match owner_password {
        Some(pw) => algorithms::prepare_password(pw),
        None => generate_owner_password(),
    };
    if algorithms::constant_time_compare(&user, &owner) {
        return Err(Error::InvalidConfig(
            "User and owner passwords must differ".to_string(),
        ));
    }

    let file_key = algorithms::random_bytes(algorithms::FILE_KEY_LEN);
    let (user_hash, user_key) = algorithms::compute_entries(&user, &file_key, b"")?;
    let (owner_hash, owner_key) = algorithms::compute_entries(&owner, &file_key, &user_hash)?;
    let permission_bitmask = permissions.to_bitmask();
    let encrypt_metadata = true;
    let perms = algorithms::compute_perms(permission_bitmask, encrypt_metadata, &file_key)?;

    let handler = SealingHandler::from_key(file_key)?;
    let sealed_pages = document
        .pages()
        .iter()
        .map(|page| handler.seal(page))
        .collect::<Result<Vec<_>>>()?;
    let sealed_catalog = handler.seal(document.catalog())?;

    log::info!(
        "Protected document: {} pages, P=0x{:08X}",
        sealed_pages.len(),
        permission_bitmask as u32
    );

    Ok(ProtectedDocument {
        descriptor: AccessControlDescriptor {
            algorithm: Algorithm::Aes256,
            revision: REVISION,
            user_hash,
            user_key,
            owner_hash,
            owner_key,
            perms: perms.to_vec(),
            permission_bitmask,
            encrypt_metadata,
        },
        sealed_pages,
        sealed_catalog,
    })
}

fn generate_owner_password() -> Vec<u8> {
    algorithms::random_bytes(32)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<String>()
        .into_bytes()
}

/// Unlock a protected document.
///
/// The owner password is tried first and grants every permission; the
/// user password grants the permissions recorded in P.
///
/// # Errors
///
/// - [`Error::Authentication`] if neither password matches
/// - [`Error::InvalidPdf`] if the Perms entry does not match P
pub fn unlock(protected: &ProtectedDocument, password: &str) -> Result<(Document, Permissions)> {
    let descriptor = &protected.descriptor;
    if descriptor.algorithm != Algorithm::Aes256 || descriptor.revision != REVISION {
        return Err(Error::InvalidPdf(format!(
            "Unsupported security handler: {} R={}",
            descriptor.algorithm, descriptor.revision
        )));
    }
    let pw = algorithms::prepare_password(password);

    let (file_key, access) = if let Some(key) = algorithms::authenticate(
        &pw,
        &descriptor.owner_hash,
        &descriptor.owner_key,
        &descriptor.user_hash,
    )? {
        (key, Access::Owner)
    } else if let Some(key) =
        algorithms::authenticate(&pw, &descriptor.user_hash, &descriptor.user_key, b"")?
    {
        let perms = Permissions::from_bitmask(descriptor.permission_bitmask);
        (key, Access::User(perms))
    } else {
        log::debug!("Password matched neither owner nor user entry");
        return Err(Error::Authentication);
    };

    algorithms::validate_perms(
        &descriptor.perms,
        descriptor.permission_bitmask,
        descriptor.encrypt_metadata,
        &file_key,
    )?;

    let handler = SealingHandler::from_key(file_key)?;
    let pages = protected
        .sealed_pages
        .iter()
        .map(|sealed| handler.open::<Page>(sealed))
        .collect::<Result<Vec<_>>>()?;
    let catalog: Catalog = handler.open(&protected.sealed_catalog)?;

    let permissions = access.permissions();
    log::info!(
        "Unlocked document with {} access: {} pages",
        if matches!(access, Access::Owner) { "owner" } else { "user" },
        pages.len()
    );

    let protection = Protection::Unlocked {
        descriptor: descriptor.clone(),
        access,
    };
    Ok((Document::assemble(pages, catalog, protection), permissions))
}
