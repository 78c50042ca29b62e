use image::{ImageBuffer, Rgba};
use lopdf::encryption::DecryptionError;
use lopdf::Document;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

const ENCRYPT_MARKER: &[u8] = b"/Encrypt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    /// For engines implemented outside this crate.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page_index: u32,
    pub scale: f32,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self { page_index: 0, scale: 1.0 }
    }
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// Credentials supplied with a load request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    pub password: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedDocument {
    pub handle: DocumentHandle,
    pub page_count: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("document requires a password")]
    PasswordRequired,
    #[error("incorrect password")]
    IncorrectPassword,
    #[error("backend error: {0}")]
    Backend(String),
}

impl PdfEngineError {
    /// Password failures loop back to the password prompt; everything else is fatal.
    ///
    /// Backends that only surface free-form errors are classified by message.
    pub fn is_password_failure(&self) -> bool {
        match self {
            Self::PasswordRequired | Self::IncorrectPassword => true,
            Self::Backend(message) => message.to_ascii_lowercase().contains("password"),
            Self::Io(_) | Self::Parse(_) | Self::InvalidHandle(_) | Self::PageOutOfRange { .. } => {
                false
            }
        }
    }
}

pub trait PdfEngine {
    fn load(
        &mut self,
        source: OpenSource,
        options: &LoadOptions,
    ) -> Result<LoadedDocument, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError>;
    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;

    /// Whether the backend reports password conditions as errors instead of
    /// raising its own interactive prompt.
    fn suppresses_native_prompt(&self) -> bool {
        true
    }
}

/// Cheap out-of-band check used when files are selected.
pub fn is_password_protected(bytes: &[u8]) -> bool {
    bytes.windows(ENCRYPT_MARKER.len()).any(|window| window == ENCRYPT_MARKER)
}

#[derive(Debug, Clone)]
struct DocumentRecord {
    page_sizes: Vec<PageSize>,
}

#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_documents(&self) -> usize {
        self.docs.len()
    }

    fn parse(bytes: &[u8], options: &LoadOptions) -> Result<Document, PdfEngineError> {
        let marked = is_password_protected(bytes);

        let mut doc = match Document::load_mem(bytes) {
            Ok(doc) => doc,
            Err(_) if marked && options.password.is_none() => {
                return Err(PdfEngineError::PasswordRequired);
            }
            Err(err) => return Err(err.into()),
        };

        if !doc.is_encrypted() {
            return Ok(doc);
        }

        match options.password.as_deref() {
            Some(password) => {
                doc.decrypt(password).map_err(|err| decryption_error(err, false))?;
            }
            // Owner-password-only documents open with the empty user password.
            None => {
                doc.decrypt("").map_err(|err| decryption_error(err, true))?;
                tracing::debug!("opened encrypted document with the empty user password");
            }
        }

        Ok(doc)
    }

    fn parse_sizes(doc: &Document) -> Result<Vec<PageSize>, PdfEngineError> {
        let pages = doc.get_pages();
        let mut sizes = Vec::with_capacity(pages.len());

        for (_, object_id) in pages {
            let dict = doc.get_dictionary(object_id)?;
            let size = dict
                .get(b"MediaBox")
                .ok()
                .and_then(|obj| obj.as_array().ok())
                .and_then(|array| {
                    if array.len() != 4 {
                        return None;
                    }
                    let x0 = array[0].as_float().ok()?;
                    let y0 = array[1].as_float().ok()?;
                    let x1 = array[2].as_float().ok()?;
                    let y1 = array[3].as_float().ok()?;
                    Some(PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() })
                })
                .unwrap_or(PageSize { width_pt: 612.0, height_pt: 792.0 });

            sizes.push(size);
        }

        if sizes.is_empty() {
            return Err(PdfEngineError::Backend("document has no pages".to_owned()));
        }

        Ok(sizes)
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

impl PdfEngine for LopdfEngine {
    fn load(
        &mut self,
        source: OpenSource,
        options: &LoadOptions,
    ) -> Result<LoadedDocument, PdfEngineError> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        let doc = Self::parse(&bytes, options)?;
        let page_sizes = Self::parse_sizes(&doc)?;
        let page_count = page_sizes.len() as u32;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        self.docs.insert(handle, DocumentRecord { page_sizes });

        tracing::debug!(handle = handle.raw(), page_count, "loaded document");
        Ok(LoadedDocument { handle, page_count })
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.record(handle)?.page_sizes.len() as u32)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        let record = self.record(handle)?;
        record.page_sizes.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: record.page_sizes.len() as u32,
        })
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        let page_size = self.page_size(handle, request.page_index)?;
        let scale = if request.scale <= 0.0 { 1.0 } else { request.scale };

        let width = (page_size.width_pt * scale).round().max(1.0) as u32;
        let height = (page_size.height_pt * scale).round().max(1.0) as u32;

        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, Rgba([220, 220, 220, 255]));
                image.put_pixel(x, height - 1, Rgba([220, 220, 220, 255]));
            }
            for y in 0..height {
                image.put_pixel(0, y, Rgba([220, 220, 220, 255]));
                image.put_pixel(width - 1, y, Rgba([220, 220, 220, 255]));
            }
        }

        Ok(image)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

/// Only a rejected password is a password failure; unsupported or malformed
/// encryption is fatal.
fn decryption_error(err: lopdf::Error, no_password: bool) -> PdfEngineError {
    match err {
        lopdf::Error::Decryption(DecryptionError::IncorrectPassword) if no_password => {
            PdfEngineError::PasswordRequired
        }
        lopdf::Error::Decryption(DecryptionError::IncorrectPassword) => {
            PdfEngineError::IncorrectPassword
        }
        other => PdfEngineError::Parse(other),
    }
}

/// Builds a minimal unencrypted PDF with `page_count` blank Letter pages.
#[cfg(any(test, feature = "test-util"))]
pub fn blank_pdf(page_count: u32) -> Vec<u8> {
    fixtures::save(fixtures::blank_document(page_count))
}

/// Builds a [`blank_pdf`] protected with the RC4 40-bit standard handler
/// (V 1, R 2). An empty `user_password` gives an owner-password-only file.
#[cfg(any(test, feature = "test-util"))]
pub fn rc4_encrypted_pdf(page_count: u32, user_password: &str) -> Vec<u8> {
    fixtures::rc4_encrypted(page_count, user_password)
}

/// Builds a [`blank_pdf`] carrying an AES-128 (V 4, R 4) encrypt dictionary.
#[cfg(any(test, feature = "test-util"))]
pub fn aes_encrypted_pdf(page_count: u32) -> Vec<u8> {
    fixtures::aes_encrypted(page_count)
}

#[cfg(any(test, feature = "test-util"))]
mod fixtures {
    use lopdf::{dictionary, Document, Object, ObjectId, StringFormat};

    /// Standard security handler password padding.
    const PASSWORD_PADDING: [u8; 32] = [
        0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01,
        0x08, 0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53,
        0x69, 0x7A,
    ];
    const FILE_ID: &[u8; 16] = b"intake-fixture-1";

    pub(super) fn blank_document(page_count: u32) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let kids: Vec<Object> = (0..page_count)
            .map(|_| {
                let page_id = doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                });
                page_id.into()
            })
            .collect();

        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    pub(super) fn save(mut doc: Document) -> Vec<u8> {
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("in-memory PDF should serialize");
        bytes
    }

    pub(super) fn rc4_encrypted(page_count: u32, user_password: &str) -> Vec<u8> {
        let mut doc = blank_document(page_count);
        let encrypt_id = attach_encryption(
            &mut doc,
            dictionary! {
                "Filter" => "Standard",
                "V" => 1,
                "R" => 2,
                "O" => hex(vec![0x4F; 32]),
                "P" => -4,
            },
        );

        let key = lopdf::encryption::get_encryption_key(&doc, user_password, false)
            .expect("fixture key should derive");
        doc.get_object_mut(encrypt_id)
            .and_then(Object::as_dict_mut)
            .expect("encrypt dictionary should exist")
            .set("U", hex(rc4(&key, &PASSWORD_PADDING)));

        save(doc)
    }

    pub(super) fn aes_encrypted(page_count: u32) -> Vec<u8> {
        let mut doc = blank_document(page_count);
        attach_encryption(
            &mut doc,
            dictionary! {
                "Filter" => "Standard",
                "V" => 4,
                "R" => 4,
                "Length" => 128,
                "CF" => dictionary! {
                    "StdCF" => dictionary! {
                        "CFM" => "AESV2",
                        "AuthEvent" => "DocOpen",
                        "Length" => 16,
                    },
                },
                "StmF" => "StdCF",
                "StrF" => "StdCF",
                "O" => hex(vec![0x4F; 32]),
                "U" => hex(vec![0x55; 32]),
                "P" => -4,
            },
        );
        save(doc)
    }

    fn attach_encryption(doc: &mut Document, encrypt: lopdf::Dictionary) -> ObjectId {
        let encrypt_id = doc.add_object(encrypt);
        doc.trailer.set("Encrypt", encrypt_id);
        doc.trailer.set("ID", vec![hex(FILE_ID.to_vec()), hex(FILE_ID.to_vec())]);
        encrypt_id
    }

    fn hex(bytes: Vec<u8>) -> Object {
        Object::String(bytes, StringFormat::Hexadecimal)
    }

    fn rc4(key: &[u8], input: &[u8]) -> Vec<u8> {
        let mut state: [u8; 256] = std::array::from_fn(|i| i as u8);
        let mut j = 0_u8;
        for i in 0..256 {
            j = j.wrapping_add(state[i]).wrapping_add(key[i % key.len()]);
            state.swap(i, usize::from(j));
        }

        let (mut i, mut j) = (0_u8, 0_u8);
        input
            .iter()
            .map(|byte| {
                i = i.wrapping_add(1);
                j = j.wrapping_add(state[usize::from(i)]);
                state.swap(usize::from(i), usize::from(j));
                let index = state[usize::from(i)].wrapping_add(state[usize::from(j)]);
                byte ^ state[usize::from(index)]
            })
            .collect()
    }
}
