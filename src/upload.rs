//! Upload validation and temporary storage.
//!
//! Every accepted upload is written to its own file under the upload directory and wrapped in an
//! [`UploadedDocument`] guard. The guard is the only handle to that file: the pipeline discards it
//! once extraction has finished, and dropping it without discarding still removes the file so a
//! cancelled request never leaves an upload behind.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use time::OffsetDateTime;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

/// Multipart field carrying the document.
pub const DOCUMENT_FIELD: &str = "document";
/// Multipart field carrying the optional summary length.
pub const SUMMARY_LENGTH_FIELD: &str = "summaryLength";

/// Errors raised while accepting an upload.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Request did not carry a document field.
    #[error("No file uploaded.")]
    MissingFile,
    /// Declared MIME type is outside the allow-list.
    #[error("Invalid file type '{0}'. Only PDF and image files are allowed.")]
    InvalidFileType(String),
    /// Document field was present but contained no bytes.
    #[error("Uploaded file is empty.")]
    EmptyFile,
    /// Request body exceeded the configured size limit.
    #[error("Uploaded file exceeds the size limit.")]
    TooLarge,
    /// Multipart body could not be read.
    #[error("Malformed upload: {0}")]
    Malformed(String),
    /// File could not be written to the upload directory.
    #[error("Failed to store upload at {path}: {source}")]
    Storage {
        /// Destination that could not be written.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },
}

/// Document formats accepted by the upload endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// `application/pdf`
    Pdf,
    /// `image/jpeg`
    Jpeg,
    /// `image/png`
    Png,
}

impl DocumentKind {
    /// Resolve a declared MIME type against the allow-list.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "application/pdf" => Some(Self::Pdf),
            "image/jpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            _ => None,
        }
    }

    /// File extension the extraction tool expects for this kind.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Pdf => ".pdf",
            Self::Jpeg => ".jpg",
            Self::Png => ".png",
        }
    }
}

/// Document as received from the transport layer, before validation.
#[derive(Debug, Clone)]
pub struct IncomingDocument {
    /// Form field the document arrived in; used as the stored file name prefix.
    pub field_name: String,
    /// File name supplied by the client, if any.
    pub original_name: String,
    /// MIME type declared by the client.
    pub content_type: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

/// Validates uploads and writes them to uniquely named temporary files.
#[derive(Debug, Clone)]
pub struct UploadReceiver {
    dir: PathBuf,
}

impl UploadReceiver {
    /// Build a receiver that stores files under `dir`, creating it on first use.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding in-flight uploads.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Validate the declared type and persist the document.
    ///
    /// Nothing touches the disk when validation fails.
    pub async fn store(&self, incoming: IncomingDocument) -> Result<UploadedDocument, UploadError> {
        let kind = DocumentKind::from_mime(&incoming.content_type)
            .ok_or_else(|| UploadError::InvalidFileType(incoming.content_type.clone()))?;
        if incoming.bytes.is_empty() {
            return Err(UploadError::EmptyFile);
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| UploadError::Storage {
                path: self.dir.clone(),
                source,
            })?;

        let path = self.dir.join(unique_file_name(&incoming.field_name, kind));
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|source| UploadError::Storage {
                path: path.clone(),
                source,
            })?;
        let byte_count = incoming.bytes.len();
        let document = UploadedDocument {
            path,
            declared_mime_type: incoming.content_type,
            original_name: incoming.original_name,
            kind,
            removed: false,
        };
        let document = fill(document, file, &incoming.bytes).await?;

        tracing::debug!(
            path = %document.path.display(),
            original_name = %document.original_name,
            bytes = byte_count,
            "Stored upload"
        );
        Ok(document)
    }
}

fn unique_file_name(field_name: &str, kind: DocumentKind) -> String {
    let prefix: String = field_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    let prefix = if prefix.is_empty() {
        DOCUMENT_FIELD
    } else {
        prefix.as_str()
    };
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    format!(
        "{prefix}-{millis}-{}{}",
        Uuid::new_v4().simple(),
        kind.extension()
    )
}

/// Write `bytes` through `writer` into the file guarded by `document`.
///
/// A partially written file is removed before the error is returned.
async fn fill<W>(
    document: UploadedDocument,
    mut writer: W,
    bytes: &[u8],
) -> Result<UploadedDocument, UploadError>
where
    W: AsyncWrite + Unpin,
{
    let written = async {
        writer.write_all(bytes).await?;
        writer.flush().await
    }
    .await;
    drop(writer);

    match written {
        Ok(()) => Ok(document),
        Err(source) => {
            let path = document.path.clone();
            document.discard().await;
            Err(UploadError::Storage { path, source })
        }
    }
}

/// Stored upload owned by a single pipeline run.
pub struct UploadedDocument {
    path: PathBuf,
    declared_mime_type: String,
    original_name: String,
    kind: DocumentKind,
    removed: bool,
}

impl UploadedDocument {
    /// Location of the stored file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// MIME type the client declared.
    pub fn declared_mime_type(&self) -> &str {
        &self.declared_mime_type
    }

    /// File name the client supplied.
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// Validated document format.
    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Remove the stored file. Failures are logged and otherwise ignored.
    pub async fn discard(mut self) {
        self.removed = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed upload"),
            Err(error) => tracing::warn!(
                path = %self.path.display(),
                error = %error,
                "File cleanup error"
            ),
        }
    }
}

impl fmt::Debug for UploadedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedDocument")
            .field("path", &self.path)
            .field("declared_mime_type", &self.declared_mime_type)
            .field("original_name", &self.original_name)
            .finish()
    }
}

impl Drop for UploadedDocument {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(error) = std::fs::remove_file(&self.path) {
            tracing::warn!(
                path = %self.path.display(),
                error = %error,
                "File cleanup error after abandoned request"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incoming(content_type: &str, bytes: &[u8]) -> IncomingDocument {
        IncomingDocument {
            field_name: DOCUMENT_FIELD.into(),
            original_name: "report.pdf".into(),
            content_type: content_type.into(),
            bytes: bytes.to_vec(),
        }
    }

    fn stored_files(dir: &Path) -> Vec<PathBuf> {
        match std::fs::read_dir(dir) {
            Ok(entries) => entries.map(|entry| entry.expect("entry").path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    #[test]
    fn allow_list_covers_pdf_and_images_only() {
        assert_eq!(DocumentKind::from_mime("application/pdf"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_mime("image/JPEG"), Some(DocumentKind::Jpeg));
        assert_eq!(
            DocumentKind::from_mime("image/png; charset=binary"),
            Some(DocumentKind::Png)
        );
        assert_eq!(DocumentKind::from_mime("text/plain"), None);
        assert_eq!(DocumentKind::from_mime("image/gif"), None);
    }

    #[tokio::test]
    async fn creates_directory_on_demand() {
        let root = tempfile::tempdir().expect("tempdir");
        let receiver = UploadReceiver::new(root.path().join("nested").join("uploads"));

        let document = receiver
            .store(incoming("application/pdf", b"%PDF-1.4"))
            .await
            .expect("stored");

        assert!(document.path().starts_with(receiver.dir()));
        assert_eq!(document.kind(), DocumentKind::Pdf);
        assert_eq!(
            std::fs::read(document.path()).expect("contents"),
            b"%PDF-1.4"
        );
        assert!(
            document
                .path()
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("document-") && name.ends_with(".pdf"))
        );
        document.discard().await;
    }

    #[tokio::test]
    async fn rejects_plain_text_before_storing() {
        let root = tempfile::tempdir().expect("tempdir");
        let receiver = UploadReceiver::new(root.path().join("uploads"));

        let error = receiver
            .store(incoming("text/plain", b"hello"))
            .await
            .expect_err("text/plain rejected");

        assert!(matches!(error, UploadError::InvalidFileType(mime) if mime == "text/plain"));
        assert!(!receiver.dir().exists());
    }

    #[tokio::test]
    async fn rejects_empty_documents() {
        let root = tempfile::tempdir().expect("tempdir");
        let receiver = UploadReceiver::new(root.path());

        let error = receiver
            .store(incoming("image/png", b""))
            .await
            .expect_err("empty rejected");

        assert!(matches!(error, UploadError::EmptyFile));
        assert!(stored_files(root.path()).is_empty());
    }

    #[tokio::test]
    async fn same_document_twice_gets_two_files() {
        let root = tempfile::tempdir().expect("tempdir");
        let receiver = UploadReceiver::new(root.path());

        let first = receiver
            .store(incoming("image/jpeg", b"jpeg-bytes"))
            .await
            .expect("first");
        let second = receiver
            .store(incoming("image/jpeg", b"jpeg-bytes"))
            .await
            .expect("second");

        assert_ne!(first.path(), second.path());
        assert_eq!(stored_files(root.path()).len(), 2);

        first.discard().await;
        second.discard().await;
        assert!(stored_files(root.path()).is_empty());
    }

    #[tokio::test]
    async fn dropping_without_discard_still_removes_file() {
        let root = tempfile::tempdir().expect("tempdir");
        let receiver = UploadReceiver::new(root.path());

        let document = receiver
            .store(incoming("image/png", b"png"))
            .await
            .expect("stored");
        let path = document.path().to_path_buf();
        assert!(path.exists());

        drop(document);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn discard_tolerates_missing_file() {
        let root = tempfile::tempdir().expect("tempdir");
        let receiver = UploadReceiver::new(root.path());

        let document = receiver
            .store(incoming("application/pdf", b"%PDF"))
            .await
            .expect("stored");
        std::fs::remove_file(document.path()).expect("external removal");

        document.discard().await;
    }

    struct FullDisk;

    impl AsyncWrite for FullDisk {
        fn poll_write(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            std::task::Poll::Ready(Err(std::io::Error::other("No space left on device")))
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn failed_write_removes_partial_file() {
        let root = tempfile::tempdir().expect("tempdir");
        let path = root.path().join(unique_file_name(DOCUMENT_FIELD, DocumentKind::Pdf));
        std::fs::write(&path, b"%PDF-partial").expect("partial file");
        let document = UploadedDocument {
            path: path.clone(),
            declared_mime_type: "application/pdf".into(),
            original_name: "report.pdf".into(),
            kind: DocumentKind::Pdf,
            removed: false,
        };

        let error = fill(document, FullDisk, b"%PDF-1.4 body")
            .await
            .expect_err("write failure");

        assert!(matches!(error, UploadError::Storage { path: ref failed, .. } if *failed == path));
        assert!(!path.exists());
        assert!(stored_files(root.path()).is_empty());
    }

    #[test]
    fn file_name_prefix_is_sanitized() {
        let name = unique_file_name("../../etc", DocumentKind::Png);
        assert!(name.starts_with("etc-"));
        assert!(name.ends_with(".png"));
        assert!(!name.contains('/'));

        let fallback = unique_file_name("///", DocumentKind::Pdf);
        assert!(fallback.starts_with("document-"));
    }
}
