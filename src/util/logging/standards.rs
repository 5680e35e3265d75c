//! Centralised logging metadata (event names, shared keys, etc.).

/// Canonical event names used across the service.
pub mod events {
    /// HTTP request lifecycle.
    pub const REQUEST_COMPLETE: &str = "request.complete";
    pub const REQUEST_ERROR: &str = "request.error";
    pub const REQUEST_SLOW: &str = "request.slow";

    /// Receipt lifecycle.
    pub const RECEIPT_UPLOADED: &str = "receipt.uploaded";
    pub const RECEIPT_DELETED: &str = "receipt.deleted";
    pub const RECEIPT_META_UPDATED: &str = "receipt.meta_updated";
    pub const UPLOAD_REJECTED: &str = "upload.rejected";

    /// Text extraction.
    pub const OCR_START: &str = "ocr.start";
    pub const OCR_COMPLETE: &str = "ocr.complete";
    pub const OCR_FAILED: &str = "ocr.failed";

    /// Tags.
    pub const TAG_CREATED: &str = "tag.created";
    pub const TAG_RENAMED: &str = "tag.renamed";
    pub const TAG_DELETED: &str = "tag.deleted";

    /// Exports and reports.
    pub const EXPORT_CSV: &str = "export.csv";
    pub const REPORT_GENERATED: &str = "report.generated";

    /// Security.
    pub const CSRF_REJECTED: &str = "csrf.rejected";
}
