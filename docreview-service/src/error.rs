use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Main service error type
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Review session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("Asset not found: {asset_id}")]
    AssetNotFound { asset_id: String },

    #[error("No raster loaded for the current page")]
    RasterNotReady,

    #[error("Storage access failed")]
    Storage(#[from] StorageError),

    #[error("Page decode failed")]
    Decode(#[from] DecodeError),

    #[error("Analysis result fetch failed")]
    Analysis(#[from] AnalysisError),

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },
}

/// Storage collaborator errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to list files under {folder:?}")]
    Listing {
        folder: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {name}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {name}")]
    NotFound { name: String },

    #[error("Invalid file name: {name}")]
    InvalidName { name: String },
}

/// Raster decode/render errors
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to decode image")]
    Image(#[source] image::ImageError),

    #[error("Failed to decode TIFF")]
    Tiff(#[from] tiff::TiffError),

    #[error("Unsupported TIFF pixel layout: {layout}")]
    TiffLayout { layout: String },

    #[error("Failed to open PDF: {message}")]
    PdfOpen { message: String },

    #[error("Failed to render PDF page {page}: {message}")]
    PdfRender { page: u32, message: String },

    #[error("Page {page} out of range (document has {page_count} pages)")]
    PageOutOfRange { page: u32, page_count: u32 },

    #[error("Failed to encode raster")]
    Encode(#[source] image::ImageError),
}

/// Recognition result errors
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Failed to read analysis result")]
    Read(#[from] StorageError),

    #[error("Malformed analysis result: {name}")]
    Malformed {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Timed out waiting for analysis result")]
    Timeout,
}

/// API error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::SessionNotFound { .. }
            | ServiceError::AssetNotFound { .. }
            | ServiceError::RasterNotReady => StatusCode::NOT_FOUND,
            ServiceError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            ServiceError::Storage(StorageError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ServiceError::Storage(StorageError::InvalidName { .. }) => StatusCode::BAD_REQUEST,
            ServiceError::Storage(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Decode(DecodeError::PageOutOfRange { .. }) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ServiceError::SessionNotFound { .. } => "session_not_found",
            ServiceError::AssetNotFound { .. } => "asset_not_found",
            ServiceError::RasterNotReady => "raster_not_ready",
            ServiceError::Storage(StorageError::Listing { .. }) => "storage_listing",
            ServiceError::Storage(StorageError::Read { .. }) => "storage_read",
            ServiceError::Storage(StorageError::NotFound { .. }) => "storage_not_found",
            ServiceError::Storage(StorageError::InvalidName { .. }) => "storage_invalid_name",
            ServiceError::Decode(DecodeError::PageOutOfRange { .. }) => "page_out_of_range",
            ServiceError::Decode(_) => "decode_error",
            ServiceError::Analysis(AnalysisError::Timeout) => "analysis_timeout",
            ServiceError::Analysis(AnalysisError::Malformed { .. }) => "analysis_malformed",
            ServiceError::Analysis(_) => "analysis_error",
            ServiceError::InvalidRequest { .. } => "invalid_request",
        }
    }

    /// Message shown to the user. Storage failures on submit get a
    /// connection-oriented message; everything else uses the error display.
    fn user_message(&self) -> String {
        match self {
            ServiceError::Storage(StorageError::Listing { folder, .. }) => format!(
                "Cannot connect to the storage location (folder {:?}). \
                 Check the submitted path and credentials.",
                folder
            ),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code().to_string();

        let response = ErrorResponse {
            message: self.user_message(),
            code: Some(code),
        };

        (status, Json(response)).into_response()
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
