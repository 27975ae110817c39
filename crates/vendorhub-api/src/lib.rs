//! HTTP-facing building blocks shared by every VendorHub handler.

mod error;
pub mod export;
pub mod extract;
pub mod pagination;
mod response;

pub use error::ApiError;
pub use export::{CsvDownload, CsvTable, CsvWriter, ExportError};
pub use extract::{ApiJson, ApiQuery};
pub use pagination::{PageParams, PageRequest, Pagination};
pub use response::ApiResponse;
