//! Core data models for the certificate analysis service.
//!
//! `bucket` and `object` map to the local object store tables via
//! `sqlx::FromRow`. `storage_event`, `ocr` and `analysis` describe the
//! pipeline's inputs, the OCR service wire format and the persisted record.

pub mod analysis;
pub mod bucket;
pub mod object;
pub mod ocr;
pub mod storage_event;
