//! Services behind the HTTP layer: the object store, the OCR client, field
//! extraction, result persistence and the orchestrator tying them together.

pub mod events;
pub mod field_extraction;
pub mod ocr_client;
pub mod orchestrator;
pub mod result_store;
pub mod storage_service;

#[cfg(test)]
pub(crate) mod testing;
