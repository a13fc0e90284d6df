//! Persistence: the JSON document store and the update marker.

mod feds;
mod marker;
mod notes;
mod store;

pub use feds::{FED_COLLECTION, FedRecord};
pub use marker::{LocalVersion, MARKER_FORMAT, UpdateMarker, format_marker_date};
pub use notes::{NOTES_COLLECTION, NoteContent, NoteRecord, normalize_name};
pub use store::{Collection, DocumentStore, Record, StoreError};
