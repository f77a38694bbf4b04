//! Core traits and helpers for typed records.
//!
//! A record is a serde-serializable struct with a 12-byte identity stored under `_id`.
//! The identity is all zeroes until the record is first persisted; the store uses that
//! to decide between insert and replace.

use bson::{Bson, Document, de::deserialize_from_document, oid::ObjectId, ser::serialize_to_document};
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::{StoreError, StoreResult};

/// Field name the identity is stored under.
pub const ID_FIELD: &str = "_id";

/// Core trait that every record kept in a [`Store`](crate::store::Store) must implement.
///
/// # Example
///
/// ```ignore
/// use quarry::record::{Record, zero_id};
/// use bson::oid::ObjectId;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct Download {
///     #[serde(rename = "_id", default = "zero_id")]
///     pub id: ObjectId,
///     pub status: String,
/// }
///
/// impl Record for Download {
///     fn id(&self) -> &ObjectId {
///         &self.id
///     }
///
///     fn set_id(&mut self, id: ObjectId) {
///         self.id = id;
///     }
/// }
/// ```
pub trait Record: Serialize + DeserializeOwned + Send + Sync + Clone + 'static {
    /// Returns this record's identity. All zeroes before the first save.
    fn id(&self) -> &ObjectId;

    /// Replaces this record's identity. Called by the store after an insert.
    fn set_id(&mut self, id: ObjectId);

    /// Called right before the record is written.
    ///
    /// `creating` is true for inserts. The default does nothing; records that carry
    /// created/updated timestamps override it.
    fn touch(&mut self, _at: DateTime<Utc>, _creating: bool) {}
}

/// Extension trait providing BSON conversion for records.
///
/// Automatically implemented for every [`Record`].
pub trait RecordExt: Record {
    /// Converts this record to a BSON document for storage.
    fn to_document(&self) -> StoreResult<Document>;

    /// Decodes a record from a BSON document.
    fn from_document(document: Document) -> StoreResult<Self>;

    /// Returns true if this record has never been persisted.
    fn is_new(&self) -> bool {
        is_zero_id(self.id())
    }
}

impl<R: Record> RecordExt for R {
    fn to_document(&self) -> StoreResult<Document> {
        Ok(serialize_to_document(self)?)
    }

    fn from_document(document: Document) -> StoreResult<Self> {
        Ok(deserialize_from_document(document)?)
    }
}

/// Returns the zero identity. Usable as a serde `default`.
pub fn zero_id() -> ObjectId {
    ObjectId::from_bytes([0; 12])
}

/// Returns true if `id` is the zero identity.
pub fn is_zero_id(id: &ObjectId) -> bool {
    id.bytes() == [0; 12]
}

/// Parses a 24-character hex string into an identity.
pub fn parse_id(hex: &str) -> StoreResult<ObjectId> {
    ObjectId::parse_str(hex)
        .map_err(|e| StoreError::InvalidIdentity(format!("{hex:?}: {e}")))
}

/// Removes `_id` from `document` when it is absent-equivalent (zero or null) and
/// returns the identity it carried otherwise.
///
/// Backends call this before inserting so that they, not the caller, assign fresh
/// identities.
pub fn take_assigned_id(document: &mut Document) -> Option<ObjectId> {
    match document.get(ID_FIELD) {
        Some(Bson::ObjectId(id)) if !is_zero_id(id) => Some(*id),
        Some(_) => {
            document.remove(ID_FIELD);
            None
        }
        None => None,
    }
}
