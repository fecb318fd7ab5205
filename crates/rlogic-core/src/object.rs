use serde::{Deserialize, Serialize};

use crate::id::ObjectId;

/// Identity shared by every logic object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub id: ObjectId,
    pub name: String,
    /// Optional opaque user tag (high, low).
    pub user_id: Option<(u64, u64)>,
}

impl ObjectMeta {
    /// Fresh identity with a newly allocated id.
    pub(crate) fn new(name: impl Into<String>) -> Self {
        ObjectMeta {
            id: ObjectId::next(),
            name: name.into(),
            user_id: None,
        }
    }

    /// Identity read back from persisted data. Advances the id counter past
    /// `id`.
    pub fn restored(id: ObjectId, name: impl Into<String>, user_id: Option<(u64, u64)>) -> Self {
        ObjectId::reserve_through(id);
        ObjectMeta {
            id,
            name: name.into(),
            user_id,
        }
    }
}

/// Named immutable source blob that scripts may depend on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptModule {
    pub meta: ObjectMeta,
    pub source: String,
}
