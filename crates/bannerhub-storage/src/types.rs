//! Domain types shared by every storage backend.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::error::StorageError;

/// Banner identifier.
pub type BannerId = i64;
/// Feature identifier.
pub type FeatureId = i64;
/// Tag identifier.
pub type TagId = i64;
/// Identifier of a single banner/tag association row.
pub type AssociationId = i64;

/// Banner content with its three mandatory string fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BannerContent {
    pub title: String,
    pub text: String,
    pub url: String,
}

impl BannerContent {
    /// Field names in validation order.
    pub const FIELDS: [&'static str; 3] = ["title", "text", "url"];

    #[must_use]
    pub fn new(title: impl Into<String>, text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            url: url.into(),
        }
    }

    /// Builds content from an untyped JSON object.
    ///
    /// Every field in [`Self::FIELDS`] must be present and a JSON string.
    /// Extra keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidField` naming the first field that is
    /// missing or not a string.
    pub fn from_value(value: &Value) -> Result<Self, StorageError> {
        let field = |name: &str| -> Result<String, StorageError> {
            value
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or_else(|| StorageError::invalid_field(name))
        };

        Ok(Self {
            title: field("title")?,
            text: field("text")?,
            url: field("url")?,
        })
    }
}

impl TryFrom<&Value> for BannerContent {
    type Error = StorageError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

/// A banner as stored in the relational store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Banner {
    pub id: BannerId,
    pub feature_id: FeatureId,
    /// Active tags in association order. Retired slots are not listed.
    pub tag_ids: Vec<TagId>,
    pub content: BannerContent,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Input for creating a banner together with its initial tags.
#[derive(Debug, Clone)]
pub struct NewBanner {
    pub feature_id: FeatureId,
    pub tag_ids: Vec<TagId>,
    pub content: BannerContent,
    pub is_active: bool,
}

/// What a tag association row currently points at.
///
/// Shrinking a banner's tag list retires surplus rows rather than deleting
/// them; a retired row still occupies its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagSlot {
    Active(TagId),
    Retired,
}

impl TagSlot {
    /// Returns the tag id of an active slot.
    #[must_use]
    pub fn tag_id(self) -> Option<TagId> {
        match self {
            Self::Active(tag_id) => Some(tag_id),
            Self::Retired => None,
        }
    }

    #[must_use]
    pub fn is_retired(self) -> bool {
        matches!(self, Self::Retired)
    }
}

impl From<Option<TagId>> for TagSlot {
    fn from(value: Option<TagId>) -> Self {
        value.map_or(Self::Retired, Self::Active)
    }
}

/// One row binding a banner to a tag slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagAssociation {
    pub id: AssociationId,
    pub banner_id: BannerId,
    pub slot: TagSlot,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_from_value() {
        let content = BannerContent::from_value(&json!({
            "title": "some_title",
            "text": "some_text",
            "url": "some_url",
            "extra": 1
        }))
        .unwrap();
        assert_eq!(content, BannerContent::new("some_title", "some_text", "some_url"));
    }

    #[test]
    fn test_content_wrong_type_names_field() {
        let err = BannerContent::from_value(&json!({
            "title": "t",
            "text": 15,
            "url": "u"
        }))
        .unwrap_err();
        assert!(matches!(err, StorageError::InvalidField { ref field } if field == "text"));
        assert_eq!(err.to_string(), "invalid type for parameter: text");
    }

    #[test]
    fn test_content_missing_field() {
        let err = BannerContent::try_from(&json!({"title": "t", "text": "x"})).unwrap_err();
        assert!(matches!(err, StorageError::InvalidField { ref field } if field == "url"));
    }

    #[test]
    fn test_tag_slot_from_option() {
        assert_eq!(TagSlot::from(Some(7)), TagSlot::Active(7));
        assert_eq!(TagSlot::from(None), TagSlot::Retired);
        assert_eq!(TagSlot::Active(7).tag_id(), Some(7));
        assert!(TagSlot::Retired.is_retired());
    }

    #[test]
    fn test_banner_snapshot_roundtrip_msgpack() {
        let banner = Banner {
            id: 1,
            feature_id: 2,
            tag_ids: vec![3, 4],
            content: BannerContent::new("t", "x", "u"),
            is_active: true,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        };
        let bytes = rmp_serde::to_vec(&banner).unwrap();
        let decoded: Banner = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(decoded, banner);
    }
}
