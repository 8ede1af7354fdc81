//! Places: rentable places that users offer and others book.

use chrono::NaiveDate;
use roost_cache::{CacheConfig, EntityKind};
use roost_protocol::{EntityId, UserId};
use serde::{Deserialize, Serialize};

/// Image used when a new place comes without one.
pub const DEFAULT_IMAGE_URL: &str =
    "https://upload.wikimedia.org/wikipedia/commons/thumb/e/e6/Paris_Night.jpg/1024px-Paris_Night.jpg";

/// Where a place is, as picked on a map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceLocation {
    pub lat: f64,
    pub lng: f64,
    pub address: String,
    #[serde(default)]
    pub static_map_image_url: String,
}

/// A place offered for rent.
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub id: EntityId,
    pub owner: UserId,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub price: f64,
    pub available_from: NaiveDate,
    pub available_to: NaiveDate,
    pub location: Option<PlaceLocation>,
}

impl Place {
    /// A user can book any place but their own.
    pub fn is_bookable_by(&self, user: &UserId) -> bool {
        &self.owner != user
    }

    /// `true` if `[from, to]` lies within the availability window.
    pub fn is_available(&self, from: NaiveDate, to: NaiveDate) -> bool {
        from <= to && self.available_from <= from && to <= self.available_to
    }
}

/// A place as the remote stores it, keyed by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceRecord {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
    pub price: f64,
    #[serde(with = "crate::dates")]
    pub from: NaiveDate,
    #[serde(with = "crate::dates")]
    pub to: NaiveDate,
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<PlaceLocation>,
}

/// What it takes to offer a new place.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPlace {
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub price: f64,
    pub available_from: NaiveDate,
    pub available_to: NaiveDate,
    pub location: Option<PlaceLocation>,
}

/// Changes to an offered place. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlacePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
}

impl PlacePatch {
    /// New title and description, the edit-offer form.
    pub fn retitle(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            description: Some(description.into()),
            price: None,
        }
    }
}

/// The places collection: every offered place, whoever owns it.
pub struct Places;

impl EntityKind for Places {
    type Entity = Place;
    type Record = PlaceRecord;
    type Draft = NewPlace;
    type Patch = PlacePatch;

    fn cache_config() -> CacheConfig {
        CacheConfig::new("places")
    }

    fn id(place: &Place) -> &EntityId {
        &place.id
    }

    fn owner(place: &Place) -> &UserId {
        &place.owner
    }

    fn from_record(id: EntityId, record: PlaceRecord) -> Place {
        Place {
            id,
            owner: record.user_id,
            title: record.title,
            description: record.description,
            image_url: record.image_url,
            price: record.price,
            available_from: record.from,
            available_to: record.to,
            location: record.location,
        }
    }

    fn to_record(place: &Place) -> PlaceRecord {
        PlaceRecord {
            title: place.title.clone(),
            description: place.description.clone(),
            image_url: place.image_url.clone(),
            price: place.price,
            from: place.available_from,
            to: place.available_to,
            user_id: place.owner.clone(),
            location: place.location.clone(),
        }
    }

    fn build(id: EntityId, owner: UserId, draft: NewPlace) -> Place {
        Place {
            id,
            owner,
            title: draft.title,
            description: draft.description,
            image_url: draft
                .image_url
                .unwrap_or_else(|| DEFAULT_IMAGE_URL.to_string()),
            price: draft.price,
            available_from: draft.available_from,
            available_to: draft.available_to,
            location: draft.location,
        }
    }

    fn with_id(place: Place, id: EntityId) -> Place {
        Place { id, ..place }
    }

    fn apply_patch(place: &Place, patch: PlacePatch) -> Place {
        let mut next = place.clone();
        if let Some(title) = patch.title {
            next.title = title;
        }
        if let Some(description) = patch.description {
            next.description = description;
        }
        if let Some(price) = patch.price {
            next.price = price;
        }
        next
    }
}
