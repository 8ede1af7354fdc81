//! Bookings: a user's reservations of other users' places.

use chrono::NaiveDate;
use roost_cache::{CacheConfig, EntityKind};
use roost_protocol::{EntityId, UserId};
use serde::{Deserialize, Serialize};

use crate::Place;

/// A reservation of a place for a date range.
#[derive(Debug, Clone, PartialEq)]
pub struct Booking {
    pub id: EntityId,
    pub owner: UserId,
    pub place_id: EntityId,
    pub place_title: String,
    pub place_image: String,
    pub first_name: String,
    pub last_name: String,
    pub guest_number: u32,
    pub booked_from: NaiveDate,
    pub booked_to: NaiveDate,
}

impl Booking {
    /// Number of nights booked.
    pub fn nights(&self) -> i64 {
        (self.booked_to - self.booked_from).num_days()
    }
}

/// A booking as the remote stores it, keyed by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRecord {
    pub place_id: EntityId,
    pub user_id: UserId,
    pub place_title: String,
    #[serde(default)]
    pub place_image: String,
    pub first_name: String,
    pub last_name: String,
    pub guest_number: u32,
    #[serde(with = "crate::dates")]
    pub booked_from: NaiveDate,
    #[serde(with = "crate::dates")]
    pub booked_to: NaiveDate,
}

/// What it takes to book a place.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBooking {
    pub place_id: EntityId,
    pub place_title: String,
    pub place_image: String,
    pub first_name: String,
    pub last_name: String,
    pub guest_number: u32,
    pub booked_from: NaiveDate,
    pub booked_to: NaiveDate,
}

impl NewBooking {
    /// A booking of `place`, copying the title and image it shows.
    pub fn for_place(
        place: &Place,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        guest_number: u32,
        booked_from: NaiveDate,
        booked_to: NaiveDate,
    ) -> Self {
        Self {
            place_id: place.id.clone(),
            place_title: place.title.clone(),
            place_image: place.image_url.clone(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            guest_number,
            booked_from,
            booked_to,
        }
    }
}

/// Changes to a booking. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingPatch {
    pub guest_number: Option<u32>,
    pub booked_from: Option<NaiveDate>,
    pub booked_to: Option<NaiveDate>,
}

/// The bookings collection, scoped to the logged-in user.
pub struct Bookings;

impl EntityKind for Bookings {
    type Entity = Booking;
    type Record = BookingRecord;
    type Draft = NewBooking;
    type Patch = BookingPatch;

    fn cache_config() -> CacheConfig {
        CacheConfig::new("bookings").owned()
    }

    fn id(booking: &Booking) -> &EntityId {
        &booking.id
    }

    fn owner(booking: &Booking) -> &UserId {
        &booking.owner
    }

    fn from_record(id: EntityId, record: BookingRecord) -> Booking {
        Booking {
            id,
            owner: record.user_id,
            place_id: record.place_id,
            place_title: record.place_title,
            place_image: record.place_image,
            first_name: record.first_name,
            last_name: record.last_name,
            guest_number: record.guest_number,
            booked_from: record.booked_from,
            booked_to: record.booked_to,
        }
    }

    fn to_record(booking: &Booking) -> BookingRecord {
        BookingRecord {
            place_id: booking.place_id.clone(),
            user_id: booking.owner.clone(),
            place_title: booking.place_title.clone(),
            place_image: booking.place_image.clone(),
            first_name: booking.first_name.clone(),
            last_name: booking.last_name.clone(),
            guest_number: booking.guest_number,
            booked_from: booking.booked_from,
            booked_to: booking.booked_to,
        }
    }

    fn build(id: EntityId, owner: UserId, draft: NewBooking) -> Booking {
        Booking {
            id,
            owner,
            place_id: draft.place_id,
            place_title: draft.place_title,
            place_image: draft.place_image,
            first_name: draft.first_name,
            last_name: draft.last_name,
            guest_number: draft.guest_number,
            booked_from: draft.booked_from,
            booked_to: draft.booked_to,
        }
    }

    fn with_id(booking: Booking, id: EntityId) -> Booking {
        Booking { id, ..booking }
    }

    fn apply_patch(booking: &Booking, patch: BookingPatch) -> Booking {
        Booking {
            guest_number: patch.guest_number.unwrap_or(booking.guest_number),
            booked_from: patch.booked_from.unwrap_or(booking.booked_from),
            booked_to: patch.booked_to.unwrap_or(booking.booked_to),
            ..booking.clone()
        }
    }
}
