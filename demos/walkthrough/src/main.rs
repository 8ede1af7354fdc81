use std::sync::Arc;

use chrono::NaiveDate;
use roost::prelude::*;
use serde_json::json;
use tracing::info;

// ---------------------------------------------------------------------------
// Backend fixture
// ---------------------------------------------------------------------------

fn backend() -> Arc<MemoryBackend> {
    let backend = MemoryBackend::default();
    backend.register_account("host@example.com", "host-pass", "u-host");
    backend.register_account("guest@example.com", "guest-pass", "u-guest");
    backend.seed(
        "places",
        "p1",
        json!({
            "title": "Manhattan Mansion",
            "description": "In the heart of New York City.",
            "imageUrl": "https://example.com/mansion.jpg",
            "price": 149.99,
            "from": "2019-01-01",
            "to": "2019-12-31",
            "userId": "u-host"
        }),
    );
    Arc::new(backend)
}

fn date(m: u32, d: u32) -> Result<NaiveDate, String> {
    NaiveDate::from_ymd_opt(2019, m, d).ok_or_else(|| format!("bad date 2019-{m}-{d}"))
}

type Client = RoostClient<MemoryBackend, FileStore, RecordingNavigator>;

fn client(backend: &Arc<MemoryBackend>, store: &Arc<FileStore>) -> Client {
    RoostClientBuilder::new(Arc::clone(backend))
        .build(Arc::clone(store), Arc::new(RecordingNavigator::new()))
}

// ---------------------------------------------------------------------------
// Walkthrough
// ---------------------------------------------------------------------------

/// The guest logs in, offers a place and books the host's.
async fn first_run(client: &Client) -> Result<Booking, Box<dyn std::error::Error>> {
    if !client.can_enter("/places/tabs/discover").await {
        info!(redirects = ?client.gate().navigator().redirects(), "not logged in yet");
    }
    let session = client
        .login(&Credentials::new("guest@example.com", "guest-pass"))
        .await?;
    info!(identity = %session.identity, "logged in");

    let places = client.places().refresh().await?;
    info!(count = places.len(), "places loaded");

    let offered = client
        .places()
        .create(NewPlace {
            title: "Garden Room".into(),
            description: "Quiet, with a view of the lilacs.".into(),
            image_url: None,
            price: 59.0,
            available_from: date(4, 1)?,
            available_to: date(9, 30)?,
            location: None,
        })
        .await?;
    info!(id = %offered.id, offers = client.offers().len(), "place offered");

    let target = client
        .bookable_places()
        .into_iter()
        .next()
        .ok_or("nothing to book")?;
    let booking = client
        .bookings()
        .create(NewBooking::for_place(
            &target,
            "Gwen",
            "Guest",
            2,
            date(6, 10)?,
            date(6, 14)?,
        ))
        .await?;
    info!(
        id = %booking.id,
        place = %booking.place_title,
        nights = booking.nights(),
        "booked"
    );
    Ok(booking)
}

/// A fresh client over the same storage picks the session back up.
async fn second_run(client: &Client) -> Result<(), Box<dyn std::error::Error>> {
    if !client.can_enter("/bookings").await {
        return Err("persisted session was not resumed".into());
    }
    let bookings = client.bookings().refresh().await?;
    info!(identity = ?client.identity(), count = bookings.len(), "resumed");

    for booking in &bookings {
        client.bookings().delete(&booking.id).await?;
        info!(id = %booking.id, "booking cancelled");
    }

    client.logout().await?;
    info!(authenticated = client.is_authenticated(), "logged out");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    roost::init_logging("info");

    let backend = backend();
    let store = Arc::new(FileStore::new(std::env::temp_dir().join("roost-walkthrough")));

    let booking = first_run(&client(&backend, &store)).await?;
    second_run(&client(&backend, &store)).await?;

    info!(
        id = %booking.id,
        remaining = backend.ids("bookings").len(),
        requests = backend.request_count(),
        "done"
    );
    Ok(())
}
