mod common;

use atoll_booking::{CreateBookingRequest, ReservationCoordinator};
use atoll_core::{BookingError, BookingPolicy, BookingStore, PackageStore, PaymentStore, TravelerField};
use atoll_domain::BookingStatus;
use chrono::NaiveDate;
use common::*;
use std::sync::Arc;

fn request(package_id: uuid::Uuid, count: usize) -> CreateBookingRequest {
    CreateBookingRequest {
        package_id,
        traveler_details: travelers(count),
        special_requests: None,
        departure_date: None,
    }
}

#[tokio::test]
async fn test_create_booking_end_to_end() {
    let app = app();
    let package_id = seed_package(&app.store, "Coral Coast", 10, 100000).await;
    let who = identity();

    let mut req = request(package_id, 3);
    req.special_requests = Some("vegetarian meals".to_string());

    let booking = app.coordinator.create_booking(&who, req).await.unwrap();

    assert_eq!(booking.traveler_count, 3);
    assert_eq!(booking.total_price, 300000);
    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(
        booking.payment_status,
        atoll_domain::PaymentState::Unpaid
    );
    assert_eq!(booked_count(&app.store, package_id).await, 3);

    let mine = app.store.list_bookings_by_user(who.user_id).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, booking.id);
}

#[tokio::test]
async fn test_total_price_is_a_snapshot() {
    let app = app();
    let package_id = seed_package(&app.store, "Coral Coast", 10, 100000).await;

    let booking = app
        .coordinator
        .create_booking(&identity(), request(package_id, 2))
        .await
        .unwrap();

    // a later price change must not retroactively alter the booking
    let mut package = app.store.get_package(package_id).await.unwrap().unwrap();
    package.price = 999999;
    app.store.upsert_package(&package).await.unwrap();

    let stored = app.store.get_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(stored.total_price, 200000);
}

#[tokio::test]
async fn test_validation_failure_reserves_nothing() {
    let app = app();
    let package_id = seed_package(&app.store, "Coral Coast", 10, 100000).await;

    let mut req = request(package_id, 2);
    req.traveler_details[0].email = String::new();

    let err = app
        .coordinator
        .create_booking(&identity(), req)
        .await
        .unwrap_err();

    match err {
        BookingError::ValidationFailed(violations) => {
            assert_eq!(violations.len(), 1);
            assert_eq!(violations[0].traveler_index, 0);
            assert_eq!(violations[0].field, TravelerField::Email);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(booked_count(&app.store, package_id).await, 0);
}

#[tokio::test]
async fn test_empty_traveler_list_rejected() {
    let app = app();
    let package_id = seed_package(&app.store, "Coral Coast", 10, 100000).await;

    let err = app
        .coordinator
        .create_booking(&identity(), request(package_id, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::ValidationFailed(_)));
}

#[tokio::test]
async fn test_traveler_cap_from_policy() {
    let app = app_with_policy(BookingPolicy {
        max_travelers_per_booking: 4,
        ..BookingPolicy::default()
    });
    let package_id = seed_package(&app.store, "Coral Coast", 10, 100000).await;

    let err = app
        .coordinator
        .create_booking(&identity(), request(package_id, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::InvalidArgument(_)));
    assert_eq!(booked_count(&app.store, package_id).await, 0);
}

#[tokio::test]
async fn test_capacity_exceeded_makes_no_change() {
    let app = app();
    let package_id = seed_package(&app.store, "Tiny Charter", 2, 50000).await;

    let err = app
        .coordinator
        .create_booking(&identity(), request(package_id, 3))
        .await
        .unwrap_err();

    assert!(matches!(err, BookingError::CapacityExceeded { .. }));
    assert_eq!(booked_count(&app.store, package_id).await, 0);
}

#[tokio::test]
async fn test_unknown_package_rejected_before_reserving() {
    let app = app();
    let err = app
        .coordinator
        .create_booking(&identity(), request(uuid::Uuid::new_v4(), 1))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::NotFound(_)));
}

#[tokio::test]
async fn test_departure_date_must_be_offered() {
    let app = app();
    let offered = NaiveDate::from_ymd_opt(2026, 9, 15).unwrap();
    let package_id =
        seed_package_with_dates(&app.store, "Dated Tour", 10, 100000, vec![offered]).await;

    let mut req = request(package_id, 1);
    req.departure_date = Some(NaiveDate::from_ymd_opt(2026, 9, 16).unwrap());
    let err = app
        .coordinator
        .create_booking(&identity(), req)
        .await
        .unwrap_err();
    match err {
        BookingError::ValidationFailed(violations) => {
            assert_eq!(violations[0].field, TravelerField::DepartureDate);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(booked_count(&app.store, package_id).await, 0);

    let mut req = request(package_id, 1);
    req.departure_date = Some(offered);
    let booking = app.coordinator.create_booking(&identity(), req).await.unwrap();
    assert_eq!(booking.departure_date, Some(offered));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reservations_admit_exactly_one_winner() {
    let app = app();
    let package_id = seed_package(&app.store, "Contested", 10, 100000).await;

    // fill to 8 of 10 so the two racing requests cannot both fit
    app.coordinator
        .create_booking(&identity(), request(package_id, 8))
        .await
        .unwrap();

    let coordinator = Arc::new(app.coordinator);
    let c1 = coordinator.clone();
    let c2 = coordinator.clone();
    let first = tokio::spawn(async move { c1.create_booking(&identity(), request(package_id, 2)).await });
    let second = tokio::spawn(async move { c2.create_booking(&identity(), request(package_id, 1)).await });

    let results = [first.await.unwrap(), second.await.unwrap()];
    let winners = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(BookingError::CapacityExceeded { .. })))
        .count();

    assert_eq!(winners, 1);
    assert_eq!(rejected, 1);

    let booked = booked_count(&app.store, package_id).await;
    assert!(booked == 9 || booked == 10, "booked was {booked}");
}

#[tokio::test]
async fn test_persistence_failure_compensates_reservation() {
    let store = Arc::new(atoll_store::MemoryStore::new());
    let failing = Arc::new(FailingBookingStore::new(store.clone()));
    let packages: Arc<dyn PackageStore> = store.clone();
    let payments: Arc<dyn PaymentStore> = store.clone();
    let bookings: Arc<dyn BookingStore> = failing.clone();
    let coordinator = ReservationCoordinator::new(
        packages,
        bookings,
        payments,
        BookingPolicy::default(),
    );

    let package_id = seed_package(&store, "Flaky Infra", 10, 100000).await;
    failing.fail_inserts(true);

    let err = coordinator
        .create_booking(&identity(), request(package_id, 3))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Persistence(_)));

    // the reservation must not outlive the failed insert
    assert_eq!(booked_count(&store, package_id).await, 0);

    failing.fail_inserts(false);
    coordinator
        .create_booking(&identity(), request(package_id, 3))
        .await
        .unwrap();
    assert_eq!(booked_count(&store, package_id).await, 3);
}

#[tokio::test]
async fn test_cancel_releases_capacity_once() {
    let app = app();
    let package_id = seed_package(&app.store, "Coral Coast", 10, 100000).await;
    let booking = app
        .coordinator
        .create_booking(&identity(), request(package_id, 3))
        .await
        .unwrap();
    assert_eq!(booked_count(&app.store, package_id).await, 3);

    app.coordinator.cancel_booking(booking.id).await.unwrap();
    let (status, _) = booking_state(&app.store, booking.id).await;
    assert_eq!(status, BookingStatus::Cancelled);
    assert_eq!(booked_count(&app.store, package_id).await, 0);

    // a second cancellation is rejected and must not release again
    app.coordinator
        .create_booking(&identity(), request(package_id, 2))
        .await
        .unwrap();
    let err = app.coordinator.cancel_booking(booking.id).await.unwrap_err();
    assert!(matches!(err, BookingError::InvalidTransition { .. }));
    assert_eq!(booked_count(&app.store, package_id).await, 2);
}

#[tokio::test]
async fn test_admin_transitions_follow_state_machine() {
    let app = app();
    let package_id = seed_package(&app.store, "Coral Coast", 10, 100000).await;
    let booking = app
        .coordinator
        .create_booking(&identity(), request(package_id, 2))
        .await
        .unwrap();

    let err = app
        .coordinator
        .transition_booking(booking.id, BookingStatus::Completed)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::InvalidTransition { .. }));

    app.coordinator
        .transition_booking(booking.id, BookingStatus::Confirmed)
        .await
        .unwrap();
    app.coordinator
        .transition_booking(booking.id, BookingStatus::Completed)
        .await
        .unwrap();

    // completed trips stay completed
    let err = app
        .coordinator
        .transition_booking(booking.id, BookingStatus::Cancelled)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::InvalidTransition { .. }));
    let (status, _) = booking_state(&app.store, booking.id).await;
    assert_eq!(status, BookingStatus::Completed);
    assert_eq!(booked_count(&app.store, package_id).await, 2);
}

#[tokio::test]
async fn test_stale_cancel_racing_a_confirm_retries_on_fresh_state() {
    let store = Arc::new(atoll_store::MemoryStore::new());
    let racing = Arc::new(RacingBookingStore::new(store.clone()));
    let packages: Arc<dyn PackageStore> = store.clone();
    let payments: Arc<dyn PaymentStore> = store.clone();
    let bookings: Arc<dyn BookingStore> = racing.clone();
    let coordinator =
        ReservationCoordinator::new(packages, bookings, payments, BookingPolicy::default());

    let package_id = seed_package(&store, "Contested Cancel", 10, 100000).await;
    let booking = coordinator
        .create_booking(&identity(), request(package_id, 2))
        .await
        .unwrap();

    // the first status write loses to an interleaved confirm; the cancel
    // must reload, revalidate Confirmed -> Cancelled, and still land
    coordinator.cancel_booking(booking.id).await.unwrap();

    let stored = store.get_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(stored.status, BookingStatus::Cancelled);
    assert_eq!(stored.version, 2);
    assert_eq!(booked_count(&store, package_id).await, 0);
}

#[tokio::test]
async fn test_cancel_missing_booking() {
    let app = app();
    let err = app
        .coordinator
        .cancel_booking(uuid::Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::NotFound(_)));
}
