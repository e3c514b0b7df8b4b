//! Landlord onboarding: the happy path, atomic rollback and idempotent replay.

mod test_utils;

use std::time::Duration;

use anyhow::Result;
use leasegate::error::CoreError;
use leasegate::models::{Profile, Property, PropertyArea, Role, profile, property, property_area};
use leasegate::transactions::{TransactionOutcome, TransactionSettings, onboard_landlord};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use test_utils::{
    invite_settings, onboard, onboarding_request, redeem, setup_test_db, subject, tx_settings,
};

#[tokio::test]
async fn oak_st_duplex_creates_property_areas_and_landlord_profile() -> Result<()> {
    let db = setup_test_db().await?;
    let landlord = subject("landlord-l");

    let outcome = onboard_landlord(
        &db,
        &tx_settings(),
        Some(&landlord),
        onboarding_request("Oak St Duplex", &["Kitchen", "Bedroom"]),
        None,
    )
    .await;
    assert!(outcome.is_success());
    assert!(outcome.error_message().is_none());
    let onboarded = outcome.into_result()?;
    assert!(onboarded.created);
    assert_eq!(onboarded.join_code.len(), 8);

    let stored = Property::find_by_id(onboarded.property_id)
        .one(&db)
        .await?
        .expect("property committed");
    assert_eq!(stored.name, "Oak St Duplex");
    assert_eq!(stored.bedrooms, 3);
    assert_eq!(stored.bathrooms, 2);

    let mut areas: Vec<String> = PropertyArea::find()
        .filter(property_area::Column::PropertyId.eq(onboarded.property_id))
        .all(&db)
        .await?
        .into_iter()
        .map(|area| area.name)
        .collect();
    areas.sort();
    assert_eq!(areas, vec!["Bedroom".to_string(), "Kitchen".to_string()]);

    let profile = Profile::find()
        .filter(profile::Column::ExternalSubject.eq("landlord-l"))
        .one(&db)
        .await?
        .expect("profile created");
    assert_eq!(profile.role, Role::Landlord);
    assert!(profile.onboarding_completed);
    assert_eq!(stored.owner_profile_id, profile.id);

    Ok(())
}

#[tokio::test]
async fn duplicate_area_rolls_back_everything() -> Result<()> {
    let db = setup_test_db().await?;
    let landlord = subject("landlord-l");

    let outcome = onboard_landlord(
        &db,
        &tx_settings(),
        Some(&landlord),
        onboarding_request("Oak St Duplex", &["Kitchen", "Kitchen"]),
        None,
    )
    .await;

    assert!(!outcome.is_success());
    assert!(outcome.error_message().is_some());
    assert!(matches!(outcome, TransactionOutcome::Failure(CoreError::Conflict(_))));

    assert_eq!(Property::find().count(&db).await?, 0);
    assert_eq!(PropertyArea::find().count(&db).await?, 0);
    assert_eq!(
        Profile::find().count(&db).await?,
        0,
        "profile insert shares the rolled-back transaction"
    );

    Ok(())
}

#[tokio::test]
async fn validation_failures_touch_nothing() -> Result<()> {
    let db = setup_test_db().await?;
    let landlord = subject("landlord-l");

    let mut request = onboarding_request("", &["Kitchen"]);
    let outcome = onboard_landlord(&db, &tx_settings(), Some(&landlord), request.clone(), None).await;
    assert!(matches!(
        outcome,
        TransactionOutcome::Failure(CoreError::Validation { field: "property_name", .. })
    ));

    request.property_name = "Oak St Duplex".to_string();
    request.bathrooms = -2;
    let outcome = onboard_landlord(&db, &tx_settings(), Some(&landlord), request, None).await;
    assert!(matches!(
        outcome,
        TransactionOutcome::Failure(CoreError::Validation { field: "bathrooms", .. })
    ));

    let outcome = onboard_landlord(
        &db,
        &tx_settings(),
        Some(&landlord),
        onboarding_request("Oak St Duplex", &[]),
        None,
    )
    .await;
    assert!(matches!(
        outcome,
        TransactionOutcome::Failure(CoreError::Validation { field: "area_names", .. })
    ));

    assert_eq!(Profile::find().count(&db).await?, 0);
    assert_eq!(Property::find().count(&db).await?, 0);
    Ok(())
}

#[tokio::test]
async fn idempotency_key_replays_the_first_result() -> Result<()> {
    let db = setup_test_db().await?;
    let landlord = subject("landlord-l");
    let request = onboarding_request("Oak St Duplex", &["Kitchen"]);

    let first = onboard_landlord(&db, &tx_settings(), Some(&landlord), request.clone(), Some("req-1"))
        .await
        .into_result()?;
    let replay = onboard_landlord(&db, &tx_settings(), Some(&landlord), request.clone(), Some("req-1"))
        .await
        .into_result()?;

    assert!(first.created);
    assert!(!replay.created);
    assert_eq!(first.property_id, replay.property_id);
    assert_eq!(first.join_code, replay.join_code);
    assert_eq!(Property::find().count(&db).await?, 1);

    // A different key is a different property.
    let second = onboard_landlord(&db, &tx_settings(), Some(&landlord), request, Some("req-2"))
        .await
        .into_result()?;
    assert!(second.created);
    assert_ne!(second.property_id, first.property_id);

    let owned = Property::find()
        .filter(property::Column::Name.eq("Oak St Duplex"))
        .count(&db)
        .await?;
    assert_eq!(owned, 2);
    Ok(())
}

#[tokio::test]
async fn tenant_cannot_become_a_landlord() -> Result<()> {
    let db = setup_test_db().await?;
    let settings = invite_settings();
    let landlord = subject("landlord-l");
    let tenant = subject("tenant-t");

    let property = onboard(&db, &landlord, "Oak St Duplex").await?;
    let invite = test_utils::issue(&db, &settings, &landlord, property.property_id).await?;
    redeem(&db, &settings, &tenant, &invite.token).await?;

    let outcome = onboard_landlord(
        &db,
        &tx_settings(),
        Some(&tenant),
        onboarding_request("Escalation Manor", &["Hall"]),
        None,
    )
    .await;
    assert!(matches!(
        outcome,
        TransactionOutcome::Failure(CoreError::Validation { field: "role", .. })
    ));

    let profile = leasegate::auth::resolve_profile(&db, &tenant)
        .await?
        .expect("tenant profile");
    assert_eq!(profile.role, Role::Tenant);
    assert_eq!(Property::find().count(&db).await?, 1);
    Ok(())
}

#[tokio::test]
async fn landlord_can_onboard_more_properties() -> Result<()> {
    let db = setup_test_db().await?;
    let landlord = subject("landlord-l");

    let first = onboard(&db, &landlord, "Oak St Duplex").await?;
    let second = onboard(&db, &landlord, "Elm St Flat").await?;

    assert_ne!(first.property_id, second.property_id);
    assert_ne!(first.join_code, second.join_code);
    assert_eq!(Profile::find().count(&db).await?, 1);
    Ok(())
}

#[tokio::test]
async fn display_name_fills_an_unnamed_profile_but_never_overwrites() -> Result<()> {
    let db = setup_test_db().await?;
    let landlord = subject("landlord-l");
    onboard(&db, &landlord, "Oak St Duplex").await?;

    let named = |property: &str, name: &str| {
        let mut request = onboarding_request(property, &["Kitchen"]);
        request.display_name = Some(name.to_string());
        request
    };

    onboard_landlord(&db, &tx_settings(), Some(&landlord), named("Elm St Flat", "Lee"), None)
        .await
        .into_result()?;
    onboard_landlord(&db, &tx_settings(), Some(&landlord), named("Ash St Loft", "Someone Else"), None)
        .await
        .into_result()?;

    let profile = Profile::find()
        .filter(profile::Column::ExternalSubject.eq("landlord-l"))
        .one(&db)
        .await?
        .expect("landlord profile");
    assert_eq!(profile.display_name.as_deref(), Some("Lee"));
    Ok(())
}

#[tokio::test]
async fn zero_timeout_rolls_back_with_retryable_failure() -> Result<()> {
    let db = setup_test_db().await?;
    let landlord = subject("landlord-l");
    let settings = TransactionSettings {
        timeout: Duration::ZERO,
        require_areas: true,
    };

    let outcome = onboard_landlord(
        &db,
        &settings,
        Some(&landlord),
        onboarding_request("Oak St Duplex", &["Kitchen"]),
        None,
    )
    .await;

    assert!(matches!(
        outcome,
        TransactionOutcome::Failure(CoreError::TransactionFailure { retryable: true, .. })
    ));
    assert_eq!(Property::find().count(&db).await?, 0);
    assert_eq!(Profile::find().count(&db).await?, 0);
    Ok(())
}
