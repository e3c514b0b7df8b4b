//! Invite issuance, validation, expiry, listing and revocation.

mod test_utils;

use anyhow::Result;
use chrono::{TimeDelta, Utc};
use leasegate::error::{CoreError, INVITE_INVALID_MESSAGE};
use leasegate::invites::{self, INVITE_ALPHABET, INVITE_SECRET_LEN, InviteState, IssueInviteRequest};
use leasegate::models::{DeliveryMethod, InviteToken, PropertyType};
use sea_orm::EntityTrait;
use test_utils::{invite_settings, issue, linked_fixture, onboard, redeem, setup_test_db, subject};

#[tokio::test]
async fn issued_secret_is_returned_once_and_never_stored() -> Result<()> {
    let db = setup_test_db().await?;
    let settings = invite_settings();
    let landlord = subject("landlord-l");
    let property = onboard(&db, &landlord, "Oak St Duplex").await?;

    let issued = issue(&db, &settings, &landlord, property.property_id).await?;
    assert_eq!(issued.token.len(), INVITE_SECRET_LEN);
    assert!(issued.token.bytes().all(|b| INVITE_ALPHABET.contains(&b)));
    assert_eq!(issued.pending_ttl_minutes, 30);

    let row = InviteToken::find_by_id(issued.id)
        .one(&db)
        .await?
        .expect("invite persisted");
    for stored in [&row.lookup_digest, &row.secret_salt, &row.secret_hash] {
        assert!(!stored.contains(&issued.token));
    }
    assert!(row.used_at.is_none());
    assert_eq!(row.unit_label.as_deref(), Some("Unit A"));

    let ttl = row.expires_at - row.issued_at;
    assert_eq!(ttl, TimeDelta::hours(168));
    Ok(())
}

#[tokio::test]
async fn only_the_owner_may_issue() -> Result<()> {
    let db = setup_test_db().await?;
    let settings = invite_settings();
    let fx = linked_fixture(&db, &settings, "landlord-a", "tenant-a").await?;
    let other = subject("landlord-b");
    onboard(&db, &other, "Elsewhere").await?;

    for caller in [&fx.tenant, &other, &subject("nobody")] {
        let result = invites::issue_invite(
            &db,
            &settings,
            caller,
            fx.property.property_id,
            IssueInviteRequest {
                delivery_method: DeliveryMethod::Code,
                intended_email: None,
                unit_label: None,
            },
        )
        .await;
        assert!(matches!(result, Err(CoreError::AuthorizationDenied)));
    }
    Ok(())
}

#[tokio::test]
async fn email_delivery_requires_a_valid_address() -> Result<()> {
    let db = setup_test_db().await?;
    let settings = invite_settings();
    let landlord = subject("landlord-l");
    let property = onboard(&db, &landlord, "Oak St Duplex").await?;

    let missing = invites::issue_invite(
        &db,
        &settings,
        &landlord,
        property.property_id,
        IssueInviteRequest {
            delivery_method: DeliveryMethod::Email,
            intended_email: None,
            unit_label: None,
        },
    )
    .await;
    assert!(matches!(
        missing,
        Err(CoreError::Validation { field: "intended_email", .. })
    ));

    let malformed = invites::issue_invite(
        &db,
        &settings,
        &landlord,
        property.property_id,
        IssueInviteRequest {
            delivery_method: DeliveryMethod::Email,
            intended_email: Some("not-an-email".to_string()),
            unit_label: None,
        },
    )
    .await;
    assert!(matches!(
        malformed,
        Err(CoreError::Validation { field: "intended_email", .. })
    ));

    let issued = invites::issue_invite(
        &db,
        &settings,
        &landlord,
        property.property_id,
        IssueInviteRequest {
            delivery_method: DeliveryMethod::Email,
            intended_email: Some("  Tenant@Example.com ".to_string()),
            unit_label: None,
        },
    )
    .await?;
    let row = InviteToken::find_by_id(issued.id).one(&db).await?.expect("row");
    assert_eq!(row.intended_email.as_deref(), Some("tenant@example.com"));
    Ok(())
}

#[tokio::test]
async fn validation_is_read_only_and_expires_monotonically() -> Result<()> {
    let db = setup_test_db().await?;
    let settings = invite_settings();
    let landlord = subject("landlord-l");
    let property = onboard(&db, &landlord, "Oak St Duplex").await?;
    let issued = issue(&db, &settings, &landlord, property.property_id).await?;
    let before = InviteToken::find_by_id(issued.id).one(&db).await?.expect("row");

    let now = Utc::now();
    for _ in 0..3 {
        let result = invites::validate_invite(&db, &settings, &issued.token, now).await?;
        assert!(result.valid);
        let info = result.property.expect("public info");
        assert_eq!(info.name, "Oak St Duplex");
        assert_eq!(info.address, "12 Oak St");
        assert_eq!(info.property_type, PropertyType::House);
    }

    // Lower-case input is accepted.
    let lowered = issued.token.to_ascii_lowercase();
    assert!(invites::validate_invite(&db, &settings, &lowered, now).await?.valid);

    let expiry = issued.expires_at.with_timezone(&Utc);
    let just_before = expiry - TimeDelta::seconds(1);
    assert!(invites::validate_invite(&db, &settings, &issued.token, just_before).await?.valid);

    for later in [expiry, expiry + TimeDelta::days(1)] {
        let result = invites::validate_invite(&db, &settings, &issued.token, later).await?;
        assert!(!result.valid);
        assert!(result.property.is_none());
        assert_eq!(result.reason.as_deref(), Some(INVITE_INVALID_MESSAGE));
    }

    let after = InviteToken::find_by_id(issued.id).one(&db).await?.expect("row");
    assert_eq!(before, after, "validation never mutates the token");
    Ok(())
}

#[tokio::test]
async fn every_invalid_secret_gets_the_same_answer() -> Result<()> {
    let db = setup_test_db().await?;
    let settings = invite_settings();
    let fx = linked_fixture(&db, &settings, "landlord-a", "tenant-a").await?;
    let landlord = fx.landlord.clone();

    let used = issue(&db, &settings, &landlord, fx.property.property_id).await?;
    redeem(&db, &settings, &subject("tenant-b"), &used.token).await?;

    let revoked = issue(&db, &settings, &landlord, fx.property.property_id).await?;
    invites::revoke_invite(&db, &landlord, fx.property.property_id, revoked.id).await?;

    let now = Utc::now();
    let mut answers = Vec::new();
    for secret in [
        "short",
        "ABCDEFGHIJK0",
        "ABCDEFGHJKMN",
        used.token.as_str(),
        revoked.token.as_str(),
    ] {
        let result = invites::validate_invite(&db, &settings, secret, now).await?;
        answers.push(serde_json::to_value(&result)?);
    }
    assert!(answers.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(answers[0]["valid"], false);
    Ok(())
}

#[tokio::test]
async fn secrets_from_another_deployment_do_not_validate() -> Result<()> {
    let db = setup_test_db().await?;
    let settings = invite_settings();
    let landlord = subject("landlord-l");
    let property = onboard(&db, &landlord, "Oak St Duplex").await?;
    let issued = issue(&db, &settings, &landlord, property.property_id).await?;

    let other = invites::InviteSettings::from_config(&leasegate::config::InviteConfig {
        pepper: Some(vec![42u8; 32]),
        ..Default::default()
    })?;
    let result = invites::validate_invite(&db, &other, &issued.token, Utc::now()).await?;
    assert!(!result.valid);
    Ok(())
}

#[tokio::test]
async fn owner_lists_and_revokes_invites() -> Result<()> {
    let db = setup_test_db().await?;
    let settings = invite_settings();
    let fx = linked_fixture(&db, &settings, "landlord-a", "tenant-a").await?;
    let property_id = fx.property.property_id;

    let pending = issue(&db, &settings, &fx.landlord, property_id).await?;

    let listed = invites::list_invites(&db, &fx.landlord, property_id).await?;
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, pending.id, "newest first");
    assert_eq!(listed[0].state, InviteState::Issued);
    assert_eq!(listed[1].state, InviteState::Redeemed);

    // Non-owners get an empty list, not an error.
    assert!(invites::list_invites(&db, &fx.tenant, property_id).await?.is_empty());

    let err = invites::revoke_invite(&db, &fx.tenant, property_id, pending.id)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::AuthorizationDenied));

    let revoked = invites::revoke_invite(&db, &fx.landlord, property_id, pending.id).await?;
    assert_eq!(revoked.state, InviteState::Expired);

    let redeemed_id = listed[1].id;
    let err = invites::revoke_invite(&db, &fx.landlord, property_id, redeemed_id)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));

    let err = invites::revoke_invite(&db, &fx.landlord, property_id, uuid::Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));

    let outcome = leasegate::transactions::accept_invite(
        &db,
        &test_utils::tx_settings(),
        &settings,
        Some(&subject("tenant-late")),
        &pending.token,
        None,
    )
    .await;
    assert!(!outcome.is_success());
    Ok(())
}
