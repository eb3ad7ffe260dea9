//! Order ledger and catalog queries: policy snapshots, edits, deletes, and
//! the constraints that keep orders and products consistent.

mod common;

use claimdrop::claim::attempt_claim;
use claimdrop::error::AppError;
use common::*;

fn claim_n(ctx: &TestContext, order_id: &str, n: usize) {
    for _ in 0..n {
        let outcome = attempt_claim(&mut ctx.conn(), ctx.clock.as_ref(), order_id).unwrap();
        assert!(outcome.is_success());
    }
}

fn flip_to_one_time(ctx: &TestContext, order: &Order, reset: Option<bool>) -> Order {
    let input = UpdateOrder {
        id: order.id,
        one_time_use: Some(true),
        reset_claim_count: reset,
        ..Default::default()
    };
    queries::update_order(
        &mut ctx.conn(),
        &input,
        ctx.state.reset_claims_on_one_time_flip,
        ctx.now(),
    )
    .unwrap()
    .expect("order should exist")
}

// ============ Policy snapshot ============

#[test]
fn test_create_order_uses_default_settings() {
    let ctx = TestContext::new();
    let product = create_test_product(&ctx, "Widget", "https://x/y");

    let input = CreateOrder {
        order_id: "DEFAULTS".into(),
        product_ids: vec![product.id],
        expiration_days: None,
        one_time_use: None,
    };
    let order = queries::create_order(&mut ctx.conn(), &input, ctx.now()).unwrap();

    assert!(order.one_time_use);
    assert_eq!(order.expires_at, Some(T0 + 30 * SECONDS_PER_DAY));
    assert_eq!(order.claim_count, 0);
    assert_eq!(order.status(), OrderStatus::Available);
}

#[test]
fn test_explicit_order_policy_overrides_settings() {
    let ctx = TestContext::new();
    let product = create_test_product(&ctx, "Widget", "https://x/y");

    let order = create_test_order(&ctx, "EXPLICIT", &[product.id], Some(7), false);

    assert!(!order.one_time_use);
    assert_eq!(order.expires_at, Some(T0 + 7 * SECONDS_PER_DAY));
}

#[test]
fn test_settings_changes_do_not_touch_existing_orders() {
    let ctx = TestContext::new();
    let product = create_test_product(&ctx, "Widget", "https://x/y");
    let before = create_test_order(&ctx, "SNAPSHOT", &[product.id], None, true);

    let update = UpdateSettings {
        default_expiration_days: Some(None),
        default_one_time_use: Some(false),
    };
    let settings = queries::update_policy_settings(&mut ctx.conn(), &update, ctx.now()).unwrap();
    assert_eq!(settings.default_expiration_days, None);
    assert!(!settings.default_one_time_use);

    let after = get_order(&ctx, "SNAPSHOT");
    assert_eq!(after.expires_at, before.expires_at);
    assert_eq!(after.one_time_use, before.one_time_use);

    // New orders pick up the new defaults
    let input = CreateOrder {
        order_id: "NEWDEFAULTS".into(),
        product_ids: vec![product.id],
        expiration_days: None,
        one_time_use: None,
    };
    let fresh = queries::create_order(&mut ctx.conn(), &input, ctx.now()).unwrap();
    assert_eq!(fresh.expires_at, None);
    assert!(!fresh.one_time_use);
}

#[test]
fn test_settings_default_when_unset() {
    let ctx = TestContext::new();
    let settings = queries::get_policy_settings(&ctx.conn()).unwrap();
    assert_eq!(settings, PolicySettings::default());
}

// ============ Create validation ============

#[test]
fn test_duplicate_order_identifier_conflicts() {
    let ctx = TestContext::new();
    let product = create_test_product(&ctx, "Widget", "https://x/y");
    create_test_order(&ctx, "DUPL01", &[product.id], Some(7), true);

    let input = CreateOrder {
        order_id: "DUPL01".into(),
        product_ids: vec![product.id],
        expiration_days: None,
        one_time_use: None,
    };
    let err = queries::create_order(&mut ctx.conn(), &input, ctx.now()).unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[test]
fn test_unknown_product_is_rejected_and_nothing_is_written() {
    let ctx = TestContext::new();
    let product = create_test_product(&ctx, "Widget", "https://x/y");

    let input = CreateOrder {
        order_id: "MISSING".into(),
        product_ids: vec![product.id, 9999],
        expiration_days: None,
        one_time_use: None,
    };
    let err = queries::create_order(&mut ctx.conn(), &input, ctx.now()).unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert!(
        queries::find_order_by_identifier(&ctx.conn(), "MISSING")
            .unwrap()
            .is_none()
    );
}

// ============ Edits ============

#[test]
fn test_product_set_is_replaced_wholesale() {
    let ctx = TestContext::new();
    let a = create_test_product(&ctx, "Alpha", "https://dl.example.com/a");
    let b = create_test_product(&ctx, "Beta", "https://dl.example.com/b");
    let c = create_test_product(&ctx, "Gamma", "https://dl.example.com/c");
    let order = create_test_order(&ctx, "REPLACE", &[a.id, b.id], Some(7), true);

    let input = UpdateOrder {
        id: order.id,
        product_ids: Some(vec![c.id, a.id]),
        ..Default::default()
    };
    queries::update_order(&mut ctx.conn(), &input, true, ctx.now())
        .unwrap()
        .unwrap();

    let ids = queries::list_order_product_ids(&ctx.conn(), order.id).unwrap();
    assert_eq!(ids, vec![c.id, a.id]);
}

#[test]
fn test_failed_replace_keeps_previous_products() {
    let ctx = TestContext::new();
    let a = create_test_product(&ctx, "Alpha", "https://dl.example.com/a");
    let order = create_test_order(&ctx, "KEEP01", &[a.id], Some(7), true);

    let input = UpdateOrder {
        id: order.id,
        product_ids: Some(vec![4242]),
        one_time_use: Some(false),
        ..Default::default()
    };
    let err = queries::update_order(&mut ctx.conn(), &input, true, ctx.now()).unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let after = get_order(&ctx, "KEEP01");
    assert!(after.one_time_use);
    assert_eq!(
        queries::list_order_product_ids(&ctx.conn(), order.id).unwrap(),
        vec![a.id]
    );
}

#[test]
fn test_update_missing_order_returns_none() {
    let ctx = TestContext::new();
    let input = UpdateOrder {
        id: 12345,
        one_time_use: Some(true),
        ..Default::default()
    };
    assert!(
        queries::update_order(&mut ctx.conn(), &input, true, ctx.now())
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_expiration_days_on_edit_counts_from_now() {
    let ctx = TestContext::new();
    let product = create_test_product(&ctx, "Widget", "https://x/y");
    let order = create_test_order(&ctx, "RENEW1", &[product.id], Some(1), true);

    ctx.clock.advance_days(5);
    let input = UpdateOrder {
        id: order.id,
        expiration_days: Some(3),
        ..Default::default()
    };
    let updated = queries::update_order(&mut ctx.conn(), &input, true, ctx.now())
        .unwrap()
        .unwrap();
    assert_eq!(updated.expires_at, Some(ctx.now() + 3 * SECONDS_PER_DAY));
}

#[test]
fn test_expires_at_null_removes_deadline() {
    let ctx = TestContext::new();
    let product = create_test_product(&ctx, "Widget", "https://x/y");
    let order = create_test_order(&ctx, "FOREVER", &[product.id], Some(1), true);

    let input = UpdateOrder {
        id: order.id,
        expires_at: Some(None),
        ..Default::default()
    };
    let updated = queries::update_order(&mut ctx.conn(), &input, true, ctx.now())
        .unwrap()
        .unwrap();
    assert_eq!(updated.expires_at, None);
    assert!(!updated.is_expired_at(i64::MAX));
}

// ============ One-time flip ============

#[test]
fn test_flip_to_one_time_resets_count_by_default() {
    let ctx = TestContext::new();
    let product = create_test_product(&ctx, "Widget", "https://x/y");
    let order = create_test_order(&ctx, "FLIP01", &[product.id], Some(7), false);
    claim_n(&ctx, "FLIP01", 3);

    let updated = flip_to_one_time(&ctx, &order, None);
    assert!(updated.one_time_use);
    assert_eq!(updated.claim_count, 0);
    assert_eq!(updated.status(), OrderStatus::Available);
}

#[test]
fn test_flip_keeps_count_when_reset_disabled() {
    let ctx = TestContext::with_flip_reset(false);
    let product = create_test_product(&ctx, "Widget", "https://x/y");
    let order = create_test_order(&ctx, "FLIP02", &[product.id], Some(7), false);
    claim_n(&ctx, "FLIP02", 2);

    let updated = flip_to_one_time(&ctx, &order, None);
    assert_eq!(updated.claim_count, 2);
    assert_eq!(updated.status(), OrderStatus::Claimed);
}

#[test]
fn test_flip_reset_can_be_overridden_per_edit() {
    let ctx = TestContext::new();
    let product = create_test_product(&ctx, "Widget", "https://x/y");
    let order = create_test_order(&ctx, "FLIP03", &[product.id], Some(7), false);
    claim_n(&ctx, "FLIP03", 2);

    let updated = flip_to_one_time(&ctx, &order, Some(false));
    assert_eq!(updated.claim_count, 2);

    let ctx = TestContext::with_flip_reset(false);
    let product = create_test_product(&ctx, "Widget", "https://x/y");
    let order = create_test_order(&ctx, "FLIP04", &[product.id], Some(7), false);
    claim_n(&ctx, "FLIP04", 2);

    let updated = flip_to_one_time(&ctx, &order, Some(true));
    assert_eq!(updated.claim_count, 0);
}

#[test]
fn test_edit_of_already_one_time_order_never_resets() {
    let ctx = TestContext::new();
    let product = create_test_product(&ctx, "Widget", "https://x/y");
    let order = create_test_order(&ctx, "ONCE01", &[product.id], Some(7), true);
    claim_n(&ctx, "ONCE01", 1);

    let updated = flip_to_one_time(&ctx, &order, Some(true));
    assert_eq!(updated.claim_count, 1);
    assert_eq!(updated.status(), OrderStatus::Claimed);
}

#[test]
fn test_switching_to_multi_use_keeps_count() {
    let ctx = TestContext::new();
    let product = create_test_product(&ctx, "Widget", "https://x/y");
    let order = create_test_order(&ctx, "MULTI9", &[product.id], Some(7), true);
    claim_n(&ctx, "MULTI9", 1);

    let input = UpdateOrder {
        id: order.id,
        one_time_use: Some(false),
        ..Default::default()
    };
    let updated = queries::update_order(&mut ctx.conn(), &input, true, ctx.now())
        .unwrap()
        .unwrap();
    assert_eq!(updated.claim_count, 1);
    assert_eq!(updated.status(), OrderStatus::Available);
    claim_n(&ctx, "MULTI9", 1);
    assert_eq!(get_order(&ctx, "MULTI9").claim_count, 2);
}

// ============ Deletes ============

#[test]
fn test_delete_order_removes_associations() {
    let ctx = TestContext::new();
    let product = create_test_product(&ctx, "Widget", "https://x/y");
    let order = create_test_order(&ctx, "GONE01", &[product.id], Some(7), true);

    assert!(queries::delete_order(&mut ctx.conn(), order.id).unwrap());
    assert!(queries::get_order_by_id(&ctx.conn(), order.id).unwrap().is_none());
    assert_eq!(queries::count_orders_for_product(&ctx.conn(), product.id).unwrap(), 0);

    // Product is free to go now
    assert!(queries::delete_product(&mut ctx.conn(), product.id).unwrap());
}

#[test]
fn test_delete_missing_order_returns_false() {
    let ctx = TestContext::new();
    assert!(!queries::delete_order(&mut ctx.conn(), 777).unwrap());
}

#[test]
fn test_referenced_product_cannot_be_deleted() {
    let ctx = TestContext::new();
    let product = create_test_product(&ctx, "Widget", "https://x/y");
    create_test_order(&ctx, "HOLD01", &[product.id], Some(7), true);

    let err = queries::delete_product(&mut ctx.conn(), product.id).unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert!(queries::get_product_by_id(&ctx.conn(), product.id).unwrap().is_some());
}

// ============ Listing ============

#[test]
fn test_list_orders_filters_by_status_and_search() {
    let ctx = TestContext::new();
    let product = create_test_product(&ctx, "Widget", "https://x/y");
    create_test_order(&ctx, "SPRING-1", &[product.id], Some(7), true);
    create_test_order(&ctx, "SPRING-2", &[product.id], Some(7), true);
    create_test_order(&ctx, "SUMMER-1", &[product.id], Some(7), false);
    claim_n(&ctx, "SPRING-1", 1);
    claim_n(&ctx, "SUMMER-1", 4);

    let conn = ctx.conn();
    let (claimed, total) =
        queries::list_orders_paginated(&conn, Some(OrderStatus::Claimed), None, 50, 0).unwrap();
    assert_eq!(total, 1);
    assert_eq!(claimed[0].order_id, "SPRING-1");

    let (available, total) =
        queries::list_orders_paginated(&conn, Some(OrderStatus::Available), None, 50, 0).unwrap();
    assert_eq!(total, 2);
    assert!(available.iter().all(|o| o.status() == OrderStatus::Available));

    let (spring, total) =
        queries::list_orders_paginated(&conn, None, Some("SPRING"), 1, 0).unwrap();
    assert_eq!(total, 2);
    assert_eq!(spring.len(), 1);
}

#[test]
fn test_dashboard_stats() {
    let ctx = TestContext::new();
    let product = create_test_product(&ctx, "Widget", "https://x/y");
    create_test_order(&ctx, "STAT-1", &[product.id], Some(7), true);
    create_test_order(&ctx, "STAT-2", &[product.id], Some(7), false);
    claim_n(&ctx, "STAT-1", 1);
    claim_n(&ctx, "STAT-2", 3);

    let stats = queries::get_dashboard_stats(&ctx.conn()).unwrap();
    assert_eq!(stats.products, 1);
    assert_eq!(stats.orders, 2);
    assert_eq!(stats.claimed_orders, 1);
    assert_eq!(stats.total_claims, 4);
}

// ============ Admins ============

#[test]
fn test_admin_keys_are_hashed_and_resolvable() {
    let ctx = TestContext::new();
    let (admin, api_key) = create_test_admin(&ctx, "alice");

    let stored: String = ctx
        .conn()
        .query_row(
            "SELECT api_key_hash FROM admins WHERE id = ?1",
            [admin.id],
            |row| row.get(0),
        )
        .unwrap();
    assert_ne!(stored, api_key);

    ctx.clock.advance(30);
    let found = queries::get_admin_by_api_key(&ctx.conn(), &api_key, ctx.now())
        .unwrap()
        .expect("key should resolve");
    assert_eq!(found.id, admin.id);
    assert_eq!(
        queries::get_admin_by_id(&ctx.conn(), admin.id)
            .unwrap()
            .unwrap()
            .last_used_at,
        Some(T0 + 30)
    );
    assert!(
        queries::get_admin_by_api_key(&ctx.conn(), "cd_wrong", ctx.now())
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_admin_delete_rules() {
    let ctx = TestContext::new();
    let (alice, _) = create_test_admin(&ctx, "alice");
    let (bob, _) = create_test_admin(&ctx, "bob");

    let err = queries::delete_admin(&mut ctx.conn(), alice.id, alice.id).unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    assert!(queries::delete_admin(&mut ctx.conn(), bob.id, alice.id).unwrap());
    assert!(!queries::delete_admin(&mut ctx.conn(), bob.id, alice.id).unwrap());
    assert_eq!(queries::count_admins(&ctx.conn()).unwrap(), 1);

    let err = queries::delete_admin(&mut ctx.conn(), alice.id, bob.id).unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let err = queries::create_admin(
        &ctx.conn(),
        &CreateAdmin {
            username: "alice".into(),
        },
        ctx.now(),
    )
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}
