//! HTTP-level tests for food accrual, consumption and bonus boxes.

mod common;

use axum::http::StatusCode;
use common::{body_json, create_character, get, post_empty};

#[tokio::test]
async fn inventory_reports_starting_stock_and_next_unit() {
    let test = common::build_test_app();
    let created = create_character(test.app(), "Mochi").await;
    let id = created["character"]["id"].as_i64().unwrap();

    let response = get(test.app(), &format!("/api/v1/characters/{id}/food")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["counts"]["low"], 9);
    assert_eq!(json["data"]["counts"]["high"], 0);
    assert_eq!(json["data"]["cap"], 100);
    assert_eq!(json["data"]["seconds_until_next_unit"], 1800);
}

#[tokio::test]
async fn strict_generation_before_due_returns_too_early() {
    let test = common::build_test_app();
    let created = create_character(test.app(), "Mochi").await;
    let id = created["character"]["id"].as_i64().unwrap();
    let uri = format!("/api/v1/characters/{id}/food/generate");

    let response = post_empty(test.app(), &uri).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "TOO_EARLY");

    test.clock.advance(chrono::Duration::seconds(1800));
    let response = post_empty(test.app(), &uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["units_created"], 1);
}

#[tokio::test]
async fn lenient_accrual_converts_ten_low_units() {
    let test = common::build_test_app();
    let created = create_character(test.app(), "Mochi").await;
    let id = created["character"]["id"].as_i64().unwrap();

    // Nothing due yet is a successful no-op.
    let response = post_empty(test.app(), &format!("/api/v1/characters/{id}/food/accrue")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["units_created"], 0);

    // One more unit makes ten low-tier units, which become one high-tier unit.
    test.clock.advance(chrono::Duration::seconds(1800));
    let response = post_empty(test.app(), &format!("/api/v1/characters/{id}/food/accrue")).await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["units_created"], 1);
    assert_eq!(json["data"]["conversion"]["promoted"], 1);
    assert_eq!(json["data"]["inventory"]["counts"]["low"], 0);
    assert_eq!(json["data"]["inventory"]["counts"]["high"], 1);
}

#[tokio::test]
async fn consuming_a_unit_twice_returns_409() {
    let test = common::build_test_app();
    let created = create_character(test.app(), "Mochi").await;
    let id = created["character"]["id"].as_i64().unwrap();
    let unit_id = created["food"][0]["id"].as_i64().unwrap();
    let uri = format!("/api/v1/characters/{id}/food/{unit_id}/consume");

    let response = post_empty(test.app(), &uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["actions_resolved"], 1);
    assert_eq!(json["data"]["exp_gained"], 80);
    assert_eq!(json["data"]["currency_gained"], 500);
    assert_eq!(json["data"]["bonus_container_granted"], false);
    assert_eq!(json["data"]["progression"]["coins"], 600);

    let response = post_empty(test.app(), &uri).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "ALREADY_CONSUMED");
}

#[tokio::test]
async fn consuming_another_characters_unit_returns_404() {
    let test = common::build_test_app();
    let mochi = create_character(test.app(), "Mochi").await;
    let pudding = create_character(test.app(), "Pudding").await;
    let pudding_id = pudding["character"]["id"].as_i64().unwrap();
    let mochi_unit = mochi["food"][0]["id"].as_i64().unwrap();

    let response = post_empty(
        test.app(),
        &format!("/api/v1/characters/{pudding_id}/food/{mochi_unit}/consume"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bonus_box_opens_exactly_once() {
    let test = common::build_test_app();
    let created = create_character(test.app(), "Mochi").await;
    let id = created["character"]["id"].as_i64().unwrap();
    let unit_id = created["food"][0]["id"].as_i64().unwrap();

    // Lowest coin bracket, then a winning container roll.
    test.random.push([0.0, 0.0]);
    let response = post_empty(
        test.app(),
        &format!("/api/v1/characters/{id}/food/{unit_id}/consume"),
    )
    .await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["bonus_container_granted"], true);
    let box_id = json["data"]["containers_granted"][0]["id"].as_i64().unwrap();

    let response = get(test.app(), &format!("/api/v1/characters/{id}/boxes")).await;
    let json = body_json(response).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
    assert_eq!(json["data"][0]["opened"], false);

    let uri = format!("/api/v1/characters/{id}/boxes/{box_id}/open");
    let response = post_empty(test.app(), &uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["container"]["opened"], true);
    assert!(json["data"]["reward"]["kind"].is_string());

    let response = post_empty(test.app(), &uri).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "ALREADY_OPENED");
}
