use bribebank_server::lifecycle::LifecycleError;
use bribebank_server::lifecycle::wheel::{
    default_segments, emoji_for_label, is_losing_label, pick_index, validate_segments,
};
use bribebank_shared::api::{ErrorCode, WheelSegmentInput};

fn segment(label: &str, prob: f64) -> WheelSegmentInput {
    WheelSegmentInput {
        label: Some(label.to_string()),
        color: Some("#60A5FA".to_string()),
        prob: Some(prob),
        is_losing: None,
        emoji: None,
    }
}

fn validation_code(err: LifecycleError) -> ErrorCode {
    match err {
        LifecycleError::Validation(code) => code,
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn pick_index_walks_cumulative_probabilities() {
    let probs = [0.5, 0.25, 0.25];
    assert_eq!(pick_index(probs, 0.0), Some(0));
    assert_eq!(pick_index(probs, 0.5), Some(0));
    assert_eq!(pick_index(probs, 0.6), Some(1));
    assert_eq!(pick_index(probs, 0.75), Some(1));
    assert_eq!(pick_index(probs, 0.99), Some(2));
}

#[test]
fn pick_index_falls_back_to_first_segment_on_rounding_gap() {
    // Sums to 0.999, so a draw of 0.9995 passes every boundary.
    assert_eq!(pick_index([0.333, 0.333, 0.333], 0.9995), Some(0));
}

#[test]
fn pick_index_on_empty_wheel_is_none() {
    assert_eq!(pick_index(Vec::<f64>::new(), 0.3), None);
}

#[test]
fn probabilities_must_sum_to_one() {
    let err = validate_segments(vec![segment("Candy Run", 0.5), segment("Movie Night", 0.3)])
        .unwrap_err();
    assert_eq!(validation_code(err), ErrorCode::ProbabilitiesMustSumToOne);
}

#[test]
fn sums_within_tolerance_are_rescaled() {
    let specs = validate_segments(vec![
        segment("Not this time", 0.495),
        segment("Candy Run", 0.5),
    ])
    .unwrap();
    let total: f64 = specs.iter().map(|s| s.prob).sum();
    assert!((total - 1.0).abs() < 1e-9, "total was {total}");
    assert!(specs[1].prob > specs[0].prob);
}

#[test]
fn empty_or_malformed_segments_are_rejected() {
    assert_eq!(
        validation_code(validate_segments(Vec::new()).unwrap_err()),
        ErrorCode::InvalidSegments
    );

    let mut missing_label = segment("x", 1.0);
    missing_label.label = Some("   ".into());
    assert_eq!(
        validation_code(validate_segments(vec![missing_label]).unwrap_err()),
        ErrorCode::InvalidSegments
    );

    assert_eq!(
        validation_code(validate_segments(vec![segment("Candy Run", -1.0)]).unwrap_err()),
        ErrorCode::InvalidSegments
    );
}

#[test]
fn losing_flag_and_emoji_follow_the_label() {
    let specs = validate_segments(vec![
        segment("Try again!", 0.25),
        segment("Candy Run", 0.25),
        segment("30 Minute Screen Time", 0.25),
        segment("Bike ride", 0.25),
    ])
    .unwrap();

    assert!(specs[0].is_losing);
    assert_eq!(specs[0].emoji, "❌");
    assert!(!specs[1].is_losing);
    assert_eq!(specs[1].emoji, "🍬");
    assert_eq!(specs[2].emoji, "📺");
    assert_eq!(specs[3].emoji, "🎁");
}

#[test]
fn explicit_flags_override_label_derivation() {
    let mut forced_loss = segment("Candy Run", 0.5);
    forced_loss.is_losing = Some(true);
    let mut custom_emoji = segment("Not this time", 0.5);
    custom_emoji.is_losing = Some(false);
    custom_emoji.emoji = Some("🌈".into());

    let specs = validate_segments(vec![forced_loss, custom_emoji]).unwrap();
    assert!(specs[0].is_losing);
    assert_eq!(specs[0].emoji, "❌");
    assert!(!specs[1].is_losing);
    assert_eq!(specs[1].emoji, "🌈");
}

#[test]
fn label_helpers() {
    assert!(is_losing_label("NOT THIS TIME"));
    assert!(!is_losing_label("Movie Night"));
    assert_eq!(emoji_for_label("JACKPOT - $20"), "💵");
    assert_eq!(emoji_for_label("Pick supper"), "🍽️");
    assert_eq!(emoji_for_label("Free Pop"), "🥤");
}

#[test]
fn default_wheel_is_a_valid_distribution() {
    let specs = default_segments();
    assert_eq!(specs.len(), 9);
    let total: f64 = specs.iter().map(|s| s.prob).sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert_eq!(specs.iter().filter(|s| s.is_losing).count(), 1);
    assert_eq!(specs[0].label, "Not this time");
}
