//! Telemetry → session state transformations
//!
//! Each event kind applies a fixed delta to the owning session's patterns,
//! interaction counters, and emotional vectors. Applying the same event
//! twice double-counts; at-most-once delivery is the submitter's contract.

use crate::telemetry::{RawEvent, TelemetryBatch};

use super::state::SessionState;

// Vector deltas per event kind.
const RAGE_FRUSTRATION: f64 = 25.0;
const RAGE_TRUST_LOSS: f64 = -5.0;
const EXIT_FAST_VELOCITY: f64 = 500.0;
const EXIT_FAST_URGENCY: f64 = 20.0;
const EXIT_SLOW_URGENCY: f64 = 8.0;
const EXIT_TOP_ANXIETY: f64 = 5.0;
const ERRATIC_JERK: f64 = 800.0;
const ERRATIC_FRUSTRATION: f64 = 3.0;
const MICRO_VELOCITY: f64 = 5.0;
const MICRO_ANXIETY: f64 = 1.0;
const DART_VELOCITY: f64 = 1200.0;
const DART_URGENCY: f64 = 2.0;
const FAST_SCROLL_SPEED: f64 = 2000.0;
const FAST_SCROLL_URGENCY: f64 = 3.0;
const SLOW_SCROLL_SPEED: f64 = 200.0;
const READ_DEPTH_PERCENT: f64 = 25.0;
const READ_TRUST: f64 = 1.0;
const SELECTION_PRICE_ANXIETY: f64 = 4.0;
const TAB_SWITCH_ANXIETY: f64 = 3.0;
const PRICING_PAGE_ANXIETY: f64 = 8.0;
const CART_PAGE_ANXIETY: f64 = 5.0;

/// Apply every parseable event in `batch` to `state`, clamp the vectors,
/// and advance `lastActivity`. Returns (applied, skipped).
pub fn apply_batch(state: &mut SessionState, batch: &TelemetryBatch) -> (usize, usize) {
    let (events, skipped) = batch.parse_events();
    for event in &events {
        apply_event(state, event);
    }
    state.vectors.clamp_all();
    state.touch(batch.received_at);
    (events.len(), skipped)
}

/// Apply one event's fixed transformation.
pub fn apply_event(state: &mut SessionState, event: &RawEvent) {
    match event {
        RawEvent::Mousemove {
            velocity,
            acceleration,
            jerk,
        } => {
            state.mouse.velocity.push(*velocity);
            state.mouse.acceleration.push(*acceleration);
            state.mouse.jerk.push(*jerk);
            if jerk.abs() > ERRATIC_JERK {
                state.vectors.add_frustration(ERRATIC_FRUSTRATION);
            }
            if *velocity < MICRO_VELOCITY {
                state.mouse.micro_movements += 1;
                state.vectors.add_anxiety(MICRO_ANXIETY);
            } else if *velocity > DART_VELOCITY {
                state.vectors.add_urgency(DART_URGENCY);
            }
        }
        RawEvent::RageClick { .. } => {
            state.mouse.rage_clicks += 1;
            state.vectors.add_frustration(RAGE_FRUSTRATION);
            state.vectors.add_trust(RAGE_TRUST_LOSS);
        }
        RawEvent::ViewportExit { velocity, edge } => {
            state.mouse.record_exit(edge.clone(), *velocity);
            if *velocity > EXIT_FAST_VELOCITY {
                state.vectors.add_urgency(EXIT_FAST_URGENCY);
            } else {
                state.vectors.add_urgency(EXIT_SLOW_URGENCY);
            }
            if edge == "top" {
                state.vectors.add_anxiety(EXIT_TOP_ANXIETY);
            }
        }
        RawEvent::TextSelection { element, .. } => {
            state.interactions.text_selections += 1;
            if element.contains("price") {
                state.interactions.price_views += 1;
                state.vectors.add_anxiety(SELECTION_PRICE_ANXIETY);
            }
        }
        RawEvent::Scroll {
            percentage,
            direction: _,
            speed,
        } => {
            if *speed > FAST_SCROLL_SPEED {
                state.vectors.add_urgency(FAST_SCROLL_URGENCY);
            } else if *speed < SLOW_SCROLL_SPEED && *percentage > READ_DEPTH_PERCENT {
                state.vectors.add_trust(READ_TRUST);
            }
        }
        RawEvent::VisibilityChange { hidden } => {
            if *hidden {
                state.interactions.tab_switches += 1;
                state.vectors.add_anxiety(TAB_SWITCH_ANXIETY);
            }
        }
        RawEvent::PageView { url } => {
            state.page_url = url.clone();
            if url.contains("/pricing") {
                state.interactions.price_views += 1;
                state.vectors.add_anxiety(PRICING_PAGE_ANXIETY);
            } else if url.contains("/cart") {
                state.interactions.cart_views += 1;
                state.vectors.add_anxiety(CART_PAGE_ANXIETY);
            } else if url.contains("/compare") {
                state.interactions.comparisons += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_state() -> SessionState {
        SessionState::new("s-1", "t-1", 50, 20)
    }

    #[test]
    fn test_rage_click_adds_25_frustration() {
        let mut state = make_state();
        apply_event(
            &mut state,
            &RawEvent::RageClick {
                click_count: 3,
                interval_ms: 150,
            },
        );
        assert_eq!(state.mouse.rage_clicks, 1);
        assert_eq!(state.vectors.frustration, 25.0);
        assert_eq!(state.vectors.trust, 45.0);
    }

    #[test]
    fn test_fast_viewport_exit_adds_20_urgency() {
        let mut state = make_state();
        apply_event(
            &mut state,
            &RawEvent::ViewportExit {
                velocity: 650.0,
                edge: "top".into(),
            },
        );
        assert_eq!(state.vectors.urgency, EXIT_FAST_URGENCY);
        assert_eq!(state.vectors.anxiety, EXIT_TOP_ANXIETY);
        assert_eq!(state.mouse.last_exit().unwrap().velocity, 650.0);
    }

    #[test]
    fn test_slow_viewport_exit_uses_smaller_delta() {
        let mut state = make_state();
        apply_event(
            &mut state,
            &RawEvent::ViewportExit {
                velocity: 500.0,
                edge: "left".into(),
            },
        );
        // Boundary: exactly 500 is not "fast".
        assert_eq!(state.vectors.urgency, EXIT_SLOW_URGENCY);
        assert_eq!(state.vectors.anxiety, 0.0);
    }

    #[test]
    fn test_micro_movements_counted() {
        let mut state = make_state();
        for _ in 0..4 {
            apply_event(
                &mut state,
                &RawEvent::Mousemove {
                    velocity: 2.0,
                    acceleration: 0.0,
                    jerk: 0.0,
                },
            );
        }
        assert_eq!(state.mouse.micro_movements, 4);
        assert_eq!(state.vectors.anxiety, 4.0);
    }

    #[test]
    fn test_pricing_page_view_counts_price_view() {
        let mut state = make_state();
        apply_event(
            &mut state,
            &RawEvent::PageView {
                url: "https://shop.example/pricing".into(),
            },
        );
        assert_eq!(state.interactions.price_views, 1);
        assert_eq!(state.vectors.anxiety, PRICING_PAGE_ANXIETY);
        assert!(state.page_url.contains("/pricing"));
    }

    #[test]
    fn test_batch_clamps_and_touches() {
        let mut state = make_state();
        let mut batch = crate::telemetry::TelemetryBatch::new("s-1", "t-1");
        for _ in 0..6 {
            batch = batch.with_event(&RawEvent::RageClick {
                click_count: 1,
                interval_ms: 100,
            });
        }
        let (applied, skipped) = apply_batch(&mut state, &batch);
        assert_eq!(applied, 6);
        assert_eq!(skipped, 0);
        // 6 × 25 clamps at the ceiling.
        assert_eq!(state.vectors.frustration, 100.0);
        assert!(state.vectors.in_bounds());
        assert_eq!(state.last_activity, batch.received_at);
    }

    #[test]
    fn test_malformed_events_skipped_in_batch() {
        let mut state = make_state();
        let mut batch = crate::telemetry::TelemetryBatch::new("s-1", "t-1");
        batch.events.push(json!({"type": "mousemove", "velocity": 300.0}));
        batch.events.push(json!({"type": "telepathy"}));
        let (applied, skipped) = apply_batch(&mut state, &batch);
        assert_eq!(applied, 1);
        assert_eq!(skipped, 1);
        assert_eq!(state.mouse.velocity.len(), 1);
    }

    #[test]
    fn test_vectors_stay_bounded_under_any_sequence() {
        let mut state = make_state();
        let events = [
            RawEvent::RageClick {
                click_count: 9,
                interval_ms: 50,
            },
            RawEvent::ViewportExit {
                velocity: 900.0,
                edge: "top".into(),
            },
            RawEvent::Scroll {
                percentage: 95.0,
                direction: "down".into(),
                speed: 4000.0,
            },
            RawEvent::VisibilityChange { hidden: true },
            RawEvent::PageView {
                url: "/pricing".into(),
            },
        ];
        for _ in 0..40 {
            for event in &events {
                apply_event(&mut state, event);
                assert!(state.vectors.in_bounds(), "vectors left [0,100]");
            }
        }
    }
}
