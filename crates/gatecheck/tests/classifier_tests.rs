//! Rule tables loaded from TOML, evaluated against hand-built observations.

use gatecheck::classifier::{Classification, classify};
use gatecheck::{Observation, ProbeConfig, ProbeTarget, VerdictKind};

const FIXTURE: &str = include_str!("fixtures/targets.toml");

fn fixture() -> ProbeConfig {
    toml::from_str(FIXTURE).expect("fixture parses")
}

fn target(flag: &str) -> ProbeTarget {
    fixture().targets.into_iter().find(|t| t.flag == flag).expect("target present in fixture")
}

fn observe(status: u16, body: &str) -> Observation {
    Observation { status, latency_ms: 87, body: body.to_string(), ..Default::default() }
}

fn verdict_kind(observation: &Observation, target: &ProbeTarget) -> VerdictKind {
    match classify(observation, target) {
        Classification::Verdict(verdict) => verdict.kind,
        Classification::Challenge { .. } => panic!("unexpected challenge"),
    }
}

#[test]
fn test_fixture_loads_and_validates() {
    let config = fixture();
    assert_eq!(config.targets.len(), 4);
    assert!(config.validate().is_ok());

    let app = target("app");
    assert_eq!(app.method, "GET");
    assert_eq!(app.headers.len(), 1);
    assert_eq!(app.headers[0].0, "User-Agent");

    let api = target("api");
    assert_eq!(api.retry_statuses, vec![500, 502, 503, 504]);
    assert!(api.tag.is_empty());

    let edge = target("edge");
    let verification = edge.verification.expect("verification configured");
    assert_eq!(verification.steps.len(), 3);
    assert!(verification.blocked.is_some());
}

#[test]
fn test_forbidden_without_region_marker_passes() {
    let target = target("region");

    assert_eq!(verdict_kind(&observe(403, "<html>unsupported</html>"), &target), VerdictKind::Pass);
    assert_eq!(verdict_kind(&observe(403, "<p>region-blocked</p>"), &target), VerdictKind::Fail);
    assert_eq!(verdict_kind(&observe(200, ""), &target), VerdictKind::Fail);
}

#[test]
fn test_structural_signatures() {
    let target = target("app");

    let login = observe(200, "<form><input id=\"login-form-id\"></form>");
    assert_eq!(verdict_kind(&login, &target), VerdictKind::Pass);

    let shell = observe(200, "<div class=\"app-shell-marker\"></div>");
    assert_eq!(verdict_kind(&shell, &target), VerdictKind::Pass);

    let marketing = observe(200, "<div class=\"app-shell-marker\"></div><header class=\"marketing-header\">");
    assert_eq!(verdict_kind(&marketing, &target), VerdictKind::Fail);

    let geo = observe(200, "login-form-id but Gemini is not available in your country");
    assert_eq!(verdict_kind(&geo, &target), VerdictKind::Fail);
}

#[test]
fn test_status_rules_leave_gaps_indeterminate() {
    let target = target("api");

    assert_eq!(verdict_kind(&observe(200, "{}"), &target), VerdictKind::Pass);
    assert_eq!(verdict_kind(&observe(400, "{\"error\":{}}"), &target), VerdictKind::Fail);
    assert_eq!(verdict_kind(&observe(429, ""), &target), VerdictKind::Indeterminate);
}

#[test]
fn test_transport_failure_beats_every_rule() {
    let target = target("region");
    let failure = Observation::transport_failure("request timed out after 2000ms".into(), 2000);

    match classify(&failure, &target) {
        Classification::Verdict(verdict) => {
            assert_eq!(verdict.kind, VerdictKind::NetworkError);
            assert_eq!(verdict.latency_ms, None);
            assert!(verdict.detail.contains("timed out"));
        }
        other => panic!("unexpected classification: {other:?}"),
    }
}

#[test]
fn test_challenge_and_block_pages() {
    let target = target("edge");

    assert_eq!(verdict_kind(&observe(200, "hello"), &target), VerdictKind::Pass);

    let challenge = observe(403, "<script src=\"/cdn-cgi/challenge-platform/h/b/orchestrate\"></script>");
    assert_eq!(classify(&challenge, &target), Classification::Challenge { latency_ms: 87 });

    let blocked = observe(403, "Sorry, you have been blocked. /cdn-cgi/challenge-platform/");
    assert_eq!(verdict_kind(&blocked, &target), VerdictKind::Blocked);

    assert_eq!(verdict_kind(&observe(503, "maintenance"), &target), VerdictKind::Indeterminate);
}

#[test]
fn test_classification_is_deterministic() {
    let target = target("app");
    let observation = observe(200, "<div class=\"app-shell-marker\"></div>");

    assert_eq!(classify(&observation, &target), classify(&observation, &target));
}
