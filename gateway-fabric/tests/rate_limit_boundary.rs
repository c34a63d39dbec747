use gateway_fabric::rate_limit::{ai_query_policy, MultiPolicyLimiter, RequestContext};

#[test]
fn thirtieth_request_admitted_thirty_first_rejected_with_retry_after() {
    let limiter = MultiPolicyLimiter::new(vec![ai_query_policy()]);
    let ctx = RequestContext { subject_id: Some("user-1".into()), ip: "10.0.0.1".into() };

    for n in 1..=30 {
        assert!(limiter.check(&ctx).is_ok(), "request {n} should be admitted");
    }

    let rejection = limiter.check(&ctx).expect_err("31st request should be rejected");
    assert_eq!(rejection.limit, 30);
    assert!(rejection.retry_after_secs > 0);
    let headers = rejection.headers();
    assert!(headers.iter().any(|(name, _)| *name == "Retry-After"));
}

#[test]
fn separate_subjects_get_independent_windows() {
    let limiter = MultiPolicyLimiter::new(vec![ai_query_policy()]);
    let user_a = RequestContext { subject_id: Some("a".into()), ip: "10.0.0.1".into() };
    let user_b = RequestContext { subject_id: Some("b".into()), ip: "10.0.0.2".into() };

    for _ in 0..30 {
        limiter.check(&user_a).unwrap();
    }
    assert!(limiter.check(&user_a).is_err());
    assert!(limiter.check(&user_b).is_ok());
}
