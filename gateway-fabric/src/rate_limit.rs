//! Rate Limiter + Throttler (§4.H): a chain of named token-bucket policies
//! plus a complementary sliding-window throttler, both keyed per subject.

use dashmap::DashMap;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyName {
    User,
    Ip,
    Global,
    Burst,
    AiQuery,
    Default,
}

#[derive(Debug, Clone, Copy)]
pub enum KeyStrategy {
    UserOrIp,
    Ip,
    Constant(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct PolicyDef {
    pub name: PolicyName,
    pub window: Duration,
    pub limit: u32,
    pub keyed_on: KeyStrategy,
}

/// The six named policies from §4.H's table. Routes compose whichever
/// subset and order they need via [`MultiPolicyLimiter::new`].
pub fn user_policy() -> PolicyDef {
    PolicyDef { name: PolicyName::User, window: Duration::from_secs(3600), limit: 60, keyed_on: KeyStrategy::UserOrIp }
}
pub fn ip_policy() -> PolicyDef {
    PolicyDef { name: PolicyName::Ip, window: Duration::from_secs(3600), limit: 100, keyed_on: KeyStrategy::Ip }
}
pub fn global_policy() -> PolicyDef {
    PolicyDef { name: PolicyName::Global, window: Duration::from_secs(3600), limit: 1000, keyed_on: KeyStrategy::Constant("global") }
}
pub fn burst_policy() -> PolicyDef {
    PolicyDef { name: PolicyName::Burst, window: Duration::from_secs(60), limit: 10, keyed_on: KeyStrategy::UserOrIp }
}
pub fn ai_query_policy() -> PolicyDef {
    PolicyDef { name: PolicyName::AiQuery, window: Duration::from_secs(3600), limit: 30, keyed_on: KeyStrategy::UserOrIp }
}
pub fn default_policy() -> PolicyDef {
    PolicyDef { name: PolicyName::Default, window: Duration::from_secs(15 * 60), limit: 30, keyed_on: KeyStrategy::Ip }
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub subject_id: Option<String>,
    pub ip: String,
}

impl KeyStrategy {
    fn resolve(self, ctx: &RequestContext) -> String {
        match self {
            KeyStrategy::UserOrIp => ctx.subject_id.clone().unwrap_or_else(|| ctx.ip.clone()),
            KeyStrategy::Ip => ctx.ip.clone(),
            KeyStrategy::Constant(c) => c.to_string(),
        }
    }
}

struct Bucket {
    window_start: Instant,
    count: u32,
    blocked_count: u32,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RateLimitRejection {
    pub policy: PolicyName,
    pub limit: u32,
    pub window_secs: u64,
    pub retry_after_secs: u64,
}

impl RateLimitRejection {
    /// Standard rate-limit response headers for the HTTP surface.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("X-RateLimit-Limit", self.limit.to_string()),
            ("X-RateLimit-Remaining", "0".to_string()),
            ("Retry-After", self.retry_after_secs.to_string()),
        ]
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SubjectStats {
    pub total_requests: u64,
    pub blocked_requests: u64,
    pub active_windows: usize,
    pub last_reset_secs_ago: Option<u64>,
}

/// Evaluates a chain of policies in the order supplied; the first rejection
/// short-circuits the whole chain.
pub struct MultiPolicyLimiter {
    policies: Vec<PolicyDef>,
    buckets: DashMap<(PolicyName, String), Bucket>,
}

impl MultiPolicyLimiter {
    pub fn new(policies: Vec<PolicyDef>) -> Self {
        Self {
            policies,
            buckets: DashMap::new(),
        }
    }

    pub fn check(&self, ctx: &RequestContext) -> Result<(), RateLimitRejection> {
        for policy in &self.policies {
            let key = policy.keyed_on.resolve(ctx);
            let bucket_key = (policy.name, key);
            let mut bucket = self.buckets.entry(bucket_key).or_insert_with(|| Bucket {
                window_start: Instant::now(),
                count: 0,
                blocked_count: 0,
            });

            if bucket.window_start.elapsed() >= policy.window {
                bucket.window_start = Instant::now();
                bucket.count = 0;
            }

            if bucket.count >= policy.limit {
                bucket.blocked_count += 1;
                let retry_after = policy.window.saturating_sub(bucket.window_start.elapsed());
                return Err(RateLimitRejection {
                    policy: policy.name,
                    limit: policy.limit,
                    window_secs: policy.window.as_secs(),
                    retry_after_secs: retry_after.as_secs(),
                });
            }
            bucket.count += 1;
        }
        Ok(())
    }

    pub fn stats_for_subject(&self, key: &str) -> SubjectStats {
        let mut stats = SubjectStats::default();
        let mut latest_window_start: Option<Instant> = None;
        for entry in self.buckets.iter() {
            if entry.key().1 != key {
                continue;
            }
            stats.total_requests += entry.count as u64;
            stats.blocked_requests += entry.blocked_count as u64;
            stats.active_windows += 1;
            latest_window_start = Some(match latest_window_start {
                Some(existing) if existing > entry.window_start => existing,
                _ => entry.window_start,
            });
        }
        stats.last_reset_secs_ago = latest_window_start.map(|t| t.elapsed().as_secs());
        stats
    }
}

/// Sliding-window throttler (§4.H): if a subject already has `limit`
/// requests within the trailing `window`, delay until the oldest one ages
/// out rather than rejecting outright.
pub struct Throttler {
    state: DashMap<String, Mutex<VecDeque<Instant>>>,
    limit: usize,
    window: Duration,
}

impl Throttler {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            state: DashMap::new(),
            limit,
            window,
        }
    }

    pub async fn throttle(&self, key: &str) {
        let sleep_for = {
            let entry = self.state.entry(key.to_string()).or_insert_with(|| Mutex::new(VecDeque::new()));
            let mut timestamps = entry.lock().unwrap();
            let now = Instant::now();
            while timestamps.front().map(|t| now.duration_since(*t) > self.window).unwrap_or(false) {
                timestamps.pop_front();
            }

            if timestamps.len() >= self.limit {
                let oldest = *timestamps.front().unwrap();
                Some(self.window.saturating_sub(now.duration_since(oldest)))
            } else {
                timestamps.push_back(now);
                None
            }
        };

        if let Some(delay) = sleep_for {
            debug!(key, delay_ms = delay.as_millis() as u64, "throttling request");
            tokio::time::sleep(delay).await;
            let entry = self.state.entry(key.to_string()).or_insert_with(|| Mutex::new(VecDeque::new()));
            entry.lock().unwrap().push_back(Instant::now());
        }

        self.maybe_cleanup();
    }

    /// Drops subject entries with no timestamps left, with roughly 1%
    /// probability per call so this never runs on every request.
    fn maybe_cleanup(&self) {
        if rand::thread_rng().gen_range(0..100) != 0 {
            return;
        }
        let empty: Vec<String> = self
            .state
            .iter()
            .filter(|e| e.value().lock().unwrap().is_empty())
            .map(|e| e.key().clone())
            .collect();
        for key in empty {
            self.state.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(subject: &str) -> RequestContext {
        RequestContext {
            subject_id: Some(subject.to_string()),
            ip: "127.0.0.1".to_string(),
        }
    }

    #[test]
    fn allows_requests_within_limit() {
        let limiter = MultiPolicyLimiter::new(vec![PolicyDef {
            name: PolicyName::AiQuery,
            window: Duration::from_secs(60),
            limit: 2,
            keyed_on: KeyStrategy::UserOrIp,
        }]);
        assert!(limiter.check(&ctx("u1")).is_ok());
        assert!(limiter.check(&ctx("u1")).is_ok());
    }

    #[test]
    fn rejects_at_the_limit_boundary() {
        let limiter = MultiPolicyLimiter::new(vec![PolicyDef {
            name: PolicyName::AiQuery,
            window: Duration::from_secs(60),
            limit: 30,
            keyed_on: KeyStrategy::UserOrIp,
        }]);
        for _ in 0..30 {
            assert!(limiter.check(&ctx("u1")).is_ok());
        }
        let err = limiter.check(&ctx("u1")).unwrap_err();
        assert_eq!(err.policy, PolicyName::AiQuery);
        assert_eq!(err.limit, 30);
    }

    #[test]
    fn blocked_requests_do_not_inflate_the_admitted_count() {
        let limiter = MultiPolicyLimiter::new(vec![PolicyDef {
            name: PolicyName::AiQuery,
            window: Duration::from_secs(60),
            limit: 5,
            keyed_on: KeyStrategy::UserOrIp,
        }]);
        for _ in 0..5 {
            assert!(limiter.check(&ctx("u1")).is_ok());
        }
        for _ in 0..3 {
            assert!(limiter.check(&ctx("u1")).is_err());
        }
        let bucket = limiter.buckets.get(&(PolicyName::AiQuery, "u1".to_string())).unwrap();
        assert_eq!(bucket.count, 5, "count must stay at the limit once requests start being blocked");
        assert_eq!(bucket.blocked_count, 3);
    }

    #[test]
    fn different_subjects_have_independent_buckets() {
        let limiter = MultiPolicyLimiter::new(vec![PolicyDef {
            name: PolicyName::User,
            window: Duration::from_secs(60),
            limit: 1,
            keyed_on: KeyStrategy::UserOrIp,
        }]);
        assert!(limiter.check(&ctx("u1")).is_ok());
        assert!(limiter.check(&ctx("u2")).is_ok());
        assert!(limiter.check(&ctx("u1")).is_err());
    }

    #[test]
    fn chain_short_circuits_on_first_rejecting_policy() {
        let limiter = MultiPolicyLimiter::new(vec![
            PolicyDef { name: PolicyName::Burst, window: Duration::from_secs(60), limit: 1, keyed_on: KeyStrategy::UserOrIp },
            PolicyDef { name: PolicyName::Global, window: Duration::from_secs(60), limit: 1000, keyed_on: KeyStrategy::Constant("global") },
        ]);
        assert!(limiter.check(&ctx("u1")).is_ok());
        let err = limiter.check(&ctx("u1")).unwrap_err();
        assert_eq!(err.policy, PolicyName::Burst);
    }

    #[test]
    fn stats_aggregate_across_policies_for_a_subject() {
        let limiter = MultiPolicyLimiter::new(vec![
            PolicyDef { name: PolicyName::Burst, window: Duration::from_secs(60), limit: 10, keyed_on: KeyStrategy::UserOrIp },
            PolicyDef { name: PolicyName::User, window: Duration::from_secs(3600), limit: 60, keyed_on: KeyStrategy::UserOrIp },
        ]);
        limiter.check(&ctx("u1")).unwrap();
        limiter.check(&ctx("u1")).unwrap();
        let stats = limiter.stats_for_subject("u1");
        assert_eq!(stats.total_requests, 4);
        assert_eq!(stats.active_windows, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn throttler_delays_requests_over_the_sliding_limit() {
        let throttler = Throttler::new(2, Duration::from_secs(1));
        throttler.throttle("k").await;
        throttler.throttle("k").await;

        let start = tokio::time::Instant::now();
        throttler.throttle("k").await;
        assert!(tokio::time::Instant::now() >= start);
    }
}
