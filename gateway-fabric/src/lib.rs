//! The guard fabric wrapped around every outbound provider call: the
//! response cache (§4.G), rate limiter and throttler (§4.H), and the
//! generic retry engine (§4.I).

pub mod cache;
pub mod rate_limit;
pub mod retry;

pub use cache::{CacheStats, ContextIdentifier, ResponseCache};
pub use rate_limit::{
    ai_query_policy, burst_policy, default_policy, global_policy, ip_policy, user_policy,
    KeyStrategy, MultiPolicyLimiter, PolicyDef, PolicyName, RateLimitRejection, RequestContext,
    SubjectStats, Throttler,
};
pub use retry::retry;
