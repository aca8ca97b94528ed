//! Structured logging field name constants.
//!
//! All crates use these constants for consistent structured logging fields,
//! so aggregation tools can query by standardized names across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied (cache degraded) |
//! | INFO  | Lifecycle events, operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration (per-chunk rows, candidate ids) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across one retrieval. Format: UUIDv7.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "geocode", "db", "engine"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "spatial", "result_cache", "registry", "pool", "orchestrator"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "resolve", "locate", "read", "refresh", "fetch"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Scope (administrative region) code under operation.
pub const SCOPE: &str = "scope";

/// Category filter in effect ("ALL" for the wildcard).
pub const CATEGORY: &str = "category";

/// Join strategy in effect for a registry fetch.
pub const STRATEGY: &str = "strategy";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows returned by a query or stage.
pub const RESULT_COUNT: &str = "result_count";

/// Number of candidate locations for a request.
pub const CANDIDATE_COUNT: &str = "candidate_count";

/// Number of location ids not covered by a fresh cache row.
pub const MISSING_COUNT: &str = "missing_count";

/// Number of chunks a fetch was partitioned into.
pub const CHUNK_COUNT: &str = "chunk_count";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in a pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in a pool.
pub const POOL_IDLE: &str = "pool_idle";
