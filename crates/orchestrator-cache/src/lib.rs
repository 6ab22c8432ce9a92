//! Redis-backed multi-tier response cache: L1 exact, L2 semantic (Jaccard),
//! L3 negative, and L4 pattern tiers, read in ascending cost order and
//! stopping on first hit. Every write commits to at least two
//! representations (L1 plus L2); cache errors are treated as a miss and
//! never propagate to the caller.

mod canonical;
mod config;
mod similarity;

pub use canonical::{canonicalize_text, l1_key, short_hash};
pub use config::CacheConfig;
pub use similarity::{jaccard, DEFAULT_SIMILARITY_THRESHOLD};

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which tier served a cache hit, surfaced in telemetry as `source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheSource {
    L1Exact,
    L2Semantic,
    Negative,
    Pattern,
}

#[derive(Debug, Clone)]
pub struct CacheResult {
    pub hit: bool,
    pub payload: Option<Value>,
    pub source: Option<CacheSource>,
    pub latency: Duration,
}

impl CacheResult {
    fn miss(latency: Duration) -> Self {
        Self { hit: false, payload: None, source: None, latency }
    }

    fn hit(payload: Value, source: CacheSource, latency: Duration) -> Self {
        Self { hit: true, payload: Some(payload), source: Some(source), latency }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct L2Record {
    canonical_text: String,
    original_text: String,
    intent: String,
    model_id: String,
    timestamp: u64,
    schema_version: String,
    payload: Value,
}

const APOLOGY_PAYLOAD_SV: &str = "Tyvärr kunde jag inte hjälpa till med det just nu.";

/// Per-tier hit/miss counters, kept for the monitoring endpoint. Cheap
/// atomics rather than a mutexed struct since they're only ever incremented,
/// never read-modify-written as a group.
#[derive(Default)]
pub struct CacheStats {
    l1_hits: AtomicU64,
    l2_hits: AtomicU64,
    negative_hits: AtomicU64,
    pattern_hits: AtomicU64,
    misses: AtomicU64,
}

/// Point-in-time read of [`CacheStats`].
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStatsSnapshot {
    pub l1_hits: u64,
    pub l2_hits: u64,
    pub negative_hits: u64,
    pub pattern_hits: u64,
    pub misses: u64,
    pub total_lookups: u64,
}

impl CacheStats {
    fn record(&self, source: Option<CacheSource>) {
        let counter = match source {
            Some(CacheSource::L1Exact) => &self.l1_hits,
            Some(CacheSource::L2Semantic) => &self.l2_hits,
            Some(CacheSource::Negative) => &self.negative_hits,
            Some(CacheSource::Pattern) => &self.pattern_hits,
            None => &self.misses,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        let l1_hits = self.l1_hits.load(Ordering::Relaxed);
        let l2_hits = self.l2_hits.load(Ordering::Relaxed);
        let negative_hits = self.negative_hits.load(Ordering::Relaxed);
        let pattern_hits = self.pattern_hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        CacheStatsSnapshot {
            l1_hits,
            l2_hits,
            negative_hits,
            pattern_hits,
            misses,
            total_lookups: l1_hits + l2_hits + negative_hits + pattern_hits + misses,
        }
    }
}

pub struct Cache {
    conn: ConnectionManager,
    config: CacheConfig,
    stats: CacheStats,
}

impl Cache {
    pub fn new(conn: ConnectionManager, config: CacheConfig) -> Self {
        Self { conn, config, stats: CacheStats::default() }
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    /// Traverses L1 -> L2 -> negative -> pattern, stopping at the first
    /// hit. Any Redis error is swallowed and treated as a miss.
    pub async fn get(&self, intent: &str, text: &str, model_id: &str, schema_version: &str) -> CacheResult {
        let start = Instant::now();
        let result = self.get_inner(intent, text, model_id, schema_version, start).await;
        self.stats.record(result.source);
        result
    }

    async fn get_inner(&self, intent: &str, text: &str, model_id: &str, schema_version: &str, start: Instant) -> CacheResult {
        if let Some(payload) = self.get_l1(schema_version, model_id, intent, text, "{}").await {
            return CacheResult::hit(payload, CacheSource::L1Exact, start.elapsed());
        }

        if let Some(payload) = self.get_l2(intent, text).await {
            return CacheResult::hit(payload, CacheSource::L2Semantic, start.elapsed());
        }

        if self.get_negative(text).await {
            return CacheResult::hit(serde_json::json!({ "text": APOLOGY_PAYLOAD_SV }), CacheSource::Negative, start.elapsed());
        }

        if let Some(payload) = self.get_pattern(intent, text).await {
            return CacheResult::hit(payload, CacheSource::Pattern, start.elapsed());
        }

        CacheResult::miss(start.elapsed())
    }

    async fn get_l1(&self, schema_version: &str, model_id: &str, intent: &str, text: &str, facts: &str) -> Option<Value> {
        let key = l1_key(schema_version, model_id, intent, text, facts);
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(&key).await.ok()?;
        raw.and_then(|raw| serde_json::from_str(&raw).ok())
    }

    async fn get_l2(&self, intent: &str, text: &str) -> Option<Value> {
        let mut conn = self.conn.clone();
        let index_key = format!("l2:index:{intent}");
        let candidates: Vec<String> = conn.smembers(&index_key).await.ok()?;

        let query_tokens = canonical::tokenize(text);
        let mut best: Option<(f64, Value)> = None;

        for candidate_hash in candidates.into_iter().take(self.config.search_cap) {
            let record_key = format!("l2:{intent}:{candidate_hash}");
            let Ok(Some(raw)) = conn.get::<_, Option<String>>(&record_key).await else { continue };
            let Ok(record) = serde_json::from_str::<L2Record>(&raw) else { continue };

            let candidate_tokens = canonical::tokenize(&record.canonical_text);
            let score = jaccard(&query_tokens, &candidate_tokens);

            if score >= self.config.similarity_threshold {
                match &best {
                    Some((best_score, _)) if *best_score >= score => {}
                    _ => best = Some((score, record.payload)),
                }
            }
        }

        best.map(|(_, payload)| payload)
    }

    async fn get_negative(&self, text: &str) -> bool {
        let mut conn = self.conn.clone();
        let key = format!("neg:{}", short_hash(text));
        conn.exists(&key).await.unwrap_or(false)
    }

    async fn get_pattern(&self, intent: &str, text: &str) -> Option<Value> {
        let mut conn = self.conn.clone();
        let bucket = length_bucket(text);
        let key = format!("pattern:{intent}:{bucket}");
        let raw: Option<String> = conn.get(&key).await.ok()?;
        raw.and_then(|raw| serde_json::from_str(&raw).ok())
    }

    /// Writes L1 exact and an L2 semantic record. Write failures are
    /// logged (when the `tracing` feature is enabled) and otherwise
    /// swallowed; this never fails the caller's request.
    pub async fn set(&self, intent: &str, text: &str, payload: &Value, model_id: &str, schema_version: &str) {
        let mut conn = self.conn.clone();

        let l1 = l1_key(schema_version, model_id, intent, text, "{}");
        let serialized = serde_json::to_string(payload).unwrap_or_default();
        let _: Result<(), _> = conn.set_ex(&l1, &serialized, self.config.l1_ttl.as_secs()).await;

        let hash = short_hash(text);
        let record = L2Record {
            canonical_text: canonicalize_text(text),
            original_text: text.to_string(),
            intent: intent.to_string(),
            model_id: model_id.to_string(),
            timestamp: now_unix(),
            schema_version: schema_version.to_string(),
            payload: payload.clone(),
        };
        if let Ok(record_json) = serde_json::to_string(&record) {
            let record_key = format!("l2:{intent}:{hash}");
            let index_key = format!("l2:index:{intent}");
            let _: Result<(), _> = conn.set_ex(&record_key, &record_json, self.config.l2_ttl.as_secs()).await;
            let _: Result<(), _> = conn.sadd(&index_key, &hash).await;
            let _: Result<(), _> = conn.expire(&index_key, self.config.l2_ttl.as_secs() as i64).await;
        }
    }

    pub async fn set_negative(&self, text: &str, _intent: &str) {
        let mut conn = self.conn.clone();
        let key = format!("neg:{}", short_hash(text));
        let _: Result<(), _> = conn.set_ex(&key, "1", self.config.negative_ttl.as_secs()).await;
    }

    pub async fn set_pattern(&self, intent: &str, text: &str, payload: &Value) {
        let mut conn = self.conn.clone();
        let bucket = length_bucket(text);
        let key = format!("pattern:{intent}:{bucket}");
        let serialized = serde_json::to_string(payload).unwrap_or_default();
        let _: Result<(), _> = conn.set_ex(&key, &serialized, self.config.pattern_ttl.as_secs()).await;
    }

    /// Removes every entry tagged with `intent` or `schema_version`. Used on
    /// schema upgrades; a best-effort scan, not transactional.
    pub async fn invalidate_by_tag(&self, tag: &str) {
        let mut conn = self.conn.clone();
        let pattern = format!("*{tag}*");
        if let Ok(keys) = conn.keys::<_, Vec<String>>(&pattern).await {
            if !keys.is_empty() {
                let _: Result<(), _> = conn.del(keys).await;
            }
        }
    }
}

fn length_bucket(text: &str) -> &'static str {
    match text.chars().count() {
        0..=20 => "short",
        21..=80 => "medium",
        _ => "long",
    }
}

fn now_unix() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_secs()
}
