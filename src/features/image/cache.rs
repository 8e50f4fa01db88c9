//! 生成结果缓存：按请求指纹索引的 LRU + TTL 内存缓存。
//!
//! 缓存不是正确性边界，锁异常时退化为未命中。

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Bytes;
use lru::LruCache;
use sha2::{Digest, Sha256};

use super::types::ImageRequest;

/// 默认容量（条目数）
pub const DEFAULT_CAPACITY: usize = 10_000;
/// 默认 TTL
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// 请求指纹（SHA-256）
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// 对所有影响输出的字段做确定性摘要。
    ///
    /// 文本放在最后且其余字段定长或不含分隔符，序列化无歧义。
    pub fn from_request(req: &ImageRequest) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(
            format!(
                "{}x{}_{}_{}_{}_",
                req.width(),
                req.height(),
                req.format().as_str(),
                req.background().to_hex(),
                req.foreground().to_hex()
            )
            .as_bytes(),
        );
        hasher.update(req.text_bytes());
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({self})")
    }
}

/// 时间来源，便于测试注入
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// 单调系统时钟
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// 手动推进的时钟
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.lock().map(|n| *n).unwrap_or_else(|_| Instant::now())
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    bytes: Bytes,
    inserted_at: Instant,
    last_accessed_at: Instant,
}

/// 线程安全的 LRU + TTL 缓存
pub struct ResultCache {
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ResultCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self::with_clock(capacity, ttl, Arc::new(SystemClock))
    }

    /// 容量为 0 时按 1 处理
    pub fn with_clock(capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            clock,
        }
    }

    /// 命中时刷新最近使用顺序与存活起点；过期条目视为未命中并移除
    pub fn get(&self, key: &CacheKey) -> Option<Bytes> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().ok()?;
        let expired = match entries.get_mut(key) {
            None => return None,
            Some(entry) if now.saturating_duration_since(entry.last_accessed_at) >= self.ttl => {
                true
            }
            Some(entry) => {
                entry.last_accessed_at = now;
                return Some(entry.bytes.clone());
            }
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    /// 写入（同键后写覆盖先写）；容量满时淘汰最久未使用的条目
    pub fn put(&self, key: CacheKey, bytes: Bytes) {
        let now = self.clock.now();
        if let Ok(mut entries) = self.entries.lock() {
            if let Some((evicted, _)) = entries.push(
                key,
                CacheEntry {
                    bytes,
                    inserted_at: now,
                    last_accessed_at: now,
                },
            ) && evicted != key
            {
                tracing::debug!("缓存已满，淘汰 {}", evicted);
            }
        }
    }

    /// 条目写入时刻（不随访问刷新）
    pub fn inserted_at(&self, key: &CacheKey) -> Option<Instant> {
        let entries = self.entries.lock().ok()?;
        entries.peek(key).map(|e| e.inserted_at)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().map(|e| e.cap().get()).unwrap_or(0)
    }
}
