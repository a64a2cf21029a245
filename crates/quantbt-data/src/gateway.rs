//! 시장 데이터 게이트웨이.
//!
//! 과거 시리즈에 대한 read-through 캐시 접근을 제공합니다.
//! 캐시 키는 정확히 (symbol, start, end) 삼중쌍이며, 범위 교차 캐싱은
//! 하지 않습니다.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use quantbt_core::{DataFallback, MarketDataConfig, MarketPoint};
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::error::DataResult;
use crate::repository::MarketDataRepository;
use crate::synthetic::generate_synthetic_series;

type CacheKey = (String, NaiveDate, NaiveDate);

struct CacheEntry {
    inserted_at: Instant,
    series: Arc<Vec<MarketPoint>>,
}

/// 과거 시장 데이터 게이트웨이.
///
/// DB 조회 결과를 TTL 캐시에 보관합니다. 캐시 시리즈는 `Arc`로 공유되므로
/// 여러 워커가 같은 시리즈를 복사 없이 읽을 수 있습니다.
pub struct MarketDataGateway {
    pool: PgPool,
    ttl: Duration,
    fallback: DataFallback,
    cache: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl MarketDataGateway {
    /// 설정으로 게이트웨이를 생성합니다.
    pub fn new(pool: PgPool, config: &MarketDataConfig) -> Self {
        Self {
            pool,
            ttl: Duration::from_secs(config.cache_ttl_secs),
            fallback: config.fallback,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// 기간별 시장 데이터를 로드합니다 (캐시 우선).
    ///
    /// 저장된 데이터가 없으면 설정된 대체 정책을 따릅니다:
    /// - `Empty`: 빈 시리즈 반환 (호출자에서 실패로 처리됨)
    /// - `Synthetic`: 고정 시드 합성 시리즈 생성
    #[instrument(skip(self))]
    pub async fn load(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> DataResult<Arc<Vec<MarketPoint>>> {
        let key: CacheKey = (symbol.to_string(), start, end);

        // 캐시 히트 확인
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(&key) {
                if entry.inserted_at.elapsed() < self.ttl {
                    debug!("Market data cache hit for {} {}..{}", symbol, start, end);
                    return Ok(Arc::clone(&entry.series));
                }
            }
        }

        let series = self.load_uncached(symbol, start, end).await?;
        let series = Arc::new(series);

        let mut cache = self.cache.write().await;
        // 교체 전에 만료된 항목도 정리
        cache.retain(|_, entry| entry.inserted_at.elapsed() < self.ttl);
        cache.insert(
            key,
            CacheEntry {
                inserted_at: Instant::now(),
                series: Arc::clone(&series),
            },
        );

        Ok(series)
    }

    async fn load_uncached(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> DataResult<Vec<MarketPoint>> {
        let stored = MarketDataRepository::find_range(&self.pool, symbol, start, end).await?;

        if !stored.is_empty() {
            info!(
                "Loaded {} historical data points for {} from database",
                stored.len(),
                symbol
            );
            return Ok(stored);
        }

        match self.fallback {
            DataFallback::Empty => {
                warn!("No historical data found for {}. Returning empty series.", symbol);
                Ok(Vec::new())
            }
            DataFallback::Synthetic => {
                warn!("No historical data found for {}. Generating synthetic data.", symbol);
                let synthetic = generate_synthetic_series(symbol, start, end);
                info!(
                    "Generated {} synthetic data points for {}",
                    synthetic.len(),
                    symbol
                );
                Ok(synthetic)
            }
        }
    }

    /// 캐시를 비웁니다.
    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
    }

    /// 현재 캐시 항목 수.
    pub async fn cache_len(&self) -> usize {
        self.cache.read().await.len()
    }
}
