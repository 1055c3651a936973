use std::sync::Arc;

use datasets::Sample;
use embedding_store::EmbeddingMap;
use feature_cache::{CacheConfig, FeatureCache};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::RunContext;
use crate::error::AssemblyError;
use crate::layout::Widths;
use crate::provider::{BehaviorQuery, FeatureProvider, Tensor, UserBehavior};

pub const ITEM_EMBEDDING_DIM: usize = 10;
pub const USER_BEHAVIOR_LEN: usize = 10;

const USER_CACHE_SIZE: usize = 200_000;
const ITEM_CACHE_SIZE: usize = 2_000_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    /// Width of one item embedding.
    pub embedding_dim: usize,
    /// Behavior slots per user; the block is `behavior_len × embedding_dim` wide.
    pub behavior_len: usize,
    pub user_cache: CacheConfig,
    pub item_cache: CacheConfig,
    pub behavior_cache: CacheConfig,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            embedding_dim: ITEM_EMBEDDING_DIM,
            behavior_len: USER_BEHAVIOR_LEN,
            user_cache: CacheConfig::with_max_size(USER_CACHE_SIZE),
            item_cache: CacheConfig::with_max_size(ITEM_CACHE_SIZE),
            behavior_cache: CacheConfig::with_max_size(USER_CACHE_SIZE * USER_BEHAVIOR_LEN),
        }
    }
}

/// Caches shared by every assembler of one run.
pub struct FeatureCaches {
    pub users: FeatureCache<u64, Tensor>,
    pub items: FeatureCache<u64, Tensor>,
    /// Behavior blocks keyed by `(user, timestamp)`.
    pub behaviors: FeatureCache<(u64, i64), Tensor>,
}

impl FeatureCaches {
    pub fn new(config: &AssemblerConfig) -> Self {
        Self {
            users: FeatureCache::new(config.user_cache.clone()),
            items: FeatureCache::new(config.item_cache.clone()),
            behaviors: FeatureCache::new(config.behavior_cache.clone()),
        }
    }

    pub fn clear(&self) {
        self.users.clear();
        self.items.clear();
        self.behaviors.clear();
    }
}

/// Identifies one vector to assemble. A zero timestamp means "latest".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SampleKey {
    pub user_id: u64,
    pub item_id: u64,
    pub timestamp: i64,
}

impl SampleKey {
    pub fn latest(user_id: u64, item_id: u64) -> Self {
        Self {
            user_id,
            item_id,
            timestamp: 0,
        }
    }
}

impl From<&Sample> for SampleKey {
    fn from(sample: &Sample) -> Self {
        Self {
            user_id: sample.user_id,
            item_id: sample.item_id,
            timestamp: sample.timestamp,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AssembledVector {
    pub values: Vec<f64>,
    pub widths: Widths,
}

/// Joins user, behavior, embedding and item features into one vector.
pub struct SampleAssembler {
    provider: FeatureProvider,
    embeddings: Option<Arc<EmbeddingMap>>,
    caches: Arc<FeatureCaches>,
    config: AssemblerConfig,
}

impl SampleAssembler {
    pub fn new(
        provider: FeatureProvider,
        embeddings: Option<Arc<EmbeddingMap>>,
        caches: Arc<FeatureCaches>,
        config: AssemblerConfig,
    ) -> Result<Self, AssemblyError> {
        if let Some(map) = &embeddings {
            if map.dimension() != config.embedding_dim {
                return Err(AssemblyError::EmbeddingDimension {
                    expected: config.embedding_dim,
                    found: map.dimension(),
                });
            }
        }
        Ok(Self {
            provider,
            embeddings,
            caches,
            config,
        })
    }

    /// Same assembler backed by a different set of caches.
    pub fn with_caches(self, caches: Arc<FeatureCaches>) -> Self {
        Self { caches, ..self }
    }

    pub fn provider(&self) -> &FeatureProvider {
        &self.provider
    }

    pub fn embeddings(&self) -> Option<&Arc<EmbeddingMap>> {
        self.embeddings.as_ref()
    }

    pub fn caches(&self) -> &Arc<FeatureCaches> {
        &self.caches
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Builds `user | behavior | item embedding | item` for `key`.
    ///
    /// Missing embeddings and behavior capabilities contribute zeros of the
    /// configured width, so the layout only depends on feature widths.
    pub fn assemble(
        &self,
        ctx: &RunContext,
        key: SampleKey,
    ) -> Result<AssembledVector, AssemblyError> {
        ctx.check()?;
        let user = self
            .caches
            .users
            .fetch(&key.user_id, self.caches.users.config().ttl(), || {
                self.provider.users.user_feature(ctx, key.user_id)
            })
            .map_err(|source| AssemblyError::UserFeature {
                user: key.user_id,
                source,
            })?;
        let item = self
            .caches
            .items
            .fetch(&key.item_id, self.caches.items.config().ttl(), || {
                self.provider.items.item_feature(ctx, key.item_id)
            })
            .map_err(|source| AssemblyError::ItemFeature {
                item: key.item_id,
                source,
            })?;

        let dim = self.config.embedding_dim;
        let behavior_width = dim * self.config.behavior_len;
        let mut values = Vec::with_capacity(user.len() + behavior_width + dim + item.len());
        values.extend_from_slice(&user);

        match (&self.embeddings, &self.provider.user_behavior) {
            (Some(map), Some(source)) => {
                let block = self.behavior_block(ctx, source.as_ref(), map, key)?;
                values.extend_from_slice(&block);
            }
            _ => values.resize(values.len() + behavior_width, 0.0),
        }

        let embedding_start = values.len();
        values.resize(embedding_start + dim, 0.0);
        if let Some(map) = &self.embeddings {
            if !map.copy_into(&key.item_id.to_string(), &mut values[embedding_start..]) {
                debug!(item = key.item_id, "item embedding not found, using zeros");
            }
        }
        values.extend_from_slice(&item);

        Ok(AssembledVector {
            values,
            widths: Widths {
                user: user.len(),
                behavior: behavior_width,
                item_embedding: dim,
                item: item.len(),
            },
        })
    }

    /// Embeddings of the user's latest items up to the key's timestamp, zero padded.
    fn behavior_block(
        &self,
        ctx: &RunContext,
        source: &dyn UserBehavior,
        map: &EmbeddingMap,
        key: SampleKey,
    ) -> Result<Arc<Tensor>, AssemblyError> {
        let dim = self.config.embedding_dim;
        let slots = self.config.behavior_len;
        let query = BehaviorQuery {
            max_len: slots,
            max_pk: None,
            max_ts: (key.timestamp != 0).then_some(key.timestamp),
        };
        self.caches
            .behaviors
            .fetch(
                &(key.user_id, key.timestamp),
                self.caches.behaviors.config().ttl(),
                || -> anyhow::Result<Tensor> {
                    let items = source.user_behavior(ctx, key.user_id, query)?;
                    let mut block = vec![0.0; dim * slots];
                    for (slot, item) in items.iter().take(slots).enumerate() {
                        map.copy_into(&item.to_string(), &mut block[slot * dim..(slot + 1) * dim]);
                    }
                    Ok(block)
                },
            )
            .map_err(|source| AssemblyError::UserBehavior {
                user: key.user_id,
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use datasets::CancelToken;
    use feature_cache::{TimeSeq, UserBehaviorCache};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::provider::{ItemFeaturer, UserFeaturer};

    struct Counting {
        calls: AtomicUsize,
    }

    impl UserFeaturer for Counting {
        fn user_feature(&self, _ctx: &RunContext, user: u64) -> Result<Tensor> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![user as f64; 2])
        }
    }

    struct Items;

    impl ItemFeaturer for Items {
        fn item_feature(&self, _ctx: &RunContext, item: u64) -> Result<Tensor> {
            if item == 404 {
                return Err(anyhow!("no such item"));
            }
            Ok(vec![item as f64])
        }
    }

    fn small_config() -> AssemblerConfig {
        AssemblerConfig {
            embedding_dim: 2,
            behavior_len: 3,
            ..AssemblerConfig::default()
        }
    }

    fn embeddings() -> Arc<EmbeddingMap> {
        let mut map = EmbeddingMap::new(2);
        map.insert("7", vec![0.7, 0.7]).unwrap();
        map.insert("8", vec![0.8, 0.8]).unwrap();
        map.insert("9", vec![0.9, 0.9]).unwrap();
        Arc::new(map)
    }

    fn assembler(
        provider: FeatureProvider,
        embeddings: Option<Arc<EmbeddingMap>>,
    ) -> SampleAssembler {
        let config = small_config();
        let caches = Arc::new(FeatureCaches::new(&config));
        SampleAssembler::new(provider, embeddings, caches, config).unwrap()
    }

    #[test]
    fn vector_layout_without_embeddings_is_zero_padded() {
        let users = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let assembler = assembler(FeatureProvider::new(users.clone(), Arc::new(Items)), None);
        let ctx = RunContext::train(CancelToken::new());

        let vector = assembler.assemble(&ctx, SampleKey::latest(3, 5)).unwrap();
        assert_eq!(
            vector.values,
            vec![3.0, 3.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 5.0]
        );
        assert_eq!(vector.widths.total(), vector.values.len());

        assembler.assemble(&ctx, SampleKey::latest(3, 6)).unwrap();
        assert_eq!(users.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn behavior_block_respects_sample_timestamp() {
        let behavior = Arc::new(UserBehaviorCache::new());
        behavior.set(
            1,
            TimeSeq::new(vec![30, 20, 10], vec![9, 8, 7]).unwrap(),
        );
        let provider = FeatureProvider::new(
            Arc::new(Counting {
                calls: AtomicUsize::new(0),
            }),
            Arc::new(Items),
        )
        .with_user_behavior(behavior);
        let assembler = assembler(provider, Some(embeddings()));
        let ctx = RunContext::train(CancelToken::new());

        let key = SampleKey {
            user_id: 1,
            item_id: 9,
            timestamp: 20,
        };
        let vector = assembler.assemble(&ctx, key).unwrap();
        let info = crate::layout::SampleInfo::from_widths(vector.widths);
        assert_eq!(
            &vector.values[info.user_behavior_range.range()],
            &[0.8, 0.8, 0.7, 0.7, 0.0, 0.0]
        );
        assert_eq!(&vector.values[info.item_feature_range.range()], &[0.9, 0.9]);
    }

    #[test]
    fn failed_item_feature_is_reported() {
        let assembler = assembler(
            FeatureProvider::new(
                Arc::new(Counting {
                    calls: AtomicUsize::new(0),
                }),
                Arc::new(Items),
            ),
            None,
        );
        let ctx = RunContext::predict(CancelToken::new());
        let err = assembler.assemble(&ctx, SampleKey::latest(1, 404)).unwrap_err();
        assert!(matches!(err, AssemblyError::ItemFeature { item: 404, .. }));
    }

    #[test]
    fn embedding_dimension_is_checked_at_construction() {
        let config = AssemblerConfig::default();
        let caches = Arc::new(FeatureCaches::new(&config));
        let provider = FeatureProvider::new(
            Arc::new(Counting {
                calls: AtomicUsize::new(0),
            }),
            Arc::new(Items),
        );
        let err = SampleAssembler::new(provider, Some(embeddings()), caches, config)
            .err()
            .expect("dimension mismatch");
        assert!(matches!(
            err,
            AssemblyError::EmbeddingDimension {
                expected: 10,
                found: 2
            }
        ));
    }
}
