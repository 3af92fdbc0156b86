//! Process-wide rollout policy with atomic snapshot swaps.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use run_authz_sdk::{PolicySourceError, RolloutPolicy, RolloutPolicySource};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Immutable policy plus a version that changes on every effective swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySnapshot {
    pub policy: RolloutPolicy,
    pub version: u64,
}

/// Holder of the current [`PolicySnapshot`]. Readers never see a partially
/// updated policy.
pub struct PolicyStore {
    current: ArcSwap<PolicySnapshot>,
}

impl PolicyStore {
    #[must_use]
    pub fn new(policy: RolloutPolicy) -> Self {
        Self {
            current: ArcSwap::from_pointee(PolicySnapshot { policy, version: 1 }),
        }
    }

    #[must_use]
    pub fn current(&self) -> Arc<PolicySnapshot> {
        self.current.load_full()
    }

    /// Install `policy`; returns the resulting version. Installing an equal
    /// policy keeps the current version.
    pub fn replace(&self, policy: RolloutPolicy) -> u64 {
        let mut installed = 0;
        self.current.rcu(|current| {
            if current.policy == policy {
                installed = current.version;
                Arc::clone(current)
            } else {
                installed = current.version + 1;
                Arc::new(PolicySnapshot {
                    policy: policy.clone(),
                    version: installed,
                })
            }
        });
        installed
    }

    /// Fetch from `source` and install if valid.
    ///
    /// # Errors
    ///
    /// Source failures or invalid policies; the current snapshot is kept.
    pub async fn refresh_from(
        &self,
        source: &dyn RolloutPolicySource,
    ) -> Result<u64, PolicySourceError> {
        let policy = source.fetch_policy().await?;
        policy.validate()?;
        let before = self.current().version;
        let version = self.replace(policy);
        if version != before {
            let snapshot = self.current();
            info!(
                version,
                mode = %snapshot.policy.mode,
                "rollout policy updated"
            );
        }
        Ok(version)
    }

    /// Poll `source` every `interval` until `cancel` fires. A fetch that
    /// outlives `interval` is abandoned, and cancellation interrupts an
    /// in-flight fetch.
    pub fn spawn_refresher(
        self: &Arc<Self>,
        source: Arc<dyn RolloutPolicySource>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let refresh =
                            tokio::time::timeout(interval, store.refresh_from(source.as_ref()));
                        tokio::select! {
                            () = cancel.cancelled() => break,
                            result = refresh => match result {
                                Ok(Ok(_)) => {}
                                Ok(Err(e)) => {
                                    warn!(error = %e, "rollout policy refresh failed, keeping current snapshot");
                                }
                                Err(_) => {
                                    warn!(
                                        timeout = %humantime::format_duration(interval),
                                        "rollout policy refresh timed out, keeping current snapshot"
                                    );
                                }
                            },
                        }
                    }
                }
            }
        })
    }
}

/// Source that always returns the same policy.
pub struct StaticPolicySource {
    policy: RolloutPolicy,
}

impl StaticPolicySource {
    #[must_use]
    pub fn new(policy: RolloutPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl RolloutPolicySource for StaticPolicySource {
    async fn fetch_policy(&self) -> Result<RolloutPolicy, PolicySourceError> {
        Ok(self.policy.clone())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Mutex;

    use run_authz_sdk::{AuthorizationMode, Targeting};

    use super::*;

    struct QueuedSource {
        answers: Mutex<Vec<Result<RolloutPolicy, PolicySourceError>>>,
    }

    #[async_trait]
    impl RolloutPolicySource for QueuedSource {
        async fn fetch_policy(&self) -> Result<RolloutPolicy, PolicySourceError> {
            let mut answers = self.answers.lock().unwrap();
            if answers.len() > 1 {
                answers.remove(0)
            } else {
                answers[0].clone()
            }
        }
    }

    #[test]
    fn replace_bumps_version_only_on_change() {
        let store = PolicyStore::new(RolloutPolicy::default());
        assert_eq!(store.current().version, 1);

        assert_eq!(store.replace(RolloutPolicy::default()), 1);
        assert_eq!(
            store.replace(RolloutPolicy::fixed(AuthorizationMode::DualValidate)),
            2
        );
        assert_eq!(store.current().policy.mode, AuthorizationMode::DualValidate);
    }

    #[test]
    fn held_snapshot_is_unaffected_by_swap() {
        let store = PolicyStore::new(RolloutPolicy::default());
        let held = store.current();
        store.replace(RolloutPolicy::fixed(AuthorizationMode::RelationshipOnly));

        assert_eq!(held.policy.mode, AuthorizationMode::AttributeOnly);
        assert_eq!(store.current().policy.mode, AuthorizationMode::RelationshipOnly);
    }

    #[tokio::test]
    async fn invalid_or_failed_refresh_keeps_snapshot() {
        let store = PolicyStore::new(RolloutPolicy::fixed(AuthorizationMode::DualValidate));
        let invalid = RolloutPolicy {
            mode: AuthorizationMode::RelationshipOnly,
            targeting: Targeting::Percentage {
                percentage: 120,
                seed: 0,
                otherwise: AuthorizationMode::AttributeOnly,
            },
        };
        let source = QueuedSource {
            answers: Mutex::new(vec![
                Ok(invalid),
                Err(PolicySourceError::Unavailable("flag service down".to_owned())),
            ]),
        };

        assert!(store.refresh_from(&source).await.is_err());
        assert!(store.refresh_from(&source).await.is_err());
        assert_eq!(store.current().policy.mode, AuthorizationMode::DualValidate);
        assert_eq!(store.current().version, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refresher_picks_up_new_policy_and_stops_on_cancel() {
        let store = Arc::new(PolicyStore::new(RolloutPolicy::default()));
        let source = Arc::new(StaticPolicySource::new(RolloutPolicy::fixed(
            AuthorizationMode::DualEnforceNew,
        )));
        let cancel = CancellationToken::new();

        let handle = store.spawn_refresher(source, Duration::from_secs(30), cancel.clone());
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(store.current().policy.mode, AuthorizationMode::DualEnforceNew);
        cancel.cancel();
        handle.await.unwrap();
    }

    struct HangingSource;

    #[async_trait]
    impl RolloutPolicySource for HangingSource {
        async fn fetch_policy(&self) -> Result<RolloutPolicy, PolicySourceError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hung_source_neither_blocks_cancel_nor_changes_policy() {
        let store = Arc::new(PolicyStore::new(RolloutPolicy::default()));
        let cancel = CancellationToken::new();

        let handle =
            store.spawn_refresher(Arc::new(HangingSource), Duration::from_secs(30), cancel.clone());
        tokio::time::sleep(Duration::from_secs(45)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("refresher stops while a fetch is in flight")
            .unwrap();
        assert_eq!(store.current().version, 1);
    }
}
