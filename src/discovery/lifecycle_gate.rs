/// Admission gate for newly migrated tokens
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clients::{OrganicAssessor, RiskAssessor};
use crate::data::WindowManager;
use crate::error::{EngineError, Result};
use crate::events::MigrationEvent;
use crate::polling::PollingCoordinator;
use crate::store::{log_store_failure, TokenStore};
use crate::time::Clock;
use crate::types::{
    Alert, AlertSeverity, AlertType, GateConfig, RejectReason, Token, TokenStatus,
    DEFAULT_BONDING_CURVE_CAP,
};
use crate::utils::alert_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Admitted,
    Rejected(RejectReason),
    /// Removed before the assessment finished
    Removed,
}

/// A freshly accepted migration. The token is already visible as `Pending`.
pub struct Discovery {
    pub token: Token,
    pub assessment: JoinHandle<GateOutcome>,
}

/// Rejected mints, oldest forgotten first once `capacity` is reached
struct RejectedMints {
    reasons: HashMap<String, RejectReason>,
    order: VecDeque<String>,
    capacity: usize,
}

impl RejectedMints {
    fn new(capacity: usize) -> Self {
        RejectedMints {
            reasons: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    fn insert(&mut self, mint: String, reason: RejectReason) {
        if self.reasons.insert(mint.clone(), reason).is_some() {
            return;
        }
        self.order.push_back(mint);

        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.reasons.remove(&evicted);
            }
        }
    }

    fn get(&self, mint: &str) -> Option<RejectReason> {
        self.reasons.get(mint).copied()
    }

    fn len(&self) -> usize {
        self.reasons.len()
    }
}

/// Every discovered mint runs `Pending -> RiskChecked -> OrganicChecked ->
/// Admitted` in its own task. Any failed or unavailable check rejects the
/// token, and only an admitted token gets windows and polling. A removal can
/// land at any point and wins over an assessment still in flight.
pub struct TokenLifecycleGate {
    tokens: DashMap<String, Arc<Mutex<Token>>>,
    rejected: Mutex<RejectedMints>,
    risk: Arc<dyn RiskAssessor>,
    organic: Arc<dyn OrganicAssessor>,
    poller: Arc<PollingCoordinator>,
    windows: Arc<WindowManager>,
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    config: GateConfig,
    admitted_total: AtomicU64,
    rejected_total: AtomicU64,
}

impl TokenLifecycleGate {
    pub fn new(
        risk: Arc<dyn RiskAssessor>,
        organic: Arc<dyn OrganicAssessor>,
        poller: Arc<PollingCoordinator>,
        windows: Arc<WindowManager>,
        store: Arc<dyn TokenStore>,
        clock: Arc<dyn Clock>,
        config: GateConfig,
    ) -> Self {
        TokenLifecycleGate {
            tokens: DashMap::new(),
            rejected: Mutex::new(RejectedMints::new(config.max_rejected_mints)),
            risk,
            organic,
            poller,
            windows,
            store,
            clock,
            config,
            admitted_total: AtomicU64::new(0),
            rejected_total: AtomicU64::new(0),
        }
    }

    /// Accept a migration and start its assessment.
    ///
    /// Returns `None` for mints already known or already rejected.
    pub fn on_migration(self: &Arc<Self>, event: MigrationEvent) -> Option<Discovery> {
        let now = self.clock.now();
        let (handle, token) = match self.tokens.entry(event.mint.clone()) {
            Entry::Occupied(_) => {
                debug!(mint = %event.mint, "Ignoring duplicate migration");
                return None;
            }
            Entry::Vacant(slot) => {
                // Checked under the entry guard: `reject` records the mint
                // before it frees the slot
                if self.reject_reason(&event.mint).is_some() {
                    debug!(mint = %event.mint, "Ignoring previously rejected token");
                    return None;
                }

                let mut token = Token::pending(event.mint, now);
                token.name = event.name;
                token.symbol = event.symbol;
                token.description = event.description;
                token.bonding_curve_cap = Some(
                    event
                        .bonding_curve_cap
                        .filter(|cap| *cap > 0.0)
                        .unwrap_or(DEFAULT_BONDING_CURVE_CAP),
                );

                let handle = Arc::new(Mutex::new(token.clone()));
                slot.insert(Arc::clone(&handle));
                (handle, token)
            }
        };

        info!(
            mint = %token.mint_address,
            "🆕 Migration discovered: {}", token.display_name()
        );

        let this = Arc::clone(self);
        let snapshot = token.clone();
        let assessment = tokio::spawn(async move { this.assess(handle, snapshot).await });

        Some(Discovery { token, assessment })
    }

    /// Admit `mint` directly, skipping assessment. Previously rejected mints are refused.
    pub fn track(&self, mint: &str) -> Result<bool> {
        match self.tokens.entry(mint.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                if let Some(reason) = self.reject_reason(mint) {
                    return Err(EngineError::ScamToken(format!(
                        "{} was rejected ({})",
                        mint,
                        reason.as_str()
                    )));
                }

                let mut token = Token::pending(mint.to_string(), self.clock.now());
                token.status = TokenStatus::Admitted;
                slot.insert(Arc::new(Mutex::new(token)));

                self.windows.register(mint);
                self.poller.add_token(mint);
                self.admitted_total.fetch_add(1, Ordering::Relaxed);
                info!(mint = %mint, "➕ Token added manually");
                Ok(true)
            }
        }
    }

    /// Drop `mint` from tracking. Cancels any assessment still running for it.
    pub fn remove(&self, mint: &str) -> bool {
        let handle = match self.tokens.remove(mint) {
            Some((_, handle)) => handle,
            None => return false,
        };

        {
            let mut token = handle.lock();
            token.status = TokenStatus::Removed;
            token.is_active = false;
            token.updated_at = self.clock.now();
        }

        self.poller.remove_token(mint);
        self.windows.deregister(mint);
        info!(mint = %mint, "🗑️ Token removed");
        true
    }

    pub fn token(&self, mint: &str) -> Option<Token> {
        let handle = self.tokens.get(mint).map(|entry| Arc::clone(entry.value()))?;
        let token = handle.lock().clone();
        Some(token)
    }

    pub fn status(&self, mint: &str) -> Option<TokenStatus> {
        if let Some(token) = self.token(mint) {
            return Some(token.status);
        }
        self.is_rejected(mint).then_some(TokenStatus::Rejected)
    }

    pub fn is_rejected(&self, mint: &str) -> bool {
        self.reject_reason(mint).is_some()
    }

    pub fn reject_reason(&self, mint: &str) -> Option<RejectReason> {
        self.rejected.lock().get(mint)
    }

    /// Rejected mints still remembered
    pub fn rejected_retained(&self) -> usize {
        self.rejected.lock().len()
    }

    /// Tokens still being assessed
    pub fn pending_count(&self) -> usize {
        self.handles()
            .iter()
            .filter(|handle| !handle.lock().status.is_terminal())
            .count()
    }

    pub fn admitted_count(&self) -> u64 {
        self.admitted_total.load(Ordering::Relaxed)
    }

    pub fn rejected_count(&self) -> u64 {
        self.rejected_total.load(Ordering::Relaxed)
    }

    fn handles(&self) -> Vec<Arc<Mutex<Token>>> {
        self.tokens
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    async fn assess(self: Arc<Self>, handle: Arc<Mutex<Token>>, token: Token) -> GateOutcome {
        let mint = token.mint_address.clone();
        log_store_failure("save_token", self.store.save_token(&token).await);

        let timeout = self.config.assessment_timeout();

        let risk = match tokio::time::timeout(timeout, self.risk.risk_score(&mint)).await {
            Ok(Ok(risk)) => risk,
            Ok(Err(e)) => {
                return self.reject(&handle, RejectReason::RiskUnavailable, e).await;
            }
            Err(_) => {
                let e = EngineError::NetworkTimeout(format!("risk check exceeded {:?}", timeout));
                return self.reject(&handle, RejectReason::RiskUnavailable, e).await;
            }
        };

        if !self.advance(&handle, |token| token.risk_score = Some(risk.score)) {
            return GateOutcome::Removed;
        }

        if risk.score > self.config.risk_threshold {
            let e = EngineError::RiskRejected {
                mint: mint.clone(),
                score: risk.score,
                threshold: self.config.risk_threshold,
            };
            return self.reject(&handle, RejectReason::RiskScore, e).await;
        }

        if !self.advance(&handle, |token| token.status = TokenStatus::RiskChecked) {
            return GateOutcome::Removed;
        }
        debug!(mint = %mint, "Risk check passed: {}", risk.score);

        let organic = match tokio::time::timeout(timeout, self.organic.organic_score(&mint)).await
        {
            Ok(Ok(organic)) => organic,
            Ok(Err(e)) => {
                return self.reject(&handle, RejectReason::OrganicUnavailable, e).await;
            }
            Err(_) => {
                let e =
                    EngineError::NetworkTimeout(format!("organic check exceeded {:?}", timeout));
                return self.reject(&handle, RejectReason::OrganicUnavailable, e).await;
            }
        };

        let low_organic = organic
            .label
            .eq_ignore_ascii_case(&self.config.rejected_organic_label);

        let recorded = self.advance(&handle, |token| {
            token.organic_score = organic.score;
            token.organic_label = Some(organic.label.clone());
            token.liquidity_verified = organic.liquidity > 0.0;
            if !low_organic {
                token.status = TokenStatus::OrganicChecked;
            }
        });
        if !recorded {
            return GateOutcome::Removed;
        }

        if low_organic {
            let e = EngineError::OrganicRejected {
                mint: mint.clone(),
                label: organic.label,
            };
            return self.reject(&handle, RejectReason::LowOrganicScore, e).await;
        }

        self.admit(&handle).await
    }

    /// Apply `f` unless the token was removed meanwhile
    fn advance(&self, handle: &Mutex<Token>, f: impl FnOnce(&mut Token)) -> bool {
        let mut token = handle.lock();
        if token.status == TokenStatus::Removed {
            return false;
        }
        f(&mut token);
        token.updated_at = self.clock.now();
        true
    }

    async fn admit(&self, handle: &Arc<Mutex<Token>>) -> GateOutcome {
        let now = self.clock.now();
        let token = {
            let mut token = handle.lock();
            if token.status == TokenStatus::Removed {
                return GateOutcome::Removed;
            }
            token.status = TokenStatus::Admitted;
            token.updated_at = now;

            // Registered under the token lock so a concurrent removal always
            // sees either nothing or the full registration
            self.windows.register(&token.mint_address);
            self.poller.add_token(&token.mint_address);
            token.clone()
        };

        self.admitted_total.fetch_add(1, Ordering::Relaxed);
        info!(mint = %token.mint_address, "✅ Token admitted: {}", token.display_name());

        let alert = Alert::new(
            Some(token.mint_address.clone()),
            AlertType::TokenDiscovered,
            AlertSeverity::Info,
            format!(
                "New token admitted: {} (risk {:?}, organic {:?})",
                token.display_name(),
                token.risk_score,
                token.organic_label
            ),
            alert_key(&token.mint_address, token.created_at),
            now,
        );
        log_store_failure("create_alert", self.store.create_alert(alert).await);
        log_store_failure("save_token", self.store.save_token(&token).await);

        GateOutcome::Admitted
    }

    async fn reject(
        &self,
        handle: &Arc<Mutex<Token>>,
        reason: RejectReason,
        cause: EngineError,
    ) -> GateOutcome {
        let now = self.clock.now();
        let token = {
            let mut token = handle.lock();
            if token.status == TokenStatus::Removed {
                return GateOutcome::Removed;
            }
            token.status = TokenStatus::Rejected;
            token.reject_reason = Some(reason);
            token.scam_detected = true;
            token.is_active = false;
            token.updated_at = now;
            token.clone()
        };
        let mint = token.mint_address.clone();

        // Recorded before the slot is freed so a racing migration sees it
        self.rejected.lock().insert(mint.clone(), reason);
        self.tokens
            .remove_if(&mint, |_, current| Arc::ptr_eq(current, handle));
        self.rejected_total.fetch_add(1, Ordering::Relaxed);

        warn!(
            mint = %mint,
            "🚫 Token rejected ({}): {} ({})", reason.as_str(), cause, cause.error_code()
        );

        let alert = Alert::new(
            Some(mint.clone()),
            AlertType::RiskAlert,
            AlertSeverity::Warning,
            format!("Token {} rejected: {}", token.display_name(), cause),
            alert_key(&mint, token.created_at),
            now,
        );
        log_store_failure("create_alert", self.store.create_alert(alert).await);
        log_store_failure("save_token", self.store.save_token(&token).await);
        log_store_failure("remove_token", self.store.remove_token(&mint).await);

        GateOutcome::Rejected(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{OrganicAssessment, PriceSnapshot, PriceSource, RiskAssessment};
    use crate::events::{decode_message, FeedEvent};
    use crate::store::InMemoryStore;
    use crate::time::ManualClock;
    use crate::types::{PollingConfig, WindowConfig};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;
    use tokio::sync::Notify;

    enum RiskReply {
        Score(f64),
        Fail,
        Hang,
        /// Wait for the gate notify, then answer
        Held(f64, Arc<Notify>),
    }

    struct MockRisk(RiskReply);

    #[async_trait]
    impl RiskAssessor for MockRisk {
        async fn risk_score(&self, _mint: &str) -> Result<RiskAssessment> {
            match &self.0 {
                RiskReply::Score(score) => Ok(RiskAssessment { score: *score }),
                RiskReply::Fail => Err(EngineError::HttpStatus {
                    endpoint: "/risk".to_string(),
                    status: 503,
                }),
                RiskReply::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(RiskAssessment { score: 0.0 })
                }
                RiskReply::Held(score, release) => {
                    release.notified().await;
                    Ok(RiskAssessment { score: *score })
                }
            }
        }
    }

    struct MockOrganic(Option<&'static str>);

    #[async_trait]
    impl OrganicAssessor for MockOrganic {
        async fn organic_score(&self, _mint: &str) -> Result<OrganicAssessment> {
            match self.0 {
                Some(label) => Ok(OrganicAssessment {
                    score: Some(55.0),
                    label: label.to_string(),
                    liquidity: 2500.0,
                }),
                None => Err(EngineError::NetworkTimeout("token info".to_string())),
            }
        }
    }

    struct NoPrices;

    #[async_trait]
    impl PriceSource for NoPrices {
        async fn latest_price(&self, _mint: &str) -> Result<PriceSnapshot> {
            Err(EngineError::MissingData("no prices in this test".to_string()))
        }
    }

    struct Harness {
        gate: Arc<TokenLifecycleGate>,
        poller: Arc<PollingCoordinator>,
        windows: Arc<WindowManager>,
        store: InMemoryStore,
    }

    fn harness(risk: RiskReply, organic: Option<&'static str>, timeout_ms: u64) -> Harness {
        harness_with(
            risk,
            organic,
            GateConfig {
                assessment_timeout_ms: timeout_ms,
                ..GateConfig::default()
            },
        )
    }

    fn harness_with(risk: RiskReply, organic: Option<&'static str>, config: GateConfig) -> Harness {
        let windows = Arc::new(WindowManager::new(WindowConfig::default()));
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 0).unwrap(),
        ));
        let poller = Arc::new(PollingCoordinator::new(
            Arc::new(NoPrices),
            Arc::clone(&windows),
            Arc::clone(&clock),
            PollingConfig::default(),
        ));
        let store = InMemoryStore::new();
        let gate = Arc::new(TokenLifecycleGate::new(
            Arc::new(MockRisk(risk)),
            Arc::new(MockOrganic(organic)),
            Arc::clone(&poller),
            Arc::clone(&windows),
            Arc::new(store.clone()),
            clock,
            config,
        ));
        Harness {
            gate,
            poller,
            windows,
            store,
        }
    }

    fn migration(mint: &str) -> MigrationEvent {
        MigrationEvent {
            mint: mint.to_string(),
            name: Some("Pup".to_string()),
            symbol: Some("PUP".to_string()),
            description: None,
            bonding_curve_cap: Some(75_000.0),
        }
    }

    fn assert_not_tracked(h: &Harness, mint: &str) {
        assert!(!h.poller.is_tracked(mint));
        assert!(!h.windows.is_registered(mint));
    }

    #[tokio::test]
    async fn test_high_risk_is_rejected() {
        let h = harness(RiskReply::Score(7.0), Some("high"), 1000);

        let discovery = h.gate.on_migration(migration("M1")).unwrap();
        assert_eq!(
            discovery.assessment.await.unwrap(),
            GateOutcome::Rejected(RejectReason::RiskScore)
        );

        assert_not_tracked(&h, "M1");
        assert!(h.gate.is_rejected("M1"));
        assert_eq!(h.gate.status("M1"), Some(TokenStatus::Rejected));
        assert_eq!(h.gate.rejected_count(), 1);

        let alerts = h.store.alerts().await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::RiskAlert);
        assert!(h.store.token("M1").await.is_none());
    }

    #[tokio::test]
    async fn test_threshold_score_is_admitted() {
        let h = harness(RiskReply::Score(4.0), Some("medium"), 1000);

        let discovery = h.gate.on_migration(migration("M1")).unwrap();
        assert_eq!(discovery.assessment.await.unwrap(), GateOutcome::Admitted);
    }

    #[tokio::test]
    async fn test_risk_failure_is_rejected() {
        let h = harness(RiskReply::Fail, Some("high"), 1000);

        let discovery = h.gate.on_migration(migration("M1")).unwrap();
        assert_eq!(
            discovery.assessment.await.unwrap(),
            GateOutcome::Rejected(RejectReason::RiskUnavailable)
        );
        assert_not_tracked(&h, "M1");
    }

    #[tokio::test]
    async fn test_risk_timeout_is_rejected() {
        let h = harness(RiskReply::Hang, Some("high"), 50);

        let discovery = h.gate.on_migration(migration("M1")).unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(2), discovery.assessment)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, GateOutcome::Rejected(RejectReason::RiskUnavailable));
    }

    #[tokio::test]
    async fn test_low_organic_is_rejected() {
        let h = harness(RiskReply::Score(2.0), Some("low"), 1000);

        let discovery = h.gate.on_migration(migration("M1")).unwrap();
        assert_eq!(
            discovery.assessment.await.unwrap(),
            GateOutcome::Rejected(RejectReason::LowOrganicScore)
        );
        assert_not_tracked(&h, "M1");
        assert_eq!(h.gate.reject_reason("M1"), Some(RejectReason::LowOrganicScore));
    }

    #[tokio::test]
    async fn test_organic_failure_is_rejected() {
        let h = harness(RiskReply::Score(2.0), None, 1000);

        let discovery = h.gate.on_migration(migration("M1")).unwrap();
        assert_eq!(
            discovery.assessment.await.unwrap(),
            GateOutcome::Rejected(RejectReason::OrganicUnavailable)
        );
    }

    #[tokio::test]
    async fn test_passing_token_is_admitted_and_tracked() {
        let h = harness(RiskReply::Score(2.0), Some("high"), 1000);

        let discovery = h.gate.on_migration(migration("M1")).unwrap();
        assert_eq!(discovery.token.status, TokenStatus::Pending);
        assert_eq!(discovery.assessment.await.unwrap(), GateOutcome::Admitted);

        assert!(h.poller.is_tracked("M1"));
        assert!(h.windows.is_registered("M1"));

        let token = h.gate.token("M1").unwrap();
        assert_eq!(token.status, TokenStatus::Admitted);
        assert_eq!(token.risk_score, Some(2.0));
        assert_eq!(token.organic_score, Some(55.0));
        assert_eq!(token.organic_label.as_deref(), Some("high"));
        assert!(token.liquidity_verified);
        assert!(!token.scam_detected);

        let alerts = h.store.alerts().await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::TokenDiscovered);
        assert_eq!(
            h.store.token("M1").await.unwrap().status,
            TokenStatus::Admitted
        );
    }

    #[tokio::test]
    async fn test_pending_is_observable_and_not_tracked() {
        let release = Arc::new(Notify::new());
        let h = harness(RiskReply::Held(1.0, Arc::clone(&release)), Some("high"), 5000);

        let discovery = h.gate.on_migration(migration("M1")).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(h.gate.status("M1"), Some(TokenStatus::Pending));
        assert_eq!(h.gate.pending_count(), 1);
        assert_not_tracked(&h, "M1");

        release.notify_one();
        assert_eq!(discovery.assessment.await.unwrap(), GateOutcome::Admitted);
        assert_eq!(h.gate.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_removal_during_assessment_wins() {
        let release = Arc::new(Notify::new());
        let h = harness(RiskReply::Held(1.0, Arc::clone(&release)), Some("high"), 5000);

        let discovery = h.gate.on_migration(migration("M1")).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(h.gate.remove("M1"));
        release.notify_one();

        assert_eq!(discovery.assessment.await.unwrap(), GateOutcome::Removed);
        assert_not_tracked(&h, "M1");
        assert!(h.gate.status("M1").is_none());
        assert!(h.store.alerts().await.is_empty());
    }

    #[tokio::test]
    async fn test_duplicates_and_rejected_are_ignored() {
        let h = harness(RiskReply::Score(9.0), Some("high"), 1000);

        let discovery = h.gate.on_migration(migration("M1")).unwrap();
        assert!(h.gate.on_migration(migration("M1")).is_none());
        discovery.assessment.await.unwrap();

        assert!(h.gate.on_migration(migration("M1")).is_none());
        assert!(matches!(
            h.gate.track("M1"),
            Err(EngineError::ScamToken(_))
        ));
    }

    #[tokio::test]
    async fn test_manual_track_and_remove() {
        let h = harness(RiskReply::Score(1.0), Some("high"), 1000);

        assert!(h.gate.track("M9").unwrap());
        assert!(!h.gate.track("M9").unwrap());
        assert!(h.poller.is_tracked("M9"));
        assert_eq!(h.gate.status("M9"), Some(TokenStatus::Admitted));

        assert!(h.gate.remove("M9"));
        assert!(!h.gate.remove("M9"));
        assert_not_tracked(&h, "M9");
    }

    #[tokio::test]
    async fn test_missing_bonding_cap_uses_default() {
        let h = harness(RiskReply::Score(1.0), Some("high"), 1000);
        let text = r#"{"method":"subscribeMigration","params":[{"mint":"M1","name":"Pup","symbol":"PUP"}]}"#;
        let event = match decode_message(text).unwrap() {
            Some(FeedEvent::Migration(event)) => event,
            other => panic!("unexpected event: {:?}", other.map(|e| e.mint().to_string())),
        };
        assert_eq!(event.bonding_curve_cap, None);

        let discovery = h.gate.on_migration(event).unwrap();
        assert_eq!(discovery.token.bonding_curve_cap, Some(DEFAULT_BONDING_CURVE_CAP));
        discovery.assessment.await.unwrap();
        assert_eq!(
            h.gate.token("M1").unwrap().bonding_curve_cap,
            Some(75_000.0)
        );
    }

    #[tokio::test]
    async fn test_rejected_mints_are_bounded() {
        let h = harness_with(
            RiskReply::Score(9.0),
            Some("high"),
            GateConfig {
                max_rejected_mints: 3,
                ..GateConfig::default()
            },
        );

        for i in 0..5 {
            let discovery = h.gate.on_migration(migration(&format!("M{}", i))).unwrap();
            discovery.assessment.await.unwrap();
        }

        assert_eq!(h.gate.rejected_count(), 5);
        assert_eq!(h.gate.rejected_retained(), 3);
        assert!(!h.gate.is_rejected("M0"));
        assert!(!h.gate.is_rejected("M1"));
        assert!(h.gate.is_rejected("M2"));
        assert!(h.gate.is_rejected("M4"));

        // Forgotten mints get a fresh assessment
        assert!(h.gate.on_migration(migration("M0")).is_some());
        assert!(h.gate.on_migration(migration("M4")).is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_redelivery_racing_rejection_is_ignored() {
        let h = harness(RiskReply::Score(9.0), Some("high"), 1000);

        let first = h.gate.on_migration(migration("M1")).unwrap();

        let gate = Arc::clone(&h.gate);
        let redeliveries = tokio::spawn(async move {
            let mut accepted = Vec::new();
            for _ in 0..2000 {
                if let Some(discovery) = gate.on_migration(migration("M1")) {
                    accepted.push(discovery);
                }
                tokio::task::yield_now().await;
            }
            accepted
        });

        assert_eq!(
            first.assessment.await.unwrap(),
            GateOutcome::Rejected(RejectReason::RiskScore)
        );
        let accepted = redeliveries.await.unwrap();

        assert!(accepted.is_empty());
        assert_eq!(h.gate.rejected_count(), 1);
        assert!(matches!(h.gate.track("M1"), Err(EngineError::ScamToken(_))));
        assert_not_tracked(&h, "M1");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_registration_carries_assessment_fields() {
        let release = Arc::new(Notify::new());
        let h = harness(RiskReply::Held(1.5, Arc::clone(&release)), Some("medium"), 5000);

        let discovery = h.gate.on_migration(migration("M1")).unwrap();

        // Reads the token the moment polling picks it up
        let gate = Arc::clone(&h.gate);
        let poller = Arc::clone(&h.poller);
        let watcher = tokio::spawn(async move {
            while !poller.is_tracked("M1") {
                tokio::task::yield_now().await;
            }
            gate.token("M1")
        });

        release.notify_one();
        assert_eq!(discovery.assessment.await.unwrap(), GateOutcome::Admitted);

        let seen = tokio::time::timeout(Duration::from_secs(2), watcher)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(seen.status, TokenStatus::Admitted);
        assert_eq!(seen.risk_score, Some(1.5));
        assert_eq!(seen.organic_score, Some(55.0));
        assert_eq!(seen.organic_label.as_deref(), Some("medium"));
        assert!(seen.liquidity_verified);
    }
}
