//! CheckoutOrchestrator processor.
//!
//! The CheckoutOrchestrator is responsible for:
//! - Creating a payment session for the order total
//! - Deriving the EIP-681 transfer URI shown to the customer
//! - Polling session status on a fixed schedule, authenticated by the
//!   session's bearer token
//! - Advancing the checkout stage, forward only, from poll outcomes
//! - Emitting `CheckoutEvent::PaymentCompleted` exactly once per session
//! - Counting down after completion and auto-dismissing the checkout
//! - Tearing down its poll task and countdown timer on every exit path
//!
//! All stage mutations happen on the orchestrator task. The poll task only
//! reports what the service said, tagged with the session generation it was
//! spawned for, so outcomes from a superseded session can be discarded.

use crate::entities::checkout::{CheckoutRequest, PaymentReceipt, PaymentSession};
use crate::entities::PaymentStage;
use crate::events::{
    checkout_command_channel, checkout_event_channel, CheckoutCommand, CheckoutCommandReceiver,
    CheckoutCommandSender, CheckoutEvent, CheckoutEventReceiver, CheckoutEventSender,
    CheckoutState, DEFAULT_CHANNEL_BUFFER,
};
use crate::gateway::PaymentGateway;
use crate::utils::money::usd_cents;
use stablepay_sdk::eip681::{self, Eip681Error, BASE_CHAIN_ID, USDC_DECIMALS};
use stablepay_sdk::objects::session::{CreateSessionRequest, SessionStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// USDC contract on Base mainnet.
pub const BASE_USDC_CONTRACT: &str = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";

const CREATE_FAILED_MESSAGE: &str = "Failed to process payment. Please try again.";
const PAYMENT_FAILED_MESSAGE: &str = "Payment failed. Please try again.";
const SESSION_EXPIRED_MESSAGE: &str = "Payment session expired. Please try again.";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Chain and token a checkout settles in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenConfig {
    /// Settlement chain name sent to the integration service, e.g. `"BASE"`.
    pub chain: String,
    /// Settlement token name sent to the integration service, e.g. `"USDC"`.
    pub stablecoin: String,
    /// ERC-20 contract address of the settlement token.
    pub token_contract: String,
    /// EIP-155 chain id used in transfer URIs.
    pub chain_id: u64,
    /// Decimals of the settlement token.
    pub token_decimals: u32,
}

impl Default for TokenConfig {
    /// USDC on Base mainnet.
    fn default() -> Self {
        Self {
            chain: "BASE".to_string(),
            stablecoin: "USDC".to_string(),
            token_contract: BASE_USDC_CONTRACT.to_string(),
            chain_id: BASE_CHAIN_ID,
            token_decimals: USDC_DECIMALS,
        }
    }
}

/// Timer schedule for one checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutTiming {
    /// Delay before the first status poll.
    pub poll_initial_delay: Duration,
    /// Fixed interval between status polls.
    pub poll_interval: Duration,
    /// Length of one auto-dismiss countdown tick.
    pub auto_close_tick: Duration,
    /// Number of countdown ticks between completion and dismissal.
    pub auto_close_ticks: u64,
}

impl Default for CheckoutTiming {
    fn default() -> Self {
        Self {
            poll_initial_delay: Duration::from_millis(2500),
            poll_interval: Duration::from_millis(2500),
            auto_close_tick: Duration::from_secs(1),
            auto_close_ticks: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Internal types
// ---------------------------------------------------------------------------

/// What one status poll reported, tagged with the session generation the
/// poll task was spawned for.
#[derive(Debug)]
struct PollOutcome {
    generation: u64,
    status: SessionStatus,
    transaction_hash: Option<String>,
}

/// Owned auto-dismiss countdown: a ticking interval plus the seconds left.
struct Countdown {
    interval: Interval,
    remaining: u64,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Frontend handle to a running [`CheckoutOrchestrator`].
pub struct CheckoutHandle {
    commands: CheckoutCommandSender,
    /// Render-ready state, republished after every mutation.
    pub state: watch::Receiver<CheckoutState>,
    /// Lifecycle events: at most one `PaymentCompleted`, then `Closed`.
    pub events: CheckoutEventReceiver,
}

impl CheckoutHandle {
    /// Ask the orchestrator to retry after a failure.
    pub async fn retry(&self) {
        let _ = self.commands.send(CheckoutCommand::Retry).await;
    }

    /// Dismiss the checkout.
    pub async fn close(&self) {
        let _ = self.commands.send(CheckoutCommand::Close).await;
    }
}

// ---------------------------------------------------------------------------
// CheckoutOrchestrator
// ---------------------------------------------------------------------------

/// CheckoutOrchestrator drives one stablecoin checkout end to end.
///
/// It owns every mutable piece of the checkout: the stage, the session, the
/// poll task, and the auto-dismiss countdown. The poll task never mutates
/// anything; it reports outcomes back over a channel and the orchestrator
/// applies them here, which keeps stage transitions single-threaded.
pub struct CheckoutOrchestrator<G> {
    gateway: Arc<G>,
    request: CheckoutRequest,
    token: TokenConfig,
    timing: CheckoutTiming,
    command_rx: CheckoutCommandReceiver,
    event_tx: CheckoutEventSender,
    state_tx: watch::Sender<CheckoutState>,
    poll_tx: mpsc::Sender<PollOutcome>,
    poll_rx: mpsc::Receiver<PollOutcome>,
    /// Bumped on every initiate; outcomes tagged with an older generation
    /// belong to a superseded session and are discarded.
    generation: u64,
    session: Option<PaymentSession>,
    poll_task: Option<JoinHandle<()>>,
    countdown: Option<Countdown>,
    success_signaled: bool,
    state: CheckoutState,
}

impl<G: PaymentGateway + 'static> CheckoutOrchestrator<G> {
    /// Create an orchestrator settling in USDC on Base with the production
    /// poll schedule.
    pub fn new(gateway: Arc<G>, request: CheckoutRequest) -> (Self, CheckoutHandle) {
        Self::with_config(
            gateway,
            request,
            TokenConfig::default(),
            CheckoutTiming::default(),
        )
    }

    /// Create an orchestrator with explicit token and timing configuration.
    pub fn with_config(
        gateway: Arc<G>,
        request: CheckoutRequest,
        token: TokenConfig,
        timing: CheckoutTiming,
    ) -> (Self, CheckoutHandle) {
        let (command_tx, command_rx) = checkout_command_channel();
        let (event_tx, event_rx) = checkout_event_channel();
        let (state_tx, state_rx) = watch::channel(CheckoutState::default());
        let (poll_tx, poll_rx) = mpsc::channel(DEFAULT_CHANNEL_BUFFER);

        let orchestrator = Self {
            gateway,
            request,
            token,
            timing,
            command_rx,
            event_tx,
            state_tx,
            poll_tx,
            poll_rx,
            generation: 0,
            session: None,
            poll_task: None,
            countdown: None,
            success_signaled: false,
            state: CheckoutState::default(),
        };
        let handle = CheckoutHandle {
            commands: command_tx,
            state: state_rx,
            events: event_rx,
        };
        (orchestrator, handle)
    }

    /// The session captured from the latest creation response, if any.
    pub fn session(&self) -> Option<&PaymentSession> {
        self.session.as_ref()
    }

    /// Run the checkout until it is dismissed.
    ///
    /// The checkout ends when the frontend closes it, when the auto-dismiss
    /// countdown elapses after completion, or when every command sender is
    /// dropped. A `Closed` event is emitted in all cases.
    pub async fn run(mut self) {
        info!(
            payment_intent_id = %self.request.payment_intent_id,
            amount = %self.request.amount,
            "CheckoutOrchestrator started"
        );

        self.initiate().await;

        loop {
            tokio::select! {
                biased;

                // Frontend commands have highest priority.
                command = self.command_rx.recv() => match command {
                    Some(CheckoutCommand::Retry) => {
                        info!("Retry requested, starting a fresh payment session");
                        self.initiate().await;
                    }
                    Some(CheckoutCommand::Close) => {
                        info!("Close requested, dismissing checkout");
                        break;
                    }
                    None => {
                        debug!("Command channel closed, dismissing checkout");
                        break;
                    }
                },

                // Outcome reported by the poll task.
                Some(outcome) = self.poll_rx.recv() => {
                    self.apply_poll_outcome(outcome).await;
                }

                // Auto-dismiss countdown tick.
                _ = Self::countdown_tick(&mut self.countdown) => {
                    if self.advance_countdown() {
                        info!("Auto-dismiss countdown elapsed, closing checkout");
                        break;
                    }
                }
            }
        }

        self.teardown();
        let _ = self.event_tx.send(CheckoutEvent::Closed).await;
        info!("CheckoutOrchestrator shutdown complete");
    }

    // -- Session lifecycle ---------------------------------------------------

    /// Start (or restart) the checkout with a fresh payment session.
    ///
    /// Any previous session's timers are torn down first, and its in-flight
    /// polls are orphaned by the generation bump.
    async fn initiate(&mut self) {
        self.generation += 1;
        self.teardown();
        self.session = None;
        self.success_signaled = false;
        self.state = CheckoutState::default();
        self.publish_state();

        let amount_usd_cents = match usd_cents(self.request.amount) {
            Ok(cents) => cents,
            Err(e) => {
                error!(
                    amount = %self.request.amount,
                    error = %e,
                    "Order total cannot be sent as integer cents"
                );
                self.fail(CREATE_FAILED_MESSAGE);
                return;
            }
        };

        let create = CreateSessionRequest {
            amount_usd_cents,
            integration_id: self.request.integration_id.clone(),
            payment_intent_id: self.request.payment_intent_id.clone(),
            user_meta_data: self.request.customer.clone().into(),
            chain: self.token.chain.clone(),
            stablecoin: self.token.stablecoin.clone(),
        };

        let response = match self.gateway.create_session(&create).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Failed to create payment session");
                self.fail(CREATE_FAILED_MESSAGE);
                return;
            }
        };

        let session = PaymentSession::from(response);
        info!(
            generation = self.generation,
            has_token = session.session_token.is_some(),
            deposit_address = ?session.deposit_address,
            "Payment session created"
        );

        if let Some(deposit_address) = session.deposit_address.clone() {
            match self.build_payment_uri(&deposit_address) {
                Ok(uri) => {
                    self.state.deposit_address = Some(deposit_address);
                    self.state.payment_uri = Some(uri);
                }
                Err(e) => {
                    warn!(
                        deposit_address = %deposit_address,
                        error = %e,
                        "Cannot build a transfer URI for the deposit address"
                    );
                    self.state.deposit_address = Some(deposit_address);
                }
            }
        }

        let initial_stage = session
            .reported_status
            .and_then(PaymentStage::from_wire)
            .unwrap_or(PaymentStage::Pending);

        // Polling runs whenever a token was issued, whatever the reported
        // status says; a completed session still owes us its hash.
        match session.session_token.clone() {
            Some(session_token) => {
                self.poll_task = Some(self.spawn_poll_task(session_token));
            }
            None => debug!("No session token issued, status polling disabled"),
        }

        self.session = Some(session);
        self.set_stage(initial_stage);
    }

    /// Spawn the fixed-rate poll loop for the current session generation.
    ///
    /// One poll is outstanding at a time; ticks that land while a request is
    /// still in flight are skipped rather than queued up.
    fn spawn_poll_task(&self, session_token: String) -> JoinHandle<()> {
        let gateway = Arc::clone(&self.gateway);
        let poll_tx = self.poll_tx.clone();
        let generation = self.generation;
        let initial_delay = self.timing.poll_initial_delay;
        let period = self.timing.poll_interval;

        tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + initial_delay, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticks.tick().await;

                match gateway.session_status(&session_token).await {
                    Ok(response) => {
                        let Some(status) = response.status else {
                            debug!(generation, "Status poll returned no status");
                            continue;
                        };
                        let transaction_hash = response
                            .transaction
                            .and_then(|transaction| transaction.payment_tx_hash);
                        let outcome = PollOutcome {
                            generation,
                            status,
                            transaction_hash,
                        };
                        if poll_tx.send(outcome).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(generation, error = %e, "Status poll failed, keeping the schedule");
                    }
                }
            }
        })
    }

    /// Apply what a status poll reported, unless it belongs to a superseded
    /// session.
    async fn apply_poll_outcome(&mut self, outcome: PollOutcome) {
        if outcome.generation != self.generation {
            debug!(
                generation = outcome.generation,
                current = self.generation,
                "Discarding poll outcome from a superseded session"
            );
            return;
        }

        debug!(status = %outcome.status, "Applying poll outcome");
        match outcome.status {
            SessionStatus::Processing => {
                self.observe_progress(PaymentStage::Processing, outcome.transaction_hash);
            }
            SessionStatus::Completed => {
                self.cancel_polling();
                self.observe_progress(PaymentStage::Completed, outcome.transaction_hash);
            }
            SessionStatus::Failed => self.fail(PAYMENT_FAILED_MESSAGE),
            SessionStatus::Expired => self.fail(SESSION_EXPIRED_MESSAGE),
            // No transition; keep polling.
            SessionStatus::Pending | SessionStatus::Unknown => {}
        }

        self.maybe_signal_success().await;
    }

    /// Record a progress report: a stage plus possibly a transaction hash.
    ///
    /// A report that would move the stage backward is dropped whole, hash
    /// included; a report restating the current stage may still carry a hash
    /// we have not seen yet.
    fn observe_progress(&mut self, next: PaymentStage, hash: Option<String>) {
        let current = self.state.stage;
        if current != next && !current.can_transition_to(next) {
            warn!(from = %current, to = %next, "Dropping progress report that would move the stage backward");
            return;
        }
        let hash_updated = self.update_transaction_hash(hash);
        if !self.set_stage(next) && hash_updated {
            self.publish_state();
        }
    }

    /// Emit `PaymentCompleted` once the stage is completed and every receipt
    /// field is on hand. Signals at most once per payment session.
    async fn maybe_signal_success(&mut self) {
        if self.success_signaled
            || self.state.stage != PaymentStage::Completed
            || !self.request.customer.is_complete()
        {
            return;
        }
        let Some(transaction_hash) = self.state.transaction_hash.clone() else {
            return;
        };

        self.success_signaled = true;
        let receipt = PaymentReceipt {
            transaction_hash,
            customer: self.request.customer.clone(),
            amount: self.request.amount,
            completed_at: time::OffsetDateTime::now_utc(),
        };
        info!(transaction_hash = %receipt.transaction_hash, "Payment completed");
        if self
            .event_tx
            .send(CheckoutEvent::PaymentCompleted(receipt))
            .await
            .is_err()
        {
            warn!("Failed to deliver PaymentCompleted event, receiver dropped");
        }
    }

    // -- Stage mutations -----------------------------------------------------

    /// Advance the stage and publish the new state. Returns whether the
    /// stage actually changed. Disallowed transitions are logged and dropped
    /// rather than applied.
    fn set_stage(&mut self, next: PaymentStage) -> bool {
        let current = self.state.stage;
        if current == next {
            return false;
        }
        if !current.can_transition_to(next) {
            warn!(from = %current, to = %next, "Ignoring disallowed stage transition");
            return false;
        }

        info!(from = %current, to = %next, "Checkout stage changed");
        self.state.stage = next;
        if next == PaymentStage::Completed {
            self.arm_countdown();
        }
        self.publish_state();
        true
    }

    /// Move to the failed stage with a user-facing message, stopping the
    /// poll loop. A checkout that already finished is left alone.
    fn fail(&mut self, message: &str) {
        self.cancel_polling();
        if !self.state.stage.can_transition_to(PaymentStage::Failed) {
            warn!(stage = %self.state.stage, "Ignoring failure for a finished checkout");
            return;
        }
        self.state.error = Some(message.to_string());
        self.set_stage(PaymentStage::Failed);
    }

    /// Record a newly observed transaction hash. A poll without a hash never
    /// clears one already observed.
    fn update_transaction_hash(&mut self, hash: Option<String>) -> bool {
        match hash {
            Some(hash) if self.state.transaction_hash.as_deref() != Some(hash.as_str()) => {
                self.state.transaction_hash = Some(hash);
                true
            }
            _ => false,
        }
    }

    // -- Timers --------------------------------------------------------------

    /// Wait for the next countdown tick, or forever when no countdown is
    /// armed.
    async fn countdown_tick(countdown: &mut Option<Countdown>) {
        match countdown {
            Some(countdown) => {
                countdown.interval.tick().await;
            }
            None => std::future::pending().await,
        }
    }

    /// Arm the auto-dismiss countdown that follows a completed payment.
    fn arm_countdown(&mut self) {
        let mut interval = interval_at(
            Instant::now() + self.timing.auto_close_tick,
            self.timing.auto_close_tick,
        );
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.countdown = Some(Countdown {
            interval,
            remaining: self.timing.auto_close_ticks,
        });
        self.state.auto_close_in = Some(self.timing.auto_close_ticks);
    }

    /// Count one tick down. Returns true when the countdown has elapsed.
    fn advance_countdown(&mut self) -> bool {
        let Some(countdown) = self.countdown.as_mut() else {
            return false;
        };
        countdown.remaining = countdown.remaining.saturating_sub(1);
        let remaining = countdown.remaining;
        self.state.auto_close_in = Some(remaining);
        self.publish_state();
        remaining == 0
    }

    fn cancel_polling(&mut self) {
        if let Some(task) = self.poll_task.take() {
            task.abort();
            debug!("Status polling stopped");
        }
    }

    fn disarm_countdown(&mut self) {
        if self.countdown.take().is_some() {
            self.state.auto_close_in = None;
            debug!("Auto-dismiss countdown cancelled");
        }
    }

    /// Release the poll task and the countdown timer. Safe to call with
    /// nothing active, and safe to call repeatedly.
    fn teardown(&mut self) {
        self.cancel_polling();
        self.disarm_countdown();
    }

    // -- Helpers -------------------------------------------------------------

    fn build_payment_uri(&self, deposit_address: &str) -> Result<String, Eip681Error> {
        eip681::build_erc20_transfer_uri(
            &self.token.token_contract,
            deposit_address,
            &self.request.amount.to_string(),
            self.token.chain_id,
            self.token.token_decimals,
        )
    }

    fn publish_state(&self) {
        let _ = self.state_tx.send(self.state.clone());
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::entities::checkout::CustomerDetails;
    use crate::gateway::GatewayError;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use stablepay_sdk::objects::session::{
        SessionResponse, SessionStatusResponse, SessionTransaction,
    };
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::timeout;

    const TX_HASH: &str = "0x9f2c44ab17e0de01b2c355feffa21371c7b77a0f2e9c5a1b8d64f3c2a90e4d17";
    const DEPOSIT_ADDRESS: &str = "0x1111111111111111111111111111111111111111";

    /// Gateway that answers from scripted queues. When the status queue
    /// runs dry it keeps answering `PENDING`, like a quiet server.
    struct ScriptedGateway {
        create_responses: Mutex<VecDeque<Result<SessionResponse, GatewayError>>>,
        status_responses: Mutex<VecDeque<Result<SessionStatusResponse, GatewayError>>>,
        create_calls: AtomicUsize,
        status_calls: AtomicUsize,
    }

    impl ScriptedGateway {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                create_responses: Mutex::new(VecDeque::new()),
                status_responses: Mutex::new(VecDeque::new()),
                create_calls: AtomicUsize::new(0),
                status_calls: AtomicUsize::new(0),
            })
        }

        fn script_create(&self, response: Result<SessionResponse, GatewayError>) {
            self.create_responses.lock().unwrap().push_back(response);
        }

        fn script_status(&self, response: Result<SessionStatusResponse, GatewayError>) {
            self.status_responses.lock().unwrap().push_back(response);
        }

        fn create_calls(&self) -> usize {
            self.create_calls.load(Ordering::SeqCst)
        }

        fn status_calls(&self) -> usize {
            self.status_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PaymentGateway for ScriptedGateway {
        async fn create_session(
            &self,
            _request: &CreateSessionRequest,
        ) -> Result<SessionResponse, GatewayError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            self.create_responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("unscripted create_session call")
        }

        async fn session_status(
            &self,
            _session_token: &str,
        ) -> Result<SessionStatusResponse, GatewayError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            self.status_responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(status_response(SessionStatus::Pending, None)))
        }
    }

    fn test_request() -> CheckoutRequest {
        CheckoutRequest {
            amount: Decimal::new(1250, 2),
            integration_id: "intg_test".to_string(),
            payment_intent_id: "pi_test".to_string(),
            customer: CustomerDetails {
                name: "Ada Lovelace".to_string(),
                email: "ada@example.com".to_string(),
                address: "12 Analytical Way".to_string(),
            },
        }
    }

    fn fast_timing() -> CheckoutTiming {
        CheckoutTiming {
            poll_initial_delay: Duration::from_millis(10),
            poll_interval: Duration::from_millis(10),
            auto_close_tick: Duration::from_millis(10),
            auto_close_ticks: 5,
        }
    }

    /// Polls start fast but repeat slowly, leaving room to observe that no
    /// further polls happen.
    fn slow_poll_timing() -> CheckoutTiming {
        CheckoutTiming {
            poll_initial_delay: Duration::from_millis(10),
            poll_interval: Duration::from_millis(200),
            auto_close_tick: Duration::from_millis(10),
            auto_close_ticks: 5,
        }
    }

    fn created_session(token: Option<&str>) -> SessionResponse {
        SessionResponse {
            session_token: token.map(str::to_string),
            deposit_address: Some(DEPOSIT_ADDRESS.to_string()),
            status: Some(SessionStatus::Pending),
        }
    }

    fn status_response(status: SessionStatus, hash: Option<&str>) -> SessionStatusResponse {
        SessionStatusResponse {
            status: Some(status),
            transaction: hash.map(|hash| SessionTransaction {
                payment_tx_hash: Some(hash.to_string()),
            }),
        }
    }

    async fn wait_until(
        state: &mut watch::Receiver<CheckoutState>,
        predicate: impl FnMut(&CheckoutState) -> bool,
    ) -> CheckoutState {
        timeout(Duration::from_secs(5), state.wait_for(predicate))
            .await
            .expect("timed out waiting for state")
            .expect("state channel closed before the expected state")
            .clone()
    }

    async fn wait_for_stage(
        state: &mut watch::Receiver<CheckoutState>,
        stage: PaymentStage,
    ) -> CheckoutState {
        wait_until(state, |snapshot| snapshot.stage == stage).await
    }

    async fn recv_event(events: &mut CheckoutEventReceiver) -> CheckoutEvent {
        timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn completed_checkout_emits_one_receipt_and_auto_dismisses() {
        let gateway = ScriptedGateway::new();
        gateway.script_create(Ok(created_session(Some("tok_1"))));
        gateway.script_status(Ok(status_response(SessionStatus::Processing, Some(TX_HASH))));
        gateway.script_status(Ok(status_response(SessionStatus::Completed, Some(TX_HASH))));

        let (orchestrator, mut handle) = CheckoutOrchestrator::with_config(
            gateway,
            test_request(),
            TokenConfig::default(),
            fast_timing(),
        );
        let run = tokio::spawn(orchestrator.run());

        let event = recv_event(&mut handle.events).await;
        let CheckoutEvent::PaymentCompleted(receipt) = event else {
            panic!("expected PaymentCompleted, got {event:?}");
        };
        assert_eq!(receipt.transaction_hash, TX_HASH);
        assert_eq!(receipt.amount, Decimal::new(1250, 2));
        assert_eq!(receipt.customer.email, "ada@example.com");

        assert_eq!(recv_event(&mut handle.events).await, CheckoutEvent::Closed);
        assert_eq!(handle.state.borrow().stage, PaymentStage::Completed);
        run.await.unwrap();
        assert!(handle.events.recv().await.is_none());
    }

    #[tokio::test]
    async fn publishes_deposit_address_and_transfer_uri() {
        let gateway = ScriptedGateway::new();
        gateway.script_create(Ok(created_session(Some("tok_1"))));

        let (orchestrator, mut handle) = CheckoutOrchestrator::with_config(
            gateway,
            test_request(),
            TokenConfig::default(),
            slow_poll_timing(),
        );
        let run = tokio::spawn(orchestrator.run());

        let state = wait_for_stage(&mut handle.state, PaymentStage::Pending).await;
        assert_eq!(state.deposit_address.as_deref(), Some(DEPOSIT_ADDRESS));
        assert_eq!(
            state.payment_uri.as_deref(),
            Some(
                "ethereum:0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913@8453/transfer\
                 ?address=0x1111111111111111111111111111111111111111&uint256=12500000"
            )
        );

        handle.close().await;
        assert_eq!(recv_event(&mut handle.events).await, CheckoutEvent::Closed);
        run.await.unwrap();
    }

    #[tokio::test]
    async fn create_failure_fails_the_checkout_without_polling() {
        let gateway = ScriptedGateway::new();
        gateway.script_create(Err(GatewayError::Api {
            status: 500,
            body: "boom".to_string(),
        }));

        let (orchestrator, mut handle) = CheckoutOrchestrator::with_config(
            Arc::clone(&gateway),
            test_request(),
            TokenConfig::default(),
            fast_timing(),
        );
        let run = tokio::spawn(orchestrator.run());

        let state = wait_for_stage(&mut handle.state, PaymentStage::Failed).await;
        assert_eq!(
            state.error.as_deref(),
            Some("Failed to process payment. Please try again.")
        );
        assert_eq!(gateway.status_calls(), 0);

        handle.close().await;
        assert_eq!(recv_event(&mut handle.events).await, CheckoutEvent::Closed);
        run.await.unwrap();
    }

    #[tokio::test]
    async fn failed_status_stops_polling() {
        let gateway = ScriptedGateway::new();
        gateway.script_create(Ok(created_session(Some("tok_1"))));
        gateway.script_status(Ok(status_response(SessionStatus::Failed, None)));

        let (orchestrator, mut handle) = CheckoutOrchestrator::with_config(
            Arc::clone(&gateway),
            test_request(),
            TokenConfig::default(),
            slow_poll_timing(),
        );
        let run = tokio::spawn(orchestrator.run());

        let state = wait_for_stage(&mut handle.state, PaymentStage::Failed).await;
        assert_eq!(
            state.error.as_deref(),
            Some("Payment failed. Please try again.")
        );

        // The next poll would land after 200ms; give it room to prove it
        // never comes.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(gateway.status_calls(), 1);

        handle.close().await;
        assert_eq!(recv_event(&mut handle.events).await, CheckoutEvent::Closed);
        run.await.unwrap();
    }

    #[tokio::test]
    async fn expired_status_fails_the_session() {
        let gateway = ScriptedGateway::new();
        gateway.script_create(Ok(created_session(Some("tok_1"))));
        gateway.script_status(Ok(status_response(SessionStatus::Expired, None)));

        let (orchestrator, mut handle) = CheckoutOrchestrator::with_config(
            gateway,
            test_request(),
            TokenConfig::default(),
            slow_poll_timing(),
        );
        let run = tokio::spawn(orchestrator.run());

        let state = wait_for_stage(&mut handle.state, PaymentStage::Failed).await;
        assert_eq!(
            state.error.as_deref(),
            Some("Payment session expired. Please try again.")
        );

        handle.close().await;
        assert_eq!(recv_event(&mut handle.events).await, CheckoutEvent::Closed);
        run.await.unwrap();
    }

    #[tokio::test]
    async fn retry_after_failure_creates_a_fresh_session() {
        let gateway = ScriptedGateway::new();
        gateway.script_create(Ok(created_session(Some("tok_1"))));
        gateway.script_status(Ok(status_response(SessionStatus::Failed, None)));
        gateway.script_create(Ok(created_session(Some("tok_2"))));
        gateway.script_status(Ok(status_response(SessionStatus::Completed, Some(TX_HASH))));

        let (orchestrator, mut handle) = CheckoutOrchestrator::with_config(
            Arc::clone(&gateway),
            test_request(),
            TokenConfig::default(),
            slow_poll_timing(),
        );
        let run = tokio::spawn(orchestrator.run());

        let state = wait_for_stage(&mut handle.state, PaymentStage::Failed).await;
        assert!(state.error.is_some());

        handle.retry().await;

        let state = wait_for_stage(&mut handle.state, PaymentStage::Completed).await;
        assert_eq!(state.error, None);
        assert_eq!(state.transaction_hash.as_deref(), Some(TX_HASH));
        assert_eq!(gateway.create_calls(), 2);

        assert!(matches!(
            recv_event(&mut handle.events).await,
            CheckoutEvent::PaymentCompleted(_)
        ));
        assert_eq!(recv_event(&mut handle.events).await, CheckoutEvent::Closed);
        run.await.unwrap();
    }

    #[tokio::test]
    async fn unrecognized_statuses_leave_the_stage_alone() {
        let gateway = ScriptedGateway::new();
        gateway.script_create(Ok(created_session(Some("tok_1"))));
        gateway.script_status(Ok(status_response(SessionStatus::Unknown, None)));
        gateway.script_status(Ok(status_response(SessionStatus::Completed, Some(TX_HASH))));

        let (orchestrator, mut handle) = CheckoutOrchestrator::with_config(
            Arc::clone(&gateway),
            test_request(),
            TokenConfig::default(),
            fast_timing(),
        );
        let run = tokio::spawn(orchestrator.run());

        assert!(matches!(
            recv_event(&mut handle.events).await,
            CheckoutEvent::PaymentCompleted(_)
        ));
        assert!(gateway.status_calls() >= 2);

        assert_eq!(recv_event(&mut handle.events).await, CheckoutEvent::Closed);
        run.await.unwrap();
    }

    #[tokio::test]
    async fn transient_poll_errors_keep_the_schedule() {
        let gateway = ScriptedGateway::new();
        gateway.script_create(Ok(created_session(Some("tok_1"))));
        gateway.script_status(Err(GatewayError::Transport("connection reset".to_string())));
        gateway.script_status(Ok(status_response(SessionStatus::Completed, Some(TX_HASH))));

        let (orchestrator, mut handle) = CheckoutOrchestrator::with_config(
            gateway,
            test_request(),
            TokenConfig::default(),
            fast_timing(),
        );
        let run = tokio::spawn(orchestrator.run());

        assert!(matches!(
            recv_event(&mut handle.events).await,
            CheckoutEvent::PaymentCompleted(_)
        ));
        assert_eq!(recv_event(&mut handle.events).await, CheckoutEvent::Closed);
        run.await.unwrap();
    }

    #[tokio::test]
    async fn poll_outcomes_from_superseded_sessions_are_discarded() {
        let gateway = ScriptedGateway::new();
        gateway.script_create(Ok(SessionResponse {
            session_token: None,
            deposit_address: None,
            status: Some(SessionStatus::Pending),
        }));

        let (mut orchestrator, mut handle) = CheckoutOrchestrator::with_config(
            gateway,
            test_request(),
            TokenConfig::default(),
            fast_timing(),
        );
        orchestrator.initiate().await;
        assert_eq!(handle.state.borrow().stage, PaymentStage::Pending);
        assert!(orchestrator.session().is_some());
        assert_eq!(orchestrator.session().unwrap().session_token, None);

        let stale = PollOutcome {
            generation: orchestrator.generation - 1,
            status: SessionStatus::Completed,
            transaction_hash: Some(TX_HASH.to_string()),
        };
        orchestrator.apply_poll_outcome(stale).await;
        assert_eq!(handle.state.borrow().stage, PaymentStage::Pending);
        assert_eq!(handle.state.borrow().transaction_hash, None);

        let current = PollOutcome {
            generation: orchestrator.generation,
            status: SessionStatus::Completed,
            transaction_hash: Some(TX_HASH.to_string()),
        };
        orchestrator.apply_poll_outcome(current).await;
        assert_eq!(handle.state.borrow().stage, PaymentStage::Completed);
        assert_eq!(handle.state.borrow().auto_close_in, Some(5));

        let duplicate = PollOutcome {
            generation: orchestrator.generation,
            status: SessionStatus::Completed,
            transaction_hash: Some(TX_HASH.to_string()),
        };
        orchestrator.apply_poll_outcome(duplicate).await;

        let regression = PollOutcome {
            generation: orchestrator.generation,
            status: SessionStatus::Processing,
            transaction_hash: Some("0xother".to_string()),
        };
        orchestrator.apply_poll_outcome(regression).await;
        assert_eq!(handle.state.borrow().stage, PaymentStage::Completed);
        assert_eq!(handle.state.borrow().transaction_hash.as_deref(), Some(TX_HASH));

        assert!(matches!(
            handle.events.try_recv(),
            Ok(CheckoutEvent::PaymentCompleted(_))
        ));
        assert!(handle.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn teardown_with_no_timers_is_safe_and_repeatable() {
        let gateway = ScriptedGateway::new();
        let (mut orchestrator, handle) = CheckoutOrchestrator::with_config(
            gateway,
            test_request(),
            TokenConfig::default(),
            fast_timing(),
        );

        let before = handle.state.borrow().clone();
        orchestrator.teardown();
        orchestrator.teardown();

        assert!(orchestrator.poll_task.is_none());
        assert!(orchestrator.countdown.is_none());
        assert_eq!(*handle.state.borrow(), before);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let gateway = ScriptedGateway::new();
        gateway.script_create(Ok(created_session(None)));

        let (orchestrator, mut handle) = CheckoutOrchestrator::with_config(
            gateway,
            test_request(),
            TokenConfig::default(),
            slow_poll_timing(),
        );
        let run = tokio::spawn(orchestrator.run());

        handle.close().await;
        handle.close().await;

        assert_eq!(recv_event(&mut handle.events).await, CheckoutEvent::Closed);
        run.await.unwrap();
        assert!(handle.events.recv().await.is_none());
    }

    #[tokio::test]
    async fn auto_dismiss_counts_down_after_completion() {
        let gateway = ScriptedGateway::new();
        gateway.script_create(Ok(created_session(Some("tok_1"))));
        gateway.script_status(Ok(status_response(SessionStatus::Completed, Some(TX_HASH))));

        let (orchestrator, mut handle) = CheckoutOrchestrator::with_config(
            gateway,
            test_request(),
            TokenConfig::default(),
            fast_timing(),
        );
        let run = tokio::spawn(orchestrator.run());

        let state = wait_for_stage(&mut handle.state, PaymentStage::Completed).await;
        assert!(state.auto_close_in.is_some());

        let state = wait_until(&mut handle.state, |s| s.auto_close_in == Some(0)).await;
        assert_eq!(state.stage, PaymentStage::Completed);

        assert!(matches!(
            recv_event(&mut handle.events).await,
            CheckoutEvent::PaymentCompleted(_)
        ));
        assert_eq!(recv_event(&mut handle.events).await, CheckoutEvent::Closed);
        run.await.unwrap();
    }

    #[tokio::test]
    async fn missing_session_token_disables_polling() {
        let gateway = ScriptedGateway::new();
        gateway.script_create(Ok(created_session(None)));

        let (orchestrator, mut handle) = CheckoutOrchestrator::with_config(
            Arc::clone(&gateway),
            test_request(),
            TokenConfig::default(),
            fast_timing(),
        );
        let run = tokio::spawn(orchestrator.run());

        wait_for_stage(&mut handle.state, PaymentStage::Pending).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(gateway.status_calls(), 0);

        handle.close().await;
        assert_eq!(recv_event(&mut handle.events).await, CheckoutEvent::Closed);
        run.await.unwrap();
    }

    #[tokio::test]
    async fn invalid_order_totals_fail_before_any_request() {
        let gateway = ScriptedGateway::new();
        let mut request = test_request();
        request.amount = Decimal::new(-100, 2);

        let (orchestrator, mut handle) = CheckoutOrchestrator::with_config(
            Arc::clone(&gateway),
            request,
            TokenConfig::default(),
            fast_timing(),
        );
        let run = tokio::spawn(orchestrator.run());

        let state = wait_for_stage(&mut handle.state, PaymentStage::Failed).await;
        assert!(state.error.is_some());
        assert_eq!(gateway.create_calls(), 0);

        handle.close().await;
        assert_eq!(recv_event(&mut handle.events).await, CheckoutEvent::Closed);
        run.await.unwrap();
    }
}
