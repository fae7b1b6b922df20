use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
    Mutex,
};

use escrow_engine::traits::{FundsError, FundsGateway, FundsReceipt, PayoutRequest, RefundRequest};
use futures::future::BoxFuture;
use tokio::sync::Notify;

/// Records every confirmed request. Refunds fail while `fail_refunds` is set, and payouts while `fail_payouts` is.
#[derive(Default)]
pub struct RecordingFunds {
    pub refunds: Mutex<Vec<RefundRequest>>,
    pub payouts: Mutex<Vec<PayoutRequest>>,
    pub fail_refunds: AtomicBool,
    pub fail_payouts: AtomicBool,
}

impl RecordingFunds {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_refunds.store(failing, Ordering::SeqCst);
    }

    pub fn set_payouts_failing(&self, failing: bool) {
        self.fail_payouts.store(failing, Ordering::SeqCst);
    }

    pub fn refund_count(&self) -> usize {
        self.refunds.lock().unwrap().len()
    }

    pub fn payout_count(&self) -> usize {
        self.payouts.lock().unwrap().len()
    }
}

impl FundsGateway for RecordingFunds {
    fn refund(&self, request: RefundRequest) -> BoxFuture<'static, Result<FundsReceipt, FundsError>> {
        let result = if self.fail_refunds.load(Ordering::SeqCst) {
            Err(FundsError::Unavailable("bank is offline".into()))
        } else {
            let reference = format!("REF-{}", request.idempotency_key);
            self.refunds.lock().unwrap().push(request);
            Ok(FundsReceipt { reference })
        };
        Box::pin(async move { result })
    }

    fn payout(&self, request: PayoutRequest) -> BoxFuture<'static, Result<FundsReceipt, FundsError>> {
        let result = if self.fail_payouts.load(Ordering::SeqCst) {
            Err(FundsError::Unavailable("bank is offline".into()))
        } else {
            let reference = format!("PAYOUT-{}", request.idempotency_key);
            self.payouts.lock().unwrap().push(request);
            Ok(FundsReceipt { reference })
        };
        Box::pin(async move { result })
    }
}

/// Refunds block until [`StallingFunds::unblock`] is called, so a sweep can be held open mid-run.
#[derive(Default)]
pub struct StallingFunds {
    pub gate: Arc<Notify>,
    pub entered: Arc<Notify>,
    pub refund_calls: AtomicUsize,
}

impl StallingFunds {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn unblock(&self) {
        self.gate.notify_one();
    }

    pub fn refund_calls(&self) -> usize {
        self.refund_calls.load(Ordering::SeqCst)
    }
}

impl FundsGateway for StallingFunds {
    fn refund(&self, request: RefundRequest) -> BoxFuture<'static, Result<FundsReceipt, FundsError>> {
        self.refund_calls.fetch_add(1, Ordering::SeqCst);
        let gate = Arc::clone(&self.gate);
        let entered = Arc::clone(&self.entered);
        Box::pin(async move {
            entered.notify_one();
            gate.notified().await;
            Ok(FundsReceipt { reference: format!("REF-{}", request.idempotency_key) })
        })
    }

    fn payout(&self, request: PayoutRequest) -> BoxFuture<'static, Result<FundsReceipt, FundsError>> {
        Box::pin(async move { Ok(FundsReceipt { reference: format!("PAYOUT-{}", request.idempotency_key) }) })
    }
}
