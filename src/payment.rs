use crate::errors::PaymentError;
use async_trait::async_trait;
use rand::Rng;
use tracing::warn;

/// Side-effect activity validating a payment code (§2 "out of scope"
/// collaborator, §4.3). Modeled with a failure probability rather than a
/// fixed outcome table, per spec.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn validate(&self, code: &str) -> Result<(), PaymentError>;
}

/// Default gateway used outside integration mode. A handful of codes are
/// pinned for deterministic end-to-end tests; anything else is subject to
/// a configurable random failure rate.
pub struct SimulatedPaymentGateway {
    pub failure_rate: f64,
}

impl SimulatedPaymentGateway {
    pub fn new(failure_rate: f64) -> Self {
        Self { failure_rate }
    }
}

impl Default for SimulatedPaymentGateway {
    fn default() -> Self {
        Self::new(0.15)
    }
}

#[async_trait]
impl PaymentGateway for SimulatedPaymentGateway {
    async fn validate(&self, code: &str) -> Result<(), PaymentError> {
        let lower = code.trim().to_ascii_lowercase();

        if code == "E2E-OK" {
            return Ok(());
        }
        if lower.is_empty() || lower == "bad" || lower.starts_with("fail") || code == "INVALID-PAYMENT" {
            warn!(code, "payment rejected: pinned failure code");
            return Err(PaymentError::Rejected(format!("payment code rejected: {code}")));
        }

        let roll: f64 = rand::thread_rng().gen_range(0.0..1.0);
        if roll < self.failure_rate {
            warn!(code, roll, "payment rejected: simulated gateway failure");
            Err(PaymentError::Rejected("payment gateway declined the charge".to_string()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn e2e_ok_code_always_succeeds() {
        let gw = SimulatedPaymentGateway::new(1.0);
        assert!(gw.validate("E2E-OK").await.is_ok());
    }

    #[tokio::test]
    async fn pinned_failure_codes_always_fail() {
        let gw = SimulatedPaymentGateway::new(0.0);
        assert!(gw.validate("bad").await.is_err());
        assert!(gw.validate("").await.is_err());
        assert!(gw.validate("FAIL-CARD-DECLINED").await.is_err());
        assert!(gw.validate("INVALID-PAYMENT").await.is_err());
    }

    #[tokio::test]
    async fn zero_failure_rate_accepts_generic_codes() {
        let gw = SimulatedPaymentGateway::new(0.0);
        assert!(gw.validate("4242-4242-4242").await.is_ok());
    }

    #[tokio::test]
    async fn full_failure_rate_rejects_generic_codes() {
        let gw = SimulatedPaymentGateway::new(1.0);
        assert!(gw.validate("4242-4242-4242").await.is_err());
    }
}
