use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::error::{AppError, AppResult};
use crate::services::mail::Mailer;

/// Single-use six digit codes keyed by recipient email.
///
/// Issuing a code for an address replaces whatever was pending for it. A
/// code is consumed by the first successful verification; a wrong guess
/// leaves it pending. Check-and-remove must be atomic in every backend.
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Generate and store a fresh code for `email`, returning it for delivery.
    async fn issue(&self, email: &str) -> AppResult<u32>;

    /// Succeeds at most once per issued code.
    async fn verify(&self, email: &str, submitted: &str) -> AppResult<()>;
}

#[derive(Debug, Clone)]
struct PendingCode {
    code: u32,
    expires_at: DateTime<Utc>,
}

/// Per-process store. Expired entries are swept on every issue and verify,
/// so the map only ever holds live codes.
pub struct InMemoryOtpStore {
    ttl: Duration,
    codes: Mutex<HashMap<String, PendingCode>>,
}

impl InMemoryOtpStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            codes: Mutex::new(HashMap::new()),
        }
    }

    /// Store a known code for `email`. `issue` is the normal entry point.
    pub fn insert(&self, email: &str, code: u32) -> AppResult<()> {
        let now = Utc::now();
        let mut codes = self.lock()?;
        codes.retain(|_, pending| pending.expires_at > now);
        codes.insert(
            normalize(email),
            PendingCode {
                code,
                expires_at: now + self.ttl,
            },
        );
        Ok(())
    }

    fn check(&self, email: &str, submitted: &str) -> AppResult<()> {
        let submitted: u32 = submitted
            .trim()
            .parse()
            .map_err(|_| AppError::OtpMismatch)?;

        let now = Utc::now();
        let key = normalize(email);
        let mut codes = self.lock()?;
        codes.retain(|_, pending| pending.expires_at > now);

        match codes.get(&key) {
            Some(pending) if pending.code == submitted => {
                codes.remove(&key);
                Ok(())
            }
            _ => Err(AppError::OtpMismatch),
        }
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, HashMap<String, PendingCode>>> {
        self.codes
            .lock()
            .map_err(|_| AppError::Internal("OTP store lock poisoned".to_string()))
    }
}

#[async_trait]
impl OtpStore for InMemoryOtpStore {
    async fn issue(&self, email: &str) -> AppResult<u32> {
        let code = rand::thread_rng().gen_range(100_000..=999_999);
        self.insert(email, code)?;
        Ok(code)
    }

    async fn verify(&self, email: &str, submitted: &str) -> AppResult<()> {
        self.check(email, submitted)
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Issue a code for `email` and mail it. The code stays pending even if the
/// mail fails; issuing again replaces it.
pub async fn issue_and_send(
    store: &dyn OtpStore,
    mailer: &dyn Mailer,
    email: &str,
    subject: &str,
    render_body: impl FnOnce(u32) -> String,
) -> AppResult<()> {
    let code = store.issue(email).await?;
    mailer.send(email, subject, &render_body(code)).await?;
    tracing::info!(to = %email, subject = %subject, "OTP issued");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mail::MockMailer;

    fn store() -> InMemoryOtpStore {
        InMemoryOtpStore::new(Duration::minutes(10))
    }

    #[tokio::test]
    async fn test_issued_code_is_six_digits() {
        let store = store();
        for _ in 0..50 {
            let code = store.issue("x@example.com").await.unwrap();
            assert!((100_000..=999_999).contains(&code));
        }
    }

    #[tokio::test]
    async fn test_code_verifies_exactly_once() {
        let store = store();
        store.insert("x@example.com", 123456).unwrap();

        assert!(store.verify("x@example.com", "123456").await.is_ok());
        assert!(matches!(
            store.verify("x@example.com", "123456").await,
            Err(AppError::OtpMismatch)
        ));
    }

    #[tokio::test]
    async fn test_wrong_code_keeps_pending_code() {
        let store = store();
        store.insert("x@example.com", 123456).unwrap();

        assert!(store.verify("x@example.com", "654321").await.is_err());
        assert!(store.verify("x@example.com", "not-a-code").await.is_err());
        assert!(store.verify("x@example.com", "123456").await.is_ok());
    }

    #[tokio::test]
    async fn test_reissue_replaces_previous_code() {
        let store = store();
        store.insert("x@example.com", 111111).unwrap();
        store.insert("x@example.com", 222222).unwrap();

        assert!(store.verify("x@example.com", "111111").await.is_err());
        assert!(store.verify("x@example.com", "222222").await.is_ok());
    }

    #[tokio::test]
    async fn test_codes_are_scoped_to_email() {
        let store = store();
        store.insert("a@example.com", 123456).unwrap();

        assert!(store.verify("b@example.com", "123456").await.is_err());
        assert!(store.verify("A@Example.com ", "123456").await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_code_is_rejected() {
        let store = InMemoryOtpStore::new(Duration::zero());
        store.insert("x@example.com", 123456).unwrap();

        assert!(matches!(
            store.verify("x@example.com", "123456").await,
            Err(AppError::OtpMismatch)
        ));
    }

    #[tokio::test]
    async fn test_shared_store_behind_trait_object() {
        let shared: std::sync::Arc<dyn OtpStore> = std::sync::Arc::new(store());
        let code = shared.issue("x@example.com").await.unwrap();

        let other = shared.clone();
        assert!(other.verify("x@example.com", &code.to_string()).await.is_ok());
        assert!(shared.verify("x@example.com", &code.to_string()).await.is_err());
    }

    #[tokio::test]
    async fn test_issue_and_send_mails_the_stored_code() {
        let store = store();
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(|to, subject, body| {
                to.to_string() == "x@example.com"
                    && subject.to_string() == "Ride Confirmation OTP"
                    && body.starts_with("code:")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut sent = None;
        issue_and_send(&store, &mailer, "x@example.com", "Ride Confirmation OTP", |code| {
            sent = Some(code);
            format!("code:{}", code)
        })
        .await
        .unwrap();

        let code = sent.unwrap();
        assert!(store.verify("x@example.com", &code.to_string()).await.is_ok());
    }

    #[tokio::test]
    async fn test_mail_failure_is_surfaced() {
        let store = store();
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .returning(|_, _, _| Err(AppError::Mail("relay down".to_string())));

        let result = issue_and_send(&store, &mailer, "x@example.com", "OTP", |c| c.to_string()).await;
        assert!(matches!(result, Err(AppError::Mail(_))));
    }
}
