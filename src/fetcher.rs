use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use chrono::{Datelike, Local};
use personal_capital::model::{AccountsData, ApiResponse, TransactionCategory, TransactionsData};
use personal_capital::PersonalCapital;
use tracing::{info, warn};

use crate::core::spend::{aggregate, CategorySummary};
use crate::session;
use crate::settings::Settings;

const ACCOUNTS_ENDPOINT: &str = "/newaccount/getAccounts";
const TRANSACTIONS_ENDPOINT: &str = "/transaction/getUserTransactions";
const CATEGORIES_ENDPOINT: &str = "/transactioncategory/getCategories";

/// Polling callers may tick far more often than the upstream tolerates;
/// effective fetches are gated to this window.
pub const MIN_TIME_BETWEEN_UPDATES: Duration = Duration::from_secs(30 * 60);

pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Pulls account snapshots and monthly spending through an authenticated
/// session, re-authenticating once when the server stops recognizing it.
pub struct AccountData {
    client: PersonalCapital,
    credentials: Credentials,
    session_file: PathBuf,
    cooldown: Duration,
    last_update: Option<Instant>,
    accounts: Option<AccountsData>,
    spending: Vec<CategorySummary>,
}

impl AccountData {
    pub fn new(client: PersonalCapital, credentials: Credentials, session_file: PathBuf) -> Self {
        Self {
            client,
            credentials,
            session_file,
            cooldown: MIN_TIME_BETWEEN_UPDATES,
            last_update: None,
            accounts: None,
            spending: Vec::new(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let mut client = PersonalCapital::new();
        let session_file = PathBuf::from(&settings.session_file);
        if let Some(session) = session::load(&session_file) {
            client.set_session(session);
        }

        Self::new(
            client,
            Credentials {
                username: settings.username.clone(),
                password: settings.password.clone(),
            },
            session_file,
        )
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Refreshes the cached snapshot and spending summaries. Calls inside
    /// the cool-down window are no-ops; the previously fetched data stays
    /// exposed through the accessors.
    #[tracing::instrument(skip(self))]
    pub async fn update(&mut self) -> Result<()> {
        if let Some(last) = self.last_update {
            if last.elapsed() < self.cooldown {
                return Ok(());
            }
        }
        self.last_update = Some(Instant::now());

        let mut snapshot: ApiResponse<AccountsData> =
            self.client.fetch(ACCOUNTS_ENDPOINT, &[]).await?;

        if !snapshot.success() {
            info!("accounts fetch rejected, re-authenticating");
            self.client
                .login(&self.credentials.username, &self.credentials.password)
                .await?;
            if let Err(err) = session::save(&self.session_file, &self.client.session()) {
                warn!("unable to persist refreshed session: {}", err);
            }

            // One retry only; a second rejection is fatal to this cycle.
            snapshot = self.client.fetch(ACCOUNTS_ENDPOINT, &[]).await?;
            if !snapshot.success() {
                return Err(anyhow!("accounts fetch failed after re-authentication"));
            }
        }

        self.accounts = snapshot.sp_data;
        self.refresh_spending().await?;

        Ok(())
    }

    pub fn accounts(&self) -> Option<&AccountsData> {
        self.accounts.as_ref()
    }

    pub fn spending(&self) -> &[CategorySummary] {
        &self.spending
    }

    /// Pulls the current calendar month's transactions plus the category
    /// list and recomputes the per-category summaries.
    async fn refresh_spending(&mut self) -> Result<()> {
        let today = Local::now().date_naive();
        let start = today
            .with_day(1)
            .expect("first day of month")
            .format("%Y-%m-%d")
            .to_string();
        let end = today.format("%Y-%m-%d").to_string();

        let transactions: ApiResponse<TransactionsData> = self
            .client
            .fetch(
                TRANSACTIONS_ENDPOINT,
                &[
                    ("sort_cols", "transactionTime"),
                    ("sort_rev", "true"),
                    ("startDate", &start),
                    ("endDate", &end),
                    ("component", "DATAGRID"),
                ],
            )
            .await?;
        let categories: ApiResponse<Vec<TransactionCategory>> =
            self.client.fetch(CATEGORIES_ENDPOINT, &[]).await?;

        let transactions = transactions
            .sp_data
            .map(|data| data.transactions)
            .unwrap_or_default();
        let categories = categories.sp_data.unwrap_or_default();

        self.spending = aggregate(&transactions, &categories);
        info!(categories = self.spending.len(), "aggregated monthly spending");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::extract::Extension;
    use axum::response::Html;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use url::Url;

    use super::*;

    struct UpstreamState {
        require_login: bool,
        always_reject: bool,
        logged_in: AtomicBool,
        accounts_hits: AtomicUsize,
        password_hits: AtomicUsize,
        transactions_hits: AtomicUsize,
    }

    impl UpstreamState {
        fn new(require_login: bool, always_reject: bool) -> Arc<Self> {
            Arc::new(Self {
                require_login,
                always_reject,
                logged_in: AtomicBool::new(false),
                accounts_hits: AtomicUsize::new(0),
                password_hits: AtomicUsize::new(0),
                transactions_hits: AtomicUsize::new(0),
            })
        }
    }

    async fn go_home() -> Html<&'static str> {
        Html("<script>window.csrf ='6cb01be7-6bd3-4b48-a632-8b0b29b22b6e';</script>")
    }

    async fn identify_user() -> Json<Value> {
        Json(json!({
            "spHeader": {
                "success": true,
                "csrf": "f46f8c97-02a8-4aee-97ef-fae6130759cd",
                "authLevel": "USER_REMEMBERED",
            },
        }))
    }

    async fn authenticate_password(Extension(state): Extension<Arc<UpstreamState>>) -> Json<Value> {
        state.password_hits.fetch_add(1, Ordering::SeqCst);
        state.logged_in.store(true, Ordering::SeqCst);
        Json(json!({"spHeader": {"success": true}}))
    }

    async fn get_accounts(Extension(state): Extension<Arc<UpstreamState>>) -> Json<Value> {
        state.accounts_hits.fetch_add(1, Ordering::SeqCst);

        let recognized = !state.always_reject
            && (!state.require_login || state.logged_in.load(Ordering::SeqCst));
        if !recognized {
            return Json(json!({"spHeader": {"success": false}}));
        }

        Json(json!({
            "spHeader": {"success": true},
            "spData": {
                "networth": 42000.0,
                "assets": 50000.0,
                "liabilities": 8000.0,
                "cashAccountsTotal": 12000.0,
            },
        }))
    }

    async fn get_transactions(Extension(state): Extension<Arc<UpstreamState>>) -> Json<Value> {
        state.transactions_hits.fetch_add(1, Ordering::SeqCst);
        Json(json!({
            "spHeader": {"success": true},
            "spData": {
                "transactions": [
                    {
                        "categoryId": 1,
                        "amount": 50.0,
                        "includeInCashManager": true,
                    },
                    {
                        "categoryId": 2,
                        "amount": 100.0,
                        "isIncome": true,
                        "includeInCashManager": true,
                    },
                ],
            },
        }))
    }

    async fn get_categories() -> Json<Value> {
        Json(json!({
            "spHeader": {"success": true},
            "spData": [
                {"transactionCategoryId": 1, "name": "Groceries"},
                {"transactionCategoryId": 2, "name": "Paychecks"},
            ],
        }))
    }

    async fn spawn_upstream(state: Arc<UpstreamState>) -> Url {
        let router = Router::new()
            .route("/page/login/goHome", get(go_home))
            .route("/api/login/identifyUser", post(identify_user))
            .route("/api/credential/authenticatePassword", post(authenticate_password))
            .route("/api/newaccount/getAccounts", post(get_accounts))
            .route("/api/transaction/getUserTransactions", post(get_transactions))
            .route("/api/transactioncategory/getCategories", post(get_categories))
            .layer(Extension(state));

        let server = axum::Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0)))
            .serve(router.into_make_service());
        let addr = server.local_addr();
        tokio::spawn(server);

        Url::parse(&format!("http://{}/", addr)).unwrap()
    }

    fn fetcher(base: Url, session_file: PathBuf) -> AccountData {
        AccountData::new(
            PersonalCapital::with_base_url(base),
            Credentials {
                username: "user@example.com".to_string(),
                password: "hunter2".to_string(),
            },
            session_file,
        )
    }

    #[tokio::test]
    async fn update_populates_snapshot_and_spending() {
        let state = UpstreamState::new(false, false);
        let base = spawn_upstream(state.clone()).await;
        let dir = tempfile::tempdir().unwrap();

        let mut data = fetcher(base, dir.path().join("session.json"));
        data.update().await.unwrap();

        let snapshot = data.accounts().unwrap();
        assert_eq!(snapshot.networth, 42000.0);
        assert_eq!(snapshot.cash_accounts_total, 12000.0);

        let spending = data.spending();
        assert_eq!(spending.len(), 2);
        assert_eq!(spending[0].name, "Groceries");
        assert_eq!(spending[0].amount, 50.0);
        assert_eq!(spending[1].name, "Paychecks");
        assert_eq!(spending[1].amount, -100.0);
    }

    #[tokio::test]
    async fn updates_within_cooldown_hit_upstream_once() {
        let state = UpstreamState::new(false, false);
        let base = spawn_upstream(state.clone()).await;
        let dir = tempfile::tempdir().unwrap();

        let mut data = fetcher(base, dir.path().join("session.json"));
        data.update().await.unwrap();
        data.update().await.unwrap();

        assert_eq!(state.accounts_hits.load(Ordering::SeqCst), 1);
        assert_eq!(state.transactions_hits.load(Ordering::SeqCst), 1);
        assert!(data.accounts().is_some());
    }

    #[tokio::test]
    async fn update_after_cooldown_refreshes_spending_too() {
        let state = UpstreamState::new(false, false);
        let base = spawn_upstream(state.clone()).await;
        let dir = tempfile::tempdir().unwrap();

        let mut data =
            fetcher(base, dir.path().join("session.json")).with_cooldown(Duration::ZERO);
        data.update().await.unwrap();
        data.update().await.unwrap();

        assert_eq!(state.accounts_hits.load(Ordering::SeqCst), 2);
        assert_eq!(state.transactions_hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stale_session_triggers_one_relogin_and_retry() {
        let state = UpstreamState::new(true, false);
        let base = spawn_upstream(state.clone()).await;
        let dir = tempfile::tempdir().unwrap();
        let session_file = dir.path().join("session.json");

        let mut data = fetcher(base, session_file.clone());
        data.update().await.unwrap();

        assert_eq!(state.accounts_hits.load(Ordering::SeqCst), 2);
        assert_eq!(state.password_hits.load(Ordering::SeqCst), 1);
        assert!(data.accounts().is_some());
        // The refreshed session is persisted for the next process.
        assert!(session_file.exists());
    }

    #[tokio::test]
    async fn persistent_rejection_is_fatal_after_one_retry() {
        let state = UpstreamState::new(false, true);
        let base = spawn_upstream(state.clone()).await;
        let dir = tempfile::tempdir().unwrap();

        let mut data = fetcher(base, dir.path().join("session.json"));
        let err = data.update().await.unwrap_err();

        assert!(err.to_string().contains("after re-authentication"));
        assert_eq!(state.accounts_hits.load(Ordering::SeqCst), 2);
        assert!(data.accounts().is_none());
    }
}
