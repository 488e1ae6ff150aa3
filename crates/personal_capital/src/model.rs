use serde::Deserialize;

/// The `{spHeader, spData}` wrapper shape returned by every vendor endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: serde::Deserialize<'de>"))]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub sp_header: SpHeader,
    #[serde(default)]
    pub sp_data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// A missing success flag counts as failure; the server omits it on
    /// expired sessions.
    pub fn success(&self) -> bool {
        self.sp_header.success
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpHeader {
    pub success: bool,
    pub csrf: Option<String>,
    pub auth_level: Option<AuthLevel>,
    pub errors: Vec<SpError>,
}

impl SpHeader {
    pub fn error_message(&self) -> Option<&str> {
        self.errors.first().and_then(|e| e.message.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SpError {
    pub code: Option<i64>,
    pub message: Option<String>,
}

/// Server-reported trust tier of the current device. Anything other than a
/// remembered device has to pass two factor verification before password
/// authentication will be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum AuthLevel {
    UserRemembered,
    Unverified,
}

impl From<String> for AuthLevel {
    fn from(value: String) -> AuthLevel {
        match value.as_str() {
            "USER_REMEMBERED" => AuthLevel::UserRemembered,
            _ => AuthLevel::Unverified,
        }
    }
}

impl AuthLevel {
    pub fn remembered(&self) -> bool {
        matches!(self, AuthLevel::UserRemembered)
    }
}

/// `spData` of `/newaccount/getAccounts`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountsData {
    pub networth: f64,
    pub assets: f64,
    pub liabilities: f64,
    pub investment_accounts_total: f64,
    pub mortgage_accounts_total: f64,
    pub cash_accounts_total: f64,
    pub other_asset_accounts_total: f64,
    pub other_liabilities_accounts_total: f64,
    pub credit_card_accounts_total: f64,
    pub loan_accounts_total: f64,
    pub accounts: Vec<Account>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Account {
    pub name: String,
    pub firm_name: String,
    pub logo_path: String,
    pub balance: f64,
    pub account_type: String,
    pub product_type: String,
    pub home_url: String,
    pub currency: String,
    /// Empty for open accounts.
    pub close_date: String,
    /// Unix timestamp, seconds.
    pub last_refreshed: f64,
}

/// `spData` of `/transaction/getUserTransactions`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionsData {
    pub transactions: Vec<RawTransaction>,
}

/// A transaction as reported by the cash manager. A transaction carrying
/// non-empty `splits` is a parent whose amount is subdivided across the
/// children; only the children participate in aggregation.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RawTransaction {
    pub user_transaction_id: Option<i64>,
    pub category_id: i64,
    pub category_name: Option<String>,
    pub amount: f64,
    pub is_cash_in: bool,
    pub is_interest: bool,
    pub is_income: bool,
    pub is_credit: bool,
    pub include_in_cash_manager: bool,
    pub splits: Option<Vec<RawTransaction>>,
}

/// One entry of `/transactioncategory/getCategories`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionCategory {
    pub transaction_category_id: i64,
    pub name: String,
}
