use std::fmt;
use std::str::FromStr;

use personal_capital::model::{Account, AccountsData};

/// The balance categories tracked from an account snapshot, one per
/// `<kind>AccountsTotal` figure the server reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKind {
    Investment,
    Mortgage,
    Cash,
    OtherAsset,
    OtherLiability,
    Credit,
    Loan,
}

/// Named attributes of a kind. Liability-side kinds carry `inverse_sign`:
/// the server reports them positive, the summaries show them negative.
pub struct KindDescriptor {
    pub product_type: &'static str,
    pub account_type: &'static str,
    pub display_name: &'static str,
    pub inverse_sign: bool,
}

impl AccountKind {
    pub const ALL: [AccountKind; 7] = [
        AccountKind::Investment,
        AccountKind::Mortgage,
        AccountKind::Cash,
        AccountKind::OtherAsset,
        AccountKind::OtherLiability,
        AccountKind::Credit,
        AccountKind::Loan,
    ];

    pub fn descriptor(&self) -> KindDescriptor {
        match self {
            AccountKind::Investment => KindDescriptor {
                product_type: "INVESTMENT",
                account_type: "",
                display_name: "Investment",
                inverse_sign: false,
            },
            AccountKind::Mortgage => KindDescriptor {
                product_type: "MORTGAGE",
                account_type: "",
                display_name: "Mortgage",
                inverse_sign: true,
            },
            AccountKind::Cash => KindDescriptor {
                product_type: "BANK",
                account_type: "Cash",
                display_name: "Cash",
                inverse_sign: false,
            },
            AccountKind::OtherAsset => KindDescriptor {
                product_type: "OTHER_ASSETS",
                account_type: "",
                display_name: "Other Asset",
                inverse_sign: false,
            },
            AccountKind::OtherLiability => KindDescriptor {
                product_type: "OTHER_LIABILITIES",
                account_type: "",
                display_name: "Other Liability",
                inverse_sign: true,
            },
            AccountKind::Credit => KindDescriptor {
                product_type: "CREDIT_CARD",
                account_type: "",
                display_name: "Credit",
                inverse_sign: true,
            },
            AccountKind::Loan => KindDescriptor {
                product_type: "LOAN",
                account_type: "",
                display_name: "Loan",
                inverse_sign: true,
            },
        }
    }

    /// The kind's total from a snapshot, sign-normalized for display.
    pub fn balance(&self, data: &AccountsData) -> f64 {
        let raw = match self {
            AccountKind::Investment => data.investment_accounts_total,
            AccountKind::Mortgage => data.mortgage_accounts_total,
            AccountKind::Cash => data.cash_accounts_total,
            AccountKind::OtherAsset => data.other_asset_accounts_total,
            AccountKind::OtherLiability => data.other_liabilities_accounts_total,
            AccountKind::Credit => data.credit_card_accounts_total,
            AccountKind::Loan => data.loan_accounts_total,
        };

        format_balance(self.descriptor().inverse_sign, raw)
    }

    /// Whether an open account belongs to this kind. Matches on product
    /// type, or on account type for kinds like Cash that share the BANK
    /// product with other kinds.
    pub fn matches(&self, account: &Account) -> bool {
        if !account.close_date.is_empty() {
            return false;
        }

        let descriptor = self.descriptor();
        account.product_type == descriptor.product_type
            || (!descriptor.account_type.is_empty()
                && account.account_type == descriptor.account_type)
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.descriptor().display_name)
    }
}

impl FromStr for AccountKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "investment" => Ok(AccountKind::Investment),
            "mortgage" => Ok(AccountKind::Mortgage),
            "cash" => Ok(AccountKind::Cash),
            "other_asset" => Ok(AccountKind::OtherAsset),
            "other_liability" => Ok(AccountKind::OtherLiability),
            "credit" => Ok(AccountKind::Credit),
            "loan" => Ok(AccountKind::Loan),
            other => Err(format!("unknown account category: {}", other)),
        }
    }
}

pub fn format_balance(inverse_sign: bool, balance: f64) -> f64 {
    if inverse_sign {
        -balance
    } else {
        balance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn liability_kinds_invert_their_totals() {
        let data = AccountsData {
            credit_card_accounts_total: 820.0,
            investment_accounts_total: 1500.0,
            ..Default::default()
        };

        assert_eq!(AccountKind::Credit.balance(&data), -820.0);
        assert_eq!(AccountKind::Investment.balance(&data), 1500.0);
    }

    #[test]
    fn closed_accounts_never_match() {
        let account = Account {
            product_type: "INVESTMENT".to_string(),
            close_date: "2023-01-31".to_string(),
            ..Default::default()
        };

        assert!(!AccountKind::Investment.matches(&account));
    }

    #[test]
    fn cash_matches_bank_product_or_cash_account_type() {
        let by_product = Account {
            product_type: "BANK".to_string(),
            ..Default::default()
        };
        let by_account_type = Account {
            product_type: "DEPOSIT".to_string(),
            account_type: "Cash".to_string(),
            ..Default::default()
        };

        assert!(AccountKind::Cash.matches(&by_product));
        assert!(AccountKind::Cash.matches(&by_account_type));
    }

    #[test]
    fn kind_parses_from_config_keys() {
        for kind in AccountKind::ALL {
            let key = match kind {
                AccountKind::Investment => "investment",
                AccountKind::Mortgage => "mortgage",
                AccountKind::Cash => "cash",
                AccountKind::OtherAsset => "other_asset",
                AccountKind::OtherLiability => "other_liability",
                AccountKind::Credit => "credit",
                AccountKind::Loan => "loan",
            };
            assert_eq!(key.parse::<AccountKind>(), Ok(kind));
        }

        assert!("checking".parse::<AccountKind>().is_err());
    }
}
