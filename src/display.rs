use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use personal_capital::model::AccountsData;
use rusty_money::{iso, Money};
use tabwriter::TabWriter;

use crate::core::account::{format_balance, AccountKind};
use crate::core::spend::CategorySummary;

pub fn currency(code: &str) -> &'static iso::Currency {
    iso::find(code).unwrap_or(iso::USD)
}

pub fn money(amount: f64, currency: &'static iso::Currency) -> String {
    let factor = 10f64.powi(currency.exponent as i32);
    Money::from_minor((amount * factor).round() as i64, currency).to_string()
}

pub fn print_net_worth<W: Write>(
    wr: W,
    data: &AccountsData,
    currency: &'static iso::Currency,
) -> Result<()> {
    let mut tw = TabWriter::new(wr);
    writeln!(tw, "Net Worth\tAssets\tLiabilities")?;
    writeln!(
        tw,
        "{}\t{}\t{}",
        money(data.networth, currency),
        money(data.assets, currency),
        money(format_balance(true, data.liabilities), currency),
    )?;

    tw.flush()?;

    Ok(())
}

pub fn print_balances<W: Write>(
    wr: W,
    kinds: &[AccountKind],
    data: &AccountsData,
    currency: &'static iso::Currency,
) -> Result<()> {
    let mut tw = TabWriter::new(wr);
    writeln!(tw, "Category\tBalance")?;

    for kind in kinds {
        writeln!(tw, "{}\t{}", kind, money(kind.balance(data), currency))?;
    }

    tw.flush()?;

    Ok(())
}

pub fn print_accounts<W: Write>(
    wr: W,
    kinds: &[AccountKind],
    data: &AccountsData,
    currency: &'static iso::Currency,
) -> Result<()> {
    let mut tw = TabWriter::new(wr);
    writeln!(tw, "Account\tFirm\tType\tBalance\tRefreshed")?;

    for kind in kinds {
        let inverse_sign = kind.descriptor().inverse_sign;
        for account in data.accounts.iter().filter(|a| kind.matches(a)) {
            writeln!(
                tw,
                "{}\t{}\t{}\t{}\t{} ago",
                account.name,
                account.firm_name,
                kind,
                money(format_balance(inverse_sign, account.balance), currency),
                refreshed_age(account.last_refreshed),
            )?;
        }
    }

    tw.flush()?;

    Ok(())
}

pub fn print_spending<W: Write>(
    wr: W,
    spending: &[CategorySummary],
    currency: &'static iso::Currency,
) -> Result<()> {
    let mut tw = TabWriter::new(wr);
    writeln!(tw, "Category\tSpent")?;

    for row in spending {
        writeln!(tw, "{}\t{}", row.name, money(row.amount, currency))?;
    }

    let total: f64 = spending.iter().map(|row| row.amount).sum();
    writeln!(tw, "Total\t{}", money(total, currency))?;

    tw.flush()?;

    Ok(())
}

pub fn refreshed_age(last_epoch: f64) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64();

    age((now - last_epoch).max(0.0) as u64)
}

fn age(elapsed: u64) -> String {
    let days = elapsed / 86400;
    let hours = elapsed / 3600 % 24;
    let minutes = elapsed / 60 % 60;

    if days > 0 {
        format!("{} days", days)
    } else if hours > 0 {
        format!("{} hours", hours)
    } else {
        format!("{} minutes", minutes)
    }
}
