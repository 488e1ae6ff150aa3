use std::collections::HashMap;

use personal_capital::model::{RawTransaction, TransactionCategory};
use serde::Serialize;

/// Net amount spent in one transaction category this month. Recomputed
/// from scratch on every aggregation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub name: String,
    pub amount: f64,
    pub category_id: i64,
}

/// Groups cash-manager transactions into per-category net spending,
/// ordered by amount descending.
///
/// Transactions carrying splits are decomposed: the parent never enters a
/// category total, each split child is added to the total of its own
/// category. Inflows (cash-in, interest, income, credits) count negatively
/// against net spend. Split amounts are added as reported, without the
/// inflow sign flip, matching the upstream cash manager's own accounting.
pub fn aggregate(
    transactions: &[RawTransaction],
    categories: &[TransactionCategory],
) -> Vec<CategorySummary> {
    let names: HashMap<i64, &str> = categories
        .iter()
        .map(|c| (c.transaction_category_id, c.name.as_str()))
        .collect();

    let mut summaries: Vec<CategorySummary> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();
    let mut splits: Vec<&RawTransaction> = Vec::new();

    for tx in transactions {
        if let Some(children) = &tx.splits {
            if !children.is_empty() {
                splits.extend(children.iter());
                continue;
            }
        }
        if !tx.include_in_cash_manager {
            continue;
        }

        let name = names
            .get(&tx.category_id)
            .map(|n| n.to_string())
            .or_else(|| tx.category_name.clone())
            .unwrap_or_default();
        let amount = normalized_amount(tx);

        match by_name.get(&name) {
            Some(&i) => summaries[i].amount += amount,
            None => {
                by_name.insert(name.clone(), summaries.len());
                summaries.push(CategorySummary {
                    name,
                    amount,
                    category_id: tx.category_id,
                });
            }
        }
    }

    for split in splits {
        if let Some(row) = summaries
            .iter_mut()
            .find(|s| s.category_id == split.category_id)
        {
            row.amount += split.amount;
        }
    }

    summaries.sort_by(|a, b| b.amount.total_cmp(&a.amount));
    summaries
}

fn normalized_amount(tx: &RawTransaction) -> f64 {
    if tx.is_cash_in || tx.is_interest || tx.is_income || tx.is_credit {
        -tx.amount
    } else {
        tx.amount
    }
}
