//! # Table Selection
//!
//! Greedy cover of a set of accounts by lookup tables.
//!
//! 1. Tally, per table, how many distinct query accounts it lists.
//! 2. A table becomes a candidate when its tally reaches
//!    [`MIN_CANDIDATE_TALLY`].
//! 3. Candidates are walked by descending tally (stable on discovery order).
//! 4. A candidate is selected if it lists at least one query account not yet
//!    claimed; it then claims all of its unclaimed query accounts.
//!
//! Not a minimum cover: there is no backtracking.

use std::collections::{HashMap, HashSet};

use crate::domain::{Address, MembershipIndex, ResolveResult};

/// Tally at which a table is worth referencing instead of listing accounts.
pub const MIN_CANDIDATE_TALLY: usize = 2;

/// Deduplicate accounts, keeping first-occurrence order.
pub fn dedup_accounts(accounts: &[Address]) -> Vec<Address> {
    let mut seen = HashSet::with_capacity(accounts.len());
    accounts
        .iter()
        .copied()
        .filter(|account| seen.insert(*account))
        .collect()
}

/// Candidate tables with their tallies, sorted by descending tally.
pub fn rank_candidates(index: &MembershipIndex, accounts: &[Address]) -> Vec<(Address, usize)> {
    let mut tally: HashMap<Address, usize> = HashMap::new();
    let mut candidates = Vec::new();

    for account in accounts {
        for table in index.tables_for(account) {
            let count = tally.entry(*table).or_insert(0);
            *count += 1;
            if *count == MIN_CANDIDATE_TALLY {
                candidates.push(*table);
            }
        }
    }

    let mut ranked: Vec<(Address, usize)> = candidates
        .into_iter()
        .map(|table| (table, tally[&table]))
        .collect();
    // sort_by is stable: ties keep discovery order
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}

/// Select tables covering `accounts`. Duplicates in `accounts` are ignored.
pub fn select_tables(index: &MembershipIndex, accounts: &[Address]) -> ResolveResult {
    let query = dedup_accounts(accounts);
    let wanted: HashSet<Address> = query.iter().copied().collect();

    let mut claimed: HashSet<Address> = HashSet::new();
    let mut result = ResolveResult::default();

    for (table, _) in rank_candidates(index, &query) {
        let unclaimed: Vec<Address> = index
            .members_of(&table)
            .filter(|member| wanted.contains(*member) && !claimed.contains(*member))
            .copied()
            .collect();

        if unclaimed.is_empty() {
            continue;
        }

        result.selected_tables.push(table);
        for account in unclaimed {
            claimed.insert(account);
            result.matched_accounts.push(account);
        }
    }

    result
}
