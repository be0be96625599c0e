//! # Membership Index
//!
//! In-memory projection of every [`MembershipRecord`], keyed both ways:
//! table → members and account → tables.
//!
//! ## Invariants
//!
//! - At most one record per `(table, account)` pair (set semantics).
//! - `by_table` and `by_account` always describe the same record set.
//! - No empty sets are kept, so `by_table.len()` is the distinct table count.

use std::collections::{BTreeSet, HashMap};

use super::entities::{IndexStats, MembershipRecord};
use super::value_objects::Address;

/// Two-way in-memory index of lookup table membership.
#[derive(Debug, Default, Clone)]
pub struct MembershipIndex {
    by_table: HashMap<Address, BTreeSet<Address>>,
    by_account: HashMap<Address, BTreeSet<Address>>,
    records: usize,
}

impl MembershipIndex {
    /// Empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a record scan, ignoring duplicates.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = MembershipRecord>,
    {
        let mut index = Self::new();
        for record in records {
            index.insert(record);
        }
        index
    }

    /// Insert a record. Returns false if it was already present.
    pub fn insert(&mut self, record: MembershipRecord) -> bool {
        let inserted = self
            .by_table
            .entry(record.table)
            .or_default()
            .insert(record.account);
        if inserted {
            self.by_account
                .entry(record.account)
                .or_default()
                .insert(record.table);
            self.records += 1;
        }
        inserted
    }

    /// Whether the record is present.
    pub fn contains(&self, record: &MembershipRecord) -> bool {
        self.by_table
            .get(&record.table)
            .is_some_and(|members| members.contains(&record.account))
    }

    /// Remove every record of `table`. Returns the number removed.
    pub fn remove_table(&mut self, table: &Address) -> usize {
        let Some(members) = self.by_table.remove(table) else {
            return 0;
        };
        for account in &members {
            if let Some(tables) = self.by_account.get_mut(account) {
                tables.remove(table);
                if tables.is_empty() {
                    self.by_account.remove(account);
                }
            }
        }
        self.records -= members.len();
        members.len()
    }

    /// Tables listing `account`, in address order.
    pub fn tables_for(&self, account: &Address) -> impl Iterator<Item = &Address> {
        self.by_account.get(account).into_iter().flatten()
    }

    /// Members of `table`, in address order.
    pub fn members_of(&self, table: &Address) -> impl Iterator<Item = &Address> {
        self.by_table.get(table).into_iter().flatten()
    }

    /// Number of members recorded for `table`.
    pub fn member_count(&self, table: &Address) -> usize {
        self.by_table.get(table).map_or(0, BTreeSet::len)
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.records
    }

    /// Whether the index holds no records.
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// Number of distinct tables.
    pub fn table_count(&self) -> usize {
        self.by_table.len()
    }

    /// Number of distinct member accounts.
    pub fn account_count(&self) -> usize {
        self.by_account.len()
    }

    /// Every record, sorted by `(table, account)`.
    pub fn records(&self) -> Vec<MembershipRecord> {
        let mut out: Vec<MembershipRecord> = self
            .by_table
            .iter()
            .flat_map(|(table, members)| {
                members
                    .iter()
                    .map(move |account| MembershipRecord::new(*table, *account))
            })
            .collect();
        out.sort();
        out
    }

    /// Record counts and the duplicate ratio.
    pub fn stats(&self) -> IndexStats {
        let duplicate_ratio = if self.records == 0 {
            0.0
        } else {
            (self.records - self.account_count()) as f64 / self.records as f64
        };
        IndexStats {
            total_records: self.records,
            distinct_tables: self.table_count(),
            duplicate_ratio,
        }
    }
}
