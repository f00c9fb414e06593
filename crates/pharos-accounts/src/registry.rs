use std::collections::HashMap;
use std::sync::Arc;

use pharos_core::AccountId;
use tracing::{info, warn};

use crate::error::Result;
use crate::source::{AccountSource, RejectedSink};
use crate::types::{Account, RawRecord, RejectReason, Rejected};
use crate::validate::{derive_identity, normalize_key, normalize_proxy, normalize_token};

/// Validated accounts plus the quarantined rows, both in source order.
///
/// The registry owns every [`Account`]; the scheduler receives shared,
/// read-only `Arc` views.
#[derive(Debug, Default)]
pub struct AccountRegistry {
    accounts: Vec<Arc<Account>>,
    rejected: Vec<Rejected>,
}

impl AccountRegistry {
    /// Read `source`, validate every record, hand rejects to `sink`.
    pub fn load(source: &dyn AccountSource, sink: &dyn RejectedSink) -> Result<Self> {
        let records = source.read()?;
        let registry = Self::from_records(records);

        info!(
            source = %source.describe(),
            valid = registry.accounts.len(),
            rejected = registry.rejected.len(),
            "accounts loaded"
        );
        for r in &registry.rejected {
            warn!(row = r.record.row, reason = r.reason.code(), "account rejected: {}", r.reason);
        }
        if !registry.rejected.is_empty() {
            sink.persist(&registry.rejected)?;
        }
        Ok(registry)
    }

    /// Validate records without any I/O. First occurrence of an identity
    /// wins; later ones are rejected as duplicates.
    pub fn from_records(records: Vec<RawRecord>) -> Self {
        let mut seen: HashMap<AccountId, usize> = HashMap::new();
        let mut accounts = Vec::new();
        let mut rejected = Vec::new();

        for record in records {
            match validate(&record) {
                Ok(account) => {
                    if let Some(&first_row) = seen.get(&account.id) {
                        rejected.push(Rejected {
                            record,
                            reason: RejectReason::Duplicate { first_row },
                        });
                        continue;
                    }
                    seen.insert(account.id.clone(), account.row);
                    accounts.push(Arc::new(account));
                }
                Err(reason) => rejected.push(Rejected { record, reason }),
            }
        }

        Self { accounts, rejected }
    }

    pub fn accounts(&self) -> &[Arc<Account>] {
        &self.accounts
    }

    pub fn rejected(&self) -> &[Rejected] {
        &self.rejected
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn get(&self, id: &AccountId) -> Option<&Arc<Account>> {
        self.accounts.iter().find(|a| &a.id == id)
    }
}

fn validate(record: &RawRecord) -> std::result::Result<Account, RejectReason> {
    let key = normalize_key(&record.private_key)?;
    let proxy = normalize_proxy(&record.proxy)?;
    Ok(Account::new(
        derive_identity(&key),
        record.row,
        key,
        proxy,
        normalize_token(&record.twitter_token),
        normalize_token(&record.discord_token),
    ))
}
