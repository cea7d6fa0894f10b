//! Loading extracted documents into an accounting system.
//!
//! The core never talks to a real ledger. [`Destination`] is the narrow
//! interface a loader implements; [`Migrator`] drives it idempotently, and
//! [`InMemoryDestination`] is a serializable implementation used for dry runs
//! and file-backed ledgers.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{DestinationError, Result};
use crate::models::customer::{is_company_name, CustomerRecord};
use crate::models::document::{CustomerContext, Fingerprint};
use crate::models::posting::PostingPair;
use crate::pipeline::ExtractedDocument;

/// Result type of destination calls.
pub type DestinationResult<T> = std::result::Result<T, DestinationError>;

/// A customer resolved in the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerRef {
    pub id: String,
    /// Whether the customer was created by this call.
    pub created: bool,
}

/// The external ledger, as seen by the migrator.
pub trait Destination {
    /// Fingerprints of postings already loaded under `prefix`.
    fn existing_fingerprints(&mut self, prefix: &str) -> DestinationResult<HashSet<Fingerprint>>;

    /// Look up a customer without creating it.
    fn find_customer(&mut self, customer: &CustomerContext) -> DestinationResult<Option<String>>;

    /// Create a customer and return its id.
    fn create_customer(&mut self, customer: &CustomerContext) -> DestinationResult<String>;

    /// Create a draft posting for `customer_id` and return its id.
    fn create_posting(&mut self, posting: &PostingPair, customer_id: &str) -> DestinationResult<String>;

    /// Post (confirm) a draft posting.
    fn post(&mut self, posting_id: &str) -> DestinationResult<()>;

    /// Find a customer, creating it when missing.
    fn resolve_or_create_customer(
        &mut self,
        customer: &CustomerContext,
    ) -> DestinationResult<CustomerRef> {
        if let Some(id) = self.find_customer(customer)? {
            return Ok(CustomerRef { id, created: false });
        }
        let id = self.create_customer(customer)?;
        Ok(CustomerRef { id, created: true })
    }
}

/// Fingerprint embedded in a posting reference (`"{prefix}/{fp} | ..."`).
pub fn fingerprint_from_reference(reference: &str, prefix: &str) -> Option<Fingerprint> {
    let marker = format!("{}/", prefix);
    let start = reference.find(&marker)? + marker.len();
    let fp: String = reference[start..]
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != '|')
        .collect();
    if fp.is_empty() { None } else { Some(Fingerprint(fp)) }
}

/// Outcome of a migration batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MigrationSummary {
    pub dry_run: bool,
    pub customers_found: usize,
    pub customers_created: usize,
    pub postings_created: usize,
    pub postings_skipped: usize,
    pub total_migrated: Decimal,
    /// Per-document failures; they never abort the batch.
    pub errors: Vec<String>,
    pub created_ids: Vec<String>,
}

impl MigrationSummary {
    /// Fold another batch into this one.
    pub fn merge(&mut self, other: MigrationSummary) {
        self.customers_found += other.customers_found;
        self.customers_created += other.customers_created;
        self.postings_created += other.postings_created;
        self.postings_skipped += other.postings_skipped;
        self.total_migrated += other.total_migrated;
        self.errors.extend(other.errors);
        self.created_ids.extend(other.created_ids);
    }
}

/// Loads extracted documents into a [`Destination`], skipping fingerprints
/// that are already there.
pub struct Migrator<D: Destination> {
    destination: D,
    prefix: String,
    dry_run: bool,
    known: Option<HashSet<Fingerprint>>,
    customers: HashMap<(String, Option<String>), String>,
}

impl<D: Destination> Migrator<D> {
    pub fn new(destination: D, prefix: impl Into<String>) -> Self {
        Self {
            destination,
            prefix: prefix.into(),
            dry_run: false,
            known: None,
            customers: HashMap::new(),
        }
    }

    /// Count what would be created without calling any create method.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn destination(&self) -> &D {
        &self.destination
    }

    pub fn into_destination(self) -> D {
        self.destination
    }

    /// Load `documents`. Existing fingerprints are read from the destination
    /// on the first call only; later calls also skip what earlier calls loaded.
    pub fn migrate(&mut self, documents: &[ExtractedDocument]) -> Result<MigrationSummary> {
        if self.known.is_none() {
            let existing = self.destination.existing_fingerprints(&self.prefix)?;
            info!(existing = existing.len(), prefix = %self.prefix, "existing postings loaded");
            self.known = Some(existing);
        }

        let mut summary = MigrationSummary {
            dry_run: self.dry_run,
            ..Default::default()
        };

        for item in documents {
            if self
                .known
                .as_ref()
                .is_some_and(|known| known.contains(&item.fingerprint))
            {
                debug!(fingerprint = %item.fingerprint, "already migrated, skipping");
                summary.postings_skipped += 1;
                continue;
            }

            let customer_id = match self.customer(&item.document.customer, &mut summary) {
                Ok(id) => id,
                Err(e) => {
                    warn!(row = item.document.row_number(), error = %e, "customer resolution failed");
                    summary.errors.push(format!("row {}: {}", item.document.row_number(), e));
                    continue;
                }
            };

            if self.dry_run {
                info!(
                    customer = %item.document.customer.display_name(),
                    document = %item.document.document_reference(),
                    amount = %item.posting.amount(),
                    "[dry-run] would create posting"
                );
            } else {
                let posting_id = match self.destination.create_posting(&item.posting, &customer_id) {
                    Ok(id) => id,
                    Err(e) => {
                        warn!(row = item.document.row_number(), error = %e, "posting creation failed");
                        summary.errors.push(format!("row {}: {}", item.document.row_number(), e));
                        continue;
                    }
                };
                if item.posting.auto_post {
                    if let Err(e) = self.destination.post(&posting_id) {
                        summary
                            .errors
                            .push(format!("row {}: posting {} not posted: {}", item.document.row_number(), posting_id, e));
                    }
                }
                summary.created_ids.push(posting_id);
            }

            summary.postings_created += 1;
            summary.total_migrated += item.posting.amount();
            if let Some(known) = self.known.as_mut() {
                known.insert(item.fingerprint.clone());
            }
        }

        info!(
            created = summary.postings_created,
            skipped = summary.postings_skipped,
            errors = summary.errors.len(),
            total = %summary.total_migrated,
            dry_run = self.dry_run,
            "migration batch finished"
        );

        Ok(summary)
    }

    fn customer(
        &mut self,
        customer: &CustomerContext,
        summary: &mut MigrationSummary,
    ) -> DestinationResult<String> {
        let key = (customer.display_name(), customer.code.clone());
        if let Some(id) = self.customers.get(&key) {
            return Ok(id.clone());
        }

        let id = if self.dry_run {
            match self.destination.find_customer(customer)? {
                Some(id) => {
                    summary.customers_found += 1;
                    id
                }
                None => {
                    summary.customers_created += 1;
                    format!("dry-run:{}", customer.identity())
                }
            }
        } else {
            let resolved = self.destination.resolve_or_create_customer(customer)?;
            if resolved.created {
                summary.customers_created += 1;
            } else {
                summary.customers_found += 1;
            }
            resolved.id
        };

        self.customers.insert(key, id.clone());
        Ok(id)
    }
}

/// A customer stored in an [`InMemoryDestination`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCustomer {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub name: String,
    #[serde(default)]
    pub is_company: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl StoredCustomer {
    /// Fill contact fields the master record carries. Returns whether any
    /// value changed.
    fn update_from(&mut self, record: &CustomerRecord) -> bool {
        let email = record.email.as_ref().filter(|e| e.contains('@'));
        let mut changed = false;
        for (slot, value) in [
            (&mut self.street, record.street.as_ref()),
            (&mut self.city, record.city.as_ref()),
            (&mut self.zip, record.zip.as_ref()),
            (&mut self.phone, record.phone.as_ref()),
            (&mut self.email, email),
            (&mut self.tax_category, record.tax_category.as_ref()),
        ] {
            if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
                if slot.as_ref() != Some(value) {
                    *slot = Some(value.clone());
                    changed = true;
                }
            }
        }
        changed
    }
}

/// Outcome of a customer master import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerImport {
    pub created: usize,
    pub updated: usize,
    /// Already present, either not updated or with nothing new to fill.
    pub skipped: usize,
}

/// A posting stored in an [`InMemoryDestination`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPosting {
    pub id: String,
    pub customer_id: String,
    pub posted: bool,
    pub posting: PostingPair,
}

/// Serializable ledger holding customers and postings.
///
/// Statement customers match by exact name (case-insensitive), then by code.
/// Partial name matches are never attempted. Master imports match by code and
/// tax id instead (see [`InMemoryDestination::import_customers`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InMemoryDestination {
    pub customers: Vec<StoredCustomer>,
    pub postings: Vec<StoredPosting>,
}

impl InMemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Import master-file customers.
    ///
    /// Existing customers match by legacy code, then by tax id; never by
    /// name, so homonyms with distinct codes are kept apart. With
    /// `update_existing`, matches get their missing or changed contact
    /// fields filled in.
    pub fn import_customers(&mut self, records: &[CustomerRecord], update_existing: bool) -> CustomerImport {
        let mut outcome = CustomerImport::default();
        for record in records {
            match self.find_master(record) {
                Some(index) if update_existing => {
                    if self.customers[index].update_from(record) {
                        debug!(code = %record.code, "customer updated");
                        outcome.updated += 1;
                    } else {
                        debug!(code = %record.code, "customer unchanged, skipping");
                        outcome.skipped += 1;
                    }
                }
                Some(_) => {
                    debug!(code = %record.code, "customer exists, skipping");
                    outcome.skipped += 1;
                }
                None => {
                    let id = self.next_customer_id();
                    let mut stored = StoredCustomer {
                        id,
                        code: Some(record.code.clone()),
                        name: record.name.clone(),
                        is_company: record.is_company(),
                        contact: record.phone.clone().or_else(|| record.email.clone()),
                        tax_id: record.tax_id.clone(),
                        ..Default::default()
                    };
                    stored.update_from(record);
                    self.customers.push(stored);
                    outcome.created += 1;
                }
            }
        }
        info!(
            created = outcome.created,
            updated = outcome.updated,
            skipped = outcome.skipped,
            "customer master imported"
        );
        outcome
    }

    /// Position of the customer a master record refers to.
    fn find_master(&self, record: &CustomerRecord) -> Option<usize> {
        self.customers
            .iter()
            .position(|c| c.code.as_deref() == Some(record.code.as_str()))
            .or_else(|| {
                let tax_id = record.tax_id.as_deref().filter(|t| !t.is_empty())?;
                self.customers
                    .iter()
                    .position(|c| c.tax_id.as_deref() == Some(tax_id))
            })
    }

    fn next_customer_id(&self) -> String {
        format!("C{}", self.customers.len() + 1)
    }

    fn lookup(&self, customer: &CustomerContext) -> Option<&StoredCustomer> {
        let name = customer.display_name().to_lowercase();
        self.customers
            .iter()
            .find(|c| c.name.to_lowercase() == name)
            .or_else(|| {
                let code = customer.code.as_deref()?;
                self.customers.iter().find(|c| c.code.as_deref() == Some(code))
            })
    }

    fn insert_customer(&mut self, customer: &CustomerContext) -> String {
        let id = self.next_customer_id();
        let name = customer.display_name();
        self.customers.push(StoredCustomer {
            id: id.clone(),
            code: customer.code.clone(),
            is_company: is_company_name(&name),
            name,
            contact: customer.contact.clone(),
            ..Default::default()
        });
        id
    }
}

impl Destination for InMemoryDestination {
    fn existing_fingerprints(&mut self, prefix: &str) -> DestinationResult<HashSet<Fingerprint>> {
        Ok(self
            .postings
            .iter()
            .filter_map(|p| fingerprint_from_reference(&p.posting.reference, prefix))
            .collect())
    }

    fn find_customer(&mut self, customer: &CustomerContext) -> DestinationResult<Option<String>> {
        Ok(self.lookup(customer).map(|c| c.id.clone()))
    }

    fn create_customer(&mut self, customer: &CustomerContext) -> DestinationResult<String> {
        if customer.display_name().trim().is_empty() {
            return Err(DestinationError::Customer(customer.identity().to_string()));
        }
        Ok(self.insert_customer(customer))
    }

    fn create_posting(&mut self, posting: &PostingPair, customer_id: &str) -> DestinationResult<String> {
        if !posting.is_balanced() {
            return Err(DestinationError::Rejected {
                fingerprint: posting.fingerprint.to_string(),
                reason: "unbalanced".to_string(),
            });
        }
        let id = format!("P{}", self.postings.len() + 1);
        self.postings.push(StoredPosting {
            id: id.clone(),
            customer_id: customer_id.to_string(),
            posted: false,
            posting: posting.clone(),
        });
        Ok(id)
    }

    fn post(&mut self, posting_id: &str) -> DestinationResult<()> {
        match self.postings.iter_mut().find(|p| p.id == posting_id) {
            Some(stored) => {
                stored.posted = true;
                Ok(())
            }
            None => Err(DestinationError::Unavailable(format!(
                "posting {} not found",
                posting_id
            ))),
        }
    }
}
