//! Per-resource descriptors
//!
//! Every accounting resource shares the same CRUD contract; what differs is
//! captured here as data: the URL segment, the collection key, the identity
//! field, the validation fields and which operations the server accepts.

use super::request::Operation;

/// Operations a resource accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub read: bool,
    pub create: bool,
    pub update: bool,
    pub delete: bool,
    pub pdf: bool,
    pub paginated: bool,
}

impl Capabilities {
    pub const READ_ONLY: Self = Self {
        read: true,
        create: false,
        update: false,
        delete: false,
        pdf: false,
        paginated: false,
    };

    pub const READ_WRITE: Self = Self {
        create: true,
        update: true,
        ..Self::READ_ONLY
    };

    pub const fn with_delete(self) -> Self {
        Self { delete: true, ..self }
    }

    pub const fn with_pdf(self) -> Self {
        Self { pdf: true, ..self }
    }

    pub const fn paginated(self) -> Self {
        Self { paginated: true, ..self }
    }

    pub const fn without_update(self) -> Self {
        Self { update: false, ..self }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceDescriptor {
    /// URL path segment, e.g. `Invoices`
    pub name: &'static str,
    /// Key holding the entity array in request and response bodies
    pub plural_key: &'static str,
    /// Server-assigned identity, e.g. `InvoiceID`
    pub identity_field: &'static str,
    pub has_errors_field: &'static str,
    pub validation_errors_field: &'static str,
    pub warnings_field: &'static str,
    pub capabilities: Capabilities,
}

impl ResourceDescriptor {
    pub const fn new(
        name: &'static str,
        identity_field: &'static str,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            name,
            plural_key: name,
            identity_field,
            has_errors_field: "HasErrors",
            validation_errors_field: "ValidationErrors",
            warnings_field: "Warnings",
            capabilities,
        }
    }

    pub fn supports(&self, operation: Operation) -> bool {
        let caps = &self.capabilities;
        match operation {
            Operation::List | Operation::GetById => caps.read,
            Operation::Create => caps.create,
            Operation::Update | Operation::UpdateMultiple => caps.update,
            Operation::Delete => caps.delete,
            Operation::GetBinary => caps.pdf,
        }
    }
}

/// Descriptors for the resources exposed by the client
pub mod resources {
    use super::{Capabilities, ResourceDescriptor};

    const RW: Capabilities = Capabilities::READ_WRITE;
    const RO: Capabilities = Capabilities::READ_ONLY;

    pub const ACCOUNTS: ResourceDescriptor =
        ResourceDescriptor::new("Accounts", "AccountID", RW.with_delete());
    pub const BANK_TRANSACTIONS: ResourceDescriptor =
        ResourceDescriptor::new("BankTransactions", "BankTransactionID", RW.paginated());
    pub const BANK_TRANSFERS: ResourceDescriptor =
        ResourceDescriptor::new("BankTransfers", "BankTransferID", RW.without_update());
    pub const CONTACT_GROUPS: ResourceDescriptor =
        ResourceDescriptor::new("ContactGroups", "ContactGroupID", RW);
    pub const CONTACTS: ResourceDescriptor =
        ResourceDescriptor::new("Contacts", "ContactID", RW.paginated());
    pub const CREDIT_NOTES: ResourceDescriptor =
        ResourceDescriptor::new("CreditNotes", "CreditNoteID", RW.with_pdf().paginated());
    pub const CURRENCIES: ResourceDescriptor =
        ResourceDescriptor::new("Currencies", "Code", RW.without_update());
    pub const EMPLOYEES: ResourceDescriptor =
        ResourceDescriptor::new("Employees", "EmployeeID", RW);
    pub const EXPENSE_CLAIMS: ResourceDescriptor =
        ResourceDescriptor::new("ExpenseClaims", "ExpenseClaimID", RW);
    pub const INVOICES: ResourceDescriptor =
        ResourceDescriptor::new("Invoices", "InvoiceID", RW.with_pdf().paginated());
    pub const ITEMS: ResourceDescriptor =
        ResourceDescriptor::new("Items", "ItemID", RW.with_delete());
    pub const JOURNALS: ResourceDescriptor = ResourceDescriptor::new("Journals", "JournalID", RO);
    pub const MANUAL_JOURNALS: ResourceDescriptor =
        ResourceDescriptor::new("ManualJournals", "ManualJournalID", RW.paginated());
    pub const ORGANISATIONS: ResourceDescriptor =
        ResourceDescriptor::new("Organisation", "OrganisationID", RO).with_plural_key("Organisations");
    pub const OVERPAYMENTS: ResourceDescriptor =
        ResourceDescriptor::new("Overpayments", "OverpaymentID", RO.paginated());
    pub const PAYMENTS: ResourceDescriptor =
        ResourceDescriptor::new("Payments", "PaymentID", RW.paginated());
    pub const PREPAYMENTS: ResourceDescriptor =
        ResourceDescriptor::new("Prepayments", "PrepaymentID", RO.paginated());
    pub const PURCHASE_ORDERS: ResourceDescriptor =
        ResourceDescriptor::new("PurchaseOrders", "PurchaseOrderID", RW.with_pdf().paginated());
    pub const QUOTES: ResourceDescriptor =
        ResourceDescriptor::new("Quotes", "QuoteID", RW.with_pdf().paginated());
    pub const RECEIPTS: ResourceDescriptor = ResourceDescriptor::new("Receipts", "ReceiptID", RW);
    pub const REPEATING_INVOICES: ResourceDescriptor =
        ResourceDescriptor::new("RepeatingInvoices", "RepeatingInvoiceID", RO);
    pub const TAX_RATES: ResourceDescriptor = ResourceDescriptor::new("TaxRates", "TaxType", RW);
    pub const TRACKING_CATEGORIES: ResourceDescriptor =
        ResourceDescriptor::new("TrackingCategories", "TrackingCategoryID", RW.with_delete());
    pub const USERS: ResourceDescriptor = ResourceDescriptor::new("Users", "UserID", RO);

    pub const ALL: &[ResourceDescriptor] = &[
        ACCOUNTS,
        BANK_TRANSACTIONS,
        BANK_TRANSFERS,
        CONTACT_GROUPS,
        CONTACTS,
        CREDIT_NOTES,
        CURRENCIES,
        EMPLOYEES,
        EXPENSE_CLAIMS,
        INVOICES,
        ITEMS,
        JOURNALS,
        MANUAL_JOURNALS,
        ORGANISATIONS,
        OVERPAYMENTS,
        PAYMENTS,
        PREPAYMENTS,
        PURCHASE_ORDERS,
        QUOTES,
        RECEIPTS,
        REPEATING_INVOICES,
        TAX_RATES,
        TRACKING_CATEGORIES,
        USERS,
    ];
}

impl ResourceDescriptor {
    /// Override the collection key for resources whose URL segment differs
    pub const fn with_plural_key(self, plural_key: &'static str) -> Self {
        Self { plural_key, ..self }
    }
}
