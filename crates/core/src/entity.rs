use serde::{Deserialize, Serialize};

/// Source platforms whose export layouts we recognize by column signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourcePlatform {
    #[serde(alias = "servicetitan")]
    ServiceTitan,
    #[serde(alias = "housecallpro")]
    HousecallPro,
    Jobber,
    Workiz,
    #[serde(alias = "fieldedge")]
    FieldEdge,
    #[serde(rename = "quickbooks", alias = "quick_books")]
    QuickBooks,
    /// Unknown or hand-rolled export (spreadsheet, custom CRM dump).
    Generic,
}

impl SourcePlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourcePlatform::ServiceTitan => "service_titan",
            SourcePlatform::HousecallPro => "housecall_pro",
            SourcePlatform::Jobber => "jobber",
            SourcePlatform::Workiz => "workiz",
            SourcePlatform::FieldEdge => "field_edge",
            SourcePlatform::QuickBooks => "quickbooks",
            SourcePlatform::Generic => "generic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let norm = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match norm.as_str() {
            "service_titan" | "servicetitan" => Some(SourcePlatform::ServiceTitan),
            "housecall_pro" | "housecallpro" => Some(SourcePlatform::HousecallPro),
            "jobber" => Some(SourcePlatform::Jobber),
            "workiz" => Some(SourcePlatform::Workiz),
            "field_edge" | "fieldedge" => Some(SourcePlatform::FieldEdge),
            "quickbooks" | "quick_books" => Some(SourcePlatform::QuickBooks),
            "generic" => Some(SourcePlatform::Generic),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourcePlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Business object kinds the importer can load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    #[serde(alias = "customer")]
    Customers,
    #[serde(alias = "job")]
    Jobs,
    #[serde(alias = "invoice")]
    Invoices,
    #[serde(alias = "estimate", alias = "quotes")]
    Estimates,
    Equipment,
    #[serde(alias = "pricebook", alias = "price_book_items")]
    PriceBook,
}

impl EntityKind {
    pub const ALL: &'static [EntityKind] = &[
        EntityKind::Customers,
        EntityKind::Jobs,
        EntityKind::Invoices,
        EntityKind::Estimates,
        EntityKind::Equipment,
        EntityKind::PriceBook,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Customers => "customers",
            EntityKind::Jobs => "jobs",
            EntityKind::Invoices => "invoices",
            EntityKind::Estimates => "estimates",
            EntityKind::Equipment => "equipment",
            EntityKind::PriceBook => "price_book",
        }
    }

    /// Target table for imported rows of this kind.
    pub fn table_name(&self) -> &'static str {
        match self {
            EntityKind::Customers => "customers",
            EntityKind::Jobs => "jobs",
            EntityKind::Invoices => "invoices",
            EntityKind::Estimates => "estimates",
            EntityKind::Equipment => "equipment",
            EntityKind::PriceBook => "price_book_items",
        }
    }

    /// The field the datastore holds unique per tenant (case-insensitive).
    pub fn unique_key_field(&self) -> &'static str {
        match self {
            EntityKind::Customers => "email",
            EntityKind::Jobs => "job_number",
            EntityKind::Invoices => "invoice_number",
            EntityKind::Estimates => "estimate_number",
            EntityKind::Equipment => "serial_number",
            EntityKind::PriceBook => "code",
        }
    }

    /// Identity fields: a usable mapping plan must target at least one of these.
    pub fn required_identity_fields(&self) -> &'static [&'static str] {
        match self {
            EntityKind::Customers => {
                &["email", "phone", "first_name", "last_name", "company_name"]
            }
            EntityKind::Jobs => &["job_number", "customer_name", "customer_email", "address"],
            EntityKind::Invoices => &["invoice_number", "customer_name", "total"],
            EntityKind::Estimates => &["estimate_number", "customer_name", "total"],
            EntityKind::Equipment => &["serial_number", "model", "customer_name"],
            EntityKind::PriceBook => &["code", "name", "price"],
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let norm = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match norm.as_str() {
            "customers" | "customer" => Some(EntityKind::Customers),
            "jobs" | "job" => Some(EntityKind::Jobs),
            "invoices" | "invoice" => Some(EntityKind::Invoices),
            "estimates" | "estimate" | "quotes" | "quote" => Some(EntityKind::Estimates),
            "equipment" => Some(EntityKind::Equipment),
            "price_book" | "pricebook" | "price_book_items" => Some(EntityKind::PriceBook),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
