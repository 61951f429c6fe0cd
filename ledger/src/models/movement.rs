//! Canonical movement model

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::keys::normalize_label;
use crate::types::{quintals_for, Quantity};

/// Kinds of inventory movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Purchase,
    Shift,
    ProductionShift,
    Loose,
    Sale,
    Production,
    Palti,
    /// Unrecognised kind, kept for audit only
    Unknown,
}

impl MovementKind {
    /// Parse a free-text kind; anything unrecognised maps to `Unknown`
    pub fn parse(raw: &str) -> Self {
        let compact: String = normalize_label(raw).chars().filter(|c| *c != ' ').collect();
        match compact.as_str() {
            "purchase" | "purchases" | "paddypurchase" | "forproduction" | "purchaseforproduction" => {
                MovementKind::Purchase
            }
            "shift" | "shifting" | "normalshifting" | "kunchinittushifting" => MovementKind::Shift,
            "productionshift" | "productionshifting" => MovementKind::ProductionShift,
            "loose" | "loosepaddy" => MovementKind::Loose,
            "sale" | "sales" | "ricesale" => MovementKind::Sale,
            "production" | "riceproduction" => MovementKind::Production,
            "palti" | "riceshifting" | "repack" | "repacking" => MovementKind::Palti,
            _ => MovementKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Purchase => "purchase",
            MovementKind::Shift => "shift",
            MovementKind::ProductionShift => "production_shift",
            MovementKind::Loose => "loose",
            MovementKind::Sale => "sale",
            MovementKind::Production => "production",
            MovementKind::Palti => "palti",
            MovementKind::Unknown => "unknown",
        }
    }

    /// Position within a day: inward stock first, transfers next, sales last
    pub fn apply_rank(&self) -> u8 {
        match self {
            MovementKind::Purchase | MovementKind::Loose | MovementKind::Production => 0,
            MovementKind::Shift | MovementKind::ProductionShift | MovementKind::Palti => 1,
            MovementKind::Sale => 2,
            MovementKind::Unknown => 3,
        }
    }
}

impl std::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Approval status of a movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementStatus {
    Approved,
    Pending,
    Rejected,
}

impl MovementStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_label(raw).as_str() {
            "approved" | "admin approved" | "manager approved" | "accepted" | "completed" => {
                Some(MovementStatus::Approved)
            }
            "pending" | "awaiting approval" | "submitted" => Some(MovementStatus::Pending),
            "rejected" | "declined" | "cancelled" => Some(MovementStatus::Rejected),
            _ => None,
        }
    }
}

/// Finished-goods product categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    Rice,
    Bran,
    Broken,
    ZeroBroken,
    SizerBroken,
    RjBroken,
    RjRice1,
    RjRice2,
    Faram,
    Unpolish,
    Other,
}

/// Exact labels checked before the substring heuristics
const CATEGORY_TABLE: &[(&str, ProductCategory)] = &[
    ("rice", ProductCategory::Rice),
    ("bran", ProductCategory::Bran),
    ("farm bran", ProductCategory::Bran),
    ("broken", ProductCategory::Broken),
    ("0 broken", ProductCategory::ZeroBroken),
    ("zero broken", ProductCategory::ZeroBroken),
    ("sizer broken", ProductCategory::SizerBroken),
    ("rj broken", ProductCategory::RjBroken),
    ("rejection broken", ProductCategory::RjBroken),
    ("rj rice 1", ProductCategory::RjRice1),
    ("rj rice (1)", ProductCategory::RjRice1),
    ("rj rice 2", ProductCategory::RjRice2),
    ("rj rice (2)", ProductCategory::RjRice2),
    ("faram", ProductCategory::Faram),
    ("farm", ProductCategory::Faram),
    ("unpolish", ProductCategory::Unpolish),
    ("unpolished", ProductCategory::Unpolish),
    ("other", ProductCategory::Other),
    ("others", ProductCategory::Other),
];

/// Outcome of category normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryMatch {
    pub category: ProductCategory,
    /// False when the substring fallback had to guess
    pub exact: bool,
}

impl ProductCategory {
    pub const ALL: [ProductCategory; 11] = [
        ProductCategory::Rice,
        ProductCategory::Bran,
        ProductCategory::Broken,
        ProductCategory::ZeroBroken,
        ProductCategory::SizerBroken,
        ProductCategory::RjBroken,
        ProductCategory::RjRice1,
        ProductCategory::RjRice2,
        ProductCategory::Faram,
        ProductCategory::Unpolish,
        ProductCategory::Other,
    ];

    /// Resolve a free-text category.
    ///
    /// The exact table is consulted first; legacy labels fall through to a
    /// best-effort substring match, and anything left over is `Other`.
    pub fn resolve(raw: &str) -> CategoryMatch {
        let label = normalize_label(raw);
        if let Some((_, category)) = CATEGORY_TABLE.iter().find(|(name, _)| *name == label) {
            return CategoryMatch {
                category: *category,
                exact: true,
            };
        }
        if let Some(category) = Self::ALL.iter().find(|c| c.as_str() == label.replace(' ', "_")) {
            return CategoryMatch {
                category: *category,
                exact: true,
            };
        }

        let has = |needle: &str| label.contains(needle);
        let category = if has("sizer") && has("broken") {
            ProductCategory::SizerBroken
        } else if has("rj") && has("broken") {
            ProductCategory::RjBroken
        } else if has("rj") && has("2") {
            ProductCategory::RjRice2
        } else if has("rj") {
            ProductCategory::RjRice1
        } else if (has("zero") || label.starts_with('0')) && has("broken") {
            ProductCategory::ZeroBroken
        } else if has("broken") {
            ProductCategory::Broken
        } else if has("bran") {
            ProductCategory::Bran
        } else if has("faram") || has("farm") {
            ProductCategory::Faram
        } else if has("unpolish") {
            ProductCategory::Unpolish
        } else if has("rice") {
            ProductCategory::Rice
        } else {
            ProductCategory::Other
        };

        CategoryMatch {
            category,
            exact: false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductCategory::Rice => "rice",
            ProductCategory::Bran => "bran",
            ProductCategory::Broken => "broken",
            ProductCategory::ZeroBroken => "zero_broken",
            ProductCategory::SizerBroken => "sizer_broken",
            ProductCategory::RjBroken => "rj_broken",
            ProductCategory::RjRice1 => "rj_rice_1",
            ProductCategory::RjRice2 => "rj_rice_2",
            ProductCategory::Faram => "faram",
            ProductCategory::Unpolish => "unpolish",
            ProductCategory::Other => "other",
        }
    }

    /// Pure by-product yield: production in these categories debits no paddy
    pub fn is_paddy_exempt(&self) -> bool {
        matches!(self, ProductCategory::Bran | ProductCategory::Faram)
    }
}

impl std::fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProductCategory::Rice => write!(f, "Rice"),
            ProductCategory::Bran => write!(f, "Bran"),
            ProductCategory::Broken => write!(f, "Broken"),
            ProductCategory::ZeroBroken => write!(f, "0 Broken"),
            ProductCategory::SizerBroken => write!(f, "Sizer Broken"),
            ProductCategory::RjBroken => write!(f, "RJ Broken"),
            ProductCategory::RjRice1 => write!(f, "RJ Rice 1"),
            ProductCategory::RjRice2 => write!(f, "RJ Rice 2"),
            ProductCategory::Faram => write!(f, "Faram"),
            ProductCategory::Unpolish => write!(f, "Unpolish"),
            ProductCategory::Other => write!(f, "Other"),
        }
    }
}

/// Processing marker embedded in variety names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Process {
    #[default]
    Raw,
    Steam,
}

impl Process {
    pub fn as_str(&self) -> &'static str {
        match self {
            Process::Raw => "raw",
            Process::Steam => "steam",
        }
    }
}

/// One inventory event in canonical shape.
///
/// For a Palti the `bags`, `bag_size_kg`, `packaging` and `target_location`
/// fields describe the target side; the `source_*` fields describe the side
/// being consumed and fall back to the target values when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub id: String,
    pub date: NaiveDate,
    pub kind: MovementKind,
    pub status: MovementStatus,
    /// Entered by an administrator; counts regardless of status
    pub admin_entered: bool,
    pub variety: String,
    pub product_category: ProductCategory,
    pub bags: u32,
    pub bag_size_kg: Decimal,
    pub quintals: Decimal,
    pub packaging: String,
    pub source_location: Option<String>,
    pub target_location: Option<String>,
    pub source_packaging: Option<String>,
    pub source_bag_size_kg: Option<Decimal>,
    pub outturn_code: Option<String>,
    pub shortage_kg: Decimal,
    pub shortage_bags: Decimal,
}

impl Movement {
    /// A movement with defaults: approved, 26 kg bags, no quantity
    pub fn new(id: impl Into<String>, date: NaiveDate, kind: MovementKind) -> Self {
        Self {
            id: id.into(),
            date,
            kind,
            status: MovementStatus::Approved,
            admin_entered: false,
            variety: String::new(),
            product_category: ProductCategory::Other,
            bags: 0,
            bag_size_kg: Decimal::from(26),
            quintals: Decimal::ZERO,
            packaging: String::new(),
            source_location: None,
            target_location: None,
            source_packaging: None,
            source_bag_size_kg: None,
            outturn_code: None,
            shortage_kg: Decimal::ZERO,
            shortage_bags: Decimal::ZERO,
        }
    }

    pub fn with_variety(mut self, variety: impl Into<String>) -> Self {
        self.variety = variety.into();
        self
    }

    pub fn with_category(mut self, category: ProductCategory) -> Self {
        self.product_category = category;
        self
    }

    /// Set bags and bag size, deriving quintals
    pub fn with_bags(mut self, bags: u32, bag_size_kg: Decimal) -> Self {
        self.bags = bags;
        self.bag_size_kg = bag_size_kg;
        self.quintals = quintals_for(Decimal::from(bags), bag_size_kg);
        self
    }

    /// Override the derived quintals
    pub fn with_quintals(mut self, quintals: Decimal) -> Self {
        self.quintals = quintals;
        self
    }

    pub fn with_packaging(mut self, packaging: impl Into<String>) -> Self {
        self.packaging = packaging.into();
        self
    }

    pub fn from_location(mut self, location: impl Into<String>) -> Self {
        self.source_location = Some(location.into());
        self
    }

    pub fn to_location(mut self, location: impl Into<String>) -> Self {
        self.target_location = Some(location.into());
        self
    }

    pub fn with_source_packaging(mut self, packaging: impl Into<String>, bag_size_kg: Decimal) -> Self {
        self.source_packaging = Some(packaging.into());
        self.source_bag_size_kg = Some(bag_size_kg);
        self
    }

    pub fn with_outturn(mut self, code: impl Into<String>) -> Self {
        self.outturn_code = Some(code.into());
        self
    }

    pub fn with_shortage_kg(mut self, shortage_kg: Decimal) -> Self {
        self.shortage_kg = shortage_kg;
        self
    }

    pub fn with_status(mut self, status: MovementStatus) -> Self {
        self.status = status;
        self
    }

    pub fn entered_by_admin(mut self) -> Self {
        self.admin_entered = true;
        self
    }

    /// Counts toward balances
    pub fn participates(&self) -> bool {
        self.kind != MovementKind::Unknown
            && (self.status == MovementStatus::Approved || self.admin_entered)
    }

    /// Known kind still waiting on approval (or rejected); annotation only
    pub fn is_pending(&self) -> bool {
        self.kind != MovementKind::Unknown && !self.participates()
    }

    /// Target-side quantity of the movement
    pub fn quantity(&self) -> Quantity {
        Quantity::new(Decimal::from(self.bags), self.quintals)
    }
}
