//! Normalization of loosely-typed records
//!
//! Records arrive as JSON objects whose field names vary in casing and
//! spelling (`quantityQuintals`, `quantity_quintals`, `QuantityQuintals`).
//! Field lookup ignores case and punctuation, and every record degrades to
//! defaults instead of failing; whatever had to be defaulted or dropped is
//! reported through [`Diagnostics`].

use chrono::{DateTime, NaiveDate};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::LedgerConfig;
use crate::keys::normalize_label;
use crate::models::{
    DiagnosticCode, Diagnostics, LedgerEvents, LocationClosure, Movement, MovementKind,
    MovementStatus, OutturnClearing, ProductCategory,
};
use crate::types::{quintals_for, MAX_QUANTITY, MIN_BAG_SIZE_KG};

/// Raw record arrays as fetched from the API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerInput {
    #[serde(default, alias = "arrivals", alias = "records")]
    pub movements: Vec<Value>,

    #[serde(default, alias = "riceProductions", alias = "rice_productions")]
    pub productions: Vec<Value>,

    #[serde(default, alias = "locationClosures", alias = "location_closures")]
    pub closures: Vec<Value>,

    #[serde(default, alias = "outturnClearings", alias = "outturns")]
    pub outturn_clearings: Vec<Value>,
}

/// Canonical events plus whatever the normalizer had to say about them
#[derive(Debug, Clone, Default)]
pub struct NormalizedInput {
    pub events: LedgerEvents,
    pub diagnostics: Diagnostics,
}

const ID_FIELDS: &[&str] = &["id", "movementid", "recordid", "productionid", "_id"];
const DATE_FIELDS: &[&str] = &[
    "date",
    "movementdate",
    "arrivaldate",
    "productiondate",
    "transactiondate",
    "saledate",
    "paltidate",
    "createdat",
];
const KIND_FIELDS: &[&str] = &["movementtype", "kind", "type", "transactiontype", "entrytype"];
const STATUS_FIELDS: &[&str] = &["status", "approvalstatus", "state"];
const VARIETY_FIELDS: &[&str] = &["variety", "varietyname", "paddyvariety", "ricevariety"];
const CATEGORY_FIELDS: &[&str] = &["productcategory", "producttype", "product", "category", "itemtype"];
const SOURCE_CATEGORY_FIELDS: &[&str] = &["sourceproductcategory", "fromproduct", "sourceproduct"];
const TARGET_CATEGORY_FIELDS: &[&str] = &["targetproductcategory", "toproduct", "targetproduct"];
const BAGS_FIELDS: &[&str] = &["bags", "numberofbags", "bagcount", "targetbags", "tobags", "newbags"];
const BAG_SIZE_FIELDS: &[&str] = &[
    "bagsizekg",
    "bagsize",
    "targetbagsizekg",
    "targetbagsize",
    "tobagsize",
    "newbagsize",
    "allottedkg",
];
const SOURCE_BAG_SIZE_FIELDS: &[&str] = &[
    "sourcebagsizekg",
    "sourcebagsize",
    "frombagsize",
    "oldbagsize",
];
const QUINTAL_FIELDS: &[&str] = &[
    "quantityquintals",
    "quintals",
    "qtls",
    "quantityqtls",
    "targetquintals",
    "netweightquintals",
];
const PACKAGING_FIELDS: &[&str] = &[
    "targetpackaging",
    "topackaging",
    "newpackaging",
    "packagingbrand",
    "packaging",
    "brand",
];
const SOURCE_PACKAGING_FIELDS: &[&str] = &[
    "sourcepackaging",
    "frompackaging",
    "oldpackaging",
    "sourcepackagingbrand",
];
const SOURCE_LOCATION_FIELDS: &[&str] = &[
    "sourcelocation",
    "fromlocation",
    "fromkunchinittu",
    "fromwarehouse",
    "fromlocationcode",
    "sourcekunchinittu",
];
const TARGET_LOCATION_FIELDS: &[&str] = &[
    "targetlocation",
    "tolocation",
    "tokunchinittu",
    "towarehouse",
    "tolocationcode",
    "targetkunchinittu",
];
const LOCATION_FIELDS: &[&str] = &[
    "location",
    "locationcode",
    "kunchinittu",
    "kunchinittucode",
    "warehouse",
    "godown",
];
const OUTTURN_FIELDS: &[&str] = &["outturncode", "outturn", "outturnnumber", "outturnid"];
const SHORTAGE_KG_FIELDS: &[&str] = &["shortagekg", "shortage", "shortageweight"];
const SHORTAGE_BAGS_FIELDS: &[&str] = &["shortagebags"];
const ADMIN_FLAG_FIELDS: &[&str] = &["isadminentry", "adminentered", "enteredbyadmin", "createdbyadmin"];
const ROLE_FIELDS: &[&str] = &["createdbyrole", "enteredbyrole", "creatorrole", "role"];
const CREATOR_FIELDS: &[&str] = &["creator", "createdby", "enteredby"];
const CLOSURE_CODE_FIELDS: &[&str] = &[
    "locationcode",
    "code",
    "kunchinittucode",
    "location",
    "warehousecode",
];
const CLOSURE_DATE_FIELDS: &[&str] = &["closeddate", "closedat", "closuredate", "date"];
const CLEARING_CODE_FIELDS: &[&str] = &["outturncode", "code", "outturn", "outturnnumber"];
const CLEARING_DATE_FIELDS: &[&str] = &["cleareddate", "clearedat", "clearingdate", "date"];
const NAME_FIELDS: &[&str] = &["code", "name", "brandname", "value", "label"];

/// Case- and punctuation-insensitive view over a JSON object
pub(crate) struct RawRecord<'a> {
    fields: Vec<(String, &'a Value)>,
}

impl<'a> RawRecord<'a> {
    pub(crate) fn new(object: &'a Map<String, Value>) -> Self {
        let fields = object
            .iter()
            .map(|(k, v)| (canonical_field(k), v))
            .collect();
        Self { fields }
    }

    /// First non-null value under any alias, in alias order
    pub(crate) fn get(&self, aliases: &[&str]) -> Option<&'a Value> {
        aliases.iter().find_map(|alias| {
            self.fields
                .iter()
                .find(|(name, value)| name == alias && !value.is_null())
                .map(|(_, value)| *value)
        })
    }

    pub(crate) fn text(&self, aliases: &[&str]) -> Option<String> {
        self.get(aliases).and_then(value_text)
    }

    pub(crate) fn decimal(&self, aliases: &[&str]) -> Field<Decimal> {
        match self.get(aliases) {
            None => Field::Missing,
            Some(value) => value_decimal(value).map_or(Field::Invalid, Field::Present),
        }
    }

    pub(crate) fn date(&self, aliases: &[&str]) -> Field<NaiveDate> {
        match self.get(aliases) {
            None => Field::Missing,
            Some(value) => value_text(value)
                .and_then(|s| parse_date(&s))
                .map_or(Field::Invalid, Field::Present),
        }
    }

    /// Bag size from a flat field or a nested packaging object
    fn bag_size(&self, aliases: &[&str], packaging_aliases: &[&str]) -> Field<Decimal> {
        match self.decimal(aliases) {
            Field::Missing => self
                .get(packaging_aliases)
                .and_then(Value::as_object)
                .map(RawRecord::new)
                .map_or(Field::Missing, |nested| nested.decimal(&["allottedkg", "bagsizekg", "kg"])),
            other => other,
        }
    }
}

/// Outcome of reading one typed field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Field<T> {
    Present(T),
    Missing,
    Invalid,
}

impl<T> Field<T> {
    pub(crate) fn ok(self) -> Option<T> {
        match self {
            Field::Present(v) => Some(v),
            _ => None,
        }
    }
}

fn canonical_field(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Text content of a value; nested objects yield their code or name
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(map) => RawRecord::new(map).text(NAME_FIELDS),
        _ => None,
    }
}

/// Decimal content of a value; NaN, empty and garbled strings yield `None`
fn value_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .ok()
            .or_else(|| Decimal::from_scientific(&n.to_string()).ok())
            .or_else(|| n.as_f64().and_then(Decimal::from_f64)),
        Value::String(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            Decimal::from_str(&cleaned)
                .ok()
                .or_else(|| Decimal::from_scientific(&cleaned).ok())
        }
        _ => None,
    }
}

fn value_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_i64().map(|v| v != 0),
        _ => None,
    }
}

/// Calendar day of a date or timestamp string
pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Some(prefix) = raw.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(date);
        }
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.date_naive());
    }
    ["%d-%m-%Y", "%d/%m/%Y", "%Y/%m/%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Turns raw records into canonical events
pub struct Normalizer<'a> {
    config: &'a LedgerConfig,
}

impl<'a> Normalizer<'a> {
    pub fn new(config: &'a LedgerConfig) -> Self {
        Self { config }
    }

    /// Normalize every record array of `input`
    pub fn normalize(&self, input: &LedgerInput) -> NormalizedInput {
        let mut diagnostics = Diagnostics::new();
        let mut events = LedgerEvents::default();

        for (index, value) in input.movements.iter().enumerate() {
            if let Some(m) = self.movement(value, index, None, &mut diagnostics) {
                events.movements.push(m);
            }
        }
        for (index, value) in input.productions.iter().enumerate() {
            if let Some(m) = self.movement(value, index, Some(MovementKind::Production), &mut diagnostics) {
                events.movements.push(m);
            }
        }
        for (index, value) in input.closures.iter().enumerate() {
            if let Some(c) = self.closure(value, index, &mut diagnostics) {
                events.closures.push(c);
            }
        }
        for (index, value) in input.outturn_clearings.iter().enumerate() {
            if let Some(c) = self.clearing(value, index, &mut diagnostics) {
                events.clearings.push(c);
            }
        }

        tracing::debug!(
            movements = events.movements.len(),
            closures = events.closures.len(),
            clearings = events.clearings.len(),
            diagnostics = diagnostics.len(),
            "normalized ledger input"
        );

        NormalizedInput { events, diagnostics }
    }

    /// Normalize one movement record.
    ///
    /// `default_kind` applies when the record names no kind (production
    /// arrays carry none). Returns `None` only when the record is not an
    /// object or has no usable date.
    pub fn movement(
        &self,
        value: &Value,
        index: usize,
        default_kind: Option<MovementKind>,
        diagnostics: &mut Diagnostics,
    ) -> Option<Movement> {
        let Some(object) = value.as_object() else {
            diagnostics.warn(
                DiagnosticCode::SkippedRecord,
                None,
                None,
                format!("movement #{} is not an object", index),
            );
            return None;
        };
        let record = RawRecord::new(object);
        let id = record
            .text(ID_FIELDS)
            .unwrap_or_else(|| format!("#{}", index));
        let id_ref = Some(id.as_str());

        let date = match record.date(DATE_FIELDS) {
            Field::Present(date) => date,
            _ => {
                diagnostics.warn(
                    DiagnosticCode::SkippedRecord,
                    id_ref,
                    None,
                    "movement has no parseable date",
                );
                return None;
            }
        };
        let at = Some(date);

        let kind = match (record.text(KIND_FIELDS), default_kind) {
            (Some(raw), _) => {
                let kind = MovementKind::parse(&raw);
                if kind == MovementKind::Unknown {
                    diagnostics.warn(
                        DiagnosticCode::UnknownKind,
                        id_ref,
                        at,
                        format!("unknown movement kind '{}'", raw),
                    );
                }
                kind
            }
            (None, Some(kind)) => kind,
            (None, None) => {
                diagnostics.warn(DiagnosticCode::UnknownKind, id_ref, at, "movement has no kind");
                MovementKind::Unknown
            }
        };

        let status = match record.text(STATUS_FIELDS) {
            Some(raw) => MovementStatus::parse(&raw).unwrap_or_else(|| {
                diagnostics.warn(
                    DiagnosticCode::UnparseableField,
                    id_ref,
                    at,
                    format!("unrecognised status '{}', treated as pending", raw),
                );
                MovementStatus::Pending
            }),
            None => {
                diagnostics.warn(
                    DiagnosticCode::MissingField,
                    id_ref,
                    at,
                    "movement has no status, treated as pending",
                );
                MovementStatus::Pending
            }
        };

        let variety = record.text(VARIETY_FIELDS).unwrap_or_default();
        let product_category = self.category(&record, kind, id_ref, at, diagnostics);

        let bags = match record.decimal(BAGS_FIELDS) {
            Field::Present(bags) => whole_bags(bags, id_ref, at, diagnostics),
            Field::Invalid => {
                diagnostics.warn(DiagnosticCode::UnparseableField, id_ref, at, "bags unparseable, using 0");
                0
            }
            Field::Missing => 0,
        };

        let bag_size_kg = match record.bag_size(BAG_SIZE_FIELDS, PACKAGING_FIELDS) {
            Field::Present(size) if usable_bag_size(size) => size,
            Field::Missing => self.config.default_bag_size_kg,
            _ => {
                diagnostics.warn(
                    DiagnosticCode::UnparseableField,
                    id_ref,
                    at,
                    format!("bag size unusable, using {} kg", self.config.default_bag_size_kg),
                );
                self.config.default_bag_size_kg
            }
        };

        let derived = quintals_for(Decimal::from(bags), bag_size_kg);
        let quintals = match record.decimal(QUINTAL_FIELDS) {
            Field::Present(q) if !q.is_zero() => capped(q.abs(), "quintals", id_ref, at, diagnostics),
            _ => derived,
        };

        let packaging = record.text(PACKAGING_FIELDS).unwrap_or_default();
        let (source_location, target_location) = self.locations(&record, kind);
        let outturn_code = record.text(OUTTURN_FIELDS);

        let mut movement = Movement {
            id: id.clone(),
            date,
            kind,
            status,
            admin_entered: self.admin_entered(&record),
            variety,
            product_category,
            bags,
            bag_size_kg,
            quintals,
            packaging,
            source_location,
            target_location,
            source_packaging: None,
            source_bag_size_kg: None,
            outturn_code,
            shortage_kg: Decimal::ZERO,
            shortage_bags: Decimal::ZERO,
        };

        if kind == MovementKind::Palti {
            self.palti_fields(&record, &mut movement, diagnostics);
        }

        Some(movement)
    }

    fn category(
        &self,
        record: &RawRecord<'_>,
        kind: MovementKind,
        id: Option<&str>,
        at: Option<NaiveDate>,
        diagnostics: &mut Diagnostics,
    ) -> ProductCategory {
        let raw = record
            .text(CATEGORY_FIELDS)
            .or_else(|| record.text(SOURCE_CATEGORY_FIELDS));
        let Some(raw) = raw else {
            return ProductCategory::Other;
        };
        let resolved = ProductCategory::resolve(&raw);
        if !resolved.exact {
            diagnostics.info(
                DiagnosticCode::GuessedCategory,
                id,
                at,
                format!("category '{}' guessed as {}", raw, resolved.category),
            );
        }

        if kind == MovementKind::Palti {
            if let Some(target) = record.text(TARGET_CATEGORY_FIELDS) {
                let target = ProductCategory::resolve(&target).category;
                if target != resolved.category {
                    diagnostics.warn(
                        DiagnosticCode::CategoryMismatch,
                        id,
                        at,
                        format!(
                            "palti changes category {} -> {}; keeping {}",
                            resolved.category, target, resolved.category
                        ),
                    );
                }
            }
        }
        resolved.category
    }

    /// Source and target location; a bare `location` goes to whichever side the kind uses
    fn locations(&self, record: &RawRecord<'_>, kind: MovementKind) -> (Option<String>, Option<String>) {
        let mut source = record.text(SOURCE_LOCATION_FIELDS);
        let mut target = record.text(TARGET_LOCATION_FIELDS);
        if let Some(location) = record.text(LOCATION_FIELDS) {
            match kind {
                MovementKind::Sale | MovementKind::ProductionShift => {
                    source.get_or_insert(location);
                }
                _ => {
                    target.get_or_insert(location);
                }
            }
        }
        (source, target)
    }

    fn admin_entered(&self, record: &RawRecord<'_>) -> bool {
        if let Some(flag) = record.get(ADMIN_FLAG_FIELDS).and_then(value_bool) {
            return flag;
        }
        if let Some(role) = record.text(ROLE_FIELDS) {
            return self.config.is_admin_role(&role);
        }
        record
            .get(CREATOR_FIELDS)
            .and_then(Value::as_object)
            .map(RawRecord::new)
            .and_then(|creator| creator.text(&["role", "userrole"]))
            .is_some_and(|role| self.config.is_admin_role(&role))
    }

    fn palti_fields(&self, record: &RawRecord<'_>, movement: &mut Movement, diagnostics: &mut Diagnostics) {
        let id = Some(movement.id.as_str());
        let at = Some(movement.date);

        movement.source_packaging = record.text(SOURCE_PACKAGING_FIELDS);
        movement.source_bag_size_kg = match record.bag_size(SOURCE_BAG_SIZE_FIELDS, SOURCE_PACKAGING_FIELDS) {
            Field::Present(size) if usable_bag_size(size) => Some(size),
            Field::Missing => None,
            _ => {
                diagnostics.warn(
                    DiagnosticCode::UnparseableField,
                    id,
                    at,
                    "source bag size unusable, using target bag size",
                );
                None
            }
        };

        movement.shortage_kg = match record.decimal(SHORTAGE_KG_FIELDS) {
            Field::Present(kg) if kg >= Decimal::ZERO => capped(kg, "shortage kg", id, at, diagnostics),
            Field::Missing => Decimal::ZERO,
            _ => {
                diagnostics.warn(DiagnosticCode::UnparseableField, id, at, "shortage unusable, using 0 kg");
                Decimal::ZERO
            }
        };
        movement.shortage_bags = record
            .decimal(SHORTAGE_BAGS_FIELDS)
            .ok()
            .filter(|b| *b >= Decimal::ZERO)
            .map(|b| capped(b, "shortage bags", id, at, diagnostics))
            .unwrap_or_default();
    }

    /// Normalize one location closure record
    pub fn closure(&self, value: &Value, index: usize, diagnostics: &mut Diagnostics) -> Option<LocationClosure> {
        let record = value.as_object().map(RawRecord::new);
        let code = record.as_ref().and_then(|r| r.text(CLOSURE_CODE_FIELDS));
        let date = record.as_ref().and_then(|r| r.date(CLOSURE_DATE_FIELDS).ok());
        match (code, date) {
            (Some(code), Some(closed_date)) => Some(LocationClosure {
                location_code: normalize_label(&code),
                closed_date,
            }),
            _ => {
                diagnostics.warn(
                    DiagnosticCode::SkippedRecord,
                    None,
                    None,
                    format!("closure #{} lacks a location code or date", index),
                );
                None
            }
        }
    }

    /// Normalize one outturn clearing record; uncleared outturns are skipped quietly
    pub fn clearing(&self, value: &Value, index: usize, diagnostics: &mut Diagnostics) -> Option<OutturnClearing> {
        let record = value.as_object().map(RawRecord::new);
        let code = record.as_ref().and_then(|r| r.text(CLEARING_CODE_FIELDS));
        let date = record.as_ref().map(|r| r.date(CLEARING_DATE_FIELDS));
        match (code, date) {
            (Some(code), Some(Field::Present(cleared_date))) => Some(OutturnClearing {
                outturn_code: normalize_label(&code),
                cleared_date,
            }),
            (Some(code), Some(Field::Missing)) => {
                diagnostics.info(
                    DiagnosticCode::SkippedRecord,
                    Some(code.as_str()),
                    None,
                    "outturn has not been cleared",
                );
                None
            }
            _ => {
                diagnostics.warn(
                    DiagnosticCode::SkippedRecord,
                    None,
                    None,
                    format!("outturn clearing #{} lacks a code or usable date", index),
                );
                None
            }
        }
    }
}

fn whole_bags(bags: Decimal, id: Option<&str>, at: Option<NaiveDate>, diagnostics: &mut Diagnostics) -> u32 {
    if bags < Decimal::ZERO {
        diagnostics.warn(DiagnosticCode::UnparseableField, id, at, format!("negative bags {} clamped to 0", bags));
        return 0;
    }
    let bags = capped(bags, "bags", id, at, diagnostics);
    let rounded = bags.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    if rounded != bags {
        diagnostics.info(
            DiagnosticCode::UnparseableField,
            id,
            at,
            format!("fractional bags {} rounded to {}", bags, rounded),
        );
    }
    rounded.to_u32().unwrap_or(u32::MAX)
}

/// A bag size between 100 g and [`MAX_QUANTITY`] kg
pub(crate) fn usable_bag_size(size: Decimal) -> bool {
    (MIN_BAG_SIZE_KG..=MAX_QUANTITY).contains(&size)
}

/// Pin a magnitude into `[-MAX_QUANTITY, MAX_QUANTITY]`, warning when it had to
pub(crate) fn capped(
    value: Decimal,
    what: &str,
    id: Option<&str>,
    at: Option<NaiveDate>,
    diagnostics: &mut Diagnostics,
) -> Decimal {
    if value.abs() <= MAX_QUANTITY {
        return value;
    }
    let limit = if value.is_sign_negative() { -MAX_QUANTITY } else { MAX_QUANTITY };
    diagnostics.warn(
        DiagnosticCode::UnparseableField,
        id,
        at,
        format!("{} {} out of range, capped at {}", what, value, limit),
    );
    limit
}
