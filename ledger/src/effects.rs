//! Movement effect rules
//!
//! Each rule maps a movement (and, for production, the current outturn
//! balance) to a set of bucket deltas. The replayer applies a movement's
//! deltas together, so both legs of a shift or palti land at once.

use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

use crate::config::LedgerConfig;
use crate::keys::{build_outturn_key, location_bucket, normalize_label, outturn_bucket};
use crate::models::{Buckets, Delta, Movement, MovementKind, ProductCategory, StockBucket};
use crate::types::{bags_for, saturating_div, Quantity};

/// Deltas produced by one movement
#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    pub deltas: Vec<Delta>,
    /// Weight lost in a palti conversion; leaves the system entirely
    pub shortage_kg: Decimal,
}

impl Effect {
    fn of(deltas: Vec<Delta>) -> Self {
        Self {
            deltas,
            shortage_kg: Decimal::ZERO,
        }
    }

    /// Sum of all removals (as a positive quantity)
    pub fn removed(&self) -> Quantity {
        self.deltas
            .iter()
            .filter(|d| d.change.quintals < Decimal::ZERO || d.change.bags < Decimal::ZERO)
            .map(|d| -d.change)
            .sum()
    }

    /// Sum of all additions
    pub fn added(&self) -> Quantity {
        self.deltas
            .iter()
            .filter(|d| d.change.quintals > Decimal::ZERO || d.change.bags > Decimal::ZERO)
            .map(|d| d.change)
            .sum()
    }
}

/// A movement that names no bucket for one of its legs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Unplaced {
    #[error("{0} has no target location")]
    MissingTarget(MovementKind),

    #[error("{0} has no source location")]
    MissingSource(MovementKind),

    #[error("{0} has neither a location nor an outturn")]
    MissingDestination(MovementKind),

    #[error("unknown movement kind")]
    UnknownKind,
}

/// Compute the deltas a movement makes against `buckets`
pub fn plan_effect(
    buckets: &Buckets,
    movement: &Movement,
    config: &LedgerConfig,
) -> Result<Effect, Unplaced> {
    let kind = movement.kind;
    let quantity = movement.quantity();

    match kind {
        MovementKind::Purchase => match movement.outturn_code.as_deref() {
            Some(code) => Ok(Effect::of(vec![outturn_delta(movement, code, quantity)])),
            None => {
                let target = target(movement).ok_or(Unplaced::MissingTarget(kind))?;
                Ok(Effect::of(vec![location_delta(movement, target, quantity, config)]))
            }
        },
        MovementKind::Shift => {
            let source = source(movement).ok_or(Unplaced::MissingSource(kind))?;
            let target = target(movement).ok_or(Unplaced::MissingTarget(kind))?;
            Ok(Effect::of(vec![
                location_delta(movement, source, -quantity, config),
                location_delta(movement, target, quantity, config),
            ]))
        }
        MovementKind::ProductionShift => {
            let source = source(movement).ok_or(Unplaced::MissingSource(kind))?;
            let code = movement
                .outturn_code
                .as_deref()
                .ok_or(Unplaced::MissingDestination(kind))?;
            Ok(Effect::of(vec![
                location_delta(movement, source, -quantity, config),
                outturn_delta(movement, code, quantity),
            ]))
        }
        MovementKind::Loose => {
            let target = target(movement).ok_or(Unplaced::MissingTarget(kind))?;
            Ok(Effect::of(vec![location_delta(movement, target, quantity, config)]))
        }
        MovementKind::Sale => {
            let source = source(movement).ok_or(Unplaced::MissingSource(kind))?;
            Ok(Effect::of(vec![location_delta(movement, source, -quantity, config)]))
        }
        MovementKind::Production => plan_production(buckets, movement, config),
        MovementKind::Palti => plan_palti(movement, config),
        MovementKind::Unknown => Err(Unplaced::UnknownKind),
    }
}

fn source(movement: &Movement) -> Option<&str> {
    movement.source_location.as_deref().filter(|l| !l.trim().is_empty())
}

fn target(movement: &Movement) -> Option<&str> {
    movement.target_location.as_deref().filter(|l| !l.trim().is_empty())
}

fn location_delta(
    movement: &Movement,
    location: &str,
    change: Quantity,
    config: &LedgerConfig,
) -> Delta {
    let (key, dimensions) = location_bucket(
        &movement.variety,
        location,
        movement.product_category,
        &movement.packaging,
        movement.bag_size_kg,
        &config.direct_load_markers,
    );
    Delta {
        key,
        dimensions,
        change,
    }
}

fn outturn_delta(movement: &Movement, code: &str, change: Quantity) -> Delta {
    let (key, dimensions) = outturn_bucket(&movement.variety, code, movement.product_category);
    Delta {
        key,
        dimensions,
        change,
    }
}

/// Finished goods land in the target location; the outturn is debited paddy
fn plan_production(
    buckets: &Buckets,
    movement: &Movement,
    config: &LedgerConfig,
) -> Result<Effect, Unplaced> {
    let target = target(movement);
    let code = movement.outturn_code.as_deref();
    if target.is_none() && code.is_none() {
        return Err(Unplaced::MissingDestination(MovementKind::Production));
    }

    let mut deltas = Vec::with_capacity(2);
    if let Some(target) = target {
        deltas.push(location_delta(movement, target, movement.quantity(), config));
    }
    if let Some(code) = code {
        let outturn = owning_outturn(buckets, movement, code);
        let debit = paddy_debit(outturn, movement, config);
        if !debit.bags.is_zero() {
            let (key, dimensions) = match outturn {
                Some(bucket) => (bucket.key.clone(), bucket.dimensions.clone()),
                None => outturn_bucket(&movement.variety, code, movement.product_category),
            };
            deltas.push(Delta {
                key,
                dimensions,
                change: -debit,
            });
        }
    }
    Ok(Effect::of(deltas))
}

/// Outturn bucket a production draws from: same variety first, else any for the code
fn owning_outturn<'a>(
    buckets: &'a Buckets,
    movement: &Movement,
    code: &str,
) -> Option<&'a StockBucket> {
    let preferred = build_outturn_key(&movement.variety, code);
    buckets.get(&preferred).or_else(|| {
        let code = normalize_label(code);
        buckets.outturn_buckets(&code).into_iter().next()
    })
}

/// Paddy bags consumed to produce `quintals` of `category`.
///
/// `round(quintals / quintals_per_bag)` with halves rounding up; by-product
/// categories consume nothing.
pub fn deduct_paddy_bags(
    quintals: Decimal,
    category: ProductCategory,
    quintals_per_bag: Decimal,
) -> Decimal {
    if category.is_paddy_exempt() || quintals_per_bag <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    saturating_div(quintals, quintals_per_bag).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Quantity a production debits from its outturn.
///
/// Quintals follow the outturn's average bag weight, or the default bag size
/// when the outturn holds no bags.
fn paddy_debit(outturn: Option<&StockBucket>, production: &Movement, config: &LedgerConfig) -> Quantity {
    let bags = deduct_paddy_bags(
        production.quintals,
        production.product_category,
        config.quintals_per_paddy_bag,
    );
    let per_bag = match outturn {
        Some(b) if b.bags > Decimal::ZERO && b.quintals > Decimal::ZERO => saturating_div(b.quintals, b.bags),
        _ => config.default_bag_size_kg / Decimal::ONE_HUNDRED,
    };
    Quantity::new(bags, bags.saturating_mul(per_bag))
}

/// Apply one production event to its outturn bucket
pub fn deduct_paddy(outturn: &StockBucket, production: &Movement, config: &LedgerConfig) -> StockBucket {
    let debit = paddy_debit(Some(outturn), production, config);
    let remaining = outturn.quantity() - debit;
    StockBucket {
        bags: remaining.bags,
        quintals: remaining.quintals,
        ..outturn.clone()
    }
}

/// Palti: consume `target + shortage` from the source pair, add `target` to the target pair
fn plan_palti(movement: &Movement, config: &LedgerConfig) -> Result<Effect, Unplaced> {
    let kind = MovementKind::Palti;
    let source_location = source(movement).or_else(|| target(movement));
    let target_location = target(movement).or_else(|| source(movement));
    let (source_location, target_location) = match (source_location, target_location) {
        (Some(s), Some(t)) => (s, t),
        _ => return Err(Unplaced::MissingDestination(kind)),
    };

    let source_bag_size = movement.source_bag_size_kg.unwrap_or(movement.bag_size_kg);
    let source_packaging = movement
        .source_packaging
        .clone()
        .unwrap_or_else(|| movement.packaging.clone());

    let target_quantity = movement.quantity();
    let source_quintals = target_quantity
        .quintals
        .saturating_add(movement.shortage_kg / Decimal::ONE_HUNDRED);
    let source_quantity = Quantity::new(bags_for(source_quintals, source_bag_size), source_quintals);

    let (source_key, source_dimensions) = location_bucket(
        &movement.variety,
        source_location,
        movement.product_category,
        &source_packaging,
        source_bag_size,
        &config.direct_load_markers,
    );

    Ok(Effect {
        deltas: vec![
            Delta {
                key: source_key,
                dimensions: source_dimensions,
                change: -source_quantity,
            },
            location_delta(movement, target_location, target_quantity, config),
        ],
        shortage_kg: movement.shortage_kg,
    })
}
