//! Validated, immutable snapshot of everything needed to build an allocation program
use std::collections::BTreeSet;
use std::hash::Hash;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::data::error::{DataIntegrityError, KeyPair};
use crate::data::table::{
    article_rows, door_rows, eligibility_rows, heat_rows, min_runs_rows, supply_rows,
    tier_cap_runs_rows, tier_capacity_rows, InputTables, ARTICLES, DOORS, ELIGIBILITY, HEAT,
    MIN_RUNS, SUPPLY, TIER_CAPACITY, TIER_CAP_RUNS,
};

/// Inputs of one allocation run, keyed by business identifiers
///
/// Door, SKU and size universes are sorted and free of duplicates. Every lookup the
/// model builder needs is guaranteed to succeed for keys drawn from those universes:
///
/// - every SKU has a heat label,
/// - every (tier, heat) pair occurring across doors and SKUs has a score and a max runs entry,
/// - every (sku, size) of a run curve has supply units and a ratio.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationData {
    doors: Vec<String>,
    skus: Vec<String>,
    sizes: Vec<String>,
    door_tier: IndexMap<String, String>,
    sku_sizes: IndexMap<String, Vec<String>>,
    eligible: IndexMap<KeyPair, bool>,
    heat: IndexMap<String, String>,
    score: IndexMap<KeyPair, f64>,
    max_runs: IndexMap<KeyPair, u64>,
    supply_units: IndexMap<KeyPair, u64>,
    ratio: IndexMap<KeyPair, f64>,
    cap_runs_total: IndexMap<String, Option<f64>>,
    min_runs: IndexMap<KeyPair, u64>,
}

fn pair(first: &str, second: &str) -> KeyPair {
    (first.to_string(), second.to_string())
}

fn pair_label(key: &KeyPair) -> String {
    format!("({}, {})", key.0, key.1)
}

/// Keys appearing more than once, sorted
fn duplicates<K: Ord + Clone>(keys: impl IntoIterator<Item = K>) -> Vec<K> {
    let mut seen = BTreeSet::new();
    let mut repeated = BTreeSet::new();
    for key in keys {
        if !seen.insert(key.clone()) {
            repeated.insert(key);
        }
    }
    repeated.into_iter().collect()
}

fn check_unique<K: Ord + Clone>(
    table: &str,
    keys: impl IntoIterator<Item = K>,
    label: impl Fn(&K) -> String,
) -> Result<(), DataIntegrityError> {
    let repeated = duplicates(keys);
    if repeated.is_empty() {
        return Ok(());
    }
    Err(DataIntegrityError::DuplicateKeys {
        table: table.to_string(),
        keys: repeated.iter().map(label).collect(),
    })
}

/// Keys of `expected` absent from `present`, sorted
fn missing<'a, K, V>(
    expected: impl IntoIterator<Item = &'a K>,
    present: &IndexMap<K, V>,
) -> Vec<K>
where
    K: Ord + Clone + Hash + Eq + 'a,
{
    expected
        .into_iter()
        .filter(|key| !present.contains_key(*key))
        .cloned()
        .collect::<BTreeSet<K>>()
        .into_iter()
        .collect()
}

impl AllocationData {
    /// Normalize and validate raw input tables
    ///
    /// Checks run in a fixed order and the first failing check is reported: column
    /// presence and cell parsing, empty door and article tables, duplicate keys,
    /// missing heat, missing supply, missing score and max runs, supply/ratio key
    /// mismatch, invalid values, and finally minimum runs for unknown doors or SKUs.
    pub fn from_tables(tables: &InputTables) -> Result<AllocationData, DataIntegrityError> {
        let door_table = door_rows(tables.required(DOORS)?)?;
        let article_table = article_rows(tables.required(ARTICLES)?)?;
        let eligibility_table = eligibility_rows(tables.required(ELIGIBILITY)?)?;
        let supply_table = supply_rows(tables.required(SUPPLY)?)?;
        let heat_table = heat_rows(tables.required(HEAT)?)?;
        let tier_cap_runs_table = tier_cap_runs_rows(tables.required(TIER_CAP_RUNS)?)?;
        let tier_capacity_table = tier_capacity_rows(tables.required(TIER_CAPACITY)?)?;
        let min_runs_table = match tables.get(MIN_RUNS) {
            Some(table) => min_runs_rows(table)?,
            None => Vec::new(),
        };

        if door_table.is_empty() {
            return Err(DataIntegrityError::EmptyTable(DOORS.to_string()));
        }
        if article_table.is_empty() {
            return Err(DataIntegrityError::EmptyTable(ARTICLES.to_string()));
        }

        check_unique(DOORS, door_table.iter().map(|r| r.door.clone()), |k| k.clone())?;
        check_unique(HEAT, heat_table.iter().map(|r| r.sku.clone()), |k| k.clone())?;
        check_unique(
            ELIGIBILITY,
            eligibility_table.iter().map(|r| pair(&r.door, &r.sku)),
            pair_label,
        )?;
        check_unique(
            MIN_RUNS,
            min_runs_table.iter().map(|r| pair(&r.door, &r.sku)),
            pair_label,
        )?;
        check_unique(
            SUPPLY,
            supply_table.iter().map(|r| pair(&r.sku, &r.size)),
            pair_label,
        )?;
        check_unique(
            TIER_CAP_RUNS,
            tier_cap_runs_table.iter().map(|r| pair(&r.tier, &r.heat)),
            pair_label,
        )?;
        check_unique(
            TIER_CAPACITY,
            tier_capacity_table.iter().map(|r| r.tier.clone()),
            |k| k.clone(),
        )?;

        // Universes
        let doors: Vec<String> = door_table
            .iter()
            .map(|r| r.door.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let door_tier: IndexMap<String, String> = door_table
            .iter()
            .map(|r| (r.door.clone(), r.tier.clone()))
            .collect();
        let mut curves: IndexMap<String, BTreeSet<String>> = IndexMap::new();
        for row in &article_table {
            curves
                .entry(row.sku.clone())
                .or_default()
                .insert(row.size.clone());
        }
        curves.sort_keys();
        let sku_sizes: IndexMap<String, Vec<String>> = curves
            .into_iter()
            .map(|(sku, sizes)| (sku, sizes.into_iter().collect()))
            .collect();
        let skus: Vec<String> = sku_sizes.keys().cloned().collect();
        let sizes: Vec<String> = sku_sizes
            .values()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let curve_keys: Vec<KeyPair> = sku_sizes
            .iter()
            .flat_map(|(sku, sizes)| sizes.iter().map(move |size| pair(sku, size)))
            .collect();

        // Heat
        let mut heat: IndexMap<String, String> = IndexMap::new();
        for row in heat_table {
            if sku_sizes.contains_key(&row.sku) {
                heat.insert(row.sku, row.heat);
            } else {
                warn!(sku = %row.sku, "Ignoring heat entry for a SKU outside the article table");
            }
        }
        let missing_heat = missing(skus.iter(), &heat);
        if !missing_heat.is_empty() {
            return Err(DataIntegrityError::MissingHeat { skus: missing_heat });
        }
        heat.sort_keys();

        // Supply and ratio, as given
        let supply_given: IndexMap<KeyPair, u64> = supply_table
            .iter()
            .filter_map(|r| r.supply_units.map(|units| (pair(&r.sku, &r.size), units)))
            .collect();
        let ratio_given: IndexMap<KeyPair, f64> = supply_table
            .iter()
            .filter_map(|r| r.ratio.map(|ratio| (pair(&r.sku, &r.size), ratio)))
            .collect();
        let missing_supply = missing(curve_keys.iter(), &supply_given);
        if !missing_supply.is_empty() {
            return Err(DataIntegrityError::MissingSupply {
                pairs: missing_supply,
            });
        }

        // Score and max runs for every occurring (tier, heat)
        let score: IndexMap<KeyPair, f64> = tier_cap_runs_table
            .iter()
            .filter_map(|r| r.score.map(|score| (pair(&r.tier, &r.heat), score)))
            .collect();
        let max_runs: IndexMap<KeyPair, u64> = tier_cap_runs_table
            .iter()
            .filter_map(|r| r.max_runs.map(|runs| (pair(&r.tier, &r.heat), runs)))
            .collect();
        let required_pairs: BTreeSet<KeyPair> = door_tier
            .values()
            .flat_map(|tier| heat.values().map(move |h| pair(tier, h)))
            .collect();
        let missing_score = missing(required_pairs.iter(), &score);
        if !missing_score.is_empty() {
            return Err(DataIntegrityError::MissingScore {
                pairs: missing_score,
            });
        }
        let missing_max_runs = missing(required_pairs.iter(), &max_runs);
        if !missing_max_runs.is_empty() {
            return Err(DataIntegrityError::MissingMaxRuns {
                pairs: missing_max_runs,
            });
        }

        let supply_without_ratio = missing(supply_given.keys(), &ratio_given);
        let ratio_without_supply = missing(ratio_given.keys(), &supply_given);
        if !supply_without_ratio.is_empty() || !ratio_without_supply.is_empty() {
            return Err(DataIntegrityError::SupplyRatioMismatch {
                supply_without_ratio,
                ratio_without_supply,
            });
        }

        let bad_ratios: BTreeSet<KeyPair> = ratio_given
            .iter()
            .filter(|(_, ratio)| !ratio.is_finite() || **ratio < 0.0)
            .map(|(key, _)| key.clone())
            .collect();
        if !bad_ratios.is_empty() {
            return Err(DataIntegrityError::InvalidValues {
                table: SUPPLY.to_string(),
                keys: bad_ratios.iter().map(pair_label).collect(),
            });
        }
        let bad_scores: BTreeSet<KeyPair> = score
            .iter()
            .filter(|(_, score)| !score.is_finite() || **score < 0.0)
            .map(|(key, _)| key.clone())
            .collect();
        if !bad_scores.is_empty() {
            return Err(DataIntegrityError::InvalidValues {
                table: TIER_CAP_RUNS.to_string(),
                keys: bad_scores.iter().map(pair_label).collect(),
            });
        }
        let bad_capacities: BTreeSet<String> = tier_capacity_table
            .iter()
            .filter(|r| r.cap_runs_total.is_some_and(|cap| cap < 0.0))
            .map(|r| r.tier.clone())
            .collect();
        if !bad_capacities.is_empty() {
            return Err(DataIntegrityError::InvalidValues {
                table: TIER_CAPACITY.to_string(),
                keys: bad_capacities.into_iter().collect(),
            });
        }

        let unknown_min_runs: BTreeSet<KeyPair> = min_runs_table
            .iter()
            .filter(|r| !door_tier.contains_key(&r.door) || !sku_sizes.contains_key(&r.sku))
            .map(|r| pair(&r.door, &r.sku))
            .collect();
        if !unknown_min_runs.is_empty() {
            return Err(DataIntegrityError::UnknownMinRunsKeys {
                pairs: unknown_min_runs.into_iter().collect(),
            });
        }

        // Only keys that can reach a constraint are kept from here on
        let mut eligible: IndexMap<KeyPair, bool> = IndexMap::new();
        for row in eligibility_table {
            if door_tier.contains_key(&row.door) && sku_sizes.contains_key(&row.sku) {
                eligible.insert(pair(&row.door, &row.sku), row.eligible);
            } else {
                warn!(
                    door = %row.door,
                    sku = %row.sku,
                    "Ignoring eligibility entry for an unknown door or SKU"
                );
            }
        }
        for key in supply_given.keys() {
            if !sku_sizes
                .get(&key.0)
                .is_some_and(|sizes| sizes.contains(&key.1))
            {
                warn!(
                    sku = %key.0,
                    size = %key.1,
                    "Ignoring supply entry outside every run curve"
                );
            }
        }
        let supply_units: IndexMap<KeyPair, u64> = curve_keys
            .iter()
            .filter_map(|key| supply_given.get(key).map(|units| (key.clone(), *units)))
            .collect();
        let ratio: IndexMap<KeyPair, f64> = curve_keys
            .iter()
            .filter_map(|key| ratio_given.get(key).map(|ratio| (key.clone(), *ratio)))
            .collect();
        let cap_runs_total: IndexMap<String, Option<f64>> = tier_capacity_table
            .into_iter()
            .map(|r| (r.tier, r.cap_runs_total))
            .collect();
        let min_runs: IndexMap<KeyPair, u64> = min_runs_table
            .into_iter()
            .map(|r| (pair(&r.door, &r.sku), r.min_runs))
            .collect();

        debug!(
            doors = doors.len(),
            skus = skus.len(),
            sizes = sizes.len(),
            eligible_pairs = eligible.values().filter(|e| **e).count(),
            "Validated allocation inputs"
        );

        Ok(AllocationData {
            doors,
            skus,
            sizes,
            door_tier,
            sku_sizes,
            eligible,
            heat,
            score,
            max_runs,
            supply_units,
            ratio,
            cap_runs_total,
            min_runs,
        })
    }

    pub fn doors(&self) -> &[String] {
        &self.doors
    }

    pub fn skus(&self) -> &[String] {
        &self.skus
    }

    /// Every size appearing in some run curve
    pub fn sizes(&self) -> &[String] {
        &self.sizes
    }

    pub fn tier(&self, door: &str) -> Option<&str> {
        self.door_tier.get(door).map(String::as_str)
    }

    pub fn heat(&self, sku: &str) -> Option<&str> {
        self.heat.get(sku).map(String::as_str)
    }

    /// Sizes of the SKU's run curve, sorted
    pub fn sku_sizes(&self, sku: &str) -> Option<&[String]> {
        self.sku_sizes.get(sku).map(Vec::as_slice)
    }

    /// Whether the door may receive the SKU; absent pairs are ineligible
    pub fn is_eligible(&self, door: &str, sku: &str) -> bool {
        self.eligible
            .get(&pair(door, sku))
            .copied()
            .unwrap_or(false)
    }

    pub fn score(&self, tier: &str, heat: &str) -> Option<f64> {
        self.score.get(&pair(tier, heat)).copied()
    }

    pub fn max_runs(&self, tier: &str, heat: &str) -> Option<u64> {
        self.max_runs.get(&pair(tier, heat)).copied()
    }

    pub fn supply_units(&self, sku: &str, size: &str) -> Option<u64> {
        self.supply_units.get(&pair(sku, size)).copied()
    }

    pub fn ratio(&self, sku: &str, size: &str) -> Option<f64> {
        self.ratio.get(&pair(sku, size)).copied()
    }

    /// (sku, size) pairs with supply, in SKU then size order
    pub fn supply_keys(&self) -> impl Iterator<Item = (&str, &str)> {
        self.supply_units
            .keys()
            .map(|(sku, size)| (sku.as_str(), size.as_str()))
    }

    /// Total runs a single door of the tier may receive, None when unbounded
    pub fn cap_runs_total(&self, tier: &str) -> Option<f64> {
        self.cap_runs_total.get(tier).copied().flatten()
    }

    /// Minimum runs of the SKU the door has to receive, zero when none is given
    pub fn min_runs(&self, door: &str, sku: &str) -> u64 {
        self.min_runs.get(&pair(door, sku)).copied().unwrap_or(0)
    }
}
