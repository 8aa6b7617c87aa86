//! Stakeholder facing rows read back from a solved allocation model
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::allocation::builder::{heat_of, score_of, tier_of};
use crate::allocation::model::AllocationModel;
use crate::error::AllocationError;

/// Shipped units of one size of a SKU at a door
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRow {
    pub door: String,
    pub sku: String,
    pub size: String,
    /// Full runs shipped, the integer nearest the solver value
    pub runs: u64,
    /// Units of this size in one run
    pub ratio: f64,
    /// `ratio * runs`
    pub units: f64,
    /// Objective score of one run of the SKU at this door
    pub score: f64,
    pub heat: String,
    /// Units of this size shipped to the door, across all SKUs
    pub door_size_units: f64,
}

/// How far a constraint is from binding at the solution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackRow {
    pub name: String,
    /// `rhs - lhs`, zero when binding
    pub slack: f64,
    pub rhs: f64,
    /// One of `<=`, `>=` or `=`
    pub sense: String,
}

impl AllocationModel<'_> {
    /// Allocation rows for every door and SKU with runs above `tolerance`,
    /// one row per size of the SKU's run curve
    ///
    /// Fails with [`AllocationError::NoSolution`] when no solution is available.
    pub fn summarize_allocations(
        &self,
        tolerance: f64,
    ) -> Result<Vec<AllocationRow>, AllocationError> {
        if self.problem().solution_count() == 0 {
            return Err(AllocationError::NoSolution);
        }
        let data = self.data();
        let mut rows = Vec::new();
        let mut door_size_units: IndexMap<(String, String), f64> = IndexMap::new();

        for door in data.doors() {
            let tier = tier_of(data, door)?;
            for sku in data.skus() {
                let value = self.runs(door, sku)?;
                if value <= tolerance {
                    continue;
                }
                let runs = value.round().max(0.0) as u64;
                let heat = heat_of(data, sku)?;
                let score = score_of(data, tier, heat)?;
                let sizes = data.sku_sizes(sku).ok_or_else(|| {
                    AllocationError::InternalConsistency(format!("no run curve for {}", sku))
                })?;
                for size in sizes {
                    let ratio = data.ratio(sku, size).ok_or_else(|| {
                        AllocationError::InternalConsistency(format!(
                            "no ratio for ({}, {})",
                            sku, size
                        ))
                    })?;
                    let units = ratio * runs as f64;
                    *door_size_units
                        .entry((door.clone(), size.clone()))
                        .or_insert(0.0) += units;
                    rows.push(AllocationRow {
                        door: door.clone(),
                        sku: sku.clone(),
                        size: size.clone(),
                        runs,
                        ratio,
                        units,
                        score,
                        heat: heat.to_string(),
                        door_size_units: 0.0,
                    });
                }
            }
        }

        for row in rows.iter_mut() {
            row.door_size_units = door_size_units
                .get(&(row.door.clone(), row.size.clone()))
                .copied()
                .unwrap_or(0.0);
        }
        Ok(rows)
    }

    /// Slack rows for every constraint of the program, in the order they were built
    pub fn constraint_slacks(&self) -> Result<Vec<SlackRow>, AllocationError> {
        if self.problem().solution_count() == 0 {
            return Err(AllocationError::NoSolution);
        }
        Ok(self
            .problem()
            .constraint_diagnostics()?
            .into_iter()
            .map(|diagnostic| SlackRow {
                name: diagnostic.name,
                slack: diagnostic.slack,
                rhs: diagnostic.rhs,
                sense: diagnostic.sense.to_string(),
            })
            .collect())
    }
}
