//! Pre-write capacity checks.

use log::{debug, info};
use serde::Serialize;

use crate::{
    error::GatewayError,
    gateway::{TableGateway, TableId},
};

pub const DEFAULT_HEADROOM: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CapacityOutcome {
    Sufficient { allocated: usize },
    Expanded { from: usize, to: usize },
}

/// Grows a table ahead of a write, leaving `headroom` spare rows whenever it
/// has to grow at all. Repeating a check for the same requirement is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityExpander {
    headroom: usize,
}

impl Default for CapacityExpander {
    fn default() -> Self {
        CapacityExpander {
            headroom: DEFAULT_HEADROOM,
        }
    }
}

impl CapacityExpander {
    pub fn new(headroom: usize) -> Self {
        CapacityExpander { headroom }
    }

    pub fn headroom(&self) -> usize {
        self.headroom
    }

    pub fn ensure<G>(
        &self,
        gateway: &mut G,
        table: &TableId,
        required: usize,
    ) -> Result<CapacityOutcome, GatewayError>
    where
        G: TableGateway + ?Sized,
    {
        let allocated = gateway.allocated_rows(table)?;
        if allocated >= required {
            debug!("Table '{table}' has {allocated} row(s) allocated, {required} required");
            return Ok(CapacityOutcome::Sufficient { allocated });
        }
        let target = required + self.headroom;
        gateway.ensure_capacity(table, target)?;
        info!("Expanded table '{table}' from {allocated} to {target} row(s)");
        Ok(CapacityOutcome::Expanded {
            from: allocated,
            to: target,
        })
    }
}
