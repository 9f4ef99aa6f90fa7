use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    Monthly,
    Yearly,
}

impl BillingCycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCycle::Monthly => "monthly",
            BillingCycle::Yearly => "yearly",
        }
    }

    /// Fixed access period bought by one payment. No proration, no renewal.
    pub fn duration(&self) -> Duration {
        match self {
            BillingCycle::Monthly => Duration::days(30),
            BillingCycle::Yearly => Duration::days(365),
        }
    }
}

impl FromStr for BillingCycle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(BillingCycle::Monthly),
            "yearly" => Ok(BillingCycle::Yearly),
            other => Err(format!("unknown billing cycle '{other}'")),
        }
    }
}

/// Prices in the currency's minor unit (paise for INR).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanPricing {
    pub monthly_amount: u64,
    pub yearly_amount: u64,
    pub currency: String,
}

impl PlanPricing {
    pub fn amount_for(&self, cycle: BillingCycle) -> u64 {
        match cycle {
            BillingCycle::Monthly => self.monthly_amount,
            BillingCycle::Yearly => self.yearly_amount,
        }
    }
}
