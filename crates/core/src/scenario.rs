//! Practice scenarios: what is being pitched, to whom, and to what end.

use crate::error::{CoachError, Result};
use rand::{Rng, seq::IndexedRandom};
use serde::Serialize;

/// Read-only description of one practice session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    product_name: String,
    prospect_type: String,
    goal: String,
}

impl Scenario {
    /// Creates a scenario, rejecting blank fields. Surrounding whitespace is trimmed.
    pub fn new(
        product_name: impl Into<String>,
        prospect_type: impl Into<String>,
        goal: impl Into<String>,
    ) -> Result<Self> {
        let product_name = required("productName", product_name.into())?;
        let prospect_type = required("prospectType", prospect_type.into())?;
        let goal = required("goal", goal.into())?;
        Ok(Self {
            product_name,
            prospect_type,
            goal,
        })
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn prospect_type(&self) -> &str {
        &self.prospect_type
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    /// Draws a random product, prospect and goal from the built-in lists.
    pub fn random() -> Self {
        Self::random_with(&mut rand::rng())
    }

    pub fn random_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            product_name: pick(PRODUCTS, rng),
            prospect_type: pick(PROSPECTS, rng),
            goal: pick(GOALS, rng),
        }
    }
}

fn pick<R: Rng + ?Sized>(items: &[&str], rng: &mut R) -> String {
    items.choose(rng).copied().unwrap_or_default().to_string()
}

fn required(field: &str, value: String) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoachError::invalid(format!("scenario field '{field}' is required")));
    }
    Ok(trimmed.to_string())
}

/// A named, ready-made scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset {
    pub key: &'static str,
    pub product_name: &'static str,
    pub prospect_type: &'static str,
    pub goal: &'static str,
}

impl Preset {
    pub fn scenario(&self) -> Scenario {
        Scenario {
            product_name: self.product_name.to_string(),
            prospect_type: self.prospect_type.to_string(),
            goal: self.goal.to_string(),
        }
    }
}

pub const PRESETS: &[Preset] = &[
    Preset {
        key: "product_launch",
        product_name: "FlexiDesk Pro",
        prospect_type: "Office Manager at a growing tech startup",
        goal: "Schedule a product demo with the decision maker.",
    },
    Preset {
        key: "cold_outreach",
        product_name: "CyberShield Enterprise",
        prospect_type: "CIO of a mid-size financial services company",
        goal: "Qualify their security needs and book a follow-up call.",
    },
    Preset {
        key: "objection_handling",
        product_name: "MarketBoost Analytics Suite",
        prospect_type: "Marketing Director who thinks your solution is too expensive",
        goal: "Address price objections and demonstrate ROI value.",
    },
];

/// Looks up a preset by key.
pub fn preset(key: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.key == key)
}

const PRODUCTS: &[&str] = &[
    "CloudSync Pro",
    "DataGuard Elite",
    "ProductivityPlus",
    "CustomerInsight AI",
    "SupplyChain Optimizer",
    "TalentMatch Pro",
    "FinanceFlow",
    "MobileWorkspace",
];

const PROSPECTS: &[&str] = &[
    "CTO at a healthcare company",
    "HR Director at a retail chain",
    "Operations Manager at a manufacturing plant",
    "Marketing VP at a SaaS startup",
    "CFO at a non-profit organization",
    "IT Manager at a university",
    "Supply Chain Director at a food distributor",
    "Sales Manager at a tech company",
];

const GOALS: &[&str] = &[
    "Schedule a product demo with the team",
    "Get commitment for a free trial",
    "Identify key decision makers in the organization",
    "Qualify their needs and budget",
    "Overcome initial objections to your pricing model",
    "Upsell additional features to existing client",
    "Close a deal before the quarter ends",
    "Gather requirements for a custom solution",
];
