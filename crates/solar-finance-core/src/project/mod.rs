//! Cash-flow projection for a solar asset financed through a single
//! tax-equity partnership.
//!
//! Leaves first: [`escalation`], [`production`], [`pricing`] and [`opex`]
//! feed [`cash_flow::project`]; [`tax_equity`] sizes the partnership once and
//! yields its per-year effects; [`summary`] wraps a run with IRR, NPV, LCOE
//! and totals.

pub mod cash_flow;
pub mod escalation;
pub mod opex;
pub mod params;
pub mod pricing;
pub mod production;
pub mod summary;
pub mod tax_equity;

pub use cash_flow::{project, AnnualRecord, Projection, YearPhase};
pub use params::{
    BonusSchedule, BonusTier, CapitalCosts, ContractTerms, OperatingCosts, PostContractPricing,
    PostContractTerms, ProductionTerms, ProjectParameters, ProjectParametersBuilder, RentBasis,
    TaxEquityTerms, YearWindow,
};
pub use pricing::{MerchantPriceCurve, MerchantPriceCurves, RevenueSource};
pub use summary::{run_projection, IrrOutcome, ProjectMetrics, ProjectionInput, ProjectionOutput};
