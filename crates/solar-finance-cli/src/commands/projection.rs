use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use solar_finance_core::project::{
    self, MerchantPriceCurves, PostContractPricing, ProjectParameters, ProjectionInput,
};

use crate::input;

/// Parameter overrides applied on top of the reference project when no
/// input document is given.
#[derive(Args, Debug, Default)]
pub struct ParameterArgs {
    /// Project name
    #[arg(long)]
    pub project_name: Option<String>,

    /// Nameplate capacity in MW-dc
    #[arg(long)]
    pub dc_mw: Option<Decimal>,

    /// Nameplate capacity in MW-ac
    #[arg(long)]
    pub ac_mw: Option<Decimal>,

    /// Specific yield in kWh/kWp-dc per year
    #[arg(long)]
    pub yield_kwh_per_kwp: Option<Decimal>,

    /// Annual degradation (decimal, e.g. 0.005 = 0.5%)
    #[arg(long)]
    pub degradation: Option<Decimal>,

    /// Year 1 contract price in $/MWh
    #[arg(long)]
    pub contract_price: Option<Decimal>,

    /// Annual contract price escalation (decimal)
    #[arg(long)]
    pub contract_escalation: Option<Decimal>,

    /// Contract tenor in years
    #[arg(long)]
    pub contract_tenor: Option<u32>,

    /// Post-contract (merchant) tenor in years
    #[arg(long)]
    pub post_contract_tenor: Option<u32>,

    /// Merchant region; prices come from --merchant-curves
    #[arg(long, conflicts_with = "merchant_price")]
    pub merchant_region: Option<String>,

    /// First merchant-year price in $/MWh, escalated by --merchant-escalation
    #[arg(long)]
    pub merchant_price: Option<Decimal>,

    /// Annual merchant price escalation (decimal)
    #[arg(long, requires = "merchant_price")]
    pub merchant_escalation: Option<Decimal>,

    /// Operating year of the tax-equity buyout
    #[arg(long)]
    pub buyout_year: Option<u32>,

    /// Preferred return rate on tax-equity fair value (decimal)
    #[arg(long)]
    pub preferred_return: Option<Decimal>,

    /// Discount rate for NPV and LCOE (decimal)
    #[arg(long)]
    pub discount_rate: Option<Decimal>,

    /// JSON or YAML file mapping region -> {calendar year: $/MWh}
    #[arg(long)]
    pub merchant_curves: Option<String>,
}

impl ParameterArgs {
    /// Reference project with every given flag applied, validated.
    pub fn to_parameters(&self) -> Result<ProjectParameters, Box<dyn std::error::Error>> {
        let mut params = ProjectParameters::builder().build()?;

        if let Some(ref name) = self.project_name {
            params.project_name = name.clone();
        }
        if let Some(dc) = self.dc_mw {
            params.nameplate_dc_mw = dc;
        }
        if let Some(ac) = self.ac_mw {
            params.nameplate_ac_mw = ac;
        }
        if let Some(y) = self.yield_kwh_per_kwp {
            params.production.yield_kwh_per_kwp = y;
        }
        if let Some(d) = self.degradation {
            params.production.degradation_rate = d;
        }
        if let Some(price) = self.contract_price {
            params.contract.price = price;
        }
        if let Some(esc) = self.contract_escalation {
            params.contract.escalation_rate = esc;
        }
        if let Some(tenor) = self.contract_tenor {
            params.contract.tenor_years = tenor;
        }
        if let Some(tenor) = self.post_contract_tenor {
            params.post_contract.tenor_years = tenor;
        }
        if let Some(ref region) = self.merchant_region {
            params.post_contract.pricing = PostContractPricing::Curve {
                region: region.clone(),
            };
        }
        if let Some(start_price) = self.merchant_price {
            let escalation_rate = match (&params.post_contract.pricing, self.merchant_escalation) {
                (_, Some(esc)) => esc,
                (PostContractPricing::Escalating { escalation_rate, .. }, None) => *escalation_rate,
                (PostContractPricing::Curve { .. }, None) => Decimal::ZERO,
            };
            params.post_contract.pricing = PostContractPricing::Escalating {
                start_price,
                escalation_rate,
            };
        }
        if let Some(year) = self.buyout_year {
            params.tax_equity.buyout_year = year;
        }
        if let Some(rate) = self.preferred_return {
            params.tax_equity.preferred_return_rate = rate;
        }
        if let Some(rate) = self.discount_rate {
            params.discount_rate = rate;
        }

        params.validate()?;
        Ok(params)
    }

    pub fn merchant_curves(&self) -> Result<MerchantPriceCurves, Box<dyn std::error::Error>> {
        match self.merchant_curves {
            Some(ref path) => input::file::read_document(path),
            None => Ok(MerchantPriceCurves::new()),
        }
    }
}

/// Read a typed request from `--input`, then stdin; `None` means neither
/// was supplied and the caller should fall back to flags.
pub fn read_request<T: serde::de::DeserializeOwned>(
    path: Option<&str>,
) -> Result<Option<T>, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        return Ok(Some(input::file::read_document(path)?));
    }
    match input::stdin::read_stdin()? {
        Some(data) => Ok(Some(serde_json::from_value(data)?)),
        None => Ok(None),
    }
}

/// Arguments for a full cash-flow projection
#[derive(Args)]
pub struct ProjectArgs {
    /// Path to JSON/YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    #[command(flatten)]
    pub parameters: ParameterArgs,
}

pub fn run_project(args: ProjectArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let projection_input: ProjectionInput = match read_request(args.input.as_deref())? {
        Some(request) => request,
        None => ProjectionInput {
            parameters: args.parameters.to_parameters()?,
            merchant_curves: args.parameters.merchant_curves()?,
        },
    };

    let result = project::run_projection(&projection_input)?;
    Ok(serde_json::to_value(result)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_flags_override_reference_project() {
        let args = ParameterArgs {
            contract_price: Some(dec!(120)),
            buyout_year: Some(5),
            merchant_price: Some(dec!(45)),
            ..ParameterArgs::default()
        };
        let params = args.to_parameters().unwrap();
        assert_eq!(params.contract.price, dec!(120));
        assert_eq!(params.tax_equity.buyout_year, 5);
        match params.post_contract.pricing {
            PostContractPricing::Escalating { start_price, .. } => {
                assert_eq!(start_price, dec!(45))
            }
            other => panic!("Expected escalating merchant pricing, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_flag_is_rejected() {
        let args = ParameterArgs {
            buyout_year: Some(0),
            ..ParameterArgs::default()
        };
        assert!(args.to_parameters().is_err());
    }
}
