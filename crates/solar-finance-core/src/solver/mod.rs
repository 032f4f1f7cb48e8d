//! Root finders that treat a full projection as their objective function.

pub mod price;

pub use price::{
    irr_for_price, run_irr_for_price, run_price_solver, solve_price_for_target_irr,
    IrrForPriceInput, IrrForPriceOutput, PriceSearch, PriceSolution, PriceSolverInput,
};
