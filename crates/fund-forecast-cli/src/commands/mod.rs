pub mod forecast;
pub mod monte_carlo;
