//! Numerical building blocks shared by the estimators

pub mod logistic;
pub mod quadrature;
pub mod stats;

pub use quadrature::QuadratureGrid;
