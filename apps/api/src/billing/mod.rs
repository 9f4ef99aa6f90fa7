// Entitlement gate and Pro upgrades through the payment gateway.

pub mod entitlement;
pub mod handlers;
pub mod models;
pub mod payments;
