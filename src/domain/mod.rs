// Domain layer: parking models, pricing and ports (interfaces).

pub mod model;
pub mod ports;
pub mod pricing;
