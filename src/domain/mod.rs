// Domain layer: core models and ports. Adapters and config implement the ports.

pub mod model;
pub mod ports;
