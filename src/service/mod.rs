pub mod normalizer;
pub mod nota_service;

pub use normalizer::normalize;
pub use nota_service::NotaService;
