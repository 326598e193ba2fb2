pub mod chave;
pub mod money;
pub mod nota;
pub mod search;
pub mod simulator;
pub mod tax_id;

pub use chave::{pdf_filename_for, ChaveAcesso};
pub use nota::{FiscalDocument, Issuer, LineItem, Recipient, RecipientCategory, TaxAmount, TaxRate};
pub use search::{DateRange, SearchCriteria, SearchRequest, SearchResponse};
pub use simulator::SimulatorInput;
pub use tax_id::TaxId;
