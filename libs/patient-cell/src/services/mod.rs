pub mod documents;
pub mod patient;
pub mod records;

pub use patient::PatientService;
pub use records::{clean_cpf, financial_summary, format_cpf, matches_search, normalize};
pub use documents::{AttestationDocument, AttestationSheet, AverageWidthMetrics, FontMetrics, PageLayout};
