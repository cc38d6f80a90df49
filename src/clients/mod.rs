pub mod google_docs;
pub mod google_sheets;
pub mod llm_client;

#[cfg(test)]
pub(crate) mod stub_server;

pub use google_docs::GoogleDocsClient;
pub use google_sheets::{GoogleSheetsClient, SheetLayout};
pub use llm_client::LlmClient;
