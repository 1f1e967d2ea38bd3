mod datasource;
mod twse;

pub use datasource::{QuoteRecord, QuoteSource};
pub use twse::TwseQuoteSource;

#[cfg(test)]
pub use datasource::MockQuoteSource;
