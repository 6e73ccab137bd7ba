pub mod history;
pub mod request;

pub use history::{parse_history, HistorySource, JsonFileSource};
pub use request::{HttpMethod, RequestRecord};
