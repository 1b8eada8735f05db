//! Data core of the aggregation explorer: timeline alignment, step-function
//! lookup, config keys, URL state, and merging of concurrently fetched
//! aggregation histories into render-ready chart series.

pub mod choices;
pub mod config;
pub mod config_key;
pub mod fetch;
pub mod history;
pub mod logging;
pub mod merge;
pub mod options;
pub mod pipeline;
pub mod retry;
pub mod scaling;
pub mod timeline;
pub mod url_state;
