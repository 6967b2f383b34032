//! Query-side building blocks: placeholder parsing, literal binding, prepared
//! statement lifecycle, bounded polling and row materialization.

pub mod bind;
pub mod execution;
pub mod hints;
pub mod materialize;
pub mod prepared;

pub use bind::{bind, bind_all};
pub use execution::{PollPolicy, QueryRunner};
pub use hints::{parse_template, ParamType, ParsedTemplate, TypeHint};
pub use materialize::materialize;
pub use prepared::{statement_name, PreparedStatementManager};
