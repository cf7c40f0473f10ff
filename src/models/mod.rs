pub mod changelog;
pub mod issue;
pub mod issue_type;
pub mod priority;
pub mod project;
pub mod search;
pub mod status;
pub mod user;

pub use changelog::*;
pub use issue::*;
pub use issue_type::*;
pub use priority::*;
pub use project::*;
pub use search::*;
pub use status::*;
pub use user::*;
