pub mod game;
pub mod market;
pub mod state;
pub mod sync_run;

pub use game::*;
pub use market::*;
pub use state::*;
pub use sync_run::*;
